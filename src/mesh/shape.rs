use super::elem::ElemType;
use super::space::{Point, RefPoint, Vector};
use smallvec::{smallvec, SmallVec};

/// Lagrange shape function values and reference space derivatives at a single point
#[derive(Debug, Clone)]
pub struct ShapeValues {
    pub phi: SmallVec<[f64; 9]>,
    pub dphi_dxi: SmallVec<[f64; 9]>,
    pub dphi_deta: SmallVec<[f64; 9]>,
}

/// A point on a curve or surface element along with its reference space tangents
#[derive(Debug, Clone, Copy)]
pub struct SurfacePoint {
    pub x: Point,
    pub dx_dxi: Vector,
    pub dx_deta: Vector,
}

// 1D lagrange polynomials with nodes ordered [-1, 1, (0)]
fn lagrange_1d(order: usize, i: usize, xi: f64) -> f64 {
    match (order, i) {
        (1, 0) => 0.5 * (1.0 - xi),
        (1, 1) => 0.5 * (1.0 + xi),
        (2, 0) => 0.5 * xi * (xi - 1.0),
        (2, 1) => 0.5 * xi * (xi + 1.0),
        (2, 2) => 1.0 - xi * xi,
        _ => unreachable!("1D Lagrange basis only defined up to second order"),
    }
}

fn lagrange_1d_deriv(order: usize, i: usize, xi: f64) -> f64 {
    match (order, i) {
        (1, 0) => -0.5,
        (1, 1) => 0.5,
        (2, 0) => xi - 0.5,
        (2, 1) => xi + 0.5,
        (2, 2) => -2.0 * xi,
        _ => unreachable!("1D Lagrange basis only defined up to second order"),
    }
}

// tensor product indices of the quadrilateral nodes
const QUAD4_TENSOR: [(usize, usize); 4] = [(0, 0), (1, 0), (1, 1), (0, 1)];
const QUAD9_TENSOR: [(usize, usize); 9] = [
    (0, 0),
    (1, 0),
    (1, 1),
    (0, 1),
    (2, 0),
    (1, 2),
    (2, 1),
    (0, 2),
    (2, 2),
];

/// Evaluate the shape functions of a 1D or 2D element at a reference point
///
/// Returns `None` for volume elements
pub fn shape_functions(elem_type: ElemType, xi: RefPoint) -> Option<ShapeValues> {
    let [r, s] = xi;
    let n = elem_type.n_nodes();
    let mut values = ShapeValues {
        phi: smallvec![0.0; n],
        dphi_dxi: smallvec![0.0; n],
        dphi_deta: smallvec![0.0; n],
    };

    match elem_type {
        ElemType::Edge2 | ElemType::Edge3 => {
            let order = if elem_type == ElemType::Edge2 { 1 } else { 2 };
            for i in 0..n {
                values.phi[i] = lagrange_1d(order, i, r);
                values.dphi_dxi[i] = lagrange_1d_deriv(order, i, r);
            }
        }
        ElemType::Quad4 | ElemType::Quad9 => {
            let (order, tensor): (usize, &[(usize, usize)]) = if elem_type == ElemType::Quad4 {
                (1, &QUAD4_TENSOR)
            } else {
                (2, &QUAD9_TENSOR)
            };
            for (i, (a, b)) in tensor.iter().enumerate() {
                values.phi[i] = lagrange_1d(order, *a, r) * lagrange_1d(order, *b, s);
                values.dphi_dxi[i] = lagrange_1d_deriv(order, *a, r) * lagrange_1d(order, *b, s);
                values.dphi_deta[i] = lagrange_1d(order, *a, r) * lagrange_1d_deriv(order, *b, s);
            }
        }
        ElemType::Tri3 => {
            values.phi.copy_from_slice(&[1.0 - r - s, r, s]);
            values.dphi_dxi.copy_from_slice(&[-1.0, 1.0, 0.0]);
            values.dphi_deta.copy_from_slice(&[-1.0, 0.0, 1.0]);
        }
        ElemType::Tri6 => {
            let l0 = 1.0 - r - s;
            values.phi.copy_from_slice(&[
                l0 * (2.0 * l0 - 1.0),
                r * (2.0 * r - 1.0),
                s * (2.0 * s - 1.0),
                4.0 * l0 * r,
                4.0 * r * s,
                4.0 * s * l0,
            ]);
            values.dphi_dxi.copy_from_slice(&[
                1.0 - 4.0 * l0,
                4.0 * r - 1.0,
                0.0,
                4.0 * (l0 - r),
                4.0 * s,
                -4.0 * s,
            ]);
            values.dphi_deta.copy_from_slice(&[
                1.0 - 4.0 * l0,
                0.0,
                4.0 * s - 1.0,
                -4.0 * r,
                4.0 * r,
                4.0 * (l0 - s),
            ]);
        }
        ElemType::Tet4 | ElemType::Hex8 => return None,
    }

    Some(values)
}

/// Second reference derivatives of a 1D element's shape functions
pub fn edge_second_derivatives(elem_type: ElemType) -> Option<SmallVec<[f64; 3]>> {
    match elem_type {
        ElemType::Edge2 => Some(smallvec![0.0, 0.0]),
        ElemType::Edge3 => Some(smallvec![1.0, 1.0, -2.0]),
        _ => None,
    }
}

/// Map a reference point on a curve or surface element into real space
///
/// `points` are the element's nodal locations in local node order
pub fn map_to_physical(elem_type: ElemType, points: &[Point], xi: RefPoint) -> Option<SurfacePoint> {
    if points.len() != elem_type.n_nodes() {
        return None;
    }
    let values = shape_functions(elem_type, xi)?;

    let mut surface_point = SurfacePoint {
        x: Point::origin(),
        dx_dxi: Vector::zeros(),
        dx_deta: Vector::zeros(),
    };
    for (i, p) in points.iter().enumerate() {
        surface_point.x += p.coords * values.phi[i];
        surface_point.dx_dxi += p.coords * values.dphi_dxi[i];
        surface_point.dx_deta += p.coords * values.dphi_deta[i];
    }

    Some(surface_point)
}

/// Un-normalized normal of a curve (in the xy-plane) or surface element at a reference point
///
/// Curves return the tangent rotated by -90°, so a counter-clockwise side of a 2D element yields an outward normal
pub fn raw_normal(elem_type: ElemType, points: &[Point], xi: RefPoint) -> Option<Vector> {
    let sp = map_to_physical(elem_type, points, xi)?;
    match elem_type.dim() {
        1 => Some(Vector::new(sp.dx_dxi.y, -sp.dx_dxi.x, 0.0)),
        2 => Some(sp.dx_dxi.cross(&sp.dx_deta)),
        _ => None,
    }
}
