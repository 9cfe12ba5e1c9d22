use super::MortarConfig;
use crate::mesh::elem::ElemType;
use crate::mesh::shape::{edge_second_derivatives, map_to_physical};
use crate::mesh::space::{cross_z, Point, RefPoint, Vector};
use nalgebra::{Matrix2, Matrix3, Vector2};

/// Result of projecting a node onto the opposing side of a mortar interface
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection<X = f64> {
    /// The node lands at reference coordinate `xi` of lower-dimensional element `elem`
    Projected { xi: X, elem: usize },
    NotProjected,
}

impl<X: Copy> Projection<X> {
    pub fn is_projected(&self) -> bool {
        matches!(self, Self::Projected { .. })
    }

    pub fn xi(&self) -> Option<X> {
        match self {
            Self::Projected { xi, .. } => Some(*xi),
            Self::NotProjected => None,
        }
    }

    pub fn elem(&self) -> Option<usize> {
        match self {
            Self::Projected { elem, .. } => Some(*elem),
            Self::NotProjected => None,
        }
    }
}

/// Check whether a reference point lies inside an element's reference domain (expanded by `tol`)
pub fn in_reference_domain(elem_type: ElemType, xi: RefPoint, tol: f64) -> bool {
    match elem_type {
        ElemType::Edge2 | ElemType::Edge3 => xi[0].abs() <= 1.0 + tol,
        ElemType::Quad4 | ElemType::Quad9 => xi[0].abs() <= 1.0 + tol && xi[1].abs() <= 1.0 + tol,
        ElemType::Tri3 | ElemType::Tri6 => {
            xi[0] >= -tol && xi[1] >= -tol && xi[0] + xi[1] <= 1.0 + tol
        }
        ElemType::Tet4 | ElemType::Hex8 => false,
    }
}

/// Find the reference coordinate on a curve element whose point lies on the line through `p` along `normal`
///
/// Solves `(x(xi) - p) × normal = 0` (z-component) with Newton's method starting from the element center.
/// Returns `None` if the iteration does not converge; the root may lie outside the reference domain.
pub fn project_along_normal_1d(
    elem_type: ElemType,
    points: &[Point],
    p: &Point,
    normal: &Vector,
    config: &MortarConfig,
) -> Option<f64> {
    let mut xi = 0.0;

    for _ in 0..config.max_newton_iterations {
        let sp = map_to_physical(elem_type, points, [xi, 0.0])?;
        let residual = cross_z(&(sp.x - p), normal);
        if residual.abs() < config.newton_tolerance {
            return Some(xi);
        }

        let jacobian = cross_z(&sp.dx_dxi, normal);
        if jacobian == 0.0 {
            // the element is parallel to the normal
            return None;
        }

        let step = -residual / jacobian;
        xi += step;
        if step.abs() < config.newton_tolerance {
            return Some(xi);
        }
    }

    None
}

/// Find the reference coordinate on a curve element whose normal passes through `p`
///
/// Solves `(x(xi) - p) · dx/dxi = 0`, which (in the plane) is equivalent to asking that `x(xi) - p` is colinear with the element's normal at `xi`.
pub fn closest_point_1d(
    elem_type: ElemType,
    points: &[Point],
    p: &Point,
    config: &MortarConfig,
) -> Option<f64> {
    let second_derivs = edge_second_derivatives(elem_type)?;
    let d2x_dxi2 = points
        .iter()
        .zip(second_derivs.iter())
        .fold(Vector::zeros(), |acc, (pt, d2)| acc + pt.coords * *d2);

    let mut xi = 0.0;
    for _ in 0..config.max_newton_iterations {
        let sp = map_to_physical(elem_type, points, [xi, 0.0])?;
        let u = sp.x - p;
        let residual = u.dot(&sp.dx_dxi);
        if residual.abs() < config.newton_tolerance {
            return Some(xi);
        }

        let jacobian = sp.dx_dxi.norm_squared() + u.dot(&d2x_dxi2);
        if jacobian == 0.0 {
            return None;
        }

        let step = -residual / jacobian;
        xi += step;
        if step.abs() < config.newton_tolerance {
            return Some(xi);
        }
    }

    None
}

/// Find the reference point on a surface element which lies on the line through `p` along `normal`
///
/// Solves `x(xi, eta) - p - λ normal = 0` for `(xi, eta, λ)`. Returns the reference point and the signed distance `λ` along the normal.
pub fn project_along_normal_2d(
    elem_type: ElemType,
    points: &[Point],
    p: &Point,
    normal: &Vector,
    config: &MortarConfig,
) -> Option<(RefPoint, f64)> {
    let mut xi = elem_type.reference_center();
    let mut lambda = 0.0;

    for _ in 0..config.max_newton_iterations {
        let sp = map_to_physical(elem_type, points, xi)?;
        let residual = sp.x - p - normal * lambda;
        if residual.norm() < config.newton_tolerance {
            return Some((xi, lambda));
        }

        let jacobian = Matrix3::from_columns(&[sp.dx_dxi, sp.dx_deta, -normal]);
        let step = jacobian.lu().solve(&(-residual))?;

        xi[0] += step[0];
        xi[1] += step[1];
        lambda += step[2];
        if step.norm() < config.newton_tolerance {
            return Some((xi, lambda));
        }
    }

    None
}

/// Find the reference point on a surface element closest to `p` (Gauss-Newton)
pub fn closest_point_2d(
    elem_type: ElemType,
    points: &[Point],
    p: &Point,
    config: &MortarConfig,
) -> Option<RefPoint> {
    let mut xi = elem_type.reference_center();

    for _ in 0..config.max_newton_iterations {
        let sp = map_to_physical(elem_type, points, xi)?;
        let u = sp.x - p;
        let residual = Vector2::new(u.dot(&sp.dx_dxi), u.dot(&sp.dx_deta));
        if residual.norm() < config.newton_tolerance {
            return Some(xi);
        }

        let metric = Matrix2::new(
            sp.dx_dxi.dot(&sp.dx_dxi),
            sp.dx_dxi.dot(&sp.dx_deta),
            sp.dx_deta.dot(&sp.dx_dxi),
            sp.dx_deta.dot(&sp.dx_deta),
        );
        let step = metric.lu().solve(&(-residual))?;

        xi[0] += step[0];
        xi[1] += step[1];
        if step.norm() < config.newton_tolerance {
            return Some(xi);
        }
    }

    None
}

/// Two unit tangents which complete an orthonormal frame with the unit `normal`
///
/// The tangents are the columns of the Householder reflection which maps `normal` onto the coordinate axis least aligned with it.
pub fn householder_tangents(normal: &Vector) -> [Vector; 2] {
    let k = normal.iamin();
    let sign = if normal[k] < 0.0 { -1.0 } else { 1.0 };

    let mut h = *normal;
    h[k] += sign;
    let h_norm_sq = h.norm_squared();

    let column = |j: usize| -> Vector {
        let mut col = h * (-2.0 * h[j] / h_norm_sq);
        col[j] += 1.0;
        col
    };

    let mut others = (0..3).filter(|j| *j != k);
    // the filter always yields exactly two indices
    let j1 = others.next().unwrap_or((k + 1) % 3);
    let j2 = others.next().unwrap_or((k + 2) % 3);

    [column(j1), column(j2)]
}
