use super::{AutomaticMortarGeneration, MortarConfig, MortarInterface};
use crate::mesh::elem::ElemType;
use crate::mesh::space::Point;
use crate::mesh::{BoundaryId, Mesh, SubdomainId};

pub const SECONDARY_BOUNDARY: BoundaryId = 1;
pub const PRIMARY_BOUNDARY: BoundaryId = 2;
pub const SECONDARY_SUBDOMAIN: SubdomainId = 10;
pub const PRIMARY_SUBDOMAIN: SubdomainId = 20;

pub fn interface() -> MortarInterface {
    MortarInterface {
        primary_boundary: PRIMARY_BOUNDARY,
        secondary_boundary: SECONDARY_BOUNDARY,
        primary_subdomain: PRIMARY_SUBDOMAIN,
        secondary_subdomain: SECONDARY_SUBDOMAIN,
    }
}

/// A row of secondary quads (subdomain 1) spanning y in [0, 1] and a row of primary quads (subdomain 2) spanning y in [1 + gap, 2].
///
/// The quads on each side share nodes, but the two sides do not.
pub fn interface_mesh(secondary_xs: &[f64], primary_xs: &[f64], gap: f64) -> Mesh {
    let mut mesh = Mesh::blank();
    add_quad_row(&mut mesh, secondary_xs, [0.0, 1.0], 1, 2, SECONDARY_BOUNDARY);
    add_quad_row(&mut mesh, primary_xs, [1.0 + gap, 2.0], 2, 0, PRIMARY_BOUNDARY);

    mesh.build_lower_d_elems(SECONDARY_BOUNDARY, SECONDARY_SUBDOMAIN).unwrap();
    mesh.build_lower_d_elems(PRIMARY_BOUNDARY, PRIMARY_SUBDOMAIN).unwrap();
    mesh.prepare_for_use().unwrap();
    mesh
}

/// A single secondary and a single primary unit square separated by `gap`
pub fn flat_interface(gap: f64) -> Mesh {
    interface_mesh(&[0.0, 1.0], &[0.0, 1.0], gap)
}

fn add_quad_row(
    mesh: &mut Mesh,
    xs: &[f64],
    ys: [f64; 2],
    subdomain: SubdomainId,
    side: usize,
    boundary: BoundaryId,
) {
    let bottom: Vec<usize> = xs.iter().map(|x| mesh.add_node(Point::new(*x, ys[0], 0.0))).collect();
    let top: Vec<usize> = xs.iter().map(|x| mesh.add_node(Point::new(*x, ys[1], 0.0))).collect();
    for i in 0..xs.len() - 1 {
        let elem = mesh
            .add_elem(ElemType::Quad4, &[bottom[i], bottom[i + 1], top[i + 1], top[i]], subdomain)
            .unwrap();
        mesh.add_side_boundary(elem, side, boundary).unwrap();
    }
}

pub fn generate(mesh: &Mesh, config: MortarConfig) -> AutomaticMortarGeneration {
    let mut amg = AutomaticMortarGeneration::new(interface(), config).unwrap();
    amg.update(mesh).unwrap();
    amg
}

fn add_hex(mesh: &mut Mesh, x: [f64; 2], y: [f64; 2], z: [f64; 2], subdomain: SubdomainId) -> usize {
    let mut nodes = Vec::with_capacity(8);
    for zk in z {
        for (xi, yi) in [(x[0], y[0]), (x[1], y[0]), (x[1], y[1]), (x[0], y[1])] {
            nodes.push(mesh.add_node(Point::new(xi, yi, zk)));
        }
    }
    mesh.add_elem(ElemType::Hex8, &nodes, subdomain).unwrap()
}

/// A unit cube below z = 1 (secondary top face) and `primary_xs.len() - 1` hexes above it, shifted by `primary_offset` in x and y
pub fn stacked_cubes(primary_xs: &[f64], primary_offset: [f64; 2]) -> Mesh {
    let mut mesh = Mesh::blank();
    let lower = add_hex(&mut mesh, [0.0, 1.0], [0.0, 1.0], [0.0, 1.0], 1);
    mesh.add_side_boundary(lower, 5, SECONDARY_BOUNDARY).unwrap();

    for pair in primary_xs.windows(2) {
        let upper = add_hex(
            &mut mesh,
            [pair[0] + primary_offset[0], pair[1] + primary_offset[0]],
            [primary_offset[1], 1.0 + primary_offset[1]],
            [1.0, 2.0],
            2,
        );
        mesh.add_side_boundary(upper, 0, PRIMARY_BOUNDARY).unwrap();
    }

    mesh.build_lower_d_elems(SECONDARY_BOUNDARY, SECONDARY_SUBDOMAIN).unwrap();
    mesh.build_lower_d_elems(PRIMARY_BOUNDARY, PRIMARY_SUBDOMAIN).unwrap();
    mesh.prepare_for_use().unwrap();
    mesh
}
