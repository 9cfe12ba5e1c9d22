use super::elem::{Elem, ElemType};
use super::space::{Point, Vector};
use super::SubdomainId;
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Coordinate system in which element volumes and face areas are measured
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CoordSystem {
    #[default]
    Cartesian,
    /// Axisymmetric about the y-axis (r = x)
    Rz,
    /// Spherically symmetric about the origin (r = x)
    RSpherical,
}

impl CoordSystem {
    /// Factor by which a volume or area computed in the xy-plane must be scaled at a point
    pub fn transform_factor(&self, point: &Point) -> f64 {
        match self {
            Self::Cartesian => 1.0,
            Self::Rz => 2.0 * PI * point.x,
            Self::RSpherical => 4.0 * PI * point.x * point.x,
        }
    }
}

/// Cached geometric information about one element of a [Mesh](super::Mesh)
#[derive(Debug, Clone)]
pub struct ElemInfo {
    elem_id: usize,
    subdomain_id: SubdomainId,
    volume: f64,
    centroid: Point,
    coord_transform_factor: f64,
    // (system, variable) -> dof indices
    dof_indices: BTreeMap<(usize, usize), Vec<usize>>,
}

impl ElemInfo {
    pub fn new(elem: &Elem, points: &[Point], coord_system: CoordSystem) -> Self {
        let (volume, centroid) = volume_and_centroid(elem.elem_type, points);
        let coord_transform_factor = coord_system.transform_factor(&centroid);

        Self {
            elem_id: elem.id,
            subdomain_id: elem.subdomain_id,
            volume: volume * coord_transform_factor,
            centroid,
            coord_transform_factor,
            dof_indices: BTreeMap::new(),
        }
    }

    pub fn elem_id(&self) -> usize {
        self.elem_id
    }

    pub fn subdomain_id(&self) -> SubdomainId {
        self.subdomain_id
    }

    /// Volume of the element including the coordinate transformation factor
    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn centroid(&self) -> &Point {
        &self.centroid
    }

    pub fn coord_transform_factor(&self) -> f64 {
        self.coord_transform_factor
    }

    /// Get the dof indices of a variable on this element, computing them with `compute` the first time they are requested
    pub fn dof_indices<F>(&mut self, system: usize, variable: usize, compute: F) -> &[usize]
    where
        F: FnOnce() -> Vec<usize>,
    {
        self.dof_indices
            .entry((system, variable))
            .or_insert_with(compute)
            .as_slice()
    }

    pub fn cached_dof_indices(&self, system: usize, variable: usize) -> Option<&[usize]> {
        self.dof_indices
            .get(&(system, variable))
            .map(|indices| indices.as_slice())
    }

    pub fn clear_dof_indices(&mut self) {
        self.dof_indices.clear();
    }
}

/// Measure (length, area, or volume) and centroid of an element in Cartesian coordinates
pub fn volume_and_centroid(elem_type: ElemType, points: &[Point]) -> (f64, Point) {
    let vertices = &points[..elem_type.n_vertices().min(points.len())];

    match elem_type.dim() {
        1 => {
            let length = (vertices[1] - vertices[0]).norm();
            (length, Point::from((vertices[0].coords + vertices[1].coords) * 0.5))
        }
        2 => polygon_area_and_centroid(vertices),
        _ => polyhedron_volume_and_centroid(elem_type, vertices),
    }
}

fn vertex_average(points: &[Point]) -> Point {
    let sum = points.iter().fold(Vector::zeros(), |acc, p| acc + p.coords);
    Point::from(sum / points.len() as f64)
}

// planar polygon split into a triangle fan about its first vertex
fn polygon_area_and_centroid(vertices: &[Point]) -> (f64, Point) {
    let mut area_vector = Vector::zeros();
    for i in 1..vertices.len() - 1 {
        area_vector += (vertices[i] - vertices[0]).cross(&(vertices[i + 1] - vertices[0])) * 0.5;
    }
    let area = area_vector.norm();
    if area == 0.0 {
        return (0.0, vertex_average(vertices));
    }
    let unit_normal = area_vector / area;

    let mut weighted = Vector::zeros();
    for i in 1..vertices.len() - 1 {
        let tri_area =
            (vertices[i] - vertices[0]).cross(&(vertices[i + 1] - vertices[0])).dot(&unit_normal) * 0.5;
        let tri_centroid = (vertices[0].coords + vertices[i].coords + vertices[i + 1].coords) / 3.0;
        weighted += tri_centroid * tri_area;
    }

    (area, Point::from(weighted / area))
}

// sum of the tetrahedra formed by the vertex average and a fan triangulation of each face
fn polyhedron_volume_and_centroid(elem_type: ElemType, vertices: &[Point]) -> (f64, Point) {
    let center = vertex_average(vertices);
    let mut volume = 0.0;
    let mut weighted = Vector::zeros();

    for side in 0..elem_type.n_sides() {
        let face: Vec<Point> = elem_type
            .side_nodes(side)
            .unwrap_or(&[])
            .iter()
            .filter(|ln| **ln < vertices.len())
            .map(|ln| vertices[*ln])
            .collect();
        if face.len() < 3 {
            continue;
        }
        let face_center = vertex_average(&face);

        for i in 0..face.len() {
            let a = face[i];
            let b = face[(i + 1) % face.len()];
            let tet_volume = (a - center).dot(&(b - center).cross(&(face_center - center))) / 6.0;
            let tet_centroid = (center.coords + a.coords + b.coords + face_center.coords) / 4.0;
            volume += tet_volume;
            weighted += tet_centroid * tet_volume;
        }
    }

    // outward facing sides produce positive tetrahedra; flip for inverted elements
    let volume_abs = volume.abs();
    if volume_abs == 0.0 {
        (0.0, center)
    } else {
        (volume_abs, Point::from(weighted / volume))
    }
}
