use super::elem_info::ElemInfo;
use super::space::{Point, Vector};
use super::{BoundaryId, SubdomainId};
use std::collections::{BTreeMap, BTreeSet};

/// On which sides of a face a variable is defined
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarFaceNeighbors {
    Both,
    Elem,
    Neighbor,
    Neither,
}

impl VarFaceNeighbors {
    /// Classify a variable restricted to `var_blocks` (empty means everywhere)
    pub fn classify(
        var_blocks: &BTreeSet<SubdomainId>,
        elem_subdomain: SubdomainId,
        neighbor_subdomain: Option<SubdomainId>,
    ) -> Self {
        let defined_on = |sub: SubdomainId| var_blocks.is_empty() || var_blocks.contains(&sub);
        let on_elem = defined_on(elem_subdomain);
        let on_neighbor = neighbor_subdomain.map_or(false, defined_on);

        match (on_elem, on_neighbor) {
            (true, true) => Self::Both,
            (true, false) => Self::Elem,
            (false, true) => Self::Neighbor,
            (false, false) => Self::Neither,
        }
    }
}

/// Geometric information about a face shared by an element and (optionally) one of its neighbors
///
/// ```text
///      ---------------------
///      |         |         |
///      |    C ---|--> N    |
///      |  elem   |  neigh  |
///      |         |-> n     |
///      ---------------------
/// ```
///
/// The normal always points away from the "elem" side.
#[derive(Debug, Clone)]
pub struct FaceInfo {
    elem_id: usize,
    elem_side: usize,
    neighbor: Option<(usize, usize)>,
    face_area: f64,
    face_centroid: Point,
    normal: Vector,
    elem_centroid: Point,
    neighbor_centroid: Point,
    d_cn: Vector,
    d_cn_mag: f64,
    e_cn: Vector,
    gc: f64,
    elem_to_face: Vector,
    neighbor_to_face: Option<Vector>,
    skewness_correction: Vector,
    var_face_types: BTreeMap<(usize, usize), VarFaceNeighbors>,
    boundary_ids: BTreeSet<BoundaryId>,
}

impl FaceInfo {
    /// Build a face from the elem's side geometry.
    ///
    /// `raw_normal` must be non-zero; it is oriented away from the elem's centroid here.
    pub fn new(
        elem: &ElemInfo,
        elem_side: usize,
        face_area: f64,
        face_centroid: Point,
        raw_normal: Vector,
        neighbor: Option<(&ElemInfo, usize)>,
    ) -> Self {
        let mut normal = raw_normal.normalize();
        if normal.dot(&(face_centroid - elem.centroid())) < 0.0 {
            normal = -normal;
        }

        let mut face = Self {
            elem_id: elem.elem_id(),
            elem_side,
            neighbor: neighbor.map(|(n_info, n_side)| (n_info.elem_id(), n_side)),
            face_area,
            face_centroid,
            normal,
            elem_centroid: *elem.centroid(),
            neighbor_centroid: face_centroid,
            d_cn: Vector::zeros(),
            d_cn_mag: 0.0,
            e_cn: Vector::zeros(),
            gc: 1.0,
            elem_to_face: Vector::zeros(),
            neighbor_to_face: None,
            skewness_correction: Vector::zeros(),
            var_face_types: BTreeMap::new(),
            boundary_ids: BTreeSet::new(),
        };
        face.compute_coefficients(elem, neighbor.map(|(n_info, _)| n_info));
        face
    }

    /// (Re)compute the interpolation and skewness coefficients from the adjacent element centroids
    pub fn compute_coefficients(&mut self, elem: &ElemInfo, neighbor: Option<&ElemInfo>) {
        self.elem_centroid = *elem.centroid();
        self.elem_to_face = self.face_centroid - self.elem_centroid;

        match neighbor {
            Some(n_info) => {
                self.neighbor_centroid = *n_info.centroid();
                self.neighbor_to_face = Some(self.face_centroid - self.neighbor_centroid);
            }
            None => {
                // boundary faces use the face centroid as the ghost cell center
                self.neighbor_centroid = self.face_centroid;
                self.neighbor_to_face = None;
            }
        }

        self.d_cn = self.neighbor_centroid - self.elem_centroid;
        self.d_cn_mag = self.d_cn.norm();
        self.e_cn = self.d_cn / self.d_cn_mag;

        // intersection of the centroid-to-centroid line with the face plane
        let r_intersection = self.elem_centroid
            + self.e_cn * (self.elem_to_face.dot(&self.normal) / self.e_cn.dot(&self.normal));
        self.skewness_correction = self.face_centroid - r_intersection;

        if self.neighbor.is_some() {
            let from_neighbor = (self.neighbor_centroid - self.face_centroid).dot(&self.normal);
            let from_elem = self.elem_to_face.dot(&self.normal);
            self.gc = from_neighbor / (from_neighbor + from_elem);
        } else {
            self.gc = 1.0;
        }
    }

    pub fn is_boundary(&self) -> bool {
        self.neighbor.is_none()
    }

    pub fn elem_id(&self) -> usize {
        self.elem_id
    }

    pub fn elem_side(&self) -> usize {
        self.elem_side
    }

    pub fn neighbor_id(&self) -> Option<usize> {
        self.neighbor.map(|(id, _)| id)
    }

    pub fn neighbor_side(&self) -> Option<usize> {
        self.neighbor.map(|(_, side)| side)
    }

    pub fn face_area(&self) -> f64 {
        self.face_area
    }

    pub fn face_centroid(&self) -> &Point {
        &self.face_centroid
    }

    /// Unit normal pointing out of the elem
    pub fn normal(&self) -> &Vector {
        &self.normal
    }

    pub fn elem_centroid(&self) -> &Point {
        &self.elem_centroid
    }

    pub fn neighbor_centroid(&self) -> &Point {
        &self.neighbor_centroid
    }

    pub fn d_cn(&self) -> &Vector {
        &self.d_cn
    }

    pub fn d_cn_mag(&self) -> f64 {
        self.d_cn_mag
    }

    pub fn e_cn(&self) -> &Vector {
        &self.e_cn
    }

    /// Weight of the elem centroid value when interpolating to the face
    pub fn gc(&self) -> f64 {
        self.gc
    }

    pub fn gc_complement(&self) -> f64 {
        1.0 - self.gc
    }

    pub fn elem_to_face(&self) -> &Vector {
        &self.elem_to_face
    }

    pub fn neighbor_to_face(&self) -> Option<&Vector> {
        self.neighbor_to_face.as_ref()
    }

    pub fn skewness_correction_vector(&self) -> &Vector {
        &self.skewness_correction
    }

    pub fn set_var_face_type(&mut self, system: usize, variable: usize, face_type: VarFaceNeighbors) {
        self.var_face_types.insert((system, variable), face_type);
    }

    /// Classification of a variable on this face; unclassified variables are not defined on either side
    pub fn var_face_type(&self, system: usize, variable: usize) -> VarFaceNeighbors {
        self.var_face_types
            .get(&(system, variable))
            .copied()
            .unwrap_or(VarFaceNeighbors::Neither)
    }

    pub fn boundary_ids(&self) -> &BTreeSet<BoundaryId> {
        &self.boundary_ids
    }

    pub(crate) fn add_boundary_id(&mut self, boundary_id: BoundaryId) {
        self.boundary_ids.insert(boundary_id);
    }
}
