use super::driver::MortarAssembly;
use super::materials::MaterialId;
use super::MortarError;
use crate::mesh::shape::{map_to_physical, shape_functions};
use crate::mesh::space::{Point, RefPoint, Vector};
use crate::mesh::{BoundaryId, Mesh, MeshError, SubdomainId};

use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};

/// The kinds of objects which evaluate quantities over a mortar interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerKind {
    Constraint,
    UserObject,
    AuxKernel,
}

/// An object evaluated over the mortar segments of an interface
///
/// The material properties a consumer depends on determine which materials are reinitialized on each side of the interface.
pub trait MortarConsumer: Sync + Send {
    fn name(&self) -> &str;

    fn kind(&self) -> ConsumerKind;

    fn material_property_dependencies(&self) -> &BTreeSet<String>;
}

/// The set of material property names required by a consumer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialDependencies {
    properties: BTreeSet<String>,
}

impl MaterialDependencies {
    pub fn new(properties: &[&str]) -> Self {
        Self {
            properties: properties.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn add(&mut self, property: impl Into<String>) {
        self.properties.insert(property.into());
    }

    pub fn properties(&self) -> &BTreeSet<String> {
        &self.properties
    }
}

// ----------------------------------------------------------------------------------------------------
// Geometric assembly
// ----------------------------------------------------------------------------------------------------

/// One of the calls made into a [MortarAssembly] during the segment loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReinitStep {
    MortarSegment,
    ElemFace,
    NeighborFace,
    NeighborMaterials,
    LowerDElem,
    PrimaryLowerDElem,
    FaceMaterials,
    BoundaryMaterials,
    MortarUserObjects,
}

/// A [MortarAssembly] which evaluates the geometry of each segment: quadrature points on both faces, secondary normals, and lower-dimensional shape functions
pub struct GeometricAssembly<'m> {
    mesh: &'m Mesh,
    segment: Option<usize>,
    jxw: Vec<f64>,
    segment_points: Vec<Point>,
    secondary_points: Vec<Point>,
    primary_points: Vec<Point>,
    secondary_normals: Vec<Vector>,
    lower_d_phi: Vec<SmallVec<[f64; 9]>>,
    lower_d_elem: Option<usize>,
    primary_lower_d_elem: Option<usize>,
    neighbor_materials: Vec<MaterialId>,
    face_materials: Vec<MaterialId>,
    boundary_materials: Vec<MaterialId>,
    reinit_log: Vec<ReinitStep>,
}

impl<'m> GeometricAssembly<'m> {
    pub fn new(mesh: &'m Mesh) -> Self {
        Self {
            mesh,
            segment: None,
            jxw: Vec::new(),
            segment_points: Vec::new(),
            secondary_points: Vec::new(),
            primary_points: Vec::new(),
            secondary_normals: Vec::new(),
            lower_d_phi: Vec::new(),
            lower_d_elem: None,
            primary_lower_d_elem: None,
            neighbor_materials: Vec::new(),
            face_materials: Vec::new(),
            boundary_materials: Vec::new(),
            reinit_log: Vec::new(),
        }
    }

    pub fn segment(&self) -> Option<usize> {
        self.segment
    }

    pub fn jxw(&self) -> &[f64] {
        &self.jxw
    }

    /// Quadrature points on the mortar segment
    pub fn segment_points(&self) -> &[Point] {
        &self.segment_points
    }

    /// Quadrature points mapped onto the secondary face
    pub fn secondary_points(&self) -> &[Point] {
        &self.secondary_points
    }

    /// Quadrature points mapped onto the primary face
    pub fn primary_points(&self) -> &[Point] {
        &self.primary_points
    }

    pub fn secondary_normals(&self) -> &[Vector] {
        &self.secondary_normals
    }

    /// Shape function values of the secondary lower-dimensional element at each quadrature point
    pub fn lower_d_phi(&self) -> &[SmallVec<[f64; 9]>] {
        &self.lower_d_phi
    }

    pub fn lower_d_elem(&self) -> Option<usize> {
        self.lower_d_elem
    }

    pub fn primary_lower_d_elem(&self) -> Option<usize> {
        self.primary_lower_d_elem
    }

    pub fn neighbor_materials(&self) -> &[MaterialId] {
        &self.neighbor_materials
    }

    pub fn face_materials(&self) -> &[MaterialId] {
        &self.face_materials
    }

    pub fn boundary_materials(&self) -> &[MaterialId] {
        &self.boundary_materials
    }

    /// The calls made since the current segment was reinitialized
    pub fn reinit_log(&self) -> &[ReinitStep] {
        &self.reinit_log
    }

    fn face_points(&self, elem_id: usize, side: usize, points: &[RefPoint]) -> Result<Vec<Point>, MortarError> {
        let elem = self.mesh.elem(elem_id)?;
        let side_error = || MeshError::SideNotFound { elem: elem_id, side };
        let side_type = elem.elem_type.side_type().ok_or_else(side_error)?;
        let side_points = elem
            .side_node_ids(side)
            .ok_or_else(side_error)?
            .iter()
            .map(|node_id| self.mesh.point(*node_id).copied())
            .collect::<Result<SmallVec<[Point; 4]>, MeshError>>()?;

        points
            .iter()
            .map(|xi| {
                map_to_physical(side_type, &side_points, *xi)
                    .map(|sp| sp.x)
                    .ok_or_else(|| side_error().into())
            })
            .collect()
    }
}

impl MortarAssembly for GeometricAssembly<'_> {
    fn reinit_mortar_segment(&mut self, segment: usize, points: &[Point], jxw: &[f64]) {
        self.reinit_log.clear();
        self.reinit_log.push(ReinitStep::MortarSegment);
        self.segment = Some(segment);
        self.segment_points = points.to_vec();
        self.jxw = jxw.to_vec();
    }

    fn reinit_elem_face_ref(&mut self, elem: usize, side: usize, points: &[RefPoint]) -> Result<(), MortarError> {
        self.reinit_log.push(ReinitStep::ElemFace);
        self.secondary_points = self.face_points(elem, side, points)?;
        Ok(())
    }

    fn reinit_neighbor_face_ref(&mut self, elem: usize, side: usize, points: &[RefPoint]) -> Result<(), MortarError> {
        self.reinit_log.push(ReinitStep::NeighborFace);
        self.primary_points = self.face_points(elem, side, points)?;
        Ok(())
    }

    fn reinit_materials_neighbor(&mut self, _: SubdomainId, materials: &[MaterialId], _: bool) {
        self.reinit_log.push(ReinitStep::NeighborMaterials);
        self.neighbor_materials = materials.to_vec();
    }

    fn reinit_lower_d_elem(&mut self, elem: usize, points: &[RefPoint]) -> Result<(), MortarError> {
        self.reinit_log.push(ReinitStep::LowerDElem);
        let elem_type = self.mesh.elem(elem)?.elem_type;

        self.lower_d_phi.clear();
        self.secondary_normals.clear();
        for xi in points.iter() {
            let values = shape_functions(elem_type, *xi).ok_or(MeshError::DegenerateElem(elem))?;
            self.lower_d_phi.push(values.phi);
            self.secondary_normals.push(self.mesh.lower_d_normal(elem, *xi)?);
        }
        self.lower_d_elem = Some(elem);
        Ok(())
    }

    fn reinit_primary_lower_d_elem(&mut self, elem: Option<usize>) {
        self.reinit_log.push(ReinitStep::PrimaryLowerDElem);
        self.primary_lower_d_elem = elem;
    }

    fn reinit_materials_face(&mut self, _: SubdomainId, materials: &[MaterialId]) {
        self.reinit_log.push(ReinitStep::FaceMaterials);
        self.face_materials = materials.to_vec();
    }

    fn reinit_materials_boundary(&mut self, _: BoundaryId, materials: &[MaterialId]) {
        self.reinit_log.push(ReinitStep::BoundaryMaterials);
        self.boundary_materials = materials.to_vec();
    }

    fn reinit_mortar_user_objects(&mut self, _: BoundaryId, _: BoundaryId, _: bool) {
        self.reinit_log.push(ReinitStep::MortarUserObjects);
    }
}

// ----------------------------------------------------------------------------------------------------
// Weighted gap
// ----------------------------------------------------------------------------------------------------

/// Accumulates the normal gap between the two sides of an interface, weighted by the secondary shape functions, at each secondary node
///
/// ```text
///   g_i = Σ_qp φ_i(qp) ((x2(qp) - x1(qp)) · n(qp)) JxW(qp)
/// ```
/// A positive gap indicates that the surfaces are separated.
#[derive(Debug, Clone)]
pub struct WeightedGapUserObject {
    name: String,
    dependencies: MaterialDependencies,
    weighted_gaps: BTreeMap<usize, f64>,
}

impl WeightedGapUserObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: MaterialDependencies::default(),
            weighted_gaps: BTreeMap::new(),
        }
    }

    pub fn with_dependencies(mut self, properties: &[&str]) -> Self {
        for property in properties.iter() {
            self.dependencies.add(*property);
        }
        self
    }

    /// Zero all of the accumulated gaps
    pub fn initialize(&mut self) {
        self.weighted_gaps.clear();
    }

    /// Add the contribution of the segment the assembly is currently reinitialized on
    pub fn execute(&mut self, assembly: &GeometricAssembly) -> Result<(), MortarError> {
        let lower_d_elem = assembly.lower_d_elem().ok_or(MortarError::NotReinitialized)?;
        let nodes = &assembly.mesh.elem(lower_d_elem)?.nodes;

        for qp in 0..assembly.jxw().len() {
            let gap = (assembly.primary_points()[qp] - assembly.secondary_points()[qp])
                .dot(&assembly.secondary_normals()[qp]);
            for (phi, node_id) in assembly.lower_d_phi()[qp].iter().zip(nodes.iter()) {
                *self.weighted_gaps.entry(*node_id).or_insert(0.0) += phi * gap * assembly.jxw()[qp];
            }
        }

        Ok(())
    }

    pub fn weighted_gap(&self, node_id: usize) -> Option<f64> {
        self.weighted_gaps.get(&node_id).copied()
    }

    pub fn weighted_gaps(&self) -> &BTreeMap<usize, f64> {
        &self.weighted_gaps
    }
}

impl MortarConsumer for WeightedGapUserObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ConsumerKind {
        ConsumerKind::UserObject
    }

    fn material_property_dependencies(&self) -> &BTreeSet<String> {
        self.dependencies.properties()
    }
}
