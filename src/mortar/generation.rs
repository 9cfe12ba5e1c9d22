/// Surface (3D mesh) segment generation
pub mod surface;

use super::projection::{closest_point_1d, householder_tangents, project_along_normal_1d, Projection};
use super::segment_info::MortarSegmentInfo;
use super::segment_mesh::MortarSegmentMesh;
use super::{MortarConfig, MortarError};
use crate::mesh::shape::map_to_physical;
use crate::mesh::space::{cross_z, perp_2d, Point, RefPoint, Vector};
use crate::mesh::{BoundaryId, Mesh, MeshError, SubdomainId};

#[cfg(feature = "json_export")]
use json::{array, object, JsonValue};
use log::debug;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
#[cfg(feature = "json_export")]
use std::fs::File;
#[cfg(feature = "json_export")]
use std::io::BufWriter;

/// node id -> ids of the lower-dimensional elements which contain it
pub type NodeElemMap = BTreeMap<usize, SmallVec<[usize; 4]>>;

/// The two sides of a mortar interface: boundaries of the mesh, along with the subdomains which hold the lower-dimensional elements built on them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MortarInterface {
    pub primary_boundary: BoundaryId,
    pub secondary_boundary: BoundaryId,
    pub primary_subdomain: SubdomainId,
    pub secondary_subdomain: SubdomainId,
}

// entries produced by projecting a single node; merged into the projection maps in node order
#[derive(Debug, Default)]
struct NodeProjectionEntries {
    secondary: Vec<((usize, usize), (f64, usize))>,
    primary: Vec<((usize, usize), (f64, Option<usize>))>,
}

/// Builds a mortar segment mesh between two non-conforming lower-dimensional surfaces
///
/// Each segment lies within exactly one secondary element and at most one primary element:
/// ```text
///   primary:    |-----------|-------------------|
///                \           \                   \
///   segments:   |-------|---|-------|-----------|--|
///                        \         \              \
///   secondary:  |---------------|---------------|--|
/// ```
///
/// The generation runs in phases (see [AutomaticMortarGeneration::update]); each phase can also be run individually.
#[derive(Debug, Clone)]
pub struct AutomaticMortarGeneration {
    config: MortarConfig,
    interface: MortarInterface,
    dim: usize,

    secondary_elems: BTreeSet<usize>,
    primary_elems: BTreeSet<usize>,
    nodes_to_secondary_elem_map: NodeElemMap,
    nodes_to_primary_elem_map: NodeElemMap,

    secondary_node_to_nodal_normal: BTreeMap<usize, Vector>,
    secondary_node_to_hh_nodal_tangents: BTreeMap<usize, [Vector; 2]>,

    // (secondary node, secondary elem) -> (xi2, primary elem)
    secondary_node_and_elem_to_xi2_primary_elem: BTreeMap<(usize, usize), (f64, usize)>,
    // (primary node, primary elem) -> (xi1, secondary elem)
    primary_node_and_elem_to_xi1_secondary_elem: BTreeMap<(usize, usize), (f64, Option<usize>)>,
    // 3D counterparts of the maps above; not read by the segment build
    secondary_node_and_elem_to_surface_xi2: BTreeMap<(usize, usize), (RefPoint, usize)>,
    primary_node_and_elem_to_surface_xi1: BTreeMap<(usize, usize), (RefPoint, usize)>,

    mortar_segment_mesh: MortarSegmentMesh,
    msm_elem_to_info: BTreeMap<usize, MortarSegmentInfo>,
    secondary_elems_to_mortar_segments: BTreeMap<usize, BTreeSet<usize>>,
    // fraction of each secondary element's surface covered by segments with a primary (3D only)
    secondary_elem_coverage: BTreeMap<usize, f64>,
    mortar_interface_coupling: BTreeMap<usize, BTreeSet<usize>>,

    inactive_local_lm_nodes: BTreeSet<usize>,
    inactive_local_lm_elems: BTreeSet<usize>,
}

impl AutomaticMortarGeneration {
    pub fn new(interface: MortarInterface, config: MortarConfig) -> Result<Self, MortarError> {
        config.validate()?;

        if interface.primary_boundary == interface.secondary_boundary {
            return Err(MortarError::InvalidParameter {
                name: "boundary",
                reason: format!(
                    "the primary and secondary boundaries must differ (both are {})",
                    interface.primary_boundary
                ),
            });
        }
        if interface.primary_subdomain == interface.secondary_subdomain {
            return Err(MortarError::InvalidParameter {
                name: "subdomain",
                reason: format!(
                    "the primary and secondary subdomains must differ (both are {})",
                    interface.primary_subdomain
                ),
            });
        }

        Ok(Self {
            config,
            interface,
            dim: 0,
            secondary_elems: BTreeSet::new(),
            primary_elems: BTreeSet::new(),
            nodes_to_secondary_elem_map: BTreeMap::new(),
            nodes_to_primary_elem_map: BTreeMap::new(),
            secondary_node_to_nodal_normal: BTreeMap::new(),
            secondary_node_to_hh_nodal_tangents: BTreeMap::new(),
            secondary_node_and_elem_to_xi2_primary_elem: BTreeMap::new(),
            primary_node_and_elem_to_xi1_secondary_elem: BTreeMap::new(),
            secondary_node_and_elem_to_surface_xi2: BTreeMap::new(),
            primary_node_and_elem_to_surface_xi1: BTreeMap::new(),
            mortar_segment_mesh: MortarSegmentMesh::blank(1),
            msm_elem_to_info: BTreeMap::new(),
            secondary_elems_to_mortar_segments: BTreeMap::new(),
            secondary_elem_coverage: BTreeMap::new(),
            mortar_interface_coupling: BTreeMap::new(),
            inactive_local_lm_nodes: BTreeSet::new(),
            inactive_local_lm_elems: BTreeSet::new(),
        })
    }

    /// Construct from lists of `(primary, secondary)` boundary and subdomain pairs. Only a single pair of each is supported.
    pub fn from_boundary_pairs(
        boundary_pairs: &[(BoundaryId, BoundaryId)],
        subdomain_pairs: &[(SubdomainId, SubdomainId)],
        config: MortarConfig,
    ) -> Result<Self, MortarError> {
        match (boundary_pairs, subdomain_pairs) {
            ([(primary_boundary, secondary_boundary)], [(primary_subdomain, secondary_subdomain)]) => {
                Self::new(
                    MortarInterface {
                        primary_boundary: *primary_boundary,
                        secondary_boundary: *secondary_boundary,
                        primary_subdomain: *primary_subdomain,
                        secondary_subdomain: *secondary_subdomain,
                    },
                    config,
                )
            }
            ([_], _) => Err(MortarError::BoundaryPairCardinality(subdomain_pairs.len())),
            _ => Err(MortarError::BoundaryPairCardinality(boundary_pairs.len())),
        }
    }

    /// Reset all generated data
    pub fn clear(&mut self) {
        self.dim = 0;
        self.secondary_elems.clear();
        self.primary_elems.clear();
        self.nodes_to_secondary_elem_map.clear();
        self.nodes_to_primary_elem_map.clear();
        self.secondary_node_to_nodal_normal.clear();
        self.secondary_node_to_hh_nodal_tangents.clear();
        self.secondary_node_and_elem_to_xi2_primary_elem.clear();
        self.primary_node_and_elem_to_xi1_secondary_elem.clear();
        self.secondary_node_and_elem_to_surface_xi2.clear();
        self.primary_node_and_elem_to_surface_xi1.clear();
        self.mortar_segment_mesh.clear(1);
        self.msm_elem_to_info.clear();
        self.secondary_elems_to_mortar_segments.clear();
        self.secondary_elem_coverage.clear();
        self.mortar_interface_coupling.clear();
        self.inactive_local_lm_nodes.clear();
        self.inactive_local_lm_elems.clear();
    }

    /// Rebuild the mortar segment mesh from the current state of the mesh
    pub fn update(&mut self, mesh: &Mesh) -> Result<(), MortarError> {
        self.clear();
        self.build_node_to_elem_maps(mesh)?;
        self.compute_nodal_geometry(mesh)?;
        self.project_secondary_nodes(mesh)?;
        self.project_primary_nodes(mesh)?;

        if self.dim == 2 {
            self.build_mortar_segment_mesh(mesh)?;
        } else {
            self.build_mortar_segment_mesh_3d(mesh)?;
        }

        if self.config.correct_edge_dropping {
            self.compute_inactive_lm_nodes(mesh)?;
        } else {
            self.compute_incorrect_edge_dropping_inactive_lm_nodes(mesh)?;
        }
        self.compute_inactive_lm_elems(mesh)?;

        debug!(
            "Generated {} mortar segments on {} secondary elems ({} inactive lm nodes)",
            self.mortar_segment_mesh.n_elems(),
            self.secondary_elems.len(),
            self.inactive_local_lm_nodes.len()
        );
        if self.config.debug {
            for (segment, info) in self.msm_elem_to_info.iter() {
                debug!("mortar segment {}: {}", segment, info);
            }
        }

        Ok(())
    }

    // ----------------------------------------------------------------------------------------------------
    // Node to Elem maps
    // ----------------------------------------------------------------------------------------------------

    /// Find the lower-dimensional elements of both sides of the interface and map each of their nodes to the elements which contain it
    pub fn build_node_to_elem_maps(&mut self, mesh: &Mesh) -> Result<(), MortarError> {
        self.dim = mesh.mesh_dimension();
        if self.dim != 2 && self.dim != 3 {
            return Err(MortarError::UnsupportedDimension(self.dim));
        }

        let (secondary_elems, secondary_map) = self.collect_lower_d_elems(
            mesh,
            self.interface.secondary_subdomain,
            self.interface.secondary_boundary,
        )?;
        let (primary_elems, primary_map) = self.collect_lower_d_elems(
            mesh,
            self.interface.primary_subdomain,
            self.interface.primary_boundary,
        )?;

        if secondary_elems.is_empty() {
            return Err(MortarError::EmptyBoundary {
                side: "secondary",
                subdomain: self.interface.secondary_subdomain,
            });
        }
        if primary_elems.is_empty() {
            return Err(MortarError::EmptyBoundary {
                side: "primary",
                subdomain: self.interface.primary_subdomain,
            });
        }

        self.secondary_elems = secondary_elems;
        self.primary_elems = primary_elems;
        self.nodes_to_secondary_elem_map = secondary_map;
        self.nodes_to_primary_elem_map = primary_map;

        Ok(())
    }

    fn collect_lower_d_elems(
        &self,
        mesh: &Mesh,
        subdomain: SubdomainId,
        boundary: BoundaryId,
    ) -> Result<(BTreeSet<usize>, NodeElemMap), MortarError> {
        let mut elems = BTreeSet::new();
        let mut node_map = NodeElemMap::new();

        for elem in mesh
            .elems_in_subdomain(subdomain)
            .filter(|elem| elem.dim() + 1 == self.dim)
        {
            let parent_id = elem
                .interior_parent()
                .ok_or(MortarError::MissingInteriorParent(elem.id))?;
            let side = elem
                .interior_parent_side()
                .ok_or(MortarError::MissingInteriorParent(elem.id))?;
            if !mesh.boundary_ids(parent_id, side).any(|bid| *bid == boundary) {
                continue;
            }

            elems.insert(elem.id);
            for node_id in elem.nodes.iter() {
                node_map.entry(*node_id).or_default().push(elem.id);
            }
        }

        Ok((elems, node_map))
    }

    // ----------------------------------------------------------------------------------------------------
    // Nodal Geometry
    // ----------------------------------------------------------------------------------------------------

    /// Compute a unit normal (the average of the adjacent lower-dimensional element normals) and two unit tangents at each secondary node
    pub fn compute_nodal_geometry(&mut self, mesh: &Mesh) -> Result<(), MortarError> {
        let sign = if self.config.periodic { -1.0 } else { 1.0 };
        let mut normal_sums: BTreeMap<usize, Vector> = BTreeMap::new();

        for elem_id in self.secondary_elems.iter() {
            let elem = mesh.elem(*elem_id)?;
            for (local_node, node_id) in elem.nodes.iter().enumerate() {
                let xi = elem
                    .elem_type
                    .reference_node(local_node)
                    .ok_or(MeshError::DegenerateElem(*elem_id))?;
                let normal = mesh.lower_d_normal(*elem_id, xi)?;
                *normal_sums.entry(*node_id).or_insert_with(Vector::zeros) += normal;
            }
        }

        self.secondary_node_to_nodal_normal.clear();
        self.secondary_node_to_hh_nodal_tangents.clear();
        for (node_id, sum) in normal_sums {
            let normal = sum
                .try_normalize(0.0)
                .ok_or(MortarError::DegenerateNodalNormal(node_id))?
                * sign;
            self.secondary_node_to_hh_nodal_tangents
                .insert(node_id, householder_tangents(&normal));
            self.secondary_node_to_nodal_normal.insert(node_id, normal);
        }

        Ok(())
    }

    // ----------------------------------------------------------------------------------------------------
    // Projections
    // ----------------------------------------------------------------------------------------------------

    /// Project each secondary node along its nodal normal onto the primary surface
    pub fn project_secondary_nodes(&mut self, mesh: &Mesh) -> Result<(), MortarError> {
        if self.dim == 3 {
            return self.project_secondary_nodes_3d(mesh);
        }

        let vertices = vertex_nodes(mesh, &self.secondary_elems)?;
        let results = vertices
            .par_iter()
            .map(|node_id| self.project_secondary_node(mesh, *node_id))
            .collect::<Result<Vec<NodeProjectionEntries>, MortarError>>()?;

        for entries in results {
            self.merge_projection_entries(entries);
        }

        Ok(())
    }

    /// Project each primary node onto the secondary surface (along the secondary surface's normal)
    pub fn project_primary_nodes(&mut self, mesh: &Mesh) -> Result<(), MortarError> {
        if self.dim == 3 {
            return self.project_primary_nodes_3d(mesh);
        }

        let vertices = vertex_nodes(mesh, &self.primary_elems)?;
        let results = vertices
            .par_iter()
            .map(|node_id| self.project_primary_node(mesh, *node_id))
            .collect::<Result<Vec<NodeProjectionEntries>, MortarError>>()?;

        for entries in results {
            self.merge_projection_entries(entries);
        }

        Ok(())
    }

    fn merge_projection_entries(&mut self, entries: NodeProjectionEntries) {
        for (key, value) in entries.secondary {
            self.secondary_node_and_elem_to_xi2_primary_elem
                .entry(key)
                .or_insert(value);
        }
        for (key, value) in entries.primary {
            self.primary_node_and_elem_to_xi1_secondary_elem
                .entry(key)
                .or_insert(value);
        }
    }

    /// Candidate nodes closest to `point` (ties broken by id)
    fn nearest_nodes(
        &self,
        mesh: &Mesh,
        point: &Point,
        node_map: &NodeElemMap,
    ) -> Result<Vec<usize>, MortarError> {
        let mut distances = node_map
            .keys()
            .map(|node_id| Ok(((mesh.point(*node_id)? - point).norm_squared(), *node_id)))
            .collect::<Result<Vec<(f64, usize)>, MeshError>>()?;

        distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        distances.truncate(self.config.nearest_node_candidates);

        Ok(distances.into_iter().map(|(_, node_id)| node_id).collect())
    }

    fn project_secondary_node(
        &self,
        mesh: &Mesh,
        node_id: usize,
    ) -> Result<NodeProjectionEntries, MortarError> {
        let mut entries = NodeProjectionEntries::default();

        let secondary_neighbors = match self.nodes_to_secondary_elem_map.get(&node_id) {
            Some(neighbors) => neighbors,
            None => return Ok(entries),
        };
        if secondary_neighbors.iter().all(|elem_id| {
            self.secondary_node_and_elem_to_xi2_primary_elem
                .contains_key(&(node_id, *elem_id))
        }) {
            return Ok(entries);
        }

        let normal = self
            .secondary_node_to_nodal_normal
            .get(&node_id)
            .ok_or(MortarError::MissingNodalNormal(node_id))?;
        let point = mesh.point(node_id)?;
        let xi_tol = self.config.xi_tolerance;

        let mut tried = BTreeSet::new();
        for candidate in self.nearest_nodes(mesh, point, &self.nodes_to_primary_elem_map)? {
            for primary_elem_id in self.nodes_to_primary_elem_map[&candidate].iter() {
                if !tried.insert(*primary_elem_id) {
                    continue;
                }

                let primary_elem = mesh.elem(*primary_elem_id)?;
                let xi2 = match project_along_normal_1d(
                    primary_elem.elem_type,
                    &mesh.elem_points(*primary_elem_id)?,
                    point,
                    normal,
                    &self.config,
                ) {
                    Some(xi2) if xi2.abs() <= 1.0 + xi_tol => xi2,
                    _ => continue,
                };

                if (xi2.abs() - 1.0).abs() < xi_tol {
                    return self.aligned_secondary_node_entries(
                        mesh,
                        node_id,
                        normal,
                        *primary_elem_id,
                        xi2,
                    );
                }

                for secondary_elem_id in secondary_neighbors.iter() {
                    entries
                        .secondary
                        .push(((node_id, *secondary_elem_id), (xi2, *primary_elem_id)));
                }
                return Ok(entries);
            }
        }

        debug!(
            "Failed to find a primary elem into which secondary Node {} could be projected",
            node_id
        );
        Ok(entries)
    }

    // A secondary node which lands on a primary node: match the elements on either side of the pair of nodes
    fn aligned_secondary_node_entries(
        &self,
        mesh: &Mesh,
        node_id: usize,
        normal: &Vector,
        primary_elem_id: usize,
        xi2: f64,
    ) -> Result<NodeProjectionEntries, MortarError> {
        let mut entries = NodeProjectionEntries::default();
        let point = mesh.point(node_id)?;

        let primary_elem = mesh.elem(primary_elem_id)?;
        let primary_node = if xi2 < 0.0 {
            primary_elem.nodes[0]
        } else {
            primary_elem.nodes[1]
        };

        let secondary_neighbors = self
            .nodes_to_secondary_elem_map
            .get(&node_id)
            .ok_or(MortarError::UnmatchedAlignedNeighbors(node_id))?;
        let primary_neighbors = self
            .nodes_to_primary_elem_map
            .get(&primary_node)
            .ok_or(MortarError::UnmatchedAlignedNeighbors(node_id))?;

        // side of the nodal normal on which each neighbor lies
        let side_of = |elem_id: usize, shared_node: usize| -> Result<f64, MortarError> {
            let elem = mesh.elem(elem_id)?;
            let opposite = if elem.nodes[0] == shared_node {
                elem.nodes[1]
            } else {
                elem.nodes[0]
            };
            Ok(cross_z(normal, &(mesh.point(opposite)? - point)))
        };

        let mut matched = false;
        for secondary_elem_id in secondary_neighbors.iter() {
            let secondary_side = side_of(*secondary_elem_id, node_id)?;
            for neighbor_id in primary_neighbors.iter() {
                let primary_side = side_of(*neighbor_id, primary_node)?;
                if secondary_side * primary_side <= 0.0 {
                    continue;
                }
                matched = true;

                let xi2 = if mesh.elem(*neighbor_id)?.nodes[0] == primary_node {
                    -1.0
                } else {
                    1.0
                };
                let xi1 = if mesh.elem(*secondary_elem_id)?.nodes[0] == node_id {
                    -1.0
                } else {
                    1.0
                };

                entries
                    .secondary
                    .push(((node_id, *secondary_elem_id), (xi2, *neighbor_id)));
                entries
                    .primary
                    .push(((primary_node, *neighbor_id), (xi1, Some(*secondary_elem_id))));
            }
        }

        if !matched {
            return Err(MortarError::UnmatchedAlignedNeighbors(node_id));
        }

        // the end of the secondary surface lands on an interior primary node
        if secondary_neighbors.len() == 1 && primary_neighbors.len() == 2 {
            for neighbor_id in primary_neighbors.iter() {
                if !entries.primary.iter().any(|((_, e), _)| e == neighbor_id) {
                    entries
                        .primary
                        .push(((primary_node, *neighbor_id), (1.0, None)));
                }
            }
        }

        Ok(entries)
    }

    fn project_primary_node(
        &self,
        mesh: &Mesh,
        node_id: usize,
    ) -> Result<NodeProjectionEntries, MortarError> {
        let mut entries = NodeProjectionEntries::default();

        let first_neighbor = match self
            .nodes_to_primary_elem_map
            .get(&node_id)
            .and_then(|neighbors| neighbors.first())
        {
            Some(first_neighbor) => *first_neighbor,
            None => return Ok(entries),
        };
        if self
            .primary_node_and_elem_to_xi1_secondary_elem
            .contains_key(&(node_id, first_neighbor))
        {
            return Ok(entries);
        }

        let point = mesh.point(node_id)?;
        let xi_tol = self.config.xi_tolerance;

        let mut tried = BTreeSet::new();
        for candidate in self.nearest_nodes(mesh, point, &self.nodes_to_secondary_elem_map)? {
            for secondary_elem_id in self.nodes_to_secondary_elem_map[&candidate].iter() {
                if !tried.insert(*secondary_elem_id) {
                    continue;
                }

                let secondary_elem = mesh.elem(*secondary_elem_id)?;
                let xi1 = match closest_point_1d(
                    secondary_elem.elem_type,
                    &mesh.elem_points(*secondary_elem_id)?,
                    point,
                    &self.config,
                ) {
                    Some(xi1) if xi1.abs() <= 1.0 + xi_tol => xi1,
                    _ => continue,
                };

                if (xi1.abs() - 1.0).abs() < xi_tol {
                    return Err(MortarError::UnmappedAlignedPrimaryNode {
                        node: node_id,
                        secondary_elem: *secondary_elem_id,
                    });
                }

                entries
                    .primary
                    .push(((node_id, first_neighbor), (xi1, Some(*secondary_elem_id))));
                return Ok(entries);
            }
        }

        Ok(entries)
    }

    // ----------------------------------------------------------------------------------------------------
    // 1D Segment Mesh
    // ----------------------------------------------------------------------------------------------------

    /// Build the segment mesh of a 2D problem.
    ///
    /// Each secondary element starts as a single segment, which is then split at every primary node that projects into its interior.
    pub fn build_mortar_segment_mesh(&mut self, mesh: &Mesh) -> Result<(), MortarError> {
        self.mortar_segment_mesh.clear(1);
        self.msm_elem_to_info.clear();
        self.secondary_elems_to_mortar_segments.clear();

        let secondary_elems: Vec<usize> = self.secondary_elems.iter().copied().collect();
        for secondary_elem_id in secondary_elems {
            let elem = mesh.elem(secondary_elem_id)?;

            let mut msm_nodes: SmallVec<[usize; 3]> = SmallVec::new();
            for node_id in elem.nodes.iter() {
                msm_nodes.push(self.mortar_segment_mesh.add_point(*mesh.point(*node_id)?));
            }
            let segment = self.mortar_segment_mesh.add_elem(&msm_nodes);

            let end_projection = |local_node: usize| {
                match self
                    .secondary_node_and_elem_to_xi2_primary_elem
                    .get(&(elem.nodes[local_node], secondary_elem_id))
                {
                    Some((xi2, primary_elem_id)) => (*xi2, Some(*primary_elem_id)),
                    None => (MortarSegmentInfo::INVALID_XI, None),
                }
            };
            let (xi2_a, primary_a) = end_projection(0);
            let (xi2_b, primary_b) = end_projection(1);

            let info = MortarSegmentInfo {
                xi1_a: -1.0,
                xi1_b: 1.0,
                xi2_a,
                xi2_b,
                secondary_elem: secondary_elem_id,
                primary_elem: if primary_a == primary_b { primary_a } else { None },
                sub_elem: 0,
            };

            self.msm_elem_to_info.insert(segment, info);
            self.secondary_elems_to_mortar_segments
                .entry(secondary_elem_id)
                .or_default()
                .insert(segment);
        }

        let primary_projections: Vec<(usize, f64, Option<usize>)> = self
            .primary_node_and_elem_to_xi1_secondary_elem
            .iter()
            .map(|((node_id, _), (xi1, secondary_elem))| (*node_id, *xi1, *secondary_elem))
            .collect();

        for (primary_node, xi1, secondary_elem) in primary_projections {
            // aligned nodes do not split segments
            if (xi1.abs() - 1.0).abs() < self.config.xi_tolerance {
                continue;
            }
            if let Some(secondary_elem_id) = secondary_elem {
                self.split_segment(mesh, primary_node, secondary_elem_id, xi1)?;
            }
        }

        self.build_mortar_interface_coupling(mesh)
    }

    fn split_segment(
        &mut self,
        mesh: &Mesh,
        primary_node: usize,
        secondary_elem_id: usize,
        xi1: f64,
    ) -> Result<(), MortarError> {
        let secondary_elem = mesh.elem(secondary_elem_id)?;
        let secondary_points = mesh.elem_points(secondary_elem_id)?;
        let secondary_type = secondary_elem.elem_type;
        let not_found = MortarError::SegmentNotFound {
            secondary_elem: secondary_elem_id,
            xi1,
        };

        let current = self
            .secondary_elems_to_mortar_segments
            .get(&secondary_elem_id)
            .and_then(|segments| {
                segments.iter().copied().find(|segment| {
                    self.msm_elem_to_info
                        .get(segment)
                        .map_or(false, |info| info.xi1_a < xi1 && xi1 < info.xi1_b)
                })
            })
            .ok_or(not_found)?;
        let current_info = *self
            .msm_elem_to_info
            .get(&current)
            .ok_or(MortarError::MissingInfo(current))?;
        let current_nodes = self
            .mortar_segment_mesh
            .elem(current)
            .map(|segment| segment.nodes.clone())
            .ok_or(MortarError::MissingInfo(current))?;

        let new_sp = map_to_physical(secondary_type, &secondary_points, [xi1, 0.0])
            .ok_or(MeshError::DegenerateElem(secondary_elem_id))?;
        let new_point = new_sp.x;
        let new_node = self.mortar_segment_mesh.add_point(new_point);

        let (left_nodes, right_nodes): (SmallVec<[usize; 3]>, SmallVec<[usize; 3]>) =
            if current_nodes.len() == 3 {
                let midpoint = |a: f64, b: f64| {
                    map_to_physical(secondary_type, &secondary_points, [0.5 * (a + b), 0.0])
                        .map(|sp| sp.x)
                        .ok_or(MeshError::DegenerateElem(secondary_elem_id))
                };
                let left_mid = self
                    .mortar_segment_mesh
                    .add_point(midpoint(current_info.xi1_a, xi1)?);
                let right_mid = self
                    .mortar_segment_mesh
                    .add_point(midpoint(xi1, current_info.xi1_b)?);
                (
                    SmallVec::from_slice(&[current_nodes[0], new_node, left_mid]),
                    SmallVec::from_slice(&[new_node, current_nodes[1], right_mid]),
                )
            } else {
                (
                    SmallVec::from_slice(&[current_nodes[0], new_node]),
                    SmallVec::from_slice(&[new_node, current_nodes[1]]),
                )
            };

        // the products below are invariant to the sign of the normal
        let normal = perp_2d(&new_sp.dx_dxi);

        let primary_neighbors = self
            .nodes_to_primary_elem_map
            .get(&primary_node)
            .cloned()
            .unwrap_or_default();
        if primary_neighbors.is_empty() || primary_neighbors.len() > 2 {
            return Err(MortarError::PrimaryNeighborCount {
                node: primary_node,
                count: primary_neighbors.len(),
            });
        }

        let mut secondary_sides = [0.0; 2];
        for (i, side) in secondary_sides.iter_mut().enumerate() {
            *side = cross_z(&normal, &(secondary_points[i] - new_point));
        }

        let mut primary_sides: SmallVec<[f64; 2]> = SmallVec::new();
        for neighbor_id in primary_neighbors.iter() {
            let neighbor = mesh.elem(*neighbor_id)?;
            let opposite = if neighbor.nodes[0] == primary_node {
                neighbor.nodes[1]
            } else {
                neighbor.nodes[0]
            };
            primary_sides.push(cross_z(&normal, &(mesh.point(opposite)? - new_point)));
        }

        let [s0, s1] = secondary_sides;
        let (orientation1, orientation2) = if primary_sides.len() == 2 {
            let (m0, m1) = (primary_sides[0], primary_sides[1]);
            (s0 * m0 > 0.0 && s1 * m1 > 0.0, s0 * m1 > 0.0 && s1 * m0 > 0.0)
        } else {
            (s0 * primary_sides[0] > 0.0, s1 * primary_sides[0] > 0.0)
        };

        match (orientation1, orientation2) {
            (true, true) => {
                return Err(MortarError::BothOrientationsValid {
                    node: primary_node,
                    secondary_elem: secondary_elem_id,
                })
            }
            (false, false) => {
                return Err(MortarError::NoOrientationValid {
                    node: primary_node,
                    secondary_elem: secondary_elem_id,
                })
            }
            _ => {}
        }

        let mut left_primary = primary_neighbors.first().copied();
        let mut right_primary = primary_neighbors.get(1).copied();
        if orientation2 {
            std::mem::swap(&mut left_primary, &mut right_primary);
        }

        let primary_xi = |primary_elem: Option<usize>| -> Result<f64, MortarError> {
            match primary_elem {
                Some(elem_id) => Ok(if mesh.elem(elem_id)?.nodes[0] == primary_node {
                    -1.0
                } else {
                    1.0
                }),
                None => Ok(MortarSegmentInfo::INVALID_XI),
            }
        };

        let left_info = MortarSegmentInfo {
            xi1_a: current_info.xi1_a,
            xi1_b: xi1,
            xi2_a: current_info.xi2_a,
            xi2_b: primary_xi(left_primary)?,
            secondary_elem: secondary_elem_id,
            primary_elem: left_primary,
            sub_elem: 0,
        };
        let right_info = MortarSegmentInfo {
            xi1_a: xi1,
            xi1_b: current_info.xi1_b,
            xi2_a: primary_xi(right_primary)?,
            xi2_b: current_info.xi2_b,
            secondary_elem: secondary_elem_id,
            primary_elem: right_primary,
            sub_elem: 0,
        };

        let left = self.mortar_segment_mesh.add_elem(&left_nodes);
        let right = self.mortar_segment_mesh.add_elem(&right_nodes);
        self.mortar_segment_mesh.delete_elem(current);
        self.msm_elem_to_info.remove(&current);
        self.msm_elem_to_info.insert(left, left_info);
        self.msm_elem_to_info.insert(right, right_info);

        let segments = self
            .secondary_elems_to_mortar_segments
            .entry(secondary_elem_id)
            .or_default();
        segments.remove(&current);
        segments.insert(left);
        segments.insert(right);

        Ok(())
    }

    /// Couple the elements on either side of each segment (for sparsity pattern augmentation)
    fn build_mortar_interface_coupling(&mut self, mesh: &Mesh) -> Result<(), MortarError> {
        let mut coupling: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        let mut couple = |a: usize, b: usize| {
            coupling.entry(a).or_default().insert(b);
            coupling.entry(b).or_default().insert(a);
        };

        for info in self.msm_elem_to_info.values() {
            let secondary = mesh.elem(info.secondary_elem)?;
            let secondary_ip = secondary
                .interior_parent()
                .ok_or(MortarError::MissingInteriorParent(secondary.id))?;
            couple(secondary_ip, secondary.id);

            if let Some(primary_id) = info.primary_elem {
                let primary_ip = mesh
                    .elem(primary_id)?
                    .interior_parent()
                    .ok_or(MortarError::MissingInteriorParent(primary_id))?;
                couple(secondary.id, primary_id);
                couple(secondary_ip, primary_ip);
            }
        }

        self.mortar_interface_coupling = coupling;
        Ok(())
    }

    // ----------------------------------------------------------------------------------------------------
    // Inactive (dropped) lagrange multiplier dofs
    // ----------------------------------------------------------------------------------------------------

    fn has_covered_segment(&self, secondary_elem_id: usize) -> bool {
        self.secondary_elems_to_mortar_segments
            .get(&secondary_elem_id)
            .map_or(false, |segments| {
                segments.iter().any(|segment| {
                    self.msm_elem_to_info
                        .get(segment)
                        .map_or(false, |info| info.has_primary())
                })
            })
    }

    fn is_fully_covered(&self, secondary_elem_id: usize) -> bool {
        if self.dim == 3 {
            return self
                .secondary_elem_coverage
                .get(&secondary_elem_id)
                .map_or(false, |coverage| *coverage >= 1.0 - self.config.xi_tolerance);
        }

        self.secondary_elems_to_mortar_segments
            .get(&secondary_elem_id)
            .map_or(false, |segments| {
                !segments.is_empty()
                    && segments.iter().all(|segment| {
                        self.msm_elem_to_info
                            .get(segment)
                            .map_or(false, |info| info.has_primary())
                    })
            })
    }

    /// Mark the secondary nodes which are not supported by any segment with a primary element
    pub fn compute_inactive_lm_nodes(&mut self, mesh: &Mesh) -> Result<(), MortarError> {
        let mut active = BTreeSet::new();
        for elem_id in self.secondary_elems.iter() {
            if self.has_covered_segment(*elem_id) {
                active.extend(mesh.elem(*elem_id)?.nodes.iter().copied());
            }
        }

        self.inactive_local_lm_nodes = self
            .nodes_to_secondary_elem_map
            .keys()
            .filter(|node_id| !active.contains(*node_id))
            .copied()
            .collect();

        Ok(())
    }

    /// Mark every node of a secondary element which is not fully covered by the primary surface
    pub fn compute_incorrect_edge_dropping_inactive_lm_nodes(
        &mut self,
        mesh: &Mesh,
    ) -> Result<(), MortarError> {
        let mut inactive = BTreeSet::new();
        for elem_id in self.secondary_elems.iter() {
            if !self.is_fully_covered(*elem_id) {
                inactive.extend(mesh.elem(*elem_id)?.nodes.iter().copied());
            }
        }

        self.inactive_local_lm_nodes = inactive;
        Ok(())
    }

    /// Mark the secondary elements whose nodes are all inactive
    pub fn compute_inactive_lm_elems(&mut self, mesh: &Mesh) -> Result<(), MortarError> {
        let mut inactive = BTreeSet::new();
        for elem_id in self.secondary_elems.iter() {
            let elem = mesh.elem(*elem_id)?;
            if elem
                .nodes
                .iter()
                .all(|node_id| self.inactive_local_lm_nodes.contains(node_id))
            {
                inactive.insert(*elem_id);
            }
        }

        self.inactive_local_lm_elems = inactive;
        Ok(())
    }

    // ----------------------------------------------------------------------------------------------------
    // Data Retrieval
    // ----------------------------------------------------------------------------------------------------

    pub fn config(&self) -> &MortarConfig {
        &self.config
    }

    pub fn interface(&self) -> &MortarInterface {
        &self.interface
    }

    /// The `(primary, secondary)` boundary ids
    pub fn primary_secondary_boundary_id_pair(&self) -> (BoundaryId, BoundaryId) {
        (
            self.interface.primary_boundary,
            self.interface.secondary_boundary,
        )
    }

    /// Dimension of the mesh the segments were built on
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn secondary_elems(&self) -> &BTreeSet<usize> {
        &self.secondary_elems
    }

    pub fn primary_elems(&self) -> &BTreeSet<usize> {
        &self.primary_elems
    }

    pub fn nodes_to_secondary_elem_map(&self) -> &NodeElemMap {
        &self.nodes_to_secondary_elem_map
    }

    pub fn nodes_to_primary_elem_map(&self) -> &NodeElemMap {
        &self.nodes_to_primary_elem_map
    }

    pub fn mortar_segment_mesh(&self) -> &MortarSegmentMesh {
        &self.mortar_segment_mesh
    }

    pub fn msm_elem_to_info(&self) -> &BTreeMap<usize, MortarSegmentInfo> {
        &self.msm_elem_to_info
    }

    pub fn segment_info(&self, segment: usize) -> Result<&MortarSegmentInfo, MortarError> {
        self.msm_elem_to_info
            .get(&segment)
            .ok_or(MortarError::MissingInfo(segment))
    }

    pub fn secondary_elems_to_mortar_segments(&self) -> &BTreeMap<usize, BTreeSet<usize>> {
        &self.secondary_elems_to_mortar_segments
    }

    /// The segments on each secondary element which contains a node
    pub fn secondaries_to_mortar_segments(&self, node_id: usize) -> Vec<(usize, &BTreeSet<usize>)> {
        self.nodes_to_secondary_elem_map
            .get(&node_id)
            .into_iter()
            .flatten()
            .filter_map(|elem_id| {
                self.secondary_elems_to_mortar_segments
                    .get(elem_id)
                    .map(|segments| (*elem_id, segments))
            })
            .collect()
    }

    pub fn secondary_node_projection(&self, node_id: usize, secondary_elem: usize) -> Projection {
        match self
            .secondary_node_and_elem_to_xi2_primary_elem
            .get(&(node_id, secondary_elem))
        {
            Some((xi, elem)) => Projection::Projected { xi: *xi, elem: *elem },
            None => Projection::NotProjected,
        }
    }

    pub fn primary_node_projection(&self, node_id: usize, primary_elem: usize) -> Projection {
        match self
            .primary_node_and_elem_to_xi1_secondary_elem
            .get(&(node_id, primary_elem))
        {
            Some((xi, Some(elem))) => Projection::Projected { xi: *xi, elem: *elem },
            _ => Projection::NotProjected,
        }
    }

    /// Where a secondary node lands on the primary surface of a 3D interface
    ///
    /// The surface projections are kept for inspection only; the 3D segments are built by clipping the elements directly.
    pub fn secondary_node_surface_projection(
        &self,
        node_id: usize,
        secondary_elem: usize,
    ) -> Projection<RefPoint> {
        match self
            .secondary_node_and_elem_to_surface_xi2
            .get(&(node_id, secondary_elem))
        {
            Some((xi, elem)) => Projection::Projected { xi: *xi, elem: *elem },
            None => Projection::NotProjected,
        }
    }

    /// Where a primary node lands on the secondary surface of a 3D interface (for inspection only, like [Self::secondary_node_surface_projection])
    pub fn primary_node_surface_projection(
        &self,
        node_id: usize,
        primary_elem: usize,
    ) -> Projection<RefPoint> {
        match self
            .primary_node_and_elem_to_surface_xi1
            .get(&(node_id, primary_elem))
        {
            Some((xi, elem)) => Projection::Projected { xi: *xi, elem: *elem },
            None => Projection::NotProjected,
        }
    }

    pub fn nodal_normal(&self, node_id: usize) -> Option<&Vector> {
        self.secondary_node_to_nodal_normal.get(&node_id)
    }

    pub fn nodal_tangents(&self, node_id: usize) -> Option<&[Vector; 2]> {
        self.secondary_node_to_hh_nodal_tangents.get(&node_id)
    }

    pub fn secondary_node_to_nodal_normal(&self) -> &BTreeMap<usize, Vector> {
        &self.secondary_node_to_nodal_normal
    }

    pub fn mortar_interface_coupling(&self) -> &BTreeMap<usize, BTreeSet<usize>> {
        &self.mortar_interface_coupling
    }

    pub fn inactive_local_lm_nodes(&self) -> &BTreeSet<usize> {
        &self.inactive_local_lm_nodes
    }

    pub fn inactive_local_lm_elems(&self) -> &BTreeSet<usize> {
        &self.inactive_local_lm_elems
    }

    /// Write the nodal normals and tangents to a JSON file
    #[cfg(feature = "json_export")]
    pub fn write_nodal_geometry_to_file(&self, path: impl AsRef<str>) -> Result<(), MortarError> {
        if self.secondary_node_to_nodal_normal.is_empty() {
            return Err(MortarError::NoNodalGeometry);
        }

        let vec_json = |v: &Vector| array![v.x, v.y, v.z];
        let nodes: Vec<JsonValue> = self
            .secondary_node_to_nodal_normal
            .iter()
            .map(|(node_id, normal)| {
                let mut node_obj = object! {
                    "node": *node_id,
                    "normal": vec_json(normal),
                };
                if let Some([t1, t2]) = self.secondary_node_to_hh_nodal_tangents.get(node_id) {
                    node_obj["tangents"] = array![vec_json(t1), vec_json(t2)];
                }
                node_obj
            })
            .collect();

        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);
        JsonValue::from(nodes).write_pretty(&mut w, 4)?;

        Ok(())
    }
}

// the corner nodes of a set of elements, in ascending order
fn vertex_nodes(mesh: &Mesh, elems: &BTreeSet<usize>) -> Result<Vec<usize>, MortarError> {
    let mut vertices = BTreeSet::new();
    for elem_id in elems.iter() {
        vertices.extend(mesh.elem(*elem_id)?.vertices().iter().copied());
    }
    Ok(vertices.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::elem::ElemType;
    use crate::mortar::test_meshes::{
        generate, interface, interface_mesh, PRIMARY_BOUNDARY, PRIMARY_SUBDOMAIN, SECONDARY_BOUNDARY,
        SECONDARY_SUBDOMAIN,
    };

    /// segment intervals on each secondary elem sorted by xi1_a
    fn sorted_intervals(amg: &AutomaticMortarGeneration, secondary_elem: usize) -> Vec<MortarSegmentInfo> {
        let mut infos: Vec<MortarSegmentInfo> = amg.secondary_elems_to_mortar_segments()[&secondary_elem]
            .iter()
            .map(|segment| *amg.segment_info(*segment).unwrap())
            .collect();
        infos.sort_by(|a, b| a.xi1_a.total_cmp(&b.xi1_a));
        infos
    }

    fn assert_tiling(amg: &AutomaticMortarGeneration) {
        for secondary_elem in amg.secondary_elems().iter() {
            let infos = sorted_intervals(amg, *secondary_elem);
            assert!((infos[0].xi1_a + 1.0).abs() < 1e-6);
            assert!((infos[infos.len() - 1].xi1_b - 1.0).abs() < 1e-6);
            for pair in infos.windows(2) {
                assert!((pair[0].xi1_b - pair[1].xi1_a).abs() < 1e-6);
            }
            assert!(infos.iter().all(|info| info.is_valid()));
        }
    }

    #[test]
    fn two_element_flat_interface() {
        let mut mesh = Mesh::from_file("./test_input/two_squares.json").unwrap();
        mesh.build_lower_d_elems(SECONDARY_BOUNDARY, SECONDARY_SUBDOMAIN).unwrap();
        mesh.build_lower_d_elems(PRIMARY_BOUNDARY, PRIMARY_SUBDOMAIN).unwrap();
        mesh.prepare_for_use().unwrap();

        let amg = generate(&mesh, MortarConfig::default());

        assert_eq!(amg.mortar_segment_mesh().n_elems(), 1);
        let info = amg.msm_elem_to_info().values().next().unwrap();
        assert_eq!(info.xi1_a, -1.0);
        assert_eq!(info.xi1_b, 1.0);
        assert_eq!(info.xi2_a, 1.0);
        assert_eq!(info.xi2_b, -1.0);
        assert_eq!(info.secondary_elem, 2);
        assert_eq!(info.primary_elem, Some(3));

        assert!(amg.inactive_local_lm_nodes().is_empty());
        assert!(amg.inactive_local_lm_elems().is_empty());

        // interior parents, lower-d elems, and both sides are coupled
        let coupling = amg.mortar_interface_coupling();
        assert!(coupling[&0].contains(&2));
        assert!(coupling[&0].contains(&1));
        assert!(coupling[&2].contains(&3));

        assert_eq!(
            amg.secondary_node_projection(2, 2),
            Projection::Projected { xi: 1.0, elem: 3 }
        );
        assert_eq!(amg.primary_node_projection(4, 3).elem(), Some(2));
    }

    #[test]
    fn non_matching_interface_tiles_secondary_elems() {
        let mesh = interface_mesh(&[0.0, 0.4, 1.0, 1.7, 2.0], &[0.0, 0.75, 1.3, 2.0], 0.0);
        let amg = generate(&mesh, MortarConfig::default());

        assert_tiling(&amg);
        // every interior primary node splits one segment
        assert_eq!(amg.mortar_segment_mesh().n_elems(), 4 + 2);
        assert!(amg.msm_elem_to_info().values().all(|info| info.has_primary()));
        assert!(amg.inactive_local_lm_nodes().is_empty());

        // the segment lengths sum to the interface length
        let total: f64 = amg
            .mortar_segment_mesh()
            .elems()
            .map(|segment| amg.mortar_segment_mesh().measure(segment.id).unwrap())
            .sum();
        assert!((total - 2.0).abs() < 1e-12);
    }

    #[test]
    fn primary_interval_matches_geometry() {
        let mesh = interface_mesh(&[0.0, 1.0], &[-0.5, 0.5, 1.5], 0.1);
        let amg = generate(&mesh, MortarConfig::default());
        assert_tiling(&amg);

        let secondary_elem = *amg.secondary_elems().iter().next().unwrap();
        let secondary_points = mesh.elem_points(secondary_elem).unwrap();
        for info in amg.msm_elem_to_info().values() {
            let primary_elem = info.primary_elem.unwrap();
            let primary_points = mesh.elem_points(primary_elem).unwrap();
            for (xi1, xi2) in [(info.xi1_a, info.xi2_a), (info.xi1_b, info.xi2_b)] {
                let x1 = map_to_physical(ElemType::Edge2, &secondary_points, [xi1, 0.0]).unwrap().x;
                let x2 = map_to_physical(ElemType::Edge2, &primary_points, [xi2, 0.0]).unwrap().x;
                assert!((x1.x - x2.x).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn edge_dropping_toggle() {
        let mesh = interface_mesh(&[0.0, 1.0, 2.0], &[0.0, 1.5], 0.0);

        let correct = generate(
            &mesh,
            MortarConfig {
                correct_edge_dropping: true,
                ..Default::default()
            },
        );
        let incorrect = generate(&mesh, MortarConfig::default());

        assert_tiling(&correct);
        let uncovered: Vec<&MortarSegmentInfo> = correct
            .msm_elem_to_info()
            .values()
            .filter(|info| !info.has_primary())
            .collect();
        assert_eq!(uncovered.len(), 1);

        // the uncovered segment's nodes are claimed by a covered segment on the same elem
        assert!(correct.inactive_local_lm_nodes().is_empty());
        assert_eq!(incorrect.inactive_local_lm_nodes().len(), 2);
        assert!(correct
            .inactive_local_lm_nodes()
            .is_subset(incorrect.inactive_local_lm_nodes()));
        assert_eq!(incorrect.inactive_local_lm_elems().len(), 1);
        assert!(correct.inactive_local_lm_elems().is_empty());
    }

    #[test]
    fn uncovered_elem_is_dropped() {
        let mesh = interface_mesh(&[0.0, 1.0, 2.0, 3.0], &[0.0, 1.5], 0.0);
        let amg = generate(
            &mesh,
            MortarConfig {
                correct_edge_dropping: true,
                ..Default::default()
            },
        );

        // only the node at x = 3 is unsupported by a covered segment
        let inactive: Vec<Point> = amg
            .inactive_local_lm_nodes()
            .iter()
            .map(|node_id| *mesh.point(*node_id).unwrap())
            .collect();
        assert_eq!(inactive.len(), 1);
        assert!((inactive[0].x - 3.0).abs() < 1e-14);
        assert!(amg.inactive_local_lm_elems().is_empty());

        let node_at_two = mesh
            .nodes
            .iter()
            .find(|node| (node.coords - Point::new(2.0, 1.0, 0.0)).norm() < 1e-14)
            .unwrap()
            .id;
        assert_eq!(amg.secondaries_to_mortar_segments(node_at_two).len(), 2);
        assert!(!amg
            .secondary_node_projection(node_at_two, amg.nodes_to_secondary_elem_map()[&node_at_two][0])
            .is_projected());
    }

    #[test]
    fn second_order_segments() {
        let mut mesh = Mesh::blank();
        let lower: Vec<usize> = [
            (0.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (0.0, 1.0),
            (1.0, 0.0),
            (2.0, 0.5),
            (1.0, 1.0),
            (0.0, 0.5),
            (1.0, 0.5),
        ]
        .iter()
        .map(|(x, y)| mesh.add_node(Point::new(*x, *y, 0.0)))
        .collect();
        let secondary_parent = mesh.add_elem(ElemType::Quad9, &lower, 1).unwrap();
        mesh.add_side_boundary(secondary_parent, 2, SECONDARY_BOUNDARY).unwrap();
        let bottom: Vec<usize> = [0.0, 0.5, 2.0].iter().map(|x| mesh.add_node(Point::new(*x, 1.0, 0.0))).collect();
        let top: Vec<usize> = [0.0, 0.5, 2.0].iter().map(|x| mesh.add_node(Point::new(*x, 2.0, 0.0))).collect();
        for i in 0..2 {
            let elem = mesh
                .add_elem(ElemType::Quad4, &[bottom[i], bottom[i + 1], top[i + 1], top[i]], 2)
                .unwrap();
            mesh.add_side_boundary(elem, 0, PRIMARY_BOUNDARY).unwrap();
        }
        mesh.build_lower_d_elems(SECONDARY_BOUNDARY, SECONDARY_SUBDOMAIN).unwrap();
        mesh.build_lower_d_elems(PRIMARY_BOUNDARY, PRIMARY_SUBDOMAIN).unwrap();
        mesh.prepare_for_use().unwrap();

        let amg = generate(&mesh, MortarConfig::default());
        assert_tiling(&amg);
        assert_eq!(amg.mortar_segment_mesh().n_elems(), 2);

        // the interior node of each segment lies at the middle of its xi1 interval
        for segment in amg.mortar_segment_mesh().elems() {
            assert_eq!(segment.nodes.len(), 3);
            let points = amg.mortar_segment_mesh().elem_points(segment.id).unwrap();
            let mid_x = 0.5 * (points[0].x + points[1].x);
            assert!((points[2].x - mid_x).abs() < 1e-12);
        }
    }

    #[test]
    fn opposing_secondary_normals() {
        // the top of one secondary quad meets the bottom of another at Node 2
        let mut mesh = Mesh::blank();
        let a: Vec<usize> = [[0.0, -1.0], [1.0, -1.0], [1.0, 0.0], [0.0, 0.0]]
            .iter()
            .map(|[x, y]| mesh.add_node(Point::new(*x, *y, 0.0)))
            .collect();
        let b: Vec<usize> = [[2.0, 0.0], [2.0, 1.0], [1.0, 1.0]]
            .iter()
            .map(|[x, y]| mesh.add_node(Point::new(*x, *y, 0.0)))
            .collect();
        let c: Vec<usize> = [[0.0, 2.0], [1.0, 2.0], [1.0, 3.0], [0.0, 3.0]]
            .iter()
            .map(|[x, y]| mesh.add_node(Point::new(*x, *y, 0.0)))
            .collect();

        let lower = mesh.add_elem(ElemType::Quad4, &a, 1).unwrap();
        let upper = mesh.add_elem(ElemType::Quad4, &[a[2], b[0], b[1], b[2]], 1).unwrap();
        let primary = mesh.add_elem(ElemType::Quad4, &c, 2).unwrap();
        mesh.add_side_boundary(lower, 2, SECONDARY_BOUNDARY).unwrap();
        mesh.add_side_boundary(upper, 0, SECONDARY_BOUNDARY).unwrap();
        mesh.add_side_boundary(primary, 0, PRIMARY_BOUNDARY).unwrap();
        mesh.build_lower_d_elems(SECONDARY_BOUNDARY, SECONDARY_SUBDOMAIN).unwrap();
        mesh.build_lower_d_elems(PRIMARY_BOUNDARY, PRIMARY_SUBDOMAIN).unwrap();
        mesh.prepare_for_use().unwrap();

        let mut amg = AutomaticMortarGeneration::new(interface(), MortarConfig::default()).unwrap();
        amg.build_node_to_elem_maps(&mesh).unwrap();
        assert!(matches!(
            amg.compute_nodal_geometry(&mesh),
            Err(MortarError::DegenerateNodalNormal(node)) if node == a[2]
        ));
        assert!(matches!(amg.update(&mesh), Err(MortarError::DegenerateNodalNormal(_))));
    }

    #[test]
    fn nodal_geometry() {
        let mesh = interface_mesh(&[0.0, 1.0, 2.0], &[0.0, 2.0], 0.0);
        let amg = generate(&mesh, MortarConfig::default());

        for normal in amg.secondary_node_to_nodal_normal().values() {
            assert!((normal - Vector::new(0.0, 1.0, 0.0)).norm() < 1e-14);
        }
        for (node_id, normal) in amg.secondary_node_to_nodal_normal().iter() {
            let [t1, t2] = amg.nodal_tangents(*node_id).unwrap();
            assert!(t1.dot(normal).abs() < 1e-10 && t2.dot(normal).abs() < 1e-10);
            assert!(t1.dot(t2).abs() < 1e-10);
        }

        let periodic = generate(
            &mesh,
            MortarConfig {
                periodic: true,
                ..Default::default()
            },
        );
        for normal in periodic.secondary_node_to_nodal_normal().values() {
            assert!((normal - Vector::new(0.0, -1.0, 0.0)).norm() < 1e-14);
        }
    }

    #[test]
    fn configuration_errors() {
        assert!(matches!(
            AutomaticMortarGeneration::from_boundary_pairs(
                &[(2, 1), (4, 3)],
                &[(20, 10)],
                MortarConfig::default()
            ),
            Err(MortarError::BoundaryPairCardinality(2))
        ));
        assert!(matches!(
            AutomaticMortarGeneration::from_boundary_pairs(&[(1, 1)], &[(20, 10)], MortarConfig::default()),
            Err(MortarError::InvalidParameter { name: "boundary", .. })
        ));
        assert!(AutomaticMortarGeneration::from_boundary_pairs(
            &[(PRIMARY_BOUNDARY, SECONDARY_BOUNDARY)],
            &[(PRIMARY_SUBDOMAIN, SECONDARY_SUBDOMAIN)],
            MortarConfig::default()
        )
        .is_ok());

        // no lower-dimensional elements were built
        let mut mesh = Mesh::from_file("./test_input/two_squares.json").unwrap();
        mesh.prepare_for_use().unwrap();
        let mut amg = AutomaticMortarGeneration::new(interface(), MortarConfig::default()).unwrap();
        assert!(matches!(
            amg.update(&mesh),
            Err(MortarError::EmptyBoundary { side: "secondary", .. })
        ));
    }

    #[test]
    fn clear_resets_everything() {
        let mesh = interface_mesh(&[0.0, 1.0], &[0.0, 1.0], 0.0);
        let mut amg = generate(&mesh, MortarConfig::default());
        assert_eq!(amg.mortar_segment_mesh().n_elems(), 1);

        amg.clear();
        assert_eq!(amg.mortar_segment_mesh().n_elems(), 0);
        assert!(amg.msm_elem_to_info().is_empty());
        assert!(amg.secondary_node_to_nodal_normal().is_empty());
        assert!(amg.nodes_to_secondary_elem_map().is_empty());
        assert!(amg.mortar_interface_coupling().is_empty());
    }

    #[cfg(feature = "json_export")]
    #[test]
    fn nodal_geometry_dump() {
        let amg = AutomaticMortarGeneration::new(interface(), MortarConfig::default()).unwrap();
        assert!(matches!(
            amg.write_nodal_geometry_to_file("./test_output/nodal_geometry_empty.json"),
            Err(MortarError::NoNodalGeometry)
        ));

        let mesh = interface_mesh(&[0.0, 1.0], &[0.0, 1.0], 0.0);
        let amg = generate(&mesh, MortarConfig::default());
        std::fs::create_dir_all("./test_output").unwrap();
        amg.write_nodal_geometry_to_file("./test_output/nodal_geometry.json")
            .unwrap();

        let dumped = json::parse(&std::fs::read_to_string("./test_output/nodal_geometry.json").unwrap()).unwrap();
        assert_eq!(dumped.members().count(), 2);
        assert_eq!(dumped[0]["tangents"].members().count(), 2);
    }
}
