/// Element types, side tables, and the [Elem](elem::Elem) structure
pub mod elem;
/// Cached per-element geometry
pub mod elem_info;
/// Cached per-face geometry and interpolation coefficients
pub mod face_info;
/// Mesh Nodes
pub mod node;
/// Lagrange shape functions on curve and surface elements
pub mod shape;
/// Points, Vectors, and tolerance based float comparison
pub mod space;

use elem::{Elem, ElemType};
use elem_info::{CoordSystem, ElemInfo};
use face_info::FaceInfo;
use node::Node;
use space::{Point, RefPoint, Vector};

use json::JsonValue;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::read_to_string;
use thiserror::Error;

#[cfg(feature = "json_export")]
use json::object;
#[cfg(feature = "json_export")]
use std::fs::File;
#[cfg(feature = "json_export")]
use std::io::BufWriter;

/// Identifier of a group of elements
pub type SubdomainId = u16;

/// Identifier of a group of element sides
pub type BoundaryId = i32;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("Elem {0} does not exist")]
    ElemNotFound(usize),
    #[error("Node {0} does not exist")]
    NodeNotFound(usize),
    #[error("{elem_type} Elem {elem} requires {} nodes; {found} were given", .elem_type.n_nodes())]
    NodeCount {
        elem: usize,
        elem_type: ElemType,
        found: usize,
    },
    #[error("Side {side} of Elem {elem} does not exist")]
    SideNotFound { elem: usize, side: usize },
    #[error("Lower-dimensional Elem {0} has no interior parent")]
    MissingInteriorParent(usize),
    #[error("Face info has not been built for Side {side} of Elem {elem}; call prepare_for_use first")]
    MissingFaceInfo { elem: usize, side: usize },
    #[error("Side {side} of Elem {elem} is shared by more than two elements")]
    NonManifoldFace { elem: usize, side: usize },
    #[error("Elem {0} is degenerate")]
    DegenerateElem(usize),
    #[error("Invalid mesh file: {0}")]
    Format(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Simple tracker for sequential ids
#[derive(Debug, Clone)]
pub(crate) struct IdTracker {
    next_id: usize,
}

impl IdTracker {
    pub fn new(start: usize) -> Self {
        Self { next_id: start }
    }

    pub fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id - 1
    }
}

/// A collection of [Node]s and [Elem]s of mixed dimension with side-sets and cached finite volume geometry.
///
/// Lower-dimensional elements (built with [Mesh::build_lower_d_elems]) live in the same element list as the elements whose sides they are
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub nodes: Vec<Node>,
    pub elems: Vec<Elem>,
    side_boundaries: BTreeMap<(usize, usize), BTreeSet<BoundaryId>>,
    coord_system: CoordSystem,
    elem_infos: BTreeMap<usize, ElemInfo>,
    face_infos: Vec<FaceInfo>,
    face_index: BTreeMap<(usize, usize), usize>,
}

impl Mesh {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn with_coord_system(coord_system: CoordSystem) -> Self {
        Self {
            coord_system,
            ..Self::default()
        }
    }

    /// Construct a Mesh from a JSON file with the following format
    ///
    /// ```json
    /// {
    ///     "Nodes": [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
    ///     "Elements": [{ "type": "QUAD4", "nodes": [0, 1, 2, 3], "subdomain": 1 }],
    ///     "Sidesets": [{ "elem": 0, "side": 2, "boundary": 10 }]
    /// }
    /// ```
    ///
    /// Nodes may have 2 or 3 coordinates. "Sidesets" and the "CoordSystem" ("XYZ", "RZ", "RSPHERICAL") are optional.
    pub fn from_file(path: impl AsRef<str>) -> Result<Self, MeshError> {
        let mesh_file_contents = read_to_string(path.as_ref())?;
        let mesh_file_json = json::parse(&mesh_file_contents)
            .map_err(|err| MeshError::Format(format!("Unable to parse Mesh File as JSON: {}", err)))?;
        Self::from_json(&mesh_file_json)
    }

    pub fn from_json(mesh_json: &JsonValue) -> Result<Self, MeshError> {
        let coord_system = match mesh_json["CoordSystem"].as_str() {
            None | Some("XYZ") => CoordSystem::Cartesian,
            Some("RZ") => CoordSystem::Rz,
            Some("RSPHERICAL") => CoordSystem::RSpherical,
            Some(other) => {
                return Err(MeshError::Format(format!("Unknown CoordSystem: {}", other)))
            }
        };
        let mut mesh = Self::with_coord_system(coord_system);

        if !mesh_json["Nodes"].is_array() {
            return Err(MeshError::Format("Nodes must be an Array!".to_string()));
        }
        for node_json in mesh_json["Nodes"].members() {
            mesh.add_node(parse_point(node_json)?);
        }

        if !mesh_json["Elements"].is_array() {
            return Err(MeshError::Format("Elements must be an Array!".to_string()));
        }
        for elem_json in mesh_json["Elements"].members() {
            let elem_type = elem_json["type"]
                .as_str()
                .and_then(ElemType::from_name)
                .ok_or_else(|| MeshError::Format("Elements must have a valid type!".to_string()))?;
            if !elem_json["nodes"].is_array() {
                return Err(MeshError::Format("Elements must have an Array of nodes!".to_string()));
            }
            let node_ids = elem_json["nodes"]
                .members()
                .map(|id_json| {
                    id_json.as_usize().ok_or_else(|| {
                        MeshError::Format("Element nodes must be positive integers!".to_string())
                    })
                })
                .collect::<Result<Vec<usize>, MeshError>>()?;
            let subdomain = elem_json["subdomain"].as_u16().unwrap_or(0);

            mesh.add_elem(elem_type, &node_ids, subdomain)?;
        }

        for side_json in mesh_json["Sidesets"].members() {
            match (
                side_json["elem"].as_usize(),
                side_json["side"].as_usize(),
                side_json["boundary"].as_i32(),
            ) {
                (Some(elem_id), Some(side), Some(boundary_id)) => {
                    mesh.add_side_boundary(elem_id, side, boundary_id)?
                }
                _ => {
                    return Err(MeshError::Format(
                        "Sidesets must have an elem, side, and boundary!".to_string(),
                    ))
                }
            }
        }

        Ok(mesh)
    }

    /// Print the mesh to a JSON file specified by path.
    #[cfg(feature = "json_export")]
    pub fn export_to_json(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);

        let sidesets: Vec<JsonValue> = self
            .side_boundaries
            .iter()
            .flat_map(|((elem_id, side), bids)| {
                bids.iter().map(move |bid| {
                    object! {
                        "elem": *elem_id,
                        "side": *side,
                        "boundary": *bid,
                    }
                })
            })
            .collect();

        let mesh_object = object! {
            "Nodes": JsonValue::from(self.nodes.iter().map(|node| node.to_json()).collect::<Vec<_>>()),
            "Elements": JsonValue::from(self.elems.iter().map(|elem| elem.to_json()).collect::<Vec<_>>()),
            "Sidesets": JsonValue::from(sidesets),
        };

        mesh_object.write_pretty(&mut w, 4)?;

        Ok(())
    }

    // ----------------------------------------------------------------------------------------------------
    // Construction
    // ----------------------------------------------------------------------------------------------------

    pub fn add_node(&mut self, coords: Point) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id, coords));
        id
    }

    pub fn add_elem(
        &mut self,
        elem_type: ElemType,
        nodes: &[usize],
        subdomain_id: SubdomainId,
    ) -> Result<usize, MeshError> {
        if let Some(bad_node) = nodes.iter().find(|n| **n >= self.nodes.len()) {
            return Err(MeshError::NodeNotFound(*bad_node));
        }
        let id = self.elems.len();
        self.elems.push(Elem::new(id, elem_type, nodes, subdomain_id)?);
        Ok(id)
    }

    /// Associate a side of an element with a boundary id
    pub fn add_side_boundary(
        &mut self,
        elem_id: usize,
        side: usize,
        boundary_id: BoundaryId,
    ) -> Result<(), MeshError> {
        let elem = self.elem(elem_id)?;
        if side >= elem.elem_type.n_sides() {
            return Err(MeshError::SideNotFound { elem: elem_id, side });
        }
        self.side_boundaries
            .entry((elem_id, side))
            .or_default()
            .insert(boundary_id);
        Ok(())
    }

    /// Build a lower-dimensional element on each side in a boundary.
    ///
    /// The new elements are placed in `subdomain_id` and remember the element/side they were built from.
    pub fn build_lower_d_elems(
        &mut self,
        boundary_id: BoundaryId,
        subdomain_id: SubdomainId,
    ) -> Result<Vec<usize>, MeshError> {
        let mut new_ids = Vec::new();

        for (elem_id, side) in self.sides_with_boundary(boundary_id) {
            let parent = self.elem(elem_id)?;
            let side_type = parent
                .elem_type
                .side_type()
                .ok_or(MeshError::SideNotFound { elem: elem_id, side })?;
            let side_nodes = parent
                .side_node_ids(side)
                .ok_or(MeshError::SideNotFound { elem: elem_id, side })?;

            let id = self.elems.len();
            self.elems.push(
                Elem::new(id, side_type, &side_nodes, subdomain_id)?.with_interior_parent(elem_id, side),
            );
            new_ids.push(id);
        }

        Ok(new_ids)
    }

    /// Build the cached [ElemInfo]s and [FaceInfo]s for all elements of the highest dimension
    pub fn prepare_for_use(&mut self) -> Result<(), MeshError> {
        let dim = self.mesh_dimension();
        let coord_system = self.coord_system;

        let volume_elems: Vec<&Elem> = self
            .elems
            .iter()
            .filter(|elem| elem.dim() == dim && elem.interior_parent().is_none())
            .collect();

        let elem_infos: BTreeMap<usize, ElemInfo> = volume_elems
            .par_iter()
            .map(|elem| -> Result<(usize, ElemInfo), MeshError> {
                let points = self.elem_points(elem.id)?;
                Ok((elem.id, ElemInfo::new(elem, &points, coord_system)))
            })
            .collect::<Result<_, MeshError>>()?;

        // {sorted side vertex ids => [(elem_id, side), ...]}
        let mut sides_by_vertices: BTreeMap<SmallVec<[usize; 4]>, SmallVec<[(usize, usize); 2]>> =
            BTreeMap::new();
        for elem in volume_elems.iter() {
            let side_type = match elem.elem_type.side_type() {
                Some(side_type) => side_type,
                None => continue,
            };
            for side in 0..elem.elem_type.n_sides() {
                let mut key = elem
                    .side_node_ids(side)
                    .ok_or(MeshError::SideNotFound { elem: elem.id, side })?;
                key.truncate(side_type.n_vertices());
                key.sort_unstable();

                let entry = sides_by_vertices.entry(key).or_default();
                if entry.len() == 2 {
                    return Err(MeshError::NonManifoldFace { elem: elem.id, side });
                }
                entry.push((elem.id, side));
            }
        }

        let mut face_pairs: Vec<SmallVec<[(usize, usize); 2]>> = sides_by_vertices.into_values().collect();
        face_pairs.sort_by_key(|pair| pair[0]);

        let face_infos = face_pairs
            .par_iter()
            .map(|pair| {
                let (elem_id, side) = pair[0];
                let (area, centroid, raw_normal) = self.side_geometry(elem_id, side)?;
                let elem_info = elem_infos.get(&elem_id).ok_or(MeshError::ElemNotFound(elem_id))?;
                let neighbor = match pair.get(1) {
                    Some((n_id, n_side)) => Some((
                        elem_infos.get(n_id).ok_or(MeshError::ElemNotFound(*n_id))?,
                        *n_side,
                    )),
                    None => None,
                };
                Ok(FaceInfo::new(elem_info, side, area, centroid, raw_normal, neighbor))
            })
            .collect::<Result<Vec<FaceInfo>, MeshError>>()?;

        let mut face_index = BTreeMap::new();
        let mut face_infos = face_infos;
        for (i, (face, pair)) in face_infos.iter_mut().zip(face_pairs.iter()).enumerate() {
            for elem_side in pair.iter() {
                face_index.insert(*elem_side, i);
                if let Some(bids) = self.side_boundaries.get(elem_side) {
                    bids.iter().for_each(|bid| face.add_boundary_id(*bid));
                }
            }
        }

        self.elem_infos = elem_infos;
        self.face_infos = face_infos;
        self.face_index = face_index;

        Ok(())
    }

    // ----------------------------------------------------------------------------------------------------
    // Data Retrieval
    // ----------------------------------------------------------------------------------------------------

    pub fn coord_system(&self) -> CoordSystem {
        self.coord_system
    }

    /// The highest dimension of any element in the mesh
    pub fn mesh_dimension(&self) -> usize {
        self.elems.iter().map(|elem| elem.dim()).max().unwrap_or(0)
    }

    pub fn elem(&self, elem_id: usize) -> Result<&Elem, MeshError> {
        self.elems.get(elem_id).ok_or(MeshError::ElemNotFound(elem_id))
    }

    pub fn point(&self, node_id: usize) -> Result<&Point, MeshError> {
        self.nodes
            .get(node_id)
            .map(|node| &node.coords)
            .ok_or(MeshError::NodeNotFound(node_id))
    }

    /// Get the [Point]s of an element's nodes in local node order
    pub fn elem_points(&self, elem_id: usize) -> Result<SmallVec<[Point; 9]>, MeshError> {
        self.elem(elem_id)?
            .nodes
            .iter()
            .map(|node_id| self.point(*node_id).copied())
            .collect()
    }

    pub fn elems_in_subdomain(&self, subdomain_id: SubdomainId) -> impl Iterator<Item = &Elem> + '_ {
        self.elems
            .iter()
            .filter(move |elem| elem.subdomain_id == subdomain_id)
    }

    /// All (elem, side) pairs in a boundary in ascending order
    pub fn sides_with_boundary(&self, boundary_id: BoundaryId) -> Vec<(usize, usize)> {
        self.side_boundaries
            .iter()
            .filter(|(_, bids)| bids.contains(&boundary_id))
            .map(|(elem_side, _)| *elem_side)
            .collect()
    }

    pub fn boundary_ids(&self, elem_id: usize, side: usize) -> impl Iterator<Item = &BoundaryId> + '_ {
        self.side_boundaries
            .get(&(elem_id, side))
            .into_iter()
            .flat_map(|bids| bids.iter())
    }

    pub fn elem_info(&self, elem_id: usize) -> Option<&ElemInfo> {
        self.elem_infos.get(&elem_id)
    }

    pub fn elem_info_mut(&mut self, elem_id: usize) -> Option<&mut ElemInfo> {
        self.elem_infos.get_mut(&elem_id)
    }

    pub fn face_infos(&self) -> &[FaceInfo] {
        &self.face_infos
    }

    /// Get the face on a side of an element (from either the elem or neighbor perspective)
    pub fn face_info(&self, elem_id: usize, side: usize) -> Option<&FaceInfo> {
        self.face_index
            .get(&(elem_id, side))
            .map(|face_idx| &self.face_infos[*face_idx])
    }

    /// Unit normal pointing out of the interior parent of a lower-dimensional element at a reference point
    pub fn lower_d_normal(&self, lower_elem_id: usize, xi: RefPoint) -> Result<Vector, MeshError> {
        let sign = self.lower_d_normal_sign(lower_elem_id)?;
        let elem = self.elem(lower_elem_id)?;
        let raw = shape::raw_normal(elem.elem_type, &self.elem_points(lower_elem_id)?, xi)
            .ok_or(MeshError::DegenerateElem(lower_elem_id))?;
        let norm = raw.norm();
        if norm == 0.0 {
            return Err(MeshError::DegenerateElem(lower_elem_id));
        }
        Ok(raw * (sign / norm))
    }

    /// +1 if the raw normal of a lower-dimensional element points out of its interior parent; -1 otherwise
    pub fn lower_d_normal_sign(&self, lower_elem_id: usize) -> Result<f64, MeshError> {
        let elem = self.elem(lower_elem_id)?;
        let (parent_id, side) = elem
            .interior_parent()
            .zip(elem.interior_parent_side())
            .ok_or(MeshError::MissingInteriorParent(lower_elem_id))?;
        let face = self
            .face_info(parent_id, side)
            .ok_or(MeshError::MissingFaceInfo { elem: parent_id, side })?;

        let raw = shape::raw_normal(
            elem.elem_type,
            &self.elem_points(lower_elem_id)?,
            elem.elem_type.reference_center(),
        )
        .ok_or(MeshError::DegenerateElem(lower_elem_id))?;

        // the face normal points away from the "elem" side; flip it when the parent is the neighbor
        let outward = if face.elem_id() == parent_id {
            *face.normal()
        } else {
            -face.normal()
        };

        Ok(if raw.dot(&outward) >= 0.0 { 1.0 } else { -1.0 })
    }

    // area, centroid and un-oriented normal of an element side
    fn side_geometry(&self, elem_id: usize, side: usize) -> Result<(f64, Point, Vector), MeshError> {
        let elem = self.elem(elem_id)?;
        let side_type = elem
            .elem_type
            .side_type()
            .ok_or(MeshError::SideNotFound { elem: elem_id, side })?;
        let side_points: SmallVec<[Point; 9]> = elem
            .side_node_ids(side)
            .ok_or(MeshError::SideNotFound { elem: elem_id, side })?
            .iter()
            .map(|node_id| self.nodes[*node_id].coords)
            .collect();

        let (area, centroid) = elem_info::volume_and_centroid(side_type, &side_points);
        let raw_normal = shape::raw_normal(side_type, &side_points, side_type.reference_center())
            .filter(|n| n.norm() > 0.0)
            .ok_or(MeshError::DegenerateElem(elem_id))?;

        Ok((
            area * self.coord_system.transform_factor(&centroid),
            centroid,
            raw_normal,
        ))
    }
}

fn parse_point(node_json: &JsonValue) -> Result<Point, MeshError> {
    let coords = node_json
        .members()
        .map(|c| {
            c.as_f64()
                .ok_or_else(|| MeshError::Format("Node coordinates must be numbers!".to_string()))
        })
        .collect::<Result<Vec<f64>, MeshError>>()?;

    match coords.as_slice() {
        [x, y] => Ok(Point::new(*x, *y, 0.0)),
        [x, y, z] => Ok(Point::new(*x, *y, *z)),
        _ => Err(MeshError::Format(
            "Nodes must have 2 or 3 coordinates!".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_mesh_file() {
        let mesh = Mesh::from_file("./test_input/two_squares.json").unwrap();
        assert_eq!(mesh.nodes.len(), 8);
        assert_eq!(mesh.elems.len(), 2);
        assert_eq!(mesh.mesh_dimension(), 2);
        assert_eq!(mesh.sides_with_boundary(1), vec![(0, 2)]);
        assert_eq!(mesh.sides_with_boundary(2), vec![(1, 0)]);
        assert_eq!(mesh.boundary_ids(1, 0).copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn bad_mesh_files() {
        assert!(matches!(
            Mesh::from_file("./test_input/does_not_exist.json"),
            Err(MeshError::Io(_))
        ));

        let bad_node = json::parse(r#"{"Nodes": [[0.0]], "Elements": []}"#).unwrap();
        assert!(matches!(Mesh::from_json(&bad_node), Err(MeshError::Format(_))));

        let bad_elem = json::parse(
            r#"{"Nodes": [[0.0, 0.0], [1.0, 0.0]], "Elements": [{"type": "QUAD4", "nodes": [0, 1]}]}"#,
        )
        .unwrap();
        assert!(matches!(
            Mesh::from_json(&bad_elem),
            Err(MeshError::NodeCount { found: 2, .. })
        ));
    }

    #[test]
    fn elem_points_lookup() {
        let mesh = Mesh::from_file("./test_input/two_squares.json").unwrap();
        let points = mesh.elem_points(1).unwrap();
        assert_eq!(points.len(), 4);
        assert!((points[0] - *mesh.point(mesh.elems[1].nodes[0]).unwrap()).norm() < 1e-14);

        assert!(matches!(mesh.elem_points(2), Err(MeshError::ElemNotFound(2))));
    }

    #[test]
    fn lower_d_elems() {
        let mut mesh = Mesh::from_file("./test_input/two_squares.json").unwrap();
        let secondary = mesh.build_lower_d_elems(1, 10).unwrap();
        let primary = mesh.build_lower_d_elems(2, 20).unwrap();
        mesh.prepare_for_use().unwrap();

        assert_eq!(secondary, vec![2]);
        assert_eq!(primary, vec![3]);
        assert_eq!(mesh.elems[2].nodes.as_slice(), &[2, 3]);
        assert_eq!(mesh.elems[2].elem_type, ElemType::Edge2);
        assert_eq!(mesh.elems[2].interior_parent(), Some(0));
        assert_eq!(mesh.elems_in_subdomain(20).count(), 1);

        // the top of the lower square points up, the bottom of the upper square points down
        let n_sec = mesh.lower_d_normal(2, [0.0, 0.0]).unwrap();
        let n_prim = mesh.lower_d_normal(3, [0.3, 0.0]).unwrap();
        assert!((n_sec - Vector::new(0.0, 1.0, 0.0)).norm() < 1e-14);
        assert!((n_prim - Vector::new(0.0, -1.0, 0.0)).norm() < 1e-14);
    }

    #[test]
    fn finite_volume_info() {
        let mut mesh = Mesh::blank();
        for j in 0..2 {
            for i in 0..3 {
                mesh.add_node(Point::new(i as f64, j as f64, 0.0));
            }
        }
        mesh.add_elem(ElemType::Quad4, &[0, 1, 4, 3], 0).unwrap();
        mesh.add_elem(ElemType::Quad4, &[1, 2, 5, 4], 0).unwrap();
        mesh.add_side_boundary(1, 1, 7).unwrap();
        assert!(mesh.add_side_boundary(1, 4, 7).is_err());
        mesh.prepare_for_use().unwrap();

        // 6 boundary sides + 1 shared side
        assert_eq!(mesh.face_infos().len(), 7);
        assert_eq!(mesh.face_infos().iter().filter(|f| f.is_boundary()).count(), 6);

        let shared = mesh.face_info(0, 1).unwrap();
        assert_eq!(shared.elem_id(), 0);
        assert_eq!(shared.neighbor_id(), Some(1));
        assert!(std::ptr::eq(shared, mesh.face_info(1, 3).unwrap()));
        assert!((shared.normal() - Vector::new(1.0, 0.0, 0.0)).norm() < 1e-14);
        assert!((shared.gc() - 0.5).abs() < 1e-14);

        let right = mesh.face_info(1, 1).unwrap();
        assert!(right.boundary_ids().contains(&7));
        assert!((mesh.elem_info(1).unwrap().volume() - 1.0).abs() < 1e-14);
    }
}
