/*!
    Topological cutting of quadrilateral meshes into physical fragments for XFEM-style discontinuities.

    The general workflow is as follows:
    * Register the mesh's quadrilaterals with [CutElemMesh::add_elements] and call [CutElemMesh::update_edge_neighbors]
    * Record where a crack crosses element edges with [CutElemMesh::add_edge_intersection]
    * Split cut elements into fragments with [CutElemMesh::update_physical_links_and_fragments]
    * Replace split elements with one child per fragment using [CutElemMesh::update_topology]
    * Call [CutElemMesh::clear_ancestry], [CutElemMesh::update_edge_neighbors] and [CutElemMesh::init_crack_tip_topology] before the next cut
*/

/// The cut mesh
pub mod cut_elem_mesh;
/// Edges and their intersections
pub mod edge;
/// Cut quadrilateral elements
pub mod element;
/// Physical fragments of elements
pub mod fragment;
/// Node handles
pub mod node;

pub use cut_elem_mesh::CutElemMesh;
pub use edge::CutEdge;
pub use element::{CutElement, FaceNode};
pub use fragment::Fragment;
pub use node::{CutNode, NodeCategory, NodeKey};

use thiserror::Error;

/// Errors raised while cutting a [CutElemMesh]
#[derive(Debug, Error)]
pub enum CutMeshError {
    #[error("Elem {0} does not exist in the cut mesh")]
    ElemNotFound(usize),
    #[error("Elem {0} already exists in the cut mesh")]
    DuplicateElem(usize),
    #[error("Cannot add an empty list of elements")]
    EmptyElementList,
    #[error("Elem {elem} does not have an edge {edge}")]
    InvalidEdge { elem: usize, edge: usize },
    #[error("Intersection at {position} on edge {edge} of Elem {elem} is incompatible with an existing intersection")]
    IncompatibleIntersection {
        elem: usize,
        edge: usize,
        position: f64,
    },
    #[error("Elem {neighbor} is not recognized as a neighbor of Elem {elem}")]
    NeighborMismatch { elem: usize, neighbor: usize },
    #[error("Elem {elem} has an unexpected number of fragments ({count})")]
    FragmentCount { elem: usize, count: usize },
    #[error("Invalid cut state in Elem {elem}: {reason}")]
    SanityCheck { elem: usize, reason: String },
    #[error("Unable to merge nodes {first} and {second}: {reason}")]
    MergeFailure {
        first: NodeKey,
        second: NodeKey,
        reason: &'static str,
    },
    #[error("Merged edge ({node_0}, {node_1}) is shared by {count} elements")]
    MergedEdgeCount {
        node_0: NodeKey,
        node_1: NodeKey,
        count: usize,
    },
    #[error("{0} temporary nodes remain after connecting fragments")]
    TempNodesRemain(usize),
    #[error("Node {0} does not exist in the cut mesh")]
    NodeNotFound(NodeKey),
    #[error("Not yet supported: {0}")]
    Unsupported(&'static str),
}
