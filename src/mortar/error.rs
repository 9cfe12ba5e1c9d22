use crate::mesh::{MeshError, SubdomainId};
use thiserror::Error;

/// Errors raised while generating or iterating over a mortar segment mesh
#[derive(Debug, Error)]
pub enum MortarError {
    // ----------------------------------------------------------------------------------------------------
    // configuration
    // ----------------------------------------------------------------------------------------------------
    #[error("No lower-dimensional {side} elements found in subdomain {subdomain}; the {side} boundary must not be empty")]
    EmptyBoundary {
        side: &'static str,
        subdomain: SubdomainId,
    },
    #[error("Exactly one primary/secondary boundary pair is supported; {0} were given")]
    BoundaryPairCardinality(usize),
    #[error("Invalid mortar parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("No nodal normal has been computed for secondary Node {0}")]
    MissingNodalNormal(usize),
    #[error("The element normals adjacent to secondary Node {0} cancel; its nodal normal is undefined")]
    DegenerateNodalNormal(usize),

    // ----------------------------------------------------------------------------------------------------
    // internal consistency
    // ----------------------------------------------------------------------------------------------------
    #[error("Lower-dimensional Elem {0} has no interior parent")]
    MissingInteriorParent(usize),
    #[error("Unable to find the mortar segment on secondary Elem {secondary_elem} containing xi1 = {xi1}")]
    SegmentNotFound { secondary_elem: usize, xi1: f64 },
    #[error("Primary Node {node} must have 1 or 2 lower-dimensional neighbors; found {count}")]
    PrimaryNeighborCount { node: usize, count: usize },
    #[error("Both orientations of primary Node {node} relative to secondary Elem {secondary_elem} are valid")]
    BothOrientationsValid { node: usize, secondary_elem: usize },
    #[error("Neither orientation of primary Node {node} relative to secondary Elem {secondary_elem} is valid")]
    NoOrientationValid { node: usize, secondary_elem: usize },
    #[error("Primary Node {node} is aligned with a node of secondary Elem {secondary_elem} and should already have been mapped")]
    UnmappedAlignedPrimaryNode { node: usize, secondary_elem: usize },
    #[error("Unable to match the primary and secondary neighbors of aligned secondary Node {0}")]
    UnmatchedAlignedNeighbors(usize),
    #[error("No mortar segment info exists for segment {0}")]
    MissingInfo(usize),
    #[error("No mortar materials registered for {side} subdomain {subdomain}")]
    MissingMaterials {
        side: &'static str,
        subdomain: SubdomainId,
    },
    #[error("Unable to map quadrature point {qp} of mortar segment {segment} onto Elem {elem}")]
    QuadratureMapping {
        segment: usize,
        qp: usize,
        elem: usize,
    },
    #[error("Mortar generation does not support {0}D meshes")]
    UnsupportedDimension(usize),

    // ----------------------------------------------------------------------------------------------------
    // materials
    // ----------------------------------------------------------------------------------------------------
    #[error("Mortar consumers cannot depend on stateful material `{0}`")]
    StatefulMaterial(String),
    #[error("Material `{0}` is part of a cyclic dependency")]
    CyclicMaterialDependency(String),
    #[error("Property `{property}` required by material `{material}` is not supplied on {location}")]
    UnsuppliedProperty {
        property: String,
        material: String,
        location: String,
    },

    #[error("No nodal geometry has been computed")]
    NoNodalGeometry,
    #[error("The assembly has not been reinitialized on a mortar segment")]
    NotReinitialized,
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
