/*!
    Automatic generation of mortar segment meshes between non-conforming lower-dimensional surfaces, and the machinery to evaluate constraints over them.

    The general workflow is as follows:
    * Build lower-dimensional elements on the primary and secondary boundaries of a [Mesh](crate::mesh::Mesh) and prepare it for use
    * Construct an [AutomaticMortarGeneration] from a [MortarInterface] and a [MortarConfig]
    * Call [AutomaticMortarGeneration::update] to build the mortar segment mesh
    * Resolve the materials required by the mortar consumers with [setup_mortar_materials](materials::setup_mortar_materials)
    * Integrate over the segments with [loop_over_mortar_segments](driver::loop_over_mortar_segments)
*/

/// Tunable parameters of the generation
pub mod config;
/// Mortar constraint consumers and their material dependencies
pub mod consumer;
/// The segment loop
pub mod driver;
/// Errors raised during generation and integration
pub mod error;
/// Mortar segment mesh generation
pub mod generation;
/// Materials required on the interface
pub mod materials;
/// Node projections and Newton solves on lower-dimensional elements
pub mod projection;
/// Per-segment geometric data
pub mod segment_info;
/// The mortar segment mesh
pub mod segment_mesh;

#[cfg(test)]
pub(crate) mod test_meshes;

pub use config::MortarConfig;
pub use error::MortarError;
pub use generation::{AutomaticMortarGeneration, MortarInterface};
pub use projection::Projection;
pub use segment_info::MortarSegmentInfo;
pub use segment_mesh::MortarSegmentMesh;
