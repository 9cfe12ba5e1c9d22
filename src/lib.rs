/// Meshes of curve, surface and volume elements with cached geometric data
pub mod mesh;
/// Mortar segment mesh generation and constraint integration on non-conforming interfaces
pub mod mortar;
/// Gauss quadrature rules on reference elements
pub mod quadrature;
/// Topological cutting of quadrilateral meshes
pub mod xfem;

pub use mesh::Mesh;
pub use mortar::{AutomaticMortarGeneration, MortarConfig, MortarInterface};
pub use xfem::CutElemMesh;
