//! Structure hierarchy resolution and region mask construction for atlas-registered
//! brain volumes.
//!
//! A [`StructureHierarchy`] is built once from a flat `(id, parent_id, name)` table and
//! answers ancestor and descendant queries. The [`mask`] functions turn a labelled
//! volume plus a set of structure ids into a boolean region mask, optionally smoothed
//! slice by slice for surface extraction.

pub mod config;
pub mod errors;
pub mod hierarchy;
pub mod mask;
pub mod progress;
pub mod summary;
pub mod table;
pub mod traits;
pub mod volume;

/// Numeric id of an anatomical structure. Labelled volumes store these per voxel,
/// with `0` reserved for background.
pub type StructureId = u32;

pub use config::AtlasConfig;
pub use hierarchy::{AnnotatedRecord, HierarchyPath, StructureHierarchy, StructureRecord};
pub use mask::*;
pub use traits::Transform;
