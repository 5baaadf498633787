pub mod hierarchy;
pub mod mask;
pub mod table;
pub mod volume;

pub use hierarchy::HierarchyError;
pub use mask::{MaskError, RegionError};
pub use table::TableError;
pub use volume::VolumeError;
