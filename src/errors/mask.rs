use crate::errors::HierarchyError;
pub use snafu::Snafu;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
/// Errors that can occur when building, smoothing or splitting a region mask
pub enum MaskError {
    #[snafu(display("cannot build a region mask from an empty set of structure ids"))]
    EmptyIdSet,

    #[snafu(display("shape mismatch: expected {:?}, found {:?}", expected, found))]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[snafu(display("invalid smoothing parameters: sigma={}, threshold={}", sigma, threshold))]
    InvalidSmoothing { sigma: f64, threshold: f64 },

    #[snafu(display("left and right hemisphere share the value {}", value))]
    AmbiguousHemispheres { value: u32 },
}

impl MaskError {
    pub(crate) fn shape_mismatch(expected: &[usize], found: &[usize]) -> Self {
        MaskError::ShapeMismatch {
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
/// Errors from the composed hierarchy expansion + mask pipeline
pub enum RegionError {
    #[snafu(display("hierarchy error: {}", source))]
    Hierarchy { source: HierarchyError },

    #[snafu(display("mask error: {}", source))]
    Mask { source: MaskError },
}

impl From<HierarchyError> for RegionError {
    fn from(source: HierarchyError) -> Self {
        Self::Hierarchy { source }
    }
}

impl From<MaskError> for RegionError {
    fn from(source: MaskError) -> Self {
        Self::Mask { source }
    }
}
