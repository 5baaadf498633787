//! # Region masks
//!
//! Boolean masks built from a labelled atlas volume. A mask is always freshly allocated
//! and owned by the caller; the labelled volume is only ever borrowed.

use ndarray::{Array3, ArrayBase, ArrayView3, Data, Ix3, Zip};
use std::collections::HashSet;
use tracing::debug;

use crate::errors::{MaskError, RegionError};
use crate::hierarchy::StructureHierarchy;
use crate::traits::Transform;
use crate::StructureId;

pub mod smooth;
pub use smooth::*;

/// Voxel-wise region membership, same shape as the volume it was built from
pub type RegionMask = Array3<bool>;

/// Read-only view of a volume whose voxels hold structure ids
pub type LabelledVolume<'a> = ArrayView3<'a, StructureId>;

/// Read-only view of a volume whose voxels hold hemisphere codes
pub type HemisphereMap<'a> = ArrayView3<'a, u32>;

/// Select every voxel whose label is one of `ids`.
///
/// The result does not depend on the order of `ids` or on repeated entries. An empty
/// id set is rejected rather than producing an all-false mask.
pub fn mask_for_ids<I>(volume: LabelledVolume, ids: I) -> Result<RegionMask, MaskError>
where
    I: IntoIterator<Item = StructureId>,
{
    let ids = ids.into_iter().collect::<HashSet<_>>();
    if ids.is_empty() {
        return Err(MaskError::EmptyIdSet);
    }
    debug!(ids = ids.len(), shape = ?volume.shape(), "building region mask");
    Ok(Zip::from(&volume).par_map_collect(|label| ids.contains(label)))
}

/// Mask of `structure_id` and all of its descendants, optionally smoothed.
///
/// This is the mask that should be exported and counted: when smoothing is requested
/// the returned mask is the smoothed one.
pub fn build_region(
    volume: LabelledVolume,
    hierarchy: &StructureHierarchy,
    structure_id: StructureId,
    smoothing: Option<&Smoothing>,
) -> Result<RegionMask, RegionError> {
    let ids = hierarchy.descendants_of(structure_id, true)?;
    let mask = mask_for_ids(volume, ids)?;
    Ok(match smoothing {
        Some(smoothing) => smoothing.apply(mask),
        None => mask,
    })
}

/// Number of `true` voxels
pub fn count_voxels<S>(mask: &ArrayBase<S, Ix3>) -> usize
where
    S: Data<Elem = bool>,
{
    mask.iter().filter(|&&v| v).count()
}

/// Split a mask into its left and right hemisphere parts.
///
/// Voxels whose hemisphere code is neither `left_value` nor `right_value` belong to
/// neither part.
pub fn lateralise<S>(
    mask: &ArrayBase<S, Ix3>,
    hemispheres: HemisphereMap,
    left_value: u32,
    right_value: u32,
) -> Result<(RegionMask, RegionMask), MaskError>
where
    S: Data<Elem = bool>,
{
    if left_value == right_value {
        return Err(MaskError::AmbiguousHemispheres { value: left_value });
    }
    if mask.shape() != hemispheres.shape() {
        return Err(MaskError::shape_mismatch(mask.shape(), hemispheres.shape()));
    }
    let side = |value: u32| {
        Zip::from(mask)
            .and(&hemispheres)
            .par_map_collect(move |&m, &h| m && h == value)
    };
    Ok((side(left_value), side(right_value)))
}

/// Size and position of a non-empty mask, in voxel units
#[derive(Debug, Clone, PartialEq)]
pub struct RegionExtent {
    pub voxels: usize,
    /// Inclusive lower corner of the bounding box
    pub min: [usize; 3],
    /// Exclusive upper corner of the bounding box
    pub max: [usize; 3],
    /// Mean voxel index along each axis
    pub centroid: [f64; 3],
}

/// Bounding box and centroid of the `true` voxels, or `None` for an empty mask
pub fn region_extent<S>(mask: &ArrayBase<S, Ix3>) -> Option<RegionExtent>
where
    S: Data<Elem = bool>,
{
    let mut voxels = 0usize;
    let mut min = [usize::MAX; 3];
    let mut max = [0usize; 3];
    let mut sum = [0f64; 3];
    for ((i, j, k), _) in mask.indexed_iter().filter(|(_, &v)| v) {
        voxels += 1;
        for (axis, index) in [i, j, k].into_iter().enumerate() {
            min[axis] = min[axis].min(index);
            max[axis] = max[axis].max(index + 1);
            sum[axis] += index as f64;
        }
    }
    if voxels == 0 {
        return None;
    }
    Some(RegionExtent {
        voxels,
        min,
        max,
        centroid: sum.map(|s| s / voxels as f64),
    })
}
