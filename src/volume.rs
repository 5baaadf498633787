//! Dense volume I/O through `.npy` files.
//!
//! Atlas annotation volumes come in whatever integer type the exporting tool chose, so
//! [`read_labels`] accepts the common unsigned and signed widths and widens them to
//! [`StructureId`]. Masks are stored as boolean arrays.

use ndarray::{Array3, ArrayBase, Data, Ix3};
use ndarray_npy::{read_npy, write_npy, ReadNpyError, ReadableElement};
use snafu::ResultExt;
use std::path::Path;
use tracing::debug;

use crate::errors::volume::{ReadSnafu, VolumeError, WriteSnafu};
use crate::mask::RegionMask;
use crate::StructureId;

/// Read a 3-D array of element type `T`, or `None` if the file holds another type
fn try_read<T: ReadableElement>(path: &Path) -> Result<Option<Array3<T>>, VolumeError> {
    match read_npy::<_, Array3<T>>(path) {
        Ok(array) => Ok(Some(array)),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(source) => Err(source).context(ReadSnafu { path }),
    }
}

fn widen_signed(array: Array3<i64>, path: &Path) -> Result<Array3<StructureId>, VolumeError> {
    if let Some(&value) = array.iter().find(|&&v| v < 0) {
        return Err(VolumeError::NegativeLabel {
            path: path.to_path_buf(),
            value,
        });
    }
    if let Some(&value) = array.iter().find(|&&v| v > StructureId::MAX as i64) {
        return Err(VolumeError::LabelOverflow {
            path: path.to_path_buf(),
            value,
        });
    }
    Ok(array.mapv(|v| v as StructureId))
}

/// Read a labelled volume (or a hemisphere map) from a `.npy` file
pub fn read_labels<P: AsRef<Path>>(path: P) -> Result<Array3<StructureId>, VolumeError> {
    let path = path.as_ref();
    let labels = if let Some(array) = try_read::<u32>(path)? {
        array
    } else if let Some(array) = try_read::<u16>(path)? {
        array.mapv(StructureId::from)
    } else if let Some(array) = try_read::<u8>(path)? {
        array.mapv(StructureId::from)
    } else if let Some(array) = try_read::<i32>(path)? {
        widen_signed(array.mapv(i64::from), path)?
    } else if let Some(array) = try_read::<i16>(path)? {
        widen_signed(array.mapv(i64::from), path)?
    } else if let Some(array) = try_read::<i64>(path)? {
        widen_signed(array, path)?
    } else {
        return Err(VolumeError::UnsupportedDataType {
            path: path.to_path_buf(),
        });
    };
    debug!(path = %path.display(), shape = ?labels.shape(), "read labelled volume");
    Ok(labels)
}

/// Read a mask from a `.npy` file. Integer arrays are accepted with non-zero voxels
/// treated as `true`.
pub fn read_mask<P: AsRef<Path>>(path: P) -> Result<RegionMask, VolumeError> {
    let path = path.as_ref();
    match try_read::<bool>(path)? {
        Some(mask) => Ok(mask),
        None => Ok(read_labels(path)?.mapv(|v| v != 0)),
    }
}

pub fn write_mask<P, S>(path: P, mask: &ArrayBase<S, Ix3>) -> Result<(), VolumeError>
where
    P: AsRef<Path>,
    S: Data<Elem = bool>,
{
    let path = path.as_ref();
    write_npy(path, mask).context(WriteSnafu { path })
}
