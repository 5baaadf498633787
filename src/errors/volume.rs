use ndarray_npy::{ReadNpyError, WriteNpyError};
pub use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
/// Errors that can occur when reading or writing dense volumes
pub enum VolumeError {
    #[snafu(display("error reading volume {}: {}", path.display(), source))]
    ReadError {
        path: PathBuf,
        #[snafu(source(from(ReadNpyError, Box::new)))]
        source: Box<ReadNpyError>,
    },

    #[snafu(display("error writing volume {}: {}", path.display(), source))]
    WriteError {
        path: PathBuf,
        #[snafu(source(from(WriteNpyError, Box::new)))]
        source: Box<WriteNpyError>,
    },

    #[snafu(display("unsupported element type in {}", path.display()))]
    UnsupportedDataType { path: PathBuf },

    #[snafu(display("volume {} contains negative label {}", path.display(), value))]
    NegativeLabel { path: PathBuf, value: i64 },

    #[snafu(display("volume {} contains label {} which does not fit a structure id", path.display(), value))]
    LabelOverflow { path: PathBuf, value: i64 },
}
