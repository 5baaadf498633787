pub use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
/// Errors that can occur when reading or writing a structure table
pub enum TableError {
    #[snafu(display("IO error on structure table {}", path.display()))]
    IOError {
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
        path: PathBuf,
    },

    #[snafu(display("error reading CSV: {:?}", source))]
    CsvError {
        #[snafu(source(from(csv::Error, Box::new)))]
        source: Box<csv::Error>,
    },

    #[snafu(display("missing column '{}' in structure table", name))]
    MissingColumn { name: &'static str },

    #[snafu(display("row {}: invalid value '{}' in column '{}'", row, value, column))]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },
}

impl From<csv::Error> for TableError {
    fn from(source: csv::Error) -> Self {
        Self::CsvError {
            source: Box::new(source),
        }
    }
}
