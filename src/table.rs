use csv::{Reader as CsvReader, StringRecord, Writer as CsvWriter};
use snafu::ResultExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use crate::errors::table::{IOSnafu, TableError};
use crate::hierarchy::{AnnotatedRecord, StructureRecord};
use crate::StructureId;

const ID_COLUMN: &str = "id";
const NAME_COLUMN: &str = "name";
const ACRONYM_COLUMN: &str = "acronym";
const PARENT_COLUMNS: [&str; 2] = ["parent_id", "parent_structure_id"];
const PATH_COLUMN: &str = "structure_id_path";

/// Column positions of a structure table header
struct Columns {
    id: usize,
    parent: usize,
    name: usize,
    acronym: Option<usize>,
}

impl TryFrom<&StringRecord> for Columns {
    type Error = TableError;

    fn try_from(headers: &StringRecord) -> Result<Self, Self::Error> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        Ok(Self {
            id: find(ID_COLUMN).ok_or(TableError::MissingColumn { name: ID_COLUMN })?,
            parent: PARENT_COLUMNS
                .iter()
                .find_map(|&name| find(name))
                .ok_or(TableError::MissingColumn {
                    name: PARENT_COLUMNS[0],
                })?,
            name: find(NAME_COLUMN).ok_or(TableError::MissingColumn { name: NAME_COLUMN })?,
            acronym: find(ACRONYM_COLUMN),
        })
    }
}

/// Parse a structure id cell. Empty cells are `None`; integral floats such as `"8.0"`
/// are accepted since tables exported through pandas store nullable ids as floats.
fn parse_id(
    value: &str,
    row: usize,
    column: &'static str,
) -> Result<Option<StructureId>, TableError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let invalid = || TableError::InvalidValue {
        row,
        column,
        value: value.to_string(),
    };
    if let Ok(id) = value.parse::<StructureId>() {
        return Ok(Some(id));
    }
    let float = value.parse::<f64>().map_err(|_| invalid())?;
    if float.fract() != 0.0 || float < 0.0 || float > StructureId::MAX as f64 {
        return Err(invalid());
    }
    Ok(Some(float as StructureId))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Read structure records from CSV data with `id`, `parent_id` (or
/// `parent_structure_id`), `name` and optionally `acronym` columns. Rows with an
/// empty `id` are skipped.
pub fn read_structures<R: Read>(reader: R) -> Result<Vec<StructureRecord>, TableError> {
    let mut reader = CsvReader::from_reader(reader);
    let columns = Columns::try_from(reader.headers()?)?;

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let row = row + 1;
        let line = result?;
        let Some(id) = parse_id(line.get(columns.id).unwrap_or(""), row, ID_COLUMN)? else {
            continue;
        };
        let parent_id = parse_id(
            line.get(columns.parent).unwrap_or(""),
            row,
            PARENT_COLUMNS[0],
        )?;
        let name = line.get(columns.name).unwrap_or("").trim().to_string();
        let acronym = non_empty(columns.acronym.and_then(|i| line.get(i)));

        records.push(StructureRecord {
            id,
            parent_id,
            name,
            acronym,
        });
    }
    debug!(records = records.len(), "read structure table");
    Ok(records)
}

/// Read a structure table from a CSV file
pub fn read_structures_csv<P: AsRef<Path>>(path: P) -> Result<Vec<StructureRecord>, TableError> {
    let path = path.as_ref();
    let file = File::open(path).context(IOSnafu { path })?;
    read_structures(file)
}

/// Write records annotated with their hierarchy paths as CSV
pub fn write_annotated<W: Write>(writer: W, rows: &[AnnotatedRecord]) -> Result<(), TableError> {
    let mut writer = CsvWriter::from_writer(writer);
    writer.write_record([
        ID_COLUMN,
        PARENT_COLUMNS[0],
        NAME_COLUMN,
        ACRONYM_COLUMN,
        PATH_COLUMN,
    ])?;
    for row in rows {
        let record = &row.record;
        writer.write_record([
            record.id.to_string().as_str(),
            record
                .parent_id
                .map(|p| p.to_string())
                .unwrap_or_default()
                .as_str(),
            record.name.as_str(),
            record.acronym.as_deref().unwrap_or(""),
            row.structure_id_path.as_str(),
        ])?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write annotated records to a CSV file
pub fn write_annotated_csv<P: AsRef<Path>>(
    path: P,
    rows: &[AnnotatedRecord],
) -> Result<(), TableError> {
    let path = path.as_ref();
    let file = File::create(path).context(IOSnafu { path })?;
    write_annotated(file, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::StructureHierarchy;
    use rstest::rstest;
    use tempfile::TempDir;

    const ALLEN_CSV: &str = "\
id,name,acronym,parent_structure_id
997,root,root,
8,Basic cell groups and regions,grey,997
567,Cerebrum,CH,8
688,Cerebral cortex,CTX,567
";

    #[test]
    fn test_read_allen_columns() {
        let records = read_structures(ALLEN_CSV.as_bytes()).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(
            records[0],
            StructureRecord::new(997, None, "root").with_acronym("root")
        );
        assert_eq!(records[3].parent_id, Some(567));
        assert_eq!(records[3].acronym.as_deref(), Some("CTX"));
    }

    #[test]
    fn test_read_pandas_export() {
        // Float ids, a trailing blank id row, no acronym column
        let data = "id,parent_id,name\n1.0,,root\n2.0,1.0,A\n,,\n3,2.0,A1\n";
        let records = read_structures(data.as_bytes()).unwrap();
        assert_eq!(
            records,
            vec![
                StructureRecord::new(1, None, "root"),
                StructureRecord::new(2, Some(1), "A"),
                StructureRecord::new(3, Some(2), "A1"),
            ]
        );
    }

    #[rstest]
    #[case("parent_id,name\n1,a\n", "id")]
    #[case("id,name\n1,a\n", "parent_id")]
    #[case("id,parent_id\n1,\n", "name")]
    fn test_missing_column(#[case] data: &str, #[case] expected: &str) {
        match read_structures(data.as_bytes()) {
            Err(TableError::MissingColumn { name }) => assert_eq!(name, expected),
            other => panic!("expected missing column, got {:?}", other),
        }
    }

    #[rstest]
    #[case("id,parent_id,name\nabc,,root\n", 1, "id")]
    #[case("id,parent_id,name\n1,,root\n2,1.5,A\n", 2, "parent_id")]
    #[case("id,parent_id,name\n-4,,root\n", 1, "id")]
    fn test_invalid_value(
        #[case] data: &str,
        #[case] expected_row: usize,
        #[case] expected_column: &str,
    ) {
        match read_structures(data.as_bytes()) {
            Err(TableError::InvalidValue { row, column, .. }) => {
                assert_eq!(row, expected_row);
                assert_eq!(column, expected_column);
            }
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_write_annotated_csv() {
        let records = read_structures(ALLEN_CSV.as_bytes()).unwrap();
        let hierarchy = StructureHierarchy::load(records.clone(), 997).unwrap();
        let annotated = hierarchy.add_paths_to_table(&records).unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("structures_with_paths.csv");
        write_annotated_csv(&path, &annotated).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines = written.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "id,parent_id,name,acronym,structure_id_path");
        assert_eq!(lines[1], "997,,root,root,");
        assert_eq!(lines[4], "688,567,Cerebral cortex,CTX,997/8/567");

        // The annotated file is itself a valid structure table
        let reread = read_structures_csv(&path).unwrap();
        assert_eq!(reread, records);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = read_structures_csv(dir.path().join("missing.csv"));
        assert!(matches!(result, Err(TableError::IOError { .. })));
    }
}
