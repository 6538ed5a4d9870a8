//! Data loading utilities

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Supported tabular file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Delimited text with the given separator
    Delimited(u8),
    /// Spreadsheet workbook (first sheet)
    Spreadsheet,
}

impl FileFormat {
    /// Detect the format from a path's extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" | "txt" => Ok(FileFormat::Delimited(b',')),
            "tsv" => Ok(FileFormat::Delimited(b'\t')),
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(FileFormat::Spreadsheet),
            "" => Err(PipelineError::Format(format!(
                "{} has no file extension",
                path.display()
            ))),
            other => Err(PipelineError::Format(format!(".{}", other))),
        }
    }
}

/// Data loader for delimited and spreadsheet files
pub struct DataLoader {
    /// Rows used for schema inference on delimited files
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(1000),
        }
    }

    /// Set the number of rows used for schema inference (`None` scans the whole file)
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a comma-separated file
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        self.load_delimited(path, b',')
    }

    /// Load a delimited text file with a header row
    pub fn load_delimited(&self, path: impl AsRef<Path>, separator: u8) -> Result<DataFrame> {
        let file = File::open(path.as_ref())?;

        let parse_opts = CsvParseOptions::default().with_separator(separator);

        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file);

        reader
            .finish()
            .map_err(|e| PipelineError::DataError(e.to_string()))
    }

    /// Load the first worksheet of a spreadsheet.
    ///
    /// The first row is the header. A column whose non-empty cells are all
    /// numeric becomes `Float64`, anything else becomes a string column.
    #[cfg(feature = "excel")]
    pub fn load_spreadsheet(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        use calamine::{open_workbook_auto, DataType as Cell, Reader};

        let path = path.as_ref();
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| PipelineError::DataError(format!("{} has no worksheets", path.display())))?
            .map_err(|e| PipelineError::DataError(e.to_string()))?;

        let mut rows = range.rows();
        let header: Vec<String> = match rows.next() {
            Some(row) => row.iter().map(|c| c.to_string()).collect(),
            None => return Ok(DataFrame::empty()),
        };
        let body: Vec<&[Cell]> = rows.collect();

        let columns = header
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let cells: Vec<Option<&Cell>> = body
                    .iter()
                    .map(|row| row.get(j).filter(|c| !matches!(c, Cell::Empty)))
                    .collect();

                let all_numeric = cells
                    .iter()
                    .flatten()
                    .all(|c| matches!(c, Cell::Int(_) | Cell::Float(_)));

                if all_numeric {
                    let values: Vec<Option<f64>> = cells
                        .iter()
                        .map(|c| match c {
                            Some(Cell::Int(i)) => Some(*i as f64),
                            Some(Cell::Float(f)) => Some(*f),
                            _ => None,
                        })
                        .collect();
                    Column::new(name.as_str().into(), values)
                } else {
                    let values: Vec<Option<String>> = cells
                        .iter()
                        .map(|c| c.map(|c| c.to_string()))
                        .collect();
                    Column::new(name.as_str().into(), values)
                }
            })
            .collect::<Vec<_>>();

        DataFrame::new(columns).map_err(|e| PipelineError::DataError(e.to_string()))
    }

    #[cfg(not(feature = "excel"))]
    pub fn load_spreadsheet(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        Err(PipelineError::Format(format!(
            "{} (spreadsheet support disabled, rebuild with the `excel` feature)",
            path.as_ref().display()
        )))
    }

    /// Detect file format from extension and load.
    ///
    /// Unknown extensions fail with [`PipelineError::Format`].
    pub fn load_auto(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)?;
        let start = Instant::now();

        debug!(path = %path.display(), ?format, "Loading dataset");
        let df = match format {
            FileFormat::Delimited(sep) => self.load_delimited(path, sep)?,
            FileFormat::Spreadsheet => self.load_spreadsheet(path)?,
        };

        info!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dataset loaded"
        );
        Ok(df)
    }
}

/// Data saver
pub struct DataSaver;

impl DataSaver {
    /// Save a frame to CSV
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path.as_ref())?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .map_err(|e| PipelineError::DataError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_file(suffix: &str, sep: char) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .unwrap();
        writeln!(file, "a{sep}b{sep}city").unwrap();
        writeln!(file, "1{sep}2.5{sep}Pune").unwrap();
        writeln!(file, "4{sep}{sep}Mumbai").unwrap();
        writeln!(file, "7{sep}8.0{sep}").unwrap();
        file
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_file(".csv", ',');
        let loader = DataLoader::new();

        let df = loader.load_auto(file.path()).unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("b").unwrap().null_count(), 1);
        assert_eq!(df.column("city").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_load_tsv() {
        let file = create_test_file(".tsv", '\t');
        let df = DataLoader::new().load_auto(file.path()).unwrap();

        assert_eq!(df.width(), 3);
        assert_eq!(df.get_column_names()[2].as_str(), "city");
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let err = DataLoader::new().load_auto(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Format(_)));
    }

    #[cfg(feature = "excel")]
    #[test]
    fn test_load_xlsx() {
        use rust_xlsxwriter::Workbook;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("houses.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (j, name) in ["area", "city", "price"].iter().enumerate() {
            sheet.write_string(0, j as u16, *name).unwrap();
        }
        let rows: [(Option<f64>, &str, f64); 4] = [
            (Some(50.0), "Pune", 100.0),
            (None, "Mumbai", 170.5),
            (Some(120.0), "Pune", 260.0),
            (Some(65.0), "Delhi", 130.0),
        ];
        for (i, (area, city, price)) in rows.iter().enumerate() {
            let r = i as u32 + 1;
            if let Some(area) = area {
                sheet.write_number(r, 0, *area).unwrap();
            }
            sheet.write_string(r, 1, *city).unwrap();
            sheet.write_number(r, 2, *price).unwrap();
        }
        workbook.save(&path).unwrap();

        let df = DataLoader::new().load_auto(&path).unwrap();
        assert_eq!(df.shape(), (4, 3));
        assert_eq!(df.column("area").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("city").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("price").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("area").unwrap().null_count(), 1);

        let prices: Vec<Option<f64>> = df.column("price").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(prices, vec![Some(100.0), Some(170.5), Some(260.0), Some(130.0)]);
        let cities: Vec<Option<&str>> = df.column("city").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(cities, vec![Some("Pune"), Some("Mumbai"), Some("Pune"), Some("Delhi")]);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_path(Path::new("x.CSV")).unwrap(), FileFormat::Delimited(b','));
        assert_eq!(FileFormat::from_path(Path::new("x.xlsx")).unwrap(), FileFormat::Spreadsheet);
        assert!(FileFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_save_csv() {
        let mut df = DataFrame::new(vec![
            Column::new("a".into(), &[1, 2, 3]),
            Column::new("b".into(), &[4, 5, 6]),
        ])
        .unwrap();

        let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        DataSaver::save_csv(&mut df, file.path()).unwrap();

        let loaded = DataLoader::new().load_csv(file.path()).unwrap();
        assert_eq!(loaded.height(), 3);
        assert_eq!(loaded.width(), 2);
    }
}
