// src/io.rs

use crate::error::NipalsError;
use crate::matrix::DataMatrix;
use log::{debug, info};
use std::io::Read;
use std::path::Path;

/// How to interpret a delimited table.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    pub delimiter: u8,
    /// Treat rows as variables and columns as observations, i.e. transpose the
    /// table after reading and swap the two label sets.
    pub transpose: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            transpose: false,
        }
    }
}

/// A data matrix together with its row and column labels.
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledData {
    /// One label per column of `matrix`.
    pub variables: Vec<String>,
    /// One label per row of `matrix`.
    pub observations: Vec<String>,
    pub matrix: DataMatrix,
}

/// Reads a table whose first row is `<descriptor>, <variable labels...>` and
/// whose remaining rows are `<observation label>, <values...>`.
///
/// Cells that do not parse as a number, including empty ones, become missing.
pub fn read_delimited<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<LabeledData, NipalsError> {
    let path = path.as_ref();
    info!("Reading delimited data from {:?}", path);
    let file = std::fs::File::open(path)?;
    read_delimited_from(file, options)
}

/// A literal "NaN" parses as a float but is treated as missing like any other
/// non-numeric cell.
fn parse_cell(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Same as [`read_delimited`] for any reader.
pub fn read_delimited_from<R: Read>(reader: R, options: &ReadOptions) -> Result<LabeledData, NipalsError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    // The first header cell describes the label column, not a variable.
    let variables: Vec<String> = headers.iter().skip(1).map(str::to_owned).collect();

    let mut observations = Vec::new();
    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let mut fields = record.iter();
        observations.push(fields.next().unwrap_or_default().to_owned());
        rows.push(fields.map(parse_cell).collect::<Vec<_>>());
    }

    let matrix = DataMatrix::from_rows(rows)?;
    if matrix.ncols() != variables.len() {
        return Err(NipalsError::RaggedRows {
            row: 0,
            expected: variables.len(),
            found: matrix.ncols(),
        });
    }
    debug!(
        "Parsed {} observations x {} variables with {} missing cells.",
        matrix.nrows(),
        matrix.ncols(),
        matrix.missing_count()
    );

    if options.transpose {
        return Ok(LabeledData {
            variables: observations,
            observations: variables,
            matrix: matrix.transposed(),
        });
    }
    Ok(LabeledData {
        variables,
        observations,
        matrix,
    })
}
