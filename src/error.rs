// Typed failures for the load → clean → report pipeline.
use chrono::NaiveDate;
use thiserror::Error;

/// The cleaning stage could not produce a usable dataset.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no usable rows after cleaning ({dropped} of {total} rows had no valid date)")]
    NoUsableRows { total: usize, dropped: usize },

    #[error("required column '{0}' not found in the input")]
    MissingColumn(&'static str),

    #[error("row {row} could not be read: {reason}")]
    Malformed { row: usize, reason: String },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel error: {0}")]
    Excel(#[from] calamine::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("no sales for '{establishment}' between {start} and {end}")]
    EmptySelection {
        establishment: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("unsupported input: {0}")]
    UnsupportedInput(String),
}

pub type Result<T> = std::result::Result<T, ReportError>;
