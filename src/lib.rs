//! Livestock sales workbook → cleaned transactions → KPIs, groupings and a
//! paginated PDF report with tables and charts.
pub mod charts;
pub mod error;
pub mod filter;
pub mod layout;
pub mod loader;
pub mod output;
pub mod pdf;
pub mod report;
pub mod reports;
pub mod types;
pub mod util;

pub use error::{DataError, ReportError, Result};
pub use report::{generate_report, ReportKind, ReportOutcome, ReportRequest};
