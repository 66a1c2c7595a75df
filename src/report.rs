// Report orchestration: filter → aggregate → lay out → write.
use crate::charts::{pie, stacked_bar, Figure};
use crate::error::{ReportError, Result};
use crate::filter::{select, MovementFilter, Selection};
use crate::layout::{add_chart_page, add_kpis, add_period_heading, add_sales_tables, Document, DocumentBuilder};
use crate::output::write_json;
use crate::pdf::write_pdf;
use crate::reports::{by_destination, generate_summary, monthly_by_category};
use crate::types::{SummaryStats, Transaction};
use chrono::NaiveDate;
use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportKind {
    Sales,
    Purchases,
    Stock,
    Unknown(String),
}

impl FromStr for ReportKind {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "ventas" | "sales" => ReportKind::Sales,
            "compras" | "purchases" => ReportKind::Purchases,
            "stock" | "existencias" => ReportKind::Stock,
            _ => ReportKind::Unknown(s.trim().to_string()),
        })
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Sales => write!(f, "Ventas"),
            ReportKind::Purchases => write!(f, "Compras"),
            ReportKind::Stock => write!(f, "Stock"),
            ReportKind::Unknown(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub kind: ReportKind,
    pub establishment: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub title: String,
    pub output: PathBuf,
    /// Also save the charts as standalone SVG files here.
    pub charts_dir: Option<PathBuf>,
    pub summary_json: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    Written {
        path: PathBuf,
        pages: usize,
        sales_rows: usize,
    },
    NotImplemented(ReportKind),
}

/// Everything a sales report run produces before anything touches the disk.
#[derive(Debug)]
pub struct SalesReport {
    pub document: Document,
    pub summary: SummaryStats,
    pub monthly: Option<Figure>,
    pub destinations: Option<Figure>,
}

/// Lay out the sales report for `req`.
///
/// Detail tables cover `start..=end`. The KPI strip and both charts are
/// cumulative: every sale of the establishment up to `end`.
///
/// The charts are deliberately narrower than a chart of every sale in the
/// workbook. They skip other establishments and anything after `end`, so
/// they agree with the KPI strip above them.
pub fn build_sales_report(data: &[Transaction], req: &ReportRequest) -> Result<SalesReport> {
    info!("Applying filters...");
    let in_period = select(
        data,
        &Selection::new(&req.establishment)
            .between(req.start, req.end)
            .movement(MovementFilter::SALES),
    );
    if in_period.is_empty() {
        return Err(ReportError::EmptySelection {
            establishment: req.establishment.clone(),
            start: req.start,
            end: req.end,
        });
    }
    let to_date = select(
        data,
        &Selection::new(&req.establishment)
            .until(req.end)
            .movement(MovementFilter::SALES),
    );
    info!(
        "{} sales in period, {} up to {}",
        in_period.len(),
        to_date.len(),
        req.end
    );

    let monthly = stacked_bar(&monthly_by_category(&to_date));
    if monthly.is_none() {
        warn!("No sales data to chart by month.");
    }
    let destinations = pie(&by_destination(&to_date));
    if destinations.is_none() {
        warn!("No sales data to chart by destination.");
    }

    let mut b = DocumentBuilder::new(&req.title);
    b.add_page();
    add_kpis(&mut b, &to_date, &req.establishment, req.end);
    add_period_heading(&mut b, &req.establishment, req.start, req.end);
    add_sales_tables(&mut b, &in_period);
    add_chart_page(&mut b, monthly.clone(), destinations.clone());

    Ok(SalesReport {
        document: b.finish(),
        summary: generate_summary(&req.establishment, req.start, req.end, &in_period),
        monthly,
        destinations,
    })
}

/// Write the charts as `ventas_mensuales.svg` and `ventas_por_destino.svg`.
pub fn export_charts(report: &SalesReport, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for (name, fig) in [
        ("ventas_mensuales.svg", &report.monthly),
        ("ventas_por_destino.svg", &report.destinations),
    ] {
        if let Some(fig) = fig {
            let path = dir.join(name);
            fig.save_svg(&path)?;
            written.push(path);
        }
    }
    Ok(written)
}

/// Run one report end to end. Nothing is written unless the selection has sales.
pub fn generate_report(data: &[Transaction], req: &ReportRequest) -> Result<ReportOutcome> {
    match req.kind {
        ReportKind::Sales => {}
        ReportKind::Purchases | ReportKind::Stock | ReportKind::Unknown(_) => {
            warn!("Report '{}' is not implemented yet.", req.kind);
            return Ok(ReportOutcome::NotImplemented(req.kind.clone()));
        }
    }

    let report = build_sales_report(data, req)?;
    info!("Generating PDF report...");

    if let Some(dir) = &req.charts_dir {
        for path in export_charts(&report, dir)? {
            info!("Chart saved to {}", path.display());
        }
    }
    if let Some(path) = &req.summary_json {
        write_json(path, &report.summary)?;
        info!("Summary saved to {}", path.display());
    }

    write_pdf(&report.document, &req.output)?;
    info!("Report written to {}", req.output.display());
    Ok(ReportOutcome::Written {
        path: req.output.clone(),
        pages: report.document.pages.len(),
        sales_rows: report.summary.sales_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::fixtures::sale;
    use crate::charts::Shape;
    use crate::layout::CellRole;

    fn request(kind: ReportKind, establishment: &str) -> ReportRequest {
        ReportRequest {
            kind,
            establishment: establishment.to_string(),
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            title: "Informe de Ventas".into(),
            output: std::env::temp_dir().join("livestock_report_unit_never_written.pdf"),
            charts_dir: None,
            summary_json: None,
        }
    }

    #[test]
    fn kinds_parse_in_both_languages() {
        assert_eq!("Ventas".parse::<ReportKind>().unwrap(), ReportKind::Sales);
        assert_eq!("sales".parse::<ReportKind>().unwrap(), ReportKind::Sales);
        assert_eq!("Compras".parse::<ReportKind>().unwrap(), ReportKind::Purchases);
        assert_eq!(
            "Nacimientos".parse::<ReportKind>().unwrap(),
            ReportKind::Unknown("Nacimientos".into())
        );
    }

    #[test]
    fn other_kinds_are_not_implemented() {
        let data = vec![sale((2024, 3, 4), "M1", "Novillo", 1, 1, 1)];
        let req = request(ReportKind::Unknown("Nacimientos".into()), "Granja A");
        let outcome = generate_report(&data, &req).unwrap();
        assert_eq!(
            outcome,
            ReportOutcome::NotImplemented(ReportKind::Unknown("Nacimientos".into()))
        );
        assert!(!req.output.exists());
    }

    #[test]
    fn empty_selection_is_reported() {
        let data = vec![sale((2024, 3, 4), "M1", "Novillo", 1, 1, 1)];
        let err = build_sales_report(&data, &request(ReportKind::Sales, "Granja Z")).unwrap_err();
        assert!(matches!(err, ReportError::EmptySelection { .. }));
    }

    #[test]
    fn kpis_are_cumulative_but_tables_are_per_period() {
        let data = vec![
            sale((2024, 2, 10), "M1", "Vaca", 5, 50, 500),
            sale((2024, 3, 4), "M1", "Novillo", 10, 100, 1000),
            sale((2024, 4, 2), "M1", "Novillo", 99, 99, 99),
        ];
        let report = build_sales_report(&data, &request(ReportKind::Sales, "Granja A")).unwrap();
        assert_eq!(report.summary.sales_rows, 1);
        assert_eq!(report.summary.kpis.quantity, 10);
        // Two months in the cumulative chart, only one detail row.
        let doc = &report.document;
        assert_eq!(doc.cells_with_role(CellRole::Data).count(), 9 + 5);
        let headings: Vec<_> = doc.cells_with_role(CellRole::Heading).map(|c| c.text.as_str()).collect();
        assert_eq!(headings[0], "Ventas de Marzo 2024 (01/03/2024 a 31/03/2024) - Granja A");
        assert!(report.destinations.is_some());

        // February is before the period but still charted; April is past `end`.
        let monthly = report.monthly.expect("monthly chart");
        let labels: Vec<&str> = monthly
            .shapes
            .iter()
            .filter_map(|s| match s {
                Shape::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert!(labels.contains(&"Febrero 24"));
        assert!(labels.contains(&"Marzo 24"));
        assert!(!labels.contains(&"Abril 24"));
    }
}
