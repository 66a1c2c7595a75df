// Entry point: load the workbook once, then build the requested report.
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use livestock_report::filter::{select, MovementFilter, Selection};
use livestock_report::loader::{self, LoadReport};
use livestock_report::reports::{category_rows, compute_kpis, group_by_category, kpi_rows};
use livestock_report::types::Transaction;
use livestock_report::util::{self, format_int};
use livestock_report::{generate_report, output, ReportError, ReportKind, ReportOutcome, ReportRequest};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "livestock_report",
    version,
    about = "Informe de ventas de ganado en PDF a partir de una planilla",
    long_about = "Reads a livestock movements workbook (.xlsx, .xls, .ods or .csv), \
                  cleans it and writes a paginated PDF sales report for one establishment.\n\n\
                  EXAMPLES:\n  \
                  livestock_report -i movimientos.xlsx -e \"Granja A\" --from 2024-03-01 --to 2024-03-31\n\n  \
                  # Preview the KPIs in the console as well\n  \
                  livestock_report -i movimientos.csv -e \"Granja A\" --from 01/03/2024 --to 31/03/2024 --preview"
)]
struct Cli {
    /// Spreadsheet with one movement per row
    #[arg(short, long)]
    input: PathBuf,

    /// Establishment to report on (exact match)
    #[arg(short, long)]
    establishment: String,

    /// First day of the period (YYYY-MM-DD or DD/MM/YYYY)
    #[arg(long, value_parser = parse_date_arg)]
    from: NaiveDate,

    /// Last day of the period, inclusive
    #[arg(long, value_parser = parse_date_arg)]
    to: NaiveDate,

    /// Report kind. Only `ventas` is available for now
    #[arg(short, long, default_value = "ventas")]
    kind: String,

    /// Where to write the PDF
    #[arg(short, long, default_value = "informe_ventas.pdf")]
    output: PathBuf,

    /// Title printed at the top of every page
    #[arg(long, default_value = "Informe de Ventas")]
    title: String,

    /// Also export both charts as SVG into this directory
    #[arg(long)]
    charts_dir: Option<PathBuf>,

    /// Write the period summary as JSON
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Print KPI and category tables to the console
    #[arg(long)]
    preview: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn parse_date_arg(s: &str) -> std::result::Result<NaiveDate, String> {
    util::parse_date_str(s).ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD or DD/MM/YYYY", s))
}

fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_load_report(report: &LoadReport) {
    println!(
        "Processing dataset... ({} rows loaded, {} kept)",
        format_int(report.total_rows as i64),
        format_int(report.kept_rows as i64)
    );
    if report.dropped_dates > 0 {
        println!(
            "Note: {} rows skipped due to missing or invalid dates.",
            format_int(report.dropped_dates as i64)
        );
    }
    if !report.missing_columns.is_empty() {
        println!("Info: columns not found, defaulted: {}", report.missing_columns.join(", "));
    }
    println!();
}

fn preview(data: &[Transaction], cli: &Cli) {
    let sales = select(
        data,
        &Selection::new(&cli.establishment)
            .between(cli.from, cli.to)
            .movement(MovementFilter::SALES),
    );
    output::preview_table(
        &format!("KPIs {} ({} a {})", cli.establishment, util::format_date(cli.from), util::format_date(cli.to)),
        &kpi_rows(&compute_kpis(&sales)),
    );
    output::preview_table("Resumen por Categoría", &category_rows(&group_by_category(&sales)));
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if !cli.input.exists() {
        bail!("Input file not found: {}", cli.input.display());
    }
    if cli.from > cli.to {
        bail!("--from ({}) is after --to ({})", cli.from, cli.to);
    }

    let (data, load_report) = loader::load_and_clean(&cli.input)
        .with_context(|| format!("failed to load {}", cli.input.display()))?;
    print_load_report(&load_report);

    if cli.preview {
        preview(&data, &cli);
    }

    let request = ReportRequest {
        kind: cli.kind.parse::<ReportKind>()?,
        establishment: cli.establishment.clone(),
        start: cli.from,
        end: cli.to,
        title: cli.title.clone(),
        output: cli.output.clone(),
        charts_dir: cli.charts_dir.clone(),
        summary_json: cli.summary_json.clone(),
    };

    match generate_report(&data, &request) {
        Ok(ReportOutcome::Written { path, pages, sales_rows }) => {
            println!(
                "Informe generado: {} ({} páginas, {} ventas)",
                path.display(),
                pages,
                format_int(sales_rows as i64)
            );
        }
        Ok(ReportOutcome::NotImplemented(kind)) => {
            println!("Reporte '{}' no implementado.", kind);
        }
        Err(ReportError::EmptySelection { establishment, start, end }) => {
            info!("Nothing to report for {} between {} and {}", establishment, start, end);
            println!("No hay datos para ventas en ese rango.");
        }
        Err(e) => {
            error!("Report generation failed: {}", e);
            return Err(e).context("failed to generate the report");
        }
    }
    Ok(())
}
