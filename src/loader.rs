// Ingestion boundary and cleaning stage.
//
// Spreadsheet headers are mapped onto `Column` exactly once, here. Everything
// downstream works with `Transaction` fields and never sees a header string.
use crate::error::{DataError, ReportError, Result};
use crate::types::{RawCell, RawTable, Transaction, NO_DATA};
use crate::util::{is_missing_marker, parse_date_safe, parse_date_str, parse_int_safe, parse_number_safe};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Date,
    Establishment,
    Brand,
    Category,
    Movement,
    Direction,
    Destination,
    Quantity,
    AvgWeight,
    TotalWeight,
    NetWeight,
    YieldPct,
    PricePerKg,
    AmountGs,
    AmountUsd,
    Stamp,
    Cause,
    Sector,
    Paddock,
    Notes,
}

impl Column {
    pub const ALL: [Column; 20] = [
        Column::Date,
        Column::Establishment,
        Column::Brand,
        Column::Category,
        Column::Movement,
        Column::Direction,
        Column::Destination,
        Column::Quantity,
        Column::AvgWeight,
        Column::TotalWeight,
        Column::NetWeight,
        Column::YieldPct,
        Column::PricePerKg,
        Column::AmountGs,
        Column::AmountUsd,
        Column::Stamp,
        Column::Cause,
        Column::Sector,
        Column::Paddock,
        Column::Notes,
    ];

    /// Canonical header, as used in diagnostics.
    pub fn header(self) -> &'static str {
        self.aliases()[0]
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Date => &["Fecha", "Date"],
            Column::Establishment => &["Establecimiento"],
            Column::Brand => &["Marca"],
            Column::Category => &["Categoría", "Categoria"],
            Column::Movement => &["Movimiento"],
            Column::Direction => &["Tipo Movimiento", "Tipo de Movimiento"],
            Column::Destination => &["Destino / Origen", "Destino  Origen", "Destino"],
            Column::Quantity => &["Cantidad"],
            Column::AvgWeight => &["Peso Prom. (Kg/Cab)", "Peso Prom. (KgCab)"],
            Column::TotalWeight => &["Peso Total (Kg)"],
            Column::NetWeight => &["Peso Neto"],
            Column::YieldPct => &["% Rendimiento", "Rendimiento"],
            Column::PricePerKg => &["Preciokg", "Precio/kg"],
            Column::AmountGs => &["Monto Total Gs.", "Monto Total Gs"],
            Column::AmountUsd => &["Monto total $", "Monto Total USD"],
            Column::Stamp => &["Carimbo"],
            Column::Cause => &["Causa"],
            Column::Sector => &["Sector"],
            Column::Paddock => &["Potrero"],
            Column::Notes => &["Obs", "Observaciones"],
        }
    }
}

/// Header comparison ignores case, whitespace and punctuation, so
/// `Destino  Origen` and `Destino / Origen` land on the same column.
pub fn normalize_header(h: &str) -> String {
    h.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

static HEADER_INDEX: Lazy<HashMap<String, Column>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for col in Column::ALL {
        for alias in col.aliases() {
            map.entry(normalize_header(alias)).or_insert(col);
        }
    }
    map
});

/// Position of each known column in a concrete header row.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    positions: HashMap<Column, usize>,
}

impl ColumnMap {
    pub fn from_headers(headers: &[String]) -> Self {
        let mut positions = HashMap::new();
        for (idx, h) in headers.iter().enumerate() {
            match HEADER_INDEX.get(&normalize_header(h)) {
                Some(col) => {
                    positions.entry(*col).or_insert(idx);
                }
                None => debug!("ignoring unknown column '{}'", h),
            }
        }
        Self { positions }
    }

    pub fn contains(&self, col: Column) -> bool {
        self.positions.contains_key(&col)
    }

    pub fn missing(&self) -> Vec<&'static str> {
        Column::ALL
            .iter()
            .filter(|c| !self.contains(**c))
            .map(|c| c.header())
            .collect()
    }

    fn cell<'r>(&self, row: &'r [RawCell], col: Column) -> &'r RawCell {
        static EMPTY: RawCell = RawCell::Empty;
        self.positions
            .get(&col)
            .and_then(|idx| row.get(*idx))
            .unwrap_or(&EMPTY)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped_dates: usize,
    pub defaulted_text: usize,
    pub defaulted_numbers: usize,
    pub missing_columns: Vec<&'static str>,
}

/// Read a CSV or Excel file into an untyped table. Excel uses the first worksheet.
pub fn read_table(path: &Path) -> Result<RawTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "csv" | "txt" => read_csv(File::open(path)?),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_excel(path),
        _ => Err(ReportError::UnsupportedInput(format!(
            "'{}' (expected .csv, .xlsx, .xlsm, .xlsb, .xls or .ods)",
            path.display()
        ))),
    }
}

/// Read CSV text. The delimiter (`,` or `;`) is sniffed from the header line.
pub fn read_csv<R: Read>(mut input: R) -> Result<RawTable> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes.as_slice());

    let first_line = body.split(|b| *b == b'\n').next().unwrap_or(&[]);
    let semis = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    let delimiter = if semis > commas { b';' } else { b',' };

    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(body);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| DataError::Malformed {
            row: idx + 2,
            reason: e.to_string(),
        })?;
        rows.push(record.iter().map(|f| RawCell::text(f.trim())).collect());
    }
    Ok(RawTable { headers, rows })
}

pub fn read_excel(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ReportError::UnsupportedInput(format!("'{}' has no sheets", path.display())))?;
    info!("Reading sheet '{}' from {}", sheet_name, path.display());
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut iter = range.rows();
    let headers: Vec<String> = match iter.next() {
        Some(row) => row.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => return Ok(RawTable::default()),
    };
    let rows = iter
        .map(|row| row.iter().map(excel_cell).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|c| *c != RawCell::Empty))
        .collect();
    Ok(RawTable { headers, rows })
}

fn excel_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::String(s) => RawCell::text(s.trim()),
        Data::Float(f) => RawCell::Number(*f),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Bool(b) => RawCell::Text(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| RawCell::Date(d.date()))
            .unwrap_or(RawCell::Empty),
        Data::DateTimeIso(s) => parse_date_str(s)
            .map(RawCell::Date)
            .unwrap_or_else(|| RawCell::text(s.trim())),
        other => RawCell::text(other.to_string().trim()),
    }
}

fn text_of(cell: &RawCell) -> Option<String> {
    let s = match cell {
        RawCell::Empty => return None,
        RawCell::Text(s) => s.trim().to_string(),
        RawCell::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => format!("{}", *n as i64),
        RawCell::Number(n) => n.to_string(),
        RawCell::Date(d) => d.format("%Y-%m-%d").to_string(),
    };
    if is_missing_marker(&s) {
        None
    } else {
        Some(s)
    }
}

struct Cleaner<'a> {
    map: &'a ColumnMap,
    defaulted_text: usize,
    defaulted_numbers: usize,
}

impl Cleaner<'_> {
    fn text(&mut self, row: &[RawCell], col: Column) -> String {
        match text_of(self.map.cell(row, col)) {
            Some(s) => s,
            None => {
                if self.map.contains(col) {
                    self.defaulted_text += 1;
                }
                NO_DATA.to_string()
            }
        }
    }

    fn number(&mut self, row: &[RawCell], col: Column) -> f64 {
        match parse_number_safe(self.map.cell(row, col)) {
            Some(v) => v,
            None => {
                if self.map.contains(col) {
                    self.defaulted_numbers += 1;
                }
                0.0
            }
        }
    }

    /// Whole-unit columns are truncated, not rounded.
    fn whole(&mut self, row: &[RawCell], col: Column) -> i64 {
        let v = self.number(row, col).trunc();
        // `as i64` would silently saturate here, so out-of-range counts as unparseable.
        if v.abs() >= i64::MAX as f64 {
            self.defaulted_numbers += 1;
            return 0;
        }
        v as i64
    }
}

/// Coerce every row of `table` into a `Transaction`.
///
/// Rows without a valid date are dropped and counted. Every other defect is
/// defaulted: blank text becomes `NO_DATA`, unparseable numbers become 0.
pub fn clean_table(table: &RawTable) -> std::result::Result<(Vec<Transaction>, LoadReport), DataError> {
    info!("Cleaning {} rows...", table.rows.len());
    let map = ColumnMap::from_headers(&table.headers);
    if !map.contains(Column::Date) {
        return Err(DataError::MissingColumn(Column::Date.header()));
    }
    let missing_columns = map.missing();
    if !missing_columns.is_empty() {
        warn!("Columns not found, using defaults: {}", missing_columns.join(", "));
    }

    let has_avg_weight = map.contains(Column::AvgWeight);
    let mut cleaner = Cleaner {
        map: &map,
        defaulted_text: 0,
        defaulted_numbers: 0,
    };
    let mut dropped_dates = 0usize;
    let mut records = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        let date = match parse_date_safe(map.cell(row, Column::Date)) {
            Some(d) => d,
            None => {
                dropped_dates += 1;
                continue;
            }
        };
        let avg_weight_kg = if has_avg_weight {
            Some(cleaner.whole(row, Column::AvgWeight))
        } else {
            None
        };
        let stamp = parse_int_safe(map.cell(row, Column::Stamp)).unwrap_or(0);

        records.push(Transaction {
            date,
            establishment: cleaner.text(row, Column::Establishment),
            brand: cleaner.text(row, Column::Brand),
            category: cleaner.text(row, Column::Category),
            movement: cleaner.text(row, Column::Movement),
            direction: cleaner.text(row, Column::Direction),
            destination: cleaner.text(row, Column::Destination),
            quantity: cleaner.whole(row, Column::Quantity),
            avg_weight_kg,
            total_weight_kg: cleaner.whole(row, Column::TotalWeight),
            net_weight_kg: cleaner.whole(row, Column::NetWeight),
            yield_pct: cleaner.number(row, Column::YieldPct),
            price_per_kg: cleaner.whole(row, Column::PricePerKg),
            amount_gs: cleaner.whole(row, Column::AmountGs),
            amount_usd: cleaner.number(row, Column::AmountUsd),
            stamp,
            cause: cleaner.text(row, Column::Cause),
            sector: cleaner.text(row, Column::Sector),
            paddock: cleaner.text(row, Column::Paddock),
            notes: cleaner.text(row, Column::Notes),
        });
    }

    if dropped_dates > 0 {
        warn!("{} rows without a valid date were dropped.", dropped_dates);
    }
    if records.is_empty() {
        return Err(DataError::NoUsableRows {
            total: table.rows.len(),
            dropped: dropped_dates,
        });
    }
    debug!(
        "{} text cells and {} numeric cells defaulted",
        cleaner.defaulted_text, cleaner.defaulted_numbers
    );
    info!("Cleaning complete. Valid rows: {}", records.len());

    let report = LoadReport {
        total_rows: table.rows.len(),
        kept_rows: records.len(),
        dropped_dates,
        defaulted_text: cleaner.defaulted_text,
        defaulted_numbers: cleaner.defaulted_numbers,
        missing_columns,
    };
    Ok((records, report))
}

pub fn load_and_clean(path: &Path) -> Result<(Vec<Transaction>, LoadReport)> {
    let table = read_table(path)?;
    Ok(clean_table(&table)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Cursor;

    const HEADER: &str = " Fecha ,Establecimiento,Marca,Categoría,Movimiento,Tipo Movimiento,Destino  Origen,Cantidad,Peso Prom. (KgCab),Peso Total (Kg),Preciokg,Monto Total Gs.,Carimbo\n";

    fn table(body: &str) -> RawTable {
        read_csv(Cursor::new(format!("{}{}", HEADER, body))).unwrap()
    }

    #[test]
    fn rows_with_bad_dates_are_dropped_and_counted() {
        let t = table(
            "2024-03-01,Granja A,M1,Novillo,Venta,Salida,Frigo,10,100,1.000,10,10.000,5\n\
             no es fecha,Granja A,M1,Novillo,Venta,Salida,Frigo,10,100,1.000,10,10.000,5\n\
             ,Granja A,M1,Novillo,Venta,Salida,Frigo,10,100,1.000,10,10.000,5\n\
             05/03/2024,Granja A,M1,Novillo,Venta,Salida,Frigo,10,100,1.000,10,10.000,5\n",
        );
        let (records, report) = clean_table(&t).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(report.dropped_dates, 2);
        assert_eq!(report.total_rows, 4);
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }

    #[test]
    fn numbers_strip_separators_and_default_to_zero() {
        let t = table("2024-03-01,Granja A,M1,Novillo,Venta,Salida,Frigo,1.234,abc,12.345.678,x,9.876.543,7\n");
        let (records, report) = clean_table(&t).unwrap();
        let r = &records[0];
        assert_eq!(r.quantity, 1234);
        assert_eq!(r.avg_weight_kg, Some(0));
        assert_eq!(r.total_weight_kg, 12_345_678);
        assert_eq!(r.price_per_kg, 0);
        assert_eq!(r.amount_gs, 9_876_543);
        assert_eq!(r.stamp, 7);
        assert_eq!(report.defaulted_numbers, 2);
    }

    #[test]
    fn blank_text_becomes_sentinel_and_headers_are_aliased() {
        let t = table("2024-03-01,  Granja A ,,nan,Venta,Salida,Frigo,1,1,1,1,1,\n");
        let (records, _) = clean_table(&t).unwrap();
        let r = &records[0];
        assert_eq!(r.establishment, "Granja A");
        assert_eq!(r.brand, NO_DATA);
        assert_eq!(r.category, NO_DATA);
        assert_eq!(r.destination, "Frigo");
        assert_eq!(r.stamp, 0);
        // Absent from the header row entirely.
        assert_eq!(r.cause, NO_DATA);
        assert_eq!(r.net_weight_kg, 0);
    }

    #[test]
    fn missing_weight_per_head_column_is_absent_not_zero() {
        let csv = "Fecha,Cantidad\n2024-01-01,3\n";
        let t = read_csv(Cursor::new(csv)).unwrap();
        let (records, report) = clean_table(&t).unwrap();
        assert_eq!(records[0].avg_weight_kg, None);
        assert!(report.missing_columns.contains(&"Marca"));
    }

    #[test]
    fn semicolon_files_are_detected() {
        let csv = "Fecha;Cantidad;% Rendimiento\n2024-01-01;1.500;52,5\n";
        let t = read_csv(Cursor::new(csv)).unwrap();
        let (records, _) = clean_table(&t).unwrap();
        assert_eq!(records[0].quantity, 1500);
        assert_eq!(records[0].yield_pct, 52.5);
    }

    #[test]
    fn all_dates_invalid_is_a_data_error() {
        let t = table("xx,Granja A,M1,Novillo,Venta,Salida,Frigo,1,1,1,1,1,1\n");
        match clean_table(&t) {
            Err(DataError::NoUsableRows { total, dropped }) => {
                assert_eq!(total, 1);
                assert_eq!(dropped, 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn missing_date_column_is_a_data_error() {
        let t = read_csv(Cursor::new("Marca,Cantidad\nM1,1\n")).unwrap();
        assert!(matches!(clean_table(&t), Err(DataError::MissingColumn("Fecha"))));
    }

    #[test]
    fn amounts_past_i64_default_to_zero() {
        let t = table(
            "2024-03-01,Granja A,M1,Novillo,Venta,Salida,Frigo,1,1,1,1,9.999.999.999.999.999.999,1\n\
             2024-03-02,Granja A,M1,Novillo,Venta,Salida,Frigo,1,1,1,1,9.999.999.999.999.999.999,1\n",
        );
        let (records, report) = clean_table(&t).unwrap();
        assert!(records.iter().all(|r| r.amount_gs == 0));
        assert_eq!(report.defaulted_numbers, 2);
        assert_eq!(crate::reports::compute_kpis(&records).amount_gs, 0);
    }

    #[test]
    fn excel_cells_keep_their_types() {
        use calamine::{ExcelDateTime, ExcelDateTimeType};

        let serial = Data::DateTime(ExcelDateTime::new(45366.0, ExcelDateTimeType::DateTime, false));
        let march_15 = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(excel_cell(&serial), RawCell::Date(march_15));
        assert_eq!(excel_cell(&Data::DateTimeIso("2024-03-15".into())), RawCell::Date(march_15));
        assert_eq!(excel_cell(&Data::Int(1234)), RawCell::Number(1234.0));
        assert_eq!(excel_cell(&Data::Float(1.5)), RawCell::Number(1.5));
        assert_eq!(excel_cell(&Data::String("  Granja A ".into())), RawCell::Text("Granja A".into()));
        assert_eq!(excel_cell(&Data::Empty), RawCell::Empty);
    }

    #[test]
    fn typed_excel_numbers_skip_separator_stripping() {
        let table = RawTable {
            headers: vec!["Fecha".into(), "Establecimiento".into(), "Cantidad".into(), "% Rendimiento".into()],
            rows: vec![vec![
                excel_cell(&Data::DateTime(calamine::ExcelDateTime::new(
                    45366.0,
                    calamine::ExcelDateTimeType::DateTime,
                    false,
                ))),
                excel_cell(&Data::String("Granja A".into())),
                excel_cell(&Data::Int(1234)),
                // As text "1.5" would lose its dot and read as 15.
                excel_cell(&Data::Float(1.5)),
            ]],
        };
        let (records, report) = clean_table(&table).unwrap();
        assert_eq!(report.kept_rows, 1);
        let r = &records[0];
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(r.establishment, "Granja A");
        assert_eq!(r.quantity, 1234);
        assert_eq!(r.yield_pct, 1.5);
    }
}
