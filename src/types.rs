use chrono::NaiveDate;
use serde::Serialize;
use tabled::Tabled;

/// Placeholder written into text columns that are blank or hold a missing marker.
pub const NO_DATA: &str = "Sin Dato";

/// One cell as it comes out of the spreadsheet, before any coercion.
///
/// Excel hands us typed numbers and dates; CSV only ever produces `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl RawCell {
    pub fn text(s: &str) -> Self {
        if s.is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(s.to_string())
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

/// A cleaned livestock movement. Every field is typed; blanks are already defaulted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub establishment: String,
    pub brand: String,
    pub category: String,
    pub movement: String,
    pub direction: String,
    pub destination: String,
    pub quantity: i64,
    /// `None` only when the input has no weight-per-head column at all.
    pub avg_weight_kg: Option<i64>,
    pub total_weight_kg: i64,
    pub net_weight_kg: i64,
    pub yield_pct: f64,
    pub price_per_kg: i64,
    pub amount_gs: i64,
    pub amount_usd: f64,
    pub stamp: i64,
    pub cause: String,
    pub sector: String,
    pub paddock: String,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Kpis {
    pub quantity: i64,
    pub weight_kg: i64,
    pub amount_gs: i64,
    pub price_per_kg: f64,
    pub avg_weight_kg: f64,
}

/// Subtotals for one grouping key (a brand or a category).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTotals {
    pub key: String,
    pub rows: usize,
    pub quantity: i64,
    pub weight_kg: i64,
    pub amount_gs: i64,
    pub price_per_kg: f64,
    pub avg_weight_kg: f64,
}

#[derive(Debug, Clone)]
pub struct BrandGroup<'a> {
    pub totals: GroupTotals,
    pub rows: Vec<&'a Transaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

/// Quantity sold per (month, category). `quantities[c][m]` is category `c` in month `m`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonthlyPivot {
    pub months: Vec<YearMonth>,
    pub categories: Vec<String>,
    pub quantities: Vec<Vec<i64>>,
}

impl MonthlyPivot {
    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn month_total(&self, month_idx: usize) -> i64 {
        self.quantities
            .iter()
            .fold(0i64, |acc, series| acc.saturating_add(series[month_idx]))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DestinationShare {
    pub destination: String,
    pub quantity: i64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct KpiRow {
    #[serde(rename = "Indicador")]
    #[tabled(rename = "Indicador")]
    pub label: String,
    #[serde(rename = "Valor")]
    #[tabled(rename = "Valor")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CategorySummaryRow {
    #[serde(rename = "Categoría")]
    #[tabled(rename = "Categoría")]
    pub category: String,
    #[serde(rename = "Cantidad Total")]
    #[tabled(rename = "Cantidad Total")]
    pub quantity: String,
    #[serde(rename = "Peso Promedio")]
    #[tabled(rename = "Peso Promedio")]
    pub avg_weight: String,
    #[serde(rename = "Precio/kg")]
    #[tabled(rename = "Precio/kg")]
    pub price_per_kg: String,
    #[serde(rename = "Monto Total Gs.")]
    #[tabled(rename = "Monto Total Gs.")]
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub establishment: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub sales_rows: usize,
    pub brands: usize,
    pub kpis: Kpis,
    pub categories: Vec<CategorySummaryRow>,
}
