// Narrowing the cleaned dataset to one establishment, period and movement type.
use crate::types::Transaction;
use chrono::NaiveDate;

/// Movement kind plus direction, compared case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementFilter {
    pub kind: &'static str,
    pub direction: &'static str,
}

impl MovementFilter {
    pub const SALES: MovementFilter = MovementFilter {
        kind: "venta",
        direction: "salida",
    };

    pub fn matches(&self, t: &Transaction) -> bool {
        t.movement.trim().eq_ignore_ascii_case(self.kind)
            && t.direction.trim().eq_ignore_ascii_case(self.direction)
    }
}

/// A request for a slice of the data. Bounds are inclusive; `None` is unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<'a> {
    pub establishment: &'a str,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub movement: Option<MovementFilter>,
}

impl<'a> Selection<'a> {
    pub fn new(establishment: &'a str) -> Self {
        Self {
            establishment,
            start: None,
            end: None,
            movement: None,
        }
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn until(mut self, end: NaiveDate) -> Self {
        self.end = Some(end);
        self
    }

    pub fn movement(mut self, movement: MovementFilter) -> Self {
        self.movement = Some(movement);
        self
    }

    pub fn matches(&self, t: &Transaction) -> bool {
        t.establishment == self.establishment
            && self.start.map_or(true, |s| t.date >= s)
            && self.end.map_or(true, |e| t.date <= e)
            && self.movement.map_or(true, |m| m.matches(t))
    }
}

/// Rows of `data` matching `sel`, in input order. An empty result is not an error.
pub fn select(data: &[Transaction], sel: &Selection<'_>) -> Vec<Transaction> {
    data.iter().filter(|t| sel.matches(t)).cloned().collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::types::{Transaction, NO_DATA};
    use chrono::NaiveDate;

    pub fn sale(date: (i32, u32, u32), brand: &str, category: &str, qty: i64, kg: i64, gs: i64) -> Transaction {
        Transaction {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            establishment: "Granja A".to_string(),
            brand: brand.to_string(),
            category: category.to_string(),
            movement: "Venta".to_string(),
            direction: "Salida".to_string(),
            destination: "Frigorífico".to_string(),
            quantity: qty,
            avg_weight_kg: Some(if qty == 0 { 0 } else { kg / qty }),
            total_weight_kg: kg,
            net_weight_kg: kg,
            yield_pct: 0.0,
            price_per_kg: if kg == 0 { 0 } else { gs / kg },
            amount_gs: gs,
            amount_usd: 0.0,
            stamp: 0,
            cause: NO_DATA.to_string(),
            sector: NO_DATA.to_string(),
            paddock: NO_DATA.to_string(),
            notes: NO_DATA.to_string(),
        }
    }
}
