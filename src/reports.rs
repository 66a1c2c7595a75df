use crate::types::{
    BrandGroup, CategorySummaryRow, DestinationShare, GroupTotals, KpiRow, Kpis, MonthlyPivot,
    SummaryStats, Transaction, YearMonth,
};
use crate::util::{format_int, format_rounded, format_truncated, safe_div};
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Default)]
struct Acc {
    rows: usize,
    quantity: i64,
    weight_kg: i64,
    amount_gs: i64,
}

impl Acc {
    fn add(&mut self, t: &Transaction) {
        self.rows += 1;
        // Totals pin at i64::MAX rather than wrapping.
        self.quantity = self.quantity.saturating_add(t.quantity);
        self.weight_kg = self.weight_kg.saturating_add(t.total_weight_kg);
        self.amount_gs = self.amount_gs.saturating_add(t.amount_gs);
    }

    fn into_totals(self, key: String) -> GroupTotals {
        // Ratios come from the summed totals, never from averaging per-row ratios.
        GroupTotals {
            key,
            rows: self.rows,
            quantity: self.quantity,
            weight_kg: self.weight_kg,
            amount_gs: self.amount_gs,
            price_per_kg: safe_div(self.amount_gs as f64, self.weight_kg as f64),
            avg_weight_kg: safe_div(self.weight_kg as f64, self.quantity as f64),
        }
    }
}

/// Headline figures for a set of sales. Ratios are 0 when their divisor is 0.
pub fn compute_kpis(data: &[Transaction]) -> Kpis {
    let mut acc = Acc::default();
    for t in data {
        acc.add(t);
    }
    let totals = acc.into_totals(String::new());
    Kpis {
        quantity: totals.quantity,
        weight_kg: totals.weight_kg,
        amount_gs: totals.amount_gs,
        price_per_kg: totals.price_per_kg,
        avg_weight_kg: totals.avg_weight_kg,
    }
}

/// Rows grouped by brand, in order of each brand's first appearance.
pub fn group_by_brand(data: &[Transaction]) -> Vec<BrandGroup<'_>> {
    // HashMap loses insertion order, so remember it separately.
    let mut order: Vec<&str> = Vec::new();
    let mut map: HashMap<&str, (Acc, Vec<&Transaction>)> = HashMap::new();
    for t in data {
        let e = map.entry(t.brand.as_str()).or_insert_with(|| {
            order.push(t.brand.as_str());
            (Acc::default(), Vec::new())
        });
        e.0.add(t);
        e.1.push(t);
    }
    order
        .into_iter()
        .filter_map(|brand| {
            map.remove(brand).map(|(acc, rows)| BrandGroup {
                totals: acc.into_totals(brand.to_string()),
                rows,
            })
        })
        .collect()
}

/// Subtotals per category, sorted by category name.
pub fn group_by_category(data: &[Transaction]) -> Vec<GroupTotals> {
    let mut map: BTreeMap<&str, Acc> = BTreeMap::new();
    for t in data {
        map.entry(t.category.as_str()).or_default().add(t);
    }
    map.into_iter()
        .map(|(k, acc)| acc.into_totals(k.to_string()))
        .collect()
}

pub fn year_month(d: NaiveDate) -> YearMonth {
    YearMonth {
        year: d.year(),
        month: d.month(),
    }
}

/// Quantity per month and category. Months run chronologically, categories
/// alphabetically, and missing combinations are 0.
pub fn monthly_by_category(data: &[Transaction]) -> MonthlyPivot {
    // Sparse sums first; the sets fix both axes of the grid.
    let mut cells: HashMap<(YearMonth, &str), i64> = HashMap::new();
    // YearMonth orders by year, then month, so the set is already chronological.
    let mut months = BTreeSet::new();
    let mut categories = BTreeSet::new();
    for t in data {
        let ym = year_month(t.date);
        months.insert(ym);
        categories.insert(t.category.as_str());
        let cell = cells.entry((ym, t.category.as_str())).or_insert(0);
        *cell = cell.saturating_add(t.quantity);
    }
    let months: Vec<YearMonth> = months.into_iter().collect();
    // Dense grid: a category with no sales in a month still gets a 0 there,
    // so every series lines up with `months`.
    let quantities = categories
        .iter()
        .map(|cat| {
            months
                .iter()
                .map(|ym| cells.get(&(*ym, *cat)).copied().unwrap_or(0))
                .collect()
        })
        .collect();
    MonthlyPivot {
        months,
        categories: categories.into_iter().map(str::to_string).collect(),
        quantities,
    }
}

/// Quantity per destination, sorted by destination name.
pub fn by_destination(data: &[Transaction]) -> Vec<DestinationShare> {
    let mut map: BTreeMap<&str, i64> = BTreeMap::new();
    for t in data {
        let qty = map.entry(t.destination.as_str()).or_insert(0);
        *qty = qty.saturating_add(t.quantity);
    }
    map.into_iter()
        .map(|(destination, quantity)| DestinationShare {
            destination: destination.to_string(),
            quantity,
        })
        .collect()
}

/// Labels and display values for the KPI strip, in strip order.
pub fn kpi_rows(k: &Kpis) -> Vec<KpiRow> {
    let row = |label: &str, value: String| KpiRow {
        label: label.to_string(),
        value,
    };
    vec![
        row("Cantidad Total", format_int(k.quantity)),
        row("Kg Totales", format_int(k.weight_kg)),
        row("Monto Total Gs.", format_int(k.amount_gs)),
        row("Precio Promedio/kg", format_rounded(k.price_per_kg)),
        row("Kg Promedio", format_rounded(k.avg_weight_kg)),
    ]
}

pub fn category_rows(groups: &[GroupTotals]) -> Vec<CategorySummaryRow> {
    groups
        .iter()
        .map(|g| CategorySummaryRow {
            category: g.key.clone(),
            quantity: format_int(g.quantity),
            avg_weight: format_rounded(g.avg_weight_kg),
            price_per_kg: format_truncated(g.price_per_kg),
            amount: format_int(g.amount_gs),
        })
        .collect()
}

pub fn generate_summary(
    establishment: &str,
    start: NaiveDate,
    end: NaiveDate,
    sales: &[Transaction],
) -> SummaryStats {
    SummaryStats {
        establishment: establishment.to_string(),
        start,
        end,
        sales_rows: sales.len(),
        brands: group_by_brand(sales).len(),
        kpis: compute_kpis(sales),
        categories: category_rows(&group_by_category(sales)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::fixtures::sale;

    fn granja_a_march() -> Vec<Transaction> {
        vec![
            sale((2024, 3, 4), "M1", "Novillo", 10, 100, 1000),
            sale((2024, 3, 12), "M1", "Novillo", 20, 200, 2000),
            sale((2024, 3, 20), "M1", "Vaca", 30, 300, 3000),
        ]
    }

    #[test]
    fn kpis_for_three_march_sales() {
        let k = compute_kpis(&granja_a_march());
        assert_eq!(k.quantity, 60);
        assert_eq!(k.weight_kg, 600);
        assert_eq!(k.amount_gs, 6000);
        assert_eq!(k.price_per_kg, 10.0);
        assert_eq!(k.avg_weight_kg, 10.0);
    }

    #[test]
    fn zero_divisors_give_zero() {
        let k = compute_kpis(&[]);
        assert_eq!(k, Kpis::default());

        let data = vec![sale((2024, 1, 1), "M1", "Ternero", 0, 0, 500)];
        let k = compute_kpis(&data);
        assert_eq!(k.price_per_kg, 0.0);
        assert_eq!(k.avg_weight_kg, 0.0);
        let g = &group_by_category(&data)[0];
        assert_eq!(g.price_per_kg, 0.0);
        assert_eq!(g.avg_weight_kg, 0.0);
    }

    #[test]
    fn brand_subtotals_partition_the_kpi_totals() {
        let data = vec![
            sale((2024, 3, 1), "B", "Novillo", 7, 2100, 21_000),
            sale((2024, 3, 2), "A", "Vaca", 0, 0, 0),
            sale((2024, 3, 3), "B", "Vaca", 5, 2000, 19_500),
            sale((2024, 3, 4), "C", "Toro", 1, 650, 6_000),
            sale((2024, 3, 5), "A", "Novillo", 12, 4800, 45_000),
        ];
        let k = compute_kpis(&data);
        let groups = group_by_brand(&data);
        assert_eq!(groups.iter().map(|g| g.totals.quantity).sum::<i64>(), k.quantity);
        assert_eq!(groups.iter().map(|g| g.totals.weight_kg).sum::<i64>(), k.weight_kg);
        assert_eq!(groups.iter().map(|g| g.totals.amount_gs).sum::<i64>(), k.amount_gs);
        assert_eq!(groups.iter().map(|g| g.rows.len()).sum::<usize>(), data.len());
    }

    #[test]
    fn brands_keep_first_appearance_order() {
        let data = vec![
            sale((2024, 3, 1), "Zeta", "Novillo", 1, 1, 1),
            sale((2024, 3, 2), "Alfa", "Novillo", 1, 1, 1),
            sale((2024, 3, 3), "Zeta", "Novillo", 1, 1, 1),
        ];
        let keys: Vec<_> = group_by_brand(&data).into_iter().map(|g| g.totals.key).collect();
        assert_eq!(keys, vec!["Zeta", "Alfa"]);
    }

    #[test]
    fn categories_are_sorted_and_summed() {
        let groups = group_by_category(&granja_a_march());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "Novillo");
        assert_eq!(groups[0].quantity, 30);
        assert_eq!(groups[1].key, "Vaca");
        assert_eq!(groups[1].amount_gs, 3000);
    }

    #[test]
    fn pivot_is_chronological_and_zero_filled() {
        let data = vec![
            sale((2024, 1, 10), "M1", "Vaca", 4, 1, 1),
            sale((2023, 12, 5), "M1", "Novillo", 3, 1, 1),
            sale((2024, 1, 11), "M1", "Novillo", 2, 1, 1),
        ];
        let p = monthly_by_category(&data);
        assert_eq!(
            p.months,
            vec![YearMonth { year: 2023, month: 12 }, YearMonth { year: 2024, month: 1 }]
        );
        assert_eq!(p.categories, vec!["Novillo", "Vaca"]);
        assert_eq!(p.quantities, vec![vec![3, 2], vec![0, 4]]);
        assert_eq!(p.month_total(1), 6);
    }

    #[test]
    fn destinations_sum_quantity() {
        let mut a = sale((2024, 3, 1), "M1", "Vaca", 5, 1, 1);
        a.destination = "Feria".into();
        let b = sale((2024, 3, 1), "M1", "Vaca", 7, 1, 1);
        let c = sale((2024, 3, 2), "M1", "Vaca", 1, 1, 1);
        let shares = by_destination(&[a, b, c]);
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].destination, "Feria");
        assert_eq!(shares[1].quantity, 8);
    }

    #[test]
    fn kpi_rows_use_local_grouping() {
        let k = Kpis {
            quantity: 1250,
            weight_kg: 512_340,
            amount_gs: 4_123_456_789,
            price_per_kg: 8048.2,
            avg_weight_kg: 409.87,
        };
        let values: Vec<_> = kpi_rows(&k).into_iter().map(|r| r.value).collect();
        assert_eq!(values, vec!["1.250", "512.340", "4.123.456.789", "8.048", "410"]);
    }

    #[test]
    fn huge_totals_saturate_instead_of_overflowing() {
        let data = vec![
            sale((2024, 3, 1), "M1", "Vaca", i64::MAX, 1, i64::MAX),
            sale((2024, 3, 2), "M1", "Vaca", i64::MAX, 1, i64::MAX),
        ];
        let k = compute_kpis(&data);
        assert_eq!(k.amount_gs, i64::MAX);
        assert_eq!(k.quantity, i64::MAX);
        assert_eq!(group_by_brand(&data)[0].totals.amount_gs, i64::MAX);
        assert_eq!(monthly_by_category(&data).month_total(0), i64::MAX);
        assert_eq!(by_destination(&data)[0].quantity, i64::MAX);
    }
}
