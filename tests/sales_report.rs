use chrono::NaiveDate;
use livestock_report::layout::CellRole;
use livestock_report::loader::{clean_table, load_and_clean, read_csv};
use livestock_report::report::build_sales_report;
use livestock_report::types::Transaction;
use livestock_report::{generate_report, ReportError, ReportKind, ReportOutcome, ReportRequest};
use std::io::Cursor;
use std::path::PathBuf;

const WORKBOOK: &str = "\
Fecha;Establecimiento;Marca;Categoría;Movimiento;Tipo Movimiento;Destino / Origen;Cantidad;Peso Prom. (Kg/Cab);Peso Total (Kg);Preciokg;Monto Total Gs.
15/02/2024;Granja A;M1;Vaca;Venta;Salida;Feria;5;100;500;9;4.500
04/03/2024;Granja A;M1;Novillo;Venta;Salida;Frigorífico;10;10;100;10;1.000
12/03/2024;Granja A;M1;Novillo;Venta;Salida;Frigorífico;20;10;200;10;2.000
20/03/2024;Granja A;M2;Vaca;Venta;Salida;Feria;30;10;300;10;3.000
21/03/2024;Granja A;M2;Vaca;Compra;Entrada;Feria;7;10;70;10;700
22/03/2024;Granja B;M1;Vaca;Venta;Salida;Feria;8;10;80;10;800
sin fecha;Granja A;M1;Vaca;Venta;Salida;Feria;1;1;1;1;1
";

fn dataset() -> Vec<Transaction> {
    let table = read_csv(Cursor::new(WORKBOOK)).unwrap();
    let (records, report) = clean_table(&table).unwrap();
    assert_eq!(report.dropped_dates, 1);
    records
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("livestock_report_{}_{}", std::process::id(), name))
}

fn march(establishment: &str, output: PathBuf) -> ReportRequest {
    ReportRequest {
        kind: ReportKind::Sales,
        establishment: establishment.to_string(),
        start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        title: "Informe de Ventas".to_string(),
        output,
        charts_dir: None,
        summary_json: None,
    }
}

#[test]
fn march_sales_for_granja_a() {
    let data = dataset();
    let report = build_sales_report(&data, &march("Granja A", temp_path("unused.pdf"))).unwrap();

    let s = &report.summary;
    assert_eq!(s.sales_rows, 3);
    assert_eq!(s.brands, 2);
    assert_eq!(s.kpis.quantity, 60);
    assert_eq!(s.kpis.weight_kg, 600);
    assert_eq!(s.kpis.amount_gs, 6000);
    assert_eq!(s.kpis.price_per_kg, 10.0);
    assert_eq!(s.kpis.avg_weight_kg, 10.0);

    let doc = &report.document;
    let subtotals: Vec<_> = doc.cells_with_role(CellRole::Subtotal).map(|c| c.text.as_str()).collect();
    assert_eq!(
        subtotals,
        vec![
            "", "", "", "30", "300", "10", "", "10", "3.000", //
            "", "", "", "30", "300", "10", "", "10", "3.000",
        ]
    );

    let headings: Vec<_> = doc.cells_with_role(CellRole::Heading).map(|c| c.text.as_str()).collect();
    assert!(headings.contains(&"Marca: M1"));
    assert!(headings.contains(&"Marca: M2"));
    assert!(headings.contains(&"Resumen por Categoría"));

    let categories: Vec<_> = s.categories.iter().map(|c| (c.category.as_str(), c.quantity.as_str())).collect();
    assert_eq!(categories, vec![("Novillo", "30"), ("Vaca", "30")]);

    // The chart page is always last and carries both charts.
    assert_eq!(doc.pages.last().unwrap().images().count(), 2);
    assert!(doc.cells_with_role(CellRole::Footer).all(|c| c.text.starts_with("Página ")));
}

#[test]
fn unknown_establishment_writes_nothing() {
    let data = dataset();
    let output = temp_path("empty.pdf");
    let err = generate_report(&data, &march("Granja Z", output.clone())).unwrap_err();
    assert!(matches!(err, ReportError::EmptySelection { .. }));
    assert!(!output.exists());
}

#[test]
fn purchases_are_not_implemented_yet() {
    let data = dataset();
    let mut req = march("Granja A", temp_path("compras.pdf"));
    req.kind = "compras".parse().unwrap();
    let outcome = generate_report(&data, &req).unwrap();
    assert_eq!(outcome, ReportOutcome::NotImplemented(ReportKind::Purchases));
    assert!(!req.output.exists());
}

#[test]
fn full_run_from_disk_writes_pdf_charts_and_summary() {
    let input = temp_path("movimientos.csv");
    std::fs::write(&input, WORKBOOK).unwrap();
    let (data, load) = load_and_clean(&input).unwrap();
    assert_eq!(load.kept_rows, 6);

    let mut req = march("Granja A", temp_path("informe.pdf"));
    req.charts_dir = Some(temp_path("charts"));
    req.summary_json = Some(temp_path("summary.json"));

    match generate_report(&data, &req).unwrap() {
        ReportOutcome::Written { path, pages, sales_rows } => {
            assert_eq!(path, req.output);
            assert!(pages >= 2);
            assert_eq!(sales_rows, 3);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let pdf = std::fs::read(&req.output).unwrap();
    assert!(pdf.starts_with(b"%PDF"));

    let charts = req.charts_dir.as_ref().unwrap();
    assert!(charts.join("ventas_mensuales.svg").exists());
    assert!(charts.join("ventas_por_destino.svg").exists());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(req.summary_json.as_ref().unwrap()).unwrap()).unwrap();
    assert_eq!(json["sales_rows"], 3);

    let _ = std::fs::remove_file(&input);
    let _ = std::fs::remove_file(&req.output);
    let _ = std::fs::remove_dir_all(charts);
    let _ = std::fs::remove_file(req.summary_json.as_ref().unwrap());
}
