// Paginated report layout.
//
// `DocumentBuilder` owns the cursor and the pages; every layout call takes it
// explicitly. Units are millimetres on an A4 landscape page with the origin
// at the top-left. The finished `Document` is handed to `pdf::write_pdf`.
use crate::charts::{kpi_strip, Figure, Rgb};
use crate::reports::{compute_kpis, group_by_brand, group_by_category};
use crate::types::{GroupTotals, Transaction};
use crate::util::{format_date, format_int, format_rounded, format_truncated, month_name};
use chrono::{Datelike, NaiveDate};

pub const PAGE_WIDTH: f64 = 297.0;
pub const PAGE_HEIGHT: f64 = 210.0;
pub const MARGIN: f64 = 10.0;
/// A cell whose bottom edge would pass this line goes to the next page.
pub const AUTO_BREAK_Y: f64 = PAGE_HEIGHT - 20.0;
/// New sections (a brand table, the summary) never start below this line.
pub const SECTION_BREAK_Y: f64 = 180.0;
pub const ROW_HEIGHT: f64 = 6.0;
const FOOTER_Y: f64 = PAGE_HEIGHT - 10.0;
const HEADER_FILL: Rgb = Rgb(230, 230, 230);

const DETAIL_HEADERS: [&str; 9] = [
    "Fecha", "Marca", "Categoría", "Cantidad", "Kg Totales",
    "Kg Promedio", "Destino", "Precio/kg", "Monto Total Gs.",
];
const DETAIL_WIDTHS: [f64; 9] = [25.0, 20.0, 38.0, 18.0, 25.0, 25.0, 50.0, 20.0, 30.0];
/// Subtotal borders sit only under the summed columns.
const SUBTOTAL_BORDERS: [bool; 9] = [false, false, false, true, true, true, false, true, true];

const SUMMARY_HEADERS: [&str; 5] = ["Categoría", "Cantidad Total", "Peso Promedio", "Precio/kg", "Monto Total Gs."];
const SUMMARY_WIDTHS: [f64; 5] = [50.0, 30.0, 40.0, 40.0, 40.0];

const CHART_WIDTH: f64 = 135.0;
const CHART_LEFT_X: f64 = MARGIN;
const CHART_RIGHT_X: f64 = PAGE_WIDTH - MARGIN - CHART_WIDTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Font {
    pub style: FontStyle,
    /// Points.
    pub size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// What a cell is for. The PDF writer ignores it; it keeps the document inspectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRole {
    PageHeader,
    Footer,
    Heading,
    TableHeader,
    Data,
    Subtotal,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub text: String,
    pub font: Font,
    pub align: Align,
    pub border: bool,
    pub fill: Option<Rgb>,
    pub role: CellRole,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub figure: Figure,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Cell(Cell),
    Image(ImageBlock),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Cell(c) => Some(c),
            Block::Image(_) => None,
        })
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageBlock> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Image(i) => Some(i),
            Block::Cell(_) => None,
        })
    }
}

/// A finished, immutable report.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub width: f64,
    pub height: f64,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.pages.iter().flat_map(|p| p.cells())
    }

    pub fn cells_with_role(&self, role: CellRole) -> impl Iterator<Item = &Cell> {
        self.cells().filter(move |c| c.role == role)
    }
}

/// Fixed column widths, centered horizontally on the page.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec<'a> {
    pub headers: &'a [&'a str],
    pub widths: &'a [f64],
}

impl TableSpec<'_> {
    pub fn total_width(&self) -> f64 {
        self.widths.iter().sum()
    }

    pub fn left(&self) -> f64 {
        (PAGE_WIDTH - self.total_width()) / 2.0
    }
}

pub struct DocumentBuilder {
    title: String,
    pages: Vec<Page>,
    x: f64,
    y: f64,
    font: Font,
    fill: Option<Rgb>,
    role: CellRole,
}

impl DocumentBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            pages: Vec::new(),
            x: MARGIN,
            y: MARGIN,
            font: Font {
                style: FontStyle::Regular,
                size: 10.0,
            },
            fill: None,
            role: CellRole::Heading,
        }
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn set_x(&mut self, x: f64) {
        self.x = x;
    }

    pub fn set_y(&mut self, y: f64) {
        self.x = MARGIN;
        self.y = y;
    }

    pub fn set_font(&mut self, style: FontStyle, size: f64) {
        self.font = Font { style, size };
    }

    /// Start a new page and draw the centered title header on it.
    pub fn add_page(&mut self) {
        self.pages.push(Page::default());
        self.x = MARGIN;
        self.y = MARGIN;

        let (font, fill, role) = (self.font, self.fill, self.role);
        self.fill = None;
        self.role = CellRole::PageHeader;
        self.set_font(FontStyle::Bold, 12.0);
        let title = self.title.clone();
        self.cell(0.0, 10.0, &title, false, Align::Center, true);
        self.ln(4.0);
        self.font = font;
        self.fill = fill;
        self.role = role;
    }

    /// Move to the next line: back to the left margin, `h` millimetres down.
    pub fn ln(&mut self, h: f64) {
        self.x = MARGIN;
        self.y += h;
    }

    /// Start a new page if the cursor is already past `threshold`.
    pub fn break_if_below(&mut self, threshold: f64) -> bool {
        if self.pages.is_empty() || self.y > threshold {
            self.add_page();
            return true;
        }
        false
    }

    /// Place a text cell at the cursor. `w == 0` extends to the right margin.
    /// With `newline` the cursor moves to the start of the next line,
    /// otherwise it moves right by `w`.
    pub fn cell(&mut self, w: f64, h: f64, text: &str, border: bool, align: Align, newline: bool) {
        if self.pages.is_empty() {
            self.add_page();
        }
        if self.role != CellRole::PageHeader && self.y + h > AUTO_BREAK_Y {
            let x = self.x;
            self.add_page();
            self.x = x;
        }
        let w = if w == 0.0 { PAGE_WIDTH - MARGIN - self.x } else { w };
        let cell = Cell {
            x: self.x,
            y: self.y,
            w,
            h,
            text: text.to_string(),
            font: self.font,
            align,
            border,
            fill: self.fill,
            role: self.role,
        };
        self.current_page().blocks.push(Block::Cell(cell));
        if newline {
            self.ln(h);
        } else {
            self.x += w;
        }
    }

    /// Place a figure `w` wide at `x`. With `y == None` it flows at the cursor
    /// and the cursor moves below it; with a fixed `y` the cursor is untouched.
    pub fn image(&mut self, figure: Figure, x: f64, y: Option<f64>, w: f64) {
        if self.pages.is_empty() {
            self.add_page();
        }
        let h = w * figure.aspect();
        let y = match y {
            Some(y) => y,
            None => {
                if self.y + h > AUTO_BREAK_Y {
                    self.add_page();
                }
                let top = self.y;
                self.y += h;
                top
            }
        };
        self.current_page()
            .blocks
            .push(Block::Image(ImageBlock { x, y, w, h, figure }));
    }

    fn with_role(&mut self, role: CellRole, f: impl FnOnce(&mut Self)) {
        let prev = self.role;
        self.role = role;
        f(self);
        self.role = prev;
    }

    /// Full-width italic notice used in place of any section that has no data.
    pub fn warning(&mut self, message: &str) {
        self.set_font(FontStyle::Italic, 10.0);
        self.with_role(CellRole::Warning, |b| {
            b.cell(0.0, 10.0, message, false, Align::Left, true)
        });
    }

    pub fn heading(&mut self, text: &str, size: f64, x: f64) {
        self.set_font(FontStyle::Bold, size);
        self.set_x(x);
        self.with_role(CellRole::Heading, |b| {
            b.cell(0.0, 10.0, text, false, Align::Left, true)
        });
    }

    pub fn table_header(&mut self, spec: &TableSpec<'_>) {
        self.set_font(FontStyle::Bold, 8.0);
        self.fill = Some(HEADER_FILL);
        self.set_x(spec.left());
        self.with_role(CellRole::TableHeader, |b| {
            for (text, w) in spec.headers.iter().zip(spec.widths) {
                b.cell(*w, ROW_HEIGHT, text, true, Align::Center, false);
            }
        });
        self.fill = None;
        self.ln(ROW_HEIGHT);
    }

    /// One body row. `borders` masks individual cells; `None` borders them all.
    pub fn table_row(&mut self, spec: &TableSpec<'_>, values: &[String], bold: bool, borders: Option<&[bool]>) {
        debug_assert_eq!(values.len(), spec.widths.len());
        let style = if bold { FontStyle::Bold } else { FontStyle::Regular };
        self.set_font(style, 8.0);
        self.set_x(spec.left());
        let role = if bold { CellRole::Subtotal } else { CellRole::Data };
        self.with_role(role, |b| {
            for (i, (value, w)) in values.iter().zip(spec.widths).enumerate() {
                let border = borders.map_or(true, |mask| mask.get(i).copied().unwrap_or(true));
                b.cell(*w, ROW_HEIGHT, value, border, Align::Center, false);
            }
        });
        self.ln(ROW_HEIGHT);
    }

    fn current_page(&mut self) -> &mut Page {
        if self.pages.is_empty() {
            self.pages.push(Page::default());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Stamp the `Página N / Total` footer on every page and freeze the document.
    pub fn finish(mut self) -> Document {
        let total = self.pages.len();
        for (i, page) in self.pages.iter_mut().enumerate() {
            page.blocks.push(Block::Cell(Cell {
                x: MARGIN,
                y: FOOTER_Y,
                w: PAGE_WIDTH - 2.0 * MARGIN,
                h: 10.0,
                text: format!("Página {} / {}", i + 1, total),
                font: Font {
                    style: FontStyle::Italic,
                    size: 8.0,
                },
                align: Align::Center,
                border: false,
                fill: None,
                role: CellRole::Footer,
            }));
        }
        Document {
            title: self.title,
            width: PAGE_WIDTH,
            height: PAGE_HEIGHT,
            pages: self.pages,
        }
    }
}

/// KPI card strip for sales up to `end`. Falls back to a warning when `sales` is empty.
pub fn add_kpis(b: &mut DocumentBuilder, sales: &[Transaction], establishment: &str, end: NaiveDate) {
    if sales.is_empty() {
        b.warning("No hay datos para KPIs de ventas.");
        return;
    }
    let title = format!("Ventas Acumuladas hasta {} - {}", format_date(end), establishment);
    let figure = kpi_strip(&compute_kpis(sales), &title);
    b.image(figure, MARGIN, None, PAGE_WIDTH - 2.0 * MARGIN);
    b.ln(2.0);
}

pub fn add_period_heading(b: &mut DocumentBuilder, establishment: &str, start: NaiveDate, end: NaiveDate) {
    let text = format!(
        "Ventas de {} {} ({} a {}) - {}",
        month_name(end.month()),
        end.year(),
        format_date(start),
        format_date(end),
        establishment
    );
    b.heading(&text, 11.0, MARGIN);
}

fn detail_row(t: &Transaction) -> Vec<String> {
    vec![
        format_date(t.date),
        t.brand.clone(),
        t.category.clone(),
        format_int(t.quantity),
        format_int(t.total_weight_kg),
        format_int(t.avg_weight_kg.unwrap_or(0)),
        t.destination.clone(),
        format_int(t.price_per_kg),
        format_int(t.amount_gs),
    ]
}

fn subtotal_row(g: &GroupTotals) -> Vec<String> {
    vec![
        String::new(),
        String::new(),
        String::new(),
        format_int(g.quantity),
        format_int(g.weight_kg),
        format_truncated(g.avg_weight_kg),
        String::new(),
        format_truncated(g.price_per_kg),
        format_int(g.amount_gs),
    ]
}

fn summary_row(g: &GroupTotals) -> Vec<String> {
    vec![
        g.key.clone(),
        format_int(g.quantity),
        format_rounded(g.avg_weight_kg),
        format_truncated(g.price_per_kg),
        format_int(g.amount_gs),
    ]
}

/// One detail table per brand, each closed by a bold subtotal row, followed
/// by the per-category summary. Empty input renders a single warning instead.
pub fn add_sales_tables(b: &mut DocumentBuilder, sales: &[Transaction]) {
    if sales.is_empty() {
        b.warning("No se encontraron ventas para el rango seleccionado.");
        return;
    }

    let detail = TableSpec {
        headers: &DETAIL_HEADERS,
        widths: &DETAIL_WIDTHS,
    };
    for group in group_by_brand(sales) {
        b.break_if_below(SECTION_BREAK_Y);
        b.heading(&format!("Marca: {}", group.totals.key), 10.0, detail.left());
        b.table_header(&detail);
        for t in &group.rows {
            b.table_row(&detail, &detail_row(t), false, None);
        }
        b.table_row(&detail, &subtotal_row(&group.totals), true, Some(&SUBTOTAL_BORDERS));
        b.ln(10.0);
    }

    add_category_summary(b, &group_by_category(sales));
}

pub fn add_category_summary(b: &mut DocumentBuilder, groups: &[GroupTotals]) {
    if groups.is_empty() {
        b.warning("No hay categorías para resumir.");
        return;
    }
    let summary = TableSpec {
        headers: &SUMMARY_HEADERS,
        widths: &SUMMARY_WIDTHS,
    };
    b.break_if_below(SECTION_BREAK_Y);
    b.heading("Resumen por Categoría", 12.0, summary.left());
    b.table_header(&summary);
    for g in groups {
        b.table_row(&summary, &summary_row(g), false, None);
    }
}

fn chart_slot(b: &mut DocumentBuilder, figure: Option<Figure>, x: f64, top: f64, missing: &str) {
    match figure {
        Some(fig) => b.image(fig, x, Some(top), CHART_WIDTH),
        None => {
            b.set_y(top);
            b.set_x(x);
            b.set_font(FontStyle::Italic, 10.0);
            b.with_role(CellRole::Warning, |b| {
                b.cell(CHART_WIDTH, 10.0, missing, false, Align::Left, true)
            });
        }
    }
}

/// A fresh page with the monthly chart on the left and the destination chart on the right.
pub fn add_chart_page(b: &mut DocumentBuilder, monthly: Option<Figure>, destinations: Option<Figure>) {
    b.add_page();
    let top = b.y();
    let bottom = [monthly.as_ref(), destinations.as_ref()]
        .iter()
        .flatten()
        .map(|f| top + CHART_WIDTH * f.aspect())
        .fold(top + 10.0, f64::max);
    chart_slot(b, monthly, CHART_LEFT_X, top, "No hay datos de ventas para graficar.");
    chart_slot(b, destinations, CHART_RIGHT_X, top, "No hay datos de ventas para gráfico de destino.");
    b.set_y(bottom + 2.0);
}
