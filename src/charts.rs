// Chart rendering.
//
// A `Figure` is a vector scene, not a raster image: shapes and text laid out
// on a fixed pixel canvas. It stays in memory attached to the document, and
// the PDF writer draws it as paths scaled into whatever box the layout gives
// it. No image file is ever written for the PDF; `save_svg` is only for
// exporting a chart on its own.
use crate::types::{DestinationShare, Kpis, MonthlyPivot};
use crate::reports::kpi_rows;
use crate::util::{format_int, month_label};
use std::f64::consts::PI;
use std::path::Path;
use svg::node::element::{Line, Polygon, Rectangle, Text};
use svg::node::Text as TextNode;
use svg::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const GRID: Rgb = Rgb(225, 229, 237);
    pub const AXIS: Rgb = Rgb(68, 68, 68);

    fn css(self) -> String {
        format!("rgb({},{},{})", self.0, self.1, self.2)
    }
}

const PALETTE: [Rgb; 10] = [
    Rgb(99, 110, 250),
    Rgb(239, 85, 59),
    Rgb(0, 204, 150),
    Rgb(171, 99, 250),
    Rgb(255, 161, 90),
    Rgb(25, 211, 243),
    Rgb(255, 102, 146),
    Rgb(182, 232, 128),
    Rgb(255, 151, 255),
    Rgb(254, 203, 82),
];

fn palette(i: usize) -> Rgb {
    PALETTE[i % PALETTE.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

/// Drawing primitives, in pixels with the origin at the top-left.
/// `Text::y` is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        fill: Option<Rgb>,
        stroke: Option<Rgb>,
    },
    Polygon {
        points: Vec<(f64, f64)>,
        fill: Rgb,
        stroke: Option<Rgb>,
    },
    Line {
        from: (f64, f64),
        to: (f64, f64),
        color: Rgb,
        width: f64,
    },
    Text {
        x: f64,
        y: f64,
        size: f64,
        bold: bool,
        anchor: Anchor,
        color: Rgb,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub width: f64,
    pub height: f64,
    pub shapes: Vec<Shape>,
}

impl Figure {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            shapes: vec![Shape::Rect {
                x: 0.0,
                y: 0.0,
                w: width,
                h: height,
                fill: Some(Rgb::WHITE),
                stroke: None,
            }],
        }
    }

    /// Height over width; the layout keeps this when scaling.
    pub fn aspect(&self) -> f64 {
        self.height / self.width
    }

    fn text(&mut self, x: f64, y: f64, size: f64, bold: bool, anchor: Anchor, text: impl Into<String>) {
        self.shapes.push(Shape::Text {
            x,
            y,
            size,
            bold,
            anchor,
            color: Rgb::BLACK,
            text: text.into(),
        });
    }

    fn line(&mut self, from: (f64, f64), to: (f64, f64), color: Rgb, width: f64) {
        self.shapes.push(Shape::Line {
            from,
            to,
            color,
            width,
        });
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: Option<Rgb>, stroke: Option<Rgb>) {
        self.shapes.push(Shape::Rect {
            x,
            y,
            w,
            h,
            fill,
            stroke,
        });
    }

    pub fn to_svg(&self) -> Document {
        self.shapes
            .iter()
            .fold(Document::new(), |doc, shape| match shape {
                Shape::Rect { x, y, w, h, fill, stroke } => doc.add(
                    Rectangle::new()
                        .set("x", *x)
                        .set("y", *y)
                        .set("width", *w)
                        .set("height", *h)
                        .set("fill", fill.map(Rgb::css).unwrap_or_else(|| "none".to_string()))
                        .set("stroke", stroke.map(Rgb::css).unwrap_or_else(|| "none".to_string())),
                ),
                Shape::Polygon { points, fill, stroke } => doc.add(
                    Polygon::new()
                        .set(
                            "points",
                            points
                                .iter()
                                .map(|(x, y)| format!("{:.2},{:.2}", x, y))
                                .collect::<Vec<_>>()
                                .join(" "),
                        )
                        .set("fill", fill.css())
                        .set("stroke", stroke.map(Rgb::css).unwrap_or_else(|| "none".to_string())),
                ),
                Shape::Line { from, to, color, width } => doc.add(
                    Line::new()
                        .set("x1", from.0)
                        .set("y1", from.1)
                        .set("x2", to.0)
                        .set("y2", to.1)
                        .set("stroke", color.css())
                        .set("stroke-width", *width),
                ),
                Shape::Text { x, y, size, bold, anchor, color, text } => doc.add(
                    Text::new()
                        .set("x", *x)
                        .set("y", *y)
                        .set("font-family", "Helvetica, Arial, sans-serif")
                        .set("font-size", *size)
                        .set("font-weight", if *bold { "bold" } else { "normal" })
                        .set(
                            "text-anchor",
                            match anchor {
                                Anchor::Start => "start",
                                Anchor::Middle => "middle",
                                Anchor::End => "end",
                            },
                        )
                        .set("fill", color.css())
                        .add(TextNode::new(text.clone())),
                ),
            })
            .set("viewBox", (0.0, 0.0, self.width, self.height))
            .set("width", self.width)
            .set("height", self.height)
    }

    pub fn save_svg(&self, path: &Path) -> std::io::Result<()> {
        svg::save(path, &self.to_svg())
    }
}

/// Smallest "round" value (1, 2, 2.5 or 5 times a power of ten) at or above `v`.
fn nice_ceiling(v: f64) -> f64 {
    if v <= 0.0 {
        return 1.0;
    }
    let mag = 10f64.powi(v.log10().floor() as i32);
    [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|m| m * mag)
        .find(|c| *c >= v)
        .unwrap_or(10.0 * mag)
}

/// The five headline numbers as a strip of bordered cards under a title.
pub fn kpi_strip(kpis: &Kpis, title: &str) -> Figure {
    let (width, height) = (1800.0, 350.0);
    let mut fig = Figure::new(width, height);
    fig.text(width / 2.0, 45.0, 30.0, false, Anchor::Middle, title);

    let rows = kpi_rows(kpis);
    let (left, right, gap) = (90.0, 1710.0, 36.0);
    let n = rows.len() as f64;
    let card_w = (right - left - gap * (n - 1.0)) / n;
    let (card_y, card_h) = (80.0, 220.0);
    for (i, row) in rows.iter().enumerate() {
        let x = left + i as f64 * (card_w + gap);
        fig.rect(x, card_y, card_w, card_h, Some(Rgb::WHITE), Some(Rgb::BLACK));
        let cx = x + card_w / 2.0;
        fig.text(cx, card_y + 100.0, 44.0, true, Anchor::Middle, row.value.clone());
        fig.text(cx, card_y + 150.0, 28.0, false, Anchor::Middle, row.label.clone());
    }
    fig
}

/// Stacked columns: one column per month, one colored segment per category.
/// `None` when there is nothing to draw.
pub fn stacked_bar(pivot: &MonthlyPivot) -> Option<Figure> {
    if pivot.is_empty() || pivot.categories.is_empty() {
        return None;
    }
    let (width, height) = (1000.0, 500.0);
    let (left, right, top, bottom) = (80.0, 800.0, 70.0, 420.0);
    let plot_h = bottom - top;
    let mut fig = Figure::new(width, height);
    fig.text(left, 36.0, 20.0, false, Anchor::Start, "Distribución mensual de ventas por categoría");

    let max_total = (0..pivot.months.len())
        .map(|m| pivot.month_total(m))
        .max()
        .unwrap_or(0);
    let y_max = nice_ceiling(max_total as f64);
    let to_y = |v: f64| bottom - v / y_max * plot_h;

    for tick in 0..=5 {
        let v = y_max * tick as f64 / 5.0;
        let y = to_y(v);
        fig.line((left, y), (right, y), Rgb::GRID, 1.0);
        fig.text(left - 8.0, y + 4.0, 12.0, false, Anchor::End, format_int(v.round() as i64));
    }
    fig.text(left - 8.0, top - 14.0, 13.0, false, Anchor::End, "Cantidad");

    let slot = (right - left) / pivot.months.len() as f64;
    let bar_w = slot * 0.6;
    let mut base = vec![0.0f64; pivot.months.len()];
    for (c, series) in pivot.quantities.iter().enumerate() {
        let color = palette(c);
        for (m, qty) in series.iter().enumerate() {
            if *qty <= 0 {
                continue;
            }
            let x = left + slot * m as f64 + (slot - bar_w) / 2.0;
            let y_top = to_y(base[m] + *qty as f64);
            let h = to_y(base[m]) - y_top;
            fig.rect(x, y_top, bar_w, h, Some(color), Some(Rgb::WHITE));
            if h >= 14.0 {
                fig.text(x + bar_w / 2.0, y_top + h / 2.0 + 4.0, 11.0, false, Anchor::Middle, format_int(*qty));
            }
            base[m] += *qty as f64;
        }
    }

    fig.line((left, bottom), (right, bottom), Rgb::AXIS, 1.5);
    fig.line((left, top), (left, bottom), Rgb::AXIS, 1.5);
    for (m, ym) in pivot.months.iter().enumerate() {
        let cx = left + slot * (m as f64 + 0.5);
        fig.text(cx, bottom + 20.0, 12.0, false, Anchor::Middle, month_label(*ym));
    }
    fig.text((left + right) / 2.0, bottom + 50.0, 13.0, false, Anchor::Middle, "Mes");

    legend(&mut fig, 830.0, 80.0, "Categoría", &pivot.categories);
    Some(fig)
}

fn legend(fig: &mut Figure, x: f64, y: f64, title: &str, names: &[String]) {
    fig.text(x, y, 13.0, true, Anchor::Start, title);
    for (i, name) in names.iter().enumerate() {
        let row_y = y + 16.0 + i as f64 * 22.0;
        fig.rect(x, row_y, 14.0, 14.0, Some(palette(i)), None);
        fig.text(x + 22.0, row_y + 12.0, 12.0, false, Anchor::Start, name.clone());
    }
}

fn arc_point(cx: f64, cy: f64, r: f64, angle: f64) -> (f64, f64) {
    // Angle is clockwise from twelve o'clock.
    (cx + r * angle.sin(), cy - r * angle.cos())
}

/// Percentage with one decimal and a decimal comma, e.g. `33,3%`.
fn percent_label(share: f64) -> String {
    format!("{:.1}%", share * 100.0).replace('.', ",")
}

/// Donut chart of quantity per destination. `None` when there is nothing to draw.
pub fn pie(shares: &[DestinationShare]) -> Option<Figure> {
    let total = shares
        .iter()
        .fold(0i64, |acc, s| acc.saturating_add(s.quantity.max(0)));
    if total <= 0 {
        return None;
    }
    let (width, height) = (1000.0, 500.0);
    let (cx, cy, r) = (330.0, 270.0, 190.0);
    let inner = r * 0.3;
    let mut fig = Figure::new(width, height);
    fig.text(80.0, 36.0, 20.0, false, Anchor::Start, "Distribución de ventas por destino");

    let mut start = 0.0f64;
    for (i, share) in shares.iter().enumerate() {
        let qty = share.quantity.max(0);
        if qty == 0 {
            continue;
        }
        let frac = qty as f64 / total as f64;
        let sweep = frac * 2.0 * PI;
        let steps = ((sweep.to_degrees() / 3.0).ceil() as usize).max(2);
        let mut points: Vec<(f64, f64)> = (0..=steps)
            .map(|k| arc_point(cx, cy, r, start + sweep * k as f64 / steps as f64))
            .collect();
        points.extend((0..=steps).rev().map(|k| arc_point(cx, cy, inner, start + sweep * k as f64 / steps as f64)));
        fig.shapes.push(Shape::Polygon {
            points,
            fill: palette(i),
            stroke: Some(Rgb::WHITE),
        });

        if frac >= 0.04 {
            let (lx, ly) = arc_point(cx, cy, (r + inner) / 2.0, start + sweep / 2.0);
            fig.text(lx, ly - 2.0, 12.0, false, Anchor::Middle, share.destination.clone());
            fig.text(lx, ly + 13.0, 12.0, true, Anchor::Middle, percent_label(frac));
        }
        start += sweep;
    }

    let names: Vec<String> = shares.iter().map(|s| s.destination.clone()).collect();
    legend(&mut fig, 620.0, 100.0, "Destino / Origen", &names);
    Some(fig)
}
