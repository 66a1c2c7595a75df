// PDF serialization of a laid-out `Document`.
//
// Uses the three standard Helvetica faces (no embedded fonts), WinAnsi text,
// and draws figures as vector paths scaled into their image boxes.
use crate::charts::{Anchor, Figure, Rgb, Shape};
use crate::error::Result;
use crate::layout::{Align, Cell, Document, FontStyle, ImageBlock};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream, StringFormat};
use std::path::Path;

const PT_PER_MM: f64 = 72.0 / 25.4;
/// Horizontal text padding inside a cell, as in classic PDF table writers.
const CELL_PADDING_MM: f64 = 1.0;
const LINE_WIDTH_MM: f64 = 0.2;

/// Helvetica advance widths (1/1000 em) for ASCII 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

fn font_name(style: FontStyle) -> &'static str {
    match style {
        FontStyle::Regular => "F1",
        FontStyle::Bold => "F2",
        FontStyle::Italic => "F3",
    }
}

/// Approximate rendered width in points. Bold runs about 5% wider.
fn text_width_pt(text: &str, size_pt: f64, bold: bool) -> f64 {
    let units: u32 = text
        .chars()
        .map(|c| {
            let code = c as u32;
            if (32..=126).contains(&code) {
                HELVETICA_WIDTHS[(code - 32) as usize] as u32
            } else {
                556
            }
        })
        .sum();
    let factor = if bold { 1.05 } else { 1.0 };
    units as f64 * size_pt / 1000.0 * factor
}

/// Encode for the standard fonts' WinAnsi encoding; unmappable characters become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            _ => b'?',
        })
        .collect()
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn op(name: &str, operands: Vec<Object>) -> Operation {
    Operation::new(name, operands)
}

fn rgb_operands(c: Rgb) -> Vec<Object> {
    vec![
        real(c.0 as f64 / 255.0),
        real(c.1 as f64 / 255.0),
        real(c.2 as f64 / 255.0),
    ]
}

struct PageWriter {
    height_pt: f64,
    ops: Vec<Operation>,
}

impl PageWriter {
    fn new(height_mm: f64) -> Self {
        Self {
            height_pt: height_mm * PT_PER_MM,
            ops: Vec::new(),
        }
    }

    fn text(&mut self, x_pt: f64, baseline_pt: f64, style: FontStyle, size_pt: f64, color: Rgb, text: &str) {
        self.ops.push(op("BT", vec![]));
        self.ops.push(op("rg", rgb_operands(color)));
        self.ops.push(op(
            "Tf",
            vec![Object::Name(font_name(style).as_bytes().to_vec()), real(size_pt)],
        ));
        self.ops.push(op("Td", vec![real(x_pt), real(baseline_pt)]));
        self.ops.push(op("Tj", vec![Object::String(win_ansi(text), StringFormat::Literal)]));
        self.ops.push(op("ET", vec![]));
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: Option<Rgb>, stroke: Option<Rgb>, line_pt: f64) {
        let paint = match (fill, stroke) {
            (Some(_), Some(_)) => "B",
            (Some(_), None) => "f",
            (None, Some(_)) => "S",
            (None, None) => return,
        };
        self.ops.push(op("q", vec![]));
        if let Some(c) = fill {
            self.ops.push(op("rg", rgb_operands(c)));
        }
        if let Some(c) = stroke {
            self.ops.push(op("RG", rgb_operands(c)));
            self.ops.push(op("w", vec![real(line_pt)]));
        }
        self.ops.push(op("re", vec![real(x), real(y), real(w), real(h)]));
        self.ops.push(op(paint, vec![]));
        self.ops.push(op("Q", vec![]));
    }

    fn cell(&mut self, cell: &Cell) {
        let k = PT_PER_MM;
        let x = cell.x * k;
        let y_bottom = self.height_pt - (cell.y + cell.h) * k;
        let stroke = if cell.border { Some(Rgb::BLACK) } else { None };
        self.rect(x, y_bottom, cell.w * k, cell.h * k, cell.fill, stroke, LINE_WIDTH_MM * k);

        if cell.text.is_empty() {
            return;
        }
        let size = cell.font.size;
        let tw = text_width_pt(&cell.text, size, cell.font.style == FontStyle::Bold);
        let pad = CELL_PADDING_MM * k;
        let tx = match cell.align {
            Align::Left => x + pad,
            Align::Center => x + (cell.w * k - tw) / 2.0,
        };
        // Vertically centered: baseline sits 0.3 em below the cell's midline.
        let baseline = self.height_pt - (cell.y + cell.h / 2.0) * k - 0.3 * size;
        self.text(tx, baseline, cell.font.style, size, Rgb::BLACK, &cell.text);
    }

    fn figure(&mut self, img: &ImageBlock) {
        let fig: &Figure = &img.figure;
        let s = img.w * PT_PER_MM / fig.width;
        let ox = img.x * PT_PER_MM;
        let oy = self.height_pt - img.y * PT_PER_MM;
        let map = |(fx, fy): (f64, f64)| (ox + fx * s, oy - fy * s);

        for shape in &fig.shapes {
            match shape {
                Shape::Rect { x, y, w, h, fill, stroke } => {
                    let (px, py) = map((*x, *y + *h));
                    self.rect(px, py, w * s, h * s, *fill, *stroke, 1.0 * s);
                }
                Shape::Polygon { points, fill, stroke } => {
                    let Some(first) = points.first() else { continue };
                    self.ops.push(op("q", vec![]));
                    self.ops.push(op("rg", rgb_operands(*fill)));
                    if let Some(c) = stroke {
                        self.ops.push(op("RG", rgb_operands(*c)));
                        self.ops.push(op("w", vec![real(1.0 * s)]));
                    }
                    let (mx, my) = map(*first);
                    self.ops.push(op("m", vec![real(mx), real(my)]));
                    for p in &points[1..] {
                        let (lx, ly) = map(*p);
                        self.ops.push(op("l", vec![real(lx), real(ly)]));
                    }
                    self.ops.push(op(if stroke.is_some() { "b" } else { "f" }, vec![]));
                    self.ops.push(op("Q", vec![]));
                }
                Shape::Line { from, to, color, width } => {
                    let (x1, y1) = map(*from);
                    let (x2, y2) = map(*to);
                    self.ops.push(op("q", vec![]));
                    self.ops.push(op("RG", rgb_operands(*color)));
                    self.ops.push(op("w", vec![real(width * s)]));
                    self.ops.push(op("m", vec![real(x1), real(y1)]));
                    self.ops.push(op("l", vec![real(x2), real(y2)]));
                    self.ops.push(op("S", vec![]));
                    self.ops.push(op("Q", vec![]));
                }
                Shape::Text { x, y, size, bold, anchor, color, text } => {
                    let size_pt = size * s;
                    let tw = text_width_pt(text, size_pt, *bold);
                    let (tx, ty) = map((*x, *y));
                    let tx = match anchor {
                        Anchor::Start => tx,
                        Anchor::Middle => tx - tw / 2.0,
                        Anchor::End => tx - tw,
                    };
                    let style = if *bold { FontStyle::Bold } else { FontStyle::Regular };
                    self.text(tx, ty, style, size_pt, *color, text);
                }
            }
        }
    }
}

/// Build the in-memory PDF for `doc`, one PDF page per layout page.
pub fn render_pdf(doc: &Document) -> Result<lopdf::Document> {
    let mut pdf = lopdf::Document::with_version("1.5");
    let pages_id = pdf.new_object_id();

    let mut fonts = lopdf::Dictionary::new();
    for (name, base) in [("F1", "Helvetica"), ("F2", "Helvetica-Bold"), ("F3", "Helvetica-Oblique")] {
        let id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base,
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(name, id);
    }
    let resources_id = pdf.add_object(dictionary! { "Font" => fonts });

    let mut kids: Vec<Object> = Vec::with_capacity(doc.pages.len());
    for page in &doc.pages {
        let mut writer = PageWriter::new(doc.height);
        for block in &page.blocks {
            match block {
                crate::layout::Block::Cell(c) => writer.cell(c),
                crate::layout::Block::Image(i) => writer.figure(i),
            }
        }
        let content = Content {
            operations: writer.ops,
        };
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(count),
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            real(doc.width * PT_PER_MM),
            real(doc.height * PT_PER_MM),
        ],
    };
    pdf.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = pdf.add_object(dictionary! {
        "Title" => Object::String(win_ansi(&doc.title), StringFormat::Literal),
        "Producer" => Object::string_literal("livestock_report"),
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);
    pdf.compress();
    Ok(pdf)
}

pub fn to_bytes(doc: &Document) -> Result<Vec<u8>> {
    let mut pdf = render_pdf(doc)?;
    let mut buf = Vec::new();
    pdf.save_to(&mut buf)?;
    Ok(buf)
}

pub fn write_pdf(doc: &Document, path: &Path) -> Result<()> {
    let mut pdf = render_pdf(doc)?;
    pdf.save(path)?;
    Ok(())
}
