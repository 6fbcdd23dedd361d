//! PDF writer for a [`Document`].
//!
//! A4 portrait, builtin fonts only (Helvetica for prose, Courier for
//! tables), so no font files are needed at runtime. Tables are laid out on a
//! monospace character grid; cells wrap inside their column and header rows
//! repeat on continuation pages.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rgb,
};
use tracing::debug;

use pgreport_core::classify::Tone;
use pgreport_core::fmt::fit;

use crate::document::{Block, Cell, Document, Table};

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 15.0;
const FOOTER_Y: f32 = 8.0;

const PT_TO_MM: f32 = 0.3528;
const TITLE_PT: f32 = 18.0;
const HEADING_PT: f32 = 14.0;
const SUBHEADING_PT: f32 = 11.0;
const BODY_PT: f32 = 9.0;
const NOTE_PT: f32 = 8.0;
const TABLE_PT: f32 = 7.0;

/// Courier advance width is 600/1000 em.
const MONO_ADVANCE: f32 = 0.6;
/// Average Helvetica advance, used for wrapping prose.
const PROP_ADVANCE: f32 = 0.5;

/// Error type for PDF output.
#[derive(Debug)]
pub enum PdfError {
    /// Output file could not be created.
    Io(std::io::Error),
    /// PDF encoding failed.
    Pdf(String),
}

impl std::fmt::Display for PdfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PdfError::Io(e) => write!(f, "I/O error: {}", e),
            PdfError::Pdf(msg) => write!(f, "PDF error: {}", msg),
        }
    }
}

impl std::error::Error for PdfError {}

impl From<std::io::Error> for PdfError {
    fn from(e: std::io::Error) -> Self {
        PdfError::Io(e)
    }
}

fn pdf_err(e: printpdf::Error) -> PdfError {
    PdfError::Pdf(format!("{:?}", e))
}

/// Lays out `doc` and writes it to `path`. Returns the page count.
pub fn write(doc: &Document, path: &Path) -> Result<usize, PdfError> {
    let (pdf, page, layer) = PdfDocument::new(&doc.title, Mm(PAGE_W), Mm(PAGE_H), "content");
    let fonts = Fonts {
        regular: pdf.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?,
        bold: pdf.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?,
        mono: pdf.add_builtin_font(BuiltinFont::Courier).map_err(pdf_err)?,
        mono_bold: pdf.add_builtin_font(BuiltinFont::CourierBold).map_err(pdf_err)?,
    };
    let layer = pdf.get_page(page).get_layer(layer);

    let mut w = Writer {
        pdf,
        fonts,
        layer,
        y: PAGE_H - MARGIN,
        pages: 1,
        footer: doc.footer.clone(),
    };
    w.draw_footer();

    for block in &doc.blocks {
        match block {
            Block::Title(text) => w.heading(text, TITLE_PT, 6.0),
            Block::Heading(text) => w.heading(text, HEADING_PT, 4.0),
            Block::Subheading(text) => w.heading(text, SUBHEADING_PT, 2.0),
            Block::Paragraph(text) => w.paragraph(text, BODY_PT),
            Block::Note(text) => w.paragraph(text, NOTE_PT),
            Block::Table(table) => w.table(table),
            Block::PageBreak => w.new_page(),
        }
    }

    let pages = w.pages;
    let file = File::create(path)?;
    w.pdf.save(&mut BufWriter::new(file)).map_err(pdf_err)?;
    debug!(path = %path.display(), pages, "PDF written");
    Ok(pages)
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    mono: IndirectFontRef,
    mono_bold: IndirectFontRef,
}

struct Writer {
    pdf: PdfDocumentReference,
    fonts: Fonts,
    layer: PdfLayerReference,
    /// Baseline cursor in mm from the bottom edge.
    y: f32,
    pages: usize,
    footer: String,
}

impl Writer {
    fn new_page(&mut self) {
        let (page, layer) = self.pdf.add_page(Mm(PAGE_W), Mm(PAGE_H), "content");
        self.layer = self.pdf.get_page(page).get_layer(layer);
        self.y = PAGE_H - MARGIN;
        self.pages += 1;
        self.draw_footer();
    }

    /// Starts a new page unless `height` mm still fit above the bottom margin.
    fn ensure(&mut self, height: f32) {
        if self.y - height < MARGIN {
            self.new_page();
        }
    }

    fn draw_footer(&self) {
        let text = format!("{}   page {}", self.footer, self.pages);
        self.set_color(None);
        self.layer.use_text(
            pdf_safe(&text),
            NOTE_PT,
            Mm(MARGIN),
            Mm(FOOTER_Y),
            &self.fonts.regular,
        );
    }

    fn heading(&mut self, text: &str, size: f32, space_after: f32) {
        let line = line_height(size);
        // Keep a heading together with at least a few lines of what follows.
        self.ensure(line + space_after + 4.0 * line_height(TABLE_PT));
        self.y -= line;
        self.set_color(None);
        self.layer
            .use_text(pdf_safe(text), size, Mm(MARGIN), Mm(self.y), &self.fonts.bold);
        self.y -= space_after;
    }

    fn paragraph(&mut self, text: &str, size: f32) {
        let width = chars_per_line(PAGE_W - 2.0 * MARGIN, size, PROP_ADVANCE);
        self.set_color(None);
        for line in wrap(text, width) {
            self.ensure(line_height(size));
            self.y -= line_height(size);
            self.layer
                .use_text(pdf_safe(&line), size, Mm(MARGIN), Mm(self.y), &self.fonts.regular);
        }
        self.y -= 2.0;
    }

    fn table(&mut self, table: &Table) {
        let lh = line_height(TABLE_PT);
        let char_mm = TABLE_PT * PT_TO_MM * MONO_ADVANCE;

        let mut xs = Vec::with_capacity(table.columns.len());
        let mut x = MARGIN;
        for col in &table.columns {
            xs.push(x);
            x += (col.width + 1) as f32 * char_mm;
        }
        let right = x - char_mm;

        self.ensure(2.0 * lh + 1.0);
        self.table_header(table, &xs, right);

        for row in &table.rows {
            let wrapped: Vec<Vec<String>> = table
                .columns
                .iter()
                .zip(row)
                .map(|(col, cell)| wrap(&cell.text, col.width))
                .collect();
            let lines = wrapped.iter().map(Vec::len).max().unwrap_or(1).max(1);
            let height = lines as f32 * lh;

            if self.y - height < MARGIN {
                self.new_page();
                self.table_header(table, &xs, right);
            }

            for (i, (cell, cell_lines)) in row.iter().zip(&wrapped).enumerate() {
                self.set_color(Some(cell));
                for (n, text) in cell_lines.iter().enumerate() {
                    self.layer.use_text(
                        pdf_safe(text),
                        TABLE_PT,
                        Mm(xs[i]),
                        Mm(self.y - (n + 1) as f32 * lh),
                        &self.fonts.mono,
                    );
                }
            }
            self.y -= height;
        }
        self.set_color(None);
        self.y -= 4.0;
    }

    fn table_header(&mut self, table: &Table, xs: &[f32], right: f32) {
        let lh = line_height(TABLE_PT);
        self.y -= lh;
        self.set_color(None);
        for (col, &x) in table.columns.iter().zip(xs) {
            self.layer.use_text(
                pdf_safe(&fit(col.title, col.width)),
                TABLE_PT,
                Mm(x),
                Mm(self.y),
                &self.fonts.mono_bold,
            );
        }
        self.y -= 1.0;
        self.rule(right);
        self.y -= 0.5;
    }

    fn rule(&self, right: f32) {
        self.layer.set_outline_color(Color::Rgb(Rgb::new(0.5, 0.5, 0.5, None)));
        self.layer.set_outline_thickness(0.5);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(self.y)), false),
                (Point::new(Mm(right), Mm(self.y)), false),
            ],
            is_closed: false,
        });
    }

    /// Fill color for the next text: status tone when the cell has one, black otherwise.
    fn set_color(&self, cell: Option<&Cell>) {
        let (r, g, b) = match cell.and_then(|c| c.status).map(|s| s.tone()) {
            Some(Tone::Bad) => (0.80, 0.0, 0.0),
            Some(Tone::Caution) => (0.93, 0.50, 0.0),
            Some(Tone::Ok) => (0.0, 0.55, 0.0),
            None => (0.0, 0.0, 0.0),
        };
        self.layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
    }
}

fn line_height(size_pt: f32) -> f32 {
    size_pt * PT_TO_MM * 1.35
}

fn chars_per_line(width_mm: f32, size_pt: f32, advance: f32) -> usize {
    ((width_mm / (size_pt * PT_TO_MM * advance)) as usize).max(1)
}

/// Greedy word wrap to `width` characters; words longer than a line are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        loop {
            let used = current.chars().count();
            let sep = usize::from(used > 0);
            if used + sep + word.len() <= width {
                if sep == 1 {
                    current.push(' ');
                }
                current.extend(word.iter());
                break;
            }
            if used > 0 {
                lines.push(std::mem::take(&mut current));
                continue;
            }
            // Word alone is wider than a line.
            let rest = word.split_off(width);
            lines.push(word.iter().collect());
            word = rest;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Builtin fonts are written without an embedded encoding; keep to printable ASCII.
fn pdf_safe(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Column, Document};
    use pgreport_core::classify::Status;

    #[test]
    fn wrap_words() {
        assert_eq!(wrap("SELECT a FROM t", 8), vec!["SELECT a", "FROM t"]);
        assert_eq!(wrap("", 10), vec![""]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("  spaced   out  ", 20), vec!["spaced out"]);
    }

    #[test]
    fn wrap_respects_width() {
        let text = "SELECT id, name, email FROM users WHERE created_at > now() - interval '1 day'";
        for line in wrap(text, 12) {
            assert!(line.chars().count() <= 12, "{line:?}");
        }
    }

    #[test]
    fn pdf_safe_replaces_unsupported_chars() {
        assert_eq!(pdf_safe("café"), "caf?");
        assert_eq!(pdf_safe("ok \u{2713}"), "ok ?");
        assert_eq!(pdf_safe("a\tb"), "a?b");
    }

    #[test]
    fn writes_multi_page_document() {
        let mut table = Table {
            columns: vec![
                Column { title: "Name", width: 40 },
                Column { title: "Status", width: 12 },
            ],
            rows: Vec::new(),
        };
        for i in 0..200 {
            table.rows.push(vec![
                Cell::text(format!("public.table_{i}")),
                Cell::status(if i % 2 == 0 { Status::Good } else { Status::Critical }),
            ]);
        }
        let doc = Document {
            title: "test".to_string(),
            footer: "pgreport test".to_string(),
            blocks: vec![
                Block::Title("Report".to_string()),
                Block::Paragraph("Generated: now".to_string()),
                Block::Table(table),
                Block::PageBreak,
                Block::Heading("End".to_string()),
            ],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        let pages = write(&doc, &path).unwrap();

        assert!(pages >= 3, "pages = {pages}");
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn unwritable_path_is_an_io_error() {
        let doc = Document {
            title: "t".to_string(),
            footer: String::new(),
            blocks: Vec::new(),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.pdf");
        assert!(matches!(write(&doc, &path), Err(PdfError::Io(_))));
    }
}
