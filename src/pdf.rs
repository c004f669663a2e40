//! Positioned-text access to the manual's PDF.
//!
//! The extractor does not care where glyphs come from; it consumes the
//! [`Document`] trait, which yields pages of positioned text runs. The
//! production implementation sits on top of `lopdf` (object and stream
//! parsing is its problem) and interprets just enough of the text-showing
//! operators to recover each run's position, font, size and width.

use crate::cache::{BlockCache, Reader};
use anyhow::Context as _;
use lopdf::content::Content;
use lopdf::{Dictionary, Object, ObjectId};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;

/// One positioned run of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    /// Base font name with any subset prefix removed (`NeoSansIntel`).
    pub font: String,
    pub font_size: f64,
    /// Position of the run's left baseline end, in page units.
    pub x: f64,
    pub y: f64,
    /// Advance width of the whole run, in page units.
    pub width: f64,
    pub text: String,
}

/// One page of positioned text runs, unordered.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub number: u32,
    pub texts: Vec<Text>,
}

/// An opaque provider of positioned text glyphs.
pub trait Document {
    /// Number of pages in the document.
    fn page_count(&self) -> u32;
    /// Fetches one page by its 1-based number.
    fn page(&self, number: u32) -> anyhow::Result<Page>;
}

/// The `lopdf`-backed implementation used in production.
pub struct PdfDocument {
    doc: lopdf::Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl PdfDocument {
    /// Opens and parses `path`, reading through the block cache.
    pub fn open(path: &Path) -> anyhow::Result<PdfDocument> {
        let file = File::open(path)
            .with_context(|| format!("failed to open `{}`", path.display()))?;
        let len = file.metadata().context("failed to stat the manual")?.len();
        let reader = Reader::new(BlockCache::new(file), len);
        let doc = lopdf::Document::load_from(reader)
            .with_context(|| format!("failed to parse `{}`", path.display()))?;
        let pages = doc.get_pages();
        Ok(PdfDocument { doc, pages })
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        let mut object = object;
        let mut hops = 0;
        while let Object::Reference(id) = object {
            match self.doc.get_object(*id) {
                Ok(next) => object = next,
                Err(_) => break,
            }
            hops += 1;
            if hops > 16 {
                break;
            }
        }
        object
    }

    /// Collects the page's font resources, keyed by their resource name.
    fn page_fonts(&self, page_id: ObjectId) -> HashMap<Vec<u8>, FontInfo> {
        let mut fonts = HashMap::new();
        let (direct, inherited) = self.doc.get_page_resources(page_id);

        let mut resource_dicts: Vec<&Dictionary> = Vec::new();
        if let Some(dict) = direct {
            resource_dicts.push(dict);
        }
        for id in inherited {
            if let Ok(object) = self.doc.get_object(id) {
                if let Object::Dictionary(dict) = self.resolve(object) {
                    resource_dicts.push(dict);
                }
            }
        }

        for resources in resource_dicts {
            let font_dict = match resources.get(b"Font").map(|o| self.resolve(o)) {
                Ok(Object::Dictionary(dict)) => dict,
                _ => continue,
            };
            for (name, object) in font_dict.iter() {
                if let Object::Dictionary(font) = self.resolve(object) {
                    fonts
                        .entry(name.clone())
                        .or_insert_with(|| self.font_info(font));
                }
            }
        }
        fonts
    }

    fn font_info(&self, font: &Dictionary) -> FontInfo {
        let base_font = match font.get(b"BaseFont").map(|o| self.resolve(o)) {
            Ok(Object::Name(name)) => {
                let name = String::from_utf8_lossy(name);
                // Subset prefixes look like `EOODIA+NeoSansIntel`.
                match name.split_once('+') {
                    Some((_, base)) => base.to_string(),
                    None => name.into_owned(),
                }
            }
            _ => String::new(),
        };

        let first_char = match font.get(b"FirstChar").map(|o| self.resolve(o)) {
            Ok(Object::Integer(i)) => *i as u32,
            _ => 0,
        };

        let widths = match font.get(b"Widths").map(|o| self.resolve(o)) {
            Ok(Object::Array(values)) => values
                .iter()
                .filter_map(|v| number(self.resolve(v)))
                .collect(),
            _ => Vec::new(),
        };

        let missing_width = font
            .get(b"FontDescriptor")
            .map(|o| self.resolve(o))
            .ok()
            .and_then(|descriptor| match descriptor {
                Object::Dictionary(d) => d.get(b"MissingWidth").ok().map(|o| self.resolve(o)),
                _ => None,
            })
            .and_then(number)
            .unwrap_or(DEFAULT_GLYPH_WIDTH);

        FontInfo {
            base_font,
            first_char,
            widths,
            missing_width,
        }
    }
}

impl Document for PdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page(&self, number: u32) -> anyhow::Result<Page> {
        let &page_id = self
            .pages
            .get(&number)
            .with_context(|| format!("the manual has no page {}", number))?;
        let fonts = self.page_fonts(page_id);
        let content = self
            .doc
            .get_page_content(page_id)
            .with_context(|| format!("failed to read content of page {}", number))?;
        let content = Content::decode(&content)
            .with_context(|| format!("failed to decode content of page {}", number))?;
        Ok(interpret(number, &content.operations, &fonts))
    }
}

/// Glyph widths are expressed in thousandths of the font size.
const DEFAULT_GLYPH_WIDTH: f64 = 500.0;

struct FontInfo {
    base_font: String,
    first_char: u32,
    widths: Vec<f64>,
    missing_width: f64,
}

impl FontInfo {
    fn glyph_width(&self, code: u8) -> f64 {
        let index = (code as u32).wrapping_sub(self.first_char) as usize;
        self.widths
            .get(index)
            .copied()
            .unwrap_or(self.missing_width)
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Text-state machine over the page's content stream. Only the text
/// positioning and showing operators matter; graphics state is ignored
/// (the manual's text is never rotated).
fn interpret(
    page_number: u32,
    operations: &[lopdf::content::Operation],
    fonts: &HashMap<Vec<u8>, FontInfo>,
) -> Page {
    let mut page = Page {
        number: page_number,
        texts: Vec::new(),
    };

    let mut state = TextState::default();
    for op in operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "BT" => state.begin_text(),
            "ET" => {}
            "Tf" => {
                if let (Some(Object::Name(name)), Some(size)) =
                    (operands.get(0), operands.get(1).and_then(number))
                {
                    state.font = Some(name.clone());
                    state.size = size;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (
                    operands.get(0).and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    state.translate_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (
                    operands.get(0).and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    state.leading = -ty;
                    state.translate_line(tx, ty);
                }
            }
            "Tm" => {
                let mut m = [0f64; 6];
                if operands.len() >= 6 {
                    for (slot, operand) in m.iter_mut().zip(operands.iter()) {
                        *slot = number(operand).unwrap_or(0.0);
                    }
                    state.tm = m;
                    state.tlm = m;
                }
            }
            "T*" => state.next_line(),
            "TL" => {
                if let Some(tl) = operands.get(0).and_then(number) {
                    state.leading = tl;
                }
            }
            "Tc" => {
                if let Some(tc) = operands.get(0).and_then(number) {
                    state.char_spacing = tc;
                }
            }
            "Tw" => {
                if let Some(tw) = operands.get(0).and_then(number) {
                    state.word_spacing = tw;
                }
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.get(0) {
                    state.show(bytes, fonts, &mut page.texts);
                }
            }
            "'" => {
                state.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(0) {
                    state.show(bytes, fonts, &mut page.texts);
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (
                    operands.get(0).and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    state.word_spacing = aw;
                    state.char_spacing = ac;
                }
                state.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    state.show(bytes, fonts, &mut page.texts);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.get(0) {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => {
                                state.show(bytes, fonts, &mut page.texts)
                            }
                            other => {
                                if let Some(adjust) = number(other) {
                                    state.adjust(adjust);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    page
}

struct TextState {
    tm: [f64; 6],
    tlm: [f64; 6],
    font: Option<Vec<u8>>,
    size: f64,
    leading: f64,
    char_spacing: f64,
    word_spacing: f64,
}

impl Default for TextState {
    fn default() -> TextState {
        TextState {
            tm: IDENTITY,
            tlm: IDENTITY,
            font: None,
            size: 0.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
        }
    }
}

const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

impl TextState {
    fn begin_text(&mut self) {
        self.tm = IDENTITY;
        self.tlm = IDENTITY;
    }

    fn scale(&self) -> f64 {
        if self.tm[0] != 0.0 {
            self.tm[0].abs()
        } else {
            1.0
        }
    }

    fn translate_line(&mut self, tx: f64, ty: f64) {
        self.tlm[4] += tx * self.tlm[0] + ty * self.tlm[2];
        self.tlm[5] += tx * self.tlm[1] + ty * self.tlm[3];
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.leading;
        self.translate_line(0.0, -leading);
    }

    fn adjust(&mut self, amount: f64) {
        self.tm[4] -= amount / 1000.0 * self.size * self.scale();
    }

    fn show(
        &mut self,
        bytes: &[u8],
        fonts: &HashMap<Vec<u8>, FontInfo>,
        out: &mut Vec<Text>,
    ) {
        let font = self.font.as_ref().and_then(|name| fonts.get(name));
        let (font_name, text) = match font {
            Some(info) => (info.base_font.clone(), decode_text(bytes, &info.base_font)),
            None => (String::new(), decode_text(bytes, "")),
        };

        let mut width = 0.0f64;
        for &code in bytes {
            let glyph = font.map(|f| f.glyph_width(code)).unwrap_or(DEFAULT_GLYPH_WIDTH);
            width += glyph / 1000.0 * self.size + self.char_spacing;
            if code == b' ' {
                width += self.word_spacing;
            }
        }
        let width = width * self.scale();

        if !text.is_empty() {
            out.push(Text {
                font: font_name,
                font_size: self.size * self.scale(),
                x: self.tm[4],
                y: self.tm[5],
                width,
                text,
            });
        }
        self.tm[4] += width;
    }
}

/// Decodes a string's bytes. The manual's text fonts use WinAnsi-style
/// encodings; the Symbol font is special-cased for the handful of math
/// glyphs the instruction pages use.
fn decode_text(bytes: &[u8], font: &str) -> String {
    let symbol = font.contains("Symbol");
    bytes
        .iter()
        .map(|&b| {
            if symbol {
                return match b {
                    0xB9 => '≠',
                    0xA3 => '≤',
                    0xB3 => '≥',
                    0xB4 => '×',
                    other => other as char,
                };
            }
            match b {
                0x85 => '…',
                0x91 => '\u{2018}',
                0x92 => '\u{2019}',
                0x93 => '\u{201C}',
                0x94 => '\u{201D}',
                0x95 => '•',
                0x96 => '\u{2013}', // en dash
                0x97 => '\u{2014}', // em dash
                0xAE => '®',
                0x99 => '™',
                other => other as char,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_ansi_dashes() {
        assert_eq!(decode_text(b"A\x96B", "NeoSansIntel"), "A\u{2013}B");
        assert_eq!(decode_text(b"A\x97B", "NeoSansIntel"), "A\u{2014}B");
    }

    #[test]
    fn symbol_not_equal() {
        assert_eq!(decode_text(b"\xB9", "Symbol"), "≠");
    }

    #[test]
    fn text_state_advances_by_run_width() {
        let mut state = TextState::default();
        state.size = 10.0;
        let fonts = HashMap::new();
        let mut out = Vec::new();
        state.show(b"ab", &fonts, &mut out);
        assert_eq!(out.len(), 1);
        // Two default-width glyphs at 10pt: 2 * 500/1000 * 10.
        assert!((out[0].width - 10.0).abs() < 1e-9);
        assert!((state.tm[4] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn td_moves_the_line_origin() {
        let mut state = TextState::default();
        state.translate_line(10.0, -12.0);
        assert_eq!(state.tm[4], 10.0);
        assert_eq!(state.tm[5], -12.0);
        state.leading = 14.0;
        state.next_line();
        assert_eq!(state.tm[5], -26.0);
    }
}
