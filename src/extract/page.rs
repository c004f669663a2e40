//! Page segmentation: from positioned text runs to ordered phrases.

use super::fixups;
use crate::pdf;

/// Font names as they appear after the quirk fixes.
pub const FONT_REGULAR: &str = "NeoSansIntel";
pub const FONT_MEDIUM: &str = "NeoSansIntelMedium";

/// A left-to-right run of words sharing a font, a size and a baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct Phrase {
    pub font: String,
    pub size: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub text: String,
}

impl Phrase {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn centre(&self) -> f64 {
        self.x + self.width / 2.0
    }

    fn is_stray_mark(&self) -> bool {
        matches!(self.text.as_str(), "*" | ",")
    }
}

/// Builds the page's phrases: apply font quirks, snap baselines, sort into
/// reading order, and join adjacent runs into phrases using per-font-size
/// spacing thresholds.
pub fn phrases(page: &pdf::Page) -> Vec<Phrase> {
    let mut runs: Vec<Phrase> = page
        .texts
        .iter()
        .map(|text| {
            let mut phrase = Phrase {
                font: text.font.clone(),
                size: text.font_size,
                x: text.x,
                y: text.y,
                width: text.width,
                text: text.text.clone(),
            };
            fix_font_quirks(&mut phrase);
            phrase
        })
        .collect();

    // Reading order: top to bottom, then left to right. PDF y grows up.
    runs.sort_by(|a, b| {
        b.y.partial_cmp(&a.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    snap_baselines(&mut runs);

    // Re-sort: baseline snapping may have reordered runs within a line.
    runs.sort_by(|a, b| {
        b.y.partial_cmp(&a.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    join_runs(runs)
}

/// Known font quirks in the manual.
fn fix_font_quirks(phrase: &mut Phrase) {
    if phrase.font == "NeoSansIntel-Medium" {
        phrase.font = FONT_MEDIUM.to_string();
    }
    // The not-equal sign is typeset in Symbol but belongs to the
    // surrounding 9pt NeoSansIntel text.
    if phrase.font == "Symbol" && phrase.text.contains('≠') {
        phrase.font = FONT_REGULAR.to_string();
        phrase.size = 9.0;
    }
}

/// Runs within one unit of the previous baseline become co-linear. Stray
/// asterisks and commas are typeset slightly raised; they get a wider
/// snap so they land in the main column.
fn snap_baselines(runs: &mut [Phrase]) {
    let mut current = f64::INFINITY;
    for run in runs.iter_mut() {
        let threshold = if run.is_stray_mark() { 3.0 } else { 1.0 };
        if (run.y - current).abs() <= threshold {
            run.y = current;
        } else {
            current = run.y;
        }
    }
}

/// Joins runs into phrases. Gaps below size/6 continue the current word,
/// gaps below 2·size/3 insert a space, anything wider (or a font change)
/// starts a new phrase.
fn join_runs(runs: Vec<Phrase>) -> Vec<Phrase> {
    let mut phrases: Vec<Phrase> = Vec::new();
    for run in runs {
        let join = match phrases.last() {
            Some(last) if last.y == run.y => {
                let gap = run.x - last.right();
                let size = last.size.max(1.0);
                let same_face = last.font == run.font && (last.size - run.size).abs() < 0.25;
                if gap >= 2.0 * size / 3.0 {
                    None
                } else if same_face || run.is_stray_mark() {
                    Some(gap >= size / 6.0)
                } else {
                    None
                }
            }
            _ => None,
        };

        match join {
            Some(with_space) => {
                let last = phrases.last_mut().unwrap();
                if with_space {
                    last.text.push(' ');
                }
                last.text.push_str(&run.text);
                last.width = (run.x + run.width) - last.x;
            }
            None => phrases.push(run),
        }
    }
    phrases
}

/// True when the phrases belong to an instruction-set page: the first
/// phrase is the 9pt NeoSansIntel chapter header.
pub fn is_instruction_page(phrases: &[Phrase]) -> bool {
    let first = match phrases.first() {
        Some(first) => first,
        None => return false,
    };
    first.font == FONT_REGULAR
        && (first.size - 9.0).abs() < 0.5
        && (first.text.contains("INSTRUCTION REFERENCE")
            || first.text.contains("INSTRUCTION SET REFERENCE")
            || first.text.ends_with("EXTENSIONS"))
}

/// Finds the instruction headline: a 12pt NeoSansIntelMedium phrase with a
/// dash (or one known dashless exception). Continuation phrases on the
/// same line are concatenated, then the headline is dash-normalised and
/// run through the rewrite table.
pub fn headline(phrases: &[Phrase]) -> Option<(usize, String)> {
    for (i, phrase) in phrases.iter().enumerate() {
        if phrase.font != FONT_MEDIUM || (phrase.size - 12.0).abs() >= 0.5 {
            continue;
        }
        let dashed = phrase.text.contains('\u{2014}')
            || phrase.text.contains('\u{2013}')
            || phrase.text.contains("PTEST- Logical Compare");
        if !dashed {
            continue;
        }

        let mut text = phrase.text.clone();
        for continuation in &phrases[i + 1..] {
            if continuation.y != phrase.y {
                break;
            }
            text.push(' ');
            text.push_str(&continuation.text);
        }
        return Some((i, fixups::normalize_headline(&text)));
    }
    None
}

/// Drops the publication trailer: the bottom line holding "Vol" and the
/// instruction name on one baseline.
pub fn trim_trailer(phrases: &mut Vec<Phrase>) {
    let trailer_y = phrases
        .iter()
        .filter(|p| p.text.contains("Vol"))
        .map(|p| p.y)
        .fold(f64::INFINITY, f64::min);
    if trailer_y.is_finite() {
        let lowest = phrases.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        if (trailer_y - lowest).abs() < 0.5 {
            phrases.retain(|p| p.y != trailer_y);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pdf::{Page, Text};

    pub(crate) fn text(font: &str, size: f64, x: f64, y: f64, s: &str) -> Text {
        Text {
            font: font.to_string(),
            font_size: size,
            x,
            y,
            // A workable width estimate for synthetic pages.
            width: s.chars().count() as f64 * size * 0.5,
            text: s.to_string(),
        }
    }

    fn page(texts: Vec<Text>) -> Page {
        Page { number: 1, texts }
    }

    #[test]
    fn words_join_into_phrases() {
        // "MOV" and "r32" 2pt apart at 9pt: same phrase, with a space
        // (2 ≥ 9/6 = 1.5 and 2 < 6).
        let p = page(vec![
            text(FONT_REGULAR, 9.0, 10.0, 700.0, "MOV"),
            text(FONT_REGULAR, 9.0, 25.5, 700.0, "r32"),
        ]);
        let phrases = phrases(&p);
        assert_eq!(phrases.len(), 1);
        assert_eq!(phrases[0].text, "MOV r32");
    }

    #[test]
    fn tight_runs_join_without_a_space() {
        let p = page(vec![
            text(FONT_REGULAR, 9.0, 10.0, 700.0, "MO"),
            text(FONT_REGULAR, 9.0, 19.5, 700.0, "V"),
        ]);
        let phrases = phrases(&p);
        assert_eq!(phrases.len(), 1);
        assert_eq!(phrases[0].text, "MOV");
    }

    #[test]
    fn wide_gaps_split_phrases() {
        let p = page(vec![
            text(FONT_REGULAR, 9.0, 10.0, 700.0, "MOV"),
            text(FONT_REGULAR, 9.0, 100.0, 700.0, "RM"),
        ]);
        let phrases = phrases(&p);
        assert_eq!(phrases.len(), 2);
    }

    #[test]
    fn baselines_snap_within_one_unit() {
        let p = page(vec![
            text(FONT_REGULAR, 9.0, 10.0, 700.0, "A"),
            text(FONT_REGULAR, 9.0, 15.0, 699.4, "B"),
        ]);
        let phrases = phrases(&p);
        assert_eq!(phrases.len(), 1);
        assert_eq!(phrases[0].text, "AB");
    }

    #[test]
    fn medium_font_quirk_is_folded() {
        let p = page(vec![text("NeoSansIntel-Medium", 12.0, 10.0, 700.0, "MOV")]);
        let phrases = phrases(&p);
        assert_eq!(phrases[0].font, FONT_MEDIUM);
    }

    #[test]
    fn instruction_page_detection() {
        let p = page(vec![
            text(FONT_REGULAR, 9.0, 10.0, 760.0, "INSTRUCTION SET REFERENCE, A-L"),
            text(FONT_REGULAR, 9.0, 10.0, 700.0, "body"),
        ]);
        assert!(is_instruction_page(&phrases(&p)));

        let other = page(vec![text(FONT_REGULAR, 9.0, 10.0, 760.0, "ABOUT THIS MANUAL")]);
        assert!(!is_instruction_page(&phrases(&other)));
    }

    #[test]
    fn headline_is_normalised() {
        let p = page(vec![
            text(FONT_MEDIUM, 12.0, 10.0, 740.0, "MOV\u{2014}Move"),
        ]);
        let phrases = phrases(&p);
        let (index, title) = headline(&phrases).unwrap();
        assert_eq!(index, 0);
        assert_eq!(title, "MOV-Move");
    }

    #[test]
    fn trailer_is_trimmed() {
        let mut ph = phrases(&page(vec![
            text(FONT_REGULAR, 9.0, 10.0, 700.0, "body"),
            text(FONT_REGULAR, 8.0, 10.0, 30.0, "MOV\u{2014}Move"),
            text(FONT_REGULAR, 8.0, 400.0, 30.0, "Vol. 2B 4-35"),
        ]));
        trim_trailer(&mut ph);
        assert_eq!(ph.len(), 1);
        assert_eq!(ph[0].text, "body");
    }
}
