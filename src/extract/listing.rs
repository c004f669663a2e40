//! Section splitting and table extraction within one instruction listing.

use super::error::Error;
use super::page::{Phrase, FONT_MEDIUM};

/// One instruction listing: the headline and every phrase under it, which
/// may span several pages.
#[derive(Debug, Clone)]
pub struct Listing {
    /// First page of the listing.
    pub page: u32,
    /// The dash-normalised headline.
    pub headline: String,
    pub phrases: Vec<Phrase>,
}

/// An extracted table: the heading row and the body rows, one string per
/// column cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub heading: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Splits a listing's phrases into the mnemonic-table section and the
/// operand-encoding-table section. The mnemonic table runs from the
/// headline to the `Instruction Operand Encoding` heading; the encoding
/// table from there to the next `Description` heading. Everything else is
/// dropped.
pub fn split_sections(phrases: &[Phrase]) -> (Vec<&Phrase>, Vec<&Phrase>) {
    let mut mnemonic = Vec::new();
    let mut encoding = Vec::new();

    #[derive(PartialEq)]
    enum Section {
        Mnemonic,
        Encoding,
        Rest,
    }
    let mut section = Section::Mnemonic;

    for phrase in phrases {
        let text = phrase.text.trim();
        match section {
            Section::Mnemonic => {
                if text.starts_with("Instruction Operand Encoding") {
                    section = Section::Encoding;
                } else if text == "Op/En" && phrase.font == FONT_MEDIUM {
                    // TESTUI's page omits the section heading; the table's
                    // own heading starts the section instead.
                    section = Section::Encoding;
                    encoding.push(phrase);
                } else if text.starts_with("Description") {
                    section = Section::Rest;
                } else {
                    mnemonic.push(phrase);
                }
            }
            Section::Encoding => {
                if text.starts_with("Description") {
                    section = Section::Rest;
                } else {
                    encoding.push(phrase);
                }
            }
            Section::Rest => {}
        }
    }
    (mnemonic, encoding)
}

/// Unique positions snapped within one unit, ascending.
fn snap_positions(mut positions: Vec<f64>) -> Vec<f64> {
    positions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut snapped: Vec<f64> = Vec::new();
    for p in positions {
        match snapped.last() {
            Some(&last) if (p - last).abs() <= 1.0 => {}
            _ => snapped.push(p),
        }
    }
    snapped
}

fn nearest(positions: &[f64], x: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, &p) in positions.iter().enumerate() {
        let d = (x - p).abs();
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}

/// Groups phrases into rows by baseline, assigns each to its column, and
/// joins multiple phrases landing in one cell.
fn assemble_rows(
    phrases: &[&Phrase],
    columns: &[f64],
    position: impl Fn(&Phrase) -> f64,
) -> Vec<Vec<String>> {
    let mut rows: Vec<(f64, Vec<String>)> = Vec::new();
    for &phrase in phrases {
        let same_row = rows.last().map_or(false, |(y, _)| *y == phrase.y);
        if !same_row {
            rows.push((phrase.y, vec![String::new(); columns.len()]));
        }
        let row = &mut rows.last_mut().unwrap().1;
        let cell = &mut row[nearest(columns, position(phrase))];
        if !cell.is_empty() {
            cell.push(' ');
        }
        cell.push_str(phrase.text.trim());
    }
    rows.into_iter().map(|(_, cells)| cells).collect()
}

fn merge_into_previous(rows: &mut Vec<Vec<String>>, index: usize) {
    let row = rows.remove(index);
    let previous = &mut rows[index - 1];
    for (target, cell) in previous.iter_mut().zip(row) {
        if cell.is_empty() {
            continue;
        }
        if !target.is_empty() {
            target.push(' ');
        }
        target.push_str(&cell);
    }
}

/// Extracts the mnemonic table. Column boundaries come from the X starts
/// of the medium-font heading phrases; wrapped rows merge upwards.
pub fn mnemonic_table(page: u32, phrases: &[&Phrase]) -> Result<Table, Error> {
    // Strip the trailing NOTES block and stray superscript markers.
    let notes_y = phrases
        .iter()
        .filter(|p| p.text.trim().starts_with("NOTES:") || p.text.trim().starts_with("NOTE:"))
        .map(|p| p.y)
        .fold(f64::NEG_INFINITY, f64::max);
    let body: Vec<&Phrase> = phrases
        .iter()
        .copied()
        .filter(|p| p.y > notes_y)
        .filter(|p| !(p.text.trim() == "1" && p.size < 7.0))
        .collect();

    let columns = snap_positions(
        body.iter()
            .filter(|p| p.font == FONT_MEDIUM && p.size >= 8.0)
            .map(|p| p.x)
            .collect(),
    );
    if columns.len() < 2 {
        return Err(Error::at(page, "mnemonic table has no column headings"));
    }

    let mut rows = assemble_rows(&body, &columns, |p| p.x);

    // Rows with an empty first column are wrapped cells of the row above.
    let mut i = 1;
    while i < rows.len() {
        if rows[i][0].is_empty() {
            merge_into_previous(&mut rows, i);
        } else {
            i += 1;
        }
    }

    if rows.is_empty() {
        return Err(Error::at(page, "mnemonic table has no rows"));
    }
    let heading = rows.remove(0);

    // After the heading, rows that are more than half empty are wraps too.
    let mut i = 1;
    while i < rows.len() {
        let empty = rows[i].iter().filter(|c| c.is_empty()).count();
        if empty * 2 > rows[i].len() {
            merge_into_previous(&mut rows, i);
        } else {
            i += 1;
        }
    }

    Ok(Table { heading, rows })
}

/// Extracts the operand-encoding table. Columns are seeded by the `Op/En`,
/// `Tuple Type` and `Operand N` heading phrases and indexed by phrase
/// centre.
pub fn encoding_table(page: u32, phrases: &[&Phrase]) -> Result<Table, Error> {
    let columns = snap_positions(
        phrases
            .iter()
            .filter(|p| {
                let text = p.text.trim();
                text == "Op/En"
                    || text.starts_with("Tuple")
                    || text.starts_with("Operand")
            })
            .map(|p| p.centre())
            .collect(),
    );
    if columns.is_empty() {
        return Err(Error::at(page, "operand-encoding table has no headings"));
    }

    let mut rows = assemble_rows(phrases, &columns, |p| p.centre());
    if rows.is_empty() {
        return Err(Error::at(page, "operand-encoding table has no rows"));
    }
    let heading = rows.remove(0);
    Ok(Table { heading, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::page::{FONT_MEDIUM, FONT_REGULAR};

    fn phrase(font: &str, size: f64, x: f64, y: f64, text: &str) -> Phrase {
        Phrase {
            font: font.to_string(),
            size,
            x,
            y,
            width: text.chars().count() as f64 * size * 0.5,
            text: text.to_string(),
        }
    }

    fn table_phrases() -> Vec<Phrase> {
        vec![
            // Heading row in the medium face.
            phrase(FONT_MEDIUM, 9.0, 10.0, 700.0, "Opcode"),
            phrase(FONT_MEDIUM, 9.0, 150.0, 700.0, "Instruction"),
            phrase(FONT_MEDIUM, 9.0, 300.0, 700.0, "Op/En"),
            phrase(FONT_MEDIUM, 9.0, 360.0, 700.0, "Description"),
            // First row.
            phrase(FONT_REGULAR, 9.0, 10.0, 688.0, "8B /r"),
            phrase(FONT_REGULAR, 9.0, 150.0, 688.0, "MOV r32, r/m32"),
            phrase(FONT_REGULAR, 9.0, 300.0, 688.0, "RM"),
            phrase(FONT_REGULAR, 9.0, 360.0, 688.0, "Move r/m32 to"),
            // Wrapped description continues on the next line.
            phrase(FONT_REGULAR, 9.0, 360.0, 676.0, "r32."),
        ]
    }

    #[test]
    fn mnemonic_table_with_wrapped_cell() {
        let phrases = table_phrases();
        let refs: Vec<&Phrase> = phrases.iter().collect();
        let table = mnemonic_table(1, &refs).unwrap();
        assert_eq!(
            table.heading,
            vec!["Opcode", "Instruction", "Op/En", "Description"]
        );
        assert_eq!(table.rows.len(), 1);
        assert_eq!(
            table.rows[0],
            vec!["8B /r", "MOV r32, r/m32", "RM", "Move r/m32 to r32."]
        );
    }

    #[test]
    fn notes_are_stripped() {
        let mut phrases = table_phrases();
        phrases.push(phrase(FONT_REGULAR, 9.0, 10.0, 650.0, "NOTES:"));
        phrases.push(phrase(FONT_REGULAR, 9.0, 10.0, 640.0, "1. Not actually a row"));
        let refs: Vec<&Phrase> = phrases.iter().collect();
        let table = mnemonic_table(1, &refs).unwrap();
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn sections_split_on_headings() {
        let phrases = vec![
            phrase(FONT_REGULAR, 9.0, 10.0, 700.0, "row"),
            phrase(FONT_MEDIUM, 10.0, 10.0, 690.0, "Instruction Operand Encoding"),
            phrase(FONT_REGULAR, 9.0, 10.0, 680.0, "encrow"),
            phrase(FONT_MEDIUM, 10.0, 10.0, 670.0, "Description"),
            phrase(FONT_REGULAR, 9.0, 10.0, 660.0, "prose"),
        ];
        let (mnemonic, encoding) = split_sections(&phrases);
        assert_eq!(mnemonic.len(), 1);
        assert_eq!(encoding.len(), 1);
        assert_eq!(encoding[0].text, "encrow");
    }

    #[test]
    fn encoding_table_by_centres() {
        let phrases = vec![
            phrase(FONT_MEDIUM, 9.0, 10.0, 700.0, "Op/En"),
            phrase(FONT_MEDIUM, 9.0, 100.0, 700.0, "Operand 1"),
            phrase(FONT_MEDIUM, 9.0, 200.0, 700.0, "Operand 2"),
            phrase(FONT_REGULAR, 9.0, 12.0, 688.0, "RM"),
            phrase(FONT_REGULAR, 9.0, 95.0, 688.0, "ModRM:reg (w)"),
            phrase(FONT_REGULAR, 9.0, 195.0, 688.0, "ModRM:r/m (r)"),
        ];
        let refs: Vec<&Phrase> = phrases.iter().collect();
        let table = encoding_table(1, &refs).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][0], "RM");
        assert_eq!(table.rows[0][1], "ModRM:reg (w)");
        assert_eq!(table.rows[0][2], "ModRM:r/m (r)");
    }
}
