use std::io::Write as _;
use termcolor::{Color, ColorSpec, WriteColor};
use x86db::extract::{page, Stats};
use x86db::instruction::Instruction;
use x86db::pdf::Document;

/// Writes the database: one JSON record per line, in selection order.
pub fn write_database(out: &mut dyn std::io::Write, forms: &[Instruction]) -> anyhow::Result<()> {
    for form in forms {
        serde_json::to_writer(&mut *out, form)?;
        writeln!(out)?;
    }
    Ok(())
}

/// Writes the end-of-run statistics summary.
pub fn write_stats(out: &mut dyn WriteColor, stats: &Stats) -> anyhow::Result<()> {
    let mut label = ColorSpec::new();
    label.set_fg(Some(Color::Cyan)).set_bold(true);
    let norm = ColorSpec::new();

    let rows: &[(&str, u32)] = &[
        ("pages scanned", stats.pages_scanned),
        ("instruction pages", stats.instruction_pages),
        ("listings found", stats.listings),
        ("mnemonic rows", stats.rows),
        ("instruction forms", stats.forms),
        ("split forms", stats.splits),
        ("injected forms", stats.extras),
        ("listing errors", stats.listing_errors),
        ("instruction errors corrected", stats.instruction_errors),
        ("vsib repairs", stats.vsib_fixes),
        ("duplicates dropped", stats.duplicates_dropped),
    ];
    for &(name, value) in rows {
        out.set_color(&label)?;
        write!(out, "{:>28}", name)?;
        out.set_color(&norm)?;
        writeln!(out, "  {}", value)?;
    }
    Ok(())
}

/// Dumps the requested pages phrase by phrase. Without `descriptions`,
/// the prose after each `Description` heading is left out.
pub fn dump_pages(
    out: &mut dyn WriteColor,
    doc: &dyn Document,
    pages: &[u32],
    descriptions: bool,
) -> anyhow::Result<()> {
    let mut heading = ColorSpec::new();
    heading.set_fg(Some(Color::Cyan)).set_bold(true);
    let mut font_color = ColorSpec::new();
    font_color.set_fg(Some(Color::Yellow));
    let norm = ColorSpec::new();

    for &number in pages {
        let page = doc.page(number)?;
        let phrases = page::phrases(&page);

        out.set_color(&heading)?;
        writeln!(out, "page {}:", number)?;
        out.set_color(&norm)?;

        let mut in_description = false;
        for phrase in &phrases {
            if phrase.text.trim().starts_with("Description") {
                in_description = true;
            } else if phrase.font == page::FONT_MEDIUM && (phrase.size - 12.0).abs() < 0.5 {
                // A new headline ends the previous description block.
                in_description = false;
            }
            if in_description && !descriptions {
                continue;
            }

            out.set_color(&font_color)?;
            write!(
                out,
                "  {:>24} {:>4.1}  ({:>6.1}, {:>6.1})  ",
                phrase.font, phrase.size, phrase.x, phrase.y
            )?;
            out.set_color(&norm)?;
            writeln!(out, "{}", phrase.text)?;
        }
    }
    Ok(())
}
