//! The instruction-database builder.
//!
//! Walks the manual page by page, segments each instruction listing,
//! normalises and repairs the extracted tables, expands them into
//! instruction forms, merges the injected extras, and emits the sorted,
//! verified database. Single-threaded; the statistics record is owned
//! here and published with the result.

pub mod error;
mod extras;
pub mod fixups;
pub mod listing;
pub mod operands;
pub mod page;
pub mod specs;

pub use self::error::Error;

use self::listing::Listing;
use crate::instruction::Instruction;
use crate::pdf::Document;
use crate::select;
use crate::util::DurationDisplay;
use std::time::Instant;

/// Build-time knobs.
pub struct Options {
    /// Patch gather/scatter encodings that are missing /vsib. On by
    /// default; every applied patch is logged.
    pub vsib_fix: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options { vsib_fix: true }
    }
}

/// Counters accumulated over one extraction run.
#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub pages_scanned: u32,
    pub instruction_pages: u32,
    pub listings: u32,
    pub rows: u32,
    pub forms: u32,
    pub listing_errors: u32,
    pub instruction_errors: u32,
    pub splits: u32,
    pub extras: u32,
    pub vsib_fixes: u32,
    pub duplicates_dropped: u32,
}

/// The result of a successful run.
pub struct Extraction {
    /// The database, in selection order.
    pub forms: Vec<Instruction>,
    pub stats: Stats,
}

/// Listings span pages; shifting each page's baselines by a page-sized
/// offset keeps phrase order well-defined across the whole listing while
/// leaving rows (which never straddle pages) intact.
const PAGE_SPAN: f64 = 10_000.0;

/// Runs the whole extraction over `doc`.
pub fn extract(doc: &dyn Document, options: &Options) -> Result<Extraction, Error> {
    let timer = Instant::now();
    let mut stats = Stats::default();

    let listings = collect_listings(doc, &mut stats)?;
    stats.listings = listings.len() as u32;

    let mut forms: Vec<Instruction> = Vec::new();
    for listing in &listings {
        forms.extend(process_listing(listing, options, &mut stats)?);
    }

    for (row, openc) in extras::extra_rows() {
        let injected = specs::forms_from_row(&row, openc.as_ref(), options, &mut stats)?;
        stats.extras += injected.len() as u32;
        forms.extend(injected);
    }

    specs::detect_operand_size(&mut forms);
    specs::rename_far_forms(&mut forms);
    specs::infer_data_sizes(&mut forms);
    let mut forms = specs::finalize_uids(forms, &mut stats)?;

    select::sort_forms(&mut forms)
        .map_err(|err| Error::with_cause(0, "selection priority table is incomplete", err))?;
    specs::verify(&forms)?;

    stats.forms = forms.len() as u32;
    log::debug!(
        "extracted {} forms from {} listings in {}",
        stats.forms,
        stats.listings,
        DurationDisplay(timer.elapsed())
    );
    Ok(Extraction { forms, stats })
}

/// Walks the document and cuts the instruction pages into listings.
fn collect_listings(doc: &dyn Document, stats: &mut Stats) -> Result<Vec<Listing>, Error> {
    let mut listings: Vec<Listing> = Vec::new();
    let mut current: Option<Listing> = None;

    for number in 1..=doc.page_count() {
        stats.pages_scanned += 1;
        let page = doc
            .page(number)
            .map_err(|err| Error::with_cause(number, "failed to fetch page", err))?;
        let mut phrases = page::phrases(&page);

        if !page::is_instruction_page(&phrases) {
            // Listings never continue across a non-instruction page.
            listings.extend(current.take());
            continue;
        }
        stats.instruction_pages += 1;

        page::trim_trailer(&mut phrases);
        if !phrases.is_empty() {
            phrases.remove(0); // the chapter header
        }
        for phrase in phrases.iter_mut() {
            phrase.y -= f64::from(number) * PAGE_SPAN;
        }

        let mut rest: &[page::Phrase] = &phrases;
        while let Some((index, headline)) = page::headline(rest) {
            if let Some(listing) = current.as_mut() {
                listing.phrases.extend_from_slice(&rest[..index]);
            }
            listings.extend(current.take());

            // Skip the headline's own line, continuations included.
            let headline_y = rest[index].y;
            let mut next = index + 1;
            while next < rest.len() && rest[next].y == headline_y {
                next += 1;
            }
            current = Some(Listing {
                page: number,
                headline,
                phrases: Vec::new(),
            });
            rest = &rest[next..];
        }
        if let Some(listing) = current.as_mut() {
            listing.phrases.extend_from_slice(rest);
        }
    }
    listings.extend(current.take());
    Ok(listings)
}

/// Extracts one listing's forms. Structural problems are listing errors:
/// counted, reported and the listing skipped. Grammar violations inside a
/// row are fatal and propagate.
fn process_listing(
    listing: &Listing,
    options: &Options,
    stats: &mut Stats,
) -> Result<Vec<Instruction>, Error> {
    let (mnemonic_phrases, encoding_phrases) = listing::split_sections(&listing.phrases);

    let table = match listing::mnemonic_table(listing.page, &mnemonic_phrases) {
        Ok(table) => table,
        Err(err) => {
            stats.listing_errors += 1;
            log::warn!("skipping `{}`: {}", listing.headline, err);
            return Ok(Vec::new());
        }
    };

    let mut rows = match specs::mnemonic_rows(listing.page, &table, stats) {
        Ok(rows) => rows,
        Err(err) => {
            stats.listing_errors += 1;
            log::warn!("skipping `{}`: {}", listing.headline, err);
            return Ok(Vec::new());
        }
    };
    rows.retain(|row| {
        let mnemonic = row.instruction.split_whitespace().next().unwrap_or("");
        !specs::is_ignored_mnemonic(mnemonic)
    });
    specs::dedupe_rex_rows(&mut rows, stats);
    stats.rows += rows.len() as u32;

    let openc_rows = if encoding_phrases.is_empty() {
        Vec::new()
    } else {
        match listing::encoding_table(listing.page, &encoding_phrases) {
            Ok(table) => specs::openc_rows(listing.page, &table, stats),
            Err(err) => {
                stats.listing_errors += 1;
                log::warn!("`{}`: {}", listing.headline, err);
                Vec::new()
            }
        }
    };

    let mut forms = Vec::new();
    for row in &rows {
        let openc = openc_rows.iter().find(|o| o.id == row.openc);
        if openc.is_none() && !row.openc.is_empty() && !openc_rows.is_empty() {
            stats.listing_errors += 1;
            log::warn!(
                "p.{}: `{}` names Op/En `{}` which the encoding table lacks",
                row.page,
                row.instruction,
                row.openc
            );
        }
        forms.extend(specs::forms_from_row(row, openc, options, stats)?);
    }
    Ok(forms)
}
