pub mod cli;
pub mod logging;
mod printer;

use clap::Parser as _;
use cli::Opts;
use logging::AppLogger;
use termcolor::{ColorChoice, StandardStream};
use x86db::extract;
use x86db::pdf::PdfDocument;

/// The two failure classes the process distinguishes: usage errors exit
/// with status 2, everything else with 1.
pub enum Error {
    Usage(String),
    Fatal(anyhow::Error),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Error {
        Error::Fatal(err)
    }
}

pub fn run() -> Result<(), Error> {
    let opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(err) => {
            use clap::ErrorKind;
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                print!("{}", err);
                return Ok(());
            }
            return Err(Error::Usage(err.to_string()));
        }
    };

    AppLogger::instance().set_level(opts.log_level_filter());
    let color_choice = match opts.color_choice {
        ColorChoice::Auto => {
            AppLogger::instance().set_color_choice(if atty::is(atty::Stream::Stderr) {
                ColorChoice::Always
            } else {
                ColorChoice::Never
            });
            if atty::is(atty::Stream::Stdout) {
                ColorChoice::Always
            } else {
                ColorChoice::Never
            }
        }
        choice => {
            AppLogger::instance().set_color_choice(choice);
            choice
        }
    };

    let pages = opts.page_list().map_err(Error::Usage)?;
    if opts.descriptions && pages.is_empty() {
        return Err(Error::Usage(
            "--descriptions is only valid together with --pages".to_string(),
        ));
    }

    log::debug!("loading manual from {}", opts.manual.display());
    let doc = PdfDocument::open(&opts.manual)?;

    if !pages.is_empty() {
        let mut stdout = StandardStream::stdout(color_choice);
        printer::dump_pages(&mut stdout, &doc, &pages, opts.descriptions)?;
        return Ok(());
    }

    let options = extract::Options {
        vsib_fix: !opts.no_vsib_fix,
    };
    let extraction = extract::extract(&doc, &options)
        .map_err(|err| Error::Fatal(anyhow::Error::new(err)))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    printer::write_database(&mut out, &extraction.forms)?;

    let mut stderr = StandardStream::stderr(AppLogger::instance().color_choice());
    printer::write_stats(&mut stderr, &extraction.stats)?;

    Ok(())
}
