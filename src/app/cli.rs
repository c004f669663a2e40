use clap::Parser;
use std::path::PathBuf;
use termcolor::ColorChoice;

#[derive(Parser)]
#[clap(name = "x86db", version = env!("CARGO_PKG_VERSION"), author = "Adolph C.")]
pub struct Opts {
    /// Path to the Intel Software Developer's Manual PDF.
    pub manual: PathBuf,

    /// Comma-separated list of manual page numbers to dump in
    /// human-readable form instead of building the database.
    #[clap(long = "pages")]
    pub pages: Option<String>,

    /// Include instruction descriptions in the page dump. Only valid
    /// together with --pages.
    #[clap(long)]
    pub descriptions: bool,

    /// Disable the /vsib repair applied to gather and scatter listings.
    #[clap(long = "no-vsib-fix")]
    pub no_vsib_fix: bool,

    /// Sets the log level: (default)=+error, 0=+warning, 1=+info, 2=+debug, 3=+trace
    /// The `quiet` flag can be used to turn off logging completely.
    #[clap(short, long, parse(from_occurrences))]
    pub verbose: u32,

    /// Disables logging.
    #[clap(short, long)]
    pub quiet: bool,

    /// Coloring: auto, always, never, and always-ansi (only uses ansi color codes).
    #[clap(long = "color", default_value = "auto", parse(try_from_str = parse_colorchoice))]
    pub color_choice: ColorChoice,
}

impl Opts {
    pub fn log_level_filter(&self) -> log::LevelFilter {
        use log::LevelFilter;

        if self.quiet {
            return LevelFilter::Off;
        }

        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// The parsed --pages list. An unparsable entry is a usage error.
    pub fn page_list(&self) -> Result<Vec<u32>, String> {
        let raw = match &self.pages {
            Some(raw) => raw,
            None => return Ok(Vec::new()),
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u32>()
                    .map_err(|_| format!("`{}` is not a valid page number", s))
            })
            .collect()
    }
}

pub fn parse_colorchoice(s: &str) -> Result<ColorChoice, String> {
    if s.eq_ignore_ascii_case("auto") {
        Ok(ColorChoice::Auto)
    } else if s.eq_ignore_ascii_case("always") {
        Ok(ColorChoice::Always)
    } else if s.eq_ignore_ascii_case("never") {
        Ok(ColorChoice::Never)
    } else if s.eq_ignore_ascii_case("always-ansi") {
        Ok(ColorChoice::AlwaysAnsi)
    } else {
        Err(format!("{} is not a valid color value", s))
    }
}
