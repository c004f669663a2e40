//! The build tool's logger. Everything goes to stderr; stdout belongs to
//! the emitted database.

use log::{Level, LevelFilter};
use std::io::Write as _;
use std::sync::atomic::{AtomicU8, Ordering};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor as _};

static LEVEL: AtomicU8 = AtomicU8::new(2); // warn
static COLOR: AtomicU8 = AtomicU8::new(0); // auto

pub struct AppLogger;

impl AppLogger {
    pub fn init() -> &'static AppLogger {
        log::set_max_level(Self::instance().level());
        Self::instance()
    }

    pub fn instance() -> &'static AppLogger {
        static INSTANCE: AppLogger = AppLogger;
        &INSTANCE
    }

    pub fn level(&self) -> LevelFilter {
        match LEVEL.load(Ordering::Relaxed) {
            0 => LevelFilter::Off,
            1 => LevelFilter::Error,
            2 => LevelFilter::Warn,
            3 => LevelFilter::Info,
            4 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    pub fn set_level(&self, level: LevelFilter) {
        let raw = match level {
            LevelFilter::Off => 0,
            LevelFilter::Error => 1,
            LevelFilter::Warn => 2,
            LevelFilter::Info => 3,
            LevelFilter::Debug => 4,
            LevelFilter::Trace => 5,
        };
        LEVEL.store(raw, Ordering::Relaxed);
        log::set_max_level(level);
    }

    pub fn color_choice(&self) -> ColorChoice {
        match COLOR.load(Ordering::Relaxed) {
            1 => ColorChoice::Always,
            2 => ColorChoice::Never,
            3 => ColorChoice::AlwaysAnsi,
            _ => ColorChoice::Auto,
        }
    }

    pub fn set_color_choice(&self, color: ColorChoice) {
        let raw = match color {
            ColorChoice::Always => 1,
            ColorChoice::Never => 2,
            ColorChoice::AlwaysAnsi => 3,
            _ => 0,
        };
        COLOR.store(raw, Ordering::Relaxed);
    }

    fn write_log(&self, record: &log::Record) -> std::io::Result<()> {
        let (level, color) = match record.level() {
            Level::Error => ("error", Color::Red),
            Level::Warn => ("warning", Color::Yellow),
            Level::Info => ("info", Color::Blue),
            Level::Debug => ("debug", Color::Green),
            Level::Trace => ("trace", Color::Magenta),
        };

        let mut output = StandardStream::stderr(self.color_choice());

        let mut level_color = ColorSpec::new();
        level_color.set_fg(Some(color)).set_bold(true);
        let mut reset_color = ColorSpec::new();
        reset_color.set_reset(true);

        output.set_color(&level_color)?;
        write!(output, "{:>width$}(", level, width = 7)?;
        output.set_color(&reset_color)?;
        write!(output, "{}", record.target())?;
        output.set_color(&level_color)?;
        write!(output, "): ")?;
        output.set_color(&reset_color)?;
        writeln!(output, "{}", record.args())?;

        Ok(())
    }
}

impl log::Log for AppLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level()
    }

    fn log(&self, record: &log::Record) {
        self.write_log(record).expect("failed to write log");
    }

    fn flush(&self) {
        std::io::stdout().flush().expect("failed to flush stdout");
        std::io::stderr().flush().expect("failed to flush stderr");
    }
}
