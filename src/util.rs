use std::fmt;

/// Wrapper that pretty-prints an elapsed duration in the largest sensible unit.
pub struct DurationDisplay(pub std::time::Duration);

impl fmt::Display for DurationDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use std::time::Duration;

        if self.0 >= Duration::from_secs(1) {
            write!(f, "{:.3} seconds", self.0.as_secs_f64())
        } else if self.0 >= Duration::from_millis(1) {
            write!(f, "{:.3} ms", self.0.as_nanos() as f64 / 1_000_000.0)
        } else {
            write!(f, "{:.3} us", self.0.as_nanos() as f64 / 1_000.0)
        }
    }
}
