//! The extractor's located error type.
//!
//! Every failure during extraction carries the manual page it concerns
//! (0 when no page applies). Wrapping an existing `Error` keeps only its
//! cause so that the outermost context wins.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

pub struct Error(Box<ErrorInner>);

struct ErrorInner {
    page: u32,
    message: Cow<'static, str>,
    cause: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    /// An error concerning `page` of the manual.
    pub fn at<M>(page: u32, message: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        Error(Box::new(ErrorInner {
            page,
            message: message.into(),
            cause: None,
        }))
    }

    /// An error with an underlying cause. When `cause` is itself an
    /// extractor error, its context is discarded in favour of the new one.
    pub fn with_cause<M, E>(page: u32, message: M, cause: E) -> Self
    where
        M: Into<Cow<'static, str>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let cause: Box<dyn StdError + Send + Sync> = cause.into();
        let cause = match cause.downcast::<Error>() {
            Ok(inner) => inner.0.cause,
            Err(other) => Some(other),
        };
        Error(Box::new(ErrorInner {
            page,
            message: message.into(),
            cause,
        }))
    }

    /// The manual page this error concerns, 0 when not applicable.
    pub fn page(&self) -> u32 {
        self.0.page
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)?;
        if let Some(cause) = &self.0.cause {
            write!(f, " (caused by: {})", cause)?;
        }
        Ok(())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.page > 0 {
            write!(f, "p.{}: {}", self.0.page, self.0.message)
        } else {
            write!(f, "{}", self.0.message)
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.cause.as_deref().map(|e| e as &dyn StdError)
    }
}
