//! Errors that abort a build, and their rendering as diagnostics.

use std::path::{Path, PathBuf};

use miette::{Diagnostic, LabeledSpan, NamedSource};

/// A fatal error. Any of these aborts the whole run before output is written.
#[derive(Debug)]
pub enum Error {
    /// A glyph source did not follow the `STARTCHAR`/`BITMAP`/`ENDCHAR` grammar.
    MalformedSource(MalformedSource),
    /// A code decoded to something other than exactly one scalar value.
    InternalConsistency { raw_code: u32, decoded: String },
    /// The build plan is unusable; detected before any source is read.
    BuildConfiguration(String),
    Io { path: PathBuf, error: std::io::Error },
}

/// The location and reason for a [`Error::MalformedSource`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedSource {
    pub path: PathBuf,
    /// 1-based line number of the offending line.
    pub line: usize,
    pub message: String,
}

impl Error {
    pub(crate) fn malformed(path: &Path, line: usize, message: impl Into<String>) -> Self {
        Error::MalformedSource(MalformedSource {
            path: path.to_owned(),
            line,
            message: message.into(),
        })
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::BuildConfiguration(message.into())
    }

    pub(crate) fn io(path: &Path, error: std::io::Error) -> Self {
        Error::Io {
            path: path.to_owned(),
            error,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MalformedSource(err) => err.fmt(f),
            Error::InternalConsistency { raw_code, decoded } => write!(
                f,
                "code 0x{raw_code:04X} decoded to {} scalar values ({decoded:?}), expected exactly one",
                decoded.chars().count()
            ),
            Error::BuildConfiguration(msg) => write!(f, "invalid build plan: {msg}"),
            Error::Io { path, error } => write!(f, "error accessing '{}': {error}", path.display()),
        }
    }
}

impl std::fmt::Display for MalformedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "malformed glyph source {}:{}: {}",
            self.path.display(),
            self.line,
            self.message
        )
    }
}

impl std::error::Error for MalformedSource {}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// A fatal [`Error`], prepared for display by miette.
#[derive(Debug)]
pub struct ErrorReport {
    src: Option<NamedSource>,
    message: String,
    location: Option<LabeledSpan>,
}

impl Diagnostic for ErrorReport {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.src.as_ref().map(|x| x as _)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        self.location
            .as_ref()
            .map(|loc| Box::new(std::iter::once(loc.clone())) as _)
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorReport {}

impl ErrorReport {
    pub fn message(message: impl Into<String>) -> Self {
        ErrorReport {
            src: None,
            message: message.into(),
            location: None,
        }
    }

    /// Build a report for `error`.
    ///
    /// For malformed sources the file is read again so the offending line can
    /// be shown; if that fails we fall back to the plain message.
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::MalformedSource(err) => match std::fs::read(&err.path) {
                Ok(bytes) => {
                    // sources are frequently EUC-JP, lossy is fine for display
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    Self::from_malformed_src(err, text)
                }
                Err(_) => Self::message(error.to_string()),
            },
            _ => Self::message(error.to_string()),
        }
    }

    pub fn from_malformed_src(error: &MalformedSource, text: String) -> Self {
        let (start, len) = line_span(&text, error.line);
        let location = LabeledSpan::new(Some(error.message.clone()), start, len);
        let src = NamedSource::new(error.path.to_string_lossy(), text);
        ErrorReport {
            message: format!("malformed glyph source '{}'", error.path.display()),
            src: Some(src),
            location: Some(location),
        }
    }
}

/// The byte offset and length of the 1-based `line` in `text`.
///
/// Lines past the end of the text map to an empty span at the end.
fn line_span(text: &str, line: usize) -> (usize, usize) {
    let mut offset = 0;
    for (i, chunk) in text.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            return (offset, chunk.trim_end_matches(['\r', '\n']).len());
        }
        offset += chunk.len();
    }
    (text.len(), 0)
}
