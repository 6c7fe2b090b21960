//! Reading glyph records from BDF-like text sources.
//!
//! A source is a sequence of blocks:
//!
//! ```text
//! STARTCHAR <hex code>
//! ...
//! BITMAP
//! <12 rows of '@' and '.'>
//! ENDCHAR
//! ```
//!
//! Anything outside a block (font preamble, properties, `ENDFONT`) is
//! ignored. Lines are handled as bytes: sources are often EUC-JP encoded, and
//! only the ASCII markers and pixel fields matter to us.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::LazyLock,
};

use log::trace;
use regex::bytes::Regex;
use serde::Deserialize;

use crate::error::Error;

/// The number of pixel rows in every glyph cell.
pub const GLYPH_ROWS: usize = 12;

/// One bitmask per pixel row; bit `x` is column `x`, counted from the left.
pub type Rows = [u16; GLYPH_ROWS];

static START_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*STARTCHAR\s+(\w+)").unwrap());
static BITMAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*BITMAP\b").unwrap());
static END_CHAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*ENDCHAR\b").unwrap());

/// The cell width of the glyphs in a source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidthClass {
    Half,
    Full,
}

impl WidthClass {
    /// The number of meaningful columns in each row.
    pub fn pixel_width(self) -> usize {
        match self {
            WidthClass::Half => GLYPH_ROWS / 2,
            WidthClass::Full => GLYPH_ROWS,
        }
    }

    pub fn is_full(self) -> bool {
        self == WidthClass::Full
    }
}

/// A glyph as written in the source, before its code is normalized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlyphRecord {
    pub(crate) raw_code: u32,
    pub(crate) width: WidthClass,
    pub(crate) rows: Rows,
    pub(crate) line: usize,
}

impl GlyphRecord {
    /// The code exactly as it appeared after `STARTCHAR`.
    pub fn raw_code(&self) -> u32 {
        self.raw_code
    }

    pub fn width(&self) -> WidthClass {
        self.width
    }

    pub fn rows(&self) -> &Rows {
        &self.rows
    }

    /// The 1-based line of the `STARTCHAR` marker for this glyph.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Render the bitmap back to the `@`/`.` form it was read from.
    pub fn to_source_rows(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| render_row(*row, self.width.pixel_width()))
            .collect()
    }
}

/// Streams [`GlyphRecord`]s out of a source.
///
/// The first malformed block ends the stream: a corrupt glyph means the rest
/// of the file cannot be trusted to be aligned either.
pub struct GlyphReader<R> {
    input: R,
    path: PathBuf,
    width: WidthClass,
    line: usize,
    buf: Vec<u8>,
    finished: bool,
}

impl GlyphReader<BufReader<File>> {
    /// Open the source at `path`.
    pub fn open(path: &Path, width: WidthClass) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        Ok(GlyphReader::new(BufReader::new(file), path, width))
    }
}

impl<R: BufRead> GlyphReader<R> {
    /// Create a reader over `input`; `path` is used only for error reporting.
    pub fn new(input: R, path: impl Into<PathBuf>, width: WidthClass) -> Self {
        GlyphReader {
            input,
            path: path.into(),
            width,
            line: 0,
            buf: Vec::new(),
            finished: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the next glyph.
    ///
    /// Returns `Ok(None)` once the input is exhausted without finding another
    /// `STARTCHAR`.
    pub fn next_glyph(&mut self) -> Result<Option<GlyphRecord>, Error> {
        if self.finished {
            return Ok(None);
        }
        let result = self.read_glyph();
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    fn read_glyph(&mut self) -> Result<Option<GlyphRecord>, Error> {
        let raw_code = loop {
            if !self.read_line()? {
                return Ok(None);
            }
            if let Some(captures) = START_CHAR.captures(&self.buf) {
                let token = String::from_utf8_lossy(&captures[1]).into_owned();
                break u32::from_str_radix(&token, 16).map_err(|_| {
                    self.error(format!("STARTCHAR code '{token}' is not hexadecimal"))
                })?;
            }
        };
        let start_line = self.line;

        loop {
            if !self.read_line()? {
                return Err(self.error(format!(
                    "unexpected end of file: glyph 0x{raw_code:04X} has no BITMAP"
                )));
            }
            if BITMAP.is_match(&self.buf) {
                break;
            }
            if START_CHAR.is_match(&self.buf) || END_CHAR.is_match(&self.buf) {
                return Err(self.error(format!("glyph 0x{raw_code:04X} has no BITMAP")));
            }
        }

        let width = self.width.pixel_width();
        let mut rows = [0u16; GLYPH_ROWS];
        for (y, row) in rows.iter_mut().enumerate() {
            if !self.read_line()? {
                return Err(self.error(format!(
                    "unexpected end of file: expected {GLYPH_ROWS} bitmap rows, found {y}"
                )));
            }
            *row = parse_row(&self.buf, width).map_err(|msg| self.error(msg))?;
        }

        if !self.read_line()? || !END_CHAR.is_match(&self.buf) {
            return Err(self.error(format!(
                "expected ENDCHAR after {GLYPH_ROWS} bitmap rows of glyph 0x{raw_code:04X}"
            )));
        }

        trace!("{}:{start_line}: glyph 0x{raw_code:04X}", self.path.display());
        Ok(Some(GlyphRecord {
            raw_code,
            width: self.width,
            rows,
            line: start_line,
        }))
    }

    /// Read the next line into `self.buf`, minus its line ending.
    ///
    /// Returns `false` at end of input.
    fn read_line(&mut self) -> Result<bool, Error> {
        self.buf.clear();
        let n = self
            .input
            .read_until(b'\n', &mut self.buf)
            .map_err(|e| Error::io(&self.path, e))?;
        if n == 0 {
            return Ok(false);
        }
        self.line += 1;
        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }
        Ok(true)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::malformed(&self.path, self.line, message)
    }
}

impl<R: BufRead> Iterator for GlyphReader<R> {
    type Item = Result<GlyphRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_glyph().transpose()
    }
}

/// Decode the first `width` pixels of a bitmap row.
///
/// Anything after the pixel field is ignored.
pub fn parse_row(line: &[u8], width: usize) -> Result<u16, String> {
    let Some(pixels) = line.get(..width) else {
        return Err(format!(
            "bitmap row has {} pixels, expected {width}",
            line.len()
        ));
    };
    let mut bits = 0u16;
    for (x, pixel) in pixels.iter().enumerate() {
        match pixel {
            b'@' => bits |= 1 << x,
            b'.' => (),
            other => {
                return Err(format!(
                    "invalid pixel {:?} in column {}, expected '@' or '.'",
                    char::from(*other),
                    x + 1
                ))
            }
        }
    }
    Ok(bits)
}

/// The inverse of [`parse_row`].
pub fn render_row(bits: u16, width: usize) -> String {
    (0..width)
        .map(|x| if bits & (1 << x) != 0 { '@' } else { '.' })
        .collect()
}
