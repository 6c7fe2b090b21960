//! Probing BDF fonts that are converted by other tools.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    sync::LazyLock,
};

use regex::bytes::Regex;

use crate::error::Error;

static CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*CHARS\s+(\d+)").unwrap());

/// The glyph count declared by the `CHARS` line of the BDF at `path`.
pub fn char_count(path: &Path) -> Result<usize, Error> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    read_char_count(BufReader::new(file), path)
}

/// Scan `input` for the `CHARS` line; `path` is used for error reporting.
pub fn read_char_count(mut input: impl BufRead, path: &Path) -> Result<usize, Error> {
    let mut line = Vec::new();
    let mut number = 0;
    loop {
        line.clear();
        if input.read_until(b'\n', &mut line).map_err(|e| Error::io(path, e))? == 0 {
            return Err(Error::malformed(path, number, "no CHARS line in BDF header"));
        }
        number += 1;
        if let Some(captures) = CHARS.captures(&line) {
            let count = std::str::from_utf8(&captures[1])
                .ok()
                .and_then(|digits| digits.parse().ok())
                .ok_or_else(|| Error::malformed(path, number, "CHARS count out of range"))?;
            return Ok(count);
        }
    }
}
