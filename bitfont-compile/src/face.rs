//! Per-face glyph maps.

use std::{
    io::BufRead,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::{
    encoding::{NormalizeError, SourceEncoding},
    error::Error,
    reader::{GlyphReader, Rows, WidthClass},
};

/// A glyph keyed by its Unicode scalar value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedGlyph {
    pub code: u32,
    pub is_full: bool,
    pub rows: Rows,
}

/// A glyph that was left out because its code could not be mapped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DroppedGlyph {
    pub face: String,
    pub path: PathBuf,
    pub line: usize,
    pub raw_code: u32,
    pub reason: NormalizeError,
}

impl std::fmt::Display for DroppedGlyph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}:{}: {} (STARTCHAR {:04X})",
            self.face,
            self.path.display(),
            self.line,
            self.reason,
            self.raw_code
        )
    }
}

/// The glyphs of one face, in the order they were first read.
///
/// Inserting a code that is already present replaces the glyph but keeps
/// its position, so a diff source can patch a base source.
#[derive(Clone, Debug, Default)]
pub struct FaceMap {
    name: String,
    glyphs: IndexMap<u32, NormalizedGlyph>,
}

/// The settings needed to load one face.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaceConfig {
    pub name: String,
    /// Read in order; later sources override earlier ones.
    pub sources: Vec<PathBuf>,
    pub encoding: SourceEncoding,
    pub width: WidthClass,
}

/// A face together with the glyphs that could not be included in it.
#[derive(Clone, Debug)]
pub struct LoadedFace {
    pub map: FaceMap,
    pub dropped: Vec<DroppedGlyph>,
}

impl FaceMap {
    pub fn new(name: impl Into<String>) -> Self {
        FaceMap {
            name: name.into(),
            glyphs: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a glyph, returning the one it replaced.
    pub fn insert(&mut self, glyph: NormalizedGlyph) -> Option<NormalizedGlyph> {
        self.glyphs.insert(glyph.code, glyph)
    }

    pub fn get(&self, code: u32) -> Option<&NormalizedGlyph> {
        self.glyphs.get(&code)
    }

    pub fn contains(&self, code: u32) -> bool {
        self.glyphs.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Iterate glyphs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &NormalizedGlyph> + '_ {
        self.glyphs.values()
    }

    /// Read every glyph from `reader` into this face.
    ///
    /// Glyphs whose code cannot be mapped are appended to `dropped`; any
    /// other problem aborts and leaves the map in an unspecified state.
    /// Returns the number of glyphs added or replaced.
    pub fn extend_from_reader<R: BufRead>(
        &mut self,
        reader: GlyphReader<R>,
        encoding: SourceEncoding,
        dropped: &mut Vec<DroppedGlyph>,
    ) -> Result<usize, Error> {
        let path = reader.path().to_owned();
        let mut count = 0;
        for record in reader {
            let record = record?;
            match encoding.normalize_glyph(&record) {
                Ok(glyph) => {
                    let code = glyph.code;
                    if self.insert(glyph).is_some() {
                        debug!(
                            "{}: {}:{} replaces U+{code:04X}",
                            self.name,
                            path.display(),
                            record.line()
                        );
                    }
                    count += 1;
                }
                Err(NormalizeError::InternalConsistency { raw_code, decoded }) => {
                    return Err(Error::InternalConsistency { raw_code, decoded })
                }
                Err(reason) => {
                    warn!("{}: {reason}", self.name);
                    dropped.push(DroppedGlyph {
                        face: self.name.clone(),
                        path: path.clone(),
                        line: record.line(),
                        raw_code: record.raw_code(),
                        reason,
                    });
                }
            }
        }
        Ok(count)
    }
}

/// Read every source of a face.
pub fn load_face(config: &FaceConfig) -> Result<LoadedFace, Error> {
    info!("Loading {}...", config.name);
    let mut map = FaceMap::new(&config.name);
    let mut dropped = Vec::new();
    for path in &config.sources {
        let reader = GlyphReader::open(path, config.width)?;
        let count = map.extend_from_reader(reader, config.encoding, &mut dropped)?;
        debug!("{}: read {count} glyphs from {}", config.name, path.display());
    }
    info!("Loading {}...done ({} glyphs)", config.name, map.len());
    Ok(LoadedFace { map, dropped })
}

/// Load a face from in-memory sources, for tests and tools.
pub fn load_face_from_sources<'a>(
    name: &str,
    sources: impl IntoIterator<Item = (&'a Path, &'a [u8])>,
    encoding: SourceEncoding,
    width: WidthClass,
) -> Result<LoadedFace, Error> {
    let mut map = FaceMap::new(name);
    let mut dropped = Vec::new();
    for (path, data) in sources {
        let reader = GlyphReader::new(data, path, width);
        map.extend_from_reader(reader, encoding, &mut dropped)?;
    }
    Ok(LoadedFace { map, dropped })
}
