//! Running a build plan.
//!
//! A run reads every face, merges and emits every table, and only then
//! touches the output directory. Any fatal error before that point leaves the
//! previous outputs untouched.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::{
    bdf,
    emit::{CodeWidth, EmitSession},
    error::Error,
    face::{self, DroppedGlyph, FaceMap},
    merge::MergedTable,
    plan::{BuildPlan, TableKind},
};

/// One file to be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub contents: String,
}

/// Everything a successful run produced.
#[derive(Clone, Debug)]
pub struct BuildOutput {
    /// The table sources in plan order, followed by the header.
    pub artifacts: Vec<Artifact>,
    /// Glyphs left out because their code could not be mapped.
    pub dropped: Vec<DroppedGlyph>,
    pub code_width: CodeWidth,
    /// Glyph counts of the generated tables, by symbol, in plan order.
    pub table_sizes: Vec<(String, usize)>,
}

/// Compile `plan` in memory.
pub fn compile(plan: &BuildPlan) -> Result<BuildOutput, Error> {
    plan.preflight()?;

    // faces are independent, so they can be read in parallel; collecting
    // keeps them in plan order.
    let loaded = plan
        .faces
        .par_iter()
        .map(face::load_face)
        .collect::<Result<Vec<_>, _>>()?;

    let mut dropped = Vec::new();
    let mut faces = HashMap::new();
    for face in loaded {
        dropped.extend(face.dropped);
        faces.insert(face.map.name().to_owned(), face.map);
    }

    let mut session = EmitSession::new(&plan.output.header, &plan.output.record);
    let mut merged: HashMap<&str, MergedTable> = HashMap::new();
    let mut artifacts = Vec::new();
    let mut table_sizes = Vec::new();
    for table in &plan.tables {
        match &table.kind {
            TableKind::Merged {
                file,
                layers,
                order,
                fallback,
            } => {
                info!("Generating {}...", table.symbol);
                let layers = layers
                    .iter()
                    .map(|name| {
                        faces.get(name).ok_or_else(|| {
                            Error::config(format!(
                                "table '{}' uses unknown face '{name}'",
                                table.symbol
                            ))
                        })
                    })
                    .collect::<Result<Vec<&FaceMap>, _>>()?;
                let mut result = MergedTable::merge(&layers, *order);
                if let Some(fallback) = fallback {
                    let source = merged.get(fallback.as_str()).ok_or_else(|| {
                        Error::config(format!(
                            "fallback '{fallback}' of table '{}' has not been generated",
                            table.symbol
                        ))
                    })?;
                    let added = result.apply_fallback(source);
                    debug!("{}: {added} glyphs from {fallback}", table.symbol);
                }
                // C++ has no zero-length arrays
                if result.is_empty() {
                    return Err(Error::config(format!(
                        "table '{}' has no glyphs",
                        table.symbol
                    )));
                }
                let emitted = session.emit_table(&table.symbol, &result);
                info!("Generating {}...done ({} glyphs)", table.symbol, emitted.len);
                artifacts.push(Artifact {
                    path: plan.output.dir.join(file),
                    contents: emitted.source,
                });
                table_sizes.push((table.symbol.clone(), emitted.len));
                merged.insert(&table.symbol, result);
            }
            TableKind::External { bdf } => {
                let count = bdf::char_count(bdf)?;
                if count == 0 {
                    return Err(Error::config(format!(
                        "table '{}': '{}' declares no glyphs",
                        table.symbol,
                        bdf.display()
                    )));
                }
                debug!("{}: {count} glyphs declared by {}", table.symbol, bdf.display());
                session.declare_external(&table.symbol, count);
            }
        }
    }

    info!("Generating header...");
    let header = session.finish();
    info!(
        "Generating header...done ({} code)",
        header.code_width.c_type()
    );
    artifacts.push(Artifact {
        path: plan.output.dir.join(&plan.output.header),
        contents: header.source,
    });

    Ok(BuildOutput {
        artifacts,
        dropped,
        code_width: header.code_width,
        table_sizes,
    })
}

impl BuildOutput {
    /// Write every artifact, or none of them.
    ///
    /// Each file is first written next to its destination. Only once all of
    /// them have been written are they renamed into place; a file being
    /// replaced is moved aside to `<name>.bak` first, and if any rename fails
    /// every replaced file is restored.
    pub fn write(&self) -> Result<(), Error> {
        for artifact in &self.artifacts {
            if artifact.path.is_dir() {
                return Err(Error::config(format!(
                    "output '{}' is a directory",
                    artifact.path.display()
                )));
            }
        }

        let mut staged = Vec::with_capacity(self.artifacts.len());
        for artifact in &self.artifacts {
            let tmp = sibling_path(&artifact.path, "tmp");
            if let Err(e) = std::fs::write(&tmp, &artifact.contents) {
                staged.push(tmp.clone());
                remove_files(&staged);
                return Err(Error::io(&tmp, e));
            }
            staged.push(tmp);
        }

        let mut committed = Vec::with_capacity(self.artifacts.len());
        for (artifact, tmp) in self.artifacts.iter().zip(&staged) {
            match commit(tmp, &artifact.path) {
                Ok(backup) => committed.push((artifact.path.as_path(), backup)),
                Err(e) => {
                    roll_back(&committed);
                    remove_files(&staged);
                    return Err(e);
                }
            }
        }

        let backups: Vec<_> = committed.into_iter().filter_map(|(_, b)| b).collect();
        remove_files(&backups);
        for artifact in &self.artifacts {
            info!(
                "wrote {} bytes to {}",
                artifact.contents.len(),
                artifact.path.display()
            );
        }
        Ok(())
    }
}

/// `dir/name` -> `dir/name.<ext>`
fn sibling_path(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_owned();
    name.push(".");
    name.push(ext);
    path.with_file_name(name)
}

/// Move `tmp` to `path`, moving any file already at `path` aside first.
///
/// Returns where the previous file went, if there was one.
fn commit(tmp: &Path, path: &Path) -> Result<Option<PathBuf>, Error> {
    let backup = if path.exists() {
        let backup = sibling_path(path, "bak");
        std::fs::rename(path, &backup).map_err(|e| Error::io(path, e))?;
        Some(backup)
    } else {
        None
    };
    if let Err(e) = std::fs::rename(tmp, path) {
        if let Some(backup) = &backup {
            restore(backup, path);
        }
        return Err(Error::io(path, e));
    }
    Ok(backup)
}

/// Undo `commit` for each `(path, backup)`, newest first.
fn roll_back(committed: &[(&Path, Option<PathBuf>)]) {
    for (path, backup) in committed.iter().rev() {
        match backup {
            Some(backup) => restore(backup, path),
            None => remove_files(&[path.to_path_buf()]),
        }
    }
}

fn restore(backup: &Path, path: &Path) {
    if let Err(e) = std::fs::rename(backup, path) {
        warn!(
            "failed to restore '{}' from '{}': {e}",
            path.display(),
            backup.display()
        );
    }
}

fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("failed to remove '{}': {e}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "bitfont-compile-build-{}-{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn sibling_paths() {
        assert_eq!(
            sibling_path(Path::new("src/bitmapfont.h"), "tmp"),
            Path::new("src/bitmapfont.h.tmp")
        );
        assert_eq!(
            sibling_path(Path::new("gothic.cpp"), "bak"),
            Path::new("gothic.cpp.bak")
        );
    }

    #[test]
    fn commit_keeps_a_backup() {
        let dir = scratch_dir("commit");
        let target = dir.join("table.cpp");
        std::fs::write(&target, "old").unwrap();
        std::fs::write(dir.join("table.cpp.tmp"), "new").unwrap();

        let backup = commit(&dir.join("table.cpp.tmp"), &target).unwrap();
        assert_eq!(backup.as_deref(), Some(dir.join("table.cpp.bak").as_path()));
        assert_eq!(read(&target), "new");
        assert_eq!(read(&dir.join("table.cpp.bak")), "old");
        assert!(!dir.join("table.cpp.tmp").exists());

        let fresh = dir.join("fresh.cpp");
        std::fs::write(dir.join("fresh.cpp.tmp"), "new").unwrap();
        assert_eq!(commit(&dir.join("fresh.cpp.tmp"), &fresh).unwrap(), None);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn failed_commit_restores_the_previous_file() {
        let dir = scratch_dir("failed-commit");
        let target = dir.join("table.cpp");
        std::fs::write(&target, "old").unwrap();

        // nothing was staged, so the rename fails after the backup is taken
        let result = commit(&dir.join("table.cpp.tmp"), &target);
        assert!(matches!(result, Err(Error::Io { .. })));
        assert_eq!(read(&target), "old");
        assert!(!dir.join("table.cpp.bak").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn roll_back_restores_replaced_files() {
        let dir = scratch_dir("roll-back");
        let replaced = dir.join("gothic.cpp");
        let created = dir.join("mincho.cpp");
        std::fs::write(&replaced, "old gothic").unwrap();
        std::fs::write(dir.join("gothic.cpp.tmp"), "new gothic").unwrap();
        std::fs::write(dir.join("mincho.cpp.tmp"), "new mincho").unwrap();

        let gothic_backup = commit(&dir.join("gothic.cpp.tmp"), &replaced).unwrap();
        let mincho_backup = commit(&dir.join("mincho.cpp.tmp"), &created).unwrap();
        roll_back(&[
            (replaced.as_path(), gothic_backup),
            (created.as_path(), mincho_backup),
        ]);

        assert_eq!(read(&replaced), "old gothic");
        assert!(!created.exists());
        assert!(!dir.join("gothic.cpp.bak").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
