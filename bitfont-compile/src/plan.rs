//! The build plan: which faces to read and which tables to generate.
//!
//! Plans are TOML files:
//!
//! ```toml
//! [output]
//! dir = "../src"
//! header = "bitmapfont.h"
//!
//! [[face]]
//! name = "gothic"
//! sources = ["kanjic/font_src.bit"]
//! encoding = "jis-x0208"
//! width = "full"
//!
//! [[table]]
//! symbol = "SHINONOME_GOTHIC"
//! file = "shinonome_gothic.cpp"
//! layers = ["gothic"]
//!
//! [[table]]
//! symbol = "BITMAPFONT_WQY"
//! bdf = "../wenquanyi/wenquanyi_cjk_basic_9pt.bdf"
//! ```
//!
//! Relative paths are resolved against the directory containing the plan.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use serde::Deserialize;

use crate::{
    emit::DEFAULT_RECORD_NAME,
    encoding::SourceEncoding,
    error::Error,
    face::FaceConfig,
    merge::LayerOrder,
    reader::WidthClass,
};

static C_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// A validated build plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildPlan {
    pub output: OutputConfig,
    pub faces: Vec<FaceConfig>,
    /// In declaration order, which is also the order of the header's
    /// `extern` declarations.
    pub tables: Vec<TableConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// File name of the shared header, relative to `dir`.
    pub header: String,
    /// Name of the record struct.
    pub record: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableConfig {
    pub symbol: String,
    pub kind: TableKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableKind {
    /// A table generated from faces.
    Merged {
        /// File name relative to the output dir.
        file: String,
        layers: Vec<String>,
        order: LayerOrder,
        /// Symbol of an earlier table that fills in missing codes.
        fallback: Option<String>,
    },
    /// A table generated by another tool; only its declaration is ours.
    External { bdf: PathBuf },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPlan {
    output: RawOutput,
    #[serde(default, rename = "face")]
    faces: Vec<RawFace>,
    #[serde(default, rename = "table")]
    tables: Vec<RawTable>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOutput {
    dir: PathBuf,
    header: String,
    record: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFace {
    name: String,
    sources: Vec<PathBuf>,
    encoding: SourceEncoding,
    width: WidthClass,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTable {
    symbol: String,
    file: Option<String>,
    #[serde(default)]
    layers: Vec<String>,
    #[serde(default)]
    order: LayerOrder,
    fallback: Option<String>,
    bdf: Option<PathBuf>,
}

impl BuildPlan {
    /// Read and validate the plan at `path`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let base_dir = path.parent().unwrap_or(Path::new(""));
        Self::from_toml(&text, base_dir).map_err(|e| match e {
            Error::BuildConfiguration(msg) => {
                Error::config(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Parse and validate a plan, resolving relative paths against `base_dir`.
    ///
    /// This does not touch the file system; see [`BuildPlan::preflight`].
    pub fn from_toml(text: &str, base_dir: &Path) -> Result<Self, Error> {
        let raw: RawPlan = toml::from_str(text).map_err(|e| Error::config(e.to_string()))?;
        let resolve = |path: PathBuf| base_dir.join(path);

        let record = raw
            .output
            .record
            .unwrap_or_else(|| DEFAULT_RECORD_NAME.to_owned());
        check_ident("record", &record)?;
        if raw.output.header.is_empty() {
            return Err(Error::config("output header name is empty"));
        }
        let output = OutputConfig {
            dir: resolve(raw.output.dir),
            header: raw.output.header,
            record,
        };

        if raw.faces.is_empty() {
            return Err(Error::config("no faces declared"));
        }
        let mut face_names = HashSet::new();
        let mut faces = Vec::with_capacity(raw.faces.len());
        for face in raw.faces {
            if !face_names.insert(face.name.clone()) {
                return Err(Error::config(format!("face '{}' declared twice", face.name)));
            }
            if face.sources.is_empty() {
                return Err(Error::config(format!("face '{}' has no sources", face.name)));
            }
            faces.push(FaceConfig {
                name: face.name,
                sources: face.sources.into_iter().map(resolve).collect(),
                encoding: face.encoding,
                width: face.width,
            });
        }

        if raw.tables.is_empty() {
            return Err(Error::config("no tables declared"));
        }
        let mut symbols = HashSet::new();
        let mut merged_symbols = HashSet::new();
        let mut files = HashSet::from([output.header.clone()]);
        let mut tables = Vec::with_capacity(raw.tables.len());
        for table in raw.tables {
            let symbol = table.symbol;
            check_ident("table symbol", &symbol)?;
            if !symbols.insert(symbol.clone()) {
                return Err(Error::config(format!("table '{symbol}' declared twice")));
            }
            let kind = match (table.bdf, table.file) {
                (Some(_), Some(_)) => {
                    return Err(Error::config(format!(
                        "table '{symbol}' has both 'bdf' and 'file'"
                    )))
                }
                (Some(bdf), None) => {
                    if !table.layers.is_empty() || table.fallback.is_some() {
                        return Err(Error::config(format!(
                            "external table '{symbol}' cannot have layers or a fallback"
                        )));
                    }
                    TableKind::External { bdf: resolve(bdf) }
                }
                (None, None) => {
                    return Err(Error::config(format!(
                        "table '{symbol}' needs either 'file' or 'bdf'"
                    )))
                }
                (None, Some(file)) => {
                    if file.is_empty() || !files.insert(file.clone()) {
                        return Err(Error::config(format!(
                            "table '{symbol}' has an empty or duplicate file name '{file}'"
                        )));
                    }
                    if table.layers.is_empty() {
                        return Err(Error::config(format!("table '{symbol}' has no layers")));
                    }
                    let mut seen = HashSet::new();
                    for layer in &table.layers {
                        if !face_names.contains(layer) {
                            return Err(Error::config(format!(
                                "table '{symbol}' uses unknown face '{layer}'"
                            )));
                        }
                        if !seen.insert(layer) {
                            return Err(Error::config(format!(
                                "table '{symbol}' lists face '{layer}' twice"
                            )));
                        }
                    }
                    if let Some(fallback) = &table.fallback {
                        if !merged_symbols.contains(fallback) {
                            return Err(Error::config(format!(
                                "fallback '{fallback}' of table '{symbol}' must name a generated table declared before it"
                            )));
                        }
                    }
                    merged_symbols.insert(symbol.clone());
                    TableKind::Merged {
                        file,
                        layers: table.layers,
                        order: table.order,
                        fallback: table.fallback,
                    }
                }
            };
            tables.push(TableConfig { symbol, kind });
        }

        Ok(BuildPlan {
            output,
            faces,
            tables,
        })
    }

    /// Check that every input exists and the output directory is usable.
    pub fn preflight(&self) -> Result<(), Error> {
        for face in &self.faces {
            for source in &face.sources {
                if !source.is_file() {
                    return Err(Error::config(format!(
                        "source '{}' of face '{}' does not exist",
                        source.display(),
                        face.name
                    )));
                }
            }
        }
        for table in &self.tables {
            if let TableKind::External { bdf } = &table.kind {
                if !bdf.is_file() {
                    return Err(Error::config(format!(
                        "BDF '{}' of table '{}' does not exist",
                        bdf.display(),
                        table.symbol
                    )));
                }
            }
        }
        let dir = &self.output.dir;
        let metadata = std::fs::metadata(dir).map_err(|e| {
            Error::config(format!("output directory '{}': {e}", dir.display()))
        })?;
        if !metadata.is_dir() {
            return Err(Error::config(format!(
                "output path '{}' is not a directory",
                dir.display()
            )));
        }
        if metadata.permissions().readonly() {
            return Err(Error::config(format!(
                "output directory '{}' is read-only",
                dir.display()
            )));
        }
        Ok(())
    }

    pub fn face(&self, name: &str) -> Option<&FaceConfig> {
        self.faces.iter().find(|face| face.name == name)
    }
}

fn check_ident(what: &str, name: &str) -> Result<(), Error> {
    if C_IDENT.is_match(name) {
        Ok(())
    } else {
        Err(Error::config(format!("{what} '{name}' is not a valid C identifier")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACES: &str = r#"
        [output]
        dir = "out"
        header = "bitmapfont.h"

        [[face]]
        name = "gothic"
        sources = ["kanji.bit", "kanji_diff.bit"]
        encoding = "jis-x0208"
        width = "full"

        [[face]]
        name = "latin"
        sources = ["latin1.bit"]
        encoding = "latin1"
        width = "half"
    "#;

    fn parse(tables: &str) -> Result<BuildPlan, Error> {
        BuildPlan::from_toml(&format!("{FACES}\n{tables}"), Path::new("fonts"))
    }

    fn config_error(tables: &str) -> String {
        match parse(tables) {
            Err(Error::BuildConfiguration(msg)) => msg,
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn fixture_plan() {
        let dir = bitfont_test_data::test_data_dir();
        let plan = BuildPlan::from_toml(bitfont_test_data::PLAN, &dir).unwrap();
        assert_eq!(plan.output.dir, dir.join("out"));
        assert_eq!(plan.output.record, "BitmapFontGlyph");
        assert_eq!(plan.faces.len(), 5);
        let gothic = plan.face("gothic").unwrap();
        assert_eq!(gothic.sources, [dir.join("kanji.bit"), dir.join("kanji_diff.bit")]);
        assert_eq!(gothic.encoding, SourceEncoding::JisX0208);
        assert_eq!(gothic.width, WidthClass::Full);
        let symbols: Vec<_> = plan.tables.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, ["SHINONOME_GOTHIC", "SHINONOME_MINCHO", "BITMAPFONT_WQY"]);
        assert_eq!(
            plan.tables[1].kind,
            TableKind::Merged {
                file: "shinonome_mincho.cpp".into(),
                layers: vec!["mincho".into()],
                order: LayerOrder::FirstListed,
                fallback: Some("SHINONOME_GOTHIC".into()),
            }
        );
        assert_eq!(
            plan.tables[2].kind,
            TableKind::External {
                bdf: dir.join("wqy.bdf")
            }
        );
    }

    #[test]
    fn production_plan() {
        let text = include_str!("../../resources/font_plan.toml");
        let plan = BuildPlan::from_toml(text, Path::new("resources")).unwrap();
        assert_eq!(plan.output.dir, Path::new("resources/../src"));
        assert_eq!(plan.faces.len(), 11);
        let symbols: Vec<_> = plan.tables.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(
            symbols,
            [
                "SHINONOME_GOTHIC",
                "SHINONOME_MINCHO",
                "BITMAPFONT_WQY",
                "BITMAPFONT_RMG2000",
                "BITMAPFONT_TTYP0"
            ]
        );
        assert!(matches!(
            &plan.tables[0].kind,
            TableKind::Merged { layers, order: LayerOrder::LastListed, .. } if layers.len() == 8
        ));
    }

    #[test]
    fn order_and_record() {
        let plan = BuildPlan::from_toml(
            r#"
            [output]
            dir = "."
            header = "font.h"
            record = "Glyph"

            [[face]]
            name = "a"
            sources = ["a.bit"]
            encoding = "unicode"
            width = "half"

            [[table]]
            symbol = "A"
            file = "a.cpp"
            layers = ["a"]
            order = "last-listed"
            "#,
            Path::new(""),
        )
        .unwrap();
        assert_eq!(plan.output.record, "Glyph");
        assert!(matches!(
            plan.tables[0].kind,
            TableKind::Merged {
                order: LayerOrder::LastListed,
                ..
            }
        ));
    }

    #[test]
    fn resolves_paths() {
        let plan = parse("[[table]]\nsymbol = \"G\"\nfile = \"g.cpp\"\nlayers = [\"gothic\"]").unwrap();
        assert_eq!(plan.output.dir, Path::new("fonts/out"));
        assert_eq!(plan.faces[1].sources, [PathBuf::from("fonts/latin1.bit")]);
    }

    #[test]
    fn rejects_bad_plans() {
        assert!(config_error("").contains("no tables"));
        assert!(config_error("[[table]]\nsymbol = \"G\"\nfile = \"g.cpp\"\nlayers = [\"mincho\"]")
            .contains("unknown face 'mincho'"));
        assert!(config_error("[[table]]\nsymbol = \"G\"\nfile = \"g.cpp\"\nlayers = []")
            .contains("no layers"));
        assert!(config_error("[[table]]\nsymbol = \"1G\"\nfile = \"g.cpp\"\nlayers = [\"latin\"]")
            .contains("not a valid C identifier"));
        assert!(config_error("[[table]]\nsymbol = \"G\"\nlayers = [\"latin\"]")
            .contains("either 'file' or 'bdf'"));
        assert!(config_error(
            "[[table]]\nsymbol = \"G\"\nfile = \"bitmapfont.h\"\nlayers = [\"latin\"]"
        )
        .contains("duplicate file name"));
        assert!(config_error(
            "[[table]]\nsymbol = \"G\"\nfile = \"g.cpp\"\nlayers = [\"latin\", \"latin\"]"
        )
        .contains("twice"));
        assert!(config_error("[[table]]\nsymbol = \"G\"\nfile = \"g.cpp\"\nlayers = [\"latin\"]\nencoding = \"x\"")
            .contains("unknown field"));
    }

    #[test]
    fn rejects_duplicates() {
        let twice = r#"
            [[table]]
            symbol = "G"
            file = "g.cpp"
            layers = ["gothic"]

            [[table]]
            symbol = "G"
            file = "g2.cpp"
            layers = ["latin"]
        "#;
        assert!(config_error(twice).contains("table 'G' declared twice"));

        let same_file = r#"
            [[table]]
            symbol = "G"
            file = "g.cpp"
            layers = ["gothic"]

            [[table]]
            symbol = "L"
            file = "g.cpp"
            layers = ["latin"]
        "#;
        assert!(config_error(same_file).contains("duplicate file name 'g.cpp'"));

        let face_twice = FACES.replace("name = \"latin\"", "name = \"gothic\"");
        let text =
            format!("{face_twice}\n[[table]]\nsymbol = \"G\"\nfile = \"g.cpp\"\nlayers = [\"gothic\"]");
        match BuildPlan::from_toml(&text, Path::new("")) {
            Err(Error::BuildConfiguration(msg)) => {
                assert!(msg.contains("face 'gothic' declared twice"), "{msg}")
            }
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn file_and_bdf_are_exclusive() {
        let both = r#"
            [[table]]
            symbol = "WQY"
            file = "wqy.cpp"
            bdf = "wqy.bdf"
        "#;
        assert!(config_error(both).contains("both 'bdf' and 'file'"));

        let external_with_layers = r#"
            [[table]]
            symbol = "WQY"
            bdf = "wqy.bdf"
            layers = ["gothic"]
        "#;
        assert!(config_error(external_with_layers).contains("cannot have layers"));
    }

    #[test]
    fn fallback_must_be_earlier() {
        let later = r#"
            [[table]]
            symbol = "MINCHO"
            file = "mincho.cpp"
            layers = ["gothic"]
            fallback = "GOTHIC"

            [[table]]
            symbol = "GOTHIC"
            file = "gothic.cpp"
            layers = ["gothic", "latin"]
        "#;
        assert!(config_error(later).contains("fallback 'GOTHIC'"));

        let itself = r#"
            [[table]]
            symbol = "GOTHIC"
            file = "gothic.cpp"
            layers = ["gothic"]
            fallback = "GOTHIC"
        "#;
        assert!(config_error(itself).contains("fallback 'GOTHIC'"));

        let external = r#"
            [[table]]
            symbol = "WQY"
            bdf = "wqy.bdf"

            [[table]]
            symbol = "GOTHIC"
            file = "gothic.cpp"
            layers = ["gothic"]
            fallback = "WQY"
        "#;
        assert!(config_error(external).contains("fallback 'WQY'"));
    }

    #[test]
    fn rejects_unknown_encoding() {
        let text = FACES.replace("\"latin1\"", "\"ebcdic\"");
        let result = BuildPlan::from_toml(&text, Path::new(""));
        assert!(matches!(result, Err(Error::BuildConfiguration(_))));
    }

    #[test]
    fn rejects_empty_faces() {
        let text = "[output]\ndir = \"out\"\nheader = \"a.h\"\n[[table]]\nsymbol = \"A\"\nbdf = \"a.bdf\"";
        match BuildPlan::from_toml(text, Path::new("")) {
            Err(Error::BuildConfiguration(msg)) => assert!(msg.contains("no faces")),
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn preflight() {
        let dir = bitfont_test_data::test_data_dir();
        let mut plan = BuildPlan::from_toml(bitfont_test_data::PLAN, &dir).unwrap();

        // the fixture's output dir does not exist
        match plan.preflight() {
            Err(Error::BuildConfiguration(msg)) => assert!(msg.contains("output directory")),
            other => panic!("expected a configuration error, got {other:?}"),
        }

        plan.output.dir = dir.clone();
        plan.preflight().unwrap();

        plan.output.dir = dir.join("plan.toml");
        assert!(plan.preflight().is_err());

        let read_only = std::env::temp_dir().join(format!(
            "bitfont-compile-plan-{}-read-only",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&read_only);
        std::fs::create_dir_all(&read_only).unwrap();
        let mut permissions = std::fs::metadata(&read_only).unwrap().permissions();
        permissions.set_readonly(true);
        std::fs::set_permissions(&read_only, permissions).unwrap();
        plan.output.dir = read_only.clone();
        let result = plan.preflight();
        std::fs::remove_dir(&read_only).unwrap();
        match result {
            Err(Error::BuildConfiguration(msg)) => assert!(msg.contains("read-only"), "{msg}"),
            other => panic!("expected a configuration error, got {other:?}"),
        }

        plan.output.dir = dir.clone();
        plan.faces[0].sources.push(dir.join("missing.bit"));
        match plan.preflight() {
            Err(Error::BuildConfiguration(msg)) => assert!(msg.contains("missing.bit")),
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }
}
