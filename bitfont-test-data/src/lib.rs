//! glyph source fixtures shared between the bitfont crates.
//!
//! Every fixture is also available on disk under [`test_data_dir`], so that
//! tests which drive a whole build plan can reference them by path.

use std::path::PathBuf;

/// The directory holding the fixture files.
pub fn test_data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_data")
}

/// A single half-width glyph for 'A' with only the bottom-left pixel set.
pub static SCENARIO_A: &str = include_str!("../test_data/scenario_a.bit");

/// ISO-8859-1 half-width glyphs: `A`, `B` and `é`.
///
/// The preamble carries an EUC-JP encoded comment, so this is not valid UTF-8.
pub static LATIN1: &[u8] = include_bytes!("../test_data/latin1.bit");

/// Unicode half-width glyphs: a second `A`, `…` and `€`.
pub static EXTRAS: &str = include_str!("../test_data/extras.bit");

/// CP932 half-width glyphs: a third `A`, `ｱ` and the undecodable byte `0xA0`.
pub static HANKAKU: &str = include_str!("../test_data/hankaku.bit");

/// JIS X 0208 full-width glyphs: ideographic space and `あ`.
pub static KANJI: &str = include_str!("../test_data/kanji.bit");

/// Overrides `あ` from [`KANJI`] and adds `ぃ`.
pub static KANJI_DIFF: &str = include_str!("../test_data/kanji_diff.bit");

/// A mincho-style `あ` (same bitmap as the base gothic one), nothing else.
pub static MINCHO_DIFF: &str = include_str!("../test_data/mincho_diff.bit");

/// Two glyphs, the second of which has a `#` in its pixel field.
pub static BAD_PIXEL: &str = include_str!("../test_data/bad_pixel.bit");

/// A BDF font declaring `CHARS 2`.
pub static WQY_BDF: &str = include_str!("../test_data/wqy.bdf");

/// A build plan tying all of the above together.
pub static PLAN: &str = include_str!("../test_data/plan.toml");

pub mod rows {
    //! Expected row bitmasks for the fixture glyphs.

    pub const LATIN_A: [u16; 12] = [0, 4, 10, 17, 17, 31, 17, 17, 17, 0, 0, 0];
    pub const LATIN_B: [u16; 12] = [0, 15, 17, 17, 15, 17, 17, 15, 0, 0, 0, 0];
    pub const LATIN_E_ACUTE: [u16; 12] = [8, 4, 14, 17, 31, 1, 17, 14, 0, 0, 0, 0];
    pub const EXTRAS_A: [u16; 12] = [0, 6, 9, 9, 15, 9, 9, 9, 0, 0, 0, 0];
    pub const HANKAKU_A: [u16; 12] = [0, 12, 18, 18, 30, 18, 18, 18, 18, 0, 0, 0];
    pub const ELLIPSIS: [u16; 12] = [0, 0, 0, 0, 0, 0, 0, 21, 0, 0, 0, 0];
    pub const EURO: [u16; 12] = [0, 28, 2, 15, 2, 15, 2, 28, 0, 0, 0, 0];
    pub const HALFWIDTH_KA: [u16; 12] = [0, 31, 16, 12, 4, 2, 1, 0, 0, 0, 0, 0];
    pub const GOTHIC_A: [u16; 12] = [16, 511, 16, 248, 276, 530, 522, 262, 132, 64, 0, 0];
    pub const GOTHIC_A_DIFF: [u16; 12] = [8, 511, 8, 248, 268, 522, 518, 262, 132, 96, 0, 0];
    pub const GOTHIC_SMALL_I: [u16; 12] = [0, 0, 260, 516, 516, 1028, 1028, 1096, 48, 0, 0, 0];
}
