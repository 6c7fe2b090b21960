//! Writing merged tables as C++ sources and a shared header.
//!
//! Every table shares one record type:
//!
//! ```c
//! struct BitmapFontGlyph {
//!     uint16_t code;     // or uint32_t, see below
//!     bool is_full;
//!     uint16_t data[12];
//! };
//! ```
//!
//! The width of `code` is decided once for the whole build, from the largest
//! code in any table, so the header can only be written after every table
//! has been emitted. [`EmitSession`] tracks that state.

use std::fmt::Write;

use log::debug;

use crate::{merge::MergedTable, reader::GLYPH_ROWS};

pub const DEFAULT_RECORD_NAME: &str = "BitmapFontGlyph";

/// The C integer type used for the `code` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CodeWidth {
    U16,
    U32,
}

impl CodeWidth {
    /// The narrowest width that holds `max_code`.
    pub fn for_max_code(max_code: u32) -> Self {
        if max_code < 0x10000 {
            CodeWidth::U16
        } else {
            CodeWidth::U32
        }
    }

    pub fn c_type(self) -> &'static str {
        match self {
            CodeWidth::U16 => "uint16_t",
            CodeWidth::U32 => "uint32_t",
        }
    }
}

/// One generated table source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmittedTable {
    pub symbol: String,
    pub len: usize,
    pub max_code: Option<u32>,
    pub source: String,
}

/// The generated header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmittedHeader {
    pub code_width: CodeWidth,
    pub source: String,
}

#[derive(Clone, Debug)]
struct Declaration {
    symbol: String,
    len: usize,
}

/// State shared by all tables that use one header.
#[derive(Clone, Debug)]
pub struct EmitSession {
    header_name: String,
    record_name: String,
    max_code: u32,
    declarations: Vec<Declaration>,
}

impl EmitSession {
    /// `header_name` is the file name tables use to include the header.
    pub fn new(header_name: impl Into<String>, record_name: impl Into<String>) -> Self {
        EmitSession {
            header_name: header_name.into(),
            record_name: record_name.into(),
            max_code: 0,
            declarations: Vec::new(),
        }
    }

    /// Render `table` as a static array named `symbol`.
    ///
    /// Records are written in ascending code order.
    pub fn emit_table(&mut self, symbol: &str, table: &MergedTable) -> EmittedTable {
        let mut source = String::new();
        writeln!(&mut source, "#include \"{}\"", self.header_name).unwrap();
        writeln!(&mut source).unwrap();
        writeln!(
            &mut source,
            "{} const {symbol}[{}] = {{",
            self.record_name,
            table.len()
        )
        .unwrap();
        for glyph in table.iter() {
            let rows = glyph
                .rows
                .iter()
                .map(|row| row.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(&mut source, "  {{ {}, {}, {{ {rows} }} }},", glyph.code, glyph.is_full)
                .unwrap();
        }
        writeln!(&mut source, "}};").unwrap();

        let max_code = table.max_code();
        if let Some(max) = max_code {
            self.max_code = self.max_code.max(max);
        }
        debug!(
            "{symbol}: {} glyphs, max code {:?}, running max 0x{:X}",
            table.len(),
            max_code,
            self.max_code
        );
        self.declare(symbol, table.len());
        EmittedTable {
            symbol: symbol.to_owned(),
            len: table.len(),
            max_code,
            source,
        }
    }

    /// Declare a table that is generated elsewhere but shares the header.
    pub fn declare_external(&mut self, symbol: &str, len: usize) {
        self.declare(symbol, len);
    }

    fn declare(&mut self, symbol: &str, len: usize) {
        self.declarations.push(Declaration {
            symbol: symbol.to_owned(),
            len,
        });
    }

    /// The largest code emitted so far.
    pub fn max_code(&self) -> u32 {
        self.max_code
    }

    pub fn code_width(&self) -> CodeWidth {
        CodeWidth::for_max_code(self.max_code)
    }

    /// Render the header; this ends the session.
    pub fn finish(self) -> EmittedHeader {
        let code_width = self.code_width();
        let guard = include_guard(&self.header_name);
        let mut source = String::new();
        writeln!(&mut source, "#ifndef {guard}").unwrap();
        writeln!(&mut source, "#define {guard}").unwrap();
        writeln!(&mut source).unwrap();
        writeln!(&mut source, "#include <stdint.h>").unwrap();
        writeln!(&mut source).unwrap();
        writeln!(&mut source, "struct {} {{", self.record_name).unwrap();
        writeln!(&mut source, "\t{} code;", code_width.c_type()).unwrap();
        writeln!(&mut source, "\tbool is_full;").unwrap();
        writeln!(&mut source, "\tuint16_t data[{GLYPH_ROWS}];").unwrap();
        writeln!(&mut source, "}};").unwrap();
        writeln!(&mut source).unwrap();
        for decl in &self.declarations {
            writeln!(
                &mut source,
                "extern {} const {}[{}];",
                self.record_name, decl.symbol, decl.len
            )
            .unwrap();
        }
        writeln!(&mut source).unwrap();
        writeln!(&mut source, "#endif // {guard}").unwrap();
        EmittedHeader { code_width, source }
    }
}

/// `bitmapfont.h` -> `_INC_BITMAPFONT_H_`
fn include_guard(header_name: &str) -> String {
    let stem: String = header_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("_INC_{stem}_")
}
