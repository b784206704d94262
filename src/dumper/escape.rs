use super::connector::Cell;

/// Wraps an identifier in backticks, doubling any embedded backtick.
pub fn quote_identifier(input: &str) -> String {
    format!("`{}`", input.replace('`', "``"))
}

/// Appends `raw` to `out` with MySQL string-literal escapes applied.
pub fn escape_into(raw: &[u8], out: &mut Vec<u8>) {
    out.reserve(raw.len());
    for &b in raw {
        match b {
            b'\'' => out.extend_from_slice(b"\\'"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            0 => out.extend_from_slice(b"\\0"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            0x1a => out.extend_from_slice(b"\\Z"),
            _ => out.push(b),
        }
    }
}

pub fn escape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    escape_into(raw, &mut out);
    out
}

/// Renders a cell as a SQL literal: `NULL` or a quoted, escaped string.
pub fn render_cell(cell: &Cell, out: &mut Vec<u8>) {
    match cell {
        Cell::Null => out.extend_from_slice(b"NULL"),
        Cell::Bytes(raw) => {
            out.push(b'\'');
            escape_into(raw, out);
            out.push(b'\'');
        }
    }
}

/// Renders one row as `( v1, v2, ... )`.
pub fn render_tuple(cells: &[Cell]) -> Vec<u8> {
    let mut out = Vec::with_capacity(cells.len() * 8 + 4);
    out.extend_from_slice(b"( ");
    for (idx, cell) in cells.iter().enumerate() {
        if idx > 0 {
            out.extend_from_slice(b", ");
        }
        render_cell(cell, &mut out);
    }
    out.extend_from_slice(b" )");
    out
}
