//! JSON-lines output.

use std::io::Write;

use serde::Serialize;

/// Write `value` as one JSON line on stdout.
///
/// # Errors
///
/// Returns the I/O error if stdout cannot be written.
pub fn emit<T: Serialize>(value: &T) -> std::io::Result<()> {
    emit_to(std::io::stdout().lock(), value)
}

/// Write `value` as one JSON line to `writer`.
///
/// # Errors
///
/// Returns the I/O error if `writer` fails.
pub fn emit_to<W: Write, T: Serialize>(mut writer: W, value: &T) -> std::io::Result<()> {
    serde_json::to_writer(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
