//! Reading and writing the editor's JSON document on disk.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

/// Load `path`, or an empty object if the file does not exist yet.
pub fn load_document(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let doc = serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))?;
    Ok(doc)
}

/// Write `doc` to `path` atomically (temp file in the same directory + rename).
///
/// Uses four-space indentation, the layout the editor writes.
pub fn save_document(path: &Path, doc: &Value) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    doc.serialize(&mut ser).context("encode document")?;
    buf.push(b'\n');

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(&buf).context("write temp file")?;
    tmp.as_file().sync_all().context("sync temp file")?;
    tmp.persist(path)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
