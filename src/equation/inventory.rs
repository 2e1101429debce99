use std::io::Cursor;

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    pub name: String,
    pub size: u64,
}

/// Lists the named streams inside an OLE compound file (at most `limit`).
/// Anything that does not parse as a compound file yields an empty list.
pub fn list_ole_streams(bytes: &[u8], limit: usize) -> Vec<StreamInfo> {
    let Ok(comp) = cfb::CompoundFile::open(Cursor::new(bytes)) else {
        return Vec::new();
    };
    comp.walk()
        .filter(|entry| entry.is_stream())
        .take(limit)
        .map(|entry| StreamInfo {
            name: entry.name().to_string(),
            size: entry.len(),
        })
        .collect()
}
