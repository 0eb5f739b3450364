//! Render snapshots into the tagged context block sent to the model.
//!
//! File contents are emitted raw, without XML escaping.

use std::fmt::Write as _;

use super::types::Snapshot;

/// Render the files of one snapshot as a `<codebase_subfolder>` block.
pub fn serialize_subfolder(snapshot: &Snapshot) -> String {
    let mut out = String::with_capacity(snapshot.total_bytes() + snapshot.len() * 64);
    out.push_str("<codebase_subfolder>\n");
    for (path, record) in snapshot.iter() {
        let _ = write!(
            out,
            "<file>\n<path>{}</path>\n<content>{}</content>\n</file>\n",
            path, record.content
        );
    }
    out.push_str("</codebase_subfolder>\n");
    out
}

/// Render several snapshots as one `<codebase>` document, in the given order.
pub fn serialize<'a, I>(snapshots: I) -> String
where
    I: IntoIterator<Item = &'a Snapshot>,
{
    let mut out = String::from("\n<codebase>\n");
    for snapshot in snapshots {
        out.push_str(&serialize_subfolder(snapshot));
    }
    out.push_str("</codebase>\n");
    out
}

/// Size of a string in kilobytes, formatted with two decimals.
pub fn format_size(contents: &str) -> String {
    format!("{:.2} KB", contents.len() as f64 / 1024.0)
}
