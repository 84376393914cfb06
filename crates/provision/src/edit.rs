//! Line-level edits of host files
//!
//! Pure text transforms; the host collaborator does the reading and
//! writing.

use crate::plan::KeyAction;

/// Address Debian-family systems map the hostname to
pub const LOOPBACK_ALIAS: &str = "127.0.1.1";

/// Point the loopback alias at `hostname`.
///
/// The first alias line is replaced in place, later ones are dropped, and
/// the entry is appended when missing. Output always ends with a newline.
pub fn upsert_loopback_alias(hosts: &str, hostname: &str) -> String {
    let entry = format!("{LOOPBACK_ALIAS} {hostname}");
    let mut replaced = false;
    let mut lines: Vec<String> = Vec::new();

    for line in hosts.lines() {
        if line.split_whitespace().next() == Some(LOOPBACK_ALIAS) {
            if !replaced {
                lines.push(entry.clone());
                replaced = true;
            }
            continue;
        }
        lines.push(line.to_string());
    }

    if !replaced {
        lines.push(entry);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Apply a key decision to the current `authorized_keys` content
pub fn merge_authorized_keys(existing: &str, action: &KeyAction) -> String {
    match action {
        KeyAction::Replace(key) => format!("{}\n", key.trim()),
        KeyAction::Append(key) => {
            let key = key.trim();
            if existing.lines().any(|line| line.trim() == key) {
                return existing.to_string();
            }
            let mut out = existing.to_string();
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(key);
            out.push('\n');
            out
        }
        KeyAction::Skip => existing.to_string(),
    }
}
