// SPDX-License-Identifier: Apache-2.0
//! Shared flat `key=value` tokenizer backing both the fixture reader
//! ([`crate::fixture`]) and the flat-file [`crate::config::RunConfig`]
//! source, rather than each parsing its own dialect of the same grammar.

use std::collections::BTreeMap;

/// Parses `text` into an ordered key→value map.
///
/// Blank lines and lines beginning with `#` (after trimming leading
/// whitespace) are skipped. Lines without an `=` are skipped rather than
/// rejected, matching the source format's "unknown keys are ignored"
/// tolerance — callers that require a key present check for it themselves.
#[must_use]
pub fn parse_flat_kv(text: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    map
}
