//! Fence language tag to sample file extension mapping.
//!
//! Only tags the toolchain can actually process produce sample files; a
//! fenced block with an unknown tag is recorded for bookkeeping but never
//! materialized.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Resolve a fence tag to the sample file extension, if the language is one
/// the toolchain understands.
pub fn extension_for(tag: &str) -> Option<&'static str> {
    let lower = tag.to_lowercase();
    LANGUAGE_EXTENSIONS.get(lower.as_str()).copied()
}

/// Whether a fence tag names a processable language.
pub fn is_known(tag: &str) -> bool {
    extension_for(tag).is_some()
}

/// Embedded tag map.
///
/// Includes canonical names, common aliases, and bare extensions.
static LANGUAGE_EXTENSIONS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    m.insert("ts", "ts");
    m.insert("typescript", "ts");
    m.insert("mts", "mts");
    m.insert("cts", "cts");

    m.insert("js", "js");
    m.insert("javascript", "js");
    m.insert("mjs", "mjs");
    m.insert("cjs", "cjs");

    m.insert("tsx", "tsx");
    m.insert("jsx", "jsx");

    m.insert("json", "json");
    m.insert("jsonc", "jsonc");

    m
});
