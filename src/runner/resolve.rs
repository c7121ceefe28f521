//! Resolution of report locations back through sample-file indirection.
//!
//! Reports produced while the toolchain chews on synthetic sample files carry
//! sample-file coordinates. The resolver rewrites them — the `file` field and
//! every location embedded in the message text, stack frames included — into
//! origin-document coordinates. The intermediate textual form is the
//! pseudo-reference `path$startLine-endLine[.ext]`, which tags a location as
//! sample-relative until its line and column have been shifted.
//!
//! Resolution is best-effort throughout: malformed input leaves fields
//! unresolved rather than failing the run.

use crate::runner::report::ReportKind;
use crate::samples::extract::{CodeSample, SampleSet};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use url::Url;

/// Per-kind line/column corrections for locations that arrive pre-stamped as
/// pseudo-references rather than through a sample lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationOffset {
    pub line: i64,
    pub column: i64,
}

/// Column correction for samples whose origin is not a Markdown document:
/// their lines lost a comment-prefix character during dedenting that the
/// per-kind offsets cannot account for.
const DOC_COMMENT_COLUMN_EXTRA: i64 = 1;

static PSEUDO_FILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<path>.+)\$(?P<start>\d+)-(?P<end>\d+)(?P<ext>\.[A-Za-z0-9]+)?$").unwrap());

static PSEUDO_SUFFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\d+-\d+(\.[A-Za-z0-9]+)?$").unwrap());

static EMBEDDED_REF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // Paths stop at whitespace and bracketing; ':' stays allowed so file://
    // specifiers match.
    Regex::new(r#"(?P<path>[^\s()'"]+?)\$(?P<start>\d+)-(?P<end>\d+)(?P<ext>\.[A-Za-z0-9]+)?:(?P<line>\d+):(?P<column>\d+)"#)
        .unwrap()
});

/// Rewrites one report's location data from sample coordinates back to the
/// origin document. One instance per run.
pub struct Resolver<'a> {
    samples: &'a SampleSet,
    offsets: &'a HashMap<ReportKind, LocationOffset>,
    /// Canonical absolute path of each requested document, mapped to the
    /// caller's own spelling of it.
    requested: &'a HashMap<PathBuf, String>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        samples: &'a SampleSet,
        offsets: &'a HashMap<ReportKind, LocationOffset>,
        requested: &'a HashMap<PathBuf, String>,
    ) -> Self {
        Self {
            samples,
            offsets,
            requested,
        }
    }

    /// Resolve the accumulated fields and message of a report in place.
    pub fn resolve(&self, kind: ReportKind, fields: &mut BTreeMap<String, String>, message: &mut String) {
        if let Some(raw) = fields.get("file").cloned() {
            let path_str = normalize_specifier(&raw);

            if let Some(sample) = self.sample_for_path(&path_str) {
                self.resolve_through_sample(sample, &raw, &path_str, fields, message);
            } else if let Some(caps) = PSEUDO_FILE_REGEX.captures(&path_str) {
                let origin = caps["path"].to_string();
                self.apply_kind_offset(kind, &origin, fields);
                fields.insert("file".to_string(), origin);
            } else {
                fields.insert("file".to_string(), path_str);
            }
        }

        *message = self.rewrite_embedded_refs(kind, message);

        if let Some(file) = fields.get_mut("file") {
            *file = PSEUDO_SUFFIX_REGEX.replace(file, "").into_owned();
            if let Some(spelling) = self.requested_spelling(file) {
                *file = spelling;
            }
        }
    }

    fn sample_for_path(&self, path_str: &str) -> Option<&'a CodeSample> {
        let path = Path::new(path_str);
        if !path.starts_with(self.samples.root()) {
            return None;
        }
        self.samples.by_sample_path(path)
    }

    /// The report's file is a synthetic sample file: shift its coordinates by
    /// the sample's position and rewrite the sample path inside the message.
    fn resolve_through_sample(
        &self,
        sample: &CodeSample,
        raw: &str,
        path_str: &str,
        fields: &mut BTreeMap<String, String>,
        message: &mut String,
    ) {
        let has_point = parse_field(fields, "line").is_some() && parse_field(fields, "column").is_some();

        if has_point {
            // Point diagnostic: stamp the message occurrence as a
            // pseudo-reference (rewritten again by the embedded-ref scan)
            // and shift the report's own coordinates.
            let pseudo = format!("{}${}-{}", sample.file, sample.start_line, sample.end_line());
            replace_specifier(message, raw, path_str, &pseudo);
            shift_field(fields, "line", sample.start_line as i64);
            shift_field(fields, "column", sample.column as i64 - 1);
        } else {
            // File-level diagnostic: point straight at the opening fence.
            let target = format!("{}:{}:{}", sample.file, sample.start_line, sample.column);
            replace_specifier(message, raw, path_str, &target);
        }

        fields.insert("file".to_string(), sample.file.clone());
    }

    fn apply_kind_offset(&self, kind: ReportKind, origin: &str, fields: &mut BTreeMap<String, String>) {
        let offset = self.offsets.get(&kind).copied().unwrap_or_default();
        shift_field(fields, "line", offset.line);
        shift_field(fields, "column", offset.column + non_markdown_extra(origin));
    }

    /// Rewrite every `path$start-end[.ext]:line:column` occurrence in the
    /// message — stack frames, diff headers — to origin coordinates.
    fn rewrite_embedded_refs(&self, kind: ReportKind, message: &str) -> String {
        EMBEDDED_REF_REGEX
            .replace_all(message, |caps: &regex::Captures<'_>| {
                let occ_path = normalize_specifier(&caps["path"]);
                let start: usize = match caps["start"].parse() {
                    Ok(v) => v,
                    Err(_) => return caps[0].to_string(),
                };
                let line: i64 = caps["line"].parse().unwrap_or(1);
                let column: i64 = caps["column"].parse().unwrap_or(1);

                let marker = format!("{}${}-{}{}", occ_path, start, &caps["end"], caps.name("ext").map_or("", |m| m.as_str()));
                let sample = self
                    .samples
                    .by_sample_path(Path::new(&marker))
                    .or_else(|| self.samples.by_origin(&occ_path, start));

                match sample {
                    Some(sample) => format!(
                        "{}:{}:{}",
                        sample.file,
                        clamp(line + sample.start_line as i64),
                        clamp(column + sample.column as i64 - 1),
                    ),
                    None => {
                        let offset = self.offsets.get(&kind).copied().unwrap_or_default();
                        format!(
                            "{}:{}:{}",
                            occ_path,
                            clamp(line + offset.line),
                            clamp(column + offset.column + non_markdown_extra(&occ_path)),
                        )
                    }
                }
            })
            .into_owned()
    }

    fn requested_spelling(&self, file: &str) -> Option<String> {
        if self.requested.values().any(|spelling| spelling == file) {
            return None;
        }
        let canonical = std::fs::canonicalize(file).unwrap_or_else(|_| PathBuf::from(file));
        self.requested.get(&canonical).cloned()
    }
}

/// Convert a `file://` specifier to a plain path; other text passes through.
pub fn normalize_specifier(specifier: &str) -> String {
    if specifier.starts_with("file://")
        && let Ok(url) = Url::parse(specifier)
        && let Ok(path) = url.to_file_path()
    {
        return path.to_string_lossy().into_owned();
    }
    specifier.to_string()
}

/// Replace every spelling of a sample specifier (raw, plain path, file URL)
/// inside the message.
fn replace_specifier(message: &mut String, raw: &str, path_str: &str, replacement: &str) {
    let mut forms: Vec<String> = vec![raw.to_string()];
    if path_str != raw {
        forms.push(path_str.to_string());
    }
    if let Ok(url) = Url::from_file_path(path_str) {
        forms.push(url.to_string());
    }
    for form in forms {
        if message.contains(&form) {
            *message = message.replace(&form, replacement);
        }
    }
}

fn parse_field(fields: &BTreeMap<String, String>, key: &str) -> Option<i64> {
    fields.get(key).and_then(|v| v.parse().ok())
}

fn shift_field(fields: &mut BTreeMap<String, String>, key: &str, delta: i64) {
    if let Some(value) = parse_field(fields, key) {
        fields.insert(key.to_string(), clamp(value + delta).to_string());
    }
}

fn non_markdown_extra(path: &str) -> i64 {
    let is_markdown = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"));
    if is_markdown { 0 } else { DOC_COMMENT_COLUMN_EXTRA }
}

fn clamp(value: i64) -> i64 {
    value.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::extract::extract_samples;

    fn fixture() -> (tempfile::TempDir, String, SampleSet) {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("guide.md");
        // Sample opens at line 4, content column 1.
        std::fs::write(&doc, "# Guide\n\nIntro.\n```ts\nconst n: number = \"x\";\nconst m = n;\n```\n").unwrap();
        let doc = doc.to_string_lossy().into_owned();
        let set = extract_samples(std::slice::from_ref(&doc), &dir.path().join("samples"), 2).unwrap();
        (dir, doc, set)
    }

    fn fields(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_point_diagnostic_shifts_into_document() {
        let (_dir, doc, set) = fixture();
        let offsets = HashMap::new();
        let requested = HashMap::new();
        let resolver = Resolver::new(&set, &offsets, &requested);

        let (sample_path, sample) = set.materialized().next().unwrap();
        assert_eq!(sample.start_line, 4);
        let sample_str = sample_path.to_string_lossy().into_owned();

        let mut f = fields(&[("file", sample_str.as_str()), ("line", "1"), ("column", "19")]);
        let mut message = format!("TS2322 [ERROR]: nope\n    at {sample_str}:1:19");
        resolver.resolve(ReportKind::Check, &mut f, &mut message);

        assert_eq!(f.get("file").unwrap(), &doc);
        assert_eq!(f.get("line").unwrap(), "5");
        assert_eq!(f.get("column").unwrap(), "19");
        assert!(message.contains(&format!("at {doc}:5:19")), "message was: {message}");
    }

    #[test]
    fn test_file_level_diagnostic_points_at_fence() {
        let (_dir, doc, set) = fixture();
        let offsets = HashMap::new();
        let requested = HashMap::new();
        let resolver = Resolver::new(&set, &offsets, &requested);

        let (sample_path, _) = set.materialized().next().unwrap();
        let sample_str = sample_path.to_string_lossy().into_owned();

        let mut f = fields(&[("file", sample_str.as_str())]);
        let mut message = format!("error: unformatted file {sample_str}");
        resolver.resolve(ReportKind::Diff, &mut f, &mut message);

        assert_eq!(f.get("file").unwrap(), &doc);
        assert!(message.contains(&format!("{doc}:4:1")), "message was: {message}");
    }

    #[test]
    fn test_file_url_specifier_resolves() {
        let (_dir, doc, set) = fixture();
        let offsets = HashMap::new();
        let requested = HashMap::new();
        let resolver = Resolver::new(&set, &offsets, &requested);

        let (sample_path, _) = set.materialized().next().unwrap();
        let url = Url::from_file_path(sample_path).unwrap().to_string();

        let mut f = fields(&[("file", url.as_str()), ("line", "2"), ("column", "7")]);
        let mut message = format!("    at {url}:2:7");
        resolver.resolve(ReportKind::Check, &mut f, &mut message);

        assert_eq!(f.get("file").unwrap(), &doc);
        assert_eq!(f.get("line").unwrap(), "6");
        assert!(message.contains(&format!("at {doc}:6:7")), "message was: {message}");
    }

    #[test]
    fn test_prestamped_pseudo_reference_uses_kind_offsets() {
        let (_dir, _doc, set) = fixture();
        let mut offsets = HashMap::new();
        offsets.insert(ReportKind::Failure, LocationOffset { line: 2, column: 0 });
        let requested = HashMap::new();
        let resolver = Resolver::new(&set, &offsets, &requested);

        let mut f = fields(&[("file", "lib/mod.ts$10-20.ts"), ("line", "3"), ("column", "5")]);
        let mut message = String::new();
        resolver.resolve(ReportKind::Failure, &mut f, &mut message);

        assert_eq!(f.get("file").unwrap(), "lib/mod.ts");
        assert_eq!(f.get("line").unwrap(), "5");
        // Column gains the configured offset plus the non-Markdown correction.
        assert_eq!(f.get("column").unwrap(), "6");
    }

    #[test]
    fn test_embedded_stack_frames_are_rewritten() {
        let (_dir, doc, set) = fixture();
        let offsets = HashMap::new();
        let requested = HashMap::new();
        let resolver = Resolver::new(&set, &offsets, &requested);

        let (sample_path, _) = set.materialized().next().unwrap();
        let sample_str = sample_path.to_string_lossy().into_owned();

        let mut f = fields(&[]);
        let mut message = format!(
            "error: boom\n    at inner ({sample_str}:2:3)\n    at outer ({sample_str}:1:1)"
        );
        resolver.resolve(ReportKind::Error, &mut f, &mut message);

        assert!(message.contains(&format!("at inner ({doc}:6:3)")), "message was: {message}");
        assert!(message.contains(&format!("at outer ({doc}:5:1)")), "message was: {message}");
    }

    #[test]
    fn test_requested_spelling_is_restored() {
        let (_dir, doc, set) = fixture();
        let offsets = HashMap::new();
        let mut requested = HashMap::new();
        let canonical = std::fs::canonicalize(&doc).unwrap();
        requested.insert(canonical, "docs/guide.md".to_string());
        let resolver = Resolver::new(&set, &offsets, &requested);

        let (sample_path, _) = set.materialized().next().unwrap();
        let sample_str = sample_path.to_string_lossy().into_owned();

        let mut f = fields(&[("file", sample_str.as_str()), ("line", "1"), ("column", "1")]);
        let mut message = String::new();
        resolver.resolve(ReportKind::Lint, &mut f, &mut message);

        assert_eq!(f.get("file").unwrap(), "docs/guide.md");
    }

    #[test]
    fn test_malformed_input_is_left_alone() {
        let (_dir, _doc, set) = fixture();
        let offsets = HashMap::new();
        let requested = HashMap::new();
        let resolver = Resolver::new(&set, &offsets, &requested);

        let mut f = fields(&[("file", "plain.ts"), ("line", "x")]);
        let mut message = "nothing to see".to_string();
        resolver.resolve(ReportKind::Error, &mut f, &mut message);

        assert_eq!(f.get("file").unwrap(), "plain.ts");
        assert_eq!(f.get("line").unwrap(), "x");
        assert_eq!(message, "nothing to see");
    }
}
