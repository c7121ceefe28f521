//! Write-back of toolchain-modified sample content into origin documents.
//!
//! After a successful run each sample file is re-read; samples the toolchain
//! left untouched are skipped. Changed samples are grouped by origin document
//! and patched back into their fenced blocks with the stored indentation
//! restored and trailing whitespace trimmed per line.

use crate::samples::extract::{CodeSample, SampleError, SampleSet};
use crate::utils::pool::bounded_map;
use std::collections::BTreeMap;
use std::io;

/// Re-read every sample file and patch changed content back into the origin
/// documents, with at most `concurrency` documents in flight.
///
/// Returns the number of documents rewritten.
pub fn write_back(samples: &SampleSet, concurrency: usize) -> Result<usize, SampleError> {
    let mut changed: BTreeMap<&str, Vec<(&CodeSample, String)>> = BTreeMap::new();

    for (path, sample) in samples.materialized() {
        let current = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(SampleError::Read {
                    file: path.to_string_lossy().into_owned(),
                    source: e,
                });
            }
        };
        if current != sample.content {
            changed.entry(sample.file.as_str()).or_default().push((sample, current));
        }
    }

    if changed.is_empty() {
        return Ok(0);
    }

    let results = bounded_map(changed.into_iter().collect::<Vec<_>>(), concurrency, |(file, blocks)| {
        patch_document(file, &blocks)
    });

    let mut rewritten = 0;
    for result in results {
        result?;
        rewritten += 1;
    }
    Ok(rewritten)
}

fn patch_document(file: &str, blocks: &[(&CodeSample, String)]) -> Result<(), SampleError> {
    let text = std::fs::read_to_string(file).map_err(|e| SampleError::Read {
        file: file.to_string(),
        source: e,
    })?;
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();

    // Patch bottom-up so earlier spans keep their recorded line numbers even
    // when a replacement changes a block's length.
    let mut ordered: Vec<&(&CodeSample, String)> = blocks.iter().collect();
    ordered.sort_by_key(|(sample, _)| std::cmp::Reverse(sample.start_line));

    for (sample, new_content) in ordered {
        let replacement: Vec<String> = new_content
            .lines()
            .map(|line| format!("{}{}", sample.indent, line).trim_end().to_string())
            .collect();

        let start = sample.start_line; // first content line, 0-indexed
        let end = start + sample.line_count;
        if end > lines.len() {
            log::warn!("sample span {}:{}-{} no longer fits the document, skipping", sample.file, sample.start_line, sample.end_line());
            continue;
        }
        lines.splice(start..end, replacement);
    }

    std::fs::write(file, lines.join("\n")).map_err(|e| SampleError::WriteBack {
        file: file.to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::extract::extract_samples;
    use pretty_assertions::assert_eq;

    fn setup(content: &str) -> (tempfile::TempDir, String, SampleSet) {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("doc.md");
        std::fs::write(&doc, content).unwrap();
        let doc = doc.to_string_lossy().into_owned();
        let set = extract_samples(std::slice::from_ref(&doc), &dir.path().join("samples"), 2).unwrap();
        (dir, doc, set)
    }

    #[test]
    fn test_unchanged_sample_leaves_document_alone() {
        let original = "# Doc\n\n```ts\nconst a = 1;\n```\n";
        let (_dir, doc, set) = setup(original);

        let rewritten = write_back(&set, 2).unwrap();
        assert_eq!(rewritten, 0);
        assert_eq!(std::fs::read_to_string(&doc).unwrap(), original);
    }

    #[test]
    fn test_changed_sample_is_patched_back() {
        let (_dir, doc, set) = setup("# Doc\n\n```ts\nconst a=1\n```\n");
        let (path, _) = set.materialized().next().unwrap();
        std::fs::write(path, "const a = 1;\n").unwrap();

        let rewritten = write_back(&set, 2).unwrap();
        assert_eq!(rewritten, 1);
        assert_eq!(std::fs::read_to_string(&doc).unwrap(), "# Doc\n\n```ts\nconst a = 1;\n```\n");
    }

    #[test]
    fn test_indentation_is_restored_and_trailing_whitespace_trimmed() {
        let (_dir, doc, set) = setup("/**\n * ```ts\n * const a=1\n * ```\n */\n");
        let (path, _) = set.materialized().next().unwrap();
        std::fs::write(path, "const a = 1;\n\nconst b = a;\n").unwrap();

        write_back(&set, 2).unwrap();
        assert_eq!(
            std::fs::read_to_string(&doc).unwrap(),
            "/**\n * ```ts\n * const a = 1;\n *\n * const b = a;\n * ```\n */\n"
        );
    }

    #[test]
    fn test_multiple_changed_samples_in_one_document() {
        let (_dir, doc, set) = setup("```ts\nconst a=1\n```\n\n```ts\nconst b=2\n```\n");
        let mut files = set.materialized();
        let (first, _) = files.next().unwrap();
        let (second, _) = files.next().unwrap();
        std::fs::write(first, "const a = 1;\nconst extra = a;\n").unwrap();
        std::fs::write(second, "const b = 2;\n").unwrap();

        write_back(&set, 2).unwrap();
        assert_eq!(
            std::fs::read_to_string(&doc).unwrap(),
            "```ts\nconst a = 1;\nconst extra = a;\n```\n\n```ts\nconst b = 2;\n```\n"
        );
    }
}
