//! Extraction of fenced code samples into synthetic source files.
//!
//! Documents are scanned line by line for fenced blocks whose opening fence,
//! closing fence and content lines share one common leading indentation. The
//! indentation is matched structurally rather than as Markdown syntax, so a
//! fence inside a documentation comment (`* ```ts`) delimits correctly. Each
//! block carrying a recognized language tag is materialized as a temporary
//! file named `<origin file name>$<startLine>-<endLine>.<ext>` under the
//! run's sample directory; untagged or unknown-tag blocks are recorded for
//! bookkeeping only.

use crate::samples::language;
use crate::utils::pool::bounded_map;
use regex::Regex;
use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static FENCE_OPEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<indent>[^`~]*?)(?P<fence>`{3,}|~{3,})(?P<lang>[^\s`~]*)(?:\s[^`~]*)?$").unwrap()
});

/// Errors during sample extraction or write-back.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("failed to read {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write sample file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {file} back: {source}")]
    WriteBack {
        file: String,
        #[source]
        source: io::Error,
    },
}

/// A fenced block found inside a document. Immutable once extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeSample {
    /// Origin document, in the caller's spelling.
    pub file: String,
    /// 1-indexed line of the opening fence.
    pub start_line: usize,
    /// Number of content lines between the fences.
    pub line_count: usize,
    /// 1-indexed column where sample content starts (indent length + 1).
    pub column: usize,
    /// Common leading indentation shared by the fences and content.
    pub indent: String,
    /// Language tag, absent when the block is untagged.
    pub language: Option<String>,
    /// Dedented content.
    pub content: String,
}

impl CodeSample {
    /// 1-indexed line of the closing fence.
    pub fn end_line(&self) -> usize {
        self.start_line + self.line_count + 1
    }
}

/// Every sample found in a run, plus the synthetic files that materialize
/// the tagged ones. One sample file maps to exactly one sample.
#[derive(Debug, Default)]
pub struct SampleSet {
    root: PathBuf,
    samples: Vec<CodeSample>,
    by_path: HashMap<PathBuf, usize>,
    by_origin: HashMap<(String, usize), usize>,
    materialized: Vec<(PathBuf, usize)>,
}

impl SampleSet {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True when no sample file was written (nothing for the toolchain to
    /// pick up from the sample directory).
    pub fn is_empty(&self) -> bool {
        self.materialized.is_empty()
    }

    /// All blocks found, including untagged ones.
    pub fn samples(&self) -> &[CodeSample] {
        &self.samples
    }

    /// Sample files written for this run, with their owning samples.
    pub fn materialized(&self) -> impl Iterator<Item = (&Path, &CodeSample)> {
        self.materialized.iter().map(|(path, idx)| (path.as_path(), &self.samples[*idx]))
    }

    /// Look up the sample owning a synthetic file path.
    pub fn by_sample_path(&self, path: &Path) -> Option<&CodeSample> {
        self.by_path.get(path).map(|&idx| &self.samples[idx])
    }

    /// Look up a materialized sample by origin document and fence line.
    pub fn by_origin(&self, file: &str, start_line: usize) -> Option<&CodeSample> {
        self.by_origin
            .get(&(file.to_string(), start_line))
            .map(|&idx| &self.samples[idx])
    }
}

/// Scan `content` for fenced blocks sharing a common indentation.
pub fn scan_document(file: &str, content: &str) -> Vec<CodeSample> {
    let lines: Vec<&str> = content.lines().collect();
    let mut samples = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(caps) = FENCE_OPEN_REGEX.captures(lines[i]) else {
            i += 1;
            continue;
        };
        let indent = caps.name("indent").map_or("", |m| m.as_str());
        let fence = caps.name("fence").map_or("```", |m| m.as_str());
        let lang = caps.name("lang").map_or("", |m| m.as_str());

        let Some(close) = find_closing_fence(&lines, i + 1, indent, fence) else {
            i += 1;
            continue;
        };

        let content_lines: Vec<String> = lines[i + 1..close].iter().map(|line| dedent(line, indent)).collect();
        let mut body = content_lines.join("\n");
        if !body.is_empty() || close > i + 1 {
            body.push('\n');
        }

        samples.push(CodeSample {
            file: file.to_string(),
            start_line: i + 1,
            line_count: close - i - 1,
            column: indent.len() + 1,
            indent: indent.to_string(),
            language: if lang.is_empty() { None } else { Some(lang.to_string()) },
            content: body,
        });
        i = close + 1;
    }

    samples
}

fn find_closing_fence(lines: &[&str], from: usize, indent: &str, fence: &str) -> Option<usize> {
    let fence_char = fence.chars().next()?;
    lines[from..].iter().position(|line| {
        let Some(rest) = line.strip_prefix(indent) else {
            return false;
        };
        let rest = rest.trim_end();
        rest.len() >= fence.len() && rest.chars().all(|c| c == fence_char)
    }).map(|offset| from + offset)
}

/// Strip the shared indentation from a content line.
///
/// A line that is itself a whitespace-trimmed prefix of the indent (the bare
/// `*` of an empty doc-comment line) dedents to empty; anything else is kept
/// verbatim rather than failing the block.
fn dedent(line: &str, indent: &str) -> String {
    if let Some(rest) = line.strip_prefix(indent) {
        rest.to_string()
    } else if indent.starts_with(line.trim_end()) {
        String::new()
    } else {
        line.to_string()
    }
}

/// Extract samples from `docs` and materialize the processable ones under
/// `root`, with at most `concurrency` documents in flight.
///
/// Missing documents are skipped silently; any other read failure fails the
/// extraction.
pub fn extract_samples(docs: &[String], root: &Path, concurrency: usize) -> Result<SampleSet, SampleError> {
    let scanned = bounded_map(docs.to_vec(), concurrency, |doc| match std::fs::read_to_string(&doc) {
        Ok(content) => Ok(scan_document(&doc, &content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("skipping missing document {doc}");
            Ok(Vec::new())
        }
        Err(e) => Err(SampleError::Read { file: doc, source: e }),
    });

    let mut set = SampleSet {
        root: root.to_path_buf(),
        ..SampleSet::default()
    };

    for samples in scanned {
        for sample in samples? {
            let idx = set.samples.len();
            let materialized = sample
                .language
                .as_deref()
                .and_then(language::extension_for)
                .map(|ext| sample_file_path(root, &sample, ext));
            set.samples.push(sample);

            if let Some(path) = materialized {
                let sample = &set.samples[idx];
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| SampleError::Write {
                        path: path.clone(),
                        source: e,
                    })?;
                }
                std::fs::write(&path, &sample.content).map_err(|e| SampleError::Write {
                    path: path.clone(),
                    source: e,
                })?;
                set.by_path.insert(path.clone(), idx);
                set.by_origin.insert((sample.file.clone(), sample.start_line), idx);
                set.materialized.push((path, idx));
            }
        }
    }

    Ok(set)
}

/// Synthetic file path for one sample: the origin's relative path mirrored
/// under the sample root, with the start/end lines and mapped extension
/// encoded in the file name.
fn sample_file_path(root: &Path, sample: &CodeSample, ext: &str) -> PathBuf {
    let origin = Path::new(&sample.file);
    let mut path = root.to_path_buf();
    for component in origin.parent().into_iter().flat_map(Path::components) {
        if let Component::Normal(part) = component {
            path.push(part);
        }
    }
    let name = origin
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sample".to_string());
    path.push(format!("{name}${}-{}.{ext}", sample.start_line, sample.end_line()));
    path
}
