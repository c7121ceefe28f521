//! File discovery for paths and directories given on the command line.
//!
//! Explicit file paths are taken as-is; directories are walked
//! gitignore-aware with optional include/exclude glob patterns, filtered to
//! the extensions the active command accepts. The result is deduplicated and
//! keeps explicit arguments in the order they were given.

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Options controlling directory walking.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Include glob patterns applied while walking directories.
    pub include: Vec<String>,
    /// Exclude glob patterns applied while walking directories.
    pub exclude: Vec<String>,
    /// Honor `.gitignore` files while walking directories.
    pub respect_gitignore: bool,
}

/// Expand `paths` into the deduplicated list of matching files.
///
/// `extensions` holds the extensions (without dot) the caller can process;
/// it filters walked directory entries but not explicitly named files.
pub fn discover_files(
    paths: &[String],
    extensions: &[&str],
    options: &DiscoveryOptions,
) -> Result<Vec<String>, ignore::Error> {
    let mut found = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let excluded = build_globset(&options.exclude)?;

    for path in paths {
        let p = Path::new(path);
        if p.is_dir() {
            for file in walk_directory(p, extensions, options)? {
                push_unique(&mut found, &mut seen, file);
            }
        } else if !excluded.is_match(p) {
            // Explicit files are passed through even when missing; the
            // toolchain reports missing inputs as diagnostics of its own.
            push_unique(&mut found, &mut seen, path.clone());
        }
    }

    Ok(found)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ignore::Error> {
    let glob_error = |pattern: Option<&String>, err: &dyn std::fmt::Display| ignore::Error::Glob {
        glob: pattern.cloned(),
        err: err.to_string(),
    };
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).map_err(|e| glob_error(Some(pattern), &e))?);
    }
    builder.build().map_err(|e| glob_error(None, &e))
}

fn walk_directory(
    dir: &Path,
    extensions: &[&str],
    options: &DiscoveryOptions,
) -> Result<Vec<String>, ignore::Error> {
    let mut builder = WalkBuilder::new(dir);
    builder
        .hidden(true)
        .git_ignore(options.respect_gitignore)
        .git_global(options.respect_gitignore)
        .git_exclude(options.respect_gitignore);

    if !options.include.is_empty() || !options.exclude.is_empty() {
        let mut overrides = OverrideBuilder::new(dir);
        for pattern in &options.include {
            overrides.add(pattern)?;
        }
        for pattern in &options.exclude {
            overrides.add(&format!("!{pattern}"))?;
        }
        builder.overrides(overrides.build()?);
    }

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = entry?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if has_extension(entry.path(), extensions) {
            files.push(entry.path().to_string_lossy().into_owned());
        }
    }
    files.sort();
    Ok(files)
}

/// Whether `path` carries one of the given extensions (without dot).
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext))
}

fn push_unique(found: &mut Vec<String>, seen: &mut HashSet<PathBuf>, file: String) {
    let canonical = std::fs::canonicalize(&file).unwrap_or_else(|_| PathBuf::from(&file));
    if seen.insert(canonical) {
        found.push(file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_explicit_files_keep_order_and_spelling() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.ts"), "").unwrap();
        fs::write(dir.path().join("a.ts"), "").unwrap();
        let b = dir.path().join("b.ts").to_string_lossy().into_owned();
        let a = dir.path().join("a.ts").to_string_lossy().into_owned();

        let files = discover_files(&[b.clone(), a.clone()], &["ts"], &DiscoveryOptions::default()).unwrap();
        assert_eq!(files, vec![b, a]);
    }

    #[test]
    fn test_directory_walk_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mod.ts"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/guide.md"), "").unwrap();

        let root = dir.path().to_string_lossy().into_owned();
        let files = discover_files(&[root], &["ts", "md"], &DiscoveryOptions::default()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|f| f.ends_with("mod.ts")));
        assert!(files.iter().any(|f| f.ends_with("guide.md")));
    }

    #[test]
    fn test_duplicates_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mod.ts"), "").unwrap();
        let path = dir.path().join("mod.ts").to_string_lossy().into_owned();

        let files = discover_files(&[path.clone(), path.clone()], &["ts"], &DiscoveryOptions::default()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_exclude_patterns() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mod.ts"), "").unwrap();
        fs::create_dir(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("vendor/dep.ts"), "").unwrap();

        let options = DiscoveryOptions {
            exclude: vec!["vendor/**".to_string()],
            ..Default::default()
        };
        let root = dir.path().to_string_lossy().into_owned();
        let files = discover_files(&[root], &["ts"], &options).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("mod.ts"));
    }

    #[test]
    fn test_exclude_applies_to_explicit_files() {
        let options = DiscoveryOptions {
            exclude: vec!["**/generated/**".to_string()],
            ..Default::default()
        };
        let files = discover_files(&["src/generated/api.ts".to_string()], &["ts"], &options).unwrap();
        assert!(files.is_empty());
    }
}
