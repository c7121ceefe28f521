//! Fenced code samples embedded in documents.
//!
//! Samples are extracted into synthetic temporary files before a run
//! ([`extract`]), and toolchain modifications are patched back into the
//! origin documents afterwards ([`rewrite`]). The [`language`] registry
//! decides which fence tags are processable at all.

pub mod extract;
pub mod language;
pub mod rewrite;

pub use extract::{CodeSample, SampleError, SampleSet, extract_samples, scan_document};
pub use rewrite::write_back;
