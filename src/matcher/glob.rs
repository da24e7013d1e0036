//! Case-insensitive filename globbing.
//!
//! Patterns use fnmatch syntax: `*` (any run, including empty), `?`
//! (exactly one character), `[seq]` and `[!seq]`. A backslash is an
//! ordinary character, not an escape.

use globset::{GlobBuilder, GlobMatcher};

/// Compile `pattern` for case-insensitive matching against file names.
pub fn compile(pattern: &str) -> Result<GlobMatcher, globset::Error> {
    GlobBuilder::new(pattern)
        .case_insensitive(true)
        .backslash_escape(false)
        .build()
        .map(|glob| glob.compile_matcher())
}
