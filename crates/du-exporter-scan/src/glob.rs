//! Glob matching against root-relative paths.

use globset::{Glob, GlobBuilder};
use tracing::warn;

use du_exporter_core::ScanError;

/// Ordered set of compiled glob patterns.
///
/// Patterns use `/` as the separator: `*` and `?` stay within one path
/// segment, `**` spans any number of segments. Patterns that fail to
/// compile are kept aside in [`GlobMatcher::invalid`] and never match.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    patterns: Vec<(String, globset::GlobMatcher)>,
    invalid: Vec<(String, String)>,
}

impl GlobMatcher {
    /// Compile `patterns`, skipping the malformed ones.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut compiled = Vec::with_capacity(patterns.len());
        let mut invalid = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            match compile(pattern) {
                Ok(glob) => compiled.push((pattern.to_string(), glob.compile_matcher())),
                Err(err) => {
                    warn!(pattern, error = %err, "skipping invalid glob pattern");
                    invalid.push((pattern.to_string(), err.kind().to_string()));
                }
            }
        }

        Self {
            patterns: compiled,
            invalid,
        }
    }

    /// True if any pattern matches the slash-normalized relative path.
    pub fn is_match(&self, relative_path: &str) -> bool {
        self.patterns.iter().any(|(_, glob)| glob.is_match(relative_path))
    }

    /// No pattern was configured at all.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.invalid.is_empty()
    }

    /// At least one pattern compiled.
    pub fn can_match(&self) -> bool {
        !self.patterns.is_empty()
    }

    /// Number of patterns that compiled.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Patterns that failed to compile, as errors.
    pub fn invalid(&self) -> impl Iterator<Item = ScanError> + '_ {
        self.invalid
            .iter()
            .map(|(pattern, message)| ScanError::InvalidPattern {
                pattern: pattern.clone(),
                message: message.clone(),
            })
    }
}

fn compile(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str]) -> GlobMatcher {
        GlobMatcher::new(patterns)
    }

    #[test]
    fn test_recursive_segments() {
        let m = matcher(&["**/*.db"]);
        assert!(m.is_match("x/y.db"));
        assert!(m.is_match("a/b/c/d.db"));
        assert!(m.is_match("top.db"));
        assert!(!m.is_match("x/y.txt"));
    }

    #[test]
    fn test_star_stays_in_segment() {
        let m = matcher(&["*.log"]);
        assert!(m.is_match("app.log"));
        assert!(!m.is_match("logs/app.log"));

        let m = matcher(&["logs/*/current"]);
        assert!(m.is_match("logs/web/current"));
        assert!(!m.is_match("logs/web/old/current"));
    }

    #[test]
    fn test_question_mark_and_classes() {
        let m = matcher(&["data/part-?.[ch]sv"]);
        assert!(m.is_match("data/part-1.csv"));
        assert!(m.is_match("data/part-z.hsv"));
        assert!(!m.is_match("data/part-10.csv"));
        assert!(!m.is_match("data/part-1.tsv"));
    }

    #[test]
    fn test_empty_list_matches_nothing() {
        let m = matcher(&[]);
        assert!(m.is_empty());
        assert!(!m.is_match("anything"));
        assert!(!m.is_match(""));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let m = matcher(&["[unclosed", "**/*.db"]);
        assert_eq!(m.len(), 1);
        assert!(!m.is_empty());
        assert!(m.is_match("x/y.db"));

        let errors: Vec<_> = m.invalid().collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ScanError::InvalidPattern { pattern, .. } if pattern == "[unclosed"
        ));
    }

    #[test]
    fn test_order_independent() {
        let paths = ["x/y.db", "x/y.txt", "a.txt", "deep/er/z.db", "nope"];
        let forward = matcher(&["**/*.db", "*.txt"]);
        let reverse = matcher(&["*.txt", "**/*.db"]);

        for path in paths {
            assert_eq!(forward.is_match(path), reverse.is_match(path), "{path}");
            assert_eq!(forward.is_match(path), forward.is_match(path));
        }
    }
}
