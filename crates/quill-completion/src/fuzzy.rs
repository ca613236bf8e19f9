// ABOUTME: Client-side filtering for servers that return unfiltered, server-side fuzzy results
// ABOUTME: Pluggable matcher trait with a nucleo-backed default

use nucleo::pattern::{Atom, AtomKind, CaseMatching, Normalization};
use nucleo::{Config, Matcher, Utf32Str};

/// Decides whether a candidate survives the text typed so far
pub trait FuzzyMatcher: Send {
    fn is_match(&mut self, pattern: &str, haystack: &str) -> bool;
}

/// Fuzzy matching with nucleo, case-insensitive like the completion menu
pub struct NucleoMatcher {
    matcher: Matcher,
    buf: Vec<char>,
}

impl NucleoMatcher {
    pub fn new() -> Self {
        Self {
            matcher: Matcher::new(Config::DEFAULT),
            buf: Vec::new(),
        }
    }
}

impl Default for NucleoMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FuzzyMatcher for NucleoMatcher {
    fn is_match(&mut self, pattern: &str, haystack: &str) -> bool {
        if pattern.is_empty() {
            return true;
        }

        let atom = Atom::new(
            pattern,
            CaseMatching::Ignore,
            Normalization::Smart,
            AtomKind::Fuzzy,
            false,
        );
        atom.score(Utf32Str::new(haystack, &mut self.buf), &mut self.matcher)
            .is_some()
    }
}
