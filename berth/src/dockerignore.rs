use glob::{MatchOptions, Pattern as GlobPattern};
use log::warn;
use std::fs;
use std::path::Path;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Exclusion rules from a build context's `.dockerignore`. Patterns are
/// anchored at the context root; later rules win, and `!` re-includes.
#[derive(Debug, Default)]
pub struct DockerIgnore {
    patterns: Vec<Pattern>,
}

#[derive(Debug)]
struct Pattern {
    pattern: GlobPattern,
    negated: bool,
}

impl Pattern {
    fn new(line: &str) -> Option<Self> {
        let (negated, body) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let body = body.trim_start_matches("./").trim_start_matches('/').trim_end_matches('/');
        if body.is_empty() {
            return None;
        }

        match GlobPattern::new(body) {
            Ok(pattern) => Some(Pattern { pattern, negated }),
            Err(e) => {
                warn!("Skipping invalid .dockerignore pattern {}: {}", line, e);
                None
            }
        }
    }

    // A pattern naming a directory also covers everything below it.
    fn matches(&self, path: &str) -> bool {
        let mut prefix = String::new();
        for component in path.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(component);
            if self.pattern.matches_with(&prefix, MATCH_OPTIONS) {
                return true;
            }
        }
        false
    }
}

impl DockerIgnore {
    pub fn from_patterns<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = lines
            .into_iter()
            .filter_map(|line| {
                let line = line.as_ref().trim();
                if line.is_empty() || line.starts_with('#') {
                    None
                } else {
                    Pattern::new(line)
                }
            })
            .collect();
        DockerIgnore { patterns }
    }

    /// Reads `<context>/.dockerignore`; a missing file ignores nothing.
    pub fn load(context_dir: &Path) -> Self {
        match fs::read_to_string(context_dir.join(".dockerignore")) {
            Ok(contents) => Self::from_patterns(contents.lines()),
            Err(_) => Self::default(),
        }
    }

    /// `path` is relative to the context root, `/`-separated.
    pub fn ignores(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .rev()
            .find(|pattern| pattern.matches(path))
            .map(|pattern| !pattern.negated)
            .unwrap_or(false)
    }
}
