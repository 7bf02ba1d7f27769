//! Glob pattern matching with `.gitignore` semantics, used to filter
//! untracked files out of working-directory status.
//!
//! The matcher follows gitignore rules: `*` and `?` never cross `/`, a
//! pattern without `/` applies to any path segment, a leading `/` anchors to
//! the repository root, and `**` spans whole path segments. Filters compose
//! left-to-right over an accumulating state so later patterns (gitignore
//! negation) can override earlier ones.

use std::sync::Arc;

use crate::utils::to_repo_slashes;

/// Accumulating decision carried through a filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    NotExclude,
    Exclude,
}

impl FilterState {
    pub fn is_excluded(&self) -> bool {
        matches!(self, FilterState::Exclude)
    }
}

/// A composable path filter: `(current-state, path) -> new-state`.
pub type GlobFilter = Arc<dyn Fn(FilterState, &str) -> FilterState + Send + Sync>;

/// Evaluate `path` against a single glob `pattern`.
///
/// Comment (`#`) and negation (`!`) handling belong to the caller; use
/// [`gitignore_filter`] for full `.gitignore` files. A trailing `/` on the
/// pattern (directory-only semantics) is stripped here; the distinction is
/// likewise the caller's.
pub fn is_match(path: &str, pattern: &str) -> bool {
    let path = to_repo_slashes(path);
    let pattern = collapse_slashes(pattern);
    let pattern = pattern.trim_end_matches('/');
    if pattern.is_empty() {
        return false;
    }

    if !pattern.contains('/') {
        // Bare pattern applies to every path segment at any depth.
        return path.split('/').any(|segment| match_segment(segment, pattern));
    }

    // A pattern containing `/` is anchored to the repository root.
    let pattern = pattern.strip_prefix('/').unwrap_or(pattern);
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();
    match_segments(&pattern_segments, &path_segments)
}

fn collapse_slashes(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut prev_slash = false;
    for ch in pattern.chars() {
        if ch == '/' {
            if !prev_slash {
                out.push('/');
            }
            prev_slash = true;
        } else {
            out.push(ch);
            prev_slash = false;
        }
    }
    out
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.first() {
        None => path.is_empty(),
        Some(&"**") => {
            // `**` spans zero or more whole segments.
            (0..=path.len()).any(|skip| match_segments(&pattern[1..], &path[skip..]))
        }
        Some(segment) => {
            !path.is_empty()
                && match_segment(path[0], segment)
                && match_segments(&pattern[1..], &path[1..])
        }
    }
}

fn match_segment(text: &str, pattern: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    match_chars(&p, &t)
}

fn match_chars(p: &[char], t: &[char]) -> bool {
    let Some(&first) = p.first() else {
        return t.is_empty();
    };
    match first {
        '*' => {
            // Consecutive stars collapse; within a segment `**` behaves as `*`.
            let rest: &[char] = {
                let mut i = 0;
                while i < p.len() && p[i] == '*' {
                    i += 1;
                }
                &p[i..]
            };
            (0..=t.len()).any(|skip| match_chars(rest, &t[skip..]))
        }
        '?' => !t.is_empty() && match_chars(&p[1..], &t[1..]),
        '\\' => {
            if p.len() < 2 {
                // Dangling escape matches a literal backslash.
                !t.is_empty() && t[0] == '\\' && match_chars(&p[1..], &t[1..])
            } else {
                !t.is_empty() && t[0] == p[1] && match_chars(&p[2..], &t[1..])
            }
        }
        '[' => match parse_class(p) {
            Some((negated, items, next)) => {
                !t.is_empty()
                    && (class_matches(&items, t[0]) != negated)
                    && match_chars(&p[next..], &t[1..])
            }
            // Unterminated class: the bracket is literal.
            None => !t.is_empty() && t[0] == '[' && match_chars(&p[1..], &t[1..]),
        },
        literal => !t.is_empty() && t[0] == literal && match_chars(&p[1..], &t[1..]),
    }
}

enum ClassItem {
    Single(char),
    Range(char, char),
}

/// Parse `[...]` starting at `p[0] == '['`. Returns (negated, items, index
/// one past the closing bracket), or None when unterminated.
fn parse_class(p: &[char]) -> Option<(bool, Vec<ClassItem>, usize)> {
    let mut i = 1;
    let negated = matches!(p.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }
    let mut items = Vec::new();
    let mut first = true;
    while let Some(&ch) = p.get(i) {
        if ch == ']' && !first {
            return Some((negated, items, i + 1));
        }
        first = false;
        if p.get(i + 1) == Some(&'-') && p.get(i + 2).is_some_and(|c| *c != ']') {
            items.push(ClassItem::Range(ch, p[i + 2]));
            i += 3;
        } else {
            items.push(ClassItem::Single(ch));
            i += 1;
        }
    }
    None
}

fn class_matches(items: &[ClassItem], ch: char) -> bool {
    // Classes may not match the path separator.
    if ch == '/' {
        return false;
    }
    items.iter().any(|item| match item {
        ClassItem::Single(c) => *c == ch,
        ClassItem::Range(lo, hi) => (*lo..=*hi).contains(&ch),
    })
}

/// Run a filter over a path starting from `NotExclude`.
pub fn apply(filter: &GlobFilter, path: &str) -> FilterState {
    filter(FilterState::NotExclude, path)
}

/// Chain filters left-to-right, threading the accumulating state so later
/// filters override earlier ones.
pub fn combine(filters: Vec<GlobFilter>) -> GlobFilter {
    Arc::new(move |state, path| {
        filters.iter().fold(state, |state, filter| filter(state, path))
    })
}

/// Exclude any path matching one of the patterns.
pub fn exclude_from_patterns<I, S>(patterns: I) -> GlobFilter
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
    Arc::new(move |state, path| {
        if patterns.iter().any(|pattern| matches_with_ancestors(path, pattern, false)) {
            FilterState::Exclude
        } else {
            state
        }
    })
}

/// Exclude every path.
pub fn exclude_all() -> GlobFilter {
    Arc::new(|_state, _path| FilterState::Exclude)
}

/// Baked-in exclusions covering common build outputs, caches, logs, and
/// editor temp files.
pub fn common_ignore() -> GlobFilter {
    const PATTERNS: &[&str] = &[
        "*.o", "*.obj", "*.a", "*.so", "*.dll", "*.exe", "*.pdb", "*.class", "*.pyc",
        "__pycache__", "node_modules", "target", "bin", "obj", ".DS_Store", "Thumbs.db",
        "*.log", "*.tmp", "*.temp", "*.swp", "*.bak", "*~", ".vs", ".idea", ".gradle",
    ];
    exclude_from_patterns(PATTERNS.iter().copied())
}

/// One parsed `.gitignore` rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRule {
    pub pattern: String,
    pub negate: bool,
    pub dir_only: bool,
}

/// Parse `.gitignore` text: comments and blanks are dropped, `!` marks
/// negation, a trailing `/` marks directory-only rules.
pub fn parse_ignore(text: &str) -> Vec<IgnoreRule> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (negate, rest) = match line.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, line),
            };
            let dir_only = rest.ends_with('/');
            let pattern = rest.trim_end_matches('/').to_string();
            if pattern.is_empty() {
                return None;
            }
            Some(IgnoreRule {
                pattern,
                negate,
                dir_only,
            })
        })
        .collect()
}

/// Build a filter from `.gitignore` text. Rules apply in file order; a later
/// negated rule re-includes a path an earlier rule excluded.
pub fn gitignore_filter(text: &str) -> GlobFilter {
    let rules = parse_ignore(text);
    Arc::new(move |state, path| {
        rules.iter().fold(state, |state, rule| {
            if matches_with_ancestors(path, &rule.pattern, rule.dir_only) {
                if rule.negate {
                    FilterState::NotExclude
                } else {
                    FilterState::Exclude
                }
            } else {
                state
            }
        })
    })
}

/// A pattern that matches a directory excludes everything beneath it, so a
/// rule matches either the path itself or any of its ancestor directories.
/// Directory-only rules never match the full path directly (a file named
/// like the directory stays included).
fn matches_with_ancestors(path: &str, pattern: &str, dir_only: bool) -> bool {
    if !dir_only && is_match(path, pattern) {
        return true;
    }
    path.char_indices()
        .filter(|(_, ch)| *ch == '/')
        .any(|(i, _)| is_match(&path[..i], pattern))
}
