//! Minimal reader for the repository `config` file: ini-style sections with
//! optional quoted subsections, `key = value` pairs. Only remote URLs are
//! surfaced; everything else in the file is ignored.

use std::collections::HashMap;

use crate::utils::expand_home;

/// Extract `[remote "<name>"] url = ...` pairs into an immutable map.
///
/// A URL beginning with `~/` is expanded against the user's home directory
/// (local filesystem remotes).
pub fn parse_remote_urls(text: &str) -> HashMap<String, String> {
    let mut remotes = HashMap::new();
    let mut current_remote: Option<String> = None;

    for line in text.lines() {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('[') {
            current_remote = parse_section(line).and_then(|(section, subsection)| {
                (section.eq_ignore_ascii_case("remote")).then_some(subsection?)
            });
            continue;
        }
        let Some(remote) = current_remote.as_ref() else {
            continue;
        };
        if let Some((key, value)) = line.split_once('=') {
            if key.trim().eq_ignore_ascii_case("url") {
                let value = unquote(value.trim());
                let value = if value.starts_with('~') {
                    expand_home(&value).to_string_lossy().into_owned()
                } else {
                    value
                };
                remotes.insert(remote.clone(), value);
            }
        }
    }
    remotes
}

/// Parse `[section]` or `[section "subsection"]`.
fn parse_section(line: &str) -> Option<(String, Option<String>)> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    match inner.split_once(' ') {
        Some((section, rest)) => {
            let subsection = rest.trim().trim_matches('"').to_string();
            Some((section.to_string(), Some(subsection)))
        }
        None => Some((inner.to_string(), None)),
    }
}

fn strip_comment(line: &str) -> &str {
    // Quoted values never carry remote URLs with `#`/`;` in practice;
    // a plain scan is what the original reader does as well.
    match line.find(['#', ';']) {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::parse_remote_urls;

    /// Remote sections yield name → url; other sections are ignored.
    #[test]
    fn parse_remotes() {
        let text = r#"
[core]
	repositoryformatversion = 0
	bare = false
[remote "origin"]
	url = https://github.com/demo/repo.git
	fetch = +refs/heads/*:refs/remotes/origin/*
[remote "backup"]
	url = "git@mirror.example:demo/repo.git"
[branch "main"]
	remote = origin
"#;
        let remotes = parse_remote_urls(text);
        assert_eq!(remotes.len(), 2);
        assert_eq!(remotes["origin"], "https://github.com/demo/repo.git");
        assert_eq!(remotes["backup"], "git@mirror.example:demo/repo.git");
    }

    /// Comments are stripped; a remote without url yields nothing.
    #[test]
    fn comments_and_missing_url() {
        let text = "[remote \"origin\"]\n\turl = x.git # trailing note\n[remote \"empty\"]\n\tfetch = +refs/*:refs/*\n";
        let remotes = parse_remote_urls(text);
        assert_eq!(remotes["origin"], "x.git");
        assert!(!remotes.contains_key("empty"));
    }

    /// `~/` URLs expand against HOME.
    #[test]
    fn home_expansion() {
        // SAFETY: test-local env mutation.
        unsafe { std::env::set_var("HOME", "/home/carol") };
        let remotes = parse_remote_urls("[remote \"local\"]\n\turl = ~/mirrors/repo\n");
        assert_eq!(remotes["local"], "/home/carol/mirrors/repo");
    }
}
