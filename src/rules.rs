//! Include/exclude filtering of resolved full paths, driven by the
//! configuration's filename patterns. Patterns are globs (`*` spans any
//! run of characters, `?` exactly one); matching ignores case.

use regex::{Regex, RegexBuilder};

/// Translate one glob into an anchored regex. Literal stretches between
/// wildcards are escaped as whole segments; case folding is left to the
/// regex engine rather than normalizing the inputs.
fn compile_glob(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push_str(r"\A");
    let mut literal = String::new();
    for ch in pattern.chars() {
        let wildcard = match ch {
            '*' => ".*",
            '?' => ".",
            other => {
                literal.push(other);
                continue;
            }
        };
        if !literal.is_empty() {
            expr.push_str(&regex::escape(&literal));
            literal.clear();
        }
        expr.push_str(wildcard);
    }
    if !literal.is_empty() {
        expr.push_str(&regex::escape(&literal));
    }
    expr.push_str(r"\z");
    RegexBuilder::new(&expr).case_insensitive(true).build()
}

/// Compiled include/exclude filter. An empty include list admits every
/// path; a matching exclude always wins.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl PathFilter {
    pub fn from_patterns(include: &[String], exclude: &[String]) -> Result<Self, regex::Error> {
        let compile_all = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| compile_glob(p))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            include: compile_all(include)?,
            exclude: compile_all(exclude)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn admits(&self, path: &str) -> bool {
        if self.exclude.iter().any(|r| r.is_match(path)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|r| r.is_match(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, input: &str) -> bool {
        compile_glob(pattern).unwrap().is_match(input)
    }

    #[test]
    fn star_spans_path_segments() {
        assert!(matches(r"*\windows\system32\*.dll", r"C:\Windows\System32\kernel32.DLL"));
        assert!(!matches(r"*\windows\system32\*.dll", r"C:\Windows\notepad.exe"));
    }

    #[test]
    fn question_mark_is_single_character() {
        assert!(matches(r"\pagefile.sy?", r"\pagefile.sys"));
        assert!(!matches(r"\pagefile.sy?", r"\pagefile.sy"));
        assert!(!matches(r"\pagefile.sy?", r"\pagefile.sysx"));
    }

    #[test]
    fn matching_is_anchored_and_case_insensitive() {
        assert!(matches(r"\users\*", r"\USERS\bob"));
        // Anchored: a match in the middle of the path is not enough.
        assert!(!matches(r"users", r"\users\bob"));
    }

    #[test]
    fn regex_metacharacters_stay_literal() {
        assert!(matches(r"\logs\build(1).txt", r"\logs\build(1).txt"));
        assert!(!matches(r"\logs\build(1).txt", r"\logs\build1.txt"));
        assert!(matches(r"\a+b\*", r"\a+b\c"));
        assert!(!matches(r"\a+b\*", r"\aab\c"));
    }

    #[test]
    fn filter_exclude_wins() {
        let filter = PathFilter::from_patterns(
            &[r"*.txt".to_string()],
            &[r"*\$mft*".to_string()],
        )
        .unwrap();
        assert!(filter.admits(r"\notes.txt"));
        assert!(!filter.admits(r"\docs\a.exe"));
        assert!(!filter.admits(r"\$MFTMirr.txt"));
    }

    #[test]
    fn empty_filter_admits_all() {
        let filter = PathFilter::default();
        assert!(filter.is_empty());
        assert!(filter.admits(r"\anything"));
    }

    #[test]
    fn exclude_only_filter_admits_the_rest() {
        let filter =
            PathFilter::from_patterns(&[], &[r"*\windows\*".to_string()]).unwrap();
        assert!(!filter.is_empty());
        assert!(!filter.admits(r"C:\Windows\System32\cmd.exe"));
        assert!(filter.admits(r"C:\Users\bob\cmd.exe"));
    }
}
