use std::path::Path;

use glob::Pattern;
use regex::Regex;

/// A file name pattern that is tried as a basename glob first and, failing that, as a regex
/// searched within the full path.
///
/// The regex form exists for patterns globs cannot express (`(csv|xlsx)`, `\d{8}`): `.` is
/// escaped, `*` becomes `.*`, a `/**/` segment matches any number of directories, and the
/// pattern must start at the beginning of a path component.
#[derive(Debug, Clone)]
pub struct FilePattern {
    raw: String,
    glob: Option<Pattern>,
    regex: Regex,
}

impl PartialEq for FilePattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl FilePattern {
    pub fn new(raw: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&to_regex(raw))?;
        Ok(Self {
            raw: raw.to_string(),
            glob: Pattern::new(raw).ok(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, file: &str) -> bool {
        let base = Path::new(file)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(file);
        if let Some(glob) = &self.glob {
            if glob.matches(base) {
                return true;
            }
        }
        self.regex.is_match(&file.replace('\\', "/"))
    }
}

fn to_regex(pattern: &str) -> String {
    let re = pattern.replace('.', "\\.").replace('*', ".*");
    format!("(^|/){}", re.replace("/.*.*/", "(/.*)?/"))
}

/// Any-of list of [`FilePattern`]s. An empty set never matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternSet(Vec<FilePattern>);

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        patterns
            .iter()
            .map(|p| FilePattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(PatternSet)
    }

    pub fn matches(&self, file: &str) -> bool {
        self.0.iter().any(|p| p.matches(file))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(FilePattern::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(p: &[&str]) -> PatternSet {
        PatternSet::new(p).unwrap()
    }

    #[test]
    fn empty_set_never_matches() {
        assert!(!PatternSet::default().matches("test.csv"));
        assert!(!set(&[]).matches("test.csv"));
    }

    #[test]
    fn globs_and_regex_alternatives() {
        let p = set(&["t*.csv"]);
        assert!(p.matches("test.csv"));
        assert!(!p.matches("test.xlsx"));

        let p = set(&["(test|data).csv"]);
        assert!(p.matches("test.csv"));
        assert!(p.matches("data.csv"));
        assert!(!p.matches("test.xlsx"));

        let p = set(&["t*.(csv|xlsx)"]);
        assert!(p.matches("test.csv"));
        assert!(p.matches("test.xlsx"));
        assert!(!p.matches("test.fwf"));
        assert!(!p.matches("xxx.csv"));

        let p = set(&["t*.csv", "t*.xlsx"]);
        assert!(p.matches("test.xlsx"));
        assert!(!p.matches("xxx.csv"));
    }

    #[test]
    fn digits_in_file_names() {
        let p = set(&[r"t*.(\d{8,14}).A901"]);
        assert!(!p.matches("test.csv"));
        assert!(!p.matches("test.A901"));
        assert!(!p.matches("test12345678.A901"));
        assert!(p.matches("test.12345678.A901"));
        assert!(p.matches("test.123456789.A901"));
        assert!(p.matches("test.12345678901234.A901"));
        assert!(!p.matches("test.123456789012345.A901"));
    }

    #[test]
    fn directories_are_matched_right_to_left() {
        let p = set(&["t*.csv", "t*.xlsx"]);
        assert!(p.matches("/a/b/test.csv"));
        assert!(p.matches(r"c:\a\b\test.csv"));
        assert!(!p.matches("a/test.A901"));
        assert!(!p.matches("dsadsad/teeea"));

        let p = set(&["a/t*.csv"]);
        assert!(!p.matches("test.csv"));
        assert!(p.matches("a/test.csv"));
        assert!(p.matches("/a/test.csv"));
        assert!(!p.matches("/aaa/test.csv"));
        assert!(!p.matches("/a/b/test.csv"));

        let p = set(&["a/**/t*.csv"]);
        assert!(p.matches("/a/test.csv"));
        assert!(p.matches("/a/b/c/test.csv"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!set(&["t*.csv"]).matches("TEST.CSV"));
    }

    #[test]
    fn broken_regex_is_rejected() {
        assert!(PatternSet::new(&["t*(a"]).is_err());
    }
}
