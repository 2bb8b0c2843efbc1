//! Absolute-path arithmetic. Nothing here touches the tree; these are
//! pure string functions shared by the store and its operations.

use crate::text::{InvalidSegmentError, validate_segment};

/// Resolves a user-supplied path against a working directory into an
/// absolute normalized path. `.` and empty segments are dropped, `..`
/// pops one segment and stays put at the root.
pub fn resolve(input: &str, cwd: &str) -> String {
    if input.is_empty() || input == "." {
        return cwd.to_string();
    }
    let full = if input.starts_with('/') {
        input.to_string()
    } else if cwd == "/" {
        format!("/{input}")
    } else {
        format!("{cwd}/{input}")
    };

    let mut parts: Vec<&str> = Vec::new();
    for segment in full.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Splits an absolute normalized path into validated segments. The root
/// path yields no segments.
pub fn segments(path: &str) -> Result<Vec<&str>, InvalidSegmentError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    for segment in &segments {
        validate_segment(segment)?;
    }
    Ok(segments)
}

/// The parent of an absolute normalized path; the root is its own parent.
pub fn parent(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => path[..index].to_string(),
    }
}

/// The final segment of an absolute normalized path; `"root"` for `/`.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "root";
    }
    match trimmed.rfind('/') {
        Some(index) => &trimmed[index + 1..],
        None => trimmed,
    }
}

/// Joins a child name onto an absolute path.
pub fn join(base: &str, child: &str) -> String {
    if base == "/" {
        format!("/{child}")
    } else {
        format!("{base}/{child}")
    }
}

/// True when `path` equals `ancestor` or sits somewhere below it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return true;
    }
    path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("/a/b", "/", "/a/b")]
    #[case("b", "/a", "/a/b")]
    #[case(".", "/a", "/a")]
    #[case("", "/a", "/a")]
    #[case("..", "/a/b", "/a")]
    #[case("../..", "/a/b", "/")]
    #[case("../../..", "/a", "/")]
    #[case("./b/./c", "/a", "/a/b/c")]
    #[case("//x///y", "/", "/x/y")]
    #[case("../sibling", "/a/b", "/a/sibling")]
    fn resolve_normalizes_like_posix(#[case] input: &str, #[case] cwd: &str, #[case] expected: &str) {
        assert_eq!(resolve(input, cwd), expected);
    }

    #[test]
    fn segments_validates_each_component() {
        assert_eq!(segments("/a/b.c/d-e").unwrap(), vec!["a", "b.c", "d-e"]);
        assert!(segments("/").unwrap().is_empty());
        assert!(segments("/a/bad name").is_err());
    }

    #[rstest]
    #[case("/a/b/c", "/a/b")]
    #[case("/a", "/")]
    #[case("/", "/")]
    fn parent_of(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(parent(path), expected);
    }

    #[rstest]
    #[case("/a/b/c", "c")]
    #[case("/a", "a")]
    #[case("/", "root")]
    fn basename_of(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(basename(path), expected);
    }

    #[test]
    fn is_within_matches_subtrees_only() {
        assert!(is_within("/a/b", "/a"));
        assert!(is_within("/a", "/a"));
        assert!(is_within("/a", "/"));
        assert!(!is_within("/ab", "/a"));
        assert!(!is_within("/b", "/a"));
    }
}
