//! Traversal helpers built purely on the core primitives: listing,
//! search, substitution, glob matching, size accounting and rendering.
//! Every walk uses an explicit stack; none recurse.

use regex::RegexBuilder;
use snafu::ResultExt;
use tracing::debug;

use crate::tree::node::{Node, NodeKind};
use crate::tree::path;
use crate::tree::store::{BadPatternSnafu, TagTree, TreeError};

/// Flags for [`TagTree::grep`]. The default searches names only,
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct GrepOptions {
    /// Also match against node content, not just names.
    pub content: bool,
    pub ignore_case: bool,
    /// Collect non-matching paths instead.
    pub invert: bool,
}

impl Default for GrepOptions {
    fn default() -> Self {
        GrepOptions {
            content: false,
            ignore_case: true,
            invert: false,
        }
    }
}

/// Flags for [`TagTree::sed`].
#[derive(Debug, Clone, Default)]
pub struct SedOptions {
    /// Maximum replacements per node; 0 means unlimited.
    pub count: usize,
    pub ignore_case: bool,
    /// Apply to all descendants of the starting node too.
    pub recursive: bool,
}

/// Metadata snapshot of a single node, as returned by [`TagTree::info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub path: String,
    pub kind: NodeKind,
    pub is_link: bool,
    pub link_target: Option<String>,
    pub children: usize,
    pub content_length: usize,
}

impl TagTree {
    /// Ordered child names of a directory (or of a link target when
    /// `follow_links` and the path is a symlink). `classify` appends `/`
    /// to directories and `@` to symlinks, like `ls -F`.
    pub fn ls(
        &self,
        input: &str,
        classify: bool,
        follow_links: bool,
    ) -> Result<Vec<String>, TreeError> {
        let abs = self.resolve(input);
        let mut node = self.node_at(&abs)?;
        if follow_links && node.is_link() {
            node = self.node_through_links(&abs)?;
        }

        let names = node
            .children
            .iter()
            .map(|child| {
                if !classify {
                    child.name.clone()
                } else {
                    match child.kind() {
                        NodeKind::Symlink => format!("{}@", child.name),
                        NodeKind::Directory => format!("{}/", child.name),
                        NodeKind::File => child.name.clone(),
                    }
                }
            })
            .collect();
        Ok(names)
    }

    /// Searches node names (and optionally content) for a regex,
    /// returning matching absolute paths in pre-order.
    pub fn grep(
        &self,
        pattern: &str,
        input: &str,
        options: &GrepOptions,
    ) -> Result<Vec<String>, TreeError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(options.ignore_case)
            .build()
            .context(BadPatternSnafu)?;
        let abs = self.resolve(input);
        let start = self.node_at(&abs)?;

        let mut results = Vec::new();
        for (node, node_path) in preorder(start, &abs) {
            let name = if node_path == "/" { "root" } else { node.name.as_str() };
            let mut matched = regex.is_match(name)
                || (options.content && regex.is_match(node.content()));
            if options.invert {
                matched = !matched;
            }
            if matched {
                results.push(node_path);
            }
        }
        Ok(results)
    }

    /// Line-oriented content search: every matching line is reported as
    /// `path:lineno:line`.
    pub fn grep_lines(
        &self,
        pattern: &str,
        input: &str,
        options: &GrepOptions,
    ) -> Result<Vec<String>, TreeError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(options.ignore_case)
            .build()
            .context(BadPatternSnafu)?;
        let abs = self.resolve(input);
        let start = self.node_at(&abs)?;

        let mut results = Vec::new();
        for (node, node_path) in preorder(start, &abs) {
            for (lineno, line) in node.content().lines().enumerate() {
                if regex.is_match(line) != options.invert {
                    results.push(format!("{}:{}:{}", node_path, lineno + 1, line));
                }
            }
        }
        Ok(results)
    }

    /// Regex substitution over a node's content, optionally recursing
    /// into descendants. Nodes without content are skipped, so directory
    /// structure is never disturbed.
    pub fn sed(
        &mut self,
        input: &str,
        pattern: &str,
        replacement: &str,
        options: &SedOptions,
    ) -> Result<(), TreeError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(options.ignore_case)
            .build()
            .context(BadPatternSnafu)?;
        let abs = self.resolve(input);

        let mut targets = vec![(abs.clone(), true)];
        if options.recursive {
            let start = self.node_at(&abs)?;
            for (_, node_path) in preorder(start, &abs).into_iter().skip(1) {
                targets.push((node_path, false));
            }
        }

        for (node_path, follow_links) in targets {
            let content = self.cat(&node_path, follow_links)?;
            if content.is_empty() {
                continue;
            }
            let replaced = regex.replacen(&content, options.count, replacement);
            if replaced != content {
                debug!(path = %node_path, "substituted content");
                self.write(&node_path, &replaced, follow_links)?;
            }
        }
        Ok(())
    }

    /// Finds nodes by name regex and/or kind, like `find -name -type`.
    /// The kind filter checks the node's own kind, never the link target.
    pub fn find(
        &self,
        input: &str,
        name: Option<&str>,
        kind: Option<NodeKind>,
    ) -> Result<Vec<String>, TreeError> {
        let regex = name
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .context(BadPatternSnafu)
            })
            .transpose()?;
        let abs = self.resolve(input);
        let start = self.node_at(&abs)?;

        let mut results = Vec::new();
        for (node, node_path) in preorder(start, &abs) {
            let node_name = if node_path == "/" { "root" } else { node.name.as_str() };
            let kind_matches = kind.is_none_or(|k| self.kind_at(&node_path, node) == k);
            let name_matches = regex.as_ref().is_none_or(|r| r.is_match(node_name));
            if kind_matches && name_matches {
                results.push(node_path);
            }
        }
        Ok(results)
    }

    /// Matches absolute paths against a glob pattern supporting `*`
    /// (within a segment), `**` (across segments) and `?`.
    pub fn glob(&self, pattern: &str, input: &str) -> Result<Vec<String>, TreeError> {
        let regex = RegexBuilder::new(&glob_to_regex(pattern))
            .build()
            .context(BadPatternSnafu)?;
        let abs = self.resolve(input);
        let start = self.node_at(&abs)?;

        Ok(preorder(start, &abs)
            .into_iter()
            .filter(|(_, node_path)| regex.is_match(node_path))
            .map(|(_, node_path)| node_path)
            .collect())
    }

    /// Size accounting: node count, or total content bytes when
    /// `content_size`.
    pub fn du(&self, input: &str, content_size: bool) -> Result<usize, TreeError> {
        let abs = self.resolve(input);
        let start = self.node_at(&abs)?;
        let total = preorder(start, &abs)
            .into_iter()
            .map(|(node, _)| if content_size { node.content().len() } else { 1 })
            .sum();
        Ok(total)
    }

    /// First `n` characters of a node's content.
    pub fn head(&self, input: &str, n: usize) -> Result<String, TreeError> {
        Ok(self.cat(input, true)?.chars().take(n).collect())
    }

    /// Last `n` characters of a node's content.
    pub fn tail(&self, input: &str, n: usize) -> Result<String, TreeError> {
        let content = self.cat(input, true)?;
        let chars: Vec<char> = content.chars().collect();
        let start = chars.len().saturating_sub(n);
        Ok(chars[start..].iter().collect())
    }

    /// Metadata about a node. With `follow_links`, child count and
    /// content length reflect the link target; dangling and cyclic links
    /// degrade to empty values instead of erroring.
    pub fn info(&self, input: &str, follow_links: bool) -> Result<NodeInfo, TreeError> {
        let abs = self.resolve(input);
        let node = self.node_at(&abs)?;
        let is_link = node.is_link();

        let observed = if follow_links && is_link {
            self.node_through_links(&abs).ok()
        } else {
            Some(node)
        };

        Ok(NodeInfo {
            name: path::basename(&abs).to_string(),
            path: abs.clone(),
            kind: self.kind(&abs, follow_links)?,
            is_link,
            link_target: node.link_target.clone(),
            children: observed.map_or(0, |n| n.children.len()),
            content_length: observed.map_or(0, |n| n.content().len()),
        })
    }

    /// `tree`-style rendering. Symlinks show their target, files a
    /// preview of their content, directories a trailing slash.
    pub fn render(&self, input: &str) -> Result<String, TreeError> {
        let abs = self.resolve(input);
        let start = self.node_at(&abs)?;

        // (node, path, prefix, is_last, is_root)
        let mut lines: Vec<String> = Vec::new();
        let mut stack: Vec<(&Node, String, String, bool, bool)> =
            vec![(start, abs.clone(), String::new(), true, true)];
        while let Some((node, node_path, prefix, is_last, is_root)) = stack.pop() {
            let name = if node_path == "/" { "root" } else { node.name.as_str() };
            let connector = if is_root {
                ""
            } else if is_last {
                "└── "
            } else {
                "├── "
            };

            if let Some(target) = &node.link_target {
                lines.push(format!("{prefix}{connector}{name} -> {target}"));
            } else {
                let content = node.content();
                if content.is_empty() {
                    lines.push(format!("{prefix}{connector}{name}/"));
                } else {
                    let preview: String = content.chars().take(50).collect();
                    let ellipsis = if content.chars().count() > 50 { "..." } else { "" };
                    lines.push(format!("{prefix}{connector}{name}: {preview}{ellipsis}"));
                }
            }

            let count = node.children.len();
            for (index, child) in node.children.iter().enumerate().rev() {
                let child_prefix = if is_root {
                    String::new()
                } else {
                    format!("{prefix}{}", if is_last { "    " } else { "│   " })
                };
                stack.push((
                    child,
                    path::join(&node_path, &child.name),
                    child_prefix,
                    index == count - 1,
                    false,
                ));
            }
        }
        Ok(lines.join("\n"))
    }

    /// Pre-order walk yielding `(dir_path, dir_names, file_names)` per
    /// directory, where a directory here is any node with children.
    pub fn walk(&self, input: &str) -> Result<Vec<(String, Vec<String>, Vec<String>)>, TreeError> {
        let abs = self.resolve(input);
        let start = self.node_at(&abs)?;

        let mut results = Vec::new();
        let mut stack: Vec<(&Node, String)> = vec![(start, abs)];
        while let Some((node, node_path)) = stack.pop() {
            let mut dirs = Vec::new();
            let mut files = Vec::new();
            for child in &node.children {
                if child.children.is_empty() {
                    files.push(child.name.clone());
                } else {
                    dirs.push(child.name.clone());
                }
            }
            for dir in dirs.iter().rev() {
                if let Some(child) = node.child(dir) {
                    stack.push((child, path::join(&node_path, dir)));
                }
            }
            results.push((node_path, dirs, files));
        }
        Ok(results)
    }
}

/// Pre-order traversal of a subtree, pairing each node with its absolute
/// path.
fn preorder<'a>(start: &'a Node, start_path: &str) -> Vec<(&'a Node, String)> {
    let mut out = Vec::new();
    let mut stack: Vec<(&Node, String)> = vec![(start, start_path.to_string())];
    while let Some((node, node_path)) = stack.pop() {
        for child in node.children.iter().rev() {
            stack.push((child, path::join(&node_path, &child.name)));
        }
        out.push((node, node_path));
    }
    out
}

/// Translates a glob into an anchored regex, escaping everything that is
/// not a glob metacharacter.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn sample() -> TagTree {
        let mut t = TagTree::new();
        t.mkdir("/animals/dogs", true).unwrap();
        t.mkdir("/animals/cats", true).unwrap();
        t.touch("/animals/dogs/lab", "friendly").unwrap();
        t.touch("/animals/dogs/beagle", "curious").unwrap();
        t.touch("/animals/cats/persian", "fluffy").unwrap();
        t.mkdir("/projects/tagfs", true).unwrap();
        t.touch("/projects/tagfs/README.md", "notes").unwrap();
        t.ln("/animals/dogs", "/dogs").unwrap();
        t
    }

    #[test]
    fn ls_preserves_insertion_order() {
        let t = sample();
        assert_eq!(t.ls("/animals/dogs", false, true).unwrap(), vec![
            "lab", "beagle"
        ]);
    }

    #[test]
    fn ls_classifies_entries() {
        let t = sample();
        assert_eq!(t.ls("/", true, true).unwrap(), vec![
            "animals/",
            "projects/",
            "dogs@"
        ]);
    }

    #[test]
    fn ls_follows_links_to_directories() {
        let t = sample();
        assert_eq!(t.ls("/dogs", false, true).unwrap(), vec!["lab", "beagle"]);
        assert!(t.ls("/dogs", false, false).unwrap().is_empty());
    }

    #[test]
    fn grep_matches_names_and_content() {
        let t = sample();
        assert_eq!(t.grep("bea", "/", &GrepOptions::default()).unwrap(), vec![
            "/animals/dogs/beagle"
        ]);
        let by_content = t
            .grep("fluffy", "/", &GrepOptions {
                content: true,
                ..GrepOptions::default()
            })
            .unwrap();
        assert_eq!(by_content, vec!["/animals/cats/persian"]);
    }

    #[test]
    fn grep_invert_excludes_matches() {
        let t = sample();
        let inverted = t
            .grep("dog", "/animals", &GrepOptions {
                invert: true,
                ..GrepOptions::default()
            })
            .unwrap();
        assert!(!inverted.contains(&"/animals/dogs".to_string()));
        assert!(inverted.contains(&"/animals/cats".to_string()));
        assert!(inverted.contains(&"/animals/dogs/lab".to_string()));
    }

    #[test]
    fn grep_lines_reports_positions() {
        let mut t = TagTree::new();
        t.touch("/log", "alpha\nbeta\ngamma beta").unwrap();
        let hits = t
            .grep_lines("beta", "/", &GrepOptions::default())
            .unwrap();
        assert_eq!(hits, vec!["/log:2:beta", "/log:3:gamma beta"]);
    }

    #[test]
    fn sed_replaces_in_place_and_recursively() {
        let mut t = sample();
        t.sed("/animals/dogs/lab", "friendly", "gentle", &SedOptions::default())
            .unwrap();
        assert_eq!(t.cat("/animals/dogs/lab", true).unwrap(), "gentle");

        t.sed("/animals", "u", "U", &SedOptions {
            recursive: true,
            ..SedOptions::default()
        })
        .unwrap();
        assert_eq!(t.cat("/animals/dogs/beagle", true).unwrap(), "cUrioUs");
        assert_eq!(t.cat("/animals/cats/persian", true).unwrap(), "flUffy");
    }

    #[test]
    fn sed_honors_count_limit() {
        let mut t = TagTree::new();
        t.touch("/f", "aaa").unwrap();
        t.sed("/f", "a", "b", &SedOptions {
            count: 2,
            ..SedOptions::default()
        })
        .unwrap();
        assert_eq!(t.cat("/f", true).unwrap(), "bba");
    }

    #[test]
    fn find_filters_by_name_and_kind() {
        let t = sample();
        assert_eq!(
            t.find("/", Some("^persian$"), None).unwrap(),
            vec!["/animals/cats/persian"]
        );
        let links = t.find("/", None, Some(NodeKind::Symlink)).unwrap();
        assert_eq!(links, vec!["/dogs"]);
        let dirs = t.find("/animals", None, Some(NodeKind::Directory)).unwrap();
        assert_eq!(dirs, vec!["/animals", "/animals/dogs", "/animals/cats"]);
    }

    #[rstest]
    #[case("/animals/*/lab", &["/animals/dogs/lab"])]
    #[case("/animals/*", &["/animals/dogs", "/animals/cats"])]
    #[case("/**/README.md", &["/projects/tagfs/README.md"])]
    #[case("/animals/dogs/?ab", &["/animals/dogs/lab"])]
    fn glob_matches_expected_paths(#[case] pattern: &str, #[case] expected: &[&str]) {
        let t = sample();
        assert_eq!(t.glob(pattern, "/").unwrap(), expected);
    }

    #[test]
    fn glob_escapes_regex_metacharacters() {
        let t = sample();
        assert_eq!(t.glob("/projects/tagfs/README.md", "/").unwrap(), vec![
            "/projects/tagfs/README.md"
        ]);
        // The dot must not match an arbitrary character.
        assert!(t.glob("/projects/tagfs/READMEXmd", "/").unwrap().is_empty());
    }

    #[test]
    fn du_counts_nodes_or_bytes() {
        let t = sample();
        // dogs dir + lab + beagle
        assert_eq!(t.du("/animals/dogs", false).unwrap(), 3);
        assert_eq!(
            t.du("/animals/dogs", true).unwrap(),
            "friendly".len() + "curious".len()
        );
    }

    #[test]
    fn head_and_tail_slice_by_characters() {
        let mut t = TagTree::new();
        t.touch("/f", "hello world").unwrap();
        assert_eq!(t.head("/f", 5).unwrap(), "hello");
        assert_eq!(t.tail("/f", 5).unwrap(), "world");
        assert_eq!(t.tail("/f", 100).unwrap(), "hello world");
    }

    #[test]
    fn info_reflects_the_target_when_following() {
        let t = sample();
        let info = t.info("/dogs", true).unwrap();
        assert_eq!(info.kind, NodeKind::Directory);
        assert!(info.is_link);
        assert_eq!(info.link_target.as_deref(), Some("/animals/dogs"));
        assert_eq!(info.children, 2);

        let unfollowed = t.info("/dogs", false).unwrap();
        assert_eq!(unfollowed.kind, NodeKind::Symlink);
        assert_eq!(unfollowed.children, 0);
    }

    #[test]
    fn info_survives_dangling_links() {
        let mut t = TagTree::new();
        t.ln("/gone", "/l").unwrap();
        let info = t.info("/l", true).unwrap();
        assert_eq!(info.kind, NodeKind::Symlink);
        assert_eq!(info.children, 0);
        assert_eq!(info.content_length, 0);
    }

    #[test]
    fn render_shows_structure_links_and_previews() {
        let mut t = TagTree::new();
        t.mkdir("/d", false).unwrap();
        t.touch("/d/f", "hello").unwrap();
        t.ln("/d/f", "/l").unwrap();
        let rendered = t.render("/").unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "root/");
        assert_eq!(lines[1], "├── d/");
        assert_eq!(lines[2], "│   └── f: hello");
        assert_eq!(lines[3], "└── l -> /d/f");
    }

    #[test]
    fn walk_yields_dirs_then_descends() {
        let t = sample();
        let walked = t.walk("/animals").unwrap();
        assert_eq!(walked[0].0, "/animals");
        assert_eq!(walked[0].1, vec!["dogs", "cats"]);
        assert!(walked[0].2.is_empty());
        assert_eq!(walked[1].0, "/animals/dogs");
        assert_eq!(walked[1].2, vec!["lab", "beagle"]);
    }
}
