use std::collections::HashSet;

use snafu::{ResultExt, Snafu, ensure};
use tracing::debug;

use crate::text::{EMPTY_TREE, InvalidSegmentError, ParseError, emit, parse};
use crate::tree::node::{Node, NodeKind};
use crate::tree::path;

/// The tree store: one owned root node, a lazily refreshed serialization
/// cache, and a mutable working directory.
///
/// The whole state of a `TagTree` round-trips through [`TagTree::raw`]:
/// `TagTree::from_raw(tree.raw())` reproduces the identical logical tree.
/// Every mutating operation marks the store dirty; the next read of the
/// serialized form re-emits and clears the flag. The store is not safe
/// for concurrent mutation; callers share it behind their own lock.
#[derive(Debug, Clone)]
pub struct TagTree {
    pub(crate) root: Node,
    cwd: String,
    cache: String,
    dirty: bool,
}

impl Default for TagTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TagTree {
    /// An empty tree: a single self-closing root.
    pub fn new() -> Self {
        TagTree {
            root: Node::empty_root(),
            cwd: "/".to_string(),
            cache: EMPTY_TREE.to_string(),
            dirty: false,
        }
    }

    /// Parses a serialized tree. Empty input yields the empty tree.
    pub fn from_raw(raw: &str) -> Result<Self, TreeError> {
        let root = parse(raw).context(MalformedSnafu)?;
        Ok(TagTree {
            root,
            cwd: "/".to_string(),
            cache: raw.to_string(),
            dirty: raw.is_empty(),
        })
    }

    /// The serialized form, re-emitted if the tree changed since the last
    /// read.
    pub fn raw(&mut self) -> &str {
        if self.dirty {
            debug!("re-emitting serialized tree");
            self.cache = emit(&self.root);
            self.dirty = false;
        }
        &self.cache
    }

    /// Current working directory, always absolute and normalized.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Changes the working directory. The target must exist and resolve
    /// (through symlinks) to a directory.
    pub fn cd(&mut self, path: &str) -> Result<(), TreeError> {
        let resolved = self.resolve(path);
        self.node_at(&resolved)?;
        ensure!(
            self.is_dir(&resolved, true),
            NotADirectorySnafu { path: resolved }
        );
        debug!(cwd = %resolved, "changed working directory");
        self.cwd = resolved;
        Ok(())
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Drops the whole tree back to the canonical empty state.
    pub(crate) fn reset(&mut self) {
        self.root = Node::empty_root();
        self.cwd = "/".to_string();
        self.mark_dirty();
    }

    /// Resolves a path against the working directory.
    pub fn resolve(&self, input: &str) -> String {
        path::resolve(input, &self.cwd)
    }

    /// Walks an absolute path root-down through named children. Fails
    /// with `NotFound` on a missing segment; descending through a leaf
    /// fails the same way since leaves have no children.
    pub(crate) fn node_at(&self, abs_path: &str) -> Result<&Node, TreeError> {
        let segments = path::segments(abs_path).context(InvalidSegmentSnafu)?;
        let mut node = &self.root;
        for segment in segments {
            node = node.child(segment).ok_or_else(|| TreeError::NotFound {
                path: abs_path.to_string(),
            })?;
        }
        Ok(node)
    }

    pub(crate) fn node_at_mut(&mut self, abs_path: &str) -> Result<&mut Node, TreeError> {
        let segments = path::segments(abs_path).context(InvalidSegmentSnafu)?;
        let mut node = &mut self.root;
        for segment in segments {
            let index = node
                .children
                .iter()
                .position(|c| c.name == segment)
                .ok_or_else(|| TreeError::NotFound {
                    path: abs_path.to_string(),
                })?;
            node = &mut node.children[index];
        }
        Ok(node)
    }

    /// Follows symlinks hop by hop until a non-link node, returning the
    /// final absolute path. Iterative with a visited set so a chain of
    /// thousands of hops terminates and a cycle is reported instead of
    /// looping.
    pub(crate) fn resolve_link_path(&self, input: &str) -> Result<String, TreeError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut current = self.resolve(input);
        loop {
            ensure!(
                seen.insert(current.clone()),
                CycleDetectedSnafu { path: current }
            );
            let node = self.node_at(&current)?;
            match &node.link_target {
                Some(target) => current = self.resolve(target),
                None => return Ok(current),
            }
        }
    }

    /// Looks up a node, following symlinks to the final target.
    pub(crate) fn node_through_links(&self, input: &str) -> Result<&Node, TreeError> {
        let path = self.resolve_link_path(input)?;
        self.node_at(&path)
    }

    /// Classification for an already-looked-up node at an absolute path.
    /// The root is always a directory; it can never be a symlink and an
    /// empty tree still has a working directory to stand in.
    pub(crate) fn kind_at(&self, abs_path: &str, node: &Node) -> NodeKind {
        if abs_path == "/" {
            NodeKind::Directory
        } else {
            node.kind()
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TreeError {
    #[snafu(display("Invalid path"))]
    InvalidSegment { source: InvalidSegmentError },
    #[snafu(display("Malformed tree data"))]
    Malformed { source: ParseError },
    #[snafu(display("Path does not exist: {path}"))]
    NotFound { path: String },
    #[snafu(display("Not a directory: {path}"))]
    NotADirectory { path: String },
    #[snafu(display("Is a directory: {path}"))]
    IsADirectory { path: String },
    #[snafu(display("Directory not empty: {path}"))]
    NotEmpty { path: String },
    #[snafu(display("Path already exists: {path}"))]
    AlreadyExists { path: String },
    #[snafu(display("Not a symlink: {path}"))]
    NotASymlink { path: String },
    #[snafu(display("Source and destination are the same: {path}"))]
    SelfReference { path: String },
    #[snafu(display("Symlink cycle detected: {path}"))]
    CycleDetected { path: String },
    #[snafu(display("Invalid operation on {path}: {reason}"))]
    InvalidOperation { path: String, reason: String },
    #[snafu(display("Invalid pattern"))]
    BadPattern { source: regex::Error },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_serializes_to_the_canonical_empty_tree() {
        let mut tree = TagTree::new();
        assert_eq!(tree.raw(), EMPTY_TREE);
        assert_eq!(tree.cwd(), "/");
    }

    #[test]
    fn from_raw_round_trips() {
        let raw = "<root><a><b>hi</b></a></root>";
        let mut tree = TagTree::from_raw(raw).unwrap();
        assert_eq!(tree.raw(), raw);
    }

    #[test]
    fn from_raw_rejects_malformed_input() {
        assert!(matches!(
            TagTree::from_raw("<root><a>"),
            Err(TreeError::Malformed { .. })
        ));
    }

    #[test]
    fn raw_is_cached_until_the_next_mutation() {
        let mut tree = TagTree::from_raw("<root><a/></root>").unwrap();
        assert_eq!(tree.raw(), "<root><a/></root>");
        tree.root.push_child(Node::leaf("b", ""));
        // Not marked dirty: the cache still serves the old serialization.
        assert_eq!(tree.raw(), "<root><a/></root>");
        tree.mark_dirty();
        assert_eq!(tree.raw(), "<root><a/><b/></root>");
    }

    #[test]
    fn node_at_reports_missing_segments() {
        let tree = TagTree::from_raw("<root><a><b/></a></root>").unwrap();
        assert!(tree.node_at("/a").is_ok());
        assert!(matches!(
            tree.node_at("/a/missing"),
            Err(TreeError::NotFound { .. })
        ));
        // Descending through a leaf is a plain NotFound as well.
        assert!(matches!(
            tree.node_at("/a/b/c"),
            Err(TreeError::NotFound { .. })
        ));
    }

    #[test]
    fn resolve_link_path_follows_chains() {
        let raw = "<root><f>v</f><l1 @=\"/f\"/><l2 @=\"/l1\"/></root>";
        let tree = TagTree::from_raw(raw).unwrap();
        assert_eq!(tree.resolve_link_path("/l2").unwrap(), "/f");
    }

    #[test]
    fn resolve_link_path_detects_cycles() {
        let raw = "<root><p @=\"/q\"/><q @=\"/p\"/></root>";
        let tree = TagTree::from_raw(raw).unwrap();
        assert!(matches!(
            tree.resolve_link_path("/p"),
            Err(TreeError::CycleDetected { .. })
        ));
    }

    #[test]
    fn resolve_link_path_reports_dangling_targets() {
        let tree = TagTree::from_raw("<root><l @=\"/gone\"/></root>").unwrap();
        assert!(matches!(
            tree.resolve_link_path("/l"),
            Err(TreeError::NotFound { .. })
        ));
    }

    #[test]
    fn cd_moves_only_into_directories() {
        let mut tree = TagTree::from_raw("<root><d><f>x</f></d></root>").unwrap();
        tree.cd("/d").unwrap();
        assert_eq!(tree.cwd(), "/d");
        assert!(matches!(
            tree.cd("f"),
            Err(TreeError::NotADirectory { .. })
        ));
        assert!(matches!(tree.cd("/gone"), Err(TreeError::NotFound { .. })));
        tree.cd("..").unwrap();
        assert_eq!(tree.cwd(), "/");
    }

    #[test]
    fn cd_into_the_root_of_an_empty_tree_is_fine() {
        let mut tree = TagTree::new();
        tree.cd("/").unwrap();
        assert_eq!(tree.cwd(), "/");
    }
}
