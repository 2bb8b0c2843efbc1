//! Primitive filesystem-style operations over a [`TagTree`].
//!
//! Every operation resolves its paths against the working directory,
//! validates all preconditions before touching the tree, and marks the
//! store dirty on success. A failed call leaves the serialized form
//! byte-identical to its pre-call value.

use snafu::{ResultExt, ensure};
use tracing::debug;

use crate::tree::node::{Node, NodeKind};
use crate::tree::path;
use crate::tree::store::{
    AlreadyExistsSnafu, InvalidOperationSnafu, InvalidSegmentSnafu, IsADirectorySnafu,
    NotADirectorySnafu, NotEmptySnafu, NotFoundSnafu, SelfReferenceSnafu, TagTree, TreeError,
};

impl TagTree {
    /// True iff the path exists (without following a final symlink).
    pub fn exists(&self, path: &str) -> bool {
        self.node_at(&self.resolve(path)).is_ok()
    }

    /// Creates a directory, with `parents` materializing missing
    /// intermediate directories. Succeeds as a no-op when the full path
    /// already exists.
    pub fn mkdir(&mut self, path: &str, parents: bool) -> Result<(), TreeError> {
        let abs = self.resolve(path);
        let segments: Vec<String> = path::segments(&abs)
            .context(InvalidSegmentSnafu)?
            .into_iter()
            .map(str::to_string)
            .collect();
        if segments.is_empty() {
            return Ok(());
        }

        // Walk the existing prefix.
        let mut node = &self.root;
        let mut depth = 0;
        while depth < segments.len() {
            match node.child(&segments[depth]) {
                Some(child) => {
                    node = child;
                    depth += 1;
                }
                None => break,
            }
        }
        if depth == segments.len() {
            return Ok(());
        }

        let prefix = abs_prefix(&segments, depth);
        if segments.len() - depth > 1 && !parents {
            return NotFoundSnafu {
                path: abs_prefix(&segments, segments.len() - 1),
            }
            .fail();
        }
        ensure!(
            self.kind_at(&prefix, node) == NodeKind::Directory,
            NotADirectorySnafu { path: prefix }
        );

        let mut cursor = self.node_at_mut(&prefix)?;
        for segment in &segments[depth..] {
            cursor.push_child(Node::new(segment.clone()));
            let last = cursor.children.len() - 1;
            cursor = &mut cursor.children[last];
        }
        debug!(path = %abs, "created directory");
        self.mark_dirty();
        Ok(())
    }

    /// Creates a leaf with optional content, materializing missing parent
    /// directories. On an existing path this writes the content (no-op
    /// when the content is empty).
    pub fn touch(&mut self, path: &str, content: &str) -> Result<(), TreeError> {
        let abs = self.resolve(path);
        if self.exists(&abs) {
            if content.is_empty() {
                return Ok(());
            }
            return self.write(&abs, content, true);
        }

        let parent_path = path::parent(&abs);
        self.ensure_directory(&parent_path)?;

        let name = path::basename(&abs).to_string();
        let parent = self.node_at_mut(&parent_path)?;
        parent.push_child(Node::leaf(name, content));
        debug!(path = %abs, "created leaf");
        self.mark_dirty();
        Ok(())
    }

    /// Text content of a node; directories and contentless leaves read as
    /// the empty string.
    pub fn cat(&self, path: &str, follow_links: bool) -> Result<String, TreeError> {
        let node = if follow_links {
            self.node_through_links(path)?
        } else {
            self.node_at(&self.resolve(path))?
        };
        Ok(node.content().to_string())
    }

    /// Replaces a node's content. A missing path is created as a leaf; a
    /// node with children refuses the write.
    pub fn write(
        &mut self,
        path: &str,
        content: &str,
        follow_links: bool,
    ) -> Result<(), TreeError> {
        let abs = self.resolve(path);
        if !self.exists(&abs) {
            return self.touch(&abs, content);
        }
        let target_path = if follow_links {
            self.resolve_link_path(&abs)?
        } else {
            abs
        };

        let node = self.node_at_mut(&target_path)?;
        ensure!(
            node.children.is_empty(),
            IsADirectorySnafu { path: target_path }
        );
        ensure!(
            !node.is_link(),
            InvalidOperationSnafu {
                path: target_path,
                reason: "cannot write to a symlink without following it",
            }
        );
        node.text = content.to_string();
        node.self_closing = false;
        debug!(path = %target_path, bytes = content.len(), "wrote content");
        self.mark_dirty();
        Ok(())
    }

    /// Detaches a node from its parent. Removing a symlink removes only
    /// the link. Removing the root requires `recursive` and resets the
    /// store to the canonical empty tree.
    pub fn rm(&mut self, path: &str, recursive: bool) -> Result<(), TreeError> {
        let abs = self.resolve(path);
        if abs == "/" {
            ensure!(
                recursive,
                InvalidOperationSnafu {
                    path: abs,
                    reason: "removing the root requires recursive=true",
                }
            );
            self.reset();
            debug!("reset store to the empty tree");
            return Ok(());
        }

        let parent_path = path::parent(&abs);
        let name = path::basename(&abs).to_string();
        let parent = match self.node_at_mut(&parent_path) {
            Ok(parent) => parent,
            Err(_) => return NotFoundSnafu { path: abs }.fail(),
        };
        let index = parent
            .children
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| TreeError::NotFound { path: abs.clone() })?;
        ensure!(
            parent.children[index].children.is_empty() || recursive,
            NotEmptySnafu { path: abs }
        );
        parent.children.remove(index);
        debug!(path = %abs, "removed node");
        self.mark_dirty();
        Ok(())
    }

    /// Moves a subtree. Moving onto an existing directory moves *into*
    /// it under the source's basename; moving onto itself is a no-op.
    pub fn mv(&mut self, src: &str, dst: &str) -> Result<(), TreeError> {
        let src = self.resolve(src);
        let (dst, same) = self.resolve_destination(&src, dst)?;
        if same {
            return Ok(());
        }
        ensure!(
            src != "/",
            InvalidOperationSnafu {
                path: src,
                reason: "cannot move the root",
            }
        );
        ensure!(
            !path::is_within(&dst, &src),
            InvalidOperationSnafu {
                path: dst,
                reason: "cannot move a node into its own subtree",
            }
        );
        self.node_at(&src)?;
        ensure!(!self.exists(&dst), AlreadyExistsSnafu { path: dst });

        let dst_parent = path::parent(&dst);
        self.ensure_directory(&dst_parent)?;

        // Everything is validated; detach and reinsert cannot fail now.
        let mut node = self.detach(&src)?;
        node.name = path::basename(&dst).to_string();
        let parent = self.node_at_mut(&dst_parent)?;
        parent.push_child(node);
        debug!(src = %src, dst = %dst, "moved subtree");
        self.mark_dirty();
        Ok(())
    }

    /// Deep-copies a subtree. Copying onto an existing directory copies
    /// *into* it; copying onto itself fails.
    pub fn cp(&mut self, src: &str, dst: &str) -> Result<(), TreeError> {
        let src = self.resolve(src);
        let (dst, same) = self.resolve_destination(&src, dst)?;
        ensure!(!same, SelfReferenceSnafu { path: src });
        let mut clone = self.node_at(&src)?.clone_subtree();
        ensure!(!self.exists(&dst), AlreadyExistsSnafu { path: dst });

        let dst_parent = path::parent(&dst);
        self.ensure_directory(&dst_parent)?;

        clone.name = path::basename(&dst).to_string();
        let parent = self.node_at_mut(&dst_parent)?;
        parent.push_child(clone);
        debug!(src = %src, dst = %dst, "copied subtree");
        self.mark_dirty();
        Ok(())
    }

    /// Creates a symlink at `link` pointing to `target`. The target need
    /// not exist; dangling links are legal and fail only when followed.
    pub fn ln(&mut self, target: &str, link: &str) -> Result<(), TreeError> {
        let target = self.resolve(target);
        let mut link = self.resolve(link);

        // Linking into an existing directory nests under the target's
        // basename, through a final symlink-to-directory if needed.
        if self.exists(&link) && self.is_dir(&link, true) {
            let dir = self.resolve_link_path(&link)?;
            link = path::join(&dir, path::basename(&target));
        }
        ensure!(!self.exists(&link), AlreadyExistsSnafu { path: link });

        let parent_path = path::parent(&link);
        self.ensure_directory(&parent_path)?;
        let name = path::basename(&link).to_string();
        let parent = self.node_at_mut(&parent_path)?;
        parent.push_child(Node::symlink(name, target.clone()));
        debug!(link = %link, target = %target, "created symlink");
        self.mark_dirty();
        Ok(())
    }

    /// The target a symlink points at.
    pub fn readlink(&self, path: &str) -> Result<String, TreeError> {
        let abs = self.resolve(path);
        let node = self.node_at(&abs)?;
        node.link_target
            .clone()
            .ok_or(TreeError::NotASymlink { path: abs })
    }

    /// Read-time classification. With `follow_links`, a resolvable link
    /// reports its target's kind; dangling or cyclic links degrade to
    /// `Symlink` instead of erroring.
    pub fn kind(&self, path: &str, follow_links: bool) -> Result<NodeKind, TreeError> {
        let abs = self.resolve(path);
        let node = self.node_at(&abs)?;
        if follow_links && node.is_link() {
            match self.resolve_link_path(&abs) {
                Ok(target_path) => {
                    let target = self.node_at(&target_path)?;
                    Ok(self.kind_at(&target_path, target))
                }
                Err(_) => Ok(NodeKind::Symlink),
            }
        } else {
            Ok(self.kind_at(&abs, node))
        }
    }

    /// True iff the path resolves to a directory; resolution failures
    /// (missing paths, dangling or cyclic links) are `false`, never
    /// errors.
    pub fn is_dir(&self, path: &str, follow_links: bool) -> bool {
        matches!(self.kind(path, follow_links), Ok(NodeKind::Directory))
    }

    /// True iff the path resolves to a file.
    pub fn is_file(&self, path: &str, follow_links: bool) -> bool {
        matches!(self.kind(path, follow_links), Ok(NodeKind::File))
    }

    /// True iff the path itself is a symlink (never follows).
    pub fn is_link_path(&self, path: &str) -> bool {
        self.node_at(&self.resolve(path)).is_ok_and(Node::is_link)
    }

    /// Every symlink whose stored target equals `target` exactly.
    pub fn backlinks(&self, target: &str) -> Vec<String> {
        let target = self.resolve(target);
        let mut results = Vec::new();
        let mut stack: Vec<(&Node, String)> = vec![(&self.root, "/".to_string())];
        while let Some((node, node_path)) = stack.pop() {
            if node.link_target.as_deref() == Some(target.as_str()) {
                results.push(node_path.clone());
            }
            for child in node.children.iter().rev() {
                stack.push((child, path::join(&node_path, &child.name)));
            }
        }
        results
    }

    /// Resolves move/copy destination rules: an existing directory
    /// destination retargets to `dst/basename(src)`. Returns the final
    /// destination and whether it equals the source.
    fn resolve_destination(&self, src: &str, dst: &str) -> Result<(String, bool), TreeError> {
        let mut dst = self.resolve(dst);
        if src == dst {
            return Ok((dst, true));
        }
        if self.exists(&dst) && self.is_dir(&dst, true) {
            let dir = self.resolve_link_path(&dst)?;
            dst = path::join(&dir, path::basename(src));
            if src == dst {
                return Ok((dst, true));
            }
        }
        Ok((dst, false))
    }

    /// Makes sure `path` is an existing directory, creating the chain if
    /// missing. Validation happens before any node is inserted.
    fn ensure_directory(&mut self, path: &str) -> Result<(), TreeError> {
        if self.exists(path) {
            let node = self.node_at(path)?;
            ensure!(
                self.kind_at(path, node) == NodeKind::Directory,
                NotADirectorySnafu { path }
            );
            return Ok(());
        }
        self.mkdir(path, true)
    }

    /// Removes and returns the node at an absolute path. The path must
    /// have been validated to exist and not be the root.
    fn detach(&mut self, abs: &str) -> Result<Node, TreeError> {
        let parent_path = path::parent(abs);
        let name = path::basename(abs).to_string();
        let parent = self.node_at_mut(&parent_path)?;
        let index = parent
            .children
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| TreeError::NotFound {
                path: abs.to_string(),
            })?;
        Ok(parent.children.remove(index))
    }
}

fn abs_prefix(segments: &[String], depth: usize) -> String {
    if depth == 0 {
        "/".to_string()
    } else {
        format!("/{}", segments[..depth].join("/"))
    }
}
