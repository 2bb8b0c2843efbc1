//! Whole-string file persistence for a [`TagTree`].
//!
//! The serialized tree is the sole persisted state: loading re-parses the
//! whole file, saving rewrites the whole string. There is no incremental
//! or streaming form.

use std::path::{Path, PathBuf};

use compio::fs;
use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use crate::tree::{TagTree, TreeError};

/// A [`TagTree`] bound to a file on the host filesystem.
#[derive(Debug)]
pub struct FileTree {
    path: PathBuf,
    tree: TagTree,
}

impl FileTree {
    /// Opens a tree from a file. A missing file yields the empty tree;
    /// it will be created on the first [`FileTree::sync`].
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, FileTreeError> {
        let path = path.into();
        let tree = match fs::read(&path).await {
            Ok(bytes) => {
                let raw = String::from_utf8_lossy(&bytes);
                debug!(path = %path.display(), bytes = bytes.len(), "loaded tree file");
                TagTree::from_raw(&raw).context(ParseSnafu {
                    path: path.display().to_string(),
                })?
            }
            Err(_) => {
                info!(path = %path.display(), "no existing tree file, starting empty");
                TagTree::new()
            }
        };
        Ok(FileTree { path, tree })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tree(&self) -> &TagTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut TagTree {
        &mut self.tree
    }

    /// Writes the current serialization back to the file.
    pub async fn sync(&mut self) -> Result<(), FileTreeError> {
        let raw = self.tree.raw().to_string();
        fs::write(&self.path, raw.into_bytes())
            .await
            .0
            .context(WriteSnafu {
                path: self.path.display().to_string(),
            })?;
        debug!(path = %self.path.display(), "synced tree file");
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum FileTreeError {
    #[snafu(display("Failed to parse tree file: {path}"))]
    ParseError { path: String, source: TreeError },
    #[snafu(display("Failed to write tree file: {path}"))]
    WriteError { path: String, source: std::io::Error },
}
