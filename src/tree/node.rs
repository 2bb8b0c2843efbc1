use derive_more::Display;

/// A single vertex of the tree.
///
/// There is exactly one node shape; whether a node behaves as a directory,
/// file or symlink is decided at read time by [`Node::kind`], never stored.
/// Nodes own their children and carry no parent pointer: every traversal
/// walks root-down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub text: String,
    pub children: Vec<Node>,
    /// Serializes as `<name/>` when there is no text and no children.
    /// Distinguishes a contentless leaf from an explicitly-empty directory
    /// (`<name></name>`).
    pub self_closing: bool,
    /// When set the node is a symlink to the given absolute path and must
    /// have no text and no children.
    pub link_target: Option<String>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            text: String::new(),
            children: Vec::new(),
            self_closing: false,
            link_target: None,
        }
    }

    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Node {
            name: name.into(),
            self_closing: text.is_empty(),
            text,
            children: Vec::new(),
            link_target: None,
        }
    }

    pub fn symlink(name: impl Into<String>, target: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            text: String::new(),
            children: Vec::new(),
            self_closing: true,
            link_target: Some(target.into()),
        }
    }

    /// The canonical empty tree: a single self-closing root.
    pub fn empty_root() -> Self {
        Node {
            self_closing: true,
            ..Node::new("root")
        }
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Node text with surrounding whitespace removed. Parsed input may
    /// carry indentation runs; content comparisons go through this.
    pub fn content(&self) -> &str {
        self.text.trim()
    }

    pub fn is_link(&self) -> bool {
        self.link_target.is_some()
    }

    /// Read-time classification. Exactly one kind holds for every node.
    pub fn kind(&self) -> NodeKind {
        if self.link_target.is_some() {
            NodeKind::Symlink
        } else if self.self_closing || !self.content().is_empty() {
            NodeKind::File
        } else {
            NodeKind::Directory
        }
    }

    /// Appends a child, downgrading a self-closing leaf into a directory.
    pub fn push_child(&mut self, child: Node) {
        self.self_closing = false;
        self.children.push(child);
    }

    /// Deep clone of the subtree, rebuilt over an explicit work stack.
    /// Symlinks stay symlinks pointing at the same target.
    pub fn clone_subtree(&self) -> Node {
        // Each stack entry carries the child-index path to its clone slot.
        let mut clone = Node {
            name: self.name.clone(),
            text: self.text.clone(),
            children: Vec::new(),
            self_closing: self.self_closing,
            link_target: self.link_target.clone(),
        };
        let mut stack: Vec<(&Node, Vec<usize>)> = vec![(self, Vec::new())];
        while let Some((source, at)) = stack.pop() {
            for (index, child) in source.children.iter().enumerate() {
                let mut slot = &mut clone;
                for &i in &at {
                    slot = &mut slot.children[i];
                }
                slot.children.push(Node {
                    name: child.name.clone(),
                    text: child.text.clone(),
                    children: Vec::new(),
                    self_closing: child.self_closing,
                    link_target: child.link_target.clone(),
                });
                let mut child_at = at.clone();
                child_at.push(index);
                stack.push((child, child_at));
            }
        }
        clone
    }
}

/// What a node is when looked at through filesystem glasses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NodeKind {
    #[display("directory")]
    Directory,
    #[display("file")]
    File,
    #[display("link")]
    Symlink,
}
