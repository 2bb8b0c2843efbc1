use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::text::grammar::{InvalidSegmentError, unescape, validate_segment};
use crate::tree::Node;

/// The canonical empty tree.
pub const EMPTY_TREE: &str = "<root/>";

/// Parses a serialized tree into an owned [`Node`].
///
/// Scans left-to-right with a single explicit stack so arbitrarily deep
/// input cannot overflow the call stack. Empty input parses as the
/// canonical empty tree. Input that opens and closes anything other than
/// exactly one top-level node is rejected, as is a node carrying both
/// non-whitespace text and children (whitespace runs between child markers
/// are discarded).
pub fn parse(raw: &str) -> Result<Node, ParseError> {
    let data = if raw.is_empty() { EMPTY_TREE } else { raw };

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;
    let mut pos = 0;

    while pos < data.len() {
        if data.as_bytes()[pos] != b'<' {
            let run_end = data[pos..]
                .find('<')
                .map_or(data.len(), |offset| pos + offset);
            let run = &data[pos..run_end];
            match stack.last_mut() {
                Some(open) => open.text.push_str(&unescape(run)),
                None => ensure!(run.trim().is_empty(), TextOutsideRootSnafu { pos }),
            }
            pos = run_end;
            continue;
        }

        let end = data[pos + 1..]
            .find('>')
            .map(|offset| pos + 1 + offset)
            .context(UnterminatedMarkerSnafu { pos })?;
        let token = &data[pos + 1..end];
        ensure!(!token.is_empty(), EmptyMarkerSnafu { pos });

        if let Some(name) = token.strip_prefix('/') {
            let node = stack.pop().context(MismatchedCloseSnafu { name, pos })?;
            ensure!(node.name == name, MismatchedCloseSnafu { name, pos });
            let node = reject_mixed_content(node)?;
            attach(node, &mut stack, &mut root, pos)?;
        } else if token.contains(SYMLINK_ATTR) {
            let (name, target) = parse_symlink_marker(token)?;
            validate_segment(name).context(InvalidTagNameSnafu { pos })?;
            attach(Node::symlink(name, target), &mut stack, &mut root, pos)?;
        } else {
            let self_closing = token.ends_with('/');
            let name = if self_closing {
                &token[..token.len() - 1]
            } else {
                token
            };
            validate_segment(name).context(InvalidTagNameSnafu { pos })?;
            let node = Node {
                self_closing,
                ..Node::new(name)
            };
            if self_closing {
                attach(node, &mut stack, &mut root, pos)?;
            } else {
                stack.push(node);
            }
        }

        pos = end + 1;
    }

    if let Some(open) = stack.last() {
        return UnclosedMarkerSnafu {
            name: open.name.clone(),
        }
        .fail();
    }
    let root = root.context(MissingRootSnafu)?;
    ensure!(
        root.name == "root" && !root.is_link(),
        InvalidRootSnafu {
            name: root.name.clone()
        }
    );
    Ok(root)
}

const SYMLINK_ATTR: &str = " @=\"";

/// Splits a `name @="escaped-target"/` marker token into name and
/// unescaped target. Symlink markers must be self-closing.
fn parse_symlink_marker(token: &str) -> Result<(&str, String), ParseError> {
    let attr_start = token.find(SYMLINK_ATTR).context(MalformedSymlinkSnafu {
        token,
        reason: "missing @ attribute",
    })?;
    let name = &token[..attr_start];
    let target_start = attr_start + SYMLINK_ATTR.len();
    let target_end = token[target_start..]
        .find('"')
        .map(|offset| target_start + offset)
        .context(MalformedSymlinkSnafu {
            token,
            reason: "missing closing quote",
        })?;
    let target = unescape(&token[target_start..target_end]);
    ensure!(
        &token[target_end + 1..] == "/",
        MalformedSymlinkSnafu {
            token,
            reason: "symlinks must be self-closing",
        }
    );
    Ok((name, target))
}

/// Drops whitespace-only text on a node with children and rejects the
/// rest: a node never carries both content and children.
fn reject_mixed_content(mut node: Node) -> Result<Node, ParseError> {
    if !node.children.is_empty() && !node.text.is_empty() {
        ensure!(
            node.text.trim().is_empty(),
            MixedContentSnafu { name: node.name }
        );
        node.text.clear();
    }
    Ok(node)
}

fn attach(
    node: Node,
    stack: &mut Vec<Node>,
    root: &mut Option<Node>,
    pos: usize,
) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => parent.push_child(node),
        None => {
            ensure!(root.is_none(), MultipleRootsSnafu { pos });
            *root = Some(node);
        }
    }
    Ok(())
}

#[derive(Debug, Snafu)]
pub enum ParseError {
    #[snafu(display("Malformed: marker at byte {pos} is missing its closing '>'"))]
    UnterminatedMarker { pos: usize },
    #[snafu(display("Malformed: empty marker at byte {pos}"))]
    EmptyMarker { pos: usize },
    #[snafu(display("Malformed: unexpected closing marker </{name}> at byte {pos}"))]
    MismatchedClose { name: String, pos: usize },
    #[snafu(display("Malformed: unclosed <{name}>"))]
    UnclosedMarker { name: String },
    #[snafu(display("Malformed: input has no root element"))]
    MissingRoot,
    #[snafu(display("Malformed: top-level element <{name}> must be a non-link named 'root'"))]
    InvalidRoot { name: String },
    #[snafu(display("Malformed: second top-level element at byte {pos}"))]
    MultipleRoots { pos: usize },
    #[snafu(display("Malformed: text outside the root element at byte {pos}"))]
    TextOutsideRoot { pos: usize },
    #[snafu(display("Malformed: invalid tag name at byte {pos}"))]
    InvalidTagName {
        pos: usize,
        source: InvalidSegmentError,
    },
    #[snafu(display("Malformed symlink marker <{token}>: {reason}"))]
    MalformedSymlink { token: String, reason: String },
    #[snafu(display("Malformed: <{name}> mixes text content with child markers"))]
    MixedContent { name: String },
}
