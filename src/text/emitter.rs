use crate::text::grammar::escape;
use crate::tree::Node;

/// Serializes a tree back into its string form.
///
/// Iterative with an explicit stack, matching the parser's depth
/// tolerance. A structurally valid tree always emits; there is no
/// failure mode.
pub fn emit(node: &Node) -> String {
    enum Step<'a> {
        Open(&'a Node),
        Close(&'a str),
    }

    let mut out = String::new();
    let mut stack = vec![Step::Open(node)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Close(name) => {
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            Step::Open(node) => {
                if let Some(target) = &node.link_target {
                    out.push('<');
                    out.push_str(&node.name);
                    out.push_str(" @=\"");
                    out.push_str(&escape(target));
                    out.push_str("\"/>");
                } else if node.self_closing && node.children.is_empty() && node.text.is_empty() {
                    out.push('<');
                    out.push_str(&node.name);
                    out.push_str("/>");
                } else {
                    out.push('<');
                    out.push_str(&node.name);
                    out.push('>');
                    out.push_str(&escape(&node.text));
                    stack.push(Step::Close(&node.name));
                    for child in node.children.iter().rev() {
                        stack.push(Step::Open(child));
                    }
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse;

    #[test]
    fn emits_each_marker_form() {
        let mut root = Node::new("root");
        root.push_child(Node::leaf("empty", ""));
        root.push_child(Node::leaf("note", "hi"));
        root.push_child(Node::symlink("l", "/note"));
        root.push_child(Node::new("dir"));
        assert_eq!(
            emit(&root),
            "<root><empty/><note>hi</note><l @=\"/note\"/><dir></dir></root>"
        );
    }

    #[test]
    fn escapes_text_and_link_targets() {
        let mut root = Node::new("root");
        root.push_child(Node::leaf("f", "a<b>&c"));
        root.push_child(Node::symlink("l", "/x&y"));
        assert_eq!(
            emit(&root),
            "<root><f>a&lt;b&gt;&amp;c</f><l @=\"/x&amp;y\"/></root>"
        );
    }

    #[test]
    fn child_order_is_preserved() {
        let mut root = Node::new("root");
        for name in ["c", "a", "b"] {
            root.push_child(Node::leaf(name, ""));
        }
        assert_eq!(emit(&root), "<root><c/><a/><b/></root>");
    }

    #[test]
    fn round_trips_through_the_parser() {
        let raw = "<root><a><b>deep &amp; escaped</b></a><l @=\"/a/b\"/><empty/></root>";
        let tree = parse(raw).unwrap();
        assert_eq!(emit(&tree), raw);
        assert_eq!(parse(&emit(&tree)).unwrap(), tree);
    }

    #[test]
    fn emits_deep_chains_without_recursion() {
        let mut root = Node::new("root");
        let mut cursor = &mut root;
        for _ in 0..10_000 {
            cursor.push_child(Node::new("d"));
            cursor = &mut cursor.children[0];
        }
        cursor.self_closing = true;
        let raw = emit(&root);
        assert!(raw.starts_with("<root><d><d>"));
        assert!(raw.ends_with("</d></d></root>"));
    }
}
