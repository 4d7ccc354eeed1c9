//! Display markup to markdown.
//!
//! Walks a parsed [`Tree`] and writes the markdown a person would have typed
//! for it. Covers the block and inline elements CommonMark renders; anything
//! else contributes its content only.

use scribe_markup::{NodeId, NodeKind, Tree};

/// Write the whole tree as markdown, trimmed.
pub fn write(tree: &Tree, bullet: char) -> String {
    let writer = Writer { tree, bullet };
    writer
        .blocks(tree.children(tree.root()))
        .join("\n\n")
        .trim()
        .to_string()
}

struct Writer<'a> {
    tree: &'a Tree,
    bullet: char,
}

impl Writer<'_> {
    /// Render a list of siblings as markdown blocks. Runs of inline content
    /// between block elements become paragraphs.
    fn blocks(&self, nodes: &[NodeId]) -> Vec<String> {
        let mut blocks = Vec::new();
        let mut run = Inline::default();

        for &node in nodes {
            match self.tree.tag(node) {
                Some(tag) if is_block(tag) => {
                    run.flush_into(&mut blocks);
                    if let Some(block) = self.block(node, tag) {
                        blocks.push(block);
                    }
                },
                _ => self.inline(node, &mut run),
            }
        }

        run.flush_into(&mut blocks);
        blocks
    }

    fn block(&self, node: NodeId, tag: &str) -> Option<String> {
        let children = self.tree.children(node);
        let text = match tag {
            "p" | "div" => self.blocks(children).join("\n\n"),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                let mut run = Inline::default();
                for &child in children {
                    self.inline(child, &mut run);
                }
                format!("{} {}", "#".repeat(level), run.text.trim())
            },
            "blockquote" => {
                let inner = self.blocks(children).join("\n\n");
                inner
                    .lines()
                    .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {line}") })
                    .collect::<Vec<_>>()
                    .join("\n")
            },
            "ul" | "ol" => self.list(node, tag == "ol"),
            "pre" => self.code_block(node),
            "hr" => "***".to_string(),
            _ => self.blocks(children).join("\n\n"),
        };

        (!text.trim().is_empty()).then_some(text)
    }

    fn list(&self, node: NodeId, ordered: bool) -> String {
        let start = attribute(self.tree, node, "start")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(1);

        let items = self
            .tree
            .children(node)
            .iter()
            .filter(|&&child| self.tree.tag(child) == Some("li"));

        let mut lines = Vec::new();
        for (i, &item) in items.enumerate() {
            let marker = if ordered {
                format!("{}.", start + i)
            } else {
                self.bullet.to_string()
            };
            let indent = " ".repeat(marker.len() + 1);
            let body = self.blocks(self.tree.children(item)).join("\n\n");

            let mut body_lines = body.lines();
            lines.push(format!("{marker} {}", body_lines.next().unwrap_or_default()));
            for line in body_lines {
                if line.is_empty() {
                    lines.push(String::new());
                } else {
                    lines.push(format!("{indent}{line}"));
                }
            }
        }
        lines.join("\n")
    }

    fn code_block(&self, node: NodeId) -> String {
        let language = self
            .tree
            .children(node)
            .iter()
            .find(|&&child| self.tree.tag(child) == Some("code"))
            .and_then(|&code| attribute(self.tree, code, "class"))
            .and_then(|class| class.strip_prefix("language-"))
            .unwrap_or_default();

        let code = self.tree.flatten_node(node);
        format!("```{language}\n{}\n```", code.trim_end_matches('\n'))
    }

    fn inline(&self, node: NodeId, run: &mut Inline) {
        let tree = self.tree;
        match tree.node(node).kind() {
            NodeKind::Root => {},
            NodeKind::Text { value, .. } => run.push_text(value),
            NodeKind::Element { tag, .. } => match tag.as_str() {
                "strong" | "b" => self.wrapped(node, "**", run),
                "em" | "i" => self.wrapped(node, "*", run),
                "del" | "s" => self.wrapped(node, "~~", run),
                "code" => {
                    let code = tree.flatten_node(node);
                    run.push_raw("`");
                    run.push_raw(&code);
                    run.push_raw("`");
                },
                "br" => run.push_raw("\\\n"),
                "img" => {
                    let alt = attribute(tree, node, "alt").unwrap_or_default();
                    let src = attribute(tree, node, "src").unwrap_or_default();
                    run.push_raw(&format!("![{alt}]({src})"));
                },
                "a" => {
                    let href = attribute(tree, node, "href").unwrap_or_default();
                    run.push_raw("[");
                    for &child in tree.children(node) {
                        self.inline(child, run);
                    }
                    match attribute(tree, node, "title") {
                        Some(title) => run.push_raw(&format!("]({href} \"{title}\")")),
                        None => run.push_raw(&format!("]({href})")),
                    }
                },
                _ => {
                    for &child in tree.children(node) {
                        self.inline(child, run);
                    }
                },
            },
        }
    }

    fn wrapped(&self, node: NodeId, marker: &str, run: &mut Inline) {
        let mut inner = Inline::default();
        for &child in self.tree.children(node) {
            self.inline(child, &mut inner);
        }
        if inner.text.trim().is_empty() {
            run.push_raw(&inner.text);
            return;
        }
        run.push_raw(marker);
        run.push_raw(&inner.text);
        run.push_raw(marker);
    }
}

/// Inline markdown being accumulated for one paragraph.
#[derive(Default)]
struct Inline {
    text: String,
}

impl Inline {
    /// Append text content, escaping markdown syntax.
    fn push_text(&mut self, value: &str) {
        // A hard break already ended the line
        let value = if self.text.ends_with('\n') {
            value.trim_start_matches('\n')
        } else {
            value
        };
        for ch in value.chars() {
            if matches!(ch, '\\' | '*' | '_' | '`') {
                self.text.push('\\');
            }
            self.text.push(ch);
        }
    }

    fn push_raw(&mut self, value: &str) {
        self.text.push_str(value);
    }

    fn flush_into(&mut self, blocks: &mut Vec<String>) {
        let text = std::mem::take(&mut self.text);
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            blocks.push(trimmed.to_string());
        }
    }
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "blockquote"
            | "ul"
            | "ol"
            | "li"
            | "pre"
            | "hr"
    )
}

fn attribute<'a>(tree: &'a Tree, node: NodeId, name: &str) -> Option<&'a str> {
    tree.node(node)
        .attributes()
        .iter()
        .find(|a| a.name.as_str() == name)
        .map(|a| a.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_markup::parse;

    fn markdown(markup: &str) -> String {
        write(&parse(markup), '-')
    }

    #[test]
    fn writes_inline_formatting() {
        assert_eq!(
            markdown("<p>a <strong>b</strong> <em>c</em> <del>d</del> <code>e*f</code></p>"),
            "a **b** *c* ~~d~~ `e*f`"
        );
    }

    #[test]
    fn escapes_markdown_syntax_in_text() {
        assert_eq!(markdown("<p>2 * 3 = my_var</p>"), "2 \\* 3 = my\\_var");
    }

    #[test]
    fn writes_hard_breaks() {
        assert_eq!(markdown("<p>a<br />\nb</p>"), "a\\\nb");
    }

    #[test]
    fn drops_empty_emphasis() {
        assert_eq!(markdown("<p>a<strong></strong>b</p>"), "ab");
    }

    #[test]
    fn writes_nested_lists_and_quotes() {
        assert_eq!(
            markdown("<ul><li>one<ul><li>inner</li></ul></li><li>two</li></ul>"),
            "- one\n\n  - inner\n- two"
        );
        assert_eq!(
            markdown("<blockquote><p>a</p><p>b</p></blockquote>"),
            "> a\n>\n> b"
        );
    }

    #[test]
    fn writes_ordered_list_from_start() {
        assert_eq!(
            markdown("<ol start=\"3\"><li>c</li><li>d</li></ol>"),
            "3. c\n4. d"
        );
    }

    #[test]
    fn loose_inline_content_becomes_paragraphs() {
        assert_eq!(markdown("loose <em>text</em><p>para</p>tail"), "loose *text*\n\npara\n\ntail");
    }
}
