//! Lightweight structural view of a page module.
//!
//! This is not a TypeScript parser. A byte scanner tracks comments, string
//! and template literals, and brace depth well enough to tell which lines
//! start a top-level statement. Everything the rewriter needs (the import
//! block, the default export, and where the returned JSX ends) is located
//! from those lines. When an anchor cannot be found the caller gets `None`
//! and is expected to fail instead of guessing.

use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub start: usize,
    /// End of the line content, excluding the newline.
    pub end: usize,
    /// Offset of the next line (past the newline).
    pub next: usize,
    /// The scanner was at top level, outside any literal or comment, when
    /// this line began.
    pub top_level: bool,
    /// Brace depth when the line began, or `None` inside a comment,
    /// literal, or template substitution.
    pub depth: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    pub range: Range<usize>,
    pub specifier: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    CallToAction,
    ClosingMarkup,
}

/// Where the rendering block goes: before the line at `offset`, indented
/// with `indent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderAnchor {
    pub kind: AnchorKind,
    pub offset: usize,
    pub indent: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    pub directive_end: Option<usize>,
    pub imports: Vec<ImportStatement>,
    pub export_start: usize,
    pub export_end: usize,
    pub render_anchor: Option<RenderAnchor>,
}

impl PageLayout {
    /// Returns `None` when the module has no top-level default export.
    pub fn parse(text: &str) -> Option<Self> {
        let lines = scan_lines(text);
        let export_index = lines
            .iter()
            .position(|line| line.top_level && is_default_export(line_text(text, line)))?;
        let export_start = lines[export_index].start;
        let export_end = lines[export_index + 1..]
            .iter()
            .find(|line| line.top_level && !line_text(text, line).trim().is_empty())
            .map(|line| line.start)
            .unwrap_or(text.len());

        let directive_end = find_directive(text, &lines[..export_index]);
        let imports = collect_imports(text, &lines[..export_index]);
        let body: Vec<&SourceLine> = lines
            .iter()
            .skip(export_index)
            .take_while(|line| line.start < export_end)
            .collect();
        let render_anchor = find_render_anchor(text, &body);

        Some(Self {
            directive_end,
            imports,
            export_start,
            export_end,
            render_anchor,
        })
    }

    /// Offset just past the last import statement, or past the directive
    /// prologue when the module has no imports.
    pub fn import_insert_offset(&self) -> usize {
        self.imports
            .last()
            .map(|import| import.range.end)
            .or(self.directive_end)
            .unwrap_or(0)
    }

    pub fn imports_from(&self, specifier: &str) -> bool {
        self.imports
            .iter()
            .any(|import| import.specifier.as_deref() == Some(specifier))
    }
}

/// Offset of the line holding the main default export, if any.
pub fn find_default_export(text: &str) -> Option<usize> {
    scan_lines(text)
        .into_iter()
        .find(|line| line.top_level && is_default_export(line_text(text, line)))
        .map(|line| line.start)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Code { braces: u32 },
    Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Literal {
    None,
    Quote(u8),
    LineComment,
    BlockComment,
}

pub fn scan_lines(text: &str) -> Vec<SourceLine> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut stack = vec![Context::Code { braces: 0 }];
    let mut literal = Literal::None;
    let mut line_start = 0usize;
    let mut line_depth = Some(0u32);
    let mut index = 0usize;

    while index < bytes.len() {
        let byte = bytes[index];
        let next = bytes.get(index + 1).copied();

        if byte == b'\n' {
            lines.push(SourceLine {
                start: line_start,
                end: trim_cr(bytes, line_start, index),
                next: index + 1,
                top_level: line_depth == Some(0),
                depth: line_depth,
            });
            // plain quotes never span lines; an unmatched one is JSX text
            if matches!(literal, Literal::Quote(_) | Literal::LineComment) {
                literal = Literal::None;
            }
            line_start = index + 1;
            line_depth = match (literal, stack.as_slice()) {
                (Literal::None, [Context::Code { braces }]) => Some(*braces),
                _ => None,
            };
            index += 1;
            continue;
        }

        match literal {
            Literal::LineComment => {
                index += 1;
                continue;
            }
            Literal::BlockComment => {
                if byte == b'*' && next == Some(b'/') {
                    literal = Literal::None;
                    index += 2;
                } else {
                    index += 1;
                }
                continue;
            }
            Literal::Quote(quote) => {
                if byte == b'\\' && next != Some(b'\n') {
                    index += 2;
                } else {
                    if byte == quote {
                        literal = Literal::None;
                    }
                    index += 1;
                }
                continue;
            }
            Literal::None => {}
        }

        let top = stack.len() - 1;
        match stack[top] {
            Context::Template => match byte {
                b'\\' if next != Some(b'\n') => index += 2,
                b'`' => {
                    stack.pop();
                    index += 1;
                }
                b'$' if next == Some(b'{') => {
                    stack.push(Context::Code { braces: 0 });
                    index += 2;
                }
                _ => index += 1,
            },
            Context::Code { braces } => {
                match byte {
                    b'/' if next == Some(b'/') => literal = Literal::LineComment,
                    b'/' if next == Some(b'*') => {
                        literal = Literal::BlockComment;
                        index += 1;
                    }
                    b'\'' | b'"' if !follows_word(bytes, index) => literal = Literal::Quote(byte),
                    b'`' => stack.push(Context::Template),
                    b'{' => stack[top] = Context::Code { braces: braces + 1 },
                    b'}' if braces == 0 && stack.len() > 1 => {
                        stack.pop();
                    }
                    b'}' => {
                        stack[top] = Context::Code {
                            braces: braces.saturating_sub(1),
                        }
                    }
                    _ => {}
                }
                index += 1;
            }
        }
    }

    if line_start < bytes.len() {
        lines.push(SourceLine {
            start: line_start,
            end: trim_cr(bytes, line_start, bytes.len()),
            next: bytes.len(),
            top_level: line_depth == Some(0),
            depth: line_depth,
        });
    }
    lines
}

fn trim_cr(bytes: &[u8], start: usize, end: usize) -> usize {
    if end > start && bytes[end - 1] == b'\r' {
        end - 1
    } else {
        end
    }
}

/// A quote directly after a word character is an apostrophe in JSX text
/// ("Florida's"), not the start of a string literal.
fn follows_word(bytes: &[u8], index: usize) -> bool {
    index > 0 && {
        let previous = bytes[index - 1];
        previous.is_ascii_alphanumeric() || previous == b'_' || previous >= 0x80
    }
}

pub fn line_text<'a>(text: &'a str, line: &SourceLine) -> &'a str {
    &text[line.start..line.end]
}

/// Any top-level `export default ...` marks the page export. Whether the
/// rewriter can anchor into it is decided later.
fn is_default_export(line: &str) -> bool {
    let mut words = line.split_whitespace();
    words.next() == Some("export")
        && words
            .next()
            .is_some_and(|word| word == "default" || word.starts_with("default;"))
}

fn find_directive(text: &str, lines: &[SourceLine]) -> Option<usize> {
    let mut end = None;
    for line in lines {
        let trimmed = line_text(text, line).trim();
        if trimmed.is_empty() {
            continue;
        }
        if line.top_level && is_directive(trimmed) {
            end = Some(line.next);
            continue;
        }
        break;
    }
    end
}

fn is_directive(trimmed: &str) -> bool {
    let body = trimmed.trim_end_matches(';');
    ["'use ", "\"use "]
        .iter()
        .any(|prefix| body.starts_with(prefix))
        && (body.ends_with('\'') || body.ends_with('"'))
}

fn collect_imports(text: &str, lines: &[SourceLine]) -> Vec<ImportStatement> {
    let mut imports = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if !line.top_level || !is_import(line_text(text, line).trim_start()) {
            continue;
        }
        let end = lines[index + 1..]
            .iter()
            .find(|candidate| candidate.top_level)
            .map(|candidate| candidate.start)
            .unwrap_or_else(|| lines.last().map(|last| last.next).unwrap_or(line.next));
        let statement = &text[line.start..end];
        imports.push(ImportStatement {
            range: line.start..end,
            specifier: last_quoted(statement),
        });
    }
    imports
}

fn is_import(trimmed: &str) -> bool {
    trimmed
        .strip_prefix("import")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|next| next.is_whitespace() || matches!(next, '{' | '\'' | '"' | '*'))
}

fn last_quoted(statement: &str) -> Option<String> {
    let close = statement.rfind(['\'', '"'])?;
    let quote = statement.as_bytes()[close] as char;
    let open = statement[..close].rfind(quote)?;
    Some(statement[open + 1..close].to_string())
}

fn indent_of(line: &str) -> &str {
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}

fn find_render_anchor(text: &str, body: &[&SourceLine]) -> Option<RenderAnchor> {
    // The component's own return sits directly in the function body.
    // Returns from callbacks inside the markup are deeper.
    let return_index = body
        .iter()
        .rposition(|line| line.depth == Some(1) && is_return_line(line_text(text, line)))?;
    let close_index = body
        .iter()
        .rposition(|line| line.depth == Some(1) && is_return_close(line_text(text, line)))
        .filter(|index| *index > return_index)
        .unwrap_or(body.len());
    let closing_index = (return_index..close_index)
        .rev()
        .find(|index| is_closing_markup(line_text(text, body[*index])))?;
    if closing_index == return_index {
        return None;
    }

    let root_index = (return_index..closing_index)
        .find(|index| line_text(text, body[*index]).contains('<'))?;
    let child_indent = body[root_index + 1..closing_index]
        .iter()
        .map(|line| line_text(text, line))
        .find(|line| !line.trim().is_empty())
        .map(indent_of);
    let closing_line = line_text(text, body[closing_index]);

    if let Some(child_indent) = child_indent {
        let cta_index = (root_index + 1..closing_index).rev().find(|index| {
            let line = line_text(text, body[*index]);
            indent_of(line) == child_indent && opens_call_to_action(line.trim())
        });
        if let Some(mut index) = cta_index {
            while index > root_index + 1 {
                let previous = line_text(text, body[index - 1]);
                if indent_of(previous) == child_indent && is_jsx_comment(previous.trim()) {
                    index -= 1;
                } else {
                    break;
                }
            }
            return Some(RenderAnchor {
                kind: AnchorKind::CallToAction,
                offset: body[index].start,
                indent: child_indent.to_string(),
            });
        }
    }

    let indent = child_indent
        .filter(|child| child.len() > indent_of(closing_line).len())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}  ", indent_of(closing_line)));
    Some(RenderAnchor {
        kind: AnchorKind::ClosingMarkup,
        offset: body[closing_index].start,
        indent,
    })
}

fn is_return_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed
        .strip_prefix("return")
        .is_some_and(|rest| rest.trim_start().starts_with(['(', '<']))
}

fn is_return_close(line: &str) -> bool {
    matches!(line.trim(), ")" | ");")
}

fn is_closing_markup(line: &str) -> bool {
    let trimmed = line.trim().trim_end_matches(';').trim_end_matches(')');
    let Some(inner) = trimmed
        .strip_prefix("</")
        .and_then(|rest| rest.strip_suffix('>'))
    else {
        return false;
    };
    inner
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_' | ':'))
}

fn is_jsx_comment(trimmed: &str) -> bool {
    trimmed.starts_with("{/*")
}

fn opens_call_to_action(trimmed: &str) -> bool {
    if is_jsx_comment(trimmed) {
        let lower = trimmed.to_ascii_lowercase();
        return has_token(&lower, "cta")
            || lower.contains("call to action")
            || lower.contains("call-to-action");
    }
    let Some(rest) = trimmed.strip_prefix('<') else {
        return false;
    };
    if rest.starts_with('/') {
        return false;
    }
    let tag: String = rest
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_'))
        .collect();
    let tag_lower = tag.to_ascii_lowercase();
    if tag_lower.contains("cta") || tag_lower.contains("calltoaction") {
        return true;
    }
    ["className=", "id="].iter().any(|attribute| {
        attribute_value(trimmed, attribute)
            .is_some_and(|value| has_token(&value.to_ascii_lowercase(), "cta"))
    })
}

fn attribute_value<'a>(line: &'a str, attribute: &str) -> Option<&'a str> {
    let start = line.find(attribute)? + attribute.len();
    let rest = &line[start..];
    let quote = rest.chars().next().filter(|ch| matches!(ch, '"' | '\''))?;
    let value = &rest[1..];
    let end = value.find(quote)?;
    Some(&value[..end])
}

fn has_token(haystack: &str, token: &str) -> bool {
    haystack
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .any(|word| word == token)
}

#[cfg(test)]
mod tests {
    use super::{AnchorKind, PageLayout, find_default_export, scan_lines};

    const WITH_CTA: &str = r#"'use client';

import Link from 'next/link';
import {
  Schema,
  Breadcrumbs,
} from '@/components/seo';

export const metadata = { title: 'Storm Damage' };

export default function StormPage() {
  const year = `${new Date().getFullYear()}`;
  return (
    <main className="page">
      <section>
        <p>Florida's storms don't wait {year}.</p>
      </section>

      {/* CTA Section */}
      <section className="cta-band bg-blue-900">
        <Link href="/contact">Call us</Link>
      </section>
    </main>
  );
}
"#;

    #[test]
    fn parses_directive_imports_and_export() {
        let layout = PageLayout::parse(WITH_CTA).expect("layout");
        assert_eq!(layout.imports.len(), 2);
        assert_eq!(layout.imports[0].specifier.as_deref(), Some("next/link"));
        assert_eq!(layout.imports[1].specifier.as_deref(), Some("@/components/seo"));
        assert!(WITH_CTA[layout.imports[1].range.clone()].ends_with("from '@/components/seo';\n"));
        assert_eq!(
            &WITH_CTA[layout.import_insert_offset()..layout.import_insert_offset() + 1],
            "\n"
        );
        assert!(WITH_CTA[layout.export_start..].starts_with("export default function StormPage"));
        assert!(layout.directive_end.is_some());
        assert!(layout.imports_from("next/link"));
    }

    #[test]
    fn anchors_on_call_to_action_comment() {
        let layout = PageLayout::parse(WITH_CTA).expect("layout");
        let anchor = layout.render_anchor.expect("anchor");
        assert_eq!(anchor.kind, AnchorKind::CallToAction);
        assert_eq!(anchor.indent, "      ");
        assert!(WITH_CTA[anchor.offset..].starts_with("      {/* CTA Section */}"));
    }

    #[test]
    fn falls_back_to_closing_markup() {
        let text = "export default function Page() {\n  return (\n    <main>\n      <h1>Roofing</h1>\n    </main>\n  );\n}\n";
        let layout = PageLayout::parse(text).expect("layout");
        let anchor = layout.render_anchor.as_ref().expect("anchor");
        assert_eq!(anchor.kind, AnchorKind::ClosingMarkup);
        assert_eq!(anchor.indent, "      ");
        assert!(text[anchor.offset..].starts_with("    </main>"));
        assert_eq!(layout.import_insert_offset(), 0);
    }

    #[test]
    fn nested_cta_button_is_not_a_trailing_section() {
        let text = "export default function Page() {\n  return (\n    <main>\n      <section>\n        <a className=\"cta\">Go</a>\n      </section>\n    </main>\n  );\n}\n";
        let layout = PageLayout::parse(text).expect("layout");
        let anchor = layout.render_anchor.expect("anchor");
        assert_eq!(anchor.kind, AnchorKind::ClosingMarkup);
    }

    #[test]
    fn component_cta_tag_is_detected() {
        let text = "export default async function Page() {\n  return (\n    <>\n      <Hero />\n      <FinalCTASection />\n    </>\n  );\n}\n";
        let layout = PageLayout::parse(text).expect("layout");
        let anchor = layout.render_anchor.expect("anchor");
        assert_eq!(anchor.kind, AnchorKind::CallToAction);
        assert!(text[anchor.offset..].starts_with("      <FinalCTASection />"));
    }

    #[test]
    fn missing_markup_has_no_anchor() {
        let text = "export default function Page() {\n  return null;\n}\n";
        let layout = PageLayout::parse(text).expect("layout");
        assert!(layout.render_anchor.is_none());
    }

    #[test]
    fn nested_default_export_text_is_ignored() {
        let text = "const doc = `\nexport default function Fake() {}\n`;\n";
        assert!(find_default_export(text).is_none());
        let text = "// export default function Commented() {}\n";
        assert!(find_default_export(text).is_none());
    }

    #[test]
    fn callback_return_inside_markup_is_not_the_page_return() {
        let text = r#"export default function Page() {
  const items = ['Roofs', 'Windows'];
  return (
    <main>
      <ul>
        {items.map((item) => {
          return (
            <li key={item}>{item}</li>
          );
        })}
      </ul>
      <section className="cta">
        <a href="/contact">Call us</a>
      </section>
    </main>
  );
}
"#;
        let layout = PageLayout::parse(text).expect("layout");
        let anchor = layout.render_anchor.expect("anchor");
        assert_eq!(anchor.kind, AnchorKind::CallToAction);
        assert_eq!(anchor.indent, "      ");
        assert!(text[anchor.offset..].starts_with("      <section className=\"cta\">"));
    }

    #[test]
    fn early_guard_return_is_skipped() {
        let text = "export default function Page({ ready }) {\n  if (!ready) {\n    return (\n      <p>Loading</p>\n    );\n  }\n  return (\n    <main>\n      <h1>Roofing</h1>\n    </main>\n  );\n}\n";
        let layout = PageLayout::parse(text).expect("layout");
        let anchor = layout.render_anchor.expect("anchor");
        assert_eq!(anchor.kind, AnchorKind::ClosingMarkup);
        assert!(text[anchor.offset..].starts_with("    </main>"));
    }

    #[test]
    fn block_bodied_arrow_export_is_anchored() {
        let text = "export default async () => {\n  return (\n    <main>\n      <h1>Roofing</h1>\n    </main>\n  );\n};\n";
        let layout = PageLayout::parse(text).expect("layout");
        assert_eq!(layout.export_start, 0);
        let anchor = layout.render_anchor.expect("anchor");
        assert!(text[anchor.offset..].starts_with("    </main>"));
    }

    #[test]
    fn exported_identifier_has_no_anchor() {
        let text = "const Page = () => <main>Roofing</main>;\n\nexport default Page;\n";
        assert!(find_default_export(text).is_some());
        let layout = PageLayout::parse(text).expect("layout");
        assert!(layout.render_anchor.is_none());
    }

    #[test]
    fn braces_inside_strings_do_not_change_depth() {
        let text = "const a = '{';\nconst b = \"}}\";\nexport default function P() {}\n";
        let lines = scan_lines(text);
        assert!(lines.iter().all(|line| line.top_level));
        assert!(lines.iter().all(|line| line.depth == Some(0)));
    }
}
