use similar::TextDiff;
use thiserror::Error;

use crate::source::{AnchorKind, PageLayout};
use crate::topics::Link;

pub const DEFAULT_COMPONENT_NAME: &str = "InternalLinks";
pub const DEFAULT_COMPONENT_IMPORT: &str = "@/components/InternalLinks";
pub const DEFAULT_LINKS_TITLE: &str = "Related Services";
pub const DEFAULT_LINKS_CONST: &str = "internalLinks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("no export found")]
    NoExport,
    #[error("could not find insertion point")]
    InsertionPointNotFound,
    #[error("insert verification failed")]
    VerificationFailed,
}

/// How the shared link component is imported and invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    pub name: String,
    pub import_path: String,
    pub title: String,
    pub links_const: String,
}

impl Default for ComponentSpec {
    fn default() -> Self {
        Self {
            name: DEFAULT_COMPONENT_NAME.to_string(),
            import_path: DEFAULT_COMPONENT_IMPORT.to_string(),
            title: DEFAULT_LINKS_TITLE.to_string(),
            links_const: DEFAULT_LINKS_CONST.to_string(),
        }
    }
}

impl ComponentSpec {
    pub fn import_line(&self) -> String {
        format!(
            "import {} from '{}';\n",
            self.name,
            escape_js(&self.import_path)
        )
    }

    pub fn links_const_block(&self, links: &[Link]) -> String {
        let mut block = format!("const {} = [\n", self.links_const);
        for link in links {
            block.push_str(&format!(
                "  {{ href: '{}', label: '{}' }},\n",
                escape_js(&link.href),
                escape_js(&link.label)
            ));
        }
        block.push_str("];\n\n");
        block
    }

    pub fn render_line(&self, indent: &str) -> String {
        format!(
            "{indent}<{} title=\"{}\" links={{{}}} />\n",
            self.name,
            escape_jsx_attribute(&self.title),
            self.links_const
        )
    }

    /// Text whose presence proves the rendering block landed.
    pub fn render_marker(&self) -> String {
        format!("<{} ", self.name)
    }
}

/// Splice the import, the links constant, and the rendering block into a
/// page. Nothing is returned unless every insertion point was found and
/// the result verifies.
pub fn rewrite_page(
    text: &str,
    links: &[Link],
    component: &ComponentSpec,
) -> Result<String, RewriteError> {
    let layout = PageLayout::parse(text).ok_or(RewriteError::NoExport)?;
    let anchor = layout
        .render_anchor
        .as_ref()
        .ok_or(RewriteError::InsertionPointNotFound)?;

    let mut render = component.render_line(&anchor.indent);
    if anchor.kind == AnchorKind::CallToAction {
        render.push('\n');
    }

    // Insertions are applied back to front so earlier offsets stay valid.
    let mut insertions = vec![
        (anchor.offset, render),
        (layout.export_start, component.links_const_block(links)),
    ];
    if !layout.imports_from(&component.import_path) {
        let offset = layout.import_insert_offset();
        let mut import = component.import_line();
        if offset == 0 && !text.starts_with("import") {
            import.push('\n');
        }
        insertions.push((offset, import));
    }
    insertions.sort_by(|left, right| right.0.cmp(&left.0));

    let mut output = text.to_string();
    for (offset, snippet) in insertions {
        if offset > output.len() || !output.is_char_boundary(offset) {
            return Err(RewriteError::InsertionPointNotFound);
        }
        output.insert_str(offset, &snippet);
    }

    verify(text, &output, component)?;
    Ok(output)
}

fn verify(original: &str, output: &str, component: &ComponentSpec) -> Result<(), RewriteError> {
    let marker = component.render_marker();
    let declaration = format!("const {} = [", component.links_const);
    if declares(original, &component.links_const)
        || output == original
        || output.matches(&marker).count() != original.matches(&marker).count() + 1
        || !output.contains(&declaration)
    {
        return Err(RewriteError::VerificationFailed);
    }
    match PageLayout::parse(output) {
        Some(layout) if layout.imports_from(&component.import_path) => Ok(()),
        _ => Err(RewriteError::VerificationFailed),
    }
}

/// True when `text` already binds `name` with `const`, `let`, or `var`.
fn declares(text: &str, name: &str) -> bool {
    let is_ident = |ch: char| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$';
    ["const", "let", "var"].iter().any(|keyword| {
        let needle = format!("{keyword} {name}");
        text.match_indices(&needle).any(|(start, _)| {
            let before = text[..start].chars().next_back();
            let after = text[start + needle.len()..].chars().next();
            before.is_none_or(|ch| !is_ident(ch)) && after.is_none_or(|ch| !is_ident(ch))
        })
    })
}

/// Unified diff of a rewrite, for dry-run previews.
pub fn unified_diff(relative_path: &str, before: &str, after: &str) -> String {
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(2)
        .header(&format!("a/{relative_path}"), &format!("b/{relative_path}"))
        .to_string()
}

fn escape_js(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_jsx_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
