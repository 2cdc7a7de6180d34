//! Parsed page snapshots and text helpers shared by the extractors.

use scraper::{ElementRef, Html, Node, Selector};

/// Read-only snapshot of a rendered page.
pub struct DocumentHandle {
    html: Html,
    url: String,
}

impl DocumentHandle {
    pub fn parse(html: &str, url: impl Into<String>) -> Self {
        Self {
            html: Html::parse_document(html),
            url: url.into(),
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// URL the snapshot was taken from.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentHandle").field("url", &self.url).finish()
    }
}

/// Visible text of an element: trimmed text nodes joined by newlines,
/// skipping script and style content.
pub fn element_text(element: &ElementRef) -> String {
    visible_text_nodes(element).collect::<Vec<_>>().join("\n")
}

/// Trimmed, non-empty text nodes under `element` that a browser would render.
pub fn visible_text_nodes<'a>(element: &ElementRef<'a>) -> impl Iterator<Item = &'a str> + 'a {
    element.descendants().filter_map(|node| {
        let text = match node.value() {
            Node::Text(text) => &**text,
            _ => return None,
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|el| el.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript" | "template"));
        let text = text.trim();
        (!hidden && !text.is_empty()).then_some(text)
    })
}

/// Compile configured selectors, dropping the ones that no longer parse.
pub fn compile_selectors(sources: &[String]) -> Vec<Selector> {
    sources
        .iter()
        .filter_map(|source| match Selector::parse(source) {
            Ok(selector) => Some(selector),
            Err(e) => {
                tracing::warn!(selector = %source, error = %e, "Ignoring invalid selector");
                None
            }
        })
        .collect()
}
