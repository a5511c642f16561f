//! Allow-list HTML cleaning for chapter content.
//!
//! Only structural and inline formatting tags survive. Scripts, styles and
//! form controls are dropped together with their contents, other unknown
//! tags are unwrapped (their text is kept), and only a handful of safe
//! attributes are retained. Empty paragraphs left behind by site editors are
//! removed in the same pass.

use scraper::{ElementRef, Html, Node};

const ALLOWED_TAGS: &[&str] = &[
    "address", "article", "aside", "footer", "header", "h1", "h2", "h3", "h4", "h5", "h6",
    "hgroup", "main", "nav", "section", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "hr", "li", "ol", "p", "pre", "ul", "a", "abbr", "b", "bdi", "bdo", "br", "cite",
    "code", "data", "dfn", "em", "i", "kbd", "mark", "q", "rb", "rp", "rt", "rtc", "ruby", "s",
    "samp", "small", "span", "strong", "sub", "sup", "time", "u", "var", "wbr", "caption", "col",
    "colgroup", "table", "tbody", "td", "tfoot", "th", "thead", "tr",
];

// Dropped along with everything inside them.
const NON_TEXT_TAGS: &[&str] = &[
    "script", "style", "textarea", "option", "noscript", "template", "iframe", "object", "embed",
    "svg", "math", "head", "title",
];

const VOID_TAGS: &[&str] = &["br", "hr", "wbr", "col"];

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "ftp", "mailto", "tel"];

/// Sanitizes an HTML fragment.
pub fn sanitize_html(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    sanitize_children(parsed.root_element())
}

/// Sanitizes the children of `container`, excluding the container tag itself.
pub fn sanitize_children(container: ElementRef<'_>) -> String {
    let mut out = String::new();
    write_children(container, &mut out);
    out.trim().to_owned()
}

fn write_children(parent: ElementRef<'_>, out: &mut String) {
    for child in parent.children() {
        if let Some(element) = ElementRef::wrap(child) {
            write_element(element, out);
        } else if let Node::Text(text) = child.value() {
            escape_text(text, out);
        }
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if NON_TEXT_TAGS.contains(&name) {
        return;
    }
    if name == "p" && is_empty_paragraph(element) {
        return;
    }
    if !ALLOWED_TAGS.contains(&name) {
        write_children(element, out);
        return;
    }

    out.push('<');
    out.push_str(name);
    for (attr, value) in element.value().attrs() {
        if is_allowed_attribute(name, attr, value) {
            out.push(' ');
            out.push_str(attr);
            out.push_str("=\"");
            escape_attribute(value, out);
            out.push('"');
        }
    }
    out.push('>');

    if VOID_TAGS.contains(&name) {
        return;
    }
    write_children(element, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn is_allowed_attribute(tag: &str, attr: &str, value: &str) -> bool {
    match (tag, attr) {
        ("a", "href") => is_allowed_url(value),
        ("a", "name" | "target") => true,
        ("td" | "th", "colspan" | "rowspan") => true,
        ("data", "value") | ("time", "datetime") => true,
        (_, "dir" | "lang") => true,
        _ => false,
    }
}

fn is_allowed_url(value: &str) -> bool {
    let value = value.trim();
    match value.find(':') {
        // Relative reference, or a colon that only appears after a path
        // separator, query or fragment.
        None => true,
        Some(colon) if value[..colon].contains(['/', '?', '#']) => true,
        Some(colon) => {
            let scheme = value[..colon].to_ascii_lowercase();
            ALLOWED_SCHEMES.contains(&scheme.as_str())
        }
    }
}

/// A paragraph with no visible text and nothing but empty spans or breaks.
pub fn is_empty_paragraph(paragraph: ElementRef<'_>) -> bool {
    let has_text = paragraph.text().any(|text| !text.trim().is_empty());
    if has_text {
        return false;
    }
    paragraph
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .all(|child| matches!(child.value().name(), "span" | "br"))
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

/// Escapes `value` for use in both text and quoted attribute positions.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    escape_attribute(value, &mut out);
    out
}

fn escape_attribute(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}
