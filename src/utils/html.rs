//! Plain-text rendering of HTML task bodies.

/// Tags after which a line break is inserted.
const BLOCK_TAGS: &[&str] = &["br", "p", "div", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6"];

/// Tags whose content is dropped entirely.
const HIDDEN_TAGS: &[&str] = &["style", "script", "head", "title"];

const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&amp;", "&"),
];

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn decode_entities(text: &str) -> String {
    ENTITIES
        .iter()
        .fold(text.to_string(), |acc, (entity, replacement)| acc.replace(entity, replacement))
}

/// Strip markup from an HTML fragment.
///
/// Tags are removed, block-level tags become line breaks, common entities
/// are decoded, and runs of blank lines collapse. The result is trimmed.
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;
    let mut hidden: Option<String> = None;

    while let Some(start) = rest.find('<') {
        if hidden.is_none() {
            text.push_str(&rest[..start]);
        }
        let Some(end) = rest[start..].find('>') else {
            // Unterminated tag, keep it as text.
            if hidden.is_none() {
                text.push_str(&rest[start..]);
            }
            rest = "";
            break;
        };

        let raw = &rest[start + 1..start + end];
        let name = tag_name(raw);
        let closing = raw.starts_with('/');

        match &hidden {
            Some(open) if closing && *open == name => hidden = None,
            Some(_) => {}
            None if !closing && HIDDEN_TAGS.contains(&name.as_str()) => hidden = Some(name),
            None if BLOCK_TAGS.contains(&name.as_str()) && (closing || name == "br") => text.push('\n'),
            None => {}
        }

        rest = &rest[start + end + 1..];
    }
    if hidden.is_none() {
        text.push_str(rest);
    }

    let decoded = decode_entities(&text);
    let mut lines: Vec<&str> = Vec::new();
    for line in decoded.lines().map(str::trim_end) {
        if line.trim().is_empty() && lines.last().is_some_and(|l| l.trim().is_empty()) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}
