//! Minimal XML helpers for flat SOAP payloads.
//!
//! Responses from the TV are small, flat, and use varying namespace
//! prefixes (`u:`, `s:`, none), so elements are matched on their local name
//! only. Only leaf elements (text content, no children) are returned.

use std::borrow::Cow;

/// Text of the first leaf element whose local name is `tag`.
pub fn find_text(doc: &str, tag: &str) -> Option<String> {
    leaves(doc)
        .find(|(name, _)| *name == tag)
        .map(|(_, text)| unescape(text).into_owned())
}

/// Text of every leaf element whose local name is `tag`, in document order.
pub fn find_all_text(doc: &str, tag: &str) -> Vec<String> {
    leaves(doc)
        .filter(|(name, _)| *name == tag)
        .map(|(_, text)| unescape(text).into_owned())
        .collect()
}

/// Build `<tag>text</tag>`, escaping the text.
pub fn element(tag: &str, text: &str) -> String {
    format!("<{tag}>{}</{tag}>", escape(text))
}

/// Escape the five predefined XML entities.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Resolve predefined and numeric character references.
///
/// Unknown references are kept verbatim.
pub fn unescape(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];
        let Some(semi) = after.find(';') else {
            out.push_str(after);
            return Cow::Owned(out);
        };

        let entity = &after[1..semi];
        match decode_entity(entity) {
            Some(c) => out.push(c),
            None => out.push_str(&after[..=semi]),
        }
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Iterate `(local_name, raw_text)` for every leaf element in `doc`.
fn leaves(doc: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        while let Some(offset) = doc[pos..].find('<') {
            let start = pos + offset;
            let close = start + doc[start..].find('>')?;
            pos = close + 1;

            let inner = &doc[start + 1..close];
            if inner.starts_with(['/', '?', '!']) {
                continue;
            }

            let self_closing = inner.ends_with('/');
            let name_end = inner
                .find(|c: char| c.is_whitespace() || c == '/')
                .unwrap_or(inner.len());
            let name = local_name(&inner[..name_end]);
            if self_closing {
                return Some((name, ""));
            }

            // A leaf is followed by text and then its own end tag.
            let text_end = pos + doc[pos..].find('<')?;
            if doc[text_end..].starts_with("</") {
                let end_close = text_end + doc[text_end..].find('>')?;
                let end_name = local_name(doc[text_end + 2..end_close].trim());
                if end_name == name {
                    let text = &doc[pos..text_end];
                    pos = end_close + 1;
                    return Some((name, text));
                }
            }
        }
        None
    })
}

fn local_name(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}
