//! Extraction of profile fields from the remote preferences page.
//!
//! Old wiki releases do not expose email or real name through the API, so the
//! rendered preferences form is scanned for the corresponding `<input>`
//! elements. Two generations of field names exist for each value.

use once_cell::sync::Lazy;
use regex::Regex;

/// `wpRealName` up to 1.15, `wprealname` from 1.16.
pub const REAL_NAME_FIELDS: [&str; 2] = ["wpRealName", "wprealname"];

/// `wpUserEmail` up to 1.15, `wpemailaddress` from 1.16.
pub const EMAIL_FIELDS: [&str; 2] = ["wpUserEmail", "wpemailaddress"];

static INPUT_TAG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?is)<input\b[^>]*>").ok());

static ATTRIBUTE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .ok()
});

/// Find the `value` of the first `<input>` whose `name` or `id` is one of
/// `field_names`, decoded. Falls back to a lenient `name ... value="..."`
/// match for markup that is not a well formed tag.
#[must_use]
pub fn input_value(html: &str, field_names: &[&str]) -> Option<String> {
    tag_value(html, field_names)
        .or_else(|| marker_value(html, field_names))
        .map(|raw| decode_value(&raw))
}

fn tag_value(html: &str, field_names: &[&str]) -> Option<String> {
    let input_tag = INPUT_TAG.as_ref()?;
    let attribute = ATTRIBUTE.as_ref()?;

    for tag in input_tag.find_iter(html) {
        let mut identified = false;
        let mut value = None;

        for captures in attribute.captures_iter(tag.as_str()) {
            let Some(key) = captures.get(1) else {
                continue;
            };
            let raw = captures
                .get(2)
                .or_else(|| captures.get(3))
                .or_else(|| captures.get(4))
                .map_or("", |m| m.as_str());

            match key.as_str().to_ascii_lowercase().as_str() {
                "name" | "id" if field_names.contains(&raw) => identified = true,
                "value" => value = Some(raw.to_string()),
                _ => {}
            }
        }

        if identified {
            if let Some(value) = value {
                return Some(value);
            }
        }
    }

    None
}

fn marker_value(html: &str, field_names: &[&str]) -> Option<String> {
    field_names.iter().find_map(|name| {
        let pattern = format!(r#"(?s){}[^>]*?value="([^"]*)""#, regex::escape(name));
        Regex::new(&pattern)
            .ok()?
            .captures(html)?
            .get(1)
            .map(|m| m.as_str().to_string())
    })
}

/// HTML entity decoding followed by backslash unescaping.
#[must_use]
pub fn decode_value(raw: &str) -> String {
    strip_slashes(&decode_html_entities(raw))
}

#[must_use]
pub fn decode_html_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];

        let decoded = candidate
            .find(';')
            .filter(|&end| end > 1 && end <= 10)
            .and_then(|end| decode_entity(&candidate[1..end]).map(|ch| (ch, end)));

        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(numeric) = entity.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }

    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

/// Remove one level of backslash escaping (`\'` → `'`, `\\` → `\`).
#[must_use]
pub fn strip_slashes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('\0'),
            Some(escaped) => out.push(escaped),
            None => {}
        }
    }

    out
}
