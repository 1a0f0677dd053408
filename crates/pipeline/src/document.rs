//! HTML document generation.
//!
//! Deterministic: identical input text yields an identical document.

/// Display name used when the text has no `Name:` line.
pub const FALLBACK_DISPLAY_NAME: &str = "Professional Resume";

const TOKEN_PREFIX_CHARS: usize = 8;
const TOKEN_SUFFIX: &str = "_NFT";
const TOKEN_MAX_BYTES: usize = 32;

/// A generated document plus the fields scraped from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub html: String,
    pub display_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
}

/// Value of the first trimmed line starting with `label`, e.g. `"Name:"`.
///
/// Lines whose value is empty are skipped; returns `None` when no line has one.
pub fn extract_label<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(label).map(str::trim).filter(|v| !v.is_empty()))
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn generate_document(text: &str) -> Document {
    let display_name = extract_label(text, "Name:")
        .unwrap_or(FALLBACK_DISPLAY_NAME)
        .to_string();
    let email = extract_label(text, "Email:").map(str::to_string);
    let phone = extract_label(text, "Phone:").map(str::to_string);
    let location = extract_label(text, "Location:").map(str::to_string);

    let contact = [&email, &phone, &location]
        .into_iter()
        .flatten()
        .map(|v| escape_html(v))
        .collect::<Vec<_>>()
        .join(" | ");

    let name = escape_html(&display_name);
    let body = escape_html(text.trim());

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{name} - Resume</title>
<style>
body {{ font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 40px; line-height: 1.6; color: #333; max-width: 800px; }}
.header {{ text-align: center; margin-bottom: 30px; border-bottom: 3px solid #2c3e50; padding-bottom: 20px; }}
.header h1 {{ color: #2c3e50; margin: 0 0 10px; font-size: 2.5em; }}
.contact-info {{ color: #7f8c8d; font-size: 1.1em; }}
.section h2 {{ color: #2c3e50; border-bottom: 2px solid #3498db; padding-bottom: 5px; font-size: 1.4em; }}
.content {{ white-space: pre-line; margin-left: 20px; }}
</style>
</head>
<body>
<div class="header">
<h1>{name}</h1>
<div class="contact-info">{contact}</div>
</div>
<div class="section">
<h2>Resume Content</h2>
<div class="content">{body}</div>
</div>
</body>
</html>
"#
    );

    Document {
        html,
        display_name,
        email,
        phone,
        location,
    }
}

/// Token name derived from a display name.
///
/// First 8 characters, spaces become `_`, anything outside `[A-Za-z0-9_]`
/// dropped, `_NFT` appended, capped at 32 bytes.
pub fn short_token_name(display_name: &str) -> String {
    let mut stem: String = display_name
        .chars()
        .take(TOKEN_PREFIX_CHARS)
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if stem.is_empty() {
        stem.push_str("Doc");
    }

    let mut name = stem + TOKEN_SUFFIX;
    // ASCII only at this point, so byte truncation is safe.
    name.truncate(TOKEN_MAX_BYTES);
    name
}
