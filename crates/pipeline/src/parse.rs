//! Scrapers for loosely-structured tool replies.

/// Outcome of looking for a document locator in a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Found(String),
    /// Nothing usable; carries the raw reply so the caller can report it.
    Unparseable(String),
}

impl Locator {
    pub fn found(self) -> Option<String> {
        match self {
            Locator::Found(url) => Some(url),
            Locator::Unparseable(_) => None,
        }
    }
}

/// Find the document URL in a conversion reply.
///
/// A JSON object's `url` field wins. Otherwise the first `https://` token of
/// the text is used. Replies that start with an error marker never yield a
/// locator, even when they mention a URL.
pub fn extract_locator(reply: &str) -> Locator {
    let trimmed = reply.trim();

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(trimmed) {
        if let Some(url) = map.get("url").and_then(|v| v.as_str()) {
            if is_url(url) {
                return Locator::Found(url.to_string());
            }
        }
        return Locator::Unparseable(reply.to_string());
    }

    if looks_like_error(trimmed) {
        return Locator::Unparseable(reply.to_string());
    }

    trimmed
        .split_whitespace()
        .find_map(|token| {
            let start = token.find("https://")?;
            let url = token[start..].trim_end_matches(|c: char| ".,;:)]}'\"".contains(c));
            is_url(url).then(|| url.to_string())
        })
        .map(Locator::Found)
        .unwrap_or_else(|| Locator::Unparseable(reply.to_string()))
}

fn is_url(candidate: &str) -> bool {
    (candidate.starts_with("https://") || candidate.starts_with("http://"))
        && candidate.len() > "https://".len()
}

fn looks_like_error(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.starts_with("error") || lower.starts_with("failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_url_field() {
        assert_eq!(
            extract_locator(r#"{"url":"https://storage.example/doc.pdf","size":12}"#),
            Locator::Found("https://storage.example/doc.pdf".into())
        );
    }

    #[test]
    fn json_without_url_is_unparseable() {
        assert!(matches!(
            extract_locator(r#"{"message":"queued"}"#),
            Locator::Unparseable(_)
        ));
    }

    #[test]
    fn url_scanned_from_free_text() {
        assert_eq!(
            extract_locator("PDF generated successfully: https://storage.example/a.pdf."),
            Locator::Found("https://storage.example/a.pdf".into())
        );
    }

    #[test]
    fn error_text_is_unparseable() {
        let reply = "Error calling tool server: see https://status.example";
        assert_eq!(extract_locator(reply), Locator::Unparseable(reply.into()));
        assert_eq!(
            extract_locator("PDF generation completed but no content returned").found(),
            None
        );
    }
}
