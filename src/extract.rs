//! Text extraction for uploaded files.

use std::sync::LazyLock;

use regex::Regex;

/// Extensions read as UTF-8 text.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv", "tsv", "json"];

const SUPPORTED: &str = "PDF, TXT, MD, MARKDOWN, CSV, TSV, JSON";

static UNSAFE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-]").expect("valid filename pattern"));

/// Turns uploaded bytes into text for the model.
///
/// Never fails: problems come back as a readable message in place of the text.
pub trait FileExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], filename: &str) -> String;
}

/// Extractor for PDFs and plain-text formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl FileExtractor for TextExtractor {
    fn extract(&self, bytes: &[u8], filename: &str) -> String {
        let ext = file_type(filename);
        if ext == "pdf" {
            return extract_pdf(bytes, filename);
        }
        if !TEXT_EXTENSIONS.contains(&ext.as_str()) {
            return format!("Unsupported file format: {filename}. Supported: {SUPPORTED}");
        }

        let text = String::from_utf8_lossy(bytes);
        if ext == "json"
            && let Ok(value) = serde_json::from_str::<serde_json::Value>(&text)
            && let Ok(pretty) = serde_json::to_string_pretty(&value)
        {
            return pretty;
        }
        text.into_owned()
    }
}

fn extract_pdf(bytes: &[u8], filename: &str) -> String {
    // pdf-extract panics on some malformed inputs.
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes));
    match result {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            tracing::warn!(filename, error = %e, "PDF extraction failed");
            format!("Error reading file: {e}")
        }
        Err(_) => {
            tracing::warn!(filename, "PDF extraction panicked");
            format!("Error reading file: {filename} is not a readable PDF")
        }
    }
}

/// Lowercased extension without the dot, or empty.
pub fn file_type(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// File stem with every character outside `[A-Za-z0-9_-]` replaced by `_`.
pub fn safe_stem(filename: &str) -> String {
    let stem = std::path::Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    let safe = UNSAFE_NAME_CHARS.replace_all(stem, "_").into_owned();
    if safe.is_empty() { "upload".to_string() } else { safe }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_text_formats() {
        let extractor = TextExtractor;
        assert_eq!(extractor.extract(b"# Deck\nMRR 10k", "deck.MD"), "# Deck\nMRR 10k");
        assert_eq!(
            extractor.extract(b"month,mrr\njan,10", "metrics.csv"),
            "month,mrr\njan,10"
        );
    }

    #[test]
    fn json_is_pretty_printed() {
        let text = TextExtractor.extract(br#"{"mrr":10}"#, "metrics.json");
        assert_eq!(text, "{\n  \"mrr\": 10\n}");
        // Invalid JSON still comes back as text.
        assert_eq!(TextExtractor.extract(b"{mrr", "m.json"), "{mrr");
    }

    #[test]
    fn invalid_utf8_is_lossy() {
        let text = TextExtractor.extract(&[b'o', b'k', 0xff], "notes.txt");
        assert_eq!(text, "ok\u{fffd}");
    }

    #[test]
    fn unsupported_format_is_a_message() {
        let text = TextExtractor.extract(b"PK\x03\x04", "deck.pptx");
        assert!(text.starts_with("Unsupported file format: deck.pptx."));
        assert!(text.contains("PDF"));
        assert!(text.contains("TXT"));
    }

    #[test]
    fn broken_pdf_is_a_message() {
        let text = TextExtractor.extract(b"%PDF-1.7 truncated", "deck.pdf");
        assert!(text.starts_with("Error reading file:"), "got: {text}");
    }

    #[test]
    fn file_type_and_stem() {
        assert_eq!(file_type("Deck.PDF"), "pdf");
        assert_eq!(file_type("README"), "");
        assert_eq!(safe_stem("Q3 metrics (final).csv"), "Q3_metrics__final_");
        assert_eq!(safe_stem("../../etc/passwd"), "passwd");
    }
}
