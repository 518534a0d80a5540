//! Printable HTML context pack, for conversion to PDF by the client.

use chrono::{DateTime, Utc};

/// Questions every mentee should prepare regardless of topic.
const PREPARATION_QUESTIONS: &[&str] = &[
    "What specific outcome do you want from this session?",
    "What have you already tried?",
    "What constraints are you working with?",
];

/// Render a standalone HTML page. All caller text is escaped.
pub fn render_html(
    user_summary: &str,
    category: &str,
    mentors: &[String],
    generated_at: DateTime<Utc>,
) -> String {
    let mentor_items: String = mentors
        .iter()
        .map(|m| format!("<li><b>{}</b></li>", escape_html(m)))
        .collect();
    let question_items: String = PREPARATION_QUESTIONS
        .iter()
        .map(|q| format!("<li>{q}</li>"))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Mentor Context Pack</title></head>
<body style="font-family: Arial, sans-serif; padding: 40px; max-width: 800px; margin: auto;">
    <h1 style="color: #2563EB;">🎯 Mentor Context Pack</h1>
    <p style="color: #6B7280;">Generated on {date}</p>
    <hr>
    <h2>Problem Summary</h2>
    <p style="background: #F3F4F6; padding: 16px; border-radius: 8px;">{summary}</p>
    <h2>Category: {category}</h2>
    <h2>Recommended Mentors</h2>
    <ul>{mentor_items}</ul>
    <h2>Questions to Prepare</h2>
    <ul>{question_items}</ul>
    <hr>
    <p style="color: #9CA3AF; font-size: 12px;">Powered by ClarityOS | ExpertBells</p>
</body>
</html>
"#,
        date = generated_at.format("%B %d, %Y"),
        summary = escape_html(user_summary),
        category = escape_html(category),
    )
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn renders_sections() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
        let html = render_html(
            "Raising a seed round",
            "Fundraising",
            &["Ankur Warikoo".to_string(), "Pallav Nadhani".to_string()],
            at,
        );
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Generated on October 18, 2026"));
        assert!(html.contains("<h2>Category: Fundraising</h2>"));
        assert!(html.contains("<li><b>Ankur Warikoo</b></li><li><b>Pallav Nadhani</b></li>"));
        assert!(html.contains("<li>What have you already tried?</li>"));
    }

    #[test]
    fn caller_text_is_escaped() {
        let html = render_html(
            "<script>alert('x')</script>",
            "A & B",
            &["<img src=x>".to_string()],
            Utc::now(),
        );
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(html.contains("Category: A &amp; B"));
        assert!(html.contains("<b>&lt;img src=x&gt;</b>"));
    }

    #[test]
    fn empty_mentor_list() {
        let html = render_html("s", "General", &[], Utc::now());
        assert!(html.contains("<ul></ul>"));
    }
}
