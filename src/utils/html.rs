// src/utils/html.rs

/// Clean author-supplied rich text (question text, explanations, quiz
/// descriptions) using ammonia's whitelist: safe tags like <b> or <p> stay,
/// <script>, <iframe> and event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

pub fn clean_optional(input: Option<String>) -> Option<String> {
    input.map(|text| clean_html(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_scripts_keeps_formatting() {
        let cleaned = clean_html("<b>Bold</b><script>alert(1)</script>");
        assert_eq!(cleaned, "<b>Bold</b>");
    }

    #[test]
    fn test_strips_event_handlers() {
        let cleaned = clean_html(r#"<p onclick="steal()">Hi</p>"#);
        assert_eq!(cleaned, "<p>Hi</p>");
    }

    #[test]
    fn test_optional_passthrough() {
        assert_eq!(clean_optional(None), None);
        assert_eq!(clean_optional(Some("plain".into())), Some("plain".into()));
    }
}
