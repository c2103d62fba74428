//! Escaping for user text placed into HTML emails.

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

/// Keeps only characters valid in an email address for `mailto:` links.
pub fn email_href(email: &str) -> String {
    email.chars().filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-' | '@')).collect()
}

/// Digits, `+`, `-`, parentheses and spaces for `tel:` links.
pub fn tel_href(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' ')).collect()
}

/// Drops `javascript:` and `data:` URLs.
pub fn safe_url(url: &str) -> &str {
    let lower = url.trim().to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("data:") { "" } else { url }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(html_escape(r#"<b>"Tom" & 'Jerry'</b>"#), "&lt;b&gt;&quot;Tom&quot; &amp; &#039;Jerry&#039;&lt;/b&gt;");
    }

    #[test]
    fn filters_hrefs() {
        assert_eq!(email_href("jo\"><script>@x.com"), "joscript@x.com");
        assert_eq!(tel_href("+61 (8) 9271-2577; drop"), "+61 (8) 9271-2577 ");
        assert_eq!(safe_url(" JavaScript:alert(1)"), "");
        assert_eq!(safe_url("https://example.com"), "https://example.com");
    }
}
