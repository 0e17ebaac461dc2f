use std::sync::LazyLock;

use regex::Regex;

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<?https?://[^\s<>"]+>?"#).unwrap());
static STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<?https?://[^\s<>]+>?").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Extract the links found in message text, in order of appearance.
/// Repeated links are kept; deduplication belongs to the ledger.
pub fn extract(text: &str) -> Vec<String> {
    LINK_RE
        .find_iter(text)
        .map(|m| normalize(m.as_str()))
        .filter(|url| !url.is_empty())
        .collect()
}

/// Drop `<...>` preview-suppression brackets, then trailing quotes, then
/// trailing `,` `.` and whitespace.
fn normalize(raw: &str) -> String {
    let url = raw.strip_prefix('<').unwrap_or(raw);
    let url = url.strip_suffix('>').unwrap_or(url);
    url.trim_end_matches(['"', '\''])
        .trim_end_matches(|c: char| c == ',' || c == '.' || c.is_whitespace())
        .to_string()
}

/// The message text with every link removed and whitespace collapsed.
pub fn remaining_text(text: &str) -> String {
    let stripped = STRIP_RE.replace_all(text, "");
    SPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brackets_and_trailing_punctuation() {
        assert_eq!(
            extract("Check <https://x.com/a>, and https://y.com/b."),
            vec!["https://x.com/a", "https://y.com/b"]
        );
    }

    #[test]
    fn no_links() {
        assert!(extract("no links here").is_empty());
        assert!(extract("ftp://files.example.com is not matched").is_empty());
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let text = "https://a.io then http://b.io and https://a.io again";
        assert_eq!(
            extract(text),
            vec!["https://a.io", "http://b.io", "https://a.io"]
        );
    }

    #[test]
    fn stops_at_quotes_and_angle_brackets() {
        assert_eq!(
            extract(r#"href="https://q.com/path" <b>https://r.com/x</b>"#),
            vec!["https://q.com/path", "https://r.com/x"]
        );
    }

    #[test]
    fn trailing_quotes_and_periods() {
        assert_eq!(extract("see 'https://s.com/p'"), vec!["https://s.com/p"]);
        assert_eq!(extract("wow https://t.com/..."), vec!["https://t.com/"]);
        // quotes are stripped before punctuation, once
        assert_eq!(extract("https://s.com/p'."), vec!["https://s.com/p'"]);
    }

    #[test]
    fn remaining_text_drops_links() {
        assert_eq!(
            remaining_text("Look   <https://x.com/a>\n at this https://y.com/b"),
            "Look at this"
        );
        assert_eq!(remaining_text("https://only.link"), "");
    }
}
