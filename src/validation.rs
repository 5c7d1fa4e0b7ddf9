use once_cell::sync::Lazy;
use regex::Regex;

pub fn is_ascii_no_spaces(username: &str) -> Result<(), String> {
    if username.chars().all(|c| c.is_ascii() && !c.is_whitespace()) {
        Ok(())
    } else {
        Err("should be an ascii string without spaces".to_string())
    }
}

// RFC 5322-ish; matches lowercase addresses only, so normalize before
// validating.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*|"(?:[\x01-\x08\x0b\x0c\x0e-\x1f\x21\x23-\x5b\x5d-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])*")@(?:(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?|\[(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?|[a-z0-9-]*[a-z0-9]:(?:[\x01-\x08\x0b\x0c\x0e-\x1f\x21-\x5a\x53-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])+)\])"#,
    )
    .unwrap()
});

pub fn is_valid_email(string: &str) -> Result<(), String> {
    if EMAIL_RE.is_match(string) {
        Ok(())
    } else {
        Err("invalid email".to_string())
    }
}

/// Slugs form the event's public URL handle: lowercase ascii letters, digits,
/// hyphens and underscores, between 1 and 64 characters.
pub fn is_valid_slug(string: &str) -> Result<(), String> {
    if string.is_empty() || string.len() > 64 {
        return Err("slug must be between 1 and 64 characters".to_string());
    }
    let ok = string.chars().all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'
    });
    if ok {
        Ok(())
    } else {
        Err("slug may only contain lowercase letters, digits, '-' and '_'"
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_emails() {
        assert!(is_valid_email("hello@example.com").is_ok());
        assert!(is_valid_email("not-an-email").is_err());
    }

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("spring-hack-2026").is_ok());
        assert!(is_valid_slug("Spring").is_err());
        assert!(is_valid_slug("has space").is_err());
        assert!(is_valid_slug("").is_err());
    }
}
