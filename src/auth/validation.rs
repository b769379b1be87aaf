//! Input validation for registration and login

use std::sync::LazyLock;

use regex::Regex;

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 20;
pub const PASSWORD_MIN_CHARS: usize = 6;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Collect every registration violation; empty means valid.
pub fn validate_registration(username: &str, password: &str, email: &str) -> Vec<String> {
    let mut errors = Vec::new();

    let username_len = username.trim().chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&username_len) {
        errors.push(format!(
            "username must be between {} and {} characters",
            USERNAME_MIN_CHARS, USERNAME_MAX_CHARS
        ));
    }

    if password.chars().count() < PASSWORD_MIN_CHARS {
        errors.push(format!(
            "password must be at least {} characters",
            PASSWORD_MIN_CHARS
        ));
    }

    if !EMAIL_PATTERN.is_match(email.trim()) {
        errors.push("a valid email address is required".to_string());
    }

    errors
}

/// Login only checks presence; length rules would leak which accounts can exist.
pub fn validate_login(username: &str, password: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if username.trim().is_empty() {
        errors.push("username is required".to_string());
    }

    if password.trim().is_empty() {
        errors.push("password is required".to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_registration() {
        assert!(validate_registration("alice", "secret1", "alice@example.com").is_empty());
        assert!(validate_registration("  bob  ", "123456", "b@x.io").is_empty());
    }

    #[test]
    fn test_username_bounds() {
        assert_eq!(validate_registration("ab", "secret1", "a@b.co").len(), 1);
        assert_eq!(
            validate_registration(&"u".repeat(21), "secret1", "a@b.co").len(),
            1
        );
        assert!(validate_registration(&"u".repeat(20), "secret1", "a@b.co").is_empty());
        // Padding does not count toward the length
        assert_eq!(validate_registration("  ab  ", "secret1", "a@b.co").len(), 1);
    }

    #[test]
    fn test_password_too_short() {
        let errors = validate_registration("alice", "12345", "alice@example.com");
        assert_eq!(errors, vec!["password must be at least 6 characters"]);
    }

    #[test]
    fn test_malformed_emails() {
        for email in ["", "plain", "a@b", "a b@c.com", "@example.com", "a@@b.com"] {
            let errors = validate_registration("alice", "secret1", email);
            assert_eq!(errors, vec!["a valid email address is required"], "{email}");
        }
    }

    #[test]
    fn test_all_violations_reported_together() {
        let errors = validate_registration("ab", "123", "nope");
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_login_requires_both_fields() {
        assert!(validate_login("alice", "pw").is_empty());
        assert_eq!(validate_login("  ", "pw"), vec!["username is required"]);
        assert_eq!(validate_login("alice", ""), vec!["password is required"]);
    }
}
