//! Username and password validation as explicit predicates.
//!
//! spec.md's redesign flags call out the source's regex-based validation
//! (complete with an apparent typo in the digit class) as a pattern to
//! retire; the normative rule is the textual one, checked directly rather
//! than pattern-matched.

/// Symbols counted toward the password's "at least one symbol" rule.
/// Deliberately excludes whitespace and any other control character —
/// the source's flawed regex aside, control characters in a password are
/// never intentional input.
const SYMBOL_CHARS: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

const MIN_PASSWORD_LEN: usize = 8;

/// `local@domain.tld`: non-empty local part, a single `@`, a domain with
/// at least one `.` separating two non-empty labels. No whitespace or
/// control characters anywhere.
pub fn validate_username(username: &str) -> bool {
    if username.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return false;
    }
    let Some((local, domain)) = username.split_once('@') else { return false };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    if domain.contains('@') {
        return false;
    }
    let Some((label, tld)) = domain.rsplit_once('.') else { return false };
    !label.is_empty() && !tld.is_empty()
}

/// Length >= 8, contains at least one letter, one digit, and one symbol
/// from [`SYMBOL_CHARS`]. Control characters are rejected outright.
pub fn validate_password(password: &str) -> bool {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return false;
    }
    if password.chars().any(|c| c.is_control()) {
        return false;
    }
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| SYMBOL_CHARS.contains(c));
    has_letter && has_digit && has_symbol
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_email_shaped_username() {
        assert!(validate_username("alice@example.com"));
        assert!(validate_username("a.b+c@sub.example.co.uk"));
    }

    #[test]
    fn rejects_username_without_domain_dot() {
        assert!(!validate_username("alice@localhost"));
    }

    #[test]
    fn rejects_username_without_at() {
        assert!(!validate_username("alice.example.com"));
    }

    #[test]
    fn rejects_username_with_control_characters() {
        assert!(!validate_username("alice\n@example.com"));
    }

    #[test]
    fn accepts_password_meeting_every_class() {
        assert!(validate_password("Abcdef1!"));
    }

    #[test]
    fn rejects_password_too_short() {
        assert!(!validate_password("Ab1!"));
    }

    #[test]
    fn rejects_password_missing_symbol() {
        assert!(!validate_password("Abcdefg1"));
    }

    #[test]
    fn rejects_password_missing_digit() {
        assert!(!validate_password("Abcdefg!"));
    }

    #[test]
    fn rejects_password_missing_letter() {
        assert!(!validate_password("12345678!"));
    }
}
