use crate::errors::{AppError, AppResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// A normalized email address. It is the only key a user's record is stored
/// under and is never verified, so holding the string is enough to claim the
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize_email(raw: &str) -> AppResult<Identity> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Please enter your email address".to_string()));
    }
    if !EMAIL_PATTERN.is_match(trimmed) {
        return Err(AppError::Validation("Please enter a valid email address".to_string()));
    }
    Ok(Identity(trimmed.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::normalize_email;

    #[test]
    fn trims_and_lowercases() {
        let identity = normalize_email("  Ada.Lovelace@Example.COM \n").expect("valid");
        assert_eq!(identity.as_str(), "ada.lovelace@example.com");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for raw in ["", "   ", "plain", "a@b", "a b@c.com", "@b.com", "a@@b.com"] {
            let error = normalize_email(raw).expect_err(raw);
            assert!(error.is_validation(), "{raw} should be a validation error");
        }
    }

    #[test]
    fn empty_input_has_its_own_message() {
        let error = normalize_email(" ").expect_err("empty");
        assert!(error.to_string().contains("enter your email"));
    }
}
