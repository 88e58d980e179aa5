//! Per-type credential validation rules (spec §4.4 "Validation rules by type").

use meshcore_core::errors::CredentialError;
use meshcore_core::models::CredentialType;
use regex::Regex;
use std::sync::OnceLock;

fn api_key_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]+$").unwrap())
}

fn has_upper(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_uppercase())
}
fn has_lower(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_lowercase())
}
fn has_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}
fn has_punct(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_punctuation())
}

/// Strong-password rule: ≥12 chars, ≥1 upper, ≥1 lower, ≥1 digit, ≥1 punct.
pub fn is_strong_password(password: &str, min_length: usize) -> bool {
    password.len() >= min_length
        && has_upper(password)
        && has_lower(password)
        && has_digit(password)
        && has_punct(password)
}

pub fn validate_api_key(value: &str) -> Result<(), CredentialError> {
    if value.len() < 12 || !api_key_pattern().is_match(value) {
        return Err(CredentialError::Validation {
            field: "value".into(),
            message: "api_key must be at least 12 chars of [A-Za-z0-9_-]".into(),
        });
    }
    Ok(())
}

pub fn validate_basic(
    value: &str,
    require_strong_passwords: bool,
    min_length: usize,
) -> Result<(), CredentialError> {
    let mut parts = value.splitn(2, ':');
    let username = parts.next().unwrap_or("");
    let password = match parts.next() {
        Some(p) => p,
        None => {
            return Err(CredentialError::Validation {
                field: "value".into(),
                message: "basic credential must be 'username:password'".into(),
            })
        }
    };
    if username.is_empty() {
        return Err(CredentialError::Validation {
            field: "username".into(),
            message: "username must not be empty".into(),
        });
    }
    if require_strong_passwords && !is_strong_password(password, min_length) {
        return Err(CredentialError::Validation {
            field: "password".into(),
            message: format!(
                "password must be at least {min_length} chars with upper, lower, digit, and punctuation"
            ),
        });
    }
    Ok(())
}

pub fn validate_oauth2(
    access_token: &str,
    client_id: Option<&str>,
    refresh_token: Option<&str>,
) -> Result<(), CredentialError> {
    let has_access = !access_token.is_empty();
    let has_client_refresh = client_id.map(|s| !s.is_empty()).unwrap_or(false)
        && refresh_token.map(|s| !s.is_empty()).unwrap_or(false);
    if !has_access && !has_client_refresh {
        return Err(CredentialError::Validation {
            field: "value".into(),
            message: "oauth2 requires an access token or (client_id + refresh_token)".into(),
        });
    }
    Ok(())
}

pub fn validate(
    credential_type: CredentialType,
    value: &str,
    require_strong_passwords: bool,
    min_length: usize,
    oauth_client_id: Option<&str>,
    oauth_refresh_token: Option<&str>,
) -> Result<(), CredentialError> {
    match credential_type {
        CredentialType::ApiKey => validate_api_key(value),
        CredentialType::Basic => validate_basic(value, require_strong_passwords, min_length),
        CredentialType::OAuth2 => validate_oauth2(value, oauth_client_id, oauth_refresh_token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_rejects_short_values() {
        assert!(validate_api_key("short").is_err());
    }

    #[test]
    fn api_key_rejects_invalid_characters() {
        assert!(validate_api_key("this key has spaces!!").is_err());
    }

    #[test]
    fn api_key_accepts_valid_value() {
        assert!(validate_api_key("abc123_XYZ-789").is_ok());
    }

    #[test]
    fn basic_requires_single_colon_and_nonempty_username() {
        assert!(validate_basic(":Password1!", true, 12).is_err());
        assert!(validate_basic("user", true, 12).is_err());
    }

    #[test]
    fn basic_rejects_weak_password_when_required() {
        assert!(validate_basic("user:weak", true, 12).is_err());
    }

    #[test]
    fn basic_allows_weak_password_when_not_required() {
        assert!(validate_basic("user:weak", false, 12).is_ok());
    }

    #[test]
    fn oauth2_requires_token_or_client_refresh_pair() {
        assert!(validate_oauth2("", None, None).is_err());
        assert!(validate_oauth2("", Some("cid"), Some("rtok")).is_ok());
        assert!(validate_oauth2("atok", None, None).is_ok());
    }
}
