use garde::Validate;

use crate::error::{AppError, Result};
use crate::models::api::RegisterRequest;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;
/// Maximum stored name length.
pub const MAX_NAME_LEN: usize = 100;
/// Maximum stored e-mail length.
pub const MAX_EMAIL_LEN: usize = 255;

/// Validates a registration payload before it reaches the store.
///
/// Checks run in the order the messages are meant to surface: missing
/// fields, password length, then e-mail syntax.
pub fn validate_registration(payload: &RegisterRequest) -> Result<()> {
    if payload.name.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.password.trim().is_empty()
    {
        return Err(AppError::Validation(
            "Name, email, and password are required".to_string(),
        ));
    }

    validate_password(&payload.password)?;

    if payload.name.trim().chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }

    if payload.email.trim().len() > MAX_EMAIL_LEN {
        return Err(AppError::Validation(format!(
            "Email must be at most {} characters",
            MAX_EMAIL_LEN
        )));
    }

    let normalized = RegisterRequest {
        email: payload.email.trim().to_string(),
        ..payload.clone()
    };
    normalized
        .validate()
        .map_err(|_| AppError::Validation("Invalid email address".to_string()))?;

    Ok(())
}

/// Validates a password.
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    Ok(())
}

/// Whether `email` belongs to the sanctioned domain. Case-insensitive.
pub fn is_sanctioned_email(email: &str, domain: &str) -> bool {
    let suffix = format!("@{}", domain.trim_start_matches('@').to_lowercase());
    email.trim().to_lowercase().ends_with(&suffix)
}

/// Canonical form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_blank_fields_rejected() {
        for req in [
            request("", "a@amzur.com", "secret1"),
            request("A", "   ", "secret1"),
            request("A", "a@amzur.com", ""),
        ] {
            let err = validate_registration(&req).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Validation error: Name, email, and password are required"
            );
        }
    }

    #[test]
    fn test_short_password_rejected() {
        let err = validate_registration(&request("A", "a@amzur.com", "12345")).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("at least 6")));
        assert!(validate_registration(&request("A", "a@amzur.com", "123456")).is_ok());
    }

    #[test]
    fn test_malformed_email_rejected() {
        let err = validate_registration(&request("A", "not-an-email", "secret1")).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "Invalid email address"));
    }

    #[test]
    fn test_sanctioned_domain() {
        assert!(is_sanctioned_email("Dev@Amzur.com", "amzur.com"));
        assert!(is_sanctioned_email("dev@amzur.com", "@amzur.com"));
        assert!(!is_sanctioned_email("dev@gmail.com", "amzur.com"));
        assert!(!is_sanctioned_email("dev@notamzur.com", "amzur.com"));
        assert!(!is_sanctioned_email("dev@amzur.com.evil.io", "amzur.com"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Dev@AMZUR.com "), "dev@amzur.com");
    }
}
