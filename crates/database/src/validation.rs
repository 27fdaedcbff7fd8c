//! Input validation for ledger-facing values.

use std::fmt;

use crate::tokens::Tokens;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid promo code format.
    InvalidPromoCode(String),
    /// Percentage outside its allowed range.
    OutOfRange { field: String, min: i64, max: i64, actual: i64 },
    /// Identifier with the wrong digit count or non-digit characters.
    InvalidDigits { field: String, expected: usize },
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Empty value where one is required.
    Empty(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidPromoCode(msg) => write!(f, "Invalid promo code: {}", msg),
            ValidationError::OutOfRange { field, min, max, actual } => {
                write!(f, "{} must be between {} and {} (got {})", field, min, max, actual)
            }
            ValidationError::InvalidDigits { field, expected } => {
                write!(f, "{} must be exactly {} digits", field, expected)
            }
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Minimum promo code length.
pub const MIN_PROMO_CODE_LENGTH: usize = 3;

/// Maximum promo code length.
pub const MAX_PROMO_CODE_LENGTH: usize = 20;

/// Maximum allowed lookup query length.
pub const MAX_QUERY_LENGTH: usize = 256;

/// Largest whole-token amount a single deposit may carry.
///
/// Leaves room for a 100% bonus percentage and the hundredths scale.
pub const MAX_TOKEN_AMOUNT: i64 = i64::MAX / Tokens::SCALE / 100;

/// Validate and normalize a promo code.
///
/// Codes are ASCII letters, digits, `-` and `_`. Returns the upper-cased code.
pub fn validate_promo_code(code: &str) -> Result<String, ValidationError> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Empty("promo code".to_string()));
    }

    if code.len() > MAX_PROMO_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "promo code".to_string(),
            max: MAX_PROMO_CODE_LENGTH,
            actual: code.len(),
        });
    }

    if code.len() < MIN_PROMO_CODE_LENGTH {
        return Err(ValidationError::InvalidPromoCode(format!(
            "must be at least {} characters",
            MIN_PROMO_CODE_LENGTH
        )));
    }

    if let Some(c) = code
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(ValidationError::InvalidPromoCode(format!(
            "invalid character '{}'",
            c
        )));
    }

    Ok(code.to_ascii_uppercase())
}

/// Validate a promo bonus percentage (1 to 100).
pub fn validate_bonus_percent(percent: i64) -> Result<(), ValidationError> {
    if !(1..=100).contains(&percent) {
        return Err(ValidationError::OutOfRange {
            field: "bonus percent".to_string(),
            min: 1,
            max: 100,
            actual: percent,
        });
    }
    Ok(())
}

/// Validate a fixed-length numeric identifier such as a 16-digit national id.
///
/// Spaces and dashes are stripped. Returns the bare digits.
pub fn validate_digit_id(field: &str, value: &str, len: usize) -> Result<String, ValidationError> {
    let digits: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if digits.is_empty() {
        return Err(ValidationError::Empty(field.to_string()));
    }

    if digits.len() != len || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidDigits {
            field: field.to_string(),
            expected: len,
        });
    }

    Ok(digits)
}

/// Validate a free-text lookup query. Returns it trimmed.
pub fn validate_query(query: &str) -> Result<&str, ValidationError> {
    let query = query.trim();

    if query.is_empty() {
        return Err(ValidationError::Empty("query".to_string()));
    }

    if query.len() > MAX_QUERY_LENGTH {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: MAX_QUERY_LENGTH,
            actual: query.len(),
        });
    }

    Ok(query)
}

/// Validate a whole-token amount entered by a user or admin.
pub fn validate_token_amount(amount: i64) -> Result<(), ValidationError> {
    if !(1..=MAX_TOKEN_AMOUNT).contains(&amount) {
        return Err(ValidationError::OutOfRange {
            field: "token amount".to_string(),
            min: 1,
            max: MAX_TOKEN_AMOUNT,
            actual: amount,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_promo_code_valid() {
        assert_eq!(validate_promo_code("bonus100").unwrap(), "BONUS100");
        assert_eq!(validate_promo_code(" NEW_YEAR-26 ").unwrap(), "NEW_YEAR-26");
    }

    #[test]
    fn test_validate_promo_code_invalid() {
        assert!(matches!(
            validate_promo_code(""),
            Err(ValidationError::Empty(_))
        ));
        assert!(matches!(
            validate_promo_code("ab"),
            Err(ValidationError::InvalidPromoCode(_))
        ));
        assert!(matches!(
            validate_promo_code("BONUS 100"),
            Err(ValidationError::InvalidPromoCode(_))
        ));
        assert!(matches!(
            validate_promo_code(&"A".repeat(21)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_bonus_percent() {
        assert!(validate_bonus_percent(1).is_ok());
        assert!(validate_bonus_percent(100).is_ok());
        assert!(validate_bonus_percent(0).is_err());
        assert!(validate_bonus_percent(101).is_err());
    }

    #[test]
    fn test_validate_token_amount() {
        assert!(validate_token_amount(1).is_ok());
        assert!(validate_token_amount(MAX_TOKEN_AMOUNT).is_ok());
        assert!(validate_token_amount(0).is_err());
        assert!(validate_token_amount(-5).is_err());
        assert!(matches!(
            validate_token_amount(MAX_TOKEN_AMOUNT + 1),
            Err(ValidationError::OutOfRange { max: MAX_TOKEN_AMOUNT, .. })
        ));

        // the largest amount with a full bonus still fits in hundredths
        let credited = (MAX_TOKEN_AMOUNT + MAX_TOKEN_AMOUNT * 100 / 100).checked_mul(Tokens::SCALE);
        assert!(credited.is_some());
    }

    #[test]
    fn test_validate_digit_id() {
        assert_eq!(
            validate_digit_id("NIK", "3201-0123 4567 8901", 16).unwrap(),
            "3201012345678901"
        );
        assert!(matches!(
            validate_digit_id("NIK", "123", 16),
            Err(ValidationError::InvalidDigits { expected: 16, .. })
        ));
        assert!(matches!(
            validate_digit_id("NIK", "320101234567890A", 16),
            Err(ValidationError::InvalidDigits { .. })
        ));
        assert!(matches!(
            validate_digit_id("NIK", "  ", 16),
            Err(ValidationError::Empty(_))
        ));
    }

    #[test]
    fn test_validate_query() {
        assert_eq!(validate_query("  budi santoso ").unwrap(), "budi santoso");
        assert!(validate_query("").is_err());
        assert!(validate_query(&"x".repeat(300)).is_err());
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::InvalidDigits {
            field: "NIK".to_string(),
            expected: 16,
        };
        assert_eq!(err.to_string(), "NIK must be exactly 16 digits");

        let err = ValidationError::TooLong {
            field: "query".to_string(),
            max: 256,
            actual: 300,
        };
        assert_eq!(err.to_string(), "query is too long (300 chars, max 256)");
    }
}
