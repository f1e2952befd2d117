//! Validation Traits
//!
//! Common validation patterns shared by route handlers.

use crate::error::{ApiError, ApiResult};

/// Trait for validating non-empty strings.
pub trait ValidateNonEmpty {
    /// Validate that the value is non-empty after trimming.
    ///
    /// # Errors
    /// Returns `ApiError::validation` naming `field_name` when empty.
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()>;
}

impl ValidateNonEmpty for str {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        if self.trim().is_empty() {
            return Err(ApiError::validation(format!(
                "Required field '{field_name}' is missing"
            )));
        }
        Ok(())
    }
}

impl ValidateNonEmpty for String {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        self.as_str().validate_non_empty(field_name)
    }
}

/// Trait for validating numeric ranges.
pub trait ValidateRange {
    /// Validate that the value is non-negative.
    fn validate_non_negative(&self, field_name: &str) -> ApiResult<()>;
}

macro_rules! impl_validate_range {
    ($($t:ty),*) => {
        $(
            impl ValidateRange for $t {
                fn validate_non_negative(&self, field_name: &str) -> ApiResult<()> {
                    if *self < 0 as $t {
                        return Err(ApiError::validation(format!(
                            "Field '{field_name}' must be non-negative"
                        )));
                    }
                    Ok(())
                }
            }
        )*
    };
}

impl_validate_range!(i32, i64, isize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        assert!("x".validate_non_empty("name").is_ok());
        assert!("  ".validate_non_empty("name").is_err());
        assert!("".validate_non_empty("name").is_err());
    }

    #[test]
    fn test_non_negative() {
        assert!(0i64.validate_non_negative("quantity").is_ok());
        assert!((-1i64).validate_non_negative("quantity").is_err());
    }
}
