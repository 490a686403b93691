//! Validation helpers for DTOs.

use validator::ValidationError;

/// Bounds every range and submitted number must respect.
pub const NUMBER_MIN: i64 = 1;
/// Upper bound of the playable number space.
pub const NUMBER_MAX: i64 = 100;

/// Validates that a user identifier is non-blank.
pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        let mut err = ValidationError::new("user_id_blank");
        err.message = Some("User ID cannot be empty".into());
        return Err(err);
    }
    Ok(())
}

/// Validates a `{min, max}` pair: both inside 1–100 and `min < max`.
pub fn validate_range_bounds(min: i64, max: i64) -> Result<(), ValidationError> {
    if !(NUMBER_MIN..=NUMBER_MAX).contains(&min) || !(NUMBER_MIN..=NUMBER_MAX).contains(&max) {
        let mut err = ValidationError::new("range_bounds");
        err.message = Some(format!("Range must lie within {NUMBER_MIN}-{NUMBER_MAX}").into());
        return Err(err);
    }
    if min >= max {
        let mut err = ValidationError::new("range_order");
        err.message = Some("Maximum number must be greater than minimum number".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_user_ids_are_rejected() {
        assert!(validate_user_id("uid-alice").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("   ").is_err());
    }

    #[test]
    fn range_bounds_enforced() {
        assert!(validate_range_bounds(1, 10).is_ok());
        assert!(validate_range_bounds(1, 100).is_ok());
        assert!(validate_range_bounds(0, 10).is_err());
        assert!(validate_range_bounds(1, 101).is_err());
        assert!(validate_range_bounds(5, 5).is_err());
        assert!(validate_range_bounds(7, 3).is_err());
    }
}
