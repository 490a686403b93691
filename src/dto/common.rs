use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{dao::models::NumberRange, dto::validation::validate_range_bounds};

/// Number range supplied when accepting a challenge and echoed in responses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct RangeDto {
    /// Lower bound (1–100).
    pub min: i64,
    /// Upper bound (1–100, strictly greater than `min`).
    pub max: i64,
}

impl Validate for RangeDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(err) = validate_range_bounds(self.min, self.max) {
            errors.add("range", err);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl From<NumberRange> for RangeDto {
    fn from(range: NumberRange) -> Self {
        Self {
            min: range.min,
            max: range.max,
        }
    }
}

impl From<RangeDto> for NumberRange {
    fn from(range: RangeDto) -> Self {
        Self {
            min: range.min,
            max: range.max,
        }
    }
}
