#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonotonicTimeNs(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReasonCodeId(pub u32);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractViolation {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    #[error("{field} out of range [{min}, {max}]: got {got}")]
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
        got: f64,
    },
    #[error("{field} must be finite")]
    NotFinite { field: &'static str },
}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

pub(crate) fn require_finite(field: &'static str, v: f64) -> Result<(), ContractViolation> {
    if !v.is_finite() {
        return Err(ContractViolation::NotFinite { field });
    }
    Ok(())
}

pub(crate) fn require_text(
    field: &'static str,
    value: &str,
    max_len: usize,
) -> Result<(), ContractViolation> {
    if value.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if value.len() > max_len {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "exceeds maximum length",
        });
    }
    Ok(())
}

pub(crate) fn require_optional_text(
    field: &'static str,
    value: Option<&str>,
    max_len: usize,
) -> Result<(), ContractViolation> {
    match value {
        Some(v) => require_text(field, v, max_len),
        None => Ok(()),
    }
}

/// Star rating shared by orientee evaluations and FTO feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(field: &'static str, value: u8) -> Result<Self, ContractViolation> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ContractViolation::InvalidRange {
                field,
                min: f64::from(Self::MIN),
                max: f64::from(Self::MAX),
                got: f64::from(value),
            });
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_common_01_rating_bounds_are_inclusive() {
        assert_eq!(Rating::new("r", 1).unwrap().get(), 1);
        assert_eq!(Rating::new("r", 5).unwrap().get(), 5);
        assert!(matches!(
            Rating::new("r", 0),
            Err(ContractViolation::InvalidRange { .. })
        ));
        assert!(Rating::new("r", 6).is_err());
    }

    #[test]
    fn at_common_02_violation_display_names_the_field() {
        let v = ContractViolation::InvalidValue {
            field: "orientee.status",
            reason: "unknown status",
        };
        assert_eq!(
            v.to_string(),
            "invalid value for orientee.status: unknown status"
        );
    }
}
