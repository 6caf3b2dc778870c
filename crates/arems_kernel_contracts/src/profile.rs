#![forbid(unsafe_code)]

use crate::common::{require_optional_text, require_text};
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const PROFILE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Identity issued by the external auth service. Opaque to this system.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "user_id",
                reason: "must not be empty",
            });
        }
        if id.len() > 128 {
            return Err(ContractViolation::InvalidValue {
                field: "user_id",
                reason: "must be <= 128 chars",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Admin,
    LeadFto,
    Fto,
    Employee,
    Orientee,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::LeadFto,
        Role::Fto,
        Role::Employee,
        Role::Orientee,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "admin" => Some(Role::Admin),
            "lead_fto" => Some(Role::LeadFto),
            "fto" => Some(Role::Fto),
            "employee" => Some(Role::Employee),
            "orientee" => Some(Role::Orientee),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::LeadFto => "lead_fto",
            Role::Fto => "fto",
            Role::Employee => "employee",
            Role::Orientee => "orientee",
        }
    }

    /// Roles listed in the FTO picker. Admins can precept too.
    pub fn is_training_officer(self) -> bool {
        matches!(self, Role::Admin | Role::LeadFto | Role::Fto)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRecord {
    pub schema_version: SchemaVersion,
    pub user_id: UserId,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub avatar_url: Option<String>,
    pub created_at: MonotonicTimeNs,
    pub updated_at: MonotonicTimeNs,
}

impl ProfileRecord {
    pub fn v1(
        user_id: UserId,
        full_name: String,
        email: String,
        phone: Option<String>,
        role: Role,
        created_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: PROFILE_CONTRACT_VERSION,
            user_id,
            full_name,
            email,
            phone,
            role,
            avatar_url: None,
            created_at,
            updated_at: created_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for ProfileRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != PROFILE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "profile_record.schema_version",
                reason: "must match PROFILE_CONTRACT_VERSION",
            });
        }
        require_text("profile_record.full_name", &self.full_name, 128)?;
        validate_email("profile_record.email", &self.email)?;
        require_optional_text("profile_record.phone", self.phone.as_deref(), 32)?;
        require_optional_text("profile_record.avatar_url", self.avatar_url.as_deref(), 2048)?;
        if self.updated_at < self.created_at {
            return Err(ContractViolation::InvalidValue {
                field: "profile_record.updated_at",
                reason: "must be >= created_at",
            });
        }
        Ok(())
    }
}

/// Shallow shape check only. Deliverability is the mail provider's problem.
pub fn validate_email(field: &'static str, email: &str) -> Result<(), ContractViolation> {
    require_text(field, email, 254)?;
    let trimmed = email.trim();
    let Some((local, domain)) = trimmed.split_once('@') else {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must contain '@'",
        });
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must look like local@domain.tld",
        });
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not contain whitespace",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_profile_01_role_wire_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("supervisor"), None);
    }

    #[test]
    fn at_profile_02_training_officer_roles() {
        assert!(Role::Admin.is_training_officer());
        assert!(Role::LeadFto.is_training_officer());
        assert!(Role::Fto.is_training_officer());
        assert!(!Role::Employee.is_training_officer());
        assert!(!Role::Orientee.is_training_officer());
    }

    #[test]
    fn at_profile_03_record_rejects_bad_email() {
        let r = ProfileRecord::v1(
            UserId::new("u1").unwrap(),
            "Dana Reyes".to_string(),
            "not-an-email".to_string(),
            None,
            Role::Fto,
            MonotonicTimeNs(1),
        );
        assert!(matches!(r, Err(ContractViolation::InvalidValue { .. })));
    }

    #[test]
    fn at_profile_04_user_id_rejects_blank() {
        assert!(UserId::new("   ").is_err());
        assert!(UserId::new("x".repeat(129)).is_err());
    }
}
