#![forbid(unsafe_code)]

use chrono::NaiveDate;
use serde::Deserialize;

use crate::common::{require_finite, require_optional_text, require_text};
use crate::profile::{validate_email, UserId};
use crate::progress::DEFAULT_TOTAL_HOURS;
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const ORIENTEE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrienteeId(pub u64);

/// Set by evaluators and admins. Never derived from hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrienteeStatus {
    OnTrack,
    AtRisk,
    Extended,
    PendingClearance,
    Cleared,
}

impl OrienteeStatus {
    pub const ALL: [OrienteeStatus; 5] = [
        OrienteeStatus::OnTrack,
        OrienteeStatus::AtRisk,
        OrienteeStatus::Extended,
        OrienteeStatus::PendingClearance,
        OrienteeStatus::Cleared,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "on-track" => Some(OrienteeStatus::OnTrack),
            "at-risk" => Some(OrienteeStatus::AtRisk),
            "extended" => Some(OrienteeStatus::Extended),
            "pending-clearance" => Some(OrienteeStatus::PendingClearance),
            "cleared" => Some(OrienteeStatus::Cleared),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrienteeStatus::OnTrack => "on-track",
            OrienteeStatus::AtRisk => "at-risk",
            OrienteeStatus::Extended => "extended",
            OrienteeStatus::PendingClearance => "pending-clearance",
            OrienteeStatus::Cleared => "cleared",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OrienteeStatus::OnTrack => "On Track",
            OrienteeStatus::AtRisk => "At Risk",
            OrienteeStatus::Extended => "Extended",
            OrienteeStatus::PendingClearance => "Pending Clearance",
            OrienteeStatus::Cleared => "Cleared",
        }
    }

    pub fn is_active(self) -> bool {
        self != OrienteeStatus::Cleared
    }

    pub fn is_at_risk(self) -> bool {
        matches!(self, OrienteeStatus::AtRisk | OrienteeStatus::Extended)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CertLevel {
    Emt,
    Aemt,
    Paramedic,
}

impl CertLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "EMT" => Some(CertLevel::Emt),
            "AEMT" => Some(CertLevel::Aemt),
            "Paramedic" => Some(CertLevel::Paramedic),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CertLevel::Emt => "EMT",
            CertLevel::Aemt => "AEMT",
            CertLevel::Paramedic => "Paramedic",
        }
    }
}

/// Contact details captured before the orientee has an account of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingContact {
    pub temp_name: String,
    pub temp_email: String,
    pub temp_phone: Option<String>,
}

impl Validate for PendingContact {
    fn validate(&self) -> Result<(), ContractViolation> {
        require_text("pending_contact.temp_name", &self.temp_name, 128)?;
        validate_email("pending_contact.temp_email", &self.temp_email)?;
        require_optional_text("pending_contact.temp_phone", self.temp_phone.as_deref(), 32)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrienteeCreateInput {
    pub schema_version: SchemaVersion,
    pub contact: PendingContact,
    pub cert_level: CertLevel,
    pub station: Option<String>,
    pub shift: Option<String>,
    pub lead_fto_id: Option<UserId>,
    pub start_date: NaiveDate,
    pub tentative_clear_date: Option<NaiveDate>,
    pub total_hours_base: f64,
}

impl OrienteeCreateInput {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        contact: PendingContact,
        cert_level: CertLevel,
        station: Option<String>,
        shift: Option<String>,
        lead_fto_id: Option<UserId>,
        start_date: NaiveDate,
        tentative_clear_date: Option<NaiveDate>,
        total_hours_base: Option<f64>,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            schema_version: ORIENTEE_CONTRACT_VERSION,
            contact,
            cert_level,
            station,
            shift,
            lead_fto_id,
            start_date,
            tentative_clear_date,
            total_hours_base: total_hours_base.unwrap_or(DEFAULT_TOTAL_HOURS),
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for OrienteeCreateInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ORIENTEE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "orientee_create_input.schema_version",
                reason: "must match ORIENTEE_CONTRACT_VERSION",
            });
        }
        self.contact.validate()?;
        require_optional_text("orientee_create_input.station", self.station.as_deref(), 64)?;
        require_optional_text("orientee_create_input.shift", self.shift.as_deref(), 64)?;
        validate_total_hours_base("orientee_create_input.total_hours_base", self.total_hours_base)?;
        if let Some(clear) = self.tentative_clear_date {
            if clear < self.start_date {
                return Err(ContractViolation::InvalidValue {
                    field: "orientee_create_input.tentative_clear_date",
                    reason: "must not precede start_date",
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrienteeRecord {
    pub schema_version: SchemaVersion,
    pub orientee_id: OrienteeId,
    /// `None` until the orientee signs up and is linked by email.
    pub user_id: Option<UserId>,
    pub contact: PendingContact,
    pub cert_level: CertLevel,
    pub station: Option<String>,
    pub shift: Option<String>,
    pub lead_fto_id: Option<UserId>,
    pub start_date: NaiveDate,
    pub tentative_clear_date: Option<NaiveDate>,
    pub status: OrienteeStatus,
    pub hours_completed: f64,
    pub total_hours_base: f64,
    pub hours_adjustment: f64,
    pub adjustment_reason: Option<String>,
    pub adjusted_by: Option<UserId>,
    pub last_evaluation_date: Option<NaiveDate>,
    pub orientation_book_url: Option<String>,
    pub is_archived: bool,
    pub created_at: MonotonicTimeNs,
    pub updated_at: MonotonicTimeNs,
}

impl OrienteeRecord {
    pub fn from_create_input_v1(
        orientee_id: OrienteeId,
        input: OrienteeCreateInput,
        created_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        input.validate()?;
        let r = Self {
            schema_version: ORIENTEE_CONTRACT_VERSION,
            orientee_id,
            user_id: None,
            contact: input.contact,
            cert_level: input.cert_level,
            station: input.station,
            shift: input.shift,
            lead_fto_id: input.lead_fto_id,
            start_date: input.start_date,
            tentative_clear_date: input.tentative_clear_date,
            status: OrienteeStatus::OnTrack,
            hours_completed: 0.0,
            total_hours_base: input.total_hours_base,
            hours_adjustment: 0.0,
            adjustment_reason: None,
            adjusted_by: None,
            last_evaluation_date: None,
            orientation_book_url: None,
            is_archived: false,
            created_at,
            updated_at: created_at,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn display_name(&self) -> &str {
        &self.contact.temp_name
    }

    pub fn snapshot(&self) -> OrienteeSnapshot {
        OrienteeSnapshot {
            hours_completed: self.hours_completed,
            total_hours_base: self.total_hours_base,
            hours_adjustment: self.hours_adjustment,
            status: self.status,
        }
    }
}

impl Validate for OrienteeRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ORIENTEE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "orientee_record.schema_version",
                reason: "must match ORIENTEE_CONTRACT_VERSION",
            });
        }
        self.contact.validate()?;
        self.snapshot().validate()?;
        require_optional_text(
            "orientee_record.adjustment_reason",
            self.adjustment_reason.as_deref(),
            512,
        )?;
        require_optional_text(
            "orientee_record.orientation_book_url",
            self.orientation_book_url.as_deref(),
            2048,
        )?;
        if self.updated_at < self.created_at {
            return Err(ContractViolation::InvalidValue {
                field: "orientee_record.updated_at",
                reason: "must be >= created_at",
            });
        }
        Ok(())
    }
}

/// Loose row shape as it arrives from the backend or a JSON export.
///
/// Every numeric column is nullable upstream; use [`OrienteeSnapshot::from_row`]
/// before computing anything from it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OrienteeRow {
    #[serde(default)]
    pub hours_completed: Option<f64>,
    #[serde(default)]
    pub total_hours: Option<f64>,
    #[serde(default)]
    pub hours_adjustment: Option<f64>,
    pub status: String,
}

/// The calculator's only input: four required, validated fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrienteeSnapshot {
    pub hours_completed: f64,
    pub total_hours_base: f64,
    pub hours_adjustment: f64,
    pub status: OrienteeStatus,
}

impl OrienteeSnapshot {
    pub fn v1(
        hours_completed: f64,
        total_hours_base: f64,
        hours_adjustment: f64,
        status: OrienteeStatus,
    ) -> Result<Self, ContractViolation> {
        let s = Self {
            hours_completed,
            total_hours_base,
            hours_adjustment,
            status,
        };
        s.validate()?;
        Ok(s)
    }

    pub fn from_row(row: &OrienteeRow) -> Result<Self, ContractViolation> {
        let status =
            OrienteeStatus::parse(&row.status).ok_or(ContractViolation::InvalidValue {
                field: "orientee_row.status",
                reason: "unknown status",
            })?;
        Self::v1(
            row.hours_completed.unwrap_or(0.0),
            row.total_hours.unwrap_or(DEFAULT_TOTAL_HOURS),
            row.hours_adjustment.unwrap_or(0.0),
            status,
        )
    }
}

impl Validate for OrienteeSnapshot {
    fn validate(&self) -> Result<(), ContractViolation> {
        require_finite("orientee.hours_completed", self.hours_completed)?;
        if self.hours_completed < 0.0 {
            return Err(ContractViolation::InvalidValue {
                field: "orientee.hours_completed",
                reason: "must be >= 0",
            });
        }
        validate_total_hours_base("orientee.total_hours_base", self.total_hours_base)?;
        // A negative adjustment may still drive the effective total to <= 0;
        // the progress calculator guards that case per record.
        require_finite("orientee.hours_adjustment", self.hours_adjustment)?;
        Ok(())
    }
}

fn validate_total_hours_base(field: &'static str, v: f64) -> Result<(), ContractViolation> {
    require_finite(field, v)?;
    if v <= 0.0 {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be > 0",
        });
    }
    Ok(())
}
