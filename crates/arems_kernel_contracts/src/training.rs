#![forbid(unsafe_code)]

use crate::common::{require_optional_text, require_text};
use crate::orientee::OrienteeId;
use crate::profile::UserId;
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const TRAINING_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrainingMaterialId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrainingMaterialKind {
    Video,
    Document,
    Powerpoint,
    Link,
}

impl TrainingMaterialKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "video" => Some(TrainingMaterialKind::Video),
            "document" => Some(TrainingMaterialKind::Document),
            "powerpoint" => Some(TrainingMaterialKind::Powerpoint),
            "link" => Some(TrainingMaterialKind::Link),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrainingMaterialKind::Video => "video",
            TrainingMaterialKind::Document => "document",
            TrainingMaterialKind::Powerpoint => "powerpoint",
            TrainingMaterialKind::Link => "link",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingMaterialInput {
    pub schema_version: SchemaVersion,
    pub title: String,
    pub description: Option<String>,
    pub kind: TrainingMaterialKind,
    pub url: String,
}

impl TrainingMaterialInput {
    pub fn v1(
        title: String,
        description: Option<String>,
        kind: TrainingMaterialKind,
        url: String,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            schema_version: TRAINING_CONTRACT_VERSION,
            title,
            description,
            kind,
            url,
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for TrainingMaterialInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != TRAINING_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "training_material_input.schema_version",
                reason: "must match TRAINING_CONTRACT_VERSION",
            });
        }
        require_text("training_material_input.title", &self.title, 256)?;
        require_optional_text(
            "training_material_input.description",
            self.description.as_deref(),
            4096,
        )?;
        require_text("training_material_input.url", &self.url, 2048)?;
        if !(self.url.starts_with("https://") || self.url.starts_with("http://")) {
            return Err(ContractViolation::InvalidValue {
                field: "training_material_input.url",
                reason: "must be an http(s) url",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingMaterialRecord {
    pub material_id: TrainingMaterialId,
    pub input: TrainingMaterialInput,
    pub uploaded_by: UserId,
    pub created_at: MonotonicTimeNs,
    pub updated_at: MonotonicTimeNs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingCompletionRecord {
    pub orientee_id: OrienteeId,
    pub material_id: TrainingMaterialId,
    pub completed_at: MonotonicTimeNs,
}
