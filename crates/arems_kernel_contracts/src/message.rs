#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use crate::common::{require_optional_text, require_text};
use crate::profile::UserId;
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const MESSAGE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const MAX_MESSAGE_CHARS: usize = 8_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConversationId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationInput {
    pub schema_version: SchemaVersion,
    pub name: Option<String>,
    pub is_group: bool,
    pub created_by: UserId,
    pub participants: BTreeSet<UserId>,
}

impl ConversationInput {
    /// The creator is always a participant, whether or not they listed themselves.
    pub fn v1(
        name: Option<String>,
        is_group: bool,
        created_by: UserId,
        participants: impl IntoIterator<Item = UserId>,
    ) -> Result<Self, ContractViolation> {
        let mut participants: BTreeSet<UserId> = participants.into_iter().collect();
        participants.insert(created_by.clone());
        let input = Self {
            schema_version: MESSAGE_CONTRACT_VERSION,
            name,
            is_group,
            created_by,
            participants,
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for ConversationInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != MESSAGE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "conversation_input.schema_version",
                reason: "must match MESSAGE_CONTRACT_VERSION",
            });
        }
        require_optional_text("conversation_input.name", self.name.as_deref(), 128)?;
        if self.participants.len() < 2 {
            return Err(ContractViolation::InvalidValue {
                field: "conversation_input.participants",
                reason: "must include at least one user besides the creator",
            });
        }
        if !self.is_group && self.participants.len() != 2 {
            return Err(ContractViolation::InvalidValue {
                field: "conversation_input.participants",
                reason: "direct conversations have exactly two participants",
            });
        }
        if self.is_group && self.name.is_none() {
            return Err(ContractViolation::InvalidValue {
                field: "conversation_input.name",
                reason: "group conversations must be named",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    pub conversation_id: ConversationId,
    pub name: Option<String>,
    pub is_group: bool,
    pub created_by: UserId,
    pub participants: BTreeSet<UserId>,
    pub created_at: MonotonicTimeNs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: MonotonicTimeNs,
    pub edited_at: Option<MonotonicTimeNs>,
}

impl Validate for MessageRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_message_content(&self.content)?;
        if let Some(edited_at) = self.edited_at {
            if edited_at < self.created_at {
                return Err(ContractViolation::InvalidValue {
                    field: "message_record.edited_at",
                    reason: "must be >= created_at",
                });
            }
        }
        Ok(())
    }
}

pub fn validate_message_content(content: &str) -> Result<(), ContractViolation> {
    require_text("message.content", content, MAX_MESSAGE_CHARS)
}
