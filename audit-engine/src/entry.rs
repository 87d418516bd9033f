// Audit entry types and structures
use crate::error::{AuditError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of event recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEventType {
    Heartbeat,
    /// Content was opened and its label inspected
    Discovery,
    /// A label or protection change was committed
    Change,
    /// Protected content was accessed
    Access,
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditEventType::Heartbeat => "heartbeat",
            AuditEventType::Discovery => "discovery",
            AuditEventType::Change => "change",
            AuditEventType::Access => "access",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Identity the event is attributed to
    pub subject: String,
    pub content_id: String,
    pub action: String,
    pub data: serde_json::Value,
}

impl AuditEntry {
    pub fn new(
        event_type: AuditEventType,
        subject: impl Into<String>,
        content_id: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            subject: subject.into(),
            content_id: content_id.into(),
            action: action.into(),
            data: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Adds one field to the `data` object; non-object data is replaced.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        if !self.data.is_object() {
            self.data = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(map) = self.data.as_object_mut() {
            map.insert(key.into(), value.into());
        }
        self
    }

    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(AuditError::ValidationError("subject is empty".to_string()));
        }
        if self.action.trim().is_empty() {
            return Err(AuditError::ValidationError("action is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_field_builds_object() {
        let entry = AuditEntry::new(AuditEventType::Change, "alice@contoso.com", "doc.docx", "label_changed")
            .with_field("old_label", "General")
            .with_field("new_label", json!("Confidential"));

        assert_eq!(entry.field("old_label"), Some(&json!("General")));
        assert_eq!(entry.field("new_label"), Some(&json!("Confidential")));
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_blank_subject() {
        let entry = AuditEntry::new(AuditEventType::Discovery, "  ", "doc.docx", "discover");
        assert!(matches!(entry.validate(), Err(AuditError::ValidationError(_))));
    }
}
