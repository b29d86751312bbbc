//! Session documents and their parsed form.

use serde::{Deserialize, Serialize};

use crate::Id;

/// A heading-delimited part of a parsed document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSection {
    pub heading: String,
    pub content: String,
}

/// Output of a document parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// Plain text used for extraction and keyword scanning.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown_content: Option<String>,
    #[serde(default)]
    pub sections: Vec<DocumentSection>,
    pub page_count: u32,
    /// Parser's own confidence in the text it recovered, 0.0-1.0.
    pub confidence: f64,
}

/// Processing state of an uploaded session document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed { message: String },
}

impl DocumentStatus {
    pub fn failed(message: impl Into<String>) -> Self {
        DocumentStatus::Failed {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed { .. })
    }
}

/// The note file attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub id: Id,
    pub filename: String,
    pub status: DocumentStatus,
}

/// A therapy session as the repository knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub therapist_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<SessionDocument>,
}

impl Session {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            patient_id: None,
            therapist_id: None,
            document: None,
        }
    }

    pub fn with_document(mut self, id: Id, filename: impl Into<String>) -> Self {
        self.document = Some(SessionDocument {
            id,
            filename: filename.into(),
            status: DocumentStatus::Pending,
        });
        self
    }
}
