use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::require_text;
use crate::errors::ModelError;

/// Metadata for a file uploaded to a course
///
/// The bytes live in external file storage; only the descriptor is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_at: DateTime<Utc>,
}

identity_by_id!(Attachment);

impl Attachment {
    pub fn new(
        course_id: Uuid,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        size_bytes: i64,
    ) -> Result<Self, ModelError> {
        let attachment = Self {
            id: Uuid::new_v4(),
            course_id,
            file_name: file_name.into(),
            content_type: content_type.into(),
            size_bytes,
            uploaded_at: Utc::now(),
        };
        require_text("file_name", &attachment.file_name)?;
        require_text("content_type", &attachment.content_type)?;
        if size_bytes < 0 {
            return Err(ModelError::OutOfRange {
                field: "size_bytes",
                value: size_bytes,
            });
        }
        Ok(attachment)
    }
}
