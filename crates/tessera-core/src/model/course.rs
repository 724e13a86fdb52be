use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::require_text;
use crate::errors::ModelError;

/// Publication lifecycle of a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

impl CourseStatus {
    pub const ALL: [CourseStatus; 3] = [
        CourseStatus::Draft,
        CourseStatus::Published,
        CourseStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Draft => "DRAFT",
            CourseStatus::Published => "PUBLISHED",
            CourseStatus::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CourseStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ModelError::UnknownVariant {
                type_name: "CourseStatus",
                value: s.to_string(),
            })
    }
}

/// A course owned by an instructor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub status: CourseStatus,
    /// Maximum number of members; 0 means unlimited
    pub capacity: i64,
    pub created_at: DateTime<Utc>,
}

identity_by_id!(Course);

impl Course {
    /// Create a draft course with a fresh id
    pub fn new(
        title: impl Into<String>,
        owner_id: Uuid,
        capacity: i64,
    ) -> Result<Self, ModelError> {
        let course = Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            owner_id,
            status: CourseStatus::Draft,
            capacity,
            created_at: Utc::now(),
        };
        course.validate()?;
        Ok(course)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        require_text("title", &self.title)?;
        if self.capacity < 0 {
            return Err(ModelError::OutOfRange {
                field: "capacity",
                value: self.capacity,
            });
        }
        Ok(())
    }

    pub fn is_published(&self) -> bool {
        self.status == CourseStatus::Published
    }
}
