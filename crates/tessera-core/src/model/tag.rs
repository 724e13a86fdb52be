use serde::{Deserialize, Serialize};

use super::require_text;
use crate::errors::ModelError;

/// A label attached to courses; uses integer ids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

identity_by_id!(Tag);

impl Tag {
    pub fn new(id: i64, name: impl Into<String>) -> Result<Self, ModelError> {
        let tag = Self {
            id,
            name: name.into(),
        };
        require_text("name", &tag.name)?;
        Ok(tag)
    }
}
