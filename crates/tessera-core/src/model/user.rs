use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::require_text;
use crate::errors::ModelError;

/// Access level of a platform account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Instructor, Role::Admin];

    /// Stored name of the variant
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Instructor => "INSTRUCTOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive, so rows written as `admin` or `Admin` still load.
impl FromStr for Role {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ModelError::UnknownVariant {
                type_name: "Role",
                value: s.to_string(),
            })
    }
}

/// A platform account
///
/// Password hashing and email verification happen outside the store; this
/// record only carries their results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

identity_by_id!(User);

impl User {
    /// Create an unverified account with a fresh id
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
    ) -> Result<Self, ModelError> {
        let user = Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role,
            email_verified: false,
            created_at: Utc::now(),
        };
        user.validate()?;
        Ok(user)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        require_text("username", &self.username)?;
        require_text("password_hash", &self.password_hash)?;
        match self.email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(ModelError::InvalidEmail {
                email: self.email.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Instructor".parse::<Role>().unwrap(), Role::Instructor);
        assert_eq!(" STUDENT ".parse::<Role>().unwrap(), Role::Student);
    }

    #[test]
    fn test_role_parse_rejects_unknown() {
        let err = "owner".parse::<Role>().unwrap_err();
        assert_eq!(
            err,
            ModelError::UnknownVariant {
                type_name: "Role",
                value: "owner".to_string()
            }
        );
    }

    #[test]
    fn test_new_user_validates_email() {
        assert!(User::new("ana", "ana@example.com", "h", Role::Student).is_ok());
        assert!(matches!(
            User::new("ana", "not-an-email", "h", Role::Student),
            Err(ModelError::InvalidEmail { .. })
        ));
        assert!(matches!(
            User::new("  ", "ana@example.com", "h", Role::Student),
            Err(ModelError::EmptyField { field: "username" })
        ));
    }

    #[test]
    fn test_equality_is_by_id_only() {
        let a = User::new("ana", "ana@example.com", "h", Role::Student).unwrap();
        let mut b = a.clone();
        b.username = "renamed".to_string();
        assert_eq!(a, b);

        let c = User::new("ana", "ana@example.com", "h", Role::Student).unwrap();
        assert_ne!(a, c);
    }
}
