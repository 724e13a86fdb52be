//! Redacting wrapper for credentials
//!
//! Database passwords travel through `PoolConfig` and end up in `Debug`
//! output of anything that holds the config. `Sensitive<T>` keeps them out of
//! logs and error messages.

use serde::{Deserialize, Deserializer};
use std::fmt;

const REDACTED: &str = "***REDACTED***";

/// Wrapper that redacts its contents in `Debug` and `Display`
///
/// # Example
///
/// ```
/// use tessera_core_types::Sensitive;
///
/// let password = Sensitive::new("hunter2".to_string());
/// assert_eq!(format!("{:?}", password), "***REDACTED***");
/// assert_eq!(password.expose(), "hunter2");
/// ```
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the secret. Call sites should be limited to the driver boundary.
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T: Clone> Clone for Sensitive<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: PartialEq> PartialEq for Sensitive<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: Eq> Eq for Sensitive<T> {}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Sensitive<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Sensitive)
    }
}

impl From<String> for Sensitive<String> {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Sensitive<String> {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_are_redacted() {
        let secret = Sensitive::new("db-password");
        assert_eq!(format!("{:?}", secret), REDACTED);
        assert_eq!(format!("{}", secret), REDACTED);
    }

    #[test]
    fn test_expose_and_into_inner() {
        let secret = Sensitive::from("s3cret");
        assert_eq!(secret.expose(), "s3cret");
        assert_eq!(secret.into_inner(), "s3cret");
    }

    #[test]
    fn test_deserialize_transparent() {
        #[derive(Deserialize, Debug)]
        struct Credentials {
            user: String,
            password: Sensitive<String>,
        }

        let creds: Credentials =
            serde_json::from_str(r#"{"user":"app","password":"pw"}"#).unwrap();
        assert_eq!(creds.user, "app");
        assert_eq!(creds.password.expose(), "pw");

        let debug_str = format!("{:?}", creds);
        assert!(debug_str.contains("app"));
        assert!(!debug_str.contains("\"pw\""));
        assert!(debug_str.contains(REDACTED));
    }

    #[test]
    fn test_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Section {
            password: Option<Sensitive<String>>,
        }

        let section: Section = toml::from_str("password = \"abc\"").unwrap();
        assert_eq!(section.password.unwrap().expose(), "abc");

        let empty: Section = toml::from_str("").unwrap();
        assert!(empty.password.is_none());
    }
}
