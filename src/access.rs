//! Shared-password gate in front of conversion.
//!
//! The expected password comes from the `APP_PASSWORD` environment variable.
//! An unset or blank variable is a configuration error, never an open door.

use crate::error::EqDocxError;
use tracing::warn;

/// Environment variable holding the shared password.
pub const PASSWORD_VAR: &str = "APP_PASSWORD";

/// Checks a submitted password against the configured one.
#[derive(Clone)]
pub struct AccessGate {
    var: String,
    expected: Option<String>,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("var", &self.var)
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl AccessGate {
    /// Read the password from `APP_PASSWORD`.
    pub fn from_env() -> Self {
        Self::from_var(PASSWORD_VAR)
    }

    /// Read the password from another variable.
    pub fn from_var(name: &str) -> Self {
        Self {
            var: name.to_string(),
            expected: std::env::var(name).ok(),
        }
    }

    pub fn new(expected: Option<String>) -> Self {
        Self {
            var: PASSWORD_VAR.to_string(),
            expected,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.expected
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
    }

    /// `Ok(())` only for an exact match against a configured password.
    pub fn authenticate(&self, submitted: &str) -> Result<(), EqDocxError> {
        let expected = match self.expected.as_deref() {
            Some(p) if !p.trim().is_empty() => p,
            _ => {
                return Err(EqDocxError::Configuration {
                    var: self.var.clone(),
                    detail: "no password is configured".into(),
                })
            }
        };

        if submitted == expected {
            Ok(())
        } else {
            warn!("Rejected login attempt");
            Err(EqDocxError::Authentication)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_password_passes() {
        let gate = AccessGate::new(Some("s3cret".into()));
        assert!(gate.authenticate("s3cret").is_ok());
    }

    #[test]
    fn wrong_password_is_authentication_error() {
        let gate = AccessGate::new(Some("s3cret".into()));
        assert!(matches!(
            gate.authenticate("guess"),
            Err(EqDocxError::Authentication)
        ));
        // No trimming on the submitted side.
        assert!(gate.authenticate(" s3cret").is_err());
    }

    #[test]
    fn unset_or_blank_password_is_configuration_error() {
        for expected in [None, Some(String::new()), Some("   ".into())] {
            let gate = AccessGate::new(expected);
            assert!(!gate.is_configured());
            match gate.authenticate("") {
                Err(EqDocxError::Configuration { var, .. }) => assert_eq!(var, PASSWORD_VAR),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn debug_does_not_leak_password() {
        let gate = AccessGate::new(Some("hunter2".into()));
        assert!(!format!("{gate:?}").contains("hunter2"));
    }

    #[test]
    fn reads_named_variable() {
        let gate = AccessGate::from_var("EQDOCX_TEST_SURELY_UNSET_VAR");
        assert!(!gate.is_configured());
    }
}
