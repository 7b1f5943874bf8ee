//! Session authentication configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Session configuration (token signing and cookie)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign session tokens
    pub session_secret: String,

    /// Session lifetime in days
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,

    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl AuthConfig {
    /// Validate session configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.session_secret.is_empty() {
            return Err(ValidationError::MissingRequired("SESSION_SECRET"));
        }
        if self.session_secret.len() < 32 {
            return Err(ValidationError::SessionSecretTooShort);
        }
        if self.session_ttl_days <= 0 || self.session_ttl_days > 365 {
            return Err(ValidationError::InvalidSessionTtl);
        }
        if self.cookie_name.is_empty() {
            return Err(ValidationError::MissingRequired("COOKIE_NAME"));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: String::new(),
            session_ttl_days: default_session_ttl_days(),
            cookie_name: default_cookie_name(),
        }
    }
}

fn default_session_ttl_days() -> i64 {
    30
}

fn default_cookie_name() -> String {
    "session_token".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AuthConfig {
        AuthConfig {
            session_secret: "0123456789abcdef0123456789abcdef".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.session_ttl_days, 30);
        assert_eq!(config.cookie_name, "session_token");
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validation_missing_secret() {
        let config = AuthConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_short_secret() {
        let config = AuthConfig {
            session_secret: "too-short".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::SessionSecretTooShort)
        ));
    }

    #[test]
    fn test_validation_ttl_bounds() {
        let config = AuthConfig {
            session_ttl_days: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());

        let config = AuthConfig {
            session_ttl_days: 400,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }
}
