//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::constants::{DEFAULT_DATABASE_URL, DEFAULT_DB_MAX_CONNECTIONS};
use crate::{HmsError, HmsResult};

/// Argon2 work factors used when hashing new passwords.
///
/// Verification always uses the parameters embedded in the stored hash, so changing these only
/// affects passwords hashed afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PasswordCost {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl PasswordCost {
    /// The argon2 crate's recommended parameters.
    pub const RECOMMENDED: PasswordCost = PasswordCost {
        memory_kib: argon2::Params::DEFAULT_M_COST,
        iterations: argon2::Params::DEFAULT_T_COST,
    };

    /// Cheapest parameters argon2 accepts. Only suitable for tests.
    pub const MINIMAL: PasswordCost = PasswordCost {
        memory_kib: argon2::Params::MIN_M_COST,
        iterations: argon2::Params::MIN_T_COST,
    };
}

impl Default for PasswordCost {
    fn default() -> Self {
        Self::RECOMMENDED
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_url: String,
    max_connections: u32,
    password_cost: PasswordCost,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `HmsError::Validation` if the database URL is empty, the pool size is zero, or the
    /// argon2 parameters are outside the range the algorithm accepts.
    pub fn new(
        database_url: String,
        max_connections: u32,
        password_cost: PasswordCost,
    ) -> HmsResult<Self> {
        if database_url.trim().is_empty() {
            return Err(HmsError::Validation("database_url cannot be empty".into()));
        }
        if max_connections == 0 {
            return Err(HmsError::Validation(
                "max_connections must be at least 1".into(),
            ));
        }
        argon2::Params::new(
            password_cost.memory_kib,
            password_cost.iterations,
            argon2::Params::DEFAULT_P_COST,
            None,
        )
        .map_err(|e| HmsError::Validation(format!("invalid argon2 parameters: {e}")))?;

        Ok(Self {
            database_url,
            max_connections,
            password_cost,
        })
    }

    /// Configuration for an isolated in-memory database with cheap password hashing.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            max_connections: 1,
            password_cost: PasswordCost::MINIMAL,
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    pub fn password_cost(&self) -> PasswordCost {
        self.password_cost
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the database URL from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_DATABASE_URL`].
pub fn database_url_from_env_value(value: Option<String>) -> String {
    non_blank(value).unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

/// Parse the pool size from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_DB_MAX_CONNECTIONS`].
pub fn max_connections_from_env_value(value: Option<String>) -> HmsResult<u32> {
    match non_blank(value) {
        None => Ok(DEFAULT_DB_MAX_CONNECTIONS),
        Some(v) => v.parse::<u32>().map_err(|_| {
            HmsError::Validation(format!("HMS_DB_MAX_CONNECTIONS is not a number: {v}"))
        }),
    }
}

/// Parse argon2 cost overrides from optional string values.
///
/// Missing values fall back to [`PasswordCost::RECOMMENDED`] field by field.
pub fn password_cost_from_env_values(
    memory_kib: Option<String>,
    iterations: Option<String>,
) -> HmsResult<PasswordCost> {
    fn parse(name: &str, value: Option<String>, default: u32) -> HmsResult<u32> {
        match non_blank(value) {
            None => Ok(default),
            Some(v) => v
                .parse::<u32>()
                .map_err(|_| HmsError::Validation(format!("{name} is not a number: {v}"))),
        }
    }

    Ok(PasswordCost {
        memory_kib: parse(
            "HMS_ARGON2_MEMORY_KIB",
            memory_kib,
            PasswordCost::RECOMMENDED.memory_kib,
        )?,
        iterations: parse(
            "HMS_ARGON2_ITERATIONS",
            iterations,
            PasswordCost::RECOMMENDED.iterations,
        )?,
    })
}

/// Build a `CoreConfig` from the process environment.
///
/// Intended to be called once from a binary's `main`.
pub fn core_config_from_env() -> HmsResult<CoreConfig> {
    let database_url = database_url_from_env_value(std::env::var("DATABASE_URL").ok());
    let max_connections =
        max_connections_from_env_value(std::env::var("HMS_DB_MAX_CONNECTIONS").ok())?;
    let password_cost = password_cost_from_env_values(
        std::env::var("HMS_ARGON2_MEMORY_KIB").ok(),
        std::env::var("HMS_ARGON2_ITERATIONS").ok(),
    )?;
    CoreConfig::new(database_url, max_connections, password_cost)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_url_defaults_when_blank() {
        assert_eq!(database_url_from_env_value(None), DEFAULT_DATABASE_URL);
        assert_eq!(
            database_url_from_env_value(Some("   ".into())),
            DEFAULT_DATABASE_URL
        );
        assert_eq!(
            database_url_from_env_value(Some(" sqlite://x.db ".into())),
            "sqlite://x.db"
        );
    }

    #[test]
    fn max_connections_rejects_garbage() {
        assert_eq!(max_connections_from_env_value(None).unwrap(), 5);
        assert_eq!(max_connections_from_env_value(Some("8".into())).unwrap(), 8);
        assert!(matches!(
            max_connections_from_env_value(Some("eight".into())),
            Err(HmsError::Validation(_))
        ));
    }

    #[test]
    fn password_cost_falls_back_per_field() {
        let cost = password_cost_from_env_values(Some("4096".into()), None)
            .expect("valid overrides should parse");
        assert_eq!(cost.memory_kib, 4096);
        assert_eq!(cost.iterations, PasswordCost::RECOMMENDED.iterations);
    }

    #[test]
    fn new_rejects_invalid_values() {
        assert!(CoreConfig::new("".into(), 1, PasswordCost::MINIMAL).is_err());
        assert!(CoreConfig::new("sqlite::memory:".into(), 0, PasswordCost::MINIMAL).is_err());
        let too_cheap = PasswordCost {
            memory_kib: 1,
            iterations: 1,
        };
        assert!(CoreConfig::new("sqlite::memory:".into(), 1, too_cheap).is_err());
    }
}
