use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,
    pub api_prefix: String,

    // Rate limiting
    pub rate_per_min: u32,

    // Per-employee serialization of leave applications
    pub lock_idle_secs: u64,
    pub db_lock_timeout_secs: u32,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),
            rate_per_min: parsed_or("RATE_PER_MIN", 1000)?,
            lock_idle_secs: parsed_or("LOCK_IDLE_SECS", 300)?, // default 5 min
            db_lock_timeout_secs: parsed_or("DB_LOCK_TIMEOUT_SECS", 10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparsable_numbers_are_reported_by_name() {
        // name is unique to this test so parallel tests cannot interfere
        unsafe { env::set_var("HRM_TEST_BAD_NUMBER", "lots") };
        let err = parsed_or::<u32>("HRM_TEST_BAD_NUMBER", 1).unwrap_err();
        assert!(err.to_string().contains("HRM_TEST_BAD_NUMBER"));
    }

    #[test]
    fn absent_optional_values_fall_back_to_the_default() {
        assert_eq!(parsed_or::<u64>("HRM_TEST_NEVER_SET", 300).unwrap(), 300);
    }
}
