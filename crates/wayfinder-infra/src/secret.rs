//! Environment-backed secrets.
//!
//! API keys are read from environment variables only and wrapped in
//! [`SecretString`] so they never appear in `Debug` output or logs.

use secrecy::SecretString;

/// Key for the OpenAI-compatible embedding and chat endpoints.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Token for the NocoDB record store.
pub const NOCODB_API_TOKEN: &str = "NOCODB_API_TOKEN";

/// Read a non-empty environment variable as a secret.
///
/// Unset, empty, and non-Unicode values are all treated as absent.
pub fn env_secret(key: &str) -> Option<SecretString> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(SecretString::from(value.trim().to_string())),
        _ => None,
    }
}

/// Secrets resolved once at startup.
#[derive(Default)]
pub struct Secrets {
    pub openai_api_key: Option<SecretString>,
    pub nocodb_api_token: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: env_secret(OPENAI_API_KEY),
            nocodb_api_token: env_secret(NOCODB_API_TOKEN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_missing_variable_is_none() {
        assert!(env_secret("WAYFINDER_TEST_SURELY_UNSET_VARIABLE").is_none());
    }

    #[test]
    fn test_present_variable_is_wrapped() {
        let key = "WAYFINDER_TEST_SECRET_PRESENT";
        // SAFETY: test-local variable name, not read by other tests.
        unsafe { std::env::set_var(key, "  sk-test  ") };
        let secret = env_secret(key).unwrap();
        assert_eq!(secret.expose_secret(), "sk-test");
        unsafe { std::env::remove_var(key) };
    }
}
