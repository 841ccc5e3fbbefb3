//! API key lookup

use secrecy::SecretString;

/// Environment variable holding the RunPod API key
pub const API_KEY_ENV: &str = "RUNPOD_API_KEY";

/// Read the API key from the process environment
///
/// Only the CLI calls this; the pipeline receives the key through
/// [`ClientOptions`](crate::app::options::ClientOptions).
pub fn api_key_from_env() -> Option<SecretString> {
    api_key_from_value(std::env::var(API_KEY_ENV).ok())
}

/// Treat missing and blank values alike
pub fn api_key_from_value(value: Option<String>) -> Option<SecretString> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}
