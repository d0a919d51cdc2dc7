use std::env;
use std::str::FromStr;

/// Retrieves an environment variable and parses it, falling back to the
/// default when the variable is unset or does not parse.
///
/// # Arguments
/// - `var`: The name of the environment variable.
/// - `default`: Value to use when the variable is missing or invalid.
pub fn env_parse_or<T>(var: &str, default: T) -> T
where
    T: FromStr,
{
    match env::var(var) {
        Ok(value) => value.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

/// Retrieves an environment variable, falling back to a default string.
pub fn env_or(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}
