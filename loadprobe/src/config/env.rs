use std::{collections::HashMap, sync::Arc};

/// Environment key holding the url the script sends its GET request to.
pub const TARGET_URL_ENV_KEY: &str = "TEST_URL";

/// Variables visible to the probe script.
///
/// Explicit overrides (e.g. `-e KEY=VALUE`) take precedence
/// over the process environment, which can be excluded entirely.
#[derive(Debug, Clone)]
pub struct ScriptEnv {
    overrides: Arc<HashMap<String, String>>,
    include_system_env: bool,
}

impl Default for ScriptEnv {
    fn default() -> Self {
        Self {
            overrides: Default::default(),
            include_system_env: true,
        }
    }
}

impl ScriptEnv {
    pub fn new(
        overrides: impl IntoIterator<Item = (String, String)>,
        include_system_env: bool,
    ) -> Self {
        Self {
            overrides: Arc::new(overrides.into_iter().collect()),
            include_system_env,
        }
    }

    /// Variables from the given overrides only.
    pub fn isolated(overrides: impl IntoIterator<Item = (String, String)>) -> Self {
        Self::new(overrides, false)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.overrides.get(key) {
            return Some(value.clone());
        }
        if self.include_system_env {
            return std::env::var(key).ok();
        }
        None
    }

    /// The target url as-is, empty if not defined.
    ///
    /// No validation happens here: an empty or invalid
    /// url is only rejected by the http client.
    pub fn target_url(&self) -> String {
        self.get(TARGET_URL_ENV_KEY).unwrap_or_default()
    }
}

/// Parse a `KEY=VALUE` pair, splitting on the first `=`.
pub fn parse_env_pair(input: &str) -> Result<(String, String), String> {
    let Some((key, value)) = input.split_once('=') else {
        return Err(format!("invalid env pair '{input}': expected KEY=VALUE"));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid env pair '{input}': empty key"));
    }
    Ok((key.to_owned(), value.to_owned()))
}
