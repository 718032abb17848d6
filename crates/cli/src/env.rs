use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::CliError;

/// Process environment merged with an optional .env file.
///
/// Values from the file win over the process environment.
#[derive(Debug, Clone)]
pub struct EnvManager {
    vars: HashMap<String, String>,
    sensitive_patterns: Vec<String>,
}

impl EnvManager {
    pub fn new() -> Self {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        Self {
            vars,
            sensitive_patterns: Self::default_sensitive_patterns(),
        }
    }

    /// Process environment plus `env_file` when one is given.
    pub fn load(env_file: Option<&Path>) -> Result<Self, CliError> {
        let mut env = Self::new();
        if let Some(path) = env_file {
            env.load_from_file(path)?;
        }
        Ok(env)
    }

    /// Load variables from a .env file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CliError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read env file {}: {}", path.display(), e))
        })?;

        let loaded = self.parse_env_content(&content)?;
        for key in &loaded {
            debug!(key = %key, value = %self.display_value(key), "Loaded variable from env file");
        }
        Ok(())
    }

    pub fn all(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// The value of `key` fit for logs: masked when the name looks secret.
    pub fn display_value(&self, key: &str) -> String {
        match self.vars.get(key) {
            Some(_) if self.is_sensitive(key) => "****".to_string(),
            Some(value) => value.clone(),
            None => String::new(),
        }
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.sensitive_patterns
            .iter()
            .any(|pattern| key.contains(pattern.as_str()))
    }

    /// Returns the keys that were read, in file order.
    fn parse_env_content(&mut self, content: &str) -> Result<Vec<String>, CliError> {
        let mut loaded = Vec::new();

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // `export KEY=VALUE` is accepted as shells write it
            let line = line.strip_prefix("export ").unwrap_or(line);

            let Some((key, value)) = line.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid env file: malformed line {} (expected KEY=VALUE)",
                    line_num + 1
                )));
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(CliError::Config(format!(
                    "Invalid env file: empty key at line {}",
                    line_num + 1
                )));
            }

            self.vars
                .insert(key.to_string(), Self::unquote_value(value));
            loaded.push(key.to_string());
        }

        Ok(loaded)
    }

    fn unquote_value(value: &str) -> String {
        let value = value.trim();

        for quote in ['"', '\''] {
            if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
                return value[1..value.len() - 1].to_string();
            }
        }

        value.to_string()
    }

    /// Default patterns for sensitive variable detection
    fn default_sensitive_patterns() -> Vec<String> {
        [
            "password",
            "passwd",
            "secret",
            "token",
            "key",
            "auth",
            "credential",
            "private",
            "database_url",
            "database_public_url",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

impl Default for EnvManager {
    fn default() -> Self {
        Self::new()
    }
}
