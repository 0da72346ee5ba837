//! Secret provider adapters

use crate::ports::SecretProvider;

/// Environment variable holding the API token
pub const TOKEN_ENV: &str = "WALLETSYNC_TOKEN";

/// Reads the token from `WALLETSYNC_TOKEN`
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretProvider;

impl SecretProvider for EnvSecretProvider {
    fn has_token(&self) -> bool {
        self.read_token().is_some()
    }

    fn read_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Fixed token held in memory
#[derive(Debug, Default, Clone)]
pub struct StaticSecretProvider {
    token: Option<String>,
}

impl StaticSecretProvider {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token: token.map(str::to_string).filter(|t| !t.trim().is_empty()),
        }
    }
}

impl SecretProvider for StaticSecretProvider {
    fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn read_token(&self) -> Option<String> {
        self.token.clone()
    }
}
