use crate::error::{ApiError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

/// API credentials. An empty user list leaves the API open (development mode).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub users: Vec<ApiUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub username: String,
    pub password: String,
    pub token: String,
}

fn default_port() -> u16 {
    8000
}

fn default_db_path() -> String {
    "data/aaps.db".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

impl Config {
    /// Load `config.toml` from the working directory, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            ApiError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn auth_enabled(&self) -> bool {
        !self.auth.users.is_empty()
    }

    pub fn user_for_token(&self, token: &str) -> Option<&ApiUser> {
        self.auth.users.iter().find(|u| u.token == token)
    }

    pub fn user_for_credentials(&self, username: &str, password: &str) -> Option<&ApiUser> {
        self.auth
            .users
            .iter()
            .find(|u| u.username == username && u.password == password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load_from("does-not-exist.toml").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.path, "data/aaps.db");
        assert!(!config.auth_enabled());
    }

    #[test]
    fn parses_auth_users() {
        let toml = r#"
            [server]
            port = 9000

            [[auth.users]]
            username = "admin-der"
            password = "secret"
            token = "tok-123"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(config.user_for_token("tok-123").is_some());
        assert!(config.user_for_credentials("admin-der", "secret").is_some());
        assert!(config.user_for_credentials("admin-der", "wrong").is_none());
    }
}
