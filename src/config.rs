use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub uploads: UploadConfig,
    pub sync: SyncConfig,
    pub drive: Option<DriveConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Extra ports tried, one after another, when the configured one is taken
    pub port_fallback_attempts: u16,
    pub public_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_files_per_field: usize,
    pub max_body_bytes: usize,
    /// `DOC_<protocol>_<date>` when true, `DOC_<date>` otherwise
    pub include_protocol_in_name: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub enabled: bool,
    /// 0 means no limit
    pub max_concurrency: usize,
}

/// OAuth2 credentials and endpoints for the Google Drive mirror.
#[derive(Clone, Deserialize)]
pub struct DriveConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub refresh_token: String,
    pub token_url: String,
    pub api_url: String,
    pub parent_folder_id: Option<String>,
}

impl std::fmt::Debug for DriveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("redirect_uri", &self.redirect_uri)
            .field("refresh_token", &"***")
            .field("token_url", &self.token_url)
            .field("api_url", &self.api_url)
            .field("parent_folder_id", &self.parent_folder_id)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 3000,
                host: "0.0.0.0".to_string(),
                port_fallback_attempts: 10,
                public_dir: PathBuf::from("public"),
            },
            uploads: UploadConfig {
                dir: PathBuf::from("uploads"),
                max_files_per_field: 20,
                max_body_bytes: 100 * 1024 * 1024,
                include_protocol_in_name: true,
            },
            sync: SyncConfig {
                enabled: false,
                max_concurrency: 8,
            },
            drive: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let drive = DriveConfig::from_env();
        let enabled = match env::var("SYNC_ENABLED") {
            Ok(v) if v.eq_ignore_ascii_case("auto") => drive.is_some(),
            Ok(v) => v.parse::<bool>()?,
            Err(_) => drive.is_some(),
        };
        if enabled && drive.is_none() {
            anyhow::bail!(
                "SYNC_ENABLED is true but GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET and GOOGLE_REFRESH_TOKEN are not all set"
            );
        }

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| defaults.server.port.to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or(defaults.server.host),
                port_fallback_attempts: env::var("PORT_FALLBACK_ATTEMPTS")
                    .unwrap_or_else(|_| defaults.server.port_fallback_attempts.to_string())
                    .parse()?,
                public_dir: env::var("PUBLIC_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.server.public_dir),
            },
            uploads: UploadConfig {
                dir: env::var("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.uploads.dir),
                max_files_per_field: env::var("UPLOAD_MAX_FILES")
                    .unwrap_or_else(|_| defaults.uploads.max_files_per_field.to_string())
                    .parse()?,
                max_body_bytes: env::var("UPLOAD_MAX_BODY_BYTES")
                    .unwrap_or_else(|_| defaults.uploads.max_body_bytes.to_string())
                    .parse()?,
                include_protocol_in_name: env::var("UPLOAD_INCLUDE_PROTOCOL")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
            },
            sync: SyncConfig {
                enabled,
                max_concurrency: env::var("SYNC_MAX_CONCURRENCY")
                    .unwrap_or_else(|_| defaults.sync.max_concurrency.to_string())
                    .parse()?,
            },
            drive,
        })
    }
}

impl DriveConfig {
    /// Returns `None` unless the client id, secret and refresh token are all present.
    pub fn from_env() -> Option<Self> {
        let client_id = non_empty_var("GOOGLE_CLIENT_ID")?;
        let client_secret = non_empty_var("GOOGLE_CLIENT_SECRET")?;
        let refresh_token = non_empty_var("GOOGLE_REFRESH_TOKEN")?;

        Some(Self {
            client_id,
            client_secret,
            redirect_uri: env::var("GOOGLE_REDIRECT_URI").unwrap_or_default(),
            refresh_token,
            token_url: env::var("GOOGLE_TOKEN_URL")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string()),
            api_url: env::var("GOOGLE_DRIVE_API_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com".to_string()),
            parent_folder_id: non_empty_var("GOOGLE_DRIVE_PARENT_ID"),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.uploads.dir, PathBuf::from("uploads"));
        assert!(config.uploads.include_protocol_in_name);
        assert!(!config.sync.enabled);
    }

    #[test]
    fn test_drive_config_debug_hides_secrets() {
        let drive = DriveConfig {
            client_id: "client".to_string(),
            client_secret: "very-secret".to_string(),
            redirect_uri: String::new(),
            refresh_token: "1//refresh".to_string(),
            token_url: "http://localhost/token".to_string(),
            api_url: "http://localhost".to_string(),
            parent_folder_id: None,
        };
        let rendered = format!("{:?}", drive);
        assert!(rendered.contains("client"));
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("1//refresh"));
    }
}
