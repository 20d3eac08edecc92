use chrono_tz::Tz;
use donasiin_shared::auth::Role;
use donasiin_shared::domain::{DEFAULT_MIN_DONATION, DEFAULT_WEEKLY_TARGET};
use serde::Deserialize;
use std::path::PathBuf;
use std::{env, fs, path::Path};

use crate::services::qris;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub listen_port: Option<u16>,
    #[serde(default)]
    pub dev_cors_origin: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    #[serde(default = "default_min_donation")]
    pub min_donation: i64,
    #[serde(default = "default_max_proof_bytes")]
    pub max_proof_bytes: usize,
    #[serde(default = "default_fallback_target")]
    pub fallback_target: i64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// HS256 secret used to sign (sqlite) or pre-verify (supabase) access tokens.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// Emails allowed to review donations. Empty means every signed-in user.
    #[serde(default)]
    pub admin_emails: Vec<String>,
    pub merchant: MerchantConfig,
    pub backend: BackendConfig,
    /// Local admin accounts, only used by the sqlite backend.
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Supabase {
        url: String,
        anon_key: String,
    },
    Sqlite {
        #[serde(default = "default_db_path")]
        db_path: String,
        #[serde(default = "default_files_dir")]
        files_dir: PathBuf,
        /// Prefix for public file URLs, e.g. `https://donasi.example.org`.
        #[serde(default)]
        public_base_url: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub email: String,
    pub password_hash: String, // bcrypt hash
}

#[derive(Debug, Clone, Deserialize)]
pub struct MerchantConfig {
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    pub merchant_id: String,
    #[serde(default = "default_acquirer_guid")]
    pub acquirer_guid: String,
    #[serde(default = "default_category_code")]
    pub category_code: String,
    /// National merchant id, emitted as a separate QRIS template when set.
    #[serde(default)]
    pub nmid: Option<String>,
}

fn default_timezone() -> Tz {
    chrono_tz::Asia::Jakarta
}
fn default_min_donation() -> i64 {
    DEFAULT_MIN_DONATION
}
fn default_max_proof_bytes() -> usize {
    5 * 1024 * 1024
}
fn default_fallback_target() -> i64 {
    DEFAULT_WEEKLY_TARGET
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_db_path() -> String {
    "data/app.db".to_string()
}
fn default_files_dir() -> PathBuf {
    PathBuf::from("data/files")
}
fn default_acquirer_guid() -> String {
    "ID.CO.QRIS.WWW".to_string()
}
fn default_category_code() -> String {
    "8398".to_string()
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Yaml(e) => write!(f, "YAML error: {}", e),
            ConfigError::Invalid(m) => write!(f, "invalid config: {}", m),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        ConfigError::Yaml(value)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load_from_path(path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(&path)?;
        let mut cfg: AppConfig = serde_yaml::from_str(&text)?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// `SUPABASE_URL`, `SUPABASE_ANON_KEY` and `DB_PATH` take precedence over the file.
    fn apply_env_overrides(&mut self) {
        match &mut self.backend {
            BackendConfig::Supabase { url, anon_key } => {
                if let Ok(v) = env::var("SUPABASE_URL") {
                    *url = v;
                }
                if let Ok(v) = env::var("SUPABASE_ANON_KEY") {
                    *anon_key = v;
                }
            }
            BackendConfig::Sqlite { db_path, .. } => {
                if let Ok(v) = env::var("DB_PATH") {
                    *db_path = v;
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_donation <= 0 {
            return Err(ConfigError::Invalid("min_donation must be positive".into()));
        }
        if self.max_proof_bytes == 0 {
            return Err(ConfigError::Invalid("max_proof_bytes must be positive".into()));
        }
        if self.fallback_target <= 0 {
            return Err(ConfigError::Invalid("fallback_target must be positive".into()));
        }
        if self.merchant.name.trim().is_empty() || self.merchant.merchant_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "merchant.name and merchant.merchant_id are required".into(),
            ));
        }
        qris::payment_payload(&self.merchant, self.min_donation)
            .map_err(|e| ConfigError::Invalid(format!("merchant: {e}")))?;
        match &self.backend {
            BackendConfig::Supabase { url, anon_key } => {
                if url.trim().is_empty() || anon_key.trim().is_empty() {
                    return Err(ConfigError::Invalid(
                        "supabase backend needs url and anon_key".into(),
                    ));
                }
            }
            BackendConfig::Sqlite { .. } => {
                if self.jwt_secret.as_deref().is_none_or(|s| s.trim().is_empty()) {
                    return Err(ConfigError::Invalid(
                        "sqlite backend needs jwt_secret to sign sessions".into(),
                    ));
                }
                if self.users.is_empty() {
                    tracing::warn!("sqlite backend has no users; admin login is disabled");
                }
            }
        }
        Ok(())
    }

    pub fn role_for(&self, email: &str) -> Role {
        if self.admin_emails.is_empty()
            || self
                .admin_emails
                .iter()
                .any(|a| a.eq_ignore_ascii_case(email.trim()))
        {
            Role::Admin
        } else {
            Role::Viewer
        }
    }

    pub fn backend_kind(&self) -> &'static str {
        match self.backend {
            BackendConfig::Supabase { .. } => "supabase",
            BackendConfig::Sqlite { .. } => "sqlite",
        }
    }
}
