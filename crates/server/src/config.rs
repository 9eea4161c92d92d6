use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: u64,
    /// Registration is limited to this email domain; empty disables the check
    #[serde(default = "default_email_domain")]
    pub allowed_email_domain: String,
    #[serde(default = "default_otp_ttl_minutes")]
    pub otp_ttl_minutes: i64,
    #[serde(default = "default_otp_max_attempts")]
    pub otp_max_attempts: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS, usually port 465
    Ssl,
    /// STARTTLS upgrade, usually port 587
    Starttls,
    /// Plain connection (local relays only)
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub enabled: bool,
    /// Use local sendmail binary instead of SMTP server
    #[serde(default)]
    pub use_sendmail: bool,
    /// SMTP server host (only used if use_sendmail is false)
    #[serde(default)]
    pub host: String,
    /// SMTP server port (only used if use_sendmail is false)
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default = "default_smtp_security")]
    pub security: SmtpSecurity,
    /// SMTP username (only used if use_sendmail is false)
    #[serde(default)]
    pub username: String,
    /// SMTP password (only used if use_sendmail is false)
    #[serde(default)]
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    /// Where undelivered mail is appended when no transport is configured
    #[serde(default = "default_dev_log")]
    pub dev_log: String,
    #[serde(default = "default_send_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub enabled: bool,
}

fn default_email_domain() -> String { "student.kpu.ca".to_string() }
fn default_otp_ttl_minutes() -> i64 { 10 }
fn default_otp_max_attempts() -> i64 { 5 }
fn default_smtp_port() -> u16 { 587 }
fn default_smtp_security() -> SmtpSecurity { SmtpSecurity::Starttls }
fn default_dev_log() -> String { "./data/otp_dev.log".to_string() }
fn default_send_timeout() -> u64 { 10 }

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            use_sendmail: false,
            host: "".to_string(),
            port: 587,
            security: SmtpSecurity::Starttls,
            username: "".to_string(),
            password: "".to_string(),
            from_email: "noreply@errandbuddy.app".to_string(),
            from_name: "ErrandBuddy".to_string(),
            dev_log: default_dev_log(),
            timeout_secs: default_send_timeout(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
            },
            database: DatabaseConfig {
                path: "./data/errandbuddy.db".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "jwt-secret-key".to_string(),
                token_expiry_hours: 24,
                allowed_email_domain: default_email_domain(),
                otp_ttl_minutes: default_otp_ttl_minutes(),
                otp_max_attempts: default_otp_max_attempts(),
            },
            smtp: SmtpConfig::default(),
            realtime: RealtimeConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env();
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        // Try to load from environment variable
        if let Ok(path) = std::env::var("ERRANDBUDDY_CONFIG") {
            return Self::load_from_path(&PathBuf::from(path));
        }

        // Try to load from default locations
        let default_paths = vec![
            PathBuf::from("errandbuddy-server.toml"),
            PathBuf::from("config/errandbuddy-server.toml"),
            PathBuf::from("/etc/errandbuddy/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        // Return default config if no file found
        tracing::warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Environment variables win over the file; SMTP is switched on when a host is given.
    fn apply_env(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(secret) = var("JWT_SECRET_KEY") {
            self.auth.jwt_secret = secret;
        }
        if let Some(path) = var("DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(path) = var("OTP_LOG") {
            self.smtp.dev_log = path;
        }
        if let Some(host) = var("SMTP_HOST") {
            self.smtp.host = host;
            self.smtp.enabled = true;
            self.smtp.use_sendmail = false;
        }
        if let Some(port) = var("SMTP_PORT").and_then(|p| p.parse().ok()) {
            self.smtp.port = port;
        }
        if let Some(user) = var("SMTP_USER") {
            self.smtp.username = user;
        }
        if let Some(password) = var("SMTP_PASSWORD") {
            self.smtp.password = password;
        }
        if let Some(from) = var("SMTP_FROM") {
            self.smtp.from_email = from;
        }
        if self.smtp.port == 465 {
            self.smtp.security = SmtpSecurity::Ssl;
        }
    }
}
