use std::path::PathBuf;

use anyhow::{bail, Result};
use reel_blob::{Registration, UploadConfig, UploadRules};
use reel_core::{ReelConfig, ReelConfigSnapshot};

/// Environment prefix: `REEL__HTTP__PORT` sets `http.port`
pub const ENV_PREFIX: &str = "REEL__";

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "reel_server=info,reel_blob=info,reel_axum=info,tower_http=info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Fs { root: PathBuf },
    S3 { bucket: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobsBackend {
    Memory,
    Fs { root: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
    pub auth_token: Option<String>,
    pub storage: StorageBackend,
    pub key_prefix: String,
    pub jobs: JobsBackend,
    pub upload: UploadConfig,
}

impl Settings {
    /// Defaults overlaid with `REEL__*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = ReelConfig::new();
        config.load_env(ENV_PREFIX);
        Self::from_config(&config)
    }

    pub fn from_config(config: &ReelConfig) -> Result<Self> {
        let c = config.snapshot();

        let storage = match c.get("storage.backend").unwrap_or("fs") {
            "memory" => StorageBackend::Memory,
            "fs" => StorageBackend::Fs {
                root: PathBuf::from(c.get("storage.root").unwrap_or("data/blobs")),
            },
            "s3" => match c.get_string("storage.bucket") {
                Some(bucket) => StorageBackend::S3 { bucket },
                None => bail!("storage.bucket is required for the s3 backend"),
            },
            other => bail!("unknown storage.backend: {other}"),
        };

        let jobs = match c.get("jobs.backend").unwrap_or("fs") {
            "memory" => JobsBackend::Memory,
            "fs" => JobsBackend::Fs {
                root: PathBuf::from(c.get("jobs.root").unwrap_or("data/jobs")),
            },
            other => bail!("unknown jobs.backend: {other}"),
        };

        let body_limit_mb: usize = c.get_or("http.body_limit_mb", 64);
        let Some(body_limit_bytes) = body_limit_mb.checked_mul(1024 * 1024) else {
            bail!("http.body_limit_mb is too large: {body_limit_mb}");
        };

        Ok(Self {
            host: c.get("http.host").unwrap_or("127.0.0.1").to_string(),
            port: c.get_or("http.port", 3030u16),
            body_limit_bytes,
            auth_token: c.get_string("auth.token"),
            storage,
            key_prefix: c.get("storage.prefix").unwrap_or("uploads").to_string(),
            jobs,
            upload: upload_config(&c)?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn upload_config(c: &ReelConfigSnapshot) -> Result<UploadConfig> {
    let defaults = UploadRules::default();
    let registration = match c.get("upload.registration") {
        Some(raw) => raw.parse::<Registration>()?,
        None => Registration::default(),
    };
    Ok(UploadConfig::new()
        .with_registration(registration)
        .with_upload_rules(
            UploadRules::new()
                .with_max_total_chunks(c.get_or("upload.max_total_chunks", defaults.max_total_chunks))
                .with_max_display_name_len(
                    c.get_or("upload.max_display_name", defaults.max_display_name_len),
                ),
        ))
}
