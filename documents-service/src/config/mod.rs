use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Default upload ceiling: 20 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub const DEFAULT_ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/tiff",
    "application/dicom",
    "text/plain",
];

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: String,
    pub s3_bucket: String,
    pub s3_region: Option<String>,
    /// S3-compatible endpoint override (MinIO in local deployments).
    pub s3_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

/// Limits applied to every upload before any I/O happens.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_size_bytes: usize,
    pub allowed_content_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_content_types: DEFAULT_ALLOWED_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UploadConfig {
    /// Compare on the essence (`type/subtype`), ignoring parameters and case.
    pub fn allows(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&essence))
    }
}

impl DocumentConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let max_size_bytes = match env::var("UPLOAD_MAX_SIZE_BYTES") {
            Ok(raw) => raw.parse::<usize>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "UPLOAD_MAX_SIZE_BYTES must be a positive integer: {}",
                    e
                ))
            })?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let allowed_content_types = match env::var("UPLOAD_ALLOWED_CONTENT_TYPES") {
            Ok(raw) => parse_content_types(&raw),
            Err(_) => UploadConfig::default().allowed_content_types,
        };

        Ok(DocumentConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("document_db"), is_prod)?,
            },
            storage: StorageConfig {
                backend: get_env("STORAGE_BACKEND", Some("local"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                local_path: get_env("STORAGE_LOCAL_PATH", Some("storage"), is_prod)?,
                s3_bucket: env::var("STORAGE_S3_BUCKET")
                    .unwrap_or_else(|_| "medical-documents".to_string()),
                s3_region: env::var("STORAGE_S3_REGION").ok(),
                s3_endpoint: env::var("STORAGE_S3_ENDPOINT").ok(),
            },
            upload: UploadConfig {
                max_size_bytes,
                allowed_content_types,
            },
        })
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

fn parse_content_types(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!("S3".parse::<StorageBackend>(), Ok(StorageBackend::S3));
        assert_eq!("local".parse::<StorageBackend>(), Ok(StorageBackend::Local));
        assert!("gcs".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_allow_list_ignores_parameters_and_case() {
        let upload = UploadConfig::default();
        assert!(upload.allows("application/pdf"));
        assert!(upload.allows("Text/Plain; charset=utf-8"));
        assert!(!upload.allows("application/x-msdownload"));
        assert!(!upload.allows(""));
    }

    #[test]
    fn test_parse_content_types_skips_blanks() {
        assert_eq!(
            parse_content_types("application/pdf, IMAGE/PNG,,"),
            vec!["application/pdf".to_string(), "image/png".to_string()]
        );
    }
}
