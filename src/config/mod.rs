use serde::Deserialize;
use std::time::Duration;

use crate::services::verdict::VerdictPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Prometheus scrape address for the worker process
    #[serde(default = "default_worker_metrics_addr")]
    pub worker_metrics_addr: String,

    /// PostgreSQL connection string for the status store
    pub database_url: String,

    /// Redis connection string for the job queue
    pub redis_url: String,

    /// Queue name; Redis keys are derived from it
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Blob bucket holding uploaded images
    #[serde(default = "default_blob_bucket")]
    pub blob_bucket: String,

    /// S3-compatible endpoint URL
    pub blob_endpoint: String,

    /// S3 access key ID
    pub blob_access_key: String,

    /// S3 secret access key
    pub blob_secret_key: String,

    #[serde(default = "default_blob_region")]
    pub blob_region: String,

    /// Computer vision endpoint (e.g., "https://westeurope.api.cognitive.microsoft.com")
    pub vision_endpoint: String,

    /// Computer vision subscription key
    pub vision_key: String,

    /// Label that counts as a positive detection (exact, case-sensitive)
    #[serde(default = "default_target_label")]
    pub target_label: String,

    /// A detection must score strictly above this to count
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Validity window of the signed read URL handed to the classifier
    #[serde(default = "default_signed_url_ttl_secs")]
    pub signed_url_ttl_secs: u64,

    #[serde(default = "default_classifier_timeout_secs")]
    pub classifier_timeout_secs: u64,

    /// How long a consumed but unacknowledged message stays invisible
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Request body limit for uploads (base64 inflates images by a third)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_worker_metrics_addr() -> String {
    "0.0.0.0:9100".to_string()
}

fn default_queue_name() -> String {
    "photos-queue".to_string()
}

fn default_blob_bucket() -> String {
    "photos".to_string()
}

fn default_blob_region() -> String {
    "auto".to_string()
}

fn default_target_label() -> String {
    "Hot dog".to_string()
}

fn default_confidence_threshold() -> f64 {
    0.6
}

fn default_signed_url_ttl_secs() -> u64 {
    86_400
}

fn default_classifier_timeout_secs() -> u64 {
    30
}

fn default_visibility_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_label.trim().is_empty() {
            return Err(ConfigError::Invalid("TARGET_LABEL must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "CONFIDENCE_THRESHOLD must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.signed_url_ttl_secs == 0 {
            return Err(ConfigError::Invalid("SIGNED_URL_TTL_SECS must be positive".to_string()));
        }
        // A lease must outlive one classifier call or a healthy attempt gets redelivered.
        if self.visibility_timeout_secs <= self.classifier_timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "VISIBILITY_TIMEOUT_SECS ({}) must exceed CLASSIFIER_TIMEOUT_SECS ({})",
                self.visibility_timeout_secs, self.classifier_timeout_secs
            )));
        }
        Ok(())
    }

    pub fn verdict_policy(&self) -> VerdictPolicy {
        VerdictPolicy::new(self.target_label.clone(), self.confidence_threshold)
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier_timeout_secs)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required_vars() -> Vec<(String, String)> {
        [
            ("DATABASE_URL", "postgres://localhost/hotdog"),
            ("REDIS_URL", "redis://localhost"),
            ("BLOB_ENDPOINT", "http://localhost:9000"),
            ("BLOB_ACCESS_KEY", "access"),
            ("BLOB_SECRET_KEY", "secret"),
            ("VISION_ENDPOINT", "https://vision.example.com"),
            ("VISION_KEY", "key"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = envy::from_iter(required_vars()).unwrap();
        assert_eq!(config.target_label, "Hot dog");
        assert_eq!(config.confidence_threshold, 0.6);
        assert_eq!(config.queue_name, "photos-queue");
        assert_eq!(config.blob_bucket, "photos");
        assert_eq!(config.signed_url_ttl(), Duration::from_secs(86_400));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut vars = required_vars();
        vars.push(("TARGET_LABEL".to_string(), "Pizza".to_string()));
        vars.push(("CONFIDENCE_THRESHOLD".to_string(), "0.8".to_string()));
        let config: AppConfig = envy::from_iter(vars).unwrap();

        let policy = config.verdict_policy();
        assert_eq!(policy.target_label, "Pizza");
        assert_eq!(policy.confidence_threshold, 0.8);
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        let mut vars = required_vars();
        vars.push(("CONFIDENCE_THRESHOLD".to_string(), "1.5".to_string()));
        let config: AppConfig = envy::from_iter(vars).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_visibility_timeout_not_above_classifier_timeout() {
        let with_timeouts = |visibility: &str| {
            let mut vars = required_vars();
            vars.push(("CLASSIFIER_TIMEOUT_SECS".to_string(), "60".to_string()));
            vars.push(("VISIBILITY_TIMEOUT_SECS".to_string(), visibility.to_string()));
            envy::from_iter::<_, AppConfig>(vars).unwrap()
        };

        assert!(matches!(with_timeouts("60").validate(), Err(ConfigError::Invalid(_))));
        assert!(matches!(with_timeouts("10").validate(), Err(ConfigError::Invalid(_))));
        assert!(with_timeouts("61").validate().is_ok());
    }

    #[test]
    fn test_missing_required_var() {
        let result: Result<AppConfig, _> = envy::from_iter(Vec::<(String, String)>::new());
        assert!(result.is_err());
    }
}
