//! Configuration for onboard-daemon

use serde::{Deserialize, Serialize};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Messaging workspace (channels, membership, notifications)
    #[serde(default)]
    pub slack: SlackConfig,

    /// E-signature platform
    #[serde(default)]
    pub eformsign: EformsignConfig,

    /// Join-invite mail relay
    #[serde(default)]
    pub mail: MailConfig,

    /// Notification targets and message content
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (for development/testing)
    #[default]
    Memory,

    /// PostgreSQL storage
    Postgres {
        /// Connection URL
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,

        /// Connection timeout in seconds
        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Maximum records claimed per tick
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Name of the lease serializing ticks across processes
    #[serde(default = "default_lock_key")]
    pub lock_key: String,

    /// Lease lifetime; an abandoned lease is free after this
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl_secs: u64,

    /// Age after which a `Processing` claim is re-eligible
    #[serde(default = "default_stale_processing")]
    pub stale_processing_secs: u64,
}

impl SchedulerConfig {
    /// A claim must outlive the lease; otherwise a second daemon could take
    /// the lease and re-claim records the first one is still working on
    pub fn validate(&self) -> Result<(), String> {
        if self.lease_ttl_secs == 0 {
            return Err("scheduler.lease_ttl_secs must be positive".to_string());
        }
        if self.stale_processing_secs <= self.lease_ttl_secs {
            return Err(format!(
                "scheduler.stale_processing_secs ({}) must exceed scheduler.lease_ttl_secs ({})",
                self.stale_processing_secs, self.lease_ttl_secs
            ));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            batch_size: default_batch_size(),
            lock_key: default_lock_key(),
            lease_ttl_secs: default_lease_ttl(),
            stale_processing_secs: default_stale_processing(),
        }
    }
}

/// Slack Web API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// API base URL
    #[serde(default = "default_slack_base_url")]
    pub base_url: String,

    /// Bot token
    #[serde(default)]
    pub bot_token: String,

    /// Prepended to the company name before slugging
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,

    /// Create private channels
    #[serde(default = "default_true")]
    pub private_channels: bool,

    /// Operators invited to every new channel
    #[serde(default)]
    pub admin_user_ids: Vec<String>,

    /// Fail channel creation when an admin cannot be invited
    #[serde(default)]
    pub require_admin_invite: bool,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            base_url: default_slack_base_url(),
            bot_token: String::new(),
            channel_prefix: default_channel_prefix(),
            private_channels: true,
            admin_user_ids: Vec::new(),
            require_admin_invite: false,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// eformsign configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EformsignConfig {
    /// Token endpoint base URL
    #[serde(default = "default_eformsign_base_url")]
    pub base_url: String,

    /// Document API base URL, used when the token response carries none
    #[serde(default)]
    pub api_url: Option<String>,

    #[serde(default)]
    pub api_key: String,

    /// Bearer value for the `eformsign_signature` header
    #[serde(default)]
    pub signature_bearer: String,

    #[serde(default)]
    pub member_id: String,

    /// Template used for flat-rate contracts
    #[serde(default)]
    pub flat_rate_template_id: Option<String>,

    /// Template used for tiered contracts
    #[serde(default)]
    pub tiered_template_id: Option<String>,

    #[serde(default = "default_document_name")]
    pub document_name: String,

    #[serde(default = "default_document_comment")]
    pub document_comment: String,

    /// Days the recipient has to sign
    #[serde(default = "default_valid_days")]
    pub valid_days: u32,

    /// Request timeout in seconds
    #[serde(default = "default_eformsign_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for EformsignConfig {
    fn default() -> Self {
        Self {
            base_url: default_eformsign_base_url(),
            api_url: None,
            api_key: String::new(),
            signature_bearer: String::new(),
            member_id: String::new(),
            flat_rate_template_id: None,
            tiered_template_id: None,
            document_name: default_document_name(),
            document_comment: default_document_comment(),
            valid_days: default_valid_days(),
            request_timeout_secs: default_eformsign_timeout(),
        }
    }
}

/// Mail relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Relay endpoint accepting `{from, to, subject, text, html}`
    #[serde(default)]
    pub relay_url: String,

    /// Optional bearer token for the relay
    #[serde(default)]
    pub relay_token: Option<String>,

    #[serde(default = "default_mail_from")]
    pub from: String,

    /// Workspace sign-up link put in the invite mail
    #[serde(default)]
    pub workspace_join_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            relay_url: String::new(),
            relay_token: None,
            from: default_mail_from(),
            workspace_join_url: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Operations channel receiving every notice
    #[serde(default)]
    pub broadcast_channel: Option<String>,

    /// Commerce-portal login page shown in the credentials tip
    #[serde(default)]
    pub portal_login_url: Option<String>,

    /// Shared portal account shown in the credentials tip
    #[serde(default)]
    pub portal_account: Option<String>,

    /// Channels linked as guides in the credentials tip
    #[serde(default)]
    pub guide_channels: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_tick_interval() -> u64 {
    30
}

fn default_batch_size() -> usize {
    10
}

fn default_lock_key() -> String {
    "job_supplier_slack".to_string()
}

fn default_lease_ttl() -> u64 {
    300
}

fn default_stale_processing() -> u64 {
    900
}

fn default_slack_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_channel_prefix() -> String {
    "vendor-".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_eformsign_base_url() -> String {
    "https://service.eformsign.com/v2.0".to_string()
}

fn default_document_name() -> String {
    "Supplier contract".to_string()
}

fn default_document_comment() -> String {
    "Please review and sign the supplier contract.".to_string()
}

fn default_valid_days() -> u32 {
    7
}

fn default_eformsign_timeout() -> u64 {
    15
}

fn default_mail_from() -> String {
    "noreply@example.com".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration from defaults, an optional file and `ONBOARD_*` env vars
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // e.g. ONBOARD_SCHEDULER__BATCH_SIZE=20
        builder = builder.add_source(
            config::Environment::with_prefix("ONBOARD")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("slack.admin_user_ids")
                .with_list_parse_key("notifications.guide_channels")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate().map_err(config::ConfigError::Message)?;
        Ok(config)
    }

    /// Cross-field checks that serde defaults cannot express
    pub fn validate(&self) -> Result<(), String> {
        self.scheduler.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert_eq!(config.logging.level, "info");
        assert!(config.notifications.broadcast_channel.is_none());
    }

    #[test]
    fn test_scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.tick_interval_secs, 30);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.lock_key, "job_supplier_slack");
        assert!(config.stale_processing_secs > config.lease_ttl_secs);
    }

    #[test]
    fn test_claim_staleness_must_exceed_lease_ttl() {
        assert!(SchedulerConfig::default().validate().is_ok());

        let equal = SchedulerConfig {
            lease_ttl_secs: 300,
            stale_processing_secs: 300,
            ..SchedulerConfig::default()
        };
        let err = equal.validate().unwrap_err();
        assert!(err.contains("stale_processing_secs"));

        let shorter = SchedulerConfig {
            lease_ttl_secs: 60,
            stale_processing_secs: 1,
            ..SchedulerConfig::default()
        };
        assert!(shorter.validate().is_err());

        let zero_ttl = SchedulerConfig {
            lease_ttl_secs: 0,
            ..SchedulerConfig::default()
        };
        assert!(zero_ttl.validate().is_err());
    }

    #[test]
    fn test_slack_defaults() {
        let config = SlackConfig::default();
        assert_eq!(config.channel_prefix, "vendor-");
        assert!(config.private_channels);
        assert!(!config.require_admin_invite);
    }

    #[test]
    fn test_postgres_storage_from_json() {
        let storage: StorageConfig = serde_json::from_value(serde_json::json!({
            "type": "postgres",
            "url": "postgres://localhost/onboard"
        }))
        .unwrap();
        match storage {
            StorageConfig::Postgres {
                max_connections,
                connect_timeout_secs,
                ..
            } => {
                assert_eq!(max_connections, 10);
                assert_eq!(connect_timeout_secs, 5);
            }
            StorageConfig::Memory => panic!("expected postgres"),
        }
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.scheduler.batch_size, 10);
        assert_eq!(config.eformsign.valid_days, 7);
    }
}
