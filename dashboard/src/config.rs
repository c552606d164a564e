//! Dashboard configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use staker_types::{BlockNumber, EthAddress};

use crate::DashboardError;

/// Configuration for the staker dashboard.
///
/// Can be loaded from a TOML file via [`DashboardConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// JSON-RPC endpoint of the ledger node.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Address of the staking contract. Required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staker_address: Option<EthAddress>,

    /// Address of the external contract. Resolved through the staker when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_address: Option<EthAddress>,

    /// Node-managed account used as the caller and transaction sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<EthAddress>,

    /// Cadence of fixed-interval contract reads, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// How often block-triggered sources check for a new head, in milliseconds.
    #[serde(default = "default_block_poll_millis")]
    pub block_poll_millis: u64,

    /// First block scanned for `Stake` events.
    #[serde(default = "default_event_start_block")]
    pub event_start_block: u64,

    /// Receipt polling cadence for submitted transactions, in milliseconds.
    #[serde(default = "default_receipt_poll_millis")]
    pub receipt_poll_millis: u64,

    /// Give up waiting for a receipt after this many seconds.
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,

    /// Number of transaction notifications kept in the view.
    #[serde(default = "default_recent_tx_limit")]
    pub recent_tx_limit: usize,

    /// Whether to serve the browser dashboard.
    #[serde(default = "default_true")]
    pub enable_http: bool,

    /// HTTP port (if enabled).
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_block_poll_millis() -> u64 {
    1_000
}

fn default_event_start_block() -> u64 {
    1
}

fn default_receipt_poll_millis() -> u64 {
    500
}

fn default_receipt_timeout_secs() -> u64 {
    120
}

fn default_recent_tx_limit() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_http_port() -> u16 {
    3000
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl DashboardConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, DashboardError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DashboardError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, DashboardError> {
        toml::from_str(s).map_err(|e| DashboardError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, DashboardError> {
        toml::to_string_pretty(self).map_err(|e| DashboardError::Config(e.to_string()))
    }

    /// Reject configurations the dashboard cannot run with.
    pub fn validate(&self) -> Result<(), DashboardError> {
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(DashboardError::Config(format!(
                "rpc_url must be an http(s) URL, got {:?}",
                self.rpc_url
            )));
        }
        match self.staker_address {
            None => return Err(DashboardError::Config("staker_address is not set".into())),
            Some(address) if address.is_zero() => {
                return Err(DashboardError::Config("staker_address is the zero address".into()))
            }
            Some(_) => {}
        }
        let intervals = [
            ("poll_interval_secs", self.poll_interval_secs),
            ("block_poll_millis", self.block_poll_millis),
            ("receipt_poll_millis", self.receipt_poll_millis),
            ("receipt_timeout_secs", self.receipt_timeout_secs),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(DashboardError::Config(format!("{name} must be greater than zero")));
        }
        if self.recent_tx_limit == 0 {
            return Err(DashboardError::Config("recent_tx_limit must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn block_poll(&self) -> Duration {
        Duration::from_millis(self.block_poll_millis)
    }

    pub fn receipt_poll(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_millis)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn event_start(&self) -> BlockNumber {
        BlockNumber::new(self.event_start_block)
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            staker_address: None,
            external_address: None,
            account: None,
            poll_interval_secs: default_poll_interval_secs(),
            block_poll_millis: default_block_poll_millis(),
            event_start_block: default_event_start_block(),
            receipt_poll_millis: default_receipt_poll_millis(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            recent_tx_limit: default_recent_tx_limit(),
            enable_http: default_true(),
            http_port: default_http_port(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const STAKER: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

    #[test]
    fn default_config_round_trips_through_toml() {
        let mut config = DashboardConfig::default();
        config.staker_address = Some(STAKER.parse().unwrap());
        let toml_str = config.to_toml_string().unwrap();
        let parsed = DashboardConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.http_port, config.http_port);
        assert_eq!(parsed.staker_address, config.staker_address);
        assert_eq!(parsed.external_address, None);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = DashboardConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.recent_tx_limit, 10);
        assert_eq!(config.log_format, "human");
        assert!(config.enable_http);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = format!(
            r#"
            staker_address = "{STAKER}"
            http_port = 9999
            receipt_timeout_secs = 30
        "#
        );
        let config = DashboardConfig::from_toml_str(&toml).expect("should parse");
        assert_eq!(config.http_port, 9999);
        assert_eq!(config.receipt_timeout(), Duration::from_secs(30));
        assert_eq!(config.log_level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn malformed_address_is_a_config_error() {
        let err = DashboardConfig::from_toml_str(r#"staker_address = "0x12""#).unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));
    }

    #[test]
    fn missing_staker_fails_validation() {
        let err = DashboardConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("staker_address"));
    }

    #[test]
    fn zero_interval_fails_validation() {
        let config = DashboardConfig {
            staker_address: Some(STAKER.parse().unwrap()),
            block_poll_millis: 0,
            ..DashboardConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("block_poll_millis"));
    }

    #[test]
    fn non_http_rpc_url_fails_validation() {
        let config = DashboardConfig {
            staker_address: Some(STAKER.parse().unwrap()),
            rpc_url: "ws://localhost:8546".into(),
            ..DashboardConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "staker_address = \"{STAKER}\"").unwrap();
        writeln!(file, "account = \"0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266\"").unwrap();
        let config = DashboardConfig::from_toml_file(file.path()).unwrap();
        assert!(config.account.is_some());
        assert_eq!(config.event_start(), BlockNumber::new(1));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = DashboardConfig::from_toml_file("/nonexistent/staker.toml");
        assert!(matches!(result, Err(DashboardError::Config(_))));
    }
}
