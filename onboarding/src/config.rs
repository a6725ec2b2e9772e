use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tierpass_common::{
    config::{AUTO_APPROVE_THRESHOLD, VERSION},
    crypto::{Address, CryptoError},
};

use crate::logger::{default_logs_datetime_format, LogLevel};

// Registry deployment used when nothing is configured
pub const DEFAULT_CHAIN_ID: u64 = 11155111;
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
// Fees in wei
pub const DEFAULT_SUBMISSION_FEE: u64 = 1_000_000_000_000_000;
pub const DEFAULT_UPGRADE_FEE: u64 = 500_000_000_000_000;
// Seconds to wait for a transaction to be mined
pub const DEFAULT_CONFIRMATION_TIMEOUT: u64 = 120;
// Milliseconds between two receipt polls
pub const DEFAULT_CONFIRMATION_POLL_INTERVAL: u64 = 2000;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:3000";
// Seconds before a backend request is abandoned
pub const DEFAULT_BACKEND_TIMEOUT: u64 = 60;

// Functions Helpers
fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

fn default_contract_address() -> String {
    DEFAULT_CONTRACT_ADDRESS.to_owned()
}

fn default_submission_fee() -> u64 {
    DEFAULT_SUBMISSION_FEE
}

fn default_upgrade_fee() -> u64 {
    DEFAULT_UPGRADE_FEE
}

fn default_confirmation_timeout() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT
}

fn default_confirmation_poll_interval() -> u64 {
    DEFAULT_CONFIRMATION_POLL_INTERVAL
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_owned()
}

fn default_backend_timeout() -> u64 {
    DEFAULT_BACKEND_TIMEOUT
}

fn default_auto_approve_threshold() -> u8 {
    AUTO_APPROVE_THRESHOLD
}

fn default_log_filename() -> String {
    String::from("tierpass.log")
}

fn default_logs_path() -> String {
    String::from("logs/")
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain id the KYC registry is deployed on
    #[clap(long, default_value_t = DEFAULT_CHAIN_ID)]
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// KYC registry contract address
    #[clap(long, default_value_t = default_contract_address())]
    #[serde(default = "default_contract_address")]
    pub contract_address: String,
    /// Fee attached to `submitKYC`, in wei
    #[clap(long, default_value_t = DEFAULT_SUBMISSION_FEE)]
    #[serde(default = "default_submission_fee")]
    pub submission_fee: u64,
    /// Fee attached to `requestUpgrade`, in wei
    #[clap(long, default_value_t = DEFAULT_UPGRADE_FEE)]
    #[serde(default = "default_upgrade_fee")]
    pub upgrade_fee: u64,
    /// Seconds to wait for the tier request transaction to be confirmed
    #[clap(long, default_value_t = DEFAULT_CONFIRMATION_TIMEOUT)]
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout: u64,
    /// Milliseconds between two receipt polls
    #[clap(long, default_value_t = DEFAULT_CONFIRMATION_POLL_INTERVAL)]
    #[serde(default = "default_confirmation_poll_interval")]
    pub confirmation_poll_interval: u64,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the verification backend
    #[clap(long, default_value_t = default_backend_url())]
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Backend request timeout in seconds
    #[clap(long, default_value_t = DEFAULT_BACKEND_TIMEOUT)]
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout: u64,
    /// Minimum verification score for auto approval (0-100)
    #[clap(long, default_value_t = AUTO_APPROVE_THRESHOLD)]
    #[serde(default = "default_auto_approve_threshold")]
    pub auto_approve_threshold: u8,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct LogConfig {
    /// Set log level
    #[clap(long, value_enum, default_value_t)]
    #[serde(default)]
    pub log_level: LogLevel,
    /// Set file log level
    /// By default, it will be the same as log level
    #[clap(long, value_enum)]
    pub file_log_level: Option<LogLevel>,
    /// Disable the log file
    #[clap(long)]
    #[serde(default)]
    pub disable_file_logging: bool,
    /// Disable the log filename date based
    /// If disabled, the log file will be named tierpass.log instead of YYYY-MM-DD.tierpass.log
    #[clap(long)]
    #[serde(default)]
    pub disable_file_log_date_based: bool,
    /// Disable the usage of colors in log
    #[clap(long)]
    #[serde(default)]
    pub disable_log_color: bool,
    /// Log filename
    ///
    /// File will be stored in logs directory, this is only the filename, not the full path.
    #[clap(long, default_value_t = default_log_filename())]
    #[serde(default = "default_log_filename")]
    pub filename_log: String,
    /// Logs directory
    ///
    /// It must end with a / to be a valid folder.
    #[clap(long, default_value_t = default_logs_path())]
    #[serde(default = "default_logs_path")]
    pub logs_path: String,
    /// Change the datetime format used by the logger
    #[clap(long, default_value_t = default_logs_datetime_format())]
    #[serde(default = "default_logs_datetime_format")]
    pub datetime_format: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List every tier with its limit and evidence requirements
    Tiers,
    /// Show the evidence needed to move from one tier to another
    Requirements {
        /// Currently approved tier (0-4)
        #[clap(long, default_value_t = 0)]
        approved: u8,
        /// Requested tier (0-4)
        #[clap(long)]
        target: u8,
    },
    /// List the countries accepted by the backend
    Countries,
    /// Show the on-record KYC status of a wallet
    Status {
        /// Wallet address, 0x prefixed
        #[clap(long)]
        address: String,
    },
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[clap(
    version = VERSION,
    about = "Tierpass - progressive KYC onboarding for the tier registry"
)]
pub struct Config {
    /// Chain configuration
    #[clap(flatten)]
    pub chain: ChainConfig,
    /// Backend configuration
    #[clap(flatten)]
    pub backend: BackendConfig,
    /// Log configuration
    #[clap(flatten)]
    pub log: LogConfig,
    /// JSON File to load the configuration from
    #[clap(long)]
    #[serde(skip)]
    #[serde(default)]
    pub config_file: Option<String>,
    /// Generate the template at the `config_file` path
    #[clap(long)]
    #[serde(skip)]
    #[serde(default)]
    pub generate_config_template: bool,
    #[clap(subcommand)]
    #[serde(skip)]
    #[serde(default)]
    pub command: Option<Command>,
}

impl Config {
    pub fn onboarding(&self) -> Result<OnboardingConfig, CryptoError> {
        Ok(OnboardingConfig {
            chain_id: self.chain.chain_id,
            contract_address: self.chain.contract_address.parse()?,
            submission_fee: self.chain.submission_fee as u128,
            upgrade_fee: self.chain.upgrade_fee as u128,
            confirmation_timeout: Duration::from_secs(self.chain.confirmation_timeout),
            confirmation_poll_interval: Duration::from_millis(
                self.chain.confirmation_poll_interval,
            ),
            backend_url: self.backend.backend_url.trim_end_matches('/').to_owned(),
            backend_timeout: Duration::from_secs(self.backend.backend_timeout),
            auto_approve_threshold: self.backend.auto_approve_threshold.min(100),
        })
    }
}

/// Runtime settings handed to the onboarding controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingConfig {
    pub chain_id: u64,
    pub contract_address: Address,
    pub submission_fee: u128,
    pub upgrade_fee: u128,
    pub confirmation_timeout: Duration,
    pub confirmation_poll_interval: Duration,
    pub backend_url: String,
    pub backend_timeout: Duration,
    pub auto_approve_threshold: u8,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            contract_address: Address::zero(),
            submission_fee: DEFAULT_SUBMISSION_FEE as u128,
            upgrade_fee: DEFAULT_UPGRADE_FEE as u128,
            confirmation_timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT),
            confirmation_poll_interval: Duration::from_millis(DEFAULT_CONFIRMATION_POLL_INTERVAL),
            backend_url: DEFAULT_BACKEND_URL.to_owned(),
            backend_timeout: Duration::from_secs(DEFAULT_BACKEND_TIMEOUT),
            auto_approve_threshold: AUTO_APPROVE_THRESHOLD,
        }
    }
}
