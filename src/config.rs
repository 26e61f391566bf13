// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tokio::time::Duration;

/// Trading support configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Trading configuration
    pub trading: TradingConfig,

    /// Output files
    pub storage: StorageConfig,

    /// Paper broker inputs
    pub paper: PaperConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Trading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Traded symbol (e.g., "SPY")
    pub symbol: String,

    /// Length of each live aggregation window in seconds
    pub window_secs: u64,

    /// Market order status poll interval in milliseconds
    pub poll_interval_ms: u64,

    /// Give up waiting on a market order after this many seconds
    pub fill_timeout_secs: u64,

    /// Trading days of history fetched at startup
    pub lookback_days: u32,

    /// Seconds between decision loop iterations
    pub decision_interval_secs: u64,

    /// Consecutive submission failures before the session stops
    pub max_submission_failures: u32,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Daily bar store
    pub historical_path: String,

    /// Per-window summaries; disabled when unset
    pub live_path: Option<String>,
}

/// Paper broker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// `price,size` CSV replayed as the tick feed
    pub tick_replay_path: Option<String>,

    /// Bar CSV served as historical data
    pub history_seed_path: Option<String>,

    /// Delay between replayed ticks in milliseconds
    pub tick_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl TradingConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fill_timeout(&self) -> Duration {
        Duration::from_secs(self.fill_timeout_secs)
    }

    pub fn decision_interval(&self) -> Duration {
        Duration::from_secs(self.decision_interval_secs)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = Config::default();

        let symbol = env::var("STOCK_SYMBOL").unwrap_or(defaults.trading.symbol);
        if symbol.trim().is_empty() {
            return Err(AppError::Config("STOCK_SYMBOL is empty".to_string()));
        }

        let trading_config = TradingConfig {
            symbol: symbol.trim().to_uppercase(),
            window_secs: env_or("WINDOW_SECS", defaults.trading.window_secs),
            poll_interval_ms: env_or("ORDER_POLL_MS", defaults.trading.poll_interval_ms),
            fill_timeout_secs: env_or("FILL_TIMEOUT_SECS", defaults.trading.fill_timeout_secs),
            lookback_days: env_or("LOOKBACK_DAYS", defaults.trading.lookback_days),
            decision_interval_secs: env_or(
                "DECISION_INTERVAL_SECS",
                defaults.trading.decision_interval_secs,
            ),
            max_submission_failures: env_or(
                "MAX_SUBMISSION_FAILURES",
                defaults.trading.max_submission_failures,
            ),
        };

        let storage_config = StorageConfig {
            historical_path: env::var("HISTORICAL_PATH")
                .unwrap_or(defaults.storage.historical_path),
            live_path: env::var("LIVE_PATH").ok().or(defaults.storage.live_path),
        };

        let paper_config = PaperConfig {
            tick_replay_path: env::var("TICK_REPLAY_PATH").ok(),
            history_seed_path: env::var("HISTORY_SEED_PATH").ok(),
            tick_delay_ms: env_or("TICK_DELAY_MS", defaults.paper.tick_delay_ms),
        };

        let logging_config = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            to_file: env_or("LOG_TO_FILE", false),
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        let config = Config {
            trading: trading_config,
            storage: storage_config,
            paper: paper_config,
            logging: logging_config,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path)
            .map_err(|e| AppError::Config(format!("Failed to open config file: {}", e)))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| AppError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject settings the loops cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.trading.window_secs == 0 {
            return Err(AppError::Config("window_secs must be positive".to_string()));
        }
        if self.trading.poll_interval_ms == 0 {
            return Err(AppError::Config("poll_interval_ms must be positive".to_string()));
        }
        if self.trading.decision_interval_secs == 0 {
            return Err(AppError::Config(
                "decision_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        // Set log level
        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        // Configure output
        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(file_path)
                    .map_err(|e| AppError::Config(format!("Failed to open log file: {}", e)))?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder
            .try_init()
            .map_err(|e| AppError::Config(format!("Failed to initialize logger: {}", e)))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trading: TradingConfig {
                symbol: "SPY".to_string(),
                window_secs: 60,
                poll_interval_ms: 500,
                fill_timeout_secs: 300,
                lookback_days: 6,
                decision_interval_secs: 5,
                max_submission_failures: 3,
            },
            storage: StorageConfig {
                historical_path: "data/hist.csv".to_string(),
                live_path: Some("data/live.csv".to_string()),
            },
            paper: PaperConfig {
                tick_replay_path: None,
                history_seed_path: None,
                tick_delay_ms: 250,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}
