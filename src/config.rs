use crate::domain::amount::Amount;
use crate::domain::denomination::{Denomination, DenominationTable, OverrideRule};
use crate::error::{AcceptorError, Result};
use config::{Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `BILL_ACCEPTOR__REPORT__ENDPOINT`.
pub const ENV_PREFIX: &str = "BILL_ACCEPTOR";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub acceptor: AcceptorSettings,
    pub denominations: DenominationSettings,
    pub report: ReportSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcceptorSettings {
    pub debounce_ms: u64,
    pub burst_quiescence_ms: u64,
    pub settle_window_ms: u64,
    pub transaction_timeout_secs: u64,
    /// Physical level that enables the acceptor.
    pub enable_active_high: bool,
    /// Keep the acceptor closed once the target is met instead of re-opening
    /// it for the rest of the settle window.
    pub close_on_target: bool,
    /// When the remote rejects an underpaid outcome as an amount mismatch,
    /// re-open the transaction for the balance instead of abandoning it.
    pub resume_on_amount_mismatch: bool,
}

impl Default for AcceptorSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            burst_quiescence_ms: 500,
            settle_window_ms: 2_000,
            transaction_timeout_secs: 60,
            enable_active_high: true,
            close_on_target: false,
            resume_on_amount_mismatch: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DenominationSettings {
    pub tolerance: u32,
    pub entries: Vec<Denomination>,
    pub overrides: Vec<OverrideRule>,
}

impl Default for DenominationSettings {
    fn default() -> Self {
        let entries = [1u32, 2, 5, 10, 20, 50, 100]
            .into_iter()
            .map(|pulses| Denomination {
                pulses,
                amount: Amount::new(pulses as u64 * 1_000),
            })
            .collect();
        Self {
            tolerance: 2,
            entries,
            overrides: vec![OverrideRule {
                min_pulses: 3,
                max_pulses: 4,
                pulses: 2,
            }],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub endpoint: String,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000/api/receive".to_string(),
            max_attempts: 3,
            retry_delay_ms: 1_000,
            request_timeout_secs: 5,
        }
    }
}

/// Validated durations the controller runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub debounce: Duration,
    pub burst_quiescence: Duration,
    pub settle_window: Duration,
    pub transaction_timeout: Duration,
}

/// Controller behaviour derived from settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub timings: Timings,
    pub enable_active_high: bool,
    pub close_on_target: bool,
    pub resume_on_amount_mismatch: bool,
}

impl Settings {
    /// Layers built-in defaults, an optional TOML file and `BILL_ACCEPTOR__*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );
        let settings = builder.build()?.try_deserialize::<Settings>()?;
        settings.timings()?;
        Ok(settings)
    }

    pub fn denomination_table(&self) -> Result<DenominationTable> {
        Ok(DenominationTable::new(
            self.denominations.entries.clone(),
            self.denominations.tolerance,
            self.denominations.overrides.clone(),
        )?)
    }

    pub fn timings(&self) -> Result<Timings> {
        let a = &self.acceptor;
        let timings = Timings {
            debounce: Duration::from_millis(a.debounce_ms),
            burst_quiescence: Duration::from_millis(a.burst_quiescence_ms),
            settle_window: Duration::from_millis(a.settle_window_ms),
            transaction_timeout: Duration::from_secs(a.transaction_timeout_secs),
        };
        if timings.burst_quiescence <= timings.debounce {
            return Err(AcceptorError::InvalidSettings(
                "burst_quiescence_ms must be longer than debounce_ms".to_string(),
            ));
        }
        if timings.settle_window >= timings.transaction_timeout {
            return Err(AcceptorError::InvalidSettings(
                "settle_window_ms must be shorter than transaction_timeout_secs".to_string(),
            ));
        }
        Ok(timings)
    }

    pub fn controller(&self) -> Result<ControllerConfig> {
        Ok(ControllerConfig {
            timings: self.timings()?,
            enable_active_high: self.acceptor.enable_active_high,
            close_on_target: self.acceptor.close_on_target,
            resume_on_amount_mismatch: self.acceptor.resume_on_amount_mismatch,
        })
    }
}
