//! Scaler configuration schema (JSON form) and validation.
//!
//! File loading belongs to the embedding process; this module only
//! defines the shape, defaults, and the fail-fast `validate()` pass.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::SwitchedSetpoint;

/// Owner UID assigned to ghost workspaces when none is configured.
pub const DEFAULT_GHOST_OWNER: &str = "00000000-0000-0000-0000-000000000000";

/// Configuration of the prescale driver and its controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalerConfig {
    /// Address of the workspace manager's gRPC endpoint.
    pub wsman_addr: String,
    /// Owner UID stamped onto ghost workspaces.
    #[serde(default = "default_ghost_owner")]
    pub ghost_owner: String,
    /// Workspace image ghosts are started with.
    pub workspace_image: String,
    /// IDE image ghosts are started with.
    pub ide_image: String,
    /// Hard cap on the ghost pool size.
    pub max_ghost_workspaces: u32,
    /// Hysteresis delay applied before acting on a non-zero delta.
    #[serde(with = "duration", default)]
    pub reaction_delay: Duration,
    #[serde(default)]
    pub renewal: RenewalConfig,
    pub controller: ControllerConfig,
}

/// Periodic recycling of existing ghosts so their timeouts reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalConfig {
    /// How often to renew; zero disables renewal.
    #[serde(with = "duration", default)]
    pub interval: Duration,
    /// Share of the pool renewed per interval, in percent (0 to 100).
    #[serde(default)]
    pub percentage: u32,
}

impl RenewalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.percentage > 100 {
            return Err(ConfigError::RenewalPercentage(self.percentage));
        }
        Ok(())
    }

    /// Renewal runs only with a positive interval and percentage.
    pub fn enabled(&self) -> bool {
        self.percentage > 0 && !self.interval.is_zero()
    }
}

/// Which setpoint controller to run, with per-kind parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    pub kind: ControllerKind,
    #[serde(default)]
    pub constant: ConstantConfig,
    #[serde(default)]
    pub switched_constant: SwitchedConstantConfig,
}

/// Names a kind of setpoint controller. Unknown kinds are rejected at
/// deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControllerKind {
    Constant,
    SwitchedConstant,
}

/// Parameters of the constant-setpoint controller.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConstantConfig {
    #[serde(default)]
    pub setpoint: u32,
}

/// Parameters of the switched-constant controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchedConstantConfig {
    /// Setpoint in effect before the first switch of the day.
    #[serde(rename = "default", default)]
    pub default_setpoint: u32,
    #[serde(default)]
    pub setpoints: Vec<SwitchedSetpoint>,
}

impl ScalerConfig {
    /// Fail-fast validation, run once at construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wsman_addr.is_empty() {
            return Err(ConfigError::MissingField("wsmanAddr"));
        }
        if self.workspace_image.is_empty() {
            return Err(ConfigError::MissingField("workspaceImage"));
        }
        if self.ide_image.is_empty() {
            return Err(ConfigError::MissingField("ideImage"));
        }
        self.renewal.validate()
    }

    /// The configured ghost owner, with the empty string normalised to
    /// [`DEFAULT_GHOST_OWNER`].
    pub fn effective_ghost_owner(&self) -> &str {
        if self.ghost_owner.is_empty() {
            DEFAULT_GHOST_OWNER
        } else {
            &self.ghost_owner
        }
    }
}

fn default_ghost_owner() -> String {
    DEFAULT_GHOST_OWNER.to_string()
}

/// Serde adapter for durations in string form: `"500ms"`, `"30s"`,
/// `"5m"`, `"2h"`.
mod duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format(d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse(s: &str) -> Result<Duration, crate::error::ConfigError> {
        let s = s.trim();
        let invalid = || crate::error::ConfigError::InvalidDuration(s.to_string());
        let (number, unit): (&str, fn(u64) -> Duration) = if let Some(n) = s.strip_suffix("ms") {
            (n, Duration::from_millis)
        } else if let Some(n) = s.strip_suffix('s') {
            (n, Duration::from_secs)
        } else if let Some(n) = s.strip_suffix('m') {
            (n, |m| Duration::from_secs(m * 60))
        } else if let Some(n) = s.strip_suffix('h') {
            (n, |h| Duration::from_secs(h * 3600))
        } else {
            return Err(invalid());
        };
        number.parse::<u64>().map(unit).map_err(|_| invalid())
    }

    pub(super) fn format(d: &Duration) -> String {
        let ms = d.as_millis();
        if ms % 1_000 != 0 {
            return format!("{ms}ms");
        }
        let secs = d.as_secs();
        if secs != 0 && secs % 3_600 == 0 {
            format!("{}h", secs / 3_600)
        } else if secs != 0 && secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{secs}s")
        }
    }
}
