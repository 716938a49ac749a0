//! Domain types shared across the ghostpool crates.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Unique identifier of a workspace instance.
pub type WorkspaceId = String;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Running workspaces tallied by type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceCount {
    pub regular: u32,
    pub prebuild: u32,
    pub ghost: u32,
}

/// What kind of workspace an instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceType {
    /// A user-facing workspace.
    Regular,
    /// A headless prebuild.
    Prebuild,
    /// A placeholder started by the prescaler to reserve capacity.
    Ghost,
}

/// Lifecycle phase reported by the workspace manager.
///
/// The prescaler only acts on `Pending` (creation became visible) and
/// `Stopped` (destruction completed); the other phases are carried for
/// completeness and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspacePhase {
    Unknown,
    Pending,
    Creating,
    Initializing,
    Running,
    Interrupted,
    Stopping,
    Stopped,
}

/// A time during the day, second resolution.
///
/// Parses from and serializes to `HH:MM:SS`. Ordered chronologically
/// within the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    /// Build from clock components; `None` when a component is out of
    /// range.
    pub fn new(hour: u32, minute: u32, second: u32) -> Option<Self> {
        if hour > 23 || minute > 59 || second > 59 {
            return None;
        }
        Some(Self(hour * 3600 + minute * 60 + second))
    }

    /// Project a wall-clock timestamp onto its UTC time of day.
    pub fn from_timestamp(t: SystemTime) -> Self {
        let secs = t
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self((secs % SECONDS_PER_DAY) as u32)
    }

    /// Seconds since midnight.
    pub fn seconds(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.0 / 3600,
            self.0 / 60 % 60,
            self.0 % 60
        )
    }
}

impl FromStr for TimeOfDay {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidTimeOfDay(s.to_string());
        let mut parts = s.split(':');
        let mut next = || {
            parts
                .next()
                .and_then(|p| p.parse::<u32>().ok())
                .ok_or_else(invalid)
        };
        let (hour, minute, second) = (next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Self::new(hour, minute, second).ok_or_else(invalid)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A setpoint that takes effect at a particular time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchedSetpoint {
    pub time: TimeOfDay,
    pub setpoint: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tod(h: u32, m: u32, s: u32) -> TimeOfDay {
        TimeOfDay::new(h, m, s).unwrap()
    }

    #[test]
    fn time_of_day_parses() {
        assert_eq!("08:00:00".parse::<TimeOfDay>().unwrap(), tod(8, 0, 0));
        assert_eq!("23:59:59".parse::<TimeOfDay>().unwrap(), tod(23, 59, 59));
        assert_eq!("00:00:00".parse::<TimeOfDay>().unwrap().seconds(), 0);
    }

    #[test]
    fn time_of_day_rejects_garbage() {
        for s in ["", "08:00", "08:00:00:00", "24:00:00", "08:60:00", "aa:bb:cc"] {
            assert!(s.parse::<TimeOfDay>().is_err(), "accepted {s:?}");
        }
    }

    #[test]
    fn time_of_day_orders_chronologically() {
        assert!(tod(8, 0, 0) < tod(12, 0, 0));
        assert!(tod(12, 0, 0) < tod(12, 0, 1));
        assert_eq!(tod(18, 0, 0), tod(18, 0, 0));
    }

    #[test]
    fn time_of_day_displays_zero_padded() {
        assert_eq!(tod(8, 5, 9).to_string(), "08:05:09");
        assert_eq!(tod(23, 59, 59).to_string(), "23:59:59");
    }

    #[test]
    fn time_of_day_projects_timestamps() {
        let five_am = UNIX_EPOCH + Duration::from_secs(5 * 3600);
        assert_eq!(TimeOfDay::from_timestamp(five_am), tod(5, 0, 0));

        // The projection wraps at midnight.
        let next_day = five_am + Duration::from_secs(24 * 3600);
        assert_eq!(TimeOfDay::from_timestamp(next_day), tod(5, 0, 0));
    }

    #[test]
    fn switched_setpoint_deserializes() {
        let sp: SwitchedSetpoint =
            serde_json::from_str(r#"{ "time": "08:00:00", "setpoint": 10 }"#).unwrap();
        assert_eq!(sp.time, tod(8, 0, 0));
        assert_eq!(sp.setpoint, 10);
    }

    #[test]
    fn switched_setpoint_rejects_negative_setpoint() {
        let res: Result<SwitchedSetpoint, _> =
            serde_json::from_str(r#"{ "time": "08:00:00", "setpoint": -1 }"#);
        assert!(res.is_err());
    }
}
