// Location and target types carried over the wire.
//
// Three types make up the data model:
// - `LocationReading`: one poll of a location source. Immutable once built.
// - `TargetWaypoint`: the operator's optional target. Constructed only through
//   `unset()` and `at()` so an unset target never carries coordinates.
// - `OutboundPacket`: the flat merge of the two, built per send and
//   serialized with the camelCase keys display clients expect.
//
// `now_millis()` is the single timestamp source so every packet uses epoch
// milliseconds.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Clocks set before 1970 report 0 rather than failing.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// A single reading produced by a location source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocationReading {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub timestamp_ms: i64,
    /// `false` when the source failed; coordinates are then zero.
    pub valid: bool,
}

impl LocationReading {
    /// A valid reading stamped with the current time.
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            timestamp_ms: now_millis(),
            valid: true,
        }
    }

    /// Placeholder reading for a failed poll.
    pub fn invalid() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            timestamp_ms: now_millis(),
            valid: false,
        }
    }
}

/// The operator-supplied target, or its absence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetWaypoint {
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: f64,
    is_set: bool,
}

impl TargetWaypoint {
    /// No target: coordinates absent, altitude 0.
    pub const fn unset() -> Self {
        Self {
            latitude: None,
            longitude: None,
            altitude: 0.0,
            is_set: false,
        }
    }

    /// A target at the given position. Values are not range-checked.
    pub const fn at(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            altitude,
            is_set: true,
        }
    }

    pub fn latitude(&self) -> Option<f64> {
        self.latitude
    }

    pub fn longitude(&self) -> Option<f64> {
        self.longitude
    }

    pub fn altitude(&self) -> f64 {
        self.altitude
    }

    pub fn is_set(&self) -> bool {
        self.is_set
    }
}

impl Default for TargetWaypoint {
    fn default() -> Self {
        Self::unset()
    }
}

/// One message on the wire: a reading merged with the target at send time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundPacket {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub valid: bool,
    pub target_latitude: Option<f64>,
    pub target_longitude: Option<f64>,
    pub target_altitude: f64,
    pub has_target: bool,
}

impl OutboundPacket {
    pub fn merge(reading: &LocationReading, target: &TargetWaypoint) -> Self {
        Self {
            latitude: reading.latitude,
            longitude: reading.longitude,
            altitude: reading.altitude,
            timestamp: reading.timestamp_ms,
            valid: reading.valid,
            target_latitude: target.latitude(),
            target_longitude: target.longitude(),
            target_altitude: target.altitude(),
            has_target: target.is_set(),
        }
    }

    /// The target half of the packet, if one was set when it was sent.
    pub fn target(&self) -> TargetWaypoint {
        match (self.has_target, self.target_latitude, self.target_longitude) {
            (true, Some(lat), Some(lon)) => TargetWaypoint::at(lat, lon, self.target_altitude),
            _ => TargetWaypoint::unset(),
        }
    }
}
