// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Ortung location bridge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a location session (one per `Manager`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// When the application wants to receive locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    /// Only while the app is in the foreground ("when in use").
    Foreground,
    /// Also while the app is in the background ("always").
    Background,
}

/// Requested precision of the location permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accuracy {
    Approximate,
    Precise,
}

impl Accuracy {
    /// Android manifest permission backing this accuracy level.
    pub fn android_permission(&self) -> &'static str {
        match self {
            Self::Approximate => "android.permission.ACCESS_COARSE_LOCATION",
            Self::Precise => "android.permission.ACCESS_FINE_LOCATION",
        }
    }
}

/// WGS84 coordinates in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A single location result, copied out of the platform object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub coordinates: Coordinates,
    /// Metres above the WGS84 ellipsoid.
    pub altitude: Option<f64>,
    /// Direction of travel in degrees, relative to due north.
    pub bearing: Option<f64>,
    /// Instantaneous speed in metres per second.
    pub speed: Option<f64>,
    /// Radius of 68% confidence in metres.
    pub horizontal_accuracy: Option<f64>,
    /// When the platform produced the fix.
    pub timestamp: DateTime<Utc>,
}

impl Location {
    /// A fix carrying only coordinates and a timestamp.
    pub fn new(coordinates: Coordinates, timestamp: DateTime<Utc>) -> Self {
        Self {
            coordinates,
            altitude: None,
            bearing: None,
            speed: None,
            horizontal_accuracy: None,
            timestamp,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_horizontal_accuracy(mut self, accuracy: f64) -> Self {
        self.horizontal_accuracy = Some(accuracy);
        self
    }
}

/// An ordered, non-empty sequence of locations.
///
/// Order is the platform's delivery order; batches are never re-sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Location>", into = "Vec<Location>")]
pub struct LocationBatch {
    locations: Vec<Location>,
}

impl LocationBatch {
    /// Returns `None` for an empty vector.
    pub fn new(locations: Vec<Location>) -> Option<Self> {
        if locations.is_empty() {
            None
        } else {
            Some(Self { locations })
        }
    }

    pub fn one(location: Location) -> Self {
        Self {
            locations: vec![location],
        }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The earliest-delivered location.
    pub fn first(&self) -> &Location {
        &self.locations[0]
    }

    /// The most recently delivered location.
    pub fn latest(&self) -> &Location {
        &self.locations[self.locations.len() - 1]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Location> {
        self.locations.iter()
    }

    pub fn as_slice(&self) -> &[Location] {
        &self.locations
    }

    pub fn into_vec(self) -> Vec<Location> {
        self.locations
    }
}

impl TryFrom<Vec<Location>> for LocationBatch {
    type Error = &'static str;

    fn try_from(locations: Vec<Location>) -> Result<Self, Self::Error> {
        Self::new(locations).ok_or("a location batch must contain at least one location")
    }
}

impl From<LocationBatch> for Vec<Location> {
    fn from(batch: LocationBatch) -> Self {
        batch.locations
    }
}

impl<'a> IntoIterator for &'a LocationBatch {
    type Item = &'a Location;
    type IntoIter = std::slice::Iter<'a, Location>;

    fn into_iter(self) -> Self::IntoIter {
        self.locations.iter()
    }
}

/// Broad category of a failure outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Reported by the platform through an error callback.
    Platform,
    /// A single-fix request completed without a location.
    NoFix,
    /// The location provider was switched off.
    ProviderDisabled,
    /// Reading fields out of the platform's location object failed.
    Extraction,
    /// Producing the event panicked inside the bridge.
    Internal,
}

/// A failure outcome delivered to the handler.
///
/// `code` and `message` are whatever the platform supplied; the bridge does
/// not interpret them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub code: Option<i64>,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    /// A platform-reported error carrying the platform's own code.
    pub fn platform(code: i64, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Platform,
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{:?} ({code}): {}", self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

/// The only payload a handler ever receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocationEvent {
    Locations(LocationBatch),
    Failure(Failure),
}

impl LocationEvent {
    pub fn locations(&self) -> Option<&LocationBatch> {
        match self {
            Self::Locations(batch) => Some(batch),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Locations(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}
