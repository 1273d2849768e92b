//! Domain payloads exchanged with the asynchronous lookup services.
//!
//! The delay-data collector waits on two kinds of inbound responses: station
//! coordinates from the geocoding service and weather observations from the
//! weather collector. Both are plain data carriers; the correlation registry
//! only cares whether a response actually holds a usable payload (see
//! [`Correlated::has_payload`](crate::correlation::Correlated)).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::correlation::Correlated;

/// Geocoded coordinates for a station, keyed by its address.
///
/// The geocoding service answers with an empty response (no coordinates) when
/// an address cannot be resolved; such responses still settle waiters but are
/// never written to the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingResponse {
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeocodingResponse {
    pub fn found(address: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            address: address.into(),
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    /// An answer carrying no coordinates for the address.
    pub fn empty(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            latitude: None,
            longitude: None,
        }
    }
}

impl Correlated for GeocodingResponse {
    fn has_payload(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Weather observation for a station and time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherInfo {
    pub address: String,
    pub time: NaiveDateTime,
    pub temperature: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub wind_speed_at_10m: Option<f64>,
    pub precipitation: Option<f64>,
    pub snow_fall: Option<f64>,
    pub visibility_in_meters: Option<i32>,
    pub cloud_cover_percentage: Option<i32>,
}

impl WeatherInfo {
    /// Correlation key shared by the outbound request and the inbound
    /// response: `<station>:<time>`.
    pub fn correlation_key(station: &str, time: NaiveDateTime) -> String {
        format!("{station}:{}", time.format("%Y-%m-%dT%H:%M:%S"))
    }

    pub fn key(&self) -> String {
        Self::correlation_key(&self.address, self.time)
    }
}

impl Correlated for WeatherInfo {
    fn has_payload(&self) -> bool {
        self.temperature.is_some()
    }
}
