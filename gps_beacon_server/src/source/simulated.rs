// Random-coordinate location source for development without a device.
//
// Draws latitude, longitude and altitude uniformly from inclusive ranges
// (defaults cover the Trondheim area: 63.3–63.5 N, 10.3–10.7 E, 0–100 m) and
// rounds them to 4 decimals (lat/lon) and 1 decimal (altitude) so the
// broadcast JSON stays readable. Rounded values are clamped back into the
// range, so endpoints finer than the output precision still bound every
// reading. Readings are always valid.
//
// The RNG lives behind a `Mutex` because sessions poll the shared source from
// their own threads. A configured seed makes the sequence reproducible.

use std::ops::RangeInclusive;
use std::sync::Mutex;

use gps_beacon_protocol::LocationReading;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::LocationSource;
use crate::config::SimulatedSourceConfig;
use crate::error::{BeaconError, Result};

const LAT_LON_DECIMALS: i32 = 4;
const ALTITUDE_DECIMALS: i32 = 1;

pub struct SimulatedSource {
    latitude: RangeInclusive<f64>,
    longitude: RangeInclusive<f64>,
    altitude: RangeInclusive<f64>,
    rng: Mutex<StdRng>,
}

impl SimulatedSource {
    /// Fails if any range is reversed or not finite.
    pub fn new(config: &SimulatedSourceConfig) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            latitude: checked_range("latitude", config.latitude)?,
            longitude: checked_range("longitude", config.longitude)?,
            altitude: checked_range("altitude", config.altitude)?,
            rng: Mutex::new(rng),
        })
    }
}

impl LocationSource for SimulatedSource {
    fn poll(&self) -> LocationReading {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let latitude = draw(&mut *rng, &self.latitude, LAT_LON_DECIMALS);
        let longitude = draw(&mut *rng, &self.longitude, LAT_LON_DECIMALS);
        let altitude = draw(&mut *rng, &self.altitude, ALTITUDE_DECIMALS);
        LocationReading::new(latitude, longitude, altitude)
    }

    fn describe(&self) -> String {
        format!(
            "simulated (lat {:?}, lon {:?}, alt {:?})",
            self.latitude, self.longitude, self.altitude
        )
    }
}

fn checked_range(name: &str, [min, max]: [f64; 2]) -> Result<RangeInclusive<f64>> {
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(BeaconError::Config(format!(
            "simulated {name} range [{min}, {max}] must be finite with min <= max"
        )));
    }
    Ok(min..=max)
}

fn draw(rng: &mut StdRng, range: &RangeInclusive<f64>, decimals: i32) -> f64 {
    let value = round_to(rng.random_range(range.clone()), decimals);
    value.clamp(*range.start(), *range.end())
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
