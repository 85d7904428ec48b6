use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;
use tzf_rs::DefaultFinder;

use crate::config::{TimezoneConfig, TimezoneSource};

/// Resolves a site's UTC offset, in hours east, at a given instant.
pub trait TimezoneLookup: Send + Sync {
    fn offset_hours(&self, latitude: f64, longitude: f64, at: DateTime<Utc>) -> Option<f64>;
}

fn valid_site(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite() && longitude.is_finite() && latitude.abs() <= 90.0 && longitude.abs() <= 180.0
}

/// Political time zone of the site, daylight saving included. Sites the
/// zone map cannot place fall back to nautical time.
pub struct ZoneTimezone {
    finder: OnceLock<DefaultFinder>,
}

impl Default for ZoneTimezone {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneTimezone {
    /// The zone map is loaded on first lookup.
    pub fn new() -> Self {
        Self {
            finder: OnceLock::new(),
        }
    }

    /// IANA zone name of a site, e.g. "Europe/Madrid".
    pub fn zone_name(&self, latitude: f64, longitude: f64) -> Option<String> {
        if !valid_site(latitude, longitude) {
            return None;
        }
        let name = self
            .finder
            .get_or_init(DefaultFinder::new)
            .get_tz_name(longitude, latitude);
        (!name.is_empty()).then(|| name.to_string())
    }
}

impl TimezoneLookup for ZoneTimezone {
    fn offset_hours(&self, latitude: f64, longitude: f64, at: DateTime<Utc>) -> Option<f64> {
        let zone = self
            .zone_name(latitude, longitude)
            .and_then(|name| name.parse::<Tz>().ok());
        match zone {
            Some(tz) => {
                let seconds = tz.offset_from_utc_datetime(&at.naive_utc()).fix().local_minus_utc();
                Some(f64::from(seconds) / 3600.0)
            }
            None => {
                debug!(latitude, longitude, "no zone for site, using nautical time");
                NauticalTimezone.offset_hours(latitude, longitude, at)
            }
        }
    }
}

/// Nautical time: one hour per 15 degrees of longitude. Ignores political
/// zones and daylight saving.
#[derive(Clone, Copy, Debug, Default)]
pub struct NauticalTimezone;

impl TimezoneLookup for NauticalTimezone {
    fn offset_hours(&self, latitude: f64, longitude: f64, _at: DateTime<Utc>) -> Option<f64> {
        if !valid_site(latitude, longitude) {
            return None;
        }
        Some((longitude / 15.0).round())
    }
}

/// Same offset for every site.
#[derive(Clone, Copy, Debug)]
pub struct FixedTimezone {
    pub hours: f64,
}

impl FixedTimezone {
    pub fn new(hours: f64) -> Self {
        Self { hours }
    }
}

impl TimezoneLookup for FixedTimezone {
    fn offset_hours(&self, _latitude: f64, _longitude: f64, _at: DateTime<Utc>) -> Option<f64> {
        Some(self.hours)
    }
}

/// Lookup selected by the config. A fixed offset overrides the source.
pub fn lookup_for(config: &TimezoneConfig) -> Arc<dyn TimezoneLookup> {
    match (config.fixed_offset_hours, config.source) {
        (Some(hours), _) => Arc::new(FixedTimezone::new(hours)),
        (None, TimezoneSource::Zone) => Arc::new(ZoneTimezone::new()),
        (None, TimezoneSource::Nautical) => Arc::new(NauticalTimezone),
    }
}
