//! Location collaborators: geocoding, census tract lookup, and tract demographics.
//!
//! The engine only talks to the [`GeoLocator`] and [`DemographicsSource`] traits.
//! [`StaticGeoLocator`] and [`SeededDemographics`] are offline stand-ins that
//! produce stable answers for the same input.

use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::address::{self, CensusTract, Coordinates};
use super::cache::SharedCache;
use super::error::IncentiveError;

/// Name returned by reverse geocoding when no state contains the point.
pub const UNKNOWN_STATE: &str = "Unknown";

#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, IncentiveError>;

    async fn resolve_census_tract(
        &self,
        coordinates: Coordinates,
    ) -> Result<Option<CensusTract>, IncentiveError>;

    /// Full state name, or [`UNKNOWN_STATE`].
    async fn reverse_geocode_state(&self, coordinates: Coordinates)
        -> Result<String, IncentiveError>;
}

/// Socioeconomic indicators for a census tract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TractDemographics {
    pub poverty_rate: f64,
    /// Tract median family income over the area median.
    pub median_income_ratio: f64,
    /// Tract unemployment over the national rate.
    pub unemployment_ratio: f64,
    pub historic_district: bool,
    pub opportunity_zone: bool,
}

impl TractDemographics {
    pub fn low_income_community(&self) -> bool {
        self.poverty_rate >= 0.20 || self.median_income_ratio <= 0.80
    }

    pub fn severely_distressed(&self) -> bool {
        self.poverty_rate >= 0.30
            || self.median_income_ratio <= 0.60
            || self.unemployment_ratio >= 1.5
    }
}

#[async_trait]
pub trait DemographicsSource: Send + Sync {
    async fn tract_demographics(
        &self,
        tract: &CensusTract,
    ) -> Result<TractDemographics, IncentiveError>;
}

/// Reproducible pseudo-random demographics keyed by tract.
#[derive(Debug, Clone, Copy)]
pub struct SeededDemographics {
    seed: u64,
}

impl SeededDemographics {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn sample(&self, tract: &CensusTract) -> TractDemographics {
        let mut rng = StdRng::seed_from_u64(self.seed ^ stable_hash(&tract.geoid));
        let poverty_rate = rng.gen_range(0.04..0.42);
        let median_income_ratio = rng.gen_range(0.45..1.40);
        let unemployment_ratio = rng.gen_range(0.6..2.2);
        let historic_district = rng.gen_bool(0.3);
        let low_income = poverty_rate >= 0.20 || median_income_ratio <= 0.80;
        // roughly a quarter of qualifying tracts were designated
        let opportunity_zone = DESIGNATED_OPPORTUNITY_ZONES.contains(&tract.geoid.as_str())
            || (low_income && rng.gen_bool(0.25));

        TractDemographics {
            poverty_rate,
            median_income_ratio,
            unemployment_ratio,
            historic_district,
            opportunity_zone,
        }
    }
}

#[async_trait]
impl DemographicsSource for SeededDemographics {
    async fn tract_demographics(
        &self,
        tract: &CensusTract,
    ) -> Result<TractDemographics, IncentiveError> {
        Ok(self.sample(tract))
    }
}

const DESIGNATED_OPPORTUNITY_ZONES: &[&str] = &[
    "11001007403",
    "11001009603",
    "24510040100",
    "36047050900",
    "17031836300",
    "06037206300",
];

struct StateRecord {
    code: &'static str,
    name: &'static str,
    fips: &'static str,
    latitude: f64,
    longitude: f64,
}

impl StateRecord {
    const fn new(
        code: &'static str,
        name: &'static str,
        fips: &'static str,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            code,
            name,
            fips,
            latitude,
            longitude,
        }
    }
}

const STATES: &[StateRecord] = &[
    StateRecord::new("AZ", "Arizona", "04", 34.0489, -111.0937),
    StateRecord::new("CA", "California", "06", 36.7783, -119.4179),
    StateRecord::new("CO", "Colorado", "08", 39.5501, -105.7821),
    StateRecord::new("CT", "Connecticut", "09", 41.6032, -73.0877),
    StateRecord::new("DC", "District of Columbia", "11", 38.9072, -77.0369),
    StateRecord::new("FL", "Florida", "12", 27.6648, -81.5158),
    StateRecord::new("GA", "Georgia", "13", 32.1656, -82.9001),
    StateRecord::new("IL", "Illinois", "17", 40.6331, -89.3985),
    StateRecord::new("IA", "Iowa", "19", 41.8780, -93.0977),
    StateRecord::new("MD", "Maryland", "24", 39.0458, -76.6413),
    StateRecord::new("MA", "Massachusetts", "25", 42.4072, -71.3824),
    StateRecord::new("MI", "Michigan", "26", 44.3148, -85.6024),
    StateRecord::new("MN", "Minnesota", "27", 46.7296, -94.6859),
    StateRecord::new("MO", "Missouri", "29", 37.9643, -91.8318),
    StateRecord::new("NY", "New York", "36", 43.2994, -74.2179),
    StateRecord::new("OH", "Ohio", "39", 40.4173, -82.9071),
    StateRecord::new("PA", "Pennsylvania", "42", 41.2033, -77.1945),
    StateRecord::new("TX", "Texas", "48", 31.9686, -99.9018),
    StateRecord::new("VA", "Virginia", "51", 37.4316, -78.6569),
    StateRecord::new("WA", "Washington", "53", 47.7511, -120.7401),
    StateRecord::new("WI", "Wisconsin", "55", 43.7844, -88.7879),
];

/// Two-letter postal code for a full state name.
pub fn state_code(name: &str) -> Option<&'static str> {
    STATES
        .iter()
        .find(|state| state.name.eq_ignore_ascii_case(name))
        .map(|state| state.code)
}

struct Landmark {
    fragment: &'static str,
    state: &'static str,
    latitude: f64,
    longitude: f64,
    county: &'static str,
    tract: &'static str,
}

const LANDMARKS: &[Landmark] = &[
    Landmark {
        fragment: "1600 pennsylvania ave",
        state: "DC",
        latitude: 38.8977,
        longitude: -77.0365,
        county: "001",
        tract: "006202",
    },
    Landmark {
        fragment: "233 s wacker dr",
        state: "IL",
        latitude: 41.8789,
        longitude: -87.6359,
        county: "031",
        tract: "839100",
    },
    Landmark {
        fragment: "350 5th ave",
        state: "NY",
        latitude: 40.7484,
        longitude: -73.9857,
        county: "061",
        tract: "007600",
    },
];

// points farther than this from every centroid are treated as unlocatable
const MAX_CENTROID_DISTANCE_DEGREES: f64 = 6.0;

/// Offline geocoder backed by landmark and state-centroid tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticGeoLocator;

impl StaticGeoLocator {
    fn landmark_for(address: &str) -> Option<&'static Landmark> {
        let lowered = address.to_ascii_lowercase();
        LANDMARKS
            .iter()
            .find(|landmark| lowered.contains(landmark.fragment))
    }

    fn landmark_at(coordinates: Coordinates) -> Option<&'static Landmark> {
        LANDMARKS.iter().find(|landmark| {
            (landmark.latitude - coordinates.latitude).abs() < 1e-6
                && (landmark.longitude - coordinates.longitude).abs() < 1e-6
        })
    }

    fn state_in_address(address: &str) -> Option<&'static StateRecord> {
        address
            .split([' ', ','])
            .rev()
            .filter(|token| token.len() == 2)
            .find_map(|token| STATES.iter().find(|state| state.code == token))
    }

    /// Landmarks carry their own state; everything else falls back to the closest centroid.
    fn state_at(coordinates: Coordinates) -> Option<&'static StateRecord> {
        match Self::landmark_at(coordinates) {
            Some(landmark) => STATES.iter().find(|state| state.code == landmark.state),
            None => Self::nearest_state(coordinates),
        }
    }

    fn nearest_state(coordinates: Coordinates) -> Option<&'static StateRecord> {
        STATES
            .iter()
            .map(|state| {
                let distance = ((state.latitude - coordinates.latitude).powi(2)
                    + (state.longitude - coordinates.longitude).powi(2))
                .sqrt();
                (state, distance)
            })
            .filter(|(_, distance)| *distance <= MAX_CENTROID_DISTANCE_DEGREES)
            .min_by(|left, right| left.1.total_cmp(&right.1))
            .map(|(state, _)| state)
    }
}

#[async_trait]
impl GeoLocator for StaticGeoLocator {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, IncentiveError> {
        if let Some(landmark) = Self::landmark_for(address) {
            return Coordinates::new(landmark.latitude, landmark.longitude).map(Some);
        }

        let Some(state) = Self::state_in_address(address) else {
            return Ok(None);
        };

        let hash = stable_hash(&address.to_ascii_lowercase());
        let lat_offset = ((hash % 1000) as f64 - 500.0) / 10_000.0;
        let lon_offset = (((hash >> 20) % 1000) as f64 - 500.0) / 10_000.0;
        Coordinates::new(state.latitude + lat_offset, state.longitude + lon_offset).map(Some)
    }

    async fn resolve_census_tract(
        &self,
        coordinates: Coordinates,
    ) -> Result<Option<CensusTract>, IncentiveError> {
        let Some(state) = Self::state_at(coordinates) else {
            return Ok(None);
        };

        if let Some(landmark) = Self::landmark_at(coordinates) {
            return Ok(Some(CensusTract::new(state.fips, landmark.county, landmark.tract)));
        }

        let hash = stable_hash(&coordinates.cache_key());
        let county = format!("{:03}", (hash % 100) * 2 + 1);
        let tract = format!("{:06}", (hash >> 16) % 990_000 + 100);
        Ok(Some(CensusTract::new(state.fips, &county, &tract)))
    }

    async fn reverse_geocode_state(
        &self,
        coordinates: Coordinates,
    ) -> Result<String, IncentiveError> {
        Ok(Self::state_at(coordinates)
            .map(|state| state.name.to_string())
            .unwrap_or_else(|| UNKNOWN_STATE.to_string()))
    }
}

/// FNV-1a; stable across runs and platforms unlike the std hasher.
pub(crate) fn stable_hash(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Values memoized by [`SiteResolver`].
#[derive(Debug, Clone, PartialEq)]
pub enum CachedLookup {
    Coordinates(Coordinates),
    Tract(CensusTract),
    State(String),
    Demographics(TractDemographics),
}

/// Everything the evaluators need to know about where a property sits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Site {
    pub normalized_address: String,
    pub coordinates: Coordinates,
    pub census_tract: CensusTract,
    pub state: String,
    pub state_code: Option<String>,
}

/// Cache-first front for the location collaborators, shared by every evaluator.
#[derive(Clone)]
pub struct SiteResolver {
    locator: Arc<dyn GeoLocator>,
    demographics: Arc<dyn DemographicsSource>,
    cache: SharedCache<CachedLookup>,
}

impl SiteResolver {
    pub fn new(
        locator: Arc<dyn GeoLocator>,
        demographics: Arc<dyn DemographicsSource>,
        cache: SharedCache<CachedLookup>,
    ) -> Self {
        Self {
            locator,
            demographics,
            cache,
        }
    }

    pub fn cache(&self) -> &SharedCache<CachedLookup> {
        &self.cache
    }

    pub async fn resolve(&self, address: &str) -> Result<Site, IncentiveError> {
        let normalized_address = address::validate(address)?;
        let coordinates = self.coordinates(&normalized_address).await?;
        let census_tract = self.census_tract(coordinates).await?;
        let state = self.state(coordinates).await?;
        let state_code = state_code(&state).map(str::to_string);

        Ok(Site {
            normalized_address,
            coordinates,
            census_tract,
            state,
            state_code,
        })
    }

    pub async fn demographics(
        &self,
        tract: &CensusTract,
    ) -> Result<TractDemographics, IncentiveError> {
        let key = format!("demographics:{}", tract.geoid);
        if let Some(CachedLookup::Demographics(found)) = self.cache.get(&key) {
            return Ok(found);
        }
        let found = self.demographics.tract_demographics(tract).await?;
        self.cache.set(key, CachedLookup::Demographics(found));
        Ok(found)
    }

    async fn coordinates(&self, normalized_address: &str) -> Result<Coordinates, IncentiveError> {
        let key = format!("geocode:{}", normalized_address.to_ascii_lowercase());
        if let Some(CachedLookup::Coordinates(found)) = self.cache.get(&key) {
            return Ok(found);
        }
        let found = self.locator.geocode(normalized_address).await?.ok_or_else(|| {
            IncentiveError::NotFound(format!(
                "no coordinates found for address '{normalized_address}'"
            ))
        })?;
        self.cache.set(key, CachedLookup::Coordinates(found));
        Ok(found)
    }

    async fn census_tract(&self, coordinates: Coordinates) -> Result<CensusTract, IncentiveError> {
        let key = format!("tract:{}", coordinates.cache_key());
        if let Some(CachedLookup::Tract(found)) = self.cache.get(&key) {
            return Ok(found);
        }
        let found = self
            .locator
            .resolve_census_tract(coordinates)
            .await?
            .ok_or_else(|| {
                IncentiveError::NotFound(format!(
                    "no census tract contains ({:.4}, {:.4})",
                    coordinates.latitude, coordinates.longitude
                ))
            })?;
        self.cache.set(key, CachedLookup::Tract(found.clone()));
        Ok(found)
    }

    async fn state(&self, coordinates: Coordinates) -> Result<String, IncentiveError> {
        let key = format!("state:{}", coordinates.cache_key());
        if let Some(CachedLookup::State(found)) = self.cache.get(&key) {
            return Ok(found);
        }
        let found = self.locator.reverse_geocode_state(coordinates).await?;
        self.cache.set(key, CachedLookup::State(found.clone()));
        Ok(found)
    }
}
