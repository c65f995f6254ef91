//! External lookups: weather, reverse geocoding and start position.
//!
//! Each lookup is a single attempt. Failures are isolated: [`enrich`] runs
//! weather and geocoding side by side and a failure of one only leaves its
//! own field empty.

use crate::config::LookupConfig;
use crate::{Coords, Error, Place, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// Resolves the current temperature (°C) at a point
pub trait WeatherLookup {
    fn temperature(&self, at: Coords) -> impl Future<Output = Result<f64>>;
}

/// Resolves the city and country for a point
pub trait GeocodeLookup {
    fn place(&self, at: Coords) -> impl Future<Output = Result<Place>>;
}

/// Supplies the initial map centre
pub trait PositionSource {
    fn locate(&self) -> Result<Coords>;
}

/// A disabled lookup is `None`; it fails every request.
impl<T: WeatherLookup> WeatherLookup for Option<T> {
    async fn temperature(&self, at: Coords) -> Result<f64> {
        match self {
            Some(inner) => inner.temperature(at).await,
            None => Err(Error::Lookup("weather lookup is disabled".into())),
        }
    }
}

impl<T: GeocodeLookup> GeocodeLookup for Option<T> {
    async fn place(&self, at: Coords) -> Result<Place> {
        match self {
            Some(inner) => inner.place(at).await,
            None => Err(Error::Lookup("geocoding is disabled".into())),
        }
    }
}

// ============================================================================
// Enrichment
// ============================================================================

/// Optional values resolved for a workout's coordinates
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Enrichment {
    pub location: Option<Place>,
    pub temperature: Option<f64>,
}

/// Run both lookups concurrently, keeping whatever succeeded
pub async fn enrich<W, G>(at: Coords, weather: &W, geocode: &G) -> Enrichment
where
    W: WeatherLookup,
    G: GeocodeLookup,
{
    let (temperature, location) = tokio::join!(weather.temperature(at), geocode.place(at));

    let temperature = temperature
        .map_err(|e| tracing::warn!("Temperature lookup for {} failed: {}", at, e))
        .ok();
    let location = location
        .map_err(|e| tracing::warn!("Location lookup for {} failed: {}", at, e))
        .ok();

    Enrichment {
        location,
        temperature,
    }
}

// ============================================================================
// Region codes
// ============================================================================

/// Country-code substitutions applied to raw geocoder output.
///
/// The geocoder reports some territories under a code other than the one
/// the app displays. The default rule maps `UK` to the ISO 3166 code `GB`;
/// more rules come from the `[geocoding] region_overrides` config table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionRemap {
    rules: BTreeMap<String, String>,
}

impl Default for RegionRemap {
    fn default() -> Self {
        Self::new(default_region_overrides())
    }
}

pub(crate) fn default_region_overrides() -> BTreeMap<String, String> {
    BTreeMap::from([("UK".to_string(), "GB".to_string())])
}

impl RegionRemap {
    pub fn new(rules: BTreeMap<String, String>) -> Self {
        let rules = rules
            .into_iter()
            .map(|(from, to)| (from.trim().to_uppercase(), to.trim().to_uppercase()))
            .collect();
        Self { rules }
    }

    /// The code to display for a raw geocoder code
    pub fn apply(&self, raw: &str) -> String {
        let code = raw.trim().to_uppercase();
        match self.rules.get(&code) {
            Some(replacement) => {
                tracing::debug!("Remapped region code {} to {}", code, replacement);
                replacement.clone()
            }
            None => code,
        }
    }
}

// ============================================================================
// HTTP implementations
// ============================================================================

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Lookup(format!("Failed to build HTTP client: {}", e)))
}

async fn get_json<T: for<'de> Deserialize<'de>>(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T> {
    let response = http
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| Error::Lookup(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Lookup(format!("HTTP {}: {}", status, body)));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| Error::Lookup(format!("Unexpected response: {}", e)))
}

/// Open-Meteo current-conditions response (only what we read)
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
}

/// Current temperature from an Open-Meteo compatible endpoint
#[derive(Clone)]
pub struct HttpWeather {
    http: reqwest::Client,
    base_url: String,
}

impl HttpWeather {
    pub fn new(config: &LookupConfig) -> Result<Self> {
        Ok(Self {
            http: build_client(Duration::from_secs(config.timeout_secs))?,
            base_url: config.weather_url.clone(),
        })
    }
}

impl WeatherLookup for HttpWeather {
    async fn temperature(&self, at: Coords) -> Result<f64> {
        let query = [
            ("latitude", at.lat.to_string()),
            ("longitude", at.lng.to_string()),
            ("current", "temperature_2m".to_string()),
        ];
        let body: ForecastResponse = get_json(&self.http, &self.base_url, &query).await?;
        tracing::debug!("Temperature at {}: {}°C", at, body.current.temperature_2m);
        Ok(body.current.temperature_2m)
    }
}

/// Reverse-geocoding response (BigDataCloud client API shape)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReverseGeocodeResponse {
    #[serde(default)]
    city: String,
    #[serde(default)]
    locality: String,
    #[serde(default)]
    country_code: String,
}

/// City and country from a reverse-geocoding endpoint
#[derive(Clone)]
pub struct HttpGeocoder {
    http: reqwest::Client,
    base_url: String,
    remap: RegionRemap,
}

impl HttpGeocoder {
    pub fn new(config: &LookupConfig, remap: RegionRemap) -> Result<Self> {
        Ok(Self {
            http: build_client(Duration::from_secs(config.timeout_secs))?,
            base_url: config.geocode_url.clone(),
            remap,
        })
    }
}

impl GeocodeLookup for HttpGeocoder {
    async fn place(&self, at: Coords) -> Result<Place> {
        let query = [
            ("latitude", at.lat.to_string()),
            ("longitude", at.lng.to_string()),
            ("localityLanguage", "en".to_string()),
        ];
        let body: ReverseGeocodeResponse = get_json(&self.http, &self.base_url, &query).await?;
        place_from_response(body, &self.remap)
    }
}

fn place_from_response(body: ReverseGeocodeResponse, remap: &RegionRemap) -> Result<Place> {
    let city = if body.city.trim().is_empty() {
        body.locality
    } else {
        body.city
    };
    if city.trim().is_empty() || body.country_code.trim().is_empty() {
        return Err(Error::Lookup("geocoder returned no place".into()));
    }
    Ok(Place {
        city,
        country: remap.apply(&body.country_code),
    })
}

/// Start position taken from configuration instead of a device
#[derive(Clone, Debug, Default)]
pub struct FixedPosition(pub Option<Coords>);

impl PositionSource for FixedPosition {
    fn locate(&self) -> Result<Coords> {
        self.0
            .ok_or_else(|| Error::Lookup("Couldn't get your position".into()))
    }
}
