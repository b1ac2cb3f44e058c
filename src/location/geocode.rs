use anyhow::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use serde::Deserialize;
use sqlx::MySqlPool;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;

/// key => "lat,lng" rounded to 5 decimals (~1 m), value => resolved address
pub static ADDRESS_CACHE: Lazy<Cache<String, String>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(86400)) // 24h TTL
        .build()
});

fn cache_key(lat: f64, lng: f64) -> String {
    format!("{:.5},{:.5}", lat, lng)
}

/// Coordinate fallback text. The resolver guarantees its output is never
/// empty, so this is the floor every provider failure degrades to.
pub fn coordinate_text(lat: f64, lng: f64) -> String {
    format!("{:.6}, {:.6}", lat, lng)
}

/// Administrative levels a provider managed to extract, most specific first.
#[derive(Debug, Default, Clone)]
pub struct AddressParts {
    pub locality: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    /// Raw display string from the provider, used by sub-area refinement.
    pub display: String,
}

impl AddressParts {
    /// Concatenate the non-empty levels, most specific first.
    pub fn assemble(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.locality, &self.city, &self.state, &self.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Pluggable metro refinement: inside a recognized metro, a named sub-area
/// found in the provider's display text is preferred over the generic
/// locality field.
#[derive(Debug, Clone)]
pub struct SubAreaRules {
    pub metro_names: &'static [&'static str],
    pub sub_areas: &'static [&'static str],
}

pub static BENGALURU_RULES: SubAreaRules = SubAreaRules {
    metro_names: &["Bengaluru", "Bangalore"],
    sub_areas: &[
        "Koramangala",
        "Indiranagar",
        "Whitefield",
        "Jayanagar",
        "Malleshwaram",
        "Hebbal",
        "Electronic City",
        "Marathahalli",
        "Yelahanka",
        "HSR Layout",
        "BTM Layout",
        "Rajajinagar",
        "Basavanagudi",
        "Banashankari",
        "Sarjapur",
    ],
};

impl SubAreaRules {
    pub fn refine(&self, parts: &mut AddressParts) {
        let in_metro = self.metro_names.iter().any(|m| {
            parts.city.as_deref().is_some_and(|c| c.contains(m)) || parts.display.contains(m)
        });
        if !in_metro {
            return;
        }
        if let Some(area) = self.sub_areas.iter().find(|a| parts.display.contains(**a)) {
            parts.locality = Some((*area).to_string());
        }
    }
}

/// One reverse-geocoding backend. `Ok(None)` means "nothing usable here,
/// try the next provider"; errors are treated the same way by the chain.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn reverse(&self, lat: f64, lng: f64) -> Result<Option<String>>;
}

/* =========================
Provider 1: detailed reverse geocoder (OSM Nominatim)
========================= */

#[derive(Deserialize)]
struct NominatimAddress {
    neighbourhood: Option<String>,
    suburb: Option<String>,
    village: Option<String>,
    town: Option<String>,
    city: Option<String>,
    state_district: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

#[derive(Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    address: Option<NominatimAddress>,
}

pub struct NominatimProvider {
    client: reqwest::Client,
    base_url: String,
    rules: &'static SubAreaRules,
}

impl NominatimProvider {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url,
            rules: &BENGALURU_RULES,
        }
    }
}

#[async_trait]
impl GeocodeProvider for NominatimProvider {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn reverse(&self, lat: f64, lng: f64) -> Result<Option<String>> {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=jsonv2&zoom=16&addressdetails=1",
            self.base_url, lat, lng
        );
        let resp: NominatimResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(addr) = resp.address else {
            return Ok(None);
        };
        let mut parts = AddressParts {
            locality: addr.neighbourhood.or(addr.suburb).or(addr.village),
            city: addr.city.or(addr.town).or(addr.state_district),
            state: addr.state,
            country: addr.country,
            display: resp.display_name.unwrap_or_default(),
        };
        self.rules.refine(&mut parts);
        Ok(parts.assemble())
    }
}

/* =========================
Provider 2: locality-level geocoder (BigDataCloud)
========================= */

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalityResponse {
    locality: Option<String>,
    city: Option<String>,
    principal_subdivision: Option<String>,
    country_name: Option<String>,
}

pub struct LocalityProvider {
    client: reqwest::Client,
    base_url: String,
}

impl LocalityProvider {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl GeocodeProvider for LocalityProvider {
    fn name(&self) -> &'static str {
        "bigdatacloud"
    }

    async fn reverse(&self, lat: f64, lng: f64) -> Result<Option<String>> {
        let url = format!(
            "{}/data/reverse-geocode-client?latitude={}&longitude={}&localityLanguage=en",
            self.base_url, lat, lng
        );
        let resp: LocalityResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let parts = AddressParts {
            locality: resp.locality.clone(),
            city: resp.city,
            state: resp.principal_subdivision,
            country: resp.country_name,
            display: String::new(),
        };
        Ok(parts.assemble())
    }
}

/* =========================
Provider 3: generic geocoder (Photon)
========================= */

#[derive(Deserialize)]
struct PhotonProperties {
    name: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

#[derive(Deserialize)]
struct PhotonFeature {
    properties: PhotonProperties,
}

#[derive(Deserialize)]
struct PhotonResponse {
    features: Vec<PhotonFeature>,
}

pub struct PhotonProvider {
    client: reqwest::Client,
    base_url: String,
}

impl PhotonProvider {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl GeocodeProvider for PhotonProvider {
    fn name(&self) -> &'static str {
        "photon"
    }

    async fn reverse(&self, lat: f64, lng: f64) -> Result<Option<String>> {
        let url = format!("{}/reverse?lat={}&lon={}", self.base_url, lat, lng);
        let resp: PhotonResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(feature) = resp.features.into_iter().next() else {
            return Ok(None);
        };
        let p = feature.properties;
        let parts = AddressParts {
            locality: p.name,
            city: p.city,
            state: p.state,
            country: p.country,
            display: String::new(),
        };
        Ok(parts.assemble())
    }
}

/* =========================
Resolver: ordered provider chain
========================= */

pub struct AddressResolver {
    providers: Vec<Box<dyn GeocodeProvider>>,
}

impl AddressResolver {
    /// Production chain in fixed priority order: detailed → locality → generic.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.geocoder_user_agent.clone())
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            providers: vec![
                Box::new(NominatimProvider::new(
                    client.clone(),
                    config.nominatim_url.clone(),
                )),
                Box::new(LocalityProvider::new(
                    client.clone(),
                    config.bigdatacloud_url.clone(),
                )),
                Box::new(PhotonProvider::new(client, config.photon_url.clone())),
            ],
        })
    }

    pub fn with_providers(providers: Vec<Box<dyn GeocodeProvider>>) -> Self {
        Self { providers }
    }

    /// Never fails and never returns an empty string: the first provider that
    /// yields usable text wins, and total exhaustion degrades to the raw
    /// coordinate string.
    pub async fn resolve(&self, lat: f64, lng: f64) -> String {
        let key = cache_key(lat, lng);
        if let Some(hit) = ADDRESS_CACHE.get(&key).await {
            return hit;
        }

        for provider in &self.providers {
            match provider.reverse(lat, lng).await {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    debug!(provider = provider.name(), "address resolved");
                    ADDRESS_CACHE.insert(key, text.clone()).await;
                    return text;
                }
                Ok(_) => {
                    debug!(provider = provider.name(), "no usable address, trying next");
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "geocoder failed, trying next");
                }
            }
        }

        coordinate_text(lat, lng)
    }
}

/// Pre-populate the address cache from recently recorded attendance rows so
/// repeat marks at the same site skip the provider chain entirely.
pub async fn warmup_address_cache(pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (f64, f64, String)>(
        r#"
        SELECT latitude, longitude, location_text
        FROM attendance
        WHERE latitude IS NOT NULL
          AND longitude IS NOT NULL
          AND location_text IS NOT NULL
          AND created_at >= NOW() - INTERVAL ? DAY
        ORDER BY created_at DESC
        "#,
    )
    .bind(days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut seen = HashSet::new();
    let mut total_count = 0usize;

    while let Some(row) = stream.next().await {
        let (lat, lng, text) = row?;
        // Rows arrive newest-first; only the first text per rounded key is
        // kept, so the most recent fix wins.
        let Some(key) = first_seen_key(&mut seen, lat, lng) else {
            continue;
        };
        batch.push((key, text));
        total_count += 1;

        if batch.len() >= batch_size {
            flush_batch(&mut batch).await;
        }
    }
    if !batch.is_empty() {
        flush_batch(&mut batch).await;
    }

    log::info!(
        "Address cache warmup complete: {} recent fixes (last {} days)",
        total_count,
        days
    );

    Ok(())
}

fn first_seen_key(seen: &mut HashSet<String>, lat: f64, lng: f64) -> Option<String> {
    let key = cache_key(lat, lng);
    seen.insert(key.clone()).then_some(key)
}

async fn flush_batch(batch: &mut Vec<(String, String)>) {
    let inserts: Vec<_> = batch
        .drain(..)
        .map(|(k, v)| ADDRESS_CACHE.insert(k, v))
        .collect();
    futures::future::join_all(inserts).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FakeProvider {
        outcome: Result<Option<String>, String>,
    }

    impl FakeProvider {
        fn ok(text: &str) -> Box<dyn GeocodeProvider> {
            Box::new(Self {
                outcome: Ok(Some(text.to_string())),
            })
        }
        fn empty() -> Box<dyn GeocodeProvider> {
            Box::new(Self { outcome: Ok(None) })
        }
        fn failing(msg: &str) -> Box<dyn GeocodeProvider> {
            Box::new(Self {
                outcome: Err(msg.to_string()),
            })
        }
    }

    #[async_trait]
    impl GeocodeProvider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }
        async fn reverse(&self, _lat: f64, _lng: f64) -> Result<Option<String>> {
            match &self.outcome {
                Ok(v) => Ok(v.clone()),
                Err(m) => Err(anyhow!(m.clone())),
            }
        }
    }

    #[tokio::test]
    async fn falls_through_to_the_first_usable_provider() {
        let resolver = AddressResolver::with_providers(vec![
            FakeProvider::failing("network down"),
            FakeProvider::empty(),
            FakeProvider::ok("Area, City, State, Country"),
        ]);
        // Unique coordinates per test; the cache is process-global.
        let text = resolver.resolve(13.100001, 77.100001).await;
        assert_eq!(text, "Area, City, State, Country");
    }

    #[tokio::test]
    async fn degrades_to_coordinates_when_every_provider_fails() {
        let resolver = AddressResolver::with_providers(vec![
            FakeProvider::failing("a"),
            FakeProvider::failing("b"),
            FakeProvider::empty(),
        ]);
        let text = resolver.resolve(12.971599, 77.594566).await;
        assert_eq!(text, "12.971599, 77.594566");
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let resolver =
            AddressResolver::with_providers(vec![FakeProvider::ok("Hebbal, Bengaluru, Karnataka")]);
        let first = resolver.resolve(13.200002, 77.200002).await;
        assert_eq!(first, "Hebbal, Bengaluru, Karnataka");

        // Same coordinates through an always-failing chain now hit the cache.
        let broken = AddressResolver::with_providers(vec![FakeProvider::failing("down")]);
        let second = broken.resolve(13.200002, 77.200002).await;
        assert_eq!(second, "Hebbal, Bengaluru, Karnataka");
    }

    #[test]
    fn assemble_skips_empty_levels() {
        let parts = AddressParts {
            locality: None,
            city: Some("Mysuru".into()),
            state: Some("  ".into()),
            country: Some("India".into()),
            display: String::new(),
        };
        assert_eq!(parts.assemble().unwrap(), "Mysuru, India");
    }

    #[test]
    fn metro_sub_area_overrides_generic_locality() {
        let mut parts = AddressParts {
            locality: Some("Ward 151".into()),
            city: Some("Bengaluru".into()),
            state: Some("Karnataka".into()),
            country: Some("India".into()),
            display: "4th Block, Koramangala, Bengaluru, Karnataka, India".into(),
        };
        BENGALURU_RULES.refine(&mut parts);
        assert_eq!(
            parts.assemble().unwrap(),
            "Koramangala, Bengaluru, Karnataka, India"
        );
    }

    #[test]
    fn refinement_leaves_other_cities_alone() {
        let mut parts = AddressParts {
            locality: Some("Gandhi Nagar".into()),
            city: Some("Chennai".into()),
            state: None,
            country: None,
            display: "Gandhi Nagar, Chennai".into(),
        };
        BENGALURU_RULES.refine(&mut parts);
        assert_eq!(parts.locality.as_deref(), Some("Gandhi Nagar"));
    }

    #[test]
    fn coordinate_text_is_six_decimal_places() {
        assert_eq!(coordinate_text(1.5, -2.0), "1.500000, -2.000000");
    }

    #[test]
    fn warmup_keeps_the_newest_fix_per_rounded_key() {
        let mut seen = std::collections::HashSet::new();
        // Newest row claims the key
        assert!(first_seen_key(&mut seen, 12.971599, 77.594566).is_some());
        // Older row at the same site (same key after 5-decimal rounding) is skipped
        assert!(first_seen_key(&mut seen, 12.971601, 77.594568).is_none());
        // A different site still warms
        assert!(first_seen_key(&mut seen, 12.980000, 77.600000).is_some());
    }
}
