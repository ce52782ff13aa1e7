use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::geocoder::GeocodeError;
use crate::geocoder::provider::{GeocodeCandidate, GeocodingProvider};
use crate::models::driver::GeoPoint;

pub struct NominatimProvider {
    http: Client,
    base_url: String,
    country_codes: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    importance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ReverseHit {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl NominatimProvider {
    pub fn new(
        base_url: &str,
        user_agent: &str,
        country_codes: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GeocodeError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|err| GeocodeError::LookupFailed(format!("http client: {err}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            country_codes: country_codes.filter(|codes| !codes.trim().is_empty()),
            timeout,
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> GeocodeError {
        if err.is_timeout() {
            GeocodeError::Timeout(self.timeout)
        } else {
            GeocodeError::LookupFailed(err.to_string())
        }
    }
}

impl SearchHit {
    fn into_candidate(self) -> Option<GeocodeCandidate> {
        let lat = self.lat.parse::<f64>().ok()?;
        let lng = self.lon.parse::<f64>().ok()?;
        let location = GeoPoint::new(lat, lng);

        location.is_valid().then(|| GeocodeCandidate {
            location,
            display_name: self.display_name,
            importance: self.importance,
        })
    }
}

#[async_trait]
impl GeocodingProvider for NominatimProvider {
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<GeocodeCandidate>, GeocodeError> {
        let limit = limit.to_string();
        let mut params = vec![
            ("q", query),
            ("format", "jsonv2"),
            ("limit", limit.as_str()),
        ];
        if let Some(codes) = self.country_codes.as_deref() {
            params.push(("countrycodes", codes));
        }

        debug!(query, "nominatim search");

        let hits = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&params)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| self.map_transport_error(err))?
            .json::<Vec<SearchHit>>()
            .await
            .map_err(|err| self.map_transport_error(err))?;

        Ok(hits
            .into_iter()
            .filter_map(SearchHit::into_candidate)
            .collect())
    }

    async fn reverse(&self, point: GeoPoint) -> Result<Option<String>, GeocodeError> {
        let lat = point.lat.to_string();
        let lng = point.lng.to_string();

        debug!(lat = point.lat, lng = point.lng, "nominatim reverse");

        let hit = self
            .http
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lng.as_str()),
                ("format", "jsonv2"),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| self.map_transport_error(err))?
            .json::<ReverseHit>()
            .await
            .map_err(|err| self.map_transport_error(err))?;

        if hit.error.is_some() {
            return Ok(None);
        }

        Ok(hit.display_name.filter(|name| !name.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::NominatimProvider;
    use crate::geocoder::GeocodeError;
    use crate::geocoder::provider::GeocodingProvider;
    use crate::models::driver::GeoPoint;

    fn provider(server: &MockServer, timeout: Duration) -> NominatimProvider {
        NominatimProvider::new(
            &server.uri(),
            "parcel-engine-tests",
            Some("ke".to_string()),
            timeout,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn search_translates_hits_and_sends_region_bias() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Kenyatta Avenue"))
            .and(query_param("countrycodes", "ke"))
            .and(query_param("limit", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "lat": "-1.2864",
                    "lon": "36.8172",
                    "display_name": "Kenyatta Avenue, Nairobi, Kenya",
                    "importance": 0.61
                },
                {
                    "lat": "not-a-number",
                    "lon": "36.8",
                    "display_name": "broken"
                }
            ])))
            .mount(&server)
            .await;

        let hits = provider(&server, Duration::from_secs(2))
            .search("Kenyatta Avenue", 3)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].location, GeoPoint::new(-1.2864, 36.8172));
        assert_eq!(hits[0].display_name, "Kenyatta Avenue, Nairobi, Kenya");
    }

    #[tokio::test]
    async fn server_errors_are_lookup_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(2))
            .search("Moi Avenue", 1)
            .await
            .unwrap_err();

        assert!(matches!(err, GeocodeError::LookupFailed(_)));
    }

    #[tokio::test]
    async fn slow_responses_are_timeouts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_millis(50))
            .search("Moi Avenue", 1)
            .await
            .unwrap_err();

        assert!(matches!(err, GeocodeError::Timeout(_)));
    }

    #[tokio::test]
    async fn reverse_without_result_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "error": "Unable to geocode" })),
            )
            .mount(&server)
            .await;

        let address = provider(&server, Duration::from_secs(2))
            .reverse(GeoPoint::new(0.0, 0.0))
            .await
            .unwrap();

        assert!(address.is_none());
    }

    #[tokio::test]
    async fn reverse_returns_display_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "display_name": "Moi Avenue, Mombasa, Kenya"
            })))
            .mount(&server)
            .await;

        let address = provider(&server, Duration::from_secs(2))
            .reverse(GeoPoint::new(-4.0435, 39.6682))
            .await
            .unwrap();

        assert_eq!(address.as_deref(), Some("Moi Avenue, Mombasa, Kenya"));
    }
}
