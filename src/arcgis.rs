use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::CrsId;
use crate::error::GeoportalError;
use crate::geometry::{FeatureCollection, FetchedPayload};

/// Remote layer reference handed to the host in feature-service mode. Built
/// from the resolved locator alone; no request is made until the host's
/// rendering layer queries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointDescriptor {
    pub service_url: String,
    pub layer_url: String,
    pub layer_name: String,
}

impl EndpointDescriptor {
    /// The portal hosts exactly one layer per service, always id 0.
    pub fn from_locator(service_url: &str, layer_name: &str) -> Self {
        Self {
            service_url: service_url.to_string(),
            layer_url: format!("{service_url}/0"),
            layer_name: layer_name.to_string(),
        }
    }
}

/// Retrieval of the vector payload behind a resolved locator. Only the
/// direct materialization path goes through here.
pub trait FetchClient: Send + Sync {
    fn fetch(&self, service_url: &str) -> Result<FetchedPayload, GeoportalError>;
}

#[derive(Clone)]
pub struct ArcgisHttpClient {
    client: Client,
}

impl ArcgisHttpClient {
    pub fn new() -> Result<Self, GeoportalError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("moe-geoportal-loader/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GeoportalError::FetchFailed(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| GeoportalError::FetchFailed(err.to_string()))?;
        Ok(Self { client })
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GeoportalError> {
        let response = self.send_with_retries(|| self.client.get(url).query(query))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "geoportal request failed".to_string());
            return Err(GeoportalError::FetchStatus { status, message });
        }
        response
            .json()
            .map_err(|err| GeoportalError::MalformedPayload(err.to_string()))
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, GeoportalError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_ATTEMPTS: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 1usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_ATTEMPTS && is_retryable_status(status) {
                        warn!(status, attempt, "transient status from geoportal, retrying");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * attempt as u64));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_ATTEMPTS && is_retryable_error(&err) {
                        warn!(error = %err, attempt, "transient fetch error, retrying");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * attempt as u64));
                        attempt += 1;
                        continue;
                    }
                    return Err(GeoportalError::FetchFailed(err.to_string()));
                }
            }
        }
    }
}

impl FetchClient for ArcgisHttpClient {
    fn fetch(&self, service_url: &str) -> Result<FetchedPayload, GeoportalError> {
        let start = std::time::Instant::now();
        let meta: ServiceMeta = self.get_json(service_url, &[("f", "json")])?;
        let layer = meta
            .layers
            .first()
            .ok_or_else(|| {
                GeoportalError::MalformedPayload(format!("no layers in service {service_url}"))
            })?;
        let source_crs = meta
            .spatial_reference
            .as_ref()
            .and_then(SpatialReference::to_crs)
            .unwrap_or_else(|| {
                debug!(service_url, "service metadata carries no spatial reference, assuming WGS84");
                CrsId::from_epsg(4326)
            });

        // Query features in the service's native CRS so the payload CRS
        // matches the advertised one.
        let layer_url = format!("{service_url}/{}", layer.id);
        let out_sr = source_crs.epsg_code()?.to_string();
        let collection: FeatureCollection = self.get_json(
            &format!("{layer_url}/query"),
            &[
                ("where", "1=1"),
                ("outFields", "*"),
                ("outSR", out_sr.as_str()),
                ("f", "geojson"),
            ],
        )?;
        debug!(
            service_url,
            features = collection.features.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "fetched payload"
        );

        Ok(FetchedPayload {
            features: collection.features,
            source_crs,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ServiceMeta {
    #[serde(default)]
    layers: Vec<LayerRef>,
    #[serde(rename = "spatialReference")]
    spatial_reference: Option<SpatialReference>,
}

#[derive(Debug, Deserialize)]
struct LayerRef {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct SpatialReference {
    wkid: Option<u32>,
    #[serde(rename = "latestWkid")]
    latest_wkid: Option<u32>,
}

impl SpatialReference {
    fn to_crs(&self) -> Option<CrsId> {
        let wkid = self.latest_wkid.or(self.wkid)?;
        Some(CrsId::from_epsg(normalize_esri_wkid(wkid)))
    }
}

/// The portal's web-mercator services advertise legacy ESRI ids.
fn normalize_esri_wkid(wkid: u32) -> u32 {
    match wkid {
        102100 | 102113 => 3857,
        other => other,
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
