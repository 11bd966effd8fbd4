use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::GeoportalError;

/// Catalog key of a published dataset, e.g. `vg_50000` or `anaguma`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetId {
    type Err = GeoportalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !is_valid {
            return Err(GeoportalError::UnknownDataset(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Prefecture code as published by the portal (`01`..`47`), or `00` for the
/// nationwide entry of datasets without prefectural subdivision. May be empty
/// when the user has not made a selection yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionCode(String);

impl RegionCode {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coordinate reference system identifier, normalized to `EPSG:<code>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrsId(String);

impl CrsId {
    pub fn from_epsg(code: u32) -> Self {
        Self(format!("EPSG:{code}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn epsg_code(&self) -> Result<u32, GeoportalError> {
        self.0
            .strip_prefix("EPSG:")
            .and_then(|rest| rest.parse().ok())
            .ok_or_else(|| GeoportalError::InvalidCrs(self.0.clone()))
    }
}

impl fmt::Display for CrsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CrsId {
    type Err = GeoportalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        // Accept a bare well-known id the way the portal metadata carries it.
        if !trimmed.is_empty() && trimmed.chars().all(|ch| ch.is_ascii_digit()) {
            return Ok(Self(format!("EPSG:{trimmed}")));
        }
        let (authority, code) = trimmed
            .split_once(':')
            .ok_or_else(|| GeoportalError::InvalidCrs(value.to_string()))?;
        if !authority.eq_ignore_ascii_case("epsg")
            || code.is_empty()
            || !code.chars().all(|ch| ch.is_ascii_digit())
        {
            return Err(GeoportalError::InvalidCrs(value.to_string()));
        }
        Ok(Self(format!("EPSG:{code}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MaterializeMode {
    /// Download the vector payload and write it to a local destination.
    Direct,
    /// Register a layer backed by the remote feature-service endpoint.
    FeatureService,
}

impl fmt::Display for MaterializeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterializeMode::Direct => write!(f, "direct"),
            MaterializeMode::FeatureService => write!(f, "feature-service"),
        }
    }
}

/// One user-initiated load. Input shape is already validated by the host;
/// only domain validation happens downstream.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub dataset: DatasetId,
    pub region: RegionCode,
    pub output_crs: CrsId,
    pub destination: Utf8PathBuf,
    pub mode: MaterializeMode,
}

impl LoadRequest {
    pub fn has_destination(&self) -> bool {
        !self.destination.as_str().trim().is_empty()
    }
}
