use std::io::{self, Write};

use serde::Serialize;

use crate::catalog::DatasetDescriptor;
use crate::pipeline::{LoadReport, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Serialize)]
pub struct DatasetEntry {
    pub id: String,
    pub name: String,
    pub category: String,
    pub regions: usize,
    pub feature_service: bool,
}

impl From<&DatasetDescriptor> for DatasetEntry {
    fn from(descriptor: &DatasetDescriptor) -> Self {
        Self {
            id: descriptor.id.to_string(),
            name: descriptor.display_name.clone(),
            category: descriptor.category.to_string(),
            regions: descriptor.regions().len(),
            feature_service: descriptor.supports_feature_service,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionListing {
    pub dataset: String,
    pub regions: Vec<RegionEntryView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionEntryView {
    pub code: String,
    pub name: String,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_load(report: &LoadReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_datasets(entries: &[DatasetEntry]) -> io::Result<()> {
        Self::print_json(&entries)
    }

    pub fn print_regions(listing: &RegionListing) -> io::Result<()> {
        Self::print_json(listing)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, event: ProgressEvent) {
        tracing::info!(phase = %event.phase, "{}", event.message);
    }
}
