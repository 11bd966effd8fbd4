use std::fmt;

use serde::Serialize;
use tracing::{error, info};

use crate::arcgis::{EndpointDescriptor, FetchClient};
use crate::catalog::Catalog;
use crate::domain::{LoadRequest, MaterializeMode};
use crate::error::GeoportalError;
use crate::layer::{self, LayerSource, OutputLayer};
use crate::reproject::CrsTransformer;
use crate::style::{StyleDefinition, StyleStore};

/// Pipeline states. Failures are terminal; nothing is retried at this level
/// (the fetch client owns its own retry budget) and nothing already written
/// is rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validating,
    Resolving,
    Acquiring,
    Transforming,
    Materializing,
    Styling,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Validating => "Validating",
            Phase::Resolving => "Resolving",
            Phase::Acquiring => "Acquiring",
            Phase::Transforming => "Transforming",
            Phase::Materializing => "Materializing",
            Phase::Styling => "Styling",
            Phase::Done => "Done",
            Phase::Failed => "Failed",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub message: String,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Sequences one load end to end: validate, resolve the region, acquire the
/// payload or endpoint, reproject, materialize, persist the style.
pub struct Pipeline<'a, F: FetchClient, T: CrsTransformer, S: StyleStore> {
    catalog: &'a Catalog,
    fetcher: F,
    transformer: T,
    styles: S,
}

impl<'a, F: FetchClient, T: CrsTransformer, S: StyleStore> Pipeline<'a, F, T, S> {
    pub fn new(catalog: &'a Catalog, fetcher: F, transformer: T, styles: S) -> Self {
        Self {
            catalog,
            fetcher,
            transformer,
            styles,
        }
    }

    pub fn styles(&self) -> &S {
        &self.styles
    }

    /// Runs the pipeline for one request. `style_override` is the
    /// user-supplied custom style; when absent the dataset's stored style
    /// (or its catalog default on first use) is applied. Every failure maps
    /// to exactly one user-facing message on the sink.
    pub fn load(
        &self,
        request: &LoadRequest,
        style_override: Option<StyleDefinition>,
        sink: &dyn ProgressSink,
    ) -> Result<OutputLayer, GeoportalError> {
        match self.run(request, style_override, sink) {
            Ok(layer) => {
                sink.event(ProgressEvent {
                    phase: Phase::Done,
                    message: format!("loaded layer {}", layer.name),
                });
                Ok(layer)
            }
            Err(err) => {
                error!(error = %err, dataset = %request.dataset, "load failed");
                sink.event(ProgressEvent {
                    phase: Phase::Failed,
                    message: err.user_message(),
                });
                Err(err)
            }
        }
    }

    fn run(
        &self,
        request: &LoadRequest,
        style_override: Option<StyleDefinition>,
        sink: &dyn ProgressSink,
    ) -> Result<OutputLayer, GeoportalError> {
        sink.event(ProgressEvent {
            phase: Phase::Validating,
            message: format!("dataset {}", request.dataset),
        });
        let descriptor = self.catalog.lookup(&request.dataset)?;
        if request.mode == MaterializeMode::FeatureService && !descriptor.supports_feature_service {
            return Err(GeoportalError::FeatureServiceUnavailable(
                request.dataset.to_string(),
            ));
        }
        // Destination precondition comes before any network I/O.
        if request.mode == MaterializeMode::Direct && !request.has_destination() {
            return Err(GeoportalError::MissingOutputDestination);
        }

        sink.event(ProgressEvent {
            phase: Phase::Resolving,
            message: format!("region {}", request.region),
        });
        let region = descriptor.resolve_region(&request.region)?;
        let locator = descriptor.resource_url(region);
        let layer_name = descriptor.layer_name(region);
        info!(dataset = %request.dataset, locator, "resolved resource");

        let style = match style_override {
            Some(style) => style,
            None => self
                .styles
                .get(&request.dataset)?
                .unwrap_or_else(|| descriptor.default_style().clone()),
        };

        let layer = match request.mode {
            MaterializeMode::Direct => {
                sink.event(ProgressEvent {
                    phase: Phase::Acquiring,
                    message: format!("fetching {locator}"),
                });
                let payload = self.fetcher.fetch(&locator)?;

                sink.event(ProgressEvent {
                    phase: Phase::Transforming,
                    message: format!(
                        "{} -> {}",
                        payload.source_crs, request.output_crs
                    ),
                });
                let payload = self.transformer.reproject(payload, &request.output_crs)?;

                sink.event(ProgressEvent {
                    phase: Phase::Materializing,
                    message: format!("writing {}", request.destination),
                });
                layer::materialize_direct(&request.destination, &layer_name, payload, &style)?
            }
            MaterializeMode::FeatureService => {
                sink.event(ProgressEvent {
                    phase: Phase::Acquiring,
                    message: format!("binding endpoint {locator}"),
                });
                let endpoint = EndpointDescriptor::from_locator(&locator, &layer_name);

                sink.event(ProgressEvent {
                    phase: Phase::Materializing,
                    message: format!("registering {}", endpoint.layer_url),
                });
                layer::materialize_feature_service(endpoint, &style)
            }
        };

        sink.event(ProgressEvent {
            phase: Phase::Styling,
            message: format!("saving style for {}", request.dataset),
        });
        self.styles.put(&request.dataset, style)?;

        Ok(layer)
    }
}

/// Host-facing summary of a finished load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub layer_name: String,
    pub mode: String,
    pub output_path: Option<String>,
    pub endpoint_url: Option<String>,
    pub crs: Option<String>,
    pub feature_count: Option<usize>,
}

impl From<&OutputLayer> for LoadReport {
    fn from(layer: &OutputLayer) -> Self {
        let (mode, output_path, endpoint_url) = match &layer.source {
            LayerSource::File { path } => (MaterializeMode::Direct, Some(path.to_string()), None),
            LayerSource::FeatureService { endpoint } => (
                MaterializeMode::FeatureService,
                None,
                Some(endpoint.layer_url.clone()),
            ),
        };
        Self {
            layer_name: layer.name.clone(),
            mode: mode.to_string(),
            output_path,
            endpoint_url,
            crs: layer.crs.as_ref().map(|crs| crs.to_string()),
            feature_count: layer.feature_count,
        }
    }
}
