use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GeoportalError {
    #[error("unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("unknown region {region} for dataset {dataset}")]
    UnknownRegion { dataset: String, region: String },

    #[error("no region selected")]
    MissingRegionSelection,

    #[error("no output destination selected")]
    MissingOutputDestination,

    #[error("dataset {0} is not published as a feature service")]
    FeatureServiceUnavailable(String),

    #[error("invalid CRS identifier: {0}")]
    InvalidCrs(String),

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("remote service returned status {status}: {message}")]
    FetchStatus { status: u16, message: String },

    #[error("malformed payload from remote service: {0}")]
    MalformedPayload(String),

    #[error("no reprojection defined from {source_crs} to {target_crs}")]
    ReprojectionFailed { source_crs: String, target_crs: String },

    #[error("failed to create output layer: {0}")]
    LayerCreationFailed(String),

    #[error("style persistence error: {0}")]
    StylePersistence(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl GeoportalError {
    /// The single string shown to the end user. Diagnostic detail such as the
    /// underlying fetch cause stays in the log channel.
    pub fn user_message(&self) -> String {
        match self {
            GeoportalError::UnknownDataset(id) => {
                format!("Unknown dataset: {id}")
            }
            GeoportalError::UnknownRegion { dataset, region } => {
                format!("Unknown region {region} for dataset {dataset}")
            }
            GeoportalError::MissingRegionSelection => "Please select a prefecture".to_string(),
            GeoportalError::MissingOutputDestination => {
                "Please specify a save location for the output layer".to_string()
            }
            GeoportalError::FeatureServiceUnavailable(id) => {
                format!("Dataset {id} cannot be added as a feature service layer")
            }
            GeoportalError::InvalidCrs(id) => {
                format!("Invalid coordinate reference system: {id}")
            }
            GeoportalError::FetchFailed(_)
            | GeoportalError::FetchStatus { .. }
            | GeoportalError::MalformedPayload(_) => {
                "Failed to load data from the geoportal".to_string()
            }
            GeoportalError::ReprojectionFailed {
                source_crs,
                target_crs,
            } => {
                format!("Cannot reproject from {source_crs} to {target_crs}")
            }
            GeoportalError::LayerCreationFailed(_) | GeoportalError::Filesystem(_) => {
                "Failed to create output layer".to_string()
            }
            GeoportalError::StylePersistence(_) => "Failed to save layer style".to_string(),
        }
    }
}
