use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::arcgis::EndpointDescriptor;
use crate::domain::CrsId;
use crate::error::GeoportalError;
use crate::geometry::{FeatureCollection, FetchedPayload};
use crate::style::StyleDefinition;

/// Where the materialized layer gets its data from.
#[derive(Debug, Clone)]
pub enum LayerSource {
    /// Local file written by the loader.
    File { path: Utf8PathBuf },
    /// Remote feature-service endpoint queried by the host at render time.
    FeatureService { endpoint: EndpointDescriptor },
}

/// The materialized result handed back to the host. Carries its style from
/// construction on, so the host never observes an unstyled layer.
#[derive(Debug, Clone)]
pub struct OutputLayer {
    pub name: String,
    pub source: LayerSource,
    pub style: StyleDefinition,
    /// Set on the direct path; feature-service layers negotiate CRS with the
    /// host's rendering machinery.
    pub crs: Option<CrsId>,
    pub feature_count: Option<usize>,
}

/// Writes the payload to `destination` as a GeoJSON feature collection, plus
/// a style sidecar next to it (the portal's desktop users expect the style to
/// travel with the file). An existing file at the destination is replaced
/// atomically.
pub fn materialize_direct(
    destination: &Utf8Path,
    layer_name: &str,
    payload: FetchedPayload,
    style: &StyleDefinition,
) -> Result<OutputLayer, GeoportalError> {
    if destination.as_str().trim().is_empty() {
        return Err(GeoportalError::MissingOutputDestination);
    }

    let feature_count = payload.features.len();
    let crs = payload.source_crs.clone();
    let collection = FeatureCollection::new(payload.features);
    let content = serde_json::to_vec_pretty(&collection)
        .map_err(|err| GeoportalError::LayerCreationFailed(err.to_string()))?;
    write_atomic(destination, &content)?;

    let sidecar = style_sidecar_path(destination);
    write_atomic(&sidecar, style.as_str().as_bytes())?;
    info!(
        destination = %destination,
        features = feature_count,
        "materialized layer"
    );

    Ok(OutputLayer {
        name: layer_name.to_string(),
        source: LayerSource::File {
            path: destination.to_path_buf(),
        },
        style: style.clone(),
        crs: Some(crs),
        feature_count: Some(feature_count),
    })
}

/// Builds the remote-backed layer for feature-service mode. No filesystem
/// I/O happens on this path.
pub fn materialize_feature_service(
    endpoint: EndpointDescriptor,
    style: &StyleDefinition,
) -> OutputLayer {
    OutputLayer {
        name: endpoint.layer_name.clone(),
        source: LayerSource::FeatureService { endpoint },
        style: style.clone(),
        crs: None,
        feature_count: None,
    }
}

/// `out.gpkg` gets `out.style.json` beside it, mirroring the portal's
/// QML-next-to-output convention.
pub fn style_sidecar_path(destination: &Utf8Path) -> Utf8PathBuf {
    destination.with_extension("style.json")
}

fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), GeoportalError> {
    let parent = path
        .parent()
        .ok_or_else(|| GeoportalError::LayerCreationFailed("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| GeoportalError::LayerCreationFailed(err.to_string()))?;

    let temp = tempfile::Builder::new()
        .prefix(".moe-geoportal")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| GeoportalError::LayerCreationFailed(err.to_string()))?;
    fs::write(temp.path(), content)
        .map_err(|err| GeoportalError::LayerCreationFailed(err.to_string()))?;
    if path.as_std_path().exists() {
        fs::remove_file(path.as_std_path())
            .map_err(|err| GeoportalError::LayerCreationFailed(err.to_string()))?;
    }
    temp.persist(path.as_std_path())
        .map_err(|err| GeoportalError::LayerCreationFailed(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::geometry::{Feature, Geometry};

    fn sample_payload() -> FetchedPayload {
        FetchedPayload {
            features: vec![Feature::new(
                Some(Geometry::Point([139.69, 35.69])),
                serde_json::Map::new(),
            )],
            source_crs: "EPSG:6677".parse().unwrap(),
        }
    }

    fn sample_style() -> StyleDefinition {
        StyleDefinition::new(r#"{"renderer":"simple-fill"}"#)
    }

    #[test]
    fn direct_write_produces_layer_and_sidecar() {
        let temp = tempfile::tempdir().unwrap();
        let dest = Utf8PathBuf::from_path_buf(temp.path().join("out.geojson")).unwrap();

        let layer =
            materialize_direct(&dest, "Tokyo_vegetation", sample_payload(), &sample_style())
                .unwrap();

        assert_matches!(layer.source, LayerSource::File { .. });
        assert_eq!(layer.feature_count, Some(1));
        assert_eq!(layer.crs, Some("EPSG:6677".parse().unwrap()));

        let written = std::fs::read_to_string(dest.as_std_path()).unwrap();
        let collection: FeatureCollection = serde_json::from_str(&written).unwrap();
        assert_eq!(collection.features.len(), 1);

        let sidecar = std::fs::read_to_string(style_sidecar_path(&dest).as_std_path()).unwrap();
        assert_eq!(sidecar, sample_style().as_str());
    }

    #[test]
    fn direct_write_replaces_existing_output() {
        let temp = tempfile::tempdir().unwrap();
        let dest = Utf8PathBuf::from_path_buf(temp.path().join("out.geojson")).unwrap();
        std::fs::write(dest.as_std_path(), b"stale partial output").unwrap();

        materialize_direct(&dest, "layer", sample_payload(), &sample_style()).unwrap();
        let written = std::fs::read_to_string(dest.as_std_path()).unwrap();
        assert!(serde_json::from_str::<FeatureCollection>(&written).is_ok());
    }

    #[test]
    fn empty_destination_is_rejected() {
        let err = materialize_direct(
            Utf8Path::new(""),
            "layer",
            sample_payload(),
            &sample_style(),
        )
        .unwrap_err();
        assert_matches!(err, GeoportalError::MissingOutputDestination);
    }

    #[test]
    fn unwritable_destination_fails_layer_creation() {
        let temp = tempfile::tempdir().unwrap();
        let blocker = temp.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();
        let dest = Utf8PathBuf::from_path_buf(blocker.join("out.geojson")).unwrap();

        let err =
            materialize_direct(&dest, "layer", sample_payload(), &sample_style()).unwrap_err();
        assert_matches!(err, GeoportalError::LayerCreationFailed(_));
    }

    #[test]
    fn feature_service_layer_touches_no_filesystem() {
        let endpoint = EndpointDescriptor::from_locator(
            "https://svr-moej.gisservice.jp/arcgis/rest/services/Hosted/tanuki/FeatureServer",
            "Mammal distribution survey (raccoon dog)",
        );
        let layer = materialize_feature_service(endpoint.clone(), &sample_style());

        assert_eq!(layer.name, endpoint.layer_name);
        assert_matches!(layer.source, LayerSource::FeatureService { .. });
        assert_eq!(layer.crs, None);
        assert_eq!(layer.feature_count, None);
    }

    #[test]
    fn sidecar_path_swaps_extension() {
        assert_eq!(
            style_sidecar_path(Utf8Path::new("/tmp/out.gpkg")),
            Utf8PathBuf::from("/tmp/out.style.json")
        );
    }
}
