use proj4rs::Proj;
use tracing::debug;

use crate::domain::CrsId;
use crate::error::GeoportalError;
use crate::geometry::{Feature, FetchedPayload};

/// Coordinate transformation seam. The production implementation delegates to
/// proj4rs; tests substitute their own.
pub trait CrsTransformer: Send + Sync {
    fn reproject(
        &self,
        payload: FetchedPayload,
        target: &CrsId,
    ) -> Result<FetchedPayload, GeoportalError>;
}

/// Pure-Rust PROJ port with bundled EPSG definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Proj4Transformer;

impl Proj4Transformer {
    fn projection(crs: &CrsId, source: &CrsId, target: &CrsId) -> Result<Proj, GeoportalError> {
        let code: u16 = crs
            .epsg_code()?
            .try_into()
            .map_err(|_| undefined_pair(source, target))?;
        Proj::from_epsg_code(code).map_err(|_| undefined_pair(source, target))
    }
}

impl CrsTransformer for Proj4Transformer {
    fn reproject(
        &self,
        payload: FetchedPayload,
        target: &CrsId,
    ) -> Result<FetchedPayload, GeoportalError> {
        // Identity short-circuit: re-running the same projection would
        // introduce numeric drift for no benefit.
        if payload.source_crs == *target {
            return Ok(payload);
        }

        let source = payload.source_crs.clone();
        let src = Self::projection(&source, &source, target)?;
        let dst = Self::projection(target, &source, target)?;
        debug!(source = %source, target = %target, "reprojecting payload");

        let features = payload
            .features
            .into_iter()
            .map(|feature| {
                let Feature {
                    kind,
                    geometry,
                    properties,
                } = feature;
                let geometry = geometry
                    .map(|geom| {
                        geom.try_map_positions(&mut |[x, y]| {
                            // proj4rs works in radians for geographic CRS.
                            let mut point = if src.is_latlong() {
                                (x.to_radians(), y.to_radians(), 0.0)
                            } else {
                                (x, y, 0.0)
                            };
                            proj4rs::transform::transform(&src, &dst, &mut point)
                                .map_err(|_| undefined_pair(&source, target))?;
                            if dst.is_latlong() {
                                Ok([point.0.to_degrees(), point.1.to_degrees()])
                            } else {
                                Ok([point.0, point.1])
                            }
                        })
                    })
                    .transpose()?;
                Ok(Feature {
                    kind,
                    geometry,
                    properties,
                })
            })
            .collect::<Result<Vec<_>, GeoportalError>>()?;

        Ok(FetchedPayload {
            features,
            source_crs: target.clone(),
        })
    }
}

fn undefined_pair(source: &CrsId, target: &CrsId) -> GeoportalError {
    GeoportalError::ReprojectionFailed {
        source_crs: source.to_string(),
        target_crs: target.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::geometry::Geometry;

    fn payload(crs: &str, geometry: Geometry) -> FetchedPayload {
        FetchedPayload {
            features: vec![Feature::new(Some(geometry), serde_json::Map::new())],
            source_crs: crs.parse().unwrap(),
        }
    }

    #[test]
    fn identity_short_circuit_preserves_geometry_exactly() {
        let geometry = Geometry::Point([139.6917, 35.6895]);
        let input = payload("EPSG:4326", geometry.clone());
        let target: CrsId = "EPSG:4326".parse().unwrap();

        let out = Proj4Transformer.reproject(input, &target).unwrap();
        assert_eq!(out.features[0].geometry, Some(geometry));
        assert_eq!(out.source_crs, target);
    }

    #[test]
    fn reprojection_is_idempotent_at_the_target() {
        let input = payload("EPSG:4326", Geometry::Point([139.6917, 35.6895]));
        let target: CrsId = "EPSG:3857".parse().unwrap();

        let once = Proj4Transformer.reproject(input, &target).unwrap();
        let twice = Proj4Transformer.reproject(once.clone(), &target).unwrap();
        assert_eq!(once.features, twice.features);
    }

    #[test]
    fn wgs84_to_web_mercator_matches_reference_values() {
        let input = payload("EPSG:4326", Geometry::Point([139.6917, 35.6895]));
        let target: CrsId = "EPSG:3857".parse().unwrap();

        let out = Proj4Transformer.reproject(input, &target).unwrap();
        let Some(Geometry::Point([x, y])) = out.features[0].geometry else {
            panic!("expected point geometry");
        };
        // Reference values from spherical mercator formulas.
        assert!((x - 15_549_321.0).abs() < 10.0, "x was {x}");
        assert!((y - 4_255_465.0).abs() < 10.0, "y was {y}");
        assert_eq!(out.source_crs, target);
    }

    #[test]
    fn undefined_crs_pair_is_rejected() {
        let input = payload("EPSG:4326", Geometry::Point([0.0, 0.0]));
        let target: CrsId = "EPSG:99999999".parse().unwrap();

        let err = Proj4Transformer.reproject(input, &target).unwrap_err();
        assert_matches!(err, GeoportalError::ReprojectionFailed { .. });
    }
}
