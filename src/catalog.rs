use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use serde::Serialize;

use crate::domain::{DatasetId, RegionCode};
use crate::error::GeoportalError;
use crate::style::StyleDefinition;

const SERVICE_ROOT: &str = "https://svr-moej.gisservice.jp/arcgis/rest/services/Hosted";

/// Prefecture codes and names as published by the portal. Code `00` is
/// reserved for the nationwide entry of datasets without prefectural scoping.
const PREFECTURES: &[(&str, &str)] = &[
    ("01", "Hokkaido"),
    ("02", "Aomori"),
    ("03", "Iwate"),
    ("04", "Miyagi"),
    ("05", "Akita"),
    ("06", "Yamagata"),
    ("07", "Fukushima"),
    ("08", "Ibaraki"),
    ("09", "Tochigi"),
    ("10", "Gunma"),
    ("11", "Saitama"),
    ("12", "Chiba"),
    ("13", "Tokyo"),
    ("14", "Kanagawa"),
    ("15", "Niigata"),
    ("16", "Toyama"),
    ("17", "Ishikawa"),
    ("18", "Fukui"),
    ("19", "Yamanashi"),
    ("20", "Nagano"),
    ("21", "Gifu"),
    ("22", "Shizuoka"),
    ("23", "Aichi"),
    ("24", "Mie"),
    ("25", "Shiga"),
    ("26", "Kyoto"),
    ("27", "Osaka"),
    ("28", "Hyogo"),
    ("29", "Nara"),
    ("30", "Wakayama"),
    ("31", "Tottori"),
    ("32", "Shimane"),
    ("33", "Okayama"),
    ("34", "Hiroshima"),
    ("35", "Yamaguchi"),
    ("36", "Tokushima"),
    ("37", "Kagawa"),
    ("38", "Ehime"),
    ("39", "Kochi"),
    ("40", "Fukuoka"),
    ("41", "Saga"),
    ("42", "Nagasaki"),
    ("43", "Kumamoto"),
    ("44", "Oita"),
    ("45", "Miyazaki"),
    ("46", "Kagoshima"),
    ("47", "Okinawa"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetCategory {
    Vegetation,
    Coral,
    Mammal,
    Seagrass,
}

impl fmt::Display for DatasetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetCategory::Vegetation => write!(f, "vegetation"),
            DatasetCategory::Coral => write!(f, "coral"),
            DatasetCategory::Mammal => write!(f, "mammal"),
            DatasetCategory::Seagrass => write!(f, "seagrass"),
        }
    }
}

/// One selectable region of a dataset. `service_code` is what gets
/// substituted into the locator template; it usually equals the region code
/// but carries the portal's published exceptions (Hokkaido vegetation sheets
/// are hosted under `01_0420`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEntry {
    pub code: RegionCode,
    pub name: String,
    service_code: String,
}

impl RegionEntry {
    fn new(code: &str, name: &str) -> Self {
        Self {
            code: RegionCode::new(code),
            name: name.to_string(),
            service_code: code.to_string(),
        }
    }

    fn with_service_code(mut self, service_code: &str) -> Self {
        self.service_code = service_code.to_string();
        self
    }

    pub fn is_nationwide(&self) -> bool {
        self.code.as_str() == "00"
    }
}

#[derive(Debug, Clone)]
pub struct DatasetDescriptor {
    pub id: DatasetId,
    pub display_name: String,
    pub category: DatasetCategory,
    pub supports_feature_service: bool,
    locator_template: String,
    regions: Vec<RegionEntry>,
    default_style: StyleDefinition,
}

impl DatasetDescriptor {
    pub fn regions(&self) -> &[RegionEntry] {
        &self.regions
    }

    pub fn default_style(&self) -> &StyleDefinition {
        &self.default_style
    }

    /// Pure region validation: empty code means the user never picked one,
    /// anything else must match a published entry.
    pub fn resolve_region(&self, code: &RegionCode) -> Result<&RegionEntry, GeoportalError> {
        if code.is_empty() {
            return Err(GeoportalError::MissingRegionSelection);
        }
        self.regions
            .iter()
            .find(|region| &region.code == code)
            .ok_or_else(|| GeoportalError::UnknownRegion {
                dataset: self.id.to_string(),
                region: code.to_string(),
            })
    }

    /// Concrete feature-service locator for a resolved region.
    pub fn resource_url(&self, region: &RegionEntry) -> String {
        self.locator_template
            .replace("{pref_code}", &region.service_code)
    }

    /// Display name for the materialized layer, prefixed with the prefecture
    /// for region-scoped datasets.
    pub fn layer_name(&self, region: &RegionEntry) -> String {
        if region.is_nationwide() {
            self.display_name.clone()
        } else {
            format!("{}_{}", region.name, self.display_name)
        }
    }
}

/// Immutable dataset registry, built once at process start and shared by
/// every invocation.
#[derive(Debug, Clone)]
pub struct Catalog {
    datasets: BTreeMap<String, DatasetDescriptor>,
}

impl Catalog {
    pub fn builtin() -> &'static Catalog {
        static CATALOG: OnceLock<Catalog> = OnceLock::new();
        CATALOG.get_or_init(Catalog::build)
    }

    pub fn lookup(&self, id: &DatasetId) -> Result<&DatasetDescriptor, GeoportalError> {
        self.datasets
            .get(id.as_str())
            .ok_or_else(|| GeoportalError::UnknownDataset(id.to_string()))
    }

    pub fn datasets(&self) -> impl Iterator<Item = &DatasetDescriptor> {
        self.datasets.values()
    }

    fn build() -> Catalog {
        let mut builder = CatalogBuilder::default();

        // Vegetation maps. The 1:50,000 sheets are published per prefecture;
        // the 2024 revision is published per regional block.
        builder.prefecture_dataset(
            "vg_50000",
            "Existing vegetation map 1/50,000",
            DatasetCategory::Vegetation,
            &format!("{SERVICE_ROOT}/vg_{{pref_code}}/FeatureServer"),
            fill_style("#4f9d4f", "#2d5a2d"),
            &[("01", "01_0420")],
        );
        builder.prefecture_dataset(
            "vgsk_50000",
            "Naturalness classification map 1/50,000",
            DatasetCategory::Vegetation,
            &format!("{SERVICE_ROOT}/vgsk_{{pref_code}}/FeatureServer"),
            fill_style("#8fbc5a", "#4a6e2a"),
            &[],
        );
        const VEG_BLOCKS: &[(&str, &str)] = &[
            ("veg2024bk1", "Hokkaido block"),
            ("veg2024bk2", "Tohoku block"),
            ("veg2024bk3", "Kanto block"),
            ("veg2024bk4", "Hokuriku block"),
            ("veg2024bk5", "Chubu block"),
            ("veg2024bk6", "Kinki block"),
            ("veg2024bk7", "Chushikoku block"),
            ("veg2024bk8", "Kyushu-Okinawa block"),
        ];
        for (key, block) in VEG_BLOCKS {
            builder.nationwide_dataset(
                key,
                &format!("Existing vegetation map 2024, {block}"),
                DatasetCategory::Vegetation,
                &format!("{SERVICE_ROOT}/{key}/FeatureServer"),
                fill_style("#4f9d4f", "#2d5a2d"),
                true,
            );
        }
        builder.nationwide_dataset(
            "NtVeg2024",
            "Northern Territories vegetation overview map",
            DatasetCategory::Vegetation,
            &format!("{SERVICE_ROOT}/NtVeg2024/FeatureServer"),
            fill_style("#4f9d4f", "#2d5a2d"),
            true,
        );

        // Medium and large mammal distribution surveys.
        const MAMMALS: &[(&str, &str)] = &[
            ("anaguma", "Mammal distribution survey (Japanese badger)"),
            ("kitune", "Mammal distribution survey (red fox)"),
            ("tanuki", "Mammal distribution survey (raccoon dog)"),
        ];
        for (key, name) in MAMMALS {
            builder.nationwide_dataset(
                key,
                name,
                DatasetCategory::Mammal,
                &format!("{SERVICE_ROOT}/{key}/FeatureServer"),
                marker_style("#b5651d"),
                true,
            );
        }

        // Coral shallow-sea ecosystem surveys. Each surveyed site publishes a
        // paired CODE1/CODE2 service; the service name does not always match
        // the catalog key.
        const CORAL_SITES: &[(&str, &str, &str)] = &[
            ("tokara_21", "tokara_2021", "Tokara Islands 2021"),
            ("kume_18", "kume", "Kume Island 2018"),
            ("tarama_18", "tarama", "Tarama Island 2018"),
            ("osumi_18", "oosumi_2021", "Osumi Islands 2021"),
            ("amami_1819", "amami_all", "Amami Islands 2018-2019"),
            ("miyako_18", "miyako", "Miyako Island 2018"),
            ("ogasawara_20", "ogasawara_v3", "Ogasawara Islands 2020"),
        ];
        for (key, service, site) in CORAL_SITES {
            for code in ["code1", "code2"] {
                builder.nationwide_dataset(
                    &format!("{key}_{code}"),
                    &format!("Coral survey ({site}, {})", code.to_uppercase()),
                    DatasetCategory::Coral,
                    &format!("{SERVICE_ROOT}/{service}_{code}/FeatureServer"),
                    fill_style("#ff7f50", "#8b3a2a"),
                    true,
                );
            }
        }
        builder.nationwide_dataset(
            "sekiseishoko_17",
            "Coral survey (Sekisei Lagoon 2017)",
            DatasetCategory::Coral,
            &format!("{SERVICE_ROOT}/sekiseishoko_2017/FeatureServer"),
            fill_style("#ff7f50", "#8b3a2a"),
            true,
        );
        // 4th and 5th national survey archives, direct download only. The 5th
        // survey layer is hosted under the service name sa5.
        const CORAL_ARCHIVES: &[(&str, &str, &str)] = &[
            (
                "sb4_v2",
                "sb4_v2",
                "Coral 4th survey (1988-1993), reef distribution",
            ),
            (
                "so4",
                "so4",
                "Coral 4th survey (1988-1993), small Ogasawara reefs",
            ),
            (
                "sa4",
                "sa4",
                "Coral 4th survey (1988-1993), non-reef distribution",
            ),
            ("sb5", "sa5", "Coral 5th survey (1993-1999), distribution"),
        ];
        for (key, service, name) in CORAL_ARCHIVES {
            builder.nationwide_dataset(
                key,
                name,
                DatasetCategory::Coral,
                &format!("{SERVICE_ROOT}/{service}/FeatureServer"),
                fill_style("#ff7f50", "#8b3a2a"),
                false,
            );
        }
        // Change-union layers joining two survey generations per island.
        const CORAL_CHANGE_UNION: &[(&str, &str)] = &[
            ("amamiooshima_H20andR01Coralmap", "Amami Oshima, H20 and R01"),
            ("amamiooshima_4thandR01Coralmap", "Amami Oshima, 4th and R01"),
            ("amamiooshima_5thandR01Coralmap", "Amami Oshima, 5th and R01"),
            ("tokunoshima_H20andR01Coralmap", "Tokunoshima, H20 and R01"),
            ("tokunoshima_4thandR01Coralmap", "Tokunoshima, 4th and R01"),
            ("tokunoshima_5thandR01Coralmap", "Tokunoshima, 5th and R01"),
        ];
        for (key, label) in CORAL_CHANGE_UNION {
            builder.nationwide_dataset(
                key,
                &format!("Coral change union ({label})"),
                DatasetCategory::Coral,
                &format!("{SERVICE_ROOT}/change_union_{key}/FeatureServer"),
                fill_style("#ff7f50", "#8b3a2a"),
                true,
            );
        }
        // Change-area layers comparing two survey generations per island.
        const CORAL_CHANGE_AREA: &[(&str, &str)] = &[
            ("kume_H20vsH30corlalmap", "Kume, H20 vs H30"),
            ("kume_4thvsH30corlalmap", "Kume, 4th vs H30"),
            ("miyako_H20vsH30corlalmap", "Miyako, H20 vs H30"),
            ("miyako_4thvsH30corlalmap", "Miyako, 4th vs H30"),
            ("ogasawara_H20vsH30corlalmap", "Ogasawara, H20 vs H30"),
            ("ogasawara_4thvsR02corlalmap", "Ogasawara, 4th vs R02"),
            ("ogasawara_5thvsR02corlalmap", "Ogasawara, 5th vs R02"),
            ("okinoerabu_H20vsH30corlalmap", "Okinoerabu, H20 vs H30"),
            ("okinoerabu_4thvsH30corlalmap", "Okinoerabu, 4th vs H30"),
            ("tarama_H20vsH30corlalmap", "Tarama, H20 vs H30"),
            ("tarama_4thvsH30corlalmap", "Tarama, 4th vs H30"),
            ("yoron_H20vsH30corlalmap", "Yoron, H20 vs H30"),
            ("yoron_4thvsH30corlalmap", "Yoron, 4th vs H30"),
            (
                "takarajima_kodakarajima_H20vsR03corlalmap",
                "Takarajima and Kodakarajima, H20 vs R03",
            ),
            (
                "takarajima_kodakarajima_4thvsR03corlalmap",
                "Takarajima and Kodakarajima, 4th vs R03",
            ),
            (
                "tanegashima_yakushima_H20vsR03corlalmap",
                "Tanegashima and Yakushima, H20 vs R03",
            ),
            (
                "tanegashima_yakushima_4thvsR03corlalmap",
                "Tanegashima and Yakushima, 4th vs R03",
            ),
            (
                "tanegashima_yakushima_5thvsR03corlalmap",
                "Tanegashima and Yakushima, 5th vs R03",
            ),
        ];
        for (key, label) in CORAL_CHANGE_AREA {
            builder.nationwide_dataset(
                key,
                &format!("Coral change area ({label})"),
                DatasetCategory::Coral,
                &format!("{SERVICE_ROOT}/change_{key}/FeatureServer"),
                fill_style("#ff7f50", "#8b3a2a"),
                true,
            );
        }

        // Seagrass bed surveys.
        builder.nationwide_dataset(
            "mo4_v2",
            "Seagrass bed survey, 4th (1988-1993)",
            DatasetCategory::Seagrass,
            &format!("{SERVICE_ROOT}/mo4_v2/FeatureServer"),
            fill_style("#2e8b57", "#1d5937"),
            false,
        );
        builder.nationwide_dataset(
            "mo5_v5",
            "Seagrass bed survey, 5th (1993-1999)",
            DatasetCategory::Seagrass,
            &format!("{SERVICE_ROOT}/mo5_v5/FeatureServer"),
            fill_style("#2e8b57", "#1d5937"),
            false,
        );
        for zone in 51..=55 {
            builder.nationwide_dataset(
                &format!("UTM{zone}_NEW"),
                &format!("Seagrass bed survey 2018-2020, UTM zone {zone}"),
                DatasetCategory::Seagrass,
                &format!("{SERVICE_ROOT}/UTM{zone}_NEW/FeatureServer"),
                fill_style("#2e8b57", "#1d5937"),
                true,
            );
        }

        Catalog {
            datasets: builder.datasets,
        }
    }
}

#[derive(Default)]
struct CatalogBuilder {
    datasets: BTreeMap<String, DatasetDescriptor>,
}

impl CatalogBuilder {
    fn prefecture_dataset(
        &mut self,
        id: &str,
        display_name: &str,
        category: DatasetCategory,
        locator_template: &str,
        default_style: StyleDefinition,
        service_code_overrides: &[(&str, &str)],
    ) {
        let regions = PREFECTURES
            .iter()
            .map(|(code, name)| {
                let entry = RegionEntry::new(code, name);
                match service_code_overrides
                    .iter()
                    .find(|(override_code, _)| override_code == code)
                {
                    Some((_, service_code)) => entry.with_service_code(service_code),
                    None => entry,
                }
            })
            .collect();
        self.insert(
            id,
            display_name,
            category,
            locator_template,
            regions,
            default_style,
            true,
        );
    }

    fn nationwide_dataset(
        &mut self,
        id: &str,
        display_name: &str,
        category: DatasetCategory,
        locator_template: &str,
        default_style: StyleDefinition,
        supports_feature_service: bool,
    ) {
        let regions = vec![RegionEntry::new("00", "Nationwide")];
        self.insert(
            id,
            display_name,
            category,
            locator_template,
            regions,
            default_style,
            supports_feature_service,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn insert(
        &mut self,
        id: &str,
        display_name: &str,
        category: DatasetCategory,
        locator_template: &str,
        regions: Vec<RegionEntry>,
        default_style: StyleDefinition,
        supports_feature_service: bool,
    ) {
        let dataset_id: DatasetId = id.parse().expect("builtin dataset id must be well formed");
        let descriptor = DatasetDescriptor {
            id: dataset_id,
            display_name: display_name.to_string(),
            category,
            supports_feature_service,
            locator_template: locator_template.to_string(),
            regions,
            default_style,
        };
        let previous = self.datasets.insert(id.to_string(), descriptor);
        debug_assert!(previous.is_none(), "duplicate builtin dataset id {id}");
    }
}

fn fill_style(fill: &str, outline: &str) -> StyleDefinition {
    StyleDefinition::new(format!(
        r##"{{"renderer":"simple-fill","fill":"{fill}","outline":"{outline}","opacity":0.7}}"##
    ))
}

fn marker_style(color: &str) -> StyleDefinition {
    StyleDefinition::new(format!(
        r##"{{"renderer":"simple-marker","color":"{color}","size":2.4}}"##
    ))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn lookup_known_and_unknown() {
        let catalog = Catalog::builtin();
        let id: DatasetId = "vg_50000".parse().unwrap();
        let descriptor = catalog.lookup(&id).unwrap();
        assert_eq!(descriptor.id, id);

        let missing: DatasetId = "no_such_dataset".parse().unwrap();
        let err = catalog.lookup(&missing).unwrap_err();
        assert_matches!(err, GeoportalError::UnknownDataset(_));
    }

    #[test]
    fn datasets_are_structurally_sound() {
        let catalog = Catalog::builtin();
        let mut names = std::collections::HashSet::new();
        for dataset in catalog.datasets() {
            assert!(!dataset.regions().is_empty(), "{} has no regions", dataset.id);
            assert!(
                names.insert(dataset.display_name.clone()),
                "duplicate display name {}",
                dataset.display_name
            );
            assert!(dataset.locator_template.starts_with("https://"));
            let prefecture_scoped = dataset.regions().len() > 1;
            assert_eq!(
                dataset.locator_template.contains("{pref_code}"),
                prefecture_scoped,
                "{}: locator template and region scoping disagree",
                dataset.id
            );
        }
    }

    #[test]
    fn prefecture_table_is_complete() {
        let catalog = Catalog::builtin();
        let id: DatasetId = "vg_50000".parse().unwrap();
        let descriptor = catalog.lookup(&id).unwrap();
        assert_eq!(descriptor.regions().len(), 47);

        let tokyo = descriptor.resolve_region(&RegionCode::new("13")).unwrap();
        assert_eq!(tokyo.name, "Tokyo");
        let okinawa = descriptor.resolve_region(&RegionCode::new("47")).unwrap();
        assert_eq!(okinawa.name, "Okinawa");
    }

    #[test]
    fn hokkaido_vegetation_uses_published_service_code() {
        let catalog = Catalog::builtin();
        let id: DatasetId = "vg_50000".parse().unwrap();
        let descriptor = catalog.lookup(&id).unwrap();
        let hokkaido = descriptor.resolve_region(&RegionCode::new("01")).unwrap();
        assert_eq!(
            descriptor.resource_url(hokkaido),
            "https://svr-moej.gisservice.jp/arcgis/rest/services/Hosted/vg_01_0420/FeatureServer"
        );

        // Other prefectures substitute their own code unchanged.
        let tokyo = descriptor.resolve_region(&RegionCode::new("13")).unwrap();
        assert!(descriptor.resource_url(tokyo).contains("/vg_13/"));
    }

    #[test]
    fn coral_family_matches_published_services() {
        let catalog = Catalog::builtin();
        let coral = catalog
            .datasets()
            .filter(|dataset| dataset.category == DatasetCategory::Coral)
            .count();
        // 7 paired survey sites, Sekisei Lagoon, 4 archives, 6 change-union
        // and 18 change-area layers.
        assert_eq!(coral, 43);

        let id: DatasetId = "kume_18_code1".parse().unwrap();
        let kume = catalog.lookup(&id).unwrap();
        let region = kume.resolve_region(&RegionCode::new("00")).unwrap();
        assert!(kume.resource_url(region).contains("/kume_code1/"));

        let id: DatasetId = "sb5".parse().unwrap();
        let sb5 = catalog.lookup(&id).unwrap();
        let region = sb5.resolve_region(&RegionCode::new("00")).unwrap();
        assert!(sb5.resource_url(region).contains("/sa5/"));
        assert!(!sb5.supports_feature_service);

        let id: DatasetId = "yoron_H20vsH30corlalmap".parse().unwrap();
        let change = catalog.lookup(&id).unwrap();
        let region = change.resolve_region(&RegionCode::new("00")).unwrap();
        assert!(
            change
                .resource_url(region)
                .contains("/change_yoron_H20vsH30corlalmap/")
        );
    }

    #[test]
    fn resolve_region_rejects_empty_then_unknown() {
        let catalog = Catalog::builtin();
        for dataset in catalog.datasets() {
            let err = dataset.resolve_region(&RegionCode::empty()).unwrap_err();
            assert_matches!(err, GeoportalError::MissingRegionSelection);
        }

        let id: DatasetId = "vgsk_50000".parse().unwrap();
        let descriptor = catalog.lookup(&id).unwrap();
        let err = descriptor.resolve_region(&RegionCode::new("99")).unwrap_err();
        assert_matches!(err, GeoportalError::UnknownRegion { .. });
    }

    #[test]
    fn resolve_region_succeeds_for_every_published_pair() {
        let catalog = Catalog::builtin();
        for dataset in catalog.datasets() {
            for region in dataset.regions() {
                let resolved = dataset.resolve_region(&region.code).unwrap();
                assert_eq!(resolved.code, region.code);
            }
        }
    }

    #[test]
    fn layer_name_carries_prefecture_prefix() {
        let catalog = Catalog::builtin();
        let id: DatasetId = "vg_50000".parse().unwrap();
        let descriptor = catalog.lookup(&id).unwrap();
        let tokyo = descriptor.resolve_region(&RegionCode::new("13")).unwrap();
        assert_eq!(
            descriptor.layer_name(tokyo),
            "Tokyo_Existing vegetation map 1/50,000"
        );

        let mammal: DatasetId = "tanuki".parse().unwrap();
        let descriptor = catalog.lookup(&mammal).unwrap();
        let nationwide = descriptor.resolve_region(&RegionCode::new("00")).unwrap();
        assert_eq!(
            descriptor.layer_name(nationwide),
            "Mammal distribution survey (raccoon dog)"
        );
    }
}
