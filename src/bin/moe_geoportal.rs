use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use moe_geoportal_loader::arcgis::ArcgisHttpClient;
use moe_geoportal_loader::catalog::Catalog;
use moe_geoportal_loader::domain::{CrsId, DatasetId, LoadRequest, MaterializeMode, RegionCode};
use moe_geoportal_loader::error::GeoportalError;
use moe_geoportal_loader::output::{DatasetEntry, JsonOutput, RegionEntryView, RegionListing};
use moe_geoportal_loader::pipeline::{LoadReport, Pipeline};
use moe_geoportal_loader::reproject::Proj4Transformer;
use moe_geoportal_loader::style::{SettingsStyleStore, StyleDefinition};

#[derive(Parser)]
#[command(name = "moe-geoportal")]
#[command(about = "Load datasets from the MOE environmental geoportal")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch a dataset and materialize it as an output layer")]
    Load(LoadArgs),
    #[command(about = "List the datasets in the built-in catalog")]
    Datasets,
    #[command(about = "List the selectable regions of a dataset")]
    Regions(RegionsArgs),
}

#[derive(Args)]
struct LoadArgs {
    #[arg(long, help = "Dataset id, e.g. vg_50000")]
    dataset: String,

    #[arg(long, default_value = "", help = "Prefecture code, e.g. 13 for Tokyo")]
    region: String,

    #[arg(long, default_value = "EPSG:4326", help = "Output CRS, e.g. EPSG:6677")]
    crs: String,

    #[arg(long, default_value = "", help = "Output file path (direct mode)")]
    out: String,

    #[arg(
        long,
        value_enum,
        default_value_t = MaterializeMode::Direct,
        help = "Materialization mode: download the payload or bind the remote endpoint"
    )]
    mode: MaterializeMode,

    #[arg(long, help = "Path to a style definition to apply and persist")]
    style: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct RegionsArgs {
    #[arg(long)]
    dataset: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = %err, "command failed");
            eprintln!("{}", err.user_message());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), GeoportalError> {
    let catalog = Catalog::builtin();
    match cli.command {
        Commands::Load(args) => {
            let request = LoadRequest {
                dataset: args.dataset.parse()?,
                region: RegionCode::new(args.region),
                output_crs: args.crs.parse::<CrsId>()?,
                destination: Utf8PathBuf::from(args.out),
                mode: args.mode,
            };
            let style_override = args
                .style
                .map(|path| {
                    std::fs::read_to_string(path.as_std_path())
                        .map(StyleDefinition::new)
                        .map_err(|err| GeoportalError::StylePersistence(err.to_string()))
                })
                .transpose()?;

            let pipeline = Pipeline::new(
                catalog,
                ArcgisHttpClient::new()?,
                Proj4Transformer,
                SettingsStyleStore::new()?,
            );
            let layer = pipeline.load(&request, style_override, &JsonOutput)?;
            JsonOutput::print_load(&LoadReport::from(&layer))
                .map_err(|err| GeoportalError::Filesystem(err.to_string()))?;
            Ok(())
        }
        Commands::Datasets => {
            let entries: Vec<DatasetEntry> = catalog.datasets().map(DatasetEntry::from).collect();
            JsonOutput::print_datasets(&entries)
                .map_err(|err| GeoportalError::Filesystem(err.to_string()))
        }
        Commands::Regions(args) => {
            let id: DatasetId = args.dataset.parse()?;
            let descriptor = catalog.lookup(&id)?;
            let listing = RegionListing {
                dataset: id.to_string(),
                regions: descriptor
                    .regions()
                    .iter()
                    .map(|region| RegionEntryView {
                        code: region.code.to_string(),
                        name: region.name.clone(),
                    })
                    .collect(),
            };
            JsonOutput::print_regions(&listing)
                .map_err(|err| GeoportalError::Filesystem(err.to_string()))
        }
    }
}
