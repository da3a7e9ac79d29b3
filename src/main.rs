use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use nc_raster_tools::catalog::{CatalogSynchronizer, RestCatalogClient};
use nc_raster_tools::config::Settings;
use nc_raster_tools::dispatch::{Dispatcher, HttpJobStore, LineSource};
use nc_raster_tools::job::{HttpNotifier, JobStateMachine};
use nc_raster_tools::logger;
use nc_raster_tools::raster::{Crs, geotiff_path};
use nc_raster_tools::transform::{self, Resampling, TemplateOptions};

#[derive(Parser)]
#[command(name = "nc-raster-tools")]
#[command(about = "Raster processing worker and tools for map uploads", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process job deliveries read from stdin, one JSON envelope per line
    Worker,

    /// Reproject a raster onto the grid of a template raster
    Reproject {
        /// CRS of the source raster, if it carries none
        #[arg(long = "s-crs")]
        source_crs: Option<Crs>,

        /// CRS of the template raster, if it carries none
        #[arg(long = "t-crs")]
        template_crs: Option<Crs>,

        /// Crop the result to the reprojected extent of the source
        #[arg(long)]
        clip: bool,

        source: PathBuf,
        template: PathBuf,
        target: PathBuf,

        /// average or nearest
        resampling: Resampling,
    },

    /// Convert a PNG or JPEG image into a georeferenceable GeoTIFF
    Convert {
        image: PathBuf,

        /// Defaults to the image path with a .tif extension
        raster: Option<PathBuf>,

        #[arg(long, default_value = "EPSG:3857")]
        crs: Crs,
    },

    /// Rewrite a raster in the format given by the target extension
    Reformat {
        source: PathBuf,
        target: PathBuf,

        /// Override the CRS written to the target
        #[arg(long)]
        crs: Option<Crs>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init(args.verbose);

    match args.command {
        Command::Worker => run_worker(),
        Command::Reproject {
            source_crs,
            template_crs,
            clip,
            source,
            template,
            target,
            resampling,
        } => {
            let options = TemplateOptions {
                source_crs,
                template_crs,
                clip,
            };
            transform::reproject_to_template_with(&source, &template, &target, resampling, options)
                .with_context(|| format!("reprojecting {}", source.display()))?;
            Ok(())
        }
        Command::Convert { image, raster, crs } => {
            let raster = raster.unwrap_or_else(|| geotiff_path(&image));
            transform::convert_image_to_raster(&image, &raster, crs)
                .with_context(|| format!("converting {}", image.display()))?;
            Ok(())
        }
        Command::Reformat { source, target, crs } => {
            transform::reformat(&source, &target, crs)
                .with_context(|| format!("reformatting {}", source.display()))?;
            Ok(())
        }
    }
}

fn run_worker() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("loading configuration")?;
    info!(environment = %settings.environment, target_crs = %settings.target_crs, "Starting worker");

    let catalog = RestCatalogClient::with_timeout(
        &settings.geoserver_uri,
        &settings.geoserver_user,
        &settings.geoserver_password,
        settings.http_timeout,
    )?;
    let notifier = HttpNotifier::new(&settings.client_notifier_uri, settings.http_timeout)?;
    let machine = JobStateMachine::new(CatalogSynchronizer::new(catalog), notifier, settings.target_crs);
    let store = HttpJobStore::new(settings.http_timeout)?;
    let dispatcher = Dispatcher::new(store, machine);

    let stdin = io::stdin();
    let mut source = LineSource::new(stdin.lock());
    let handled = dispatcher.run(&mut source)?;

    info!(handled, "Input closed, worker stopped");
    Ok(())
}
