mod config;
mod control;
mod error;
mod export;
mod identifier;
mod metadata;
mod otu;
mod partition;
mod plate;
mod registry;
mod sample;
mod similarity;

use std::error::Error;
use std::path::Path;

use env_logger::Env;
use structopt::StructOpt;

use crate::config::{Opt, Settings};
use crate::registry::Registry;

#[macro_use]
extern crate log;

type Result<T> = std::result::Result<T, Box<dyn Error>>;

const NO_REGION_REPORT: &str = "samples_with_no_region_values.text";

/// Locates samples on the extraction plates and scores plate neighbours.
/// Returns whether the similarity pass ran.
fn check_similarity(registry: &mut Registry, plate_file: &Path) -> Result<bool> {
    if !plate_file.exists() {
        warn!(
            "Extraction sheets could not be found at {}, skipping similarity checks.",
            plate_file.display()
        );
        return Ok(false);
    }
    let plates = plate::read_plate_workbook(plate_file)?;
    registry.assign_plates(&plates);
    similarity::perform_similarity_checks(&mut registry.samples)?;
    Ok(true)
}

fn run(opt: Opt) -> Result<()> {
    let settings = match &opt.settings {
        Some(path) => {
            info!("Reading settings from {}", path.display());
            Settings::from_json(path)?
        }
        None => Settings::default(),
    };

    info!("Area: {}", opt.area);
    let samples = metadata::read_metadata(&opt.input_dir.join(&opt.input_xl), opt.area)?;
    let mut registry = Registry::new(samples, settings);

    let tables = registry.import_otu_tables(&opt.input_dir)?;
    info!("{} OTU tables imported, {} samples known", tables, registry.samples.len());

    let with_similarity = if opt.similarity {
        check_similarity(&mut registry, &opt.input_dir.join(&opt.plate_info))?
    } else {
        info!("Not performing similarity checks, use --similarity to perform them.");
        false
    };

    export::write_output(&opt.output, &registry, with_similarity)?;
    export::write_no_region_report(Path::new(NO_REGION_REPORT), &registry.samples)?;
    export::write_community(&opt.community_output, &registry.samples, &registry.settings)?;
    Ok(())
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    // set up logging
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("Biosys version {}", env!("CARGO_PKG_VERSION"));

    // set up global thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(opt.threads)
        .build_global()?;

    run(opt)
}
