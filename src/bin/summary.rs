use clap::Parser;
use indicatif::ParallelProgressIterator;
use ndarray::Array3;
use rayon::prelude::*;
use snafu::{Report, ResultExt, Snafu, Whatever};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn, Level};

use atlas_regions::config::AtlasArgs;
use atlas_regions::errors::{HierarchyError, MaskError, TableError, VolumeError};
use atlas_regions::progress::default_bar;
use atlas_regions::summary::{
    hemisphere_volumes, region_summary, write_hemisphere_volumes, write_region_summaries,
    RegionSummary,
};
use atlas_regions::table::read_structures_csv;
use atlas_regions::volume::{read_labels, read_mask};
use atlas_regions::{count_voxels, AtlasConfig, StructureHierarchy, StructureId};

const REGION_SUMMARY_FILE: &str = "summary.csv";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("Error reading structure table {}: {}", path.display(), source))]
    ReadTable {
        path: PathBuf,
        #[snafu(source(from(TableError, Box::new)))]
        source: Box<TableError>,
    },

    #[snafu(display("Error writing {}: {}", path.display(), source))]
    WriteTable {
        path: PathBuf,
        #[snafu(source(from(TableError, Box::new)))]
        source: Box<TableError>,
    },

    #[snafu(display("Invalid structure hierarchy: {}", source))]
    Hierarchy { source: HierarchyError },

    #[snafu(display("Volume error: {}", source))]
    Volume {
        #[snafu(source(from(VolumeError, Box::new)))]
        source: Box<VolumeError>,
    },

    #[snafu(display("Error summarising {}: {}", path.display(), source))]
    Summary { path: PathBuf, source: MaskError },

    #[snafu(display("Segmentation path has no file name: {}", path.display()))]
    InvalidSegmentationPath { path: PathBuf },

    #[snafu(display(
        "Segmentations {} and {} would both be reported as {}",
        first.display(),
        second.display(),
        name
    ))]
    DuplicateRegionName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[snafu(display("IO error on {}: {}", path.display(), source))]
    IO {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },
}

#[derive(Parser, Debug)]
#[command(version = env!("CARGO_PKG_VERSION"), about = "Report the atlas structures covered by segmented regions, per hemisphere", long_about = None)]
struct Args {
    #[arg(help = "Structure table CSV with id, parent_id and name columns")]
    structures: PathBuf,

    #[arg(help = "Labelled atlas volume (.npy)")]
    annotations: PathBuf,

    #[arg(help = "Hemisphere map (.npy) in the same space as the annotations")]
    hemispheres: PathBuf,

    #[arg(help = "Output directory")]
    output: PathBuf,

    #[arg(help = "Segmentation masks (.npy)", required = true, num_args = 1..)]
    segmentations: Vec<PathBuf>,

    #[arg(
        help = "Also write the extent of each segmentation to summary.csv",
        long = "regions",
        short = 'r',
        default_value_t = false
    )]
    regions: bool,

    #[arg(
        help = "Write reports for segmentations without any voxels",
        long = "keep-empty",
        default_value_t = false
    )]
    keep_empty: bool,

    #[command(flatten)]
    atlas: AtlasArgs,

    #[arg(
        help = "Enable verbose logging",
        long = "verbose",
        short = 'v',
        default_value = "false"
    )]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    run(args).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-1);
    });
}

/// Volumes shared by every segmentation
struct Atlas {
    hierarchy: StructureHierarchy,
    annotations: Array3<StructureId>,
    hemispheres: Array3<u32>,
    config: AtlasConfig,
}

fn region_name(path: &Path) -> Result<String, Error> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidSegmentationPath {
            path: path.to_path_buf(),
        })
}

/// Reports are named by file stem, so two segmentations may not share one
fn check_region_names(paths: &[PathBuf]) -> Result<(), Error> {
    let mut seen: HashMap<String, &PathBuf> = HashMap::with_capacity(paths.len());
    for path in paths {
        let name = region_name(path)?;
        if let Some(first) = seen.get(&name) {
            return Err(Error::DuplicateRegionName {
                name,
                first: first.to_path_buf(),
                second: path.clone(),
            });
        }
        seen.insert(name, path);
    }
    Ok(())
}

/// Write the hemisphere report of one segmentation, returning its extent if requested
fn process_segmentation(
    path: &Path,
    atlas: &Atlas,
    output: &Path,
    args: &Args,
) -> Result<Option<RegionSummary>, Error> {
    let name = region_name(path)?;
    let segmentation = read_mask(path).context(VolumeSnafu)?;
    if !args.keep_empty && count_voxels(&segmentation) == 0 {
        warn!("Skipping empty segmentation {}", path.display());
        return Ok(None);
    }

    let rows = hemisphere_volumes(
        &segmentation,
        atlas.annotations.view(),
        atlas.hemispheres.view(),
        &atlas.hierarchy,
        &atlas.config,
    )
    .context(SummarySnafu { path })?;
    let report = output.join(format!("{name}.csv"));
    let file = File::create(&report).context(IOSnafu {
        path: report.clone(),
    })?;
    write_hemisphere_volumes(file, &rows).context(WriteTableSnafu { path: &report })?;
    info!("Wrote {} structures to {}", rows.len(), report.display());

    if !args.regions {
        return Ok(None);
    }
    Ok(region_summary(&name, &segmentation, &atlas.config))
}

fn run(args: Args) -> Result<(), Error> {
    check_region_names(&args.segmentations)?;
    let config = AtlasConfig::from(&args.atlas);
    let records = read_structures_csv(&args.structures).context(ReadTableSnafu {
        path: args.structures.clone(),
    })?;
    let atlas = Atlas {
        hierarchy: StructureHierarchy::load(records, config.root_id()).context(HierarchySnafu)?,
        annotations: read_labels(&args.annotations).context(VolumeSnafu)?,
        hemispheres: read_labels(&args.hemispheres).context(VolumeSnafu)?,
        config,
    };
    std::fs::create_dir_all(&args.output).context(IOSnafu {
        path: args.output.clone(),
    })?;

    let pb = default_bar(args.segmentations.len() as u64);
    pb.set_message("Summarising segmentations");
    let results: Result<Vec<_>, Error> = args
        .segmentations
        .par_iter()
        .progress_with(pb)
        .map(|path| process_segmentation(path, &atlas, &args.output, &args))
        .collect();
    let summaries = results?.into_iter().flatten().collect::<Vec<_>>();

    if args.regions {
        let path = args.output.join(REGION_SUMMARY_FILE);
        let file = File::create(&path).context(IOSnafu { path: path.clone() })?;
        write_region_summaries(file, &summaries).context(WriteTableSnafu { path: &path })?;
        info!("Wrote {} region summaries to {}", summaries.len(), path.display());
    }
    println!(
        "Summarised {} segmentations into {}",
        args.segmentations.len(),
        args.output.display()
    );
    Ok(())
}
