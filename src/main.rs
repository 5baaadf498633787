use clap::Parser;
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};
use snafu::{Report, ResultExt, Snafu, Whatever};
use std::path::PathBuf;
use tracing::{error, info, Level};

use atlas_regions::config::AtlasArgs;
use atlas_regions::errors::{HierarchyError, MaskError, RegionError, TableError, VolumeError};
use atlas_regions::mask::{build_region, count_voxels, mask_for_ids, Smoothing};
use atlas_regions::mask::{DEFAULT_SIGMA, DEFAULT_THRESHOLD};
use atlas_regions::progress::default_bar;
use atlas_regions::table::read_structures_csv;
use atlas_regions::volume::{read_labels, write_mask};
use atlas_regions::{AtlasConfig, StructureHierarchy, StructureId, Transform};

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("Error reading structure table {}: {}", path.display(), source))]
    Table {
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

    #[snafu(display("Mask error: {}", source))]
    Mask { source: MaskError },

    #[snafu(display("Error building region {}: {}", structure_id, source))]
    Region {
        structure_id: StructureId,
        source: RegionError,
    },

    #[snafu(display("Could not build thread pool: {}", source))]
    ThreadPool { source: ThreadPoolBuildError },

    #[snafu(display("Failed to create directory: {}", path.display()))]
    CreateDir {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },
}

#[derive(Parser, Debug)]
#[command(version = env!("CARGO_PKG_VERSION"), about = "Build a binary mask of an atlas structure and all of its substructures", long_about = None)]
struct Args {
    #[arg(help = "Structure table CSV with id, parent_id and name columns")]
    structures: PathBuf,

    #[arg(help = "Labelled atlas volume (.npy)")]
    annotations: PathBuf,

    #[arg(help = "Structure id of the region")]
    structure_id: StructureId,

    #[arg(help = "Output mask (.npy), or output directory when --each is given")]
    output: PathBuf,

    #[arg(
        help = "Write the raw union of labels without slice-wise smoothing",
        long = "no-smooth",
        default_value_t = false
    )]
    no_smooth: bool,

    #[arg(
        help = "Standard deviation of the in-slice Gaussian, in voxels",
        long = "sigma",
        default_value_t = DEFAULT_SIGMA
    )]
    sigma: f64,

    #[arg(
        help = "Smoothed intensities above this value are kept",
        long = "threshold",
        default_value_t = DEFAULT_THRESHOLD
    )]
    threshold: f64,

    #[arg(
        help = "Write one mask per substructure, named {id}.npy, into the output directory. Each worker thread holds one full-volume mask",
        long = "each",
        short = 'e',
        default_value_t = false
    )]
    each: bool,

    #[arg(
        help = "Number of threads for --each, which bounds peak memory (default: all cores)",
        long = "threads",
        short = 't'
    )]
    threads: Option<usize>,

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

fn run(args: Args) -> Result<(), Error> {
    let config = AtlasConfig::from(&args.atlas);
    let records = read_structures_csv(&args.structures).context(TableSnafu {
        path: args.structures.clone(),
    })?;
    let hierarchy = StructureHierarchy::load(records, config.root_id()).context(HierarchySnafu)?;
    let annotations = read_labels(&args.annotations).context(VolumeSnafu)?;

    let smoothing = if args.no_smooth {
        None
    } else {
        Some(Smoothing::new(args.sigma, args.threshold).context(MaskSnafu)?)
    };

    if args.each {
        return export_each(&args, &hierarchy, &annotations, smoothing.as_ref());
    }

    let mask = build_region(
        annotations.view(),
        &hierarchy,
        args.structure_id,
        smoothing.as_ref(),
    )
    .context(RegionSnafu {
        structure_id: args.structure_id,
    })?;
    write_mask(&args.output, &mask).context(VolumeSnafu)?;

    let voxels = count_voxels(&mask);
    let name = hierarchy.name_of(args.structure_id).unwrap_or("unnamed");
    info!("Wrote mask of {} to {}", name, args.output.display());
    println!(
        "{}\t{}\t{}\t{}",
        args.structure_id,
        name,
        voxels,
        voxels as f64 * config.voxel_volume_mm3()
    );
    Ok(())
}

/// Export every substructure of the requested region as its own mask
fn export_each(
    args: &Args,
    hierarchy: &StructureHierarchy,
    annotations: &ndarray::Array3<StructureId>,
    smoothing: Option<&Smoothing>,
) -> Result<(), Error> {
    let ids = hierarchy
        .descendants_of(args.structure_id, true)
        .context(HierarchySnafu)?;
    std::fs::create_dir_all(&args.output).context(CreateDirSnafu {
        path: args.output.clone(),
    })?;

    // Zero lets rayon pick the number of cores
    let pool = ThreadPoolBuilder::new()
        .num_threads(args.threads.unwrap_or(0))
        .build()
        .context(ThreadPoolSnafu)?;

    let bar = default_bar(ids.len() as u64);
    bar.set_message("Exporting substructure masks");
    pool.install(|| {
        ids.into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .progress_with(bar)
            .try_for_each(|id| {
                let mask = mask_for_ids(annotations.view(), [id]).context(MaskSnafu)?;
                let mask = match smoothing {
                    Some(smoothing) => smoothing.apply(mask),
                    None => mask,
                };
                let path = args.output.join(format!("{id}.npy"));
                write_mask(&path, &mask).context(VolumeSnafu)
            })
    })?;
    info!("Exported substructures to {}", args.output.display());
    Ok(())
}
