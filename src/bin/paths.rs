use clap::Parser;
use snafu::{Report, ResultExt, Snafu, Whatever};
use std::path::PathBuf;
use tracing::{error, info, Level};

use atlas_regions::config::DEFAULT_ROOT_ID;
use atlas_regions::errors::{HierarchyError, TableError};
use atlas_regions::table::{read_structures_csv, write_annotated, write_annotated_csv};
use atlas_regions::{StructureHierarchy, StructureId};

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("Error reading structure table {}: {}", path.display(), source))]
    ReadTable {
        path: PathBuf,
        #[snafu(source(from(TableError, Box::new)))]
        source: Box<TableError>,
    },

    #[snafu(display("Error writing annotated table: {}", source))]
    WriteTable {
        #[snafu(source(from(TableError, Box::new)))]
        source: Box<TableError>,
    },

    #[snafu(display("Invalid structure hierarchy: {}", source))]
    Hierarchy { source: HierarchyError },
}

#[derive(Parser, Debug)]
#[command(version = env!("CARGO_PKG_VERSION"), about = "Annotate a structure table with root-to-parent id paths", long_about = None)]
struct Args {
    #[arg(help = "Structure table CSV with id, parent_id and name columns")]
    structures: PathBuf,

    #[arg(help = "Output CSV. Writes to stdout if omitted")]
    output: Option<PathBuf>,

    #[arg(
        help = "Id of the hierarchy root",
        long = "root-id",
        default_value_t = DEFAULT_ROOT_ID
    )]
    root_id: StructureId,

    #[arg(
        help = "Print the ids of this structure and all of its descendants instead",
        long = "descendants-of",
        conflicts_with = "children_of"
    )]
    descendants_of: Option<StructureId>,

    #[arg(
        help = "Print the ids of the direct children of this structure instead",
        long = "children-of"
    )]
    children_of: Option<StructureId>,

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
        Level::ERROR
    };
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_writer(std::io::stderr)
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

fn print_ids(ids: impl IntoIterator<Item = StructureId>) {
    for id in ids {
        println!("{}", id);
    }
}

fn run(args: Args) -> Result<(), Error> {
    let records = read_structures_csv(&args.structures).context(ReadTableSnafu {
        path: args.structures.clone(),
    })?;
    let hierarchy = StructureHierarchy::load(records, args.root_id).context(HierarchySnafu)?;
    info!(
        "Loaded {} structures from {}",
        hierarchy.len(),
        args.structures.display()
    );

    if let Some(id) = args.descendants_of {
        print_ids(hierarchy.descendants_of(id, true).context(HierarchySnafu)?);
        return Ok(());
    }
    if let Some(id) = args.children_of {
        print_ids(hierarchy.children_of(id).context(HierarchySnafu)?.iter().copied());
        return Ok(());
    }

    let annotated = hierarchy
        .add_paths_to_table(hierarchy.records())
        .context(HierarchySnafu)?;
    match &args.output {
        Some(path) => {
            write_annotated_csv(path, &annotated).context(WriteTableSnafu)?;
            info!("Wrote {} rows to {}", annotated.len(), path.display());
        }
        None => write_annotated(std::io::stdout().lock(), &annotated).context(WriteTableSnafu)?,
    }
    Ok(())
}
