//! CLI front end: parses arguments, loads every input's metadata, builds a
//! plan, and fabricates the output tree. See [`tsconcat::fabricator`] and
//! [`tsconcat::plan`] for the library this wraps.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use tsconcat::fabricator::{link_count, Fabricator};
use tsconcat::key_codec;
use tsconcat::metadata::{self, Driver};
use tsconcat::plan::ConcatPlan;
use tsconcat::{Error, Result};

/// Concatenate N5 or Zarr v2 chunked array stores along one axis by
/// symlinking chunk files. No chunk payload is read or rewritten.
#[derive(Parser)]
#[command(author, version)]
struct Cli {
    /// Directory to create the concatenated output store in. Must not
    /// already exist, or be empty.
    output_root: PathBuf,

    /// Two or more input store directories, concatenated in the order given.
    #[arg(required = true, num_args = 2..)]
    input_roots: Vec<PathBuf>,

    /// Axis along which to concatenate.
    #[arg(long)]
    catdim: usize,

    /// On-disk layout shared by every input and the output.
    #[arg(long, value_enum)]
    driver: DriverArg,

    /// Zarr output dimension separator, "/" or ".". Ignored for N5, which
    /// always uses "/".
    #[arg(long, default_value = ".")]
    dimsep: String,

    /// Show a progress bar while fabricating symlinks.
    #[arg(long)]
    progress: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum DriverArg {
    N5,
    Zarr,
}

impl From<DriverArg> for Driver {
    fn from(value: DriverArg) -> Self {
        match value {
            DriverArg::N5 => Driver::N5,
            DriverArg::Zarr => Driver::Zarr,
        }
    }
}

fn exit_code(error: &Error) -> u8 {
    match error {
        Error::NotEnoughInputs => 2,
        Error::UnknownDriver(_) => 3,
        Error::InvalidDimensionSeparator(_) => 4,
        Error::IncompatibleInputs(_) => 5,
        Error::MalformedMetadata { .. } => 6,
        Error::Io { .. } => 7,
    }
}

fn run(cli: Cli) -> Result<()> {
    let driver: Driver = cli.driver.into();
    let dim_sep = if driver == Driver::N5 {
        '/'
    } else {
        key_codec::validate_zarr_dim_sep(&cli.dimsep)?
    };

    log::info!(
        "loading metadata for {} input stores",
        cli.input_roots.len()
    );
    let descriptors = cli
        .input_roots
        .iter()
        .map(|root| metadata::load_descriptor(root, driver))
        .collect::<Result<Vec<_>>>()?;

    let plan = ConcatPlan::build(&descriptors, cli.catdim, driver, dim_sep)?;
    log::info!(
        "output shape {:?}, virtual_catlens {:?}, padded_catlens {:?}",
        plan.output_shape,
        plan.virtual_catlens,
        plan.padded_catlens
    );

    let base_document = metadata::read_document(&cli.input_roots[0], driver)?;

    let total_links: u64 = descriptors
        .iter()
        .map(|d| link_count(&d.shape, &d.chunk_shape, plan.catdim, d.dim_sep, plan.dim_sep))
        .sum();

    let bar = cli.progress.then(|| {
        let bar = ProgressBar::new(total_links);
        let style = ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar}] ({pos}/{len}, ETA {eta})",
        )
        .expect("template is valid");
        bar.set_style(style);
        bar
    });

    let mut fabricator = Fabricator::new(bar.as_ref().map(|bar| -> Box<dyn FnMut(u64) + '_> {
        Box::new(move |linked: u64| bar.set_position(linked))
    }));
    fabricator.fabricate(&cli.output_root, &descriptors, &plan, &base_document)?;

    if let Some(bar) = bar {
        bar.finish();
    }
    println!(
        "wrote {} to {}",
        driver.metadata_filename(),
        cli.output_root.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(exit_code(&err))
        }
    }
}
