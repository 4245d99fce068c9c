#![doc = include_str!("../README.md")]

use std::path::{Path, PathBuf};

pub mod concat_view;
mod error;
pub mod fabricator;
pub mod key_codec;
pub mod metadata;
pub mod plan;

pub use error::{Error, Result};
pub use metadata::Driver;

/// Load every input's metadata, build a plan, and fabricate `output_root`
/// in one call: the library-level equivalent of the CLI binary, with no
/// progress reporting.
pub fn tsconcat(
    output_root: &Path,
    input_roots: &[PathBuf],
    catdim: usize,
    driver: Driver,
    dim_sep: char,
) -> Result<plan::ConcatPlan> {
    let descriptors = input_roots
        .iter()
        .map(|root| metadata::load_descriptor(root, driver))
        .collect::<Result<Vec<_>>>()?;
    let plan = plan::ConcatPlan::build(&descriptors, catdim, driver, dim_sep)?;
    let base_document = metadata::read_document(&input_roots[0], driver)?;
    fabricator::fabricate(output_root, &descriptors, &plan, &base_document)?;
    Ok(plan)
}
