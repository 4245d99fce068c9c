//! Materializing the output tree: metadata document, directory skeleton,
//! and one symlink per output chunk cell (§4.E), plus the pure link-count
//! predictor used for progress reporting and testing (§4.F).

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::key_codec;
use crate::metadata::{self, Driver, StoreDescriptor};
use crate::plan::ConcatPlan;

/// Predict the number of symlinks [`Fabricator::fabricate`] will create for
/// a single input of shape `dims` chunked as `chunk_shape`. The dimension
/// separators do not change the count; they are accepted for signature
/// symmetry with the fabricator, not because they affect the result.
pub fn link_count(
    dims: &[u64],
    chunk_shape: &[u64],
    _catdim: usize,
    _src_dim_sep: char,
    _tgt_dim_sep: char,
) -> u64 {
    dims.iter()
        .zip(chunk_shape.iter())
        .map(|(&d, &c)| d.div_ceil(c))
        .product()
}

/// Row-major iterator over every coordinate of a chunk grid of the given
/// shape, the last axis varying fastest.
struct ChunkGridIter {
    shape: Vec<u64>,
    next: Option<Vec<u64>>,
}

impl ChunkGridIter {
    fn new(shape: &[u64]) -> Self {
        let next = if shape.iter().all(|&s| s > 0) {
            Some(vec![0; shape.len()])
        } else {
            None
        };
        Self {
            shape: shape.to_vec(),
            next,
        }
    }
}

impl Iterator for ChunkGridIter {
    type Item = Vec<u64>;

    fn next(&mut self) -> Option<Vec<u64>> {
        let current = self.next.take()?;
        let mut advanced = current.clone();
        for axis in (0..advanced.len()).rev() {
            advanced[axis] += 1;
            if advanced[axis] < self.shape[axis] {
                self.next = Some(advanced);
                return Some(current);
            }
            advanced[axis] = 0;
        }
        self.next = None;
        Some(current)
    }
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn make_symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlink fabrication requires a POSIX filesystem",
    ))
}

/// Writes the output metadata document, then one symlink per output chunk
/// cell. A progress callback, if supplied, is invoked once per link
/// actually created (never for skipped chunks) with the running total.
pub struct Fabricator<'p> {
    progress: Option<Box<dyn FnMut(u64) + 'p>>,
}

impl<'p> Fabricator<'p> {
    pub fn new(progress: Option<Box<dyn FnMut(u64) + 'p>>) -> Self {
        Self { progress }
    }

    /// Materialize `output_root` from `descriptors` according to `plan`.
    /// `base_document` is the first input's raw metadata document, whose
    /// unrecognized keys are carried into the output verbatim.
    pub fn fabricate(
        &mut self,
        output_root: &Path,
        descriptors: &[StoreDescriptor],
        plan: &ConcatPlan,
        base_document: &Value,
    ) -> Result<()> {
        fs::create_dir_all(output_root).map_err(|e| Error::io(output_root, e))?;

        let document = metadata::build_output_document(
            plan.driver,
            base_document,
            &plan.output_shape,
            plan.dim_sep,
            plan.catdim,
            &plan.padded_catlens,
            &plan.virtual_catlens,
        )?;
        metadata::write_document(output_root, plan.driver, &document)?;

        let mut linked = 0u64;
        for (i, descriptor) in descriptors.iter().enumerate() {
            let offset_chunks = plan.offsets[i] / plan.chunk_shape[plan.catdim];
            let abs_root = descriptor
                .root
                .canonicalize()
                .map_err(|e| Error::io(&descriptor.root, e))?;
            let grid_shape: Vec<u64> = descriptor
                .shape
                .iter()
                .zip(&descriptor.chunk_shape)
                .map(|(&d, &c)| d.div_ceil(c))
                .collect();

            for cell in ChunkGridIter::new(&grid_shape) {
                let input_rel = key_codec::encode(&cell, descriptor.dim_sep);
                let input_path = abs_root.join(&input_rel);
                if !input_path.exists() {
                    // Chunk payload elided by the writer (e.g. all-fill).
                    continue;
                }

                let mut output_cell = cell;
                output_cell[plan.catdim] += offset_chunks;
                let output_rel = key_codec::encode(&output_cell, plan.dim_sep);
                let output_path = output_root.join(&output_rel);
                if let Some(parent) = output_path.parent() {
                    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
                }

                make_symlink(&input_path, &output_path)
                    .map_err(|e| Error::io(&output_path, e))?;
                linked += 1;
                if let Some(cb) = self.progress.as_mut() {
                    cb(linked);
                }
                log::trace!("linked {output_rel} -> {}", input_path.display());
            }
            log::debug!("fabricated input {i} ({linked} links so far)");
        }

        Ok(())
    }
}

pub fn fabricate(
    output_root: &Path,
    descriptors: &[StoreDescriptor],
    plan: &ConcatPlan,
    base_document: &Value,
) -> Result<()> {
    Fabricator::new(None).fabricate(output_root, descriptors, plan, base_document)
}
