//! The masked concatenated view (§4.G): opens an already-fabricated output
//! store and presents its logical shape and the index remapping that hides
//! padded, non-existent cells along the concat axis.
//!
//! Reading and writing chunk payloads is left to the caller's own store
//! driver (out of scope here, per §1); this module only computes *which*
//! physical cells a logical index touches.

use std::path::Path;

use crate::error::{Error, Result};
use crate::metadata::{self, Driver};

/// A single-axis or tuple index expression over a [`ConcatDataset`]'s
/// virtual shape. Mirrors the polymorphic index the source dataset accepts
/// (empty, full-axis, an integer list, a boolean mask, or a tuple of any of
/// these) as a tagged variant so remapping can dispatch on it directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Selects nothing.
    Empty,
    /// The whole axis (`:`).
    Full,
    /// Integer positions into the *virtual* axis.
    IntList(Vec<u64>),
    /// A boolean mask the length of the *virtual* axis.
    BoolMask(Vec<bool>),
    /// A per-axis selector tuple.
    Tuple(Vec<Selector>),
}

fn true_positions(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter(|&(_, &b)| b)
        .map(|(i, _)| i)
        .collect()
}

/// Concatenate per-input masks: `virtual_catlens[i]` leading `true` entries
/// followed by `padded_catlens[i] - virtual_catlens[i]` trailing `false`
/// entries, for every input in order.
pub fn build_padded_mask(padded_catlens: &[u64], virtual_catlens: &[u64]) -> Vec<bool> {
    let mut mask = Vec::with_capacity(padded_catlens.iter().sum::<u64>() as usize);
    for (&padded, &virt) in padded_catlens.iter().zip(virtual_catlens) {
        mask.extend(std::iter::repeat_n(true, virt as usize));
        mask.extend(std::iter::repeat_n(false, (padded - virt) as usize));
    }
    mask
}

fn rewrite_selector(selector: &Selector, padded_mask: &[bool]) -> Result<Vec<bool>> {
    match selector {
        Selector::Empty => Ok(vec![false; padded_mask.len()]),
        Selector::Full => Ok(padded_mask.to_vec()),
        Selector::IntList(indices) => {
            let positions = true_positions(padded_mask);
            let mut result = vec![false; padded_mask.len()];
            for &k in indices {
                let pos = *positions.get(k as usize).ok_or_else(|| {
                    Error::incompatible(format!(
                        "selector index {k} out of range for {} true cells",
                        positions.len()
                    ))
                })?;
                result[pos] = true;
            }
            Ok(result)
        }
        Selector::BoolMask(bits) => {
            let positions = true_positions(padded_mask);
            if bits.len() != positions.len() {
                return Err(Error::incompatible(format!(
                    "boolean selector has length {}, expected virtual length {}",
                    bits.len(),
                    positions.len()
                )));
            }
            let mut result = vec![false; padded_mask.len()];
            for (k, &bit) in bits.iter().enumerate() {
                if bit {
                    result[positions[k]] = true;
                }
            }
            Ok(result)
        }
        Selector::Tuple(_) => Err(Error::incompatible(
            "a tuple selector is not valid at a single axis",
        )),
    }
}

/// Convert a caller-supplied index expression over the virtual shape into
/// an index expression over the physical shape (`_remap_index`).
///
/// Selectors before and after `catdim` pass through unchanged; the list is
/// right-padded with full-axis selectors up to length `catdim + 1` first,
/// and the selector at `catdim` is rewritten into a boolean mask over
/// `padded_mask`.
pub fn remap_index(index: Selector, padded_mask: &[bool], catdim: usize) -> Result<Selector> {
    let mut selectors = match index {
        Selector::Tuple(selectors) => selectors,
        single => vec![single],
    };
    while selectors.len() <= catdim {
        selectors.push(Selector::Full);
    }
    let mask = rewrite_selector(&selectors[catdim], padded_mask)?;
    selectors[catdim] = Selector::BoolMask(mask);
    Ok(Selector::Tuple(selectors))
}

/// A fabricated concat store's logical view: its virtual shape, and the
/// mask that separates virtual cells from padding along the concat axis.
#[derive(Debug, Clone)]
pub struct ConcatDataset {
    pub driver: Driver,
    pub virtual_shape: Vec<u64>,
    pub chunk_shape: Vec<u64>,
    pub catdim: usize,
    pub virtual_catlens: Vec<u64>,
    pub padded_catlens: Vec<u64>,
    pub padded_mask: Vec<bool>,
}

impl ConcatDataset {
    /// Open an already-fabricated output store, reading its metadata
    /// document and `custom` concat descriptor.
    pub fn open(root: &Path, driver: Driver) -> Result<Self> {
        let descriptor = metadata::load_descriptor(root, driver)?;
        let custom = metadata::read_concat_custom(root, driver)?;
        let padded_mask = build_padded_mask(&custom.padded_catlens, &custom.virtual_catlens);
        Ok(Self {
            driver,
            virtual_shape: descriptor.shape,
            chunk_shape: descriptor.chunk_shape,
            catdim: custom.catdim,
            virtual_catlens: custom.virtual_catlens,
            padded_catlens: custom.padded_catlens,
            padded_mask,
        })
    }

    /// The physical shape covered by the linked chunk grid: at least as
    /// large as `virtual_shape` on `catdim`, equal elsewhere.
    pub fn physical_shape(&self) -> Vec<u64> {
        let mut shape = self.virtual_shape.clone();
        shape[self.catdim] = self.padded_catlens.iter().sum();
        shape
    }

    /// Remap a virtual-shape index into a physical-shape index ready to
    /// forward to the underlying store driver.
    pub fn remap(&self, index: Selector) -> Result<Selector> {
        remap_index(index, &self.padded_mask, self.catdim)
    }
}
