//! Compatibility checking and plan construction (§3/§4.C/§4.D).

use crate::error::{Error, Result};
use crate::metadata::{Driver, StoreDescriptor};

/// The derived concatenation plan: output shape plus the per-input length
/// vectors needed to place every input's chunk grid into the output chunk
/// grid.
#[derive(Debug, Clone)]
pub struct ConcatPlan {
    pub catdim: usize,
    pub driver: Driver,
    pub dim_sep: char,
    pub chunk_shape: Vec<u64>,
    pub output_shape: Vec<u64>,
    pub virtual_catlens: Vec<u64>,
    pub padded_catlens: Vec<u64>,
    /// `offsets[i]` is the chunk-aligned element offset of input `i` along
    /// `catdim`, i.e. `sum(padded_catlens[..i])`. Derived, not persisted.
    pub offsets: Vec<u64>,
}

impl ConcatPlan {
    /// Validate `descriptors` and build the plan for concatenating them
    /// along `catdim` into a store of driver `driver` with separator
    /// `dim_sep`.
    pub fn build(
        descriptors: &[StoreDescriptor],
        catdim: usize,
        driver: Driver,
        dim_sep: char,
    ) -> Result<Self> {
        check_compatible(descriptors, catdim, driver, dim_sep)?;

        let chunk_shape = descriptors[0].chunk_shape.clone();
        let chunk_extent = chunk_shape[catdim];

        let virtual_catlens: Vec<u64> = descriptors.iter().map(|d| d.shape[catdim]).collect();
        // Rounded up uniformly, regardless of an input's position: the
        // offset table this produces never collides even when an interior
        // input's length happens not to be chunk-aligned, since every
        // input's padded extent already accounts for its own rounding.
        let padded_catlens: Vec<u64> = virtual_catlens
            .iter()
            .map(|&len| len.div_ceil(chunk_extent) * chunk_extent)
            .collect();

        let mut offsets = Vec::with_capacity(descriptors.len());
        let mut acc = 0u64;
        for &padded in &padded_catlens {
            offsets.push(acc);
            acc += padded;
        }

        let mut output_shape = descriptors[0].shape.clone();
        output_shape[catdim] = virtual_catlens.iter().sum();

        Ok(Self {
            catdim,
            driver,
            dim_sep,
            chunk_shape,
            output_shape,
            virtual_catlens,
            padded_catlens,
            offsets,
        })
    }
}

/// Enforce the cross-input invariants required for linkable concatenation
/// (§3). Every violation is reported before any file is written.
fn check_compatible(
    descriptors: &[StoreDescriptor],
    catdim: usize,
    driver: Driver,
    dim_sep: char,
) -> Result<()> {
    if descriptors.len() < 2 {
        return Err(Error::NotEnoughInputs);
    }
    if driver == Driver::Zarr {
        crate::key_codec::validate_zarr_dim_sep(&dim_sep.to_string())?;
    }

    let first = &descriptors[0];
    let rank = first.rank();
    if catdim >= rank {
        return Err(Error::incompatible(format!(
            "catdim {catdim} out of bounds for rank {rank}"
        )));
    }

    for (i, d) in descriptors.iter().enumerate().skip(1) {
        if d.rank() != rank {
            return Err(Error::incompatible(format!(
                "input {i} has rank {}, expected {rank}",
                d.rank()
            )));
        }
        if d.chunk_shape != first.chunk_shape {
            return Err(Error::incompatible(format!(
                "input {i} has chunk shape {:?}, expected {:?}",
                d.chunk_shape, first.chunk_shape
            )));
        }
        if d.dtype != first.dtype {
            return Err(Error::incompatible(format!(
                "input {i} has dtype {:?}, expected {:?}",
                d.dtype, first.dtype
            )));
        }
        if d.compression != first.compression {
            return Err(Error::incompatible(format!(
                "input {i} has compression {:?}, expected {:?}",
                d.compression, first.compression
            )));
        }
        for axis in 0..rank {
            if axis != catdim && d.shape[axis] != first.shape[axis] {
                return Err(Error::incompatible(format!(
                    "input {i} has shape {:?}, which disagrees with input 0's shape {:?} on axis {axis} (not the concat axis)",
                    d.shape, first.shape
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn desc(shape: Vec<u64>, chunk_shape: Vec<u64>) -> StoreDescriptor {
        StoreDescriptor {
            root: PathBuf::new(),
            driver: Driver::N5,
            shape,
            chunk_shape,
            dtype: serde_json::json!("uint8"),
            compression: serde_json::json!({"type": "raw"}),
            dim_sep: '/',
        }
    }

    #[test]
    fn rejects_fewer_than_two_inputs() {
        let descriptors = [desc(vec![1], vec![1])];
        assert!(matches!(
            ConcatPlan::build(&descriptors, 0, Driver::N5, '/'),
            Err(Error::NotEnoughInputs)
        ));
    }

    #[test]
    fn rejects_rank_mismatch() {
        let descriptors = [desc(vec![1, 3], vec![1, 1]), desc(vec![1, 2, 4], vec![1, 1, 2])];
        assert!(matches!(
            ConcatPlan::build(&descriptors, 0, Driver::N5, '/'),
            Err(Error::IncompatibleInputs(_))
        ));
    }

    #[test]
    fn rejects_invalid_zarr_dim_sep() {
        let descriptors = [desc(vec![1], vec![1]), desc(vec![1], vec![1])];
        assert!(matches!(
            ConcatPlan::build(&descriptors, 0, Driver::Zarr, 'x'),
            Err(Error::InvalidDimensionSeparator(_))
        ));
    }

    #[test]
    fn two_1d_inputs_shape_1_chunk_1() {
        let descriptors = [desc(vec![1], vec![1]), desc(vec![1], vec![1])];
        let plan = ConcatPlan::build(&descriptors, 0, Driver::N5, '/').unwrap();
        assert_eq!(plan.output_shape, vec![2]);
        assert_eq!(plan.virtual_catlens, vec![1, 1]);
        assert_eq!(plan.padded_catlens, vec![1, 1]);
        assert_eq!(plan.offsets, vec![0, 1]);
    }

    #[test]
    fn three_3d_inputs_padded_and_virtual_catlens() {
        let descriptors = [
            desc(vec![2, 3, 4], vec![1, 1, 2]),
            desc(vec![2, 3, 5], vec![1, 1, 2]),
            desc(vec![2, 3, 3], vec![1, 1, 2]),
        ];
        let plan = ConcatPlan::build(&descriptors, 2, Driver::N5, '/').unwrap();
        assert_eq!(plan.padded_catlens, vec![4, 6, 3]);
        assert_eq!(plan.virtual_catlens, vec![4, 5, 3]);
        assert_eq!(plan.output_shape, vec![2, 3, 13]);
        assert_eq!(plan.offsets, vec![0, 4, 10]);
    }

    #[test]
    fn interior_misaligned_length_still_produces_a_plan() {
        // Input 0 has catdim length 3 with chunk extent 2 (not a multiple)
        // and is not the last input. The original tsconcat tool accepts
        // this and rounds up uniformly rather than rejecting it.
        let descriptors = [desc(vec![1, 3], vec![1, 2]), desc(vec![1, 4], vec![1, 2])];
        let plan = ConcatPlan::build(&descriptors, 1, Driver::N5, '/').unwrap();
        assert_eq!(plan.padded_catlens, vec![4, 4]);
        assert_eq!(plan.virtual_catlens, vec![3, 4]);
        assert_eq!(plan.output_shape, vec![1, 8]);
    }

    #[test]
    fn rejects_off_axis_shape_mismatch() {
        let descriptors = [desc(vec![1, 3], vec![1, 1]), desc(vec![1, 2], vec![1, 1])];
        assert!(matches!(
            ConcatPlan::build(&descriptors, 1, Driver::N5, '/'),
            Err(Error::IncompatibleInputs(_))
        ));
    }

    #[test]
    fn rejects_chunk_shape_mismatch() {
        let descriptors = [desc(vec![3, 1], vec![2, 1]), desc(vec![2, 1], vec![1, 1])];
        assert!(matches!(
            ConcatPlan::build(&descriptors, 0, Driver::N5, '/'),
            Err(Error::IncompatibleInputs(_))
        ));
    }

    #[test]
    fn rejects_dtype_mismatch() {
        let mut a = desc(vec![3, 1], vec![1, 1]);
        a.dtype = serde_json::json!("uint8");
        let mut b = desc(vec![2, 1], vec![1, 1]);
        b.dtype = serde_json::json!("float32");
        assert!(matches!(
            ConcatPlan::build(&[a, b], 0, Driver::N5, '/'),
            Err(Error::IncompatibleInputs(_))
        ));
    }

    #[test]
    fn rejects_compression_mismatch() {
        let mut a = desc(vec![3, 1], vec![1, 1]);
        a.compression = serde_json::json!({"type": "gzip", "level": 6});
        let mut b = desc(vec![2, 1], vec![1, 1]);
        b.compression = serde_json::json!({"type": "gzip", "level": 5});
        assert!(matches!(
            ConcatPlan::build(&[a, b], 0, Driver::N5, '/'),
            Err(Error::IncompatibleInputs(_))
        ));
    }
}
