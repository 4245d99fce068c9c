//! Chunk grid coordinate <-> relative path encoding for N5 and Zarr v2.
//!
//! Both drivers address a chunk by joining its grid coordinates with a
//! dimension separator. N5 always uses `/`, so every chunk's file lives in
//! its own nested directory. Zarr v2 allows either `/` (nested directories,
//! like N5) or `.` (a single flat filename per chunk).

use std::fmt::Write;

use crate::error::{Error, Result};

/// Join chunk-grid coordinates into a path relative to the store root.
///
/// Coordinates are emitted in the store's natural order, base-10, with no
/// leading zeros and no fixed width.
pub fn encode(coord: &[u64], dim_sep: char) -> String {
    let mut s = String::with_capacity(coord.len() * 2);
    for (i, idx) in coord.iter().enumerate() {
        if i > 0 {
            s.push(dim_sep);
        }
        write!(s, "{idx}").expect("writing to a String cannot fail");
    }
    s
}

/// Inverse of [`encode`]: split a chunk's relative path back into grid
/// coordinates.
pub fn decode(path: &str, dim_sep: char, rank: usize) -> Result<Vec<u64>> {
    let coord: Vec<u64> = path
        .split(dim_sep)
        .map(|component| {
            component
                .parse::<u64>()
                .map_err(|_| Error::incompatible(format!("invalid chunk coordinate {component:?}")))
        })
        .collect::<Result<_>>()?;
    if coord.len() != rank {
        return Err(Error::incompatible(format!(
            "chunk path {path:?} has {} components, expected {rank}",
            coord.len()
        )));
    }
    Ok(coord)
}

/// Validate that a dimension separator is one of the two Zarr v2 allows.
pub fn validate_zarr_dim_sep(dim_sep: &str) -> Result<char> {
    let mut chars = dim_sep.chars();
    match (chars.next(), chars.next()) {
        (Some(c @ ('/' | '.')), None) => Ok(c),
        _ => Err(Error::InvalidDimensionSeparator(dim_sep.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_joins_with_separator() {
        assert_eq!(encode(&[0, 1, 2], '/'), "0/1/2");
        assert_eq!(encode(&[0, 1, 2], '.'), "0.1.2");
    }

    #[test]
    fn encode_single_axis() {
        assert_eq!(encode(&[7], '/'), "7");
    }

    #[test]
    fn decode_roundtrips() {
        let coord = vec![3, 0, 12];
        for sep in ['/', '.'] {
            let path = encode(&coord, sep);
            assert_eq!(decode(&path, sep, 3).unwrap(), coord);
        }
    }

    #[test]
    fn decode_rejects_wrong_rank() {
        assert!(decode("0/1", '/', 3).is_err());
    }

    #[test]
    fn validate_zarr_dim_sep_accepts_slash_and_dot() {
        assert_eq!(validate_zarr_dim_sep("/").unwrap(), '/');
        assert_eq!(validate_zarr_dim_sep(".").unwrap(), '.');
    }

    #[test]
    fn validate_zarr_dim_sep_rejects_others() {
        for bad in ["", ",", ":", "a", "1", "a1", "ab", "a.b"] {
            assert!(validate_zarr_dim_sep(bad).is_err());
        }
    }
}
