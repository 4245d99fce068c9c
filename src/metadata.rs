//! Loading, validating, and emitting the per-driver metadata document.
//!
//! N5 stores a canonical document at `attributes.json` keyed by `dimensions`,
//! `blockSize`, `dataType`, `compression`. Zarr v2 stores one at `.zarray`
//! keyed by `shape`, `chunks`, `dtype`, `compressor`, and an optional
//! `dimension_separator` (default `.`). Both are normalized here into a
//! uniform [`StoreDescriptor`]; on emit, every other key of the first
//! input's document is preserved verbatim.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::key_codec;

/// The on-disk chunked array layout an input or output store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    N5,
    Zarr,
}

impl Driver {
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "n5" => Ok(Self::N5),
            "zarr" => Ok(Self::Zarr),
            other => Err(Error::UnknownDriver(other.to_string())),
        }
    }

    pub fn metadata_filename(self) -> &'static str {
        match self {
            Self::N5 => "attributes.json",
            Self::Zarr => ".zarray",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::N5 => "n5",
            Self::Zarr => "zarr",
        })
    }
}

/// A uniform view over one input's (or the output's) metadata document.
#[derive(Debug, Clone)]
pub struct StoreDescriptor {
    pub root: PathBuf,
    pub driver: Driver,
    pub shape: Vec<u64>,
    pub chunk_shape: Vec<u64>,
    pub dtype: Value,
    pub compression: Value,
    pub dim_sep: char,
}

impl StoreDescriptor {
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(self.driver.metadata_filename())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct N5ArrayMetadata {
    dimensions: Vec<u64>,
    block_size: Vec<u64>,
    data_type: Value,
    compression: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ZarrArrayMetadata {
    shape: Vec<u64>,
    chunks: Vec<u64>,
    dtype: Value,
    compressor: Value,
    #[serde(default = "default_dim_sep")]
    dimension_separator: String,
}

fn default_dim_sep() -> String {
    ".".to_string()
}

/// Read the raw metadata document at `root`, parsed as an untyped JSON
/// value so every key (known or not) survives for later emission.
pub fn read_document(root: &Path, driver: Driver) -> Result<Value> {
    let path = root.join(driver.metadata_filename());
    let bytes = fs::read(&path).map_err(|e| Error::io(&path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::malformed_metadata(&path, e))
}

/// Load and normalize one store's metadata document into a
/// [`StoreDescriptor`].
pub fn load_descriptor(root: &Path, driver: Driver) -> Result<StoreDescriptor> {
    let path = root.join(driver.metadata_filename());
    let document = read_document(root, driver)?;
    match driver {
        Driver::N5 => {
            let m: N5ArrayMetadata = serde_json::from_value(document)
                .map_err(|e| Error::malformed_metadata(&path, e))?;
            Ok(StoreDescriptor {
                root: root.to_path_buf(),
                driver,
                shape: m.dimensions,
                chunk_shape: m.block_size,
                dtype: m.data_type,
                compression: m.compression,
                dim_sep: '/',
            })
        }
        Driver::Zarr => {
            let m: ZarrArrayMetadata = serde_json::from_value(document)
                .map_err(|e| Error::malformed_metadata(&path, e))?;
            let dim_sep = key_codec::validate_zarr_dim_sep(&m.dimension_separator)?;
            Ok(StoreDescriptor {
                root: root.to_path_buf(),
                driver,
                shape: m.shape,
                chunk_shape: m.chunks,
                dtype: m.dtype,
                compression: m.compressor,
                dim_sep,
            })
        }
    }
}

/// Build the output metadata document: every key of `base_document` is kept
/// verbatim except `dimensions`/`shape` (overwritten with `output_shape`),
/// `dimension_separator` (Zarr only, overwritten with `dim_sep`), and
/// `custom` (inserted or replaced with the concat descriptor).
pub fn build_output_document(
    driver: Driver,
    base_document: &Value,
    output_shape: &[u64],
    dim_sep: char,
    catdim: usize,
    padded_catlens: &[u64],
    virtual_catlens: &[u64],
) -> Result<Value> {
    let mut doc = base_document
        .as_object()
        .cloned()
        .ok_or_else(|| Error::incompatible("metadata document is not a JSON object"))?;

    let shape_key = match driver {
        Driver::N5 => "dimensions",
        Driver::Zarr => "shape",
    };
    doc.insert(
        shape_key.to_string(),
        Value::Array(output_shape.iter().map(|&n| Value::from(n)).collect()),
    );
    if driver == Driver::Zarr {
        doc.insert(
            "dimension_separator".to_string(),
            Value::String(dim_sep.to_string()),
        );
    }
    doc.insert(
        "custom".to_string(),
        serde_json::json!({
            "catdim": catdim,
            "padded_catlens": padded_catlens,
            "virtual_catlens": virtual_catlens,
        }),
    );
    Ok(Value::Object(doc))
}

/// Write a metadata document to `root`'s canonical filename for `driver`.
pub fn write_document(root: &Path, driver: Driver, document: &Value) -> Result<()> {
    let path = root.join(driver.metadata_filename());
    let bytes = serde_json::to_vec_pretty(document).expect("JSON value is always serializable");
    fs::write(&path, bytes).map_err(|e| Error::io(&path, e))
}

/// The `custom` block of an output store's metadata document (§6).
#[derive(Debug, Clone, Deserialize)]
pub struct ConcatCustom {
    pub catdim: usize,
    pub padded_catlens: Vec<u64>,
    pub virtual_catlens: Vec<u64>,
}

/// Read back the `custom` block fabricated by a previous concatenation.
pub fn read_concat_custom(root: &Path, driver: Driver) -> Result<ConcatCustom> {
    let path = root.join(driver.metadata_filename());
    let document = read_document(root, driver)?;
    let custom = document
        .get("custom")
        .ok_or_else(|| Error::incompatible(format!("{path:?} has no \"custom\" block")))?;
    serde_json::from_value(custom.clone()).map_err(|e| Error::malformed_metadata(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_n5_attrs(dir: &Path, dimensions: &[u64], block_size: &[u64]) {
        let doc = serde_json::json!({
            "dimensions": dimensions,
            "blockSize": block_size,
            "dataType": "uint8",
            "compression": {"type": "raw"},
        });
        let mut f = fs::File::create(dir.join("attributes.json")).unwrap();
        f.write_all(doc.to_string().as_bytes()).unwrap();
    }

    #[test]
    fn load_n5_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        write_n5_attrs(dir.path(), &[4, 6, 3], &[1, 1, 2]);
        let desc = load_descriptor(dir.path(), Driver::N5).unwrap();
        assert_eq!(desc.shape, vec![4, 6, 3]);
        assert_eq!(desc.chunk_shape, vec![1, 1, 2]);
        assert_eq!(desc.dim_sep, '/');
        assert_eq!(desc.dtype, Value::String("uint8".into()));
    }

    #[test]
    fn load_zarr_descriptor_defaults_dim_sep() {
        let dir = tempfile::tempdir().unwrap();
        let doc = serde_json::json!({
            "zarr_format": 2,
            "shape": [1, 3],
            "chunks": [1, 1],
            "dtype": "<u1",
            "compressor": null,
        });
        fs::write(dir.path().join(".zarray"), doc.to_string()).unwrap();
        let desc = load_descriptor(dir.path(), Driver::Zarr).unwrap();
        assert_eq!(desc.dim_sep, '.');
        assert_eq!(desc.compression, Value::Null);
    }

    #[test]
    fn load_zarr_descriptor_rejects_bad_dim_sep() {
        let dir = tempfile::tempdir().unwrap();
        let doc = serde_json::json!({
            "shape": [1],
            "chunks": [1],
            "dtype": "<u1",
            "compressor": null,
            "dimension_separator": "a.b",
        });
        fs::write(dir.path().join(".zarray"), doc.to_string()).unwrap();
        assert!(matches!(
            load_descriptor(dir.path(), Driver::Zarr),
            Err(Error::InvalidDimensionSeparator(_))
        ));
    }

    #[test]
    fn build_output_document_preserves_unknown_keys() {
        let base = serde_json::json!({
            "dimensions": [1],
            "blockSize": [1],
            "dataType": "uint8",
            "compression": {"type": "raw"},
            "n5": "2.5.1",
        });
        let out = build_output_document(Driver::N5, &base, &[2], '/', 0, &[1, 1], &[1, 1]).unwrap();
        assert_eq!(out["n5"], "2.5.1");
        assert_eq!(out["dimensions"], serde_json::json!([2]));
        assert_eq!(out["custom"]["catdim"], 0);
        assert_eq!(out["custom"]["padded_catlens"], serde_json::json!([1, 1]));
    }

    #[test]
    fn build_output_document_sets_zarr_dim_sep() {
        let base = serde_json::json!({
            "shape": [1, 3],
            "chunks": [1, 1],
            "dtype": "<u1",
            "compressor": null,
            "dimension_separator": "/",
        });
        let out = build_output_document(Driver::Zarr, &base, &[1, 5], '.', 1, &[3, 2], &[3, 2])
            .unwrap();
        assert_eq!(out["dimension_separator"], ".");
        assert_eq!(out["shape"], serde_json::json!([1, 5]));
    }
}
