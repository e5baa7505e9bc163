//! Compact binary and JSON persistence for transform grids.
//!
//! Binary layout (little-endian):
//!
//! | Field | Type |
//! |-------|------|
//! | magic `FIFS` | 4 bytes |
//! | version | `u8` |
//! | src_size, dst_size, stride | `u16` each |
//! | rows, cols | `u32` each |
//! | records, row-major | 13 bytes each |
//! | FNV-1a checksum of all preceding bytes | `u64` |
//!
//! A record is `source_row u16`, `source_col u16`, isometry code `u8`,
//! `contrast f32`, `brightness f32`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::{TransformGrid, TransformRecord};
use crate::isometry::Isometry;
use crate::params::FractalParams;
use crate::photometric::Photometric;

const MAGIC: &[u8; 4] = b"FIFS";
const VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1 + 3 * 2 + 2 * 4;
/// Bytes per stored transform record.
pub const RECORD_LEN: usize = 2 + 2 + 1 + 4 + 4;
const CHECKSUM_LEN: usize = 8;

/// A transform grid together with the geometry needed to decode it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCompressed")]
pub struct CompressedImage {
    /// Block geometry used at encode time.
    pub params: FractalParams,
    /// One transform per destination block.
    pub grid: TransformGrid,
}

#[derive(Deserialize)]
struct RawCompressed {
    params: FractalParams,
    grid: TransformGrid,
}

impl TryFrom<RawCompressed> for CompressedImage {
    type Error = Error;

    fn try_from(raw: RawCompressed) -> Result<Self> {
        raw.grid
            .validate(&raw.params)
            .map_err(|e| Error::Format(e.to_string()))?;
        Ok(Self::new(raw.params, raw.grid))
    }
}

impl CompressedImage {
    /// Bundle a grid with its parameters.
    #[must_use]
    pub fn new(params: FractalParams, grid: TransformGrid) -> Self {
        Self { params, grid }
    }

    /// Size of the binary encoding in bytes.
    pub fn compressed_size(&self) -> usize {
        HEADER_LEN + self.grid.len() * RECORD_LEN + CHECKSUM_LEN
    }

    /// Uncompressed size over compressed size; 0 for an empty stream.
    pub fn compression_ratio(&self, uncompressed_bytes: usize) -> f64 {
        let size = self.compressed_size();
        if size == 0 {
            0.0
        } else {
            uncompressed_bytes as f64 / size as f64
        }
    }

    /// Serialize to the binary format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if a size or coordinate does not fit its field.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.compressed_size());
        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        put_u16(&mut out, self.params.src_size(), "src_size")?;
        put_u16(&mut out, self.params.dst_size(), "dst_size")?;
        put_u16(&mut out, self.params.stride(), "stride")?;
        put_u32(&mut out, self.grid.rows(), "rows")?;
        put_u32(&mut out, self.grid.cols(), "cols")?;

        for record in self.grid.records() {
            put_u16(&mut out, record.source_row, "source_row")?;
            put_u16(&mut out, record.source_col, "source_col")?;
            out.push(record.isometry.code());
            out.extend_from_slice(&(record.photometric.contrast as f32).to_le_bytes());
            out.extend_from_slice(&(record.photometric.brightness as f32).to_le_bytes());
        }

        let checksum = fnv1a(&out);
        out.extend_from_slice(&checksum.to_le_bytes());
        Ok(out)
    }

    /// Parse the binary format.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(Error::Format(format!("{} bytes is too short", data.len())));
        }
        let (payload, trailer) = data.split_at(data.len() - CHECKSUM_LEN);
        if &payload[..4] != MAGIC {
            return Err(Error::Format("bad magic".to_string()));
        }
        if payload[4] != VERSION {
            return Err(Error::Format(format!("unsupported version {}", payload[4])));
        }
        let stored = u64::from_le_bytes(array(trailer));
        let computed = fnv1a(payload);
        if stored != computed {
            return Err(Error::ChecksumMismatch { stored, computed });
        }

        let mut reader = Reader { data: payload, pos: 5 };
        let src_size = usize::from(reader.u16());
        let dst_size = usize::from(reader.u16());
        let stride = usize::from(reader.u16());
        let rows = reader.u32() as usize;
        let cols = reader.u32() as usize;
        let params = FractalParams::new(src_size, dst_size, stride)
            .map_err(|e| Error::Format(e.to_string()))?;

        let expected = rows
            .checked_mul(cols)
            .and_then(|n| n.checked_mul(RECORD_LEN))
            .ok_or_else(|| Error::Format(format!("{rows}x{cols} grid is too large")))?;
        if payload.len() - HEADER_LEN != expected {
            return Err(Error::Format(format!(
                "{rows}x{cols} grid needs {expected} record bytes, found {}",
                payload.len() - HEADER_LEN
            )));
        }

        let mut records = Vec::with_capacity(rows * cols);
        for _ in 0..rows * cols {
            let source_row = usize::from(reader.u16());
            let source_col = usize::from(reader.u16());
            let isometry = Isometry::from_code(reader.u8()).map_err(|e| Error::Format(e.to_string()))?;
            let contrast = f64::from(reader.f32());
            let brightness = f64::from(reader.f32());
            records.push(TransformRecord {
                source_row,
                source_col,
                isometry,
                photometric: Photometric::new(contrast, brightness),
            });
        }

        let grid = TransformGrid::new(rows, cols, records)?;
        grid.validate(&params).map_err(|e| Error::Format(e.to_string()))?;
        Ok(Self { params, grid })
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse JSON produced by [`to_json`](Self::to_json).
    ///
    /// Records are checked against the parameters as in
    /// [`from_bytes`](Self::from_bytes).
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the binary format to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Read the binary format from `path`.
    pub fn read(path: &Path) -> Result<Self> {
        Self::from_bytes(&fs::read(path)?)
    }
}

fn put_u16(out: &mut Vec<u8>, value: usize, field: &str) -> Result<()> {
    let value = u16::try_from(value)
        .map_err(|_| Error::Format(format!("{field} {value} does not fit in 16 bits")))?;
    out.extend_from_slice(&value.to_le_bytes());
    Ok(())
}

fn put_u32(out: &mut Vec<u8>, value: usize, field: &str) -> Result<()> {
    let value = u32::try_from(value)
        .map_err(|_| Error::Format(format!("{field} {value} does not fit in 32 bits")))?;
    out.extend_from_slice(&value.to_le_bytes());
    Ok(())
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Cursor over a payload whose length has already been checked.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let bytes = array(&self.data[self.pos..]);
        self.pos += N;
        bytes
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }
}

/// FNV-1a 64-bit hash.
fn fnv1a(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use imgref::ImgVec;

    fn sample() -> CompressedImage {
        let img = ImgVec::new(
            (0..24)
                .flat_map(|y| (0..16).map(move |x| ((x * 29 + y * 53) % 256) as f64))
                .collect(),
            16,
            24,
        );
        let params = FractalParams::new(8, 4, 4).unwrap();
        let grid = Encoder::new(params).encode(img.as_ref()).unwrap();
        CompressedImage::new(params, grid)
    }

    #[test]
    fn test_binary_layout() {
        let compressed = sample();
        let bytes = compressed.to_bytes().unwrap();
        assert_eq!(bytes.len(), compressed.compressed_size());
        assert_eq!(bytes.len(), HEADER_LEN + 24 * RECORD_LEN + CHECKSUM_LEN);
        assert_eq!(&bytes[..4], b"FIFS");

        let parsed = CompressedImage::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.params, compressed.params);
        assert_eq!((parsed.grid.rows(), parsed.grid.cols()), (6, 4));
        for (a, b) in parsed.grid.records().iter().zip(compressed.grid.records()) {
            assert_eq!((a.source_row, a.source_col, a.isometry), (b.source_row, b.source_col, b.isometry));
            assert_eq!(a.photometric.contrast, f64::from(b.photometric.contrast as f32));
            assert_eq!(a.photometric.brightness, f64::from(b.photometric.brightness as f32));
        }
    }

    #[test]
    fn test_compression_ratio() {
        let compressed = sample();
        // 16x24 8-bit samples against 24 records
        let ratio = compressed.compression_ratio(16 * 24);
        assert!(ratio > 1.0);
    }

    #[test]
    fn test_detects_corruption() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[HEADER_LEN + 6] ^= 0x40;
        assert!(matches!(CompressedImage::from_bytes(&bytes), Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_rejects_bad_header() {
        let bytes = sample().to_bytes().unwrap();
        assert!(matches!(CompressedImage::from_bytes(&bytes[..10]), Err(Error::Format(_))));

        let mut wrong_magic = bytes.clone();
        wrong_magic[0] = b'X';
        assert!(matches!(CompressedImage::from_bytes(&wrong_magic), Err(Error::Format(_))));

        // Drop one record and re-seal the checksum
        let mut short = bytes[..bytes.len() - CHECKSUM_LEN - RECORD_LEN].to_vec();
        let checksum = fnv1a(&short);
        short.extend_from_slice(&checksum.to_le_bytes());
        assert!(matches!(CompressedImage::from_bytes(&short), Err(Error::Format(_))));
    }

    #[test]
    fn test_json_and_file_io() {
        let compressed = sample();
        let json = compressed.to_json().unwrap();
        assert_eq!(CompressedImage::from_json(&json).unwrap(), compressed);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.fic");
        compressed.write(&path).unwrap();
        let loaded = CompressedImage::read(&path).unwrap();
        assert_eq!(loaded.grid.len(), compressed.grid.len());
    }

    #[test]
    fn test_json_rejects_out_of_range_source() {
        let mut value: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        value["grid"]["records"][0]["source_row"] = serde_json::json!(4_611_686_018_427_387_904_u64);
        let json = serde_json::to_string(&value).unwrap();
        assert!(matches!(CompressedImage::from_json(&json), Err(Error::Json(_))));

        let mut value: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        value["grid"]["records"][0]["source_col"] = serde_json::json!(3);
        let json = serde_json::to_string(&value).unwrap();
        assert!(CompressedImage::from_json(&json).is_err());
    }

    #[test]
    fn test_fnv_known_values() {
        assert_eq!(fnv1a(b""), 0xcbf29ce484222325);
        assert_ne!(fnv1a(b"hello world"), fnv1a(b"hello world!"));
    }
}
