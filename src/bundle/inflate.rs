//! Payload decompression
//!
//! Script payloads are zlib streams (deflate with the zlib header), the
//! format `Zlib::Deflate` produces.

use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;

use super::Decompressor;

/// A payload could not be inflated.
#[derive(Debug, Error)]
#[error("decompression failed: {0}")]
pub struct DecompressError(#[from] pub io::Error);

/// The default [`Decompressor`]: zlib via `flate2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZlibInflater;

impl Decompressor for ZlibInflater {
    fn decompress(
        &self,
        data: &[u8],
    ) -> Result<Vec<u8>, DecompressError> {
        let mut out = Vec::with_capacity(data.len() * 4);
        ZlibDecoder::new(data).read_to_end(&mut out)?;
        Ok(out)
    }
}

/// Compress `data` into a zlib stream.
pub fn deflate(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
