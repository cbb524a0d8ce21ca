//! PNG encoding for RGBA tiles.
//!
//! Tiles colored from a palette rarely carry more than 256 distinct colors,
//! so [`create_png_auto`] writes an indexed PNG (color type 3) when it can
//! and falls back to full RGBA (color type 6) otherwise.

use std::collections::HashMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{RenderError, Result};

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
const MAX_PALETTE_SIZE: usize = 256;

type PaletteEntry = (u8, u8, u8, u8);

/// Encode RGBA pixels, indexed when at most 256 colors are used.
pub fn create_png_auto(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    check_len(pixels.len(), width * height * 4)?;
    match extract_palette(pixels) {
        Some((palette, indices)) => create_png_indexed(width, height, &palette, &indices),
        None => create_png(pixels, width, height),
    }
}

/// Fully transparent tile.
pub fn transparent_tile(size: usize) -> Result<Vec<u8>> {
    create_png_indexed(size, size, &[(0, 0, 0, 0)], &vec![0; size * size])
}

fn check_len(got: usize, want: usize) -> Result<()> {
    if got != want {
        return Err(RenderError::Encode(format!(
            "pixel buffer has {} bytes, expected {}",
            got, want
        )));
    }
    Ok(())
}

fn pack_color(c: &[u8]) -> u32 {
    u32::from_le_bytes([c[0], c[1], c[2], c[3]])
}

fn extract_palette(pixels: &[u8]) -> Option<(Vec<PaletteEntry>, Vec<u8>)> {
    let mut color_to_index: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices = Vec::with_capacity(pixels.len() / 4);

    for chunk in pixels.chunks_exact(4) {
        let packed = pack_color(chunk);
        let index = match color_to_index.get(&packed) {
            Some(&idx) => idx,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push((chunk[0], chunk[1], chunk[2], chunk[3]));
                color_to_index.insert(packed, idx);
                idx
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

/// Indexed PNG from a palette and one index per pixel.
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[PaletteEntry],
    indices: &[u8],
) -> Result<Vec<u8>> {
    check_len(indices.len(), width * height)?;
    let mut png = Vec::from(SIGNATURE);

    write_chunk(&mut png, b"IHDR", &header(width, height, 3));

    let plte: Vec<u8> = palette.iter().flat_map(|(r, g, b, _)| [*r, *g, *b]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    if palette.iter().any(|(_, _, _, a)| *a < 255) {
        let trns: Vec<u8> = palette.iter().map(|(_, _, _, a)| *a).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    write_chunk(&mut png, b"IDAT", &deflate_scanlines(indices, width, height)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// RGBA PNG (color type 6).
pub fn create_png(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    check_len(pixels.len(), width * height * 4)?;
    let mut png = Vec::from(SIGNATURE);
    write_chunk(&mut png, b"IHDR", &header(width, height, 6));
    write_chunk(&mut png, b"IDAT", &deflate_scanlines(pixels, width * 4, height)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn header(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    // bit depth, color type, compression, filter, interlace
    ihdr.extend_from_slice(&[8, color_type, 0, 0, 0]);
    ihdr
}

/// Prefix each row with filter byte 0 and deflate.
fn deflate_scanlines(data: &[u8], row_bytes: usize, height: usize) -> Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(height * (row_bytes + 1));
    for row in data.chunks_exact(row_bytes.max(1)).take(height) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}
