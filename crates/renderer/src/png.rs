//! PNG image codec for rendered tiles.
//!
//! Tiles are written as indexed PNG (color type 3) when they use at most
//! 256 distinct RGBA values, which flat vector symbology almost always
//! does, and as 8-bit RGBA (color type 6) otherwise. Both are lossless.
//! Decoding goes through the `image` crate. Codec failures are logged and
//! reported as `None`.

use base64::Engine as _;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::ImageFormat;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use tracing::{error, warn};

use crate::raster::RasterImage;

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

const COLOR_TYPE_INDEXED: u8 = 3;
const COLOR_TYPE_RGBA: u8 = 6;

/// Largest palette an indexed PNG can carry.
const MAX_PALETTE_SIZE: usize = 256;

/// Pixel count from which palette building is spread over rayon.
const PARALLEL_THRESHOLD: usize = 64 * 64;

/// Distinct colors of an image and, per pixel, the index into them.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Palette {
    colors: Vec<[u8; 4]>,
    indices: Vec<u8>,
}

impl Palette {
    /// Build a palette, `None` when the image has too many colors.
    fn build(pixels: &[u8]) -> Option<Self> {
        if pixels.len() / 4 >= PARALLEL_THRESHOLD {
            Self::build_parallel(pixels)
        } else {
            Self::build_sequential(pixels)
        }
    }

    fn build_sequential(pixels: &[u8]) -> Option<Self> {
        let mut lookup: HashMap<[u8; 4], u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
        let mut colors = Vec::with_capacity(MAX_PALETTE_SIZE);
        let mut indices = Vec::with_capacity(pixels.len() / 4);

        for px in pixels.chunks_exact(4) {
            let color = [px[0], px[1], px[2], px[3]];
            let index = match lookup.get(&color) {
                Some(&index) => index,
                None => {
                    if colors.len() == MAX_PALETTE_SIZE {
                        return None;
                    }
                    let index = colors.len() as u8;
                    colors.push(color);
                    lookup.insert(color, index);
                    index
                }
            };
            indices.push(index);
        }

        Some(Self { colors, indices })
    }

    /// Collect distinct colors per rayon job, merge them, then map every
    /// pixel to its index in parallel.
    fn build_parallel(pixels: &[u8]) -> Option<Self> {
        let distinct = pixels
            .par_chunks_exact(4)
            .try_fold(HashSet::new, |mut seen, px| {
                seen.insert([px[0], px[1], px[2], px[3]]);
                (seen.len() <= MAX_PALETTE_SIZE).then_some(seen)
            })
            .try_reduce(HashSet::new, |mut a, b| {
                a.extend(b);
                (a.len() <= MAX_PALETTE_SIZE).then_some(a)
            })?;

        let mut colors: Vec<[u8; 4]> = distinct.into_iter().collect();
        colors.sort_unstable();
        let lookup: HashMap<[u8; 4], u8> = colors
            .iter()
            .enumerate()
            .map(|(i, color)| (*color, i as u8))
            .collect();

        let indices = pixels
            .par_chunks_exact(4)
            .map(|px| lookup.get(&[px[0], px[1], px[2], px[3]]).copied().unwrap_or(0))
            .collect();

        Some(Self { colors, indices })
    }

    fn plte(&self) -> Vec<u8> {
        self.colors.iter().flat_map(|c| [c[0], c[1], c[2]]).collect()
    }

    /// Alpha per palette entry, `None` when every entry is opaque.
    fn trns(&self) -> Option<Vec<u8>> {
        self.colors
            .iter()
            .any(|c| c[3] < 255)
            .then(|| self.colors.iter().map(|c| c[3]).collect())
    }
}

/// Chunk-level PNG writer.
struct PngWriter {
    out: Vec<u8>,
}

impl PngWriter {
    fn new(width: u32, height: u32, color_type: u8) -> Self {
        let mut writer = Self {
            out: SIGNATURE.to_vec(),
        };
        let mut ihdr = Vec::with_capacity(13);
        ihdr.extend_from_slice(&width.to_be_bytes());
        ihdr.extend_from_slice(&height.to_be_bytes());
        // bit depth, color type, compression, filter, interlace
        ihdr.extend_from_slice(&[8, color_type, 0, 0, 0]);
        writer.chunk(b"IHDR", &ihdr);
        writer
    }

    fn chunk(&mut self, kind: &[u8; 4], data: &[u8]) {
        let mut crc = crc32fast::Hasher::new();
        crc.update(kind);
        crc.update(data);

        self.out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        self.out.extend_from_slice(kind);
        self.out.extend_from_slice(data);
        self.out.extend_from_slice(&crc.finalize().to_be_bytes());
    }

    /// Write `data` as unfiltered scanlines of `row_len` bytes.
    fn image_data(&mut self, data: &[u8], row_len: usize) -> io::Result<()> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
        for row in data.chunks_exact(row_len) {
            encoder.write_all(&[0])?;
            encoder.write_all(row)?;
        }
        let compressed = encoder.finish()?;
        self.chunk(b"IDAT", &compressed);
        Ok(())
    }

    fn finish(mut self) -> Vec<u8> {
        self.chunk(b"IEND", &[]);
        self.out
    }
}

fn write_indexed(width: u32, height: u32, palette: &Palette) -> io::Result<Vec<u8>> {
    let mut png = PngWriter::new(width, height, COLOR_TYPE_INDEXED);
    png.chunk(b"PLTE", &palette.plte());
    if let Some(alpha) = palette.trns() {
        png.chunk(b"tRNS", &alpha);
    }
    png.image_data(&palette.indices, width as usize)?;
    Ok(png.finish())
}

fn write_rgba(width: u32, height: u32, pixels: &[u8]) -> io::Result<Vec<u8>> {
    let mut png = PngWriter::new(width, height, COLOR_TYPE_RGBA);
    png.image_data(pixels, width as usize * 4)?;
    Ok(png.finish())
}

/// Check that the pixel buffer matches the image dimensions.
fn check_dimensions(image: &RasterImage) -> bool {
    let expected = image.width as usize * image.height as usize * 4;
    if image.pixels.len() != expected || image.width == 0 || image.height == 0 {
        error!(
            width = image.width,
            height = image.height,
            len = image.pixels.len(),
            "Image could not be encoded: pixel buffer does not match dimensions"
        );
        return false;
    }
    true
}

fn finish_encode(result: io::Result<Vec<u8>>) -> Option<Vec<u8>> {
    match result {
        Ok(png) => Some(png),
        Err(e) => {
            error!(error = %e, "Image could not be encoded");
            None
        }
    }
}

/// Encode an image as PNG, indexed when the palette fits.
pub fn encode(image: &RasterImage) -> Option<Vec<u8>> {
    if !check_dimensions(image) {
        return None;
    }
    let result = match Palette::build(&image.pixels) {
        Some(palette) => write_indexed(image.width, image.height, &palette),
        None => write_rgba(image.width, image.height, &image.pixels),
    };
    finish_encode(result)
}

/// Encode an image as full-color RGBA PNG regardless of its palette.
pub fn encode_rgba(image: &RasterImage) -> Option<Vec<u8>> {
    if !check_dimensions(image) {
        return None;
    }
    finish_encode(write_rgba(image.width, image.height, &image.pixels))
}

/// Decode PNG bytes into an image.
pub fn decode(bytes: &[u8]) -> Option<RasterImage> {
    match image::load_from_memory_with_format(bytes, ImageFormat::Png) {
        Ok(decoded) => {
            let rgba = decoded.to_rgba8();
            Some(RasterImage {
                width: rgba.width(),
                height: rgba.height(),
                pixels: rgba.into_raw(),
            })
        }
        Err(e) => {
            warn!(error = %e, len = bytes.len(), "Image could not be decoded");
            None
        }
    }
}

/// Standard base64 text of encoded image bytes.
pub fn to_text_safe(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_of(width: u32, height: u32, pixels: Vec<u8>) -> RasterImage {
        RasterImage {
            width,
            height,
            pixels,
        }
    }

    /// Bytes of the first chunk of type `kind`.
    fn find_chunk<'a>(png: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
        let mut pos = SIGNATURE.len();
        while pos + 8 <= png.len() {
            let len = u32::from_be_bytes([png[pos], png[pos + 1], png[pos + 2], png[pos + 3]]) as usize;
            let data = pos + 8;
            if &png[pos + 4..data] == kind {
                return png.get(data..data + len);
            }
            pos = data + len + 4;
        }
        None
    }

    #[test]
    fn test_palette_shares_repeated_colors() {
        let pixels = [
            255, 0, 0, 255, //
            0, 255, 0, 255, //
            0, 0, 255, 255, //
            255, 0, 0, 255, //
        ];

        let palette = Palette::build_sequential(&pixels).unwrap();
        assert_eq!(palette.colors.len(), 3);
        assert_eq!(palette.indices.len(), 4);
        assert_eq!(palette.indices[0], palette.indices[3]);
        assert_eq!(palette.plte().len(), 9);
        assert_eq!(palette.trns(), None);
    }

    #[test]
    fn test_palette_keeps_alpha() {
        let pixels = [255, 0, 0, 255, 0, 0, 0, 0];
        let palette = Palette::build_sequential(&pixels).unwrap();
        assert_eq!(palette.trns(), Some(vec![255, 0]));
    }

    #[test]
    fn test_parallel_and_sequential_palettes_agree() {
        // 128x128 is above PARALLEL_THRESHOLD
        let mut pixels = Vec::with_capacity(128 * 128 * 4);
        for y in 0..128u32 {
            for x in 0..128u32 {
                let class = ((x / 16) + (y / 16)) % 12;
                pixels.extend_from_slice(&[(class * 20) as u8, 90, 200, 255]);
            }
        }

        let par = Palette::build_parallel(&pixels).unwrap();
        let seq = Palette::build_sequential(&pixels).unwrap();
        assert_eq!(par.colors.len(), seq.colors.len());
        for (p, s) in par.indices.iter().zip(&seq.indices) {
            assert_eq!(par.colors[*p as usize], seq.colors[*s as usize]);
        }
    }

    #[test]
    fn test_too_many_colors_falls_back_to_rgba() {
        let mut pixels = Vec::with_capacity(300 * 4);
        for i in 0..300u32 {
            pixels.extend_from_slice(&[(i % 256) as u8, (i / 256) as u8, 0, 255]);
        }
        assert!(Palette::build_sequential(&pixels).is_none());

        let png = encode(&image_of(300, 1, pixels)).unwrap();
        let ihdr = find_chunk(&png, b"IHDR").unwrap();
        assert_eq!(ihdr[9], COLOR_TYPE_RGBA);
        assert!(find_chunk(&png, b"PLTE").is_none());
    }

    #[test]
    fn test_flat_tile_is_indexed_with_transparency() {
        let png = encode(&RasterImage::blank(4, 4)).unwrap();
        assert_eq!(&png[0..8], &SIGNATURE);
        assert_eq!(find_chunk(&png, b"IHDR").unwrap()[9], COLOR_TYPE_INDEXED);
        assert_eq!(find_chunk(&png, b"tRNS"), Some(&[0u8][..]));
        assert!(png.ends_with(&[0, 0, 0, 0, b'I', b'E', b'N', b'D', 0xae, 0x42, 0x60, 0x82]));
    }

    #[test]
    fn test_encode_rejects_mismatched_buffer() {
        assert!(encode(&image_of(4, 4, vec![0; 10])).is_none());
        assert!(encode_rgba(&image_of(0, 4, Vec::new())).is_none());
    }

    #[test]
    fn test_decode_garbage_is_none() {
        assert!(decode(b"definitely not a png").is_none());
        assert!(decode(&[]).is_none());
    }

    #[test]
    fn test_round_trip_indexed() {
        let mut image = RasterImage::blank(8, 8);
        image.pixels[0..4].copy_from_slice(&[10, 20, 30, 255]);
        image.pixels[4..8].copy_from_slice(&[200, 100, 50, 128]);

        let decoded = decode(&encode(&image).unwrap()).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_round_trip_rgba() {
        let mut image = RasterImage::blank(32, 16);
        for (i, px) in image.pixels.chunks_exact_mut(4).enumerate() {
            px.copy_from_slice(&[(i % 256) as u8, (i / 2 % 256) as u8, 7, 255]);
        }

        let decoded = decode(&encode(&image).unwrap()).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_to_text_safe() {
        assert_eq!(to_text_safe(b"PNG"), "UE5H");
        assert_eq!(to_text_safe(&[0xff, 0xfe]), "//4=");
    }
}
