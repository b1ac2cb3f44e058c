//! Pixel-burned proof overlay for attendance photos.
//!
//! The capture pipeline stamps date, time and resolved address onto the
//! bottom of the verification photo before upload, so the proof travels with
//! the image itself. Text is rendered from a small built-in 5x7 glyph set;
//! the stamp only needs digits, uppercase letters and basic punctuation.

use chrono::Local;
use image::{Rgb, RgbImage};
use std::io::Cursor;
use thiserror::Error;

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("unreadable photo: {0}")]
    Decode(#[from] image::ImageError),
}

/// Text burned into the photo.
#[derive(Debug, Clone)]
pub struct Caption {
    pub date: String,
    pub time: String,
    pub address: String,
}

impl Caption {
    /// Caption for "now" at the given resolved address.
    pub fn now(address: &str) -> Self {
        let now = Local::now();
        Self {
            date: now.format("%d-%m-%Y").to_string(),
            time: now.format("%H:%M").to_string(),
            address: address.to_string(),
        }
    }
}

/// 5x7 bitmap glyph, one byte per row, low 5 bits used.
fn glyph(c: char) -> Option<[u8; 7]> {
    let g = match c.to_ascii_uppercase() {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        ' ' => [0, 0, 0, 0, 0, 0, 0],
        ',' => [0, 0, 0, 0, 0b00110, 0b00100, 0b01000],
        '.' => [0, 0, 0, 0, 0, 0b00110, 0b00110],
        ':' => [0, 0b00110, 0b00110, 0, 0b00110, 0b00110, 0],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '/' => [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000],
        _ => return None,
    };
    Some(g)
}

fn draw_text(img: &mut RgbImage, text: &str, x0: u32, y0: u32, scale: u32) {
    let mut x = x0;
    for c in text.chars() {
        // Unknown characters render as a blank cell rather than being dropped
        let rows = glyph(c).unwrap_or([0; 7]);
        for (ry, row) in rows.iter().enumerate() {
            for rx in 0..GLYPH_W {
                if row >> (GLYPH_W - 1 - rx) & 1 == 1 {
                    for sy in 0..scale {
                        for sx in 0..scale {
                            let px = x + rx * scale + sx;
                            let py = y0 + ry as u32 * scale + sy;
                            if px < img.width() && py < img.height() {
                                img.put_pixel(px, py, Rgb([255, 255, 255]));
                            }
                        }
                    }
                }
            }
        }
        x += (GLYPH_W + 1) * scale;
    }
}

fn truncate_to_width(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars.saturating_sub(2)).collect::<String>() + ".."
}

/// Decode `photo`, burn the caption into a darkened band along the bottom
/// edge, and re-encode as JPEG. The input image is otherwise unchanged.
pub fn stamp(photo: &[u8], caption: &Caption) -> Result<Vec<u8>, WatermarkError> {
    let mut img = image::load_from_memory(photo)?.to_rgb8();
    let (w, h) = (img.width(), img.height());

    let scale = (w / 400).max(1);
    let pad = 4 * scale;
    let line_h = (GLYPH_H + 3) * scale;
    let band_h = (2 * line_h + 2 * pad).min(h);
    let band_top = h - band_h;

    // Darken the band so white text stays readable on bright photos
    for y in band_top..h {
        for x in 0..w {
            let Rgb([r, g, b]) = *img.get_pixel(x, y);
            img.put_pixel(
                x,
                y,
                Rgb([(r as u32 * 2 / 5) as u8, (g as u32 * 2 / 5) as u8, (b as u32 * 2 / 5) as u8]),
            );
        }
    }

    let max_chars = ((w.saturating_sub(2 * pad)) / ((GLYPH_W + 1) * scale)) as usize;
    let line1 = truncate_to_width(&format!("{} {}", caption.date, caption.time), max_chars);
    let line2 = truncate_to_width(&caption.address, max_chars);

    draw_text(&mut img, &line1, pad, band_top + pad, scale);
    draw_text(&mut img, &line2, pad, band_top + pad + line_h, scale);

    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut out), image::ImageFormat::Jpeg)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_photo(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([200, 200, 200]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    fn caption() -> Caption {
        Caption {
            date: "25-08-2026".into(),
            time: "09:41".into(),
            address: "Koramangala, Bengaluru, Karnataka, India".into(),
        }
    }

    #[test]
    fn stamped_photo_is_valid_jpeg_with_burned_band() {
        let out = stamp(&test_photo(400, 300), &caption()).unwrap();
        let stamped = image::load_from_memory(&out).unwrap().to_rgb8();
        assert_eq!((stamped.width(), stamped.height()), (400, 300));

        // Band at the bottom is darkened relative to the flat grey source
        let Rgb([r, _, _]) = *stamped.get_pixel(390, 295);
        assert!(r < 150, "band pixel not darkened: {r}");
        // Untouched region keeps its brightness (JPEG wiggle allowed)
        let Rgb([r, _, _]) = *stamped.get_pixel(200, 10);
        assert!(r > 170, "photo body was modified: {r}");
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert!(stamp(b"not an image", &caption()).is_err());
    }

    #[test]
    fn handles_photos_smaller_than_the_band() {
        // Must not underflow or panic on tiny inputs
        stamp(&test_photo(24, 10), &caption()).unwrap();
    }

    #[test]
    fn glyph_set_covers_caption_alphabet() {
        for c in "0123456789 ,.:-/ABCDEFGHIJKLMNOPQRSTUVWXYZ".chars() {
            assert!(glyph(c).is_some(), "missing glyph for {c:?}");
        }
        assert!(glyph('a').is_some(), "lowercase should map to uppercase");
        assert!(glyph('€').is_none());
    }

    #[test]
    fn long_addresses_are_truncated_with_ellipsis() {
        let t = truncate_to_width("ABCDEFGHIJ", 6);
        assert_eq!(t, "ABCD..");
        assert_eq!(truncate_to_width("ABC", 6), "ABC");
    }
}
