//! Monochrome frame buffer for the 128x32 panel

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};

use super::{Font, Screen};
use crate::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

/// Bytes in one frame (one bit per pixel, eight rows per byte)
pub const FRAME_BYTES: usize = (DISPLAY_WIDTH * DISPLAY_HEIGHT / 8) as usize;

/// Frame buffer in SSD1306 page layout
pub struct FrameBuffer {
    buffer: [u8; FRAME_BYTES],
}

impl FrameBuffer {
    /// Create a blank frame
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0; FRAME_BYTES],
        }
    }

    /// Set or clear a pixel; out-of-bounds writes are ignored
    pub fn set_pixel(&mut self, x: u32, y: u32, on: bool) {
        if x >= DISPLAY_WIDTH || y >= DISPLAY_HEIGHT {
            return;
        }

        let byte_idx = (y / 8 * DISPLAY_WIDTH + x) as usize;
        let bit = 1 << (y % 8);

        if on {
            self.buffer[byte_idx] |= bit;
        } else {
            self.buffer[byte_idx] &= !bit;
        }
    }

    /// Read back a pixel
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> bool {
        if x >= DISPLAY_WIDTH || y >= DISPLAY_HEIGHT {
            return false;
        }
        self.buffer[(y / 8 * DISPLAY_WIDTH + x) as usize] & (1 << (y % 8)) != 0
    }

    /// Number of lit pixels
    #[must_use]
    pub fn lit_pixels(&self) -> u32 {
        self.buffer.iter().map(|b| b.count_ones()).sum()
    }

    /// Raw page data
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            if coord.x >= 0
                && coord.x < DISPLAY_WIDTH as i32
                && coord.y >= 0
                && coord.y < DISPLAY_HEIGHT as i32
            {
                self.set_pixel(coord.x as u32, coord.y as u32, color.is_on());
            }
        }
        Ok(())
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }
}

impl Screen for FrameBuffer {
    fn clear(&mut self) {
        self.buffer.fill(0);
    }

    fn text(&mut self, position: Point, text: &str, font: Font) {
        let font = match font {
            Font::Small => &FONT_6X10,
            Font::Large => &FONT_10X20,
        };
        let style = MonoTextStyle::new(font, BinaryColor::On);
        let _ = Text::with_baseline(text, position, style, Baseline::Top).draw(self);
    }

    fn flush(&mut self) {}
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_page_layout() {
        let mut frame = FrameBuffer::new();
        frame.set_pixel(3, 9, true);
        assert_eq!(frame.as_bytes()[128 + 3], 0b10);
        assert!(frame.pixel(3, 9));
        frame.set_pixel(3, 9, false);
        assert_eq!(frame.lit_pixels(), 0);
    }

    #[test]
    fn test_out_of_bounds_ignored() {
        let mut frame = FrameBuffer::new();
        frame.set_pixel(128, 0, true);
        frame.set_pixel(0, 32, true);
        assert_eq!(frame.lit_pixels(), 0);
    }
}
