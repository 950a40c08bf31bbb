//! OLED Display Driver
//!
//! SSD1306 128x32 panel on a blocking I2C bus. Drawing goes to a
//! [`FrameBuffer`]; `flush` pushes the whole frame.

use embedded_graphics::prelude::Point;
use embedded_hal::i2c::I2c;

use crate::config::{DISPLAY_HEIGHT, DISPLAY_I2C_ADDR, DISPLAY_WIDTH};
use crate::ui::{Font, FrameBuffer, Screen};

/// SSD1306 commands
mod cmd {
    pub const SET_CONTRAST: u8 = 0x81;
    pub const DISPLAY_ALL_ON_RESUME: u8 = 0xA4;
    pub const NORMAL_DISPLAY: u8 = 0xA6;
    pub const DISPLAY_OFF: u8 = 0xAE;
    pub const DISPLAY_ON: u8 = 0xAF;
    pub const SET_DISPLAY_OFFSET: u8 = 0xD3;
    pub const SET_COM_PINS: u8 = 0xDA;
    pub const SET_VCOM_DETECT: u8 = 0xDB;
    pub const SET_DISPLAY_CLOCK_DIV: u8 = 0xD5;
    pub const SET_PRECHARGE: u8 = 0xD9;
    pub const SET_MULTIPLEX: u8 = 0xA8;
    pub const SET_START_LINE: u8 = 0x40;
    pub const MEMORY_MODE: u8 = 0x20;
    pub const COLUMN_ADDR: u8 = 0x21;
    pub const PAGE_ADDR: u8 = 0x22;
    pub const COM_SCAN_DEC: u8 = 0xC8;
    pub const SEG_REMAP: u8 = 0xA0;
    pub const CHARGE_PUMP: u8 = 0x8D;
}

/// Pages (eight pixel rows each)
#[allow(clippy::cast_possible_truncation)]
const PAGES: u8 = (DISPLAY_HEIGHT / 8) as u8;

/// OLED display driver
pub struct Ssd1306<I> {
    i2c: I,
    frame: FrameBuffer,
}

impl<I: I2c> Ssd1306<I> {
    /// Create a new display driver
    #[must_use]
    pub const fn new(i2c: I) -> Self {
        Self {
            i2c,
            frame: FrameBuffer::new(),
        }
    }

    /// Initialize the display
    ///
    /// # Errors
    ///
    /// Returns the bus error of the first failed transfer.
    #[allow(clippy::cast_possible_truncation)]
    pub fn init(&mut self) -> Result<(), I::Error> {
        let init_cmds = [
            cmd::DISPLAY_OFF,
            cmd::SET_DISPLAY_CLOCK_DIV,
            0x80,
            cmd::SET_MULTIPLEX,
            (DISPLAY_HEIGHT - 1) as u8,
            cmd::SET_DISPLAY_OFFSET,
            0x00,
            cmd::SET_START_LINE,
            cmd::CHARGE_PUMP,
            0x14,
            cmd::MEMORY_MODE,
            0x00, // horizontal addressing
            cmd::SEG_REMAP | 0x01,
            cmd::COM_SCAN_DEC,
            cmd::SET_COM_PINS,
            0x02, // sequential COM, 32 rows
            cmd::SET_CONTRAST,
            0x8F,
            cmd::SET_PRECHARGE,
            0xF1,
            cmd::SET_VCOM_DETECT,
            0x40,
            cmd::DISPLAY_ALL_ON_RESUME,
            cmd::NORMAL_DISPLAY,
            cmd::DISPLAY_ON,
        ];

        for &c in &init_cmds {
            self.send_command(c)?;
        }

        Screen::clear(&mut self.frame);
        self.write_frame()
    }

    fn send_command(&mut self, cmd: u8) -> Result<(), I::Error> {
        self.i2c.write(DISPLAY_I2C_ADDR, &[0x00, cmd])
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_frame(&mut self) -> Result<(), I::Error> {
        self.send_command(cmd::COLUMN_ADDR)?;
        self.send_command(0)?;
        self.send_command((DISPLAY_WIDTH - 1) as u8)?;

        self.send_command(cmd::PAGE_ADDR)?;
        self.send_command(0)?;
        self.send_command(PAGES - 1)?;

        // data in chunks (I2C buffer limit)
        for chunk in self.frame.as_bytes().chunks(32) {
            let mut buf = [0u8; 33];
            buf[0] = 0x40;
            buf[1..=chunk.len()].copy_from_slice(chunk);
            self.i2c.write(DISPLAY_I2C_ADDR, &buf[..=chunk.len()])?;
        }

        Ok(())
    }

    /// Frame buffer for direct drawing
    pub fn frame_mut(&mut self) -> &mut FrameBuffer {
        &mut self.frame
    }
}

impl<I: I2c> Screen for Ssd1306<I> {
    fn clear(&mut self) {
        Screen::clear(&mut self.frame);
    }

    fn text(&mut self, position: Point, text: &str, font: Font) {
        self.frame.text(position, text, font);
    }

    fn flush(&mut self) {
        if self.write_frame().is_err() {
            defmt::warn!("display flush failed");
        }
    }
}
