//! User Interface
//!
//! The display runs as its own kernel task. Other tasks hand it one command
//! at a time through a single-slot [`Mailbox`]; measurement data travels
//! inside the command as a [`Snapshot`] copy.

pub mod frame;

use core::fmt::Write;

use embedded_graphics::prelude::Point;
use heapless::String;

use crate::kernel::{Kernel, Mailbox};
use crate::measurement::Snapshot;
use crate::types::ComponentType;

pub use frame::FrameBuffer;

/// Command handed to the display task
///
/// An empty mailbox stands for "no command".
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DisplayCommand {
    /// Blank the screen
    Clear,
    /// Boot banner
    Intro,
    /// Main screen while the first measurement runs
    MainScreen,
    /// Show a measurement
    UpdateMeasurement(Snapshot),
    /// Show a counter value
    Counter(u16),
    /// Nothing connected to the terminals
    InputOpen,
    /// Measurement could not be evaluated
    MeasurementError,
    /// Battery gauge level (0..=4)
    Battery(u8),
}

#[cfg(feature = "embedded")]
impl defmt::Format for DisplayCommand {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Clear => defmt::write!(f, "Clear"),
            Self::Intro => defmt::write!(f, "Intro"),
            Self::MainScreen => defmt::write!(f, "MainScreen"),
            Self::UpdateMeasurement(s) => defmt::write!(f, "UpdateMeasurement({})", s),
            Self::Counter(n) => defmt::write!(f, "Counter({})", n),
            Self::InputOpen => defmt::write!(f, "InputOpen"),
            Self::MeasurementError => defmt::write!(f, "MeasurementError"),
            Self::Battery(level) => defmt::write!(f, "Battery({})", level),
        }
    }
}

/// Text size
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Font {
    /// 6x10 labels
    Small,
    /// 10x20 values
    Large,
}

/// Text-level drawing surface
pub trait Screen {
    /// Blank the whole screen
    fn clear(&mut self);

    /// Draw text with its top-left corner at `position`
    fn text(&mut self, position: Point, text: &str, font: Font);

    /// Push pending drawing to the panel
    fn flush(&mut self);
}

impl<S: Screen + ?Sized> Screen for &mut S {
    fn clear(&mut self) {
        (**self).clear();
    }

    fn text(&mut self, position: Point, text: &str, font: Font) {
        (**self).text(position, text, font);
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}

/// Value rescaled to an engineering unit with four significant digits
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaledValue {
    /// Value in `unit`
    pub mantissa: f32,
    /// Unit label
    pub unit: &'static str,
    /// Digits before the decimal point (1..=4)
    pub integer_digits: u8,
    /// Digits after the decimal point
    pub fraction_digits: u8,
}

impl ScaledValue {
    /// Pick the unit and digit split for a component value
    #[must_use]
    pub fn new(component: ComponentType, value: f32) -> Self {
        let (scale, unit) = match component {
            ComponentType::Resistor if value > 1.0e6 => (1.0e6, "Mohm"),
            ComponentType::Resistor if value > 1.0e3 => (1.0e3, "kohm"),
            ComponentType::Resistor => (1.0, "ohm"),
            ComponentType::Capacitor if value > 1.0e-6 => (1.0e-6, "uF"),
            ComponentType::Capacitor if value > 1.0e-9 => (1.0e-9, "nF"),
            ComponentType::Capacitor => (1.0e-12, "pF"),
            ComponentType::Inductor if value > 1.0 => (1.0, "H"),
            ComponentType::Inductor if value > 1.0e-3 => (1.0e-3, "mH"),
            ComponentType::Inductor => (1.0e-6, "uH"),
            ComponentType::Undetermined => (1.0, ""),
        };

        let mantissa = value / scale;
        let integer_digits = if mantissa > 1.0e3 {
            4
        } else if mantissa > 1.0e2 {
            3
        } else if mantissa > 1.0e1 {
            2
        } else {
            1
        };

        Self {
            mantissa,
            unit,
            integer_digits,
            fraction_digits: 4 - integer_digits,
        }
    }

    /// Mantissa rendered with the chosen number of decimals
    #[must_use]
    pub fn digits(&self) -> String<16> {
        let mut s = String::new();
        write!(s, "{:.*}", usize::from(self.fraction_digits), self.mantissa).ok();
        s
    }
}

/// Component symbol shown left of the value
#[must_use]
pub const fn component_symbol(component: ComponentType) -> &'static str {
    match component {
        ComponentType::Resistor => "R",
        ComponentType::Capacitor => "C",
        ComponentType::Inductor => "L",
        ComponentType::Undetermined => " ",
    }
}

/// Battery gauge glyphs for levels 0..=4
#[must_use]
pub fn battery_gauge(level: u8) -> &'static str {
    match level {
        0 => "[    ]",
        1 => "[#   ]",
        2 => "[##  ]",
        3 => "[### ]",
        _ => "[####]",
    }
}

/// Draw one command
pub fn render<S: Screen>(screen: &mut S, command: DisplayCommand) {
    match command {
        DisplayCommand::Clear => screen.clear(),
        DisplayCommand::Intro => {
            screen.clear();
            screen.text(Point::new(1, 2), "LCR meter", Font::Small);
            let mut version: String<24> = String::new();
            write!(version, "version {}", env!("CARGO_PKG_VERSION")).ok();
            screen.text(Point::new(1, 20), &version, Font::Small);
        }
        DisplayCommand::MainScreen => {
            screen.clear();
            screen.text(Point::new(20, 11), "wait...", Font::Small);
        }
        DisplayCommand::UpdateMeasurement(snapshot) => render_measurement(screen, &snapshot),
        DisplayCommand::Counter(value) => {
            let mut digits: String<8> = String::new();
            write!(digits, "{value:>4}").ok();
            screen.clear();
            screen.text(Point::new(0, 6), &digits, Font::Large);
        }
        DisplayCommand::InputOpen => {
            screen.clear();
            screen.text(Point::new(25, 4), "connect", Font::Small);
            screen.text(Point::new(20, 16), "component", Font::Small);
        }
        DisplayCommand::MeasurementError => {
            screen.clear();
            screen.text(Point::new(40, 11), "error", Font::Small);
        }
        DisplayCommand::Battery(level) => {
            screen.text(Point::new(92, 0), battery_gauge(level), Font::Small);
        }
    }
    screen.flush();
}

fn render_measurement<S: Screen>(screen: &mut S, snapshot: &Snapshot) {
    let scaled = ScaledValue::new(snapshot.component, snapshot.value);

    screen.clear();
    screen.text(Point::new(0, 12), component_symbol(snapshot.component), Font::Large);
    screen.text(Point::new(15, 12), &scaled.digits(), Font::Large);
    screen.text(Point::new(80, 20), scaled.unit, Font::Small);
    screen.text(Point::new(54, 0), snapshot.frequency.label(), Font::Small);
}

/// Display task body: render each posted command, then free the slot
pub async fn display_task<S: Screen>(kernel: &Kernel, mailbox: &Mailbox<DisplayCommand>, mut screen: S) {
    loop {
        if let Some(command) = mailbox.peek() {
            render(&mut screen, command);
            mailbox.clear();
        }
        kernel.sleep(1).await;
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_resistor_units() {
        let scaled = ScaledValue::new(ComponentType::Resistor, 1336.67);
        assert_eq!(scaled.unit, "kohm");
        assert_eq!(scaled.integer_digits, 1);
        assert_eq!(scaled.digits().as_str(), "1.337");
    }

    #[test]
    fn test_capacitor_units() {
        let scaled = ScaledValue::new(ComponentType::Capacitor, 4.7e-10);
        assert_eq!(scaled.unit, "pF");
        assert_eq!(scaled.integer_digits, 3);
        assert_eq!(scaled.digits().as_str(), "470.0");
    }

    #[test]
    fn test_battery_gauge_saturates() {
        assert_eq!(battery_gauge(9), battery_gauge(4));
    }
}
