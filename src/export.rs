//! Diagnostic Export Stream
//!
//! Fixed-width decimal text lines describing calibration constants and
//! measurement results. Lines are built in fixed-capacity strings and handed
//! to a [`DiagnosticSink`]; on target that is the diagnostic UART.

use core::fmt::Write;

use heapless::String;

use crate::config::EXPORT_LINE_SIZE;
use crate::dsp::CorrectionTables;
use crate::measurement::{Calibration, Snapshot};

/// One diagnostic line
pub type Line = String<EXPORT_LINE_SIZE>;

/// Values per line when exporting a table
pub const TABLE_VALUES_PER_LINE: usize = 8;

/// Destination for diagnostic lines
pub trait DiagnosticSink {
    /// Write one line; the sink appends the line terminator
    fn write_line(&mut self, line: &str);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn write_line(&mut self, line: &str) {
        (**self).write_line(line);
    }
}

/// Sink that drops every line
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn write_line(&mut self, _line: &str) {}
}

/// Range, magnitudes, ratio and value of a measurement
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn measured_data_line(label: &str, snapshot: &Snapshot) -> Line {
    let mut line = Line::new();
    write!(
        line,
        "{label}{:>2} {:>8} {:>8} {:>5.3} {:>6}",
        snapshot.range.index(),
        snapshot.reference as i32,
        snapshot.measured as i32,
        snapshot.ratio(),
        snapshot.value as i32
    )
    .ok();
    line
}

/// Labelled integer
#[must_use]
pub fn int_line(label: &str, value: i32) -> Line {
    let mut line = Line::new();
    write!(line, "{label}{value:>7}").ok();
    line
}

/// Labelled float with three decimals
#[must_use]
pub fn float_line(label: &str, value: f32) -> Line {
    let mut line = Line::new();
    write!(line, "{label}{value:>8.3}").ok();
    line
}

/// One row of a float table
#[must_use]
pub fn table_line(values: &[f32]) -> Line {
    let mut line = Line::new();
    for value in values {
        write!(line, "{value:>7.3} ").ok();
    }
    line
}

/// Source and digitizer offsets
#[must_use]
pub fn zero_point_line(label: &str, calibration: &Calibration) -> Line {
    let mut line = Line::new();
    write!(
        line,
        "{label}{:>4} {:>4}",
        calibration.dac_offset, calibration.adc_offset
    )
    .ok();
    line
}

/// Write a label line followed by the table rows
pub fn write_table<S: DiagnosticSink + ?Sized>(sink: &mut S, label: &str, values: &[f32]) {
    sink.write_line(label);
    for row in values.chunks(TABLE_VALUES_PER_LINE) {
        sink.write_line(&table_line(row));
    }
}

/// Export the complete calibration result
pub fn write_calibration<S: DiagnosticSink + ?Sized>(
    sink: &mut S,
    calibration: &Calibration,
    corrections: &CorrectionTables,
) {
    sink.write_line(&zero_point_line("zero point: ", calibration));
    sink.write_line(&int_line("DAC offset:", i32::from(calibration.dac_offset)));
    sink.write_line(&int_line("ADC offset:", i32::from(calibration.adc_offset)));
    sink.write_line(&float_line("series resistance:", calibration.series_resistance));
    sink.write_line(&float_line("Factor", calibration.linearity_scale));
    write_table(sink, "reference correction", corrections.reference.factors());
    write_table(sink, "measured correction", corrections.measured.factors());
}

#[cfg(feature = "embedded")]
mod serial {
    use super::DiagnosticSink;

    /// Diagnostic sink over a blocking byte writer (the export UART)
    pub struct SerialSink<W> {
        writer: W,
    }

    impl<W: embedded_io::Write> SerialSink<W> {
        /// Wrap a writer
        pub const fn new(writer: W) -> Self {
            Self { writer }
        }
    }

    impl<W: embedded_io::Write> DiagnosticSink for SerialSink<W> {
        fn write_line(&mut self, line: &str) {
            let written = self
                .writer
                .write_all(line.as_bytes())
                .and_then(|()| self.writer.write_all(b"\n\r"));
            if written.is_err() {
                defmt::warn!("export write failed");
            }
        }
    }
}

#[cfg(feature = "embedded")]
pub use serial::SerialSink;
