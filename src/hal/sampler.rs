//! Timer-paced sample clock
//!
//! TIM6 update events (TRGO) clock both the generator and the digitizers:
//!
//! - DAC1 channel 1 converts on every TRGO; DMA1 channel 1 feeds it from a
//!   circular copy of the sine table
//! - ADC1 and ADC2 start a conversion on every TRGO; DMA1 channels 2 and 3
//!   move `DATA_SIZE` results each into capture RAM, then stop
//!
//! The core only arms a capture and later checks the transfer-complete
//! flags. Nothing here waits on a conversion.

use core::sync::atomic::{AtomicU16, Ordering};

use embassy_stm32::pac;
use embassy_stm32::pac::adc::vals::{Adstp, Dmacfg, Dmaen, Exten};
use embassy_stm32::pac::bdma::vals::{Dir, Pl, Size};
use embassy_stm32::pac::timer::vals::Mms;
use embassy_stm32::peripherals::{DMA1_CH1, DMA1_CH2, DMA1_CH3, TIM6};
use embassy_stm32::timer::low_level::Timer;

use crate::config::{DAC_MID_SCALE, DATA_SIZE, DEFAULT_FREQUENCY, SIN_TABLE_SIZE};
use crate::frontend::{SampleBuffer, SampleClock, SineTable};

/// DMA1 channel (0-based) feeding DAC1 channel 1
const DAC_DMA_CHANNEL: usize = 0;
/// DMA1 channel (0-based) draining ADC1
const REFERENCE_DMA_CHANNEL: usize = 1;
/// DMA1 channel (0-based) draining ADC2
const MEASURED_DMA_CHANNEL: usize = 2;

/// DMAMUX request lines
const DAC1_CH1_REQUEST: u8 = 6;
const ADC1_REQUEST: u8 = 5;
const ADC2_REQUEST: u8 = 36;

/// ADC12 external trigger EXT13: TIM6_TRGO
const ADC_TIM6_TRGO: u8 = 13;

static DAC_TABLE: [AtomicU16; SIN_TABLE_SIZE] = [const { AtomicU16::new(0) }; SIN_TABLE_SIZE];
static REFERENCE_RAM: [AtomicU16; DATA_SIZE] = [const { AtomicU16::new(0) }; DATA_SIZE];
static MEASURED_RAM: [AtomicU16; DATA_SIZE] = [const { AtomicU16::new(0) }; DATA_SIZE];

/// Sample clock plus the DMA channels it paces
pub struct Sampler<'d> {
    timer: Timer<'d, TIM6>,
    clock: SampleClock,
    armed: bool,
    _channels: (DMA1_CH1, DMA1_CH2, DMA1_CH3),
}

impl<'d> Sampler<'d> {
    /// Route the DMA requests and start the clock at the default drive rate
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(timer: Timer<'d, TIM6>, channels: (DMA1_CH1, DMA1_CH2, DMA1_CH3)) -> Self {
        let clock = SampleClock::for_drive(timer.get_clock_frequency().0, DEFAULT_FREQUENCY);

        pac::RCC.ahb1enr().modify(|w| {
            w.set_dma1en(true);
            w.set_dmamux1en(true);
        });
        pac::DMAMUX1.ccr(DAC_DMA_CHANNEL).write(|w| w.set_dmareq_id(DAC1_CH1_REQUEST));
        pac::DMAMUX1.ccr(REFERENCE_DMA_CHANNEL).write(|w| w.set_dmareq_id(ADC1_REQUEST));
        pac::DMAMUX1.ccr(MEASURED_DMA_CHANNEL).write(|w| w.set_dmareq_id(ADC2_REQUEST));

        timer.regs_basic().cr2().modify(|w| w.set_mms(Mms::UPDATE));

        let channel = pac::DMA1.ch(DAC_DMA_CHANNEL);
        channel.par().write_value(pac::DAC1.dhr12r(0).as_ptr() as u32);
        channel.mar().write_value(DAC_TABLE.as_ptr() as u32);
        channel.ndtr().write(|w| w.set_ndt(SIN_TABLE_SIZE as u16));
        channel.cr().write(|w| {
            w.set_dir(Dir::FROM_MEMORY);
            w.set_circ(true);
            w.set_minc(true);
            w.set_msize(Size::BITS16);
            w.set_psize(Size::BITS32);
            w.set_pl(Pl::VERY_HIGH);
            w.set_en(true);
        });
        pac::DAC1.cr().modify(|w| w.set_dmaen(0, true));

        let mut sampler = Self {
            timer,
            clock,
            armed: false,
            _channels: channels,
        };
        sampler.set_clock(clock);
        sampler
    }

    /// Timer input clock (Hz)
    #[must_use]
    pub fn input_hz(&self) -> u32 {
        self.timer.get_clock_frequency().0
    }

    /// Divider currently programmed
    #[must_use]
    pub const fn clock(&self) -> SampleClock {
        self.clock
    }

    /// Reprogram the sample rate; an armed capture is abandoned
    pub fn set_clock(&mut self, clock: SampleClock) {
        self.timer.stop();
        self.disarm();
        let regs = self.timer.regs_core();
        regs.psc().write_value(clock.prescaler);
        regs.arr().write(|w| w.set_arr(clock.reload));
        regs.egr().write(|w| w.set_ug(true));
        self.clock = clock;
        self.timer.start();
    }

    /// Replace the table the DAC replays
    pub fn load_table(&mut self, table: &SineTable) {
        for (n, entry) in DAC_TABLE.iter().enumerate() {
            entry.store(table.sample(n), Ordering::Relaxed);
        }
    }

    /// Start collecting one capture on the next trigger
    pub fn arm(&mut self) {
        self.disarm();
        pac::DMA1.ifcr().write(|w| {
            w.set_tcif(REFERENCE_DMA_CHANNEL, true);
            w.set_tcif(MEASURED_DMA_CHANNEL, true);
        });
        start_channel(REFERENCE_DMA_CHANNEL, pac::ADC1, &REFERENCE_RAM);
        start_channel(MEASURED_DMA_CHANNEL, pac::ADC2, &MEASURED_RAM);
        self.armed = true;
    }

    /// Check whether both channels have filled their capture RAM
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let isr = pac::DMA1.isr().read();
        self.armed && isr.tcif(REFERENCE_DMA_CHANNEL) && isr.tcif(MEASURED_DMA_CHANNEL)
    }

    /// Copy a completed capture out, centred on mid-scale
    pub fn collect(&mut self, reference: &mut SampleBuffer, measured: &mut SampleBuffer) {
        copy_centred(&REFERENCE_RAM, reference);
        copy_centred(&MEASURED_RAM, measured);
        self.disarm();
    }

    fn disarm(&mut self) {
        stop_adc(pac::ADC1);
        stop_adc(pac::ADC2);
        pac::DMA1.ch(REFERENCE_DMA_CHANNEL).cr().modify(|w| w.set_en(false));
        pac::DMA1.ch(MEASURED_DMA_CHANNEL).cr().modify(|w| w.set_en(false));
        self.armed = false;
    }
}

#[allow(clippy::cast_possible_truncation)]
fn start_channel(index: usize, adc: pac::adc::Adc, ram: &'static [AtomicU16; DATA_SIZE]) {
    let channel = pac::DMA1.ch(index);
    channel.par().write_value(adc.dr().as_ptr() as u32);
    channel.mar().write_value(ram.as_ptr() as u32);
    channel.ndtr().write(|w| w.set_ndt(DATA_SIZE as u16));
    channel.cr().write(|w| {
        w.set_dir(Dir::FROM_PERIPHERAL);
        w.set_minc(true);
        w.set_msize(Size::BITS16);
        w.set_psize(Size::BITS32);
        w.set_pl(Pl::HIGH);
        w.set_en(true);
    });

    adc.isr().write(|w| {
        w.set_ovr(true);
        w.set_eoc(true);
        w.set_eos(true);
    });
    adc.cfgr().modify(|w| {
        w.set_cont(false);
        w.set_discen(false);
        w.set_dmacfg(Dmacfg::ONE_SHOT);
        w.set_dmaen(Dmaen::ENABLE);
        w.set_extsel(ADC_TIM6_TRGO);
        w.set_exten(Exten::RISING_EDGE);
    });
    adc.cr().modify(|w| w.set_adstart(true));
}

fn stop_adc(adc: pac::adc::Adc) {
    if adc.cr().read().adstart() {
        adc.cr().modify(|w| w.set_adstp(Adstp::STOP));
        while adc.cr().read().adstart() {}
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn copy_centred(ram: &[AtomicU16; DATA_SIZE], out: &mut SampleBuffer) {
    for (sample, raw) in out.iter_mut().zip(ram) {
        *sample = raw.load(Ordering::Relaxed) as i16 - DAC_MID_SCALE;
    }
}
