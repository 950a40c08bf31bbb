//! LCR Meter Main Application
//!
//! Entry point for the STM32G474-based LCR meter firmware.
//! Initializes hardware, registers the kernel tasks and starts scheduling.

#![no_std]
#![no_main]

use core::pin::pin;

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m_rt::{entry, exception};
use defmt::{info, warn};
use embassy_stm32::adc::Adc;
use embassy_stm32::dac::DacChannel;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::rcc::{Pll, PllMul, PllPreDiv, PllRDiv, PllSource, Sysclk};
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::low_level::Timer;
use embassy_stm32::usart::{self, UartTx};
use {defmt_rtt as _, panic_probe as _};

use lcr_meter::drivers::Ssd1306;
use lcr_meter::export::SerialSink;
use lcr_meter::hal::{AnalogFrontEnd, Sampler, SelectPins};
use lcr_meter::prelude::*;

/// Kernel shared by the tick interrupt and all tasks
static KERNEL: Kernel = Kernel::new();

/// Display command slot
static DISPLAY: Mailbox<DisplayCommand> = Mailbox::new();

/// Kernel tick
#[exception]
fn SysTick() {
    KERNEL.on_tick();
}

/// Main entry point
#[entry]
fn main() -> ! {
    info!("LCR meter firmware v{}", env!("CARGO_PKG_VERSION"));

    // HSI 16 MHz / 4 * 85 / 2 = 170 MHz
    let mut config = embassy_stm32::Config::default();
    config.rcc.pll = Some(Pll {
        source: PllSource::HSI,
        prediv: PllPreDiv::DIV4,
        mul: PllMul::MUL85,
        divp: None,
        divq: None,
        divr: Some(PllRDiv::DIV2),
    });
    config.rcc.sys = Sysclk::PLL1_R;
    config.rcc.boost = true;
    let p = embassy_stm32::init(config);

    info!("Peripherals initialized");

    // Kernel tick from SysTick
    let mut core = cortex_m::Peripherals::take().unwrap();
    core.SYST.set_clock_source(SystClkSource::Core);
    core.SYST.set_reload(SYSTEM_CLOCK_HZ / TICK_RATE_HZ - 1);
    core.SYST.clear_current();
    core.SYST.enable_interrupt();
    core.SYST.enable_counter();

    // Analog front-end: PA0 reference, PA1 measured, PA4 generator,
    // all paced by TIM6 through DMA1 channels 1-3
    let sampler = Sampler::new(Timer::new(p.TIM6), (p.DMA1_CH1, p.DMA1_CH2, p.DMA1_CH3));
    let range_select = SelectPins::new([
        Output::new(p.PC0, Level::Low, Speed::Low),
        Output::new(p.PC1, Level::Low, Speed::Low),
        Output::new(p.PC2, Level::Low, Speed::Low),
    ]);
    let input_select = SelectPins::new([
        Output::new(p.PC3, Level::Low, Speed::Low),
        Output::new(p.PC4, Level::Low, Speed::Low),
    ]);
    let frontend = AnalogFrontEnd::new(
        Adc::new(p.ADC1),
        Adc::new(p.ADC2),
        p.PA0,
        p.PA1,
        DacChannel::new_blocking(p.DAC1, p.PA4),
        sampler,
        range_select,
        input_select,
    );

    // Display on I2C1: PB8 = SCL, PB9 = SDA
    let i2c = I2c::new_blocking(
        p.I2C1,
        p.PB8,
        p.PB9,
        Hertz(I2C_FREQUENCY_HZ),
        Default::default(),
    );
    let mut screen = Ssd1306::new(i2c);
    if screen.init().is_err() {
        warn!("display init failed");
    }

    // Diagnostic export on USART2 TX (PA2)
    let mut uart_config = usart::Config::default();
    uart_config.baudrate = EXPORT_BAUD_RATE;
    let uart = UartTx::new_blocking(p.USART2, p.PA2, uart_config).unwrap();

    let meter = MeterTask::new(&KERNEL, frontend, &DISPLAY, SerialSink::new(uart));
    let mut meter_task = pin!(meter.run());
    let mut display = pin!(display_task(&KERNEL, &DISPLAY, screen));

    let mut scheduler = Scheduler::new(&KERNEL);
    scheduler.register(display.as_mut()).unwrap();
    scheduler.register(meter_task.as_mut()).unwrap();

    info!("Tasks registered, starting scheduler");

    scheduler.start_scheduling(|| info!("first task switch"), cortex_m::asm::wfi)
}
