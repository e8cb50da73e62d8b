#![no_std]
#![no_main]

use cyw43_pio::{PioSpi, DEFAULT_CLOCK_DIVIDER};
use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::adc::{Adc, Channel as AdcChannel, Config as AdcConfig};
use embassy_rp::bind_interrupts;
use embassy_rp::clocks::RoscRng;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::{DMA_CH0, PIO0};
use embassy_rp::pio::{InterruptHandler as PioInterruptHandler, Pio};
use rand_core::RngCore;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

mod net;
mod sensors;

use sensors::BoardSensors;

// Wi-Fi compile-time configuration injected by firmware/pico/build.rs. Kept
// near the top so both main and the net module rely on a single source of
// truth for SSID/PSK.
pub const WIFI_SSID: &str = env!("PICOSTATUS_WIFI_SSID");
pub const WIFI_PSK: &str = env!("PICOSTATUS_WIFI_PSK");

/// Firmware version string baked in at build time.
pub const FW_VERSION: &str = env!("PICOSTATUS_FW_VERSION");

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
});

#[embassy_executor::task]
async fn cyw43_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());
    info!("picostatus booting: {}", FW_VERSION);

    // Buttons short to ground; the on-chip pull-ups make released read high.
    let button_a = Input::new(p.PIN_5, Pull::Up);
    let button_b = Input::new(p.PIN_6, Pull::Up);

    // On-die temperature sensor behind the ADC mux. A single blocking
    // conversion per request is bounded work on the responder task.
    let adc = Adc::new_blocking(p.ADC, AdcConfig::default());
    let temp_sensor = AdcChannel::new_temp_sensor(p.ADC_TEMP_SENSOR);
    let board = BoardSensors::new(adc, temp_sensor, button_a, button_b);

    // CYW43 radio over PIO-driven SPI (Pico W wiring: PWR on GPIO23, CS on
    // GPIO25, DIO on GPIO24, CLK on GPIO29).
    let fw = include_bytes!("../cyw43-firmware/43439A0.bin");
    let clm = include_bytes!("../cyw43-firmware/43439A0_clm.bin");

    let pwr = Output::new(p.PIN_23, Level::Low);
    let cs = Output::new(p.PIN_25, Level::High);
    let mut pio = Pio::new(p.PIO0, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        p.PIN_24,
        p.PIN_29,
        p.DMA_CH0,
    );

    static CYW43_STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = CYW43_STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    spawner.must_spawn(cyw43_task(runner));

    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;

    // Seed the network stack from the ring-oscillator RNG.
    let mut rng = RoscRng;
    let seed = rng.next_u64();

    net::start(spawner, net_device, control, seed, board).await;
}
