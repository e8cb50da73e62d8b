use embassy_rp::adc::{Adc, Blocking, Channel};
use embassy_rp::gpio::Input;

use picostatus_core::HardwarePort;

/// The board's hardware port: two pulled-up button inputs and the on-die
/// temperature channel behind the ADC mux.
pub struct BoardSensors {
    adc: Adc<'static, Blocking>,
    temp_sensor: Channel<'static>,
    button_a: Input<'static>,
    button_b: Input<'static>,
}

impl BoardSensors {
    pub fn new(
        adc: Adc<'static, Blocking>,
        temp_sensor: Channel<'static>,
        button_a: Input<'static>,
        button_b: Input<'static>,
    ) -> Self {
        Self {
            adc,
            temp_sensor,
            button_a,
            button_b,
        }
    }
}

impl HardwarePort for BoardSensors {
    fn button_a_level(&mut self) -> bool {
        self.button_a.is_high()
    }

    fn button_b_level(&mut self) -> bool {
        self.button_b.is_high()
    }

    fn temperature_raw(&mut self) -> u16 {
        // The temp-sensor channel is configured once at boot; a conversion
        // error here means a misconfigured channel, not a runtime fault.
        self.adc.blocking_read(&mut self.temp_sensor).unwrap_or(0)
    }
}
