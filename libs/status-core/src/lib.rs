#![no_std]

use core::fmt::{self, Write as _};

use heapless::String;

/// Divisor applied to raw 12-bit conversions when scaling to volts.
pub const ADC_FULL_SCALE: u32 = 4096;
/// Largest raw value a 12-bit conversion can produce.
pub const ADC_MAX_RAW: u16 = 4095;
/// ADC reference voltage in volts.
pub const ADC_VREF: f32 = 3.3;

// RP2040 on-die temperature sensor transfer function (datasheet §4.9.5):
// the sense voltage reads 0.706 V at 27 °C and falls 1.721 mV per °C.
const TEMP_SENSE_V_AT_27C: f32 = 0.706;
const TEMP_SENSE_SLOPE_V_PER_C: f32 = 0.001721;

/// Capacity of the rendered-response buffer.
///
/// The page template is fixed apart from the temperature digits and the two
/// button labels, so the worst-case rendering has a static upper bound; the
/// `response_fits_for_any_snapshot` test proves it stays under this capacity.
pub const RESPONSE_CAPACITY: usize = 1024;

/// Upper bound on the request bytes copied out for logging.
pub const REQUEST_PREVIEW_CAPACITY: usize = 128;

pub type ResponseBuffer = String<RESPONSE_CAPACITY>;

/// Logical state of one button input.
///
/// The inputs are pulled high and the buttons short to ground, so the logical
/// state is the negation of the raw pin level.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

impl ButtonState {
    /// Interpret a raw pin level (`true` = high) under the pull-up wiring.
    pub fn from_raw_level(raw_high: bool) -> Self {
        if raw_high {
            ButtonState::Released
        } else {
            ButtonState::Pressed
        }
    }

    /// Label shown on the status page.
    pub fn label(self) -> &'static str {
        match self {
            ButtonState::Pressed => "PRESSIONADO",
            ButtonState::Released => "SOLTO",
        }
    }
}

/// The tuple of sensor values captured for one request.
///
/// Constructed fresh per request and immutable once produced; it has no
/// identity beyond the single response it feeds.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub temp_c: f32,
    pub button_a: ButtonState,
    pub button_b: ButtonState,
}

/// Capability handle over the sampled peripherals.
///
/// The connection handler receives this instead of reaching for ambient
/// globals, so it can be driven by a fake port on the host.
pub trait HardwarePort {
    /// Raw logical level of button A's pin (`true` = high).
    fn button_a_level(&mut self) -> bool;
    /// Raw logical level of button B's pin (`true` = high).
    fn button_b_level(&mut self) -> bool;
    /// One raw 12-bit conversion of the temperature channel.
    fn temperature_raw(&mut self) -> u16;
}

/// Map a raw 12-bit conversion to degrees Celsius.
pub fn temp_c_from_raw(raw: u16) -> f32 {
    let volts = raw as f32 * (ADC_VREF / ADC_FULL_SCALE as f32);
    27.0 - (volts - TEMP_SENSE_V_AT_27C) / TEMP_SENSE_SLOPE_V_PER_C
}

/// Sample all three inputs into a consistent snapshot.
///
/// Triggers one analog conversion and two digital reads; no failure
/// conditions are exposed since the peripherals are configured once at boot.
pub fn read_snapshot<P: HardwarePort>(port: &mut P) -> Snapshot {
    Snapshot {
        temp_c: temp_c_from_raw(port.temperature_raw()),
        button_a: ButtonState::from_raw_level(port.button_a_level()),
        button_b: ButtonState::from_raw_level(port.button_b_level()),
    }
}

/// Rendering failed because the response buffer capacity was exhausted.
///
/// Cannot occur for any representable snapshot (see the capacity test); it is
/// surfaced as an error rather than silently truncating the response.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderError;

impl From<fmt::Error> for RenderError {
    fn from(_: fmt::Error) -> Self {
        RenderError
    }
}

/// Render the complete HTTP response for one snapshot.
///
/// The byte layout (status line, headers, HTML document with the 1000 ms
/// reload script) is fixed; only the temperature digits and button labels
/// vary. Rendering is pure: the same snapshot yields identical bytes.
pub fn render_response(snapshot: &Snapshot) -> Result<ResponseBuffer, RenderError> {
    let mut out = ResponseBuffer::new();
    write!(
        out,
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html\r\n\
         \r\n\
         <!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"UTF-8\">\n\
         <script>setTimeout(() => location.reload(), 1000);</script>\
         <title>Status do Sistema</title>\n\
         <style>\n\
         body {{ font-family: Arial, sans-serif; text-align: center; margin-top: 50px; }}\n\
         .valor {{ font-size: 32px; margin: 10px 0; }}\n\
         </style>\n\
         </head>\n\
         <body>\n\
         <h1>Status do Sistema</h1>\n\
         <div class=\"valor\">Temperatura: {temp:.2} &deg;C</div>\n\
         <div class=\"valor\">Botão A: {a}</div>\n\
         <div class=\"valor\">Botão B: {b}</div>\n\
         </body>\n\
         </html>\n",
        temp = snapshot.temp_c,
        a = snapshot.button_a.label(),
        b = snapshot.button_b.label(),
    )?;
    Ok(out)
}

/// Bounded, printable copy of the inbound payload for logging.
///
/// The copy lives in the caller's scope and is released on every exit path by
/// drop; non-printable bytes are replaced so the preview is always loggable.
pub fn request_preview(payload: &[u8]) -> String<REQUEST_PREVIEW_CAPACITY> {
    let mut out = String::new();
    for &byte in payload.iter().take(REQUEST_PREVIEW_CAPACITY) {
        let c = if byte.is_ascii_graphic() || byte == b' ' {
            byte as char
        } else {
            '.'
        };
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// What the transport should do after one receive event.
#[derive(Debug, PartialEq, Eq)]
pub enum HandlerAction {
    /// Write the rendered response and leave the connection open.
    Respond(ResponseBuffer),
    /// The peer closed its side; close the connection.
    Close,
}

/// The per-connection request/response state machine.
///
/// One accepted connection drives one handler: every arrival of request data
/// performs a single transition from awaiting-data to responded (connection
/// stays open for the next event) or closed (zero-length receive). Request
/// content is deliberately ignored — any non-empty payload triggers the same
/// rendering path, and no per-request state survives the transition.
pub struct ConnectionHandler<P: HardwarePort> {
    port: P,
}

impl<P: HardwarePort> ConnectionHandler<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    /// Perform one state transition for a receive event.
    ///
    /// An empty payload is the transport's peer-closed signal and yields
    /// [`HandlerAction::Close`]; anything else samples the hardware, renders
    /// the page and yields [`HandlerAction::Respond`].
    pub fn on_data(&mut self, payload: &[u8]) -> Result<HandlerAction, RenderError> {
        if payload.is_empty() {
            return Ok(HandlerAction::Close);
        }

        let snapshot = read_snapshot(&mut self.port);
        let page = render_response(&snapshot)?;
        Ok(HandlerAction::Respond(page))
    }
}

#[cfg(test)]
mod tests {
    use core::fmt::Write as _;

    use super::*;

    struct FakePort {
        a_high: bool,
        b_high: bool,
        raw: u16,
    }

    impl HardwarePort for FakePort {
        fn button_a_level(&mut self) -> bool {
            self.a_high
        }

        fn button_b_level(&mut self) -> bool {
            self.b_high
        }

        fn temperature_raw(&mut self) -> u16 {
            self.raw
        }
    }

    fn temperature_row(raw: u16) -> String<64> {
        let mut row: String<64> = String::new();
        write!(row, "Temperatura: {:.2} &deg;C", temp_c_from_raw(raw)).unwrap();
        row
    }

    #[test]
    fn temperature_matches_reference_over_full_scale() {
        for raw in 0..=ADC_MAX_RAW {
            let got = temp_c_from_raw(raw) as f64;
            let volts = raw as f64 * 3.3 / 4096.0;
            let expected = 27.0 - (volts - 0.706) / 0.001721;
            assert!(
                (got - expected).abs() < 0.01,
                "raw={} got={} expected={}",
                raw,
                got,
                expected
            );
        }
    }

    #[test]
    fn button_state_negates_raw_level() {
        assert_eq!(ButtonState::from_raw_level(false), ButtonState::Pressed);
        assert_eq!(ButtonState::from_raw_level(true), ButtonState::Released);
        assert_eq!(ButtonState::Pressed.label(), "PRESSIONADO");
        assert_eq!(ButtonState::Released.label(), "SOLTO");
    }

    #[test]
    fn snapshot_reports_buttons_independently() {
        for (a_high, b_high) in [(false, false), (false, true), (true, false), (true, true)] {
            let mut port = FakePort {
                a_high,
                b_high,
                raw: 1000,
            };
            let snapshot = read_snapshot(&mut port);
            assert_eq!(snapshot.button_a, ButtonState::from_raw_level(a_high));
            assert_eq!(snapshot.button_b, ButtonState::from_raw_level(b_high));
        }
    }

    #[test]
    fn rendering_is_pure() {
        let snapshot = Snapshot {
            temp_c: temp_c_from_raw(1500),
            button_a: ButtonState::Pressed,
            button_b: ButtonState::Released,
        };
        let first = render_response(&snapshot).unwrap();
        let second = render_response(&snapshot).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn response_preamble_is_bit_compatible() {
        let snapshot = Snapshot {
            temp_c: 27.0,
            button_a: ButtonState::Released,
            button_b: ButtonState::Released,
        };
        let page = render_response(&snapshot).unwrap();
        assert!(page.starts_with(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<!DOCTYPE html>\n"
        ));
        assert!(page.contains(
            "<script>setTimeout(() => location.reload(), 1000);</script><title>Status do Sistema</title>\n"
        ));
        assert!(page.ends_with("</body>\n</html>\n"));
    }

    #[test]
    fn response_fits_for_any_snapshot() {
        // The labels differ in length, so the bound must hold with the longer
        // one on both rows for every representable temperature.
        let mut max_len = 0;
        for raw in 0..=ADC_MAX_RAW {
            let snapshot = Snapshot {
                temp_c: temp_c_from_raw(raw),
                button_a: ButtonState::Pressed,
                button_b: ButtonState::Pressed,
            };
            let page = render_response(&snapshot).unwrap();
            max_len = max_len.max(page.len());
        }
        assert!(max_len <= RESPONSE_CAPACITY, "worst case {} bytes", max_len);
    }

    #[test]
    fn request_preview_is_bounded_and_printable() {
        let preview = request_preview(b"GET / HTTP/1.1\r\nHost: pico\r\n\r\n");
        assert_eq!(preview.as_str(), "GET / HTTP/1.1..Host: pico....");

        let long = [b'x'; 4 * REQUEST_PREVIEW_CAPACITY];
        assert_eq!(request_preview(&long).len(), REQUEST_PREVIEW_CAPACITY);
    }

    #[test]
    fn non_empty_payload_renders_current_readings() {
        // Button A raw low (pressed), button B raw high (released), analog 1500.
        let port = FakePort {
            a_high: false,
            b_high: true,
            raw: 1500,
        };
        let mut handler = ConnectionHandler::new(port);

        let action = handler.on_data(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        let page = match action {
            HandlerAction::Respond(page) => page,
            HandlerAction::Close => panic!("expected a response"),
        };

        assert!(page.contains("Botão A: PRESSIONADO"));
        assert!(page.contains("Botão B: SOLTO"));
        assert!(page.contains(temperature_row(1500).as_str()));
    }

    #[test]
    fn zero_length_receive_closes_the_connection() {
        let port = FakePort {
            a_high: true,
            b_high: true,
            raw: 2000,
        };
        let mut handler = ConnectionHandler::new(port);
        assert_eq!(handler.on_data(&[]).unwrap(), HandlerAction::Close);
    }

    #[test]
    fn consecutive_requests_see_fresh_readings() {
        let port = FakePort {
            a_high: false,
            b_high: true,
            raw: 1200,
        };
        let mut handler = ConnectionHandler::new(port);

        let first = match handler.on_data(b"GET / HTTP/1.1\r\n\r\n").unwrap() {
            HandlerAction::Respond(page) => page,
            HandlerAction::Close => panic!("expected a response"),
        };
        assert!(first.contains("Botão A: PRESSIONADO"));
        assert!(first.contains(temperature_row(1200).as_str()));

        // Readings change between the two receive events.
        handler.port.a_high = true;
        handler.port.b_high = false;
        handler.port.raw = 3000;

        let second = match handler.on_data(b"GET /again HTTP/1.1\r\n\r\n").unwrap() {
            HandlerAction::Respond(page) => page,
            HandlerAction::Close => panic!("expected a response"),
        };
        assert!(second.contains("Botão A: SOLTO"));
        assert!(second.contains("Botão B: PRESSIONADO"));
        assert!(second.contains(temperature_row(3000).as_str()));
    }
}
