// WS2812 5x5 Matrix über das RMT Peripheral
//
// Die Matrix zeigt nur eine Helligkeit: alle 25 Pixel bekommen dieselbe
// (weiße) Farbe aus `matrix_drive_color`.

use esp_core::{LedError, SmartLedWriter};
use esp_hal::Blocking;
use esp_hal::rmt::{PulseCode, Rmt};
use esp_hal::time::Rate;
use esp_hal_smartled::SmartLedsAdapter;
use rgb::RGB8;
use smart_leds_trait::SmartLedsWrite;

use crate::config::LED_COUNT;

/// RMT-Puffer: 24 Pulse pro LED + 1 Reset
pub const MATRIX_BUFFER_SIZE: usize = LED_COUNT * 24 + 1;

/// LED-Matrix Treiber
///
/// Der Puffer muss länger leben als der Treiber, daher wird er im Task
/// erstellt (`smart_led_buffer!(LED_COUNT)`) und hier nur geliehen.
pub struct RmtLedMatrix<'a> {
    leds: SmartLedsAdapter<'a, MATRIX_BUFFER_SIZE>,
}

impl<'a> RmtLedMatrix<'a> {
    /// # Parameter
    /// - `pin`: Datenleitung der Matrix
    /// - `rmt_peripheral`: RMT Peripheral
    /// - `rmt_clock_mhz`: RMT Clock Frequenz in MHz (z.B. 80)
    /// - `buffer`: Puffer für die Pulse aller LEDs
    pub fn new(
        pin: esp_hal::peripherals::GPIO10<'a>,
        rmt_peripheral: esp_hal::peripherals::RMT<'a>,
        rmt_clock_mhz: u32,
        buffer: &'a mut [PulseCode; MATRIX_BUFFER_SIZE],
    ) -> Result<Self, LedError> {
        let rmt: Rmt<'a, Blocking> = Rmt::new(rmt_peripheral, Rate::from_mhz(rmt_clock_mhz))
            .map_err(|_| LedError::WriteFailed)?;

        let leds = SmartLedsAdapter::new(rmt.channel0, pin, buffer);
        Ok(Self { leds })
    }
}

impl SmartLedWriter for RmtLedMatrix<'_> {
    fn write(&mut self, color: RGB8) -> Result<(), LedError> {
        self.leds
            .write([color; LED_COUNT].into_iter())
            .map_err(|_| LedError::WriteFailed)
    }
}
