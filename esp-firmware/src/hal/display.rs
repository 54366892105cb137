// SSD1306 OLED (128x64) als TextDisplay
//
// Zeichnen passiert im RAM-Framebuffer, nur `flush` geht über den Bus.

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use esp_core::{DisplayError, TextDisplay};
use ssd1306::mode::BufferedGraphicsModeAsync;
use ssd1306::prelude::*;
use ssd1306::{I2CDisplayInterface, Ssd1306Async};

use crate::SharedI2c;
use crate::config::SSD1306_ADDRESS;

type Panel = Ssd1306Async<
    I2CInterface<SharedI2c>,
    DisplaySize128x64,
    BufferedGraphicsModeAsync<DisplaySize128x64>,
>;

pub struct OledDisplay {
    panel: Panel,
}

impl OledDisplay {
    pub fn new(i2c: SharedI2c) -> Self {
        let interface = I2CDisplayInterface::new_custom_address(i2c, SSD1306_ADDRESS);
        let panel = Ssd1306Async::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        Self { panel }
    }

    pub async fn init(&mut self) -> Result<(), DisplayError> {
        self.panel.init().await.map_err(|_| DisplayError::FlushFailed)
    }
}

impl TextDisplay for OledDisplay {
    fn clear(&mut self) {
        self.panel.clear_buffer();
    }

    fn draw_text(&mut self, x: i32, y: i32, text: &str) {
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        // Framebuffer-Zeichnen kann nicht fehlschlagen
        let _ = Text::with_baseline(text, Point::new(x, y), style, Baseline::Top).draw(&mut self.panel);
    }

    async fn flush(&mut self) -> Result<(), DisplayError> {
        self.panel.flush().await.map_err(|_| DisplayError::FlushFailed)
    }
}
