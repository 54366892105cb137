//! Hardware Abstraction Traits
//!
//! Diese Traits definieren Schnittstellen für Hardware-Zugriff
//! ohne konkrete Implementierung.
//!
//! # Implementierungen
//! - **Production:** esp-firmware `hal` Modul (RMT, I2C, SSD1306)
//! - **Testing:** Mock-Implementierungen in esp-tests

use rgb::RGB8;

use crate::types::ClimateReading;

/// Fehler-Typ für LED-Operationen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedError {
    WriteFailed,
}

/// Fehler-Typ für Sensor-Zugriffe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// I2C-Transaktion fehlgeschlagen (NACK, Arbitration, ...)
    Bus,
    /// Sensor meldet noch keine fertige Messung
    Busy,
    /// Sensor wurde (noch) nicht initialisiert
    NotInitialized,
}

/// Fehler-Typ für Display-Ausgabe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    FlushFailed,
}

/// Trait für SmartLED Hardware-Zugriff
///
/// Abstrahiert den Zugriff auf die WS2812 LED-Matrix. Es gibt keinen
/// Rückkanal: die Farbe wird auf alle Pixel geschrieben.
pub trait SmartLedWriter: Send {
    /// Schreibt eine RGB-Farbe auf alle LEDs der Matrix
    ///
    /// # Fehlerbehandlung
    /// Gibt `LedError::WriteFailed` zurück wenn Hardware-Zugriff fehlschlägt
    fn write(&mut self, color: RGB8) -> Result<(), LedError>;
}

/// Ersatz wenn keine Matrix verfügbar ist (z.B. RMT-Init fehlgeschlagen)
///
/// Schreibt nichts und meldet nie einen Fehler, die Farbe wird nur geloggt.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedMatrix;

impl SmartLedWriter for DetachedMatrix {
    fn write(&mut self, color: RGB8) -> Result<(), LedError> {
        debug!("Light: matrix detached, drive {}", color.r);
        Ok(())
    }
}

/// Lichtsensor (z.B. BH1750)
#[allow(async_fn_in_trait)]
pub trait LightSensor {
    async fn read_lux(&mut self) -> Result<f32, SensorError>;
}

/// Temperatur-/Feuchtesensor (z.B. AHT10)
#[allow(async_fn_in_trait)]
pub trait ClimateSensor {
    async fn read(&mut self) -> Result<ClimateReading, SensorError>;
}

/// Monochromes Text-Display (z.B. SSD1306)
///
/// `clear` und `draw_text` arbeiten nur auf dem Framebuffer,
/// erst `flush` überträgt zum Panel (teilt sich den I2C-Bus mit den Sensoren).
#[allow(async_fn_in_trait)]
pub trait TextDisplay {
    fn clear(&mut self);
    fn draw_text(&mut self, x: i32, y: i32, text: &str);
    async fn flush(&mut self) -> Result<(), DisplayError>;
}

#[cfg(feature = "defmt")]
impl defmt::Format for LedError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            LedError::WriteFailed => defmt::write!(fmt, "LED write failed"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DisplayError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            DisplayError::FlushFailed => defmt::write!(fmt, "display flush failed"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SensorError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            SensorError::Bus => defmt::write!(fmt, "bus error"),
            SensorError::Busy => defmt::write!(fmt, "sensor busy"),
            SensorError::NotInitialized => defmt::write!(fmt, "not initialized"),
        }
    }
}
