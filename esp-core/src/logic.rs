//! Pure Business Logic Functions
//!
//! Funktionen ohne Hardware-Dependencies (testbar!)

use rgb::RGB8;

use crate::traits::SensorError;
use crate::types::ClimateReading;

/// Maximaler Kanalwert der Matrix bei 100 % (Augenschonung, WS2812 sehr hell)
pub const MATRIX_MAX_CHANNEL: u8 = 50;

/// Wandelt einen Helligkeits-Prozentwert in die Matrix-Farbe (Weiß) um
///
/// Werte über 100 werden auf 100 begrenzt.
///
/// # Beispiele
///
/// ```
/// # use rgb::RGB8;
/// # use esp_core::matrix_drive_color;
/// assert_eq!(matrix_drive_color(100), RGB8 { r: 50, g: 50, b: 50 });
/// assert_eq!(matrix_drive_color(0), RGB8 { r: 0, g: 0, b: 0 });
/// ```
pub fn matrix_drive_color(percent: u8) -> RGB8 {
    let percent = percent.min(100) as u32;
    let v = ((percent * MATRIX_MAX_CHANNEL as u32 + 50) / 100) as u8;
    RGB8 { r: v, g: v, b: v }
}

/// Umkehrung von [`matrix_drive_color`] (liest den Grün-Kanal)
pub fn percent_from_drive_color(color: RGB8) -> u8 {
    let p = (color.g as u32 * 100 + MATRIX_MAX_CHANNEL as u32 / 2) / MATRIX_MAX_CHANNEL as u32;
    p.min(100) as u8
}

/// Begrenzung für f32 (ohne libm)
pub(crate) fn clampf(x: f32, lo: f32, hi: f32) -> f32 {
    if x < lo {
        lo
    } else if x > hi {
        hi
    } else {
        x
    }
}

/// BH1750: Rohwert (2 Bytes, Big Endian) in Lux
///
/// Gilt für den "Continuous High Resolution Mode" (1 lx Auflösung).
pub fn bh1750_lux_from_raw(raw: [u8; 2]) -> f32 {
    u16::from_be_bytes(raw) as f32 / 1.2
}

/// AHT10: Mess-Frame (6 Bytes) in Temperatur und Feuchte dekodieren
///
/// Byte 0 ist das Status-Byte (Bit 7 = busy), danach folgen
/// 20 Bit Feuchte und 20 Bit Temperatur.
pub fn aht10_decode(frame: [u8; 6]) -> Result<ClimateReading, SensorError> {
    if frame[0] & 0x80 != 0 {
        return Err(SensorError::Busy);
    }

    let raw_hum = ((frame[1] as u32) << 12) | ((frame[2] as u32) << 4) | ((frame[3] as u32) >> 4);
    let raw_temp = (((frame[3] as u32) & 0x0F) << 16) | ((frame[4] as u32) << 8) | frame[5] as u32;

    const FULL_SCALE: f32 = 1_048_576.0; // 2^20

    Ok(ClimateReading {
        humidity: raw_hum as f32 / FULL_SCALE * 100.0,
        temperature: raw_temp as f32 / FULL_SCALE * 200.0 - 50.0,
    })
}
