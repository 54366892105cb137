//! Core Types für den Telemetrie-Knoten
//!
//! Datenstrukturen ohne Hardware-Dependencies

/// Aggregierter, sequenzierter Telemetrie-Frame
///
/// Wird ausschließlich vom Aggregator erzeugt. Alle anderen Tasks lesen
/// nur Kopien aus dem `FrameStore`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetryFrame {
    /// Umgebungslicht in Lux (ungefiltert, letzter Messwert)
    pub ambient_light: f32,
    /// Aktuell angewendete Matrix-Helligkeit in Prozent
    pub applied_brightness_percent: f32,
    /// Temperatur in °C
    pub temperature: f32,
    /// Relative Luftfeuchtigkeit in %
    pub humidity: f32,
    /// Steigt pro Frame um genau 1 (erster Frame = 1)
    pub sequence: u32,
    /// Monotoner Zeitstempel in Millisekunden seit Boot
    pub timestamp_ms: u64,
}

/// Messwert des Temperatur-/Feuchte-Sensors
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClimateReading {
    pub temperature: f32,
    pub humidity: f32,
}

/// Betriebs-Modus der Helligkeitsregelung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrightnessMode {
    /// Helligkeit folgt dem Umgebungslicht (invers)
    #[default]
    Auto,
    /// Helligkeit folgt dem zuletzt kommandierten Wert
    Manual,
}

impl BrightnessMode {
    /// Protokoll-Token (`"auto"` / `"manual"`)
    pub fn as_str(self) -> &'static str {
        match self {
            BrightnessMode::Auto => "auto",
            BrightnessMode::Manual => "manual",
        }
    }
}

/// Schnappschuss des Helligkeits-Zustands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessState {
    pub mode: BrightnessMode,
    /// Zielwert im manuellen Modus (0..=100)
    pub target_percent: u8,
    /// Tatsächlich angewendeter Wert (0..=100), läuft dem Ziel hinterher
    pub current_percent: u8,
}

impl Default for BrightnessState {
    fn default() -> Self {
        Self {
            mode: BrightnessMode::Auto,
            target_percent: 100,
            current_percent: 100,
        }
    }
}

/// Dekodiertes Steuer-Kommando (MQTT oder Serial)
///
/// Beide Felder sind optional: ein Payload darf eines, beide oder keines enthalten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BrightnessCommand {
    pub mode: Option<BrightnessMode>,
    /// Bereits auf 0..=100 begrenzt
    pub percent: Option<u8>,
}

impl BrightnessCommand {
    /// `true` wenn das Kommando nichts verändert
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.percent.is_none()
    }
}

// ============================================================================
// defmt::Format Implementations (optional feature)
// ============================================================================

#[cfg(feature = "defmt")]
impl defmt::Format for TelemetryFrame {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "TelemetryFrame {{ seq: {}, lux: {}, perc: {}, temp: {}, hum: {}, t_ms: {} }}",
            self.sequence,
            self.ambient_light,
            self.applied_brightness_percent,
            self.temperature,
            self.humidity,
            self.timestamp_ms
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BrightnessMode {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BrightnessState {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "BrightnessState {{ mode: {}, target: {}, current: {} }}",
            self.mode,
            self.target_percent,
            self.current_percent
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BrightnessCommand {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "BrightnessCommand {{ mode: {}, percent: {} }}",
            self.mode,
            self.percent
        )
    }
}
