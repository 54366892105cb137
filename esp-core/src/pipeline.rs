//! Sensor-Pipeline: Licht-Stufe, Klima-Stufe, Aggregator und Display-Rendering
//!
//! Die Stufen enthalten keine Hardware und kein Timing. Die Firmware-Tasks
//! rufen sie einmal pro Periode mit dem Sensor-Ergebnis auf.

use core::fmt::Write;

use heapless::String;

use crate::brightness::{BrightnessConfig, EmaFilter, SharedBrightness};
use crate::connection::Clock;
use crate::logic::matrix_drive_color;
use crate::mailbox::{FrameStore, SensorSignal};
use crate::traits::{DisplayError, LedError, SensorError, SmartLedWriter, TextDisplay};
use crate::types::{ClimateReading, TelemetryFrame};

/// Titelzeile des Displays
pub const DISPLAY_TITLE: &str = "Lux, Temp. & Hum.";

/// Boot-Anzeige vor dem ersten Frame
pub const DISPLAY_SPLASH: &str = "Starting...";

/// Zeilenabstand in Pixeln (6x10 Font)
const LINE_HEIGHT: i32 = 10;

/// Jeder n-te Zyklus erzeugt eine Debug-Zeile
const LOG_EVERY: u32 = 10;

/// Licht-Stufe: EMA-Filter, Regel-Tick, Matrix-Ausgabe
pub struct LightStage {
    filter: EmaFilter,
    cycles: u32,
}

impl LightStage {
    /// Filter startet bei `lux_max`
    pub fn new(config: &BrightnessConfig) -> Self {
        Self {
            filter: EmaFilter::new(config.lux_max, config.alpha),
            cycles: 0,
        }
    }

    pub fn filtered_lux(&self) -> f32 {
        self.filter.value()
    }

    /// Ein Zyklus mit dem Ergebnis der Lichtmessung
    ///
    /// Bei Lesefehler bleibt der Filter unverändert und es wird kein Lux-Wert
    /// geschrieben. Der Regel-Tick läuft trotzdem weiter.
    pub fn process<W: SmartLedWriter>(
        &mut self,
        reading: Result<f32, SensorError>,
        brightness: &SharedBrightness,
        store: &FrameStore,
        matrix: &mut W,
    ) -> Result<u8, LedError> {
        let raw = match reading {
            Ok(lux) => {
                self.filter.update(lux);
                store.write(SensorSignal::Lux, lux);
                Some(lux)
            }
            Err(e) => {
                warn!("Light: read failed: {}", e);
                None
            }
        };

        let percent = brightness.update(self.filter.value());
        store.write(SensorSignal::BrightnessPercent, percent as f32);

        if self.cycles % LOG_EVERY == 0 {
            let state = brightness.snapshot();
            debug!(
                "Light: lux={} mode={} target={} current={}",
                raw.unwrap_or(-1.0),
                state.mode,
                state.target_percent,
                state.current_percent
            );
        }
        self.cycles = self.cycles.wrapping_add(1);

        matrix.write(matrix_drive_color(percent))?;
        Ok(percent)
    }
}

/// Klima-Stufe: schreibt Temperatur und Feuchte in jedem Zyklus
///
/// Bei Lesefehler werden die letzten gültigen Werte (anfangs 0) erneut
/// geschrieben, damit der Aggregator weiter Frames bildet.
#[derive(Default)]
pub struct ClimateStage {
    last: ClimateReading,
    cycles: u32,
}

impl ClimateStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zuletzt erfolgreich gelesener Wert
    pub fn last_reading(&self) -> ClimateReading {
        self.last
    }

    /// Gibt `true` zurück wenn ein frischer Messwert geschrieben wurde
    pub fn process(&mut self, reading: Result<ClimateReading, SensorError>, store: &FrameStore) -> bool {
        let fresh = match reading {
            Ok(reading) => {
                if self.cycles % LOG_EVERY == 0 {
                    debug!("Climate: temp={} C hum={} %", reading.temperature, reading.humidity);
                }
                self.cycles = self.cycles.wrapping_add(1);
                self.last = reading;
                true
            }
            Err(e) => {
                warn!("Climate: read failed: {}, repeating last values", e);
                false
            }
        };

        store.write(SensorSignal::Temperature, self.last.temperature);
        store.write(SensorSignal::Humidity, self.last.humidity);
        fresh
    }
}

/// Einziger Erzeuger von Telemetrie-Frames
///
/// Lux und Prozent werden nur gepeekt: fehlt ein Wert, bleibt der vorherige.
#[derive(Debug, Default)]
pub struct Aggregator {
    sequence: u32,
    lux: f32,
    percent: f32,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Übernimmt gepeekte Werte, `None` behält den vorherigen Wert
    pub fn observe(&mut self, lux: Option<f32>, percent: Option<f32>) {
        if let Some(lux) = lux {
            self.lux = lux;
        }
        if let Some(percent) = percent {
            self.percent = percent;
        }
    }

    /// Baut den nächsten Frame (Sequenz +1)
    pub fn compose(&mut self, climate: ClimateReading, now_ms: u64) -> TelemetryFrame {
        self.sequence = self.sequence.wrapping_add(1);
        TelemetryFrame {
            ambient_light: self.lux,
            applied_brightness_percent: self.percent,
            temperature: climate.temperature,
            humidity: climate.humidity,
            sequence: self.sequence,
            timestamp_ms: now_ms,
        }
    }

    /// Wartet auf Temperatur und Feuchte (entnehmend), peekt Lux/Prozent,
    /// und legt den neuen Frame im Store ab
    pub async fn next_frame<C: Clock>(&mut self, store: &FrameStore, clock: &C) -> TelemetryFrame {
        let temperature = store.receive(SensorSignal::Temperature).await;
        let humidity = store.receive(SensorSignal::Humidity).await;

        self.observe(
            store.read_latest(SensorSignal::Lux),
            store.read_latest(SensorSignal::BrightnessPercent),
        );

        let frame = self.compose(ClimateReading { temperature, humidity }, clock.now_ms());
        store.write_frame(frame);
        frame
    }
}

/// Boot-Anzeige
pub async fn render_splash<D: TextDisplay>(display: &mut D) -> Result<(), DisplayError> {
    display.clear();
    display.draw_text(0, 0, DISPLAY_SPLASH);
    display.flush().await
}

/// Zeichnet Titel und vier Messwerte
pub async fn render_frame<D: TextDisplay>(display: &mut D, frame: &TelemetryFrame) -> Result<(), DisplayError> {
    display.clear();
    display.draw_text(0, 0, DISPLAY_TITLE);

    let mut line: String<32> = String::new();

    // Bei Überlauf wird abgeschnitten
    let _ = write!(line, "Lux: {:.2} lx", frame.ambient_light);
    display.draw_text(0, LINE_HEIGHT, &line);

    line.clear();
    let _ = write!(line, "Temp: {:.2} C", frame.temperature);
    display.draw_text(0, 2 * LINE_HEIGHT, &line);

    line.clear();
    let _ = write!(line, "Hum: {:.2} %", frame.humidity);
    display.draw_text(0, 3 * LINE_HEIGHT, &line);

    line.clear();
    let _ = write!(line, "Bright: {:.0} %", frame.applied_brightness_percent);
    display.draw_text(0, 4 * LINE_HEIGHT, &line);

    display.flush().await
}
