//! Overwrite-Mailboxen und Frame Store
//!
//! Eine `Mailbox` hält immer nur den letzten geschriebenen Wert (Tiefe 1).
//! Schreiben ersetzt den vorherigen Wert, es wird nichts gepuffert:
//! für Telemetrie ist Aktualität wichtiger als Vollständigkeit.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::types::TelemetryFrame;

/// Single-Slot Mailbox mit Overwrite-Semantik
///
/// - `write` blockiert nie und schlägt nie fehl
/// - `read_latest` ist ein Peek (Wert bleibt erhalten)
/// - `receive` wartet auf einen Wert und entnimmt ihn
pub struct Mailbox<T: Copy> {
    slot: Mutex<CriticalSectionRawMutex, Cell<Option<T>>>,
    written: Signal<CriticalSectionRawMutex, ()>,
}

impl<T: Copy> Mailbox<T> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(None)),
            written: Signal::new(),
        }
    }

    /// Ersetzt den gespeicherten Wert und weckt einen wartenden Leser
    pub fn write(&self, value: T) {
        self.slot.lock(|slot| slot.set(Some(value)));
        self.written.signal(());
    }

    /// Letzter geschriebener Wert, `None` falls (noch) leer
    pub fn read_latest(&self) -> Option<T> {
        self.slot.lock(|slot| slot.get())
    }

    /// Entnimmt den Wert (Mailbox ist danach leer)
    pub fn take(&self) -> Option<T> {
        self.slot.lock(|slot| slot.take())
    }

    /// Wartet bis ein Wert vorhanden ist und entnimmt ihn
    pub async fn receive(&self) -> T {
        loop {
            if let Some(value) = self.take() {
                return value;
            }
            self.written.wait().await;
        }
    }
}

impl<T: Copy> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sensor-Signale mit eigener Mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSignal {
    /// Rohwert Lichtsensor (lx)
    Lux,
    /// Angewendete Matrix-Helligkeit (%)
    BrightnessPercent,
    /// Temperatur (°C)
    Temperature,
    /// Relative Feuchte (%)
    Humidity,
}

/// Frame Store: eine Mailbox pro Sensor-Signal plus eine für den aggregierten Frame
///
/// Wird als `'static` zwischen den Tasks geteilt.
pub struct FrameStore {
    lux: Mailbox<f32>,
    brightness_percent: Mailbox<f32>,
    temperature: Mailbox<f32>,
    humidity: Mailbox<f32>,
    frame: Mailbox<TelemetryFrame>,
}

impl FrameStore {
    pub const fn new() -> Self {
        Self {
            lux: Mailbox::new(),
            brightness_percent: Mailbox::new(),
            temperature: Mailbox::new(),
            humidity: Mailbox::new(),
            frame: Mailbox::new(),
        }
    }

    fn mailbox(&self, signal: SensorSignal) -> &Mailbox<f32> {
        match signal {
            SensorSignal::Lux => &self.lux,
            SensorSignal::BrightnessPercent => &self.brightness_percent,
            SensorSignal::Temperature => &self.temperature,
            SensorSignal::Humidity => &self.humidity,
        }
    }

    pub fn write(&self, signal: SensorSignal, value: f32) {
        self.mailbox(signal).write(value);
    }

    pub fn read_latest(&self, signal: SensorSignal) -> Option<f32> {
        self.mailbox(signal).read_latest()
    }

    /// Blockierendes Lesen mit Entnahme (Aggregator wartet auf Temp/Feuchte)
    pub async fn receive(&self, signal: SensorSignal) -> f32 {
        self.mailbox(signal).receive().await
    }

    pub fn write_frame(&self, frame: TelemetryFrame) {
        self.frame.write(frame);
    }

    pub fn latest_frame(&self) -> Option<TelemetryFrame> {
        self.frame.read_latest()
    }

    /// Liefert den Frame nur, wenn seine Sequenz größer als `last_seen_seq` ist
    ///
    /// Idempotenter Neuheits-Check für alle Konsumenten (MQTT, Serial).
    pub fn read_frame_if_newer(&self, last_seen_seq: u32) -> Option<TelemetryFrame> {
        self.frame
            .read_latest()
            .filter(|frame| frame.sequence > last_seen_seq)
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_mailbox_reads_none() {
        let mailbox: Mailbox<u32> = Mailbox::new();
        assert_eq!(mailbox.read_latest(), None);
    }

    #[test]
    fn test_write_overwrites_previous() {
        let mailbox = Mailbox::new();
        mailbox.write(1u32);
        mailbox.write(2);
        assert_eq!(mailbox.read_latest(), Some(2));
        // Peek verbraucht nicht
        assert_eq!(mailbox.read_latest(), Some(2));
    }

    #[test]
    fn test_take_empties_slot() {
        let mailbox = Mailbox::new();
        mailbox.write(7u8);
        assert_eq!(mailbox.take(), Some(7));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn test_receive_returns_latest_value() {
        let mailbox = Mailbox::new();
        mailbox.write(1.0f32);
        mailbox.write(2.5);
        let value = embassy_futures::block_on(mailbox.receive());
        assert_eq!(value, 2.5);
        assert_eq!(mailbox.read_latest(), None);
    }

    #[test]
    fn test_frame_if_newer() {
        let store = FrameStore::new();
        assert_eq!(store.read_frame_if_newer(0), None);

        let frame = TelemetryFrame {
            sequence: 3,
            ..Default::default()
        };
        store.write_frame(frame);

        assert_eq!(store.read_frame_if_newer(2), Some(frame));
        assert_eq!(store.read_frame_if_newer(3), None);
        assert_eq!(store.read_frame_if_newer(4), None);
    }
}
