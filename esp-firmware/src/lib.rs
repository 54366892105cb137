// Library-Root: Tasks, Treiber und geteilte Typen der Firmware
// Keine Standard-Bibliothek (Embedded System)
#![no_std]

// Module
pub mod config;
pub mod hal;
pub mod tasks;

use core::fmt::Write;

use embassy_embedded_hal::shared_bus::asynch::i2c::I2cDevice;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Instant, Timer};
use esp_hal::Async;
use esp_hal::i2c::master::I2c;
use heapless::String;

// Re-exports von esp-core
pub use esp_core::{Clock, FrameStore, LinkEvents, SharedBrightness};

use crate::tasks::mqtt::LinkRequest;

// ============================================================================
// Type-Aliase für geteilte Ressourcen
// ============================================================================

/// Gemeinsamer I2C0-Bus (Sensoren + Display)
/// Der Lock wird nur für eine einzelne Transaktion gehalten.
pub type I2cBus = Mutex<CriticalSectionRawMutex, I2c<'static, Async>>;

/// Ein Gerät am gemeinsamen Bus
pub type SharedI2c = I2cDevice<'static, CriticalSectionRawMutex, I2c<'static, Async>>;

/// One-Shot Benachrichtigung: neuer Frame liegt im FrameStore
pub type FrameSignal = Signal<CriticalSectionRawMutex, ()>;

/// Anfragen vom MQTT-Treiber-Task an den Link-Task
/// - 4: Connect + Subscribe + Publish + Reserve
pub type LinkRequestChannel = Channel<CriticalSectionRawMutex, LinkRequest, 4>;
pub type LinkRequestSender = Sender<'static, CriticalSectionRawMutex, LinkRequest, 4>;
pub type LinkRequestReceiver = Receiver<'static, CriticalSectionRawMutex, LinkRequest, 4>;

/// Device-ID: 12 Hex-Zeichen (MAC) oder Override aus `.env`
pub type DeviceId = String<32>;

// ============================================================================
// Zeitquelle
// ============================================================================

/// `Clock` auf Basis von embassy-time
#[derive(Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }

    async fn sleep_ms(&self, ms: u64) {
        Timer::after_millis(ms).await;
    }
}

/// Formatiert eine MAC-Adresse als Device-ID (Kleinbuchstaben, ohne Trenner)
pub fn device_id_from_mac(mac: [u8; 6]) -> DeviceId {
    let mut id = DeviceId::new();
    for byte in mac {
        // 12 Zeichen passen immer
        let _ = write!(id, "{:02x}", byte);
    }
    id
}
