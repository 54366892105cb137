// Display-Task - Aggregiert Frames und zeigt sie auf dem OLED
use defmt::{debug, warn};
use embassy_time::Timer;
use esp_core::pipeline::{Aggregator, render_frame, render_splash};
use esp_core::{FrameStore, TextDisplay};

use crate::config::{DISPLAY_PERIOD_MS, DISPLAY_SPLASH_MS};
use crate::hal::OledDisplay;
use crate::{EmbassyClock, FrameSignal, SharedI2c};

/// Aggregator-Logik
///
/// Wartet auf Temperatur und Feuchte, baut den nächsten Frame (Sequenz +1),
/// zeichnet ihn und weckt den MQTT-Task. Ein defektes Display stoppt die
/// Telemetrie nicht.
pub async fn display_logic<D: TextDisplay>(
    mut display: D,
    store: &FrameStore,
    frame_ready: &FrameSignal,
) -> ! {
    if let Err(e) = render_splash(&mut display).await {
        warn!("Display: {}", e);
    }
    Timer::after_millis(DISPLAY_SPLASH_MS).await;

    let clock = EmbassyClock;
    let mut aggregator = Aggregator::new();

    loop {
        let frame = aggregator.next_frame(store, &clock).await;
        debug!("Display: {}", frame);

        if let Err(e) = render_frame(&mut display, &frame).await {
            warn!("Display: {}", e);
        }

        frame_ready.signal(());
        Timer::after_millis(DISPLAY_PERIOD_MS).await;
    }
}

#[embassy_executor::task]
pub async fn display_task(i2c: SharedI2c, store: &'static FrameStore, frame_ready: &'static FrameSignal) {
    let mut display = OledDisplay::new(i2c);
    if let Err(e) = display.init().await {
        warn!("Display: SSD1306 init failed: {}", e);
    }

    display_logic(display, store, frame_ready).await
}
