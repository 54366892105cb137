// Licht-Task - BH1750 lesen, Helligkeit regeln, Matrix ansteuern
use defmt::{error, info, warn};
use embassy_time::Timer;
use esp_core::pipeline::LightStage;
use esp_core::{DetachedMatrix, FrameStore, LightSensor, SharedBrightness, SmartLedWriter};
use esp_hal_smartled::smart_led_buffer;

use crate::SharedI2c;
use crate::config::{BH1750_ADDRESS, LED_COUNT, RMT_CLOCK_MHZ};
use crate::hal::{Bh1750, RmtLedMatrix};

/// Licht-Logik - testbar ohne Hardware
///
/// Pro Periode: Lux lesen, EMA-Filter, Regel-Tick, Matrix schreiben,
/// Lux und angewendete Helligkeit in den FrameStore (overwrite).
///
/// # Parameter
/// - `sensor`: Lichtsensor (BH1750 oder Mock)
/// - `matrix`: LED-Matrix (RMT oder Mock)
/// - `brightness`: geteilter Helligkeits-Controller
/// - `store`: FrameStore für Lux und Prozent
pub async fn luminosity_logic<S: LightSensor, W: SmartLedWriter>(
    mut sensor: S,
    mut matrix: W,
    brightness: &SharedBrightness,
    store: &FrameStore,
) -> ! {
    let config = brightness.config();
    let mut stage = LightStage::new(&config);

    loop {
        let reading = sensor.read_lux().await;

        if let Err(e) = stage.process(reading, brightness, store, &mut matrix) {
            error!("Light: {}", e);
        }

        Timer::after_millis(config.update_ms).await;
    }
}

/// Licht-Task - Hardware-Initialisierung, danach `luminosity_logic()`
///
/// # Parameter
/// - `i2c`: BH1750 am gemeinsamen Bus
/// - `matrix_pin`: Datenleitung der Matrix
/// - `rmt_peripheral`: RMT Peripheral für WS2812-Timing
#[embassy_executor::task]
pub async fn luminosity_task(
    i2c: SharedI2c,
    matrix_pin: esp_hal::peripherals::GPIO10<'static>,
    rmt_peripheral: esp_hal::peripherals::RMT<'static>,
    brightness: &'static SharedBrightness,
    store: &'static FrameStore,
) {
    let mut sensor = Bh1750::new(i2c, BH1750_ADDRESS);
    match sensor.init().await {
        Ok(()) => info!("Light: BH1750 ready"),
        Err(e) => warn!("Light: BH1750 init failed ({}), retrying on read", e),
    }

    // Puffer für alle 25 LEDs
    let mut rmt_buffer = smart_led_buffer!(LED_COUNT);

    match RmtLedMatrix::new(matrix_pin, rmt_peripheral, RMT_CLOCK_MHZ, &mut rmt_buffer) {
        Ok(matrix) => luminosity_logic(sensor, matrix, brightness, store).await,
        Err(e) => {
            // Lux und Regel-Tick werden weiter gebraucht (Telemetrie, Kommandos)
            error!("Light: LED matrix init failed: {}, running without matrix", e);
            luminosity_logic(sensor, DetachedMatrix, brightness, store).await
        }
    }
}
