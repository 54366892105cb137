// Klima-Task - AHT10 Temperatur und Feuchte alle 2 s
use defmt::{info, warn};
use embassy_time::Timer;
use esp_core::pipeline::ClimateStage;
use esp_core::{ClimateSensor, FrameStore};

use crate::SharedI2c;
use crate::config::{AHT10_ADDRESS, CLIMATE_PERIOD_MS};
use crate::hal::Aht10;

/// Klima-Logik: bei Lesefehler werden die letzten gültigen Werte erneut geschrieben
pub async fn climate_logic<S: ClimateSensor>(mut sensor: S, store: &FrameStore) -> ! {
    let mut stage = ClimateStage::new();

    loop {
        let reading = sensor.read().await;
        stage.process(reading, store);

        Timer::after_millis(CLIMATE_PERIOD_MS).await;
    }
}

#[embassy_executor::task]
pub async fn climate_task(i2c: SharedI2c, store: &'static FrameStore) {
    let mut sensor = Aht10::new(i2c, AHT10_ADDRESS);

    match sensor.init().await {
        Ok(()) => info!("Climate: AHT10 ready"),
        Err(e) => warn!("Climate: AHT10 init failed ({}), retrying on read", e),
    }

    climate_logic(sensor, store).await
}
