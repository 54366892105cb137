// Sensor-Treiber am gemeinsamen I2C-Bus
//
// Jeder Treiber besitzt ein `I2cDevice`: der Bus wird pro Transaktion
// gesperrt, Wartezeiten (AHT10-Messung) laufen ohne Lock.

use embassy_time::Timer;
use embedded_hal_async::i2c::I2c;
use esp_core::logic::{aht10_decode, bh1750_lux_from_raw};
use esp_core::{ClimateReading, ClimateSensor, LightSensor, SensorError};

use crate::config::AHT10_MEASURE_DELAY_MS;

// BH1750 Opcodes
const BH1750_POWER_ON: u8 = 0x01;
const BH1750_CONTINUOUS_HIGH_RES: u8 = 0x10;

// AHT10 Kommandos
const AHT10_INIT: [u8; 3] = [0xE1, 0x08, 0x00];
const AHT10_TRIGGER: [u8; 3] = [0xAC, 0x33, 0x00];
const AHT10_INIT_DELAY_MS: u64 = 20;

/// BH1750 Umgebungslicht-Sensor
pub struct Bh1750<I> {
    i2c: I,
    address: u8,
    initialized: bool,
}

impl<I: I2c> Bh1750<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            i2c,
            address,
            initialized: false,
        }
    }

    /// Einschalten und Dauermessung (1 lx Auflösung) starten
    pub async fn init(&mut self) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[BH1750_POWER_ON])
            .await
            .map_err(|_| SensorError::Bus)?;
        self.i2c
            .write(self.address, &[BH1750_CONTINUOUS_HIGH_RES])
            .await
            .map_err(|_| SensorError::Bus)?;
        self.initialized = true;
        Ok(())
    }
}

impl<I: I2c> LightSensor for Bh1750<I> {
    async fn read_lux(&mut self) -> Result<f32, SensorError> {
        if !self.initialized {
            // Sensor war beim Start evtl. nicht erreichbar: erneut versuchen
            self.init().await?;
        }

        let mut raw = [0u8; 2];
        self.i2c
            .read(self.address, &mut raw)
            .await
            .map_err(|_| SensorError::Bus)?;
        Ok(bh1750_lux_from_raw(raw))
    }
}

/// AHT10 Temperatur-/Feuchte-Sensor
pub struct Aht10<I> {
    i2c: I,
    address: u8,
    initialized: bool,
}

impl<I: I2c> Aht10<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            i2c,
            address,
            initialized: false,
        }
    }

    /// Kalibrierung laden
    pub async fn init(&mut self) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &AHT10_INIT)
            .await
            .map_err(|_| SensorError::Bus)?;
        Timer::after_millis(AHT10_INIT_DELAY_MS).await;
        self.initialized = true;
        Ok(())
    }
}

impl<I: I2c> ClimateSensor for Aht10<I> {
    async fn read(&mut self) -> Result<ClimateReading, SensorError> {
        if !self.initialized {
            // Wie beim BH1750: Init beim nächsten Lesen wiederholen
            self.init().await?;
        }

        self.i2c
            .write(self.address, &AHT10_TRIGGER)
            .await
            .map_err(|_| SensorError::Bus)?;

        // Bus ist hier frei
        Timer::after_millis(AHT10_MEASURE_DELAY_MS).await;

        let mut frame = [0u8; 6];
        self.i2c
            .read(self.address, &mut frame)
            .await
            .map_err(|_| SensorError::Bus)?;
        aht10_decode(frame)
    }
}
