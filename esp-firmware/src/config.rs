// Projekt-Konfiguration: Konstanten, Perioden und Hardware-Zuordnungen
#![allow(dead_code)]

// ============================================================================
// Hardware: Pins
// ============================================================================

/// GPIO-Pin für die Datenleitung der WS2812 5x5 Matrix
pub const MATRIX_GPIO_PIN: u8 = 10;

/// Anzahl der LEDs in der Matrix (5x5)
pub const LED_COUNT: usize = 25;

/// RMT Taktfrequenz in MHz
/// 80 MHz ist optimal für WS2812 LED-Timing
pub const RMT_CLOCK_MHZ: u32 = 80;

/// I2C0: BH1750 (0x23), AHT10 (0x38) und SSD1306 (0x3C) am selben Bus
pub const I2C_SDA_PIN: u8 = 6;
pub const I2C_SCL_PIN: u8 = 7;

/// I2C Taktfrequenz in kHz
pub const I2C_FREQUENCY_KHZ: u32 = 400;

/// UART1 für das serielle Zeilen-Protokoll (USB-JTAG ist vom Logging belegt)
pub const SERIAL_TX_PIN: u8 = 4;
pub const SERIAL_RX_PIN: u8 = 5;
pub const SERIAL_BAUDRATE: u32 = 115_200;

// ============================================================================
// Sensoren & Perioden
// ============================================================================

/// I2C-Adresse BH1750 (ADDR-Pin auf GND)
pub const BH1750_ADDRESS: u8 = 0x23;

/// I2C-Adresse AHT10
pub const AHT10_ADDRESS: u8 = 0x38;

/// I2C-Adresse SSD1306
pub const SSD1306_ADDRESS: u8 = 0x3C;

/// Wartezeit zwischen AHT10-Trigger und Auslesen (Datenblatt: >75 ms)
pub const AHT10_MEASURE_DELAY_MS: u64 = 80;

/// Abtast- und Regelperiode des Lichtsensors
pub const LIGHT_PERIOD_MS: u64 = 100;

/// Periode der Temperatur-/Feuchtemessung
pub const CLIMATE_PERIOD_MS: u64 = 2_000;

/// Pause nach jedem Display-Frame
pub const DISPLAY_PERIOD_MS: u64 = 200;

/// Anzeigedauer des Boot-Splash
pub const DISPLAY_SPLASH_MS: u64 = 30;

/// Periode der seriellen Telemetrie
pub const SERIAL_TELEMETRY_PERIOD_MS: u64 = 200;

// ============================================================================
// Helligkeit (Auto-Modus)
// ============================================================================

pub const LUX_MIN: f32 = 150.0;
pub const LUX_MAX: f32 = 400.0;
pub const BRIGHTNESS_MIN_PERCENT: u8 = 0;
pub const BRIGHTNESS_MAX_PERCENT: u8 = 100;

/// EMA-Glättung des Umgebungslichts
pub const LUX_EMA_ALPHA: f32 = 0.25;

// ============================================================================
// WiFi Konfiguration
// ============================================================================

/// WiFi SSID (Netzwerk-Name)
/// Wird zur Build-Zeit aus der Environment Variable WIFI_SSID geladen
pub const WIFI_SSID: &str = env!(
    "WIFI_SSID",
    "WiFi SSID nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

/// WiFi Passwort
/// Wird zur Build-Zeit aus der Environment Variable WIFI_PASSWORD geladen
pub const WIFI_PASSWORD: &str = env!(
    "WIFI_PASSWORD",
    "WiFi Password nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

/// Wartezeit nach WiFi-Fehler vor erneutem Versuch
pub const WIFI_RETRY_DELAY_SECS: u64 = 5;

/// Heap-Größe für WiFi (Bytes)
pub const WIFI_HEAP_SIZE: usize = 65536; // 64 KB

/// Zusätzliche Heap-Größe (Bytes)
pub const EXTRA_HEAP_SIZE: usize = 36864; // 36 KB

// ============================================================================
// MQTT Konfiguration
// ============================================================================

/// MQTT Broker Hostname oder IP-Adresse
/// Wird zur Build-Zeit aus der Environment Variable MQTT_BROKER geladen
pub const MQTT_BROKER: &str = env!(
    "MQTT_BROKER",
    "MQTT Broker nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

/// MQTT Broker Port (1883 unverschlüsselt)
pub const MQTT_PORT: u16 = 1883;

/// Topic-Präfix: `<prefix>/<device>/telemetry` und `<prefix>/<device>/cmd`
pub const MQTT_TOPIC_PREFIX: &str = match option_env!("MQTT_TOPIC_PREFIX") {
    Some(prefix) => prefix,
    None => "embarcatech",
};

/// Keepalive in Sekunden
pub const MQTT_KEEPALIVE_SECS: u16 = 30;

/// Mindestabstand zwischen Verbindungsversuchen
pub const MQTT_BACKOFF_MS: u64 = 3_000;

/// Maximale Dauer eines Verbindungsaufbaus
pub const MQTT_CONNECT_WATCHDOG_MS: u64 = 15_000;

/// Maximale Wartezeit auf PUBACK
pub const MQTT_ACK_TIMEOUT_MS: u64 = 2_000;

/// Maximale Wartezeit des Treiber-Tasks auf einen neuen Frame
pub const MQTT_FRAME_WAIT_MS: u64 = 500;

/// Poll-Intervall solange keine Verbindung besteht
pub const MQTT_IDLE_POLL_MS: u64 = 200;

/// Pause nach einem fehlgeschlagenen Publish
pub const MQTT_PUBLISH_FAILURE_PAUSE_MS: u64 = 300;

/// MQTT Buffer-Größe in Bytes
pub const MQTT_BUFFER_SIZE: usize = 1024;

/// TCP Socket Buffer-Größe in Bytes (RX und TX)
pub const MQTT_SOCKET_BUFFER_SIZE: usize = 2048;

/// TCP Connect-Timeout in Sekunden
pub const MQTT_TCP_TIMEOUT_SECS: u64 = 10;

/// DNS Query Timeout in Sekunden
pub const DNS_TIMEOUT_SECS: u64 = 5;

/// Puffer für einen kodierten Telemetrie-Payload
pub const TELEMETRY_BUFFER_SIZE: usize = 256;

// ============================================================================
// Identität & Zugang
// ============================================================================

/// Feste Device-ID, sonst wird die Factory-MAC (hex) verwendet
pub const DEVICE_ID_OVERRIDE: Option<&str> = option_env!("DEVICE_ID");

/// Passwort für das serielle Protokoll
pub const SERIAL_ACCESS_PASSWORD: &str = match option_env!("SERIAL_ACCESS_PASSWORD") {
    Some(password) => password,
    None => "embarcatech",
};

/// Puffer für eine ausgehende serielle Zeile
pub const SERIAL_LINE_BUFFER_SIZE: usize = 384;
