// Keine Standard-Bibliothek verwenden (Embedded System)
#![no_std]
// Kein normaler main() Einstiegspunkt (wird von esp_rtos bereitgestellt)
#![no_main]
// Verbiete mem::forget - gefährlich bei ESP HAL Types mit DMA-Buffern
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
// Verbiete große Stack-Frames (Stack ist auf Embedded Systemen begrenzt)
#![deny(clippy::large_stack_frames)]

// Heap Allocator (WiFi benötigt dynamischen Speicher)
extern crate alloc;

// Embassy Async Runtime
use embassy_embedded_hal::shared_bus::asynch::i2c::I2cDevice;
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, Stack, StackResources};
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};

// ESP32-C6 HAL
use esp_hal::clock::CpuClock;
use esp_hal::efuse::Efuse;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{Config as UartConfig, Uart};

// Backtrace bei Panic und println!() Support
use {esp_backtrace as _, esp_println as _};

use defmt::info;

// Projekt-Module und Konfiguration
use esp_core::{BrightnessConfig, BrightnessController, ClientTiming, NetworkClient, Topics};
use esp_telemetrie_knoten::config::*;
use esp_telemetrie_knoten::tasks::{
    MqttLink, climate_task, connection_task, dhcp_task, display_task, luminosity_task,
    mqtt_link_task, mqtt_task, net_task, serial_rpc_task,
};
use esp_telemetrie_knoten::{
    DeviceId, FrameSignal, FrameStore, I2cBus, LinkEvents, LinkRequestChannel, SharedBrightness,
    device_id_from_mac,
};

// ESP-IDF App Descriptor - erforderlich für den Bootloader!
esp_bootloader_esp_idf::esp_app_desc!();

// Geteilte Zustände zwischen den Tasks (alle mit const Konstruktor)
static FRAME_STORE: FrameStore = FrameStore::new();
static LINK_EVENTS: LinkEvents = LinkEvents::new();
static FRAME_READY: FrameSignal = Signal::new();
static LINK_REQUESTS: LinkRequestChannel = Channel::new();

/// Main Entry Point
///
/// Initialisiert Hardware, WiFi und geteilte Zustände, spawnt alle Tasks.
/// Fehler hier sind fatal (expect): ohne Bus, UART oder Radio läuft nichts.
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    // ESP32-C6 Konfiguration: CPU auf maximale Taktfrequenz (160 MHz)
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Heap Allocator initialisieren (WiFi braucht dynamischen Speicher!)
    esp_alloc::heap_allocator!(
        #[esp_hal::ram(reclaimed)]
        size: WIFI_HEAP_SIZE
    );
    esp_alloc::heap_allocator!(size: EXTRA_HEAP_SIZE);

    // Embassy Runtime initialisieren (Timer + Software Interrupt)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_interrupt =
        esp_hal::interrupt::software::SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_interrupt.software_interrupt0);

    // Geräte-Identität: Override aus .env oder Factory-MAC
    static DEVICE_ID: static_cell::StaticCell<DeviceId> = static_cell::StaticCell::new();
    let device_id = match DEVICE_ID_OVERRIDE {
        Some(id) => {
            let mut owned = DeviceId::new();
            owned.push_str(id).expect("DEVICE_ID too long");
            owned
        }
        None => device_id_from_mac(Efuse::mac_address()),
    };
    let device_id: &'static str = DEVICE_ID.init(device_id).as_str();
    info!("Device: {}", device_id);

    // Helligkeits-Controller (geteilt zwischen Licht-Task, MQTT und Serial)
    static BRIGHTNESS: static_cell::StaticCell<SharedBrightness> = static_cell::StaticCell::new();
    let brightness = &*BRIGHTNESS.init(SharedBrightness::new(BrightnessController::new(
        BrightnessConfig {
            lux_min: LUX_MIN,
            lux_max: LUX_MAX,
            min_percent: BRIGHTNESS_MIN_PERCENT,
            max_percent: BRIGHTNESS_MAX_PERCENT,
            alpha: LUX_EMA_ALPHA,
            update_ms: LIGHT_PERIOD_MS,
        },
    )));

    // I2C0: ein Bus für BH1750, AHT10 und SSD1306
    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(I2C_FREQUENCY_KHZ)),
    )
    .expect("i2c0 init")
    .with_sda(peripherals.GPIO6)
    .with_scl(peripherals.GPIO7)
    .into_async();
    static I2C_BUS: static_cell::StaticCell<I2cBus> = static_cell::StaticCell::new();
    let i2c_bus = &*I2C_BUS.init(Mutex::new(i2c));

    // UART1 für das serielle Protokoll
    let uart = Uart::new(
        peripherals.UART1,
        UartConfig::default().with_baudrate(SERIAL_BAUDRATE),
    )
    .expect("uart1 init")
    .with_tx(peripherals.GPIO4)
    .with_rx(peripherals.GPIO5)
    .into_async();

    // WiFi Hardware initialisieren
    static RADIO_INIT: static_cell::StaticCell<esp_radio::Controller> =
        static_cell::StaticCell::new();
    let radio_init =
        RADIO_INIT.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));

    let (wifi_controller, wifi_interface) =
        esp_radio::wifi::new(radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi");

    // Random seed für TCP/IP Stack (von Hardware RNG)
    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    // Sockets: MQTT (TCP) + DNS + DHCP + Reserve
    static RESOURCES: static_cell::StaticCell<StackResources<4>> = static_cell::StaticCell::new();
    let resources = RESOURCES.init(StackResources::new());

    let (stack, runner) = embassy_net::new(
        wifi_interface.sta,
        NetConfig::dhcpv4(Default::default()),
        resources,
        seed,
    );

    // Stack muss 'static sein für Tasks
    static STACK: static_cell::StaticCell<Stack<'static>> = static_cell::StaticCell::new();
    let stack = &*STACK.init(stack);

    // MQTT-Client: Zustandsautomat im Treiber-Task, Socket im Link-Task
    let topics = Topics::new(MQTT_TOPIC_PREFIX, device_id).expect("MQTT topic too long");
    let timing = ClientTiming {
        backoff_ms: MQTT_BACKOFF_MS,
        connect_watchdog_ms: MQTT_CONNECT_WATCHDOG_MS,
        ack_timeout_ms: MQTT_ACK_TIMEOUT_MS,
        ..ClientTiming::default()
    };
    let client = NetworkClient::new(
        MqttLink::new(LINK_REQUESTS.sender()),
        &LINK_EVENTS,
        topics,
        timing,
    );

    // Spawn Sensor- und Anzeige-Tasks
    spawner
        .spawn(luminosity_task(
            I2cDevice::new(i2c_bus),
            peripherals.GPIO10,
            peripherals.RMT,
            brightness,
            &FRAME_STORE,
        ))
        .unwrap();
    spawner
        .spawn(climate_task(I2cDevice::new(i2c_bus), &FRAME_STORE))
        .unwrap();
    spawner
        .spawn(display_task(
            I2cDevice::new(i2c_bus),
            &FRAME_STORE,
            &FRAME_READY,
        ))
        .unwrap();

    // Spawn WiFi Tasks
    spawner.spawn(connection_task(wifi_controller)).unwrap();
    spawner.spawn(net_task(runner)).unwrap();
    spawner.spawn(dhcp_task(stack)).unwrap();

    // Spawn MQTT Tasks
    spawner
        .spawn(mqtt_link_task(
            stack,
            LINK_REQUESTS.receiver(),
            &LINK_EVENTS,
            device_id,
        ))
        .unwrap();
    spawner
        .spawn(mqtt_task(
            client,
            &FRAME_STORE,
            brightness,
            &FRAME_READY,
            device_id,
        ))
        .unwrap();

    // Spawn Serial-RPC Task
    spawner
        .spawn(serial_rpc_task(uart, &FRAME_STORE, brightness, device_id))
        .unwrap();

    // Main-Loop: schläft (alle Arbeit läuft in Tasks)
    loop {
        Timer::after(Duration::from_secs(3600)).await;
    }
}
