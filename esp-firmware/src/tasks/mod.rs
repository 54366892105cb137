// Task-Modul: Enthält alle Embassy Tasks
//
// Jeder Task läuft asynchron und unabhängig.
// Sensoren → FrameStore → Display/Aggregator → MQTT + Serial.

pub mod climate;
pub mod display;
pub mod luminosity;
pub mod mqtt;
pub mod serial_rpc;
pub mod wifi;

// Re-export Tasks für einfachen Import
pub use climate::climate_task;
pub use display::display_task;
pub use luminosity::luminosity_task;
pub use mqtt::{MqttLink, mqtt_link_task, mqtt_task};
pub use serial_rpc::serial_rpc_task;
pub use wifi::{connection_task, dhcp_task, net_task};
