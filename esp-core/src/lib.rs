//! ESP Core - Platform-agnostic Logic and Traits
//!
//! Diese Crate enthält KEINE Hardware-Dependencies.
//! Sie definiert Traits, Zustandsautomaten und Pure Functions für den
//! Telemetrie-Knoten und läuft unverändert auf dem Host (Tests) und dem ESP32.

#![no_std]

// Muss vor allen anderen Modulen stehen, damit die Log-Makros sichtbar sind
#[macro_use]
mod fmt;

pub mod brightness;
pub mod command;
pub mod connection;
pub mod link;
pub mod logic;
pub mod mailbox;
pub mod pipeline;
#[cfg(feature = "serde")]
pub mod protocol;
pub mod session;
pub mod traits;
pub mod types;

// Re-exports für einfachen Zugriff
pub use brightness::{BrightnessConfig, BrightnessController, EmaFilter, SharedBrightness};
pub use command::decode_command;
pub use connection::{
    BrokerLink, ClientTiming, Clock, ConnectionState, LinkError, NetworkClient, PublishError,
    PublishOutcome, QoS, Topics,
};
pub use link::{ConnectStatus, InboundCommand, LinkEvents};
pub use logic::{matrix_drive_color, percent_from_drive_color};
pub use mailbox::{FrameStore, Mailbox, SensorSignal};
pub use pipeline::{Aggregator, ClimateStage, LightStage, render_frame, render_splash};
pub use session::{LineAssembler, SerialSession, SessionReply};
pub use traits::{
    ClimateSensor, DetachedMatrix, DisplayError, LedError, LightSensor, SensorError, SmartLedWriter, TextDisplay,
};
pub use types::{BrightnessCommand, BrightnessMode, BrightnessState, ClimateReading, TelemetryFrame};
