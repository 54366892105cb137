// Wire-Format der Telemetrie (MQTT) und des seriellen Zeilen-Protokolls
// Serialisierung mit serde-json-core in einen festen Puffer, kein Heap

use serde::Serialize;

use crate::session::{SERIAL_FW_VERSION, SessionReply};
use crate::types::TelemetryFrame;

/// Puffer zu klein für die Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    BufferFull,
}

/// MQTT-Telemetrie auf `<prefix>/<device>/telemetry`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryPayload<'a> {
    pub device: &'a str,
    pub lux: f32,
    #[serde(rename = "luxPercLum")]
    pub lux_perc_lum: f32,
    pub temp: f32,
    pub hum: f32,
    pub seq: u32,
    pub t_ms: u64,
}

impl<'a> TelemetryPayload<'a> {
    pub fn from_frame(device: &'a str, frame: &TelemetryFrame) -> Self {
        Self {
            device,
            lux: frame.ambient_light,
            lux_perc_lum: frame.applied_brightness_percent,
            temp: frame.temperature,
            hum: frame.humidity,
            seq: frame.sequence,
            t_ms: frame.timestamp_ms,
        }
    }
}

/// Ausgehende Zeilen der seriellen Schnittstelle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum SerialMessage<'a> {
    Hello {
        device: &'a str,
        fw: &'a str,
        need_auth: bool,
    },
    Auth {
        ok: bool,
    },
    Err {
        msg: &'a str,
    },
    Ack {
        ok: bool,
        msg: &'a str,
    },
    Info {
        msg: &'a str,
    },
    Telemetry {
        device: &'a str,
        lux: f32,
        #[serde(rename = "luxPercLum")]
        lux_perc_lum: f32,
        temp: f32,
        hum: f32,
        seq: u32,
        t_ms: u64,
        mode: &'a str,
        target: u8,
        current: u8,
    },
}

impl<'a> SerialMessage<'a> {
    pub fn from_reply(device: &'a str, reply: &SessionReply) -> Self {
        match *reply {
            SessionReply::Hello { need_auth } => SerialMessage::Hello {
                device,
                fw: SERIAL_FW_VERSION,
                need_auth,
            },
            SessionReply::Auth { ok } => SerialMessage::Auth { ok },
            SessionReply::Ack(msg) => SerialMessage::Ack { ok: true, msg },
            SessionReply::Err(msg) => SerialMessage::Err { msg },
            SessionReply::Info(msg) => SerialMessage::Info { msg },
            SessionReply::Telemetry { frame, brightness } => SerialMessage::Telemetry {
                device,
                lux: frame.ambient_light,
                lux_perc_lum: frame.applied_brightness_percent,
                temp: frame.temperature,
                hum: frame.humidity,
                seq: frame.sequence,
                t_ms: frame.timestamp_ms,
                mode: brightness.mode.as_str(),
                target: brightness.target_percent,
                current: brightness.current_percent,
            },
        }
    }
}

fn encode<T: Serialize>(value: &T, buf: &mut [u8]) -> Result<usize, EncodeError> {
    serde_json_core::to_slice(value, buf).map_err(|_| EncodeError::BufferFull)
}

/// Kodiert einen Frame als MQTT-Payload, gibt die Länge zurück
pub fn encode_telemetry(device: &str, frame: &TelemetryFrame, buf: &mut [u8]) -> Result<usize, EncodeError> {
    encode(&TelemetryPayload::from_frame(device, frame), buf)
}

/// Kodiert eine Session-Antwort als Zeile inklusive `\n`
pub fn encode_reply_line(device: &str, reply: &SessionReply, buf: &mut [u8]) -> Result<usize, EncodeError> {
    let len = encode(&SerialMessage::from_reply(device, reply), buf)?;
    let slot = buf.get_mut(len).ok_or(EncodeError::BufferFull)?;
    *slot = b'\n';
    Ok(len + 1)
}

#[cfg(feature = "defmt")]
impl defmt::Format for EncodeError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            EncodeError::BufferFull => defmt::write!(fmt, "buffer full"),
        }
    }
}
