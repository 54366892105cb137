//! Zellen zwischen Netzwerk-Callback-Kontext und steuerndem Task
//!
//! Der Netzwerk-Stack ruft die `on_*` Methoden aus seinem eigenen Kontext auf.
//! Diese blockieren nie: nur Atomics und kurze Critical Sections.
//! Der steuernde Task (`NetworkClient`) pollt die `take_*` Methoden einmal pro
//! Schleifendurchlauf. Ein Durchlauf Verzögerung ist erwartet.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::{String, Vec};

/// Maximale Topic-Länge eines eingehenden Kommandos (Bytes)
pub const INBOUND_TOPIC_CAPACITY: usize = 95;

/// Maximale Payload-Länge eines eingehenden Kommandos (Bytes)
pub const INBOUND_PAYLOAD_CAPACITY: usize = 255;

/// Nummer eines Verbindungsversuchs (24 Bit, läuft über)
pub const ATTEMPT_MASK: u32 = 0x00FF_FFFF;

/// Ergebnis eines Verbindungsversuchs, gemeldet vom Callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    /// Broker hat CONNECT akzeptiert
    Accepted,
    /// Broker hat abgelehnt (CONNACK mit Fehlercode)
    Refused,
    /// DNS oder TCP fehlgeschlagen
    Unreachable,
    /// Keine Antwort innerhalb der Transport-Timeouts
    Timeout,
}

impl ConnectStatus {
    fn to_code(self) -> u8 {
        match self {
            ConnectStatus::Accepted => 1,
            ConnectStatus::Refused => 2,
            ConnectStatus::Unreachable => 3,
            ConnectStatus::Timeout => 4,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ConnectStatus::Accepted),
            2 => Some(ConnectStatus::Refused),
            3 => Some(ConnectStatus::Unreachable),
            4 => Some(ConnectStatus::Timeout),
            _ => None,
        }
    }
}

const NO_RESULT: u8 = 0;
const RESULT_OK: u8 = 1;
const RESULT_FAILED: u8 = 2;

fn result_code(ok: bool) -> u8 {
    if ok { RESULT_OK } else { RESULT_FAILED }
}

/// Versuchsnummer und Code in einem Wort, damit beide zusammen sichtbar werden
fn tag(attempt: u32, code: u8) -> u32 {
    ((attempt & ATTEMPT_MASK) << 8) | code as u32
}

fn untag(word: u32) -> (u32, u8) {
    (word >> 8, (word & 0xFF) as u8)
}

fn take_result(cell: &AtomicU8) -> Option<bool> {
    match cell.swap(NO_RESULT, Ordering::AcqRel) {
        RESULT_OK => Some(true),
        RESULT_FAILED => Some(false),
        _ => None,
    }
}

/// Fertig empfangenes Kommando (Kopie, gehört dem Task)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    pub topic: String<INBOUND_TOPIC_CAPACITY>,
    pub payload: String<INBOUND_PAYLOAD_CAPACITY>,
}

/// Reassembly-Puffer, nur unter Critical Section verändert
struct InboundBuffer {
    topic: String<INBOUND_TOPIC_CAPACITY>,
    payload: Vec<u8, INBOUND_PAYLOAD_CAPACITY>,
    receiving: bool,
    ready: bool,
}

impl InboundBuffer {
    const fn new() -> Self {
        Self {
            topic: String::new(),
            payload: Vec::new(),
            receiving: false,
            ready: false,
        }
    }
}

/// Geteilte Event-Zellen einer Broker-Verbindung
pub struct LinkEvents {
    connect_result: AtomicU32,
    last_status: AtomicU8,
    disconnected: AtomicU32,
    publish_result: AtomicU8,
    subscribe_result: AtomicU8,
    inbound: Mutex<CriticalSectionRawMutex, RefCell<InboundBuffer>>,
    dropped: AtomicU32,
}

impl LinkEvents {
    pub const fn new() -> Self {
        Self {
            connect_result: AtomicU32::new(0),
            last_status: AtomicU8::new(0),
            disconnected: AtomicU32::new(0),
            publish_result: AtomicU8::new(NO_RESULT),
            subscribe_result: AtomicU8::new(NO_RESULT),
            inbound: Mutex::new(RefCell::new(InboundBuffer::new())),
            dropped: AtomicU32::new(0),
        }
    }

    // ------------------------------------------------------------------------
    // Callback-Kontext
    // ------------------------------------------------------------------------

    /// Verbindungs-Callback (CONNACK oder Abbruch während des Aufbaus)
    ///
    /// `attempt` ist die Nummer, die mit `BrokerLink::connect` übergeben wurde.
    pub fn on_connection_status(&self, attempt: u32, status: ConnectStatus) {
        self.last_status.store(status.to_code(), Ordering::Relaxed);
        self.connect_result
            .store(tag(attempt, status.to_code()), Ordering::Release);
    }

    /// Session des Versuchs `attempt` wurde beendet (Socket zu, Protokollfehler)
    pub fn on_disconnected(&self, attempt: u32) {
        self.disconnected.store(tag(attempt, 1), Ordering::Release);
    }

    /// PUBACK (oder Sendefehler) für den laufenden Publish
    pub fn on_publish_complete(&self, ok: bool) {
        self.publish_result.store(result_code(ok), Ordering::Release);
    }

    /// SUBACK (oder Fehler) für den laufenden Subscribe
    pub fn on_subscribe_complete(&self, ok: bool) {
        self.subscribe_result.store(result_code(ok), Ordering::Release);
    }

    /// Beginn einer eingehenden Nachricht
    ///
    /// Gibt `false` zurück (und verwirft die Nachricht), wenn das vorherige
    /// Kommando noch nicht abgeholt wurde.
    pub fn on_incoming_publish(&self, topic: &str) -> bool {
        let accepted = self.inbound.lock(|cell| {
            let mut buf = cell.borrow_mut();
            if buf.ready {
                buf.receiving = false;
                return false;
            }
            buf.topic.clear();
            for ch in topic.chars() {
                if buf.topic.push(ch).is_err() {
                    break;
                }
            }
            buf.payload.clear();
            buf.receiving = true;
            true
        });

        if !accepted {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        accepted
    }

    /// Daten-Fragment einer eingehenden Nachricht
    ///
    /// Über die Kapazität hinaus wird abgeschnitten. `ready` wird erst mit dem
    /// letzten Fragment gesetzt.
    pub fn on_incoming_data(&self, data: &[u8], last: bool) {
        self.inbound.lock(|cell| {
            let mut buf = cell.borrow_mut();
            if buf.ready || !buf.receiving {
                return;
            }

            let room = buf.payload.capacity() - buf.payload.len();
            let n = data.len().min(room);
            let _ = buf.payload.extend_from_slice(&data[..n]);

            if last {
                buf.receiving = false;
                buf.ready = true;
            }
        });
    }

    // ------------------------------------------------------------------------
    // Task-Kontext
    // ------------------------------------------------------------------------

    /// Verwirft alle Verbindungs-Events (vor einem neuen Verbindungsversuch)
    pub fn reset_session(&self) {
        self.connect_result.store(0, Ordering::Release);
        self.disconnected.store(0, Ordering::Release);
        self.publish_result.store(NO_RESULT, Ordering::Release);
        self.subscribe_result.store(NO_RESULT, Ordering::Release);
    }

    /// Holt das Verbindungsergebnis samt Versuchsnummer ab
    pub fn take_connect_result(&self) -> Option<(u32, ConnectStatus)> {
        let (attempt, code) = untag(self.connect_result.swap(0, Ordering::AcqRel));
        ConnectStatus::from_code(code).map(|status| (attempt, status))
    }

    /// Zuletzt gemeldeter Status (bleibt stehen, nur für Logging)
    pub fn last_status(&self) -> Option<ConnectStatus> {
        ConnectStatus::from_code(self.last_status.load(Ordering::Relaxed))
    }

    /// Versuchsnummer der beendeten Session, falls gemeldet
    pub fn take_disconnected(&self) -> Option<u32> {
        match untag(self.disconnected.swap(0, Ordering::AcqRel)) {
            (attempt, 1) => Some(attempt),
            _ => None,
        }
    }

    /// Vor einem Publish aufrufen, damit kein altes ACK gezählt wird
    pub fn arm_publish(&self) {
        self.publish_result.store(NO_RESULT, Ordering::Release);
    }

    pub fn take_publish_result(&self) -> Option<bool> {
        take_result(&self.publish_result)
    }

    pub fn take_subscribe_result(&self) -> Option<bool> {
        take_result(&self.subscribe_result)
    }

    pub fn has_pending_command(&self) -> bool {
        self.inbound.lock(|cell| cell.borrow().ready)
    }

    /// Holt das fertige Kommando ab und gibt den Slot wieder frei
    pub fn take_command(&self) -> Option<InboundCommand> {
        self.inbound.lock(|cell| {
            let mut buf = cell.borrow_mut();
            if !buf.ready {
                return None;
            }

            let text = match core::str::from_utf8(&buf.payload) {
                Ok(text) => text,
                // Abgeschnittenes UTF-8: nur den gültigen Anfang übernehmen
                Err(e) => core::str::from_utf8(&buf.payload[..e.valid_up_to()]).unwrap_or(""),
            };

            let mut payload = String::new();
            let _ = payload.push_str(text);
            let command = InboundCommand {
                topic: buf.topic.clone(),
                payload,
            };

            buf.ready = false;
            buf.payload.clear();
            Some(command)
        })
    }

    /// Anzahl verworfener Nachrichten (Slot war belegt)
    pub fn dropped_commands(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for LinkEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectStatus {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            ConnectStatus::Accepted => defmt::write!(fmt, "accepted"),
            ConnectStatus::Refused => defmt::write!(fmt, "refused"),
            ConnectStatus::Unreachable => defmt::write!(fmt, "unreachable"),
            ConnectStatus::Timeout => defmt::write!(fmt, "timeout"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments_are_reassembled() {
        let events = LinkEvents::new();
        assert!(events.on_incoming_publish("dev/cmd"));
        events.on_incoming_data(br#"{"mode":"#, false);
        assert!(!events.has_pending_command());
        events.on_incoming_data(br#""auto"}"#, true);

        let command = events.take_command().unwrap();
        assert_eq!(command.topic.as_str(), "dev/cmd");
        assert_eq!(command.payload.as_str(), r#"{"mode":"auto"}"#);
        assert!(events.take_command().is_none());
    }

    #[test]
    fn test_second_message_dropped_while_pending() {
        let events = LinkEvents::new();
        events.on_incoming_publish("a");
        events.on_incoming_data(b"first", true);

        assert!(!events.on_incoming_publish("b"));
        events.on_incoming_data(b"second", true);

        assert_eq!(events.take_command().unwrap().payload.as_str(), "first");
        assert_eq!(events.dropped_commands(), 1);
    }

    #[test]
    fn test_payload_truncated_at_capacity() {
        let events = LinkEvents::new();
        events.on_incoming_publish("t");
        events.on_incoming_data(&[b'x'; 200], false);
        events.on_incoming_data(&[b'y'; 200], true);

        let command = events.take_command().unwrap();
        assert_eq!(command.payload.len(), INBOUND_PAYLOAD_CAPACITY);
    }

    #[test]
    fn test_connect_result_carries_attempt() {
        let events = LinkEvents::new();
        events.on_connection_status(7, ConnectStatus::Refused);
        assert_eq!(events.take_connect_result(), Some((7, ConnectStatus::Refused)));
        assert_eq!(events.take_connect_result(), None);

        // Nummern über 24 Bit laufen über
        events.on_disconnected(ATTEMPT_MASK + 3);
        assert_eq!(events.take_disconnected(), Some(2));
        assert_eq!(events.take_disconnected(), None);
    }

    #[test]
    fn test_publish_result_is_consumed_once() {
        let events = LinkEvents::new();
        events.arm_publish();
        assert_eq!(events.take_publish_result(), None);
        events.on_publish_complete(false);
        assert_eq!(events.take_publish_result(), Some(false));
        assert_eq!(events.take_publish_result(), None);
    }
}
