//! Verbindungs-Zustandsautomat des MQTT-Clients
//!
//! ```text
//!            maintain() + Backoff abgelaufen
//! DISCONNECTED ──────────────────────────────► CONNECTING
//!      ▲  ▲                                      │    │
//!      │  └── Ablehnung / Watchdog / Sync-Fehler ┘    │ Accepted
//!      │                                              ▼
//!      └──────── Publish-Fehler / Disconnect ─── CONNECTED
//! ```
//!
//! Der Automat gehört exklusiv dem steuernden Task. Der Netzwerk-Kontext
//! meldet Ereignisse nur über [`LinkEvents`], Transport-Aufrufe laufen über
//! das [`BrokerLink`] Trait.

use core::fmt::Write;

use heapless::String;

use crate::link::{ATTEMPT_MASK, ConnectStatus, InboundCommand, LinkEvents};

/// Maximale Topic-Länge für Telemetrie/Kommando-Topics
pub const TOPIC_CAPACITY: usize = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// MQTT Quality of Service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    /// Fire and forget, kein ACK
    AtMostOnce,
    /// PUBACK wird abgewartet
    AtLeastOnce,
}

/// Zeitkonstanten des Clients (Millisekunden)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTiming {
    /// Mindestabstand zwischen zwei Verbindungsversuchen
    pub backoff_ms: u64,
    /// Maximale Dauer in CONNECTING
    pub connect_watchdog_ms: u64,
    /// Maximale Wartezeit auf PUBACK
    pub ack_timeout_ms: u64,
    /// Poll-Intervall während der ACK-Wartezeit
    pub ack_poll_ms: u64,
    pub qos: QoS,
}

impl Default for ClientTiming {
    fn default() -> Self {
        Self {
            backoff_ms: 3_000,
            connect_watchdog_ms: 15_000,
            ack_timeout_ms: 2_000,
            ack_poll_ms: 10,
            qos: QoS::AtLeastOnce,
        }
    }
}

/// Sofort-Fehler eines Transport-Aufrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Anfrage-Queue voll
    Busy,
    /// Keine Session (Socket zu)
    NotReady,
    /// Stack hat die Anfrage abgelehnt (z.B. Puffer zu klein)
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    NotConnected,
    Rejected(LinkError),
    Nack,
    AckTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// Sequenz wurde bereits veröffentlicht
    Skipped,
}

/// Transport-Schnittstelle zum Broker
///
/// Alle Methoden kehren sofort zurück. Ergebnisse (CONNACK, SUBACK, PUBACK)
/// kommen asynchron über [`LinkEvents`].
pub trait BrokerLink {
    /// Startet Versuch Nummer `attempt`. Verbindungsstatus und Disconnect
    /// dieses Versuchs werden mit derselben Nummer gemeldet.
    fn connect(&mut self, attempt: u32) -> Result<(), LinkError>;
    fn subscribe(&mut self, topic: &str) -> Result<(), LinkError>;
    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), LinkError>;
    fn disconnect(&mut self);
}

/// Monotone Zeitquelle
#[allow(async_fn_in_trait)]
pub trait Clock {
    fn now_ms(&self) -> u64;
    async fn sleep_ms(&self, ms: u64);
}

/// Telemetrie- und Kommando-Topic eines Geräts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    telemetry: String<TOPIC_CAPACITY>,
    command: String<TOPIC_CAPACITY>,
}

impl Topics {
    /// `<prefix>/<device>/telemetry` und `<prefix>/<device>/cmd`
    pub fn new(prefix: &str, device: &str) -> Result<Self, core::fmt::Error> {
        let mut telemetry = String::new();
        write!(telemetry, "{}/{}/telemetry", prefix, device)?;
        let mut command = String::new();
        write!(command, "{}/{}/cmd", prefix, device)?;
        Ok(Self { telemetry, command })
    }

    pub fn telemetry(&self) -> &str {
        &self.telemetry
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

/// MQTT-Client: Zustandsautomat + Publish-Deduplizierung
pub struct NetworkClient<'a, L: BrokerLink> {
    link: L,
    events: &'a LinkEvents,
    topics: Topics,
    timing: ClientTiming,
    state: ConnectionState,
    needs_subscribe: bool,
    subscribe_in_flight: bool,
    last_attempt_ms: Option<u64>,
    connect_started_ms: u64,
    /// Nummer des aktuellen Versuchs, Ergebnisse anderer Versuche sind veraltet
    attempt: u32,
    /// 0 = noch nichts veröffentlicht (erste Sequenz ist 1)
    last_published_seq: u32,
    watchdog_expirations: u32,
}

impl<'a, L: BrokerLink> NetworkClient<'a, L> {
    pub fn new(link: L, events: &'a LinkEvents, topics: Topics, timing: ClientTiming) -> Self {
        Self {
            link,
            events,
            topics,
            timing,
            state: ConnectionState::Disconnected,
            needs_subscribe: false,
            subscribe_in_flight: false,
            last_attempt_ms: None,
            connect_started_ms: 0,
            attempt: 0,
            last_published_seq: 0,
            watchdog_expirations: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn needs_subscribe(&self) -> bool {
        self.needs_subscribe
    }

    pub fn last_published_sequence(&self) -> u32 {
        self.last_published_seq
    }

    pub fn last_attempt_ms(&self) -> Option<u64> {
        self.last_attempt_ms
    }

    /// Nummer des zuletzt gestarteten Verbindungsversuchs
    pub fn connect_attempt(&self) -> u32 {
        self.attempt
    }

    pub fn watchdog_expirations(&self) -> u32 {
        self.watchdog_expirations
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Übernimmt Callback-Ereignisse (einmal pro Schleifendurchlauf)
    ///
    /// Ereignisse werden nur im passenden Zustand ausgewertet. Ergebnisse
    /// eines aufgegebenen Versuchs werden verworfen.
    pub fn poll_events(&mut self) {
        let disconnected = self.events.take_disconnected() == Some(self.attempt);
        let result = match self.events.take_connect_result() {
            Some((attempt, status)) if attempt == self.attempt => Some(status),
            Some((attempt, status)) => {
                debug!("MQTT: ignoring {} from abandoned attempt {}", status, attempt);
                None
            }
            None => None,
        };

        match self.state {
            ConnectionState::Connecting => {
                if let Some(status) = result {
                    let accepted = status == ConnectStatus::Accepted;
                    info!("MQTT: connection status {}, connected={}", status, accepted);
                    if accepted {
                        self.state = ConnectionState::Connected;
                        self.needs_subscribe = true;
                        self.subscribe_in_flight = false;
                    } else {
                        self.state = ConnectionState::Disconnected;
                    }
                } else if disconnected {
                    warn!("MQTT: connection closed while connecting");
                    self.state = ConnectionState::Disconnected;
                }
            }
            ConnectionState::Connected => {
                if disconnected {
                    warn!("MQTT: disconnected by peer");
                    self.mark_disconnected();
                    return;
                }

                if self.subscribe_in_flight {
                    match self.events.take_subscribe_result() {
                        Some(true) => {
                            info!("MQTT: subscribed to {}", self.topics.command());
                            self.subscribe_in_flight = false;
                            self.needs_subscribe = false;
                        }
                        Some(false) => {
                            warn!("MQTT: subscribe rejected, retrying");
                            self.subscribe_in_flight = false;
                        }
                        None => {}
                    }
                }
            }
            ConnectionState::Disconnected => {}
        }
    }

    /// Verbindungspflege: Watchdog, Reconnect mit Backoff, Subscribe
    ///
    /// Gibt `true` zurück wenn die Verbindung steht.
    pub fn maintain(&mut self, now_ms: u64) -> bool {
        match self.state {
            ConnectionState::Connecting => {
                if now_ms.saturating_sub(self.connect_started_ms) >= self.timing.connect_watchdog_ms {
                    warn!("MQTT: connect watchdog expired, resetting");
                    self.watchdog_expirations = self.watchdog_expirations.saturating_add(1);
                    self.state = ConnectionState::Disconnected;
                    self.link.disconnect();
                }
            }
            ConnectionState::Disconnected => {
                let due = match self.last_attempt_ms {
                    None => true,
                    Some(last) => now_ms.saturating_sub(last) >= self.timing.backoff_ms,
                };
                if due {
                    self.start_connect(now_ms);
                }
            }
            ConnectionState::Connected => {
                if self.needs_subscribe && !self.subscribe_in_flight {
                    self.ensure_subscribed();
                }
            }
        }

        self.is_connected()
    }

    fn start_connect(&mut self, now_ms: u64) {
        self.events.reset_session();
        self.attempt = self.attempt.wrapping_add(1) & ATTEMPT_MASK;
        self.last_attempt_ms = Some(now_ms);
        self.needs_subscribe = false;
        self.subscribe_in_flight = false;

        match self.link.connect(self.attempt) {
            Ok(()) => {
                info!("MQTT: connecting (attempt {})...", self.attempt);
                self.state = ConnectionState::Connecting;
                self.connect_started_ms = now_ms;
            }
            Err(e) => {
                warn!("MQTT: connect failed immediately: {}", e);
                self.state = ConnectionState::Disconnected;
            }
        }
    }

    /// Subscribe auf das Kommando-Topic
    ///
    /// `needs_subscribe` bleibt gesetzt bis der Broker bestätigt.
    pub fn ensure_subscribed(&mut self) {
        if self.state != ConnectionState::Connected || !self.needs_subscribe {
            return;
        }

        match self.link.subscribe(self.topics.command()) {
            Ok(()) => self.subscribe_in_flight = true,
            Err(e) => warn!("MQTT: subscribe failed: {}, retrying", e),
        }
    }

    /// Holt ein fertig empfangenes Kommando ab
    pub fn take_command(&mut self) -> Option<InboundCommand> {
        self.events.take_command()
    }

    /// Veröffentlicht einen kodierten Frame
    ///
    /// Gleiche Sequenz wie beim letzten Erfolg wird übersprungen. Bei QoS 1
    /// wird im Task (nicht im Callback) bis `ack_timeout_ms` auf PUBACK gewartet.
    /// Jeder Fehler führt nach DISCONNECTED.
    pub async fn publish_frame<C: Clock>(
        &mut self,
        sequence: u32,
        payload: &[u8],
        clock: &C,
    ) -> Result<PublishOutcome, PublishError> {
        if self.state != ConnectionState::Connected {
            return Err(PublishError::NotConnected);
        }
        if sequence == self.last_published_seq {
            return Ok(PublishOutcome::Skipped);
        }

        self.events.arm_publish();
        let qos = self.timing.qos;

        if let Err(e) = self.link.publish(self.topics.telemetry(), payload, qos) {
            warn!("MQTT: publish rejected: {}", e);
            self.fail_publish(clock.now_ms());
            return Err(PublishError::Rejected(e));
        }

        if qos == QoS::AtLeastOnce {
            let start = clock.now_ms();
            loop {
                match self.events.take_publish_result() {
                    Some(true) => break,
                    Some(false) => {
                        warn!("MQTT: publish nack (seq={})", sequence);
                        self.fail_publish(clock.now_ms());
                        return Err(PublishError::Nack);
                    }
                    None => {}
                }

                let now = clock.now_ms();
                if now.saturating_sub(start) >= self.timing.ack_timeout_ms {
                    warn!("MQTT: publish ack timeout (seq={})", sequence);
                    self.fail_publish(now);
                    return Err(PublishError::AckTimeout);
                }
                clock.sleep_ms(self.timing.ack_poll_ms).await;
            }
        }

        self.last_published_seq = sequence;
        debug!("MQTT: published seq={}", sequence);
        Ok(PublishOutcome::Published)
    }

    /// Nach Publish-Fehler: zurück nach DISCONNECTED, Backoff ab jetzt
    fn fail_publish(&mut self, now_ms: u64) {
        self.mark_disconnected();
        self.last_attempt_ms = Some(now_ms);
        self.link.disconnect();
    }

    fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.needs_subscribe = false;
        self.subscribe_in_flight = false;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectionState {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            ConnectionState::Disconnected => defmt::write!(fmt, "DISCONNECTED"),
            ConnectionState::Connecting => defmt::write!(fmt, "CONNECTING"),
            ConnectionState::Connected => defmt::write!(fmt, "CONNECTED"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LinkError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            LinkError::Busy => defmt::write!(fmt, "busy"),
            LinkError::NotReady => defmt::write!(fmt, "not ready"),
            LinkError::Rejected => defmt::write!(fmt, "rejected"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PublishError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            PublishError::NotConnected => defmt::write!(fmt, "not connected"),
            PublishError::Rejected(e) => defmt::write!(fmt, "rejected ({})", e),
            PublishError::Nack => defmt::write!(fmt, "nack"),
            PublishError::AckTimeout => defmt::write!(fmt, "ack timeout"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullLink;

    impl BrokerLink for NullLink {
        fn connect(&mut self, _attempt: u32) -> Result<(), LinkError> {
            Ok(())
        }
        fn subscribe(&mut self, _topic: &str) -> Result<(), LinkError> {
            Ok(())
        }
        fn publish(&mut self, _topic: &str, _payload: &[u8], _qos: QoS) -> Result<(), LinkError> {
            Ok(())
        }
        fn disconnect(&mut self) {}
    }

    fn topics() -> Topics {
        Topics::new("embarcatech", "abc123").unwrap()
    }

    #[test]
    fn test_topics_layout() {
        let topics = topics();
        assert_eq!(topics.telemetry(), "embarcatech/abc123/telemetry");
        assert_eq!(topics.command(), "embarcatech/abc123/cmd");
    }

    #[test]
    fn test_topic_too_long_is_error() {
        let device = [b'x'; 120];
        let device = core::str::from_utf8(&device).unwrap();
        assert!(Topics::new("p", device).is_err());
    }

    #[test]
    fn test_first_connect_is_immediate() {
        let events = LinkEvents::new();
        let mut client = NetworkClient::new(NullLink, &events, topics(), ClientTiming::default());
        client.maintain(0);
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_stale_connack_ignored_when_disconnected() {
        let events = LinkEvents::new();
        let mut client = NetworkClient::new(NullLink, &events, topics(), ClientTiming::default());
        events.on_connection_status(0, ConnectStatus::Accepted);
        client.poll_events();
        assert_eq!(client.state(), ConnectionState::Disconnected);

        // reset_session vor dem Verbindungsaufbau verwirft das alte Ereignis
        client.maintain(0);
        client.poll_events();
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_result_of_other_attempt_is_ignored() {
        let events = LinkEvents::new();
        let mut client = NetworkClient::new(NullLink, &events, topics(), ClientTiming::default());
        client.maintain(0);
        assert_eq!(client.connect_attempt(), 1);

        events.on_connection_status(2, ConnectStatus::Accepted);
        events.on_disconnected(0);
        client.poll_events();
        assert_eq!(client.state(), ConnectionState::Connecting);

        events.on_connection_status(1, ConnectStatus::Accepted);
        client.poll_events();
        assert_eq!(client.state(), ConnectionState::Connected);
    }
}
