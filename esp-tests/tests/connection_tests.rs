//! Integration Tests für den MQTT-Verbindungsautomaten
//!
//! Der MockLink beantwortet Anfragen sofort über `LinkEvents`, so wie es der
//! Link-Task im Netzwerk-Kontext tut. Zeit kommt von der `ManualClock`.

mod common;

use common::ManualClock;
use embassy_futures::block_on;
use esp_core::{
    BrightnessConfig, BrightnessController, BrightnessMode, BrokerLink, ClientTiming, Clock,
    ConnectStatus, ConnectionState, LinkError, LinkEvents, NetworkClient, PublishError,
    PublishOutcome, QoS, SharedBrightness, Topics, decode_command,
};

// ============================================================================
// Mock Broker Link
// ============================================================================

pub struct MockLink<'a> {
    events: &'a LinkEvents,
    /// Antwort auf CONNECT (`None` = Broker schweigt)
    pub connect_reply: Option<ConnectStatus>,
    /// Antwort auf SUBSCRIBE
    pub subscribe_reply: Option<bool>,
    /// Antwort auf PUBLISH (`None` = kein PUBACK)
    pub publish_reply: Option<bool>,
    pub fail_connect: bool,
    pub reject_publish: bool,
    pub connects: usize,
    pub disconnects: usize,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>, QoS)>,
}

impl<'a> MockLink<'a> {
    pub fn new(events: &'a LinkEvents) -> Self {
        Self {
            events,
            connect_reply: Some(ConnectStatus::Accepted),
            subscribe_reply: Some(true),
            publish_reply: Some(true),
            fail_connect: false,
            reject_publish: false,
            connects: 0,
            disconnects: 0,
            subscriptions: Vec::new(),
            published: Vec::new(),
        }
    }
}

impl BrokerLink for MockLink<'_> {
    fn connect(&mut self, attempt: u32) -> Result<(), LinkError> {
        if self.fail_connect {
            return Err(LinkError::Busy);
        }
        self.connects += 1;
        if let Some(status) = self.connect_reply {
            self.events.on_connection_status(attempt, status);
        }
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), LinkError> {
        self.subscriptions.push(topic.to_string());
        if let Some(ok) = self.subscribe_reply {
            self.events.on_subscribe_complete(ok);
        }
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), LinkError> {
        if self.reject_publish {
            return Err(LinkError::Rejected);
        }
        self.published.push((topic.to_string(), payload.to_vec(), qos));
        if let Some(ok) = self.publish_reply {
            self.events.on_publish_complete(ok);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
    }
}

fn client(events: &LinkEvents) -> NetworkClient<'_, MockLink<'_>> {
    let topics = Topics::new("embarcatech", "dev1").unwrap();
    NetworkClient::new(MockLink::new(events), events, topics, ClientTiming::default())
}

/// Verbindet und bestätigt den Subscribe
fn connect(client: &mut NetworkClient<'_, MockLink<'_>>, now_ms: u64) {
    client.maintain(now_ms);
    client.poll_events();
    assert!(client.maintain(now_ms));
    client.poll_events();
    assert!(!client.needs_subscribe());
}

// ============================================================================
// Tests: Verbindungsaufbau
// ============================================================================

#[test]
fn test_connect_and_subscribe() {
    let events = LinkEvents::new();
    let mut client = client(&events);

    assert!(!client.maintain(0));
    assert_eq!(client.state(), ConnectionState::Connecting);

    client.poll_events();
    assert_eq!(client.state(), ConnectionState::Connected);
    assert!(client.needs_subscribe());

    assert!(client.maintain(10));
    client.poll_events();
    assert!(!client.needs_subscribe());
    assert_eq!(client.link().subscriptions, vec!["embarcatech/dev1/cmd".to_string()]);
}

#[test]
fn test_subscribe_nack_is_retried() {
    let events = LinkEvents::new();
    let mut client = client(&events);
    client.link_mut().subscribe_reply = Some(false);

    client.maintain(0);
    client.poll_events();
    client.maintain(0);
    client.poll_events();
    assert!(client.needs_subscribe());

    client.link_mut().subscribe_reply = Some(true);
    client.maintain(10);
    client.poll_events();
    assert!(!client.needs_subscribe());
    assert_eq!(client.link().subscriptions.len(), 2);
}

#[test]
fn test_subscribe_not_repeated_while_in_flight() {
    let events = LinkEvents::new();
    let mut client = client(&events);
    client.link_mut().subscribe_reply = None;

    client.maintain(0);
    client.poll_events();
    client.maintain(0);
    client.maintain(10);
    client.maintain(20);
    assert_eq!(client.link().subscriptions.len(), 1);
    assert!(client.needs_subscribe());
}

#[test]
fn test_refused_connect_respects_backoff() {
    let events = LinkEvents::new();
    let mut client = client(&events);
    client.link_mut().connect_reply = Some(ConnectStatus::Refused);

    client.maintain(0);
    client.poll_events();
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.maintain(2_999);
    assert_eq!(client.link().connects, 1);

    client.maintain(3_000);
    assert_eq!(client.link().connects, 2);
    assert_eq!(client.state(), ConnectionState::Connecting);
}

#[test]
fn test_immediate_connect_failure_stays_disconnected() {
    let events = LinkEvents::new();
    let mut client = client(&events);
    client.link_mut().fail_connect = true;

    client.maintain(100);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.last_attempt_ms(), Some(100));

    client.link_mut().fail_connect = false;
    client.maintain(200);
    assert_eq!(client.link().connects, 0);
    client.maintain(3_100);
    assert_eq!(client.link().connects, 1);
}

#[test]
fn test_watchdog_fires_once_per_attempt() {
    let events = LinkEvents::new();
    let mut client = client(&events);
    client.link_mut().connect_reply = None;

    client.maintain(0);
    client.maintain(14_999);
    assert_eq!(client.state(), ConnectionState::Connecting);
    assert_eq!(client.watchdog_expirations(), 0);

    client.maintain(15_000);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.watchdog_expirations(), 1);
    assert_eq!(client.link().disconnects, 1);
    // Kein Reconnect im selben Aufruf
    assert_eq!(client.link().connects, 1);

    client.maintain(15_001);
    assert_eq!(client.state(), ConnectionState::Connecting);
    assert_eq!(client.link().connects, 2);

    client.maintain(20_000);
    assert_eq!(client.watchdog_expirations(), 1);
}

#[test]
fn test_peer_disconnect_clears_flags() {
    let events = LinkEvents::new();
    let mut client = client(&events);
    client.maintain(0);
    client.poll_events();
    assert!(client.needs_subscribe());

    events.on_disconnected(client.connect_attempt());
    client.poll_events();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.needs_subscribe());
}

#[test]
fn test_late_result_of_abandoned_attempt_is_ignored() {
    let events = LinkEvents::new();
    let mut client = client(&events);
    client.link_mut().connect_reply = None;

    client.maintain(0);
    assert_eq!(client.connect_attempt(), 1);
    client.maintain(15_000);
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.maintain(15_200);
    assert_eq!(client.state(), ConnectionState::Connecting);
    assert_eq!(client.connect_attempt(), 2);
    assert_eq!(client.link().connects, 2);

    // CONNACK des aufgegebenen ersten Versuchs kommt zu spät
    events.on_connection_status(1, ConnectStatus::Accepted);
    client.poll_events();
    assert_eq!(client.state(), ConnectionState::Connecting);
    assert!(!client.needs_subscribe());

    // Ergebnis des aktuellen Versuchs zählt
    events.on_connection_status(2, ConnectStatus::Accepted);
    client.poll_events();
    assert_eq!(client.state(), ConnectionState::Connected);

    // Disconnect der alten Session trennt die neue nicht
    events.on_disconnected(1);
    client.poll_events();
    assert_eq!(client.state(), ConnectionState::Connected);
}

// ============================================================================
// Tests: Publish
// ============================================================================

#[test]
fn test_publish_qos1_success() {
    let events = LinkEvents::new();
    let clock = ManualClock::new(0);
    let mut client = client(&events);
    connect(&mut client, 0);

    let outcome = block_on(client.publish_frame(1, b"{\"seq\":1}", &clock));
    assert_eq!(outcome, Ok(PublishOutcome::Published));
    assert_eq!(client.last_published_sequence(), 1);

    let (topic, payload, qos) = &client.link().published[0];
    assert_eq!(topic, "embarcatech/dev1/telemetry");
    assert_eq!(payload.as_slice(), b"{\"seq\":1}");
    assert_eq!(*qos, QoS::AtLeastOnce);
}

#[test]
fn test_same_sequence_published_once() {
    let events = LinkEvents::new();
    let clock = ManualClock::new(0);
    let mut client = client(&events);
    connect(&mut client, 0);

    for _ in 0..5 {
        block_on(client.publish_frame(7, b"x", &clock)).unwrap();
    }
    assert_eq!(client.link().published.len(), 1);

    let outcome = block_on(client.publish_frame(7, b"x", &clock));
    assert_eq!(outcome, Ok(PublishOutcome::Skipped));

    block_on(client.publish_frame(8, b"y", &clock)).unwrap();
    assert_eq!(client.link().published.len(), 2);
}

#[test]
fn test_publish_when_disconnected() {
    let events = LinkEvents::new();
    let clock = ManualClock::new(0);
    let mut client = client(&events);

    let outcome = block_on(client.publish_frame(1, b"x", &clock));
    assert_eq!(outcome, Err(PublishError::NotConnected));
    assert!(client.link().published.is_empty());
}

#[test]
fn test_ack_timeout_disconnects_and_backs_off() {
    let events = LinkEvents::new();
    let clock = ManualClock::new(5_000);
    let mut client = client(&events);
    connect(&mut client, 5_000);
    client.link_mut().publish_reply = None;

    let outcome = block_on(client.publish_frame(1, b"x", &clock));
    assert_eq!(outcome, Err(PublishError::AckTimeout));
    assert_eq!(clock.now_ms(), 7_000);

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.needs_subscribe());
    assert_eq!(client.last_published_sequence(), 0);
    assert_eq!(client.link().disconnects, 1);
    assert_eq!(client.last_attempt_ms(), Some(7_000));

    client.maintain(9_999);
    assert_eq!(client.link().connects, 1);
    client.maintain(10_000);
    assert_eq!(client.link().connects, 2);
}

#[test]
fn test_publish_nack_disconnects() {
    let events = LinkEvents::new();
    let clock = ManualClock::new(0);
    let mut client = client(&events);
    connect(&mut client, 0);
    client.link_mut().publish_reply = Some(false);

    let outcome = block_on(client.publish_frame(1, b"x", &clock));
    assert_eq!(outcome, Err(PublishError::Nack));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[test]
fn test_publish_rejected_by_stack() {
    let events = LinkEvents::new();
    let clock = ManualClock::new(0);
    let mut client = client(&events);
    connect(&mut client, 0);
    client.link_mut().reject_publish = true;

    let outcome = block_on(client.publish_frame(1, b"x", &clock));
    assert_eq!(outcome, Err(PublishError::Rejected(LinkError::Rejected)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.link().disconnects, 1);
}

#[test]
fn test_qos0_does_not_wait_for_ack() {
    let events = LinkEvents::new();
    let clock = ManualClock::new(0);
    let topics = Topics::new("embarcatech", "dev1").unwrap();
    let timing = ClientTiming {
        qos: QoS::AtMostOnce,
        ..ClientTiming::default()
    };
    let mut link = MockLink::new(&events);
    link.publish_reply = None;
    let mut client = NetworkClient::new(link, &events, topics, timing);
    connect(&mut client, 0);

    let outcome = block_on(client.publish_frame(1, b"x", &clock));
    assert_eq!(outcome, Ok(PublishOutcome::Published));
    assert_eq!(clock.now_ms(), 0);
}

// ============================================================================
// Tests: Eingehende Kommandos
// ============================================================================

#[test]
fn test_inbound_command_reaches_brightness() {
    let events = LinkEvents::new();
    let mut client = client(&events);
    connect(&mut client, 0);
    let brightness = SharedBrightness::new(BrightnessController::new(BrightnessConfig::default()));

    assert!(events.on_incoming_publish("embarcatech/dev1/cmd"));
    events.on_incoming_data(br#"{"mode":"manual","#, false);
    events.on_incoming_data(br#""matrixPercent":80}"#, true);

    let command = client.take_command().unwrap();
    assert_eq!(command.topic.as_str(), "embarcatech/dev1/cmd");
    brightness.apply(decode_command(&command.payload));

    let state = brightness.snapshot();
    assert_eq!(state.mode, BrightnessMode::Manual);
    assert_eq!(state.target_percent, 80);
    assert!(client.take_command().is_none());
}
