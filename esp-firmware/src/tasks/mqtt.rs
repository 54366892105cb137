// MQTT Tasks - Treiber-Task (Zustandsautomat) und Link-Task (Socket + rust-mqtt)
//
// Der Link-Task läuft im Kontext des Netzwerk-Stacks und meldet alle
// Ergebnisse über `LinkEvents`. Der Treiber-Task besitzt den
// `NetworkClient` und schickt nur Anfragen über einen Channel.
use defmt::{Debug2Format, error, info, warn};
use embassy_futures::select::{Either, select};
use embassy_net::{IpAddress, Stack, dns::DnsQueryType, tcp::TcpSocket};
use embassy_time::{Duration, Timer, with_timeout};
use heapless::{String, Vec};

use esp_core::command::decode_command;
use esp_core::connection::{BrokerLink, LinkError, QoS};
use esp_core::link::{ConnectStatus, INBOUND_PAYLOAD_CAPACITY};
use esp_core::protocol::encode_telemetry;
use esp_core::{FrameStore, LinkEvents, NetworkClient, SharedBrightness};

use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::packet::v5::reason_codes::ReasonCode;
use rust_mqtt::utils::rng_generator::CountingRng;
use rust_mqtt::utils::types::EncodedString;

use crate::config::*;
use crate::tasks::wifi::wait_for_network;
use crate::{Clock, EmbassyClock, FrameSignal, LinkRequestReceiver, LinkRequestSender};

/// Maximale Topic-Länge einer Anfrage
pub const REQUEST_TOPIC_CAPACITY: usize = 96;

/// Maximale Payload-Länge einer Publish-Anfrage
pub const REQUEST_PAYLOAD_CAPACITY: usize = TELEMETRY_BUFFER_SIZE;

/// Eingehende Daten werden in Stücken dieser Größe an `LinkEvents` gereicht
const INBOUND_CHUNK: usize = 64;

/// Anfrage an den Link-Task
pub enum LinkRequest {
    /// Neuer Verbindungsversuch mit seiner Nummer
    Connect {
        attempt: u32,
    },
    Subscribe {
        topic: String<REQUEST_TOPIC_CAPACITY>,
    },
    Publish {
        topic: String<REQUEST_TOPIC_CAPACITY>,
        payload: Vec<u8, REQUEST_PAYLOAD_CAPACITY>,
        qos: QoS,
    },
    Disconnect,
}

/// `BrokerLink` über den Request-Channel
///
/// Alle Aufrufe kehren sofort zurück (`try_send`), Ergebnisse kommen über
/// `LinkEvents`.
pub struct MqttLink {
    requests: LinkRequestSender,
}

impl MqttLink {
    pub fn new(requests: LinkRequestSender) -> Self {
        Self { requests }
    }

    fn send(&mut self, request: LinkRequest) -> Result<(), LinkError> {
        self.requests.try_send(request).map_err(|_| LinkError::Busy)
    }
}

fn copy_topic(topic: &str) -> Result<String<REQUEST_TOPIC_CAPACITY>, LinkError> {
    let mut owned = String::new();
    owned.push_str(topic).map_err(|_| LinkError::Rejected)?;
    Ok(owned)
}

impl BrokerLink for MqttLink {
    fn connect(&mut self, attempt: u32) -> Result<(), LinkError> {
        self.send(LinkRequest::Connect { attempt })
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), LinkError> {
        let topic = copy_topic(topic)?;
        self.send(LinkRequest::Subscribe { topic })
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), LinkError> {
        let topic = copy_topic(topic)?;
        let payload = Vec::from_slice(payload).map_err(|_| LinkError::Rejected)?;
        self.send(LinkRequest::Publish { topic, payload, qos })
    }

    fn disconnect(&mut self) {
        // Voller Channel: Link-Task bemerkt den Abbruch beim nächsten Fehler
        let _ = self.send(LinkRequest::Disconnect);
    }
}

// ============================================================================
// Treiber-Task
// ============================================================================

/// MQTT Treiber-Task
///
/// Pro Durchlauf:
/// - Callback-Ereignisse übernehmen, Verbindung pflegen (Backoff, Watchdog, Subscribe)
/// - ein anstehendes Kommando dekodieren und anwenden
/// - bis zu 500 ms auf einen neuen Frame warten und ihn (dedupliziert) publishen
///
/// # Parameter
/// - `client`: Zustandsautomat mit `MqttLink`
/// - `store`: FrameStore (Quelle der Frames)
/// - `brightness`: Ziel der MQTT-Kommandos
/// - `frame_ready`: Signal vom Display-Task
/// - `device_id`: Geräte-ID für die Payloads
#[embassy_executor::task]
pub async fn mqtt_task(
    mut client: NetworkClient<'static, MqttLink>,
    store: &'static FrameStore,
    brightness: &'static SharedBrightness,
    frame_ready: &'static FrameSignal,
    device_id: &'static str,
) {
    info!("MQTT: Driver started, telemetry on '{}'", client.topics().telemetry());
    let clock = EmbassyClock;
    let mut payload = [0u8; TELEMETRY_BUFFER_SIZE];

    loop {
        client.poll_events();

        if !client.maintain(clock.now_ms()) {
            Timer::after_millis(MQTT_IDLE_POLL_MS).await;
            continue;
        }

        if let Some(command) = client.take_command() {
            info!("MQTT: Command on '{}': {}", command.topic.as_str(), command.payload.as_str());
            let decoded = decode_command(&command.payload);
            if decoded.is_empty() {
                warn!("MQTT: Command without known fields ignored");
            } else {
                brightness.apply(decoded);
            }
        }

        // Timeout ist kein Fehler: Kommandos und Verbindung brauchen trotzdem Pflege
        let _ = with_timeout(Duration::from_millis(MQTT_FRAME_WAIT_MS), frame_ready.wait()).await;

        client.poll_events();
        let Some(frame) = store.read_frame_if_newer(client.last_published_sequence()) else {
            continue;
        };

        let len = match encode_telemetry(device_id, &frame, &mut payload) {
            Ok(len) => len,
            Err(e) => {
                error!("MQTT: Encoding failed: {}", e);
                continue;
            }
        };

        match client.publish_frame(frame.sequence, &payload[..len], &clock).await {
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT: Publish of seq={} failed: {}", frame.sequence, e);
                Timer::after_millis(MQTT_PUBLISH_FAILURE_PAUSE_MS).await;
            }
        }
    }
}

// ============================================================================
// Link-Task
// ============================================================================

/// MQTT Link-Task
///
/// Besitzt Socket und rust-mqtt Client. Wartet auf `Connect`, baut die
/// Session auf und bedient dann Anfragen, eingehende Nachrichten und Keepalive.
/// Eine Anfrage, die eine Session beendet hat, wird als nächste bearbeitet.
#[embassy_executor::task]
pub async fn mqtt_link_task(
    stack: &'static Stack<'static>,
    requests: LinkRequestReceiver,
    events: &'static LinkEvents,
    client_id: &'static str,
) {
    info!("MQTT: Link task started, waiting for network...");
    wait_for_network(stack).await;
    info!("MQTT: Network ready");

    let mut pending: Option<LinkRequest> = None;

    loop {
        let request = match pending.take() {
            Some(request) => request,
            None => requests.receive().await,
        };
        let attempt = match request {
            LinkRequest::Connect { attempt } => attempt,
            other => {
                reject_request(events, other);
                continue;
            }
        };

        match run_session(stack, &requests, events, client_id, attempt).await {
            Ok(next) => {
                info!("MQTT: Session {} closed", attempt);
                pending = next;
            }
            Err(e) => warn!("MQTT: Session {} ended: {}", attempt, e),
        }
    }
}

/// Anfragen ohne Session schlagen sofort fehl
fn reject_request(events: &LinkEvents, request: LinkRequest) {
    match request {
        LinkRequest::Publish { .. } => events.on_publish_complete(false),
        LinkRequest::Subscribe { .. } => events.on_subscribe_complete(false),
        LinkRequest::Connect { .. } | LinkRequest::Disconnect => {}
    }
}

/// Ergebnis eines Session-Schleifendurchlaufs (ohne Borrow auf den Client)
enum SessionAction {
    Request(LinkRequest),
    Received,
    KeepAlive,
    Failed(ReasonCode),
}

/// rust-mqtt Client einer Session (Socket leiht die Puffer des Aufrufers)
type SessionClient<'a> = MqttClient<'a, TcpSocket<'a>, 5, CountingRng>;

/// Puffer einer Session, leben im Frame von `run_session`
struct SessionBuffers {
    socket_rx: [u8; MQTT_SOCKET_BUFFER_SIZE],
    socket_tx: [u8; MQTT_SOCKET_BUFFER_SIZE],
    mqtt_send: [u8; MQTT_BUFFER_SIZE],
    mqtt_recv: [u8; MQTT_BUFFER_SIZE],
}

impl SessionBuffers {
    const fn new() -> Self {
        Self {
            socket_rx: [0; MQTT_SOCKET_BUFFER_SIZE],
            socket_tx: [0; MQTT_SOCKET_BUFFER_SIZE],
            mqtt_send: [0; MQTT_BUFFER_SIZE],
            mqtt_recv: [0; MQTT_BUFFER_SIZE],
        }
    }
}

/// Eine komplette Broker-Session für Versuch `attempt`
///
/// Fehler beim Aufbau werden als Verbindungsstatus gemeldet, Fehler danach
/// als Disconnect. Jede Anfrage während des Aufbaus bricht ihn ab, ohne
/// Status zu melden. Ein `Connect`, das die Session beendet, wird
/// zurückgegeben.
async fn run_session(
    stack: &'static Stack<'static>,
    requests: &LinkRequestReceiver,
    events: &LinkEvents,
    client_id: &str,
    attempt: u32,
) -> Result<Option<LinkRequest>, MqttError> {
    let mut buffers = SessionBuffers::new();

    let setup = select(establish(stack, &mut buffers, client_id), requests.receive()).await;
    let mut client = match setup {
        Either::First(Ok(client)) => client,
        Either::First(Err((status, e))) => {
            events.on_connection_status(attempt, status);
            return Err(e);
        }
        Either::Second(request) => {
            warn!("MQTT: Attempt {} abandoned during setup", attempt);
            return Ok(carry_over(events, request));
        }
    };
    events.on_connection_status(attempt, ConnectStatus::Accepted);

    // Keepalive mit Reserve: Ping nach halber Keepalive-Zeit ohne Verkehr
    let idle_timeout = Duration::from_secs(MQTT_KEEPALIVE_SECS as u64 / 2);

    loop {
        let action = {
            let event = select(requests.receive(), with_timeout(idle_timeout, client.receive_message())).await;
            match event {
                Either::First(request) => SessionAction::Request(request),
                Either::Second(Ok(Ok((topic, payload)))) => {
                    deliver_inbound(events, topic, payload);
                    SessionAction::Received
                }
                Either::Second(Ok(Err(code))) => SessionAction::Failed(code),
                Either::Second(Err(_)) => SessionAction::KeepAlive,
            }
        };

        match action {
            SessionAction::Received => {}
            SessionAction::KeepAlive => {
                if client.send_ping().await.is_err() {
                    events.on_disconnected(attempt);
                    return Err(MqttError::ProtocolError);
                }
            }
            SessionAction::Failed(code) => {
                warn!("MQTT: Receive failed: {}", Debug2Format(&code));
                events.on_disconnected(attempt);
                return Err(MqttError::ProtocolError);
            }
            SessionAction::Request(LinkRequest::Publish { topic, payload, qos }) => {
                let qos = match qos {
                    QoS::AtMostOnce => QualityOfService::QoS0,
                    QoS::AtLeastOnce => QualityOfService::QoS1,
                };
                // Bei QoS 1 kehrt send_message erst nach PUBACK zurück
                let result = client.send_message(&topic, &payload, qos, false).await;
                events.on_publish_complete(result.is_ok());
                if let Err(code) = result {
                    warn!("MQTT: Publish failed: {}", Debug2Format(&code));
                    events.on_disconnected(attempt);
                    return Err(MqttError::PublishFailed);
                }
            }
            SessionAction::Request(LinkRequest::Subscribe { topic }) => {
                let result = client.subscribe_to_topic(&topic).await;
                if let Err(code) = &result {
                    warn!("MQTT: Subscribe failed: {}", Debug2Format(code));
                }
                events.on_subscribe_complete(result.is_ok());
            }
            SessionAction::Request(LinkRequest::Disconnect) => {
                // Vom Treiber verlangt: er ist schon DISCONNECTED
                let _ = client.disconnect().await;
                return Ok(None);
            }
            SessionAction::Request(request @ LinkRequest::Connect { .. }) => {
                // Neuer Versuch während bestehender Session: alte Session beenden
                let _ = client.disconnect().await;
                events.on_disconnected(attempt);
                return Ok(Some(request));
            }
        }
    }
}

/// Anfrage, die einen Aufbau abgebrochen hat
///
/// `Connect` startet danach sofort, alles andere schlägt fehl.
fn carry_over(events: &LinkEvents, request: LinkRequest) -> Option<LinkRequest> {
    match request {
        LinkRequest::Connect { .. } => Some(request),
        other => {
            reject_request(events, other);
            None
        }
    }
}

/// DNS, TCP und MQTT CONNECT
///
/// Gibt im Fehlerfall den zu meldenden Verbindungsstatus mit zurück.
async fn establish<'a>(
    stack: &'static Stack<'static>,
    buffers: &'a mut SessionBuffers,
    client_id: &'a str,
) -> Result<SessionClient<'a>, (ConnectStatus, MqttError)> {
    if !stack.is_config_up() {
        return Err((ConnectStatus::Unreachable, MqttError::NetworkDown));
    }

    // DNS Lookup
    let broker_ip = resolve_hostname(stack, MQTT_BROKER).await.map_err(|e| {
        let status = match e {
            MqttError::DnsTimeout => ConnectStatus::Timeout,
            _ => ConnectStatus::Unreachable,
        };
        (status, e)
    })?;
    info!("MQTT: Broker '{}' at {}", MQTT_BROKER, Debug2Format(&broker_ip));

    // TCP Connect
    let mut socket = TcpSocket::new(*stack, &mut buffers.socket_rx, &mut buffers.socket_tx);
    socket.set_timeout(Some(Duration::from_secs(MQTT_TCP_TIMEOUT_SECS)));

    if socket.connect((broker_ip, MQTT_PORT)).await.is_err() {
        return Err((ConnectStatus::Unreachable, MqttError::ConnectionFailed));
    }

    // MQTT Client Configuration
    let mut config = ClientConfig::<5, _>::new(MqttVersion::MQTTv5, CountingRng(20000));
    config.client_id = EncodedString {
        string: client_id,
        len: client_id.len() as u16,
    };
    config.keep_alive = MQTT_KEEPALIVE_SECS;
    config.max_packet_size = MQTT_BUFFER_SIZE as u32;

    let mut client = MqttClient::<_, 5, _>::new(
        socket,
        &mut buffers.mqtt_send,
        MQTT_BUFFER_SIZE,
        &mut buffers.mqtt_recv,
        MQTT_BUFFER_SIZE,
        config,
    );

    // MQTT CONNECT
    if let Err(code) = client.connect_to_broker().await {
        warn!("MQTT: CONNACK refused: {}", Debug2Format(&code));
        return Err((ConnectStatus::Refused, MqttError::ProtocolError));
    }
    Ok(client)
}

/// Reicht eine empfangene Nachricht wie Stack-Callbacks weiter
///
/// Ist der Slot belegt, wird die Nachricht verworfen (und gezählt).
fn deliver_inbound(events: &LinkEvents, topic: &str, payload: &[u8]) {
    if !events.on_incoming_publish(topic) {
        warn!("MQTT: Command dropped, previous not consumed ({} total)", events.dropped_commands());
        return;
    }

    if payload.is_empty() {
        events.on_incoming_data(&[], true);
        return;
    }

    let payload = &payload[..payload.len().min(INBOUND_PAYLOAD_CAPACITY)];
    let chunks = payload.chunks(INBOUND_CHUNK);
    let count = chunks.len();
    for (i, chunk) in chunks.enumerate() {
        events.on_incoming_data(chunk, i + 1 == count);
    }
}

/// Löst Hostname zu IPv4-Adresse auf
///
/// Nutzt embassy-net DNS-Stack mit konfigurierbarem Timeout.
async fn resolve_hostname(
    stack: &'static Stack<'static>,
    hostname: &str,
) -> Result<embassy_net::Ipv4Address, MqttError> {
    let result = with_timeout(
        Duration::from_secs(DNS_TIMEOUT_SECS),
        stack.dns_query(hostname, DnsQueryType::A),
    )
    .await;

    match result {
        Ok(Ok(addrs)) => addrs
            .iter()
            .find_map(|addr| match addr {
                IpAddress::Ipv4(ipv4) => Some(*ipv4),
                #[allow(unreachable_patterns)]
                _ => None,
            })
            .ok_or(MqttError::DnsResolutionFailed),
        Ok(Err(_)) => Err(MqttError::DnsResolutionFailed),
        Err(_) => Err(MqttError::DnsTimeout),
    }
}

/// MQTT Fehler-Typen des Link-Tasks
#[derive(Debug, Clone, Copy)]
enum MqttError {
    NetworkDown,
    DnsResolutionFailed,
    DnsTimeout,
    ConnectionFailed,
    ProtocolError,
    PublishFailed,
}

impl defmt::Format for MqttError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            MqttError::NetworkDown => defmt::write!(fmt, "Network down"),
            MqttError::DnsResolutionFailed => defmt::write!(fmt, "DNS failed"),
            MqttError::DnsTimeout => defmt::write!(fmt, "DNS timeout"),
            MqttError::ConnectionFailed => defmt::write!(fmt, "Connection failed"),
            MqttError::ProtocolError => defmt::write!(fmt, "Protocol error"),
            MqttError::PublishFailed => defmt::write!(fmt, "Publish failed"),
        }
    }
}
