// Serial-RPC Task - JSON-Zeilenprotokoll über UART1
use defmt::{Debug2Format, info, warn};
use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Instant, Timer};
use esp_core::protocol::encode_reply_line;
use esp_core::{FrameStore, LineAssembler, SerialSession, SessionReply, SharedBrightness};
use esp_hal::Async;
use esp_hal::uart::{Uart, UartTx};

use crate::config::{SERIAL_ACCESS_PASSWORD, SERIAL_LINE_BUFFER_SIZE, SERIAL_TELEMETRY_PERIOD_MS};

/// Serial-RPC Task
///
/// - Begrüßung (`info` + `hello`) beim Start
/// - Zeilen lesen, über `SerialSession` auswerten, Antworten senden
/// - alle 200 ms Telemetrie, nur authentifiziert und nur bei neuer Sequenz
///
/// # Parameter
/// - `uart`: UART1 (async)
/// - `store`: FrameStore (Telemetrie-Quelle)
/// - `brightness`: Ziel der Kommandos
/// - `device_id`: Geräte-ID für `hello` und Telemetrie
#[embassy_executor::task]
pub async fn serial_rpc_task(
    uart: Uart<'static, Async>,
    store: &'static FrameStore,
    brightness: &'static SharedBrightness,
    device_id: &'static str,
) {
    let (mut rx, mut tx) = uart.split();
    let mut session = SerialSession::new(SERIAL_ACCESS_PASSWORD);
    let mut assembler = LineAssembler::new();
    let mut out = [0u8; SERIAL_LINE_BUFFER_SIZE];
    let mut chunk = [0u8; 64];

    info!("Serial: RPC started");
    for reply in session.greeting() {
        send_reply(&mut tx, device_id, &reply, &mut out).await;
    }

    let period = Duration::from_millis(SERIAL_TELEMETRY_PERIOD_MS);
    let mut next_telemetry = Instant::now() + period;

    loop {
        let event = select(rx.read_async(&mut chunk), Timer::at(next_telemetry)).await;

        match event {
            Either::First(Ok(n)) => {
                for &byte in &chunk[..n] {
                    let Some(line) = assembler.push(byte) else {
                        continue;
                    };
                    for reply in session.handle_line(&line, brightness) {
                        send_reply(&mut tx, device_id, &reply, &mut out).await;
                    }
                }
            }
            Either::First(Err(e)) => {
                warn!("Serial: RX error: {}", Debug2Format(&e));
            }
            Either::Second(()) => {
                next_telemetry = Instant::now() + period;
                if let Some(reply) = session.poll_telemetry(store, brightness) {
                    send_reply(&mut tx, device_id, &reply, &mut out).await;
                }
            }
        }
    }
}

/// Kodiert und sendet eine Antwort-Zeile komplett
async fn send_reply(tx: &mut UartTx<'static, Async>, device_id: &str, reply: &SessionReply, out: &mut [u8]) {
    let len = match encode_reply_line(device_id, reply, out) {
        Ok(len) => len,
        Err(e) => {
            warn!("Serial: Encoding failed: {}", e);
            return;
        }
    };

    let mut remaining = &out[..len];
    while !remaining.is_empty() {
        match tx.write_async(remaining).await {
            Ok(0) => return,
            Ok(n) => remaining = &remaining[n..],
            Err(e) => {
                warn!("Serial: TX error: {}", Debug2Format(&e));
                return;
            }
        }
    }
}
