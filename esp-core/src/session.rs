//! Serielles Zeilen-Protokoll mit Passwort-Authentifizierung
//!
//! Eine Zeile = ein JSON-Objekt, abgeschlossen mit `\n`. Die Session kennt nur
//! ihren Auth-Status und die zuletzt gesendete Sequenz. Kodierung der
//! Antworten liegt in `protocol` (Feature `serde`).

use heapless::{String, Vec};

use crate::brightness::SharedBrightness;
use crate::command::{decode_command, has_command_key, json_get_str};
use crate::mailbox::FrameStore;
use crate::types::{BrightnessState, TelemetryFrame};

/// Maximale Zeilenlänge in Bytes (Rest wird verworfen)
pub const LINE_CAPACITY: usize = 255;

/// Firmware-Kennung im `hello`
pub const SERIAL_FW_VERSION: &str = "esp-serial-v1";

/// Eine ausgehende Nachricht der Session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionReply {
    Hello { need_auth: bool },
    Auth { ok: bool },
    Ack(&'static str),
    Err(&'static str),
    Info(&'static str),
    Telemetry {
        frame: TelemetryFrame,
        brightness: BrightnessState,
    },
}

/// Antworten auf eine Zeile (höchstens zwei)
pub type Replies = Vec<SessionReply, 2>;

/// Sammelt Bytes zu Zeilen
pub struct LineAssembler {
    buf: Vec<u8, LINE_CAPACITY>,
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Nimmt ein Byte an, liefert die fertige Zeile bei `\n`
    ///
    /// `\r` wird ignoriert, Bytes über die Kapazität hinaus verworfen.
    pub fn push(&mut self, byte: u8) -> Option<String<LINE_CAPACITY>> {
        match byte {
            b'\r' => None,
            b'\n' => {
                let text = match core::str::from_utf8(&self.buf) {
                    Ok(text) => text,
                    Err(e) => core::str::from_utf8(&self.buf[..e.valid_up_to()]).unwrap_or(""),
                };
                let mut line = String::new();
                let _ = line.push_str(text);
                self.buf.clear();
                Some(line)
            }
            other => {
                let _ = self.buf.push(other);
                None
            }
        }
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SerialSession<'a> {
    password: &'a str,
    authenticated: bool,
    last_seq: u32,
}

impl<'a> SerialSession<'a> {
    pub fn new(password: &'a str) -> Self {
        Self {
            password,
            authenticated: false,
            last_seq: 0,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Begrüßung beim Start der Verbindung
    pub fn greeting(&self) -> [SessionReply; 2] {
        [SessionReply::Info("SerialRPC up"), self.hello()]
    }

    fn hello(&self) -> SessionReply {
        SessionReply::Hello {
            need_auth: !self.authenticated,
        }
    }

    /// Verarbeitet eine empfangene Zeile
    pub fn handle_line(&mut self, line: &str, brightness: &SharedBrightness) -> Replies {
        let mut replies = Replies::new();
        let line = line.trim();
        if line.is_empty() {
            return replies;
        }

        let mut reply = |r: SessionReply| {
            let _ = replies.push(r);
        };

        match json_get_str(line, "op") {
            Some("hello") => reply(self.hello()),
            Some("logout") => {
                self.authenticated = false;
                info!("Serial: logout");
                reply(SessionReply::Ack("logout ok"));
                reply(self.hello());
            }
            Some("auth") => {
                let secret = json_get_str(line, "password").or_else(|| json_get_str(line, "pass"));
                match secret {
                    None => reply(SessionReply::Auth { ok: false }),
                    Some(secret) => {
                        // Falsches Passwort beendet auch eine bestehende Session
                        let ok = secret == self.password;
                        self.authenticated = ok;
                        info!("Serial: auth {}", if ok { "ok" } else { "failed" });
                        reply(SessionReply::Auth { ok });
                        if ok {
                            reply(SessionReply::Ack("auth ok"));
                        }
                    }
                }
            }
            Some("cmd") => {
                if self.authenticated {
                    brightness.apply(decode_command(line));
                    reply(SessionReply::Ack("cmd applied"));
                } else {
                    reply(SessionReply::Err("not authenticated"));
                }
            }
            Some(_) => reply(SessionReply::Err("unknown op")),
            None => {
                if !has_command_key(line) {
                    reply(SessionReply::Err("bad json"));
                } else if self.authenticated {
                    brightness.apply(decode_command(line));
                    reply(SessionReply::Ack("cmd applied (implicit)"));
                } else {
                    reply(SessionReply::Err("not authenticated"));
                }
            }
        }

        replies
    }

    /// Telemetrie nur wenn authentifiziert und die Sequenz sich geändert hat
    pub fn poll_telemetry(&mut self, store: &FrameStore, brightness: &SharedBrightness) -> Option<SessionReply> {
        if !self.authenticated {
            return None;
        }

        let frame = store.latest_frame()?;
        if frame.sequence == self.last_seq {
            return None;
        }
        self.last_seq = frame.sequence;

        Some(SessionReply::Telemetry {
            frame,
            brightness: brightness.snapshot(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(assembler: &mut LineAssembler, bytes: &[u8]) -> Option<String<LINE_CAPACITY>> {
        let mut out = None;
        for &b in bytes {
            if let Some(line) = assembler.push(b) {
                out = Some(line);
            }
        }
        out
    }

    #[test]
    fn test_crlf_line() {
        let mut assembler = LineAssembler::new();
        let line = feed(&mut assembler, b"{\"op\":\"hello\"}\r\n").unwrap();
        assert_eq!(line.as_str(), "{\"op\":\"hello\"}");
    }

    #[test]
    fn test_overlong_line_is_truncated() {
        let mut assembler = LineAssembler::new();
        let mut bytes = [b'a'; 301];
        bytes[300] = b'\n';
        let line = feed(&mut assembler, &bytes).unwrap();
        assert_eq!(line.len(), LINE_CAPACITY);

        // Danach beginnt eine frische Zeile
        let line = feed(&mut assembler, b"x\n").unwrap();
        assert_eq!(line.as_str(), "x");
    }

    #[test]
    fn test_greeting() {
        let session = SerialSession::new("pw");
        assert_eq!(
            session.greeting(),
            [
                SessionReply::Info("SerialRPC up"),
                SessionReply::Hello { need_auth: true }
            ]
        );
    }
}
