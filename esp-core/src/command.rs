//! Kommando-Decoder für Helligkeits-Kommandos
//!
//! Bewusst KEIN JSON-Parser: es werden nur einzelne Schlüssel gesucht
//! (`mode`, `matrixPercent`, `brightness`, `percent`, `op`, `password`, ...).
//! Kaputte Payloads führen zu teilweiser oder keiner Wirkung, nie zu einem Fehler.

use crate::types::{BrightnessCommand, BrightnessMode};

/// Schlüssel für den Prozentwert in Prioritäts-Reihenfolge (erster Treffer gewinnt)
pub const PERCENT_KEYS: [&str; 3] = ["matrixPercent", "brightness", "percent"];

/// Schlüssel für den Betriebsmodus
pub const MODE_KEY: &str = "mode";

/// Sucht `"key"` gefolgt von `:` und liefert den Index direkt hinter dem Doppelpunkt
///
/// Vorkommen des Schlüssels als Wert (`"x":"mode"`) werden übersprungen.
fn find_value_start(json: &str, key: &str) -> Option<usize> {
    let bytes = json.as_bytes();
    let key = key.as_bytes();
    let mut i = 0;

    while i + key.len() + 2 <= bytes.len() {
        let end = i + 1 + key.len();
        if bytes[i] == b'"' && &bytes[i + 1..end] == key && bytes[end] == b'"' {
            let mut j = end + 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b':' {
                return Some(j + 1);
            }
        }
        i += 1;
    }

    None
}

/// `true` wenn `json` den Schlüssel `key` (mit Doppelpunkt) enthält
pub fn has_key(json: &str, key: &str) -> bool {
    find_value_start(json, key).is_some()
}

/// String-Wert eines Schlüssels, `None` bei fehlendem Schlüssel oder leerem Wert
///
/// Escapes werden nicht interpretiert, der Wert endet am nächsten `"`.
pub fn json_get_str<'a>(json: &'a str, key: &str) -> Option<&'a str> {
    let start = find_value_start(json, key)?;
    let rest = json[start..].trim_start();
    let rest = rest.strip_prefix('"')?;
    let value = match rest.find('"') {
        Some(end) => &rest[..end],
        None => rest,
    };
    if value.is_empty() { None } else { Some(value) }
}

/// Ganzzahl-Wert eines Schlüssels
///
/// Akzeptiert Anführungszeichen (`"80"`) und Vorzeichen, ignoriert alles nach
/// den Ziffern (`80.5` -> 80) und sättigt statt überzulaufen.
pub fn json_get_int(json: &str, key: &str) -> Option<i32> {
    let start = find_value_start(json, key)?;
    let rest = json[start..].trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '"');

    let (negative, digits) = match rest.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, rest),
    };

    let mut value: i32 = 0;
    let mut seen = false;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        seen = true;
        value = value.saturating_mul(10).saturating_add((b - b'0') as i32);
    }

    if !seen {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// `true` wenn die Zeile einen bekannten Kommando-Schlüssel enthält
pub fn has_command_key(line: &str) -> bool {
    has_key(line, MODE_KEY) || PERCENT_KEYS.iter().any(|key| has_key(line, key))
}

/// Dekodiert ein Helligkeits-Kommando aus einem Text-Payload
///
/// - `mode`: `"auto"` oder `"manual"`, andere Werte werden ignoriert
/// - Prozent: erster vorhandener Schlüssel aus [`PERCENT_KEYS`], begrenzt auf 0..=100
pub fn decode_command(payload: &str) -> BrightnessCommand {
    let mut command = BrightnessCommand::default();

    if let Some(mode) = json_get_str(payload, MODE_KEY) {
        match mode {
            "auto" => command.mode = Some(BrightnessMode::Auto),
            "manual" => command.mode = Some(BrightnessMode::Manual),
            other => warn!("Command: unknown mode '{}'", other),
        }
    }

    command.percent = PERCENT_KEYS
        .iter()
        .find_map(|key| json_get_int(payload, key))
        .map(|v| v.clamp(0, 100) as u8);

    command
}
