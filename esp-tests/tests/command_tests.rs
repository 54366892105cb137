//! Integration Tests für den Kommando-Decoder
//!
//! Der Decoder sucht einzelne Schlüssel statt echtes JSON zu parsen,
//! deshalb auch Tests mit kaputten und ungewöhnlichen Payloads.

use esp_core::command::{has_command_key, has_key, json_get_int, json_get_str};
use esp_core::{BrightnessCommand, BrightnessMode, decode_command};

// ============================================================================
// Tests: decode_command()
// ============================================================================

#[test]
fn test_mode_and_matrix_percent() {
    let command = decode_command(r#"{"mode":"manual","matrixPercent":80}"#);
    assert_eq!(
        command,
        BrightnessCommand {
            mode: Some(BrightnessMode::Manual),
            percent: Some(80),
        }
    );
}

#[test]
fn test_mode_auto_only() {
    let command = decode_command(r#"{"mode":"auto"}"#);
    assert_eq!(command.mode, Some(BrightnessMode::Auto));
    assert_eq!(command.percent, None);
}

#[test]
fn test_percent_key_priority() {
    let all = decode_command(r#"{"percent":10,"brightness":20,"matrixPercent":30}"#);
    assert_eq!(all.percent, Some(30));

    let two = decode_command(r#"{"percent":10,"brightness":20}"#);
    assert_eq!(two.percent, Some(20));

    let one = decode_command(r#"{"percent":10}"#);
    assert_eq!(one.percent, Some(10));
}

#[test]
fn test_percent_is_clamped() {
    assert_eq!(decode_command(r#"{"brightness":150}"#).percent, Some(100));
    assert_eq!(decode_command(r#"{"brightness":-5}"#).percent, Some(0));
}

#[test]
fn test_quoted_number_accepted() {
    assert_eq!(decode_command(r#"{"percent":"55"}"#).percent, Some(55));
}

#[test]
fn test_unknown_mode_ignored_percent_still_applies() {
    let command = decode_command(r#"{"mode":"disco","percent":40}"#);
    assert_eq!(command.mode, None);
    assert_eq!(command.percent, Some(40));
}

#[test]
fn test_whitespace_around_colon() {
    let command = decode_command("{ \"mode\" :  \"manual\" , \"brightness\" : 12 }");
    assert_eq!(command.mode, Some(BrightnessMode::Manual));
    assert_eq!(command.percent, Some(12));
}

#[test]
fn test_garbage_yields_empty_command() {
    assert!(decode_command("hello world").is_empty());
    assert!(decode_command("").is_empty());
    assert!(decode_command(r#"{"mode":}"#).is_empty());
}

#[test]
fn test_key_as_value_is_not_a_key() {
    let command = decode_command(r#"{"label":"brightness"}"#);
    assert!(command.is_empty());
}

// ============================================================================
// Tests: Hilfsfunktionen
// ============================================================================

#[test]
fn test_has_key_needs_colon() {
    assert!(has_key(r#"{"op":"auth"}"#, "op"));
    assert!(!has_key(r#"["op"]"#, "op"));
}

#[test]
fn test_get_str_reads_password_variants() {
    let line = r#"{"op":"auth","pass":"geheim"}"#;
    assert_eq!(json_get_str(line, "password"), None);
    assert_eq!(json_get_str(line, "pass"), Some("geheim"));
}

#[test]
fn test_get_int_missing_key() {
    assert_eq!(json_get_int(r#"{"a":1}"#, "b"), None);
}

#[test]
fn test_command_key_detection() {
    assert!(has_command_key(r#"{"mode":"auto"}"#));
    assert!(has_command_key(r#"{"matrixPercent":5}"#));
    assert!(has_command_key(r#"{"brightness":5}"#));
    assert!(has_command_key(r#"{"percent":5}"#));
    assert!(!has_command_key(r#"{"op":"cmd"}"#));
    assert!(!has_command_key(r#"{"foo":1}"#));
}
