//! Integration Tests für die Helligkeitsregelung
//!
//! Prüft Auto-Kennlinie, Konvergenz ohne Überschwingen und die Wirkung
//! dekodierter Kommandos auf den geteilten Controller.

use esp_core::brightness::{auto_percent_inverse, step_towards};
use esp_core::{
    BrightnessCommand, BrightnessConfig, BrightnessController, BrightnessMode, EmaFilter,
    SharedBrightness, decode_command,
};

fn shared() -> SharedBrightness {
    SharedBrightness::new(BrightnessController::new(BrightnessConfig::default()))
}

/// Läuft bis zum Ziel und prüft dabei Monotonie und Schranken
fn converge(brightness: &SharedBrightness, lux: f32, target: u8) -> usize {
    let mut previous = brightness.snapshot().current_percent;
    for tick in 1..=50 {
        let current = brightness.update(lux);
        if previous >= target {
            assert!(current <= previous && current >= target, "overshoot at tick {}", tick);
        } else {
            assert!(current >= previous && current <= target, "overshoot at tick {}", tick);
        }
        if current == target {
            return tick;
        }
        previous = current;
    }
    panic!("did not converge to {}", target);
}

// ============================================================================
// Tests: Kennlinie
// ============================================================================

#[test]
fn test_auto_curve_is_inverse_and_clamped() {
    let config = BrightnessConfig::default();
    assert_eq!(auto_percent_inverse(0.0, &config), 100);
    assert_eq!(auto_percent_inverse(150.0, &config), 100);
    assert_eq!(auto_percent_inverse(400.0, &config), 0);
    assert_eq!(auto_percent_inverse(10_000.0, &config), 0);

    let mut last = 100;
    for lux in (150..=400).step_by(25) {
        let p = auto_percent_inverse(lux as f32, &config);
        assert!(p <= last);
        last = p;
    }
}

#[test]
fn test_auto_curve_respects_percent_limits() {
    let config = BrightnessConfig {
        min_percent: 10,
        max_percent: 70,
        ..Default::default()
    };
    assert_eq!(auto_percent_inverse(100.0, &config), 70);
    assert_eq!(auto_percent_inverse(500.0, &config), 10);
}

#[test]
fn test_step_never_passes_target() {
    for current in [0u8, 7, 50, 93, 100] {
        for target in [0u8, 1, 49, 50, 99, 100] {
            let next = step_towards(current, target);
            assert!(next.abs_diff(target) <= current.abs_diff(target));
            if current != target {
                assert_ne!(next, current);
            }
        }
    }
}

#[test]
fn test_ema_filter_moves_towards_input() {
    let mut filter = EmaFilter::new(400.0, 0.25);
    assert_eq!(filter.update(0.0), 300.0);
    assert_eq!(filter.update(0.0), 225.0);
    assert_eq!(filter.value(), 225.0);
}

// ============================================================================
// Tests: Controller
// ============================================================================

#[test]
fn test_default_state_is_auto_full() {
    let brightness = shared();
    let state = brightness.snapshot();
    assert_eq!(state.mode, BrightnessMode::Auto);
    assert_eq!(state.current_percent, 100);
}

#[test]
fn test_auto_bright_room_dims_to_zero() {
    let brightness = shared();
    converge(&brightness, 400.0, 0);
    assert_eq!(brightness.snapshot().current_percent, 0);
}

#[test]
fn test_auto_dark_room_returns_to_full() {
    let brightness = shared();
    converge(&brightness, 1_000.0, 0);
    converge(&brightness, 50.0, 100);
}

#[test]
fn test_manual_convergence_takes_about_ten_ticks() {
    let brightness = shared();
    brightness.apply(decode_command(r#"{"mode":"manual","matrixPercent":20}"#));

    let ticks = converge(&brightness, 400.0, 20);
    assert!(ticks >= 10, "converged too fast: {}", ticks);
    assert!(ticks <= 40, "converged too slow: {}", ticks);
}

#[test]
fn test_manual_ignores_ambient_light() {
    let brightness = shared();
    brightness.apply(BrightnessCommand {
        mode: Some(BrightnessMode::Manual),
        percent: Some(60),
    });
    converge(&brightness, 0.0, 60);

    for _ in 0..5 {
        assert_eq!(brightness.update(10_000.0), 60);
    }
}

// ============================================================================
// Tests: Kommandos
// ============================================================================

#[test]
fn test_manual_with_matrix_percent() {
    let brightness = shared();
    brightness.apply(decode_command(r#"{"mode":"manual","matrixPercent":80}"#));

    let state = brightness.snapshot();
    assert_eq!(state.mode, BrightnessMode::Manual);
    assert_eq!(state.target_percent, 80);
}

#[test]
fn test_brightness_above_range_is_clamped_and_forces_manual() {
    let brightness = shared();
    brightness.apply(decode_command(r#"{"brightness":150}"#));

    let state = brightness.snapshot();
    assert_eq!(state.mode, BrightnessMode::Manual);
    assert_eq!(state.target_percent, 100);
}

#[test]
fn test_mode_auto_keeps_last_target() {
    let brightness = shared();
    brightness.apply(decode_command(r#"{"percent":35}"#));
    brightness.apply(decode_command(r#"{"mode":"auto"}"#));

    let state = brightness.snapshot();
    assert_eq!(state.mode, BrightnessMode::Auto);
    assert_eq!(state.target_percent, 35);
}

#[test]
fn test_empty_command_changes_nothing() {
    let brightness = shared();
    let before = brightness.snapshot();
    brightness.apply(decode_command(r#"{"color":"red"}"#));
    assert_eq!(brightness.snapshot(), before);
}
