//! Helligkeitsregelung der LED-Matrix
//!
//! Zwei Modi:
//! - **Auto:** Ziel = inverse lineare Abbildung des gefilterten Umgebungslichts
//! - **Manual:** Ziel = zuletzt kommandierter Wert
//!
//! Pro Regel-Tick läuft `current_percent` in höchstens `ceil(|Δ|/10)` Schritten
//! zum Ziel, ein kompletter Übergang dauert also immer ca. 10 Ticks.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::logic::clampf;
use crate::types::{BrightnessCommand, BrightnessMode, BrightnessState};

/// Konfiguration der Auto-Helligkeit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessConfig {
    /// Unterhalb: maximale Helligkeit
    pub lux_min: f32,
    /// Oberhalb: minimale Helligkeit
    pub lux_max: f32,
    pub min_percent: u8,
    pub max_percent: u8,
    /// EMA-Glättung (0..1)
    pub alpha: f32,
    /// Regel-/Abtastperiode in Millisekunden
    pub update_ms: u64,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self {
            lux_min: 150.0,
            lux_max: 400.0,
            min_percent: 0,
            max_percent: 100,
            alpha: 0.25,
            update_ms: 100,
        }
    }
}

/// Exponentieller gleitender Mittelwert, `alpha` wird auf 0..1 begrenzt
pub fn ema_filter(prev: f32, x: f32, alpha: f32) -> f32 {
    let alpha = clampf(alpha, 0.0, 1.0);
    prev + alpha * (x - prev)
}

/// EMA-Filter mit eigenem Zustand
#[derive(Debug, Clone, Copy)]
pub struct EmaFilter {
    value: f32,
    alpha: f32,
}

impl EmaFilter {
    pub fn new(initial: f32, alpha: f32) -> Self {
        Self {
            value: initial,
            alpha,
        }
    }

    pub fn update(&mut self, raw: f32) -> f32 {
        self.value = ema_filter(self.value, raw, self.alpha);
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

/// Inverse Abbildung Lux -> Prozent innerhalb `[min_percent, max_percent]`
///
/// Werte außerhalb des Lux-Bereichs werden begrenzt, nicht extrapoliert.
/// Bei ungültigem Bereich (`lux_max <= lux_min`) gibt es die Mitte.
pub fn auto_percent_inverse(lux: f32, config: &BrightnessConfig) -> u8 {
    let lo = config.min_percent.min(100) as f32;
    let hi = config.max_percent.min(100) as f32;

    if config.lux_max <= config.lux_min {
        return ((lo + hi) / 2.0) as u8;
    }

    let lux = clampf(lux, config.lux_min, config.lux_max);
    let t = (lux - config.lux_min) / (config.lux_max - config.lux_min);
    let b = hi - t * (hi - lo);

    (clampf(b, 0.0, 100.0) + 0.5) as u8
}

/// Ein Schritt Richtung Ziel, Schrittweite `ceil(|Δ|/10)`, nie über das Ziel hinaus
pub fn step_towards(current: u8, target: u8) -> u8 {
    if current == target {
        return current;
    }

    let delta = current.abs_diff(target);
    let step = delta.div_ceil(10).max(1);

    if current < target {
        current.saturating_add(step).min(target)
    } else {
        current.saturating_sub(step).max(target)
    }
}

/// Zustandsautomat der Helligkeitsregelung
#[derive(Debug, Clone, Copy)]
pub struct BrightnessController {
    config: BrightnessConfig,
    state: BrightnessState,
}

impl BrightnessController {
    pub fn new(config: BrightnessConfig) -> Self {
        Self {
            config,
            state: BrightnessState::default(),
        }
    }

    pub fn config(&self) -> &BrightnessConfig {
        &self.config
    }

    pub fn state(&self) -> BrightnessState {
        self.state
    }

    /// Wendet ein dekodiertes Kommando an
    ///
    /// Ein Prozentwert erzwingt immer den manuellen Modus, auch wenn im selben
    /// Payload `"mode":"auto"` steht (Prozent wird nach dem Modus ausgewertet).
    pub fn apply(&mut self, command: BrightnessCommand) {
        if let Some(mode) = command.mode {
            self.state.mode = mode;
            info!("Brightness: mode={}", mode.as_str());
        }

        if let Some(percent) = command.percent {
            self.state.target_percent = percent.min(100);
            if self.state.mode != BrightnessMode::Manual {
                self.state.mode = BrightnessMode::Manual;
                info!("Brightness: percent without manual mode, switching to manual");
            }
            info!("Brightness: target={}%", self.state.target_percent);
        }
    }

    /// Aktueller Zielwert (abhängig vom Modus)
    pub fn desired_percent(&self, filtered_lux: f32) -> u8 {
        match self.state.mode {
            BrightnessMode::Manual => self.state.target_percent,
            BrightnessMode::Auto => auto_percent_inverse(filtered_lux, &self.config),
        }
    }

    /// Regel-Tick: bewegt `current_percent` einen Schritt Richtung Ziel
    pub fn update(&mut self, filtered_lux: f32) -> u8 {
        let desired = self.desired_percent(filtered_lux);
        self.state.current_percent = step_towards(self.state.current_percent, desired);
        self.state.current_percent
    }
}

/// Prozessweit geteilter Controller
///
/// Kommando-Pfade (MQTT, Serial) und der Licht-Task greifen über eine
/// Critical Section zu. Kein `await` innerhalb des Locks.
pub struct SharedBrightness {
    inner: Mutex<CriticalSectionRawMutex, RefCell<BrightnessController>>,
}

impl SharedBrightness {
    pub fn new(controller: BrightnessController) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(controller)),
        }
    }

    pub fn apply(&self, command: BrightnessCommand) {
        self.inner.lock(|c| c.borrow_mut().apply(command));
    }

    pub fn update(&self, filtered_lux: f32) -> u8 {
        self.inner.lock(|c| c.borrow_mut().update(filtered_lux))
    }

    pub fn snapshot(&self) -> BrightnessState {
        self.inner.lock(|c| c.borrow().state())
    }

    pub fn config(&self) -> BrightnessConfig {
        self.inner.lock(|c| *c.borrow().config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_alpha_is_clamped() {
        assert_eq!(ema_filter(10.0, 20.0, 2.0), 20.0);
        assert_eq!(ema_filter(10.0, 20.0, -1.0), 10.0);
        assert_eq!(ema_filter(10.0, 20.0, 0.5), 15.0);
    }

    #[test]
    fn test_step_is_tenth_of_distance_rounded_up() {
        assert_eq!(step_towards(0, 100), 10);
        assert_eq!(step_towards(100, 0), 90);
        assert_eq!(step_towards(50, 55), 51);
        assert_eq!(step_towards(55, 50), 54);
        assert_eq!(step_towards(42, 42), 42);
    }

    #[test]
    fn test_auto_endpoints() {
        let config = BrightnessConfig::default();
        assert_eq!(auto_percent_inverse(150.0, &config), 100);
        assert_eq!(auto_percent_inverse(400.0, &config), 0);
        assert_eq!(auto_percent_inverse(275.0, &config), 50);
    }

    #[test]
    fn test_degenerate_range_yields_midpoint() {
        let config = BrightnessConfig {
            lux_min: 300.0,
            lux_max: 300.0,
            min_percent: 20,
            max_percent: 60,
            ..Default::default()
        };
        assert_eq!(auto_percent_inverse(10.0, &config), 40);
    }

    #[test]
    fn test_percent_forces_manual() {
        let mut controller = BrightnessController::new(BrightnessConfig::default());
        controller.apply(BrightnessCommand {
            mode: Some(BrightnessMode::Auto),
            percent: Some(30),
        });
        assert_eq!(controller.state().mode, BrightnessMode::Manual);
        assert_eq!(controller.state().target_percent, 30);
    }
}
