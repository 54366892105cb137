// Hardware Abstraction Layer (HAL) Module
//
// Konkrete Treiber hinter den Traits aus esp-core.
// Die Tasks kennen nur die Traits, Tests nutzen Mocks aus esp-tests.

pub mod display;
pub mod led_matrix;
pub mod sensors;

pub use display::OledDisplay;
pub use led_matrix::RmtLedMatrix;
pub use sensors::{Aht10, Bh1750};
