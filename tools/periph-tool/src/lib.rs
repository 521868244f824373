//! Register access for the buzzer, LED array, RGB LED and rotary encoder
//! soft peripherals, through `/dev/mem` or a simulated fabric.

pub mod monitor;
pub mod periph;
