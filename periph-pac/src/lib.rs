//! Register descriptions for the SoC FPGA peripherals: buzzer, LED array,
//! RGB LED PWM controller and rotary encoder.
//!
//! Nothing in here performs I/O by itself. The [`device`] accessors work
//! over anything that implements [`device::RegisterIo`].

pub mod device;
pub mod layout;
pub mod register;

pub use layout::{AccessMode, FieldDef, Layout, LayoutError, Radix};
