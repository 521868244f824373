#![allow(non_snake_case)]
#![allow(non_camel_case_types)]
#![allow(clippy::upper_case_acronyms)]

use modular_bitfield_msb::prelude::*;

///////////////////////////////////////////////////////////////////////
// Buzzer

/// Buzzer volume register (BZVOL) - offset 0x0
///
/// * DUTY: PWM duty cycle of the buzzer drive, 1.19 fixed point.
///   0x80000 is a 100% duty cycle, which is the loudest setting.
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct BZVOL {
    #[skip] __: B12,
    pub DUTY: B20,
}

impl BZVOL {
    pub const DUTY_FULL: u32 = 0x8_0000;
}

/// Buzzer pitch register (BZPER) - offset 0x4
///
/// Period of the tone, 6.26 fixed point milliseconds: the top six bits
/// hold whole milliseconds and the remaining bits the fraction.
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct BZPER {
    pub MS: B6,
    pub FRAC: B26,
}

///////////////////////////////////////////////////////////////////////
// LED array

/// LED array register (LEDARR) - offset 0x0
///
/// * LEDS: one bit per LED, bit 7 is the leftmost LED.
///   The upper bytes of the word are ignored by the hardware.
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct LEDARR {
    #[skip] __: B24,
    pub LEDS: B8,
}

///////////////////////////////////////////////////////////////////////
// Rotary encoder

/// Encoder state register (ENCSTATE) - offset 0x0
///
/// * COUNT: detent count, saturating at 0 and 63.
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct ENCSTATE {
    #[skip] __: B26,
    pub COUNT: B6,
}

/// Encoder enable register (ENCEN) - offset 0x4
///
/// * BUTTON: push button state, toggled on every press.
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct ENCEN {
    #[skip] __: B31,
    pub BUTTON: bool,
}
