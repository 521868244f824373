use std::fmt;
use std::sync::Arc;

use periph_pac::{FieldDef, Radix};

use super::device::Peripheral;
use super::error::{Error, Result};

/// Named, single-register view of a peripheral, the attribute surface.
///
/// The attribute does not own the register window, every access goes
/// through the peripheral and fails once it has been removed.
#[derive(Clone)]
pub struct Attribute {
    peripheral: Arc<Peripheral>,
    field: &'static FieldDef,
}

impl Attribute {
    pub(crate) fn new(peripheral: Arc<Peripheral>, field: &'static FieldDef) -> Self {
        Self {
            peripheral,
            field,
        }
    }

    pub fn name(&self) -> &'static str {
        self.field.name
    }

    pub fn field(&self) -> &'static FieldDef {
        self.field
    }

    pub fn get(&self) -> Result<u32> {
        self.peripheral.read_word(self.field.offset)
    }

    /// Parses `text` and writes it to the register.
    ///
    /// Read-only fields accept any input and discard it: the call succeeds
    /// without touching the hardware.
    pub fn set(&self, text: &str) -> Result<()> {
        if !self.field.is_writable() {
            return Ok(());
        }

        let value = parse_u32(text)?;
        self.peripheral.write_word(self.field.offset, value)
    }

    /// Reads the register and renders it the way the attribute file shows it.
    pub fn show(&self) -> Result<String> {
        let value = self.get()?;
        Ok(render(self.field, value))
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.peripheral.name(), self.field.name)
    }
}

fn render(field: &FieldDef, value: u32) -> String {
    let value = match field.radix {
        Radix::Hex => format!("{value:x}"),
        Radix::Decimal => format!("{value}"),
    };
    match field.label {
        Some(label) => format!("{label} = {value}\n"),
        None => format!("{value}\n"),
    }
}

/// Splits off an optional radix prefix: `0x`/`0X` for hex, a leading `0`
/// for octal, decimal otherwise. Accepts a leading `+` and one trailing
/// newline.
fn split_radix(text: &str) -> Option<(&str, u32)> {
    let s = text.strip_suffix('\n').unwrap_or(text);
    let s = s.strip_prefix('+').unwrap_or(s);

    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    Some((digits, radix))
}

pub fn parse_u32(text: &str) -> Result<u32> {
    split_radix(text)
        .and_then(|(digits, radix)| u32::from_str_radix(digits, radix).ok())
        .ok_or_else(|| Error::Parse { text: text.to_string() })
}

pub fn parse_u64(text: &str) -> Result<u64> {
    split_radix(text)
        .and_then(|(digits, radix)| u64::from_str_radix(digits, radix).ok())
        .ok_or_else(|| Error::Parse { text: text.to_string() })
}

#[cfg(test)]
mod tests {
    use periph_pac::layout::{BUZZER, LED_ARRAY, RGB_LED, ROTARY};
    use periph_pac::Layout;

    use super::*;
    use crate::periph::memory::{SimulatedBus, WindowDescriptor};

    const BASE: u64 = 0xff20_0000;

    fn active(layout: &'static Layout) -> (SimulatedBus, Arc<Peripheral>) {
        let bus = SimulatedBus::new();
        bus.add_region(BASE, layout.span);
        let p = Arc::new(Peripheral::new(layout).unwrap());
        p.bind(WindowDescriptor::new(layout.device_name, BASE, layout.span)).unwrap();
        p.activate(&bus).unwrap();
        (bus, p)
    }

    #[test]
    fn parse_radixes() {
        assert_eq!(parse_u32("31").unwrap(), 31);
        assert_eq!(parse_u32("0x1F").unwrap(), 31);
        assert_eq!(parse_u32("0X1f").unwrap(), 31);
        assert_eq!(parse_u32("037").unwrap(), 31);
        assert_eq!(parse_u32("0").unwrap(), 0);
        assert_eq!(parse_u32("+7").unwrap(), 7);
        assert_eq!(parse_u32("42\n").unwrap(), 42);
        assert_eq!(parse_u32("4294967295").unwrap(), u32::MAX);
        assert_eq!(parse_u32("0xffffffff").unwrap(), u32::MAX);
    }

    #[test]
    fn parse_rejects() {
        for text in ["", "\n", "0x", "-1", "+", "12abc", " 12", "12 ", "08", "0x1g", "4294967296", "0x100000000", "1\n\n"] {
            assert!(matches!(parse_u32(text), Err(Error::Parse { .. })), "{text:?}");
        }
    }

    #[test]
    fn parse_u64_addresses() {
        assert_eq!(parse_u64("0xff200000").unwrap(), 0xff20_0000);
        assert_eq!(parse_u64("0x1_0000_0000").ok(), None);
        assert_eq!(parse_u64("0x100000000").unwrap(), 0x1_0000_0000);
    }

    #[test]
    fn set_then_get() {
        let (_bus, p) = active(&RGB_LED);
        let red = p.attribute("red_duty_cycle").unwrap();
        red.set("0x1F").unwrap();
        assert_eq!(red.get().unwrap(), 31);
        assert_eq!(p.read_word(0).unwrap(), 31);
    }

    #[test]
    fn set_rejects_bad_text_without_writing() {
        let (bus, p) = active(&BUZZER);
        let stores = bus.region(BASE).unwrap().stores();
        let volume = p.attribute("volume").unwrap();
        assert!(matches!(volume.set("loud"), Err(Error::Parse { .. })));
        assert_eq!(bus.region(BASE).unwrap().stores(), stores);
    }

    #[test]
    fn read_only_set_is_discarded() {
        let (bus, p) = active(&ROTARY);
        let region = bus.region(BASE).unwrap();
        region.poke(0, 0x12);

        for name in ["output", "enable"] {
            let attr = p.attribute(name).unwrap();
            let before = attr.get().unwrap();
            assert!(attr.set("0xffff").is_ok());
            assert!(attr.set("not a number").is_ok());
            assert_eq!(attr.get().unwrap(), before);
        }
        assert_eq!(region.stores(), 0);
    }

    #[test]
    fn show_matches_the_attribute_files() {
        let (_bus, p) = active(&RGB_LED);
        p.attribute("red_duty_cycle").unwrap().set("255").unwrap();
        assert_eq!(p.attribute("red_duty_cycle").unwrap().show().unwrap(), "Red duty cycle = ff\n");
        assert_eq!(p.attribute("period").unwrap().show().unwrap(), "Period = 1\n");

        let (_bus, p) = active(&LED_ARRAY);
        assert_eq!(p.attribute("led_array").unwrap().show().unwrap(), "255\n");

        let (_bus, p) = active(&BUZZER);
        assert_eq!(p.attribute("pitch").unwrap().show().unwrap(), "Pitch = 106\n");
    }

    #[test]
    fn unknown_attribute() {
        let (_bus, p) = active(&BUZZER);
        assert!(matches!(p.attribute("treble"), Err(Error::UnknownAttribute(name)) if name == "buzzer/treble"));
    }

    #[test]
    fn attributes_in_layout_order() {
        let (_bus, p) = active(&RGB_LED);
        let names: Vec<&str> = p.attributes().map(|a| a.name()).collect();
        assert_eq!(names, ["red_duty_cycle", "green_duty_cycle", "blue_duty_cycle", "period"]);
        assert_eq!(format!("{:?}", p.attribute("period").unwrap()), "rgb_led/period");
    }
}
