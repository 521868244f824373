use std::io::Write;
use std::sync::Arc;

use periph_pac::device::{Buzzer, LedArray, RgbLed, RotaryEncoder};
use periph_pac::layout::{BUZZER, LED_ARRAY, RGB_LED, RGB_LED_PERIOD_FIRST, ROTARY};

use super::device::Peripheral;
use super::error::Result;

/// Every word of the window, four to a line.
pub fn registers_dump_raw<W: Write>(peripheral: &Peripheral, out: &mut W) -> Result<()> {
    for offset in peripheral.layout().offsets() {
        let value = peripheral.read_word(offset)?;
        if offset % 16 == 0 {
            write!(out, "{offset:04x}:")?;
        }
        write!(out, " {value:08x}")?;
        if offset % 16 == 12 {
            writeln!(out)?;
        }
    }
    if peripheral.span() % 16 != 0 {
        writeln!(out)?;
    }

    Ok(())
}

/// Registers decoded through the typed accessors. Layouts without typed
/// accessors get one line per field.
pub fn registers_dump_debug<W: Write>(peripheral: &Peripheral, out: &mut W) -> Result<()> {
    let layout = peripheral.layout();
    write!(out, "{}", layout.device_name)?;

    if *layout == BUZZER {
        let buzzer = Buzzer::new(peripheral);
        writeln!(out, "\t{:?}", buzzer.volume().read()?)?;
        writeln!(out, "\t{:?}", buzzer.pitch ().read()?)?;
    } else if *layout == LED_ARRAY {
        writeln!(out, "\t{:?}", LedArray::new(peripheral).pattern().read()?)?;
    } else if *layout == ROTARY {
        let encoder = RotaryEncoder::new(peripheral);
        writeln!(out, "\t{:?}", encoder.state ().read()?)?;
        writeln!(out, "\t{:?}", encoder.enable().read()?)?;
    } else if *layout == RGB_LED || *layout == RGB_LED_PERIOD_FIRST {
        let rgb = RgbLed::new(peripheral, layout);
        writeln!(out, "\tRED={:#x}", rgb.red_duty_cycle().read()?)?;
        writeln!(out, "\tGREEN={:#x}", rgb.green_duty_cycle().read()?)?;
        writeln!(out, "\tBLUE={:#x}", rgb.blue_duty_cycle().read()?)?;
        writeln!(out, "\tPERIOD={}", rgb.period().read()?)?;
    } else {
        if layout.fields.is_empty() {
            writeln!(out)?;
        }
        for field in layout.fields {
            writeln!(out, "\t{}={:#x}", field.name, peripheral.read_word(field.offset)?)?;
        }
    }

    Ok(())
}

/// Each attribute as its file would show it.
pub fn attributes_dump<W: Write>(peripheral: &Arc<Peripheral>, out: &mut W) -> Result<()> {
    for attribute in peripheral.attributes() {
        write!(out, "{}/{}: {}", peripheral.name(), attribute.name(), attribute.show()?)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use periph_pac::{FieldDef, Layout};

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

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let mut out = vec![];
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn raw_dump_of_the_rgb_window() {
        let (_bus, p) = active(&RGB_LED);
        let text = render(|out| registers_dump_raw(&p, out));
        assert_eq!(text, "0000: 00000000 00000000 00000000 00000001\n");

        let (_bus, p) = active(&RGB_LED_PERIOD_FIRST);
        let text = render(|out| registers_dump_raw(&p, out));
        assert_eq!(text, "0000: 00000001 00000000 00000000 00000000\n");
    }

    #[test]
    fn attributes_dump_uses_the_show_format() {
        let (bus, p) = active(&ROTARY);
        bus.region(BASE).unwrap().poke(0, 0x2a);
        let text = render(|out| attributes_dump(&p, out));
        assert_eq!(text, "rotary/output: Output = 2a\nrotary/enable: enable = 0\n");
    }

    #[test]
    fn debug_dump_decodes_fields() {
        let (bus, p) = active(&LED_ARRAY);
        bus.region(BASE).unwrap().poke(0, 0xf0);
        let text = render(|out| registers_dump_debug(&p, out));
        assert!(text.starts_with("led_array\t"));
        assert!(text.contains("LEDARR"));

        let (_bus, p) = active(&RGB_LED);
        let text = render(|out| registers_dump_debug(&p, out));
        assert!(text.contains("PERIOD=1\n"));
    }

    static PWM: Layout = Layout {
        device_name: "pwm",
        compatible: "Acme,pwm",
        span: 16,
        fields: &[
            FieldDef::new("duty",   0x0),
            FieldDef::new("period", 0x8).decimal(),
        ],
        defaults: &[
            ("period", 0x20),
        ],
    };

    /// Shares its compatible string with the RGB LED but not its fields.
    static RGB_LED_RED_ONLY: Layout = Layout {
        device_name: "rgb_led",
        compatible: "Howard,rgb_led",
        span: 16,
        fields: &[
            FieldDef::new("red_duty_cycle", 0x0),
        ],
        defaults: &[],
    };

    #[test]
    fn debug_dump_of_a_custom_layout() {
        let (bus, p) = active(&PWM);
        bus.region(BASE).unwrap().poke(0, 0x7f);
        let text = render(|out| registers_dump_debug(&p, out));
        assert_eq!(text, "pwm\tduty=0x7f\n\tperiod=0x20\n");

        let (_bus, p) = active(&RGB_LED_RED_ONLY);
        let text = render(|out| registers_dump_debug(&p, out));
        assert_eq!(text, "rgb_led\tred_duty_cycle=0x0\n");
    }
}
