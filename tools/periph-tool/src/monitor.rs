use std::sync::Arc;
use std::time::Duration;

use console::{style, Color};
use crossbeam::channel::{select, tick, Receiver, Sender};

use periph_pac::device::{LedArray, RotaryEncoder};

use crate::periph::{Peripheral, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A register changed since the previous sample. The first sample
    /// reports every register.
    Register { device: &'static str, offset: usize, value: u32 },
    /// The LED array was updated from the encoder.
    Leds { encoder: u32, pattern: u8 },
}

/// LED array pattern for an encoder reading: one more lit LED, from the
/// left, per step from 1 to 8. Anything else turns all LEDs off.
pub fn thermometer(value: u32) -> u8 {
    match value {
        1..=8 => (0xff00u16 >> value) as u8,
        _ => 0,
    }
}

/// Samples every register of `peripheral` each `interval`, reporting
/// changes, until `stop` fires or disconnects, the event receiver goes
/// away, or `samples` ticks have been taken.
pub fn watch(peripheral: Arc<Peripheral>, interval: Duration, samples: Option<usize>, events: Sender<MonitorEvent>, stop: Receiver<()>) -> Result<()> {
    let ticker = tick(interval);
    let offsets: Vec<usize> = peripheral.layout().offsets().collect();
    let mut last: Vec<Option<u32>> = vec![None; offsets.len()];
    let mut taken = 0;

    loop {
        if samples.map_or(false, |n| taken >= n) {
            return Ok(());
        }

        select! {
            recv(stop) -> _ => return Ok(()),
            recv(ticker) -> _ => {},
        }
        taken += 1;

        for (&offset, last) in offsets.iter().zip(last.iter_mut()) {
            let value = peripheral.read_word(offset)?;
            if *last != Some(value) {
                *last = Some(value);
                let event = MonitorEvent::Register { device: peripheral.name(), offset, value };
                if events.send(event).is_err() {
                    return Ok(());
                }
            }
        }
    }
}

/// Mirrors the encoder position onto the LED array as a thermometer bar.
/// The LED array is only written when the pattern changes.
pub fn encoder_to_led(encoder: Arc<Peripheral>, leds: Arc<Peripheral>, interval: Duration, events: Sender<MonitorEvent>, stop: Receiver<()>) -> Result<()> {
    let ticker = tick(interval);
    let mut shown: Option<u8> = None;

    loop {
        select! {
            recv(stop) -> _ => return Ok(()),
            recv(ticker) -> _ => {},
        }

        let reading: u32 = RotaryEncoder::new(&*encoder).state().read()?.into();
        let pattern = thermometer(reading);
        if shown == Some(pattern) {
            continue;
        }

        LedArray::new(&*leds).pattern().write(|r| r.with_LEDS(pattern))?;
        shown = Some(pattern);

        if events.send(MonitorEvent::Leds { encoder: reading, pattern }).is_err() {
            return Ok(());
        }
    }
}

pub fn print_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::Register { device, offset, value } => {
            println!("{device} {offset:02x}: {}", style(format!("{value:08x}")).fg(Color::Yellow));
        },
        MonitorEvent::Leds { encoder, pattern } => {
            let bar: String = (0..8).rev()
                .map(|bit| if pattern & (1 << bit) != 0 { '#' } else { '.' })
                .collect();
            let color = if *pattern != 0 { Color::Green } else { Color::Red };
            println!("encoder={encoder:<3} leds=[{}]", style(bar).fg(color));
        },
    }
}
