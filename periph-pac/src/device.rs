use core::marker::PhantomData;

use crate::layout::{self, Layout, WORD};
use crate::register::*;

pub type RegisterOffset = usize;
pub type RegisterValue = u32;

/// Word access to one peripheral's register window.
pub trait RegisterIo {
    type Error;

    fn register_read(&self, offset: RegisterOffset) -> Result<RegisterValue, Self::Error>;
    fn register_write(&self, offset: RegisterOffset, value: RegisterValue) -> Result<(), Self::Error>;
}

pub struct Access<'a, D, T>
where D: RegisterIo,
{
    device: &'a D,
    offset: usize,
    t: PhantomData<T>,
}

impl<'a, D, T> Access<'a, D, T>
where D: RegisterIo,
{
    fn new(device: &'a D, offset: usize) -> Self {
        Self {
            device,
            offset,
            t: PhantomData,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<D, T> Access<'_, D, T>
where D: RegisterIo,
      T: From<u32>,
{
    pub fn read(&self) -> Result<T, D::Error> {
        Ok(T::from(self.device.register_read(self.offset)?))
    }
}

impl<D, T> Access<'_, D, T>
where D: RegisterIo,
      T: From<u32> + Into<u32>,
{
    /// Writes `f` applied to an all-zero register, without reading first.
    pub fn write<F>(&self, f: F) -> Result<(), D::Error>
    where
        F: FnOnce(T) -> T,
    {
        let value = T::from(0);
        let new_value = f(value);
        self.device.register_write(self.offset, new_value.into())
    }

    /// Read-modify-write. Not atomic with respect to other writers.
    pub fn modify<F>(&self, f: F) -> Result<(), D::Error>
    where
        F: FnOnce(T) -> T,
    {
        let value = self.read()?;
        let new_value = f(value);
        self.device.register_write(self.offset, new_value.into())
    }
}

///////////////////////////////////////////////////////////////////////
// Buzzer

pub struct Buzzer<'a, D>
where D: RegisterIo,
{
    device: &'a D,
}

impl<'a, D> Buzzer<'a, D>
where D: RegisterIo,
{
    pub fn new(device: &'a D) -> Self {
        Self {
            device,
        }
    }

    fn access<T>(&self, name: &str) -> Access<'_, D, T> {
        Access::new(self.device, Addressing::field(&layout::BUZZER, name))
    }

    pub fn volume(&self) -> Access<D, BZVOL> { self.access("volume") }
    pub fn pitch (&self) -> Access<D, BZPER> { self.access("pitch") }
}

///////////////////////////////////////////////////////////////////////
// LED array

pub struct LedArray<'a, D>
where D: RegisterIo,
{
    device: &'a D,
}

impl<'a, D> LedArray<'a, D>
where D: RegisterIo,
{
    pub fn new(device: &'a D) -> Self {
        Self {
            device,
        }
    }

    pub fn pattern(&self) -> Access<D, LEDARR> {
        Access::new(self.device, Addressing::field(&layout::LED_ARRAY, "led_array"))
    }
}

///////////////////////////////////////////////////////////////////////
// RGB LED

pub struct RgbLed<'a, D>
where D: RegisterIo,
{
    device: &'a D,
    layout: &'static Layout,
}

impl<'a, D> RgbLed<'a, D>
where D: RegisterIo,
{
    /// `layout` selects the register order, see [`layout::RGB_LED`] and
    /// [`layout::RGB_LED_PERIOD_FIRST`].
    pub fn new(device: &'a D, layout: &'static Layout) -> Self {
        Self {
            device,
            layout,
        }
    }

    fn access<T>(&self, name: &str) -> Access<'_, D, T> {
        Access::new(self.device, Addressing::field(self.layout, name))
    }

    pub fn red_duty_cycle  (&self) -> Access<D, u32> { self.access("red_duty_cycle") }
    pub fn green_duty_cycle(&self) -> Access<D, u32> { self.access("green_duty_cycle") }
    pub fn blue_duty_cycle (&self) -> Access<D, u32> { self.access("blue_duty_cycle") }
    pub fn period          (&self) -> Access<D, u32> { self.access("period") }

    /// Sets all three duty cycles, one register at a time.
    pub fn set_color(&self, red: u32, green: u32, blue: u32) -> Result<(), D::Error> {
        self.red_duty_cycle().write(|_| red)?;
        self.green_duty_cycle().write(|_| green)?;
        self.blue_duty_cycle().write(|_| blue)
    }
}

///////////////////////////////////////////////////////////////////////
// Rotary encoder

pub struct RotaryEncoder<'a, D>
where D: RegisterIo,
{
    device: &'a D,
}

impl<'a, D> RotaryEncoder<'a, D>
where D: RegisterIo,
{
    pub fn new(device: &'a D) -> Self {
        Self {
            device,
        }
    }

    fn access<T>(&self, name: &str) -> Access<'_, D, T> {
        Access::new(self.device, Addressing::field(&layout::ROTARY, name))
    }

    pub fn state (&self) -> Access<D, ENCSTATE> { self.access("output") }
    pub fn enable(&self) -> Access<D, ENCEN>    { self.access("enable") }
}

/// Register window addressing
///
struct Addressing {}

impl Addressing {
    fn word(span: usize, offset: usize) -> usize {
        assert!(offset % WORD == 0);
        assert!(offset < span);
        offset
    }

    /// Offset of the field called `name` in `layout`.
    fn field(layout: &Layout, name: &str) -> usize {
        let offset = match layout.offset_of(name) {
            Some(offset) => offset,
            None => panic!("no field named {name} in {}", layout.device_name),
        };
        Self::word(layout.span, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use core::cell::{Cell, RefCell};

    /// Sixteen bytes of plain memory that records every access.
    #[derive(Default)]
    struct Scratch {
        words: RefCell<[u32; 4]>,
        log: RefCell<Vec<(char, usize, u32)>>,
        reads: Cell<usize>,
    }

    impl RegisterIo for Scratch {
        type Error = ();

        fn register_read(&self, offset: RegisterOffset) -> Result<RegisterValue, ()> {
            self.reads.set(self.reads.get() + 1);
            let value = self.words.borrow()[offset / WORD];
            self.log.borrow_mut().push(('r', offset, value));
            Ok(value)
        }

        fn register_write(&self, offset: RegisterOffset, value: RegisterValue) -> Result<(), ()> {
            self.words.borrow_mut()[offset / WORD] = value;
            self.log.borrow_mut().push(('w', offset, value));
            Ok(())
        }
    }

    #[test]
    fn write_does_not_read() {
        let scratch = Scratch::default();
        LedArray::new(&scratch).pattern().write(|r| r.with_LEDS(0xf0)).unwrap();
        assert_eq!(scratch.reads.get(), 0);
        assert_eq!(scratch.words.borrow()[0], 0xf0);
    }

    #[test]
    fn modify_reads_then_writes() {
        let scratch = Scratch::default();
        scratch.words.borrow_mut()[1] = 0x0106;
        let buzzer = Buzzer::new(&scratch);
        buzzer.pitch().modify(|r| r.with_MS(1)).unwrap();
        assert_eq!(*scratch.log.borrow(), [('r', 4, 0x0106), ('w', 4, (1 << 26) | 0x0106)]);
    }

    #[test]
    fn rgb_order_follows_layout() {
        let scratch = Scratch::default();
        RgbLed::new(&scratch, &layout::RGB_LED).period().write(|_| 7).unwrap();
        RgbLed::new(&scratch, &layout::RGB_LED_PERIOD_FIRST).period().write(|_| 9).unwrap();
        assert_eq!(*scratch.words.borrow(), [9, 0, 0, 7]);
    }

    #[test]
    fn set_color_writes_each_duty_cycle() {
        let scratch = Scratch::default();
        RgbLed::new(&scratch, &layout::RGB_LED).set_color(1, 2, 3).unwrap();
        assert_eq!(*scratch.words.borrow(), [1, 2, 3, 0]);
    }

    #[test]
    fn rotary_views() {
        let scratch = Scratch::default();
        *scratch.words.borrow_mut() = [5, 1, 0, 0];
        let encoder = RotaryEncoder::new(&scratch);
        assert_eq!(encoder.state().read().unwrap().COUNT(), 5);
        assert!(encoder.enable().read().unwrap().BUTTON());
        assert_eq!(encoder.enable().offset(), 4);
    }

    #[test]
    fn addressing_word() {
        assert_eq!(Addressing::word(16, 0), 0);
        assert_eq!(Addressing::word(16, 12), 12);
    }

    #[test]
    #[should_panic(expected="offset % WORD == 0")]
    fn addressing_word_misaligned() {
        let _ = Addressing::word(16, 6);
    }

    #[test]
    #[should_panic(expected="offset < span")]
    fn addressing_word_outside_span() {
        let _ = Addressing::word(16, 16);
    }

    #[test]
    #[should_panic(expected="no field named gain in buzzer")]
    fn addressing_unknown_field() {
        let _ = Addressing::field(&layout::BUZZER, "gain");
    }
}
