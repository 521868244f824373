use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use periph_pac::device::{RegisterIo, RegisterOffset, RegisterValue};
use periph_pac::Layout;

use super::error::{Error, Result};
use super::field::Attribute;
use super::memory::{MemoryProvider, WindowDescriptor};
use super::window::RegisterWindow;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// No resource claimed.
    Unbound,
    /// Matched to a register block, not mapped yet.
    Bound,
    /// Mapped, defaults programmed, raw and attribute surfaces published.
    Active,
    /// Teardown in progress, new operations are refused.
    Removing,
}

struct Lifecycle {
    state: State,
    descriptor: Option<WindowDescriptor>,
}

/// One peripheral instance: a [`Layout`] plus, while active, the window it
/// describes.
///
/// Operations hold a shared guard on the window for their duration;
/// [`Peripheral::remove`] stops admitting new ones, waits for those in
/// flight, then closes the window.
pub struct Peripheral {
    layout: &'static Layout,
    lifecycle: Mutex<Lifecycle>,
    published: AtomicBool,
    window: RwLock<Option<RegisterWindow>>,
}

impl Peripheral {
    pub fn new(layout: &'static Layout) -> Result<Self> {
        layout.validate()?;

        Ok(Self {
            layout,
            lifecycle: Mutex::new(Lifecycle {
                state: State::Unbound,
                descriptor: None,
            }),
            published: AtomicBool::new(false),
            window: RwLock::new(None),
        })
    }

    pub fn layout(&self) -> &'static Layout {
        self.layout
    }

    pub fn name(&self) -> &'static str {
        self.layout.device_name
    }

    pub fn span(&self) -> usize {
        self.layout.span
    }

    pub fn state(&self) -> State {
        self.lifecycle().state
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn bind(&self, descriptor: WindowDescriptor) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state != State::Unbound {
            return Err(Error::unavailable(self.name(), format!("already {:?}", lifecycle.state)));
        }
        if descriptor.span != self.layout.span {
            return Err(Error::unavailable(self.name(), format!("expected a {}-byte window, got {}", self.layout.span, descriptor.span)));
        }

        lifecycle.descriptor = Some(descriptor);
        lifecycle.state = State::Bound;
        Ok(())
    }

    /// Maps the window, programs the power-on defaults and publishes the
    /// peripheral. On failure everything acquired is released and the
    /// peripheral is left unbound.
    pub fn activate(&self, provider: &dyn MemoryProvider) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        match lifecycle.state {
            State::Bound => {},
            State::Active => return Ok(()),
            _ => return Err(Error::NotActive(self.name().to_string())),
        }

        let result = lifecycle.descriptor.as_ref()
            .ok_or_else(|| Error::NotActive(self.name().to_string()))
            .and_then(|d| RegisterWindow::open(d, provider))
            .and_then(|window| {
                self.program_defaults(&window)?;
                Ok(window)
            });

        match result {
            Ok(window) => {
                *self.window.write().unwrap_or_else(PoisonError::into_inner) = Some(window);
                self.published.store(true, Ordering::SeqCst);
                lifecycle.state = State::Active;
                Ok(())
            },
            Err(e) => {
                eprintln!("error: {}: activation failed: {e}", self.name());
                lifecycle.descriptor = None;
                lifecycle.state = State::Unbound;
                Err(e)
            },
        }
    }

    fn program_defaults(&self, window: &RegisterWindow) -> Result<()> {
        for &(name, value) in self.layout.defaults {
            let offset = self.layout.offset_of(name)
                .ok_or_else(|| Error::UnknownAttribute(name.to_string()))?;
            window.write_word(offset, value)?;
        }
        Ok(())
    }

    /// Tears the peripheral down. Removing a peripheral that is not active
    /// only drops its binding, and a removal already under way is left to
    /// finish.
    ///
    /// On an active peripheral this blocks until operations in flight have
    /// completed, so it must not be called from inside a
    /// [`Peripheral::with_window`] closure then.
    pub fn remove(&self) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle();
            match lifecycle.state {
                State::Active => {},
                State::Bound => {
                    lifecycle.descriptor = None;
                    lifecycle.state = State::Unbound;
                    return Ok(());
                },
                State::Unbound | State::Removing => return Ok(()),
            }

            lifecycle.state = State::Removing;
            self.published.store(false, Ordering::SeqCst);
        }

        // Waits for operations still holding a shared guard. The lifecycle
        // lock is not held here, so they may still query the state.
        let window = self.window.write().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(window) = window {
            window.close();
        }

        let mut lifecycle = self.lifecycle();
        lifecycle.descriptor = None;
        lifecycle.state = State::Unbound;
        Ok(())
    }

    pub fn with_window<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&RegisterWindow) -> Result<R>,
    {
        if !self.published.load(Ordering::SeqCst) {
            return Err(Error::NotActive(self.name().to_string()));
        }

        let guard = self.window.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(window) => f(window),
            None => Err(Error::NotActive(self.name().to_string())),
        }
    }

    pub fn read_word(&self, offset: usize) -> Result<u32> {
        self.with_window(|w| w.read_word(offset))
    }

    pub fn write_word(&self, offset: usize, value: u32) -> Result<()> {
        self.with_window(|w| w.write_word(offset, value))
    }

    pub fn write_from(&self, offset: usize, src: &[u8]) -> Result<()> {
        self.with_window(|w| w.write_from(offset, src))
    }

    pub fn attribute(self: &Arc<Self>, name: &str) -> Result<Attribute> {
        let field = self.layout.field(name)
            .ok_or_else(|| Error::UnknownAttribute(format!("{}/{name}", self.name())))?;
        Ok(Attribute::new(self.clone(), field))
    }

    pub fn attributes(self: &Arc<Self>) -> impl Iterator<Item=Attribute> + '_ {
        self.layout.fields.iter().map(move |field| Attribute::new(self.clone(), field))
    }
}

impl RegisterIo for Peripheral {
    type Error = Error;

    fn register_read(&self, offset: RegisterOffset) -> Result<RegisterValue> {
        self.read_word(offset)
    }

    fn register_write(&self, offset: RegisterOffset, value: RegisterValue) -> Result<()> {
        self.write_word(offset, value)
    }
}
