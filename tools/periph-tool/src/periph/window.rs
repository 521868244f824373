use std::sync::{Mutex, MutexGuard, PoisonError};

use periph_pac::device::{RegisterIo, RegisterOffset, RegisterValue};
use periph_pac::layout::WORD;

use super::error::{Error, Result};
use super::memory::{Backing, MemoryProvider, WindowDescriptor};

/// A claimed and mapped block of 32-bit registers.
///
/// Every access is checked against the span and for word alignment before
/// the hardware is touched. Stores are serialized by a per-window lock;
/// loads are not, since a single word load cannot tear.
///
/// Dropping the window (or calling [`RegisterWindow::close`]) unmaps the
/// block and releases its claim.
pub struct RegisterWindow {
    name: String,
    span: usize,
    backing: Box<dyn Backing>,
    write_lock: Mutex<()>,
}

impl RegisterWindow {
    pub fn open(descriptor: &WindowDescriptor, provider: &dyn MemoryProvider) -> Result<Self> {
        if descriptor.span == 0 || descriptor.span % WORD != 0 {
            return Err(Error::unavailable(&descriptor.name, format!("span {} is not a whole number of words", descriptor.span)));
        }
        if descriptor.base % WORD as u64 != 0 {
            return Err(Error::unavailable(&descriptor.name, format!("base {:#x} is not word aligned", descriptor.base)));
        }
        if descriptor.end().is_none() {
            return Err(Error::unavailable(&descriptor.name, format!("{:#x} + {} wraps the address space", descriptor.base, descriptor.span)));
        }

        let backing = provider.map(descriptor)?;

        Ok(Self {
            name: descriptor.name.clone(),
            span: descriptor.span,
            backing,
            write_lock: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn span(&self) -> usize {
        self.span
    }

    fn check(&self, op: &str, offset: usize) -> Result<()> {
        if offset >= self.span {
            eprintln!("warn: {}: {op}: offset {offset:#x} is past the end of the window", self.name);
            return Err(Error::OutOfRange { offset, span: self.span });
        }
        if offset % WORD != 0 {
            eprintln!("warn: {}: {op}: unaligned access at {offset:#x}", self.name);
            return Err(Error::Misaligned(offset));
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data is (), a panicking writer cannot leave it inconsistent.
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read_word(&self, offset: usize) -> Result<u32> {
        self.check("read", offset)?;
        Ok(self.backing.load(offset))
    }

    pub fn write_word(&self, offset: usize, value: u32) -> Result<()> {
        self.check("write", offset)?;

        let _guard = self.lock();
        self.backing.store(offset, value);
        Ok(())
    }

    /// Stages a native-endian word from `src` and stores it at `offset`.
    ///
    /// Only the first four bytes of `src` are used. With fewer than four
    /// bytes available nothing is written.
    pub fn write_from(&self, offset: usize, src: &[u8]) -> Result<()> {
        self.check("write", offset)?;

        let _guard = self.lock();
        let bytes = match src.get(..WORD) {
            Some(bytes) => bytes,
            None => {
                eprintln!("warn: {}: write: nothing copied, {} of {WORD} bytes available", self.name, src.len());
                return Err(Error::TransferIncomplete { staged: src.len(), expected: WORD });
            },
        };
        let value: u32 = bytemuck::pod_read_unaligned(bytes);
        self.backing.store(offset, value);
        Ok(())
    }

    pub fn close(self) {
        drop(self)
    }
}

impl RegisterIo for RegisterWindow {
    type Error = Error;

    fn register_read(&self, offset: RegisterOffset) -> Result<RegisterValue> {
        self.read_word(offset)
    }

    fn register_write(&self, offset: RegisterOffset, value: RegisterValue) -> Result<()> {
        self.write_word(offset, value)
    }
}
