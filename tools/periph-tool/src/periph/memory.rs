//! Backing memory for register windows.
//!
//! A [`MemoryProvider`] turns a [`WindowDescriptor`] into a mapped
//! [`Backing`]. Each provider tracks its own claims: a region can only be
//! mapped by one window at a time, and the claim is released when the
//! backing is dropped.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::error::{Error, Result};

/// Where a peripheral's registers live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowDescriptor {
    pub name: String,
    /// Physical base address of the register block.
    pub base: u64,
    /// Length of the block in bytes.
    pub span: usize,
}

impl WindowDescriptor {
    pub fn new(name: &str, base: u64, span: usize) -> Self {
        Self {
            name: name.to_string(),
            base,
            span,
        }
    }

    /// One past the last byte, `None` if the block runs off the end of
    /// the address space.
    pub fn end(&self) -> Option<u64> {
        self.base.checked_add(self.span as u64)
    }
}

/// A mapped block of 32-bit registers.
///
/// Offsets passed in have already been checked against the span and for
/// word alignment by the window.
pub trait Backing: Send + Sync {
    fn load(&self, offset: usize) -> u32;
    fn store(&self, offset: usize, value: u32);
}

pub trait MemoryProvider {
    fn map(&self, descriptor: &WindowDescriptor) -> Result<Box<dyn Backing>>;
}

///////////////////////////////////////////////////////////////////////
// Claims

#[derive(Clone, Default)]
struct Claims(Arc<Mutex<HashMap<u64, u64>>>);

impl Claims {
    fn claim(&self, descriptor: &WindowDescriptor) -> Result<Claim> {
        let mut claimed = self.0.lock().unwrap_or_else(PoisonError::into_inner);

        let base = descriptor.base;
        let end = descriptor.end()
            .ok_or_else(|| Error::unavailable(&descriptor.name, format!("{base:#x} + {} wraps the address space", descriptor.span)))?;
        if let Some((other, _)) = claimed.iter().find(|&(&b, &e)| base < e && b < end) {
            return Err(Error::unavailable(&descriptor.name, format!("{other:#x} is already claimed")));
        }
        claimed.insert(base, end);

        Ok(Claim {
            claims: self.clone(),
            base,
        })
    }

    fn is_claimed(&self, base: u64) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).contains_key(&base)
    }
}

struct Claim {
    claims: Claims,
    base: u64,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.claims.0.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.base);
    }
}

///////////////////////////////////////////////////////////////////////
// /dev/mem

pub const DEVMEM_PATH: &str = "/dev/mem";

/// Maps physical register blocks through `/dev/mem`.
pub struct DevMemProvider {
    path: PathBuf,
    claims: Claims,
}

impl DevMemProvider {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            claims: Claims::default(),
        }
    }
}

impl Default for DevMemProvider {
    fn default() -> Self {
        Self::new(DEVMEM_PATH)
    }
}

impl MemoryProvider for DevMemProvider {
    fn map(&self, descriptor: &WindowDescriptor) -> Result<Box<dyn Backing>> {
        if descriptor.base % 4 != 0 {
            return Err(Error::unavailable(&descriptor.name, format!("base {:#x} is not word aligned", descriptor.base)));
        }
        let claim = self.claims.claim(descriptor)?;
        let mem = DevMem::map(&self.path, descriptor, claim)
            .map_err(|e| Error::unavailable(&descriptor.name, e))?;
        Ok(Box::new(mem))
    }
}

struct DevMem {
    ptr: *mut u8,
    map_base: *mut libc::c_void,
    map_size: usize,
    _claim: Claim,
}

// Only volatile word accesses go through `ptr`.
unsafe impl Send for DevMem {}
unsafe impl Sync for DevMem {}

impl DevMem {
    fn map(path: &Path, descriptor: &WindowDescriptor, claim: Claim) -> std::io::Result<Self> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)?;

        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as u64;
        let page_offset = descriptor.base % page_size;
        let map_size = descriptor.span + page_offset as usize;

        let map_base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                map_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd.as_raw_fd(),
                (descriptor.base - page_offset) as libc::off_t,
            )
        };
        if map_base == libc::MAP_FAILED {
            return Err(std::io::Error::last_os_error());
        }

        let ptr = unsafe { map_base.cast::<u8>().add(page_offset as usize) };

        Ok(Self {
            ptr,
            map_base,
            map_size,
            _claim: claim,
        })
    }
}

impl Backing for DevMem {
    fn load(&self, offset: usize) -> u32 {
        unsafe { ptr::read_volatile(self.ptr.add(offset).cast::<u32>()) }
    }

    fn store(&self, offset: usize, value: u32) {
        unsafe { ptr::write_volatile(self.ptr.add(offset).cast::<u32>(), value) }
    }
}

impl Drop for DevMem {
    fn drop(&mut self) {
        let result = unsafe { libc::munmap(self.map_base, self.map_size) };
        if result != 0 {
            eprintln!("error: munmap: {}", std::io::Error::last_os_error());
        }
    }
}

///////////////////////////////////////////////////////////////////////
// Simulated fabric

/// Register blocks held in process memory, standing in for the FPGA fabric.
///
/// Clones share the same regions and claims. Independent buses share
/// nothing.
#[derive(Clone, Default)]
pub struct SimulatedBus {
    regions: Arc<Mutex<HashMap<u64, Arc<Region>>>>,
    claims: Claims,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a zero-filled register block of `span` bytes at `base`.
    pub fn add_region(&self, base: u64, span: usize) -> Arc<Region> {
        let region = Arc::new(Region::new(span));
        self.regions.lock().unwrap_or_else(PoisonError::into_inner).insert(base, region.clone());
        region
    }

    pub fn region(&self, base: u64) -> Option<Arc<Region>> {
        self.regions.lock().unwrap_or_else(PoisonError::into_inner).get(&base).cloned()
    }

    pub fn is_claimed(&self, base: u64) -> bool {
        self.claims.is_claimed(base)
    }
}

impl MemoryProvider for SimulatedBus {
    fn map(&self, descriptor: &WindowDescriptor) -> Result<Box<dyn Backing>> {
        let region = self.region(descriptor.base)
            .ok_or_else(|| Error::unavailable(&descriptor.name, format!("nothing at {:#x}", descriptor.base)))?;
        if descriptor.span > region.span() {
            return Err(Error::unavailable(&descriptor.name, format!("region at {:#x} is only {} bytes", descriptor.base, region.span())));
        }
        let claim = self.claims.claim(descriptor)?;

        Ok(Box::new(SimulatedWindow {
            region,
            _claim: claim,
        }))
    }
}

/// One simulated register block, with access counters.
pub struct Region {
    words: Vec<AtomicU32>,
    loads: AtomicUsize,
    stores: AtomicUsize,
}

impl Region {
    fn new(span: usize) -> Self {
        Self {
            words: (0..span / 4).map(|_| AtomicU32::new(0)).collect(),
            loads: AtomicUsize::new(0),
            stores: AtomicUsize::new(0),
        }
    }

    pub fn span(&self) -> usize {
        self.words.len() * 4
    }

    /// Hardware-side view of a register; not counted as an access.
    pub fn peek(&self, offset: usize) -> u32 {
        self.words[offset / 4].load(Ordering::SeqCst)
    }

    /// Hardware-side update of a register, e.g. the encoder turning.
    pub fn poke(&self, offset: usize, value: u32) {
        self.words[offset / 4].store(value, Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn stores(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }
}

struct SimulatedWindow {
    region: Arc<Region>,
    _claim: Claim,
}

impl Backing for SimulatedWindow {
    fn load(&self, offset: usize) -> u32 {
        self.region.loads.fetch_add(1, Ordering::SeqCst);
        self.region.words[offset / 4].load(Ordering::SeqCst)
    }

    fn store(&self, offset: usize, value: u32) {
        self.region.stores.fetch_add(1, Ordering::SeqCst);
        self.region.words[offset / 4].store(value, Ordering::SeqCst)
    }
}
