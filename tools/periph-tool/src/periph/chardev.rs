use std::io::{self, SeekFrom};
use std::sync::Arc;

use periph_pac::layout::WORD;

use super::device::Peripheral;
use super::error::{Error, Result};

/// An open handle on a peripheral's raw register interface.
///
/// Each read or write moves exactly one native-endian word and advances the
/// position by four. Offsets at or past the end of the window read and
/// write zero bytes, like the end of a file.
pub struct DeviceFile {
    peripheral: Arc<Peripheral>,
    position: i64,
}

impl DeviceFile {
    pub fn new(peripheral: Arc<Peripheral>) -> Self {
        Self {
            peripheral,
            position: 0,
        }
    }

    pub fn peripheral(&self) -> &Arc<Peripheral> {
        &self.peripheral
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    /// `None` when `offset` is at or past the end of the window.
    fn locate(&self, offset: i64) -> Result<Option<usize>> {
        if offset < 0 {
            return Err(Error::InvalidArgument(offset));
        }
        match usize::try_from(offset) {
            Ok(offset) if offset < self.peripheral.span() => Ok(Some(offset)),
            _ => Ok(None),
        }
    }

    pub fn read_at(&self, buf: &mut [u8], offset: i64) -> Result<usize> {
        let offset = match self.locate(offset)? {
            Some(offset) => offset,
            None => return Ok(0),
        };
        if buf.len() < WORD {
            return Err(Error::TransferIncomplete { staged: buf.len(), expected: WORD });
        }

        let value = self.peripheral.read_word(offset)?;
        buf[..WORD].copy_from_slice(bytemuck::bytes_of(&value));
        Ok(WORD)
    }

    pub fn write_at(&self, buf: &[u8], offset: i64) -> Result<usize> {
        let offset = match self.locate(offset)? {
            Some(offset) => offset,
            None => return Ok(0),
        };

        self.peripheral.write_from(offset, buf)?;
        Ok(WORD)
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.read_at(buf, self.position)?;
        self.position += n as i64;
        Ok(n)
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.write_at(buf, self.position)?;
        self.position += n as i64;
        Ok(n)
    }

    /// Any non-negative position is accepted, including past the end.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let span = self.peripheral.span() as i64;
        let position = match pos {
            SeekFrom::Start(n) => i64::try_from(n).ok(),
            SeekFrom::Current(delta) => self.position.checked_add(delta),
            SeekFrom::End(delta) => span.checked_add(delta),
        };

        match position {
            Some(position) if position >= 0 => {
                self.position = position;
                Ok(position as u64)
            },
            Some(position) => Err(Error::InvalidArgument(position)),
            None => Err(Error::InvalidArgument(i64::MAX)),
        }
    }

    pub fn read_u32(&mut self) -> Result<Option<u32>> {
        let mut buf = [0u8; WORD];
        match self.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(bytemuck::pod_read_unaligned(&buf))),
        }
    }

    pub fn write_u32(&mut self, value: u32) -> Result<usize> {
        self.write(bytemuck::bytes_of(&value))
    }
}

impl io::Read for DeviceFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        DeviceFile::read(self, buf).map_err(Into::into)
    }
}

impl io::Write for DeviceFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        DeviceFile::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for DeviceFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        DeviceFile::seek(self, pos).map_err(Into::into)
    }
}
