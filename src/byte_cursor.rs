// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Length-checked cursors that borrow a caller buffer for the duration of
//! one call. `ByteReader` is a read cursor over a borrowed slice; `ByteWriter`
//! is its write-side counterpart over a fixed `&mut [u8]` instead of a
//! growable buffer, so every write is a bounded slice operation and
//! running past the end returns `EncodeError::NoMemory` rather than
//! reallocating.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{BadParameterKind, DecodeError, EncodeError, MalformedReason};

/// Maximum length of a UTF-8 string or binary data field on the wire.
pub const MAX_STRING_LEN: usize = 0xffff;

/// Borrowing read cursor over an immutable byte slice.
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Number of unread bytes remaining.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn too_short() -> DecodeError {
        DecodeError::MalformedPacket(MalformedReason::BufferTooShort)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self.data.get(self.offset).ok_or_else(Self::too_short)?;
        self.offset += 1;
        Ok(byte)
    }

    /// Returns the next byte without advancing the cursor.
    pub fn peek_u8(&self) -> Result<u8, DecodeError> {
        self.data.get(self.offset).copied().ok_or_else(Self::too_short)
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(BigEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(BigEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.offset.checked_add(len).ok_or_else(Self::too_short)?;
        if end > self.data.len() {
            return Err(Self::too_short());
        }
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    /// Reads a 2-byte length prefix followed by that many bytes of UTF-8.
    pub fn read_utf8_str(&mut self) -> Result<&'a str, DecodeError> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map_err(|_| DecodeError::MalformedPacket(MalformedReason::InvalidUtf8))
    }

    /// Reads a 2-byte length prefix followed by that many bytes of binary data.
    pub fn read_binary(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_u16()? as usize;
        self.read_bytes(len)
    }
}

/// Bounded write cursor over a caller-owned, fixed-capacity byte slice. No
/// write ever grows the underlying buffer; writing past the end returns
/// `EncodeError::NoMemory`.
pub struct ByteWriter<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> ByteWriter<'a> {
    #[must_use]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn write_u8(&mut self, v: u8) -> Result<(), EncodeError> {
        let slot = self.buf.get_mut(self.offset).ok_or(EncodeError::NoMemory)?;
        *slot = v;
        self.offset += 1;
        Ok(())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<(), EncodeError> {
        let mut tmp = [0u8; 2];
        BigEndian::write_u16(&mut tmp, v);
        self.write_bytes(&tmp)
    }

    pub fn write_u32(&mut self, v: u32) -> Result<(), EncodeError> {
        let mut tmp = [0u8; 4];
        BigEndian::write_u32(&mut tmp, v);
        self.write_bytes(&tmp)
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        let end = self.offset.checked_add(data.len()).ok_or(EncodeError::NoMemory)?;
        if end > self.buf.len() {
            return Err(EncodeError::NoMemory);
        }
        self.buf[self.offset..end].copy_from_slice(data);
        self.offset = end;
        Ok(())
    }

    /// Writes a 2-byte big-endian length prefix followed by `s`.
    ///
    /// # Errors
    ///
    /// Returns `BadParameter` if `s` exceeds 65535 bytes, `NoMemory` if the
    /// buffer cannot hold it.
    pub fn write_utf8_str(&mut self, s: &str) -> Result<(), EncodeError> {
        if s.len() > MAX_STRING_LEN {
            return Err(EncodeError::BadParameter(BadParameterKind::StringTooLong));
        }
        #[allow(clippy::cast_possible_truncation)]
        self.write_u16(s.len() as u16)?;
        self.write_bytes(s.as_bytes())
    }

    /// Writes a 2-byte big-endian length prefix followed by `data`.
    ///
    /// # Errors
    ///
    /// Returns `BadParameter` if `data` exceeds 65535 bytes, `NoMemory` if
    /// the buffer cannot hold it.
    pub fn write_binary(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        if data.len() > MAX_STRING_LEN {
            return Err(EncodeError::BadParameter(BadParameterKind::BinaryTooLong));
        }
        #[allow(clippy::cast_possible_truncation)]
        self.write_u16(data.len() as u16)?;
        self.write_bytes(data)
    }
}

/// Size in bytes a 2-byte-length-prefixed UTF-8 string occupies on the wire.
#[must_use]
pub const fn utf8_size(s: &str) -> usize {
    2 + s.len()
}

/// Size in bytes a 2-byte-length-prefixed binary field occupies on the wire.
#[must_use]
pub const fn binary_size(data: &[u8]) -> usize {
    2 + data.len()
}

/// `utf8_size`, but rejected up front with `BadParameter` if `s` would
/// overflow the 2-byte length prefix. Lets size calculators fail the same
/// way `ByteWriter::write_utf8_str` would, before any bytes are written.
pub fn checked_utf8_size(s: &str) -> Result<usize, EncodeError> {
    if s.len() > MAX_STRING_LEN {
        return Err(EncodeError::BadParameter(BadParameterKind::StringTooLong));
    }
    Ok(utf8_size(s))
}

/// `binary_size`, but rejected up front with `BadParameter` if `data` would
/// overflow the 2-byte length prefix.
pub fn checked_binary_size(data: &[u8]) -> Result<usize, EncodeError> {
    if data.len() > MAX_STRING_LEN {
        return Err(EncodeError::BadParameter(BadParameterKind::BinaryTooLong));
    }
    Ok(binary_size(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_round_trip() {
        let mut buf = [0u8; 16];
        {
            let mut w = ByteWriter::new(&mut buf);
            w.write_u8(0x12).unwrap();
            w.write_u16(0x3456).unwrap();
            w.write_u32(0x789a_bcde).unwrap();
            w.write_utf8_str("hi").unwrap();
        }
        let mut r = ByteReader::new(&buf);
        assert_eq!(r.read_u8().unwrap(), 0x12);
        assert_eq!(r.read_u16().unwrap(), 0x3456);
        assert_eq!(r.read_u32().unwrap(), 0x789a_bcde);
        assert_eq!(r.read_utf8_str().unwrap(), "hi");
    }

    #[test]
    fn write_past_capacity_is_no_memory() {
        let mut buf = [0u8; 1];
        let mut w = ByteWriter::new(&mut buf);
        assert_eq!(w.write_u16(1).unwrap_err(), EncodeError::NoMemory);
    }

    #[test]
    fn read_past_end_is_malformed() {
        let buf = [0u8; 1];
        let mut r = ByteReader::new(&buf);
        let _ = r.read_u8().unwrap();
        assert!(r.read_u8().is_err());
    }
}
