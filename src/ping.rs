// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! PINGREQ and PINGRESP: both are 2-byte packets with an empty Remaining
//! Length and no variable header or payload.

use crate::byte_cursor::ByteWriter;
use crate::error::EncodeError;
use crate::header;
use crate::packet_type::PacketType;

/// Size in bytes of either a PINGREQ or a PINGRESP.
pub const SIZE: usize = 2;

/// Serializes a PINGREQ into `buf`.
///
/// # Errors
///
/// `NoMemory` if `buf` is smaller than [`SIZE`].
pub fn serialize_request(buf: &mut [u8]) -> Result<usize, EncodeError> {
    serialize(PacketType::PingRequest, buf)
}

/// Serializes a PINGRESP into `buf`.
///
/// # Errors
///
/// `NoMemory` if `buf` is smaller than [`SIZE`].
pub fn serialize_response(buf: &mut [u8]) -> Result<usize, EncodeError> {
    serialize(PacketType::PingResponse, buf)
}

fn serialize(packet_type: PacketType, buf: &mut [u8]) -> Result<usize, EncodeError> {
    if buf.len() < SIZE {
        return Err(EncodeError::NoMemory);
    }
    let mut writer = ByteWriter::new(buf);
    header::encode(packet_type, 0, &mut writer)?;
    Ok(writer.position())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pingreq_matches_spec_bytes() {
        let mut buf = [0u8; SIZE];
        let written = serialize_request(&mut buf).unwrap();
        assert_eq!(written, SIZE);
        assert_eq!(buf, [0xc0, 0x00]);
    }

    #[test]
    fn pingresp_matches_spec_bytes() {
        let mut buf = [0u8; SIZE];
        let written = serialize_response(&mut buf).unwrap();
        assert_eq!(written, SIZE);
        assert_eq!(buf, [0xd0, 0x00]);
    }

    #[test]
    fn undersized_buffer_is_no_memory() {
        let mut buf = [0u8; 1];
        assert_eq!(serialize_request(&mut buf).unwrap_err(), EncodeError::NoMemory);
    }
}
