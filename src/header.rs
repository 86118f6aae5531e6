// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Fixed header encode/decode and incoming-packet framing.
//!
//! Framing comes in two forms: pull mode reads one byte at a time off a
//! caller-supplied [`Receiver`], buffered mode scans a prefix of an
//! already-filled buffer. Both share the same VBI-reading loop as
//! [`crate::var_int`] and reject the same malformed encodings.

use std::convert::TryFrom;

use crate::byte_cursor::ByteWriter;
use crate::error::{CodecError, EncodeError};
use crate::packet_type::{PacketKind, PacketType};
use crate::var_int;

/// Decoded fixed header: packet type, Remaining Length, and how many bytes
/// of the input the header itself occupied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FixedHeader {
    pub packet_type: PacketType,
    pub remaining_length: u32,
    pub header_length: usize,
}

/// Number of bytes `encode` will write for this header.
#[must_use]
pub const fn encoded_size(remaining_length: u32) -> usize {
    1 + var_int::encoded_size(remaining_length)
}

/// Writes the type byte followed by the VBI-encoded Remaining Length.
///
/// # Errors
///
/// Returns `BadParameter` if `remaining_length` exceeds
/// [`var_int::MAX_VAR_INT`], `NoMemory` if `writer` cannot hold the header.
pub fn encode(
    packet_type: PacketType,
    remaining_length: u32,
    writer: &mut ByteWriter<'_>,
) -> Result<(), EncodeError> {
    writer.write_u8(packet_type.into())?;
    var_int::encode(remaining_length, writer)
}

/// Packet types a client is permitted to receive. PUBREL's flag nibble is
/// already enforced by `PacketType::try_from`.
const fn is_valid_incoming(kind: PacketKind) -> bool {
    matches!(
        kind,
        PacketKind::ConnectAck
            | PacketKind::Publish
            | PacketKind::PublishAck
            | PacketKind::PublishReceived
            | PacketKind::PublishRelease
            | PacketKind::PublishComplete
            | PacketKind::SubscribeAck
            | PacketKind::UnsubscribeAck
            | PacketKind::PingResponse
            | PacketKind::Disconnect
            | PacketKind::Auth
    )
}

fn decode_type_byte(byte: u8) -> Result<PacketType, CodecError> {
    let packet_type = PacketType::try_from(byte).map_err(CodecError::from)?;
    if !is_valid_incoming(packet_type.kind()) {
        log::error!("header: packet type not valid as an incoming packet: {packet_type:?}");
        return Err(CodecError::MalformedPacket);
    }
    Ok(packet_type)
}

/// One VBI byte's worth of running decode state, shared between the pull
/// and buffered scanners.
struct VarIntScan {
    value: u32,
    multiplier: u32,
    bytes_read: usize,
}

impl VarIntScan {
    const fn new() -> Self {
        Self { value: 0, multiplier: 1, bytes_read: 0 }
    }

    /// Folds in one more byte. Returns `Some(value)` once the integer is
    /// complete, `None` if another byte is needed.
    fn push(&mut self, byte: u8) -> Result<Option<u32>, CodecError> {
        self.value += u32::from(byte & 0x7f) * self.multiplier;
        self.bytes_read += 1;
        if byte & 0x80 == 0 {
            if self.bytes_read != var_int::encoded_size(self.value) {
                return Err(CodecError::MalformedPacket);
            }
            return Ok(Some(self.value));
        }
        if self.bytes_read == 4 {
            return Err(CodecError::MalformedPacket);
        }
        self.multiplier *= 128;
        Ok(None)
    }
}

/// Transport read callback used by pull-mode framing.
///
/// Returns the number of bytes read into `out` (`<= out.len()`), `0` if no
/// data is available right now, or a negative value on transport failure.
pub trait Receiver {
    fn recv(&mut self, out: &mut [u8]) -> i32;
}

fn recv_one_byte<R: Receiver>(recv: &mut R) -> Result<Option<u8>, CodecError> {
    let mut byte = [0u8; 1];
    let n = recv.recv(&mut byte);
    if n < 0 {
        return Err(CodecError::RecvFailed);
    }
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(byte[0]))
}

/// Reads a fixed header one byte at a time via `recv`.
///
/// # Errors
///
/// `NoDataAvailable` if the very first read returns zero bytes;
/// `RecvFailed` on a transport error at any point; `MalformedPacket` if the
/// type byte or Remaining Length violate the wire format.
pub fn read_incoming_header_blocking<R: Receiver>(recv: &mut R) -> Result<FixedHeader, CodecError> {
    let type_byte = match recv_one_byte(recv)? {
        Some(b) => b,
        None => return Err(CodecError::NoDataAvailable),
    };
    let packet_type = decode_type_byte(type_byte)?;

    let mut scan = VarIntScan::new();
    let mut header_length = 1usize;
    loop {
        let byte = match recv_one_byte(recv)? {
            Some(b) => b,
            None => return Err(CodecError::NoDataAvailable),
        };
        header_length += 1;
        if let Some(remaining_length) = scan.push(byte)? {
            return Ok(FixedHeader { packet_type, remaining_length, header_length });
        }
    }
}

/// Scans a fixed header out of `buf`, which holds the bytes received so
/// far (i.e. `full_buffer[..write_index]`).
///
/// # Errors
///
/// `NeedMoreBytes` if `buf` does not yet contain a complete header;
/// `MalformedPacket` if the type byte or Remaining Length violate the wire
/// format.
pub fn scan_incoming_header(buf: &[u8]) -> Result<FixedHeader, CodecError> {
    let type_byte = *buf.first().ok_or(CodecError::NeedMoreBytes)?;
    let packet_type = decode_type_byte(type_byte)?;

    let mut scan = VarIntScan::new();
    let mut idx = 1usize;
    loop {
        let byte = *buf.get(idx).ok_or(CodecError::NeedMoreBytes)?;
        idx += 1;
        if let Some(remaining_length) = scan.push(byte)? {
            return Ok(FixedHeader { packet_type, remaining_length, header_length: idx });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qos::QoS;

    struct ScriptedReceiver<'a> {
        chunks: std::slice::Iter<'a, &'a [u8]>,
    }

    impl<'a> ScriptedReceiver<'a> {
        fn new(chunks: &'a [&'a [u8]]) -> Self {
            Self { chunks: chunks.iter() }
        }
    }

    impl Receiver for ScriptedReceiver<'_> {
        fn recv(&mut self, out: &mut [u8]) -> i32 {
            match self.chunks.next() {
                Some(chunk) => {
                    out[..chunk.len()].copy_from_slice(chunk);
                    i32::try_from(chunk.len()).unwrap()
                }
                None => 0,
            }
        }
    }

    #[test]
    fn pull_mode_reads_pingresp_header() {
        let chunks: [&[u8]; 2] = [&[0xd0], &[0x00]];
        let mut recv = ScriptedReceiver::new(&chunks);
        let header = read_incoming_header_blocking(&mut recv).unwrap();
        assert_eq!(header.packet_type, PacketType::PingResponse);
        assert_eq!(header.remaining_length, 0);
        assert_eq!(header.header_length, 2);
    }

    #[test]
    fn pull_mode_no_data_is_not_an_error_condition() {
        let chunks: [&[u8]; 0] = [];
        let mut recv = ScriptedReceiver::new(&chunks);
        assert_eq!(read_incoming_header_blocking(&mut recv).unwrap_err(), CodecError::NoDataAvailable);
    }

    #[test]
    fn pull_mode_rejects_connect_as_incoming() {
        let chunks: [&[u8]; 2] = [&[0x10], &[0x00]];
        let mut recv = ScriptedReceiver::new(&chunks);
        assert_eq!(
            read_incoming_header_blocking(&mut recv).unwrap_err(),
            CodecError::MalformedPacket
        );
    }

    #[test]
    fn pull_mode_accepts_pubrel_with_reserved_nibble() {
        let chunks: [&[u8]; 2] = [&[0x62], &[0x02]];
        let mut recv = ScriptedReceiver::new(&chunks);
        let header = read_incoming_header_blocking(&mut recv).unwrap();
        assert_eq!(header.packet_type, PacketType::PublishRelease);
        assert_eq!(header.remaining_length, 2);
    }

    #[test]
    fn buffered_mode_needs_more_bytes_until_header_complete() {
        let full = [0x40u8, 0x02, 0x00, 0x01];
        assert_eq!(scan_incoming_header(&full[..0]).unwrap_err(), CodecError::NeedMoreBytes);
        assert_eq!(scan_incoming_header(&full[..1]).unwrap_err(), CodecError::NeedMoreBytes);

        let header = scan_incoming_header(&full[..2]).unwrap();
        assert_eq!(header.packet_type, PacketType::PublishAck);
        assert_eq!(header.remaining_length, 2);
        assert_eq!(header.header_length, 2);
    }

    #[test]
    fn buffered_mode_is_idempotent_as_more_bytes_arrive() {
        let full = [0x30u8, 0x06, 0x00, 0x01, b't', 0x00, b'h', b'i'];
        let first = scan_incoming_header(&full[..2]).unwrap();
        let second = scan_incoming_header(&full[..full.len()]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn encode_round_trips_through_scan() {
        let mut buf = [0u8; 5];
        let publish = PacketType::Publish { dup: false, qos: QoS::AtLeastOnce, retain: false };
        let size = encoded_size(321);
        {
            let mut w = ByteWriter::new(&mut buf);
            encode(publish, 321, &mut w).unwrap();
            assert_eq!(w.position(), size);
        }
        let header = scan_incoming_header(&buf[..size]).unwrap();
        assert_eq!(header.packet_type, publish);
        assert_eq!(header.remaining_length, 321);
    }
}
