// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Shared codec for PUBACK, PUBREC, PUBREL, and PUBCOMP: identical wire
//! shape (packet id, then optionally a reason code and properties),
//! differing only in packet type byte and reason-code allow-list.

use crate::byte_cursor::{ByteReader, ByteWriter};
use crate::error::{BadParameterKind, DecodeError, EncodeError, MalformedReason};
use crate::header;
use crate::packet_type::{PacketKind, PacketType};
use crate::property::{self, PropertyContext, PropertyId, PropertyValue};
use crate::reason_code::{ReasonCode, PUBACK_REASONS, PUBREL_REASONS};

/// Which of the four acknowledgement packet types this call concerns.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AckKind {
    PublishAck,
    PublishReceived,
    PublishRelease,
    PublishComplete,
}

impl AckKind {
    const fn packet_type(self) -> PacketType {
        match self {
            Self::PublishAck => PacketType::PublishAck,
            Self::PublishReceived => PacketType::PublishReceived,
            Self::PublishRelease => PacketType::PublishRelease,
            Self::PublishComplete => PacketType::PublishComplete,
        }
    }

    const fn packet_kind(self) -> PacketKind {
        match self {
            Self::PublishAck => PacketKind::PublishAck,
            Self::PublishReceived => PacketKind::PublishReceived,
            Self::PublishRelease => PacketKind::PublishRelease,
            Self::PublishComplete => PacketKind::PublishComplete,
        }
    }

    const fn reasons(self) -> &'static [ReasonCode] {
        match self {
            Self::PublishAck | Self::PublishReceived => PUBACK_REASONS,
            Self::PublishRelease | Self::PublishComplete => PUBREL_REASONS,
        }
    }
}

pub struct AckInfo<'a> {
    pub packet_id: u16,
    pub reason: ReasonCode,
    /// Properties block, already built via `PropertyBuilder`. Ignored by
    /// the short 2-byte form (Success, no properties).
    pub properties: &'a [u8],
}

fn validate(info: &AckInfo<'_>) -> Result<(), EncodeError> {
    if info.packet_id == 0 {
        return Err(EncodeError::BadParameter(BadParameterKind::ZeroPacketId));
    }
    Ok(())
}

fn uses_short_form(info: &AckInfo<'_>) -> bool {
    info.reason == ReasonCode::Success && info.properties.is_empty()
}

fn remaining_length(info: &AckInfo<'_>) -> usize {
    if uses_short_form(info) {
        2
    } else {
        2 + 1 + property::block_size(info.properties)
    }
}

/// Computes the total packet size (header included).
///
/// # Errors
///
/// `BadParameter` if `info.packet_id` is zero.
pub fn get_size(info: &AckInfo<'_>) -> Result<usize, EncodeError> {
    validate(info)?;
    let remaining = remaining_length(info);
    #[allow(clippy::cast_possible_truncation)]
    Ok(header::encoded_size(remaining as u32) + remaining)
}

/// Serializes a PUBACK/PUBREC/PUBREL/PUBCOMP into `buf`.
///
/// # Errors
///
/// `BadParameter` if `info.packet_id` is zero; `NoMemory` if `buf` is
/// smaller than [`get_size`].
pub fn serialize(kind: AckKind, info: &AckInfo<'_>, buf: &mut [u8]) -> Result<usize, EncodeError> {
    let size = get_size(info)?;
    if buf.len() < size {
        return Err(EncodeError::NoMemory);
    }
    let remaining = remaining_length(info);
    #[allow(clippy::cast_possible_truncation)]
    let remaining = remaining as u32;

    let mut writer = ByteWriter::new(buf);
    header::encode(kind.packet_type(), remaining, &mut writer)?;
    writer.write_u16(info.packet_id)?;
    if !uses_short_form(info) {
        info.reason.encode(&mut writer)?;
        property::write_block(info.properties, &mut writer)?;
    }
    Ok(writer.position())
}

fn malformed(reason: MalformedReason) -> DecodeError {
    DecodeError::MalformedPacket(reason)
}

/// Decoded ack, with the one typed property (Reason String) surfaced
/// directly; User Property is accepted but dropped.
#[derive(Clone, Copy, Debug)]
pub struct DecodedAck<'a> {
    pub packet_id: u16,
    pub reason: ReasonCode,
    pub reason_string: Option<&'a str>,
}

/// Parses the remaining-data bytes of a PUBACK/PUBREC/PUBREL/PUBCOMP.
///
/// # Errors
///
/// `MalformedPacket` if the packet id is zero, the reason code is not in
/// `kind`'s allow-list, or the property block is malformed.
pub fn decode<'a>(kind: AckKind, data: &'a [u8]) -> Result<DecodedAck<'a>, DecodeError> {
    let mut reader = ByteReader::new(data);
    let packet_id = reader.read_u16()?;
    if packet_id == 0 {
        return Err(malformed(MalformedReason::ZeroPacketId));
    }

    if reader.is_empty() {
        return Ok(DecodedAck { packet_id, reason: ReasonCode::Success, reason_string: None });
    }

    let reason = ReasonCode::decode(&mut reader)?;
    if !kind.reasons().contains(&reason) {
        log::error!("publish_ack: reason code not allowed for {kind:?}: {reason:?}");
        return Err(malformed(MalformedReason::InvalidReasonCode));
    }

    let mut reason_string = None;
    let mut block = property::read_block(&mut reader)?;
    let ctx = PropertyContext::Packet(kind.packet_kind());
    while let Some(p) = block.next(ctx)? {
        match (p.id, p.value) {
            (PropertyId::ReasonString, PropertyValue::Utf8(s)) => reason_string = Some(s),
            (PropertyId::UserProperty, PropertyValue::Utf8Pair(_, _)) => {}
            _ => unreachable!("PROPERTY_TABLE's wire kind always matches what was just decoded"),
        }
    }

    if !reader.is_empty() {
        return Err(malformed(MalformedReason::TrailingBytes));
    }

    Ok(DecodedAck { packet_id, reason, reason_string })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_form_puback_matches_spec_scenario() {
        let data = [0x00, 0x02];
        let ack = decode(AckKind::PublishAck, &data).unwrap();
        assert_eq!(ack.packet_id, 2);
        assert_eq!(ack.reason, ReasonCode::Success);
        assert!(ack.reason_string.is_none());
    }

    #[test]
    fn short_form_round_trips_through_serialize() {
        let info = AckInfo { packet_id: 7, reason: ReasonCode::Success, properties: &[] };
        let size = get_size(&info).unwrap();
        assert_eq!(size, 4);
        let mut buf = vec![0u8; size];
        serialize(AckKind::PublishAck, &info, &mut buf).unwrap();
        assert_eq!(buf, vec![0x40, 0x02, 0x00, 0x07]);
    }

    #[test]
    fn extended_form_carries_reason_and_properties() {
        let mut prop_buf = [0u8; 32];
        let props_len = {
            use crate::property::PropertyBuilder;
            let mut b = PropertyBuilder::new(&mut prop_buf);
            b.add_reason_string("nope", None).unwrap();
            b.len()
        };
        let info = AckInfo {
            packet_id: 9,
            reason: ReasonCode::UnspecifiedError,
            properties: &prop_buf[..props_len],
        };
        let size = get_size(&info).unwrap();
        let mut buf = vec![0u8; size];
        serialize(AckKind::PublishAck, &info, &mut buf).unwrap();

        let header = header::scan_incoming_header(&buf).unwrap();
        let ack = decode(AckKind::PublishAck, &buf[header.header_length..]).unwrap();
        assert_eq!(ack.packet_id, 9);
        assert_eq!(ack.reason, ReasonCode::UnspecifiedError);
        assert_eq!(ack.reason_string, Some("nope"));
    }

    #[test]
    fn zero_packet_id_is_rejected() {
        let data = [0x00, 0x00];
        assert!(decode(AckKind::PublishAck, &data).is_err());
    }

    #[test]
    fn pubrel_rejects_puback_only_reason() {
        let data = [0x00, 0x01, 0x10];
        assert!(decode(AckKind::PublishRelease, &data).is_err());
    }
}
