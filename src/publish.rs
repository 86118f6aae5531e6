// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! PUBLISH: size, serialization (including the header-only helpers used to
//! avoid copying a large payload), and parsing. Both directions are
//! symmetric.

use crate::byte_cursor::{checked_utf8_size, ByteReader, ByteWriter};
use crate::error::{BadParameterKind, DecodeError, EncodeError, MalformedReason};
use crate::header;
use crate::packet_type::{PacketKind, PacketType};
use crate::property::{self, PropertyContext, PropertyId, PropertyValue};
use crate::qos::QoS;
use crate::var_int;

pub struct PublishInfo<'a> {
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
    pub topic: &'a str,
    pub packet_id: u16,
    pub payload: &'a [u8],
    /// PUBLISH Properties block, already built via `PropertyBuilder`.
    pub properties: &'a [u8],
}

fn validate(info: &PublishInfo<'_>) -> Result<(), EncodeError> {
    if info.dup && matches!(info.qos, QoS::AtMostOnce) {
        return Err(EncodeError::BadParameter(BadParameterKind::DupWithoutQoS));
    }
    if !matches!(info.qos, QoS::AtMostOnce) && info.packet_id == 0 {
        return Err(EncodeError::BadParameter(BadParameterKind::ZeroPacketId));
    }
    if info.topic.is_empty() {
        return Err(EncodeError::BadParameter(BadParameterKind::EmptyTopicName));
    }
    Ok(())
}

fn variable_header_len(info: &PublishInfo<'_>) -> Result<usize, EncodeError> {
    let mut len = checked_utf8_size(info.topic)?;
    if !matches!(info.qos, QoS::AtMostOnce) {
        len += 2;
    }
    len += property::block_size(info.properties);
    Ok(len)
}

fn remaining_length(info: &PublishInfo<'_>) -> Result<usize, EncodeError> {
    // The PUBLISH payload is raw bytes running to the end of the packet,
    // not a length-prefixed binary field.
    Ok(variable_header_len(info)? + info.payload.len())
}

/// Computes the total packet size (header included).
///
/// # Errors
///
/// `BadParameter` if `info` violates a PUBLISH invariant (DUP without QoS,
/// zero packet id at QoS > 0, empty topic, an oversized string/binary
/// field) or Remaining Length would exceed [`var_int::MAX_VAR_INT`].
pub fn get_size(info: &PublishInfo<'_>) -> Result<usize, EncodeError> {
    validate(info)?;
    let remaining = remaining_length(info)?;
    if remaining > var_int::MAX_VAR_INT as usize {
        return Err(EncodeError::BadParameter(BadParameterKind::RemainingLengthTooLarge));
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok(header::encoded_size(remaining as u32) + remaining)
}

fn packet_type(info: &PublishInfo<'_>) -> PacketType {
    PacketType::Publish { dup: info.dup, qos: info.qos, retain: info.retain }
}

/// Writes the fixed header, topic, packet id (if any), and properties, but
/// not the payload. This lets a caller stream the payload from its own
/// buffer without an extra copy. Returns the number of bytes written.
///
/// # Errors
///
/// Same as [`get_size`]; `NoMemory` if `buf` cannot hold the header
/// through the properties block.
pub fn serialize_publish_header(info: &PublishInfo<'_>, buf: &mut [u8]) -> Result<usize, EncodeError> {
    validate(info)?;
    let remaining = remaining_length(info)?;
    if remaining > var_int::MAX_VAR_INT as usize {
        return Err(EncodeError::BadParameter(BadParameterKind::RemainingLengthTooLarge));
    }
    #[allow(clippy::cast_possible_truncation)]
    let remaining = remaining as u32;

    let mut writer = ByteWriter::new(buf);
    header::encode(packet_type(info), remaining, &mut writer)?;
    writer.write_utf8_str(info.topic)?;
    if !matches!(info.qos, QoS::AtMostOnce) {
        writer.write_u16(info.packet_id)?;
    }
    property::write_block(info.properties, &mut writer)?;
    Ok(writer.position())
}

/// Serializes a full PUBLISH packet (header, topic, packet id, properties,
/// payload) into `buf`.
///
/// # Errors
///
/// Same as [`get_size`]; `NoMemory` if `buf` is smaller than [`get_size`].
pub fn serialize(info: &PublishInfo<'_>, buf: &mut [u8]) -> Result<usize, EncodeError> {
    let size = get_size(info)?;
    if buf.len() < size {
        return Err(EncodeError::NoMemory);
    }
    let header_len = serialize_publish_header(info, buf)?;
    let end = header_len + info.payload.len();
    buf.get_mut(header_len..end).ok_or(EncodeError::NoMemory)?.copy_from_slice(info.payload);
    Ok(end)
}

fn malformed(reason: MalformedReason) -> DecodeError {
    DecodeError::MalformedPacket(reason)
}

/// Typed PUBLISH properties, decoded from the property block. All fields
/// are optional; MQTT 5.0 defines no defaults for PUBLISH properties, they
/// are simply absent when not sent.
#[derive(Clone, Copy, Debug, Default)]
pub struct PublishProperties<'a> {
    pub payload_format_indicator: Option<u8>,
    pub message_expiry_interval: Option<u32>,
    pub topic_alias: Option<u16>,
    pub response_topic: Option<&'a str>,
    pub correlation_data: Option<&'a [u8]>,
    pub subscription_identifier: Option<u32>,
    pub content_type: Option<&'a str>,
}

/// Parses the remaining-data bytes of a PUBLISH, given the DUP/QoS/RETAIN
/// already extracted from the fixed header's first byte.
///
/// # Errors
///
/// `MalformedPacket` if the remaining length is too short for the QoS, the
/// topic or properties are malformed, or the property block violates an
/// allow-list/duplicate/range rule.
pub fn decode<'a>(
    dup: bool,
    qos: QoS,
    retain: bool,
    data: &'a [u8],
) -> Result<(PublishInfo<'a>, PublishProperties<'a>), DecodeError> {
    // The minimum sizes named for each QoS (>= 3 for QoS 0, >= 5 + topic
    // length otherwise) fall out naturally from the bounds-checked reads
    // below; a truncated buffer surfaces as `BufferTooShort`.
    let mut reader = ByteReader::new(data);
    let topic = reader.read_utf8_str()?;

    let packet_id = if matches!(qos, QoS::AtMostOnce) {
        0
    } else {
        let id = reader.read_u16()?;
        if id == 0 {
            return Err(malformed(MalformedReason::ZeroPacketId));
        }
        id
    };

    let mut props = PublishProperties::default();
    let mut block = property::read_block(&mut reader)?;
    let ctx = PropertyContext::Packet(PacketKind::Publish);
    while let Some(p) = block.next(ctx)? {
        match (p.id, p.value) {
            (PropertyId::PayloadFormatIndicator, PropertyValue::Bool(v)) => {
                props.payload_format_indicator = Some(u8::from(v));
            }
            (PropertyId::MessageExpiryInterval, PropertyValue::U32(v)) => {
                props.message_expiry_interval = Some(v);
            }
            (PropertyId::TopicAlias, PropertyValue::U16(v)) => props.topic_alias = Some(v),
            (PropertyId::ResponseTopic, PropertyValue::Utf8(s)) => props.response_topic = Some(s),
            (PropertyId::CorrelationData, PropertyValue::Binary(b)) => {
                props.correlation_data = Some(b);
            }
            (PropertyId::SubscriptionIdentifier, PropertyValue::VarInt(v)) => {
                props.subscription_identifier = Some(v);
            }
            (PropertyId::ContentType, PropertyValue::Utf8(s)) => props.content_type = Some(s),
            (PropertyId::UserProperty, PropertyValue::Utf8Pair(_, _)) => {}
            _ => unreachable!("PROPERTY_TABLE's wire kind always matches what was just decoded"),
        }
    }

    let payload = reader.read_bytes(reader.remaining())?;

    Ok((PublishInfo { qos, retain, dup, topic, packet_id, payload, properties: &[] }, props))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos0_matches_spec_bytes() {
        let info = PublishInfo {
            qos: QoS::AtMostOnce,
            retain: false,
            dup: false,
            topic: "t",
            packet_id: 0,
            payload: b"hi",
            properties: &[],
        };
        let size = get_size(&info).unwrap();
        let mut buf = vec![0u8; size];
        let written = serialize(&info, &mut buf).unwrap();
        assert_eq!(written, size);
        assert_eq!(buf, vec![0x30, 0x06, 0x00, 0x01, b't', 0x00, b'h', b'i']);
    }

    #[test]
    fn dup_without_qos_is_rejected() {
        let info = PublishInfo {
            qos: QoS::AtMostOnce,
            retain: false,
            dup: true,
            topic: "t",
            packet_id: 0,
            payload: b"",
            properties: &[],
        };
        assert!(get_size(&info).is_err());
    }

    #[test]
    fn qos1_round_trips_topic_and_packet_id() {
        let info = PublishInfo {
            qos: QoS::AtLeastOnce,
            retain: true,
            dup: false,
            topic: "sensors/temp",
            packet_id: 42,
            payload: b"21.5",
            properties: &[],
        };
        let size = get_size(&info).unwrap();
        let mut buf = vec![0u8; size];
        serialize(&info, &mut buf).unwrap();

        let header = header::scan_incoming_header(&buf).unwrap();
        let data = &buf[header.header_length..];
        let (decoded, _props) = decode(false, QoS::AtLeastOnce, true, data).unwrap();
        assert_eq!(decoded.topic, "sensors/temp");
        assert_eq!(decoded.packet_id, 42);
        assert_eq!(decoded.payload, b"21.5");
    }

    #[test]
    fn qos1_with_zero_packet_id_is_rejected_on_decode() {
        let data = [0x00, 0x01, b't', 0x00, 0x00, 0x00];
        assert!(decode(false, QoS::AtLeastOnce, false, &data).is_err());
    }
}
