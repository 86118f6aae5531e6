// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! CONNACK: decode only (a client never sends CONNACK).

use crate::byte_cursor::ByteReader;
use crate::error::{DecodeError, MalformedReason};
use crate::packet_type::PacketKind;
use crate::property::{self, PropertyContext, PropertyId, PropertyValue};
use crate::reason_code::{ReasonCode, CONNACK_REASONS};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConnAckInfo {
    pub session_present: bool,
    pub reason: ReasonCode,
}

/// Server-provided connection properties, decoded from a CONNACK property
/// block. Fields absent from the wire take the MQTT 5.0 default values
/// listed in §6; `request_response_info`/`request_problem_info` are
/// CONNECT-side values the caller already holds and are not reproduced
/// here.
#[derive(Clone, Copy, Debug)]
pub struct ConnectionProperties<'a> {
    pub session_expiry: u32,
    pub receive_max: u16,
    pub server_max_qos: u8,
    pub retain_available: bool,
    pub max_packet_size: u32,
    pub topic_alias_max: u16,
    pub wildcard_sub_available: bool,
    pub sub_id_available: bool,
    pub shared_sub_available: bool,
    pub server_keep_alive: u16,
    pub assigned_client_identifier: Option<&'a str>,
    pub response_information: Option<&'a str>,
    pub server_reference: Option<&'a str>,
    pub reason_string: Option<&'a str>,
    pub authentication_method: Option<&'a str>,
    pub authentication_data: Option<&'a [u8]>,
}

impl ConnectionProperties<'_> {
    #[must_use]
    pub const fn defaults() -> Self {
        Self {
            session_expiry: 0,
            receive_max: 65535,
            server_max_qos: 2,
            retain_available: true,
            max_packet_size: 268_435_460,
            topic_alias_max: 0,
            wildcard_sub_available: true,
            sub_id_available: true,
            shared_sub_available: true,
            server_keep_alive: 65535,
            assigned_client_identifier: None,
            response_information: None,
            server_reference: None,
            reason_string: None,
            authentication_method: None,
            authentication_data: None,
        }
    }
}

fn malformed(reason: MalformedReason) -> DecodeError {
    DecodeError::MalformedPacket(reason)
}

/// Parses the remaining-data bytes of a CONNACK (everything after the
/// fixed header).
///
/// `response_info_requested` must reflect whether the CONNECT this
/// CONNACK answers asked for Request Response Information; the caller
/// tracks this across the two packets since the codec keeps no state.
///
/// # Errors
///
/// `MalformedPacket` for any reserved-bit violation, unrecognized or
/// disallowed reason code, Session Present set with a non-Success reason,
/// unsolicited Response Information, duplicate/disallowed/out-of-range
/// property, or trailing bytes after the property block.
pub fn decode<'a>(
    data: &'a [u8],
    response_info_requested: bool,
) -> Result<(ConnAckInfo, ConnectionProperties<'a>), DecodeError> {
    let mut reader = ByteReader::new(data);

    let ack_flags = reader.read_u8()?;
    if ack_flags & !0x01 != 0 {
        return Err(malformed(MalformedReason::InvalidPacketFlags));
    }
    let session_present = ack_flags & 0x01 != 0;

    let reason = ReasonCode::decode(&mut reader)?;
    if !CONNACK_REASONS.contains(&reason) {
        log::error!("connect_ack: reason code not allowed in CONNACK: {reason:?}");
        return Err(malformed(MalformedReason::InvalidReasonCode));
    }
    if session_present && reason != ReasonCode::Success {
        return Err(malformed(MalformedReason::SessionPresentWithNonzeroReason));
    }

    let mut props = ConnectionProperties::defaults();
    let mut block = property::read_block(&mut reader)?;
    let ctx = PropertyContext::Packet(PacketKind::ConnectAck);
    while let Some(p) = block.next(ctx)? {
        match (p.id, p.value) {
            (PropertyId::SessionExpiryInterval, PropertyValue::U32(v)) => props.session_expiry = v,
            (PropertyId::ReceiveMaximum, PropertyValue::U16(v)) => props.receive_max = v,
            (PropertyId::MaximumQoS, PropertyValue::Bool(v)) => props.server_max_qos = u8::from(v),
            (PropertyId::RetainAvailable, PropertyValue::Bool(v)) => props.retain_available = v,
            (PropertyId::MaximumPacketSize, PropertyValue::U32(v)) => props.max_packet_size = v,
            (PropertyId::TopicAliasMaximum, PropertyValue::U16(v)) => props.topic_alias_max = v,
            (PropertyId::WildcardSubscriptionAvailable, PropertyValue::Bool(v)) => {
                props.wildcard_sub_available = v;
            }
            (PropertyId::SubscriptionIdentifierAvailable, PropertyValue::Bool(v)) => {
                props.sub_id_available = v;
            }
            (PropertyId::SharedSubscriptionAvailable, PropertyValue::Bool(v)) => {
                props.shared_sub_available = v;
            }
            (PropertyId::ServerKeepAlive, PropertyValue::U16(v)) => props.server_keep_alive = v,
            (PropertyId::AssignedClientIdentifier, PropertyValue::Utf8(s)) => {
                props.assigned_client_identifier = Some(s);
            }
            (PropertyId::ResponseInformation, PropertyValue::Utf8(s)) => {
                if !response_info_requested {
                    return Err(malformed(MalformedReason::UnsolicitedResponseInformation));
                }
                props.response_information = Some(s);
            }
            (PropertyId::ServerReference, PropertyValue::Utf8(s)) => props.server_reference = Some(s),
            (PropertyId::ReasonString, PropertyValue::Utf8(s)) => props.reason_string = Some(s),
            (PropertyId::AuthenticationMethod, PropertyValue::Utf8(s)) => {
                props.authentication_method = Some(s);
            }
            (PropertyId::AuthenticationData, PropertyValue::Binary(b)) => {
                props.authentication_data = Some(b);
            }
            (PropertyId::UserProperty, PropertyValue::Utf8Pair(_, _)) => {}
            _ => unreachable!("PROPERTY_TABLE's wire kind always matches what was just decoded"),
        }
    }

    if !reader.is_empty() {
        return Err(malformed(MalformedReason::TrailingBytes));
    }

    Ok((ConnAckInfo { session_present, reason }, props))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_with_no_properties_takes_defaults() {
        let data = [0x00, 0x00, 0x00];
        let (ack, props) = decode(&data, false).unwrap();
        assert!(!ack.session_present);
        assert_eq!(ack.reason, ReasonCode::Success);
        assert_eq!(props.receive_max, 65535);
        assert_eq!(props.max_packet_size, 268_435_460);
        assert_eq!(props.server_max_qos, 2);
        assert!(props.retain_available);
    }

    #[test]
    fn duplicate_property_is_rejected() {
        let data = [0x00, 0x00, 0x0a, 0x11, 0x00, 0x00, 0x00, 0x1e, 0x11, 0x00, 0x00, 0x00, 0x1e];
        assert!(decode(&data, false).is_err());
    }

    #[test]
    fn session_present_with_failure_reason_is_rejected() {
        let data = [0x01, 0x87, 0x00];
        assert!(decode(&data, false).is_err());
    }

    #[test]
    fn unsolicited_response_information_is_rejected() {
        let mut buf = [0u8; 32];
        let props_len = {
            use crate::property::PropertyBuilder;
            let mut b = PropertyBuilder::new(&mut buf);
            b.add_response_information("topic/info", None).unwrap();
            b.len()
        };
        let mut data = vec![0x00, 0x00];
        data.push(u8::try_from(props_len).unwrap());
        data.extend_from_slice(&buf[..props_len]);
        assert!(decode(&data, false).is_err());
    }

    #[test]
    fn reserved_ack_flag_bits_are_rejected() {
        let data = [0x02, 0x00, 0x00];
        assert!(decode(&data, false).is_err());
    }
}
