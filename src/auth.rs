// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! AUTH: enhanced authentication exchange, symmetric in both directions.
//! Shape mirrors DISCONNECT: a reason code and a properties block, with the
//! same short-form collapse when the reason is Success and no properties
//! are present.

use crate::byte_cursor::{ByteReader, ByteWriter};
use crate::error::{DecodeError, EncodeError, MalformedReason};
use crate::header;
use crate::packet_type::{PacketKind, PacketType};
use crate::property::{self, PropertyContext, PropertyId, PropertyValue};
use crate::reason_code::{ReasonCode, AUTH_REASONS};
use crate::var_int;

pub struct AuthInfo<'a> {
    pub reason: ReasonCode,
    /// AUTH Properties block, already built via `PropertyBuilder`.
    pub properties: &'a [u8],
}

fn uses_short_form(info: &AuthInfo<'_>) -> bool {
    info.reason == ReasonCode::Success && info.properties.is_empty()
}

fn remaining_length(info: &AuthInfo<'_>) -> usize {
    if uses_short_form(info) {
        0
    } else {
        1 + property::block_size(info.properties)
    }
}

/// Computes the total packet size (header included).
#[must_use]
pub fn get_size(info: &AuthInfo<'_>) -> usize {
    let remaining = remaining_length(info);
    header::encoded_size(u32::try_from(remaining).unwrap_or(u32::MAX)) + remaining
}

/// Serializes an AUTH packet into `buf`.
///
/// # Errors
///
/// `BadParameter` if Remaining Length would exceed [`var_int::MAX_VAR_INT`];
/// `NoMemory` if `buf` is smaller than [`get_size`].
pub fn serialize(info: &AuthInfo<'_>, buf: &mut [u8]) -> Result<usize, EncodeError> {
    let remaining = remaining_length(info);
    if remaining > var_int::MAX_VAR_INT as usize {
        return Err(EncodeError::BadParameter(crate::error::BadParameterKind::RemainingLengthTooLarge));
    }
    if buf.len() < get_size(info) {
        return Err(EncodeError::NoMemory);
    }
    #[allow(clippy::cast_possible_truncation)]
    let remaining = remaining as u32;

    let mut writer = ByteWriter::new(buf);
    header::encode(PacketType::Auth, remaining, &mut writer)?;
    if !uses_short_form(info) {
        info.reason.encode(&mut writer)?;
        property::write_block(info.properties, &mut writer)?;
    }
    Ok(writer.position())
}

fn malformed(reason: MalformedReason) -> DecodeError {
    DecodeError::MalformedPacket(reason)
}

#[derive(Clone, Copy, Debug)]
pub struct DecodedAuth<'a> {
    pub reason: ReasonCode,
    pub authentication_method: Option<&'a str>,
    pub authentication_data: Option<&'a [u8]>,
    pub reason_string: Option<&'a str>,
}

/// Parses the remaining-data bytes of an AUTH.
///
/// # Errors
///
/// `MalformedPacket` if the reason code is not in [`AUTH_REASONS`], the
/// property block is malformed, or there are trailing bytes.
pub fn decode(data: &[u8]) -> Result<DecodedAuth<'_>, DecodeError> {
    let mut reader = ByteReader::new(data);
    if reader.is_empty() {
        return Ok(DecodedAuth {
            reason: ReasonCode::Success,
            authentication_method: None,
            authentication_data: None,
            reason_string: None,
        });
    }

    let reason = ReasonCode::decode(&mut reader)?;
    if !AUTH_REASONS.contains(&reason) {
        log::error!("auth: reason code not allowed in AUTH: {reason:?}");
        return Err(malformed(MalformedReason::InvalidReasonCode));
    }

    let mut authentication_method = None;
    let mut authentication_data = None;
    let mut reason_string = None;

    if reader.is_empty() {
        return Ok(DecodedAuth { reason, authentication_method, authentication_data, reason_string });
    }

    let mut block = property::read_block(&mut reader)?;
    let ctx = PropertyContext::Packet(PacketKind::Auth);
    while let Some(p) = block.next(ctx)? {
        match (p.id, p.value) {
            (PropertyId::AuthenticationMethod, PropertyValue::Utf8(s)) => {
                authentication_method = Some(s);
            }
            (PropertyId::AuthenticationData, PropertyValue::Binary(b)) => {
                authentication_data = Some(b);
            }
            (PropertyId::ReasonString, PropertyValue::Utf8(s)) => reason_string = Some(s),
            (PropertyId::UserProperty, PropertyValue::Utf8Pair(_, _)) => {}
            _ => unreachable!("PROPERTY_TABLE's wire kind always matches what was just decoded"),
        }
    }

    if !reader.is_empty() {
        return Err(malformed(MalformedReason::TrailingBytes));
    }

    Ok(DecodedAuth { reason, authentication_method, authentication_data, reason_string })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_form_is_two_bytes() {
        let info = AuthInfo { reason: ReasonCode::Success, properties: &[] };
        let size = get_size(&info);
        let mut buf = vec![0u8; size];
        serialize(&info, &mut buf).unwrap();
        assert_eq!(buf, vec![0xf0, 0x00]);
    }

    #[test]
    fn continue_authentication_round_trips_method_and_data() {
        let mut prop_buf = [0u8; 64];
        let props_len = {
            use crate::property::PropertyBuilder;
            let mut b = PropertyBuilder::new(&mut prop_buf);
            b.add_authentication_method("SCRAM-SHA-1", None).unwrap();
            b.add_authentication_data(b"\x01\x02\x03", None).unwrap();
            b.len()
        };
        let info = AuthInfo {
            reason: ReasonCode::ContinueAuthentication,
            properties: &prop_buf[..props_len],
        };
        let size = get_size(&info);
        let mut buf = vec![0u8; size];
        serialize(&info, &mut buf).unwrap();

        let header = header::scan_incoming_header(&buf).unwrap();
        let decoded = decode(&buf[header.header_length..]).unwrap();
        assert_eq!(decoded.reason, ReasonCode::ContinueAuthentication);
        assert_eq!(decoded.authentication_method, Some("SCRAM-SHA-1"));
        assert_eq!(decoded.authentication_data, Some(&b"\x01\x02\x03"[..]));
    }

    #[test]
    fn invalid_reason_code_is_rejected() {
        let data = [0x87];
        assert!(decode(&data).is_err());
    }
}
