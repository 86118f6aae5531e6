// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! DISCONNECT: both directions are symmetric, and both collapse to the
//! minimal 2-byte form when the reason is Normal Disconnection and no
//! properties are present.

use crate::byte_cursor::{ByteReader, ByteWriter};
use crate::error::{DecodeError, EncodeError, MalformedReason};
use crate::header;
use crate::packet_type::{PacketKind, PacketType};
use crate::property::{self, PropertyContext, PropertyId, PropertyValue};
use crate::reason_code::{ReasonCode, DISCONNECT_REASONS};
use crate::var_int;

pub struct DisconnectInfo<'a> {
    pub reason: ReasonCode,
    /// DISCONNECT Properties block, already built via `PropertyBuilder`.
    pub properties: &'a [u8],
}

fn uses_short_form(info: &DisconnectInfo<'_>) -> bool {
    info.reason == ReasonCode::Success && info.properties.is_empty()
}

fn remaining_length(info: &DisconnectInfo<'_>) -> usize {
    if uses_short_form(info) {
        0
    } else {
        1 + property::block_size(info.properties)
    }
}

/// Computes the total packet size (header included).
#[must_use]
pub fn get_size(info: &DisconnectInfo<'_>) -> usize {
    let remaining = remaining_length(info);
    header::encoded_size(u32::try_from(remaining).unwrap_or(u32::MAX)) + remaining
}

/// Serializes a DISCONNECT packet into `buf`.
///
/// # Errors
///
/// `BadParameter` if Remaining Length would exceed [`var_int::MAX_VAR_INT`];
/// `NoMemory` if `buf` is smaller than [`get_size`].
pub fn serialize(info: &DisconnectInfo<'_>, buf: &mut [u8]) -> Result<usize, EncodeError> {
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
    header::encode(PacketType::Disconnect, remaining, &mut writer)?;
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
pub struct DecodedDisconnect<'a> {
    pub reason: ReasonCode,
    pub session_expiry: Option<u32>,
    pub server_reference: Option<&'a str>,
    pub reason_string: Option<&'a str>,
}

/// Parses the remaining-data bytes of a DISCONNECT.
///
/// # Errors
///
/// `MalformedPacket` if the reason code is not in [`DISCONNECT_REASONS`], the
/// property block is malformed, or there are trailing bytes.
pub fn decode<'a>(data: &'a [u8]) -> Result<DecodedDisconnect<'a>, DecodeError> {
    let mut reader = ByteReader::new(data);
    if reader.is_empty() {
        return Ok(DecodedDisconnect {
            reason: ReasonCode::Success,
            session_expiry: None,
            server_reference: None,
            reason_string: None,
        });
    }

    let reason = ReasonCode::decode(&mut reader)?;
    if !DISCONNECT_REASONS.contains(&reason) {
        log::error!("disconnect: reason code not allowed in DISCONNECT: {reason:?}");
        return Err(malformed(MalformedReason::InvalidReasonCode));
    }

    let mut session_expiry = None;
    let mut server_reference = None;
    let mut reason_string = None;

    if reader.is_empty() {
        return Ok(DecodedDisconnect { reason, session_expiry, server_reference, reason_string });
    }

    let mut block = property::read_block(&mut reader)?;
    let ctx = PropertyContext::Packet(PacketKind::Disconnect);
    while let Some(p) = block.next(ctx)? {
        match (p.id, p.value) {
            (PropertyId::SessionExpiryInterval, PropertyValue::U32(v)) => session_expiry = Some(v),
            (PropertyId::ServerReference, PropertyValue::Utf8(s)) => server_reference = Some(s),
            (PropertyId::ReasonString, PropertyValue::Utf8(s)) => reason_string = Some(s),
            (PropertyId::UserProperty, PropertyValue::Utf8Pair(_, _)) => {}
            _ => unreachable!("PROPERTY_TABLE's wire kind always matches what was just decoded"),
        }
    }

    if !reader.is_empty() {
        return Err(malformed(MalformedReason::TrailingBytes));
    }

    Ok(DecodedDisconnect { reason, session_expiry, server_reference, reason_string })
}
