// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! UNSUBACK: decode only (a client never sends UNSUBACK).

use crate::byte_cursor::ByteReader;
use crate::error::{DecodeError, MalformedReason};
use crate::packet_type::PacketKind;
use crate::property::{self, PropertyContext, PropertyId, PropertyValue};
use crate::reason_code::{ReasonCode, UNSUBACK_REASONS};

fn malformed(reason: MalformedReason) -> DecodeError {
    DecodeError::MalformedPacket(reason)
}

#[derive(Clone, Copy, Debug)]
pub struct DecodedUnsubscribeAck<'a> {
    pub packet_id: u16,
    pub reason_string: Option<&'a str>,
    /// One reason code per topic filter in the UNSUBSCRIBE this answers, in
    /// the same order.
    pub reasons: &'a [ReasonCode],
}

/// Parses the remaining-data bytes of an UNSUBACK into a caller-supplied
/// scratch slice for the per-filter reason codes.
///
/// # Errors
///
/// `MalformedPacket` if the packet id is zero, the reason list is empty, any
/// reason code is not in [`UNSUBACK_REASONS`], the property block is
/// malformed, or there are more reason codes than `reasons_out` can hold.
pub fn decode<'a>(
    data: &'a [u8],
    reasons_out: &'a mut [ReasonCode],
) -> Result<DecodedUnsubscribeAck<'a>, DecodeError> {
    let mut reader = ByteReader::new(data);
    let packet_id = reader.read_u16()?;
    if packet_id == 0 {
        return Err(malformed(MalformedReason::ZeroPacketId));
    }

    let mut reason_string = None;
    let mut block = property::read_block(&mut reader)?;
    let ctx = PropertyContext::Packet(PacketKind::UnsubscribeAck);
    while let Some(p) = block.next(ctx)? {
        match (p.id, p.value) {
            (PropertyId::ReasonString, PropertyValue::Utf8(s)) => reason_string = Some(s),
            (PropertyId::UserProperty, PropertyValue::Utf8Pair(_, _)) => {}
            _ => unreachable!("PROPERTY_TABLE's wire kind always matches what was just decoded"),
        }
    }

    if reader.is_empty() {
        return Err(malformed(MalformedReason::RemainingLengthMismatch));
    }

    let mut count = 0;
    while !reader.is_empty() {
        let slot = reasons_out.get_mut(count).ok_or(malformed(MalformedReason::BufferTooShort))?;
        let reason = ReasonCode::decode(&mut reader)?;
        if !UNSUBACK_REASONS.contains(&reason) {
            log::error!("unsubscribe_ack: reason code not allowed in UNSUBACK: {reason:?}");
            return Err(malformed(MalformedReason::InvalidReasonCode));
        }
        *slot = reason;
        count += 1;
    }

    Ok(DecodedUnsubscribeAck { packet_id, reason_string, reasons: &reasons_out[..count] })
}
