// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::convert::TryFrom;

use crate::error::{DecodeError, MalformedReason};
use crate::qos::QoS;

/// First byte of an MQTT control packet: high nibble is the packet type,
/// low nibble carries flags (reserved for most types, PUBLISH's
/// DUP/QoS/RETAIN bits, or the fixed `0b0010` required by
/// PUBREL/SUBSCRIBE/UNSUBSCRIBE).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PacketType {
    Connect,
    ConnectAck,
    Publish { dup: bool, qos: QoS, retain: bool },
    PublishAck,
    PublishReceived,
    PublishRelease,
    PublishComplete,
    Subscribe,
    SubscribeAck,
    Unsubscribe,
    UnsubscribeAck,
    PingRequest,
    PingResponse,
    Disconnect,
    Auth,
}

/// High-nibble-only discriminant, used by the property allow-list and by
/// incoming-direction framing where no flag bits have been parsed yet.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PacketKind {
    Connect = 1,
    ConnectAck = 2,
    Publish = 3,
    PublishAck = 4,
    PublishReceived = 5,
    PublishRelease = 6,
    PublishComplete = 7,
    Subscribe = 8,
    SubscribeAck = 9,
    Unsubscribe = 10,
    UnsubscribeAck = 11,
    PingRequest = 12,
    PingResponse = 13,
    Disconnect = 14,
    Auth = 15,
}

impl PacketType {
    #[must_use]
    pub const fn kind(self) -> PacketKind {
        match self {
            Self::Connect => PacketKind::Connect,
            Self::ConnectAck => PacketKind::ConnectAck,
            Self::Publish { .. } => PacketKind::Publish,
            Self::PublishAck => PacketKind::PublishAck,
            Self::PublishReceived => PacketKind::PublishReceived,
            Self::PublishRelease => PacketKind::PublishRelease,
            Self::PublishComplete => PacketKind::PublishComplete,
            Self::Subscribe => PacketKind::Subscribe,
            Self::SubscribeAck => PacketKind::SubscribeAck,
            Self::Unsubscribe => PacketKind::Unsubscribe,
            Self::UnsubscribeAck => PacketKind::UnsubscribeAck,
            Self::PingRequest => PacketKind::PingRequest,
            Self::PingResponse => PacketKind::PingResponse,
            Self::Disconnect => PacketKind::Disconnect,
            Self::Auth => PacketKind::Auth,
        }
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        let type_bits = packet_type.kind() as u8;
        let flag_bits = match packet_type {
            PacketType::Publish { dup, qos, retain } => {
                let dup = if dup { 0b0000_1000 } else { 0 };
                let qos: u8 = qos.into();
                let retain = u8::from(retain);
                dup | (qos << 1) | retain
            }
            PacketType::PublishRelease | PacketType::Subscribe | PacketType::Unsubscribe => {
                0b0000_0010
            }
            _ => 0,
        };
        (type_bits << 4) | flag_bits
    }
}

impl TryFrom<u8> for PacketType {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let type_bits = byte >> 4;
        let flags = byte & 0x0f;
        let bad_flags = || DecodeError::MalformedPacket(MalformedReason::InvalidPacketFlags);

        match type_bits {
            1 if flags == 0 => Ok(Self::Connect),
            2 if flags == 0 => Ok(Self::ConnectAck),
            3 => {
                let dup = flags & 0b0000_1000 != 0;
                let retain = flags & 0b0000_0001 != 0;
                let qos = QoS::try_from((flags & 0b0000_0110) >> 1)?;
                Ok(Self::Publish { dup, qos, retain })
            }
            4 if flags == 0 => Ok(Self::PublishAck),
            5 if flags == 0 => Ok(Self::PublishReceived),
            6 if flags == 0b0000_0010 => Ok(Self::PublishRelease),
            7 if flags == 0 => Ok(Self::PublishComplete),
            8 if flags == 0b0000_0010 => Ok(Self::Subscribe),
            9 if flags == 0 => Ok(Self::SubscribeAck),
            10 if flags == 0b0000_0010 => Ok(Self::Unsubscribe),
            11 if flags == 0 => Ok(Self::UnsubscribeAck),
            12 if flags == 0 => Ok(Self::PingRequest),
            13 if flags == 0 => Ok(Self::PingResponse),
            14 if flags == 0 => Ok(Self::Disconnect),
            15 if flags == 0 => Ok(Self::Auth),
            1..=15 => Err(bad_flags()),
            _ => Err(DecodeError::MalformedPacket(MalformedReason::InvalidPacketType)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_flags_round_trip() {
        let pt = PacketType::Publish { dup: true, qos: QoS::AtLeastOnce, retain: true };
        let byte: u8 = pt.into();
        assert_eq!(byte, 0b0011_1011);
        assert_eq!(PacketType::try_from(byte).unwrap(), pt);
    }

    #[test]
    fn pubrel_requires_reserved_flags() {
        assert!(PacketType::try_from(0b0110_0000).is_err());
        assert!(PacketType::try_from(0b0110_0010).is_ok());
    }

    #[test]
    fn reserved_top_nibble_is_rejected() {
        assert!(PacketType::try_from(0b0000_0000).is_err());
    }
}
