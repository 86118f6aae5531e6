// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Caller-buffer MQTT 5.0 control packet codec: no internal allocation, no
//! I/O of its own. Every module sizes, serializes, and/or parses one packet
//! type; `header` frames an incoming byte stream into type + Remaining
//! Length before a caller dispatches to the matching parser.

pub mod auth;
pub mod byte_cursor;
pub mod connect;
pub mod connect_ack;
pub mod disconnect;
pub mod dup;
pub mod error;
pub mod header;
pub mod packet_type;
pub mod ping;
pub mod property;
pub mod publish;
pub mod publish_ack;
pub mod qos;
pub mod reason_code;
pub mod subscribe;
pub mod subscribe_ack;
pub mod unsubscribe;
pub mod unsubscribe_ack;
pub mod var_int;

// Each packet-type module exposes its own `get_size`/`serialize`/`decode`
// (names collide across modules by design, mirroring the one-shape-per-type
// wire layout), so callers reach them as `connect::serialize`,
// `publish::decode`, and so on rather than through a single flat
// re-export. Only the names that are unique crate-wide are hoisted here.
pub use byte_cursor::{ByteReader, ByteWriter, MAX_STRING_LEN};
pub use dup::flip_publish_dup_bit;
pub use error::{BadParameterKind, CodecError, DecodeError, EncodeError, MalformedReason};
pub use header::{FixedHeader, Receiver};
pub use packet_type::{PacketKind, PacketType};
pub use property::{
    descriptor_for, Property, PropertyBuilder, PropertyContext, PropertyDescriptor, PropertyId,
    PropertyReader, PropertyValue, PROPERTY_TABLE,
};
pub use qos::QoS;
pub use reason_code::{
    ReasonCode, AUTH_REASONS, CONNACK_REASONS, DISCONNECT_REASONS, PUBACK_REASONS,
    PUBCOMP_REASONS, PUBREC_REASONS, PUBREL_REASONS, SUBACK_REASONS, UNSUBACK_REASONS,
};
pub use var_int::MAX_VAR_INT;
