// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! CONNECT: size calculation and serialization only. Parsing a CONNECT is a
//! broker concern, out of scope for a client-side codec.

use crate::byte_cursor::{checked_binary_size, checked_utf8_size, ByteWriter};
use crate::error::{BadParameterKind, EncodeError};
use crate::header;
use crate::packet_type::PacketType;
use crate::property;
use crate::qos::QoS;
use crate::var_int;

const PROTOCOL_NAME_AND_LEVEL: usize = 2 + 4 + 1; // "MQTT" (length-prefixed) + protocol level byte
const CONNECT_FLAGS_AND_KEEP_ALIVE: usize = 1 + 2;

/// The Will message, reusing PUBLISH's shape per spec.
pub struct WillInfo<'a> {
    pub qos: QoS,
    pub retain: bool,
    pub topic: &'a str,
    pub payload: &'a [u8],
    /// Will Properties block, already built via
    /// `PropertyBuilder`/`PropertyContext::Will`.
    pub properties: &'a [u8],
}

pub struct ConnectInfo<'a> {
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: &'a str,
    pub user_name: Option<&'a str>,
    pub password: Option<&'a [u8]>,
    pub will: Option<WillInfo<'a>>,
    /// CONNECT Properties block, already built via
    /// `PropertyBuilder`/`PropertyContext::Packet(PacketKind::Connect)`.
    pub properties: &'a [u8],
}

fn connect_flags(info: &ConnectInfo<'_>) -> u8 {
    let mut flags = 0u8;
    if info.clean_session {
        flags |= 0b0000_0010;
    }
    if let Some(will) = &info.will {
        flags |= 0b0000_0100;
        flags |= (will.qos as u8) << 3;
        if will.retain {
            flags |= 0b0010_0000;
        }
    }
    if info.password.is_some() {
        flags |= 0b0100_0000;
    }
    if info.user_name.is_some() {
        flags |= 0b1000_0000;
    }
    flags
}

fn remaining_length(info: &ConnectInfo<'_>) -> Result<usize, EncodeError> {
    let variable_header =
        PROTOCOL_NAME_AND_LEVEL + CONNECT_FLAGS_AND_KEEP_ALIVE + property::block_size(info.properties);

    let mut payload = checked_utf8_size(info.client_id)?;
    if let Some(will) = &info.will {
        payload += property::block_size(will.properties);
        payload += checked_utf8_size(will.topic)?;
        payload += checked_binary_size(will.payload)?;
    }
    if let Some(user_name) = info.user_name {
        payload += checked_utf8_size(user_name)?;
    }
    if let Some(password) = info.password {
        payload += checked_binary_size(password)?;
    }

    Ok(variable_header + payload)
}

/// Computes the total packet size (header included) for `info`.
///
/// # Errors
///
/// `BadParameter` if any string/binary field exceeds its wire limit or if
/// the resulting Remaining Length exceeds [`var_int::MAX_VAR_INT`].
pub fn get_size(info: &ConnectInfo<'_>) -> Result<usize, EncodeError> {
    let remaining = remaining_length(info)?;
    if remaining > var_int::MAX_VAR_INT as usize {
        return Err(EncodeError::BadParameter(BadParameterKind::RemainingLengthTooLarge));
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok(header::encoded_size(remaining as u32) + remaining)
}

/// Serializes a CONNECT packet into `buf`, returning the number of bytes
/// written.
///
/// # Errors
///
/// `NoMemory` if `buf` is smaller than [`get_size`] for the same `info`;
/// any error `get_size` can return.
pub fn serialize(info: &ConnectInfo<'_>, buf: &mut [u8]) -> Result<usize, EncodeError> {
    let size = get_size(info)?;
    if buf.len() < size {
        return Err(EncodeError::NoMemory);
    }
    let remaining = remaining_length(info)?;
    #[allow(clippy::cast_possible_truncation)]
    let remaining = remaining as u32;

    let mut writer = ByteWriter::new(buf);
    header::encode(PacketType::Connect, remaining, &mut writer)?;
    writer.write_utf8_str("MQTT")?;
    writer.write_u8(5)?;
    writer.write_u8(connect_flags(info))?;
    writer.write_u16(info.keep_alive)?;
    property::write_block(info.properties, &mut writer)?;

    writer.write_utf8_str(info.client_id)?;
    if let Some(will) = &info.will {
        property::write_block(will.properties, &mut writer)?;
        writer.write_utf8_str(will.topic)?;
        writer.write_binary(will.payload)?;
    }
    if let Some(user_name) = info.user_name {
        writer.write_utf8_str(user_name)?;
    }
    if let Some(password) = info.password {
        writer.write_binary(password)?;
    }

    Ok(writer.position())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_connect_matches_spec_bytes() {
        let info = ConnectInfo {
            clean_session: true,
            keep_alive: 60,
            client_id: "a",
            user_name: None,
            password: None,
            will: None,
            properties: &[],
        };
        let size = get_size(&info).unwrap();
        let mut buf = vec![0u8; size];
        let written = serialize(&info, &mut buf).unwrap();
        assert_eq!(written, size);
        assert_eq!(
            buf,
            vec![
                0x10, 0x0D, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x05, 0x02, 0x00, 0x3C, 0x00, 0x00,
                0x01, b'a',
            ]
        );
    }

    #[test]
    fn undersized_buffer_is_no_memory() {
        let info = ConnectInfo {
            clean_session: true,
            keep_alive: 60,
            client_id: "a",
            user_name: None,
            password: None,
            will: None,
            properties: &[],
        };
        let mut buf = [0u8; 4];
        assert_eq!(serialize(&info, &mut buf).unwrap_err(), EncodeError::NoMemory);
    }

    #[test]
    fn with_will_and_credentials() {
        let will = WillInfo {
            qos: QoS::AtLeastOnce,
            retain: true,
            topic: "lwt",
            payload: b"bye",
            properties: &[],
        };
        let info = ConnectInfo {
            clean_session: false,
            keep_alive: 30,
            client_id: "client-1",
            user_name: Some("user"),
            password: Some(b"pw"),
            will: Some(will),
            properties: &[],
        };
        let size = get_size(&info).unwrap();
        let mut buf = vec![0u8; size];
        let written = serialize(&info, &mut buf).unwrap();
        assert_eq!(written, size);
        assert_eq!(buf[0], 0x10);
        // clean_session=0, will=1, will_qos=01, will_retain=1, password=1, user_name=1
        assert_eq!(buf[9], 0b1110_1100);
    }
}
