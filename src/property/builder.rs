// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::byte_cursor::ByteWriter;
use crate::error::{BadParameterKind, EncodeError};

use super::{descriptor_for, PropertyContext, PropertyId};

/// Append-only, typed property writer.
///
/// Owns a caller-provided byte region (the property *value* bytes, not
/// including the VBI length prefix the containing packet writes around
/// it) plus two pieces of state: `current_index`, the next write
/// position, and `field_set`, a bitset over the 28 duplication slots of
/// §4.2 recording which non-repeatable properties have already been
/// written. Every `add_*` call is all-or-nothing: on error neither
/// `current_index` nor `field_set` is touched, so the builder is safe to
/// retry or abandon.
pub struct PropertyBuilder<'a> {
    buf: &'a mut [u8],
    current_index: usize,
    field_set: u32,
}

impl<'a> PropertyBuilder<'a> {
    #[must_use]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, current_index: 0, field_set: 0 }
    }

    /// Number of property bytes written so far (identifiers + values, not
    /// including the block's own VBI length prefix).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.current_index == 0
    }

    fn slot_written(&self, id: PropertyId) -> bool {
        self.field_set & (1 << descriptor_for(id).slot) != 0
    }

    fn validate(&self, id: PropertyId, ctx: Option<PropertyContext>) -> Result<(), EncodeError> {
        let descriptor = descriptor_for(id);
        if let Some(ctx) = ctx {
            if descriptor.allowed & ctx.mask() == 0 {
                return Err(EncodeError::BadParameter(
                    BadParameterKind::PropertyNotAllowedForPacketType,
                ));
            }
        }
        if !matches!(id, PropertyId::UserProperty) && self.slot_written(id) {
            return Err(EncodeError::BadParameter(BadParameterKind::DuplicateProperty));
        }
        if matches!(id, PropertyId::AuthenticationData)
            && !self.slot_written(PropertyId::AuthenticationMethod)
        {
            return Err(EncodeError::BadParameter(BadParameterKind::AuthDataWithoutMethod));
        }
        Ok(())
    }

    fn append<F>(
        &mut self,
        id: PropertyId,
        ctx: Option<PropertyContext>,
        write_value: F,
    ) -> Result<(), EncodeError>
    where
        F: FnOnce(&mut ByteWriter<'_>) -> Result<(), EncodeError>,
    {
        self.validate(id, ctx)?;
        let mut writer = ByteWriter::new(&mut self.buf[self.current_index..]);
        writer.write_u8(id as u8)?;
        write_value(&mut writer)?;
        self.current_index += writer.position();
        if !matches!(id, PropertyId::UserProperty) {
            self.field_set |= 1 << descriptor_for(id).slot;
        }
        Ok(())
    }

    fn bad(kind: BadParameterKind) -> EncodeError {
        EncodeError::BadParameter(kind)
    }

    /// # Errors
    /// `BadParameter` if `value` is not 0 or 1, if already set, or if
    /// `ctx` disallows it for that packet type; `NoMemory` if the region
    /// is full.
    pub fn add_payload_format_indicator(
        &mut self,
        value: u8,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        if value > 1 {
            return Err(Self::bad(BadParameterKind::InvalidPropertyValue));
        }
        self.append(PropertyId::PayloadFormatIndicator, ctx, |w| w.write_u8(value))
    }

    pub fn add_message_expiry_interval(
        &mut self,
        value: u32,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::MessageExpiryInterval, ctx, |w| w.write_u32(value))
    }

    pub fn add_content_type(&mut self, value: &str, ctx: Option<PropertyContext>) -> Result<(), EncodeError> {
        self.append(PropertyId::ContentType, ctx, |w| w.write_utf8_str(value))
    }

    pub fn add_response_topic(&mut self, value: &str, ctx: Option<PropertyContext>) -> Result<(), EncodeError> {
        self.append(PropertyId::ResponseTopic, ctx, |w| w.write_utf8_str(value))
    }

    pub fn add_correlation_data(
        &mut self,
        value: &[u8],
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::CorrelationData, ctx, |w| w.write_binary(value))
    }

    /// # Errors
    /// `BadParameter` if `value` is zero (Protocol Error per MQTT-3.8.2.1.2-1).
    pub fn add_subscription_identifier(
        &mut self,
        value: u32,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        if value == 0 {
            return Err(Self::bad(BadParameterKind::InvalidPropertyValue));
        }
        self.append(PropertyId::SubscriptionIdentifier, ctx, |w| crate::var_int::encode(value, w))
    }

    pub fn add_session_expiry_interval(
        &mut self,
        value: u32,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::SessionExpiryInterval, ctx, |w| w.write_u32(value))
    }

    pub fn add_assigned_client_identifier(
        &mut self,
        value: &str,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::AssignedClientIdentifier, ctx, |w| w.write_utf8_str(value))
    }

    pub fn add_server_keep_alive(
        &mut self,
        value: u16,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::ServerKeepAlive, ctx, |w| w.write_u16(value))
    }

    pub fn add_authentication_method(
        &mut self,
        value: &str,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::AuthenticationMethod, ctx, |w| w.write_utf8_str(value))
    }

    /// # Errors
    /// `BadParameter` if Authentication Method has not been added yet.
    pub fn add_authentication_data(
        &mut self,
        value: &[u8],
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::AuthenticationData, ctx, |w| w.write_binary(value))
    }

    pub fn add_request_problem_information(
        &mut self,
        value: bool,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::RequestProblemInformation, ctx, |w| w.write_u8(u8::from(value)))
    }

    pub fn add_will_delay_interval(
        &mut self,
        value: u32,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::WillDelayInterval, ctx, |w| w.write_u32(value))
    }

    pub fn add_request_response_information(
        &mut self,
        value: bool,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::RequestResponseInformation, ctx, |w| w.write_u8(u8::from(value)))
    }

    pub fn add_response_information(
        &mut self,
        value: &str,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::ResponseInformation, ctx, |w| w.write_utf8_str(value))
    }

    pub fn add_server_reference(
        &mut self,
        value: &str,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::ServerReference, ctx, |w| w.write_utf8_str(value))
    }

    pub fn add_reason_string(&mut self, value: &str, ctx: Option<PropertyContext>) -> Result<(), EncodeError> {
        self.append(PropertyId::ReasonString, ctx, |w| w.write_utf8_str(value))
    }

    /// # Errors
    /// `BadParameter` if `value` is zero.
    pub fn add_receive_maximum(
        &mut self,
        value: u16,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        if value == 0 {
            return Err(Self::bad(BadParameterKind::InvalidPropertyValue));
        }
        self.append(PropertyId::ReceiveMaximum, ctx, |w| w.write_u16(value))
    }

    pub fn add_topic_alias_maximum(
        &mut self,
        value: u16,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::TopicAliasMaximum, ctx, |w| w.write_u16(value))
    }

    /// # Errors
    /// `BadParameter` if `value` is zero.
    pub fn add_topic_alias(&mut self, value: u16, ctx: Option<PropertyContext>) -> Result<(), EncodeError> {
        if value == 0 {
            return Err(Self::bad(BadParameterKind::InvalidPropertyValue));
        }
        self.append(PropertyId::TopicAlias, ctx, |w| w.write_u16(value))
    }

    /// # Errors
    /// `BadParameter` if `value` is not 0 or 1.
    pub fn add_maximum_qos(&mut self, value: u8, ctx: Option<PropertyContext>) -> Result<(), EncodeError> {
        if value > 1 {
            return Err(Self::bad(BadParameterKind::InvalidPropertyValue));
        }
        self.append(PropertyId::MaximumQoS, ctx, |w| w.write_u8(value))
    }

    pub fn add_retain_available(
        &mut self,
        value: bool,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::RetainAvailable, ctx, |w| w.write_u8(u8::from(value)))
    }

    /// Appends a User Property pair. Unlike every other property, this may
    /// be called any number of times; it never participates in duplicate
    /// detection.
    pub fn add_user_property(
        &mut self,
        name: &str,
        value: &str,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::UserProperty, ctx, |w| {
            w.write_utf8_str(name)?;
            w.write_utf8_str(value)
        })
    }

    /// # Errors
    /// `BadParameter` if `value` is zero.
    pub fn add_maximum_packet_size(
        &mut self,
        value: u32,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        if value == 0 {
            return Err(Self::bad(BadParameterKind::InvalidPropertyValue));
        }
        self.append(PropertyId::MaximumPacketSize, ctx, |w| w.write_u32(value))
    }

    pub fn add_wildcard_subscription_available(
        &mut self,
        value: bool,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::WildcardSubscriptionAvailable, ctx, |w| w.write_u8(u8::from(value)))
    }

    pub fn add_subscription_identifier_available(
        &mut self,
        value: bool,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::SubscriptionIdentifierAvailable, ctx, |w| w.write_u8(u8::from(value)))
    }

    pub fn add_shared_subscription_available(
        &mut self,
        value: bool,
        ctx: Option<PropertyContext>,
    ) -> Result<(), EncodeError> {
        self.append(PropertyId::SharedSubscriptionAvailable, ctx, |w| w.write_u8(u8::from(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet_type::PacketKind;

    #[test]
    fn duplicate_property_is_rejected() {
        let mut buf = [0u8; 64];
        let mut b = PropertyBuilder::new(&mut buf);
        b.add_session_expiry_interval(10, Some(PropertyContext::Packet(PacketKind::Connect))).unwrap();
        let err = b
            .add_session_expiry_interval(20, Some(PropertyContext::Packet(PacketKind::Connect)))
            .unwrap_err();
        assert_eq!(err, EncodeError::BadParameter(BadParameterKind::DuplicateProperty));
    }

    #[test]
    fn disallowed_packet_type_is_rejected() {
        let mut buf = [0u8; 64];
        let mut b = PropertyBuilder::new(&mut buf);
        let err = b
            .add_maximum_qos(1, Some(PropertyContext::Packet(PacketKind::Publish)))
            .unwrap_err();
        assert_eq!(
            err,
            EncodeError::BadParameter(BadParameterKind::PropertyNotAllowedForPacketType)
        );
    }

    #[test]
    fn zero_receive_maximum_is_rejected() {
        let mut buf = [0u8; 64];
        let mut b = PropertyBuilder::new(&mut buf);
        assert!(b.add_receive_maximum(0, None).is_err());
    }

    #[test]
    fn auth_data_requires_auth_method_first() {
        let mut buf = [0u8; 64];
        let mut b = PropertyBuilder::new(&mut buf);
        let err = b.add_authentication_data(b"token", None).unwrap_err();
        assert_eq!(err, EncodeError::BadParameter(BadParameterKind::AuthDataWithoutMethod));

        b.add_authentication_method("SCRAM-SHA-1", None).unwrap();
        assert!(b.add_authentication_data(b"token", None).is_ok());
    }

    #[test]
    fn user_property_may_repeat() {
        let mut buf = [0u8; 64];
        let mut b = PropertyBuilder::new(&mut buf);
        b.add_user_property("k", "v1", None).unwrap();
        b.add_user_property("k", "v2", None).unwrap();
        assert!(b.len() > 0);
    }

    #[test]
    fn capacity_overflow_is_no_memory() {
        let mut buf = [0u8; 2];
        let mut b = PropertyBuilder::new(&mut buf);
        let err = b.add_session_expiry_interval(1, None).unwrap_err();
        assert_eq!(err, EncodeError::NoMemory);
        // state unchanged on failure
        assert_eq!(b.len(), 0);
    }

    #[test]
    fn no_state_change_on_validation_error() {
        let mut buf = [0u8; 64];
        let mut b = PropertyBuilder::new(&mut buf);
        assert!(b.add_topic_alias(0, None).is_err());
        assert_eq!(b.len(), 0);
    }
}
