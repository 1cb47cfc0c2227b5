//! # Decoder for the tracking device binary protocol
//!
//! Devices keep a TCP connection open and send one fixed-layout frame per
//! location report. There is no framing, so every read from the connection is
//! taken to be exactly one frame.
//!
//! A frame is decoded field by field, each from its fixed offset (see
//! [`layout`]). Fields that are missing or implausible are substituted with a
//! fallback instead of failing the whole frame (see [`field`]). The device
//! identity is only decoded from the first frame of a connection and then
//! cached in the [`ConnectionContext`].

pub mod field;
pub mod frame;
pub mod identity;
pub mod layout;

pub use crate::{
    field::{
        FallbackReason,
        Field,
    },
    frame::{
        DecodedFrame,
        FrameDecoder,
    },
    identity::ConnectionContext,
    layout::{
        Layout,
        ProtocolSelection,
        ProtocolVariant,
    },
};
