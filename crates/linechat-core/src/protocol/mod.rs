//! Protocol module containing the envelope types, the chat message, and the JSON codec.

pub mod codec;
pub mod messages;
pub mod timestamp;

pub use codec::{
    decode_message, decode_request, decode_response, encode_message, encode_request,
    encode_response, ProtocolError,
};
pub use messages::*;
