//! Messages exchanged between a transform server and its buffer clients.
//!
//! Every message travels in a frame: a little-endian `u32` payload length
//! followed by the bincode encoded envelope. A connection starts with a
//! [`HelloMessage`] answered by a [`WelcomeMessage`]; after that each
//! [`RequestEnvelope`] gets exactly one [`ResponseEnvelope`] carrying the same id.

pub mod error;
pub mod framing;
pub mod messages;
pub mod service;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{
    decode_message, encode_frame, peek_request_id, read_frame, read_message, write_message,
    MAX_FRAME_LEN,
};
pub use messages::{
    HelloMessage, Request, RequestEnvelope, Response, ResponseEnvelope, WelcomeMessage,
    WireTransform, PROTOCOL_VERSION,
};
pub use service::{
    default_socket_dir, socket_path, validate_service_name, DEFAULT_SERVICE_NAME, SOCKET_DIR_ENV,
};
