//! Wire protocol: envelope parsing, schema validation, and outgoing message
//! construction.

pub mod envelope;
pub mod rpc;
pub mod schemas;

pub use envelope::{parse_frame, Envelope, ParseError, ParsedEnvelope, RequestData};
pub use rpc::WireFrame;
