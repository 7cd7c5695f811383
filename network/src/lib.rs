//! Front-tier transport: frame codec, wire messages, streaming ingestion and client.

pub mod client;
pub mod frame;
pub mod ingest;
pub mod protocol;

pub use crate::client::{ClientError, FrontTierClient, UPLOAD_CHUNK_BYTES};
pub use crate::frame::{
    message_stream, read_frame, read_message, write_frame, write_message, FrameError,
    FRAME_OVERHEAD_BYTES,
};
pub use crate::ingest::{
    ingest_request, IngestDecoder, IngestError, IngestLimits, IngestedRequest,
    DEFAULT_MAX_CHUNK_BYTES, DEFAULT_MAX_PAYLOAD_BYTES,
};
pub use crate::protocol::{Reply, RequestHeader, StreamFrame, MULTI_TAG_UNSUPPORTED};
