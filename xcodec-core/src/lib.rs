#![forbid(unsafe_code)]

//! The XCodec dedup engine: a rolling-hash segment extractor, a shared
//! dictionary cache, an encoder/decoder pair, and the seven-token wire
//! protocol that keeps two peers' dictionaries in sync.
//!
//! This crate does no network I/O. It consumes byte buffers and produces
//! byte buffers; how those buffers reach the wire is a collaborator's
//! concern (see the `xcodec-demo` binary for one such collaborator).

pub mod backref;
pub mod cache;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod hash;
pub mod pipe;
pub mod protocol;
pub mod segment;

pub use backref::BackrefWindow;
pub use cache::{DictionaryCache, EnterOutcome};
pub use decoder::{DecodeState, Decoder, DecoderEvent};
pub use encoder::Encoder;
pub use error::{Result, XcodecError};
pub use hash::{Fingerprint, RollingHash};
pub use pipe::{Pipe, PipeInput, PipePair, Role};
pub use protocol::{Op, Token, MAGIC};
pub use segment::{Segment, SEGMENT_LEN};
