use thiserror::Error;

use crate::protocol::Op;

/// Stream-fatal errors raised by the decoder.
///
/// "Incomplete input" and "transient block" are not represented here: they
/// are ordinary control-flow values (see [`crate::decoder::ParseOutcome`] and
/// [`crate::decoder::DecodeState`]), not failures. Every variant below tears
/// down the decoder for its direction per `spec.md` §7.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XcodecError {
    #[error("unsupported XCodec opcode {0:#04x}")]
    UnknownOpcode(u8),

    #[error("duplicate <HELLO> on a connection that already completed its handshake")]
    DuplicateHello,

    #[error("unsupported <HELLO> option length: {0}")]
    UnsupportedHelloLength(u8),

    #[error("index {index} not present in <BACKREF> window of length {window_len}")]
    BackrefIndexOutOfRange { index: u8, window_len: usize },

    #[error("<ASK> received with no local encoder to service it")]
    AskWithoutEncoder,

    #[error("collision in <{op:?}>: fingerprint {fingerprint:#018x} already maps to a different segment")]
    CacheCollision { op: Op, fingerprint: u64 },
}

pub type Result<T> = std::result::Result<T, XcodecError>;
