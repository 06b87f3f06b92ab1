//! Binds one [`Encoder`] and one [`Decoder`] to a single connection and
//! routes control tokens between them (`spec.md` §4.6).
//!
//! Grounded on `original_source/io/pipe/pipe_link.cc`'s `input`/`output`
//! contract, collapsed into the single synchronous [`Pipe::consume`] call
//! `spec.md` §9 asks for ("a pipe consumes a buffer or EOF and emits a
//! buffer or error — two methods"): the core has no I/O loop of its own, so
//! there is nothing to callback into.

use std::fmt;

use crate::cache::DictionaryCache;
use crate::decoder::{Decoder, DecoderEvent};
use crate::encoder::Encoder;
use crate::error::XcodecError;

/// Which side of a connection a [`PipePair`] plays. Only affects which
/// `tracing` span field each direction's logs carry — the two roles are
/// structurally identical (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Server => f.write_str("server"),
        }
    }
}

/// Input delivered to a [`Pipe`]: a chunk of bytes, or end of stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeInput<'a> {
    Data(&'a [u8]),
    Eof,
}

/// A narrow interface: feed it a buffer or EOF, get back a buffer or error.
/// The encoder and decoder directions of a [`PipePair`] are its only two
/// implementations.
pub trait Pipe {
    fn consume(&mut self, input: PipeInput<'_>) -> Result<Vec<u8>, XcodecError>;
}

/// Binds an [`Encoder`] and a [`Decoder`] for one connection side.
///
/// `incoming()` carries wire bytes to application bytes (driving the
/// decoder); `outgoing()` carries application bytes to wire bytes (driving
/// the encoder). They share the encoder/decoder pair so that an `ASK`
/// raised by the decoder, or a `LEARN` owed in response to a peer's `ASK`,
/// is written onto the *same* outgoing wire stream the encoder already
/// writes application data to — there is no separate control channel
/// (`spec.md` §4.6: "routes them through the same outgoing byte stream").
pub struct PipePair {
    encoder: Encoder,
    decoder: Decoder,
    pending_wire_control: Vec<u8>,
    poisoned: Option<XcodecError>,
}

impl PipePair {
    /// `cache` is a handle, not a fresh store: pass the same
    /// [`DictionaryCache`] to every pair that should see each other's
    /// learned segments, or a fresh one per pair for isolation.
    #[must_use]
    pub fn new(role: Role, cache: DictionaryCache) -> Self {
        Self::with_backref_capacity(role, cache, crate::backref::MAX_CAPACITY)
    }

    #[must_use]
    pub fn with_backref_capacity(role: Role, cache: DictionaryCache, backref_capacity: usize) -> Self {
        Self {
            encoder: Encoder::new(cache.clone(), backref_capacity, role),
            decoder: Decoder::new(cache, backref_capacity, true, role),
            pending_wire_control: Vec::new(),
            poisoned: None,
        }
    }

    #[must_use]
    pub fn incoming(&mut self) -> IncomingPipe<'_> {
        IncomingPipe { pair: self }
    }

    #[must_use]
    pub fn outgoing(&mut self) -> OutgoingPipe<'_> {
        OutgoingPipe { pair: self }
    }

    /// Fingerprints currently held in this pair's encoder-side backref
    /// window, most-recent first. Exposed for the cross-pair equivalence
    /// property test (`spec.md` §8): the encoder's and a correctly-wired
    /// peer decoder's windows must match after any prefix of a token stream.
    #[must_use]
    pub fn encoder_backref_fingerprints(&self) -> Vec<crate::hash::Fingerprint> {
        self.encoder.backref_window().fingerprints()
    }

    /// Same as [`Self::encoder_backref_fingerprints`] but for the decoder
    /// side of this pair.
    #[must_use]
    pub fn decoder_backref_fingerprints(&self) -> Vec<crate::hash::Fingerprint> {
        self.decoder.backref_window().fingerprints()
    }

    /// Drains any `ASK`/`LEARN` bytes the decoder has queued for the local
    /// encoder to write onto the wire, without waiting for the next
    /// `outgoing().consume(...)` call to piggyback them. A collaborator
    /// whose outgoing direction is otherwise idle (e.g. waiting on stdin)
    /// must call this after `incoming().consume(...)` so a decoder `ASK` can
    /// still reach the peer and unblock the stream (`spec.md` §4.6).
    #[must_use]
    pub fn take_pending_wire_control(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending_wire_control)
    }

    fn consume_incoming(&mut self, input: PipeInput<'_>) -> Result<Vec<u8>, XcodecError> {
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }
        let bytes = match input {
            PipeInput::Data(bytes) => bytes,
            PipeInput::Eof => &[],
        };

        let mut output = Vec::new();
        let mut events = Vec::new();
        let result = self.decoder.decode(bytes, &mut output, &mut events);

        for event in events {
            match event {
                DecoderEvent::Ask(fingerprint) => self.encoder.encode_ask(fingerprint, &mut self.pending_wire_control),
                DecoderEvent::LearnRequest(fingerprint) => {
                    self.encoder.encode_learn(fingerprint, &mut self.pending_wire_control)
                }
            }
        }

        if let Err(err) = result {
            self.poisoned = Some(err.clone());
            return Err(err);
        }
        Ok(output)
    }

    fn consume_outgoing(&mut self, input: PipeInput<'_>) -> Result<Vec<u8>, XcodecError> {
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }
        let mut out = std::mem::take(&mut self.pending_wire_control);
        match input {
            PipeInput::Data(bytes) => self.encoder.encode(bytes, &mut out),
            PipeInput::Eof => self.encoder.finish(&mut out),
        }
        Ok(out)
    }
}

/// The wire-to-application direction of a [`PipePair`].
pub struct IncomingPipe<'a> {
    pair: &'a mut PipePair,
}

impl Pipe for IncomingPipe<'_> {
    fn consume(&mut self, input: PipeInput<'_>) -> Result<Vec<u8>, XcodecError> {
        self.pair.consume_incoming(input)
    }
}

/// The application-to-wire direction of a [`PipePair`].
pub struct OutgoingPipe<'a> {
    pair: &'a mut PipePair,
}

impl Pipe for OutgoingPipe<'_> {
    fn consume(&mut self, input: PipeInput<'_>) -> Result<Vec<u8>, XcodecError> {
        self.pair.consume_outgoing(input)
    }
}
