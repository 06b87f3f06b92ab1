//! Scans application bytes and emits the XCodec token stream (`spec.md`
//! §4.4).
//!
//! The encoder slides a `SEGMENT_LEN`-byte window across buffered input one
//! byte at a time. At each position it either recognizes the window
//! (`BACKREF`/`REF`), teaches it (`EXTRACT`), or — on a cache collision or a
//! plain miss — gives up on that position and emits the single leading byte
//! as a literal, advancing by one. Bytes that cannot yet form a full window
//! are held back rather than flushed, since they may still complete a
//! window once more input arrives (`spec.md` §4.4 step 1).

use tracing::{debug, Span};

use crate::backref::BackrefWindow;
use crate::cache::{DictionaryCache, EnterOutcome};
use crate::error::XcodecError;
use crate::hash::{hash_segment, Fingerprint};
use crate::pipe::Role;
use crate::protocol::{encode_ask, encode_backref, encode_escape, encode_extract, encode_hello, encode_learn, encode_ref, MAGIC};
use crate::segment::{Segment, SEGMENT_LEN};

/// Scans application bytes and emits the token stream for one direction.
pub struct Encoder {
    cache: DictionaryCache,
    window: BackrefWindow,
    pending: Vec<u8>,
    hello_sent: bool,
    span: Span,
}

impl Encoder {
    #[must_use]
    pub fn new(cache: DictionaryCache, backref_capacity: usize, role: Role) -> Self {
        Self {
            cache,
            window: BackrefWindow::new(backref_capacity),
            pending: Vec::new(),
            hello_sent: false,
            span: tracing::info_span!("xcodec_encoder", role = %role),
        }
    }

    #[must_use]
    pub fn backref_window(&self) -> &BackrefWindow {
        &self.window
    }

    /// Encodes one chunk of application bytes, appending wire tokens to
    /// `out`. The encoder's very first emission on a connection is always
    /// `HELLO` (`spec.md` §4.4).
    pub fn encode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        let _enter = self.span.enter();
        self.ensure_hello(out);
        self.pending.extend_from_slice(input);
        self.scan(out);
    }

    /// Signals end of stream: flushes whatever remains buffered (fewer than
    /// `SEGMENT_LEN` bytes, since anything at or above that was already
    /// consumed by [`Self::scan`]) as literal bytes.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        let _enter = self.span.enter();
        self.ensure_hello(out);
        let tail = std::mem::take(&mut self.pending);
        for byte in tail {
            self.emit_literal_byte(out, byte);
        }
    }

    /// Writes `ASK(fingerprint)` onto this direction's wire — called by the
    /// co-located decoder when it parses a `REF` it cannot resolve
    /// (`spec.md` §2: "ASK tokens generated by a decoder are routed to the
    /// local encoder").
    pub fn encode_ask(&mut self, fingerprint: Fingerprint, out: &mut Vec<u8>) {
        let _enter = self.span.enter();
        self.ensure_hello(out);
        debug!(fingerprint = format_args!("{fingerprint:#018x}"), "emitting ASK");
        encode_ask(out, fingerprint);
    }

    /// Writes `LEARN(segment)` onto this direction's wire in response to a
    /// peer's `ASK`. The fingerprint must already be in the shared cache —
    /// it names a segment this encoder itself taught earlier — so a miss
    /// here indicates the peer asked about something neither side ever
    /// extracted; that is logged and otherwise ignored rather than treated
    /// as a new error class, since `spec.md` §7 does not name it.
    pub fn encode_learn(&mut self, fingerprint: Fingerprint, out: &mut Vec<u8>) {
        let _enter = self.span.enter();
        self.ensure_hello(out);
        match self.cache.lookup(fingerprint) {
            Some(segment) => {
                debug!(fingerprint = format_args!("{fingerprint:#018x}"), "responding to ASK with LEARN");
                encode_learn(out, &segment);
            }
            None => {
                tracing::error!(fingerprint = format_args!("{fingerprint:#018x}"), "ASK for a fingerprint we never taught");
            }
        }
    }

    fn ensure_hello(&mut self, out: &mut Vec<u8>) {
        if !self.hello_sent {
            encode_hello(out);
            self.hello_sent = true;
        }
    }

    fn scan(&mut self, out: &mut Vec<u8>) {
        let mut cursor = 0;
        while self.pending.len() - cursor >= SEGMENT_LEN {
            let window = &self.pending[cursor..cursor + SEGMENT_LEN];
            let fingerprint = hash_segment(window);

            match self.cache.lookup(fingerprint) {
                Some(segment) if segment.matches(window) => {
                    self.emit_known_segment(out, fingerprint, segment);
                    cursor += SEGMENT_LEN;
                }
                Some(_) => {
                    self.emit_literal_byte(out, self.pending[cursor]);
                    cursor += 1;
                }
                None => {
                    let segment = Segment::from_window(window);
                    match self.cache.enter(fingerprint, segment.clone()) {
                        EnterOutcome::Inserted | EnterOutcome::AlreadyPresent => {
                            debug!(fingerprint = format_args!("{fingerprint:#018x}"), "EXTRACT new segment");
                            encode_extract(out, &segment);
                            self.window.declare(fingerprint, segment);
                            cursor += SEGMENT_LEN;
                        }
                        EnterOutcome::Collision => {
                            // Another writer won the race for this fingerprint
                            // with different bytes; demote to literal
                            // (`spec.md` §4.2/§7) rather than emit a REF that
                            // would resolve to the wrong segment on decode.
                            self.emit_literal_byte(out, self.pending[cursor]);
                            cursor += 1;
                        }
                    }
                }
            }
        }
        self.pending.drain(..cursor);
    }

    fn emit_known_segment(&mut self, out: &mut Vec<u8>, fingerprint: Fingerprint, segment: Segment) {
        if let Some(index) = self.window.index_of(fingerprint) {
            encode_backref(out, index);
        } else {
            encode_ref(out, fingerprint);
        }
        self.window.declare(fingerprint, segment);
    }

    fn emit_literal_byte(&self, out: &mut Vec<u8>, byte: u8) {
        if byte == MAGIC {
            encode_escape(out);
        } else {
            out.push(byte);
        }
    }
}
