//! The on-wire token format: the byte `MAGIC` that opens every control
//! token, the seven opcodes, and pure encode/parse functions for them
//! (`spec.md` §6).
//!
//! This is deliberately not a trait hierarchy — per `spec.md` §9's
//! "polymorphic codec plumbing" note, a closed enum plus free functions is
//! enough; the encoder and decoder are the only two things that need to
//! speak this format.

use crate::error::XcodecError;
use crate::hash::Fingerprint;
use crate::segment::{Segment, SEGMENT_LEN};

/// Marks the start of every control token. Escaped when it appears as a
/// literal data byte.
pub const MAGIC: u8 = 0xf1;

/// The seven on-wire opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    Hello = 0x00,
    Learn = 0x01,
    Ask = 0x02,
    Extract = 0x03,
    Ref = 0x04,
    Backref = 0x05,
    Escape = 0x06,
}

impl TryFrom<u8> for Op {
    type Error = XcodecError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(Op::Hello),
            0x01 => Ok(Op::Learn),
            0x02 => Ok(Op::Ask),
            0x03 => Ok(Op::Extract),
            0x04 => Ok(Op::Ref),
            0x05 => Ok(Op::Backref),
            0x06 => Ok(Op::Escape),
            other => Err(XcodecError::UnknownOpcode(other)),
        }
    }
}

/// A fully parsed control token (the `HELLO` option length has already been
/// validated to be zero; `spec.md` only defines that one option layout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Hello,
    Escape,
    Extract(Segment),
    Ref(Fingerprint),
    Backref(u8),
    Learn(Segment),
    Ask(Fingerprint),
}

impl Token {
    #[must_use]
    pub fn op(&self) -> Op {
        match self {
            Token::Hello => Op::Hello,
            Token::Escape => Op::Escape,
            Token::Extract(_) => Op::Extract,
            Token::Ref(_) => Op::Ref,
            Token::Backref(_) => Op::Backref,
            Token::Learn(_) => Op::Learn,
            Token::Ask(_) => Op::Ask,
        }
    }
}

/// Result of attempting to parse one token starting at a `MAGIC` byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A full token was parsed; it consumed `consumed` bytes starting at the
    /// `MAGIC` byte (i.e. including it).
    Complete { token: Token, consumed: usize },
    /// Not enough bytes are buffered yet to finish this token. Not an error:
    /// the caller should stop and wait for more input.
    NeedMoreInput,
}

/// Parses one token from `buf`, which must start with [`MAGIC`].
///
/// # Panics
///
/// Panics if `buf` is empty or `buf[0] != MAGIC` — callers are expected to
/// have already located the `MAGIC` byte (`spec.md` §4.5 step 2).
pub fn parse_token(buf: &[u8]) -> Result<ParseOutcome, XcodecError> {
    assert!(!buf.is_empty() && buf[0] == MAGIC, "parse_token requires a MAGIC-prefixed slice");

    if buf.len() < 2 {
        return Ok(ParseOutcome::NeedMoreInput);
    }
    let op = Op::try_from(buf[1])?;

    match op {
        Op::Hello => {
            if buf.len() < 3 {
                return Ok(ParseOutcome::NeedMoreInput);
            }
            let len = buf[2] as usize;
            if buf.len() < 3 + len {
                return Ok(ParseOutcome::NeedMoreInput);
            }
            if len != 0 {
                return Err(XcodecError::UnsupportedHelloLength(buf[2]));
            }
            Ok(ParseOutcome::Complete { token: Token::Hello, consumed: 3 })
        }
        Op::Escape => Ok(ParseOutcome::Complete { token: Token::Escape, consumed: 2 }),
        Op::Extract | Op::Learn => {
            let total = 2 + SEGMENT_LEN;
            if buf.len() < total {
                return Ok(ParseOutcome::NeedMoreInput);
            }
            let segment = Segment::from_window(&buf[2..total]);
            let token = if op == Op::Extract { Token::Extract(segment) } else { Token::Learn(segment) };
            Ok(ParseOutcome::Complete { token, consumed: total })
        }
        Op::Ref | Op::Ask => {
            let total = 2 + 8;
            if buf.len() < total {
                return Ok(ParseOutcome::NeedMoreInput);
            }
            let fingerprint = u64::from_be_bytes(buf[2..total].try_into().unwrap());
            let token = if op == Op::Ref { Token::Ref(fingerprint) } else { Token::Ask(fingerprint) };
            Ok(ParseOutcome::Complete { token, consumed: total })
        }
        Op::Backref => {
            if buf.len() < 3 {
                return Ok(ParseOutcome::NeedMoreInput);
            }
            Ok(ParseOutcome::Complete { token: Token::Backref(buf[2]), consumed: 3 })
        }
    }
}

pub fn encode_hello(out: &mut Vec<u8>) {
    out.push(MAGIC);
    out.push(Op::Hello as u8);
    out.push(0); // option length, currently always 0
}

pub fn encode_escape(out: &mut Vec<u8>) {
    out.push(MAGIC);
    out.push(Op::Escape as u8);
}

pub fn encode_extract(out: &mut Vec<u8>, segment: &Segment) {
    out.push(MAGIC);
    out.push(Op::Extract as u8);
    out.extend_from_slice(segment.as_bytes());
}

pub fn encode_ref(out: &mut Vec<u8>, fingerprint: Fingerprint) {
    out.push(MAGIC);
    out.push(Op::Ref as u8);
    out.extend_from_slice(&fingerprint.to_be_bytes());
}

pub fn encode_backref(out: &mut Vec<u8>, index: u8) {
    out.push(MAGIC);
    out.push(Op::Backref as u8);
    out.push(index);
}

pub fn encode_learn(out: &mut Vec<u8>, segment: &Segment) {
    out.push(MAGIC);
    out.push(Op::Learn as u8);
    out.extend_from_slice(segment.as_bytes());
}

pub fn encode_ask(out: &mut Vec<u8>, fingerprint: Fingerprint) {
    out.push(MAGIC);
    out.push(Op::Ask as u8);
    out.extend_from_slice(&fingerprint.to_be_bytes());
}
