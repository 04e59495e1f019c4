//! Instruction decoding
//!
//! The scanner only talks to [`InstructionDecoder`], so another instruction set
//! can be analysed by plugging in a different decoder with its own
//! [`ClassifierProfile`](crate::config::ClassifierProfile).

mod x86;

pub use self::x86::X86Decoder;

use std::fmt;
use crate::models::DecodedInstruction;

/// Why no instruction could be decoded at an offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    /// The input ends before a complete instruction
    Exhausted,
    /// The bytes do not encode a valid instruction
    Invalid,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeFailure::Exhausted => f.write_str("input exhausted"),
            DecodeFailure::Invalid => f.write_str("invalid encoding"),
        }
    }
}

/// Decodes one instruction at a time out of a byte buffer
pub trait InstructionDecoder {
    /// Decode the instruction starting at `bytes[offset]`, which lives at
    /// `address` in the crashed process. Never reads past the end of `bytes`.
    fn decode_next(&self, bytes: &[u8], offset: usize, address: u64) -> Result<DecodedInstruction, DecodeFailure>;
}

impl<D: InstructionDecoder + ?Sized> InstructionDecoder for &D {
    fn decode_next(&self, bytes: &[u8], offset: usize, address: u64) -> Result<DecodedInstruction, DecodeFailure> {
        (**self).decode_next(bytes, offset, address)
    }
}

impl<D: InstructionDecoder + ?Sized> InstructionDecoder for Box<D> {
    fn decode_next(&self, bytes: &[u8], offset: usize, address: u64) -> Result<DecodedInstruction, DecodeFailure> {
        (**self).decode_next(bytes, offset, address)
    }
}
