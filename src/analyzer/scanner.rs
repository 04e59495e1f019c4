//! Linear sweep over one stretch of a code region

use log::trace;

use super::classifier::Classifier;
use crate::decoder::{DecodeFailure, InstructionDecoder};
use crate::models::CrashCategory;

/// Result of one scan pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Most specific anomaly of this pass
    pub category: CrashCategory,
    /// Bytes consumed from the start of the pass, inclusive of the instruction
    /// that ended it
    pub bytes_consumed: u64,
    /// Whether an instruction started exactly at the program counter
    pub pc_reached: bool,
}

impl ScanOutcome {
    fn new(category: CrashCategory, bytes_consumed: usize, pc_reached: bool) -> Self {
        Self {
            category,
            bytes_consumed: bytes_consumed as u64,
            pc_reached,
        }
    }
}

/// Decode `bytes[..limit]`, which starts at `region_start`, one instruction
/// after another and stop at the first anomaly.
pub fn scan<D: InstructionDecoder + ?Sized>(
    decoder: &D,
    classifier: &Classifier,
    bytes: &[u8],
    limit: usize,
    region_start: u64,
    pc: u64,
) -> ScanOutcome {
    let window = &bytes[..limit.min(bytes.len())];
    let mut consumed = 0usize;
    let mut pc_reached = false;

    while consumed <= limit {
        let address = region_start + consumed as u64;
        let is_pc = address == pc;

        let instr = match decoder.decode_next(window, consumed, address) {
            Ok(instr) if !instr.is_empty() => instr,
            Err(DecodeFailure::Invalid) if address > pc => {
                trace!("{:#x}: undecodable past the PC", address);
                return ScanOutcome::new(CrashCategory::Unknown, consumed, pc_reached);
            }
            Err(failure) => {
                trace!("{:#x}: {}", address, failure);
                break;
            }
            Ok(_) => break,
        };
        consumed += instr.len();

        if is_pc {
            pc_reached = true;
            if instr.bad_branch_target {
                trace!("> {:#x}: {} has a bad branch target", address, instr.text);
                return ScanOutcome::new(CrashCategory::BadBranchTarget, consumed, pc_reached);
            }
        }

        match classifier.classify(&instr, is_pc) {
            CrashCategory::Unknown => {}
            CrashCategory::CorruptCode if is_pc => {
                return ScanOutcome::new(CrashCategory::BadPcInstruction, consumed, pc_reached)
            }
            verdict => return ScanOutcome::new(verdict, consumed, pc_reached),
        }
    }

    if consumed == 0 {
        return ScanOutcome::new(CrashCategory::CorruptCode, 0, false);
    }

    let end = region_start + consumed as u64;
    if !pc_reached && pc >= region_start && pc <= end {
        return ScanOutcome::new(CrashCategory::PcBetweenInstructions, consumed, false);
    }

    ScanOutcome::new(CrashCategory::Unknown, consumed, pc_reached)
}
