//! Per-instruction sensibility checks

use log::trace;

use crate::config::ClassifierProfile;
use crate::models::{CrashCategory, DecodedInstruction, OperationKind};

/// Judges whether a single decoded instruction is something the JIT would emit
#[derive(Debug, Clone)]
pub struct Classifier {
    profile: ClassifierProfile,
}

impl Classifier {
    /// Create a classifier for a tuning profile
    pub fn new(profile: ClassifierProfile) -> Self {
        Self { profile }
    }

    /// Returns `CorruptCode` for an instruction the code generator never
    /// produces and `Unknown` otherwise. Promotion to `BadPcInstruction` for the
    /// instruction under the program counter is left to the caller.
    pub fn classify(&self, instr: &DecodedInstruction, is_program_counter_instruction: bool) -> CrashCategory {
        let verdict = self.check(instr);
        if verdict != CrashCategory::Unknown {
            trace!(
                "{}{:#x}: {} looks corrupt",
                if is_program_counter_instruction { "> " } else { "" },
                instr.address,
                instr.text
            );
        }
        verdict
    }

    fn check(&self, instr: &DecodedInstruction) -> CrashCategory {
        // Executing zeroed memory
        if instr.is_zero_fill() {
            return CrashCategory::CorruptCode;
        }

        if self.profile.blacklist.contains(&instr.kind) {
            return CrashCategory::CorruptCode;
        }

        if self
            .profile
            .variant_rules
            .iter()
            .any(|rule| rule.matches(instr.kind, &instr.mnemonic))
        {
            return CrashCategory::CorruptCode;
        }

        if matches!(instr.kind, OperationKind::Cmp | OperationKind::Mov) && self.has_wild_displacement(instr) {
            return CrashCategory::CorruptCode;
        }

        CrashCategory::Unknown
    }

    /// Only the first two operands are inspected
    fn has_wild_displacement(&self, instr: &DecodedInstruction) -> bool {
        instr
            .operands
            .iter()
            .take(2)
            .filter_map(|op| op.displacement())
            .any(|disp| disp.unsigned_abs() >= self.profile.displacement_threshold)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ClassifierProfile::default())
    }
}
