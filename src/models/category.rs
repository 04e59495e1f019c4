//! Crash category labels

use serde::{Serialize, Deserialize};
use std::fmt;

/// Category derived from scanning the code around the program counter.
///
/// Variants are declared in ascending severity, so the derived `Ord` is the
/// severity order the driver folds with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrashCategory {
    /// Nothing anomalous was found
    Unknown,
    /// Bytes that a code generator would never emit
    CorruptCode,
    /// The program counter lands inside an instruction
    PcBetweenInstructions,
    /// The instruction at the program counter branches somewhere bogus
    BadBranchTarget,
    /// The instruction at the program counter is itself corrupt
    BadPcInstruction,
}

impl CrashCategory {
    /// The most severe category; reaching it ends the analysis.
    pub const MAX: CrashCategory = CrashCategory::BadPcInstruction;

    /// Numeric severity rank
    pub fn severity(self) -> u8 {
        self as u8
    }

    /// Symbolic name as printed on the command line
    pub fn name(self) -> &'static str {
        match self {
            CrashCategory::Unknown => "UNKNOWN",
            CrashCategory::CorruptCode => "CORRUPT_CODE",
            CrashCategory::PcBetweenInstructions => "PC_BETWEEN_INSTRUCTIONS",
            CrashCategory::BadBranchTarget => "BAD_BRANCH_TARGET",
            CrashCategory::BadPcInstruction => "BAD_PC_INSTRUCTION",
        }
    }
}

impl Default for CrashCategory {
    fn default() -> Self {
        CrashCategory::Unknown
    }
}

impl fmt::Display for CrashCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Terminal label produced by the gate, before any decoding happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateVerdict {
    /// The snapshot carries no memory info list
    MemoryInfoUnavailable,
    /// The program counter is in free, unknown or no-access memory
    PcInInaccessibleMemory,
    /// The program counter is in memory without execute permission
    PcNotExecutable,
    /// The region is image-backed or not shaped like a JIT pool
    NotJitCode,
    /// No captured bytes cover the program counter
    NoJitMemoryFound,
    /// JIT memory was found but its architecture is not analysed
    UnsupportedArchitecture,
}

impl GateVerdict {
    /// Symbolic name as printed on the command line
    pub fn name(self) -> &'static str {
        match self {
            GateVerdict::MemoryInfoUnavailable => "MEMORY_INFO_UNAVAILABLE",
            GateVerdict::PcInInaccessibleMemory => "PC_IN_INACCESSIBLE_MEMORY",
            GateVerdict::PcNotExecutable => "PC_NOT_EXECUTABLE",
            GateVerdict::NotJitCode => "NOT_JIT_CODE",
            GateVerdict::NoJitMemoryFound => "NO_JIT_MEMORY_FOUND",
            GateVerdict::UnsupportedArchitecture => "UNSUPPORTED_ARCHITECTURE",
        }
    }
}

impl fmt::Display for GateVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The single label emitted for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Categorization {
    /// Rejected by the gate
    Gate(GateVerdict),
    /// Admitted and scanned
    Scan(CrashCategory),
}

impl Categorization {
    /// Symbolic name as printed on the command line
    pub fn name(self) -> &'static str {
        match self {
            Categorization::Gate(verdict) => verdict.name(),
            Categorization::Scan(category) => category.name(),
        }
    }
}

impl From<GateVerdict> for Categorization {
    fn from(verdict: GateVerdict) -> Self {
        Categorization::Gate(verdict)
    }
}

impl From<CrashCategory> for Categorization {
    fn from(category: CrashCategory) -> Self {
        Categorization::Scan(category)
    }
}

impl fmt::Display for Categorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
