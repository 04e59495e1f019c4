//! Decoded machine instructions

use serde::{Serialize, Deserialize};

/// Coarse operation class of an instruction, independent of the exact encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Add,
    Sub,
    Mul,
    Div,
    Cmp,
    Test,
    Mov,
    Xchg,
    Lea,
    Push,
    Pop,
    /// Push or pop of the whole register file
    PushRegs,
    And,
    Or,
    Xor,
    Not,
    Neg,
    Shift,
    RotateLeft,
    RotateRight,
    Inc,
    Dec,
    Jmp,
    ConditionalJump,
    Call,
    Return,
    /// cli/sti
    InterruptFlag,
    StringCompare,
    StringLoad,
    StringStore,
    ToggleCarry,
    SetCarry,
    ClearCarry,
    PortIn,
    PortOut,
    Translate,
    OverflowTrap,
    BcdAdjust,
    Interrupt,
    Halt,
    Nop,
    Other,
}

/// One operand with its addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Register,
    Immediate,
    /// Effective-address expression; `absolute` when no base or index register is used
    Memory { displacement: i64, absolute: bool },
    /// Relative branch with its resolved target
    NearBranch { target: u64 },
    /// Segment:offset pointer encoded in the instruction
    FarBranch,
}

impl Operand {
    /// Displacement of a memory operand
    pub fn displacement(&self) -> Option<i64> {
        match self {
            Operand::Memory { displacement, .. } => Some(*displacement),
            _ => None,
        }
    }
}

/// An instruction produced by a decoder and consumed by one classification step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Address the instruction was decoded at
    pub address: u64,
    /// Raw bytes; their count is the instruction length
    pub bytes: Vec<u8>,
    /// Coarse operation class
    pub kind: OperationKind,
    /// Lowercase mnemonic of the exact encoded variant (e.g. "adc", "retf")
    pub mnemonic: String,
    /// Formatted instruction, for tracing
    pub text: String,
    /// Explicit operands in encoding order
    pub operands: Vec<Operand>,
    /// Set when the decoder judged the branch target unresolvable or suspicious
    pub bad_branch_target: bool,
}

impl DecodedInstruction {
    /// Create an instruction with no operands
    pub fn new(address: u64, bytes: Vec<u8>, kind: OperationKind, mnemonic: &str) -> Self {
        Self {
            address,
            bytes,
            kind,
            mnemonic: mnemonic.to_string(),
            text: mnemonic.to_string(),
            operands: Vec::new(),
            bad_branch_target: false,
        }
    }

    /// Add an operand
    pub fn with_operand(mut self, operand: Operand) -> Self {
        self.operands.push(operand);
        self
    }

    /// Mark the branch target as suspicious
    pub fn with_bad_branch_target(mut self) -> Self {
        self.bad_branch_target = true;
        self
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the instruction has no bytes (never true for decoder output)
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The two-byte instruction a block of zeroed memory decodes to
    pub fn is_zero_fill(&self) -> bool {
        self.bytes.len() == 2 && self.bytes.iter().all(|&b| b == 0)
    }
}
