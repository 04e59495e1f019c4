//! Data models for crash categorization

pub mod category;
pub mod instruction;
pub mod memory;

pub use self::category::{Categorization, CrashCategory, GateVerdict};
pub use self::instruction::{DecodedInstruction, OperationKind, Operand};
pub use self::memory::{Architecture, MemoryRange, MemoryRegionDescriptor, MemoryState, MemoryType, Protection};
