//! Values carried by the records of a minidump memory info list

/// Memory state of a region
pub mod state {
    pub const COMMIT: u32 = 0x1000;
    pub const RESERVE: u32 = 0x2000;
    pub const FREE: u32 = 0x10000;
}

/// Memory protection bits of a region
pub mod protection {
    pub const NOACCESS: u32 = 0x01;
    pub const READONLY: u32 = 0x02;
    pub const READWRITE: u32 = 0x04;
    pub const WRITECOPY: u32 = 0x08;
    pub const EXECUTE: u32 = 0x10;
    pub const EXECUTE_READ: u32 = 0x20;
    pub const EXECUTE_READWRITE: u32 = 0x40;
    pub const EXECUTE_WRITECOPY: u32 = 0x80;
    pub const GUARD: u32 = 0x100;

    /// Bits that describe access; the rest are modifiers
    pub const ACCESS_MASK: u32 = 0xff;

    /// Executable variants are mutually exclusive, so all of them must be checked
    pub const EXECUTABLE: u32 = EXECUTE | EXECUTE_READ | EXECUTE_READWRITE | EXECUTE_WRITECOPY;
}

/// Backing of a region
pub mod memory_type {
    pub const PRIVATE: u32 = 0x20000;
    pub const MAPPED: u32 = 0x40000;
    pub const IMAGE: u32 = 0x100_0000;
}
