//! Memory metadata captured in a crash snapshot

use serde::{Serialize, Deserialize};
use std::fmt;
use crate::constants::minidump::{memory_type, protection, state};

/// Liveness of a memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryState {
    /// Backed by storage
    Committed,
    /// Address space reserved but not backed
    Reserved,
    /// Not allocated
    Free,
    /// A value the format does not define
    Other(u32),
}

impl MemoryState {
    /// Decode the raw state word of a memory info record
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            state::COMMIT => MemoryState::Committed,
            state::RESERVE => MemoryState::Reserved,
            state::FREE => MemoryState::Free,
            other => MemoryState::Other(other),
        }
    }
}

/// Page protection bits of a memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protection(pub u32);

impl Protection {
    /// Protection of a region that cannot be touched at all
    pub fn is_no_access(self) -> bool {
        (self.0 & protection::ACCESS_MASK) == protection::NOACCESS
    }

    /// Any of the mutually exclusive executable variants
    pub fn is_executable(self) -> bool {
        (self.0 & protection::EXECUTABLE) != 0
    }

}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = match self.0 & protection::ACCESS_MASK {
            protection::NOACCESS => "---",
            protection::READONLY => "r--",
            protection::READWRITE => "rw-",
            protection::WRITECOPY => "rc-",
            protection::EXECUTE => "--x",
            protection::EXECUTE_READ => "r-x",
            protection::EXECUTE_READWRITE => "rwx",
            protection::EXECUTE_WRITECOPY => "rcx",
            _ => "???",
        };
        write!(f, "{}", access)?;
        if self.0 & protection::GUARD != 0 {
            write!(f, "+guard")?;
        }
        Ok(())
    }
}

/// Backing of a memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryType {
    /// Mapped from an executable image
    Image,
    /// Mapped from a file or section
    Mapped,
    /// Anonymous allocation
    Private,
    /// No type recorded (free memory) or an unknown value
    Other(u32),
}

impl MemoryType {
    /// Decode the raw type word of a memory info record
    pub fn from_raw(raw: u32) -> Self {
        if raw & memory_type::IMAGE != 0 {
            MemoryType::Image
        } else if raw & memory_type::MAPPED != 0 {
            MemoryType::Mapped
        } else if raw & memory_type::PRIVATE != 0 {
            MemoryType::Private
        } else {
            MemoryType::Other(raw)
        }
    }
}

/// Metadata for one region of the crashed process's address space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegionDescriptor {
    /// First address of the region
    pub base_address: u64,
    /// Size in bytes
    pub region_size: u64,
    /// Liveness state
    pub state: MemoryState,
    /// Protection of the pages
    pub protection: Protection,
    /// Backing type
    pub memory_type: MemoryType,
}

impl MemoryRegionDescriptor {
    /// Whether `address` falls inside the region
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base_address && address - self.base_address < self.region_size
    }

    /// Whether the region is backed by a mapped image rather than anonymous memory
    pub fn is_image_backed(&self) -> bool {
        self.memory_type == MemoryType::Image
    }
}

/// Bytes captured contiguously from the crashed process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRange {
    /// Address of the first byte
    pub base_address: u64,
    /// Captured contents
    pub bytes: Vec<u8>,
}

impl MemoryRange {
    /// Number of captured bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Whether `address` falls inside the captured bytes
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base_address && address - self.base_address < self.size()
    }
}

/// CPU family of the crashed thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X86,
    Amd64,
    Arm,
    Arm64,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Architecture::X86 => "x86",
            Architecture::Amd64 => "amd64",
            Architecture::Arm => "arm",
            Architecture::Arm64 => "arm64",
        };
        f.write_str(name)
    }
}
