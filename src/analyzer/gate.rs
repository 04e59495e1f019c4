//! Metadata-only pre-filters
//!
//! Every check here runs before a single byte is decoded. A failing check ends
//! the analysis with its [`GateVerdict`].

use log::debug;

use crate::config::CategorizerConfig;
use crate::models::{Architecture, GateVerdict, MemoryRange, MemoryRegionDescriptor, MemoryState};

/// Source of region metadata and captured memory
pub trait MemoryDescriptorProvider {
    /// Whether region metadata was recorded at all
    fn has_memory_info(&self) -> bool;

    /// Region metadata covering `address`
    fn descriptor_for_address(&self, address: u64) -> Option<&MemoryRegionDescriptor>;

    /// Captured bytes covering `address`
    fn range_for_address(&self, address: u64) -> Option<&MemoryRange>;
}

/// A region that passed every check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmittedRegion<'a> {
    /// Address of the first captured byte
    pub base_address: u64,
    /// Captured bytes
    pub bytes: &'a [u8],
    /// Faulting program counter, inside `bytes`
    pub pc: u64,
}

impl AdmittedRegion<'_> {
    /// Number of captured bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Run the checks in order; the first failure wins.
pub fn check<'a, P: MemoryDescriptorProvider + ?Sized>(
    provider: &'a P,
    pc: u64,
    architecture: Architecture,
    config: &CategorizerConfig,
) -> Result<AdmittedRegion<'a>, GateVerdict> {
    if !provider.has_memory_info() {
        return Err(GateVerdict::MemoryInfoUnavailable);
    }

    let info = provider
        .descriptor_for_address(pc)
        .ok_or(GateVerdict::PcInInaccessibleMemory)?;
    debug!(
        "PC {:#x} in region {:#x}+{:#x} {:?} {} {:?}",
        pc, info.base_address, info.region_size, info.state, info.protection, info.memory_type
    );

    if info.state == MemoryState::Free || info.protection.is_no_access() {
        return Err(GateVerdict::PcInInaccessibleMemory);
    }

    if !info.protection.is_executable() {
        return Err(GateVerdict::PcNotExecutable);
    }

    if info.region_size != config.jit_region_size || info.is_image_backed() {
        return Err(GateVerdict::NotJitCode);
    }

    let range = provider.range_for_address(pc).ok_or(GateVerdict::NoJitMemoryFound)?;

    if architecture != config.supported_architecture {
        return Err(GateVerdict::UnsupportedArchitecture);
    }

    Ok(AdmittedRegion {
        base_address: range.base_address,
        bytes: &range.bytes,
        pc,
    })
}
