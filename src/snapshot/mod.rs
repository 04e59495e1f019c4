//! Minidump snapshot loading
//!
//! Provides the memory descriptors, captured memory and faulting context the
//! analysis needs. Only the streams the categorizer consumes are read.

use std::fs;
use std::path::Path;
use log::{debug, info};
use minidump::{
    Minidump, MinidumpException, MinidumpMemory64List, MinidumpMemoryInfoList, MinidumpMemoryList,
    MinidumpRawContext, MinidumpSystemInfo,
};

use crate::analyzer::MemoryDescriptorProvider;
use crate::errors::{CategorizerError, CategorizerResult, ErrorContext, ErrorExt};
use crate::models::{Architecture, MemoryRange, MemoryRegionDescriptor, MemoryState, MemoryType, Protection};

/// Exception information from the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// Thread that faulted
    pub thread_id: u32,
    /// OS exception code
    pub code: u32,
    /// Address the exception was raised for
    pub address: u64,
}

/// Parsed crash snapshot
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Exception record of the faulting thread
    pub exception: ExceptionInfo,
    /// CPU family of the faulting thread
    pub architecture: Architecture,
    /// Program counter at the time of the fault
    pub instruction_pointer: u64,
    /// Region metadata; absent on dumps written without a memory info list
    pub memory_info: Option<Vec<MemoryRegionDescriptor>>,
    /// Captured memory
    pub memory: Vec<MemoryRange>,
}

impl Snapshot {
    /// Read and parse a minidump file
    pub fn from_file(path: &Path) -> CategorizerResult<Self> {
        let data = fs::read(path).with_context(ErrorContext {
            path: Some(path.display().to_string()),
            component: "snapshot".to_string(),
            operation: "read".to_string(),
        })?;
        info!("Read {} bytes from {}", data.len(), path.display());
        Self::parse(&data)
    }

    /// Parse a minidump held in memory
    pub fn parse(data: &[u8]) -> CategorizerResult<Self> {
        let dump = Minidump::read(data).with_simple_context("snapshot", "read header")?;

        let exception = required(dump.get_stream::<MinidumpException>(), "exception")?;
        let system_info = required(dump.get_stream::<MinidumpSystemInfo>(), "system info")?;

        let context = exception
            .context(&system_info, None)
            .ok_or_else(|| {
                CategorizerError::UnsupportedContext(format!("unreadable context on {:?}", system_info.cpu))
            })?;
        let architecture = match &context.raw {
            MinidumpRawContext::X86(_) => Architecture::X86,
            MinidumpRawContext::Amd64(_) => Architecture::Amd64,
            MinidumpRawContext::Arm(_) => Architecture::Arm,
            MinidumpRawContext::Arm64(_) => Architecture::Arm64,
            _ => {
                return Err(CategorizerError::UnsupportedContext(format!(
                    "{:?} thread context",
                    system_info.cpu
                )))
            }
        };
        let instruction_pointer = context.get_instruction_pointer();
        debug!("Faulting context: {} at {:#x}", architecture, instruction_pointer);

        let record = &exception.raw.exception_record;
        let exception = ExceptionInfo {
            thread_id: exception.raw.thread_id,
            code: record.exception_code,
            address: record.exception_address,
        };

        let memory_list = optional(dump.get_stream::<MinidumpMemoryList>(), "memory list")?;
        let memory_64_list = optional(dump.get_stream::<MinidumpMemory64List>(), "64-bit memory list")?;
        if memory_list.is_none() && memory_64_list.is_none() {
            return Err(CategorizerError::MissingStream("memory list"));
        }

        let mut memory = Vec::new();
        if let Some(list) = &memory_list {
            memory.extend(list.iter().map(|m| MemoryRange {
                base_address: m.base_address,
                bytes: m.bytes.to_vec(),
            }));
        }
        if let Some(list) = &memory_64_list {
            memory.extend(list.iter().map(|m| MemoryRange {
                base_address: m.base_address,
                bytes: m.bytes.to_vec(),
            }));
        }

        let memory_info = optional(dump.get_stream::<MinidumpMemoryInfoList>(), "memory info list")?.map(|list| {
            list.iter()
                .map(|region| MemoryRegionDescriptor {
                    base_address: region.raw.base_address,
                    region_size: region.raw.region_size,
                    state: MemoryState::from_raw(region.raw.state),
                    protection: Protection(region.raw.protection),
                    memory_type: MemoryType::from_raw(region.raw._type),
                })
                .collect::<Vec<_>>()
        });
        if memory_info.is_none() {
            debug!("Minidump has no memory info list");
        }

        Ok(Self {
            exception,
            architecture,
            instruction_pointer,
            memory_info,
            memory,
        })
    }

    /// Faulting program counter
    pub fn instruction_pointer(&self) -> u64 {
        self.instruction_pointer
    }

    /// CPU family of the faulting thread
    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// Region metadata covering `address`
    pub fn descriptor_for_address(&self, address: u64) -> Option<&MemoryRegionDescriptor> {
        self.memory_info
            .as_ref()?
            .iter()
            .find(|region| region.contains(address))
    }

    /// Captured bytes covering `address`
    pub fn range_for_address(&self, address: u64) -> Option<&MemoryRange> {
        self.memory.iter().find(|range| range.contains(address))
    }
}

/// A stream the analysis cannot do without
fn required<S>(stream: Result<S, minidump::Error>, name: &'static str) -> CategorizerResult<S> {
    optional(stream, name)?.ok_or(CategorizerError::MissingStream(name))
}

/// A stream whose absence is not an error; a damaged one still is
fn optional<S>(stream: Result<S, minidump::Error>, name: &'static str) -> CategorizerResult<Option<S>> {
    match stream {
        Ok(stream) => Ok(Some(stream)),
        Err(minidump::Error::StreamNotFound) => Ok(None),
        Err(e) => Err(CategorizerError::Snapshot(format!("{} stream: {}", name, e))),
    }
}

impl MemoryDescriptorProvider for Snapshot {
    fn has_memory_info(&self) -> bool {
        self.memory_info.is_some()
    }

    fn descriptor_for_address(&self, address: u64) -> Option<&MemoryRegionDescriptor> {
        Snapshot::descriptor_for_address(self, address)
    }

    fn range_for_address(&self, address: u64) -> Option<&MemoryRange> {
        Snapshot::range_for_address(self, address)
    }
}
