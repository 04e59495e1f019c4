//! Synthetic minidump writer shared by the integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use tempfile::TempDir;

pub const JIT_BASE: u64 = 0x0b40_0000;
pub const JIT_SIZE: u64 = 0x10000;

pub const MEM_COMMIT: u32 = 0x1000;
pub const MEM_FREE: u32 = 0x10000;
pub const MEM_PRIVATE: u32 = 0x20000;
pub const MEM_IMAGE: u32 = 0x100_0000;
pub const PAGE_READWRITE: u32 = 0x04;
pub const PAGE_EXECUTE_READWRITE: u32 = 0x40;

#[derive(Debug, Clone, Copy)]
pub enum Context {
    X86 { eip: u32 },
    Amd64 { rip: u64 },
    Arm { pc: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct RegionInfo {
    pub base: u64,
    pub size: u64,
    pub state: u32,
    pub protect: u32,
    pub kind: u32,
}

impl RegionInfo {
    /// A committed, private, RWX region of the JIT's allocation size
    pub fn jit(base: u64) -> Self {
        Self {
            base,
            size: JIT_SIZE,
            state: MEM_COMMIT,
            protect: PAGE_EXECUTE_READWRITE,
            kind: MEM_PRIVATE,
        }
    }
}

pub struct MinidumpBuilder {
    context: Context,
    exception: bool,
    memory: Vec<(u64, Vec<u8>)>,
    memory_64: bool,
    memory_info: Option<Vec<RegionInfo>>,
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn patch_u32(out: &mut [u8], at: usize, value: u32) {
    out[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Processor architecture code recorded in the system info stream
fn processor_architecture(context: Context) -> u16 {
    match context {
        Context::X86 { .. } => 0,
        Context::Arm { .. } => 5,
        Context::Amd64 { .. } => 9,
    }
}

fn context_blob(context: Context) -> Vec<u8> {
    match context {
        Context::X86 { eip } => {
            let mut blob = vec![0u8; 716];
            patch_u32(&mut blob, 0, 0x0001_0007);
            patch_u32(&mut blob, 0xb8, eip);
            blob
        }
        Context::Amd64 { rip } => {
            let mut blob = vec![0u8; 1232];
            patch_u32(&mut blob, 0x30, 0x0010_000b);
            blob[0xf8..0x100].copy_from_slice(&rip.to_le_bytes());
            blob
        }
        Context::Arm { pc } => {
            let mut blob = vec![0u8; 368];
            patch_u32(&mut blob, 0, 0x4000_0002);
            patch_u32(&mut blob, 64, pc);
            blob
        }
    }
}

impl MinidumpBuilder {
    pub fn new(context: Context) -> Self {
        Self {
            context,
            exception: true,
            memory: Vec::new(),
            memory_64: false,
            memory_info: Some(Vec::new()),
        }
    }

    /// An x86 crash at `pc` inside one JIT region holding `code`
    pub fn x86_jit(code: Vec<u8>, pc: u64) -> Self {
        Self::new(Context::X86 { eip: pc as u32 })
            .memory(JIT_BASE, code)
            .region(RegionInfo::jit(JIT_BASE))
    }

    pub fn memory(mut self, base: u64, bytes: Vec<u8>) -> Self {
        self.memory.push((base, bytes));
        self
    }

    pub fn region(mut self, info: RegionInfo) -> Self {
        self.memory_info.get_or_insert_with(Vec::new).push(info);
        self
    }

    pub fn without_memory_info(mut self) -> Self {
        self.memory_info = None;
        self
    }

    pub fn without_exception(mut self) -> Self {
        self.exception = false;
        self
    }

    pub fn as_memory_64(mut self) -> Self {
        self.memory_64 = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut streams: Vec<(u32, u32, u32)> = Vec::new();
        let stream_count = 1 + self.exception as usize + 1 + self.memory_info.is_some() as usize;

        let mut out = Vec::new();
        put_u32(&mut out, 0x504d_444d);
        put_u32(&mut out, 0xa793);
        put_u32(&mut out, stream_count as u32);
        put_u32(&mut out, 32);
        put_u32(&mut out, 0);
        put_u32(&mut out, 0);
        put_u64(&mut out, 0);
        out.resize(32 + stream_count * 12, 0);

        // Empty service pack string, then the system info record
        let csd_version = out.len();
        put_u32(&mut out, 0);
        let rva = out.len();
        out.extend_from_slice(&processor_architecture(self.context).to_le_bytes());
        out.extend_from_slice(&[6, 0, 0, 0, 1, 1]); // level, revision, processor count, product type
        put_u32(&mut out, 10); // major version
        put_u32(&mut out, 0); // minor version
        put_u32(&mut out, 19045); // build
        put_u32(&mut out, 2); // Windows NT
        put_u32(&mut out, csd_version as u32);
        put_u32(&mut out, 0); // suite mask, reserved
        out.resize(rva + 56, 0); // cpu information
        streams.push((7, 56, rva as u32));

        if self.exception {
            let rva = out.len();
            put_u32(&mut out, 1); // thread id
            put_u32(&mut out, 0);
            put_u32(&mut out, 0xc000_0005); // access violation
            put_u32(&mut out, 0);
            put_u64(&mut out, 0);
            put_u64(&mut out, 0xdead_0000);
            out.resize(rva + 160, 0);
            let context = context_blob(self.context);
            put_u32(&mut out, context.len() as u32);
            put_u32(&mut out, (rva + 168) as u32);
            out.extend_from_slice(&context);
            streams.push((6, 168, rva as u32));
        }

        if self.memory_64 {
            let rva = out.len();
            let data_rva = rva + 16 + self.memory.len() * 16;
            put_u64(&mut out, self.memory.len() as u64);
            put_u64(&mut out, data_rva as u64);
            for (base, bytes) in &self.memory {
                put_u64(&mut out, *base);
                put_u64(&mut out, bytes.len() as u64);
            }
            for (_, bytes) in &self.memory {
                out.extend_from_slice(bytes);
            }
            streams.push((9, (data_rva - rva) as u32, rva as u32));
        } else {
            let rva = out.len();
            let size = 4 + self.memory.len() * 16;
            let mut data_rva = rva + size;
            put_u32(&mut out, self.memory.len() as u32);
            for (base, bytes) in &self.memory {
                put_u64(&mut out, *base);
                put_u32(&mut out, bytes.len() as u32);
                put_u32(&mut out, data_rva as u32);
                data_rva += bytes.len();
            }
            for (_, bytes) in &self.memory {
                out.extend_from_slice(bytes);
            }
            streams.push((5, size as u32, rva as u32));
        }

        if let Some(regions) = &self.memory_info {
            let rva = out.len();
            put_u32(&mut out, 16);
            put_u32(&mut out, 48);
            put_u64(&mut out, regions.len() as u64);
            for region in regions {
                put_u64(&mut out, region.base);
                put_u64(&mut out, region.base); // allocation base
                put_u32(&mut out, region.protect); // allocation protection
                put_u32(&mut out, 0);
                put_u64(&mut out, region.size);
                put_u32(&mut out, region.state);
                put_u32(&mut out, region.protect);
                put_u32(&mut out, region.kind);
                put_u32(&mut out, 0);
            }
            streams.push((16, (16 + regions.len() * 48) as u32, rva as u32));
        }

        for (i, (stream_type, size, rva)) in streams.into_iter().enumerate() {
            let entry = 32 + i * 12;
            patch_u32(&mut out, entry, stream_type);
            patch_u32(&mut out, entry + 4, size);
            patch_u32(&mut out, entry + 8, rva);
        }
        out
    }

    /// Write the minidump into a fresh temporary directory
    pub fn write(&self) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crash.dmp");
        std::fs::write(&path, self.build()).unwrap();
        (dir, path)
    }
}

/// `count` one-byte nops
pub fn nops(count: usize) -> Vec<u8> {
    vec![0x90; count]
}
