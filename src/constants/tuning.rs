/// Default tuning for the x86 JIT profile
pub mod defaults {
    /// Allocation granularity of the JIT's executable pools
    pub const JIT_REGION_SIZE: u64 = 0x10000;

    /// A scan pass shorter than this, ending before the PC, is treated as
    /// garbage and the driver steps forward a single byte
    pub const RESYNC_THRESHOLD: u32 = 6;

    /// Memory displacements this large never show up in generated code
    pub const DISPLACEMENT_THRESHOLD: u64 = 0x1000_0000;

    /// Decoder mode for the supported architecture
    pub const BITNESS: u32 = 32;
}
