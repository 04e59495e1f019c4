//! Repeated scanning with resynchronization and severity folding

use log::{debug, trace};

use super::classifier::Classifier;
use super::scanner::scan;
use crate::constants::tuning::defaults;
use crate::decoder::InstructionDecoder;
use crate::models::CrashCategory;

/// Default for [`Driver::with_resync_threshold`]
pub const DEFAULT_RESYNC_THRESHOLD: u32 = defaults::RESYNC_THRESHOLD;

/// Progress of one analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanState {
    /// Bytes consumed from the region start
    pub offset: u64,
    /// Most severe category seen so far
    pub best: CrashCategory,
    /// Whether the instruction at the program counter was reached and classified
    pub pc_reached: bool,
    /// Number of scan passes run
    pub scans: usize,
}

impl ScanState {
    fn new() -> Self {
        Self {
            offset: 0,
            best: CrashCategory::Unknown,
            pc_reached: false,
            scans: 0,
        }
    }

    /// Only ever raises `best`
    fn fold(&mut self, category: CrashCategory) {
        if category > self.best {
            self.best = category;
        }
    }
}

/// Runs scan passes over a region until the program counter has been covered
pub struct Driver<'a, D: ?Sized> {
    decoder: &'a D,
    classifier: &'a Classifier,
    resync_threshold: u64,
}

impl<'a, D: InstructionDecoder + ?Sized> Driver<'a, D> {
    /// Create a driver with the default resync threshold
    pub fn new(decoder: &'a D, classifier: &'a Classifier) -> Self {
        Self {
            decoder,
            classifier,
            resync_threshold: DEFAULT_RESYNC_THRESHOLD as u64,
        }
    }

    /// Override the resync threshold
    pub fn with_resync_threshold(mut self, threshold: u32) -> Self {
        self.resync_threshold = threshold as u64;
        self
    }

    /// Categorize a region starting at `region_base` whose faulting PC is `pc`
    pub fn analyze(&self, region_bytes: &[u8], region_size: u64, region_base: u64, pc: u64) -> CrashCategory {
        self.run(region_bytes, region_size, region_base, pc).best
    }

    /// Like [`Driver::analyze`] but returns the final scan state
    pub fn run(&self, region_bytes: &[u8], region_size: u64, region_base: u64, pc: u64) -> ScanState {
        let region_size = region_size.min(region_bytes.len() as u64);
        let mut state = ScanState::new();

        while state.offset <= region_size {
            let start = state.offset as usize;
            let limit = (region_size - state.offset) as usize;
            let outcome = scan(
                self.decoder,
                self.classifier,
                &region_bytes[start..],
                limit,
                region_base + state.offset,
                pc,
            );
            state.scans += 1;
            state.pc_reached |= outcome.pc_reached;

            let seen_pc = region_base + state.offset + outcome.bytes_consumed > pc;

            // Too little decoded to trust; inch along
            if outcome.bytes_consumed < self.resync_threshold && !seen_pc {
                trace!("Resyncing at offset {:#x}", state.offset);
                state.offset += 1;
                continue;
            }

            state.fold(outcome.category);
            debug!(
                "Pass at {:#x}: {} over {} bytes, best {}",
                state.offset, outcome.category, outcome.bytes_consumed, state.best
            );

            if seen_pc || state.best == CrashCategory::MAX {
                break;
            }

            state.offset += outcome.bytes_consumed.max(1);
        }

        state
    }
}
