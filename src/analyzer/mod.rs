//! Core analysis engine: gate, scanner, classifier and driver

mod classifier;
mod driver;
mod gate;
mod scanner;

pub use self::classifier::Classifier;
pub use self::driver::{Driver, ScanState, DEFAULT_RESYNC_THRESHOLD};
pub use self::gate::{check as check_gate, AdmittedRegion, MemoryDescriptorProvider};
pub use self::scanner::{scan, ScanOutcome};

use log::{debug, info, log_enabled, Level};

use crate::config::CategorizerConfig;
use crate::decoder::{InstructionDecoder, X86Decoder};
use crate::errors::CategorizerResult;
use crate::models::{Architecture, Categorization, CrashCategory};
use crate::snapshot::Snapshot;
use crate::utils::hexdump::hex_dump;

/// Main analyzer that coordinates categorization of one snapshot
pub struct Analyzer<D = X86Decoder> {
    config: CategorizerConfig,
    classifier: Classifier,
    decoder: D,
}

impl Analyzer<X86Decoder> {
    /// Create an analyzer with the x86 decoder described by `config`
    pub fn new(config: CategorizerConfig) -> CategorizerResult<Self> {
        config.validate()?;
        let decoder = X86Decoder::from_profile(&config.classifier)?;
        Ok(Self::with_decoder(config, decoder))
    }
}

impl<D: InstructionDecoder> Analyzer<D> {
    /// Create an analyzer around any decoder
    pub fn with_decoder(config: CategorizerConfig, decoder: D) -> Self {
        let classifier = Classifier::new(config.classifier.clone());
        Self {
            config,
            classifier,
            decoder,
        }
    }

    /// Categorize a parsed snapshot. `pc_override` replaces the program counter
    /// taken from the exception context.
    pub fn categorize_snapshot(&self, snapshot: &Snapshot, pc_override: Option<u64>) -> Categorization {
        let pc = pc_override.unwrap_or(snapshot.instruction_pointer());
        info!(
            "Categorizing {} crash at {:#x} (exception {:#010x})",
            snapshot.architecture(), pc, snapshot.exception.code
        );
        self.categorize(snapshot, pc, snapshot.architecture())
    }

    /// Run the gate and, if the region is admitted, the scan driver
    pub fn categorize<P: MemoryDescriptorProvider + ?Sized>(
        &self,
        provider: &P,
        pc: u64,
        architecture: Architecture,
    ) -> Categorization {
        let region = match check_gate(provider, pc, architecture, &self.config) {
            Ok(region) => region,
            Err(verdict) => {
                debug!("Gate rejected the crash: {}", verdict);
                return Categorization::Gate(verdict);
            }
        };

        debug!("Analysing {:#x} bytes of JIT code at {:#x}", region.size(), region.base_address);
        if log_enabled!(Level::Debug) {
            debug!("\n{}", hex_dump(region.bytes));
        }

        Categorization::Scan(self.analyze_region(region.bytes, region.base_address, region.pc))
    }

    /// Categorize the code in `bytes`, loaded at `base_address`, for a fault at `pc`
    pub fn analyze_region(&self, bytes: &[u8], base_address: u64, pc: u64) -> CrashCategory {
        self.driver().analyze(bytes, bytes.len() as u64, base_address, pc)
    }

    /// Like [`Analyzer::analyze_region`] but returns the final scan state
    pub fn run_region(&self, bytes: &[u8], base_address: u64, pc: u64) -> ScanState {
        self.driver().run(bytes, bytes.len() as u64, base_address, pc)
    }

    fn driver(&self) -> Driver<'_, D> {
        Driver::new(&self.decoder, &self.classifier).with_resync_threshold(self.config.resync_threshold)
    }
}
