//! Tuning profile for the categorizer
//!
//! The blacklist, the variant rules and the displacement threshold are tuned
//! against one code generator's output. They live here as data so that the
//! classifier can be retargeted with a JSON file instead of a rebuild.

use std::fs;
use std::path::Path;
use serde::{Serialize, Deserialize};
use log::debug;

use crate::constants::tuning::defaults;
use crate::errors::{CategorizerError, CategorizerResult, ErrorContext, ErrorExt};
use crate::models::{Architecture, OperationKind};

/// Encodings that share an operation kind with ordinary code but that the
/// code generator never emits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantRule {
    /// Operation kind the rule applies to
    pub kind: OperationKind,
    /// Mnemonic prefixes that mark the rare variant
    pub mnemonic_prefixes: Vec<String>,
}

impl VariantRule {
    fn new(kind: OperationKind, prefixes: &[&str]) -> Self {
        Self {
            kind,
            mnemonic_prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Whether `mnemonic` of an instruction of `kind` is the rare variant
    pub fn matches(&self, kind: OperationKind, mnemonic: &str) -> bool {
        self.kind == kind && self.mnemonic_prefixes.iter().any(|p| mnemonic.starts_with(p.as_str()))
    }
}

/// Architecture-specific data used by the instruction classifier and decoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierProfile {
    /// Decoder mode (16, 32 or 64)
    pub bitness: u32,
    /// Operation kinds never emitted for this workload
    pub blacklist: Vec<OperationKind>,
    /// Rare encodings of otherwise ordinary kinds
    pub variant_rules: Vec<VariantRule>,
    /// Memory displacements at or above this magnitude mark corrupt code
    pub displacement_threshold: u64,
}

impl Default for ClassifierProfile {
    fn default() -> Self {
        use OperationKind::*;

        Self {
            bitness: defaults::BITNESS,
            blacklist: vec![
                InterruptFlag,
                StringCompare,
                StringLoad,
                Inc,
                Dec,
                ToggleCarry,
                SetCarry,
                ClearCarry,
                PortIn,
                PortOut,
                Translate,
                OverflowTrap,
                BcdAdjust,
                RotateLeft,
                RotateRight,
            ],
            variant_rules: vec![
                VariantRule::new(Add, &["adc"]),
                VariantRule::new(Sub, &["sbb"]),
                VariantRule::new(PushRegs, &["pusha", "popa"]),
                VariantRule::new(Return, &["retf"]),
                VariantRule::new(ConditionalJump, &["loopnz", "loopne"]),
            ],
            displacement_threshold: defaults::DISPLACEMENT_THRESHOLD,
        }
    }
}

/// Complete categorizer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategorizerConfig {
    /// The one architecture whose JIT code is analysed
    pub supported_architecture: Architecture,
    /// Size of the JIT's executable allocations
    pub jit_region_size: u64,
    /// Scan passes shorter than this that end before the PC trigger a one-byte resync
    pub resync_threshold: u32,
    /// Classifier and decoder tuning
    pub classifier: ClassifierProfile,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            supported_architecture: Architecture::X86,
            jit_region_size: defaults::JIT_REGION_SIZE,
            resync_threshold: defaults::RESYNC_THRESHOLD,
            classifier: ClassifierProfile::default(),
        }
    }
}

impl CategorizerConfig {
    /// Load a configuration from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> CategorizerResult<Self> {
        let context = ErrorContext {
            path: Some(path.display().to_string()),
            component: "config".to_string(),
            operation: "load".to_string(),
        };

        let json = fs::read_to_string(path).with_context(context.clone())?;
        let config: CategorizerConfig = serde_json::from_str(&json).with_context(context)?;
        config.validate()?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> CategorizerResult<()> {
        let json = serde_json::to_string_pretty(self).with_simple_context("config", "serialize")?;
        fs::write(path, json).with_context(ErrorContext {
            path: Some(path.display().to_string()),
            component: "config".to_string(),
            operation: "save".to_string(),
        })?;
        Ok(())
    }

    /// Reject values the analysis cannot work with
    pub fn validate(&self) -> CategorizerResult<()> {
        if !matches!(self.classifier.bitness, 16 | 32 | 64) {
            return Err(CategorizerError::Config(format!(
                "unsupported decoder bitness {}",
                self.classifier.bitness
            )));
        }
        if self.resync_threshold == 0 {
            return Err(CategorizerError::Config("resync_threshold must be at least 1".to_string()));
        }
        if self.jit_region_size == 0 {
            return Err(CategorizerError::Config("jit_region_size must be non-zero".to_string()));
        }
        Ok(())
    }
}
