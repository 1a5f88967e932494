//! Decoder strictness and policy knobs

use serde::{Deserialize, Serialize};

/// How the import directory's `virtual_address` is turned into a file offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportAddressing {
    /// Map the RVA through the section table.
    #[default]
    Translated,
    /// Use the RVA as a raw file offset. Only correct for images whose
    /// sections are identity-mapped.
    Direct,
}

/// Options controlling how strictly a PE image is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Fail when the DOS header does not start with "MZ"
    pub strict_signature: bool,
    /// Upper bound on `number_of_sections` accepted from the COFF header
    pub max_sections: u16,
    /// Decode only `number_of_rva_and_sizes` directories (clamped to 16)
    /// instead of always reading 16
    pub honor_declared_directory_count: bool,
    /// Import directory address interpretation
    pub import_addressing: ImportAddressing,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            strict_signature: true,
            max_sections: 4096,
            honor_declared_directory_count: true,
            import_addressing: ImportAddressing::Translated,
        }
    }
}

impl DecodeOptions {
    /// Options that accept a missing MZ signature.
    pub fn lenient() -> Self {
        Self {
            strict_signature: false,
            ..Self::default()
        }
    }
}
