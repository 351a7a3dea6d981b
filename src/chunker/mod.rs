//! Chunking module - splits normalized document text into passages
//!
//! Passages overlap by a configured window and prefer to end on paragraph or
//! sentence boundaries near the target length.

mod boundary;

pub use boundary::BoundaryChunker;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::Passage;

/// Unit used for passage lengths and context windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    /// Unicode scalar values
    #[default]
    Chars,
    /// Approximate tokens (1 token ~= 4 chars when chunking, whitespace-delimited words for context)
    Tokens,
}

impl std::str::FromStr for LengthUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chars" | "characters" => Ok(Self::Chars),
            "tokens" => Ok(Self::Tokens),
            _ => Err(format!("Unknown length unit: {}", s)),
        }
    }
}

/// Characters per token when sizing passages in tokens
pub const CHARS_PER_TOKEN: usize = 4;

/// Chunking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Approximate passage length
    #[serde(default = "default_target_length")]
    pub target_length: usize,

    /// How far each passage reaches back into its predecessor
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Distance from the target cut within which a boundary is snapped to
    #[serde(default = "default_boundary_tolerance")]
    pub boundary_tolerance: usize,

    #[serde(default)]
    pub unit: LengthUnit,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_length: default_target_length(),
            overlap: default_overlap(),
            boundary_tolerance: default_boundary_tolerance(),
            unit: LengthUnit::Chars,
        }
    }
}

fn default_target_length() -> usize {
    1200
}

fn default_overlap() -> usize {
    200
}

fn default_boundary_tolerance() -> usize {
    120
}

impl ChunkerConfig {
    pub fn new(target_length: usize, overlap: usize) -> Self {
        Self {
            target_length,
            overlap,
            ..Default::default()
        }
    }

    pub fn with_tolerance(mut self, boundary_tolerance: usize) -> Self {
        self.boundary_tolerance = boundary_tolerance;
        self
    }

    pub fn with_unit(mut self, unit: LengthUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Reject parameters that cannot produce a valid passage sequence
    pub fn validate(&self) -> Result<()> {
        if self.target_length == 0 {
            return Err(Error::InvalidConfiguration(
                "target_length must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.target_length {
            return Err(Error::InvalidConfiguration(format!(
                "overlap ({}) must be smaller than target_length ({})",
                self.overlap, self.target_length
            )));
        }
        Ok(())
    }

    fn to_chars(&self, n: usize) -> usize {
        match self.unit {
            LengthUnit::Chars => n,
            LengthUnit::Tokens => n.saturating_mul(CHARS_PER_TOKEN),
        }
    }

    pub(crate) fn target_chars(&self) -> usize {
        self.to_chars(self.target_length)
    }

    pub(crate) fn overlap_chars(&self) -> usize {
        self.to_chars(self.overlap)
    }

    pub(crate) fn tolerance_chars(&self) -> usize {
        self.to_chars(self.boundary_tolerance)
    }
}

/// Trait for chunkers
pub trait Chunker {
    /// Split a document's normalized text into ordered passages
    fn chunk(&self, document_id: &str, text: &str) -> Vec<Passage>;
}

/// Validate `config` and chunk `text` in one call
pub fn chunk(document_id: &str, text: &str, config: &ChunkerConfig) -> Result<Vec<Passage>> {
    let chunker = BoundaryChunker::new(config.clone())?;
    Ok(chunker.chunk(document_id, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_overlap_at_target() {
        let err = ChunkerConfig::new(300, 300).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert!(ChunkerConfig::new(300, 500).validate().is_err());
        assert!(ChunkerConfig::new(0, 0).validate().is_err());
        assert!(ChunkerConfig::new(300, 299).validate().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected_before_chunking() {
        assert!(chunk("doc", "", &ChunkerConfig::new(10, 10)).is_err());
    }

    #[test]
    fn test_token_unit_scales_lengths() {
        let config = ChunkerConfig::new(100, 20).with_tolerance(5).with_unit(LengthUnit::Tokens);
        assert_eq!(config.target_chars(), 400);
        assert_eq!(config.overlap_chars(), 80);
        assert_eq!(config.tolerance_chars(), 20);
    }

    #[test]
    fn test_token_scaling_saturates() {
        let config = ChunkerConfig::new(usize::MAX, 1).with_tolerance(usize::MAX).with_unit(LengthUnit::Tokens);
        assert!(config.validate().is_ok());
        assert_eq!(config.target_chars(), usize::MAX);
        assert_eq!(config.tolerance_chars(), usize::MAX);
    }

    #[test]
    fn test_parse_unit() {
        assert_eq!("tokens".parse::<LengthUnit>().unwrap(), LengthUnit::Tokens);
        assert_eq!("Chars".parse::<LengthUnit>().unwrap(), LengthUnit::Chars);
        assert!("lines".parse::<LengthUnit>().is_err());
    }

    #[test]
    fn test_config_from_toml_uses_defaults() {
        let config: ChunkerConfig = toml::from_str("target_length = 500").unwrap();
        assert_eq!(config.target_length, 500);
        assert_eq!(config.overlap, 200);
        assert_eq!(config.unit, LengthUnit::Chars);
    }
}
