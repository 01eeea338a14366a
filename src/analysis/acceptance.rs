//! Accept/reject policy for recognized regions
//!
//! The sparse-profile text decides what a region looks like: a fraction glyph
//! makes it an ingredient list, a cooking cue makes it a step paragraph (read
//! again with the block profile). The chosen result must then clear the
//! confidence threshold for its kind.

use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::config::AcceptanceSettings;
use crate::vision::{BoundingBox, Profile, RecognitionResult, RegionImage};

use super::lexicon::Lexicon;

/// Kind of text a region holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Ingredients,
    Instructions,
    Discard,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Classification::Ingredients => "ingredients",
            Classification::Instructions => "instructions",
            Classification::Discard => "discard",
        })
    }
}

/// Why a region was dropped
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DiscardReason {
    /// Looked like `label` but the engine was not sure enough
    LowConfidence {
        label: Classification,
        mean_confidence: Option<f32>,
        threshold: f32,
    },
    /// Neither a fraction glyph nor a cooking cue was found
    NoLexicalMatch,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::LowConfidence {
                label,
                mean_confidence: Some(mean),
                threshold,
            } => write!(
                f,
                "no reliable text ({label}: mean confidence {mean:.1} not above {threshold:.1})"
            ),
            DiscardReason::LowConfidence {
                label,
                mean_confidence: None,
                ..
            } => write!(f, "no reliable text ({label}: no tokens recognized)"),
            DiscardReason::NoLexicalMatch => f.write_str("no ingredient or instruction cue"),
        }
    }
}

/// Outcome for one region
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted(Classification),
    Rejected(DiscardReason),
}

/// Decision for one region, with the result it was based on
#[derive(Debug, Clone, Serialize)]
pub struct AcceptanceDecision {
    /// Region position in segmentation order
    pub region_index: usize,
    pub bounds: BoundingBox,
    /// Profile whose result was judged
    pub profile: Profile,
    pub result: RecognitionResult,
    pub verdict: Verdict,
}

impl AcceptanceDecision {
    /// Classification label, `Discard` for every rejection
    pub fn label(&self) -> Classification {
        match &self.verdict {
            Verdict::Accepted(label) => *label,
            Verdict::Rejected(_) => Classification::Discard,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.verdict, Verdict::Accepted(_))
    }

    pub fn discard_reason(&self) -> Option<&DiscardReason> {
        match &self.verdict {
            Verdict::Rejected(reason) => Some(reason),
            Verdict::Accepted(_) => None,
        }
    }
}

/// Per-region acceptance filter
pub struct AcceptanceFilter {
    lexicon: Lexicon,
    ingredients_threshold: f32,
    instructions_threshold: f32,
}

impl AcceptanceFilter {
    pub fn new(settings: &AcceptanceSettings) -> Self {
        Self {
            lexicon: Lexicon::from_settings(settings),
            ingredients_threshold: settings.ingredients_threshold,
            instructions_threshold: settings.instructions_threshold,
        }
    }

    /// Label suggested by the sparse-profile text alone
    pub fn classify(&self, sparse_text: &str) -> Classification {
        if self.lexicon.find_fraction(sparse_text).is_some() {
            Classification::Ingredients
        } else if self.lexicon.find_cue(sparse_text).is_some() {
            Classification::Instructions
        } else {
            Classification::Discard
        }
    }

    pub fn threshold(&self, label: Classification) -> Option<f32> {
        match label {
            Classification::Ingredients => Some(self.ingredients_threshold),
            Classification::Instructions => Some(self.instructions_threshold),
            Classification::Discard => None,
        }
    }

    /// Confidence gate. The mean must be strictly above the threshold; a
    /// result without tokens is always rejected.
    pub fn gate(&self, label: Classification, result: &RecognitionResult) -> Verdict {
        let Some(threshold) = self.threshold(label) else {
            return Verdict::Rejected(DiscardReason::NoLexicalMatch);
        };
        match result.mean_confidence() {
            Some(mean) if mean > threshold => Verdict::Accepted(label),
            mean_confidence => Verdict::Rejected(DiscardReason::LowConfidence {
                label,
                mean_confidence,
                threshold,
            }),
        }
    }

    /// Decide one region from its sparse result.
    ///
    /// `read_block` is only called for instruction candidates; its error is
    /// passed through untouched.
    pub fn decide<E, F>(
        &self,
        region: &RegionImage,
        sparse: RecognitionResult,
        read_block: F,
    ) -> Result<AcceptanceDecision, E>
    where
        F: FnOnce() -> Result<RecognitionResult, E>,
    {
        let label = self.classify(&sparse.text);
        let (profile, result) = match label {
            Classification::Instructions => (Profile::Block, read_block()?),
            _ => (Profile::Sparse, sparse),
        };
        let verdict = self.gate(label, &result);

        debug!(
            "Region {} classified {} via {:?}: {:?}",
            region.index, label, profile, verdict
        );

        Ok(AcceptanceDecision {
            region_index: region.index,
            bounds: region.bounds,
            profile,
            result,
            verdict,
        })
    }
}
