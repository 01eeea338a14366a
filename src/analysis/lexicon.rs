//! Lexical cues used to tell ingredient lists from cooking steps

use strsim::normalized_levenshtein;

use crate::config::AcceptanceSettings;

/// Words shorter than this are never fuzzy-matched
const MIN_FUZZY_LEN: usize = 4;

/// Fraction glyphs and instruction cue words
#[derive(Debug, Clone)]
pub struct Lexicon {
    fraction_glyphs: Vec<String>,
    instruction_cues: Vec<String>,
    cue_similarity: Option<f64>,
}

impl Lexicon {
    pub fn from_settings(settings: &AcceptanceSettings) -> Self {
        Self {
            fraction_glyphs: settings
                .fraction_glyphs
                .iter()
                .filter(|g| !g.is_empty())
                .cloned()
                .collect(),
            instruction_cues: settings
                .instruction_cues
                .iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
            cue_similarity: settings.cue_similarity,
        }
    }

    /// First fraction glyph found in `text`
    pub fn find_fraction(&self, text: &str) -> Option<&str> {
        self.fraction_glyphs
            .iter()
            .find(|glyph| text.contains(glyph.as_str()))
            .map(String::as_str)
    }

    /// First instruction cue found in `text`.
    ///
    /// Cues match case-insensitively anywhere in the text. When a similarity
    /// cutoff is configured, a single word close enough to a cue also matches,
    /// which catches OCR slips such as "Preheai".
    pub fn find_cue(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        if let Some(cue) = self
            .instruction_cues
            .iter()
            .find(|cue| lowered.contains(cue.as_str()))
        {
            return Some(cue.as_str());
        }

        let cutoff = self.cue_similarity?;
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= MIN_FUZZY_LEN)
            .collect();

        self.instruction_cues
            .iter()
            .find(|cue| {
                words
                    .iter()
                    .any(|word| normalized_levenshtein(word, cue) >= cutoff)
            })
            .map(String::as_str)
    }
}
