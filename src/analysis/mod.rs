//! Analysis Layer
//!
//! Decides which recognized regions are worth handing on, and as what.

pub mod acceptance;
pub mod lexicon;

pub use acceptance::{AcceptanceDecision, AcceptanceFilter, Classification, DiscardReason, Verdict};
pub use lexicon::Lexicon;
