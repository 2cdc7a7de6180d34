//! Ads library extraction
//!
//! Each module handles one field family of the result page. All lookups are
//! fallible by construction: a selector that matches nothing is a normal
//! outcome, reported as `None` or as a skipped card.

mod ad_cards;
mod document;
mod total_count;

pub use ad_cards::*;
pub use document::*;
pub use total_count::*;
