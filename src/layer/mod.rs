//! Archive layering
//!
//! Layers partition an archive's entries so that downstream image builds can
//! cache and ship them independently. Rules assign each entry (or library)
//! to exactly one layer; the layers index records the result inside the
//! archive in a line-oriented format.

pub mod classifier;
pub mod index;
pub mod tools;

pub use classifier::{
    ApplicationRule, ContentSelector, Layer, LayerRules, LibraryMatcher, LibraryRule,
};
pub use index::{IndexedLayers, LayersIndex};
pub use tools::LayeredArchive;
