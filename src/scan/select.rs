//! Candidate selection over discovered main classes

use crate::error::{OsrcError, OsrcResult};
use crate::scan::MainClass;

/// Narrow discovered main classes to the ones that should become entries.
///
/// Candidates carrying any of `markers` win. Without a marked candidate the
/// full set is used, which then must hold exactly one class.
pub fn select_main_classes(
    candidates: Vec<MainClass>,
    markers: &[String],
) -> OsrcResult<Vec<MainClass>> {
    if candidates.is_empty() {
        return Err(OsrcError::MainClassNotFound);
    }
    let marked: Vec<MainClass> = candidates
        .iter()
        .filter(|c| c.has_any(markers))
        .cloned()
        .collect();
    if !marked.is_empty() {
        return Ok(marked);
    }
    if candidates.len() == 1 {
        return Ok(candidates);
    }
    Err(OsrcError::AmbiguousMainClass(
        candidates.into_iter().map(|c| c.name).collect(),
    ))
}
