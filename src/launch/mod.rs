//! Launching packaged archives
//!
//! The launcher reads the archive's own manifest to choose the entry point,
//! rebuilds the classpath from the nested structure plus the classpath
//! index, and starts a JVM against an extracted copy of the archive.

pub mod classpath;
pub mod entry;
pub mod extract;

pub use classpath::{resolve_classpath, ClasspathIndex, ClasspathLayout, NestedEntries};
pub use entry::{select_entry, DeclaredEntries, EntrySelection};
pub use extract::{LaunchPlan, Launcher};
