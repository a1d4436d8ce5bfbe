//! CLI command implementations

pub mod build;
pub mod completions;
pub mod config;
pub mod launch;
pub mod layers;
pub mod package;
pub mod scan;

pub use build::execute as build_image;
pub use completions::execute as completions;
pub use config::execute as config;
pub use launch::execute as launch;
pub use layers::execute as layers;
pub use package::execute as package;
pub use scan::execute as scan;
