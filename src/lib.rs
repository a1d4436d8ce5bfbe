//! osrc - executable archive packaging and buildpack image builds
//!
//! Repackages plain jars and wars into layered executable archives with
//! nested libraries, launches them from a content-addressed extraction,
//! and drives the Cloud Native Buildpacks lifecycle in a container engine
//! to turn them into OCI images.

pub mod buildpack;
pub mod cli;
pub mod config;
pub mod error;
pub mod launch;
pub mod layer;
pub mod library;
pub mod orchestration;
pub mod package;
pub mod scan;
pub mod ui;

pub use error::{OsrcError, OsrcResult};
