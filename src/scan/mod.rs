//! Entry-point scanning
//!
//! The finder reads raw class metadata and reports every class with a
//! `main` method plus the annotation types on it. It knows nothing about
//! which annotations matter; selection and role assignment work on those
//! name sets one level up.

pub mod classfile;
pub mod finder;
pub mod select;

pub use finder::{
    LoggingTimeoutWarningListener, MainClass, MainClassFinder, MainClassTimeoutWarningListener,
};
pub use select::select_main_classes;
