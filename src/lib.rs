//! Process-agnostic Manhattan routing and via synthesis for analog layout.
//!
//! Routes and vias are built into a [`layout::Library`] against an explicit
//! [`tech::TechMap`]; nothing in the crate depends on a globally selected
//! process.

pub mod cli;
pub mod error;
pub mod geometry;
pub mod halo;
pub mod layout;
pub mod paths;
pub mod route;
pub mod tech;
pub mod via;

pub use error::{Error, Result};

#[cfg(test)]
pub(crate) mod tests;
