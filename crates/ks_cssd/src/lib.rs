//! The ks_cssd crate.
//!
//! Compiles CSSD (Constrained Secondary Structure Definition) notation into
//! search models:
//!  - grammar validation of a CSSD string plus positional-variable overlay
//!  - recursive-descent model construction with pseudoknot and base-triple
//!    cross-reference resolution
//!  - serialization of a model back to neutral CSSD text
//!  - round-trip self-verification of builder against validator
//!

mod error;
mod validate;
mod build;
mod serialize;
mod check;

pub use error::*;
pub use validate::*;
pub use build::*;
pub use serialize::*;
pub use check::*;
