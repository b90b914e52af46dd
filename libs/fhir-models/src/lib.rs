//! FHIR data types for the vital records mapping layer
//!
//! Version-agnostic models for the small set of complex types the record
//! primitives read and write (codings, extensions, addresses).

mod common;

pub use common::complex::*;
pub use common::error::{Error, Result};
