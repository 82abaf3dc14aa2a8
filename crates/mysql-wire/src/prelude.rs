//! Internal prelude for no_std compatibility.
//!
//! Re-exports the heap types the crate needs, sourced from `std` or `alloc`
//! depending on feature flags.

#[cfg(feature = "std")]
pub use std::{
    borrow::ToOwned,
    format,
    string::{String, ToString},
    vec,
    vec::Vec,
};

#[cfg(all(feature = "alloc", not(feature = "std")))]
pub use alloc::{
    borrow::ToOwned,
    format,
    string::{String, ToString},
    vec,
    vec::Vec,
};
