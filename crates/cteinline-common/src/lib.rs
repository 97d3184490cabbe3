//! Common error handling for cteinline.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod error;

pub use error::{Error, Result};
