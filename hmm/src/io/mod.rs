//! Reading and writing observations and models
mod reader;
pub use reader::*;

#[cfg(feature = "serde1")]
mod binary;
#[cfg(feature = "serde1")]
pub use binary::*;
