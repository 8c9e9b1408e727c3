//! Generation backend implementations for taskforge.
//!
//! All backends implement the `taskforge_core::TextGenerator` trait.
//! The router selects the correct backend based on configuration.

#[cfg(feature = "local")]
pub mod local;
pub mod openai_compat;
pub mod router;

#[cfg(feature = "local")]
pub use local::LocalGenerator;
pub use openai_compat::OpenAiCompatGenerator;
pub use router::{GeneratorRouter, build_from_config, default_base_url, requires_api_key};
