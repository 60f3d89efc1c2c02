//! Image transform — pure Rust, zero system dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` |
//! | **Mirror** | `DynamicImage::fliph` |
//! | **Encode** | raw pixel bytes or PNG |
//!
//! The module is split into:
//! - **Parameters**: [`Encoding`]
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: async wrapper that runs the backend on the rayon pool

pub mod backend;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, Mirrored};
pub use operations::mirror_payload;
pub use params::Encoding;
pub use rust_backend::RustBackend;
