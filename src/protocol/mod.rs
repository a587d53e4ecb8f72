//! Protocol constants and header helpers shared by the stages and the dispatcher.
//!
//! - **[constants]** - content types, header names and transcript markers
//! - header parsing/formatting (`Cache-Control`, basic credentials, content types)

pub mod constants;
mod headers;

pub use headers::*;
