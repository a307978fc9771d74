//! Hand-rolled JSON-RPC-over-stdio transport.

pub mod stdio;
pub mod types;

pub use stdio::serve_stdio;
