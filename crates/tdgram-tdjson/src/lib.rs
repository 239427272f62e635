//! tdgram tdjson Transport
//!
//! Binds the `tdjson` client library to the [`tdgram_core::Transport`]
//! contract. The library is loaded at runtime from a configured path or the
//! platform loader's search path; when it cannot be loaded
//! [`TdJsonTransport::open`] reports [`tdgram_core::TransportError::Unavailable`].

mod ffi;
mod init;
pub mod transport;

pub use ffi::default_library_name;
pub use transport::{decode_update, encode_query, TdJsonTransport};
