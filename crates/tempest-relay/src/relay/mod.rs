//! Relay core: upstream request construction, status translation, streaming.

pub mod upstream;
