//! Architecture support. This kernel targets `i686-unknown-none` only —
//! there is no multi-architecture abstraction layer, just the one backend.

pub mod x86;

pub use x86::halt;
