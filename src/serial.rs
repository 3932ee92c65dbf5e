//! Top-level serial facade. The real 16550 driver lives in
//! [`crate::arch::x86::serial`]; this module re-exports it so callers
//! outside `arch` don't need to know the target is x86-only.

pub use crate::arch::x86::serial::{init, SerialPort};
