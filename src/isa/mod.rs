//! Architecture-specific encoders (L2).
//!
//! Each encoder is parameterized over a [`ByteSink`](crate::sink::ByteSink)
//! and exposes one method per mnemonic/operand-shape. Mnemonic methods
//! return `Result<&mut Self>` so calls can be chained.

#[cfg(feature = "x86")]
pub mod x86;

#[cfg(feature = "arm64")]
pub mod arm64;

#[cfg(feature = "mips32")]
pub mod mips32;
