//! A multi-architecture machine-code emission and just-in-time execution
//! library.
//!
//! Three layers, built leaves-first:
//!
//! - [`sink`] — byte sinks (L1): a uniform append contract backed by a
//!   growable heap vector ([`AppendableBuffer`]), an executable mmap region
//!   ([`ExecutableBuffer`]), or a caller-owned stream ([`PersistentBuffer`]).
//! - [`isa`] — architecture-specific encoders (L2): [`isa::x86::X86Emitter`],
//!   [`isa::arm64::Arm64Emitter`], [`isa::mips32::Mips32Emitter`], each
//!   generic over any [`sink::ByteSink`] and exposing one method per
//!   mnemonic/operand shape.
//! - [`jit`] — the target-independent JIT compiler façade (L3):
//!   [`compiler_for`] resolves a target name to a concrete
//!   [`jit::JitCompiler`] that exposes pseudo-instructions (`mov`, `add`,
//!   `ret`, `enter`/`leave`, ...) over its own internal buffer.
//!
//! ```
//! use machcode::jit::{compiler_for, JitCompiler, Operand};
//!
//! let mut c = compiler_for("x86-64").unwrap();
//! c.enter().unwrap();
//! c.mov(Operand::Reg(0), Operand::Imm(0)).unwrap();
//! for k in [3, 4, 5] {
//!     c.add(Operand::Reg(0), Operand::Imm(k)).unwrap();
//! }
//! c.leave().unwrap();
//! c.ret().unwrap();
//!
//! let exe = c.into_executable().unwrap();
//! let result: i64 = unsafe { exe.execute() };
//! assert_eq!(result, 12);
//! ```
//!
//! See `DESIGN.md` in the repository root for the design rationale behind
//! each module.

#![warn(missing_docs)]

pub mod bits;
pub mod error;
pub mod isa;
pub mod jit;
pub mod operand;
pub mod sink;

pub use error::{MachCodeError, Result};
pub use jit::{compiler_for, JitCompiler, Operand as JitOperand};
pub use sink::{AppendableBuffer, ByteSink, DataView, ExecutableBuffer, PersistentBuffer};
