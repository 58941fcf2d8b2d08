//! The target-independent JIT compiler façade (L3).
//!
//! A factory (`compiler_for`) resolves a target identifier string to a
//! concrete compiler; each concrete compiler owns an
//! [`AppendableBuffer`](crate::sink::AppendableBuffer) and wraps an L2
//! architecture encoder over it, exposing a target-independent
//! pseudo-instruction set. Operand shapes are resolved concretely via
//! [`Operand`] rather than a variadic placeholder; rather than an abstract
//! base class, the pseudo-instruction set is an object-safe trait, the way
//! `cranelift_module::Backend` is an object-safe trait rather than a virtual
//! base class.
//!
//! # Register model
//!
//! Every concrete compiler exposes 7 general-purpose pseudo-registers,
//! `Operand::Reg(0)` through `Operand::Reg(6)`, mapped onto the first 7
//! architectural general-purpose registers (`RAX`..`RDI` for x86-64, `X0`..
//! `X6` for AArch64, `$t0`..`$t6` for MIPS32). The 8th architectural slot
//! (`R8`/`X7`/`$t7`) is reserved as an internal scratch register for
//! materializing immediates that an instruction's encoding cannot take
//! directly (e.g. comparing a register against an immediate on x86, which
//! has no general `cmp reg, imm` form outside the accumulator — see
//! `DESIGN.md`); pseudo-instruction sequences that use it document so, and
//! callers should not rely on its value surviving such a call.

#[cfg(feature = "x86")]
mod x86_64;

#[cfg(feature = "arm64")]
mod arm64;

#[cfg(feature = "mips32")]
mod mips32;

use crate::error::{MachCodeError, Result};
use crate::sink::{AppendableBuffer, ExecutableBuffer};

/// Number of pseudo-registers exposed to façade callers (see module docs
/// for the reserved 8th scratch slot).
pub const GPR_COUNT: u8 = 7;

/// An operand to a pseudo-instruction: either one of the façade's abstract
/// general-purpose registers, or a signed 64-bit immediate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    /// One of the façade's `GPR_COUNT` abstract registers.
    Reg(u8),
    /// An immediate value. Architectures narrower than 64 bits (MIPS32)
    /// truncate to their native width.
    Imm(i64),
}

impl Operand {
    fn reg(self) -> Result<u8> {
        match self {
            Operand::Reg(r) if r < GPR_COUNT => Ok(r),
            Operand::Reg(r) => Err(MachCodeError::InvalidArgument(format!(
                "pseudo-register index {r} out of range (0..{GPR_COUNT})"
            ))),
            Operand::Imm(_) => Err(MachCodeError::InvalidArgument(
                "expected a register operand, got an immediate".into(),
            )),
        }
    }
}

/// The target-independent pseudo-instruction set: control flow, arithmetic,
/// logic, and data movement, with target-agnostic semantics.
///
/// This trait is an object-safe stand-in for what would otherwise be an
/// abstract `jit::compiler` base class: rather than a virtual base with
/// `...`-typed methods, every pseudo-instruction has a concrete
/// `Operand`-typed signature, and `Box<dyn JitCompiler>` is what the factory
/// returns.
pub trait JitCompiler {
    // ---- control ----------------------------------------------------

    /// Emit a standard function prologue (`push rbp; mov rbp, rsp` on
    /// x86-64; the AArch64/MIPS32 analogues save the frame/return-address
    /// registers the same way).
    fn enter(&mut self) -> Result<()>;

    /// Emit a standard function epilogue (`pop rbp` on x86-64).
    fn leave(&mut self) -> Result<()>;

    /// Emit a return instruction.
    fn ret(&mut self) -> Result<()>;

    /// Emit an unconditional relative jump. `rel` is the architecture's
    /// native branch-offset unit (bytes for x86-64, words for AArch64 and
    /// MIPS32) — this façade does no relocation or label resolution, so
    /// callers compute `rel` themselves.
    fn jmp(&mut self, rel: i32) -> Result<()>;

    /// Emit a no-op.
    fn nop(&mut self) -> Result<()>;

    // ---- data movement ------------------------------------------------

    /// `dst = src`.
    fn mov(&mut self, dst: Operand, src: Operand) -> Result<()>;

    // ---- arithmetic -----------------------------------------------------

    /// `dst += src`.
    fn add(&mut self, dst: Operand, src: Operand) -> Result<()>;

    /// `dst -= src`.
    fn sub(&mut self, dst: Operand, src: Operand) -> Result<()>;

    /// `dst *= src`.
    fn mul(&mut self, dst: Operand, src: Operand) -> Result<()>;

    /// `dst /= src` (signed, truncating).
    fn div(&mut self, dst: Operand, src: Operand) -> Result<()>;

    /// `dst %= src` (signed).
    fn rem(&mut self, dst: Operand, src: Operand) -> Result<()>;

    /// `dst = dst.pow(exponent)`. Only `Operand::Imm` exponents are
    /// supported: the implementation unrolls the multiplication sequence at
    /// emission time rather than synthesizing a runtime loop, since a
    /// runtime loop needs a forward branch whose displacement is unknown
    /// until the loop body is emitted — the kind of two-pass/relocation
    /// machinery this façade deliberately avoids. A register exponent fails
    /// with [`MachCodeError::NotImplemented`].
    fn pow(&mut self, dst: Operand, exponent: Operand) -> Result<()>;

    /// `dst = dst.wrapping_neg()`.
    fn neg(&mut self, dst: Operand) -> Result<()>;

    /// `dst = dst.abs()`.
    fn abs(&mut self, dst: Operand) -> Result<()>;

    /// `dst += 1`.
    fn inc(&mut self, dst: Operand) -> Result<()>;

    /// `dst -= 1`.
    fn dec(&mut self, dst: Operand) -> Result<()>;

    // ---- logic ------------------------------------------------------

    /// `dst &= src`.
    fn and(&mut self, dst: Operand, src: Operand) -> Result<()>;

    /// `dst |= src`.
    fn or(&mut self, dst: Operand, src: Operand) -> Result<()>;

    /// `dst ^= src`.
    fn xor(&mut self, dst: Operand, src: Operand) -> Result<()>;

    /// `dst = !(dst & src)`.
    fn nand(&mut self, dst: Operand, src: Operand) -> Result<()>;

    /// `dst = !(dst | src)`.
    fn nor(&mut self, dst: Operand, src: Operand) -> Result<()>;

    /// `dst = !dst`.
    fn not(&mut self, dst: Operand) -> Result<()>;

    /// `dst = dst.leading_zeros()`.
    fn clz(&mut self, dst: Operand) -> Result<()>;

    /// Compare `lhs` against `rhs`, leaving architecture flags (or the
    /// MIPS32 scratch-register comparison result) for a subsequent
    /// conditional sequence. This façade does not itself expose conditional
    /// jumps (see [`jmp`](Self::jmp)'s doc comment on label resolution being
    /// out of scope).
    fn cmp(&mut self, lhs: Operand, rhs: Operand) -> Result<()>;

    /// `dst <<= amount`.
    fn shl(&mut self, dst: Operand, amount: Operand) -> Result<()>;

    /// `dst >>= amount` (logical).
    fn shr(&mut self, dst: Operand, amount: Operand) -> Result<()>;

    // ---- session management -----------------------------------------

    /// The bytes emitted so far.
    fn code(&self) -> &[u8];

    /// Copy the emitted code into a fresh executable buffer, ready for
    /// [`ExecutableBuffer::execute`].
    fn into_executable(&self) -> Result<ExecutableBuffer>;
}

/// Resolve a target identifier string to a concrete compiler:
///
/// - `"x86-64"` → an x86-64 compiler.
/// - `"armv8-aarch64"` → an AArch64 compiler.
/// - `"mips32"` → a MIPS32 compiler.
/// - anything else, or a target excluded at build time via Cargo features,
///   → [`MachCodeError::InvalidArgument`].
pub fn compiler_for(target: &str) -> Result<Box<dyn JitCompiler>> {
    log::debug!("compiler_for: resolving JIT target {target:?}");
    match target {
        #[cfg(feature = "x86")]
        "x86-64" => Ok(Box::new(x86_64::X86_64Compiler::new())),
        #[cfg(feature = "arm64")]
        "armv8-aarch64" => Ok(Box::new(arm64::Arm64Compiler::new())),
        #[cfg(feature = "mips32")]
        "mips32" => Ok(Box::new(mips32::Mips32Compiler::new())),
        other => Err(MachCodeError::InvalidArgument(format!(
            "unknown or disabled JIT target: {other}"
        ))),
    }
}

/// Shared bookkeeping every concrete compiler embeds: the appendable buffer
/// code is built into before being copied into executable memory.
pub(crate) struct Session {
    pub(crate) buffer: AppendableBuffer,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            buffer: AppendableBuffer::new(),
        }
    }

    pub(crate) fn code(&self) -> &[u8] {
        use crate::sink::DataView;
        self.buffer.data()
    }

    pub(crate) fn into_executable(&self) -> Result<ExecutableBuffer> {
        log::trace!(
            "Session::into_executable: copying {} bytes into executable memory",
            self.code().len()
        );
        ExecutableBuffer::from_appendable(&self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s5_factory_resolves_every_enabled_target() {
        #[cfg(feature = "x86")]
        assert!(compiler_for("x86-64").is_ok());
        #[cfg(feature = "arm64")]
        assert!(compiler_for("armv8-aarch64").is_ok());
        #[cfg(feature = "mips32")]
        assert!(compiler_for("mips32").is_ok());
    }

    #[test]
    fn s5_factory_rejects_unknown_target() {
        assert!(matches!(
            compiler_for("unknown"),
            Err(MachCodeError::InvalidArgument(_))
        ));
    }
}
