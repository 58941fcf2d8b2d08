//! The MIPS32 concrete JIT compiler.
//!
//! The sparsest of the three compilers: pseudo-instructions lower to
//! minimum-viable MIPS32 sequences, and branch offsets are computed without
//! accounting for the branch delay slot — a simplification consistent with
//! this encoder being a curated subset, not a cycle-accurate MIPS32
//! implementation.

use super::{JitCompiler, Operand, Session};
use crate::error::{MachCodeError, Result};
use crate::isa::mips32::{gpr, Mips32Emitter};
use crate::sink::ExecutableBuffer;

/// The internal scratch register (`$t7`), used to materialize an immediate
/// operand and to hold intermediate quotients for `rem` (see the
/// [`crate::jit`] module docs).
const SCRATCH: u8 = gpr::T7;

/// `$ra`, used by `ret` (`jr $ra`).
const RA: u8 = gpr::RA;

fn reg(index: u8) -> Result<u8> {
    if index < super::GPR_COUNT {
        Ok(gpr::T0 + index)
    } else {
        Err(MachCodeError::InvalidArgument(format!(
            "pseudo-register index {index} out of range"
        )))
    }
}

/// Wraps a [`Mips32Emitter`] over an owned buffer and implements the
/// target-independent pseudo-instruction set. `enter`/`leave` are no-ops in
/// the strict sense MIPS32 has no hardware call-stack convention of its own
/// to save beyond what a full ABI-aware frame builder would add: they
/// reserve/release 8 bytes of stack for `$ra`/`$fp` via `addi $sp`,
/// mirroring the x86-64 and AArch64 compilers' prologue/epilogue shape.
pub struct Mips32Compiler {
    session: Session,
}

impl Mips32Compiler {
    /// Start a fresh emission session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: Session::new(),
        }
    }

    fn emitter(&mut self) -> Mips32Emitter<'_, crate::sink::AppendableBuffer> {
        Mips32Emitter::new(&mut self.session.buffer)
    }

    fn load_imm(&mut self, rt: u8, value: i64) -> Result<()> {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let bits = value as u32;
        let hi = (bits >> 16) as u16;
        let lo = (bits & 0xFFFF) as u16;
        self.emitter().lui(rt, hi)?;
        self.emitter().ori(rt, rt, lo)?;
        Ok(())
    }

    fn resolve(&mut self, operand: Operand) -> Result<u8> {
        match operand {
            Operand::Reg(r) => reg(r),
            Operand::Imm(value) => {
                self.load_imm(SCRATCH, value)?;
                Ok(SCRATCH)
            }
        }
    }

    fn dst_reg(dst: Operand) -> Result<u8> {
        match dst {
            Operand::Reg(r) => reg(r),
            Operand::Imm(_) => Err(MachCodeError::InvalidArgument(
                "expected a register operand, got an immediate".into(),
            )),
        }
    }
}

impl Default for Mips32Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl JitCompiler for Mips32Compiler {
    fn enter(&mut self) -> Result<()> {
        self.emitter().addi(gpr::SP, gpr::SP, 0xFFF8)?; // sp -= 8 (imm is two's-complement)
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        self.emitter().addi(gpr::SP, gpr::SP, 8)?;
        Ok(())
    }

    fn ret(&mut self) -> Result<()> {
        self.emitter().jr(RA)?;
        self.emitter().nop()?; // branch delay slot
        Ok(())
    }

    fn jmp(&mut self, rel_words: i32) -> Result<()> {
        #[allow(clippy::cast_sign_loss)]
        self.emitter().j((rel_words as u32) & 0x03FF_FFFF)?;
        self.emitter().nop()?;
        Ok(())
    }

    fn nop(&mut self) -> Result<()> {
        self.emitter().nop()?;
        Ok(())
    }

    fn mov(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        match src {
            Operand::Reg(_) => {
                let s = self.resolve(src)?;
                self.emitter().or(d, s, gpr::ZERO)?;
            }
            Operand::Imm(value) => self.load_imm(d, value)?,
        }
        Ok(())
    }

    fn add(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().add(d, d, s)?;
        Ok(())
    }

    fn sub(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().sub(d, d, s)?;
        Ok(())
    }

    fn mul(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().mult(d, s)?;
        self.emitter().mflo(d)?;
        Ok(())
    }

    fn div(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().div(d, s)?;
        self.emitter().mflo(d)?;
        Ok(())
    }

    fn rem(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().div(d, s)?;
        self.emitter().mfhi(d)?;
        Ok(())
    }

    fn pow(&mut self, dst: Operand, exponent: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let Operand::Imm(exponent) = exponent else {
            return Err(MachCodeError::NotImplemented(
                "pow with a register exponent requires runtime looping, which is out of scope",
            ));
        };
        if exponent < 0 {
            return Err(MachCodeError::InvalidArgument(
                "pow exponent must be non-negative".into(),
            ));
        }
        if exponent == 0 {
            self.load_imm(d, 1)?;
            return Ok(());
        }
        self.emitter().or(SCRATCH, d, gpr::ZERO)?;
        for _ in 1..exponent {
            self.emitter().mult(d, SCRATCH)?;
            self.emitter().mflo(d)?;
        }
        Ok(())
    }

    fn neg(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        self.emitter().sub(d, gpr::ZERO, d)?;
        Ok(())
    }

    fn abs(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        // bgez d, +2 (skip the neg, which is one instruction plus its delay slot)
        self.emitter().bgez(d, 2)?;
        self.emitter().nop()?; // branch delay slot
        self.emitter().sub(d, gpr::ZERO, d)?;
        Ok(())
    }

    fn inc(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        self.emitter().addi(d, d, 1)?;
        Ok(())
    }

    fn dec(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        self.emitter().addi(d, d, 0xFFFF)?; // -1
        Ok(())
    }

    fn and(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().and(d, d, s)?;
        Ok(())
    }

    fn or(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().or(d, d, s)?;
        Ok(())
    }

    fn xor(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().xor(d, d, s)?;
        Ok(())
    }

    fn nand(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().and(d, d, s)?;
        self.emitter().nor(d, d, gpr::ZERO)?;
        Ok(())
    }

    fn nor(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().nor(d, d, s)?;
        Ok(())
    }

    fn not(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        self.emitter().nor(d, d, gpr::ZERO)?;
        Ok(())
    }

    fn clz(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        self.emitter().clz(d, d)?;
        Ok(())
    }

    fn cmp(&mut self, lhs: Operand, rhs: Operand) -> Result<()> {
        let l = Self::dst_reg(lhs)?;
        let r = self.resolve(rhs)?;
        self.emitter().slt(SCRATCH, l, r)?;
        Ok(())
    }

    fn shl(&mut self, dst: Operand, amount: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        match amount {
            Operand::Imm(n) => {
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                self.emitter().sll(d, d, n as u8)?;
            }
            Operand::Reg(_) => {
                return Err(MachCodeError::NotImplemented(
                    "shl by a register amount needs the variable-shift SLLV form",
                ));
            }
        }
        Ok(())
    }

    fn shr(&mut self, dst: Operand, amount: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        match amount {
            Operand::Imm(n) => {
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                self.emitter().srl(d, d, n as u8)?;
            }
            Operand::Reg(_) => {
                return Err(MachCodeError::NotImplemented(
                    "shr by a register amount needs the variable-shift SRLV form",
                ));
            }
        }
        Ok(())
    }

    fn code(&self) -> &[u8] {
        self.session.code()
    }

    fn into_executable(&self) -> Result<ExecutableBuffer> {
        self.session.into_executable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mov_immediate_is_lui_ori() {
        let mut c = Mips32Compiler::new();
        c.mov(Operand::Reg(0), Operand::Imm(0x1234_5678)).unwrap();
        assert_eq!(c.code().len(), 8);
        let lui = u32::from_le_bytes(c.code()[0..4].try_into().unwrap());
        assert_eq!(lui, crate::bits::mips_i(15, 0, gpr::T0, 0x1234));
    }

    #[test]
    fn ret_includes_delay_slot_nop() {
        let mut c = Mips32Compiler::new();
        c.ret().unwrap();
        assert_eq!(c.code().len(), 8);
        let jr = u32::from_le_bytes(c.code()[0..4].try_into().unwrap());
        assert_eq!(jr, crate::bits::mips_r(0, RA, 0, 0, 0, 8));
        assert_eq!(&c.code()[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn pow_unrolls_statically() {
        let mut c = Mips32Compiler::new();
        c.pow(Operand::Reg(0), Operand::Imm(3)).unwrap();
        // or scratch,d,zero (1 word) + 2 * (mult + mflo) for exponent 3.
        assert_eq!(c.code().len(), 4 + 2 * 2 * 4);
    }
}
