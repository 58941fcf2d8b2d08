//! The AArch64 concrete JIT compiler.

use super::{JitCompiler, Operand, Session};
use crate::error::{MachCodeError, Result};
use crate::isa::arm64::Arm64Emitter;
use crate::sink::ExecutableBuffer;

/// The internal scratch register (`X7`), used to materialize an immediate
/// operand for instructions that only take register operands (see the
/// [`crate::jit`] module docs).
const SCRATCH: u8 = 7;

/// Frame pointer (`X29`) and link register (`X30`), used by `enter`/`leave`.
const FP: u8 = 29;
const LR: u8 = 30;
const SP: u8 = 31;

fn reg(index: u8) -> Result<u8> {
    if index < super::GPR_COUNT {
        Ok(index)
    } else {
        Err(MachCodeError::InvalidArgument(format!(
            "pseudo-register index {index} out of range"
        )))
    }
}

/// Wraps an [`Arm64Emitter`] over an owned buffer and implements the
/// target-independent pseudo-instruction set. `enter`/`leave` save and
/// restore `X29`/`X30` the way the x86-64 compiler saves/restores `RBP`,
/// using `STP`/`LDP` pre/post-indexed on the stack pointer.
pub struct Arm64Compiler {
    session: Session,
}

impl Arm64Compiler {
    /// Start a fresh emission session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: Session::new(),
        }
    }

    fn emitter(&mut self) -> Arm64Emitter<'_, crate::sink::AppendableBuffer> {
        Arm64Emitter::new(&mut self.session.buffer)
    }

    fn load_imm(&mut self, rd: u8, value: i64) -> Result<()> {
        #[allow(clippy::cast_sign_loss)]
        let bits = value as u64;
        self.emitter().movz(rd, (bits & 0xFFFF) as u16, 0)?;
        for hw in 1..4u8 {
            let chunk = ((bits >> (16 * u32::from(hw))) & 0xFFFF) as u16;
            if chunk != 0 {
                self.emitter().movk(rd, chunk, hw)?;
            }
        }
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

impl Default for Arm64Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl JitCompiler for Arm64Compiler {
    fn enter(&mut self) -> Result<()> {
        self.emitter().stp_pre(FP, LR, SP, -16)?;
        self.emitter().add_imm(FP, SP, 0)?;
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        self.emitter().ldp_post(FP, LR, SP, 16)?;
        Ok(())
    }

    fn ret(&mut self) -> Result<()> {
        self.emitter().ret(LR)?;
        Ok(())
    }

    fn jmp(&mut self, rel_words: i32) -> Result<()> {
        self.emitter().b(rel_words)?;
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
                self.emitter().mov_reg(d, s)?;
            }
            Operand::Imm(value) => {
                self.load_imm(d, value)?;
            }
        }
        Ok(())
    }

    fn add(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().add_reg(d, d, s)?;
        Ok(())
    }

    fn sub(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().sub_reg(d, d, s)?;
        Ok(())
    }

    fn mul(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().mul(d, d, s)?;
        Ok(())
    }

    fn div(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().sdiv(d, d, s)?;
        Ok(())
    }

    fn rem(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        // rem = dst - (dst / src) * src, via MSUB with SDIV's quotient in scratch.
        self.emitter().sdiv(SCRATCH, d, s)?;
        self.emitter().msub(d, SCRATCH, s, d)?;
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
        self.emitter().mov_reg(SCRATCH, d)?;
        for _ in 1..exponent {
            self.emitter().mul(d, d, SCRATCH)?;
        }
        Ok(())
    }

    fn neg(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        self.emitter().sub_reg(d, 31, d)?;
        Ok(())
    }

    fn abs(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        // subs xzr, d, xzr; b.ge +2 (skip the neg); sub d, xzr, d
        self.emitter().subs_reg(31, d, 31)?;
        self.emitter()
            .b_cond(crate::operand::Condition::Ge, 2)?;
        self.emitter().sub_reg(d, 31, d)?;
        Ok(())
    }

    fn inc(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        self.emitter().add_imm(d, d, 1)?;
        Ok(())
    }

    fn dec(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        self.emitter().sub_imm(d, d, 1)?;
        Ok(())
    }

    fn and(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().and_reg(d, d, s)?;
        Ok(())
    }

    fn or(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().orr_reg(d, d, s)?;
        Ok(())
    }

    fn xor(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().eor_reg(d, d, s)?;
        Ok(())
    }

    fn nand(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().and_reg(d, d, s)?;
        self.emitter().mvn(d, d)?;
        Ok(())
    }

    fn nor(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().orr_reg(d, d, s)?;
        self.emitter().mvn(d, d)?;
        Ok(())
    }

    fn not(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        self.emitter().mvn(d, d)?;
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
        self.emitter().subs_reg(31, l, r)?;
        Ok(())
    }

    fn shl(&mut self, dst: Operand, amount: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(amount)?;
        self.emitter().lslv(d, d, s)?;
        Ok(())
    }

    fn shr(&mut self, dst: Operand, amount: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(amount)?;
        self.emitter().lsrv(d, d, s)?;
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
    fn enter_emits_stp_and_frame_setup() {
        let mut c = Arm64Compiler::new();
        c.enter().unwrap();
        assert_eq!(c.code().len(), 8);
    }

    #[test]
    fn mov_immediate_round_trips_low_chunk() {
        let mut c = Arm64Compiler::new();
        c.mov(Operand::Reg(0), Operand::Imm(42)).unwrap();
        let word = u32::from_le_bytes(c.code()[0..4].try_into().unwrap());
        assert_eq!(word, 0xD280_0000 | (42 << 5));
    }

    #[test]
    fn pow_unrolls_statically() {
        let mut c = Arm64Compiler::new();
        c.pow(Operand::Reg(0), Operand::Imm(3)).unwrap();
        // mov scratch,d (1 word) + 2 mul words for exponent 3.
        assert_eq!(c.code().len(), 12);
    }
}
