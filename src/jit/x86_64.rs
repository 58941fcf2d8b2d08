//! The x86-64 concrete JIT compiler.

use super::{JitCompiler, Operand, Session};
use crate::error::{MachCodeError, Result};
use crate::isa::x86::{SingleByte, X86Emitter};
use crate::operand::{gpr64, Imm64, Imm8, X86Reg};
use crate::sink::ExecutableBuffer;

/// Wraps an [`X86Emitter`] over an owned [`AppendableBuffer`](crate::sink::AppendableBuffer)
/// and implements the target-independent pseudo-instruction set (spec
/// §4.4): `enter` = `push rbp; mov rbp, rsp`, `leave` = `pop rbp`, `ret` =
/// `ret`, `nop` = `nop`, matching the curated definitions verbatim.
pub struct X86_64Compiler {
    session: Session,
}

/// The internal scratch register (index 7 → `R9`), used to materialize an
/// immediate operand when an instruction has no `reg, imm` form (see the
/// [`crate::jit`] module docs).
const SCRATCH: u8 = 7;

fn reg64(index: u8) -> X86Reg {
    const TABLE: [X86Reg; 8] = [
        gpr64::RAX,
        gpr64::RCX,
        gpr64::RDX,
        gpr64::RBX,
        gpr64::RSI,
        gpr64::RDI,
        gpr64::R8,
        gpr64::R9,
    ];
    TABLE[index as usize]
}

impl X86_64Compiler {
    /// Start a fresh emission session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: Session::new(),
        }
    }

    fn emitter(&mut self) -> X86Emitter<'_, crate::sink::AppendableBuffer> {
        X86Emitter::new(&mut self.session.buffer)
    }

    /// Resolve `operand` to a concrete register, materializing an immediate
    /// into [`SCRATCH`] first if needed.
    fn resolve(&mut self, operand: Operand) -> Result<X86Reg> {
        match operand {
            Operand::Reg(_) => Ok(reg64(operand.reg()?)),
            Operand::Imm(value) => {
                self.emitter()
                    .mov_reg64_imm64(reg64(SCRATCH), Imm64::new(value as u64))?;
                Ok(reg64(SCRATCH))
            }
        }
    }

    fn dst_reg(dst: Operand) -> Result<X86Reg> {
        dst.reg().map(reg64)
    }
}

impl Default for X86_64Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl JitCompiler for X86_64Compiler {
    fn enter(&mut self) -> Result<()> {
        self.emitter().push(gpr64::RBP)?;
        self.emitter().mov_rbp_rsp()?;
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        self.emitter().pop(gpr64::RBP)?;
        Ok(())
    }

    fn ret(&mut self) -> Result<()> {
        self.emitter().ret()?;
        Ok(())
    }

    fn jmp(&mut self, rel: i32) -> Result<()> {
        if let Ok(rel8) = i8::try_from(rel) {
            self.emitter().jmp_rel8(rel8)?;
        } else {
            self.emitter().jmp_rel32(rel)?;
        }
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
                self.emitter().mov_reg64_reg64(d, s)?;
            }
            Operand::Imm(value) => {
                self.emitter()
                    .mov_reg64_imm64(d, Imm64::new(value as u64))?;
            }
        }
        Ok(())
    }

    fn add(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().add_rm_r(d, s)?;
        Ok(())
    }

    fn sub(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().sub_rm_r(d, s)?;
        Ok(())
    }

    fn mul(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().imul_r_rm(d, s)?;
        Ok(())
    }

    fn div(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        // Signed division: dividend in RDX:RAX, quotient back out of RAX.
        self.emitter().mov_reg64_reg64(gpr64::RAX, d)?;
        self.emitter()
            .single_byte(SingleByte::Cqo)?;
        self.emitter().idiv(s)?;
        self.emitter().mov_reg64_reg64(d, gpr64::RAX)?;
        Ok(())
    }

    fn rem(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().mov_reg64_reg64(gpr64::RAX, d)?;
        self.emitter()
            .single_byte(SingleByte::Cqo)?;
        self.emitter().idiv(s)?;
        self.emitter().mov_reg64_reg64(d, gpr64::RDX)?;
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
            self.emitter()
                .mov_reg64_imm64(d, Imm64::new(1))?;
            return Ok(());
        }
        // d holds the base; square-and-multiply is overkill for the
        // emission-time unroll this façade supports, so multiply straight
        // through (exponent-1) times against a fixed copy of the base.
        self.emitter().mov_reg64_reg64(reg64(SCRATCH), d)?;
        for _ in 1..exponent {
            self.emitter().imul_r_rm(d, reg64(SCRATCH))?;
        }
        Ok(())
    }

    fn neg(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        self.emitter().neg(d)?;
        Ok(())
    }

    fn abs(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        // xor scratch, scratch; cmp dst, scratch; jge +3 (over the neg); neg dst
        self.emitter().xor_rm_r(reg64(SCRATCH), reg64(SCRATCH))?;
        self.emitter().cmp_rm_r(d, reg64(SCRATCH))?;
        self.emitter().jcc_rel8(0xD, 3)?; // JGE rel8, skip the neg (3 bytes: REX+opcode+modrm)
        self.emitter().neg(d)?;
        Ok(())
    }

    fn inc(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        self.emitter().inc(d)?;
        Ok(())
    }

    fn dec(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        self.emitter().dec(d)?;
        Ok(())
    }

    fn and(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().and_rm_r(d, s)?;
        Ok(())
    }

    fn or(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().or_rm_r(d, s)?;
        Ok(())
    }

    fn xor(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().xor_rm_r(d, s)?;
        Ok(())
    }

    fn nand(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().and_rm_r(d, s)?;
        self.emitter().not(d)?;
        Ok(())
    }

    fn nor(&mut self, dst: Operand, src: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        let s = self.resolve(src)?;
        self.emitter().or_rm_r(d, s)?;
        self.emitter().not(d)?;
        Ok(())
    }

    fn not(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        self.emitter().not(d)?;
        Ok(())
    }

    fn clz(&mut self, dst: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        self.emitter().lzcnt_r_rm(d, d)?;
        Ok(())
    }

    fn cmp(&mut self, lhs: Operand, rhs: Operand) -> Result<()> {
        let l = Self::dst_reg(lhs)?;
        let r = self.resolve(rhs)?;
        self.emitter().cmp_rm_r(l, r)?;
        Ok(())
    }

    fn shl(&mut self, dst: Operand, amount: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        match amount {
            Operand::Imm(n) => {
                self.emitter().shl_imm8(d, Imm8::new(n as u8))?;
            }
            Operand::Reg(_) => {
                let s = self.resolve(amount)?;
                self.emitter().mov_reg64_reg64(gpr64::RCX, s)?;
                self.emitter().shl_cl(d)?;
            }
        }
        Ok(())
    }

    fn shr(&mut self, dst: Operand, amount: Operand) -> Result<()> {
        let d = Self::dst_reg(dst)?;
        match amount {
            Operand::Imm(n) => {
                self.emitter().shr_imm8(d, Imm8::new(n as u8))?;
            }
            Operand::Reg(_) => {
                let s = self.resolve(amount)?;
                self.emitter().mov_reg64_reg64(gpr64::RCX, s)?;
                self.emitter().shr_cl(d)?;
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
    fn s3_jit_calc_execution() {
        let mut c = X86_64Compiler::new();
        c.enter().unwrap();
        c.mov(Operand::Reg(0), Operand::Imm(0)).unwrap();
        for k in [3, 4, 5] {
            c.add(Operand::Reg(0), Operand::Imm(k)).unwrap();
        }
        c.leave().unwrap();
        c.ret().unwrap();
        let exe = c.into_executable().unwrap();
        let result: i64 = unsafe { exe.execute() };
        assert_eq!(result, 12);
    }

    #[test]
    fn enter_leave_match_curated_bytes() {
        let mut c = X86_64Compiler::new();
        c.enter().unwrap();
        assert_eq!(&c.code()[..4], &[0x55, 0x48, 0x89, 0xE5]);
    }
}
