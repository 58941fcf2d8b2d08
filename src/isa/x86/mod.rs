//! The x86 / x86-64 architecture encoder.
//!
//! Operand dispatch is by operand-type tuple: since Rust has no overloading,
//! each `(mnemonic, operand shape)` pair gets its own method, named
//! `<mnemonic>_<shape>` the way `cranelift_assembler_x64::inst::andb_i`
//! names the AL-immediate form of `AND`. Immediates serialize little-endian;
//! 16-bit forms get a `66` operand-size override; 64-bit forms targeting
//! `RAX`..`RDI` get a `48` (REX.W) prefix, and forms targeting `R8`..`R15`
//! additionally set REX.B.

mod single_byte;

use crate::bits;
use crate::error::{MachCodeError, Result};
use crate::operand::{Imm16, Imm32, Imm64, Imm8, Width, X86Reg};
use crate::sink::ByteSink;

pub use single_byte::{SingleByte, SystemInstruction};

/// Encodes x86/x86-64 instructions into any [`ByteSink`].
///
/// Holds a non-owning reference to its sink: the sink must outlive the
/// emitter.
pub struct X86Emitter<'a, S: ByteSink> {
    sink: &'a mut S,
    initial_offset: usize,
}

impl<'a, S: ByteSink> X86Emitter<'a, S> {
    /// Bind an emitter to `sink`, capturing its current size as the base
    /// for [`offset`](Self::offset).
    pub fn new(sink: &'a mut S) -> Self {
        let initial_offset = sink.size();
        Self {
            sink,
            initial_offset,
        }
    }

    /// Bytes emitted by this emitter instance since construction (spec
    /// §4.3, §8 property 1).
    #[must_use]
    pub fn offset(&self) -> usize {
        self.sink.size() - self.initial_offset
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.append_bytes(bytes)
    }

    // ---- single-byte mnemonics & system instructions -------------------

    /// Emit the canonical byte sequence for a single-byte Intel GP
    /// mnemonic (`AAA`, `NOP`, `RET`, `CWDE`, ...).
    pub fn single_byte(&mut self, mnemonic: single_byte::SingleByte) -> Result<&mut Self> {
        self.emit(&[mnemonic.opcode()])?;
        Ok(self)
    }

    /// Emit the documented 1-3 byte sequence for a system instruction
    /// (`HLT`, `SYSCALL`, `RDMSR`, ...).
    pub fn system(&mut self, instr: SystemInstruction) -> Result<&mut Self> {
        self.emit(instr.bytes())?;
        Ok(self)
    }

    /// `NOP` — `90`.
    pub fn nop(&mut self) -> Result<&mut Self> {
        self.emit(&[0x90])?;
        Ok(self)
    }

    /// `RET` — `C3`.
    pub fn ret(&mut self) -> Result<&mut Self> {
        self.emit(&[0xC3])?;
        Ok(self)
    }

    /// `LEAVE` — `C9`.
    pub fn leave(&mut self) -> Result<&mut Self> {
        self.emit(&[0xC9])?;
        Ok(self)
    }

    // ---- add -------------------------------------------------------------

    /// `ADD AL, imm8` — `04 ib`.
    pub fn add_al_imm8(&mut self, imm: Imm8) -> Result<&mut Self> {
        self.emit(&[0x04, imm.as_unsigned()])?;
        Ok(self)
    }

    /// `ADD AX, imm16` — `66 05 iw`.
    pub fn add_ax_imm16(&mut self, imm: Imm16) -> Result<&mut Self> {
        self.emit(&[0x66, 0x05])?;
        self.emit(&imm.to_le_bytes())?;
        Ok(self)
    }

    /// `ADD EAX, imm32` — `05 id`.
    pub fn add_eax_imm32(&mut self, imm: Imm32) -> Result<&mut Self> {
        self.emit(&[0x05])?;
        self.emit(&imm.to_le_bytes())?;
        Ok(self)
    }

    /// `ADD RAX, imm64` — `48 05 id`; the 32-bit immediate is sign-extended
    /// to 64 bits by the processor.
    pub fn add_rax_imm64(&mut self, imm: Imm64) -> Result<&mut Self> {
        self.emit(&[0x48, 0x05])?;
        self.emit(&Imm32::from_signed(truncate_to_i32(imm)).to_le_bytes())?;
        Ok(self)
    }

    /// `ADD r/m{16,32,64}, r{16,32,64}` — `01 /r`, the register-register
    /// form used by the JIT façade's `add` pseudo-instruction.
    pub fn add_rm_r(&mut self, dst: X86Reg, src: X86Reg) -> Result<&mut Self> {
        self.two_reg_op(0x01, dst, src)
    }

    // ---- sub/and/or/xor/cmp: AL/eAX-imm and register-register forms ----

    /// `SUB AL, imm8` — `2C ib`.
    pub fn sub_al_imm8(&mut self, imm: Imm8) -> Result<&mut Self> {
        self.emit(&[0x2C, imm.as_unsigned()])?;
        Ok(self)
    }

    /// `SUB eAX, imm32` (or `RAX` with REX.W) — `(48) 2D id`.
    pub fn sub_eax_imm32(&mut self, imm: Imm32, w64: bool) -> Result<&mut Self> {
        self.rex_prefixed_eax_imm32(0x2D, imm, w64)
    }

    /// `SUB r/m, r` — `29 /r`.
    pub fn sub_rm_r(&mut self, dst: X86Reg, src: X86Reg) -> Result<&mut Self> {
        self.two_reg_op(0x29, dst, src)
    }

    /// `AND AL, imm8` — `24 ib`.
    pub fn and_al_imm8(&mut self, imm: Imm8) -> Result<&mut Self> {
        self.emit(&[0x24, imm.as_unsigned()])?;
        Ok(self)
    }

    /// `AND eAX, imm32` (or `RAX` with REX.W) — `(48) 25 id`.
    pub fn and_eax_imm32(&mut self, imm: Imm32, w64: bool) -> Result<&mut Self> {
        self.rex_prefixed_eax_imm32(0x25, imm, w64)
    }

    /// `AND r/m, r` — `21 /r`.
    pub fn and_rm_r(&mut self, dst: X86Reg, src: X86Reg) -> Result<&mut Self> {
        self.two_reg_op(0x21, dst, src)
    }

    /// `OR AL, imm8` — `0C ib`.
    pub fn or_al_imm8(&mut self, imm: Imm8) -> Result<&mut Self> {
        self.emit(&[0x0C, imm.as_unsigned()])?;
        Ok(self)
    }

    /// `OR eAX, imm32` (or `RAX` with REX.W) — `(48) 0D id`.
    pub fn or_eax_imm32(&mut self, imm: Imm32, w64: bool) -> Result<&mut Self> {
        self.rex_prefixed_eax_imm32(0x0D, imm, w64)
    }

    /// `OR r/m, r` — `09 /r`.
    pub fn or_rm_r(&mut self, dst: X86Reg, src: X86Reg) -> Result<&mut Self> {
        self.two_reg_op(0x09, dst, src)
    }

    /// `XOR AL, imm8` — `34 ib`.
    pub fn xor_al_imm8(&mut self, imm: Imm8) -> Result<&mut Self> {
        self.emit(&[0x34, imm.as_unsigned()])?;
        Ok(self)
    }

    /// `XOR eAX, imm32` (or `RAX` with REX.W) — `(48) 35 id`.
    pub fn xor_eax_imm32(&mut self, imm: Imm32, w64: bool) -> Result<&mut Self> {
        self.rex_prefixed_eax_imm32(0x35, imm, w64)
    }

    /// `XOR r/m, r` — `31 /r`. Also the idiom used to zero a register
    /// (`xor eax, eax`).
    pub fn xor_rm_r(&mut self, dst: X86Reg, src: X86Reg) -> Result<&mut Self> {
        self.two_reg_op(0x31, dst, src)
    }

    /// `CMP AL, imm8` — `3C ib`.
    pub fn cmp_al_imm8(&mut self, imm: Imm8) -> Result<&mut Self> {
        self.emit(&[0x3C, imm.as_unsigned()])?;
        Ok(self)
    }

    /// `CMP eAX, imm32` (or `RAX` with REX.W) — `(48) 3D id`.
    pub fn cmp_eax_imm32(&mut self, imm: Imm32, w64: bool) -> Result<&mut Self> {
        self.rex_prefixed_eax_imm32(0x3D, imm, w64)
    }

    /// `CMP r/m, r` — `39 /r`.
    pub fn cmp_rm_r(&mut self, lhs: X86Reg, rhs: X86Reg) -> Result<&mut Self> {
        self.two_reg_op(0x39, lhs, rhs)
    }

    /// `TEST r/m, r` — `85 /r`.
    pub fn test_rm_r(&mut self, lhs: X86Reg, rhs: X86Reg) -> Result<&mut Self> {
        self.two_reg_op(0x85, lhs, rhs)
    }

    // ---- mov -------------------------------------------------------------

    /// `MOV reg8, imm8` — `(B0+rb) ib`.
    pub fn mov_reg8_imm8(&mut self, reg: X86Reg, imm: Imm8) -> Result<&mut Self> {
        debug_assert_eq!(reg.width(), Width::Byte);
        if reg.is_extended() {
            self.emit(&[bits::rex(false, false, false, true)])?;
        }
        self.emit(&[0xB0 + reg.low3(), imm.as_unsigned()])?;
        Ok(self)
    }

    /// `MOV reg16, imm16` — `66 (B8+rw) iw`.
    pub fn mov_reg16_imm16(&mut self, reg: X86Reg, imm: Imm16) -> Result<&mut Self> {
        debug_assert_eq!(reg.width(), Width::Word);
        self.emit(&[0x66])?;
        if reg.is_extended() {
            self.emit(&[bits::rex(false, false, false, true)])?;
        }
        self.emit(&[0xB8 + reg.low3()])?;
        self.emit(&imm.to_le_bytes())?;
        Ok(self)
    }

    /// `MOV reg32, imm32` — `(B8+rd) id`.
    pub fn mov_reg32_imm32(&mut self, reg: X86Reg, imm: Imm32) -> Result<&mut Self> {
        debug_assert_eq!(reg.width(), Width::Dword);
        if reg.is_extended() {
            self.emit(&[bits::rex(false, false, false, true)])?;
        }
        self.emit(&[0xB8 + reg.low3()])?;
        self.emit(&imm.to_le_bytes())?;
        Ok(self)
    }

    /// `MOV reg64, imm64` — `48 (B8+rq) iq`.
    ///
    /// Spec §7 originally asserted `rq` must be in `0..7`; REX.B support for
    /// `R8`..`R15` is implemented here per §9 item 2, not left as a gap.
    pub fn mov_reg64_imm64(&mut self, reg: X86Reg, imm: Imm64) -> Result<&mut Self> {
        debug_assert_eq!(reg.width(), Width::Qword);
        self.emit(&[bits::rex(true, false, false, reg.is_extended())])?;
        self.emit(&[0xB8 + reg.low3()])?;
        self.emit(&imm.to_le_bytes())?;
        Ok(self)
    }

    /// `MOV RBP, RSP` — `48 89 E5`. Kept as a named special case;
    /// equivalent to, but not routed through,
    /// [`mov_reg64_reg64`](Self::mov_reg64_reg64).
    pub fn mov_rbp_rsp(&mut self) -> Result<&mut Self> {
        self.emit(&[0x48, 0x89, 0xE5])?;
        Ok(self)
    }

    /// `MOV reg64, reg64` — `48 89 /r` (general register-register form).
    pub fn mov_reg64_reg64(&mut self, dst: X86Reg, src: X86Reg) -> Result<&mut Self> {
        self.two_reg_op(0x89, dst, src)
    }

    // ---- stack ops ---------------------------------------------------

    /// `PUSH reg{16,32,64}` — `50+reg`.
    pub fn push(&mut self, reg: X86Reg) -> Result<&mut Self> {
        if reg.width() == Width::Word {
            self.emit(&[0x66])?;
        }
        if reg.is_extended() {
            self.emit(&[bits::rex(false, false, false, true)])?;
        }
        self.emit(&[0x50 + reg.low3()])?;
        Ok(self)
    }

    /// `POP reg{16,32,64}` — `58+reg`.
    pub fn pop(&mut self, reg: X86Reg) -> Result<&mut Self> {
        if reg.width() == Width::Word {
            self.emit(&[0x66])?;
        }
        if reg.is_extended() {
            self.emit(&[bits::rex(false, false, false, true)])?;
        }
        self.emit(&[0x58 + reg.low3()])?;
        Ok(self)
    }

    // ---- inc/dec/neg/not (F6/F7/FE/FF group) --------------------------

    /// `INC r/m{32,64}` — `(48) FF /0`.
    pub fn inc(&mut self, reg: X86Reg) -> Result<&mut Self> {
        self.group_ff(0, reg)
    }

    /// `DEC r/m{32,64}` — `(48) FF /1`.
    pub fn dec(&mut self, reg: X86Reg) -> Result<&mut Self> {
        self.group_ff(1, reg)
    }

    /// `NOT r/m{32,64}` — `(48) F7 /2`.
    pub fn not(&mut self, reg: X86Reg) -> Result<&mut Self> {
        self.group_f7(2, reg)
    }

    /// `NEG r/m{32,64}` — `(48) F7 /3`.
    pub fn neg(&mut self, reg: X86Reg) -> Result<&mut Self> {
        self.group_f7(3, reg)
    }

    /// `DIV r/m{32,64}` (unsigned; dividend in `(E)DX:(E)AX`) — `(48) F7
    /// /6`.
    pub fn div(&mut self, reg: X86Reg) -> Result<&mut Self> {
        self.group_f7(6, reg)
    }

    /// `IDIV r/m{32,64}` (signed) — `(48) F7 /7`.
    pub fn idiv(&mut self, reg: X86Reg) -> Result<&mut Self> {
        self.group_f7(7, reg)
    }

    /// `IMUL r{32,64}, r/m{32,64}` — `(48) 0F AF /r`.
    pub fn imul_r_rm(&mut self, dst: X86Reg, src: X86Reg) -> Result<&mut Self> {
        let w64 = dst.width() == Width::Qword;
        if w64 {
            self.emit(&[bits::rex(true, dst.is_extended(), false, src.is_extended())])?;
        } else if dst.is_extended() || src.is_extended() {
            self.emit(&[bits::rex(
                false,
                dst.is_extended(),
                false,
                src.is_extended(),
            )])?;
        }
        self.emit(&[0x0F, 0xAF])?;
        self.emit(&[bits::modrm(0b11, dst.low3(), src.low3())])?;
        Ok(self)
    }

    /// `LZCNT r{32,64}, r/m{32,64}` (count leading zeros) — `F3 (48) 0F BD
    /// /r`.
    pub fn lzcnt_r_rm(&mut self, dst: X86Reg, src: X86Reg) -> Result<&mut Self> {
        let w64 = dst.width() == Width::Qword;
        self.emit(&[0xF3])?;
        if w64 || dst.is_extended() || src.is_extended() {
            self.emit(&[bits::rex(w64, dst.is_extended(), false, src.is_extended())])?;
        }
        self.emit(&[0x0F, 0xBD])?;
        self.emit(&[bits::modrm(0b11, dst.low3(), src.low3())])?;
        Ok(self)
    }

    // ---- shifts (C1 /4, /5 group) --------------------------------------

    /// `SHL r/m{32,64}, imm8` — `(48) C1 /4 ib`.
    pub fn shl_imm8(&mut self, reg: X86Reg, imm: Imm8) -> Result<&mut Self> {
        self.group_c1(4, reg, imm)
    }

    /// `SHR r/m{32,64}, imm8` — `(48) C1 /5 ib`.
    pub fn shr_imm8(&mut self, reg: X86Reg, imm: Imm8) -> Result<&mut Self> {
        self.group_c1(5, reg, imm)
    }

    /// `SHL r/m{32,64}, CL` — `(48) D3 /4`.
    pub fn shl_cl(&mut self, reg: X86Reg) -> Result<&mut Self> {
        self.group_d3(4, reg)
    }

    /// `SHR r/m{32,64}, CL` — `(48) D3 /5`.
    pub fn shr_cl(&mut self, reg: X86Reg) -> Result<&mut Self> {
        self.group_d3(5, reg)
    }

    // ---- control flow ----------------------------------------------------

    /// `JMP rel8` — `EB cb`. `rel8` is relative to the byte after this
    /// instruction.
    pub fn jmp_rel8(&mut self, rel8: i8) -> Result<&mut Self> {
        #[allow(clippy::cast_sign_loss)]
        self.emit(&[0xEB, rel8 as u8])?;
        Ok(self)
    }

    /// `JMP rel32` — `E9 cd`.
    pub fn jmp_rel32(&mut self, rel32: i32) -> Result<&mut Self> {
        self.emit(&[0xE9])?;
        #[allow(clippy::cast_sign_loss)]
        self.emit(&bits::le32(rel32 as u32))?;
        Ok(self)
    }

    /// `CALL rel32` — `E8 cd`.
    pub fn call_rel32(&mut self, rel32: i32) -> Result<&mut Self> {
        self.emit(&[0xE8])?;
        #[allow(clippy::cast_sign_loss)]
        self.emit(&bits::le32(rel32 as u32))?;
        Ok(self)
    }

    /// `Jcc rel8` — `(70+cc) cb`. `cc` is the 4-bit x86 condition code
    /// (distinct from the ARM [`Condition`](crate::operand::Condition) set).
    pub fn jcc_rel8(&mut self, cc: u8, rel8: i8) -> Result<&mut Self> {
        debug_assert!(cc < 16);
        #[allow(clippy::cast_sign_loss)]
        self.emit(&[0x70 + cc, rel8 as u8])?;
        Ok(self)
    }

    /// `Jcc rel32` — `0F (80+cc) cd`.
    pub fn jcc_rel32(&mut self, cc: u8, rel32: i32) -> Result<&mut Self> {
        debug_assert!(cc < 16);
        self.emit(&[0x0F, 0x80 + cc])?;
        #[allow(clippy::cast_sign_loss)]
        self.emit(&bits::le32(rel32 as u32))?;
        Ok(self)
    }

    // ---- shared helpers -------------------------------------------------

    fn rex_prefixed_eax_imm32(&mut self, opcode: u8, imm: Imm32, w64: bool) -> Result<&mut Self> {
        if w64 {
            self.emit(&[bits::rex(true, false, false, false)])?;
        }
        self.emit(&[opcode])?;
        self.emit(&imm.to_le_bytes())?;
        Ok(self)
    }

    fn two_reg_op(&mut self, opcode: u8, rm: X86Reg, reg: X86Reg) -> Result<&mut Self> {
        if rm.width() != reg.width() {
            return Err(MachCodeError::InvalidArgument(
                "two-register x86 form requires matching operand widths".into(),
            ));
        }
        let w64 = rm.width() == Width::Qword;
        if rm.width() == Width::Word {
            self.emit(&[0x66])?;
        }
        let need_rex = w64 || rm.is_extended() || reg.is_extended();
        if need_rex {
            self.emit(&[bits::rex(w64, reg.is_extended(), false, rm.is_extended())])?;
        }
        self.emit(&[opcode])?;
        self.emit(&[bits::modrm(0b11, reg.low3(), rm.low3())])?;
        Ok(self)
    }

    fn group_ff(&mut self, digit: u8, reg: X86Reg) -> Result<&mut Self> {
        let w64 = reg.width() == Width::Qword;
        if w64 || reg.is_extended() {
            self.emit(&[bits::rex(w64, false, false, reg.is_extended())])?;
        }
        self.emit(&[0xFF, bits::modrm(0b11, digit, reg.low3())])?;
        Ok(self)
    }

    fn group_f7(&mut self, digit: u8, reg: X86Reg) -> Result<&mut Self> {
        let w64 = reg.width() == Width::Qword;
        if w64 || reg.is_extended() {
            self.emit(&[bits::rex(w64, false, false, reg.is_extended())])?;
        }
        self.emit(&[0xF7, bits::modrm(0b11, digit, reg.low3())])?;
        Ok(self)
    }

    fn group_c1(&mut self, digit: u8, reg: X86Reg, imm: Imm8) -> Result<&mut Self> {
        let w64 = reg.width() == Width::Qword;
        if w64 || reg.is_extended() {
            self.emit(&[bits::rex(w64, false, false, reg.is_extended())])?;
        }
        self.emit(&[0xC1, bits::modrm(0b11, digit, reg.low3()), imm.as_unsigned()])?;
        Ok(self)
    }

    fn group_d3(&mut self, digit: u8, reg: X86Reg) -> Result<&mut Self> {
        let w64 = reg.width() == Width::Qword;
        if w64 || reg.is_extended() {
            self.emit(&[bits::rex(w64, false, false, reg.is_extended())])?;
        }
        self.emit(&[0xD3, bits::modrm(0b11, digit, reg.low3())])?;
        Ok(self)
    }
}

/// Truncate a 64-bit immediate to the low 32 bits, as the processor would
/// when sign-extending a 32-bit immediate back out to 64 bits.
fn truncate_to_i32(imm: Imm64) -> i32 {
    #[allow(clippy::cast_possible_truncation)]
    let low = imm.as_unsigned() as u32;
    #[allow(clippy::cast_possible_wrap)]
    {
        low as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::gpr64::*;
    use crate::sink::AppendableBuffer;

    #[test]
    fn s1_add_constants() {
        let mut buf = AppendableBuffer::new();
        let mut e = X86Emitter::new(&mut buf);
        e.add_al_imm8(Imm8::new(0x12)).unwrap();
        e.add_ax_imm16(Imm16::new(0x1234)).unwrap();
        e.add_eax_imm32(Imm32::new(0x1234_5678)).unwrap();
        e.add_rax_imm64(Imm64::new(0x1234_5678)).unwrap();
        assert_eq!(
            buf.data(),
            &[
                0x04, 0x12, 0x66, 0x05, 0x34, 0x12, 0x05, 0x78, 0x56, 0x34, 0x12, 0x48, 0x05,
                0x78, 0x56, 0x34, 0x12,
            ]
        );
        assert_eq!(e.offset(), buf.data().len());
    }

    #[test]
    fn s2_prolog_epilog() {
        let mut buf = AppendableBuffer::new();
        let mut e = X86Emitter::new(&mut buf);
        e.push(RBP).unwrap();
        e.mov_rbp_rsp().unwrap();
        e.mov_reg64_imm64(RAX, Imm64::new(0)).unwrap();
        e.ret().unwrap();
        assert_eq!(
            buf.data(),
            &[
                0x55, 0x48, 0x89, 0xE5, 0x48, 0xB8, 0, 0, 0, 0, 0, 0, 0, 0, 0xC3
            ]
        );
    }

    #[test]
    fn mov_reg8_and_reg16_imm_forms() {
        use crate::operand::{gpr16, gpr8};
        let mut buf = AppendableBuffer::new();
        let mut e = X86Emitter::new(&mut buf);
        e.mov_reg8_imm8(gpr8::AL, Imm8::new(0x7F)).unwrap();
        e.mov_reg16_imm16(gpr16::AX, Imm16::new(0x00FF)).unwrap();
        assert_eq!(
            buf.data(),
            &[0xB0, 0x7F, 0x66, 0xB8, 0xFF, 0x00]
        );
    }

    #[test]
    fn mov_reg64_imm64_sets_rex_b_for_extended_registers() {
        let mut buf = AppendableBuffer::new();
        let mut e = X86Emitter::new(&mut buf);
        e.mov_reg64_imm64(R8, Imm64::new(1)).unwrap();
        assert_eq!(buf.data()[0], 0x49); // REX.W | REX.B
        assert_eq!(buf.data()[1], 0xB8); // low3(R8) == 0
    }
}
