//! The MIPS32 architecture encoder.
//!
//! Sparser than the x86 and ARM A64 encoders by design. Every instruction is
//! a single 32-bit word packed from one of three bitfield layouts (R/I/J);
//! the three packing primitives live in [`crate::bits`] and are shared with
//! nothing else, since MIPS is the only architecture here with this layout
//! shape.
//!
//! Mnemonic methods return the number of bytes emitted (always 4), rather
//! than the `Result<&mut Self>` chaining style used by the x86 and ARM A64
//! encoders — this convention mirrors a byte-count return distinct from the
//! other two encoders' fluent chaining.

use crate::bits;
use crate::error::Result;
use crate::sink::ByteSink;

/// Encodes MIPS32 instructions into any [`ByteSink`].
pub struct Mips32Emitter<'a, S: ByteSink> {
    sink: &'a mut S,
    initial_offset: usize,
}

impl<'a, S: ByteSink> Mips32Emitter<'a, S> {
    /// Bind an emitter to `sink`.
    pub fn new(sink: &'a mut S) -> Self {
        let initial_offset = sink.size();
        Self {
            sink,
            initial_offset,
        }
    }

    /// Bytes emitted by this emitter instance since construction.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.sink.size() - self.initial_offset
    }

    /// Emit a raw R-format word: `op(6) | rs(5) | rt(5) | rd(5) | shamt(5) |
    /// funct(6)`. Returns the byte count on success (always 4 here).
    pub fn encode_r(&mut self, op: u8, rs: u8, rt: u8, rd: u8, shamt: u8, funct: u8) -> Result<usize> {
        self.emit(bits::mips_r(op, rs, rt, rd, shamt, funct))
    }

    /// Emit a raw I-format word: `op(6) | rs(5) | rt(5) | imm(16)`.
    pub fn encode_i(&mut self, op: u8, rs: u8, rt: u8, imm: u16) -> Result<usize> {
        self.emit(bits::mips_i(op, rs, rt, imm))
    }

    /// Emit a raw J-format word: `op(6) | addr(26)`.
    pub fn encode_j(&mut self, op: u8, addr: u32) -> Result<usize> {
        self.emit(bits::mips_j(op, addr))
    }

    fn emit(&mut self, word: u32) -> Result<usize> {
        self.sink.append_bytes(&bits::le32(word))?;
        Ok(4)
    }

    // ---- curated mnemonics -------------------------------------------

    /// `NOP` — `R(0,0,0,0,0,0)`, the all-zero word (`SLL $zero, $zero, 0`).
    pub fn nop(&mut self) -> Result<usize> {
        self.encode_r(0, 0, 0, 0, 0, 0)
    }

    /// `ADD rd, rs, rt` — `R(0, rs, rt, rd, 0, 32)`.
    pub fn add(&mut self, rd: u8, rs: u8, rt: u8) -> Result<usize> {
        self.encode_r(0, rs, rt, rd, 0, 32)
    }

    /// `ADDI rt, rs, imm` — `I(8, rs, rt, imm)`.
    pub fn addi(&mut self, rt: u8, rs: u8, imm: u16) -> Result<usize> {
        self.encode_i(8, rs, rt, imm)
    }

    /// `J target` — `J(2, target)`. `target` is the word-aligned jump target
    /// shifted right by 2, per the MIPS jump-target encoding.
    pub fn j(&mut self, target: u32) -> Result<usize> {
        self.encode_j(2, target)
    }

    /// `JAL target` — `J(3, target)`.
    pub fn jal(&mut self, target: u32) -> Result<usize> {
        self.encode_j(3, target)
    }

    // ---- additions needed by the JIT façade ---------------------------

    /// `SUB rd, rs, rt` — `R(0, rs, rt, rd, 0, 34)`.
    pub fn sub(&mut self, rd: u8, rs: u8, rt: u8) -> Result<usize> {
        self.encode_r(0, rs, rt, rd, 0, 34)
    }

    /// `AND rd, rs, rt` — `R(0, rs, rt, rd, 0, 36)`.
    pub fn and(&mut self, rd: u8, rs: u8, rt: u8) -> Result<usize> {
        self.encode_r(0, rs, rt, rd, 0, 36)
    }

    /// `OR rd, rs, rt` — `R(0, rs, rt, rd, 0, 37)`.
    pub fn or(&mut self, rd: u8, rs: u8, rt: u8) -> Result<usize> {
        self.encode_r(0, rs, rt, rd, 0, 37)
    }

    /// `XOR rd, rs, rt` — `R(0, rs, rt, rd, 0, 38)`.
    pub fn xor(&mut self, rd: u8, rs: u8, rt: u8) -> Result<usize> {
        self.encode_r(0, rs, rt, rd, 0, 38)
    }

    /// `NOR rd, rs, rt` — `R(0, rs, rt, rd, 0, 39)`.
    pub fn nor(&mut self, rd: u8, rs: u8, rt: u8) -> Result<usize> {
        self.encode_r(0, rs, rt, rd, 0, 39)
    }

    /// `ANDI rt, rs, imm` — `I(12, rs, rt, imm)`.
    pub fn andi(&mut self, rt: u8, rs: u8, imm: u16) -> Result<usize> {
        self.encode_i(12, rs, rt, imm)
    }

    /// `ORI rt, rs, imm` — `I(13, rs, rt, imm)`.
    pub fn ori(&mut self, rt: u8, rs: u8, imm: u16) -> Result<usize> {
        self.encode_i(13, rs, rt, imm)
    }

    /// `XORI rt, rs, imm` — `I(14, rs, rt, imm)`.
    pub fn xori(&mut self, rt: u8, rs: u8, imm: u16) -> Result<usize> {
        self.encode_i(14, rs, rt, imm)
    }

    /// `LUI rt, imm` — `I(15, 0, rt, imm)`, loads `imm` into the upper 16
    /// bits of `rt`.
    pub fn lui(&mut self, rt: u8, imm: u16) -> Result<usize> {
        self.encode_i(15, 0, rt, imm)
    }

    /// `BEQ rs, rt, offset` — `I(4, rs, rt, offset)`; `offset` is the
    /// word-granularity branch displacement.
    pub fn beq(&mut self, rs: u8, rt: u8, offset: u16) -> Result<usize> {
        self.encode_i(4, rs, rt, offset)
    }

    /// `BNE rs, rt, offset` — `I(5, rs, rt, offset)`.
    pub fn bne(&mut self, rs: u8, rt: u8, offset: u16) -> Result<usize> {
        self.encode_i(5, rs, rt, offset)
    }

    /// `BGEZ rs, offset` (branch if `rs >= 0`) — REGIMM `I(1, rs, 1,
    /// offset)`.
    pub fn bgez(&mut self, rs: u8, offset: u16) -> Result<usize> {
        self.encode_i(1, rs, 1, offset)
    }

    /// `JR rs` — `R(0, rs, 0, 0, 0, 8)`; used as `ret` (`jr $ra`) by the JIT
    /// façade.
    pub fn jr(&mut self, rs: u8) -> Result<usize> {
        self.encode_r(0, rs, 0, 0, 0, 8)
    }

    /// `JALR rd, rs` — `R(0, rs, 0, rd, 0, 9)`.
    pub fn jalr(&mut self, rd: u8, rs: u8) -> Result<usize> {
        self.encode_r(0, rs, 0, rd, 0, 9)
    }

    /// `SLL rd, rt, shamt` — `R(0, 0, rt, rd, shamt, 0)`.
    pub fn sll(&mut self, rd: u8, rt: u8, shamt: u8) -> Result<usize> {
        self.encode_r(0, 0, rt, rd, shamt, 0)
    }

    /// `SRL rd, rt, shamt` — `R(0, 0, rt, rd, shamt, 2)`.
    pub fn srl(&mut self, rd: u8, rt: u8, shamt: u8) -> Result<usize> {
        self.encode_r(0, 0, rt, rd, shamt, 2)
    }

    /// `SLT rd, rs, rt` — `R(0, rs, rt, rd, 0, 42)`, sets `rd` to `1` if
    /// `rs < rt` (signed), else `0`.
    pub fn slt(&mut self, rd: u8, rs: u8, rt: u8) -> Result<usize> {
        self.encode_r(0, rs, rt, rd, 0, 42)
    }

    /// `SLTI rt, rs, imm` — `I(10, rs, rt, imm)`.
    pub fn slti(&mut self, rt: u8, rs: u8, imm: u16) -> Result<usize> {
        self.encode_i(10, rs, rt, imm)
    }

    /// `MULT rs, rt` — `R(0, rs, rt, 0, 0, 24)`; the 64-bit product lands in
    /// the `HI`/`LO` special registers, read out with [`mflo`]/[`mfhi`].
    pub fn mult(&mut self, rs: u8, rt: u8) -> Result<usize> {
        self.encode_r(0, rs, rt, 0, 0, 24)
    }

    /// `DIV rs, rt` — `R(0, rs, rt, 0, 0, 26)`; quotient in `LO`, remainder
    /// in `HI`.
    pub fn div(&mut self, rs: u8, rt: u8) -> Result<usize> {
        self.encode_r(0, rs, rt, 0, 0, 26)
    }

    /// `MFLO rd` — `R(0, 0, 0, rd, 0, 18)`.
    pub fn mflo(&mut self, rd: u8) -> Result<usize> {
        self.encode_r(0, 0, 0, rd, 0, 18)
    }

    /// `MFHI rd` — `R(0, 0, 0, rd, 0, 16)`.
    pub fn mfhi(&mut self, rd: u8) -> Result<usize> {
        self.encode_r(0, 0, 0, rd, 0, 16)
    }

    /// `CLZ rd, rs` (count leading zeros) — SPECIAL2 `op=0x1C`, with `rt`
    /// reusing the `rd` field per the MIPS32 encoding of this instruction:
    /// `28(rs)(rd)(rd)(0)(32)`.
    pub fn clz(&mut self, rd: u8, rs: u8) -> Result<usize> {
        self.encode_r(0x1C, rs, rd, rd, 0, 0x20)
    }
}

/// Canonical MIPS32 general-purpose register numbers, `$zero`=0 through
/// `$ra`=31.
pub mod gpr {
    #![allow(missing_docs, clippy::unreadable_literal)]
    pub const ZERO: u8 = 0;
    pub const AT: u8 = 1;
    pub const V0: u8 = 2;
    pub const V1: u8 = 3;
    pub const A0: u8 = 4;
    pub const A1: u8 = 5;
    pub const A2: u8 = 6;
    pub const A3: u8 = 7;
    pub const T0: u8 = 8;
    pub const T1: u8 = 9;
    pub const T2: u8 = 10;
    pub const T3: u8 = 11;
    pub const T4: u8 = 12;
    pub const T5: u8 = 13;
    pub const T6: u8 = 14;
    pub const T7: u8 = 15;
    pub const S0: u8 = 16;
    pub const S1: u8 = 17;
    pub const S2: u8 = 18;
    pub const S3: u8 = 19;
    pub const S4: u8 = 20;
    pub const S5: u8 = 21;
    pub const S6: u8 = 22;
    pub const S7: u8 = 23;
    pub const T8: u8 = 24;
    pub const T9: u8 = 25;
    pub const K0: u8 = 26;
    pub const K1: u8 = 27;
    pub const GP: u8 = 28;
    pub const SP: u8 = 29;
    pub const FP: u8 = 30;
    pub const RA: u8 = 31;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{AppendableBuffer, DataView};

    #[test]
    fn nop_is_all_zero() {
        let mut buf = AppendableBuffer::new();
        let mut e = Mips32Emitter::new(&mut buf);
        e.nop().unwrap();
        assert_eq!(buf.data(), &[0, 0, 0, 0]);
    }

    #[test]
    fn add_packs_r_format() {
        let mut buf = AppendableBuffer::new();
        let mut e = Mips32Emitter::new(&mut buf);
        e.add(gpr::T0, gpr::T1, gpr::T2).unwrap();
        let word = u32::from_le_bytes(buf.data().try_into().unwrap());
        assert_eq!(word, bits::mips_r(0, gpr::T1, gpr::T2, gpr::T0, 0, 32));
    }

    #[test]
    fn addi_packs_i_format() {
        let mut buf = AppendableBuffer::new();
        let mut e = Mips32Emitter::new(&mut buf);
        e.addi(gpr::T0, gpr::T1, 0x1234).unwrap();
        let word = u32::from_le_bytes(buf.data().try_into().unwrap());
        assert_eq!(word, bits::mips_i(8, gpr::T1, gpr::T0, 0x1234));
    }

    #[test]
    fn j_packs_j_format() {
        let mut buf = AppendableBuffer::new();
        let mut e = Mips32Emitter::new(&mut buf);
        e.j(0x0000_0100).unwrap();
        let word = u32::from_le_bytes(buf.data().try_into().unwrap());
        assert_eq!(word, bits::mips_j(2, 0x0000_0100));
    }

    #[test]
    fn jr_ra_is_return_idiom() {
        let mut buf = AppendableBuffer::new();
        let mut e = Mips32Emitter::new(&mut buf);
        e.jr(gpr::RA).unwrap();
        let word = u32::from_le_bytes(buf.data().try_into().unwrap());
        assert_eq!(word, bits::mips_r(0, gpr::RA, 0, 0, 0, 8));
        assert_eq!(e.offset(), 4);
    }
}
