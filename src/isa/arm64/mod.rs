//! The ARMv8 AArch64 architecture encoder.
//!
//! Every instruction is a single 32-bit word. [`emit`](Arm64Emitter::emit)
//! is the low-level primitive every mnemonic helper delegates to; it packs
//! the word little-endian, which is how A64 instruction fetch works on
//! every mainstream configuration.

use crate::bits;
use crate::error::Result;
use crate::operand::{Condition, Imm7};
use crate::sink::ByteSink;

/// Encodes ARMv8 AArch64 instructions into any [`ByteSink`].
pub struct Arm64Emitter<'a, S: ByteSink> {
    sink: &'a mut S,
    initial_offset: usize,
}

impl<'a, S: ByteSink> Arm64Emitter<'a, S> {
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

    /// Write a raw 32-bit instruction word, little-endian.
    pub fn emit(&mut self, word: u32) -> Result<&mut Self> {
        self.sink.append_bytes(&bits::arm64_word_le(word))?;
        Ok(self)
    }

    // ---- HINT family ----------------------------------------------------

    /// `HINT #imm7` — `D503201F | (imm7 << 5)`.
    pub fn hint(&mut self, imm7: Imm7) -> Result<&mut Self> {
        self.emit(0xD503_201F | (u32::from(imm7.value()) << 5))
    }

    /// `NOP` — `HINT #0`.
    pub fn nop(&mut self) -> Result<&mut Self> {
        self.hint(Imm7::new(0))
    }

    /// `YIELD` — `HINT #1`.
    pub fn yield_(&mut self) -> Result<&mut Self> {
        self.hint(Imm7::new(1))
    }

    /// `WFE` — `HINT #2`.
    pub fn wfe(&mut self) -> Result<&mut Self> {
        self.hint(Imm7::new(2))
    }

    /// `WFI` — `HINT #3`.
    pub fn wfi(&mut self) -> Result<&mut Self> {
        self.hint(Imm7::new(3))
    }

    /// `SEV` — `HINT #4`.
    pub fn sev(&mut self) -> Result<&mut Self> {
        self.hint(Imm7::new(4))
    }

    /// `SEVL` — `HINT #5`.
    pub fn sevl(&mut self) -> Result<&mut Self> {
        self.hint(Imm7::new(5))
    }

    // ---- control flow ----------------------------------------------------

    /// `RET {Xn}` — `D65F0000 | (Rn << 5)`; defaults to `X30` (the link
    /// register) when called as `ret(30)`.
    pub fn ret(&mut self, rn: u8) -> Result<&mut Self> {
        debug_assert!(rn < 32);
        self.emit(0xD65F_0000 | (u32::from(rn) << 5))
    }

    /// `B label` — `14000000 | imm26`; `imm26` is the word offset
    /// (`(target - pc) / 4`) to the branch target.
    pub fn b(&mut self, imm26: i32) -> Result<&mut Self> {
        self.emit(0x1400_0000 | encode_imm26(imm26))
    }

    /// `BL label` — `94000000 | imm26`.
    pub fn bl(&mut self, imm26: i32) -> Result<&mut Self> {
        self.emit(0x9400_0000 | encode_imm26(imm26))
    }

    /// `B.cond label` — `54000000 | (imm19 << 5) | cond`; `imm19` is the
    /// word offset to the branch target.
    pub fn b_cond(&mut self, cond: Condition, imm19: i32) -> Result<&mut Self> {
        self.emit(0x5400_0000 | (encode_imm19(imm19) << 5) | u32::from(cond.enc()))
    }

    // ---- move / arithmetic (64-bit `X` registers) -----------------------

    /// `MOVZ Xd, #imm16, LSL #(hw*16)` — `D2800000 | hw<<21 | imm16<<5 | Rd`.
    pub fn movz(&mut self, rd: u8, imm16: u16, hw: u8) -> Result<&mut Self> {
        debug_assert!(rd < 32 && hw < 4);
        self.emit(0xD280_0000 | (u32::from(hw) << 21) | (u32::from(imm16) << 5) | u32::from(rd))
    }

    /// `MOVK Xd, #imm16, LSL #(hw*16)` — `F2800000 | hw<<21 | imm16<<5 | Rd`.
    pub fn movk(&mut self, rd: u8, imm16: u16, hw: u8) -> Result<&mut Self> {
        debug_assert!(rd < 32 && hw < 4);
        self.emit(0xF280_0000 | (u32::from(hw) << 21) | (u32::from(imm16) << 5) | u32::from(rd))
    }

    /// `MOV Xd, Xm` — `ORR Xd, XZR, Xm` alias, `AA0003E0 | Rm<<16 | Rd`.
    pub fn mov_reg(&mut self, rd: u8, rm: u8) -> Result<&mut Self> {
        debug_assert!(rd < 32 && rm < 32);
        self.emit(0xAA00_03E0 | (u32::from(rm) << 16) | u32::from(rd))
    }

    /// `ADD Xd, Xn, Xm` — `8B000000 | Rm<<16 | Rn<<5 | Rd`.
    pub fn add_reg(&mut self, rd: u8, rn: u8, rm: u8) -> Result<&mut Self> {
        self.emit(three_reg(0x8B00_0000, rd, rn, rm))
    }

    /// `SUB Xd, Xn, Xm` — `CB000000 | Rm<<16 | Rn<<5 | Rd`.
    pub fn sub_reg(&mut self, rd: u8, rn: u8, rm: u8) -> Result<&mut Self> {
        self.emit(three_reg(0xCB00_0000, rd, rn, rm))
    }

    /// `SUBS Xd, Xn, Xm` (flag-setting subtract) — `EB000000 | Rm<<16 |
    /// Rn<<5 | Rd`. `CMP Xn, Xm` is the `Rd == 31` (`XZR`, discard) alias,
    /// needed by the JIT façade's `cmp` pseudo-instruction.
    pub fn subs_reg(&mut self, rd: u8, rn: u8, rm: u8) -> Result<&mut Self> {
        self.emit(three_reg(0xEB00_0000, rd, rn, rm))
    }

    /// `AND Xd, Xn, Xm` — `8A000000 | Rm<<16 | Rn<<5 | Rd`.
    pub fn and_reg(&mut self, rd: u8, rn: u8, rm: u8) -> Result<&mut Self> {
        self.emit(three_reg(0x8A00_0000, rd, rn, rm))
    }

    /// `ORR Xd, Xn, Xm` — `AA000000 | Rm<<16 | Rn<<5 | Rd`.
    pub fn orr_reg(&mut self, rd: u8, rn: u8, rm: u8) -> Result<&mut Self> {
        self.emit(three_reg(0xAA00_0000, rd, rn, rm))
    }

    /// `EOR Xd, Xn, Xm` (XOR) — `CA000000 | Rm<<16 | Rn<<5 | Rd`.
    pub fn eor_reg(&mut self, rd: u8, rn: u8, rm: u8) -> Result<&mut Self> {
        self.emit(three_reg(0xCA00_0000, rd, rn, rm))
    }

    /// `MVN Xd, Xm` (bitwise NOT) — `ORN Xd, XZR, Xm` alias,
    /// `AA2003E0 | Rm<<16 | Rd`.
    pub fn mvn(&mut self, rd: u8, rm: u8) -> Result<&mut Self> {
        debug_assert!(rd < 32 && rm < 32);
        self.emit(0xAA20_03E0 | (u32::from(rm) << 16) | u32::from(rd))
    }

    /// `MADD Xd, Xn, Xm, Xa` — `9B000000 | Rm<<16 | Ra<<10 | Rn<<5 | Rd`.
    pub fn madd(&mut self, rd: u8, rn: u8, rm: u8, ra: u8) -> Result<&mut Self> {
        debug_assert!(rd < 32 && rn < 32 && rm < 32 && ra < 32);
        self.emit(
            0x9B00_0000
                | (u32::from(rm) << 16)
                | (u32::from(ra) << 10)
                | (u32::from(rn) << 5)
                | u32::from(rd),
        )
    }

    /// `MSUB Xd, Xn, Xm, Xa` — `9B008000 | Rm<<16 | Ra<<10 | Rn<<5 | Rd`.
    pub fn msub(&mut self, rd: u8, rn: u8, rm: u8, ra: u8) -> Result<&mut Self> {
        debug_assert!(rd < 32 && rn < 32 && rm < 32 && ra < 32);
        self.emit(
            0x9B00_8000
                | (u32::from(rm) << 16)
                | (u32::from(ra) << 10)
                | (u32::from(rn) << 5)
                | u32::from(rd),
        )
    }

    /// `MUL Xd, Xn, Xm` — `MADD Xd, Xn, Xm, XZR` alias.
    pub fn mul(&mut self, rd: u8, rn: u8, rm: u8) -> Result<&mut Self> {
        self.madd(rd, rn, rm, 31)
    }

    /// `SDIV Xd, Xn, Xm` (signed division) — `9AC00C00 | Rm<<16 | Rn<<5 |
    /// Rd`.
    pub fn sdiv(&mut self, rd: u8, rn: u8, rm: u8) -> Result<&mut Self> {
        self.emit(three_reg(0x9AC0_0C00, rd, rn, rm))
    }

    /// `UDIV Xd, Xn, Xm` (unsigned division) — `9AC00800 | Rm<<16 | Rn<<5 |
    /// Rd`.
    pub fn udiv(&mut self, rd: u8, rn: u8, rm: u8) -> Result<&mut Self> {
        self.emit(three_reg(0x9AC0_0800, rd, rn, rm))
    }

    /// `CLZ Xd, Xn` (count leading zeros) — `DAC01000 | Rn<<5 | Rd`.
    pub fn clz(&mut self, rd: u8, rn: u8) -> Result<&mut Self> {
        debug_assert!(rd < 32 && rn < 32);
        self.emit(0xDAC0_1000 | (u32::from(rn) << 5) | u32::from(rd))
    }

    /// `LSLV Xd, Xn, Xm` (logical shift left by register) — `9AC02000 |
    /// Rm<<16 | Rn<<5 | Rd`.
    pub fn lslv(&mut self, rd: u8, rn: u8, rm: u8) -> Result<&mut Self> {
        self.emit(three_reg(0x9AC0_2000, rd, rn, rm))
    }

    /// `LSRV Xd, Xn, Xm` (logical shift right by register) — `9AC02400 |
    /// Rm<<16 | Rn<<5 | Rd`.
    pub fn lsrv(&mut self, rd: u8, rn: u8, rm: u8) -> Result<&mut Self> {
        self.emit(three_reg(0x9AC0_2400, rd, rn, rm))
    }

    /// `ADD Xd, Xn, #imm12` — `91000000 | imm12<<10 | Rn<<5 | Rd`. `Rd`/`Rn`
    /// of `31` denotes `SP` in this immediate-class encoding, giving the
    /// `MOV Xd, SP` / `MOV SP, Xn` aliases when `imm12 == 0`.
    pub fn add_imm(&mut self, rd: u8, rn: u8, imm12: u16) -> Result<&mut Self> {
        debug_assert!(imm12 < 0x1000);
        self.emit(0x9100_0000 | (u32::from(imm12) << 10) | (u32::from(rn) << 5) | u32::from(rd))
    }

    /// `SUB Xd, Xn, #imm12` — `D1000000 | imm12<<10 | Rn<<5 | Rd`.
    pub fn sub_imm(&mut self, rd: u8, rn: u8, imm12: u16) -> Result<&mut Self> {
        debug_assert!(imm12 < 0x1000);
        self.emit(0xD100_0000 | (u32::from(imm12) << 10) | (u32::from(rn) << 5) | u32::from(rd))
    }

    // ---- pair load/store (function prolog/epilog) -----------------------

    /// `STP Xt, Xt2, [Xn, #imm]!` (pre-indexed, writeback) —
    /// `A9800000 | imm7<<15 | Rt2<<10 | Rn<<5 | Rt`. `imm` is in bytes and
    /// must be a multiple of 8 in `-512..=504`.
    pub fn stp_pre(&mut self, rt: u8, rt2: u8, rn: u8, imm: i16) -> Result<&mut Self> {
        self.emit(pair(0xA980_0000, rt, rt2, rn, imm))
    }

    /// `LDP Xt, Xt2, [Xn], #imm` (post-indexed, writeback) —
    /// `A8C00000 | imm7<<15 | Rt2<<10 | Rn<<5 | Rt`.
    pub fn ldp_post(&mut self, rt: u8, rt2: u8, rn: u8, imm: i16) -> Result<&mut Self> {
        self.emit(pair(0xA8C0_0000, rt, rt2, rn, imm))
    }
}

fn three_reg(base: u32, rd: u8, rn: u8, rm: u8) -> u32 {
    debug_assert!(rd < 32 && rn < 32 && rm < 32);
    base | (u32::from(rm) << 16) | (u32::from(rn) << 5) | u32::from(rd)
}

fn pair(base: u32, rt: u8, rt2: u8, rn: u8, imm: i16) -> u32 {
    debug_assert!(rt < 32 && rt2 < 32 && rn < 32);
    debug_assert!(imm % 8 == 0 && (-512..=504).contains(&imm));
    let imm7 = ((imm / 8) as i32) & 0x7F;
    #[allow(clippy::cast_sign_loss)]
    let imm7 = imm7 as u32;
    base | (imm7 << 15) | (u32::from(rt2) << 10) | (u32::from(rn) << 5) | u32::from(rt)
}

fn encode_imm26(offset_words: i32) -> u32 {
    #[allow(clippy::cast_sign_loss)]
    {
        (offset_words as u32) & 0x03FF_FFFF
    }
}

fn encode_imm19(offset_words: i32) -> u32 {
    #[allow(clippy::cast_sign_loss)]
    {
        (offset_words as u32) & 0x0007_FFFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{AppendableBuffer, DataView};

    #[test]
    fn s4_hint_family() {
        let mut buf = AppendableBuffer::new();
        let mut e = Arm64Emitter::new(&mut buf);
        e.nop().unwrap();
        e.yield_().unwrap();
        e.wfe().unwrap();
        e.wfi().unwrap();
        e.sev().unwrap();
        e.sevl().unwrap();
        let words: Vec<u32> = buf
            .data()
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(
            words,
            vec![0xD503_201F, 0xD503_203F, 0xD503_205F, 0xD503_207F, 0xD503_209F, 0xD503_20BF]
        );
    }

    #[test]
    fn ret_defaults_to_link_register() {
        let mut buf = AppendableBuffer::new();
        let mut e = Arm64Emitter::new(&mut buf);
        e.ret(30).unwrap();
        assert_eq!(buf.data(), &0xD65F_03C0u32.to_le_bytes());
    }

    #[test]
    fn prolog_epilog_pair_ops() {
        let mut buf = AppendableBuffer::new();
        let mut e = Arm64Emitter::new(&mut buf);
        // stp x29, x30, [sp, #-16]!
        e.stp_pre(29, 30, 31, -16).unwrap();
        // mov x29, sp  (add x29, sp, #0)
        e.add_imm(29, 31, 0).unwrap();
        // mov sp, x29  (add sp, x29, #0)
        e.add_imm(31, 29, 0).unwrap();
        // ldp x29, x30, [sp], #16
        e.ldp_post(29, 30, 31, 16).unwrap();
        e.ret(30).unwrap();
        assert_eq!(buf.data().len(), 20);
    }
}
