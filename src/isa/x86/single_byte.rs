//! The single-byte Intel GP mnemonics and the 1-3 byte system instructions.
//!
//! Rust has no method overloading, so the curated method-per-mnemonic
//! convention is followed literally for the instructions callers reach for
//! by name elsewhere in this crate (`mov`, `add`, `push`, ...).
//! For the long, alias-heavy tail of single-opcode mnemonics and system
//! instructions, a tagged enum plus one dispatch method
//! ([`X86Emitter::single_byte`](super::X86Emitter::single_byte),
//! [`X86Emitter::system`](super::X86Emitter::system)) avoids forty
//! near-identical one-line wrapper methods while still giving every
//! mnemonic its own named, documented variant.

/// A single-byte Intel general-purpose mnemonic.
///
/// Several variants share an opcode on purpose — e.g. `CWDE`, `CBW`, and
/// `CDQE` all emit `98`; they are mode-dependent aliases, not duplicates,
/// and are kept distinct so a caller can pick the name that matches their
/// intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SingleByte {
    Aaa,
    Aas,
    Cbw,
    Cwde,
    Cdqe,
    Cwd,
    Cdq,
    Cqo,
    Clc,
    Cld,
    Cmc,
    CmpsB,
    CmpsW,
    CmpsD,
    CmpsQ,
    Daa,
    Das,
    InsB,
    InsW,
    InsD,
    Into,
    Lahf,
    LodsB,
    LodsW,
    LodsD,
    LodsQ,
    MovsB,
    MovsW,
    MovsD,
    MovsQ,
    OutsB,
    OutsW,
    OutsD,
    PopA,
    PopAd,
    PopF,
    PopFd,
    PopFq,
    PushA,
    PushAd,
    PushF,
    PushFd,
    PushFq,
    RetNear,
    RetFar,
    Sahf,
    ScasB,
    ScasW,
    ScasD,
    ScasQ,
    Stc,
    /// Named `Std`, not `std_`: Rust has no reserved-word collision here,
    /// unlike in host languages where `std` would shadow a keyword or the
    /// standard library namespace.
    Std,
    StosB,
    StosW,
    StosD,
    StosQ,
    Xlatb,
}

impl SingleByte {
    /// The canonical opcode byte sequence for this mnemonic.
    #[must_use]
    pub fn bytes(self) -> &'static [u8] {
        use SingleByte::{
            Aaa, Aas, Cbw, Cdq, Cdqe, Clc, Cld, Cmc, CmpsB, CmpsD, CmpsQ, CmpsW, Cqo, Cwd, Cwde,
            Daa, Das, InsB, InsD, InsW, Into, Lahf, LodsB, LodsD, LodsQ, LodsW, MovsB, MovsD,
            MovsQ, MovsW, OutsB, OutsD, OutsW, PopA, PopAd, PopF, PopFd, PopFq, PushA, PushAd,
            PushF, PushFd, PushFq, RetFar, RetNear, Sahf, ScasB, ScasD, ScasQ, ScasW, Stc, Std,
            StosB, StosD, StosQ, StosW, Xlatb,
        };
        match self {
            Aaa => &[0x37],
            Aas => &[0x3F],
            Cbw | Cwde => &[0x98],
            Cdqe => &[0x48, 0x98],
            Cwd | Cdq => &[0x99],
            Cqo => &[0x48, 0x99],
            Clc => &[0xF8],
            Cld => &[0xFC],
            Cmc => &[0xF5],
            CmpsB => &[0xA6],
            CmpsW => &[0x66, 0xA7],
            CmpsD => &[0xA7],
            CmpsQ => &[0x48, 0xA7],
            Daa => &[0x27],
            Das => &[0x2F],
            InsB => &[0x6C],
            InsW => &[0x66, 0x6D],
            InsD => &[0x6D],
            Into => &[0xCE],
            Lahf => &[0x9F],
            LodsB => &[0xAC],
            LodsW => &[0x66, 0xAD],
            LodsD => &[0xAD],
            LodsQ => &[0x48, 0xAD],
            MovsB => &[0xA4],
            MovsW => &[0x66, 0xA5],
            MovsD => &[0xA5],
            MovsQ => &[0x48, 0xA5],
            OutsB => &[0x6E],
            OutsW => &[0x66, 0x6F],
            OutsD => &[0x6F],
            PopA | PopAd => &[0x61],
            PopF | PopFd | PopFq => &[0x9D],
            PushA | PushAd => &[0x60],
            PushF | PushFd | PushFq => &[0x9C],
            RetNear => &[0xC3],
            RetFar => &[0xCB],
            Sahf => &[0x9E],
            ScasB => &[0xAE],
            ScasW => &[0x66, 0xAF],
            ScasD => &[0xAF],
            ScasQ => &[0x48, 0xAF],
            Stc => &[0xF9],
            Std => &[0xFD],
            StosB => &[0xAA],
            StosW => &[0x66, 0xAB],
            StosD => &[0xAB],
            StosQ => &[0x48, 0xAB],
            Xlatb => &[0xD7],
        }
    }

    /// The canonical opcode byte, for mnemonics documented as a single
    /// opcode byte with no prefix.
    #[must_use]
    pub fn opcode(self) -> u8 {
        let bytes = self.bytes();
        debug_assert_eq!(bytes.len(), 1, "{self:?} is not a bare single-opcode mnemonic");
        bytes[0]
    }
}

/// A privileged / system x86-64 instruction with a documented 1-3 byte
/// encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SystemInstruction {
    Clgi,
    Cli,
    Clts,
    Hlt,
    Int3,
    Invd,
    Invlpga,
    IretD,
    IretQ,
    Monitor,
    Mwait,
    Rdmsr,
    Rdpmc,
    Rdtsc,
    Rdtscp,
    Rsm,
    Skinit,
    Sti,
    Stgi,
    Swapgs,
    Syscall,
    Sysenter,
    Sysexit,
    Sysret,
    Ud2,
    Vmload,
    Vmmcall,
    Vmrun,
    Vmsave,
    Wbinvd,
    Wrmsr,
}

impl SystemInstruction {
    /// The documented byte sequence for this system instruction.
    #[must_use]
    pub fn bytes(self) -> &'static [u8] {
        use SystemInstruction::{
            Clgi, Cli, Clts, Hlt, Int3, Invd, Invlpga, IretD, IretQ, Monitor, Mwait, Rdmsr, Rdpmc,
            Rdtsc, Rdtscp, Rsm, Skinit, Sti, Stgi, Swapgs, Syscall, Sysenter, Sysexit, Sysret,
            Ud2, Vmload, Vmmcall, Vmrun, Vmsave, Wbinvd, Wrmsr,
        };
        match self {
            Clgi => &[0x0F, 0x01, 0xDD],
            Cli => &[0xFA],
            Clts => &[0x0F, 0x06],
            Hlt => &[0xF4],
            Int3 => &[0xCC],
            Invd => &[0x0F, 0x08],
            Invlpga => &[0x0F, 0x01, 0xDF],
            IretD => &[0xCF],
            IretQ => &[0x48, 0xCF],
            Monitor => &[0x0F, 0x01, 0xC8],
            Mwait => &[0x0F, 0x01, 0xC9],
            Rdmsr => &[0x0F, 0x32],
            Rdpmc => &[0x0F, 0x33],
            Rdtsc => &[0x0F, 0x31],
            Rdtscp => &[0x0F, 0x01, 0xF9],
            Rsm => &[0x0F, 0xAA],
            Skinit => &[0x0F, 0x01, 0xDE],
            Sti => &[0xFB],
            Stgi => &[0x0F, 0x01, 0xDC],
            Swapgs => &[0x0F, 0x01, 0xF8],
            Syscall => &[0x0F, 0x05],
            Sysenter => &[0x0F, 0x34],
            Sysexit => &[0x0F, 0x35],
            Sysret => &[0x0F, 0x07],
            Ud2 => &[0x0F, 0x0B],
            Vmload => &[0x0F, 0x01, 0xDA],
            Vmmcall => &[0x0F, 0x01, 0xD9],
            Vmrun => &[0x0F, 0x01, 0xD8],
            Vmsave => &[0x0F, 0x01, 0xDB],
            Wbinvd => &[0x0F, 0x09],
            Wrmsr => &[0x0F, 0x30],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_share_opcode_98() {
        assert_eq!(SingleByte::Cbw.opcode(), 0x98);
        assert_eq!(SingleByte::Cwde.opcode(), 0x98);
    }

    #[test]
    fn cdqe_adds_rex_w() {
        assert_eq!(SingleByte::Cdqe.bytes(), &[0x48, 0x98]);
    }

    #[test]
    fn syscall_is_two_bytes() {
        assert_eq!(SystemInstruction::Syscall.bytes(), &[0x0F, 0x05]);
    }

    #[test]
    fn hlt_is_one_byte() {
        assert_eq!(SystemInstruction::Hlt.bytes(), &[0xF4]);
    }
}
