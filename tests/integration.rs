//! End-to-end scenarios spanning the public API surface: the byte sinks, the
//! per-architecture encoders, and the JIT façade together, rather than one
//! module in isolation.

use machcode::isa::x86::X86Emitter;
use machcode::jit::{compiler_for, JitCompiler, Operand};
use machcode::operand::{gpr64, Imm64};
use machcode::sink::{AppendableBuffer, ByteSink, DataView, ExecutableBuffer};

#[test]
fn s2_x86_64_function_prolog_epilog_bytes() {
    let _ = env_logger::try_init();
    let mut buf = AppendableBuffer::new();
    let mut e = X86Emitter::new(&mut buf);
    e.push(gpr64::RBP).unwrap();
    e.mov_rbp_rsp().unwrap();
    e.mov_reg64_imm64(gpr64::RAX, Imm64::new(0)).unwrap();
    e.ret().unwrap();
    assert_eq!(
        buf.data(),
        &[0x55, 0x48, 0x89, 0xE5, 0x48, 0xB8, 0, 0, 0, 0, 0, 0, 0, 0, 0xC3]
    );
}

#[test]
fn s3_jit_calc_execution_through_executable_buffer() {
    let mut buf = AppendableBuffer::new();
    let mut e = X86Emitter::new(&mut buf);
    e.push(gpr64::RBP).unwrap();
    e.mov_rbp_rsp().unwrap();
    e.mov_reg64_imm64(gpr64::RAX, Imm64::new(0)).unwrap();
    for k in [3u64, 4, 5] {
        e.add_rax_imm64(Imm64::new(k)).unwrap();
    }
    e.pop(gpr64::RBP).unwrap();
    e.ret().unwrap();

    let exe = ExecutableBuffer::from_appendable(&buf).unwrap();
    let result: i64 = unsafe { exe.execute() };
    assert_eq!(result, 12);
}

#[test]
fn s5_jit_factory_exclusivity() {
    assert!(compiler_for("x86-64").is_ok());
    assert!(compiler_for("armv8-aarch64").is_ok());
    assert!(compiler_for("mips32").is_ok());
    assert!(compiler_for("not-a-real-target").is_err());
}

#[test]
fn jit_facade_round_trips_across_all_three_targets() {
    for target in ["x86-64", "armv8-aarch64", "mips32"] {
        let mut c = compiler_for(target).unwrap();
        c.enter().unwrap();
        c.mov(Operand::Reg(0), Operand::Imm(10)).unwrap();
        c.mov(Operand::Reg(1), Operand::Imm(3)).unwrap();
        c.add(Operand::Reg(0), Operand::Reg(1)).unwrap();
        c.leave().unwrap();
        c.ret().unwrap();
        assert!(!c.code().is_empty(), "{target} emitted no code");
    }
}

#[test]
fn executable_buffer_lifecycle_survives_growth() {
    let mut exe = ExecutableBuffer::new(1).unwrap();
    let page = exe.capacity();
    assert!(page > 0);
    let payload: Vec<u8> = (0..=255u8).cycle().take(page + 1).collect();
    exe.append_bytes(&payload).unwrap();
    assert_eq!(exe.size(), payload.len());
    assert_eq!(exe.data(), payload.as_slice());
}

#[test]
fn appendable_to_executable_equivalence() {
    let mut src = AppendableBuffer::new();
    let mut e = X86Emitter::new(&mut src);
    e.nop().unwrap();
    e.ret().unwrap();
    let exe = ExecutableBuffer::from_appendable(&src).unwrap();
    assert_eq!(exe.data(), src.data());
}
