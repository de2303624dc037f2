//! CPU interpreter tests against documented single-instruction behavior.
use super::*;

/// A flat 64 KiB bus with no contention.
struct TestBus {
    mem: Vec<u8>,
    io_last: Option<(u16, u8)>,
    io_value: u8,
    irq_line: bool,
}

impl TestBus {
    fn new() -> Self {
        TestBus { mem: vec![0; 0x10000], io_last: None, io_value: 0xFF, irq_line: false }
    }

    fn load(&mut self, addr: u16, bytes: &[u8]) {
        let addr = addr as usize;
        self.mem[addr..addr + bytes.len()].copy_from_slice(bytes);
    }
}

impl Bus for TestBus {
    fn fetch_m1(&mut self, addr: u16, _ts: FTs) -> u8 {
        self.mem[addr as usize]
    }
    fn read(&mut self, addr: u16, _ts: FTs) -> u8 {
        self.mem[addr as usize]
    }
    fn write(&mut self, addr: u16, data: u8, _ts: FTs) {
        self.mem[addr as usize] = data;
    }
    fn port_in(&mut self, _port: u16, _ts: FTs) -> u8 {
        self.io_value
    }
    fn port_out(&mut self, port: u16, data: u8, _ts: FTs) {
        self.io_last = Some((port, data));
    }
    fn irq(&self, _ts: FTs) -> bool {
        self.irq_line
    }
    fn irq_vector(&mut self) -> u8 {
        0xFF
    }
}

fn exec_one(bytes: &[u8]) -> (Z80, TestBus, FTs) {
    let mut cpu = Z80::new();
    cpu.reset();
    let mut bus = TestBus::new();
    bus.load(0, bytes);
    let ts = cpu.step(&mut bus);
    (cpu, bus, ts)
}

#[test]
fn jr_displacement_range() {
    // (opcode bytes, expected PC)
    let cases: &[(&[u8], u16)] = &[
        (&[0x18, 0x00], 0x0002),
        (&[0x18, 0x03], 0x0005),
        (&[0x18, 0x7F], 0x0081),
        (&[0x18, 0xFA], 0xFFFC),
        (&[0x18, 0x80], 0xFF82),
        (&[0x18, 0xFF], 0x0001),
    ];
    for (bytes, expect) in cases {
        let (cpu, _, ts) = exec_one(bytes);
        assert_eq!(cpu.pc, *expect, "JR e with offset {:02x}", bytes[1]);
        assert_eq!(ts, 12);
    }
}

#[test]
fn jr_conditional_not_taken() {
    // JR Z with Z clear falls through
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.f = 0;
    let mut bus = TestBus::new();
    bus.load(0, &[0x28, 0x03]);
    let ts = cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x0002);
    assert_eq!(ts, 7);
}

#[test]
fn jr_conditional_taken() {
    // JR C with carry set jumps backwards
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.f = CF;
    let mut bus = TestBus::new();
    bus.load(0, &[0x38, 0xFA]);
    let ts = cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0xFFFC);
    assert_eq!(ts, 12);
}

#[test]
fn djnz_loops_until_b_zero() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.b = 3;
    let mut bus = TestBus::new();
    bus.load(0, &[0x10, 0xFE]); // DJNZ -2 (self)
    let ts = cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x0000);
    assert_eq!(cpu.b, 2);
    assert_eq!(ts, 13);
    cpu.step(&mut bus);
    let ts = cpu.step(&mut bus);
    assert_eq!(cpu.b, 0);
    assert_eq!(cpu.pc, 0x0002);
    assert_eq!(ts, 8);
}

#[test]
fn ld_r_n_and_alu() {
    let (cpu, _, ts) = exec_one(&[0x3E, 0x25]); // LD A, 25h
    assert_eq!(cpu.a, 0x25);
    assert_eq!(ts, 7);

    let mut cpu = Z80::new();
    cpu.reset();
    cpu.a = 0x44;
    let mut bus = TestBus::new();
    bus.load(0, &[0xC6, 0x11]); // ADD A, 11h
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x55);
    assert_eq!(cpu.f & (CF | ZF | SF | NF), 0);
}

#[test]
fn add_sets_carry_and_overflow() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.a = 0x7F;
    let mut bus = TestBus::new();
    bus.load(0, &[0xC6, 0x01]); // ADD A, 1 -> 0x80, PV set
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x80);
    assert_ne!(cpu.f & PV, 0);
    assert_ne!(cpu.f & SF, 0);
    assert_eq!(cpu.f & CF, 0);

    let mut cpu = Z80::new();
    cpu.reset();
    cpu.a = 0xFF;
    let mut bus = TestBus::new();
    bus.load(0, &[0xC6, 0x01]);
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00);
    assert_ne!(cpu.f & ZF, 0);
    assert_ne!(cpu.f & CF, 0);
}

#[test]
fn cp_keeps_f35_of_operand() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.a = 0x00;
    let mut bus = TestBus::new();
    bus.load(0, &[0xFE, 0x20]); // CP 20h: F5 set from operand, F3 clear
    cpu.step(&mut bus);
    assert_eq!(cpu.f & (F3 | F5), F5);
}

#[test]
fn call_and_ret_roundtrip() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.sp = 0x8000;
    let mut bus = TestBus::new();
    bus.load(0, &[0xCD, 0x00, 0x40]); // CALL 4000h
    bus.load(0x4000, &[0xC9]); // RET
    let ts = cpu.step(&mut bus);
    assert_eq!(ts, 17);
    assert_eq!(cpu.pc, 0x4000);
    assert_eq!(cpu.sp, 0x7FFE);
    assert_eq!(bus.mem[0x7FFE], 0x03);
    assert_eq!(bus.mem[0x7FFF], 0x00);
    let ts = cpu.step(&mut bus);
    assert_eq!(ts, 10);
    assert_eq!(cpu.pc, 0x0003);
    assert_eq!(cpu.sp, 0x8000);
}

#[test]
fn push_pop_and_exchanges() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.sp = 0x9000;
    cpu.set_bc(0x1234);
    cpu.set_de(0x5678);
    cpu.set_hl(0x9ABC);
    let mut bus = TestBus::new();
    bus.load(0, &[0xC5, 0xD1, 0xEB]); // PUSH BC; POP DE; EX DE, HL
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.de(), 0x1234);
    cpu.step(&mut bus);
    assert_eq!(cpu.de(), 0x9ABC);
    assert_eq!(cpu.hl(), 0x1234);
}

#[test]
fn indexed_memory_operand() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.ix = 0x5000;
    let mut bus = TestBus::new();
    bus.mem[0x4FFC] = 0x77;
    bus.load(0, &[0xDD, 0x7E, 0xFC]); // LD A, (IX-4)
    let ts = cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x77);
    assert_eq!(ts, 19);
}

#[test]
fn dd_prefix_without_index_use_is_transparent() {
    // DD 41 is LD B, C: the prefix changes nothing
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.c = 0x5A;
    let mut bus = TestBus::new();
    bus.load(0, &[0xDD, 0x41]);
    cpu.step(&mut bus);
    assert_eq!(cpu.b, 0x5A);
    assert_eq!(cpu.pc, 2);
}

#[test]
fn undocumented_ixh_access() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.ix = 0xAB12;
    let mut bus = TestBus::new();
    bus.load(0, &[0xDD, 0x7C]); // LD A, IXH
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0xAB);
}

#[test]
fn cb_rotates_and_bit() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.b = 0b1000_0001;
    let mut bus = TestBus::new();
    bus.load(0, &[0xCB, 0x00, 0xCB, 0x40]); // RLC B; BIT 0, B
    let ts = cpu.step(&mut bus);
    assert_eq!(ts, 8);
    assert_eq!(cpu.b, 0b0000_0011);
    assert_ne!(cpu.f & CF, 0);
    cpu.step(&mut bus);
    assert_eq!(cpu.f & ZF, 0); // bit 0 is set
}

#[test]
fn ddcb_stores_to_register_too() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.ix = 0x6000;
    let mut bus = TestBus::new();
    bus.mem[0x6001] = 0x0F;
    bus.load(0, &[0xDD, 0xCB, 0x01, 0x06]); // RLC (IX+1) -> also B
    let ts = cpu.step(&mut bus);
    assert_eq!(ts, 23);
    assert_eq!(bus.mem[0x6001], 0x1E);
    assert_eq!(cpu.b, 0x1E);
}

#[test]
fn ed_sbc_hl() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.set_hl(0x1000);
    cpu.set_bc(0x1000);
    let mut bus = TestBus::new();
    bus.load(0, &[0xED, 0x42]); // SBC HL, BC
    let ts = cpu.step(&mut bus);
    assert_eq!(ts, 15);
    assert_eq!(cpu.hl(), 0);
    assert_ne!(cpu.f & ZF, 0);
    assert_ne!(cpu.f & NF, 0);
}

#[test]
fn ed_undefined_is_8t_nop() {
    let (cpu, _, ts) = exec_one(&[0xED, 0x00]);
    assert_eq!(ts, 8);
    assert_eq!(cpu.pc, 2);
}

#[test]
fn out_c_emits_configured_byte() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.set_bc(0x12FE);
    let mut bus = TestBus::new();
    bus.load(0, &[0xED, 0x71]); // OUT (C)
    cpu.step(&mut bus);
    assert_eq!(bus.io_last, Some((0x12FE, OUT_C_VALUE)));
}

#[test]
fn ldir_copies_and_repeats() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.set_hl(0x4000);
    cpu.set_de(0x5000);
    cpu.set_bc(3);
    let mut bus = TestBus::new();
    bus.load(0x4000, &[1, 2, 3]);
    bus.load(0, &[0xED, 0xB0]); // LDIR
    let ts = cpu.step(&mut bus);
    assert_eq!(ts, 21);
    assert_eq!(cpu.pc, 0); // repeated
    cpu.step(&mut bus);
    let ts = cpu.step(&mut bus);
    assert_eq!(ts, 16); // last iteration falls through
    assert_eq!(cpu.pc, 2);
    assert_eq!(&bus.mem[0x5000..0x5003], &[1, 2, 3]);
    assert_eq!(cpu.bc(), 0);
    assert_eq!(cpu.f & PV, 0);
}

#[test]
fn halt_burns_cycles_until_interrupt() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.iff1 = true;
    cpu.iff2 = true;
    cpu.im = IntMode::Im1;
    cpu.sp = 0x8000;
    let mut bus = TestBus::new();
    bus.load(0, &[0x76]); // HALT
    cpu.step(&mut bus);
    assert!(cpu.halted);
    let pc_after_halt = cpu.pc;
    let ts = cpu.step(&mut bus);
    assert_eq!(ts, 4);
    assert_eq!(cpu.pc, pc_after_halt);
    bus.irq_line = true;
    let ts = cpu.step(&mut bus);
    assert_eq!(ts, 13); // IM1 acceptance
    assert!(!cpu.halted);
    assert_eq!(cpu.pc, 0x0038);
    assert!(!cpu.iff1);
}

#[test]
fn im2_vector_fetch_costs_19() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.iff1 = true;
    cpu.iff2 = true;
    cpu.im = IntMode::Im2;
    cpu.i = 0x3F;
    cpu.sp = 0x8000;
    let mut bus = TestBus::new();
    // vector table entry at 0x3FFF
    bus.mem[0x3FFF] = 0x34;
    bus.mem[0x4000] = 0x12;
    bus.irq_line = true;
    let ts = cpu.step(&mut bus);
    assert_eq!(ts, 19);
    assert_eq!(cpu.pc, 0x1234);
}

#[test]
fn ei_defers_interrupt_one_instruction() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.im = IntMode::Im1;
    cpu.sp = 0x8000;
    let mut bus = TestBus::new();
    bus.load(0, &[0xFB, 0x00, 0x00]); // EI; NOP; NOP
    bus.irq_line = true;
    cpu.step(&mut bus); // EI
    assert!(cpu.iff1);
    cpu.step(&mut bus); // must execute the NOP, not the interrupt
    assert_eq!(cpu.pc, 2);
    cpu.step(&mut bus); // now the interrupt is taken
    assert_eq!(cpu.pc, 0x0038);
}

#[test]
fn ld_a_i_copies_iff2_to_pv() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.iff2 = true;
    cpu.i = 0x55;
    let mut bus = TestBus::new();
    bus.load(0, &[0xED, 0x57]); // LD A, I
    let ts = cpu.step(&mut bus);
    assert_eq!(ts, 9);
    assert_eq!(cpu.a, 0x55);
    assert_ne!(cpu.f & PV, 0);

    // with an interrupt pending at acceptance, P/V reads 0
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.iff1 = true;
    cpu.iff2 = true;
    cpu.i = 0x55;
    let mut bus = TestBus::new();
    bus.load(0x100, &[0xED, 0x57]);
    cpu.pc = 0x100;
    bus.irq_line = true;
    cpu.eipos = 0; // block acceptance before the instruction itself
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x55);
    assert_eq!(cpu.f & PV, 0);
}

#[test]
fn injected_int_uses_its_vector() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.iff1 = true;
    cpu.iff2 = true;
    cpu.im = IntMode::Im2;
    cpu.i = 0x40;
    cpu.sp = 0x8000;
    let mut bus = TestBus::new();
    bus.mem[0x4012] = 0x00;
    bus.mem[0x4013] = 0x60;
    cpu.trigger_int(0x12);
    let ts = cpu.step(&mut bus);
    assert_eq!(ts, 19);
    assert_eq!(cpu.pc, 0x6000);

    // with IFF1 clear the request stays pending until EI
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.im = IntMode::Im1;
    cpu.sp = 0x8000;
    let mut bus = TestBus::new();
    bus.load(0, &[0x00, 0xFB, 0x00]); // NOP; EI; NOP
    cpu.trigger_int(0xFF);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 1);
    cpu.step(&mut bus); // EI
    cpu.step(&mut bus); // delay slot NOP
    cpu.step(&mut bus); // now accepted
    assert_eq!(cpu.pc, 0x0038);
}

#[test]
fn nmi_overrides_iff1() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.sp = 0x8000;
    cpu.iff1 = true;
    cpu.iff2 = true;
    cpu.trigger_nmi();
    let mut bus = TestBus::new();
    let ts = cpu.step(&mut bus);
    assert_eq!(ts, 11);
    assert_eq!(cpu.pc, 0x0066);
    assert!(!cpu.iff1);
    assert!(cpu.iff2); // preserved for RETN
}

#[test]
fn scf_ccf_f53_from_a() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.a = 0x28;
    cpu.f = 0;
    let mut bus = TestBus::new();
    bus.load(0, &[0x37, 0x3F]); // SCF; CCF
    cpu.step(&mut bus);
    assert_eq!(cpu.f & (CF | F3 | F5 | HF | NF), CF | F3 | F5);
    cpu.step(&mut bus);
    assert_eq!(cpu.f & CF, 0);
    assert_ne!(cpu.f & HF, 0); // H takes the old carry
}

#[test]
fn in_r_c_sets_szp() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.set_bc(0x40FE);
    let mut bus = TestBus::new();
    bus.io_value = 0x00;
    bus.load(0, &[0xED, 0x50]); // IN D, (C)
    let ts = cpu.step(&mut bus);
    assert_eq!(ts, 12);
    assert_eq!(cpu.d, 0);
    assert_ne!(cpu.f & ZF, 0);
    assert_ne!(cpu.f & PV, 0); // even parity
}

#[test]
fn frame_run_reaches_budget() {
    let mut cpu = Z80::new();
    cpu.reset();
    let mut bus = TestBus::new(); // all NOPs
    cpu.run_frame(&mut bus, 1000);
    assert!(cpu.t >= 1000);
    assert!(cpu.t < 1004);
    cpu.wrap_frame(1000);
    assert!(cpu.t < 4);
}

#[test]
fn memptr_visible_through_bit_n_hl() {
    let mut cpu = Z80::new();
    cpu.reset();
    cpu.set_hl(0x4000);
    let mut bus = TestBus::new();
    bus.mem[0x4000] = 0xFF;
    // LD A,(nn) sets MEMPTR to nn+1 = 0x2056
    bus.load(0, &[0x3A, 0x55, 0x20, 0xCB, 0x46]); // LD A,(2055h); BIT 0,(HL)
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.f & (F3 | F5), F5); // from MEMPTR high byte 0x20
}
