/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Execution of the ED-prefixed opcode space.
use super::*;
use super::tables::flag_tables;

impl Z80 {
    fn adc16(&mut self, val: u16) {
        let hl = self.hl();
        let carry = (self.f & CF) as u32;
        let res = hl as u32 + val as u32 + carry;
        let mut f = ((res >> 8) as u8) & (SF | F3 | F5);
        if res as u16 == 0 {
            f |= ZF;
        }
        if res > 0xFFFF {
            f |= CF;
        }
        if ((hl & 0x0FFF) + (val & 0x0FFF) + carry as u16) & 0x1000 != 0 {
            f |= HF;
        }
        let sr = hl as i16 as i32 + val as i16 as i32 + carry as i32;
        if !(-0x8000..=0x7FFF).contains(&sr) {
            f |= PV;
        }
        self.memptr = hl.wrapping_add(1);
        self.set_hl(res as u16);
        self.f = f;
    }

    fn sbc16(&mut self, val: u16) {
        let hl = self.hl();
        let carry = (self.f & CF) as i32;
        let res = hl as i32 - val as i32 - carry;
        let mut f = (((res >> 8) as u8) & (SF | F3 | F5)) | NF;
        if res as u16 == 0 {
            f |= ZF;
        }
        if res < 0 {
            f |= CF;
        }
        if ((hl & 0x0FFF) as i32 - (val & 0x0FFF) as i32 - carry) & 0x1000 != 0 {
            f |= HF;
        }
        let sr = hl as i16 as i32 - val as i16 as i32 - carry;
        if !(-0x8000..=0x7FFF).contains(&sr) {
            f |= PV;
        }
        self.memptr = hl.wrapping_add(1);
        self.set_hl(res as u16);
        self.f = f;
    }

    /// Flags of `LD A,I` / `LD A,R`: P/V mirrors IFF2, and goes low when a
    /// maskable interrupt is being accepted at this very instruction.
    fn ld_a_ir_flags<B: Bus>(&mut self, bus: &mut B, val: u8) {
        let mut f = (self.f & CF) | (val & (SF | F3 | F5));
        if val == 0 {
            f |= ZF;
        }
        if self.iff2 && !(self.iff1 && bus.irq(self.t)) {
            f |= PV;
        }
        self.f = f;
    }

    /// Undocumented flags shared by INI/IND/OUTI/OUTD per the documented
    /// `k` formula.
    fn block_io_flags(&mut self, val: u8, k: u16) {
        let t = flag_tables();
        let mut f = t.szp(self.b) & !PV;
        if val & 0x80 != 0 {
            f |= NF;
        }
        if k > 0xFF {
            f |= HF | CF;
        }
        f |= t.szp((k as u8 & 7) ^ self.b) & PV;
        self.f = f;
    }

    pub(crate) fn execute_ed<B: Bus>(&mut self, op: u8, bus: &mut B) {
        match op {
            // IN r, (C)
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x70 | 0x78 => {
                let port = self.bc();
                self.memptr = port.wrapping_add(1);
                let val = self.io_in(bus, port);
                self.f = (self.f & CF) | flag_tables().szp(val);
                let idx = (op >> 3) & 7;
                if idx != 6 {
                    // ED 70 is IN (C): flags only
                    self.set_reg8(idx, Prefix::None, val);
                }
            }
            // OUT (C), r
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79 => {
                let port = self.bc();
                self.memptr = port.wrapping_add(1);
                let idx = (op >> 3) & 7;
                let val = if idx == 6 {
                    // ED 71 is OUT (C) with a chip-family specific byte
                    OUT_C_VALUE
                }
                else {
                    self.reg8(idx, Prefix::None)
                };
                self.io_out(bus, port, val);
            }
            // SBC HL, dd / ADC HL, dd
            0x42 | 0x52 | 0x62 | 0x72 => {
                self.internal(7);
                let val = self.reg16((op >> 4) & 3, Prefix::None);
                self.sbc16(val);
            }
            0x4A | 0x5A | 0x6A | 0x7A => {
                self.internal(7);
                let val = self.reg16((op >> 4) & 3, Prefix::None);
                self.adc16(val);
            }
            // LD (nn), dd / LD dd, (nn)
            0x43 | 0x53 | 0x63 | 0x73 => {
                let addr = self.fetch_imm16(bus);
                self.memptr = addr.wrapping_add(1);
                let val = self.reg16((op >> 4) & 3, Prefix::None);
                self.write_mem16(bus, addr, val);
            }
            0x4B | 0x5B | 0x6B | 0x7B => {
                let addr = self.fetch_imm16(bus);
                self.memptr = addr.wrapping_add(1);
                let val = self.read_mem16(bus, addr);
                self.set_reg16((op >> 4) & 3, Prefix::None, val);
            }
            // NEG, documented and undocumented slots
            0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => {
                self.f = flag_tables().sbc(false, 0, self.a);
                self.a = 0u8.wrapping_sub(self.a);
            }
            // RETN / RETI and their undocumented aliases
            0x45 | 0x4D | 0x55 | 0x5D | 0x65 | 0x6D | 0x75 | 0x7D => {
                self.iff1 = self.iff2;
                self.pc = self.pop16(bus);
                self.memptr = self.pc;
            }
            // IM 0/1/2
            0x46 | 0x4E | 0x66 | 0x6E => self.im = IntMode::Im0,
            0x56 | 0x76 => self.im = IntMode::Im1,
            0x5E | 0x7E => self.im = IntMode::Im2,

            0x47 => { // LD I, A
                self.internal(1);
                self.i = self.a;
            }
            0x4F => { // LD R, A
                self.internal(1);
                self.r = self.a;
            }
            0x57 => { // LD A, I
                self.internal(1);
                self.a = self.i;
                let val = self.a;
                self.ld_a_ir_flags(bus, val);
            }
            0x5F => { // LD A, R
                self.internal(1);
                self.a = self.r;
                let val = self.a;
                self.ld_a_ir_flags(bus, val);
            }

            0x67 => { // RRD
                let addr = self.hl();
                self.memptr = addr.wrapping_add(1);
                let val = self.read_mem(bus, addr);
                self.internal(4);
                let res = (val >> 4) | (self.a << 4);
                self.a = (self.a & 0xF0) | (val & 0x0F);
                self.write_mem(bus, addr, res);
                self.f = (self.f & CF) | flag_tables().szp(self.a);
            }
            0x6F => { // RLD
                let addr = self.hl();
                self.memptr = addr.wrapping_add(1);
                let val = self.read_mem(bus, addr);
                self.internal(4);
                let res = (val << 4) | (self.a & 0x0F);
                self.a = (self.a & 0xF0) | (val >> 4);
                self.write_mem(bus, addr, res);
                self.f = (self.f & CF) | flag_tables().szp(self.a);
            }

            // block transfer
            0xA0 | 0xA8 | 0xB0 | 0xB8 => { // LDI / LDD / LDIR / LDDR
                let hl = self.hl();
                let de = self.de();
                let val = self.read_mem(bus, hl);
                self.write_mem(bus, de, val);
                self.internal(2);
                let delta = if op & 0x08 == 0 { 1u16 } else { 0xFFFF };
                self.set_hl(hl.wrapping_add(delta));
                self.set_de(de.wrapping_add(delta));
                let bc = self.bc().wrapping_sub(1);
                self.set_bc(bc);
                let n = val.wrapping_add(self.a);
                let mut f = (self.f & (SF | ZF | CF)) | (n & F3) | ((n << 4) & F5);
                if bc != 0 {
                    f |= PV;
                }
                self.f = f;
                if op & 0x10 != 0 && bc != 0 {
                    self.internal(5);
                    self.pc = self.pc.wrapping_sub(2);
                    self.memptr = self.pc.wrapping_add(1);
                }
            }
            // block compare
            0xA1 | 0xA9 | 0xB1 | 0xB9 => { // CPI / CPD / CPIR / CPDR
                let hl = self.hl();
                let val = self.read_mem(bus, hl);
                self.internal(5);
                let delta = if op & 0x08 == 0 { 1u16 } else { 0xFFFF };
                self.memptr = self.memptr.wrapping_add(delta);
                self.set_hl(hl.wrapping_add(delta));
                let bc = self.bc().wrapping_sub(1);
                self.set_bc(bc);
                let mut f = (self.f & CF) | flag_tables().cpb(self.a, val);
                if bc != 0 {
                    f |= PV;
                }
                self.f = f;
                if op & 0x10 != 0 && bc != 0 && f & ZF == 0 {
                    self.internal(5);
                    self.pc = self.pc.wrapping_sub(2);
                    self.memptr = self.pc.wrapping_add(1);
                }
            }
            // block input
            0xA2 | 0xAA | 0xB2 | 0xBA => { // INI / IND / INIR / INDR
                self.internal(1);
                let port = self.bc();
                let val = self.io_in(bus, port);
                let hl = self.hl();
                self.write_mem(bus, hl, val);
                let delta = if op & 0x08 == 0 { 1u16 } else { 0xFFFF };
                self.memptr = port.wrapping_add(delta);
                self.b = self.b.wrapping_sub(1);
                self.set_hl(hl.wrapping_add(delta));
                let k = val as u16 + (self.c.wrapping_add(delta as u8)) as u16;
                self.block_io_flags(val, k);
                if op & 0x10 != 0 && self.b != 0 {
                    self.internal(5);
                    self.pc = self.pc.wrapping_sub(2);
                }
            }
            // block output
            0xA3 | 0xAB | 0xB3 | 0xBB => { // OUTI / OUTD / OTIR / OTDR
                self.internal(1);
                let hl = self.hl();
                let val = self.read_mem(bus, hl);
                self.b = self.b.wrapping_sub(1);
                let port = self.bc();
                self.io_out(bus, port, val);
                let delta = if op & 0x08 == 0 { 1u16 } else { 0xFFFF };
                self.memptr = port.wrapping_add(delta);
                self.set_hl(hl.wrapping_add(delta));
                let k = val as u16 + self.l as u16;
                self.block_io_flags(val, k);
                if op & 0x10 != 0 && self.b != 0 {
                    self.internal(5);
                    self.pc = self.pc.wrapping_sub(2);
                }
            }

            // every other ED slot is an 8 T-state no-op
            _ => {}
        }
    }
}
