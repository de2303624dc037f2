/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Execution of the unprefixed and DD/FD-prefixed opcode space.
use super::*;
use super::tables::flag_tables;

impl Z80 {
    /// Reads an 8-bit register by its 3-bit operand index (6 excluded).
    ///
    /// Under a DD/FD prefix indices 4 and 5 address the index register
    /// halves instead of H and L.
    #[inline]
    pub(crate) fn reg8(&self, idx: u8, prefix: Prefix) -> u8 {
        match idx {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => match prefix {
                Prefix::None => self.h,
                Prefix::Ix => (self.ix >> 8) as u8,
                Prefix::Iy => (self.iy >> 8) as u8
            },
            5 => match prefix {
                Prefix::None => self.l,
                Prefix::Ix => self.ix as u8,
                Prefix::Iy => self.iy as u8
            },
            7 => self.a,
            _ => unreachable!("(HL) operand must be handled by the caller")
        }
    }

    #[inline]
    pub(crate) fn set_reg8(&mut self, idx: u8, prefix: Prefix, val: u8) {
        match idx {
            0 => self.b = val,
            1 => self.c = val,
            2 => self.d = val,
            3 => self.e = val,
            4 => match prefix {
                Prefix::None => self.h = val,
                Prefix::Ix => self.ix = (self.ix & 0x00FF) | (val as u16) << 8,
                Prefix::Iy => self.iy = (self.iy & 0x00FF) | (val as u16) << 8
            },
            5 => match prefix {
                Prefix::None => self.l = val,
                Prefix::Ix => self.ix = (self.ix & 0xFF00) | val as u16,
                Prefix::Iy => self.iy = (self.iy & 0xFF00) | val as u16
            },
            7 => self.a = val,
            _ => unreachable!("(HL) operand must be handled by the caller")
        }
    }

    /// 16-bit register by the 2-bit `dd` operand index, SP variant.
    #[inline]
    pub(crate) fn reg16(&self, idx: u8, prefix: Prefix) -> u16 {
        match idx {
            0 => self.bc(),
            1 => self.de(),
            2 => self.idx_reg(prefix),
            _ => self.sp
        }
    }

    #[inline]
    pub(crate) fn set_reg16(&mut self, idx: u8, prefix: Prefix, val: u16) {
        match idx {
            0 => self.set_bc(val),
            1 => self.set_de(val),
            2 => self.set_idx_reg(prefix, val),
            _ => self.sp = val
        }
    }

    /// The effective address of a `(HL)` / `(IX+d)` / `(IY+d)` operand.
    ///
    /// For the indexed forms this fetches the displacement byte and burns
    /// the 5 internal address-adding cycles.
    #[inline]
    pub(crate) fn idx_addr<B: Bus>(&mut self, bus: &mut B, prefix: Prefix) -> u16 {
        match prefix {
            Prefix::None => self.hl(),
            _ => {
                let d = self.fetch_imm8(bus) as i8;
                self.internal(5);
                let addr = self.idx_reg(prefix).wrapping_add(d as u16);
                self.memptr = addr;
                addr
            }
        }
    }

    /// Condition code by the 3-bit `cc` operand index.
    #[inline]
    pub(crate) fn condition(&self, cc: u8) -> bool {
        match cc {
            0 => self.f & ZF == 0,
            1 => self.f & ZF != 0,
            2 => self.f & CF == 0,
            3 => self.f & CF != 0,
            4 => self.f & PV == 0,
            5 => self.f & PV != 0,
            6 => self.f & SF == 0,
            _ => self.f & SF != 0
        }
    }

    /// The eight accumulator ALU operations by the 3-bit operation index.
    #[inline]
    pub(crate) fn alu_op(&mut self, op: u8, val: u8) {
        let t = flag_tables();
        match op {
            0 => { // ADD
                self.f = t.adc(false, self.a, val);
                self.a = self.a.wrapping_add(val);
            }
            1 => { // ADC
                let carry = self.f & CF != 0;
                self.f = t.adc(carry, self.a, val);
                self.a = self.a.wrapping_add(val).wrapping_add(carry as u8);
            }
            2 => { // SUB
                self.f = t.sbc(false, self.a, val);
                self.a = self.a.wrapping_sub(val);
            }
            3 => { // SBC
                let carry = self.f & CF != 0;
                self.f = t.sbc(carry, self.a, val);
                self.a = self.a.wrapping_sub(val).wrapping_sub(carry as u8);
            }
            4 => { // AND
                self.a &= val;
                self.f = t.szp(self.a) | HF;
            }
            5 => { // XOR
                self.a ^= val;
                self.f = t.szp(self.a);
            }
            6 => { // OR
                self.a |= val;
                self.f = t.szp(self.a);
            }
            _ => { // CP
                self.f = t.cp(self.a, val);
            }
        }
    }

    #[inline]
    fn inc8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_add(1);
        self.f = (self.f & CF) | flag_tables().inc(res);
        res
    }

    #[inline]
    fn dec8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_sub(1);
        self.f = (self.f & CF) | flag_tables().dec(res);
        res
    }

    fn add16(&mut self, prefix: Prefix, val: u16) {
        let acc = self.idx_reg(prefix);
        let res = acc as u32 + val as u32;
        let mut f = self.f & (SF | ZF | PV);
        f |= ((res >> 8) as u8) & (F3 | F5);
        if res > 0xFFFF {
            f |= CF;
        }
        if ((acc & 0x0FFF) + (val & 0x0FFF)) & 0x1000 != 0 {
            f |= HF;
        }
        self.memptr = acc.wrapping_add(1);
        self.set_idx_reg(prefix, res as u16);
        self.f = f;
    }

    fn daa(&mut self) {
        let a = self.a;
        let mut correction = 0u8;
        let mut cf_out = self.f & CF;
        if self.f & HF != 0 || a & 0x0F > 9 {
            correction |= 0x06;
        }
        if cf_out != 0 || a > 0x99 {
            correction |= 0x60;
            cf_out = CF;
        }
        let res = if self.f & NF != 0 {
            a.wrapping_sub(correction)
        }
        else {
            a.wrapping_add(correction)
        };
        let hf = if self.f & NF != 0 {
            if self.f & HF != 0 && a & 0x0F < 6 { HF } else { 0 }
        }
        else if a & 0x0F > 9 { HF } else { 0 };
        self.a = res;
        self.f = flag_tables().szp(res) | cf_out | (self.f & NF) | hf;
    }

    fn jr_rel<B: Bus>(&mut self, bus: &mut B, taken: bool) {
        let offset = self.fetch_imm8(bus) as i8;
        if taken {
            self.internal(5);
            self.pc = self.pc.wrapping_add(offset as u16);
            self.memptr = self.pc;
        }
    }

    /// Executes one opcode of the main (or DD/FD-shifted) opcode space.
    pub(crate) fn execute_main<B: Bus>(&mut self, op: u8, bus: &mut B, prefix: Prefix) {
        match op {
            0x00 => {} // NOP

            0x76 => { // HALT
                self.halted = true;
            }
            // 8-bit loads: LD r,r' / LD r,(HL) / LD (HL),r
            0x40..=0x7F => {
                let dst = (op >> 3) & 7;
                let src = op & 7;
                if src == 6 {
                    let addr = self.idx_addr(bus, prefix);
                    let val = self.read_mem(bus, addr);
                    // the register operand is never an index half here
                    self.set_reg8(dst, Prefix::None, val);
                }
                else if dst == 6 {
                    let addr = self.idx_addr(bus, prefix);
                    let val = self.reg8(src, Prefix::None);
                    self.write_mem(bus, addr, val);
                }
                else {
                    let val = self.reg8(src, prefix);
                    self.set_reg8(dst, prefix, val);
                }
            }

            // ALU A, r / (HL)
            0x80..=0xBF => {
                let src = op & 7;
                let val = if src == 6 {
                    let addr = self.idx_addr(bus, prefix);
                    self.read_mem(bus, addr)
                }
                else {
                    self.reg8(src, prefix)
                };
                self.alu_op((op >> 3) & 7, val);
            }
            // ALU A, n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let val = self.fetch_imm8(bus);
                self.alu_op((op >> 3) & 7, val);
            }

            // LD r, n / LD (HL), n
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let dst = (op >> 3) & 7;
                if dst == 6 {
                    // LD (IX+d),n fetches d and n back to back
                    let addr = match prefix {
                        Prefix::None => self.hl(),
                        _ => {
                            let d = self.fetch_imm8(bus) as i8;
                            let addr = self.idx_reg(prefix).wrapping_add(d as u16);
                            self.memptr = addr;
                            addr
                        }
                    };
                    let val = self.fetch_imm8(bus);
                    if prefix != Prefix::None {
                        self.internal(2);
                    }
                    self.write_mem(bus, addr, val);
                }
                else {
                    let val = self.fetch_imm8(bus);
                    self.set_reg8(dst, prefix, val);
                }
            }

            // INC r / INC (HL)
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let dst = (op >> 3) & 7;
                if dst == 6 {
                    let addr = self.idx_addr(bus, prefix);
                    let val = self.read_mem(bus, addr);
                    self.internal(1);
                    let res = self.inc8(val);
                    self.write_mem(bus, addr, res);
                }
                else {
                    let res = self.inc8(self.reg8(dst, prefix));
                    self.set_reg8(dst, prefix, res);
                }
            }
            // DEC r / DEC (HL)
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let dst = (op >> 3) & 7;
                if dst == 6 {
                    let addr = self.idx_addr(bus, prefix);
                    let val = self.read_mem(bus, addr);
                    self.internal(1);
                    let res = self.dec8(val);
                    self.write_mem(bus, addr, res);
                }
                else {
                    let res = self.dec8(self.reg8(dst, prefix));
                    self.set_reg8(dst, prefix, res);
                }
            }

            // 16-bit loads and arithmetic
            0x01 | 0x11 | 0x21 | 0x31 => { // LD dd, nn
                let val = self.fetch_imm16(bus);
                self.set_reg16((op >> 4) & 3, prefix, val);
            }
            0x09 | 0x19 | 0x29 | 0x39 => { // ADD HL, dd
                self.internal(7);
                let val = self.reg16((op >> 4) & 3, prefix);
                self.add16(prefix, val);
            }
            0x03 | 0x13 | 0x23 | 0x33 => { // INC dd
                self.internal(2);
                let idx = (op >> 4) & 3;
                let val = self.reg16(idx, prefix).wrapping_add(1);
                self.set_reg16(idx, prefix, val);
            }
            0x0B | 0x1B | 0x2B | 0x3B => { // DEC dd
                self.internal(2);
                let idx = (op >> 4) & 3;
                let val = self.reg16(idx, prefix).wrapping_sub(1);
                self.set_reg16(idx, prefix, val);
            }

            0x02 => { // LD (BC), A
                let addr = self.bc();
                self.memptr = (addr.wrapping_add(1) & 0xFF) | (self.a as u16) << 8;
                self.write_mem(bus, addr, self.a);
            }
            0x12 => { // LD (DE), A
                let addr = self.de();
                self.memptr = (addr.wrapping_add(1) & 0xFF) | (self.a as u16) << 8;
                self.write_mem(bus, addr, self.a);
            }
            0x0A => { // LD A, (BC)
                let addr = self.bc();
                self.memptr = addr.wrapping_add(1);
                self.a = self.read_mem(bus, addr);
            }
            0x1A => { // LD A, (DE)
                let addr = self.de();
                self.memptr = addr.wrapping_add(1);
                self.a = self.read_mem(bus, addr);
            }
            0x22 => { // LD (nn), HL
                let addr = self.fetch_imm16(bus);
                self.memptr = addr.wrapping_add(1);
                let val = self.idx_reg(prefix);
                self.write_mem16(bus, addr, val);
            }
            0x2A => { // LD HL, (nn)
                let addr = self.fetch_imm16(bus);
                self.memptr = addr.wrapping_add(1);
                let val = self.read_mem16(bus, addr);
                self.set_idx_reg(prefix, val);
            }
            0x32 => { // LD (nn), A
                let addr = self.fetch_imm16(bus);
                self.memptr = (addr.wrapping_add(1) & 0xFF) | (self.a as u16) << 8;
                self.write_mem(bus, addr, self.a);
            }
            0x3A => { // LD A, (nn)
                let addr = self.fetch_imm16(bus);
                self.memptr = addr.wrapping_add(1);
                self.a = self.read_mem(bus, addr);
            }

            // rotates and flag ops on A
            0x07 => { // RLCA
                let carry = self.a >> 7;
                self.a = self.a.rotate_left(1);
                self.f = (self.f & (SF | ZF | PV)) | (self.a & (F3 | F5)) | carry;
            }
            0x0F => { // RRCA
                let carry = self.a & 1;
                self.a = self.a.rotate_right(1);
                self.f = (self.f & (SF | ZF | PV)) | (self.a & (F3 | F5)) | carry;
            }
            0x17 => { // RLA
                let carry = self.a >> 7;
                self.a = (self.a << 1) | (self.f & CF);
                self.f = (self.f & (SF | ZF | PV)) | (self.a & (F3 | F5)) | carry;
            }
            0x1F => { // RRA
                let carry = self.a & 1;
                self.a = (self.a >> 1) | ((self.f & CF) << 7);
                self.f = (self.f & (SF | ZF | PV)) | (self.a & (F3 | F5)) | carry;
            }
            0x27 => self.daa(),
            0x2F => { // CPL
                self.a = !self.a;
                self.f = (self.f & (SF | ZF | PV | CF)) | HF | NF | (self.a & (F3 | F5));
            }
            0x37 => { // SCF
                self.f = (self.f & (SF | ZF | PV)) | CF | (self.a & (F3 | F5));
            }
            0x3F => { // CCF
                let old_carry = self.f & CF;
                self.f = (self.f & (SF | ZF | PV)) | (old_carry << 4)
                       | (self.a & (F3 | F5)) | (old_carry ^ CF);
            }

            // jumps, calls and returns
            0x18 => self.jr_rel(bus, true), // JR e
            0x20 | 0x28 | 0x30 | 0x38 => { // JR cc, e
                let taken = self.condition((op >> 3) & 3);
                self.jr_rel(bus, taken);
            }
            0x10 => { // DJNZ e
                self.internal(1);
                self.b = self.b.wrapping_sub(1);
                self.jr_rel(bus, self.b != 0);
            }
            0xC3 => { // JP nn
                self.pc = self.fetch_imm16(bus);
                self.memptr = self.pc;
            }
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => { // JP cc, nn
                let target = self.fetch_imm16(bus);
                self.memptr = target;
                if self.condition((op >> 3) & 7) {
                    self.pc = target;
                }
            }
            0xE9 => { // JP (HL) / (IX) / (IY)
                self.pc = self.idx_reg(prefix);
            }
            0xCD => { // CALL nn
                let target = self.fetch_imm16(bus);
                self.memptr = target;
                self.internal(1);
                self.push16(bus, self.pc);
                self.pc = target;
            }
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => { // CALL cc, nn
                let target = self.fetch_imm16(bus);
                self.memptr = target;
                if self.condition((op >> 3) & 7) {
                    self.internal(1);
                    self.push16(bus, self.pc);
                    self.pc = target;
                }
            }
            0xC9 => { // RET
                self.pc = self.pop16(bus);
                self.memptr = self.pc;
            }
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => { // RET cc
                self.internal(1);
                if self.condition((op >> 3) & 7) {
                    self.pc = self.pop16(bus);
                    self.memptr = self.pc;
                }
            }
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => { // RST p
                self.internal(1);
                self.push16(bus, self.pc);
                self.pc = (op & 0x38) as u16;
                self.memptr = self.pc;
            }

            // stack and exchanges
            0xC5 => { self.internal(1); let val = self.bc(); self.push16(bus, val) }
            0xD5 => { self.internal(1); let val = self.de(); self.push16(bus, val) }
            0xE5 => { self.internal(1); let val = self.idx_reg(prefix); self.push16(bus, val) }
            0xF5 => { self.internal(1); let val = self.af(); self.push16(bus, val) }
            0xC1 => { let val = self.pop16(bus); self.set_bc(val) }
            0xD1 => { let val = self.pop16(bus); self.set_de(val) }
            0xE1 => { let val = self.pop16(bus); self.set_idx_reg(prefix, val) }
            0xF1 => { let val = self.pop16(bus); self.set_af(val) }
            0xEB => { // EX DE, HL (never IX/IY)
                let de = self.de();
                let hl = self.hl();
                self.set_de(hl);
                self.set_hl(de);
            }
            0x08 => { // EX AF, AF'
                core::mem::swap(&mut self.a, &mut self.a_alt);
                core::mem::swap(&mut self.f, &mut self.f_alt);
            }
            0xD9 => { // EXX
                core::mem::swap(&mut self.b, &mut self.b_alt);
                core::mem::swap(&mut self.c, &mut self.c_alt);
                core::mem::swap(&mut self.d, &mut self.d_alt);
                core::mem::swap(&mut self.e, &mut self.e_alt);
                core::mem::swap(&mut self.h, &mut self.h_alt);
                core::mem::swap(&mut self.l, &mut self.l_alt);
            }
            0xE3 => { // EX (SP), HL
                let sp = self.sp;
                let val = self.read_mem16(bus, sp);
                self.internal(1);
                let reg = self.idx_reg(prefix);
                self.write_mem(bus, sp.wrapping_add(1), (reg >> 8) as u8);
                self.write_mem(bus, sp, reg as u8);
                self.internal(2);
                self.set_idx_reg(prefix, val);
                self.memptr = val;
            }
            0xF9 => { // LD SP, HL
                self.internal(2);
                self.sp = self.idx_reg(prefix);
            }

            // I/O
            0xD3 => { // OUT (n), A
                let lo = self.fetch_imm8(bus);
                let port = u16::from_le_bytes([lo, self.a]);
                self.memptr = (port & 0xFF00) | (lo.wrapping_add(1) as u16);
                self.io_out(bus, port, self.a);
            }
            0xDB => { // IN A, (n)
                let lo = self.fetch_imm8(bus);
                let port = u16::from_le_bytes([lo, self.a]);
                self.memptr = port.wrapping_add(1);
                self.a = self.io_in(bus, port);
            }

            // interrupt control
            0xF3 => { // DI
                self.iff1 = false;
                self.iff2 = false;
            }
            0xFB => { // EI
                self.iff1 = true;
                self.iff2 = true;
                self.eipos = self.t;
            }

            // prefixes
            0xCB => self.execute_cb(bus, prefix),
            0xED => {
                let op2 = self.fetch_op(bus);
                self.execute_ed(op2, bus);
            }
            0xDD | 0xFD => {
                let mut pfx = if op == 0xDD { Prefix::Ix } else { Prefix::Iy };
                loop {
                    let op2 = self.fetch_op(bus);
                    match op2 {
                        0xDD => pfx = Prefix::Ix,
                        0xFD => pfx = Prefix::Iy,
                        _ => {
                            self.execute_main(op2, bus, pfx);
                            break;
                        }
                    }
                }
            }
        }
    }
}
