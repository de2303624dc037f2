/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! A lightweight control-flow instruction decoder for call tracing.
//!
//! Answers three questions for any instruction without allocating: what
//! kind of control flow it is, where it resolves to, and whether it is
//! taken given the current flags and registers. Stack-based targets (RET
//! and friends) are peeked through the caller-supplied reader.
use super::super::z80::{CF, PV, SF, ZF};

/// The classified control-flow kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CfType {
    Jp,
    Jr,
    Call,
    Ret,
    Reti,
    Rst,
    Djnz,
}

/// The decoded result: target, taken and total instruction length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CfResult {
    pub cf_type: CfType,
    pub target: u16,
    pub taken: bool,
    pub len: u8,
}

/// First-byte pre-filter: `true` when the byte can begin a control-flow
/// instruction, including the DD/FD/ED prefixes that lead to one.
#[inline]
pub fn is_cf_opcode(byte0: u8) -> bool {
    CF_OPCODE_TABLE[byte0 as usize]
}

static CF_OPCODE_TABLE: [bool; 256] = build_cf_table();

const fn build_cf_table() -> [bool; 256] {
    let mut table = [false; 256];
    table[0x10] = true; // DJNZ
    table[0x18] = true; // JR
    let mut op = 0x20;
    while op <= 0x38 {
        table[op] = true; // JR cc
        op += 8;
    }
    let mut op = 0xC0;
    while op <= 0xFF {
        match op & 7 {
            0 => table[op] = true,          // RET cc
            2 | 4 => table[op] = true,      // JP cc / CALL cc
            7 => table[op] = true,          // RST
            _ => {}
        }
        if op == 0xC3 || op == 0xC9 || op == 0xCD || op == 0xE9 {
            table[op] = true;               // JP / RET / CALL / JP (HL)
        }
        if op == 0xDD || op == 0xED || op == 0xFD {
            table[op] = true;               // prefixes
        }
        if op == 0xFF {
            break;
        }
        op += 1;
    }
    table
}

/// Evaluates the 3-bit condition code from bits 3..=5 of an opcode.
#[inline]
fn condition_met(cc: u8, flags: u8) -> bool {
    match cc {
        0 => flags & ZF == 0,
        1 => flags & ZF != 0,
        2 => flags & CF == 0,
        3 => flags & CF != 0,
        4 => flags & PV == 0,
        5 => flags & PV != 0,
        6 => flags & SF == 0,
        _ => flags & SF != 0,
    }
}

#[inline]
fn imm16(bytes: &[u8; 4], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

#[inline]
fn rel_target(pc: u16, offset: u8, len: u8) -> u16 {
    pc.wrapping_add(len as u16).wrapping_add(offset as i8 as u16)
}

/// Decodes a potential control-flow instruction at `pc`.
///
/// `bytes` holds at least the 4 raw bytes at `pc`; `stack_peek` reads the
/// return target for RET-class instructions. Returns `None` for anything
/// that does not transfer control.
#[allow(clippy::too_many_arguments)]
pub fn decode_control_flow<M>(
    bytes: &[u8; 4],
    pc: u16,
    flags: u8,
    b_reg: u8,
    sp: u16,
    hl: u16,
    ix: u16,
    iy: u16,
    stack_peek: M,
) -> Option<CfResult>
where
    M: Fn(u16) -> u8,
{
    let peek16 = |addr: u16| {
        u16::from_le_bytes([stack_peek(addr), stack_peek(addr.wrapping_add(1))])
    };
    let op = bytes[0];
    let result = match op {
        0xC3 => CfResult { cf_type: CfType::Jp, target: imm16(bytes, 1), taken: true, len: 3 },
        0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => CfResult {
            cf_type: CfType::Jp,
            target: imm16(bytes, 1),
            taken: condition_met((op >> 3) & 7, flags),
            len: 3,
        },
        0xE9 => CfResult { cf_type: CfType::Jp, target: hl, taken: true, len: 1 },
        0x18 => CfResult {
            cf_type: CfType::Jr,
            target: rel_target(pc, bytes[1], 2),
            taken: true,
            len: 2,
        },
        0x20 | 0x28 | 0x30 | 0x38 => CfResult {
            cf_type: CfType::Jr,
            target: rel_target(pc, bytes[1], 2),
            taken: condition_met((op >> 3) & 3, flags),
            len: 2,
        },
        0x10 => CfResult {
            cf_type: CfType::Djnz,
            target: rel_target(pc, bytes[1], 2),
            taken: b_reg.wrapping_sub(1) != 0,
            len: 2,
        },
        0xCD => CfResult { cf_type: CfType::Call, target: imm16(bytes, 1), taken: true, len: 3 },
        0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => CfResult {
            cf_type: CfType::Call,
            target: imm16(bytes, 1),
            taken: condition_met((op >> 3) & 7, flags),
            len: 3,
        },
        0xC9 => CfResult { cf_type: CfType::Ret, target: peek16(sp), taken: true, len: 1 },
        0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => CfResult {
            cf_type: CfType::Ret,
            target: peek16(sp),
            taken: condition_met((op >> 3) & 7, flags),
            len: 1,
        },
        0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => CfResult {
            cf_type: CfType::Rst,
            target: (op & 0x38) as u16,
            taken: true,
            len: 1,
        },
        0xDD | 0xFD => {
            // only JP (IX) / JP (IY) transfer control under these prefixes
            if bytes[1] != 0xE9 {
                return None;
            }
            let target = if op == 0xDD { ix } else { iy };
            CfResult { cf_type: CfType::Jp, target, taken: true, len: 2 }
        }
        0xED => match bytes[1] {
            // RETI and its undocumented aliases
            0x4D | 0x5D | 0x6D | 0x7D => CfResult {
                cf_type: CfType::Reti,
                target: peek16(sp),
                taken: true,
                len: 2,
            },
            // RETN and its undocumented aliases classify as RET
            0x45 | 0x55 | 0x65 | 0x75 => CfResult {
                cf_type: CfType::Ret,
                target: peek16(sp),
                taken: true,
                len: 2,
            },
            _ => return None,
        },
        _ => return None,
    };
    Some(result)
}
