/*!
Instruction set: word formats, opcode tables, decode/encode, disassembly.

Every instruction is one 16-bit word. Bit 15 selects the format:

R-format (bit 15 = 0):
- bits 14..9: opcode (6 bits; `syscall` is 63)
- bits  8..6: dest register
- bits  5..3: op1 register
- bits  2..0: op2 register

I-format (bit 15 = 1):
- bits 14..13: opcode
- bits 12..10: register
- bits  9..0:  immediate (unsigned)

Both opcode sets are closed; decoding anything outside them is an explicit
error which the CPU treats as host-fatal. Encoding and decoding round-trip
for every legal opcode.
*/

use std::fmt;

use thiserror::Error;

/// Register display names, indexed by register code.
pub const REG_NAMES: [&str; 8] = ["r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7"];

/// Name of a register code. Codes come from 3-bit instruction fields.
#[inline]
pub fn reg_name(code: u8) -> &'static str {
    REG_NAMES[(code & 0x7) as usize]
}

/// Decode failure: the word's opcode field is outside the closed set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown R-format opcode {0}")]
    UnknownR(u16),
    #[error("unknown I-format opcode {0}")]
    UnknownI(u16),
}

/// R-format opcodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpR {
    Add,
    Sub,
    Mul,
    Div,
    CmpEqual,
    CmpNotEqual,
    Load,
    Store,
    Syscall,
}

impl OpR {
    pub const fn code(self) -> u16 {
        match self {
            OpR::Add => 0,
            OpR::Sub => 1,
            OpR::Mul => 2,
            OpR::Div => 3,
            OpR::CmpEqual => 4,
            OpR::CmpNotEqual => 5,
            OpR::Load => 15,
            OpR::Store => 16,
            OpR::Syscall => 63,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0 => OpR::Add,
            1 => OpR::Sub,
            2 => OpR::Mul,
            3 => OpR::Div,
            4 => OpR::CmpEqual,
            5 => OpR::CmpNotEqual,
            15 => OpR::Load,
            16 => OpR::Store,
            63 => OpR::Syscall,
            _ => return None,
        })
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            OpR::Add => "add",
            OpR::Sub => "sub",
            OpR::Mul => "mul",
            OpR::Div => "div",
            OpR::CmpEqual => "cmp_equal",
            OpR::CmpNotEqual => "cmp_neq",
            OpR::Load => "load",
            OpR::Store => "store",
            OpR::Syscall => "syscall",
        }
    }
}

/// I-format opcodes. Code 2 is unused on this machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpI {
    Jump,
    JumpCond,
    Mov,
}

impl OpI {
    pub const fn code(self) -> u16 {
        match self {
            OpI::Jump => 0,
            OpI::JumpCond => 1,
            OpI::Mov => 3,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0 => OpI::Jump,
            1 => OpI::JumpCond,
            3 => OpI::Mov,
            _ => return None,
        })
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            OpI::Jump => "jump",
            OpI::JumpCond => "jump_cond",
            OpI::Mov => "mov",
        }
    }
}

/// A decoded instruction. Register fields are 3-bit codes, the immediate is
/// the 10-bit unsigned I-format field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instr {
    R { op: OpR, dest: u8, op1: u8, op2: u8 },
    I { op: OpI, reg: u8, imm: u16 },
}

/// Decode one instruction word.
pub fn decode(word: u16) -> Result<Instr, DecodeError> {
    if word & 0x8000 == 0 {
        let code = (word >> 9) & 0x3F;
        let op = OpR::from_code(code).ok_or(DecodeError::UnknownR(code))?;
        Ok(Instr::R {
            op,
            dest: ((word >> 6) & 0x7) as u8,
            op1: ((word >> 3) & 0x7) as u8,
            op2: (word & 0x7) as u8,
        })
    } else {
        let code = (word >> 13) & 0x3;
        let op = OpI::from_code(code).ok_or(DecodeError::UnknownI(code))?;
        Ok(Instr::I {
            op,
            reg: ((word >> 10) & 0x7) as u8,
            imm: word & 0x3FF,
        })
    }
}

/// Encode an R-format instruction. Register codes are masked to 3 bits.
pub const fn encode_r(op: OpR, dest: u8, op1: u8, op2: u8) -> u16 {
    (op.code() << 9)
        | (((dest & 0x7) as u16) << 6)
        | (((op1 & 0x7) as u16) << 3)
        | ((op2 & 0x7) as u16)
}

/// Encode an I-format instruction. The immediate is masked to 10 bits.
pub const fn encode_i(op: OpI, reg: u8, imm: u16) -> u16 {
    0x8000 | (op.code() << 13) | (((reg & 0x7) as u16) << 10) | (imm & 0x3FF)
}

impl Instr {
    pub fn encode(self) -> u16 {
        match self {
            Instr::R { op, dest, op1, op2 } => encode_r(op, dest, op1, op2),
            Instr::I { op, reg, imm } => encode_i(op, reg, imm),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instr::R { op, dest, op1, op2 } => match op {
                OpR::Syscall => write!(f, "syscall"),
                OpR::Load => write!(f, "load {}, [{}]", reg_name(dest), reg_name(op1)),
                OpR::Store => write!(f, "store [{}], {}", reg_name(op1), reg_name(op2)),
                _ => write!(
                    f,
                    "{} {}, {}, {}",
                    op.mnemonic(),
                    reg_name(dest),
                    reg_name(op1),
                    reg_name(op2)
                ),
            },
            Instr::I { op, reg, imm } => match op {
                OpI::Jump => write!(f, "jump {imm}"),
                _ => write!(f, "{} {}, {}", op.mnemonic(), reg_name(reg), imm),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_R: [OpR; 9] = [
        OpR::Add,
        OpR::Sub,
        OpR::Mul,
        OpR::Div,
        OpR::CmpEqual,
        OpR::CmpNotEqual,
        OpR::Load,
        OpR::Store,
        OpR::Syscall,
    ];

    const ALL_I: [OpI; 3] = [OpI::Jump, OpI::JumpCond, OpI::Mov];

    #[test]
    fn r_format_round_trips() {
        for op in ALL_R {
            for dest in 0..8u8 {
                let instr = Instr::R {
                    op,
                    dest,
                    op1: (dest + 3) & 0x7,
                    op2: (dest + 5) & 0x7,
                };
                let word = instr.encode();
                assert_eq!(word & 0x8000, 0, "R-format keeps bit 15 clear");
                assert_eq!(decode(word), Ok(instr));
            }
        }
    }

    #[test]
    fn i_format_round_trips() {
        for op in ALL_I {
            for &imm in &[0u16, 1, 5, 0x3FF] {
                let instr = Instr::I { op, reg: 2, imm };
                let word = instr.encode();
                assert_ne!(word & 0x8000, 0, "I-format sets bit 15");
                assert_eq!(decode(word), Ok(instr));
            }
        }
    }

    #[test]
    fn known_encodings() {
        // add r0, r1, r2
        assert_eq!(encode_r(OpR::Add, 0, 1, 2), 0x000A);
        // syscall with all register fields zero
        assert_eq!(encode_r(OpR::Syscall, 0, 0, 0), 0x7E00);
        // jump 1: the idle process body
        assert_eq!(encode_i(OpI::Jump, 0, 1), 0x8001);
        // mov r1, 5
        assert_eq!(encode_i(OpI::Mov, 1, 5), 0xE405);
    }

    #[test]
    fn unknown_opcodes_are_errors() {
        // R-format opcode 6 is outside the closed set.
        assert_eq!(decode(6 << 9), Err(DecodeError::UnknownR(6)));
        // R-format opcode 62, just below syscall.
        assert_eq!(decode(62 << 9), Err(DecodeError::UnknownR(62)));
        // I-format opcode 2 is unused.
        assert_eq!(decode(0x8000 | (2 << 13)), Err(DecodeError::UnknownI(2)));
    }

    #[test]
    fn immediate_masks_to_ten_bits() {
        let word = encode_i(OpI::Mov, 0, 0xFFFF);
        match decode(word).unwrap() {
            Instr::I { imm, .. } => assert_eq!(imm, 0x3FF),
            other => panic!("expected I-format, got {other:?}"),
        }
    }

    #[test]
    fn disassembly() {
        let cases: [(u16, &str); 5] = [
            (encode_r(OpR::Add, 0, 1, 2), "add r0, r1, r2"),
            (encode_r(OpR::Load, 3, 4, 0), "load r3, [r4]"),
            (encode_r(OpR::Store, 0, 1, 2), "store [r1], r2"),
            (encode_i(OpI::Jump, 0, 17), "jump 17"),
            (encode_i(OpI::Mov, 5, 40), "mov r5, 40"),
        ];
        for (word, text) in cases {
            assert_eq!(decode(word).unwrap().to_string(), text);
        }
    }
}
