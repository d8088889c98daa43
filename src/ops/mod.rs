pub mod mnemonics;

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder};
use log::trace;

use crate::errors::bytecode::{BytecodeCause, BytecodeError};
use mnemonics::Mnemonic;

/// A decoded operand. Branch operands are stored as absolute PCs, and
/// `wide`-prefixed forms land here already expanded to 16-bit indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Immediate(i32),
    PoolIndex(u16),
    Slot(u16),
    Jump(u32),
    Inc { slot: u16, delta: i16 },
    ArrayType(u8),
    Dims(u8),
    Count(u8),
    Table(TableSwitch),
    Lookup(LookupSwitch),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSwitch {
    pub default: u32,
    pub low: i32,
    pub high: i32,
    pub targets: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSwitch {
    pub default: u32,
    pub pairs: Vec<(i32, u32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub pc: u32,
    pub mnemonic: Mnemonic,
    pub operands: Vec<Operand>,
    pub width: u32,
}

impl Instruction {
    pub fn pool_index(&self) -> Option<u16> {
        self.operands.iter().find_map(|o| match o {
            Operand::PoolIndex(i) => Some(*i),
            _ => None,
        })
    }

    pub fn slot(&self) -> Option<u16> {
        self.operands.iter().find_map(|o| match o {
            Operand::Slot(i) => Some(*i),
            _ => None,
        })
    }

    pub fn jump_target(&self) -> Option<u32> {
        self.operands.iter().find_map(|o| match o {
            Operand::Jump(t) => Some(*t),
            _ => None,
        })
    }

    pub fn immediate(&self) -> Option<i32> {
        self.operands.iter().find_map(|o| match o {
            Operand::Immediate(v) => Some(*v),
            _ => None,
        })
    }

    pub fn table_switch(&self) -> Option<&TableSwitch> {
        self.operands.iter().find_map(|o| match o {
            Operand::Table(t) => Some(t),
            _ => None,
        })
    }

    pub fn lookup_switch(&self) -> Option<&LookupSwitch> {
        self.operands.iter().find_map(|o| match o {
            Operand::Lookup(t) => Some(t),
            _ => None,
        })
    }

    /// PC of the instruction that follows this one in the byte stream.
    pub fn next_pc(&self) -> u32 {
        self.pc + self.width
    }
}

/// The decoded body of one `Code` attribute: every instruction in PC
/// order, plus a map back from PC to list index.
#[derive(Debug)]
pub struct CodeListing {
    pub instructions: Vec<Instruction>,
    index_by_pc: HashMap<u32, usize>,
    pub code_length: u32,
}

impl CodeListing {
    pub fn decode(code: &[u8]) -> Result<CodeListing, BytecodeError> {
        let mut instructions = Vec::new();
        let mut index_by_pc = HashMap::new();
        let mut cursor = CodeCursor {
            bytes: code,
            pos: 0,
            instruction_pc: 0,
        };
        while cursor.pos < code.len() {
            let pc = cursor.pos as u32;
            cursor.instruction_pc = pc;
            let instruction = decode_instruction(&mut cursor, pc)?;
            trace!("{pc}: {}", instruction.mnemonic);
            index_by_pc.insert(pc, instructions.len());
            instructions.push(instruction);
        }
        Ok(CodeListing {
            instructions,
            index_by_pc,
            code_length: code.len() as u32,
        })
    }

    pub fn index_of_pc(&self, pc: u32) -> Option<usize> {
        self.index_by_pc.get(&pc).copied()
    }

    pub fn at_pc(&self, pc: u32) -> Option<&Instruction> {
        self.index_of_pc(pc).map(|i| &self.instructions[i])
    }
}

struct CodeCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    instruction_pc: u32,
}

impl<'a> CodeCursor<'a> {
    fn truncated(&self) -> BytecodeError {
        BytecodeError::new(
            BytecodeCause::TruncatedInstruction {
                pc: self.instruction_pc,
            },
            "instruction runs past the end of the code array",
        )
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], BytecodeError> {
        if self.bytes.len() - self.pos < count {
            return Err(self.truncated());
        }
        let slice = &self.bytes[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    fn u1(&mut self) -> Result<u8, BytecodeError> {
        Ok(self.take(1)?[0])
    }

    fn i1(&mut self) -> Result<i8, BytecodeError> {
        Ok(self.take(1)?[0] as i8)
    }

    fn u2(&mut self) -> Result<u16, BytecodeError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    fn i2(&mut self) -> Result<i16, BytecodeError> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    fn i4(&mut self) -> Result<i32, BytecodeError> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    /// Branch offsets are relative to the opcode of their instruction.
    fn branch_target(&self, offset: i64) -> Result<u32, BytecodeError> {
        let target = i64::from(self.instruction_pc) + offset;
        if target < 0 || target >= self.bytes.len() as i64 {
            return Err(BytecodeError::new(
                BytecodeCause::InvalidBranchTarget {
                    pc: self.instruction_pc,
                    target: target.max(0) as u32,
                },
                "branch target outside the code array",
            ));
        }
        Ok(target as u32)
    }
}

fn decode_instruction(cursor: &mut CodeCursor, pc: u32) -> Result<Instruction, BytecodeError> {
    let opcode = cursor.u1()?;
    let mnemonic = Mnemonic::from(opcode);
    let operands = match mnemonic {
        Mnemonic::Unknown(opcode) => {
            return Err(BytecodeError::new(
                BytecodeCause::UnknownOpcode { pc, opcode },
                "opcode is not defined by the JVM specification",
            ));
        }
        Mnemonic::Bipush => vec![Operand::Immediate(i32::from(cursor.i1()?))],
        Mnemonic::Sipush => vec![Operand::Immediate(i32::from(cursor.i2()?))],
        Mnemonic::Ldc => vec![Operand::PoolIndex(u16::from(cursor.u1()?))],
        Mnemonic::LdcW | Mnemonic::Ldc2W => vec![Operand::PoolIndex(cursor.u2()?)],
        Mnemonic::Iload
        | Mnemonic::Lload
        | Mnemonic::Fload
        | Mnemonic::Dload
        | Mnemonic::Aload
        | Mnemonic::Istore
        | Mnemonic::Lstore
        | Mnemonic::Fstore
        | Mnemonic::Dstore
        | Mnemonic::Astore
        | Mnemonic::Ret => vec![Operand::Slot(u16::from(cursor.u1()?))],
        Mnemonic::Iinc => {
            let slot = u16::from(cursor.u1()?);
            let delta = i16::from(cursor.i1()?);
            vec![Operand::Inc { slot, delta }]
        }
        Mnemonic::Ifeq
        | Mnemonic::Ifne
        | Mnemonic::Iflt
        | Mnemonic::Ifge
        | Mnemonic::Ifgt
        | Mnemonic::Ifle
        | Mnemonic::IfIcmpeq
        | Mnemonic::IfIcmpne
        | Mnemonic::IfIcmplt
        | Mnemonic::IfIcmpge
        | Mnemonic::IfIcmpgt
        | Mnemonic::IfIcmple
        | Mnemonic::IfAcmpeq
        | Mnemonic::IfAcmpne
        | Mnemonic::Ifnull
        | Mnemonic::Ifnonnull
        | Mnemonic::Goto
        | Mnemonic::Jsr => {
            let offset = i64::from(cursor.i2()?);
            vec![Operand::Jump(cursor.branch_target(offset)?)]
        }
        Mnemonic::GotoW | Mnemonic::JsrW => {
            let offset = i64::from(cursor.i4()?);
            vec![Operand::Jump(cursor.branch_target(offset)?)]
        }
        Mnemonic::Tableswitch => vec![decode_tableswitch(cursor, pc)?],
        Mnemonic::Lookupswitch => vec![decode_lookupswitch(cursor, pc)?],
        Mnemonic::Getstatic
        | Mnemonic::Putstatic
        | Mnemonic::Getfield
        | Mnemonic::Putfield
        | Mnemonic::Invokevirtual
        | Mnemonic::Invokespecial
        | Mnemonic::Invokestatic
        | Mnemonic::New
        | Mnemonic::Anewarray
        | Mnemonic::Checkcast
        | Mnemonic::Instanceof => vec![Operand::PoolIndex(cursor.u2()?)],
        Mnemonic::Invokeinterface => {
            let index = cursor.u2()?;
            let count = cursor.u1()?;
            cursor.u1()?;
            vec![Operand::PoolIndex(index), Operand::Count(count)]
        }
        Mnemonic::Invokedynamic => {
            let index = cursor.u2()?;
            cursor.u2()?;
            vec![Operand::PoolIndex(index)]
        }
        Mnemonic::Newarray => {
            let atype = cursor.u1()?;
            if !(4..=11).contains(&atype) {
                return Err(BytecodeError::new(
                    BytecodeCause::InvalidOperand { pc },
                    "newarray type code must be in 4..=11",
                ));
            }
            vec![Operand::ArrayType(atype)]
        }
        Mnemonic::Multianewarray => {
            let index = cursor.u2()?;
            let dims = cursor.u1()?;
            vec![Operand::PoolIndex(index), Operand::Dims(dims)]
        }
        Mnemonic::Wide => return decode_wide(cursor, pc),
        // Everything else carries its operands on the stack.
        _ => vec![],
    };
    let width = cursor.pos as u32 - pc;
    Ok(Instruction {
        pc,
        mnemonic,
        operands,
        width,
    })
}

/// `wide` rewrites the following load, store, `ret`, or `iinc` to 16-bit
/// local indices. The folded instruction keeps the inner mnemonic.
fn decode_wide(cursor: &mut CodeCursor, pc: u32) -> Result<Instruction, BytecodeError> {
    let inner = Mnemonic::from(cursor.u1()?);
    let operands = match inner {
        Mnemonic::Iload
        | Mnemonic::Lload
        | Mnemonic::Fload
        | Mnemonic::Dload
        | Mnemonic::Aload
        | Mnemonic::Istore
        | Mnemonic::Lstore
        | Mnemonic::Fstore
        | Mnemonic::Dstore
        | Mnemonic::Astore
        | Mnemonic::Ret => vec![Operand::Slot(cursor.u2()?)],
        Mnemonic::Iinc => {
            let slot = cursor.u2()?;
            let delta = cursor.i2()?;
            vec![Operand::Inc { slot, delta }]
        }
        _ => {
            return Err(BytecodeError::new(
                BytecodeCause::InvalidOperand { pc },
                "wide may only prefix a load, store, ret, or iinc",
            ));
        }
    };
    let width = cursor.pos as u32 - pc;
    Ok(Instruction {
        pc,
        mnemonic: inner,
        operands,
        width,
    })
}

fn decode_tableswitch(cursor: &mut CodeCursor, pc: u32) -> Result<Operand, BytecodeError> {
    skip_switch_padding(cursor)?;
    let default = cursor.i4()?;
    let low = cursor.i4()?;
    let high = cursor.i4()?;
    // `low == high + 1` is the degenerate zero-case table.
    let count = i64::from(high) - i64::from(low) + 1;
    if !(0..=u16::MAX as i64).contains(&count) {
        return Err(BytecodeError::new(
            BytecodeCause::InvalidSwitchLayout { pc },
            "tableswitch bounds are inverted",
        ));
    }
    let mut targets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let offset = cursor.i4()?;
        targets.push(cursor.branch_target(i64::from(offset))?);
    }
    Ok(Operand::Table(TableSwitch {
        default: cursor.branch_target(i64::from(default))?,
        low,
        high,
        targets,
    }))
}

fn decode_lookupswitch(cursor: &mut CodeCursor, pc: u32) -> Result<Operand, BytecodeError> {
    skip_switch_padding(cursor)?;
    let default = cursor.i4()?;
    let npairs = cursor.i4()?;
    if npairs < 0 {
        return Err(BytecodeError::new(
            BytecodeCause::InvalidSwitchLayout { pc },
            "lookupswitch pair count is negative",
        ));
    }
    let mut pairs = Vec::with_capacity(npairs as usize);
    let mut previous: Option<i32> = None;
    for _ in 0..npairs {
        let key = cursor.i4()?;
        // Match keys must be sorted strictly ascending.
        if previous.is_some_and(|p| p >= key) {
            return Err(BytecodeError::new(
                BytecodeCause::InvalidSwitchLayout { pc },
                "lookupswitch keys are not sorted",
            ));
        }
        previous = Some(key);
        let offset = cursor.i4()?;
        pairs.push((key, cursor.branch_target(i64::from(offset))?));
    }
    Ok(Operand::Lookup(LookupSwitch {
        default: cursor.branch_target(i64::from(default))?,
        pairs,
    }))
}

fn skip_switch_padding(cursor: &mut CodeCursor) -> Result<(), BytecodeError> {
    // Operands start at the next multiple of four from the method start.
    while cursor.pos % 4 != 0 {
        cursor.u1()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_sum_to_code_length() {
        // iload_1, iload_2, iadd, ireturn
        let code = [0x1B, 0x1C, 0x60, 0xAC];
        let listing = CodeListing::decode(&code).unwrap();
        assert_eq!(listing.instructions.len(), 4);
        let total: u32 = listing.instructions.iter().map(|i| i.width).sum();
        assert_eq!(total, listing.code_length);
    }

    #[test]
    fn branch_targets_are_absolute() {
        // 0: iload_1, 1: ifeq +5 (-> 6), 4: iconst_0, 5: ireturn,
        // 6: iconst_1, 7: ireturn
        let code = [0x1B, 0x99, 0x00, 0x05, 0x03, 0xAC, 0x04, 0xAC];
        let listing = CodeListing::decode(&code).unwrap();
        assert_eq!(listing.at_pc(1).unwrap().jump_target(), Some(6));
    }

    #[test]
    fn wide_iinc_expands_to_sixteen_bits() {
        // wide iinc 300, 1000 then return
        let code = [0xC4, 0x84, 0x01, 0x2C, 0x03, 0xE8, 0xB1];
        let listing = CodeListing::decode(&code).unwrap();
        let inc = &listing.instructions[0];
        assert_eq!(inc.mnemonic, Mnemonic::Iinc);
        assert_eq!(inc.width, 6);
        assert_eq!(
            inc.operands[0],
            Operand::Inc {
                slot: 300,
                delta: 1000
            }
        );
        assert_eq!(listing.instructions[1].pc, 6);
    }

    #[test]
    fn tableswitch_aligns_and_reads_the_table() {
        // 0: iload_1, 1: tableswitch (pad 2) default->28 low=1 high=2
        // targets 24, 26; 24/26/28: iconst_0 ireturn pairs.
        let mut code = vec![0x1B, 0xAA, 0x00, 0x00];
        code.extend_from_slice(&27i32.to_be_bytes()); // default -> 28
        code.extend_from_slice(&1i32.to_be_bytes());
        code.extend_from_slice(&2i32.to_be_bytes());
        code.extend_from_slice(&23i32.to_be_bytes()); // case 1 -> 24
        code.extend_from_slice(&25i32.to_be_bytes()); // case 2 -> 26
        code.extend_from_slice(&[0x03, 0xAC, 0x04, 0xAC, 0x05, 0xAC]);
        let listing = CodeListing::decode(&code).unwrap();
        let table = listing.at_pc(1).unwrap().table_switch().unwrap().clone();
        assert_eq!(table.low, 1);
        assert_eq!(table.high, 2);
        assert_eq!(table.targets, vec![24, 26]);
        assert_eq!(table.default, 28);
        assert_eq!(listing.at_pc(24).unwrap().mnemonic, Mnemonic::Iconst0);
    }

    #[test]
    fn tableswitch_with_zero_cases_is_accepted() {
        // 0: iload_1, 1: tableswitch default->16 low=0 high=-1, 16: return
        let mut code = vec![0x1B, 0xAA, 0x00, 0x00];
        code.extend_from_slice(&15i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&(-1i32).to_be_bytes());
        code.push(0xB1);
        let listing = CodeListing::decode(&code).unwrap();
        let table = listing.at_pc(1).unwrap().table_switch().unwrap().clone();
        assert!(table.targets.is_empty());
        assert_eq!(table.default, 16);
    }

    #[test]
    fn unsorted_lookupswitch_is_rejected() {
        // 0: iload_1, 1: lookupswitch default->? npairs=2 keys 5, 3
        let mut code = vec![0x1B, 0xAB, 0x00, 0x00];
        code.extend_from_slice(&23i32.to_be_bytes());
        code.extend_from_slice(&2i32.to_be_bytes());
        code.extend_from_slice(&5i32.to_be_bytes());
        code.extend_from_slice(&21i32.to_be_bytes());
        code.extend_from_slice(&3i32.to_be_bytes());
        code.extend_from_slice(&21i32.to_be_bytes());
        code.extend_from_slice(&[0xB1, 0xB1, 0xB1]);
        let err = CodeListing::decode(&code).unwrap_err();
        assert_eq!(err.cause, BytecodeCause::InvalidSwitchLayout { pc: 1 });
    }

    #[test]
    fn truncated_and_unknown_opcodes_are_errors() {
        let err = CodeListing::decode(&[0x10]).unwrap_err();
        assert_eq!(err.cause, BytecodeCause::TruncatedInstruction { pc: 0 });
        let err = CodeListing::decode(&[0xFE]).unwrap_err();
        assert_eq!(
            err.cause,
            BytecodeCause::UnknownOpcode {
                pc: 0,
                opcode: 0xFE
            }
        );
    }
}
