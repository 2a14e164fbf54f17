use crate::opcode_tables;
use crate::story::ClampedReader;
use crate::text;
use log::{debug, trace};
use std::fmt::{Display, Error, Formatter};

/// Longest encoding with a single type byte: a variable-form 2OP branch
/// opcode with four large constants and a two-byte branch offset. Inline
/// print text is not counted.
pub const MAX_INSTRUCTION_LEN: usize = 12;

/// Operand types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// Large constant (2 bytes)
    LargeConstant,
    /// Small constant (1 byte)
    SmallConstant,
    /// Variable number
    Variable,
    /// Omitted (not present)
    Omitted,
}

impl OperandType {
    /// Parse operand type from 2-bit value
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0b00 => OperandType::LargeConstant,
            0b01 => OperandType::SmallConstant,
            0b10 => OperandType::Variable,
            _ => OperandType::Omitted,
        }
    }

    /// Get the size in bytes for this operand type
    pub fn size(&self) -> usize {
        match self {
            OperandType::LargeConstant => 2,
            OperandType::SmallConstant => 1,
            OperandType::Variable => 1,
            OperandType::Omitted => 0,
        }
    }
}

/// Instruction forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionForm {
    Long,
    ShortOneOp,
    ShortZeroOp,
    Variable,
}

/// Operand count categories, which select the opcode table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandCount {
    Op0,
    Op1,
    Op2,
    Var,
}

impl OperandCount {
    pub fn tag(&self) -> &'static str {
        match self {
            OperandCount::Op0 => "0op",
            OperandCount::Op1 => "1op",
            OperandCount::Op2 => "2op",
            OperandCount::Var => "var",
        }
    }
}

/// A decoded operand: its encoding and 16-bit value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    pub operand_type: OperandType,
    pub value: u16,
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self.operand_type {
            OperandType::Variable => write!(f, "V{:02x}", self.value),
            OperandType::SmallConstant => write!(f, "#{:02x}", self.value),
            _ => write!(f, "#{:04x}", self.value),
        }
    }
}

/// Branch information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchInfo {
    /// True if branch on true, false if branch on false
    pub on_true: bool,
    /// Branch offset (0-1 = return false/true, otherwise relative jump)
    pub offset: i16,
}

/// Where a branch goes when taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchTarget {
    ReturnFalse,
    ReturnTrue,
    Address(usize),
}

impl BranchInfo {
    pub fn target(&self, next_pc: usize) -> BranchTarget {
        match self.offset {
            0 => BranchTarget::ReturnFalse,
            1 => BranchTarget::ReturnTrue,
            n => BranchTarget::Address(relative_target(next_pc, n)),
        }
    }
}

/// Offsets are relative to the address after the instruction, minus two
fn relative_target(next_pc: usize, offset: i16) -> usize {
    (next_pc as i64 + offset as i64 - 2).max(0) as usize
}

/// A decoded Z-Machine instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Address of the opcode byte
    pub address: usize,
    /// The opcode number within its table
    pub opcode: u8,
    /// Mnemonic, or a synthesized `unknown_*` name
    pub name: String,
    pub form: InstructionForm,
    pub operand_count: OperandCount,
    pub operands: Vec<Operand>,
    /// Variable to store result (if applicable)
    pub store_var: Option<u8>,
    /// Branch information (if applicable)
    pub branch: Option<BranchInfo>,
    /// Inline string for print opcodes
    pub text: Option<String>,
    /// Address of the following instruction
    pub next_pc: usize,
    /// Some byte of this instruction lay past the end of the buffer and was
    /// read as zero
    pub truncated: bool,
}

/// Decode the instruction at `pc`. Never fails: a `pc` outside the buffer
/// yields the end-of-stream sentinel.
pub fn decode_at(memory: &[u8], pc: usize) -> Instruction {
    Instruction::decode(memory, pc)
}

impl Instruction {
    pub fn decode(memory: &[u8], pc: usize) -> Instruction {
        if pc >= memory.len() {
            debug!("Decode at {:#06x} is past end of memory ({:#06x})", pc, memory.len());
            return Instruction::end_of_stream(pc);
        }

        let mut reader = ClampedReader::new(memory, pc);
        let opcode_byte = reader.read_u8();

        // Determine instruction form based on top 2 bits
        let (form, operand_count, opcode, operand_types) = match opcode_byte >> 6 {
            0b11 => {
                // Variable form: bit 5 clear means a 2OP opcode with VAR operand encoding
                let count = if opcode_byte & 0x20 == 0 {
                    OperandCount::Op2
                } else {
                    OperandCount::Var
                };
                let types_byte = reader.read_u8();
                (
                    InstructionForm::Variable,
                    count,
                    opcode_byte & 0x1F,
                    Self::parse_type_byte(types_byte),
                )
            }
            0b10 => {
                // Short form: opcode in bottom 4 bits, type in bits 5-4
                let op_type = OperandType::from_bits(opcode_byte >> 4);
                if op_type == OperandType::Omitted {
                    (
                        InstructionForm::ShortZeroOp,
                        OperandCount::Op0,
                        opcode_byte & 0x0F,
                        Vec::new(),
                    )
                } else {
                    (
                        InstructionForm::ShortOneOp,
                        OperandCount::Op1,
                        opcode_byte & 0x0F,
                        vec![op_type],
                    )
                }
            }
            _ => {
                // Long form: 2 operands, types in bits 6 and 5
                let type1 = if opcode_byte & 0x40 != 0 {
                    OperandType::Variable
                } else {
                    OperandType::SmallConstant
                };
                let type2 = if opcode_byte & 0x20 != 0 {
                    OperandType::Variable
                } else {
                    OperandType::SmallConstant
                };
                (
                    InstructionForm::Long,
                    OperandCount::Op2,
                    opcode_byte & 0x1F,
                    vec![type1, type2],
                )
            }
        };

        let operands = operand_types
            .iter()
            .map(|op_type| {
                let value = match op_type.size() {
                    2 => reader.read_u16(),
                    _ => reader.read_u8() as u16,
                };
                Operand {
                    operand_type: *op_type,
                    value,
                }
            })
            .collect();

        let spec = opcode_tables::lookup(operand_count, opcode);
        if spec.is_none() {
            debug!(
                "Unknown {} opcode {:#04x} (byte {:#04x}) at {:#06x}",
                operand_count.tag(),
                opcode,
                opcode_byte,
                pc
            );
        }

        let store_var = match spec {
            Some(s) if s.store => Some(reader.read_u8()),
            _ => None,
        };

        let branch = match spec {
            Some(s) if s.branch => Some(Self::read_branch(&mut reader)),
            _ => None,
        };

        let text = match spec {
            Some(s) if s.text => Some(Self::read_inline_text(memory, &mut reader)),
            _ => None,
        };

        let instruction = Instruction {
            address: pc,
            opcode,
            name: opcode_tables::instruction_name(operand_count, opcode),
            form,
            operand_count,
            operands,
            store_var,
            branch,
            text,
            next_pc: reader.offset,
            truncated: reader.clamped,
        };
        trace!("{:#06x}: {}", pc, instruction);
        instruction
    }

    /// Up to four 2-bit type fields, most significant first; the first
    /// omitted field ends the list
    fn parse_type_byte(types_byte: u8) -> Vec<OperandType> {
        (0..4)
            .map(|i| OperandType::from_bits(types_byte >> (6 - i * 2)))
            .take_while(|t| *t != OperandType::Omitted)
            .collect()
    }

    fn read_branch(reader: &mut ClampedReader) -> BranchInfo {
        let first_byte = reader.read_u8();
        let on_true = (first_byte & 0x80) != 0;

        let offset = if (first_byte & 0x40) != 0 {
            // Short form: 6-bit unsigned offset
            (first_byte & 0x3F) as i16
        } else {
            // Long form: 14-bit signed offset
            let second_byte = reader.read_u8();
            let val = ((((first_byte & 0x3F) as u16) << 8) | second_byte as u16) as i16;
            if val & 0x2000 != 0 {
                val | (0xC000u16 as i16)
            } else {
                val
            }
        };

        BranchInfo { on_true, offset }
    }

    fn read_inline_text(memory: &[u8], reader: &mut ClampedReader) -> String {
        if reader.offset >= memory.len() {
            reader.clamped = true;
            return String::new();
        }
        let (string, len, terminated) = text::decode_terminated(&memory[reader.offset..]);
        if terminated {
            reader.offset += len;
        } else {
            // no end bit before the buffer ran out
            reader.clamped = true;
            reader.offset = memory.len();
        }
        string
    }

    /// The sentinel returned for addresses outside the buffer
    pub fn end_of_stream(pc: usize) -> Instruction {
        Instruction {
            address: pc,
            opcode: 0,
            name: "EOF".to_string(),
            form: InstructionForm::ShortZeroOp,
            operand_count: OperandCount::Op0,
            operands: Vec::new(),
            store_var: None,
            branch: None,
            text: None,
            next_pc: pc,
            truncated: false,
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.next_pc == self.address
    }

    /// Total size of instruction in bytes
    pub fn len(&self) -> usize {
        self.next_pc - self.address
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bytes this instruction was decoded from, cut at the buffer end
    pub fn raw_bytes<'a>(&self, memory: &'a [u8]) -> &'a [u8] {
        let start = self.address.min(memory.len());
        let end = self.next_pc.min(memory.len());
        &memory[start..end]
    }

    pub fn is_known(&self) -> bool {
        opcode_tables::lookup(self.operand_count, self.opcode).is_some()
    }

    /// Target of an unconditional `jump` with a constant operand
    pub fn jump_target(&self) -> Option<usize> {
        if self.operand_count != OperandCount::Op1 || self.opcode != 0x0C {
            return None;
        }
        match self.operands.first() {
            Some(op) if op.operand_type != OperandType::Variable => {
                Some(relative_target(self.next_pc, op.value as i16))
            }
            _ => None,
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.name)?;

        for (i, op) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " ")?;
            } else {
                write!(f, ", ")?;
            }
            write!(f, "{}", op)?;
        }

        if let Some(var) = self.store_var {
            write!(f, " -> V{:02x}", var)?;
        }

        if let Some(ref branch) = self.branch {
            let target = match branch.target(self.next_pc) {
                BranchTarget::ReturnFalse => "RFALSE".to_string(),
                BranchTarget::ReturnTrue => "RTRUE".to_string(),
                BranchTarget::Address(addr) => format!("{:#06x}", addr),
            };
            write!(
                f,
                " [{} {}]",
                if branch.on_true { "TRUE" } else { "FALSE" },
                target
            )?;
        }

        if let Some(ref text) = self.text {
            write!(f, " \"{}\"", text)?;
        }

        Ok(())
    }
}
