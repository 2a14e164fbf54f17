use crate::header::Header;
use crate::instruction::{decode_at, Instruction, OperandCount};
use crate::memory::{classify, MemoryRegion};
use log::debug;
use std::fmt::{Display, Error, Formatter};

/// Why a trace stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ReturnTrue,
    ReturnFalse,
    Quit,
    StepLimit(usize),
    OutOfBounds(usize),
}

impl Termination {
    /// Terminal opcodes end a linear trace: control never falls through them
    fn for_instruction(instruction: &Instruction) -> Option<Termination> {
        if instruction.operand_count != OperandCount::Op0 {
            return None;
        }
        match instruction.opcode {
            0x00 => Some(Termination::ReturnTrue),
            0x01 => Some(Termination::ReturnFalse),
            0x0A => Some(Termination::Quit),
            _ => None,
        }
    }
}

impl Display for Termination {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            Termination::ReturnTrue => write!(f, "Execution would return TRUE"),
            Termination::ReturnFalse => write!(f, "Execution would return FALSE"),
            Termination::Quit => write!(f, "Execution would quit"),
            Termination::StepLimit(n) => write!(f, "Step limit of {n} reached"),
            Termination::OutOfBounds(pc) => write!(f, "PC out of bounds: {pc:#06x}"),
        }
    }
}

/// One decoded step of a trace
#[derive(Debug, Clone)]
pub struct TraceStep {
    pub index: usize,
    pub address: usize,
    pub instruction: Instruction,
    /// Bytes consumed by the instruction (cut at the buffer end)
    pub raw: Vec<u8>,
    pub region: MemoryRegion,
    /// The address lies at or beyond the high memory base
    pub high_memory_warning: bool,
}

#[derive(Debug, Clone)]
pub struct Trace {
    pub start_pc: usize,
    pub steps: Vec<TraceStep>,
    pub termination: Termination,
}

pub struct Tracer<'a> {
    memory: &'a [u8],
    header: &'a Header,
}

impl<'a> Tracer<'a> {
    pub fn new(memory: &'a [u8], header: &'a Header) -> Self {
        Tracer { memory, header }
    }

    /// Decode instructions linearly from `start_pc` until a terminal opcode,
    /// the end of the buffer, or `max_steps` decoded instructions
    pub fn trace(&self, start_pc: usize, max_steps: usize) -> Trace {
        let mut steps = Vec::new();
        let mut pc = start_pc;

        debug!("Tracing from {:#06x}, at most {} steps", start_pc, max_steps);

        let termination = loop {
            if steps.len() >= max_steps {
                break Termination::StepLimit(max_steps);
            }
            let instruction = decode_at(self.memory, pc);
            if instruction.is_end_of_stream() {
                break Termination::OutOfBounds(pc);
            }

            let region = classify(pc, self.header);
            let terminal = Termination::for_instruction(&instruction);

            if instruction.truncated {
                debug!("Instruction at {:#06x} runs past end of memory", pc);
            }

            steps.push(TraceStep {
                index: steps.len(),
                address: pc,
                raw: instruction.raw_bytes(self.memory).to_vec(),
                region,
                high_memory_warning: pc >= self.header.high_memory_base as usize,
                instruction,
            });

            if let Some(t) = terminal {
                break t;
            }

            // decode_at always advances for an in-range pc
            pc = steps[steps.len() - 1].instruction.next_pc;
        };

        debug!("Trace stopped after {} steps: {}", steps.len(), termination);

        Trace {
            start_pc,
            steps,
            termination,
        }
    }
}

/// Convenience wrapper around `Tracer::trace`
pub fn trace(memory: &[u8], header: &Header, start_pc: usize, max_steps: usize) -> Trace {
    Tracer::new(memory, header).trace(start_pc, max_steps)
}
