use core::fmt;

use crate::disassembler;
use crate::instruction::Instruction;

/// A finished, immutable raster pipeline program.
///
/// Branch targets are relative offsets and every stack cell has its final
/// `$` index, so the instruction list can be handed to an interpreter as is.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    instructions: Vec<Instruction>,
    num_value_slots: usize,
    num_uniform_slots: usize,
    num_temp_stack_slots: usize,
}

impl Program {
    pub(crate) fn new(
        instructions: Vec<Instruction>,
        num_value_slots: usize,
        num_uniform_slots: usize,
        num_temp_stack_slots: usize,
    ) -> Self {
        Self {
            instructions,
            num_value_slots,
            num_uniform_slots,
            num_temp_stack_slots,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn num_value_slots(&self) -> usize {
        self.num_value_slots
    }

    pub fn num_uniform_slots(&self) -> usize {
        self.num_uniform_slots
    }

    /// Cells needed by all operand stacks together.
    pub fn num_temp_stack_slots(&self) -> usize {
        self.num_temp_stack_slots
    }

    /// The disassembly listing, one numbered line per instruction.
    pub fn dump(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        disassembler::write_listing(f, &self.instructions)
    }
}
