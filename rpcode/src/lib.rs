mod builder;
mod disassembler;
mod instruction;
mod lowering;
mod op;
mod program;
mod resolver;
mod script;
mod slot;
mod stack;

pub use builder::{BuildError, Builder};
pub use disassembler::{disassemble, format_bits, format_float};
pub use instruction::{Components, Instruction, Label, Place, Target};
pub use lowering::{OpFamily, OpWidth, Step, MAX_FIXED_WIDTH};
pub use op::{BinaryNotation, BinaryOp, LaneType, UnaryNotation, UnaryOp};
pub use program::Program;
pub use script::{Script, ScriptError};
pub use slot::{DisplayRange, Slot, SlotRange, SlotSpace, StackId};
pub use stack::{StackLayout, StackManager};
