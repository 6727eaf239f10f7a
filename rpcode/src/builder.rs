use core::fmt;

use log::{debug, trace};

use crate::instruction::{Components, Instruction, Label, Place, Target};
use crate::lowering::{duplicate_steps, OpFamily};
use crate::op::{BinaryOp, UnaryOp};
use crate::program::Program;
use crate::resolver;
use crate::slot::{DisplayRange, Slot, SlotRange, SlotSpace, StackId};
use crate::stack::StackManager;

/// Faults detected when a builder is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    LabelAlreadyBound { label: usize },
    LabelUnbound { label: usize },
    UnbalancedStack { stack: StackId, depth: usize },
    SlotRangeOutOfBounds {
        space: SlotSpace,
        range: SlotRange,
        limit: usize,
    },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LabelAlreadyBound { label } => {
                write!(f, "label L{label} is already bound")
            }
            Self::LabelUnbound { label } => {
                write!(f, "label L{label} is unbound")
            }
            Self::UnbalancedStack { stack, depth } => {
                write!(f, "stack {stack} still holds {depth} cells")
            }
            Self::SlotRangeOutOfBounds {
                space,
                range,
                limit,
            } => write!(
                f,
                "{} exceeds the {limit} declared {} slots",
                DisplayRange {
                    space: *space,
                    range: *range,
                },
                space.name()
            ),
        }
    }
}

impl std::error::Error for BuildError {}

/// Collects raster pipeline operations and lowers them to instructions.
///
/// Calls append instructions in program order. Stack operations target the
/// stack chosen with [`Builder::set_current_stack`] (stack 0 by default).
/// [`Builder::finish`] lays out the stacks, resolves branches and checks
/// slot bounds.
///
/// Misuse that a front end can always avoid (popping cells that were never
/// pushed, registers of the wrong width) panics instead of returning an
/// error.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    instructions: Vec<Instruction>,
    stacks: StackManager,
    num_labels: usize,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instructions emitted so far, with stack cells still relative to their
    /// stacks and branches still naming labels.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    // ── emit helpers ───────────────────────────────────────────────

    fn emit(&mut self, instruction: Instruction) {
        trace!("emit #{} {:?}", self.instructions.len(), instruction);
        self.instructions.push(instruction);
    }

    fn cells(&self, range: SlotRange) -> Place {
        Place::StackRelative {
            stack: self.stacks.current(),
            range,
        }
    }

    /// Emit one copy per step of `family`'s plan for `dst.count()` slots.
    fn emit_copies(&mut self, family: OpFamily, dst: Place, src: Place) {
        assert_eq!(
            dst.count(),
            src.count(),
            "copy between ranges of different widths ({dst} and {src})"
        );
        let masked = family == OpFamily::COPY_MASKED;
        for step in family.plan(dst.count()) {
            self.emit(Instruction::CopySlots {
                dst: dst.slice(step.offset, step.count),
                src: src.slice(step.offset, step.count),
                masked,
            });
        }
    }

    fn emit_zeros(&mut self, dst: Place) {
        for step in OpFamily::ZERO_UNMASKED.plan(dst.count()) {
            self.emit(Instruction::ZeroSlots {
                dst: dst.slice(step.offset, step.count),
            });
        }
    }

    // ── color registers and lane masks ─────────────────────────────

    /// # Panics
    ///
    /// Panics unless `dst` is two slots wide.
    pub fn store_src_rg(&mut self, dst: SlotRange) {
        assert_eq!(dst.count, 2, "store_src_rg writes two slots");
        self.emit(Instruction::StoreSrcRg {
            dst: Place::Value(dst),
        });
    }

    /// # Panics
    ///
    /// Panics unless `dst` is four slots wide.
    pub fn store_src(&mut self, dst: SlotRange) {
        assert_eq!(dst.count, 4, "store_src writes four slots");
        self.emit(Instruction::StoreSrc {
            dst: Place::Value(dst),
        });
    }

    /// # Panics
    ///
    /// Panics unless `dst` is four slots wide.
    pub fn store_dst(&mut self, dst: SlotRange) {
        assert_eq!(dst.count, 4, "store_dst writes four slots");
        self.emit(Instruction::StoreDst {
            dst: Place::Value(dst),
        });
    }

    /// # Panics
    ///
    /// Panics unless `src` is four slots wide.
    pub fn load_src(&mut self, src: SlotRange) {
        assert_eq!(src.count, 4, "load_src reads four slots");
        self.emit(Instruction::LoadSrc {
            src: Place::Value(src),
        });
    }

    /// # Panics
    ///
    /// Panics unless `src` is four slots wide.
    pub fn load_dst(&mut self, src: SlotRange) {
        assert_eq!(src.count, 4, "load_dst reads four slots");
        self.emit(Instruction::LoadDst {
            src: Place::Value(src),
        });
    }

    pub fn init_lane_masks(&mut self) {
        self.emit(Instruction::InitLaneMasks);
    }

    pub fn mask_off_return_mask(&mut self) {
        self.emit(Instruction::MaskOffReturnMask);
    }

    pub fn mask_off_loop_mask(&mut self) {
        self.emit(Instruction::MaskOffLoopMask);
    }

    /// # Panics
    ///
    /// Panics unless `src` is a single slot.
    pub fn reenable_loop_mask(&mut self, src: SlotRange) {
        assert_eq!(src.count, 1, "reenable_loop_mask reads one slot");
        self.emit(Instruction::ReenableLoopMask {
            src: Place::Value(src),
        });
    }

    // ── accumulator ────────────────────────────────────────────────

    pub fn immediate_f(&mut self, value: f32) {
        self.emit(Instruction::Immediate {
            bits: value.to_bits(),
        });
    }

    pub fn immediate_i(&mut self, value: i32) {
        self.emit(Instruction::Immediate { bits: value as u32 });
    }

    pub fn immediate_u(&mut self, value: u32) {
        self.emit(Instruction::Immediate { bits: value });
    }

    pub fn load_unmasked(&mut self, slot: Slot) {
        self.emit(Instruction::LoadUnmasked {
            src: Place::Value(SlotRange::one(slot)),
        });
    }

    pub fn store_unmasked(&mut self, slot: Slot) {
        self.emit(Instruction::StoreUnmasked {
            dst: Place::Value(SlotRange::one(slot)),
        });
    }

    pub fn store_masked(&mut self, slot: Slot) {
        self.emit(Instruction::StoreMasked {
            dst: Place::Value(SlotRange::one(slot)),
        });
    }

    // ── stack management ───────────────────────────────────────────

    pub fn set_current_stack(&mut self, stack: StackId) {
        self.stacks.set_current(stack);
    }

    pub fn current_stack(&self) -> StackId {
        self.stacks.current()
    }

    /// Number of live cells on the current stack.
    pub fn stack_depth(&self) -> usize {
        self.stacks.depth()
    }

    pub fn push_literal_f(&mut self, value: f32) {
        self.push_literal_bits(value.to_bits());
    }

    pub fn push_literal_i(&mut self, value: i32) {
        self.push_literal_bits(value as u32);
    }

    pub fn push_literal_u(&mut self, value: u32) {
        self.push_literal_bits(value);
    }

    fn push_literal_bits(&mut self, bits: u32) {
        let cell = self.stacks.push(1);
        let dst = self.cells(cell);
        self.emit(Instruction::CopyLiteral { dst, bits });
    }

    /// Push a copy of the uniform slots `src`.
    pub fn push_uniform(&mut self, src: SlotRange) {
        let cells = self.stacks.push(src.count);
        let dst = self.cells(cells);
        let src = Place::Uniform(src);
        for step in OpFamily::COPY_CONSTANT.plan(src.count()) {
            self.emit(Instruction::CopyUniforms {
                dst: dst.slice(step.offset, step.count),
                src: src.slice(step.offset, step.count),
            });
        }
    }

    /// Push `count` cells holding zero.
    pub fn push_zeros(&mut self, count: usize) {
        let cells = self.stacks.push(count);
        let dst = self.cells(cells);
        self.emit_zeros(dst);
    }

    /// Push a copy of the value slots `src`.
    pub fn push_slots(&mut self, src: SlotRange) {
        let cells = self.stacks.push(src.count);
        let dst = self.cells(cells);
        self.emit_copies(OpFamily::COPY_UNMASKED, dst, Place::Value(src));
    }

    /// Push a copy of `count` cells that start `offset` cells below the top
    /// of the current stack.
    ///
    /// # Panics
    ///
    /// Panics if the copied cells are not all on the stack.
    pub fn push_clone(&mut self, count: usize, offset: usize) {
        let src = self.cells(self.stacks.below_top(offset, count));
        let cells = self.stacks.push(count);
        let dst = self.cells(cells);
        self.emit_copies(OpFamily::COPY_UNMASKED, dst, src);
    }

    /// Copy the top `dst.count` cells into `dst` under the current mask and
    /// release them.
    ///
    /// # Panics
    ///
    /// Panics if the stack holds fewer than `dst.count` cells.
    pub fn pop_slots(&mut self, dst: SlotRange) {
        self.copy_stack_to_slots(dst, dst.count);
        self.discard_stack(dst.count);
    }

    /// Like [`Builder::pop_slots`], ignoring the lane mask.
    ///
    /// # Panics
    ///
    /// Panics if the stack holds fewer than `dst.count` cells.
    pub fn pop_slots_unmasked(&mut self, dst: SlotRange) {
        self.copy_stack_to_slots_unmasked(dst, dst.count);
        self.discard_stack(dst.count);
    }

    /// Copy `dst.count` cells starting `offset` cells below the top of the
    /// stack into `dst` under the current mask. The stack is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the copied cells are not all on the stack.
    pub fn copy_stack_to_slots(&mut self, dst: SlotRange, offset: usize) {
        self.copy_stack_with(OpFamily::COPY_MASKED, dst, offset);
    }

    /// # Panics
    ///
    /// Panics if the copied cells are not all on the stack.
    pub fn copy_stack_to_slots_unmasked(&mut self, dst: SlotRange, offset: usize) {
        self.copy_stack_with(OpFamily::COPY_UNMASKED, dst, offset);
    }

    fn copy_stack_with(&mut self, family: OpFamily, dst: SlotRange, offset: usize) {
        let src = self.cells(self.stacks.below_top(offset, dst.count));
        self.emit_copies(family, Place::Value(dst), src);
    }

    /// Release the top `count` cells. Emits nothing.
    ///
    /// # Panics
    ///
    /// Panics if the stack holds fewer than `count` cells.
    pub fn discard_stack(&mut self, count: usize) {
        trace!(
            "discard {count} cells from stack {}",
            self.stacks.current()
        );
        self.stacks.discard(count);
    }

    // ── slot copies ────────────────────────────────────────────────

    /// # Panics
    ///
    /// Panics if `dst` and `src` differ in width.
    pub fn copy_slots_masked(&mut self, dst: SlotRange, src: SlotRange) {
        self.emit_copies(OpFamily::COPY_MASKED, Place::Value(dst), Place::Value(src));
    }

    /// # Panics
    ///
    /// Panics if `dst` and `src` differ in width.
    pub fn copy_slots_unmasked(&mut self, dst: SlotRange, src: SlotRange) {
        self.emit_copies(OpFamily::COPY_UNMASKED, Place::Value(dst), Place::Value(src));
    }

    pub fn zero_slots_unmasked(&mut self, dst: SlotRange) {
        self.emit_zeros(Place::Value(dst));
    }

    // ── value manipulation ─────────────────────────────────────────

    /// Push `count` more copies of the top cell.
    ///
    /// # Panics
    ///
    /// Panics if the stack is empty.
    pub fn duplicate(&mut self, count: usize) {
        for added in duplicate_steps(count) {
            let top = self.stacks.top(1);
            self.stacks.push(added);
            let cells = self.cells(SlotRange::new(top.index, added + 1));
            self.emit(Instruction::Swizzle {
                dst: cells,
                src: cells,
                components: Components::new(&[0u8; 4][..=added]),
            });
        }
    }

    /// Replace the group of `count` cells below the top group with the top
    /// group wherever the condition mask is set, then release the top group.
    ///
    /// # Panics
    ///
    /// Panics if the stack holds fewer than `2 * count` cells.
    pub fn select(&mut self, count: usize) {
        let src = self.cells(self.stacks.top(count));
        let dst = self.cells(self.stacks.below_top(2 * count, count));
        self.emit_copies(OpFamily::COPY_MASKED, dst, src);
        self.discard_stack(count);
    }

    /// Rearrange the top `width` cells into `indices.len()` cells, where
    /// output `i` is input `indices[i]`.
    ///
    /// # Panics
    ///
    /// Panics if an index is outside the input group, if there are more than
    /// four outputs, or if the stack holds fewer than `width` cells.
    pub fn swizzle(&mut self, width: usize, indices: &[u8]) {
        assert!(
            indices.iter().all(|&index| (index as usize) < width),
            "swizzle index out of range for {width} input cells: {indices:?}"
        );
        let components = Components::new(indices);
        let group = self.stacks.top(width);
        let identity = indices.len() == width
            && indices.iter().enumerate().all(|(i, &index)| i == index as usize);
        if identity {
            return;
        }

        let outputs = components.len();
        if outputs > width {
            self.stacks.push(outputs - width);
        } else {
            self.stacks.discard(width - outputs);
        }
        self.emit(Instruction::Swizzle {
            dst: self.cells(SlotRange::new(group.index, outputs)),
            src: self.cells(SlotRange::new(group.index, components.input_span())),
            components,
        });
    }

    /// Combine the two top groups of `width` cells; the result replaces the
    /// lower group and the upper group is released.
    ///
    /// # Panics
    ///
    /// Panics if the stack holds fewer than `2 * width` cells.
    pub fn binary_op(&mut self, op: BinaryOp, width: usize) {
        let src = self.cells(self.stacks.top(width));
        let dst = self.cells(self.stacks.below_top(2 * width, width));
        for step in op.family().plan(width) {
            self.emit(Instruction::Binary {
                op,
                width: step.width,
                dst: dst.slice(step.offset, step.count),
                src: src.slice(step.offset, step.count),
            });
        }
        self.discard_stack(width);
    }

    /// Apply `op` in place to the top `width` cells.
    ///
    /// # Panics
    ///
    /// Panics if the stack holds fewer than `width` cells.
    pub fn unary_op(&mut self, op: UnaryOp, width: usize) {
        let dst = self.cells(self.stacks.top(width));
        for step in op.family().plan(width) {
            self.emit(Instruction::Unary {
                op,
                dst: dst.slice(step.offset, step.count),
            });
        }
    }

    // ── mask stack ─────────────────────────────────────────────────

    /// Save the condition mask in a new cell.
    pub fn push_condition_mask(&mut self) {
        let cells = self.stacks.push(1);
        let dst = self.cells(cells);
        self.emit(Instruction::StoreConditionMask { dst });
    }

    pub fn push_loop_mask(&mut self) {
        let cells = self.stacks.push(1);
        let dst = self.cells(cells);
        self.emit(Instruction::StoreLoopMask { dst });
    }

    pub fn push_return_mask(&mut self) {
        let cells = self.stacks.push(1);
        let dst = self.cells(cells);
        self.emit(Instruction::StoreReturnMask { dst });
    }

    /// Restore the condition mask from the top cell and release it.
    ///
    /// # Panics
    ///
    /// Panics if the stack is empty.
    pub fn pop_condition_mask(&mut self) {
        let cells = self.stacks.pop(1);
        let src = self.cells(cells);
        self.emit(Instruction::LoadConditionMask { src });
    }

    /// # Panics
    ///
    /// Panics if the stack is empty.
    pub fn pop_loop_mask(&mut self) {
        let cells = self.stacks.pop(1);
        let src = self.cells(cells);
        self.emit(Instruction::LoadLoopMask { src });
    }

    /// # Panics
    ///
    /// Panics if the stack is empty.
    pub fn pop_return_mask(&mut self) {
        let cells = self.stacks.pop(1);
        let src = self.cells(cells);
        self.emit(Instruction::LoadReturnMask { src });
    }

    /// Set the condition mask to the and of the two top cells. The cells
    /// stay on the stack.
    ///
    /// # Panics
    ///
    /// Panics if the stack holds fewer than two cells.
    pub fn merge_condition_mask(&mut self) {
        let src = self.cells(self.stacks.top(2));
        self.emit(Instruction::MergeConditionMask { src });
    }

    /// And the top cell into the loop mask. The cell stays on the stack.
    ///
    /// # Panics
    ///
    /// Panics if the stack is empty.
    pub fn merge_loop_mask(&mut self) {
        let src = self.cells(self.stacks.top(1));
        self.emit(Instruction::MergeLoopMask { src });
    }

    // ── control flow ───────────────────────────────────────────────

    pub fn next_label_id(&mut self) -> Label {
        let label = Label(self.num_labels);
        self.num_labels += 1;
        label
    }

    /// Bind `label` to the position of the next instruction.
    pub fn label(&mut self, label: Label) {
        self.emit(Instruction::Label(label));
    }

    pub fn jump(&mut self, label: Label) {
        self.emit(Instruction::Jump {
            target: Target::Label(label),
        });
    }

    pub fn branch_if_any_active_lanes(&mut self, label: Label) {
        self.emit(Instruction::BranchIfAnyActiveLanes {
            target: Target::Label(label),
        });
    }

    pub fn branch_if_no_active_lanes(&mut self, label: Label) {
        self.emit(Instruction::BranchIfNoActiveLanes {
            target: Target::Label(label),
        });
    }

    // ── finalization ───────────────────────────────────────────────

    /// Produce the finished program.
    ///
    /// Fails if a stack still holds cells, a branch names an unbound label,
    /// a label is bound twice, or a slot range reaches past the declared
    /// slot counts.
    pub fn finish(
        self,
        num_value_slots: usize,
        num_uniform_slots: usize,
    ) -> Result<Program, BuildError> {
        if let Some((stack, depth)) = self.stacks.first_unbalanced() {
            return Err(BuildError::UnbalancedStack { stack, depth });
        }
        let layout = self.stacks.layout();
        let instructions =
            resolver::resolve(self.instructions, self.num_labels, &layout)?;
        resolver::check_bounds(&instructions, num_value_slots, num_uniform_slots)?;

        debug!(
            "finished program: {} instructions, {} temp stack cells, {} labels",
            instructions.len(),
            layout.total(),
            self.num_labels
        );
        Ok(Program::new(
            instructions,
            num_value_slots,
            num_uniform_slots,
            layout.total(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_depth_tracks_pushes_and_pops() {
        let mut b = Builder::new();
        b.push_literal_f(1.0);
        b.duplicate(3);
        assert_eq!(b.stack_depth(), 4);
        b.binary_op(BinaryOp::AddFloats, 2);
        assert_eq!(b.stack_depth(), 2);
        b.swizzle(2, &[1, 0, 1]);
        assert_eq!(b.stack_depth(), 3);
        b.swizzle(3, &[2]);
        assert_eq!(b.stack_depth(), 1);
        b.pop_slots(SlotRange::one(0));
        assert_eq!(b.stack_depth(), 0);
    }

    #[test]
    fn identity_swizzle_emits_nothing() {
        let mut b = Builder::new();
        b.push_zeros(3);
        b.swizzle(3, &[0, 1, 2]);
        assert_eq!(b.instructions().len(), 1);
        b.swizzle(3, &[0, 1]);
        assert_eq!(b.instructions().len(), 2);
        assert_eq!(b.stack_depth(), 2);
    }

    #[test]
    fn stacks_keep_their_own_depth() {
        let mut b = Builder::new();
        b.push_zeros(2);
        b.set_current_stack(3);
        assert_eq!(b.stack_depth(), 0);
        b.push_literal_i(7);
        b.set_current_stack(0);
        assert_eq!(b.stack_depth(), 2);
        assert_eq!(b.current_stack(), 0);
    }

    #[test]
    fn mask_saves_share_the_current_stack() {
        let mut b = Builder::new();
        b.push_condition_mask();
        b.push_loop_mask();
        b.push_return_mask();
        assert_eq!(b.stack_depth(), 3);
        b.pop_return_mask();
        b.pop_loop_mask();
        b.pop_condition_mask();
        assert_eq!(b.stack_depth(), 0);
        let program = b.finish(0, 0).expect("balanced");
        assert_eq!(program.num_temp_stack_slots(), 3);
        assert_eq!(
            program.instructions()[2],
            Instruction::StoreReturnMask {
                dst: Place::Stack(SlotRange::one(2))
            }
        );
        assert_eq!(
            program.instructions()[5],
            Instruction::LoadConditionMask {
                src: Place::Stack(SlotRange::one(0))
            }
        );
    }

    #[test]
    fn unbalanced_stack_fails_to_finish() {
        let mut b = Builder::new();
        b.set_current_stack(2);
        b.push_literal_u(1);
        let err = b.finish(0, 0).expect_err("stack 2 is not empty");
        assert_eq!(err, BuildError::UnbalancedStack { stack: 2, depth: 1 });
    }

    #[test]
    fn unbound_label_fails_to_finish() {
        let mut b = Builder::new();
        let label = b.next_label_id();
        b.jump(label);
        let err = b.finish(0, 0).expect_err("label never bound");
        assert_eq!(err, BuildError::LabelUnbound { label: 0 });
        assert_eq!(err.to_string(), "label L0 is unbound");
    }

    #[test]
    fn unreferenced_labels_may_stay_unbound() {
        let mut b = Builder::new();
        b.next_label_id();
        b.init_lane_masks();
        assert!(b.finish(0, 0).is_ok());
    }

    #[test]
    fn rebinding_a_label_fails() {
        let mut b = Builder::new();
        let label = b.next_label_id();
        b.label(label);
        b.init_lane_masks();
        b.label(label);
        let err = b.finish(0, 0).expect_err("label bound twice");
        assert!(matches!(err, BuildError::LabelAlreadyBound { label: 0 }));
    }

    #[test]
    fn value_ranges_must_fit_declared_slots() {
        let mut b = Builder::new();
        b.copy_slots_unmasked(SlotRange::new(0, 2), SlotRange::new(3, 2));
        let err = b.finish(4, 0).expect_err("v3..4 needs five slots");
        assert_eq!(
            err,
            BuildError::SlotRangeOutOfBounds {
                space: SlotSpace::Value,
                range: SlotRange::new(3, 2),
                limit: 4,
            }
        );
        assert_eq!(err.to_string(), "v3..4 exceeds the 4 declared value slots");
    }

    #[test]
    fn uniform_ranges_must_fit_declared_slots() {
        let mut b = Builder::new();
        b.push_uniform(SlotRange::new(2, 2));
        b.discard_stack(2);
        let err = b.finish(0, 3).expect_err("u2..3 needs four uniforms");
        assert!(matches!(
            err,
            BuildError::SlotRangeOutOfBounds {
                space: SlotSpace::Uniform,
                ..
            }
        ));
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn binary_op_needs_two_groups() {
        let mut b = Builder::new();
        b.push_zeros(3);
        b.binary_op(BinaryOp::MulFloats, 2);
    }

    #[test]
    #[should_panic(expected = "swizzle index out of range")]
    fn swizzle_indices_stay_in_the_group() {
        let mut b = Builder::new();
        b.push_zeros(2);
        b.swizzle(2, &[2]);
    }

    #[test]
    #[should_panic(expected = "four slots")]
    fn color_registers_are_four_wide() {
        let mut b = Builder::new();
        b.store_src(SlotRange::new(0, 3));
    }

    #[test]
    #[should_panic(expected = "different widths")]
    fn copies_need_matching_widths() {
        let mut b = Builder::new();
        b.copy_slots_masked(SlotRange::new(0, 2), SlotRange::new(4, 3));
    }
}
