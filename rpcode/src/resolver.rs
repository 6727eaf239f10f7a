//! Finalization passes: stack layout, label resolution and slot bounds.

use log::trace;

use crate::builder::BuildError;
use crate::instruction::{Instruction, Label, Place, Target};
use crate::stack::StackLayout;

/// A branch whose target offset is patched once every label is known.
#[derive(Debug, Clone, Copy)]
struct Fixup {
    at: usize,
    label: Label,
}

/// Drop label markers, turn branch labels into relative offsets and rewrite
/// stack-relative cells to absolute ones.
///
/// A branch to a label that is already bound at that point is a backward
/// branch and gets a `stack_rewind` right before it. Offsets are measured
/// from the branch itself, so `+1` targets the next instruction.
pub(crate) fn resolve(
    instructions: Vec<Instruction>,
    num_labels: usize,
    layout: &StackLayout,
) -> Result<Vec<Instruction>, BuildError> {
    let mut labels: Vec<Option<usize>> = vec![None; num_labels];
    let mut fixups = Vec::new();
    let mut out = Vec::with_capacity(instructions.len());

    for instruction in instructions {
        if let Instruction::Label(label) = instruction {
            let Some(slot) = labels.get_mut(label.0) else {
                return Err(BuildError::LabelUnbound { label: label.0 });
            };
            if slot.is_some() {
                return Err(BuildError::LabelAlreadyBound { label: label.0 });
            }
            *slot = Some(out.len());
            continue;
        }

        if let Some(Target::Label(label)) = instruction.target() {
            let backward = labels.get(label.0).is_some_and(Option::is_some);
            if backward {
                trace!("backward branch to {label} at #{}", out.len() + 1);
                out.push(Instruction::StackRewind);
            }
            fixups.push(Fixup {
                at: out.len(),
                label,
            });
        }
        out.push(instruction.map_places(|place| absolute(place, layout)));
    }

    for fixup in fixups {
        let Some(target) = labels.get(fixup.label.0).copied().flatten() else {
            return Err(BuildError::LabelUnbound {
                label: fixup.label.0,
            });
        };
        let offset = target as isize - fixup.at as isize;
        let branch = core::mem::replace(&mut out[fixup.at], Instruction::StackRewind);
        out[fixup.at] = branch.with_target(Target::Offset(offset));
    }
    Ok(out)
}

fn absolute(place: Place, layout: &StackLayout) -> Place {
    match place {
        Place::StackRelative { stack, range } => Place::Stack(layout.resolve(stack, range)),
        other => other,
    }
}

/// Reject value and uniform ranges that reach past the declared slot counts.
pub(crate) fn check_bounds(
    instructions: &[Instruction],
    num_value_slots: usize,
    num_uniform_slots: usize,
) -> Result<(), BuildError> {
    for place in instructions.iter().flat_map(Instruction::places) {
        let limit = match place {
            Place::Value(_) => num_value_slots,
            Place::Uniform(_) => num_uniform_slots,
            Place::Stack(_) | Place::StackRelative { .. } => continue,
        };
        let range = place.range();
        if range.end() > limit {
            return Err(BuildError::SlotRangeOutOfBounds {
                space: place.space(),
                range,
                limit,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::SlotRange;
    use crate::stack::StackManager;

    fn jump(label: usize) -> Instruction {
        Instruction::Jump {
            target: Target::Label(Label(label)),
        }
    }

    fn empty_layout() -> StackLayout {
        StackManager::new().layout()
    }

    #[test]
    fn forward_jump_skips_to_label() {
        let program = vec![
            jump(0),
            Instruction::InitLaneMasks,
            Instruction::Label(Label(0)),
            Instruction::MaskOffLoopMask,
        ];
        let out = resolve(program, 1, &empty_layout()).expect("resolves");
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].target(), Some(Target::Offset(2)));
    }

    #[test]
    fn backward_jump_gets_a_rewind() {
        let program = vec![
            Instruction::Label(Label(0)),
            Instruction::InitLaneMasks,
            jump(0),
        ];
        let out = resolve(program, 1, &empty_layout()).expect("resolves");
        assert_eq!(out[1], Instruction::StackRewind);
        assert_eq!(out[2].target(), Some(Target::Offset(-2)));
    }

    #[test]
    fn branch_to_own_position_is_backward() {
        let program = vec![Instruction::Label(Label(0)), jump(0)];
        let out = resolve(program, 1, &empty_layout()).expect("resolves");
        assert_eq!(out[0], Instruction::StackRewind);
        assert_eq!(out[1].target(), Some(Target::Offset(-1)));
    }

    #[test]
    fn foreign_labels_are_unbound() {
        let err = resolve(vec![jump(4)], 1, &empty_layout()).expect_err("unknown label");
        assert_eq!(err, BuildError::LabelUnbound { label: 4 });
    }

    #[test]
    fn stack_cells_become_absolute() {
        let mut stacks = StackManager::new();
        stacks.push(3);
        stacks.set_current(1);
        stacks.push(1);
        let program = vec![Instruction::ZeroSlots {
            dst: Place::StackRelative {
                stack: 1,
                range: SlotRange::one(0),
            },
        }];
        let out = resolve(program, 0, &stacks.layout()).expect("resolves");
        assert_eq!(
            out[0],
            Instruction::ZeroSlots {
                dst: Place::Stack(SlotRange::one(3))
            }
        );
    }

    #[test]
    fn stack_cells_are_not_bounds_checked() {
        let program = vec![Instruction::ZeroSlots {
            dst: Place::Stack(SlotRange::new(0, 40)),
        }];
        assert!(check_bounds(&program, 0, 0).is_ok());
    }
}
