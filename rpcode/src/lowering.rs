//! Opcode selection and width decomposition.
//!
//! Every operation family has dedicated opcodes for widths one to four.
//! Wider requests either use the family's generic `_n_` opcode (when it has
//! one) or are split into chunks of four plus a remainder. These functions
//! depend only on the requested width and the family, so the builder just
//! asks for a plan and emits one instruction per step.

/// Widest operand group covered by a dedicated opcode.
pub const MAX_FIXED_WIDTH: usize = 4;

/// Operand width encoded in an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpWidth {
    /// Dedicated opcode for one to four slots.
    Fixed(usize),
    /// Generic `_n_` opcode; the width comes from the operands.
    Generic,
}

/// Naming and lowering rules for one family of opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpFamily {
    pub stem: &'static str,
    /// Singular/plural noun; `None` for families named `stem_2`, `stem_n`.
    pub noun: Option<(&'static str, &'static str)>,
    pub suffix: &'static str,
    /// Whether a generic `_n_` opcode exists.
    pub generic: bool,
}

impl OpFamily {
    pub const COPY_MASKED: Self = Self::fixed("copy", Some(("slot", "slots")), "_masked");
    pub const COPY_UNMASKED: Self = Self::fixed("copy", Some(("slot", "slots")), "_unmasked");
    pub const COPY_CONSTANT: Self = Self::fixed("copy", Some(("constant", "constants")), "");
    pub const ZERO_UNMASKED: Self = Self::fixed("zero", Some(("slot", "slots")), "_unmasked");

    pub const fn fixed(
        stem: &'static str,
        noun: Option<(&'static str, &'static str)>,
        suffix: &'static str,
    ) -> Self {
        Self {
            stem,
            noun,
            suffix,
            generic: false,
        }
    }

    /// Opcode name for `width`, e.g. `copy_slot_masked`, `add_3_floats`,
    /// `div_n_ints`, `bitwise_not_4`.
    pub fn name(&self, width: OpWidth) -> String {
        let count = match width {
            OpWidth::Fixed(1) => None,
            OpWidth::Fixed(n) => Some(n.to_string()),
            OpWidth::Generic => Some("n".to_string()),
        };
        let mut name = String::from(self.stem);
        match (self.noun, count) {
            (Some((singular, _)), None) => {
                name.push('_');
                name.push_str(singular);
            }
            (Some((_, plural)), Some(count)) => {
                name.push('_');
                name.push_str(&count);
                name.push('_');
                name.push_str(plural);
            }
            (None, Some(count)) => {
                name.push('_');
                name.push_str(&count);
            }
            (None, None) => {}
        }
        name.push_str(self.suffix);
        name
    }

    /// Split an operation over `width` slots into opcode-sized steps.
    pub fn plan(&self, width: usize) -> Vec<Step> {
        if self.generic && width > MAX_FIXED_WIDTH {
            return vec![Step {
                offset: 0,
                count: width,
                width: OpWidth::Generic,
            }];
        }
        fixed_chunks(width)
            .map(|(offset, count)| Step {
                offset,
                count,
                width: OpWidth::Fixed(count),
            })
            .collect()
    }
}

/// One emitted instruction of a lowered operation: `count` slots starting
/// `offset` slots into the operand group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub offset: usize,
    pub count: usize,
    pub width: OpWidth,
}

/// `(offset, count)` pairs covering `width` slots, four at a time.
pub fn fixed_chunks(width: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..width)
        .step_by(MAX_FIXED_WIDTH)
        .map(move |offset| (offset, (width - offset).min(MAX_FIXED_WIDTH)))
}

/// Number of new cells produced by each broadcast swizzle when duplicating
/// the top cell `count` times. A four-wide swizzle of one cell adds three
/// copies, so the sequence is a run of threes and a final one or two.
pub fn duplicate_steps(count: usize) -> impl Iterator<Item = usize> {
    let full = count / (MAX_FIXED_WIDTH - 1);
    let rest = count % (MAX_FIXED_WIDTH - 1);
    core::iter::repeat_n(MAX_FIXED_WIDTH - 1, full).chain((rest > 0).then_some(rest))
}

/// Name of the swizzle opcode producing `width` cells.
pub fn swizzle_name(width: usize) -> String {
    format!("swizzle_{width}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{BinaryOp, UnaryOp};

    fn widths(plan: &[Step]) -> Vec<(usize, usize)> {
        plan.iter().map(|step| (step.offset, step.count)).collect()
    }

    #[test]
    fn copy_names() {
        let masked = OpFamily::COPY_MASKED;
        assert_eq!(masked.name(OpWidth::Fixed(1)), "copy_slot_masked");
        assert_eq!(masked.name(OpWidth::Fixed(4)), "copy_4_slots_masked");
        assert_eq!(
            OpFamily::COPY_UNMASKED.name(OpWidth::Fixed(3)),
            "copy_3_slots_unmasked"
        );
        assert_eq!(OpFamily::COPY_CONSTANT.name(OpWidth::Fixed(1)), "copy_constant");
        assert_eq!(OpFamily::COPY_CONSTANT.name(OpWidth::Fixed(2)), "copy_2_constants");
        assert_eq!(OpFamily::ZERO_UNMASKED.name(OpWidth::Fixed(1)), "zero_slot_unmasked");
    }

    #[test]
    fn arithmetic_names() {
        let add = BinaryOp::AddFloats.family();
        assert_eq!(add.name(OpWidth::Fixed(1)), "add_float");
        assert_eq!(add.name(OpWidth::Fixed(2)), "add_2_floats");
        assert_eq!(add.name(OpWidth::Generic), "add_n_floats");
        assert_eq!(BinaryOp::CmpltInts.family().name(OpWidth::Fixed(1)), "cmplt_int");
        assert_eq!(BinaryOp::DivUints.family().name(OpWidth::Generic), "div_n_uints");
    }

    #[test]
    fn untyped_names_have_no_noun() {
        assert_eq!(BinaryOp::BitwiseAnd.family().name(OpWidth::Fixed(1)), "bitwise_and");
        assert_eq!(BinaryOp::BitwiseXor.family().name(OpWidth::Fixed(3)), "bitwise_xor_3");
        assert_eq!(UnaryOp::BitwiseNot.family().name(OpWidth::Fixed(4)), "bitwise_not_4");
        assert_eq!(
            UnaryOp::CastToFloatFromInt.family().name(OpWidth::Fixed(2)),
            "cast_to_float_from_2_ints"
        );
    }

    #[test]
    fn five_slots_lower_to_four_plus_one() {
        let plan = OpFamily::COPY_UNMASKED.plan(5);
        assert_eq!(widths(&plan), vec![(0, 4), (4, 1)]);
        assert_eq!(plan[1].width, OpWidth::Fixed(1));
    }

    #[test]
    fn generic_families_stay_in_one_step() {
        let plan = BinaryOp::DivInts.family().plan(5);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].width, OpWidth::Generic);
        assert_eq!(plan[0].count, 5);

        let plan = BinaryOp::DivInts.family().plan(4);
        assert_eq!(plan[0].width, OpWidth::Fixed(4));
    }

    #[test]
    fn unary_families_are_chunked() {
        let plan = UnaryOp::BitwiseNot.family().plan(9);
        assert_eq!(widths(&plan), vec![(0, 4), (4, 4), (8, 1)]);
    }

    #[test]
    fn zero_width_emits_nothing() {
        assert!(OpFamily::COPY_MASKED.plan(0).is_empty());
        assert_eq!(duplicate_steps(0).count(), 0);
    }

    #[test]
    fn duplicate_uses_widest_broadcasts() {
        assert_eq!(duplicate_steps(1).collect::<Vec<_>>(), vec![1]);
        assert_eq!(duplicate_steps(3).collect::<Vec<_>>(), vec![3]);
        assert_eq!(duplicate_steps(5).collect::<Vec<_>>(), vec![3, 2]);
        assert_eq!(duplicate_steps(30).count(), 10);
        assert_eq!(duplicate_steps(37).last(), Some(1));
    }
}
