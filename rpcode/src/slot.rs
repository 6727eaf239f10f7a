use core::fmt;

/// Index into one of the three slot spaces (value, uniform, temp stack).
pub type Slot = usize;

/// Identifies one of the independent operand stacks.
pub type StackId = usize;

/// A run of `count` consecutive slots starting at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SlotRange {
    pub index: Slot,
    pub count: usize,
}

impl SlotRange {
    pub const fn new(index: Slot, count: usize) -> Self {
        Self { index, count }
    }

    pub const fn one(index: Slot) -> Self {
        Self { index, count: 1 }
    }

    /// One past the last slot of the range, saturating at `usize::MAX`.
    pub const fn end(self) -> Slot {
        self.index.saturating_add(self.count)
    }

    pub const fn is_empty(self) -> bool {
        self.count == 0
    }

    /// The sub-range `offset..offset + count`, relative to this range.
    pub fn slice(self, offset: usize, count: usize) -> Self {
        debug_assert!(offset + count <= self.count, "slice escapes {self:?}");
        Self::new(self.index + offset, count)
    }

    /// The single slot at `offset` within this range.
    pub fn at(self, offset: usize) -> Self {
        self.slice(offset, 1)
    }

    /// Shift the whole range by `base`.
    pub const fn offset_by(self, base: Slot) -> Self {
        Self::new(self.index + base, self.count)
    }
}

/// The numbering space a slot index belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotSpace {
    Value,
    Uniform,
    Stack,
}

impl SlotSpace {
    /// Prefix used when printing slots of this space.
    pub const fn prefix(self) -> char {
        match self {
            Self::Value => 'v',
            Self::Uniform => 'u',
            Self::Stack => '$',
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Uniform => "uniform",
            Self::Stack => "stack",
        }
    }
}

/// Formats `range` as `v3` or `v3..6`, depending on its width.
pub struct DisplayRange {
    pub space: SlotSpace,
    pub range: SlotRange,
}

impl fmt::Display for DisplayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.space.prefix();
        let SlotRange { index, count } = self.range;
        if count <= 1 {
            write!(f, "{prefix}{index}")
        } else {
            write!(f, "{prefix}{index}..{}", index + count - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show(space: SlotSpace, range: SlotRange) -> String {
        DisplayRange { space, range }.to_string()
    }

    #[test]
    fn single_slot_has_no_range_suffix() {
        assert_eq!(show(SlotSpace::Value, SlotRange::one(4)), "v4");
        assert_eq!(show(SlotSpace::Stack, SlotRange::one(0)), "$0");
    }

    #[test]
    fn ranges_print_inclusive_end() {
        assert_eq!(show(SlotSpace::Value, SlotRange::new(0, 2)), "v0..1");
        assert_eq!(show(SlotSpace::Uniform, SlotRange::new(6, 4)), "u6..9");
        assert_eq!(show(SlotSpace::Stack, SlotRange::new(10, 4)), "$10..13");
    }

    #[test]
    fn slicing_stays_relative() {
        let range = SlotRange::new(10, 5);
        assert_eq!(range.slice(4, 1), SlotRange::new(14, 1));
        assert_eq!(range.at(2), SlotRange::one(12));
        assert_eq!(range.end(), 15);
        assert_eq!(range.offset_by(3), SlotRange::new(13, 5));
    }

    #[test]
    fn end_saturates_at_the_top_of_the_index_space() {
        assert_eq!(SlotRange::new(usize::MAX, 2).end(), usize::MAX);
        assert_eq!(SlotRange::new(usize::MAX - 1, 1).end(), usize::MAX);
    }
}
