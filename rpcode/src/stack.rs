use crate::slot::{SlotRange, StackId};

/// Build-time bookkeeping for the operand stacks.
///
/// Every stack is an independent LIFO of cells. While building, cells are
/// addressed relative to their own stack; [`StackManager::layout`] later
/// assigns each stack a base in the shared temp-cell space so no two stacks
/// overlap.
#[derive(Debug, Clone)]
pub struct StackManager {
    current: StackId,
    depths: Vec<usize>,
    max_depths: Vec<usize>,
}

impl StackManager {
    pub fn new() -> Self {
        Self {
            current: 0,
            depths: vec![0],
            max_depths: vec![0],
        }
    }

    /// Select the stack that subsequent push/pop/discard calls target.
    pub fn set_current(&mut self, stack: StackId) {
        if stack >= self.depths.len() {
            self.depths.resize(stack + 1, 0);
            self.max_depths.resize(stack + 1, 0);
        }
        self.current = stack;
    }

    #[must_use]
    pub fn current(&self) -> StackId {
        self.current
    }

    /// Number of cells currently live on the current stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depths[self.current]
    }

    /// Number of cells currently live on `stack`.
    #[must_use]
    pub fn depth_of(&self, stack: StackId) -> usize {
        self.depths.get(stack).copied().unwrap_or(0)
    }

    /// Allocate `width` fresh cells on top of the current stack.
    pub fn push(&mut self, width: usize) -> SlotRange {
        let depth = &mut self.depths[self.current];
        let range = SlotRange::new(*depth, width);
        *depth += width;
        let max = &mut self.max_depths[self.current];
        *max = (*max).max(*depth);
        range
    }

    /// Release the top `width` cells and return the range they occupied.
    ///
    /// # Panics
    ///
    /// Panics if the current stack holds fewer than `width` cells.
    pub fn pop(&mut self, width: usize) -> SlotRange {
        let range = self.top(width);
        self.depths[self.current] -= width;
        range
    }

    /// Release the top `width` cells without reading them.
    ///
    /// # Panics
    ///
    /// Panics if the current stack holds fewer than `width` cells.
    pub fn discard(&mut self, width: usize) {
        self.pop(width);
    }

    /// The range of the top `width` cells of the current stack.
    ///
    /// # Panics
    ///
    /// Panics if the current stack holds fewer than `width` cells.
    #[must_use]
    pub fn top(&self, width: usize) -> SlotRange {
        self.below_top(width, width)
    }

    /// `count` cells starting `offset` cells below the top of the current
    /// stack. `offset == count` names the topmost `count` cells.
    ///
    /// # Panics
    ///
    /// Panics if the range reaches below the stack's base or above its top.
    #[must_use]
    pub fn below_top(&self, offset: usize, count: usize) -> SlotRange {
        let depth = self.depth();
        assert!(
            offset <= depth,
            "stack {} underflow: need {offset} cells, have {depth}",
            self.current
        );
        assert!(
            count <= offset,
            "range of {count} cells starting {offset} below the top of stack {} \
             reaches past the top",
            self.current
        );
        SlotRange::new(depth - offset, count)
    }

    /// The first stack (if any) that still holds cells, with its depth.
    #[must_use]
    pub fn first_unbalanced(&self) -> Option<(StackId, usize)> {
        self.depths
            .iter()
            .enumerate()
            .find(|(_, depth)| **depth != 0)
            .map(|(stack, depth)| (stack, *depth))
    }

    /// Assign every stack a base so that stacks never overlap.
    ///
    /// Stacks are laid out in id order; each base is the sum of the maximum
    /// depths of the stacks before it.
    #[must_use]
    pub fn layout(&self) -> StackLayout {
        let mut bases = Vec::with_capacity(self.max_depths.len());
        let mut total = 0;
        for max in &self.max_depths {
            bases.push(total);
            total += max;
        }
        StackLayout { bases, total }
    }
}

impl Default for StackManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Absolute placement of every stack in the shared temp-cell space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackLayout {
    bases: Vec<usize>,
    total: usize,
}

impl StackLayout {
    #[must_use]
    pub fn base(&self, stack: StackId) -> usize {
        self.bases[stack]
    }

    /// Total number of temp cells across all stacks.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Convert a stack-relative range into an absolute one.
    #[must_use]
    pub fn resolve(&self, stack: StackId, range: SlotRange) -> SlotRange {
        range.offset_by(self.base(stack))
    }
}
