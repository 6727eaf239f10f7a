use core::fmt;

use crate::lowering::{swizzle_name, OpFamily, OpWidth};
use crate::op::{BinaryOp, UnaryOp};
use crate::slot::{DisplayRange, SlotRange, SlotSpace, StackId};

/// A branch target, created by [`Builder::next_label_id`] and bound to a
/// position with [`Builder::label`].
///
/// [`Builder::next_label_id`]: crate::Builder::next_label_id
/// [`Builder::label`]: crate::Builder::label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub(crate) usize);

impl Label {
    pub const fn id(self) -> usize {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Where an operand lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Place {
    Value(SlotRange),
    Uniform(SlotRange),
    /// Absolute temp-stack cells.
    Stack(SlotRange),
    /// Cells of one stack, counted from that stack's base. Only exists
    /// while building; [`Builder::finish`](crate::Builder::finish) rewrites
    /// these into [`Place::Stack`].
    StackRelative { stack: StackId, range: SlotRange },
}

impl Place {
    pub const fn range(self) -> SlotRange {
        match self {
            Self::Value(range)
            | Self::Uniform(range)
            | Self::Stack(range)
            | Self::StackRelative { range, .. } => range,
        }
    }

    pub const fn count(self) -> usize {
        self.range().count
    }

    pub const fn space(self) -> SlotSpace {
        match self {
            Self::Value(_) => SlotSpace::Value,
            Self::Uniform(_) => SlotSpace::Uniform,
            Self::Stack(_) | Self::StackRelative { .. } => SlotSpace::Stack,
        }
    }

    /// The same place with its range replaced.
    pub fn with_range(self, range: SlotRange) -> Self {
        match self {
            Self::Value(_) => Self::Value(range),
            Self::Uniform(_) => Self::Uniform(range),
            Self::Stack(_) => Self::Stack(range),
            Self::StackRelative { stack, .. } => Self::StackRelative { stack, range },
        }
    }

    /// `count` slots starting `offset` slots into this place.
    pub fn slice(self, offset: usize, count: usize) -> Self {
        self.with_range(self.range().slice(offset, count))
    }

    pub fn at(self, offset: usize) -> Self {
        self.slice(offset, 1)
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Self::StackRelative { stack, .. } = self {
            write!(f, "s{stack}:")?;
        }
        let range = DisplayRange {
            space: self.space(),
            range: self.range(),
        };
        fmt::Display::fmt(&range, f)
    }
}

/// Destination of a branch: a label while building, a signed instruction
/// offset (relative to the branch itself) once finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Label(Label),
    Offset(isize),
}

/// Up to four swizzle component indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Components {
    indices: [u8; 4],
    len: u8,
}

impl Components {
    /// # Panics
    ///
    /// Panics unless there are one to four indices.
    pub fn new(indices: &[u8]) -> Self {
        assert!(
            (1..=4).contains(&indices.len()),
            "swizzles produce one to four components, got {}",
            indices.len()
        );
        let mut buf = [0; 4];
        buf[..indices.len()].copy_from_slice(indices);
        Self {
            indices: buf,
            len: indices.len() as u8,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.indices[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of input cells the swizzle reads.
    pub fn input_span(&self) -> usize {
        let highest = self.as_slice().iter().copied().max().unwrap_or(0) as usize;
        self.len().max(highest + 1)
    }
}

impl fmt::Display for Components {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [char; 4] = ['x', 'y', 'z', 'w'];
        for index in self.as_slice() {
            write!(f, "{}", NAMES[*index as usize])?;
        }
        Ok(())
    }
}

/// One concrete instruction of a raster pipeline program.
///
/// The builder emits these while lowering its calls; `finish` resolves stack
/// cells and branch targets, after which the list is immutable.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    StoreSrcRg { dst: Place },
    StoreSrc { dst: Place },
    StoreDst { dst: Place },
    LoadSrc { src: Place },
    LoadDst { src: Place },

    InitLaneMasks,
    MaskOffReturnMask,
    MaskOffLoopMask,
    ReenableLoopMask { src: Place },
    StoreConditionMask { dst: Place },
    StoreLoopMask { dst: Place },
    StoreReturnMask { dst: Place },
    LoadConditionMask { src: Place },
    LoadLoopMask { src: Place },
    LoadReturnMask { src: Place },
    /// `src` holds two cells that are and-ed into the condition mask.
    MergeConditionMask { src: Place },
    MergeLoopMask { src: Place },

    /// Write a 32-bit pattern into the first lane of the source color.
    Immediate { bits: u32 },
    LoadUnmasked { src: Place },
    StoreUnmasked { dst: Place },
    StoreMasked { dst: Place },

    CopySlots { dst: Place, src: Place, masked: bool },
    CopyLiteral { dst: Place, bits: u32 },
    CopyUniforms { dst: Place, src: Place },
    ZeroSlots { dst: Place },
    /// `dst` covers the output cells, `src` the input cells read.
    Swizzle { dst: Place, src: Place, components: Components },
    Binary { op: BinaryOp, width: OpWidth, dst: Place, src: Place },
    Unary { op: UnaryOp, dst: Place },

    /// Marks a position for branches; removed by `finish`.
    Label(Label),
    Jump { target: Target },
    BranchIfAnyActiveLanes { target: Target },
    BranchIfNoActiveLanes { target: Target },
    StackRewind,
}

impl Instruction {
    /// Opcode name as printed by the disassembler.
    pub fn name(&self) -> String {
        let fixed = |place: &Place| OpWidth::Fixed(place.count());
        match self {
            Self::StoreSrcRg { .. } => "store_src_rg".into(),
            Self::StoreSrc { .. } => "store_src".into(),
            Self::StoreDst { .. } => "store_dst".into(),
            Self::LoadSrc { .. } => "load_src".into(),
            Self::LoadDst { .. } => "load_dst".into(),
            Self::InitLaneMasks => "init_lane_masks".into(),
            Self::MaskOffReturnMask => "mask_off_return_mask".into(),
            Self::MaskOffLoopMask => "mask_off_loop_mask".into(),
            Self::ReenableLoopMask { .. } => "reenable_loop_mask".into(),
            Self::StoreConditionMask { .. } => "store_condition_mask".into(),
            Self::StoreLoopMask { .. } => "store_loop_mask".into(),
            Self::StoreReturnMask { .. } => "store_return_mask".into(),
            Self::LoadConditionMask { .. } => "load_condition_mask".into(),
            Self::LoadLoopMask { .. } => "load_loop_mask".into(),
            Self::LoadReturnMask { .. } => "load_return_mask".into(),
            Self::MergeConditionMask { .. } => "merge_condition_mask".into(),
            Self::MergeLoopMask { .. } => "merge_loop_mask".into(),
            Self::Immediate { .. } => "immediate_f".into(),
            Self::LoadUnmasked { .. } => "load_unmasked".into(),
            Self::StoreUnmasked { .. } => "store_unmasked".into(),
            Self::StoreMasked { .. } => "store_masked".into(),
            Self::CopySlots { dst, masked, .. } => {
                let family = if *masked {
                    OpFamily::COPY_MASKED
                } else {
                    OpFamily::COPY_UNMASKED
                };
                family.name(fixed(dst))
            }
            Self::CopyLiteral { dst, .. } | Self::CopyUniforms { dst, .. } => {
                OpFamily::COPY_CONSTANT.name(fixed(dst))
            }
            Self::ZeroSlots { dst } => OpFamily::ZERO_UNMASKED.name(fixed(dst)),
            Self::Swizzle { components, .. } => swizzle_name(components.len()),
            Self::Binary { op, width, .. } => op.family().name(*width),
            Self::Unary { op, dst } => op.family().name(fixed(dst)),
            Self::Label(_) => "label".into(),
            Self::Jump { .. } => "jump".into(),
            Self::BranchIfAnyActiveLanes { .. } => "branch_if_any_active_lanes".into(),
            Self::BranchIfNoActiveLanes { .. } => "branch_if_no_active_lanes".into(),
            Self::StackRewind => "stack_rewind".into(),
        }
    }

    /// The branch target, for jumps and conditional branches.
    pub fn target(&self) -> Option<Target> {
        match self {
            Self::Jump { target }
            | Self::BranchIfAnyActiveLanes { target }
            | Self::BranchIfNoActiveLanes { target } => Some(*target),
            _ => None,
        }
    }

    /// The same branch pointed at `target`. Other instructions are returned
    /// unchanged.
    pub fn with_target(self, target: Target) -> Self {
        match self {
            Self::Jump { .. } => Self::Jump { target },
            Self::BranchIfAnyActiveLanes { .. } => Self::BranchIfAnyActiveLanes { target },
            Self::BranchIfNoActiveLanes { .. } => Self::BranchIfNoActiveLanes { target },
            other => other,
        }
    }

    /// Every operand location, in source order.
    pub fn places(&self) -> Vec<Place> {
        match self {
            Self::StoreSrcRg { dst }
            | Self::StoreSrc { dst }
            | Self::StoreDst { dst }
            | Self::StoreConditionMask { dst }
            | Self::StoreLoopMask { dst }
            | Self::StoreReturnMask { dst }
            | Self::StoreUnmasked { dst }
            | Self::StoreMasked { dst }
            | Self::CopyLiteral { dst, .. }
            | Self::ZeroSlots { dst }
            | Self::Unary { dst, .. } => vec![*dst],
            Self::LoadSrc { src }
            | Self::LoadDst { src }
            | Self::ReenableLoopMask { src }
            | Self::LoadConditionMask { src }
            | Self::LoadLoopMask { src }
            | Self::LoadReturnMask { src }
            | Self::MergeConditionMask { src }
            | Self::MergeLoopMask { src }
            | Self::LoadUnmasked { src } => vec![*src],
            Self::CopySlots { dst, src, .. }
            | Self::CopyUniforms { dst, src }
            | Self::Swizzle { dst, src, .. }
            | Self::Binary { dst, src, .. } => vec![*dst, *src],
            Self::InitLaneMasks
            | Self::MaskOffReturnMask
            | Self::MaskOffLoopMask
            | Self::Immediate { .. }
            | Self::Label(_)
            | Self::Jump { .. }
            | Self::BranchIfAnyActiveLanes { .. }
            | Self::BranchIfNoActiveLanes { .. }
            | Self::StackRewind => Vec::new(),
        }
    }

    /// Rewrite every operand location with `f`.
    pub fn map_places(self, mut f: impl FnMut(Place) -> Place) -> Self {
        match self {
            Self::StoreSrcRg { dst } => Self::StoreSrcRg { dst: f(dst) },
            Self::StoreSrc { dst } => Self::StoreSrc { dst: f(dst) },
            Self::StoreDst { dst } => Self::StoreDst { dst: f(dst) },
            Self::LoadSrc { src } => Self::LoadSrc { src: f(src) },
            Self::LoadDst { src } => Self::LoadDst { src: f(src) },
            Self::ReenableLoopMask { src } => Self::ReenableLoopMask { src: f(src) },
            Self::StoreConditionMask { dst } => Self::StoreConditionMask { dst: f(dst) },
            Self::StoreLoopMask { dst } => Self::StoreLoopMask { dst: f(dst) },
            Self::StoreReturnMask { dst } => Self::StoreReturnMask { dst: f(dst) },
            Self::LoadConditionMask { src } => Self::LoadConditionMask { src: f(src) },
            Self::LoadLoopMask { src } => Self::LoadLoopMask { src: f(src) },
            Self::LoadReturnMask { src } => Self::LoadReturnMask { src: f(src) },
            Self::MergeConditionMask { src } => Self::MergeConditionMask { src: f(src) },
            Self::MergeLoopMask { src } => Self::MergeLoopMask { src: f(src) },
            Self::LoadUnmasked { src } => Self::LoadUnmasked { src: f(src) },
            Self::StoreUnmasked { dst } => Self::StoreUnmasked { dst: f(dst) },
            Self::StoreMasked { dst } => Self::StoreMasked { dst: f(dst) },
            Self::CopySlots { dst, src, masked } => Self::CopySlots {
                dst: f(dst),
                src: f(src),
                masked,
            },
            Self::CopyLiteral { dst, bits } => Self::CopyLiteral { dst: f(dst), bits },
            Self::CopyUniforms { dst, src } => Self::CopyUniforms {
                dst: f(dst),
                src: f(src),
            },
            Self::ZeroSlots { dst } => Self::ZeroSlots { dst: f(dst) },
            Self::Swizzle {
                dst,
                src,
                components,
            } => Self::Swizzle {
                dst: f(dst),
                src: f(src),
                components,
            },
            Self::Binary { op, width, dst, src } => Self::Binary {
                op,
                width,
                dst: f(dst),
                src: f(src),
            },
            Self::Unary { op, dst } => Self::Unary { op, dst: f(dst) },
            other @ (Self::InitLaneMasks
            | Self::MaskOffReturnMask
            | Self::MaskOffLoopMask
            | Self::Immediate { .. }
            | Self::Label(_)
            | Self::Jump { .. }
            | Self::BranchIfAnyActiveLanes { .. }
            | Self::BranchIfNoActiveLanes { .. }
            | Self::StackRewind) => other,
        }
    }
}
