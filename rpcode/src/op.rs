use crate::lowering::{OpFamily, OpWidth};

/// Lane type an operation family works on. Picks the opcode name suffix
/// (`add_float`, `add_2_ints`, `div_n_uints`, or none for `bitwise_and`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneType {
    Untyped,
    Float,
    Int,
    Uint,
}

impl LaneType {
    /// Singular and plural noun appended to opcode names.
    pub const fn nouns(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Untyped => None,
            Self::Float => Some(("float", "floats")),
            Self::Int => Some(("int", "ints")),
            Self::Uint => Some(("uint", "uints")),
        }
    }
}

/// How a binary operation reads in disassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryNotation {
    /// `dst += src`
    Compound(&'static str),
    /// `dst = max(dst, src)`
    Call(&'static str),
}

/// How a unary operation reads in disassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryNotation {
    /// `dst = ~dst`
    Prefix(&'static str),
    /// `dst = abs(dst)`
    Call(&'static str),
}

/// Two-operand operations. Both operands are same-width groups on the
/// current stack; the result replaces the lower group and the upper group is
/// released.
///
/// Every binary op has a generic `_n_` opcode used above width four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    AddFloats,
    AddInts,
    SubFloats,
    SubInts,
    MulFloats,
    MulInts,
    DivFloats,
    DivInts,
    DivUints,
    MinFloats,
    MinInts,
    MinUints,
    MaxFloats,
    MaxInts,
    MaxUints,
    CmpltFloats,
    CmpltInts,
    CmpltUints,
    CmpleFloats,
    CmpleInts,
    CmpleUints,
    CmpeqFloats,
    CmpeqInts,
    CmpneFloats,
    CmpneInts,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 28] = [
        Self::AddFloats,
        Self::AddInts,
        Self::SubFloats,
        Self::SubInts,
        Self::MulFloats,
        Self::MulInts,
        Self::DivFloats,
        Self::DivInts,
        Self::DivUints,
        Self::MinFloats,
        Self::MinInts,
        Self::MinUints,
        Self::MaxFloats,
        Self::MaxInts,
        Self::MaxUints,
        Self::CmpltFloats,
        Self::CmpltInts,
        Self::CmpltUints,
        Self::CmpleFloats,
        Self::CmpleInts,
        Self::CmpleUints,
        Self::CmpeqFloats,
        Self::CmpeqInts,
        Self::CmpneFloats,
        Self::CmpneInts,
        Self::BitwiseAnd,
        Self::BitwiseOr,
        Self::BitwiseXor,
    ];

    /// Opcode stem, lane type and notation.
    pub const fn info(self) -> (&'static str, LaneType, BinaryNotation) {
        use LaneType::*;
        use BinaryNotation::*;
        match self {
            Self::AddFloats => ("add", Float, Compound("+=")),
            Self::AddInts => ("add", Int, Compound("+=")),
            Self::SubFloats => ("sub", Float, Compound("-=")),
            Self::SubInts => ("sub", Int, Compound("-=")),
            Self::MulFloats => ("mul", Float, Compound("*=")),
            Self::MulInts => ("mul", Int, Compound("*=")),
            Self::DivFloats => ("div", Float, Compound("/=")),
            Self::DivInts => ("div", Int, Compound("/=")),
            Self::DivUints => ("div", Uint, Compound("/=")),
            Self::MinFloats => ("min", Float, Call("min")),
            Self::MinInts => ("min", Int, Call("min")),
            Self::MinUints => ("min", Uint, Call("min")),
            Self::MaxFloats => ("max", Float, Call("max")),
            Self::MaxInts => ("max", Int, Call("max")),
            Self::MaxUints => ("max", Uint, Call("max")),
            Self::CmpltFloats => ("cmplt", Float, Call("lessThan")),
            Self::CmpltInts => ("cmplt", Int, Call("lessThan")),
            Self::CmpltUints => ("cmplt", Uint, Call("lessThan")),
            Self::CmpleFloats => ("cmple", Float, Call("lessThanEqual")),
            Self::CmpleInts => ("cmple", Int, Call("lessThanEqual")),
            Self::CmpleUints => ("cmple", Uint, Call("lessThanEqual")),
            Self::CmpeqFloats => ("cmpeq", Float, Call("equal")),
            Self::CmpeqInts => ("cmpeq", Int, Call("equal")),
            Self::CmpneFloats => ("cmpne", Float, Call("notEqual")),
            Self::CmpneInts => ("cmpne", Int, Call("notEqual")),
            Self::BitwiseAnd => ("bitwise_and", Untyped, Compound("&=")),
            Self::BitwiseOr => ("bitwise_or", Untyped, Compound("|=")),
            Self::BitwiseXor => ("bitwise_xor", Untyped, Compound("^=")),
        }
    }

    pub const fn notation(self) -> BinaryNotation {
        self.info().2
    }

    pub const fn family(self) -> OpFamily {
        let (stem, lanes, _) = self.info();
        OpFamily {
            stem,
            noun: lanes.nouns(),
            suffix: "",
            generic: true,
        }
    }

    /// Name used to request this op from the builder: the generic opcode
    /// name for typed ops (`add_n_floats`), the bare stem otherwise
    /// (`bitwise_and`).
    pub fn builder_name(self) -> String {
        let family = self.family();
        match family.noun {
            Some(_) => family.name(OpWidth::Generic),
            None => family.stem.to_string(),
        }
    }

    pub fn from_builder_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.builder_name() == name)
    }
}

/// Single-operand operations, applied in place to the top group of the
/// current stack. Unary ops only exist in widths one to four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    BitwiseNot,
    AbsFloat,
    AbsInt,
    FloorFloat,
    CeilFloat,
    CastToFloatFromInt,
    CastToFloatFromUint,
    CastToIntFromFloat,
    CastToUintFromFloat,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 9] = [
        Self::BitwiseNot,
        Self::AbsFloat,
        Self::AbsInt,
        Self::FloorFloat,
        Self::CeilFloat,
        Self::CastToFloatFromInt,
        Self::CastToFloatFromUint,
        Self::CastToIntFromFloat,
        Self::CastToUintFromFloat,
    ];

    pub const fn info(self) -> (&'static str, LaneType, UnaryNotation) {
        use LaneType::*;
        use UnaryNotation::*;
        match self {
            Self::BitwiseNot => ("bitwise_not", Untyped, Prefix("~")),
            Self::AbsFloat => ("abs", Float, Call("abs")),
            Self::AbsInt => ("abs", Int, Call("abs")),
            Self::FloorFloat => ("floor", Float, Call("floor")),
            Self::CeilFloat => ("ceil", Float, Call("ceil")),
            Self::CastToFloatFromInt => ("cast_to_float_from", Int, Call("IntToFloat")),
            Self::CastToFloatFromUint => ("cast_to_float_from", Uint, Call("UintToFloat")),
            Self::CastToIntFromFloat => ("cast_to_int_from", Float, Call("FloatToInt")),
            Self::CastToUintFromFloat => ("cast_to_uint_from", Float, Call("FloatToUint")),
        }
    }

    pub const fn notation(self) -> UnaryNotation {
        self.info().2
    }

    pub const fn family(self) -> OpFamily {
        let (stem, lanes, _) = self.info();
        OpFamily {
            stem,
            noun: lanes.nouns(),
            suffix: "",
            generic: false,
        }
    }

    /// Name used to request this op from the builder: its scalar opcode
    /// name (`bitwise_not`, `abs_float`).
    pub fn builder_name(self) -> String {
        self.family().name(OpWidth::Fixed(1))
    }

    pub fn from_builder_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.builder_name() == name)
    }
}
