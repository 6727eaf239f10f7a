//! Textual listing of finished programs.
//!
//! Each instruction prints as its 1-based index, its opcode name padded to
//! thirty columns and a short description of what it does:
//!
//! ```text
//!     1. copy_constant                  $0 = 0x3F800000 (1.0)
//!     2. swizzle_2                      $0..1 = ($0..1).xx
//! ```

use core::fmt;

use crate::instruction::{Instruction, Place, Target};
use crate::op::{BinaryNotation, UnaryNotation};

/// Disassemble `instructions` into a newline-terminated listing.
pub fn disassemble(instructions: &[Instruction]) -> String {
    Listing(instructions).to_string()
}

/// `Display` adapter over a borrowed instruction sequence.
pub(crate) struct Listing<'a>(pub(crate) &'a [Instruction]);

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_listing(f, self.0)
    }
}

pub fn write_listing<W: fmt::Write + ?Sized>(
    out: &mut W,
    instructions: &[Instruction],
) -> fmt::Result {
    for (index, instruction) in instructions.iter().enumerate() {
        let number = index + 1;
        let name = instruction.name();
        let effect = effect(instruction, index);
        if effect.is_empty() {
            writeln!(out, "{number:>5}. {name}")?;
        } else {
            writeln!(out, "{number:>5}. {name:<30} {effect}")?;
        }
    }
    Ok(())
}

/// What `instruction` (at 0-based position `index`) does, in a C-like
/// notation. Empty for instructions without operands worth printing.
pub fn effect(instruction: &Instruction, index: usize) -> String {
    use Instruction::*;
    match instruction {
        StoreSrcRg { dst } => format!("{dst} = src.rg"),
        StoreSrc { dst } => format!("{dst} = src.rgba"),
        StoreDst { dst } => format!("{dst} = dst.rgba"),
        LoadSrc { src } => format!("src.rgba = {src}"),
        LoadDst { src } => format!("dst.rgba = {src}"),

        InitLaneMasks => "CondMask = LoopMask = RetMask = true".into(),
        MaskOffReturnMask => "RetMask &= ~(CondMask & LoopMask & RetMask)".into(),
        MaskOffLoopMask => "LoopMask &= ~(CondMask & LoopMask & RetMask)".into(),
        ReenableLoopMask { src } => format!("LoopMask |= {src}"),
        StoreConditionMask { dst } => format!("{dst} = CondMask"),
        StoreLoopMask { dst } => format!("{dst} = LoopMask"),
        StoreReturnMask { dst } => format!("{dst} = RetMask"),
        LoadConditionMask { src } => format!("CondMask = {src}"),
        LoadLoopMask { src } => format!("LoopMask = {src}"),
        LoadReturnMask { src } => format!("RetMask = {src}"),
        MergeConditionMask { src } => merge_pair(*src),
        MergeLoopMask { src } => format!("LoopMask &= {src}"),

        Immediate { bits } => format!("src.r = {}", format_bits(*bits)),
        LoadUnmasked { src } => format!("src.r = {src}"),
        StoreUnmasked { dst } => format!("{dst} = src.r"),
        StoreMasked { dst } => format!("{dst} = Mask(src.r)"),

        CopySlots { dst, src, masked } => {
            if *masked {
                format!("{dst} = Mask({src})")
            } else {
                format!("{dst} = {src}")
            }
        }
        CopyLiteral { dst, bits } => format!("{dst} = {}", format_bits(*bits)),
        CopyUniforms { dst, src } => format!("{dst} = {src}"),
        ZeroSlots { dst } => format!("{dst} = 0"),
        Swizzle {
            dst,
            src,
            components,
        } => format!("{dst} = ({src}).{components}"),
        Binary { op, dst, src, .. } => match op.notation() {
            BinaryNotation::Compound(operator) => format!("{dst} {operator} {src}"),
            BinaryNotation::Call(function) => format!("{dst} = {function}({dst}, {src})"),
        },
        Unary { op, dst } => match op.notation() {
            UnaryNotation::Prefix(operator) => format!("{dst} = {operator}{dst}"),
            UnaryNotation::Call(function) => format!("{dst} = {function}({dst})"),
        },

        Label(label) => format!("{label}:"),
        Jump { target }
        | BranchIfAnyActiveLanes { target }
        | BranchIfNoActiveLanes { target } => {
            format!("{} {}", instruction.name(), describe_target(*target, index))
        }
        StackRewind => String::new(),
    }
}

fn merge_pair(src: Place) -> String {
    if src.count() == 2 {
        format!("CondMask = {} & {}", src.at(0), src.at(1))
    } else {
        format!("CondMask = {src}")
    }
}

fn describe_target(target: Target, index: usize) -> String {
    match target {
        Target::Offset(offset) => {
            let destination = index as isize + offset + 1;
            format!("{offset:+} (#{destination})")
        }
        Target::Label(label) => label.to_string(),
    }
}

/// `0x%08X`, followed by the float reading of the bits when it is finite.
pub fn format_bits(bits: u32) -> String {
    let value = f32::from_bits(bits);
    if value.is_finite() {
        format!("0x{bits:08X} ({})", format_float(value))
    } else {
        format!("0x{bits:08X}")
    }
}

/// Shortest `%g`-style text that reads back as `value`: seven significant
/// digits, or nine when seven are not enough. Integral values keep a `.0`.
pub fn format_float(value: f32) -> String {
    let mut text = general(value, 7);
    if text.parse::<f32>() != Ok(value) {
        text = general(value, 9);
    }
    if !text.contains(['.', 'e']) {
        text.push_str(".0");
    }
    text
}

/// `printf("%.*g", precision, value)`.
fn general(value: f32, precision: usize) -> String {
    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}
