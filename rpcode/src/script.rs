//! Line-oriented builder scripts.
//!
//! Every non-empty line is one builder call: the method name followed by
//! whitespace separated arguments. `#` starts a comment.
//!
//! ```text
//! # broadcast 1.0 into four cells and store them
//! push_literal_f 1.0
//! duplicate 3
//! pop_slots v0..3
//! ```
//!
//! Slot ranges use the listing notation (`v3`, `v0..3`, `u1..2`), swizzle
//! components are written as `xyzw` letters, and labels are free-form names.
//! Calls that would underflow a stack are reported as errors instead of
//! reaching the builder.

use core::fmt;
use std::collections::HashMap;
use std::str::SplitWhitespace;

use crate::builder::{BuildError, Builder};
use crate::instruction::Label;
use crate::op::{BinaryOp, UnaryOp};
use crate::program::Program;
use crate::slot::{SlotRange, SlotSpace, StackId};

/// Largest slot index, cell count or offset a script line may name.
const MAX_OPERAND: usize = 0xFFFF;

/// Highest stack id a script may select.
const MAX_STACK: StackId = 0xFF;

/// A script line that could not be turned into a builder call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ScriptError {}

/// A parsed script: the populated builder and the slot counts its ranges
/// need.
#[derive(Debug, Clone)]
pub struct Script {
    builder: Builder,
    num_value_slots: usize,
    num_uniform_slots: usize,
}

impl Script {
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        let mut parser = ScriptParser::default();
        for (index, text) in source.lines().enumerate() {
            let code = text.split('#').next().unwrap_or_default();
            parser.line(code).map_err(|message| ScriptError {
                line: index + 1,
                message,
            })?;
        }
        Ok(Self {
            builder: parser.builder,
            num_value_slots: parser.num_value_slots,
            num_uniform_slots: parser.num_uniform_slots,
        })
    }

    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    /// One past the highest value slot the script names.
    pub fn num_value_slots(&self) -> usize {
        self.num_value_slots
    }

    /// One past the highest uniform slot the script names.
    pub fn num_uniform_slots(&self) -> usize {
        self.num_uniform_slots
    }

    /// Finish the builder, using the inferred slot counts where none are
    /// given.
    pub fn finish(
        self,
        num_value_slots: Option<usize>,
        num_uniform_slots: Option<usize>,
    ) -> Result<Program, BuildError> {
        self.builder.finish(
            num_value_slots.unwrap_or(self.num_value_slots),
            num_uniform_slots.unwrap_or(self.num_uniform_slots),
        )
    }
}

#[derive(Default)]
struct ScriptParser {
    builder: Builder,
    labels: HashMap<String, Label>,
    num_value_slots: usize,
    num_uniform_slots: usize,
}

type LineResult = Result<(), String>;

impl ScriptParser {
    fn line(&mut self, code: &str) -> LineResult {
        let mut words = code.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(());
        };
        let mut args = Args { command, words };

        match command {
            "store_src_rg" => {
                let range = self.fixed_range(&mut args, 2)?;
                args.end()?;
                self.builder.store_src_rg(range);
            }
            "store_src" | "store_dst" | "load_src" | "load_dst" => {
                let range = self.fixed_range(&mut args, 4)?;
                args.end()?;
                match command {
                    "store_src" => self.builder.store_src(range),
                    "store_dst" => self.builder.store_dst(range),
                    "load_src" => self.builder.load_src(range),
                    _ => self.builder.load_dst(range),
                }
            }
            "reenable_loop_mask" => {
                let range = self.fixed_range(&mut args, 1)?;
                args.end()?;
                self.builder.reenable_loop_mask(range);
            }
            "init_lane_masks" => {
                args.end()?;
                self.builder.init_lane_masks();
            }
            "mask_off_return_mask" => {
                args.end()?;
                self.builder.mask_off_return_mask();
            }
            "mask_off_loop_mask" => {
                args.end()?;
                self.builder.mask_off_loop_mask();
            }

            "immediate_f" => {
                let value = args.float()?;
                args.end()?;
                self.builder.immediate_f(value);
            }
            "immediate_i" => {
                let value = args.int()?;
                args.end()?;
                self.builder.immediate_i(value);
            }
            "immediate_u" => {
                let value = args.uint()?;
                args.end()?;
                self.builder.immediate_u(value);
            }
            "load_unmasked" | "store_unmasked" | "store_masked" => {
                let slot = self.fixed_range(&mut args, 1)?.index;
                args.end()?;
                match command {
                    "load_unmasked" => self.builder.load_unmasked(slot),
                    "store_unmasked" => self.builder.store_unmasked(slot),
                    _ => self.builder.store_masked(slot),
                }
            }

            "push_literal_f" => {
                let value = args.float()?;
                args.end()?;
                self.builder.push_literal_f(value);
            }
            "push_literal_i" => {
                let value = args.int()?;
                args.end()?;
                self.builder.push_literal_i(value);
            }
            "push_literal_u" => {
                let value = args.uint()?;
                args.end()?;
                self.builder.push_literal_u(value);
            }
            "push_uniform" => {
                let range = self.range(&mut args, SlotSpace::Uniform)?;
                args.end()?;
                self.builder.push_uniform(range);
            }
            "push_zeros" => {
                let count = args.count()?;
                args.end()?;
                self.builder.push_zeros(count);
            }
            "push_slots" => {
                let range = self.range(&mut args, SlotSpace::Value)?;
                args.end()?;
                self.builder.push_slots(range);
            }
            "push_clone" => {
                let count = args.count()?;
                let offset = args.count()?;
                args.end()?;
                self.require_range(command, offset, count)?;
                self.builder.push_clone(count, offset);
            }
            "pop_slots" | "pop_slots_unmasked" => {
                let range = self.range(&mut args, SlotSpace::Value)?;
                args.end()?;
                self.require(command, range.count)?;
                if command == "pop_slots" {
                    self.builder.pop_slots(range);
                } else {
                    self.builder.pop_slots_unmasked(range);
                }
            }
            "copy_stack_to_slots" | "copy_stack_to_slots_unmasked" => {
                let range = self.range(&mut args, SlotSpace::Value)?;
                let offset = args.count()?;
                args.end()?;
                self.require_range(command, offset, range.count)?;
                if command == "copy_stack_to_slots" {
                    self.builder.copy_stack_to_slots(range, offset);
                } else {
                    self.builder.copy_stack_to_slots_unmasked(range, offset);
                }
            }
            "discard_stack" => {
                let count = args.optional_count(1)?;
                args.end()?;
                self.require(command, count)?;
                self.builder.discard_stack(count);
            }
            "set_current_stack" => {
                let stack = args.stack()?;
                args.end()?;
                self.builder.set_current_stack(stack);
            }

            "copy_slots_masked" | "copy_slots_unmasked" => {
                let dst = self.range(&mut args, SlotSpace::Value)?;
                let src = self.range(&mut args, SlotSpace::Value)?;
                args.end()?;
                if dst.count != src.count {
                    return Err(format!(
                        "{command} needs ranges of equal width, got {} and {}",
                        dst.count, src.count
                    ));
                }
                if command == "copy_slots_masked" {
                    self.builder.copy_slots_masked(dst, src);
                } else {
                    self.builder.copy_slots_unmasked(dst, src);
                }
            }
            "zero_slots_unmasked" => {
                let range = self.range(&mut args, SlotSpace::Value)?;
                args.end()?;
                self.builder.zero_slots_unmasked(range);
            }

            "duplicate" => {
                let count = args.count()?;
                args.end()?;
                if count > 0 {
                    self.require(command, 1)?;
                }
                self.builder.duplicate(count);
            }
            "select" => {
                let count = args.count()?;
                args.end()?;
                self.require_groups(command, count)?;
                self.builder.select(count);
            }
            "swizzle" => {
                let width = args.count()?;
                let indices = args.components()?;
                args.end()?;
                if let Some(index) = indices.iter().find(|&&index| index as usize >= width) {
                    return Err(format!(
                        "swizzle component {} is outside the {width} input cells",
                        ['x', 'y', 'z', 'w'][*index as usize]
                    ));
                }
                self.require(command, width)?;
                self.builder.swizzle(width, &indices);
            }
            "binary_op" => {
                let name = args.word("operation")?;
                let op = BinaryOp::from_builder_name(name)
                    .ok_or_else(|| format!("unknown binary operation `{name}`"))?;
                let width = args.count()?;
                args.end()?;
                self.require_groups(name, width)?;
                self.builder.binary_op(op, width);
            }
            "unary_op" => {
                let name = args.word("operation")?;
                let op = UnaryOp::from_builder_name(name)
                    .ok_or_else(|| format!("unknown unary operation `{name}`"))?;
                let width = args.count()?;
                args.end()?;
                self.require(name, width)?;
                self.builder.unary_op(op, width);
            }

            "push_condition_mask" => {
                args.end()?;
                self.builder.push_condition_mask();
            }
            "push_loop_mask" => {
                args.end()?;
                self.builder.push_loop_mask();
            }
            "push_return_mask" => {
                args.end()?;
                self.builder.push_return_mask();
            }
            "pop_condition_mask" | "pop_loop_mask" | "pop_return_mask" => {
                args.end()?;
                self.require(command, 1)?;
                match command {
                    "pop_condition_mask" => self.builder.pop_condition_mask(),
                    "pop_loop_mask" => self.builder.pop_loop_mask(),
                    _ => self.builder.pop_return_mask(),
                }
            }
            "merge_condition_mask" => {
                args.end()?;
                self.require(command, 2)?;
                self.builder.merge_condition_mask();
            }
            "merge_loop_mask" => {
                args.end()?;
                self.require(command, 1)?;
                self.builder.merge_loop_mask();
            }

            "label" | "jump" | "branch_if_any_active_lanes" | "branch_if_no_active_lanes" => {
                let name = args.word("label name")?;
                args.end()?;
                let label = self.label(name);
                match command {
                    "label" => self.builder.label(label),
                    "jump" => self.builder.jump(label),
                    "branch_if_any_active_lanes" => self.builder.branch_if_any_active_lanes(label),
                    _ => self.builder.branch_if_no_active_lanes(label),
                }
            }

            _ => return Err(format!("unknown command `{command}`")),
        }
        Ok(())
    }

    fn label(&mut self, name: &str) -> Label {
        *self
            .labels
            .entry(name.to_string())
            .or_insert_with(|| self.builder.next_label_id())
    }

    fn range(&mut self, args: &mut Args<'_>, space: SlotSpace) -> Result<SlotRange, String> {
        let range = args.range(space)?;
        let limit = match space {
            SlotSpace::Uniform => &mut self.num_uniform_slots,
            _ => &mut self.num_value_slots,
        };
        *limit = (*limit).max(range.end());
        Ok(range)
    }

    fn fixed_range(&mut self, args: &mut Args<'_>, width: usize) -> Result<SlotRange, String> {
        let range = self.range(args, SlotSpace::Value)?;
        if range.count != width {
            return Err(format!(
                "{} takes {width} value slots, got {}",
                args.command, range.count
            ));
        }
        Ok(range)
    }

    fn require(&self, what: &str, cells: usize) -> LineResult {
        let depth = self.builder.stack_depth();
        if depth < cells {
            return Err(format!(
                "{what} needs {cells} cells but stack {} holds {depth}",
                self.builder.current_stack()
            ));
        }
        Ok(())
    }

    /// Two groups of `width` cells each.
    fn require_groups(&self, what: &str, width: usize) -> LineResult {
        let cells = width
            .checked_mul(2)
            .ok_or_else(|| format!("{what} width {width} is too large"))?;
        self.require(what, cells)
    }

    /// `count` cells starting `offset` below the top must all be live.
    fn require_range(&self, what: &str, offset: usize, count: usize) -> LineResult {
        if count > offset {
            return Err(format!(
                "{what} reads {count} cells starting only {offset} below the top"
            ));
        }
        self.require(what, offset)
    }
}

struct Args<'a> {
    command: &'a str,
    words: SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn word(&mut self, what: &str) -> Result<&'a str, String> {
        self.words
            .next()
            .ok_or_else(|| format!("{} is missing its {what}", self.command))
    }

    fn end(&mut self) -> LineResult {
        match self.words.next() {
            Some(extra) => Err(format!(
                "unexpected argument `{extra}` for {}",
                self.command
            )),
            None => Ok(()),
        }
    }

    fn count(&mut self) -> Result<usize, String> {
        let word = self.word("count")?;
        let count: usize = word
            .parse()
            .map_err(|_| format!("expected a count, found `{word}`"))?;
        if count > MAX_OPERAND {
            return Err(format!("count {count} is above the limit of {MAX_OPERAND}"));
        }
        Ok(count)
    }

    fn stack(&mut self) -> Result<StackId, String> {
        let word = self.word("stack id")?;
        let stack: StackId = word
            .parse()
            .map_err(|_| format!("expected a stack id, found `{word}`"))?;
        if stack > MAX_STACK {
            return Err(format!("stack {stack} is above the limit of {MAX_STACK}"));
        }
        Ok(stack)
    }

    fn optional_count(&mut self, default: usize) -> Result<usize, String> {
        match self.words.clone().next() {
            Some(_) => self.count(),
            None => Ok(default),
        }
    }

    fn float(&mut self) -> Result<f32, String> {
        let word = self.word("value")?;
        word.parse()
            .map_err(|_| format!("expected a float, found `{word}`"))
    }

    fn int(&mut self) -> Result<i32, String> {
        let word = self.word("value")?;
        word.parse()
            .map_err(|_| format!("expected an integer, found `{word}`"))
    }

    fn uint(&mut self) -> Result<u32, String> {
        let word = self.word("value")?;
        let parsed = match word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => word.parse(),
        };
        parsed.map_err(|_| format!("expected an unsigned integer, found `{word}`"))
    }

    /// `v3` or `v0..3`, inclusive, in the given slot space.
    fn range(&mut self, space: SlotSpace) -> Result<SlotRange, String> {
        let word = self.word("slot range")?;
        let bad = || {
            format!(
                "expected a {} slot range like `{}0..3`, found `{word}`",
                space.name(),
                space.prefix()
            )
        };
        let body = word.strip_prefix(space.prefix()).ok_or_else(bad)?;
        let (first, last) = match body.split_once("..") {
            Some((first, last)) => (first, last),
            None => (body, body),
        };
        let first: usize = first.parse().map_err(|_| bad())?;
        let last: usize = last.parse().map_err(|_| bad())?;
        if last < first {
            return Err(bad());
        }
        if last > MAX_OPERAND {
            return Err(format!("slot {last} is above the limit of {MAX_OPERAND}"));
        }
        Ok(SlotRange::new(first, last - first + 1))
    }

    /// One to four of `xyzw`.
    fn components(&mut self) -> Result<Vec<u8>, String> {
        let word = self.word("components")?;
        let indices = word
            .chars()
            .map(|c| match c {
                'x' => Some(0),
                'y' => Some(1),
                'z' => Some(2),
                'w' => Some(3),
                _ => None,
            })
            .collect::<Option<Vec<u8>>>();
        match indices {
            Some(indices) if (1..=4).contains(&indices.len()) => Ok(indices),
            _ => Err(format!("expected one to four of `xyzw`, found `{word}`")),
        }
    }
}
