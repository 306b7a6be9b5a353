//! Commands understood by the CytoWorks stage controller, and their ASCII encoding.
//!
//! A command is a verb followed by space separated operands, for example
//! `MOVE X=120 Y=45` or `WHERE X Y`. Operand values are always in native
//! controller steps.

use core::fmt::{self, Write};

use strum_macros::{Display, EnumIter, IntoStaticStr};

/// Command verbs of the controller.
#[derive(Debug, Display, EnumIter, IntoStaticStr, PartialEq, Eq, Clone, Copy)]
pub enum Verb {
    /// Absolute move, both axes in one command.
    #[strum(serialize = "MOVE")]
    Move,
    /// Relative move, both axes in one command.
    #[strum(serialize = "MOVREL")]
    MovRel,
    /// Query position. Answer is `:A <x> <y>`.
    #[strum(serialize = "WHERE")]
    Where,
    /// Define the controller's internal position counters.
    #[strum(serialize = "HERE")]
    Here,
    /// Run the homing sequence.
    #[strum(serialize = "HOME")]
    Home,
    /// Stop all motion.
    #[strum(serialize = "HALT")]
    Halt,
    /// Axis status. Answer is a single raw byte, `B` while the axis is moving.
    #[strum(serialize = "STATUS")]
    Status,
    /// Top speed, steps per second.
    #[strum(serialize = "SPEED")]
    Speed,
    /// Start speed, steps per second.
    #[strum(serialize = "STSPEED")]
    StSpeed,
    /// Acceleration, steps per second squared.
    #[strum(serialize = "ACCEL")]
    Accel,
}

/// Stage axes.
#[derive(Debug, Display, EnumIter, IntoStaticStr, PartialEq, Eq, Clone, Copy)]
pub enum Axis {
    X,
    Y,
}

/// A single command operand.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operand {
    /// A bare axis name, e.g. `X`.
    Axis(Axis),
    /// An axis assignment, e.g. `X=120`.
    Assign(Axis, i32),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Axis(axis) => write!(f, "{axis}"),
            Operand::Assign(axis, value) => write!(f, "{axis}={value}"),
        }
    }
}

/// A command ready to be sent to the controller.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MotionCommand {
    verb: Verb,
    operands: heapless::Vec<Operand, 2>,
}

impl MotionCommand {
    /// A command without operands, e.g. `HALT`.
    pub fn bare(verb: Verb) -> Self {
        Self {
            verb,
            operands: heapless::Vec::new(),
        }
    }

    /// A command naming both axes, e.g. `WHERE X Y`.
    pub fn both_axes(verb: Verb) -> Self {
        Self::from_operands(verb, [Operand::Axis(Axis::X), Operand::Axis(Axis::Y)])
    }

    /// A command naming a single axis, e.g. `STATUS X`.
    pub fn single_axis(verb: Verb, axis: Axis) -> Self {
        Self::from_operands(verb, [Operand::Axis(axis)])
    }

    /// A command assigning a value to both axes, e.g. `MOVE X=120 Y=45`.
    ///
    /// Both axes always travel in the same command so the controller never
    /// sees one axis commanded without the other.
    pub fn assign_xy(verb: Verb, x: i32, y: i32) -> Self {
        Self::from_operands(verb, [Operand::Assign(Axis::X, x), Operand::Assign(Axis::Y, y)])
    }

    fn from_operands<const N: usize>(verb: Verb, operands: [Operand; N]) -> Self {
        const { assert!(N <= 2) };
        Self {
            verb,
            operands: operands.into_iter().collect(),
        }
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// Render the command as ASCII text, without the line terminator.
    ///
    /// Returns `None` if the text does not fit in `L` bytes.
    pub fn encode<const L: usize>(&self) -> Option<heapless::String<L>> {
        let mut text = heapless::String::new();
        write!(text, "{self}").ok()?;
        Some(text)
    }
}

impl fmt::Display for MotionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb: &'static str = self.verb.into();
        f.write_str(verb)?;
        for operand in &self.operands {
            write!(f, " {operand}")?;
        }
        Ok(())
    }
}
