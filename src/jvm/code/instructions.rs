//! This module contains the AST of decoded JVM bytecode. The representation is slightly different
//! from the usual presentation to make it more convenient to analyse. For instance:
//!
//!   - The "wide" instruction doesn't show up at all, but instead gets merged into the
//!     instructions it is allowed to modify
//!
//!   - Some instructions (like the branches) get abstracted into one instruction with a field.
//!     This helps with repetitive pattern matches and keeps the evaluator's step function to one
//!     exhaustive match.
//!
//!   - Short and wide variants of the same instruction (`ldc`/`ldc_w`, `goto`/`goto_w`,
//!     `jsr`/`jsr_w`) are merged. The decoded width is kept alongside the instruction instead.
//!
//!   - Branch targets are absolute bytecode offsets rather than relative jumps
//!
//! Constant pool operands are kept as raw indices and looked up in the method's
//! [`crate::jvm::ConstantPool`] when the instruction is evaluated.

use crate::jvm::BaseType;
use std::ops::Not;

/// JVM bytecode instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(u16), // covers both `ldc` and `ldc_w`
    Ldc2(u16),
    ILoad(u16), // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishr`, `ishl`, and `iushr`
    LSh(ShiftType), // covers `lshr`, `lshl`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    If(OrdComparison, usize), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, usize), // covers `if_icmpeq`, `if_icmpne`, ... `if_icmple`
    IfACmp(EqComparison, usize), // covers `if_acmpeq`, `if_acmpne`
    Goto(usize),                 // covers `goto` and `goto_w`
    Jsr(usize),                  // covers `jsr` and `jsr_w`
    Ret(u16),                    // covers `ret` and `wide ret`
    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len() - 1`
        default: usize,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<usize>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: usize,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, usize)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    GetStatic(u16),
    PutStatic(u16),
    GetField(u16),
    PutField(u16),
    Invoke(InvokeType, u16),
    InvokeDynamic(u16),
    New(u16),
    NewArray(BaseType),
    ANewArray(u16),
    ArrayLength,
    AThrow,
    CheckCast(u16),
    InstanceOf(u16),
    MonitorEnter,
    MonitorExit,
    MultiANewArray(u16, u8),
    IfNull(EqComparison, usize), // covers `ifnull`, `ifnonnull`
}

impl Instruction {
    /// Can execution continue at the next instruction?
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Instruction::Goto(_)
                | Instruction::Jsr(_)
                | Instruction::Ret(_)
                | Instruction::TableSwitch { .. }
                | Instruction::LookupSwitch { .. }
                | Instruction::IReturn
                | Instruction::LReturn
                | Instruction::FReturn
                | Instruction::DReturn
                | Instruction::AReturn
                | Instruction::Return
                | Instruction::AThrow
        )
    }

    /// Explicit jump targets (excluding the fallthrough and `ret`, whose targets are dynamic)
    pub fn branch_targets(&self) -> Vec<usize> {
        match self {
            Instruction::If(_, target)
            | Instruction::IfICmp(_, target)
            | Instruction::IfACmp(_, target)
            | Instruction::IfNull(_, target)
            | Instruction::Goto(target)
            | Instruction::Jsr(target) => vec![*target],
            Instruction::TableSwitch {
                default, targets, ..
            } => {
                let mut all = vec![*default];
                all.extend(targets.iter().copied());
                all
            }
            Instruction::LookupSwitch {
                default, targets, ..
            } => {
                let mut all = vec![*default];
                all.extend(targets.iter().map(|(_, target)| *target));
                all
            }
            _ => vec![],
        }
    }

    /// Does this instruction transfer control somewhere other than the next instruction?
    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            Instruction::If(_, _)
                | Instruction::IfICmp(_, _)
                | Instruction::IfACmp(_, _)
                | Instruction::IfNull(_, _)
                | Instruction::Goto(_)
                | Instruction::Jsr(_)
                | Instruction::Ret(_)
                | Instruction::TableSwitch { .. }
                | Instruction::LookupSwitch { .. }
        )
    }

    pub fn is_return(&self) -> bool {
        matches!(
            self,
            Instruction::IReturn
                | Instruction::LReturn
                | Instruction::FReturn
                | Instruction::DReturn
                | Instruction::AReturn
                | Instruction::Return
        )
    }

    pub fn is_invoke(&self) -> bool {
        matches!(self, Instruction::Invoke(_, _) | Instruction::InvokeDynamic(_))
    }

    /// Can the instruction complete abruptly by throwing an exception?
    ///
    /// Linkage errors are ignored, so most instructions which only manipulate the stack and
    /// locals are considered exception free.
    pub fn can_throw(&self) -> bool {
        matches!(
            self,
            Instruction::Ldc(_)
                | Instruction::IALoad
                | Instruction::LALoad
                | Instruction::FALoad
                | Instruction::DALoad
                | Instruction::AALoad
                | Instruction::BALoad
                | Instruction::CALoad
                | Instruction::SALoad
                | Instruction::IAStore
                | Instruction::LAStore
                | Instruction::FAStore
                | Instruction::DAStore
                | Instruction::AAStore
                | Instruction::BAStore
                | Instruction::CAStore
                | Instruction::SAStore
                | Instruction::IDiv
                | Instruction::LDiv
                | Instruction::IRem
                | Instruction::LRem
                | Instruction::GetStatic(_)
                | Instruction::PutStatic(_)
                | Instruction::GetField(_)
                | Instruction::PutField(_)
                | Instruction::Invoke(_, _)
                | Instruction::InvokeDynamic(_)
                | Instruction::New(_)
                | Instruction::NewArray(_)
                | Instruction::ANewArray(_)
                | Instruction::MultiANewArray(_, _)
                | Instruction::ArrayLength
                | Instruction::AThrow
                | Instruction::CheckCast(_)
                | Instruction::MonitorEnter
                | Instruction::MonitorExit
        )
    }

    /// Local variable read by the instruction, along with the width of the value read
    pub fn reads_local(&self) -> Option<(u16, usize)> {
        match self {
            Instruction::ILoad(idx)
            | Instruction::FLoad(idx)
            | Instruction::ALoad(idx)
            | Instruction::IInc(idx, _)
            | Instruction::Ret(idx) => Some((*idx, 1)),
            Instruction::LLoad(idx) | Instruction::DLoad(idx) => Some((*idx, 2)),
            _ => None,
        }
    }

    /// Local variable written by the instruction, along with the width of the value written
    pub fn writes_local(&self) -> Option<(u16, usize)> {
        match self {
            Instruction::IStore(idx)
            | Instruction::FStore(idx)
            | Instruction::AStore(idx)
            | Instruction::IInc(idx, _) => Some((*idx, 1)),
            Instruction::LStore(idx) | Instruction::DStore(idx) => Some((*idx, 2)),
            _ => None,
        }
    }

    /// Width of the shortest encoding of this instruction, when placed at the given offset
    ///
    /// The offset only matters for switches, which are padded so that their jump tables start
    /// at a multiple of four bytes from the start of the method.
    pub fn encoded_width(&self, offset: usize) -> usize {
        fn local_width(idx: u16) -> usize {
            match idx {
                0..=3 => 1,
                4..=255 => 2,
                _ => 4,
            }
        }
        let padding = (4 - (offset + 1) % 4) % 4;

        match self {
            Instruction::ILoad(idx)
            | Instruction::LLoad(idx)
            | Instruction::FLoad(idx)
            | Instruction::DLoad(idx)
            | Instruction::ALoad(idx)
            | Instruction::IStore(idx)
            | Instruction::LStore(idx)
            | Instruction::FStore(idx)
            | Instruction::DStore(idx)
            | Instruction::AStore(idx) => local_width(*idx),

            Instruction::Ret(idx) => {
                if *idx <= 255 {
                    2
                } else {
                    4
                }
            }
            Instruction::IInc(idx, diff) => {
                if *idx <= 255 && (-128..=127).contains(diff) {
                    3
                } else {
                    6
                }
            }
            Instruction::Ldc(idx) => {
                if *idx <= 255 {
                    2
                } else {
                    3
                }
            }

            Instruction::BiPush(_) | Instruction::NewArray(_) => 2,

            Instruction::SiPush(_)
            | Instruction::Ldc2(_)
            | Instruction::If(_, _)
            | Instruction::IfICmp(_, _)
            | Instruction::IfACmp(_, _)
            | Instruction::IfNull(_, _)
            | Instruction::Goto(_)
            | Instruction::Jsr(_)
            | Instruction::GetStatic(_)
            | Instruction::PutStatic(_)
            | Instruction::GetField(_)
            | Instruction::PutField(_)
            | Instruction::Invoke(InvokeType::Special, _)
            | Instruction::Invoke(InvokeType::Static, _)
            | Instruction::Invoke(InvokeType::Virtual, _)
            | Instruction::New(_)
            | Instruction::ANewArray(_)
            | Instruction::CheckCast(_)
            | Instruction::InstanceOf(_) => 3,

            Instruction::MultiANewArray(_, _) => 4,

            Instruction::Invoke(InvokeType::Interface(_), _) | Instruction::InvokeDynamic(_) => 5,

            Instruction::TableSwitch { targets, .. } => 1 + padding + 4 * (3 + targets.len()),
            Instruction::LookupSwitch { targets, .. } => 1 + padding + 8 * (1 + targets.len()),

            _ => 1,
        }
    }

    /// Rewrite the explicit jump targets of the instruction
    pub fn map_targets<E>(
        &self,
        mut map_target: impl FnMut(usize) -> Result<usize, E>,
    ) -> Result<Instruction, E> {
        use Instruction::*;

        Ok(match self {
            If(op, target) => If(*op, map_target(*target)?),
            IfICmp(op, target) => IfICmp(*op, map_target(*target)?),
            IfACmp(op, target) => IfACmp(*op, map_target(*target)?),
            IfNull(op, target) => IfNull(*op, map_target(*target)?),
            Goto(target) => Goto(map_target(*target)?),
            Jsr(target) => Jsr(map_target(*target)?),
            TableSwitch {
                default,
                low,
                targets,
            } => TableSwitch {
                default: map_target(*default)?,
                low: *low,
                targets: targets
                    .iter()
                    .map(|target| map_target(*target))
                    .collect::<Result<_, E>>()?,
            },
            LookupSwitch { default, targets } => LookupSwitch {
                default: map_target(*default)?,
                targets: targets
                    .iter()
                    .map(|(key, target)| Ok((*key, map_target(*target)?)))
                    .collect::<Result<_, E>>()?,
            },
            other => other.clone(),
        })
    }
}

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

impl Not for OrdComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            OrdComparison::EQ => OrdComparison::NE,
            OrdComparison::GE => OrdComparison::LT,
            OrdComparison::GT => OrdComparison::LE,
            OrdComparison::LE => OrdComparison::GT,
            OrdComparison::LT => OrdComparison::GE,
            OrdComparison::NE => OrdComparison::EQ,
        }
    }
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

impl Not for EqComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            EqComparison::EQ => EqComparison::NE,
            EqComparison::NE => EqComparison::EQ,
        }
    }
}

/// Type of method to invoke
///
/// Note: `InvokeDynamic` is kept separate because the constant argument it expects is not to a
/// `Methodref`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface(u8), // `count` is of total arguments, where `long`/`double` count for 2
}
