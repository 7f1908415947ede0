use crate::jvm;

#[derive(Debug)]
pub enum Error {
    /// Failure in the underlying class or code model
    Jvm(jvm::Error),

    /// The method body is malformed at the given offset
    Evaluation {
        method: String,
        offset: usize,
        kind: EvaluationErrorKind,
    },

    /// Evaluation of the method was cut short after too many instruction evaluations
    ExcessiveComplexity { method: String, evaluations: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationErrorKind {
    /// Control is transferred to an offset that is not the start of an instruction
    InvalidBranchTarget(usize),

    /// Execution can continue past the last instruction
    FallsOffEnd,

    /// Constant pool index does not point to an entry
    MissingConstant(u16),

    /// Constant pool entry is not of the kind the instruction expects
    InvalidConstant(u16),
    StackUnderflow,
    LocalOutOfRange(u16),

    /// Two paths reach the same instruction with different stack heights
    StackHeightMismatch { expected: usize, found: usize },

    /// `ret` on a local that doesn't hold a return address
    NotReturnAddress(u16),

    /// The parameters don't fit into the method's local variables
    TooManyParameters,
}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::Jvm(err)
    }
}
