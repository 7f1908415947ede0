#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// A class, method, or field name is not valid
    MalformedName(String),

    /// Raw method code could not be decoded
    Decode {
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// Instructions handed to the assembler don't describe a well-formed method body
    Assemble {
        index: usize,
        kind: AssembleErrorKind,
    },
}

#[derive(Debug)]
pub enum DecodeErrorKind {
    /// Code ends in the middle of an instruction
    Truncated,
    UnknownOpcode(u8),

    /// Opcode following `wide` cannot be widened
    InvalidWideOpcode(u8),

    /// Relative jump lands before the start of the code
    NegativeBranchTarget(i64),
    InvalidSwitchBounds {
        low: i32,
        high: i32,
    },
    InvalidArrayType(u8),
}

#[derive(Debug)]
pub enum AssembleErrorKind {
    /// Branch refers to an instruction index that does not exist
    MissingBranchTarget(usize),

    /// Exception handler range or handler refers to an instruction index that does not exist
    MissingHandlerTarget(usize),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
