#![allow(clippy::enum_variant_names)]

pub mod bytecode {
    use std::error::Error;
    use std::fmt::Display;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum BytecodeCause {
        UnknownOpcode { pc: u32, opcode: u8 },
        TruncatedInstruction { pc: u32 },
        InvalidSwitchLayout { pc: u32 },
        InvalidBranchTarget { pc: u32, target: u32 },
        InvalidOperand { pc: u32 },
        StackUnderflow { pc: u32 },
        StackHeightMismatch { pc: u32, expected: usize, found: usize },
        Unsupported { pc: u32, mnemonic: &'static str },
    }

    impl Display for BytecodeCause {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                BytecodeCause::UnknownOpcode { pc, opcode } => {
                    write!(f, "UnknownOpcode: {opcode:#04X} at pc {pc}")
                }
                BytecodeCause::TruncatedInstruction { pc } => {
                    write!(f, "TruncatedInstruction: at pc {pc}")
                }
                BytecodeCause::InvalidSwitchLayout { pc } => {
                    write!(f, "InvalidSwitchLayout: at pc {pc}")
                }
                BytecodeCause::InvalidBranchTarget { pc, target } => {
                    write!(f, "InvalidBranchTarget: {target} from pc {pc}")
                }
                BytecodeCause::InvalidOperand { pc } => {
                    write!(f, "InvalidOperand: at pc {pc}")
                }
                BytecodeCause::StackUnderflow { pc } => {
                    write!(f, "StackUnderflow: at pc {pc}")
                }
                BytecodeCause::StackHeightMismatch {
                    pc,
                    expected,
                    found,
                } => {
                    write!(
                        f,
                        "StackHeightMismatch: expected depth {expected}, found {found} at pc {pc}"
                    )
                }
                BytecodeCause::Unsupported { pc, mnemonic } => {
                    write!(f, "Unsupported: {mnemonic} at pc {pc}")
                }
            }
        }
    }

    #[derive(Debug)]
    pub struct BytecodeError {
        pub cause: BytecodeCause,
        msg: String,
    }

    impl BytecodeError {
        pub fn new(cause: BytecodeCause, msg: &str) -> BytecodeError {
            BytecodeError {
                cause,
                msg: msg.into(),
            }
        }
    }

    impl Error for BytecodeError {}

    impl Display for BytecodeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "Bytecode Error: {}, {}", self.cause, self.msg)
        }
    }
}

pub mod decompile {
    use std::error::Error;
    use std::fmt::Display;

    use jloader::errors::class_format_check::FormatError;

    #[derive(Debug)]
    pub enum DecompileCause {
        Format(FormatError),
        FileTooLarge { size: usize, limit: usize },
        DeadlineExpired,
        Io(std::io::Error),
    }

    impl Display for DecompileCause {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                DecompileCause::Format(e) => write!(f, "{e}"),
                DecompileCause::FileTooLarge { size, limit } => {
                    write!(f, "FileTooLarge: {size} bytes exceeds the {limit} byte limit")
                }
                DecompileCause::DeadlineExpired => write!(f, "DeadlineExpired"),
                DecompileCause::Io(e) => write!(f, "Io: {e}"),
            }
        }
    }

    #[derive(Debug)]
    pub struct DecompileError {
        pub cause: DecompileCause,
        msg: String,
    }

    impl DecompileError {
        pub fn new(cause: DecompileCause, msg: &str) -> DecompileError {
            DecompileError {
                cause,
                msg: msg.into(),
            }
        }
    }

    impl Error for DecompileError {}

    impl Display for DecompileError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "Decompile Error: {}, {}", self.cause, self.msg)
        }
    }

    impl From<FormatError> for DecompileError {
        fn from(e: FormatError) -> DecompileError {
            DecompileError {
                msg: e.to_string(),
                cause: DecompileCause::Format(e),
            }
        }
    }

    impl From<std::io::Error> for DecompileError {
        fn from(e: std::io::Error) -> DecompileError {
            DecompileError {
                msg: e.to_string(),
                cause: DecompileCause::Io(e),
            }
        }
    }
}
