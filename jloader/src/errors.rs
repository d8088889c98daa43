#![allow(clippy::enum_variant_names)]

pub mod class_loading {
    use std::error::Error;
    use std::fmt::Display;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum LoadingCause {
        UnexpectedEndOfFile { requested: usize, remaining: usize },
        InvalidPosition(usize),
        InvalidConstantTag(u8),
    }

    impl Display for LoadingCause {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                LoadingCause::UnexpectedEndOfFile {
                    requested,
                    remaining,
                } => {
                    write!(
                        f,
                        "UnexpectedEndOfFile: requested {requested} bytes, {remaining} remain"
                    )
                }
                LoadingCause::InvalidPosition(pos) => {
                    write!(f, "InvalidPosition: {pos}")
                }
                LoadingCause::InvalidConstantTag(t) => {
                    write!(f, "InvalidConstantTag: {t}")
                }
            }
        }
    }

    #[derive(Debug)]
    pub struct LoadingError {
        pub cause: LoadingCause,
        msg: String,
    }

    impl LoadingError {
        pub fn new(cause: LoadingCause, msg: &str) -> LoadingError {
            LoadingError {
                cause,
                msg: msg.into(),
            }
        }
    }

    impl Error for LoadingError {}

    impl Display for LoadingError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "LoadingError: {}, {}", self.cause, self.msg)
        }
    }
}

pub mod class_format_check {
    use std::error::Error;
    use std::fmt::Display;

    use super::class_loading::LoadingError;
    use super::descriptor::DescriptorError;

    #[derive(Debug)]
    pub enum FormatCause {
        IncorrectMagic(u32),
        UnsupportedVersion(u16, u16),
        Truncated(LoadingError),
        ExtraBytes,
        InvalidIndex(u16),
        KindMismatch {
            expected: &'static str,
            found: &'static str,
        },
        InvalidUtf8(u16),
        InvalidDescriptor(DescriptorError),
        InvalidAttributePayload(String),
        InvalidReferenceKind(u8),
        IllegalFlags(&'static str),
        MissingAttribute(&'static str),
    }

    impl Display for FormatCause {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                FormatCause::IncorrectMagic(m) => write!(f, "IncorrectMagic: {m:#010X}"),
                FormatCause::UnsupportedVersion(major, minor) => {
                    write!(f, "UnsupportedVersion: {major}.{minor}")
                }
                FormatCause::Truncated(e) => write!(f, "Truncated: {}", e.cause),
                FormatCause::ExtraBytes => write!(f, "ExtraBytes"),
                FormatCause::InvalidIndex(index) => write!(f, "InvalidIndex: {index}"),
                FormatCause::KindMismatch { expected, found } => {
                    write!(f, "KindMismatch: expected {expected}, found {found}")
                }
                FormatCause::InvalidUtf8(index) => write!(f, "InvalidUtf8: constant {index}"),
                FormatCause::InvalidDescriptor(e) => write!(f, "InvalidDescriptor: {e}"),
                FormatCause::InvalidAttributePayload(name) => {
                    write!(f, "InvalidAttributePayload: {name}")
                }
                FormatCause::InvalidReferenceKind(kind) => {
                    write!(f, "InvalidReferenceKind: {kind}")
                }
                FormatCause::IllegalFlags(what) => write!(f, "IllegalFlags: {what}"),
                FormatCause::MissingAttribute(name) => write!(f, "MissingAttribute: {name}"),
            }
        }
    }

    #[derive(Debug)]
    pub struct FormatError {
        pub cause: FormatCause,
        msg: String,
    }

    impl FormatError {
        pub fn new(cause: FormatCause, msg: &str) -> FormatError {
            FormatError {
                cause,
                msg: msg.into(),
            }
        }
    }

    impl Error for FormatError {}

    impl Display for FormatError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "Format Error: {}, {}", self.cause, self.msg)
        }
    }

    impl From<LoadingError> for FormatError {
        fn from(e: LoadingError) -> FormatError {
            FormatError {
                msg: e.to_string(),
                cause: FormatCause::Truncated(e),
            }
        }
    }

    impl From<DescriptorError> for FormatError {
        fn from(e: DescriptorError) -> FormatError {
            FormatError {
                msg: e.to_string(),
                cause: FormatCause::InvalidDescriptor(e),
            }
        }
    }
}

pub mod descriptor {
    use std::error::Error;
    use std::fmt::Display;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum DescriptorCause {
        EmptyDescriptor,
        UnterminatedObjectType,
        InvalidDescriptor(char),
        TooManyArrayDimensions,
        TrailingCharacters,
    }

    impl Display for DescriptorCause {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                DescriptorCause::EmptyDescriptor => write!(f, "EmptyDescriptor"),
                DescriptorCause::UnterminatedObjectType => {
                    write!(f, "UnterminatedObjectType")
                }
                DescriptorCause::InvalidDescriptor(c) => {
                    write!(f, "InvalidDescriptor: unexpected {c:?}")
                }
                DescriptorCause::TooManyArrayDimensions => {
                    write!(f, "TooManyArrayDimensions")
                }
                DescriptorCause::TrailingCharacters => write!(f, "TrailingCharacters"),
            }
        }
    }

    #[derive(Debug)]
    pub struct DescriptorError {
        pub cause: DescriptorCause,
        descriptor: String,
    }

    impl DescriptorError {
        pub fn new(cause: DescriptorCause, descriptor: &str) -> DescriptorError {
            DescriptorError {
                cause,
                descriptor: descriptor.into(),
            }
        }
    }

    impl Error for DescriptorError {}

    impl Display for DescriptorError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "Descriptor Error: {} in {:?}", self.cause, self.descriptor)
        }
    }
}
