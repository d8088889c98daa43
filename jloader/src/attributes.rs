use log::trace;

use crate::constants::ConstantPool;
use crate::errors::class_format_check::{FormatCause, FormatError};
use crate::reader::ClassReader;

/// [Attributes](https://docs.oracle.com/javase/specs/jvms/se17/jvms17.pdf#%5B%7B%22num%22%3A1244%2C%22gen%22%3A0%7D%2C%7B%22name%22%3A%22XYZ%22%7D%2C72%2C564%2Cnull%5D)
///
/// Attribute names the loader understands are decoded eagerly; anything
/// else is preserved byte-for-byte as [`AttributeInfo::Unknown`].
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeInfo {
    ConstantValue(ConstantValue),
    Code(Code),
    Exceptions(Exceptions),
    LineNumberTable(LineNumberTable),
    LocalVariableTable(LocalVariableTable),
    LocalVariableTypeTable(LocalVariableTypeTable),
    StackMapTable(StackMapTable),
    Signature(Signature),
    Synthetic,
    Deprecated,
    InnerClasses(InnerClasses),
    SourceFile(SourceFile),
    RuntimeVisibleAnnotations(Annotations),
    RuntimeInvisibleAnnotations(Annotations),
    BootstrapMethods(BootstrapMethods),
    Unknown(UnknownAttribute),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstantValue {
    pub constant_value_index: u16,
}

/// An entry of the `Code` exception table. `catch_type` zero protects the
/// range for every throwable (the compiler's encoding for `finally`).
#[derive(Clone, Debug, PartialEq)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionEntry>,
    pub attributes: Vec<AttributeInfo>,
}

impl Code {
    pub fn line_number_table(&self) -> Option<&LineNumberTable> {
        self.attributes.iter().find_map(|a| match a {
            AttributeInfo::LineNumberTable(t) => Some(t),
            _ => None,
        })
    }

    pub fn local_variable_table(&self) -> Option<&LocalVariableTable> {
        self.attributes.iter().find_map(|a| match a {
            AttributeInfo::LocalVariableTable(t) => Some(t),
            _ => None,
        })
    }

    pub fn local_variable_type_table(&self) -> Option<&LocalVariableTypeTable> {
        self.attributes.iter().find_map(|a| match a {
            AttributeInfo::LocalVariableTypeTable(t) => Some(t),
            _ => None,
        })
    }

    /// The local variable entry covering `pc` in slot `slot`, if debug
    /// information was compiled in.
    pub fn local_variable(&self, slot: u16, pc: u32) -> Option<&LocalVariableEntry> {
        self.local_variable_table()?.entries.iter().find(|entry| {
            entry.index == slot
                && u32::from(entry.start_pc) <= pc
                && pc < u32::from(entry.start_pc) + u32::from(entry.length)
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Exceptions {
    pub exception_index_table: Vec<u16>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LineNumberEntry {
    pub start_pc: u16,
    pub line_number: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LineNumberTable {
    pub entries: Vec<LineNumberEntry>,
}

impl LineNumberTable {
    /// Source line for the instruction at `pc`: the entry with the
    /// greatest `start_pc` not beyond it.
    pub fn line_for(&self, pc: u32) -> Option<u16> {
        self.entries
            .iter()
            .filter(|e| u32::from(e.start_pc) <= pc)
            .max_by_key(|e| e.start_pc)
            .map(|e| e.line_number)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocalVariableEntry {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocalVariableTable {
    pub entries: Vec<LocalVariableEntry>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocalVariableTypeEntry {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub signature_index: u16,
    pub index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocalVariableTypeTable {
    pub entries: Vec<LocalVariableTypeEntry>,
}

/// Verification type of one stack slot or local in a stack map frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object(u16),
    Uninitialized(u16),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Same,
    SameLocalsOneStackItem,
    SameLocalsOneStackItemExtended,
    Chop,
    SameExtended,
    Append,
    Full,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StackMapFrame {
    pub kind: FrameKind,
    pub offset_delta: u16,
    pub locals: Vec<VerificationType>,
    pub stack: Vec<VerificationType>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StackMapTable {
    pub frames: Vec<StackMapFrame>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    pub signature_index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InnerClassEntry {
    pub inner_class_info_index: u16,
    pub outer_class_info_index: u16,
    pub inner_name_index: u16,
    pub inner_class_access_flags: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InnerClasses {
    pub classes: Vec<InnerClassEntry>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SourceFile {
    pub sourcefile_index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub type_index: u16,
    pub element_value_pairs: Vec<(u16, ElementValue)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElementValue {
    Const { tag: char, const_value_index: u16 },
    EnumConst {
        type_name_index: u16,
        const_name_index: u16,
    },
    ClassInfo(u16),
    Annotation(Box<Annotation>),
    Array(Vec<ElementValue>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Annotations {
    pub annotations: Vec<Annotation>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BootstrapMethod {
    pub bootstrap_method_ref: u16,
    pub arguments: Vec<u16>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BootstrapMethods {
    pub methods: Vec<BootstrapMethod>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnknownAttribute {
    pub name: String,
    pub info: Vec<u8>,
}

/// Reads `count` attribute structures at the current position.
pub fn read_attributes(
    pool: &ConstantPool,
    reader: &mut ClassReader,
    count: u16,
) -> Result<Vec<AttributeInfo>, FormatError> {
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        attributes.push(read_attribute(pool, reader)?);
    }
    Ok(attributes)
}

fn read_attribute(
    pool: &ConstantPool,
    reader: &mut ClassReader,
) -> Result<AttributeInfo, FormatError> {
    let name_index = reader.u2()?;
    let name = pool.utf8(name_index)?.to_string();
    let length = reader.u4()? as usize;
    let start = reader.position();
    trace!("attribute {name} ({length} bytes)");
    let attribute = match name.as_str() {
        "ConstantValue" => AttributeInfo::ConstantValue(ConstantValue {
            constant_value_index: reader.u2()?,
        }),
        "Code" => AttributeInfo::Code(read_code(pool, reader)?),
        "Exceptions" => {
            let count = reader.u2()?;
            let mut table = Vec::with_capacity(count as usize);
            for _ in 0..count {
                table.push(reader.u2()?);
            }
            AttributeInfo::Exceptions(Exceptions {
                exception_index_table: table,
            })
        }
        "LineNumberTable" => {
            let count = reader.u2()?;
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                entries.push(LineNumberEntry {
                    start_pc: reader.u2()?,
                    line_number: reader.u2()?,
                });
            }
            AttributeInfo::LineNumberTable(LineNumberTable { entries })
        }
        "LocalVariableTable" => {
            let count = reader.u2()?;
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                entries.push(LocalVariableEntry {
                    start_pc: reader.u2()?,
                    length: reader.u2()?,
                    name_index: reader.u2()?,
                    descriptor_index: reader.u2()?,
                    index: reader.u2()?,
                });
            }
            AttributeInfo::LocalVariableTable(LocalVariableTable { entries })
        }
        "LocalVariableTypeTable" => {
            let count = reader.u2()?;
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                entries.push(LocalVariableTypeEntry {
                    start_pc: reader.u2()?,
                    length: reader.u2()?,
                    name_index: reader.u2()?,
                    signature_index: reader.u2()?,
                    index: reader.u2()?,
                });
            }
            AttributeInfo::LocalVariableTypeTable(LocalVariableTypeTable { entries })
        }
        "StackMapTable" => {
            let count = reader.u2()?;
            let mut frames = Vec::with_capacity(count as usize);
            for _ in 0..count {
                frames.push(read_stack_map_frame(reader)?);
            }
            AttributeInfo::StackMapTable(StackMapTable { frames })
        }
        "Signature" => AttributeInfo::Signature(Signature {
            signature_index: reader.u2()?,
        }),
        "Synthetic" => AttributeInfo::Synthetic,
        "Deprecated" => AttributeInfo::Deprecated,
        "InnerClasses" => {
            let count = reader.u2()?;
            let mut classes = Vec::with_capacity(count as usize);
            for _ in 0..count {
                classes.push(InnerClassEntry {
                    inner_class_info_index: reader.u2()?,
                    outer_class_info_index: reader.u2()?,
                    inner_name_index: reader.u2()?,
                    inner_class_access_flags: reader.u2()?,
                });
            }
            AttributeInfo::InnerClasses(InnerClasses { classes })
        }
        "SourceFile" => AttributeInfo::SourceFile(SourceFile {
            sourcefile_index: reader.u2()?,
        }),
        "RuntimeVisibleAnnotations" => {
            AttributeInfo::RuntimeVisibleAnnotations(read_annotations(reader)?)
        }
        "RuntimeInvisibleAnnotations" => {
            AttributeInfo::RuntimeInvisibleAnnotations(read_annotations(reader)?)
        }
        "BootstrapMethods" => {
            let count = reader.u2()?;
            let mut methods = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let bootstrap_method_ref = reader.u2()?;
                let argument_count = reader.u2()?;
                let mut arguments = Vec::with_capacity(argument_count as usize);
                for _ in 0..argument_count {
                    arguments.push(reader.u2()?);
                }
                methods.push(BootstrapMethod {
                    bootstrap_method_ref,
                    arguments,
                });
            }
            AttributeInfo::BootstrapMethods(BootstrapMethods { methods })
        }
        _ => AttributeInfo::Unknown(UnknownAttribute {
            info: reader.bytes_owned(length)?,
            name: name.clone(),
        }),
    };
    let consumed = reader.position() - start;
    if consumed != length {
        let name = attribute_name(&attribute);
        return Err(FormatError::new(
            FormatCause::InvalidAttributePayload(name.to_string()),
            "attribute length does not match its payload",
        ));
    }
    Ok(attribute)
}

fn attribute_name(attribute: &AttributeInfo) -> &str {
    match attribute {
        AttributeInfo::ConstantValue(_) => "ConstantValue",
        AttributeInfo::Code(_) => "Code",
        AttributeInfo::Exceptions(_) => "Exceptions",
        AttributeInfo::LineNumberTable(_) => "LineNumberTable",
        AttributeInfo::LocalVariableTable(_) => "LocalVariableTable",
        AttributeInfo::LocalVariableTypeTable(_) => "LocalVariableTypeTable",
        AttributeInfo::StackMapTable(_) => "StackMapTable",
        AttributeInfo::Signature(_) => "Signature",
        AttributeInfo::Synthetic => "Synthetic",
        AttributeInfo::Deprecated => "Deprecated",
        AttributeInfo::InnerClasses(_) => "InnerClasses",
        AttributeInfo::SourceFile(_) => "SourceFile",
        AttributeInfo::RuntimeVisibleAnnotations(_) => "RuntimeVisibleAnnotations",
        AttributeInfo::RuntimeInvisibleAnnotations(_) => "RuntimeInvisibleAnnotations",
        AttributeInfo::BootstrapMethods(_) => "BootstrapMethods",
        AttributeInfo::Unknown(u) => &u.name,
    }
}

fn read_code(pool: &ConstantPool, reader: &mut ClassReader) -> Result<Code, FormatError> {
    let max_stack = reader.u2()?;
    let max_locals = reader.u2()?;
    let code_length = reader.u4()? as usize;
    let code = reader.bytes_owned(code_length)?;
    let exception_count = reader.u2()?;
    let mut exception_table = Vec::with_capacity(exception_count as usize);
    for _ in 0..exception_count {
        exception_table.push(ExceptionEntry {
            start_pc: reader.u2()?,
            end_pc: reader.u2()?,
            handler_pc: reader.u2()?,
            catch_type: reader.u2()?,
        });
    }
    let attribute_count = reader.u2()?;
    let attributes = read_attributes(pool, reader, attribute_count)?;
    Ok(Code {
        max_stack,
        max_locals,
        code,
        exception_table,
        attributes,
    })
}

fn read_stack_map_frame(reader: &mut ClassReader) -> Result<StackMapFrame, FormatError> {
    let tag = reader.u1()?;
    let frame = match tag {
        0..=63 => StackMapFrame {
            kind: FrameKind::Same,
            offset_delta: u16::from(tag),
            locals: vec![],
            stack: vec![],
        },
        64..=127 => StackMapFrame {
            kind: FrameKind::SameLocalsOneStackItem,
            offset_delta: u16::from(tag - 64),
            locals: vec![],
            stack: vec![read_verification_type(reader)?],
        },
        247 => {
            let offset_delta = reader.u2()?;
            StackMapFrame {
                kind: FrameKind::SameLocalsOneStackItemExtended,
                offset_delta,
                locals: vec![],
                stack: vec![read_verification_type(reader)?],
            }
        }
        248..=250 => StackMapFrame {
            kind: FrameKind::Chop,
            offset_delta: reader.u2()?,
            locals: vec![],
            stack: vec![],
        },
        251 => StackMapFrame {
            kind: FrameKind::SameExtended,
            offset_delta: reader.u2()?,
            locals: vec![],
            stack: vec![],
        },
        252..=254 => {
            let offset_delta = reader.u2()?;
            let mut locals = Vec::new();
            for _ in 0..(tag - 251) {
                locals.push(read_verification_type(reader)?);
            }
            StackMapFrame {
                kind: FrameKind::Append,
                offset_delta,
                locals,
                stack: vec![],
            }
        }
        255 => {
            let offset_delta = reader.u2()?;
            let local_count = reader.u2()?;
            let mut locals = Vec::with_capacity(local_count as usize);
            for _ in 0..local_count {
                locals.push(read_verification_type(reader)?);
            }
            let stack_count = reader.u2()?;
            let mut stack = Vec::with_capacity(stack_count as usize);
            for _ in 0..stack_count {
                stack.push(read_verification_type(reader)?);
            }
            StackMapFrame {
                kind: FrameKind::Full,
                offset_delta,
                locals,
                stack,
            }
        }
        _ => {
            return Err(FormatError::new(
                FormatCause::InvalidAttributePayload("StackMapTable".to_string()),
                "reserved stack map frame tag",
            ));
        }
    };
    Ok(frame)
}

fn read_verification_type(reader: &mut ClassReader) -> Result<VerificationType, FormatError> {
    let tag = reader.u1()?;
    let v = match tag {
        0 => VerificationType::Top,
        1 => VerificationType::Integer,
        2 => VerificationType::Float,
        3 => VerificationType::Double,
        4 => VerificationType::Long,
        5 => VerificationType::Null,
        6 => VerificationType::UninitializedThis,
        7 => VerificationType::Object(reader.u2()?),
        8 => VerificationType::Uninitialized(reader.u2()?),
        _ => {
            return Err(FormatError::new(
                FormatCause::InvalidAttributePayload("StackMapTable".to_string()),
                "invalid verification type tag",
            ));
        }
    };
    Ok(v)
}

fn read_annotations(reader: &mut ClassReader) -> Result<Annotations, FormatError> {
    let count = reader.u2()?;
    let mut annotations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        annotations.push(read_annotation(reader)?);
    }
    Ok(Annotations { annotations })
}

fn read_annotation(reader: &mut ClassReader) -> Result<Annotation, FormatError> {
    let type_index = reader.u2()?;
    let pair_count = reader.u2()?;
    let mut element_value_pairs = Vec::with_capacity(pair_count as usize);
    for _ in 0..pair_count {
        let element_name_index = reader.u2()?;
        let value = read_element_value(reader)?;
        element_value_pairs.push((element_name_index, value));
    }
    Ok(Annotation {
        type_index,
        element_value_pairs,
    })
}

fn read_element_value(reader: &mut ClassReader) -> Result<ElementValue, FormatError> {
    let tag = reader.u1()? as char;
    let value = match tag {
        'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' | 's' => ElementValue::Const {
            tag,
            const_value_index: reader.u2()?,
        },
        'e' => ElementValue::EnumConst {
            type_name_index: reader.u2()?,
            const_name_index: reader.u2()?,
        },
        'c' => ElementValue::ClassInfo(reader.u2()?),
        '@' => ElementValue::Annotation(Box::new(read_annotation(reader)?)),
        '[' => {
            let count = reader.u2()?;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                values.push(read_element_value(reader)?);
            }
            ElementValue::Array(values)
        }
        other => {
            return Err(FormatError::new(
                FormatCause::InvalidAttributePayload(format!("element value tag {other:?}")),
                "unrecognized annotation element value tag",
            ));
        }
    };
    Ok(value)
}
