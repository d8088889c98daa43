use std::fmt;

use crate::errors::class_format_check::{FormatCause, FormatError};
use crate::errors::class_loading::{LoadingCause, LoadingError};
use crate::reader::ClassReader;

/// [The Constant Pool](https://docs.oracle.com/javase/specs/jvms/se17/jvms17.pdf#%5B%7B%22num%22%3A2201%2C%22gen%22%3A0%7D%2C%7B%22name%22%3A%22XYZ%22%7D%2C72%2C256%2Cnull%5D)
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Utf8(Utf8),
    Integer(Integer),
    Float(Float),
    Long(Long),
    Double(Double),
    Class(Class),
    String(StringRef),
    Fieldref(Fieldref),
    Methodref(Methodref),
    InterfaceMethodref(InterfaceMethodref),
    NameAndType(NameAndType),
    MethodHandle(MethodHandle),
    MethodType(MethodType),
    Dynamic(Dynamic),
    InvokeDynamic(InvokeDynamic),
    Module(Module),
    Package(Package),
    /// Slot zero and the slot following a `Long` or `Double` entry.
    Reserved,
}

impl Constant {
    pub fn kind(&self) -> &'static str {
        match self {
            Constant::Utf8(_) => "Utf8",
            Constant::Integer(_) => "Integer",
            Constant::Float(_) => "Float",
            Constant::Long(_) => "Long",
            Constant::Double(_) => "Double",
            Constant::Class(_) => "Class",
            Constant::String(_) => "String",
            Constant::Fieldref(_) => "Fieldref",
            Constant::Methodref(_) => "Methodref",
            Constant::InterfaceMethodref(_) => "InterfaceMethodref",
            Constant::NameAndType(_) => "NameAndType",
            Constant::MethodHandle(_) => "MethodHandle",
            Constant::MethodType(_) => "MethodType",
            Constant::Dynamic(_) => "Dynamic",
            Constant::InvokeDynamic(_) => "InvokeDynamic",
            Constant::Module(_) => "Module",
            Constant::Package(_) => "Package",
            Constant::Reserved => "Reserved",
        }
    }

    /// Whether the entry occupies two pool slots.
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

#[repr(u8)]
pub enum Tags {
    Utf8 = 1,
    Integer = 3,
    Float = 4,
    Long = 5,
    Double = 6,
    Class = 7,
    String = 8,
    Fieldref = 9,
    Methodref = 10,
    InterfaceMethodref = 11,
    NameAndType = 12,
    MethodHandle = 15,
    MethodType = 16,
    Dynamic = 17,
    InvokeDynamic = 18,
    Module = 19,
    Package = 20,
    Unknown = 128,
}

impl From<u8> for Tags {
    fn from(value: u8) -> Self {
        match value {
            1 => Tags::Utf8,
            3 => Tags::Integer,
            4 => Tags::Float,
            5 => Tags::Long,
            6 => Tags::Double,
            7 => Tags::Class,
            8 => Tags::String,
            9 => Tags::Fieldref,
            10 => Tags::Methodref,
            11 => Tags::InterfaceMethodref,
            12 => Tags::NameAndType,
            15 => Tags::MethodHandle,
            16 => Tags::MethodType,
            17 => Tags::Dynamic,
            18 => Tags::InvokeDynamic,
            19 => Tags::Module,
            20 => Tags::Package,
            _ => Tags::Unknown,
        }
    }
}

/// [Utf8 Constant](https://docs.oracle.com/javase/specs/jvms/se17/jvms17.pdf#%5B%7B%22num%22%3A636%2C%22gen%22%3A0%7D%2C%7B%22name%22%3A%22XYZ%22%7D%2C72%2C438%2Cnull%5D)
///
/// The payload is decoded from modified UTF-8 when the pool is read; an
/// entry holding an invalid sequence never makes it into the pool.
#[derive(Clone, Debug, PartialEq)]
pub struct Utf8 {
    pub value: String,
}

impl From<&str> for Utf8 {
    fn from(input: &str) -> Self {
        Utf8 {
            value: input.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Integer {
    pub value: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Float {
    pub value: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Long {
    pub value: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Double {
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Class {
    pub name_index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StringRef {
    pub string_index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Fieldref {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Methodref {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceMethodref {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NameAndType {
    pub name_index: u16,
    pub descriptor_index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodHandle {
    pub reference_kind: u8,
    pub reference_index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodType {
    pub descriptor_index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Dynamic {
    pub bootstrap_method_attr_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InvokeDynamic {
    pub bootstrap_method_attr_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub name_index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Package {
    pub name_index: u16,
}

/// A field or method referenced from the pool, fully resolved to strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub is_interface: bool,
}

/// The per-class constant table. Entries are 1-indexed and `Long`/`Double`
/// entries own the following slot, which holds [`Constant::Reserved`].
#[derive(Clone, Debug)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// Reads `count - 1` entries, skipping the reserved slot after each
    /// eight-byte constant, then checks every cross-reference.
    pub fn read(count: u16, reader: &mut ClassReader) -> Result<ConstantPool, FormatError> {
        if count == 0 {
            return Err(FormatError::new(
                FormatCause::InvalidIndex(0),
                "constant_pool_count must be at least one",
            ));
        }
        let mut entries = vec![Constant::Reserved; count as usize];
        let mut index = 1usize;
        while index < count as usize {
            let tag = reader.u1()?;
            let constant = read_constant(tag, index as u16, reader)?;
            let wide = constant.is_wide();
            entries[index] = constant;
            // The slot after a long or double stays Reserved.
            index += if wide { 2 } else { 1 };
        }
        if index != count as usize {
            return Err(FormatError::new(
                FormatCause::InvalidIndex((count) - 1),
                "a two-slot constant overhangs the end of the pool",
            ));
        }
        let pool = ConstantPool { entries };
        pool.validate()?;
        Ok(pool)
    }

    /// Number of slots, including slot zero.
    pub fn count(&self) -> u16 {
        self.entries.len() as u16
    }

    pub fn get(&self, index: u16) -> Result<&Constant, FormatError> {
        if index == 0 || index as usize >= self.entries.len() {
            return Err(FormatError::new(
                FormatCause::InvalidIndex(index),
                "constant pool index out of range",
            ));
        }
        Ok(&self.entries[index as usize])
    }

    fn expect<'p, T>(
        &'p self,
        index: u16,
        expected: &'static str,
        project: impl Fn(&'p Constant) -> Option<T>,
    ) -> Result<T, FormatError> {
        let entry = self.get(index)?;
        project(entry).ok_or_else(|| {
            FormatError::new(
                FormatCause::KindMismatch {
                    expected,
                    found: entry.kind(),
                },
                "constant pool entry has the wrong kind",
            )
        })
    }

    pub fn utf8(&self, index: u16) -> Result<&str, FormatError> {
        self.expect(index, "Utf8", |c| match c {
            Constant::Utf8(utf8) => Some(utf8.value.as_str()),
            _ => None,
        })
    }

    /// Resolves a `Class` entry to its binary name (`java/lang/Object`).
    pub fn class_name(&self, index: u16) -> Result<&str, FormatError> {
        let class = self.expect(index, "Class", |c| match c {
            Constant::Class(class) => Some(class),
            _ => None,
        })?;
        self.utf8(class.name_index)
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), FormatError> {
        let nat = self.expect(index, "NameAndType", |c| match c {
            Constant::NameAndType(nat) => Some(nat),
            _ => None,
        })?;
        Ok((self.utf8(nat.name_index)?, self.utf8(nat.descriptor_index)?))
    }

    /// Resolves a `Fieldref` to `(owner, name, descriptor)`.
    pub fn field_ref(&self, index: u16) -> Result<MemberRef, FormatError> {
        let fieldref = self.expect(index, "Fieldref", |c| match c {
            Constant::Fieldref(r) => Some(r),
            _ => None,
        })?;
        self.member_ref(fieldref.class_index, fieldref.name_and_type_index, false)
    }

    /// Resolves a `Methodref` or `InterfaceMethodref` to
    /// `(owner, name, descriptor)`.
    pub fn method_ref(&self, index: u16) -> Result<MemberRef, FormatError> {
        let (class_index, nat_index, is_interface) = self.expect(
            index,
            "Methodref or InterfaceMethodref",
            |c| match c {
                Constant::Methodref(r) => Some((r.class_index, r.name_and_type_index, false)),
                Constant::InterfaceMethodref(r) => {
                    Some((r.class_index, r.name_and_type_index, true))
                }
                _ => None,
            },
        )?;
        self.member_ref(class_index, nat_index, is_interface)
    }

    fn member_ref(
        &self,
        class_index: u16,
        nat_index: u16,
        is_interface: bool,
    ) -> Result<MemberRef, FormatError> {
        let owner = self.class_name(class_index)?.to_string();
        let (name, descriptor) = self.name_and_type(nat_index)?;
        Ok(MemberRef {
            owner,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            is_interface,
        })
    }

    pub fn string(&self, index: u16) -> Result<&str, FormatError> {
        let string = self.expect(index, "String", |c| match c {
            Constant::String(s) => Some(s),
            _ => None,
        })?;
        self.utf8(string.string_index)
    }

    pub fn invoke_dynamic(&self, index: u16) -> Result<&InvokeDynamic, FormatError> {
        self.expect(index, "InvokeDynamic", |c| match c {
            Constant::InvokeDynamic(d) => Some(d),
            _ => None,
        })
    }

    /// Cross-reference check over the whole table: every index must name a
    /// live slot of the kind its referrer expects.
    fn validate(&self) -> Result<(), FormatError> {
        for entry in &self.entries {
            match entry {
                Constant::Class(c) => {
                    self.utf8(c.name_index)?;
                }
                Constant::String(s) => {
                    self.utf8(s.string_index)?;
                }
                Constant::Fieldref(r) => {
                    self.class_name(r.class_index)?;
                    self.name_and_type(r.name_and_type_index)?;
                }
                Constant::Methodref(r) => {
                    self.class_name(r.class_index)?;
                    self.name_and_type(r.name_and_type_index)?;
                }
                Constant::InterfaceMethodref(r) => {
                    self.class_name(r.class_index)?;
                    self.name_and_type(r.name_and_type_index)?;
                }
                Constant::NameAndType(nat) => {
                    self.utf8(nat.name_index)?;
                    self.utf8(nat.descriptor_index)?;
                }
                Constant::MethodHandle(mh) => {
                    match mh.reference_kind {
                        1..=4 => {
                            self.field_ref(mh.reference_index)?;
                        }
                        5..=9 => {
                            self.method_ref(mh.reference_index)?;
                        }
                        kind => {
                            return Err(FormatError::new(
                                FormatCause::InvalidReferenceKind(kind),
                                "MethodHandle reference kind must be in 1..=9",
                            ));
                        }
                    };
                }
                Constant::MethodType(mt) => {
                    self.utf8(mt.descriptor_index)?;
                }
                Constant::Dynamic(d) => {
                    self.name_and_type(d.name_and_type_index)?;
                }
                Constant::InvokeDynamic(d) => {
                    self.name_and_type(d.name_and_type_index)?;
                }
                Constant::Module(m) => {
                    self.utf8(m.name_index)?;
                }
                Constant::Package(p) => {
                    self.utf8(p.name_index)?;
                }
                Constant::Utf8(_)
                | Constant::Integer(_)
                | Constant::Float(_)
                | Constant::Long(_)
                | Constant::Double(_)
                | Constant::Reserved => {}
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConstantPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate().skip(1) {
            if !matches!(entry, Constant::Reserved) {
                writeln!(f, "{i}: {entry:?}")?;
            }
        }
        Ok(())
    }
}

fn read_constant(tag: u8, index: u16, reader: &mut ClassReader) -> Result<Constant, FormatError> {
    let constant = match Tags::from(tag) {
        Tags::Utf8 => {
            let length = reader.u2()? as usize;
            let bytes = reader.bytes(length)?;
            let value = decode_modified_utf8(bytes).ok_or_else(|| {
                FormatError::new(
                    FormatCause::InvalidUtf8(index),
                    "constant is not valid modified UTF-8",
                )
            })?;
            Constant::Utf8(Utf8 { value })
        }
        Tags::Integer => Constant::Integer(Integer {
            value: reader.i4()?,
        }),
        Tags::Float => Constant::Float(Float {
            value: reader.f4()?,
        }),
        Tags::Long => Constant::Long(Long {
            value: reader.u8()? as i64,
        }),
        Tags::Double => Constant::Double(Double {
            value: reader.f8()?,
        }),
        Tags::Class => Constant::Class(Class {
            name_index: reader.u2()?,
        }),
        Tags::String => Constant::String(StringRef {
            string_index: reader.u2()?,
        }),
        Tags::Fieldref => Constant::Fieldref(Fieldref {
            class_index: reader.u2()?,
            name_and_type_index: reader.u2()?,
        }),
        Tags::Methodref => Constant::Methodref(Methodref {
            class_index: reader.u2()?,
            name_and_type_index: reader.u2()?,
        }),
        Tags::InterfaceMethodref => Constant::InterfaceMethodref(InterfaceMethodref {
            class_index: reader.u2()?,
            name_and_type_index: reader.u2()?,
        }),
        Tags::NameAndType => Constant::NameAndType(NameAndType {
            name_index: reader.u2()?,
            descriptor_index: reader.u2()?,
        }),
        Tags::MethodHandle => Constant::MethodHandle(MethodHandle {
            reference_kind: reader.u1()?,
            reference_index: reader.u2()?,
        }),
        Tags::MethodType => Constant::MethodType(MethodType {
            descriptor_index: reader.u2()?,
        }),
        Tags::Dynamic => Constant::Dynamic(Dynamic {
            bootstrap_method_attr_index: reader.u2()?,
            name_and_type_index: reader.u2()?,
        }),
        Tags::InvokeDynamic => Constant::InvokeDynamic(InvokeDynamic {
            bootstrap_method_attr_index: reader.u2()?,
            name_and_type_index: reader.u2()?,
        }),
        Tags::Module => Constant::Module(Module {
            name_index: reader.u2()?,
        }),
        Tags::Package => Constant::Package(Package {
            name_index: reader.u2()?,
        }),
        Tags::Unknown => {
            return Err(LoadingError::new(
                LoadingCause::InvalidConstantTag(tag),
                "unrecognized constant pool tag",
            )
            .into());
        }
    };
    Ok(constant)
}

/// Decodes the JVM's modified UTF-8: no raw NUL bytes, no four-byte forms,
/// supplementary characters written as surrogate pairs of three-byte units.
///
/// The decoding is strict; any malformed sequence yields `None`.
fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            0x01..=0x7F => {
                units.push(u16::from(b));
                i += 1;
            }
            0xC0..=0xDF => {
                if i + 1 >= bytes.len() {
                    return None;
                }
                let b2 = bytes[i + 1];
                if b2 & 0xC0 != 0x80 {
                    return None;
                }
                units.push((u16::from(b & 0x1F) << 6) | u16::from(b2 & 0x3F));
                i += 2;
            }
            0xE0..=0xEF => {
                if i + 2 >= bytes.len() {
                    return None;
                }
                let (b2, b3) = (bytes[i + 1], bytes[i + 2]);
                if b2 & 0xC0 != 0x80 || b3 & 0xC0 != 0x80 {
                    return None;
                }
                units.push(
                    (u16::from(b & 0x0F) << 12)
                        | (u16::from(b2 & 0x3F) << 6)
                        | u16::from(b3 & 0x3F),
                );
                i += 3;
            }
            // 0x00 must be encoded as 0xC0 0x80; 0xF0..=0xFF never appear.
            _ => return None,
        }
    }
    // Unpaired surrogates are rejected here.
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_bytes(entries: &[&[u8]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for entry in entries {
            bytes.extend_from_slice(entry);
        }
        bytes
    }

    #[test]
    fn utf8_and_class_resolve() {
        let bytes = pool_bytes(&[
            &[1, 0, 16],
            b"java/lang/Object",
            &[7, 0, 1],
        ]);
        let mut reader = ClassReader::new(&bytes);
        let pool = ConstantPool::read(3, &mut reader).unwrap();
        assert_eq!(pool.utf8(1).unwrap(), "java/lang/Object");
        assert_eq!(pool.class_name(2).unwrap(), "java/lang/Object");
    }

    #[test]
    fn long_occupies_two_slots() {
        let bytes = pool_bytes(&[
            &[5],
            &0x0102_0304_0506_0708i64.to_be_bytes(),
            &[1, 0, 1],
            b"x",
        ]);
        let mut reader = ClassReader::new(&bytes);
        let pool = ConstantPool::read(4, &mut reader).unwrap();
        assert_eq!(
            pool.get(1).unwrap(),
            &Constant::Long(Long {
                value: 0x0102_0304_0506_0708
            })
        );
        assert_eq!(pool.get(2).unwrap(), &Constant::Reserved);
        assert_eq!(pool.utf8(3).unwrap(), "x");
    }

    #[test]
    fn class_name_index_must_be_utf8() {
        let bytes = pool_bytes(&[&[3, 0, 0, 0, 5], &[7, 0, 1]]);
        let mut reader = ClassReader::new(&bytes);
        let err = ConstantPool::read(3, &mut reader).unwrap_err();
        assert!(matches!(err.cause, FormatCause::KindMismatch { .. }));
    }

    #[test]
    fn reserved_slot_is_not_addressable() {
        let bytes = pool_bytes(&[&[6], &1.5f64.to_bits().to_be_bytes()]);
        let mut reader = ClassReader::new(&bytes);
        let pool = ConstantPool::read(3, &mut reader).unwrap();
        assert_eq!(pool.get(2).unwrap(), &Constant::Reserved);
        assert!(pool.utf8(2).is_err());
        assert!(pool.get(0).is_err());
        assert!(pool.get(3).is_err());
    }

    #[test]
    fn modified_utf8_embedded_nul_and_surrogates() {
        assert_eq!(
            decode_modified_utf8(&[0x41, 0xC0, 0x80, 0x42]).unwrap(),
            "A\u{0}B"
        );
        // U+1D11E (musical G clef) as a surrogate pair of 3-byte units.
        let clef = decode_modified_utf8(&[0xED, 0xA0, 0xB4, 0xED, 0xB4, 0x9E]).unwrap();
        assert_eq!(clef.chars().next().unwrap(), '\u{1D11E}');
    }

    #[test]
    fn modified_utf8_rejects_malformed_sequences() {
        // Raw NUL.
        assert!(decode_modified_utf8(&[0x00]).is_none());
        // Four-byte standard UTF-8 form.
        assert!(decode_modified_utf8(&[0xF0, 0x9D, 0x84, 0x9E]).is_none());
        // Truncated two-byte sequence.
        assert!(decode_modified_utf8(&[0xC3]).is_none());
        // Unpaired high surrogate.
        assert!(decode_modified_utf8(&[0xED, 0xA0, 0xB4]).is_none());
    }
}
