//! Loading tests over synthesized class images (version 52.0), so the
//! suite carries its own inputs.

use std::collections::HashMap;
use std::error::Error;

use jloader::attributes::AttributeInfo;
use jloader::class_file::ClassFile;
use jloader::errors::class_format_check::FormatCause;

const ACC_PUBLIC: u16 = 0x0001;
const ACC_PRIVATE: u16 = 0x0002;
const ACC_STATIC: u16 = 0x0008;
const ACC_FINAL: u16 = 0x0010;
const ACC_ABSTRACT: u16 = 0x0400;

/// Minimal class image builder; pool entries are interned on demand.
struct Image {
    entries: Vec<Vec<u8>>,
    next_slot: u16,
    utf8_cache: HashMap<String, u16>,
    class_cache: HashMap<String, u16>,
    this_class: u16,
    super_class: u16,
    major_version: u16,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
}

impl Image {
    fn new(this: &str, super_name: &str) -> Image {
        let mut image = Image {
            entries: Vec::new(),
            next_slot: 1,
            utf8_cache: HashMap::new(),
            class_cache: HashMap::new(),
            this_class: 0,
            super_class: 0,
            major_version: 52,
            fields: Vec::new(),
            methods: Vec::new(),
        };
        image.this_class = image.class(this);
        image.super_class = image.class(super_name);
        image
    }

    fn push(&mut self, bytes: Vec<u8>, wide: bool) -> u16 {
        let slot = self.next_slot;
        self.entries.push(bytes);
        self.next_slot += if wide { 2 } else { 1 };
        slot
    }

    fn utf8(&mut self, text: &str) -> u16 {
        if let Some(&slot) = self.utf8_cache.get(text) {
            return slot;
        }
        let mut bytes = vec![1];
        bytes.extend((text.len() as u16).to_be_bytes());
        bytes.extend(text.as_bytes());
        let slot = self.push(bytes, false);
        self.utf8_cache.insert(text.to_string(), slot);
        slot
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(&slot) = self.class_cache.get(name) {
            return slot;
        }
        let name_index = self.utf8(name);
        let mut bytes = vec![7];
        bytes.extend(name_index.to_be_bytes());
        let slot = self.push(bytes, false);
        self.class_cache.insert(name.to_string(), slot);
        slot
    }

    fn long_const(&mut self, value: i64) -> u16 {
        let mut bytes = vec![5];
        bytes.extend(value.to_be_bytes());
        self.push(bytes, true)
    }

    fn int_const(&mut self, value: i32) -> u16 {
        let mut bytes = vec![3];
        bytes.extend(value.to_be_bytes());
        self.push(bytes, false)
    }

    fn method(&mut self, flags: u16, name: &str, descriptor: &str, code: Option<Vec<u8>>) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut method: Vec<u8> = Vec::new();
        method.extend(flags.to_be_bytes());
        method.extend(name_index.to_be_bytes());
        method.extend(descriptor_index.to_be_bytes());
        match code {
            None => method.extend(0u16.to_be_bytes()),
            Some(code) => {
                let code_name = self.utf8("Code");
                method.extend(1u16.to_be_bytes());
                method.extend(code_name.to_be_bytes());
                method.extend(((12 + code.len()) as u32).to_be_bytes());
                method.extend(2u16.to_be_bytes()); // max_stack
                method.extend(2u16.to_be_bytes()); // max_locals
                method.extend((code.len() as u32).to_be_bytes());
                method.extend(&code);
                method.extend(0u16.to_be_bytes()); // exception table
                method.extend(0u16.to_be_bytes()); // attributes
            }
        }
        self.methods.push(method);
    }

    fn field(&mut self, flags: u16, name: &str, descriptor: &str, constant: Option<u16>) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let constant_name = constant.map(|_| self.utf8("ConstantValue"));
        let mut field: Vec<u8> = Vec::new();
        field.extend(flags.to_be_bytes());
        field.extend(name_index.to_be_bytes());
        field.extend(descriptor_index.to_be_bytes());
        match (constant, constant_name) {
            (Some(value_index), Some(attribute_name)) => {
                field.extend(1u16.to_be_bytes());
                field.extend(attribute_name.to_be_bytes());
                field.extend(2u32.to_be_bytes());
                field.extend(value_index.to_be_bytes());
            }
            _ => field.extend(0u16.to_be_bytes()),
        }
        self.fields.push(field);
    }

    fn build(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend(0xCAFE_BABEu32.to_be_bytes());
        bytes.extend(0u16.to_be_bytes());
        bytes.extend(self.major_version.to_be_bytes());
        bytes.extend(self.next_slot.to_be_bytes());
        for entry in &self.entries {
            bytes.extend(entry);
        }
        bytes.extend(0x0021u16.to_be_bytes());
        bytes.extend(self.this_class.to_be_bytes());
        bytes.extend(self.super_class.to_be_bytes());
        bytes.extend(0u16.to_be_bytes());
        bytes.extend((self.fields.len() as u16).to_be_bytes());
        for field in &self.fields {
            bytes.extend(field);
        }
        bytes.extend((self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            bytes.extend(method);
        }
        bytes.extend(0u16.to_be_bytes());
        bytes
    }
}

#[test]
fn loads_a_minimal_class() -> Result<(), Box<dyn Error>> {
    let mut image = Image::new("A", "java/lang/Object");
    image.method(ACC_PUBLIC, "m", "()V", Some(vec![0xB1]));
    let class = ClassFile::from_bytes(&image.build())?;
    assert_eq!(class.class_name()?, "A");
    assert_eq!(class.super_name()?, Some("java/lang/Object"));
    assert_eq!(class.methods.len(), 1);
    let method = &class.methods[0];
    assert_eq!(method.name(&class.constant_pool)?, "m");
    let code = method.code().expect("concrete method has code");
    assert_eq!(code.code, vec![0xB1]);
    Ok(())
}

/// Parsing then walking the recognized structures reproduces the same
/// logical shape the builder wrote: counts and every index resolves.
#[test]
fn reparsing_preserves_the_logical_structure() -> Result<(), Box<dyn Error>> {
    let mut image = Image::new("A", "java/lang/Object");
    let answer = image.int_const(42);
    image.field(ACC_PUBLIC | ACC_STATIC | ACC_FINAL, "ANSWER", "I", Some(answer));
    image.field(ACC_PRIVATE, "name", "Ljava/lang/String;", None);
    image.method(ACC_PUBLIC, "m", "()V", Some(vec![0xB1]));
    image.method(ACC_PUBLIC | ACC_ABSTRACT, "todo", "()I", None);
    let class = ClassFile::from_bytes(&image.build())?;

    assert_eq!(class.fields.len(), 2);
    assert_eq!(class.methods.len(), 2);
    let pool = &class.constant_pool;
    assert_eq!(class.fields[0].name(pool)?, "ANSWER");
    assert_eq!(class.fields[0].constant_value(), Some(answer));
    assert_eq!(class.fields[1].name(pool)?, "name");
    assert_eq!(class.fields[1].field_type(pool)?.java_name(), "java.lang.String");
    assert_eq!(class.methods[0].descriptor(pool)?.to_descriptor(), "()V");
    assert!(class.methods[1].is_abstract());
    assert!(class.methods[1].code().is_none());
    Ok(())
}

#[test]
fn rejects_a_bad_magic_number() {
    let mut bytes = Image::new("A", "java/lang/Object").build();
    bytes[0] = 0xDE;
    let err = ClassFile::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err.cause, FormatCause::IncorrectMagic(_)));
}

#[test]
fn rejects_unsupported_versions() {
    let mut image = Image::new("A", "java/lang/Object");
    image.major_version = 66;
    let err = ClassFile::from_bytes(&image.build()).unwrap_err();
    assert!(matches!(err.cause, FormatCause::UnsupportedVersion(66, 0)));

    let mut image = Image::new("A", "java/lang/Object");
    image.major_version = 44;
    let err = ClassFile::from_bytes(&image.build()).unwrap_err();
    assert!(matches!(err.cause, FormatCause::UnsupportedVersion(44, 0)));
}

#[test]
fn rejects_truncated_input() {
    let bytes = Image::new("A", "java/lang/Object").build();
    let err = ClassFile::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err();
    assert!(matches!(err.cause, FormatCause::Truncated(_)));
}

#[test]
fn rejects_trailing_bytes() {
    let mut bytes = Image::new("A", "java/lang/Object").build();
    bytes.push(0x00);
    let err = ClassFile::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err.cause, FormatCause::ExtraBytes));
}

#[test]
fn long_constants_occupy_two_pool_slots() -> Result<(), Box<dyn Error>> {
    let mut image = Image::new("A", "java/lang/Object");
    let long_index = image.long_const(1 << 40);
    image.field(ACC_PUBLIC | ACC_STATIC | ACC_FINAL, "BIG", "J", Some(long_index));
    let class = ClassFile::from_bytes(&image.build())?;
    use jloader::constants::Constant;
    assert!(matches!(
        class.constant_pool.get(long_index)?,
        Constant::Long(l) if l.value == 1 << 40
    ));
    assert_eq!(
        class.constant_pool.get(long_index + 1)?,
        &Constant::Reserved
    );
    Ok(())
}

#[test]
fn concrete_methods_must_carry_code() {
    let mut image = Image::new("A", "java/lang/Object");
    image.method(ACC_PUBLIC, "m", "()V", None);
    let err = ClassFile::from_bytes(&image.build()).unwrap_err();
    assert!(matches!(err.cause, FormatCause::MissingAttribute("Code")));
}

#[test]
fn conflicting_visibility_flags_are_rejected() {
    let mut image = Image::new("A", "java/lang/Object");
    image.method(ACC_PUBLIC | ACC_PRIVATE, "m", "()V", Some(vec![0xB1]));
    let err = ClassFile::from_bytes(&image.build()).unwrap_err();
    assert!(matches!(err.cause, FormatCause::IllegalFlags("method")));
}

#[test]
fn bad_member_descriptors_are_rejected() {
    let mut image = Image::new("A", "java/lang/Object");
    image.method(ACC_PUBLIC, "m", "(Q)V", Some(vec![0xB1]));
    let err = ClassFile::from_bytes(&image.build()).unwrap_err();
    assert!(matches!(err.cause, FormatCause::InvalidDescriptor(_)));
}

/// A `Class` entry whose name index points at a non-UTF-8 entry is a
/// kind mismatch; this image is assembled by hand to be inconsistent.
#[test]
fn cross_kind_pool_references_are_validated() {
    let mut bytes: Vec<u8> = Vec::new();
    bytes.extend(0xCAFE_BABEu32.to_be_bytes());
    bytes.extend(0u16.to_be_bytes());
    bytes.extend(52u16.to_be_bytes());
    bytes.extend(3u16.to_be_bytes()); // two entries
    bytes.extend([3, 0, 0, 0, 7]); // #1: Integer 7
    bytes.extend([7, 0, 1]); // #2: Class with name_index -> Integer
    bytes.extend(0x0021u16.to_be_bytes());
    bytes.extend(2u16.to_be_bytes()); // this_class
    bytes.extend(0u16.to_be_bytes()); // super (invalid too, but pool fails first)
    bytes.extend([0, 0, 0, 0, 0, 0, 0, 0]); // interfaces/fields/methods/attrs
    let err = ClassFile::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err.cause, FormatCause::KindMismatch { .. }));
}

#[test]
fn unknown_attributes_are_preserved_opaquely() -> Result<(), Box<dyn Error>> {
    let mut image = Image::new("A", "java/lang/Object");
    // A field with a made-up attribute.
    let name_index = image.utf8("x");
    let descriptor_index = image.utf8("I");
    let attribute_name = image.utf8("WhoKnows");
    let mut field: Vec<u8> = Vec::new();
    field.extend(ACC_PUBLIC.to_be_bytes());
    field.extend(name_index.to_be_bytes());
    field.extend(descriptor_index.to_be_bytes());
    field.extend(1u16.to_be_bytes());
    field.extend(attribute_name.to_be_bytes());
    field.extend(3u32.to_be_bytes());
    field.extend([0xAA, 0xBB, 0xCC]);
    image.fields.push(field);
    let class = ClassFile::from_bytes(&image.build())?;
    let attribute = &class.fields[0].attributes[0];
    assert!(matches!(
        attribute,
        AttributeInfo::Unknown(unknown)
            if unknown.name == "WhoKnows" && unknown.info == vec![0xAA, 0xBB, 0xCC]
    ));
    Ok(())
}
