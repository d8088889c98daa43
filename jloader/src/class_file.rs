use log::debug;

use crate::access_flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};
use crate::attributes::{self, AttributeInfo, Code};
use crate::constants::ConstantPool;
use crate::descriptors::{FieldType, MethodDescriptor};
use crate::errors::class_format_check::{FormatCause, FormatError};
use crate::reader::ClassReader;

/// The magic item identifying the class file format.
pub const CLASS_FILE_MAGIC: u32 = 0xCAFE_BABE;

/// Class file versions this loader accepts: Java 1.1 (45) through
/// Java 21 (65).
pub const MIN_MAJOR_VERSION: u16 = 45;
pub const MAX_MAJOR_VERSION: u16 = 65;

/// [Fields](https://docs.oracle.com/javase/specs/jvms/se17/jvms17.pdf#%5B%7B%22num%22%3A721%2C%22gen%22%3A0%7D%2C%7B%22name%22%3A%22XYZ%22%7D%2C72%2C564%2Cnull%5D)
#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub access_flags: Vec<FieldAccessFlags>,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl FieldInfo {
    pub fn name<'p>(&self, pool: &'p ConstantPool) -> Result<&'p str, FormatError> {
        pool.utf8(self.name_index)
    }

    pub fn field_type(&self, pool: &ConstantPool) -> Result<FieldType, FormatError> {
        Ok(FieldType::parse(pool.utf8(self.descriptor_index)?)?)
    }

    /// The `ConstantValue` attribute's pool index, for static finals
    /// initialized at compile time.
    pub fn constant_value(&self) -> Option<u16> {
        self.attributes.iter().find_map(|a| match a {
            AttributeInfo::ConstantValue(v) => Some(v.constant_value_index),
            _ => None,
        })
    }

    pub fn signature_index(&self) -> Option<u16> {
        self.attributes.iter().find_map(|a| match a {
            AttributeInfo::Signature(s) => Some(s.signature_index),
            _ => None,
        })
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(&FieldAccessFlags::AccStatic)
    }

    pub fn is_deprecated(&self) -> bool {
        self.attributes.contains(&AttributeInfo::Deprecated)
    }

    pub fn is_synthetic(&self) -> bool {
        self.attributes.contains(&AttributeInfo::Synthetic)
            || self.access_flags.contains(&FieldAccessFlags::AccSynthetic)
    }
}

/// [Methods](https://docs.oracle.com/javase/specs/jvms/se17/jvms17.pdf#%5B%7B%22num%22%3A777%2C%22gen%22%3A0%7D%2C%7B%22name%22%3A%22XYZ%22%7D%2C72%2C282%2Cnull%5D)
#[derive(Clone, Debug)]
pub struct MethodInfo {
    pub access_flags: Vec<MethodAccessFlags>,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl MethodInfo {
    pub fn name<'p>(&self, pool: &'p ConstantPool) -> Result<&'p str, FormatError> {
        pool.utf8(self.name_index)
    }

    pub fn descriptor(&self, pool: &ConstantPool) -> Result<MethodDescriptor, FormatError> {
        Ok(MethodDescriptor::parse(pool.utf8(self.descriptor_index)?)?)
    }

    /// The decoded `Code` attribute; absent for abstract and native
    /// methods.
    pub fn code(&self) -> Option<&Code> {
        self.attributes.iter().find_map(|a| match a {
            AttributeInfo::Code(c) => Some(c),
            _ => None,
        })
    }

    /// Pool indices of the declared `throws` classes.
    pub fn exceptions(&self) -> &[u16] {
        self.attributes
            .iter()
            .find_map(|a| match a {
                AttributeInfo::Exceptions(e) => Some(e.exception_index_table.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn signature_index(&self) -> Option<u16> {
        self.attributes.iter().find_map(|a| match a {
            AttributeInfo::Signature(s) => Some(s.signature_index),
            _ => None,
        })
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(&MethodAccessFlags::AccStatic)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(&MethodAccessFlags::AccAbstract)
    }

    pub fn is_native(&self) -> bool {
        self.access_flags.contains(&MethodAccessFlags::AccNative)
    }

    pub fn is_deprecated(&self) -> bool {
        self.attributes.contains(&AttributeInfo::Deprecated)
    }

    pub fn is_synthetic(&self) -> bool {
        self.attributes.contains(&AttributeInfo::Synthetic)
            || self
                .access_flags
                .contains(&MethodAccessFlags::AccSynthetic)
    }
}

/// [Class File Format](https://docs.oracle.com/javase/specs/jvms/se17/jvms17.pdf#%5B%7B%22num%22%3A376%2C%22gen%22%3A0%7D%2C%7B%22name%22%3A%22XYZ%22%7D%2C72%2C590%2Cnull%5D)
#[derive(Clone, Debug)]
pub struct ClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: Vec<ClassAccessFlags>,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    pub fn from_bytes(bytes: &[u8]) -> Result<ClassFile, FormatError> {
        let mut reader = ClassReader::new(bytes);
        let magic = reader.u4()?;
        // The first four bytes must contain the right magic number.
        if magic != CLASS_FILE_MAGIC {
            return Err(FormatError::new(
                FormatCause::IncorrectMagic(magic),
                "not a class file",
            ));
        }
        let minor_version = reader.u2()?;
        let major_version = reader.u2()?;
        if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major_version) {
            return Err(FormatError::new(
                FormatCause::UnsupportedVersion(major_version, minor_version),
                "class file version is outside the supported range",
            ));
        }
        debug!("class file version {major_version}.{minor_version}");
        let constant_pool_count = reader.u2()?;
        let constant_pool = ConstantPool::read(constant_pool_count, &mut reader)?;
        let access_flags = ClassAccessFlags::from_u16(reader.u2()?);
        let this_class = reader.u2()?;
        let super_class = reader.u2()?;
        let interfaces_count = reader.u2()?;
        let interfaces = {
            let mut interfaces: Vec<u16> = Vec::with_capacity(interfaces_count as usize);
            for _ in 0..interfaces_count {
                interfaces.push(reader.u2()?);
            }
            interfaces
        };
        let field_count = reader.u2()?;
        let fields = {
            let mut fields = Vec::with_capacity(field_count as usize);
            for _ in 0..field_count {
                let access_flags = FieldAccessFlags::from_u16(reader.u2()?);
                let name_index = reader.u2()?;
                let descriptor_index = reader.u2()?;
                let attribute_count = reader.u2()?;
                let attributes =
                    attributes::read_attributes(&constant_pool, &mut reader, attribute_count)?;
                fields.push(FieldInfo {
                    access_flags,
                    name_index,
                    descriptor_index,
                    attributes,
                });
            }
            fields
        };
        let method_count = reader.u2()?;
        let methods = {
            let mut methods = Vec::with_capacity(method_count as usize);
            for _ in 0..method_count {
                let access_flags = MethodAccessFlags::from_u16(reader.u2()?);
                let name_index = reader.u2()?;
                let descriptor_index = reader.u2()?;
                let attribute_count = reader.u2()?;
                let attributes =
                    attributes::read_attributes(&constant_pool, &mut reader, attribute_count)?;
                methods.push(MethodInfo {
                    access_flags,
                    name_index,
                    descriptor_index,
                    attributes,
                });
            }
            methods
        };
        let attribute_count = reader.u2()?;
        let attributes = attributes::read_attributes(&constant_pool, &mut reader, attribute_count)?;
        // The class file must not have extra bytes at the end.
        if !reader.is_at_end() {
            return Err(FormatError::new(
                FormatCause::ExtraBytes,
                "class file has leftover bytes",
            ));
        }
        let class = ClassFile {
            magic,
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        };
        check_format(&class)?;
        Ok(class)
    }

    /// Binary name of this class (`java/lang/Object` form).
    pub fn class_name(&self) -> Result<&str, FormatError> {
        self.constant_pool.class_name(self.this_class)
    }

    /// Binary name of the direct superclass; `None` for `java/lang/Object`.
    pub fn super_name(&self) -> Result<Option<&str>, FormatError> {
        if self.super_class == 0 {
            return Ok(None);
        }
        Ok(Some(self.constant_pool.class_name(self.super_class)?))
    }

    pub fn source_file(&self) -> Option<&str> {
        self.attributes.iter().find_map(|a| match a {
            AttributeInfo::SourceFile(s) => self.constant_pool.utf8(s.sourcefile_index).ok(),
            _ => None,
        })
    }

    pub fn signature_index(&self) -> Option<u16> {
        self.attributes.iter().find_map(|a| match a {
            AttributeInfo::Signature(s) => Some(s.signature_index),
            _ => None,
        })
    }

    pub fn bootstrap_methods(&self) -> Option<&attributes::BootstrapMethods> {
        self.attributes.iter().find_map(|a| match a {
            AttributeInfo::BootstrapMethods(b) => Some(b),
            _ => None,
        })
    }

    pub fn is_deprecated(&self) -> bool {
        self.attributes.contains(&AttributeInfo::Deprecated)
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(&ClassAccessFlags::AccInterface)
    }
}

/// [Format Checking](https://docs.oracle.com/javase/specs/jvms/se17/jvms17.pdf#%5B%7B%22num%22%3A2235%2C%22gen%22%3A0%7D%2C%7B%22name%22%3A%22XYZ%22%7D%2C72%2C590%2Cnull%5D)
fn check_format(class: &ClassFile) -> Result<(), FormatError> {
    let pool = &class.constant_pool;
    let this_name = pool.class_name(class.this_class)?;

    // The super_class item may be zero only for java/lang/Object.
    if class.super_class == 0 {
        if this_name != "java/lang/Object" {
            return Err(FormatError::new(
                FormatCause::InvalidIndex(0),
                "only java/lang/Object may omit a superclass",
            ));
        }
    } else {
        pool.class_name(class.super_class)?;
    }
    for interface in &class.interfaces {
        pool.class_name(*interface)?;
    }

    let flags = &class.access_flags;
    if flags.contains(&ClassAccessFlags::AccInterface) {
        if !flags.contains(&ClassAccessFlags::AccAbstract) {
            return Err(FormatError::new(
                FormatCause::IllegalFlags("class"),
                "an interface must also be abstract",
            ));
        }
        if flags.contains(&ClassAccessFlags::AccFinal) {
            return Err(FormatError::new(
                FormatCause::IllegalFlags("class"),
                "an interface must not be final",
            ));
        }
    }

    for field in &class.fields {
        let name = field.name(pool)?.to_string();
        field.field_type(pool)?;
        if visibility_count(
            &field.access_flags,
            &[
                FieldAccessFlags::AccPublic,
                FieldAccessFlags::AccPrivate,
                FieldAccessFlags::AccProtected,
            ],
        ) > 1
        {
            return Err(FormatError::new(
                FormatCause::IllegalFlags("field"),
                &format!("field {name} has more than one visibility flag"),
            ));
        }
        if field.access_flags.contains(&FieldAccessFlags::AccFinal)
            && field.access_flags.contains(&FieldAccessFlags::AccVolatile)
        {
            return Err(FormatError::new(
                FormatCause::IllegalFlags("field"),
                &format!("field {name} is both final and volatile"),
            ));
        }
    }

    for method in &class.methods {
        let name = method.name(pool)?.to_string();
        method.descriptor(pool)?;
        if visibility_count(
            &method.access_flags,
            &[
                MethodAccessFlags::AccPublic,
                MethodAccessFlags::AccPrivate,
                MethodAccessFlags::AccProtected,
            ],
        ) > 1
        {
            return Err(FormatError::new(
                FormatCause::IllegalFlags("method"),
                &format!("method {name} has more than one visibility flag"),
            ));
        }
        if method.is_abstract() {
            let forbidden = [
                MethodAccessFlags::AccPrivate,
                MethodAccessFlags::AccStatic,
                MethodAccessFlags::AccFinal,
                MethodAccessFlags::AccSynchronized,
                MethodAccessFlags::AccNative,
                MethodAccessFlags::AccStrict,
            ];
            if forbidden.iter().any(|f| method.access_flags.contains(f)) {
                return Err(FormatError::new(
                    FormatCause::IllegalFlags("method"),
                    &format!("abstract method {name} carries an incompatible flag"),
                ));
            }
        }
        // Bytecode is present exactly when the method can have a body.
        let has_code = method.code().is_some();
        if method.is_abstract() || method.is_native() {
            if has_code {
                return Err(FormatError::new(
                    FormatCause::InvalidAttributePayload("Code".to_string()),
                    &format!("abstract or native method {name} must not have a Code attribute"),
                ));
            }
        } else if !has_code {
            return Err(FormatError::new(
                FormatCause::MissingAttribute("Code"),
                &format!("method {name} has no Code attribute"),
            ));
        }
    }

    // Dynamic constants lean on the class-level BootstrapMethods table.
    let needs_bootstrap = (1..pool.count())
        .filter_map(|i| pool.get(i).ok())
        .filter_map(|c| match c {
            crate::constants::Constant::Dynamic(d) => Some(d.bootstrap_method_attr_index),
            crate::constants::Constant::InvokeDynamic(d) => Some(d.bootstrap_method_attr_index),
            _ => None,
        })
        .collect::<Vec<_>>();
    if !needs_bootstrap.is_empty() {
        let Some(bootstrap) = class.bootstrap_methods() else {
            return Err(FormatError::new(
                FormatCause::MissingAttribute("BootstrapMethods"),
                "dynamic constants require a BootstrapMethods attribute",
            ));
        };
        for index in needs_bootstrap {
            if index as usize >= bootstrap.methods.len() {
                return Err(FormatError::new(
                    FormatCause::InvalidIndex(index),
                    "bootstrap method index out of range",
                ));
            }
        }
    }

    Ok(())
}

fn visibility_count<T: PartialEq>(flags: &[T], visibility: &[T]) -> usize {
    visibility.iter().filter(|v| flags.contains(*v)).count()
}
