use std::fmt;

use crate::errors::descriptor::{DescriptorCause, DescriptorError};

/// [Descriptors](https://docs.oracle.com/javase/specs/jvms/se17/jvms17.pdf#%5B%7B%22num%22%3A677%2C%22gen%22%3A0%7D%2C%7B%22name%22%3A%22XYZ%22%7D%2C72%2C448%2Cnull%5D)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    Void,
}

impl BaseType {
    pub fn java_name(&self) -> &'static str {
        match self {
            BaseType::Byte => "byte",
            BaseType::Char => "char",
            BaseType::Double => "double",
            BaseType::Float => "float",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::Short => "short",
            BaseType::Boolean => "boolean",
            BaseType::Void => "void",
        }
    }

    pub fn descriptor_char(&self) -> char {
        match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
            BaseType::Void => 'V',
        }
    }
}

/// A parsed field descriptor. Object names keep the binary form with `/`
/// separators; rendering to source form happens in [`FieldType::java_name`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    Base(BaseType),
    Object(String),
    Array { element: Box<FieldType>, dims: u8 },
}

impl FieldType {
    pub fn object(name: &str) -> FieldType {
        FieldType::Object(name.to_string())
    }

    /// Parses a complete field descriptor; trailing characters are an error.
    pub fn parse(descriptor: &str) -> Result<FieldType, DescriptorError> {
        let mut cursor = Cursor::new(descriptor);
        let parsed = cursor.field_type(false)?;
        if !cursor.is_at_end() {
            return Err(cursor.error(DescriptorCause::TrailingCharacters));
        }
        Ok(parsed)
    }

    /// Renders the descriptor back out; parsing then rendering is the
    /// identity on valid input.
    pub fn to_descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            FieldType::Base(base) => out.push(base.descriptor_char()),
            FieldType::Object(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
            FieldType::Array { element, dims } => {
                for _ in 0..*dims {
                    out.push('[');
                }
                element.write_descriptor(out);
            }
        }
    }

    /// Java source rendering with dotted package names, e.g.
    /// `java.lang.String[]`.
    pub fn java_name(&self) -> String {
        match self {
            FieldType::Base(base) => base.java_name().to_string(),
            FieldType::Object(name) => name.replace('/', "."),
            FieldType::Array { element, dims } => {
                let mut out = element.java_name();
                for _ in 0..*dims {
                    out.push_str("[]");
                }
                out
            }
        }
    }

    /// Whether a value of this type takes two operand-stack / local slots.
    pub fn is_wide(&self) -> bool {
        matches!(
            self,
            FieldType::Base(BaseType::Long) | FieldType::Base(BaseType::Double)
        )
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Object(_) | FieldType::Array { .. })
    }

    pub fn is_void(&self) -> bool {
        matches!(self, FieldType::Base(BaseType::Void))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.java_name())
    }
}

/// A parsed method descriptor: `(` parameters `)` return.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    pub ret: FieldType,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<MethodDescriptor, DescriptorError> {
        let mut cursor = Cursor::new(descriptor);
        cursor.expect('(')?;
        let mut parameters = Vec::new();
        while !cursor.eat(')') {
            parameters.push(cursor.field_type(false)?);
        }
        let ret = cursor.field_type(true)?;
        if !cursor.is_at_end() {
            return Err(cursor.error(DescriptorCause::TrailingCharacters));
        }
        Ok(MethodDescriptor { parameters, ret })
    }

    pub fn to_descriptor(&self) -> String {
        let mut out = String::from("(");
        for parameter in &self.parameters {
            parameter.write_descriptor(&mut out);
        }
        out.push(')');
        self.ret.write_descriptor(&mut out);
        out
    }
}

struct Cursor<'a> {
    descriptor: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(descriptor: &'a str) -> Cursor<'a> {
        Cursor {
            descriptor,
            bytes: descriptor.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, cause: DescriptorCause) -> DescriptorError {
        DescriptorError::new(cause, self.descriptor)
    }

    fn is_at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c as u8) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), DescriptorError> {
        match self.peek() {
            Some(b) if b == c as u8 => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(self.error(DescriptorCause::InvalidDescriptor(b as char))),
            None => Err(self.error(DescriptorCause::EmptyDescriptor)),
        }
    }

    fn field_type(&mut self, allow_void: bool) -> Result<FieldType, DescriptorError> {
        let mut dims: usize = 0;
        while self.eat('[') {
            dims += 1;
            if dims > 255 {
                return Err(self.error(DescriptorCause::TooManyArrayDimensions));
            }
        }
        let element = match self.peek() {
            None => return Err(self.error(DescriptorCause::EmptyDescriptor)),
            Some(b'B') => FieldType::Base(BaseType::Byte),
            Some(b'C') => FieldType::Base(BaseType::Char),
            Some(b'D') => FieldType::Base(BaseType::Double),
            Some(b'F') => FieldType::Base(BaseType::Float),
            Some(b'I') => FieldType::Base(BaseType::Int),
            Some(b'J') => FieldType::Base(BaseType::Long),
            Some(b'S') => FieldType::Base(BaseType::Short),
            Some(b'Z') => FieldType::Base(BaseType::Boolean),
            Some(b'V') if allow_void && dims == 0 => FieldType::Base(BaseType::Void),
            Some(b'L') => {
                self.pos += 1;
                let start = self.pos;
                while let Some(b) = self.peek() {
                    if b == b';' {
                        break;
                    }
                    self.pos += 1;
                }
                if self.peek() != Some(b';') {
                    return Err(self.error(DescriptorCause::UnterminatedObjectType));
                }
                let name = &self.descriptor[start..self.pos];
                if name.is_empty() {
                    return Err(self.error(DescriptorCause::InvalidDescriptor(';')));
                }
                self.pos += 1;
                return Ok(wrap_array(FieldType::Object(name.to_string()), dims));
            }
            Some(other) => {
                return Err(self.error(DescriptorCause::InvalidDescriptor(other as char)))
            }
        };
        self.pos += 1;
        Ok(wrap_array(element, dims))
    }
}

fn wrap_array(element: FieldType, dims: usize) -> FieldType {
    if dims == 0 {
        element
    } else {
        FieldType::Array {
            element: Box::new(element),
            dims: dims as u8,
        }
    }
}

/// Best-effort generic signature rendering (the `Signature` attribute).
///
/// These parsers turn a signature into Java source text; any shape they do
/// not understand yields `None` and the caller falls back to the erased
/// descriptor.
pub mod signature {
    /// `Ljava/util/List<Ljava/lang/String;>;` -> `java.util.List<java.lang.String>`
    pub fn field_type(signature: &str) -> Option<String> {
        let mut cursor = SigCursor::new(signature);
        let rendered = cursor.reference_or_base()?;
        cursor.at_end().then_some(rendered)
    }

    /// Renders a method signature as `(parameter types, return type)`.
    /// Type parameter declarations on the method itself are skipped.
    pub fn method_type(signature: &str) -> Option<(Vec<String>, String)> {
        let mut cursor = SigCursor::new(signature);
        if cursor.eat(b'<') {
            cursor.skip_type_parameters()?;
        }
        if !cursor.eat(b'(') {
            return None;
        }
        let mut parameters = Vec::new();
        while !cursor.eat(b')') {
            parameters.push(cursor.reference_or_base()?);
        }
        let ret = cursor.reference_or_base()?;
        // A throws suffix (^) is ignored.
        Some((parameters, ret))
    }

    struct SigCursor<'a> {
        bytes: &'a [u8],
        pos: usize,
    }

    impl<'a> SigCursor<'a> {
        fn new(signature: &'a str) -> SigCursor<'a> {
            SigCursor {
                bytes: signature.as_bytes(),
                pos: 0,
            }
        }

        fn at_end(&self) -> bool {
            self.pos == self.bytes.len()
        }

        fn peek(&self) -> Option<u8> {
            self.bytes.get(self.pos).copied()
        }

        fn eat(&mut self, c: u8) -> bool {
            if self.peek() == Some(c) {
                self.pos += 1;
                true
            } else {
                false
            }
        }

        fn skip_type_parameters(&mut self) -> Option<()> {
            // Already past '<'; consume identifier:bound pairs up to '>'.
            let mut depth = 1usize;
            while depth > 0 {
                match self.peek()? {
                    b'<' => depth += 1,
                    b'>' => depth -= 1,
                    _ => {}
                }
                self.pos += 1;
            }
            Some(())
        }

        fn reference_or_base(&mut self) -> Option<String> {
            let mut dims = 0usize;
            while self.eat(b'[') {
                dims += 1;
            }
            let mut rendered = match self.peek()? {
                b'B' => self.base("byte"),
                b'C' => self.base("char"),
                b'D' => self.base("double"),
                b'F' => self.base("float"),
                b'I' => self.base("int"),
                b'J' => self.base("long"),
                b'S' => self.base("short"),
                b'Z' => self.base("boolean"),
                b'V' => self.base("void"),
                b'T' => {
                    // Type variable: TName;
                    self.pos += 1;
                    let name = self.identifier_until(b';')?;
                    self.pos += 1;
                    name
                }
                b'L' => self.class_type()?,
                b'*' => {
                    self.pos += 1;
                    "?".to_string()
                }
                b'+' => {
                    self.pos += 1;
                    format!("? extends {}", self.reference_or_base()?)
                }
                b'-' => {
                    self.pos += 1;
                    format!("? super {}", self.reference_or_base()?)
                }
                _ => return None,
            };
            for _ in 0..dims {
                rendered.push_str("[]");
            }
            Some(rendered)
        }

        fn base(&mut self, name: &str) -> String {
            self.pos += 1;
            name.to_string()
        }

        fn identifier_until(&mut self, terminator: u8) -> Option<String> {
            let start = self.pos;
            while let Some(b) = self.peek() {
                if b == terminator {
                    let text = std::str::from_utf8(&self.bytes[start..self.pos]).ok()?;
                    return Some(text.to_string());
                }
                self.pos += 1;
            }
            None
        }

        fn class_type(&mut self) -> Option<String> {
            // Past 'L': qualified name, optional <arguments>, optional
            // .Inner suffixes, closing ';'.
            self.pos += 1;
            let mut rendered = String::new();
            loop {
                match self.peek()? {
                    b';' => {
                        self.pos += 1;
                        return Some(rendered);
                    }
                    b'/' => {
                        rendered.push('.');
                        self.pos += 1;
                    }
                    b'.' => {
                        rendered.push('.');
                        self.pos += 1;
                    }
                    b'<' => {
                        self.pos += 1;
                        rendered.push('<');
                        let mut first = true;
                        while self.peek()? != b'>' {
                            if !first {
                                rendered.push_str(", ");
                            }
                            first = false;
                            rendered.push_str(&self.reference_or_base()?);
                        }
                        self.pos += 1;
                        rendered.push('>');
                    }
                    b => {
                        rendered.push(b as char);
                        self.pos += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::descriptor::DescriptorCause;

    #[test]
    fn base_types_parse() {
        assert_eq!(
            FieldType::parse("I").unwrap(),
            FieldType::Base(BaseType::Int)
        );
        assert_eq!(
            FieldType::parse("Z").unwrap(),
            FieldType::Base(BaseType::Boolean)
        );
    }

    #[test]
    fn object_and_array_types_parse() {
        assert_eq!(
            FieldType::parse("Ljava/lang/String;").unwrap(),
            FieldType::object("java/lang/String")
        );
        assert_eq!(
            FieldType::parse("[[I").unwrap(),
            FieldType::Array {
                element: Box::new(FieldType::Base(BaseType::Int)),
                dims: 2
            }
        );
    }

    #[test]
    fn descriptors_round_trip() {
        for descriptor in ["I", "[[J", "Ljava/util/Map;", "[[[Ljava/lang/String;"] {
            assert_eq!(
                FieldType::parse(descriptor).unwrap().to_descriptor(),
                descriptor
            );
        }
        for descriptor in ["()V", "(II)I", "([Ljava/lang/String;)V", "(JD)Ljava/lang/Object;"] {
            assert_eq!(
                MethodDescriptor::parse(descriptor).unwrap().to_descriptor(),
                descriptor
            );
        }
    }

    #[test]
    fn method_descriptor_splits_parameters() {
        let descriptor = MethodDescriptor::parse("(I[JLjava/lang/String;)Z").unwrap();
        assert_eq!(descriptor.parameters.len(), 3);
        assert_eq!(descriptor.ret, FieldType::Base(BaseType::Boolean));
    }

    #[test]
    fn void_is_only_a_return_type() {
        assert!(FieldType::parse("V").is_err());
        assert!(MethodDescriptor::parse("(V)V").is_err());
        assert!(MethodDescriptor::parse("()V").is_ok());
    }

    #[test]
    fn failure_kinds() {
        assert_eq!(
            FieldType::parse("").unwrap_err().cause,
            DescriptorCause::EmptyDescriptor
        );
        assert_eq!(
            FieldType::parse("Ljava/lang/String").unwrap_err().cause,
            DescriptorCause::UnterminatedObjectType
        );
        assert_eq!(
            FieldType::parse("Q").unwrap_err().cause,
            DescriptorCause::InvalidDescriptor('Q')
        );
        let deep = format!("{}I", "[".repeat(256));
        assert_eq!(
            FieldType::parse(&deep).unwrap_err().cause,
            DescriptorCause::TooManyArrayDimensions
        );
        assert_eq!(
            FieldType::parse("II").unwrap_err().cause,
            DescriptorCause::TrailingCharacters
        );
    }

    #[test]
    fn generic_signatures_render_best_effort() {
        assert_eq!(
            signature::field_type("Ljava/util/List<Ljava/lang/String;>;").unwrap(),
            "java.util.List<java.lang.String>"
        );
        assert_eq!(
            signature::field_type("Ljava/util/Map<TK;+Ljava/lang/Number;>;").unwrap(),
            "java.util.Map<K, ? extends java.lang.Number>"
        );
        let (parameters, ret) =
            signature::method_type("(TT;)Ljava/util/List<*>;").unwrap();
        assert_eq!(parameters, vec!["T"]);
        assert_eq!(ret, "java.util.List<?>");
        assert!(signature::field_type("not a signature").is_none());
    }
}
