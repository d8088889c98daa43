//! In-test builder for synthetic class file images, so the suite carries
//! its own inputs instead of checked-in binaries. The encoding follows
//! the JVM class file format at version 52.0 (Java 8).
#![allow(dead_code)]

use std::collections::HashMap;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;

pub struct ClassImage {
    entries: Vec<(Vec<u8>, bool)>,
    next_slot: u16,
    utf8_cache: HashMap<String, u16>,
    class_cache: HashMap<String, u16>,
    string_cache: HashMap<String, u16>,
    nat_cache: HashMap<(String, String), u16>,
    method_ref_cache: HashMap<(String, String, String), u16>,
    field_ref_cache: HashMap<(String, String, String), u16>,
    pub access_flags: u16,
    pub major_version: u16,
    this_class: u16,
    super_class: u16,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
}

#[derive(Default)]
pub struct MethodBody {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    /// `(start_pc, end_pc, handler_pc, catch_type_index)`
    pub exceptions: Vec<(u16, u16, u16, u16)>,
    /// `(start_pc, length, name, descriptor, slot)`
    pub locals: Vec<(u16, u16, &'static str, &'static str, u16)>,
}

pub fn hi(index: u16) -> u8 {
    (index >> 8) as u8
}

pub fn lo(index: u16) -> u8 {
    (index & 0xFF) as u8
}

impl ClassImage {
    pub fn new(this: &str, super_name: &str) -> ClassImage {
        let mut image = ClassImage {
            entries: Vec::new(),
            next_slot: 1,
            utf8_cache: HashMap::new(),
            class_cache: HashMap::new(),
            string_cache: HashMap::new(),
            nat_cache: HashMap::new(),
            method_ref_cache: HashMap::new(),
            field_ref_cache: HashMap::new(),
            access_flags: 0x0021,
            major_version: 52,
            this_class: 0,
            super_class: 0,
            fields: Vec::new(),
            methods: Vec::new(),
        };
        image.this_class = image.class(this);
        image.super_class = image.class(super_name);
        image
    }

    fn push_entry(&mut self, bytes: Vec<u8>, wide: bool) -> u16 {
        let slot = self.next_slot;
        self.entries.push((bytes, wide));
        self.next_slot += if wide { 2 } else { 1 };
        slot
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        if let Some(&slot) = self.utf8_cache.get(text) {
            return slot;
        }
        let mut bytes = vec![1];
        bytes.extend((text.len() as u16).to_be_bytes());
        bytes.extend(text.as_bytes());
        let slot = self.push_entry(bytes, false);
        self.utf8_cache.insert(text.to_string(), slot);
        slot
    }

    pub fn class(&mut self, name: &str) -> u16 {
        if let Some(&slot) = self.class_cache.get(name) {
            return slot;
        }
        let name_index = self.utf8(name);
        let mut bytes = vec![7];
        bytes.extend(name_index.to_be_bytes());
        let slot = self.push_entry(bytes, false);
        self.class_cache.insert(name.to_string(), slot);
        slot
    }

    pub fn string(&mut self, text: &str) -> u16 {
        if let Some(&slot) = self.string_cache.get(text) {
            return slot;
        }
        let utf8 = self.utf8(text);
        let mut bytes = vec![8];
        bytes.extend(utf8.to_be_bytes());
        let slot = self.push_entry(bytes, false);
        self.string_cache.insert(text.to_string(), slot);
        slot
    }

    pub fn int_const(&mut self, value: i32) -> u16 {
        let mut bytes = vec![3];
        bytes.extend(value.to_be_bytes());
        self.push_entry(bytes, false)
    }

    pub fn long_const(&mut self, value: i64) -> u16 {
        let mut bytes = vec![5];
        bytes.extend(value.to_be_bytes());
        self.push_entry(bytes, true)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let key = (name.to_string(), descriptor.to_string());
        if let Some(&slot) = self.nat_cache.get(&key) {
            return slot;
        }
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut bytes = vec![12];
        bytes.extend(name_index.to_be_bytes());
        bytes.extend(descriptor_index.to_be_bytes());
        let slot = self.push_entry(bytes, false);
        self.nat_cache.insert(key, slot);
        slot
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let key = (owner.to_string(), name.to_string(), descriptor.to_string());
        if let Some(&slot) = self.method_ref_cache.get(&key) {
            return slot;
        }
        let class_index = self.class(owner);
        let nat_index = self.name_and_type(name, descriptor);
        let mut bytes = vec![10];
        bytes.extend(class_index.to_be_bytes());
        bytes.extend(nat_index.to_be_bytes());
        let slot = self.push_entry(bytes, false);
        self.method_ref_cache.insert(key, slot);
        slot
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let key = (owner.to_string(), name.to_string(), descriptor.to_string());
        if let Some(&slot) = self.field_ref_cache.get(&key) {
            return slot;
        }
        let class_index = self.class(owner);
        let nat_index = self.name_and_type(name, descriptor);
        let mut bytes = vec![9];
        bytes.extend(class_index.to_be_bytes());
        bytes.extend(nat_index.to_be_bytes());
        let slot = self.push_entry(bytes, false);
        self.field_ref_cache.insert(key, slot);
        slot
    }

    pub fn method(&mut self, flags: u16, name: &str, descriptor: &str, body: MethodBody) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let code_name = self.utf8("Code");
        let lvt_name = if body.locals.is_empty() {
            0
        } else {
            self.utf8("LocalVariableTable")
        };
        let mut locals_encoded: Vec<u8> = Vec::new();
        for (start, length, local_name, local_descriptor, slot) in &body.locals {
            let local_name = self.utf8(local_name);
            let local_descriptor = self.utf8(local_descriptor);
            locals_encoded.extend(start.to_be_bytes());
            locals_encoded.extend(length.to_be_bytes());
            locals_encoded.extend(local_name.to_be_bytes());
            locals_encoded.extend(local_descriptor.to_be_bytes());
            locals_encoded.extend(slot.to_be_bytes());
        }

        let mut payload: Vec<u8> = Vec::new();
        payload.extend(body.max_stack.to_be_bytes());
        payload.extend(body.max_locals.to_be_bytes());
        payload.extend((body.code.len() as u32).to_be_bytes());
        payload.extend(&body.code);
        payload.extend((body.exceptions.len() as u16).to_be_bytes());
        for (start, end, handler, catch_type) in &body.exceptions {
            payload.extend(start.to_be_bytes());
            payload.extend(end.to_be_bytes());
            payload.extend(handler.to_be_bytes());
            payload.extend(catch_type.to_be_bytes());
        }
        if body.locals.is_empty() {
            payload.extend(0u16.to_be_bytes());
        } else {
            payload.extend(1u16.to_be_bytes());
            payload.extend(lvt_name.to_be_bytes());
            payload.extend(((2 + locals_encoded.len()) as u32).to_be_bytes());
            payload.extend((body.locals.len() as u16).to_be_bytes());
            payload.extend(&locals_encoded);
        }

        let mut method: Vec<u8> = Vec::new();
        method.extend(flags.to_be_bytes());
        method.extend(name_index.to_be_bytes());
        method.extend(descriptor_index.to_be_bytes());
        method.extend(1u16.to_be_bytes());
        method.extend(code_name.to_be_bytes());
        method.extend((payload.len() as u32).to_be_bytes());
        method.extend(&payload);
        self.methods.push(method);
    }

    /// A method with no attributes at all (abstract/native shapes, or
    /// deliberately malformed concrete methods).
    pub fn method_without_code(&mut self, flags: u16, name: &str, descriptor: &str) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut method: Vec<u8> = Vec::new();
        method.extend(flags.to_be_bytes());
        method.extend(name_index.to_be_bytes());
        method.extend(descriptor_index.to_be_bytes());
        method.extend(0u16.to_be_bytes());
        self.methods.push(method);
    }

    pub fn field(&mut self, flags: u16, name: &str, descriptor: &str, constant: Option<u16>) {
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

    pub fn build(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend(0xCAFE_BABEu32.to_be_bytes());
        bytes.extend(0u16.to_be_bytes());
        bytes.extend(self.major_version.to_be_bytes());
        bytes.extend(self.next_slot.to_be_bytes());
        for (entry, _) in &self.entries {
            bytes.extend(entry);
        }
        bytes.extend(self.access_flags.to_be_bytes());
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
