//! The decompiler driver: runs the whole pipeline over one class file
//! and collects the emitted source, statistics, and diagnostics.

use std::path::Path;
use std::time::{Duration, Instant};

use jloader::access_flags::ClassAccessFlags;
use jloader::class_file::{ClassFile, MethodInfo};
use jloader::constants::{Constant, ConstantPool};
use jloader::descriptors::{signature, BaseType, FieldType, MethodDescriptor};
use log::{debug, warn};

use crate::ast::{
    CallKind, ClassDecl, ClassKind, Expression, FieldDecl, LiteralValue, MethodDecl, Parameter,
    Statement,
};
use crate::cfg::ControlFlowGraph;
use crate::emit;
use crate::errors::decompile::{DecompileCause, DecompileError};
use crate::lift::Lifter;
use crate::ops::CodeListing;
use crate::structure::structure_method;

/// Knobs for one decompilation run. Everything has a default; the record
/// is plain data so callers can build it with struct update syntax.
#[derive(Debug, Clone)]
pub struct Options {
    /// Append `// line N` comments from the LineNumberTable.
    pub emit_line_comments: bool,
    /// Use LocalVariableTable names instead of `var<slot>`.
    pub recover_variable_names: bool,
    /// Fold `new` + `dup` + `<init>` into a constructor call.
    pub fold_constructor_new: bool,
    /// Recognize init/condition/update loops as `for` statements.
    pub prefer_for_loops: bool,
    /// Reject inputs larger than this many bytes.
    pub max_bytes: usize,
    /// One indentation step.
    pub indent_unit: String,
    /// Cooperative cancellation, checked between methods.
    pub deadline: Option<Instant>,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            emit_line_comments: false,
            recover_variable_names: true,
            fold_constructor_new: true,
            prefer_for_loops: true,
            max_bytes: 64 * 1024 * 1024,
            indent_unit: "    ".to_string(),
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub pc: Option<u32>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub methods: usize,
    pub instructions: usize,
    pub elapsed: Duration,
}

/// The result of a successful run: source text plus the tree it was
/// printed from, with whatever was diagnosed along the way.
#[derive(Debug)]
pub struct Document {
    pub source_text: String,
    pub class: ClassDecl,
    pub stats: Stats,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn decompile_file<P: AsRef<Path>>(
    path: P,
    options: &Options,
) -> Result<Document, DecompileError> {
    let metadata = std::fs::metadata(path.as_ref())?;
    if metadata.len() > options.max_bytes as u64 {
        return Err(DecompileError::new(
            DecompileCause::FileTooLarge {
                size: metadata.len() as usize,
                limit: options.max_bytes,
            },
            &path.as_ref().display().to_string(),
        ));
    }
    let bytes = std::fs::read(path.as_ref())?;
    decompile_bytes(&bytes, options)
}

pub fn decompile_bytes(bytes: &[u8], options: &Options) -> Result<Document, DecompileError> {
    let started = Instant::now();
    if bytes.len() > options.max_bytes {
        return Err(DecompileError::new(
            DecompileCause::FileTooLarge {
                size: bytes.len(),
                limit: options.max_bytes,
            },
            "input buffer",
        ));
    }
    let class_file = ClassFile::from_bytes(bytes)?;
    let mut diagnostics = Vec::new();
    let mut stats = Stats::default();
    let class = build_class(&class_file, options, &mut stats, &mut diagnostics)?;
    let source_text = emit::emit_class(&class, options, &mut diagnostics);
    stats.methods = class.methods.len();
    stats.elapsed = started.elapsed();
    debug!(
        "decompiled {} ({} methods, {} instructions) in {:?}",
        class.name, stats.methods, stats.instructions, stats.elapsed
    );
    Ok(Document {
        source_text,
        class,
        stats,
        diagnostics,
    })
}

fn build_class(
    class_file: &ClassFile,
    options: &Options,
    stats: &mut Stats,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<ClassDecl, DecompileError> {
    let pool = &class_file.constant_pool;
    let name = class_file.class_name()?.to_string();
    let super_class = class_file.super_name()?.map(str::to_string);
    let kind = if class_file
        .access_flags
        .contains(&ClassAccessFlags::AccAnnotation)
    {
        ClassKind::Annotation
    } else if class_file.access_flags.contains(&ClassAccessFlags::AccEnum) {
        ClassKind::Enum
    } else if class_file.is_interface() {
        ClassKind::Interface
    } else {
        ClassKind::Class
    };
    let interfaces = class_file
        .interfaces
        .iter()
        .map(|&i| pool.class_name(i).map(str::to_string))
        .collect::<Result<Vec<_>, _>>()?;

    let mut fields = Vec::with_capacity(class_file.fields.len());
    for field in &class_file.fields {
        // Compiler-synthesized members have no source counterpart.
        if field.is_synthetic() {
            continue;
        }
        let ty = field.field_type(pool)?;
        let generic = field
            .signature_index()
            .and_then(|i| pool.utf8(i).ok())
            .and_then(signature::field_type);
        let init = field
            .constant_value()
            .and_then(|i| constant_initializer(pool, i, &ty));
        fields.push(FieldDecl {
            modifiers: field.access_flags.clone(),
            name: field.name(pool)?.to_string(),
            ty,
            generic,
            init,
            deprecated: field.is_deprecated(),
        });
    }

    let super_name = super_class.clone().unwrap_or_default();
    let mut methods = Vec::with_capacity(class_file.methods.len());
    for method in &class_file.methods {
        if method.is_synthetic()
            || method
                .access_flags
                .contains(&jloader::access_flags::MethodAccessFlags::AccBridge)
        {
            continue;
        }
        if let Some(deadline) = options.deadline {
            if Instant::now() > deadline {
                return Err(DecompileError::new(
                    DecompileCause::DeadlineExpired,
                    &format!("while decompiling {name}"),
                ));
            }
        }
        methods.push(build_method(
            class_file,
            method,
            &name,
            &super_name,
            options,
            stats,
            diagnostics,
        )?);
    }

    Ok(ClassDecl {
        kind,
        modifiers: class_file.access_flags.clone(),
        name,
        super_class,
        interfaces,
        fields,
        methods,
        source_file: class_file.source_file().map(str::to_string),
        deprecated: class_file.is_deprecated(),
    })
}

fn build_method(
    class_file: &ClassFile,
    method: &MethodInfo,
    class_name: &str,
    super_name: &str,
    options: &Options,
    stats: &mut Stats,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<MethodDecl, DecompileError> {
    let pool = &class_file.constant_pool;
    let name = method.name(pool)?.to_string();
    let descriptor = method.descriptor(pool)?;
    let generic = method
        .signature_index()
        .and_then(|i| pool.utf8(i).ok())
        .and_then(signature::method_type);
    let throws = method
        .exceptions()
        .iter()
        .map(|&i| pool.class_name(i).map(str::to_string))
        .collect::<Result<Vec<_>, _>>()?;
    let parameters = parameter_list(method, &descriptor, options, pool, generic.as_ref());
    let generic_ret = generic.map(|(_, ret)| ret);
    let line_numbers = method
        .code()
        .and_then(|c| c.line_number_table())
        .map(|t| {
            t.entries
                .iter()
                .map(|e| (u32::from(e.start_pc), e.line_number))
                .collect()
        })
        .unwrap_or_default();

    let body = if method.is_abstract() || method.is_native() {
        None
    } else {
        match lift_body(
            class_file,
            method,
            class_name,
            super_name,
            &name,
            &descriptor,
            options,
            stats,
            diagnostics,
        ) {
            Ok(statements) => Some(statements),
            Err(e) => {
                warn!("stubbing {class_name}.{name}: {e}");
                diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    pc: None,
                    message: format!("method {name} could not be decompiled: {}", e.cause),
                });
                Some(vec![Statement::Comment(format!(
                    "method {name} could not be decompiled: {}",
                    e.cause
                ))])
            }
        }
    };

    Ok(MethodDecl {
        modifiers: method.access_flags.clone(),
        is_constructor: name == "<init>",
        is_static_initializer: name == "<clinit>",
        name,
        ret: descriptor.ret.clone(),
        generic_ret,
        parameters,
        throws,
        body,
        deprecated: method.is_deprecated(),
        line_numbers,
    })
}

#[allow(clippy::too_many_arguments)]
fn lift_body(
    class_file: &ClassFile,
    method: &MethodInfo,
    class_name: &str,
    super_name: &str,
    method_name: &str,
    descriptor: &MethodDescriptor,
    options: &Options,
    stats: &mut Stats,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Vec<Statement>, crate::errors::bytecode::BytecodeError> {
    let pool = &class_file.constant_pool;
    let code = method
        .code()
        .expect("callers check for a Code attribute first");
    let listing = CodeListing::decode(&code.code)?;
    stats.instructions += listing.instructions.len();
    let cfg = ControlFlowGraph::build(&listing, &code.exception_table)?;
    let lifter = Lifter::new(
        pool,
        class_name,
        super_name,
        code,
        &listing,
        &cfg,
        options,
        diagnostics,
        method.is_static(),
        method_name == "<init>",
    );
    let lifted = lifter.lift(descriptor)?;
    let mut statements =
        structure_method(&cfg, &lifted, &code.exception_table, pool, options, diagnostics);
    if method_name == "<init>" {
        strip_default_super_call(&mut statements);
    }
    // The compiler's mandatory final `return` of a void body stays
    // implicit in source.
    if descriptor.ret.is_void()
        && matches!(statements.last(), Some(Statement::Return { value: None, .. }))
    {
        statements.pop();
    }
    Ok(statements)
}

/// The implicit `super();` every constructor starts with is not shown.
fn strip_default_super_call(statements: &mut Vec<Statement>) {
    let is_default_super = matches!(
        statements.first(),
        Some(Statement::Expr {
            expr: Expression::Call {
                kind: CallKind::Special,
                receiver: Some(receiver),
                name,
                arguments,
                ..
            },
            ..
        }) if name == "<init>" && arguments.is_empty()
            && matches!(receiver.as_ref(), Expression::Super { .. })
    );
    if is_default_super {
        statements.remove(0);
    }
}

fn parameter_list(
    method: &MethodInfo,
    descriptor: &MethodDescriptor,
    options: &Options,
    pool: &ConstantPool,
    generic: Option<&(Vec<String>, String)>,
) -> Vec<Parameter> {
    let generic_parameters = generic
        .filter(|(parameters, _)| parameters.len() == descriptor.parameters.len())
        .map(|(parameters, _)| parameters.as_slice());
    let mut slot: u16 = if method.is_static() { 0 } else { 1 };
    let mut out = Vec::with_capacity(descriptor.parameters.len());
    for (index, ty) in descriptor.parameters.iter().enumerate() {
        let name = if options.recover_variable_names {
            method
                .code()
                .and_then(|c| c.local_variable(slot, 0))
                .and_then(|e| pool.utf8(e.name_index).ok())
                .map(str::to_string)
        } else {
            None
        };
        out.push(Parameter {
            name: name.unwrap_or_else(|| format!("var{slot}")),
            ty: ty.clone(),
            generic: generic_parameters.map(|g| g[index].clone()),
        });
        slot += if ty.is_wide() { 2 } else { 1 };
    }
    out
}

/// A `ConstantValue` attribute as a field initializer expression.
fn constant_initializer(pool: &ConstantPool, index: u16, ty: &FieldType) -> Option<Expression> {
    let value = match pool.get(index).ok()? {
        Constant::Integer(i) => {
            if *ty == FieldType::Base(BaseType::Boolean) {
                LiteralValue::Bool(i.value != 0)
            } else {
                LiteralValue::Int(i.value)
            }
        }
        Constant::Long(l) => LiteralValue::Long(l.value),
        Constant::Float(f) => LiteralValue::Float(f.value),
        Constant::Double(d) => LiteralValue::Double(d.value),
        Constant::String(_) => LiteralValue::Str(pool.string(index).ok()?.to_string()),
        _ => return None,
    };
    Some(Expression::Literal { value })
}
