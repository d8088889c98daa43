//! Pretty-printer from the recovered AST to Java source text.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use jloader::access_flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};
use jloader::descriptors::{BaseType, FieldType};

use crate::ast::{
    walk_statements, BinaryOp, CallKind, ClassDecl, ClassKind, Expression, FieldDecl,
    LiteralValue, MethodDecl, Statement, SwitchCase, UnaryOp, Visitor,
};
use crate::decompiler::{Diagnostic, Options, Severity};

const RESERVED_WORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally", "float",
    "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "package", "private", "protected", "public", "return", "short", "static",
    "strictfp", "super", "switch", "synchronized", "this", "throw", "throws", "transient", "try",
    "void", "volatile", "while",
];

/// Renders one class declaration as Java source.
pub fn emit_class(
    class: &ClassDecl,
    options: &Options,
    diagnostics: &mut Vec<Diagnostic>,
) -> String {
    let mut emitter = Emitter::new(class, options, diagnostics);
    emitter.emit();
    emitter.out
}

struct Emitter<'a> {
    class: &'a ClassDecl,
    options: &'a Options,
    diagnostics: &'a mut Vec<Diagnostic>,
    out: String,
    depth: usize,
    /// simple name -> fully qualified dotted name, for referenced types
    /// that resolve without qualification.
    imports: BTreeMap<String, String>,
    escapes_reported: HashSet<String>,
    current_ret_void: bool,
    current_lines: Vec<(u32, u16)>,
}

impl<'a> Emitter<'a> {
    fn new(
        class: &'a ClassDecl,
        options: &'a Options,
        diagnostics: &'a mut Vec<Diagnostic>,
    ) -> Emitter<'a> {
        Emitter {
            class,
            options,
            diagnostics,
            out: String::new(),
            depth: 0,
            imports: BTreeMap::new(),
            escapes_reported: HashSet::new(),
            current_ret_void: false,
            current_lines: Vec::new(),
        }
    }

    fn emit(&mut self) {
        self.collect_imports();
        if let Some(package) = self.class.package() {
            self.line(&format!("package {};", package.replace('/', ".")));
            self.blank();
        }
        if !self.imports.is_empty() {
            let imports: Vec<String> = self.imports.values().cloned().collect();
            for import in imports {
                self.line(&format!("import {import};"));
            }
            self.blank();
        }
        self.emit_class_header();
        self.depth += 1;
        let mut first = true;
        for field in &self.class.fields {
            if !first {
                self.blank();
            }
            first = false;
            self.emit_field(field);
        }
        for method in &self.class.methods {
            if !first {
                self.blank();
            }
            first = false;
            self.emit_method(method);
        }
        self.depth -= 1;
        self.line("}");
    }

    fn emit_class_header(&mut self) {
        if self.class.deprecated {
            self.line("@Deprecated");
        }
        let mut header = String::new();
        for modifier in class_modifiers(&self.class.modifiers, self.class.kind) {
            header.push_str(modifier);
            header.push(' ');
        }
        header.push_str(match self.class.kind {
            ClassKind::Class => "class",
            ClassKind::Interface => "interface",
            ClassKind::Enum => "enum",
            ClassKind::Annotation => "@interface",
        });
        header.push(' ');
        header.push_str(self.class.simple_name());
        if let Some(super_class) = &self.class.super_class {
            let implicit = super_class == "java/lang/Object"
                || (self.class.kind == ClassKind::Enum && super_class == "java/lang/Enum");
            if !implicit {
                header.push_str(" extends ");
                header.push_str(&self.class_ref(super_class));
            }
        }
        if !self.class.interfaces.is_empty() {
            header.push_str(if self.class.kind == ClassKind::Interface {
                " extends "
            } else {
                " implements "
            });
            let rendered: Vec<String> = self
                .class
                .interfaces
                .iter()
                .map(|i| self.class_ref(i))
                .collect();
            header.push_str(&rendered.join(", "));
        }
        header.push_str(" {");
        self.line(&header);
    }

    fn emit_field(&mut self, field: &FieldDecl) {
        if field.deprecated {
            self.line("@Deprecated");
        }
        let mut text = String::new();
        for modifier in field_modifiers(&field.modifiers) {
            text.push_str(modifier);
            text.push(' ');
        }
        match &field.generic {
            Some(generic) => text.push_str(generic),
            None => text.push_str(&self.type_name(&field.ty)),
        }
        text.push(' ');
        text.push_str(&self.identifier(&field.name));
        if let Some(init) = &field.init {
            text.push_str(" = ");
            text.push_str(&self.expr(init, 0));
        }
        text.push(';');
        self.line(&text);
    }

    fn emit_method(&mut self, method: &MethodDecl) {
        if method.deprecated {
            self.line("@Deprecated");
        }
        self.current_ret_void = method.ret.is_void();
        self.current_lines = method.line_numbers.clone();
        let mut header = String::new();
        if method.is_static_initializer {
            header.push_str("static");
        } else {
            for modifier in method_modifiers(&method.modifiers, self.class.kind) {
                header.push_str(modifier);
                header.push(' ');
            }
            if method.is_constructor {
                header.push_str(self.class.simple_name());
            } else {
                match &method.generic_ret {
                    Some(generic) => header.push_str(generic),
                    None => header.push_str(&self.type_name(&method.ret)),
                }
                header.push(' ');
                header.push_str(&self.identifier(&method.name));
            }
            header.push('(');
            let parameters: Vec<String> = method
                .parameters
                .iter()
                .map(|p| {
                    let ty = match &p.generic {
                        Some(generic) => generic.clone(),
                        None => self.type_name(&p.ty),
                    };
                    format!("{ty} {}", self.identifier(&p.name))
                })
                .collect();
            header.push_str(&parameters.join(", "));
            header.push(')');
            if !method.throws.is_empty() {
                header.push_str(" throws ");
                let rendered: Vec<String> =
                    method.throws.iter().map(|t| self.class_ref(t)).collect();
                header.push_str(&rendered.join(", "));
            }
        }
        match &method.body {
            None => {
                header.push(';');
                self.line(&header);
            }
            Some(body) => {
                header.push_str(" {");
                self.line(&header);
                self.depth += 1;
                let body = body.clone();
                self.emit_statements(&body);
                self.depth -= 1;
                self.line("}");
            }
        }
    }

    fn emit_statements(&mut self, statements: &[Statement]) {
        for statement in statements {
            self.emit_statement(statement);
        }
    }

    fn emit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Block(body) => {
                self.line("{");
                self.depth += 1;
                self.emit_statements(body);
                self.depth -= 1;
                self.line("}");
            }
            Statement::LocalDecl { name, ty, init, pc } => {
                let mut text = format!("{} {}", self.type_name(ty), self.identifier(name));
                if let Some(init) = init {
                    text.push_str(" = ");
                    text.push_str(&self.expr(init, 0));
                }
                text.push(';');
                self.statement_line(&text, *pc);
            }
            Statement::Expr { expr, pc } => {
                let text = format!("{};", self.expr(expr, 0));
                self.statement_line(&text, *pc);
            }
            Statement::Assign {
                target,
                value,
                op,
                pc,
            } => {
                let text = format!("{};", self.assignment(target, value, *op));
                self.statement_line(&text, *pc);
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                pc,
            } => self.emit_if(condition, then_branch, else_branch.as_deref(), *pc),
            Statement::While {
                condition, body, ..
            } => {
                let header = format!("while ({}) {{", self.expr(condition, 0));
                self.line(&header);
                self.depth += 1;
                self.emit_statements(body);
                self.depth -= 1;
                self.line("}");
            }
            Statement::DoWhile { body, condition, .. } => {
                self.line("do {");
                self.depth += 1;
                self.emit_statements(body);
                self.depth -= 1;
                let footer = format!("}} while ({});", self.expr(condition, 0));
                self.line(&footer);
            }
            Statement::For {
                init,
                condition,
                update,
                body,
                ..
            } => {
                let init_text = init
                    .as_deref()
                    .map(|s| self.inline_statement(s))
                    .unwrap_or_default();
                let condition_text = condition
                    .as_ref()
                    .map(|c| self.expr(c, 0))
                    .unwrap_or_default();
                let update_text = update
                    .as_deref()
                    .map(|s| self.inline_statement(s))
                    .unwrap_or_default();
                self.line(&format!(
                    "for ({init_text}; {condition_text}; {update_text}) {{"
                ));
                self.depth += 1;
                self.emit_statements(body);
                self.depth -= 1;
                self.line("}");
            }
            Statement::Switch {
                selector, cases, pc,
            } => self.emit_switch(selector, cases, *pc),
            Statement::Break { label } => match label {
                Some(label) => self.line(&format!("break {label};")),
                None => self.line("break;"),
            },
            Statement::Continue { label } => match label {
                Some(label) => self.line(&format!("continue {label};")),
                None => self.line("continue;"),
            },
            Statement::Return { value, pc } => {
                let text = match value {
                    Some(value) if !self.current_ret_void => {
                        format!("return {};", self.expr(value, 0))
                    }
                    Some(_) => {
                        // A value never escapes a void method.
                        self.diagnostics.push(Diagnostic {
                            severity: Severity::Warning,
                            pc: *pc,
                            message: "dropped return value in void method".to_string(),
                        });
                        "return;".to_string()
                    }
                    None => "return;".to_string(),
                };
                self.statement_line(&text, *pc);
            }
            Statement::Throw { value, pc } => {
                let text = format!("throw {};", self.expr(value, 0));
                self.statement_line(&text, *pc);
            }
            Statement::Try {
                body,
                catches,
                finally,
            } => {
                self.line("try {");
                self.depth += 1;
                self.emit_statements(body);
                self.depth -= 1;
                for catch in catches {
                    let header = format!(
                        "}} catch ({} {}) {{",
                        self.class_ref(&catch.exception_type),
                        self.identifier(&catch.name)
                    );
                    self.line(&header);
                    self.depth += 1;
                    self.emit_statements(&catch.body);
                    self.depth -= 1;
                }
                if let Some(finally) = finally {
                    self.line("} finally {");
                    self.depth += 1;
                    self.emit_statements(finally);
                    self.depth -= 1;
                }
                self.line("}");
            }
            Statement::Synchronized { monitor, body } => {
                let header = format!("synchronized ({}) {{", self.expr(monitor, 0));
                self.line(&header);
                self.depth += 1;
                self.emit_statements(body);
                self.depth -= 1;
                self.line("}");
            }
            Statement::Labeled { label, body } => {
                self.line(&format!("{label}:"));
                self.emit_statement(body);
            }
            Statement::MonitorEnter(_) => self.line("// monitorenter"),
            Statement::MonitorExit(_) => self.line("// monitorexit"),
            Statement::Comment(text) => self.line(&format!("// {text}")),
        }
    }

    fn emit_if(
        &mut self,
        condition: &Expression,
        then_branch: &[Statement],
        else_branch: Option<&[Statement]>,
        pc: Option<u32>,
    ) {
        let header = format!("if ({}) {{", self.expr(condition, 0));
        self.statement_line(&header, pc);
        self.depth += 1;
        self.emit_statements(then_branch);
        self.depth -= 1;
        match else_branch {
            None => self.line("}"),
            Some([Statement::If {
                condition,
                then_branch,
                else_branch,
                pc,
            }]) => {
                // else-if chains stay flat.
                let text = format!("}} else if ({}) {{", self.expr(condition, 0));
                self.line(&text);
                self.depth += 1;
                self.emit_statements(then_branch);
                self.depth -= 1;
                match else_branch {
                    None => self.line("}"),
                    Some(else_branch) => {
                        let else_branch = else_branch.clone();
                        let _ = pc;
                        self.emit_else(&else_branch);
                    }
                }
            }
            Some(else_branch) => self.emit_else(else_branch),
        }
    }

    fn emit_else(&mut self, else_branch: &[Statement]) {
        self.line("} else {");
        self.depth += 1;
        self.emit_statements(else_branch);
        self.depth -= 1;
        self.line("}");
    }

    fn emit_switch(&mut self, selector: &Expression, cases: &[SwitchCase], pc: Option<u32>) {
        let header = format!("switch ({}) {{", self.expr(selector, 0));
        self.statement_line(&header, pc);
        self.depth += 1;
        for case in cases {
            for label in &case.labels {
                match label {
                    Some(value) => self.line(&format!("case {value}:")),
                    None => self.line("default:"),
                }
            }
            self.depth += 1;
            self.emit_statements(&case.body);
            if case.falls_through {
                self.line("// fall through");
            }
            self.depth -= 1;
        }
        self.depth -= 1;
        self.line("}");
    }

    /// Statement text without the trailing `;`, for `for` headers.
    fn inline_statement(&mut self, statement: &Statement) -> String {
        match statement {
            Statement::LocalDecl {
                name,
                ty,
                init: Some(init),
                ..
            } => format!(
                "{} {} = {}",
                self.type_name(ty),
                self.identifier(name),
                self.expr(init, 0)
            ),
            Statement::LocalDecl { name, ty, .. } => {
                format!("{} {}", self.type_name(ty), self.identifier(name))
            }
            Statement::Assign {
                target, value, op, ..
            } => self.assignment(target, value, *op),
            Statement::Expr { expr, .. } => self.expr(expr, 0),
            other => {
                self.diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    pc: None,
                    message: "unprintable statement in for header".to_string(),
                });
                let _ = other;
                String::new()
            }
        }
    }

    fn assignment(
        &mut self,
        target: &Expression,
        value: &Expression,
        op: Option<BinaryOp>,
    ) -> String {
        let target_text = self.expr(target, 13);
        match op {
            None => format!("{target_text} = {}", self.expr(value, 0)),
            Some(BinaryOp::Add)
                if matches!(
                    value,
                    Expression::Literal {
                        value: LiteralValue::Int(1)
                    }
                ) =>
            {
                format!("{target_text}++")
            }
            Some(BinaryOp::Sub)
                if matches!(
                    value,
                    Expression::Literal {
                        value: LiteralValue::Int(1)
                    }
                ) =>
            {
                format!("{target_text}--")
            }
            Some(op) => format!("{target_text} {}= {}", op.symbol(), self.expr(value, 0)),
        }
    }

    fn statement_line(&mut self, text: &str, pc: Option<u32>) {
        if self.options.emit_line_comments {
            if let Some(pc) = pc {
                let annotated = match line_for(&self.current_lines, pc) {
                    Some(line) => format!("{text} // line {line}"),
                    None => format!("{text} // {pc}"),
                };
                self.line(&annotated);
                return;
            }
        }
        self.line(text);
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(&self.options.indent_unit);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    // ---- expressions ----

    fn expr(&mut self, expression: &Expression, parent_prec: u8) -> String {
        let (text, prec) = self.expr_prec(expression);
        if prec < parent_prec {
            format!("({text})")
        } else {
            text
        }
    }

    fn expr_prec(&mut self, expression: &Expression) -> (String, u8) {
        match expression {
            Expression::Literal { value } => (self.literal(value), 14),
            Expression::Local { name, .. } => (self.identifier(name), 14),
            Expression::This { .. } => ("this".to_string(), 14),
            Expression::Super { .. } => ("super".to_string(), 14),
            Expression::CaughtException => ("caught".to_string(), 14),
            Expression::FieldAccess {
                receiver,
                owner,
                name,
                ..
            } => {
                let name = self.identifier(name);
                let text = match receiver {
                    None => format!("{}.{name}", self.class_ref(owner)),
                    Some(receiver) => match receiver.as_ref() {
                        Expression::This { .. } => format!("this.{name}"),
                        other => format!("{}.{name}", self.expr(other, 14)),
                    },
                };
                (text, 14)
            }
            Expression::ArrayAccess { array, index, .. } => (
                format!("{}[{}]", self.expr(array, 14), self.expr(index, 0)),
                14,
            ),
            Expression::ArrayLength { array } => {
                (format!("{}.length", self.expr(array, 14)), 14)
            }
            Expression::Call {
                kind,
                receiver,
                owner,
                name,
                arguments,
                ..
            } => (self.call(*kind, receiver.as_deref(), owner, name, arguments), 14),
            Expression::New {
                class, arguments, ..
            } => {
                let rendered: Vec<String> =
                    arguments.iter().map(|a| self.expr(a, 0)).collect();
                (
                    format!("new {}({})", self.class_ref(class), rendered.join(", ")),
                    13,
                )
            }
            Expression::NewArray {
                element,
                dims,
                extra_dims,
            } => {
                let mut text = format!("new {}", self.type_name(element));
                for dim in dims {
                    text.push('[');
                    text.push_str(&self.expr(dim, 0));
                    text.push(']');
                }
                for _ in 0..*extra_dims {
                    text.push_str("[]");
                }
                (text, 13)
            }
            Expression::Cast { target, value } => (
                format!("({}) {}", self.type_name(target), self.expr(value, 12)),
                12,
            ),
            Expression::InstanceOf { value, target } => (
                format!(
                    "{} instanceof {}",
                    self.expr(value, 8),
                    self.class_ref(target)
                ),
                8,
            ),
            Expression::Unary { op, value, .. } => {
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                let mut operand = self.expr(value, 12);
                if *op == UnaryOp::Neg && operand.starts_with('-') {
                    // Keep `-(-x)` from tokenizing as a decrement.
                    operand = format!("({operand})");
                }
                (format!("{symbol}{operand}"), 12)
            }
            Expression::Binary { op, lhs, rhs, .. } => {
                let prec = binary_prec(*op);
                let text = format!(
                    "{} {} {}",
                    self.expr(lhs, prec),
                    op.symbol(),
                    self.expr(rhs, prec + 1)
                );
                (text, prec)
            }
            Expression::Compare { lhs, rhs, .. } => {
                // Raw comparison value that never met its branch.
                let lhs = self.expr(lhs, 8);
                let rhs = self.expr(rhs, 8);
                (
                    format!("({lhs} == {rhs} ? 0 : ({lhs} < {rhs} ? -1 : 1))"),
                    14,
                )
            }
            Expression::Ternary {
                condition,
                then_value,
                else_value,
            } => {
                let text = format!(
                    "{} ? {} : {}",
                    self.expr(condition, 2),
                    self.expr(then_value, 1),
                    self.expr(else_value, 1)
                );
                (text, 1)
            }
        }
    }

    fn call(
        &mut self,
        kind: CallKind,
        receiver: Option<&Expression>,
        owner: &str,
        name: &str,
        arguments: &[Expression],
    ) -> String {
        let rendered: Vec<String> = arguments.iter().map(|a| self.expr(a, 0)).collect();
        let arguments = rendered.join(", ");
        if name == "<init>" {
            return match receiver {
                Some(Expression::This { .. }) => format!("this({arguments})"),
                Some(Expression::Super { .. }) => format!("super({arguments})"),
                Some(other) => format!("{}.<init>({arguments})", self.expr(other, 14)),
                None => format!("<init>({arguments})"),
            };
        }
        let name = self.identifier(name);
        match kind {
            CallKind::Static => {
                if owner == self.class.name {
                    format!("{name}({arguments})")
                } else {
                    format!("{}.{name}({arguments})", self.class_ref(owner))
                }
            }
            CallKind::Dynamic => format!("{name}({arguments})"),
            _ => match receiver {
                Some(Expression::This { .. }) => format!("{name}({arguments})"),
                Some(Expression::Super { .. }) => format!("super.{name}({arguments})"),
                Some(other) => format!("{}.{name}({arguments})", self.expr(other, 14)),
                None => format!("{name}({arguments})"),
            },
        }
    }

    fn literal(&mut self, value: &LiteralValue) -> String {
        match value {
            LiteralValue::Null => "null".to_string(),
            LiteralValue::Bool(b) => b.to_string(),
            LiteralValue::Int(i) => match *i {
                i32::MIN => "Integer.MIN_VALUE".to_string(),
                other => other.to_string(),
            },
            LiteralValue::Long(l) => match *l {
                i64::MIN => "Long.MIN_VALUE".to_string(),
                other => format!("{other}L"),
            },
            LiteralValue::Float(f) => {
                if f.is_nan() {
                    "Float.NaN".to_string()
                } else if *f == f32::INFINITY {
                    "Float.POSITIVE_INFINITY".to_string()
                } else if *f == f32::NEG_INFINITY {
                    "Float.NEGATIVE_INFINITY".to_string()
                } else {
                    format!("{f:?}F")
                }
            }
            LiteralValue::Double(d) => {
                if d.is_nan() {
                    "Double.NaN".to_string()
                } else if *d == f64::INFINITY {
                    "Double.POSITIVE_INFINITY".to_string()
                } else if *d == f64::NEG_INFINITY {
                    "Double.NEGATIVE_INFINITY".to_string()
                } else {
                    format!("{d:?}")
                }
            }
            LiteralValue::Str(s) => format!("\"{}\"", escape_string(s)),
            LiteralValue::Class(name) => format!("{}.class", self.class_ref(name)),
        }
    }

    fn identifier(&mut self, name: &str) -> String {
        if RESERVED_WORDS.contains(&name) {
            if self.escapes_reported.insert(name.to_string()) {
                self.diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    pc: None,
                    message: format!("recovered name {name:?} is a reserved word"),
                });
            }
            return format!("{name}_");
        }
        name.to_string()
    }

    fn type_name(&self, ty: &FieldType) -> String {
        match ty {
            FieldType::Base(base) => base.java_name().to_string(),
            FieldType::Object(name) => self.class_ref(name),
            FieldType::Array { element, dims } => {
                let mut text = self.type_name(element);
                for _ in 0..*dims {
                    text.push_str("[]");
                }
                text
            }
        }
    }

    /// Shortest unambiguous rendering of a binary class name.
    fn class_ref(&self, binary: &str) -> String {
        let dotted = binary.replace('/', ".");
        let simple = binary.rsplit_once('/').map_or(binary, |(_, s)| s);
        let package = binary.rsplit_once('/').map(|(p, _)| p);
        if binary == self.class.name {
            return simple.to_string();
        }
        if package == Some("java/lang") || package == self.class.package() || package.is_none() {
            return simple.to_string();
        }
        match self.imports.get(simple) {
            Some(fq) if *fq == dotted => simple.to_string(),
            _ => dotted,
        }
    }

    fn collect_imports(&mut self) {
        let mut collector = TypeCollector {
            names: BTreeSet::new(),
        };
        for field in &self.class.fields {
            collector.field_type(&field.ty);
            if let Some(init) = &field.init {
                collector.expression(init);
            }
        }
        for method in &self.class.methods {
            collector.field_type(&method.ret);
            for parameter in &method.parameters {
                collector.field_type(&parameter.ty);
            }
            for throws in &method.throws {
                collector.names.insert(throws.clone());
            }
            if let Some(body) = &method.body {
                walk_statements(&mut collector, body);
            }
        }
        if let Some(super_class) = &self.class.super_class {
            collector.names.insert(super_class.clone());
        }
        for interface in &self.class.interfaces {
            collector.names.insert(interface.clone());
        }
        let mut ambiguous: HashSet<String> = HashSet::new();
        for binary in collector.names {
            let Some((package, simple)) = binary.rsplit_once('/') else {
                continue;
            };
            if package == "java/lang"
                || Some(package) == self.class.package()
                || binary == self.class.name
            {
                continue;
            }
            let dotted = binary.replace('/', ".");
            if ambiguous.contains(simple) {
                continue;
            }
            match self.imports.get(simple) {
                None => {
                    self.imports.insert(simple.to_string(), dotted);
                }
                Some(existing) if *existing != dotted => {
                    // Two classes share a simple name; qualify both.
                    self.imports.remove(simple);
                    ambiguous.insert(simple.to_string());
                }
                Some(_) => {}
            }
        }
    }
}

struct TypeCollector {
    names: BTreeSet<String>,
}

impl TypeCollector {
    fn field_type(&mut self, ty: &FieldType) {
        match ty {
            FieldType::Base(_) => {}
            FieldType::Object(name) => {
                self.names.insert(name.clone());
            }
            FieldType::Array { element, .. } => self.field_type(element),
        }
    }

    fn expression(&mut self, expression: &Expression) {
        match expression {
            Expression::New { class, .. } => {
                self.names.insert(class.clone());
            }
            Expression::NewArray { element, .. } => self.field_type(element),
            Expression::Cast { target, .. } => self.field_type(target),
            Expression::InstanceOf { target, .. } => {
                self.names.insert(target.clone());
            }
            Expression::FieldAccess {
                receiver: None,
                owner,
                ..
            } => {
                self.names.insert(owner.clone());
            }
            Expression::Call {
                kind: CallKind::Static,
                owner,
                ..
            } => {
                self.names.insert(owner.clone());
            }
            Expression::Literal {
                value: LiteralValue::Class(name),
            } => {
                self.names.insert(name.clone());
            }
            _ => {}
        }
    }
}

impl Visitor for TypeCollector {
    fn visit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::LocalDecl { ty, .. } => self.field_type(ty),
            Statement::Try { catches, .. } => {
                for catch in catches {
                    self.names.insert(catch.exception_type.clone());
                }
            }
            _ => {}
        }
    }

    fn visit_expression(&mut self, expression: &Expression) {
        self.expression(expression);
    }
}

fn binary_prec(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 11,
        BinaryOp::Add | BinaryOp::Sub => 10,
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr => 9,
        BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Gt | BinaryOp::Le => 8,
        BinaryOp::Eq | BinaryOp::Ne => 7,
        BinaryOp::And => 6,
        BinaryOp::Xor => 5,
        BinaryOp::Or => 4,
    }
}

fn class_modifiers(flags: &[ClassAccessFlags], kind: ClassKind) -> Vec<&'static str> {
    let mut out = Vec::new();
    if flags.contains(&ClassAccessFlags::AccPublic) {
        out.push("public");
    }
    if flags.contains(&ClassAccessFlags::AccAbstract)
        && !matches!(kind, ClassKind::Interface | ClassKind::Annotation)
    {
        out.push("abstract");
    }
    if flags.contains(&ClassAccessFlags::AccFinal) && kind != ClassKind::Enum {
        out.push("final");
    }
    out
}

fn method_modifiers(flags: &[MethodAccessFlags], kind: ClassKind) -> Vec<&'static str> {
    let mut out = Vec::new();
    for visibility in [
        MethodAccessFlags::AccPublic,
        MethodAccessFlags::AccProtected,
        MethodAccessFlags::AccPrivate,
    ] {
        if flags.contains(&visibility) {
            if !(kind == ClassKind::Interface && visibility == MethodAccessFlags::AccPublic) {
                out.push(visibility.as_modifier().unwrap_or_default());
            }
        }
    }
    for modifier in [
        MethodAccessFlags::AccAbstract,
        MethodAccessFlags::AccStatic,
        MethodAccessFlags::AccFinal,
        MethodAccessFlags::AccSynchronized,
        MethodAccessFlags::AccNative,
        MethodAccessFlags::AccStrict,
    ] {
        if flags.contains(&modifier) {
            if modifier == MethodAccessFlags::AccAbstract && kind == ClassKind::Interface {
                continue;
            }
            out.push(modifier.as_modifier().unwrap_or_default());
        }
    }
    out
}

fn field_modifiers(flags: &[FieldAccessFlags]) -> Vec<&'static str> {
    let mut out = Vec::new();
    for visibility in [
        FieldAccessFlags::AccPublic,
        FieldAccessFlags::AccProtected,
        FieldAccessFlags::AccPrivate,
    ] {
        if flags.contains(&visibility) {
            out.push(visibility.as_modifier().unwrap_or_default());
        }
    }
    for modifier in [
        FieldAccessFlags::AccStatic,
        FieldAccessFlags::AccFinal,
        FieldAccessFlags::AccVolatile,
        FieldAccessFlags::AccTransient,
    ] {
        if flags.contains(&modifier) {
            out.push(modifier.as_modifier().unwrap_or_default());
        }
    }
    out
}

fn line_for(lines: &[(u32, u16)], pc: u32) -> Option<u16> {
    lines
        .iter()
        .filter(|(start, _)| *start <= pc)
        .max_by_key(|(start, _)| *start)
        .map(|(_, line)| *line)
}

fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Parameter;

    fn options() -> Options {
        Options::default()
    }

    fn empty_class(name: &str) -> ClassDecl {
        ClassDecl {
            kind: ClassKind::Class,
            modifiers: vec![ClassAccessFlags::AccPublic],
            name: name.to_string(),
            super_class: Some("java/lang/Object".to_string()),
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            source_file: None,
            deprecated: false,
        }
    }

    fn int_method(name: &str, body: Vec<Statement>) -> MethodDecl {
        MethodDecl {
            modifiers: vec![MethodAccessFlags::AccPublic],
            name: name.to_string(),
            is_constructor: false,
            is_static_initializer: false,
            ret: FieldType::Base(BaseType::Int),
            generic_ret: None,
            parameters: vec![Parameter {
                name: "a".to_string(),
                ty: FieldType::Base(BaseType::Int),
                generic: None,
            }],
            throws: vec![],
            body: Some(body),
            deprecated: false,
            line_numbers: vec![],
        }
    }

    #[test]
    fn modifier_order_is_canonical() {
        let mut class = empty_class("A");
        let mut method = int_method("m", vec![]);
        method.modifiers = vec![
            MethodAccessFlags::AccFinal,
            MethodAccessFlags::AccStatic,
            MethodAccessFlags::AccPublic,
            MethodAccessFlags::AccSynchronized,
        ];
        class.methods.push(method);
        let mut diagnostics = Vec::new();
        let text = emit_class(&class, &options(), &mut diagnostics);
        assert!(text.contains("public static final synchronized int m(int a) {"));
    }

    #[test]
    fn reserved_words_are_escaped_with_a_diagnostic() {
        let mut class = empty_class("A");
        class.methods.push(int_method(
            "m",
            vec![Statement::Return {
                value: Some(Expression::Local {
                    name: "assert".to_string(),
                    slot: 1,
                    ty: FieldType::Base(BaseType::Int),
                }),
                pc: None,
            }],
        ));
        let mut diagnostics = Vec::new();
        let text = emit_class(&class, &options(), &mut diagnostics);
        assert!(text.contains("return assert_;"));
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("reserved word")));
    }

    #[test]
    fn void_methods_never_return_a_value() {
        let mut class = empty_class("A");
        let mut method = int_method("m", vec![Statement::Return {
            value: Some(Expression::int(3)),
            pc: None,
        }]);
        method.ret = FieldType::Base(BaseType::Void);
        class.methods.push(method);
        let mut diagnostics = Vec::new();
        let text = emit_class(&class, &options(), &mut diagnostics);
        assert!(text.contains("return;"));
        assert!(!text.contains("return 3;"));
    }

    #[test]
    fn binary_precedence_gets_parentheses() {
        let expr = Expression::Binary {
            op: BinaryOp::Mul,
            lhs: Box::new(Expression::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Expression::int(1)),
                rhs: Box::new(Expression::int(2)),
                ty: FieldType::Base(BaseType::Int),
            }),
            rhs: Box::new(Expression::int(3)),
            ty: FieldType::Base(BaseType::Int),
        };
        let mut class = empty_class("A");
        class.methods.push(int_method(
            "m",
            vec![Statement::Return {
                value: Some(expr),
                pc: None,
            }],
        ));
        let mut diagnostics = Vec::new();
        let text = emit_class(&class, &options(), &mut diagnostics);
        assert!(text.contains("return (1 + 2) * 3;"));
    }

    #[test]
    fn imports_are_emitted_for_foreign_packages() {
        let mut class = empty_class("com/example/A");
        class.methods.push(MethodDecl {
            modifiers: vec![MethodAccessFlags::AccPublic],
            name: "m".to_string(),
            is_constructor: false,
            is_static_initializer: false,
            ret: FieldType::object("java/util/List"),
            generic_ret: None,
            parameters: vec![],
            throws: vec![],
            body: Some(vec![Statement::Return {
                value: Some(Expression::null()),
                pc: None,
            }]),
            deprecated: false,
            line_numbers: vec![],
        });
        let mut diagnostics = Vec::new();
        let text = emit_class(&class, &options(), &mut diagnostics);
        assert!(text.contains("package com.example;"));
        assert!(text.contains("import java.util.List;"));
        assert!(text.contains("public List m() {"));
    }
}
