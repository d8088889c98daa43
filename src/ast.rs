//! Typed model of the recovered Java source: expressions, statements,
//! and declarations, with visitor traversal.
//!
//! The tree is a tree, never a DAG: a value produced once in bytecode but
//! consumed twice (via `dup`) is materialized into a temporary by the
//! lifter rather than shared between two parents.

use jloader::access_flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};
use jloader::descriptors::{BaseType, FieldType, MethodDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Boolean complement.
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Ushr => ">>>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Gt | BinaryOp::Le
        )
    }

    /// The comparison with the opposite truth table, if there is one.
    pub fn negated(&self) -> Option<BinaryOp> {
        match self {
            BinaryOp::Eq => Some(BinaryOp::Ne),
            BinaryOp::Ne => Some(BinaryOp::Eq),
            BinaryOp::Lt => Some(BinaryOp::Ge),
            BinaryOp::Ge => Some(BinaryOp::Lt),
            BinaryOp::Gt => Some(BinaryOp::Le),
            BinaryOp::Le => Some(BinaryOp::Gt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Null,
    /// Only minted during structural recovery (`while (true)`); bytecode
    /// itself models booleans as ints.
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    /// A class literal, `X.class`, from an `ldc` of a `Class` constant.
    Class(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Virtual,
    Special,
    Static,
    Interface,
    Dynamic,
}

/// An expression tree node. Every variant carries enough type information
/// to answer [`Expression::ty`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal {
        value: LiteralValue,
    },
    Local {
        name: String,
        slot: u16,
        ty: FieldType,
    },
    /// Static access when `receiver` is `None`.
    FieldAccess {
        receiver: Option<Box<Expression>>,
        owner: String,
        name: String,
        ty: FieldType,
    },
    ArrayAccess {
        array: Box<Expression>,
        index: Box<Expression>,
        ty: FieldType,
    },
    ArrayLength {
        array: Box<Expression>,
    },
    Call {
        kind: CallKind,
        receiver: Option<Box<Expression>>,
        owner: String,
        name: String,
        arguments: Vec<Expression>,
        descriptor: MethodDescriptor,
    },
    /// `new T(...)`. Until the matching `<init>` call is folded in,
    /// `initialized` is false and `arguments` is empty; `id` ties the
    /// copies a `dup` spread across the symbolic stack back together.
    New {
        class: String,
        arguments: Vec<Expression>,
        initialized: bool,
        id: u32,
    },
    NewArray {
        element: FieldType,
        dims: Vec<Expression>,
        extra_dims: u8,
    },
    Cast {
        target: FieldType,
        value: Box<Expression>,
    },
    InstanceOf {
        value: Box<Expression>,
        target: String,
    },
    Unary {
        op: UnaryOp,
        value: Box<Expression>,
        ty: FieldType,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
        ty: FieldType,
    },
    /// The raw result of `lcmp`/`fcmpl`/`fcmpg`/`dcmpl`/`dcmpg` before a
    /// following branch folds it into a comparison.
    Compare {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
        nan_is_one: bool,
    },
    Ternary {
        condition: Box<Expression>,
        then_value: Box<Expression>,
        else_value: Box<Expression>,
    },
    This {
        class: String,
    },
    Super {
        class: String,
    },
    /// The throwable an exception handler receives on its operand stack.
    /// Normally consumed by the handler's leading `astore`; it only
    /// survives into output when a handler discards it.
    CaughtException,
}

impl Expression {
    pub fn int(value: i32) -> Expression {
        Expression::Literal {
            value: LiteralValue::Int(value),
        }
    }

    pub fn null() -> Expression {
        Expression::Literal {
            value: LiteralValue::Null,
        }
    }

    pub fn ty(&self) -> FieldType {
        match self {
            Expression::Literal { value } => match value {
                LiteralValue::Null => FieldType::object("java/lang/Object"),
                LiteralValue::Bool(_) => FieldType::Base(BaseType::Boolean),
                LiteralValue::Int(_) => FieldType::Base(BaseType::Int),
                LiteralValue::Long(_) => FieldType::Base(BaseType::Long),
                LiteralValue::Float(_) => FieldType::Base(BaseType::Float),
                LiteralValue::Double(_) => FieldType::Base(BaseType::Double),
                LiteralValue::Str(_) => FieldType::object("java/lang/String"),
                LiteralValue::Class(_) => FieldType::object("java/lang/Class"),
            },
            Expression::Local { ty, .. } => ty.clone(),
            Expression::FieldAccess { ty, .. } => ty.clone(),
            Expression::ArrayAccess { ty, .. } => ty.clone(),
            Expression::ArrayLength { .. } => FieldType::Base(BaseType::Int),
            Expression::Call { descriptor, .. } => descriptor.ret.clone(),
            Expression::New { class, .. } => FieldType::Object(class.clone()),
            Expression::NewArray {
                element,
                dims,
                extra_dims,
            } => {
                let total = dims.len() as u8 + extra_dims;
                FieldType::Array {
                    element: Box::new(element.clone()),
                    dims: total,
                }
            }
            Expression::Cast { target, .. } => target.clone(),
            Expression::InstanceOf { .. } => FieldType::Base(BaseType::Boolean),
            Expression::Unary { ty, .. } => ty.clone(),
            Expression::Binary { ty, .. } => ty.clone(),
            Expression::Compare { .. } => FieldType::Base(BaseType::Int),
            Expression::Ternary { then_value, .. } => then_value.ty(),
            Expression::This { class } => FieldType::Object(class.clone()),
            Expression::Super { class } => FieldType::Object(class.clone()),
            Expression::CaughtException => FieldType::object("java/lang/Throwable"),
        }
    }

    /// Whether the value occupies two stack slots (category 2).
    pub fn is_wide(&self) -> bool {
        self.ty().is_wide()
    }

    /// Expressions that can be duplicated or re-evaluated freely.
    pub fn is_pure(&self) -> bool {
        match self {
            Expression::Literal { .. }
            | Expression::Local { .. }
            | Expression::This { .. }
            | Expression::Super { .. } => true,
            Expression::New {
                initialized: false, ..
            } => true,
            _ => false,
        }
    }

    /// Whether any subexpression reads the local in `slot`.
    pub fn reads_slot(&self, slot: u16) -> bool {
        let mut found = false;
        walk_expression(
            &mut |e: &Expression| {
                if let Expression::Local { slot: s, .. } = e {
                    if *s == slot {
                        found = true;
                    }
                }
            },
            self,
        );
        found
    }

    /// Whether any subexpression is a reference to the named local.
    pub fn reads_name(&self, name: &str) -> bool {
        let mut found = false;
        walk_expression(
            &mut |e: &Expression| {
                if let Expression::Local { name: n, .. } = e {
                    if n == name {
                        found = true;
                    }
                }
            },
            self,
        );
        found
    }

    /// Whether any subexpression observes mutable state (fields, arrays)
    /// or calls code.
    pub fn reads_memory(&self) -> bool {
        let mut found = false;
        walk_expression(
            &mut |e: &Expression| {
                if matches!(
                    e,
                    Expression::FieldAccess { .. }
                        | Expression::ArrayAccess { .. }
                        | Expression::ArrayLength { .. }
                        | Expression::Call { .. }
                        | Expression::New { .. }
                        | Expression::NewArray { .. }
                ) {
                    found = true;
                }
            },
            self,
        );
        found
    }
}

fn walk_expression(visit: &mut impl FnMut(&Expression), e: &Expression) {
    visit(e);
    match e {
        Expression::FieldAccess { receiver, .. } => {
            if let Some(receiver) = receiver {
                walk_expression(visit, receiver);
            }
        }
        Expression::ArrayAccess { array, index, .. } => {
            walk_expression(visit, array);
            walk_expression(visit, index);
        }
        Expression::ArrayLength { array } => walk_expression(visit, array),
        Expression::Call {
            receiver,
            arguments,
            ..
        } => {
            if let Some(receiver) = receiver {
                walk_expression(visit, receiver);
            }
            for argument in arguments {
                walk_expression(visit, argument);
            }
        }
        Expression::New { arguments, .. } => {
            for argument in arguments {
                walk_expression(visit, argument);
            }
        }
        Expression::NewArray { dims, .. } => {
            for dim in dims {
                walk_expression(visit, dim);
            }
        }
        Expression::Cast { value, .. } => walk_expression(visit, value),
        Expression::InstanceOf { value, .. } => walk_expression(visit, value),
        Expression::Unary { value, .. } => walk_expression(visit, value),
        Expression::Binary { lhs, rhs, .. } => {
            walk_expression(visit, lhs);
            walk_expression(visit, rhs);
        }
        Expression::Compare { lhs, rhs, .. } => {
            walk_expression(visit, lhs);
            walk_expression(visit, rhs);
        }
        Expression::Ternary {
            condition,
            then_value,
            else_value,
        } => {
            walk_expression(visit, condition);
            walk_expression(visit, then_value);
            walk_expression(visit, else_value);
        }
        Expression::Literal { .. }
        | Expression::Local { .. }
        | Expression::This { .. }
        | Expression::Super { .. }
        | Expression::CaughtException => {}
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// Case keys; `None` is the `default` label.
    pub labels: Vec<Option<i32>>,
    pub body: Vec<Statement>,
    /// The case runs into the next one instead of breaking.
    pub falls_through: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Binary name of the caught type.
    pub exception_type: String,
    pub name: String,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Block(Vec<Statement>),
    LocalDecl {
        name: String,
        ty: FieldType,
        init: Option<Expression>,
        pc: Option<u32>,
    },
    Expr {
        expr: Expression,
        pc: Option<u32>,
    },
    /// `op` present means a compound assignment (`+=`, `*=`, ...).
    Assign {
        target: Expression,
        value: Expression,
        op: Option<BinaryOp>,
        pc: Option<u32>,
    },
    If {
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
        pc: Option<u32>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
        pc: Option<u32>,
    },
    DoWhile {
        body: Vec<Statement>,
        condition: Expression,
        pc: Option<u32>,
    },
    For {
        init: Option<Box<Statement>>,
        condition: Option<Expression>,
        update: Option<Box<Statement>>,
        body: Vec<Statement>,
        pc: Option<u32>,
    },
    Switch {
        selector: Expression,
        cases: Vec<SwitchCase>,
        pc: Option<u32>,
    },
    Break {
        label: Option<String>,
    },
    Continue {
        label: Option<String>,
    },
    Return {
        value: Option<Expression>,
        pc: Option<u32>,
    },
    Throw {
        value: Expression,
        pc: Option<u32>,
    },
    Try {
        body: Vec<Statement>,
        catches: Vec<CatchClause>,
        finally: Option<Vec<Statement>>,
    },
    Synchronized {
        monitor: Expression,
        body: Vec<Statement>,
    },
    Labeled {
        label: String,
        body: Box<Statement>,
    },
    /// Monitor markers out of the lifter; structural recovery pairs them
    /// into [`Statement::Synchronized`] blocks.
    MonitorEnter(Expression),
    MonitorExit(Expression),
    Comment(String),
}

/// Pre/post traversal hooks over statements and expressions.
///
/// The default methods do nothing, so a visitor implements only the hooks
/// it cares about.
pub trait Visitor {
    fn visit_statement(&mut self, _statement: &Statement) {}
    fn leave_statement(&mut self, _statement: &Statement) {}
    fn visit_expression(&mut self, _expression: &Expression) {}
    fn leave_expression(&mut self, _expression: &Expression) {}
}

pub fn walk_statements(visitor: &mut dyn Visitor, statements: &[Statement]) {
    for statement in statements {
        walk_statement(visitor, statement);
    }
}

pub fn walk_statement(visitor: &mut dyn Visitor, statement: &Statement) {
    visitor.visit_statement(statement);
    match statement {
        Statement::Block(body) => walk_statements(visitor, body),
        Statement::LocalDecl { init, .. } => {
            if let Some(init) = init {
                visit_expression(visitor, init);
            }
        }
        Statement::Expr { expr, .. } => visit_expression(visitor, expr),
        Statement::Assign { target, value, .. } => {
            visit_expression(visitor, target);
            visit_expression(visitor, value);
        }
        Statement::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            visit_expression(visitor, condition);
            walk_statements(visitor, then_branch);
            if let Some(else_branch) = else_branch {
                walk_statements(visitor, else_branch);
            }
        }
        Statement::While {
            condition, body, ..
        } => {
            visit_expression(visitor, condition);
            walk_statements(visitor, body);
        }
        Statement::DoWhile {
            body, condition, ..
        } => {
            walk_statements(visitor, body);
            visit_expression(visitor, condition);
        }
        Statement::For {
            init,
            condition,
            update,
            body,
            ..
        } => {
            if let Some(init) = init {
                walk_statement(visitor, init);
            }
            if let Some(condition) = condition {
                visit_expression(visitor, condition);
            }
            if let Some(update) = update {
                walk_statement(visitor, update);
            }
            walk_statements(visitor, body);
        }
        Statement::Switch {
            selector, cases, ..
        } => {
            visit_expression(visitor, selector);
            for case in cases {
                walk_statements(visitor, &case.body);
            }
        }
        Statement::Return { value, .. } => {
            if let Some(value) = value {
                visit_expression(visitor, value);
            }
        }
        Statement::Throw { value, .. } => visit_expression(visitor, value),
        Statement::Try {
            body,
            catches,
            finally,
        } => {
            walk_statements(visitor, body);
            for catch in catches {
                walk_statements(visitor, &catch.body);
            }
            if let Some(finally) = finally {
                walk_statements(visitor, finally);
            }
        }
        Statement::Synchronized { monitor, body } => {
            visit_expression(visitor, monitor);
            walk_statements(visitor, body);
        }
        Statement::Labeled { body, .. } => walk_statement(visitor, body),
        Statement::MonitorEnter(monitor) | Statement::MonitorExit(monitor) => {
            visit_expression(visitor, monitor);
        }
        Statement::Break { .. } | Statement::Continue { .. } | Statement::Comment(_) => {}
    }
    visitor.leave_statement(statement);
}

fn visit_expression(visitor: &mut dyn Visitor, expression: &Expression) {
    visitor.visit_expression(expression);
    match expression {
        Expression::FieldAccess { receiver, .. } => {
            if let Some(receiver) = receiver {
                visit_expression(visitor, receiver);
            }
        }
        Expression::ArrayAccess { array, index, .. } => {
            visit_expression(visitor, array);
            visit_expression(visitor, index);
        }
        Expression::ArrayLength { array } => visit_expression(visitor, array),
        Expression::Call {
            receiver,
            arguments,
            ..
        } => {
            if let Some(receiver) = receiver {
                visit_expression(visitor, receiver);
            }
            for argument in arguments {
                visit_expression(visitor, argument);
            }
        }
        Expression::New { arguments, .. } => {
            for argument in arguments {
                visit_expression(visitor, argument);
            }
        }
        Expression::NewArray { dims, .. } => {
            for dim in dims {
                visit_expression(visitor, dim);
            }
        }
        Expression::Cast { value, .. } => visit_expression(visitor, value),
        Expression::InstanceOf { value, .. } => visit_expression(visitor, value),
        Expression::Unary { value, .. } => visit_expression(visitor, value),
        Expression::Binary { lhs, rhs, .. } => {
            visit_expression(visitor, lhs);
            visit_expression(visitor, rhs);
        }
        Expression::Compare { lhs, rhs, .. } => {
            visit_expression(visitor, lhs);
            visit_expression(visitor, rhs);
        }
        Expression::Ternary {
            condition,
            then_value,
            else_value,
        } => {
            visit_expression(visitor, condition);
            visit_expression(visitor, then_value);
            visit_expression(visitor, else_value);
        }
        Expression::Literal { .. }
        | Expression::Local { .. }
        | Expression::This { .. }
        | Expression::Super { .. }
        | Expression::CaughtException => {}
    }
    visitor.leave_expression(expression);
}

/// A method parameter as it will be printed.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: FieldType,
    /// Generic rendering from the `Signature` attribute, when available.
    pub generic: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub modifiers: Vec<FieldAccessFlags>,
    pub name: String,
    pub ty: FieldType,
    pub generic: Option<String>,
    pub init: Option<Expression>,
    pub deprecated: bool,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub modifiers: Vec<MethodAccessFlags>,
    pub name: String,
    pub is_constructor: bool,
    pub is_static_initializer: bool,
    pub ret: FieldType,
    pub generic_ret: Option<String>,
    pub parameters: Vec<Parameter>,
    pub throws: Vec<String>,
    /// `None` for abstract and native methods.
    pub body: Option<Vec<Statement>>,
    pub deprecated: bool,
    /// PC-to-line mapping from the `LineNumberTable`, for line comments.
    pub line_numbers: Vec<(u32, u16)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
    Annotation,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub kind: ClassKind,
    pub modifiers: Vec<ClassAccessFlags>,
    /// Binary name, `com/example/Foo`.
    pub name: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub source_file: Option<String>,
    pub deprecated: bool,
}

impl ClassDecl {
    pub fn package(&self) -> Option<&str> {
        self.name.rsplit_once('/').map(|(package, _)| package)
    }

    pub fn simple_name(&self) -> &str {
        self.name
            .rsplit_once('/')
            .map_or(self.name.as_str(), |(_, simple)| simple)
    }
}
