//! Symbolic execution of bytecode into expression trees.
//!
//! Each basic block is interpreted over a symbolic operand stack whose
//! entries are [`Expression`]s instead of runtime values. Statements fall
//! out wherever the bytecode commits an effect (stores, calls, field
//! writes); everything else stays on the stack until something consumes
//! it.

use std::collections::{HashMap, HashSet};

use jloader::attributes::Code;
use jloader::constants::ConstantPool;
use jloader::descriptors::{BaseType, FieldType, MethodDescriptor};
use log::warn;

use crate::ast::{BinaryOp, CallKind, Expression, LiteralValue, Statement, UnaryOp};
use crate::cfg::{ControlFlowGraph, EdgeKind};
use crate::decompiler::{Diagnostic, Options, Severity};
use crate::errors::bytecode::{BytecodeCause, BytecodeError};
use crate::ops::mnemonics::Mnemonic;
use crate::ops::{CodeListing, Instruction, Operand};

/// How a lifted block hands control onward. Branch conditions are stated
/// for the taken (`True`) edge.
#[derive(Debug, Clone)]
pub enum BlockExit {
    FallThrough,
    Jump,
    Branch { condition: Expression },
    Switch { selector: Expression },
    Return(Option<Expression>),
    Throw(Expression),
}

#[derive(Debug)]
pub struct LiftedBlock {
    pub statements: Vec<Statement>,
    pub exit: BlockExit,
    pub exit_pc: u32,
    /// For handler blocks: the local the leading `astore` bound the
    /// caught throwable to.
    pub caught_name: Option<String>,
}

impl LiftedBlock {
    fn unreachable_placeholder() -> LiftedBlock {
        LiftedBlock {
            statements: Vec::new(),
            exit: BlockExit::FallThrough,
            exit_pc: 0,
            caught_name: None,
        }
    }
}

#[derive(Debug)]
pub struct LiftedMethod {
    pub blocks: Vec<LiftedBlock>,
    /// Declarations for synthetic join temporaries; these precede every
    /// use, satisfying Java scoping wherever the joins ended up.
    pub prologue: Vec<Statement>,
}

struct LocalState {
    name: String,
    ty: FieldType,
}

pub struct Lifter<'a> {
    pool: &'a ConstantPool,
    class_name: &'a str,
    super_name: &'a str,
    code: &'a Code,
    listing: &'a CodeListing,
    cfg: &'a ControlFlowGraph,
    options: &'a Options,
    diagnostics: &'a mut Vec<Diagnostic>,
    is_static: bool,
    is_constructor: bool,
    locals: HashMap<u16, LocalState>,
    declared: HashSet<String>,
    temp_count: u32,
    new_count: u32,
    prologue: Vec<Statement>,
    entry_temps: HashMap<usize, Vec<(String, u16, FieldType)>>,
    patched: HashSet<(usize, usize)>,
    exit_stacks: Vec<Option<Vec<Expression>>>,
}

impl<'a> Lifter<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: &'a ConstantPool,
        class_name: &'a str,
        super_name: &'a str,
        code: &'a Code,
        listing: &'a CodeListing,
        cfg: &'a ControlFlowGraph,
        options: &'a Options,
        diagnostics: &'a mut Vec<Diagnostic>,
        is_static: bool,
        is_constructor: bool,
    ) -> Lifter<'a> {
        Lifter {
            pool,
            class_name,
            super_name,
            code,
            listing,
            cfg,
            options,
            diagnostics,
            is_static,
            is_constructor,
            locals: HashMap::new(),
            declared: HashSet::new(),
            temp_count: 0,
            new_count: 0,
            prologue: Vec::new(),
            entry_temps: HashMap::new(),
            patched: HashSet::new(),
            exit_stacks: Vec::new(),
        }
    }

    pub fn lift(mut self, descriptor: &MethodDescriptor) -> Result<LiftedMethod, BytecodeError> {
        self.bind_parameters(descriptor);
        self.exit_stacks = vec![None; self.cfg.blocks.len()];
        let mut blocks: Vec<LiftedBlock> = (0..self.cfg.blocks.len())
            .map(|_| LiftedBlock::unreachable_placeholder())
            .collect();
        // Reverse post order puts every forward predecessor before its
        // successors; only loop latches arrive late.
        for &index in &self.cfg.rpo.clone() {
            let entry_stack = self.entry_stack(index, &mut blocks)?;
            let lifted = self.lift_block(index, entry_stack)?;
            blocks[index] = lifted;
            self.patch_back_edges(index, &mut blocks)?;
        }
        Ok(LiftedMethod {
            blocks,
            prologue: self.prologue,
        })
    }

    fn bind_parameters(&mut self, descriptor: &MethodDescriptor) {
        let mut slot: u16 = 0;
        if !self.is_static {
            self.locals.insert(
                0,
                LocalState {
                    name: "this".to_string(),
                    ty: FieldType::Object(self.class_name.to_string()),
                },
            );
            self.declared.insert("this".to_string());
            slot = 1;
        }
        for parameter in &descriptor.parameters {
            let name = self
                .debug_name(slot, 0)
                .map(|(name, _)| name)
                .unwrap_or_else(|| format!("var{slot}"));
            self.declared.insert(name.clone());
            self.locals.insert(
                slot,
                LocalState {
                    name,
                    ty: parameter.clone(),
                },
            );
            slot += if parameter.is_wide() { 2 } else { 1 };
        }
    }

    /// Name and declared type from the LocalVariableTable, when present
    /// and enabled.
    fn debug_name(&self, slot: u16, pc: u32) -> Option<(String, FieldType)> {
        if !self.options.recover_variable_names {
            return None;
        }
        let entry = self.code.local_variable(slot, pc)?;
        let name = self.pool.utf8(entry.name_index).ok()?.to_string();
        let ty = FieldType::parse(self.pool.utf8(entry.descriptor_index).ok()?).ok()?;
        Some((name, ty))
    }

    fn entry_stack(
        &mut self,
        index: usize,
        blocks: &mut [LiftedBlock],
    ) -> Result<Vec<Expression>, BytecodeError> {
        if self.cfg.blocks[index].is_handler {
            // The thrown value is the only thing on a handler's stack.
            return Ok(vec![Expression::CaughtException]);
        }
        if index == self.cfg.entry {
            return Ok(Vec::new());
        }
        let processed: Vec<usize> = self.cfg.blocks[index]
            .predecessors
            .iter()
            .copied()
            .filter(|&p| self.exit_stacks[p].is_some())
            .collect();
        let Some(&first) = processed.first() else {
            return Ok(Vec::new());
        };
        let depth = self.exit_stacks[first].as_ref().map_or(0, Vec::len);
        let pc = self.cfg.blocks[index].start;
        for &pred in &processed {
            let found = self.exit_stacks[pred].as_ref().map_or(0, Vec::len);
            if found != depth {
                return Err(BytecodeError::new(
                    BytecodeCause::StackHeightMismatch {
                        pc,
                        expected: depth,
                        found,
                    },
                    "predecessors disagree on the operand stack depth",
                ));
            }
        }
        if depth == 0 {
            return Ok(Vec::new());
        }
        let unprocessed_preds = self.cfg.blocks[index].predecessors.len() > processed.len();
        if processed.len() == 1 && !unprocessed_preds {
            // A single predecessor's values flow through untouched. The
            // stack is cloned because a branch head hands the same
            // remainder to both of its arms.
            return Ok(self.exit_stacks[first].clone().unwrap_or_default());
        }
        // Different expressions arrive in the same slots: materialize a
        // temporary per slot and make every predecessor assign it.
        let template = self.exit_stacks[first].clone().unwrap_or_default();
        let mut temps = Vec::with_capacity(depth);
        for value in &template {
            let (name, slot) = self.fresh_temp();
            let ty = value.ty();
            self.prologue.push(Statement::LocalDecl {
                name: name.clone(),
                ty: ty.clone(),
                init: None,
                pc: None,
            });
            temps.push((name, slot, ty));
        }
        for &pred in &processed {
            let values = self.exit_stacks[pred].clone().unwrap_or_default();
            append_temp_assigns(&mut blocks[pred].statements, &temps, values);
            self.patched.insert((pred, index));
        }
        let entry = temps
            .iter()
            .map(|(name, slot, ty)| Expression::Local {
                name: name.clone(),
                slot: *slot,
                ty: ty.clone(),
            })
            .collect();
        self.entry_temps.insert(index, temps);
        Ok(entry)
    }

    /// A latch processed after its join delivers its stack through the
    /// join's temporaries.
    fn patch_back_edges(
        &mut self,
        index: usize,
        blocks: &mut [LiftedBlock],
    ) -> Result<(), BytecodeError> {
        let successors: Vec<usize> = self.cfg.blocks[index]
            .successors
            .iter()
            .filter(|(_, kind)| !matches!(kind, EdgeKind::Exception))
            .map(|(b, _)| *b)
            .collect();
        for successor in successors {
            let Some(temps) = self.entry_temps.get(&successor).cloned() else {
                continue;
            };
            if !self.patched.insert((index, successor)) {
                continue;
            }
            let values = self.exit_stacks[index].clone().unwrap_or_default();
            if values.len() != temps.len() {
                return Err(BytecodeError::new(
                    BytecodeCause::StackHeightMismatch {
                        pc: self.cfg.blocks[successor].start,
                        expected: temps.len(),
                        found: values.len(),
                    },
                    "back edge disagrees on the operand stack depth",
                ));
            }
            append_temp_assigns(&mut blocks[index].statements, &temps, values);
        }
        Ok(())
    }

    fn fresh_temp(&mut self) -> (String, u16) {
        let slot = self.code.max_locals.saturating_add(self.temp_count as u16);
        self.temp_count += 1;
        (format!("tmp{}", self.temp_count), slot)
    }

    fn pop(&self, stack: &mut Vec<Expression>, pc: u32) -> Result<Expression, BytecodeError> {
        stack.pop().ok_or_else(|| {
            BytecodeError::new(
                BytecodeCause::StackUnderflow { pc },
                "instruction pops more values than the stack holds",
            )
        })
    }

    fn diagnostic(&mut self, severity: Severity, pc: u32, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            pc: Some(pc),
            message,
        });
    }

    /// Reference to the local bound to `slot`, minting an anonymous one
    /// when no binding exists (parameters stripped of debug info).
    fn local_ref(&mut self, slot: u16, fallback: FieldType, pc: u32) -> Expression {
        if let Some((name, ty)) = self.debug_name(slot, pc) {
            let state = self.locals.entry(slot).or_insert(LocalState {
                name: name.clone(),
                ty: ty.clone(),
            });
            state.name = name;
            state.ty = ty;
        }
        let state = self.locals.entry(slot).or_insert_with(|| LocalState {
            name: format!("var{slot}"),
            ty: fallback,
        });
        if !self.is_static && slot == 0 && state.name == "this" {
            return Expression::This {
                class: self.class_name.to_string(),
            };
        }
        Expression::Local {
            name: state.name.clone(),
            slot,
            ty: state.ty.clone(),
        }
    }

    /// Splits one value into two usable copies, materializing a temporary
    /// when re-evaluation would duplicate a side effect.
    fn duplicate(
        &mut self,
        value: Expression,
        statements: &mut Vec<Statement>,
        pc: u32,
    ) -> (Expression, Expression) {
        if value.is_pure() {
            return (value.clone(), value);
        }
        let (name, slot) = self.fresh_temp();
        let ty = value.ty();
        statements.push(Statement::LocalDecl {
            name: name.clone(),
            ty: ty.clone(),
            init: Some(value),
            pc: Some(pc),
        });
        let local = Expression::Local { name, slot, ty };
        (local.clone(), local)
    }

    /// Materializes every stacked expression selected by `pick` into a
    /// temporary, so a following effect cannot change its meaning.
    fn flush_stack(
        &mut self,
        stack: &mut [Expression],
        statements: &mut Vec<Statement>,
        pc: u32,
        pick: impl Fn(&Expression) -> bool,
    ) {
        for i in 0..stack.len() {
            if !pick(&stack[i]) {
                continue;
            }
            if matches!(
                stack[i],
                Expression::New {
                    initialized: false,
                    ..
                } | Expression::CaughtException
            ) {
                continue;
            }
            let value = std::mem::replace(&mut stack[i], Expression::null());
            let (name, slot) = self.fresh_temp();
            let ty = value.ty();
            statements.push(Statement::LocalDecl {
                name: name.clone(),
                ty: ty.clone(),
                init: Some(value),
                pc: Some(pc),
            });
            stack[i] = Expression::Local { name, slot, ty };
        }
    }

    fn lift_block(
        &mut self,
        index: usize,
        entry_stack: Vec<Expression>,
    ) -> Result<LiftedBlock, BytecodeError> {
        let block = &self.cfg.blocks[index];
        let (first, last) = (block.first, block.last);
        let mut stack = entry_stack;
        let mut statements: Vec<Statement> = Vec::new();
        let mut caught_name = None;
        let mut exit = BlockExit::FallThrough;
        let mut exit_pc = self.listing.instructions[last].pc;
        for i in first..=last {
            let instruction = &self.listing.instructions[i];
            let pc = instruction.pc;
            if let Some(done) = self.lift_instruction(
                instruction,
                &mut stack,
                &mut statements,
                &mut caught_name,
            )? {
                exit = done;
                exit_pc = pc;
            }
        }
        self.exit_stacks[index] = Some(stack);
        Ok(LiftedBlock {
            statements,
            exit,
            exit_pc,
            caught_name,
        })
    }

    /// One instruction. Returns the block exit when the instruction
    /// terminates the block.
    fn lift_instruction(
        &mut self,
        instruction: &Instruction,
        stack: &mut Vec<Expression>,
        statements: &mut Vec<Statement>,
        caught_name: &mut Option<String>,
    ) -> Result<Option<BlockExit>, BytecodeError> {
        use Mnemonic::*;
        let pc = instruction.pc;
        let mnemonic = instruction.mnemonic;
        match mnemonic {
            Nop | Breakpoint => {}

            // Constants.
            AconstNull => stack.push(Expression::null()),
            IconstM1 => stack.push(Expression::int(-1)),
            Iconst0 => stack.push(Expression::int(0)),
            Iconst1 => stack.push(Expression::int(1)),
            Iconst2 => stack.push(Expression::int(2)),
            Iconst3 => stack.push(Expression::int(3)),
            Iconst4 => stack.push(Expression::int(4)),
            Iconst5 => stack.push(Expression::int(5)),
            Lconst0 | Lconst1 => stack.push(Expression::Literal {
                value: LiteralValue::Long(i64::from(mnemonic == Lconst1)),
            }),
            Fconst0 => stack.push(Expression::Literal {
                value: LiteralValue::Float(0.0),
            }),
            Fconst1 => stack.push(Expression::Literal {
                value: LiteralValue::Float(1.0),
            }),
            Fconst2 => stack.push(Expression::Literal {
                value: LiteralValue::Float(2.0),
            }),
            Dconst0 => stack.push(Expression::Literal {
                value: LiteralValue::Double(0.0),
            }),
            Dconst1 => stack.push(Expression::Literal {
                value: LiteralValue::Double(1.0),
            }),
            Bipush | Sipush => stack.push(Expression::int(
                instruction.immediate().unwrap_or_default(),
            )),
            Ldc | LdcW | Ldc2W => {
                let index = instruction.pool_index().unwrap_or_default();
                stack.push(self.load_constant(index, pc)?);
            }

            // Loads.
            Iload => self.push_load(instruction, stack, BaseType::Int),
            Lload => self.push_load(instruction, stack, BaseType::Long),
            Fload => self.push_load(instruction, stack, BaseType::Float),
            Dload => self.push_load(instruction, stack, BaseType::Double),
            Aload => {
                let slot = instruction.slot().unwrap_or_default();
                let fallback = FieldType::object("java/lang/Object");
                let local = self.local_ref(slot, fallback, pc);
                stack.push(local);
            }
            Iload0 | Iload1 | Iload2 | Iload3 => {
                let local =
                    self.local_ref(numbered_slot(mnemonic), FieldType::Base(BaseType::Int), pc);
                stack.push(local);
            }
            Lload0 | Lload1 | Lload2 | Lload3 => {
                let local =
                    self.local_ref(numbered_slot(mnemonic), FieldType::Base(BaseType::Long), pc);
                stack.push(local);
            }
            Fload0 | Fload1 | Fload2 | Fload3 => {
                let local =
                    self.local_ref(numbered_slot(mnemonic), FieldType::Base(BaseType::Float), pc);
                stack.push(local);
            }
            Dload0 | Dload1 | Dload2 | Dload3 => {
                let local =
                    self.local_ref(numbered_slot(mnemonic), FieldType::Base(BaseType::Double), pc);
                stack.push(local);
            }
            Aload0 | Aload1 | Aload2 | Aload3 => {
                let local =
                    self.local_ref(numbered_slot(mnemonic), FieldType::object("java/lang/Object"), pc);
                stack.push(local);
            }

            // Stores.
            Istore | Lstore | Fstore | Dstore | Astore => {
                let slot = instruction.slot().unwrap_or_default();
                self.store(slot, instruction, stack, statements, caught_name)?;
            }
            Istore0 | Istore1 | Istore2 | Istore3 | Lstore0 | Lstore1 | Lstore2 | Lstore3
            | Fstore0 | Fstore1 | Fstore2 | Fstore3 | Dstore0 | Dstore1 | Dstore2 | Dstore3
            | Astore0 | Astore1 | Astore2 | Astore3 => {
                let slot = numbered_slot(mnemonic);
                self.store(slot, instruction, stack, statements, caught_name)?;
            }

            Iinc => {
                let Some(Operand::Inc { slot, delta }) = instruction.operands.first().cloned()
                else {
                    return Err(BytecodeError::new(
                        BytecodeCause::InvalidOperand { pc },
                        "iinc without operands",
                    ));
                };
                self.flush_stack(stack, statements, pc, |e| e.reads_slot(slot));
                let target = self.local_ref(slot, FieldType::Base(BaseType::Int), pc);
                let (op, magnitude) = if delta < 0 {
                    (BinaryOp::Sub, -i32::from(delta))
                } else {
                    (BinaryOp::Add, i32::from(delta))
                };
                statements.push(Statement::Assign {
                    target,
                    value: Expression::int(magnitude),
                    op: Some(op),
                    pc: Some(pc),
                });
            }

            // Array reads and writes.
            Iaload => self.array_load(stack, pc, FieldType::Base(BaseType::Int))?,
            Laload => self.array_load(stack, pc, FieldType::Base(BaseType::Long))?,
            Faload => self.array_load(stack, pc, FieldType::Base(BaseType::Float))?,
            Daload => self.array_load(stack, pc, FieldType::Base(BaseType::Double))?,
            Aaload => self.array_load(stack, pc, FieldType::object("java/lang/Object"))?,
            Baload => self.array_load(stack, pc, FieldType::Base(BaseType::Byte))?,
            Caload => self.array_load(stack, pc, FieldType::Base(BaseType::Char))?,
            Saload => self.array_load(stack, pc, FieldType::Base(BaseType::Short))?,
            Iastore | Lastore | Fastore | Dastore | Aastore | Bastore | Castore | Sastore => {
                let value = self.pop(stack, pc)?;
                let index = self.pop(stack, pc)?;
                let array = self.pop(stack, pc)?;
                self.flush_stack(stack, statements, pc, Expression::reads_memory);
                let ty = element_type(&array, FieldType::object("java/lang/Object"));
                statements.push(Statement::Assign {
                    target: Expression::ArrayAccess {
                        array: Box::new(array),
                        index: Box::new(index),
                        ty,
                    },
                    value,
                    op: None,
                    pc: Some(pc),
                });
            }
            Arraylength => {
                let array = self.pop(stack, pc)?;
                stack.push(Expression::ArrayLength {
                    array: Box::new(array),
                });
            }

            // Stack shuffles, executed per the JVM's category rules.
            Pop => {
                let value = self.pop(stack, pc)?;
                self.discard(value, statements, pc);
            }
            Pop2 => {
                let value = self.pop(stack, pc)?;
                if value.is_wide() {
                    self.discard(value, statements, pc);
                } else {
                    // The deeper value was computed first; keep that order.
                    let second = self.pop(stack, pc)?;
                    self.discard(second, statements, pc);
                    self.discard(value, statements, pc);
                }
            }
            Dup => {
                let value = self.pop(stack, pc)?;
                let (a, b) = self.duplicate(value, statements, pc);
                stack.push(a);
                stack.push(b);
            }
            DupX1 => {
                let a = self.pop(stack, pc)?;
                let b = self.pop(stack, pc)?;
                let (a1, a2) = self.duplicate(a, statements, pc);
                stack.push(a1);
                stack.push(b);
                stack.push(a2);
            }
            DupX2 => {
                let a = self.pop(stack, pc)?;
                let b = self.pop(stack, pc)?;
                let (a1, a2) = self.duplicate(a, statements, pc);
                if b.is_wide() {
                    stack.push(a1);
                    stack.push(b);
                } else {
                    let c = self.pop(stack, pc)?;
                    stack.push(a1);
                    stack.push(c);
                    stack.push(b);
                }
                stack.push(a2);
            }
            Dup2 => {
                let a = self.pop(stack, pc)?;
                if a.is_wide() {
                    let (a1, a2) = self.duplicate(a, statements, pc);
                    stack.push(a1);
                    stack.push(a2);
                } else {
                    let b = self.pop(stack, pc)?;
                    let (b1, b2) = self.duplicate(b, statements, pc);
                    let (a1, a2) = self.duplicate(a, statements, pc);
                    stack.push(b1);
                    stack.push(a1);
                    stack.push(b2);
                    stack.push(a2);
                }
            }
            Dup2X1 => {
                let a = self.pop(stack, pc)?;
                if a.is_wide() {
                    let b = self.pop(stack, pc)?;
                    let (a1, a2) = self.duplicate(a, statements, pc);
                    stack.push(a1);
                    stack.push(b);
                    stack.push(a2);
                } else {
                    let b = self.pop(stack, pc)?;
                    let c = self.pop(stack, pc)?;
                    let (b1, b2) = self.duplicate(b, statements, pc);
                    let (a1, a2) = self.duplicate(a, statements, pc);
                    stack.push(b1);
                    stack.push(a1);
                    stack.push(c);
                    stack.push(b2);
                    stack.push(a2);
                }
            }
            Dup2X2 => {
                let a = self.pop(stack, pc)?;
                if a.is_wide() {
                    let b = self.pop(stack, pc)?;
                    let (a1, a2) = self.duplicate(a, statements, pc);
                    if b.is_wide() {
                        stack.push(a1);
                        stack.push(b);
                    } else {
                        let c = self.pop(stack, pc)?;
                        stack.push(a1);
                        stack.push(c);
                        stack.push(b);
                    }
                    stack.push(a2);
                } else {
                    let b = self.pop(stack, pc)?;
                    let c = self.pop(stack, pc)?;
                    let (b1, b2) = self.duplicate(b, statements, pc);
                    let (a1, a2) = self.duplicate(a, statements, pc);
                    if c.is_wide() {
                        stack.push(b1);
                        stack.push(a1);
                        stack.push(c);
                    } else {
                        let d = self.pop(stack, pc)?;
                        stack.push(b1);
                        stack.push(a1);
                        stack.push(d);
                        stack.push(c);
                    }
                    stack.push(b2);
                    stack.push(a2);
                }
            }
            Swap => {
                let a = self.pop(stack, pc)?;
                let b = self.pop(stack, pc)?;
                stack.push(a);
                stack.push(b);
            }

            // Arithmetic.
            Iadd => self.binary(stack, pc, BinaryOp::Add, BaseType::Int)?,
            Ladd => self.binary(stack, pc, BinaryOp::Add, BaseType::Long)?,
            Fadd => self.binary(stack, pc, BinaryOp::Add, BaseType::Float)?,
            Dadd => self.binary(stack, pc, BinaryOp::Add, BaseType::Double)?,
            Isub => self.binary(stack, pc, BinaryOp::Sub, BaseType::Int)?,
            Lsub => self.binary(stack, pc, BinaryOp::Sub, BaseType::Long)?,
            Fsub => self.binary(stack, pc, BinaryOp::Sub, BaseType::Float)?,
            Dsub => self.binary(stack, pc, BinaryOp::Sub, BaseType::Double)?,
            Imul => self.binary(stack, pc, BinaryOp::Mul, BaseType::Int)?,
            Lmul => self.binary(stack, pc, BinaryOp::Mul, BaseType::Long)?,
            Fmul => self.binary(stack, pc, BinaryOp::Mul, BaseType::Float)?,
            Dmul => self.binary(stack, pc, BinaryOp::Mul, BaseType::Double)?,
            Idiv => self.binary(stack, pc, BinaryOp::Div, BaseType::Int)?,
            Ldiv => self.binary(stack, pc, BinaryOp::Div, BaseType::Long)?,
            Fdiv => self.binary(stack, pc, BinaryOp::Div, BaseType::Float)?,
            Ddiv => self.binary(stack, pc, BinaryOp::Div, BaseType::Double)?,
            Irem => self.binary(stack, pc, BinaryOp::Rem, BaseType::Int)?,
            Lrem => self.binary(stack, pc, BinaryOp::Rem, BaseType::Long)?,
            Frem => self.binary(stack, pc, BinaryOp::Rem, BaseType::Float)?,
            Drem => self.binary(stack, pc, BinaryOp::Rem, BaseType::Double)?,
            Ineg | Lneg | Fneg | Dneg => {
                let value = self.pop(stack, pc)?;
                let ty = value.ty();
                stack.push(Expression::Unary {
                    op: UnaryOp::Neg,
                    value: Box::new(value),
                    ty,
                });
            }
            Ishl => self.shift(stack, pc, BinaryOp::Shl, BaseType::Int)?,
            Lshl => self.shift(stack, pc, BinaryOp::Shl, BaseType::Long)?,
            Ishr => self.shift(stack, pc, BinaryOp::Shr, BaseType::Int)?,
            Lshr => self.shift(stack, pc, BinaryOp::Shr, BaseType::Long)?,
            Iushr => self.shift(stack, pc, BinaryOp::Ushr, BaseType::Int)?,
            Lushr => self.shift(stack, pc, BinaryOp::Ushr, BaseType::Long)?,
            Iand => self.binary(stack, pc, BinaryOp::And, BaseType::Int)?,
            Land => self.binary(stack, pc, BinaryOp::And, BaseType::Long)?,
            Ior => self.binary(stack, pc, BinaryOp::Or, BaseType::Int)?,
            Lor => self.binary(stack, pc, BinaryOp::Or, BaseType::Long)?,
            Ixor => self.binary(stack, pc, BinaryOp::Xor, BaseType::Int)?,
            Lxor => self.binary(stack, pc, BinaryOp::Xor, BaseType::Long)?,

            // Conversions.
            I2l | F2l | D2l => self.convert(stack, pc, BaseType::Long)?,
            I2f | L2f | D2f => self.convert(stack, pc, BaseType::Float)?,
            I2d | L2d | F2d => self.convert(stack, pc, BaseType::Double)?,
            L2i | F2i | D2i => self.convert(stack, pc, BaseType::Int)?,
            I2b => self.convert(stack, pc, BaseType::Byte)?,
            I2c => self.convert(stack, pc, BaseType::Char)?,
            I2s => self.convert(stack, pc, BaseType::Short)?,

            // Numeric comparisons feeding a branch.
            Lcmp | Fcmpl | Dcmpl => {
                let rhs = self.pop(stack, pc)?;
                let lhs = self.pop(stack, pc)?;
                stack.push(Expression::Compare {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    nan_is_one: false,
                });
            }
            Fcmpg | Dcmpg => {
                let rhs = self.pop(stack, pc)?;
                let lhs = self.pop(stack, pc)?;
                stack.push(Expression::Compare {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    nan_is_one: true,
                });
            }

            // Conditional branches terminate the block with a two-way
            // edge and push nothing.
            Ifeq => return self.if_zero(stack, pc, BinaryOp::Eq).map(Some),
            Ifne => return self.if_zero(stack, pc, BinaryOp::Ne).map(Some),
            Iflt => return self.if_zero(stack, pc, BinaryOp::Lt).map(Some),
            Ifge => return self.if_zero(stack, pc, BinaryOp::Ge).map(Some),
            Ifgt => return self.if_zero(stack, pc, BinaryOp::Gt).map(Some),
            Ifle => return self.if_zero(stack, pc, BinaryOp::Le).map(Some),
            IfIcmpeq => return self.if_compare(stack, pc, BinaryOp::Eq).map(Some),
            IfIcmpne => return self.if_compare(stack, pc, BinaryOp::Ne).map(Some),
            IfIcmplt => return self.if_compare(stack, pc, BinaryOp::Lt).map(Some),
            IfIcmpge => return self.if_compare(stack, pc, BinaryOp::Ge).map(Some),
            IfIcmpgt => return self.if_compare(stack, pc, BinaryOp::Gt).map(Some),
            IfIcmple => return self.if_compare(stack, pc, BinaryOp::Le).map(Some),
            IfAcmpeq => return self.if_compare(stack, pc, BinaryOp::Eq).map(Some),
            IfAcmpne => return self.if_compare(stack, pc, BinaryOp::Ne).map(Some),
            Ifnull | Ifnonnull => {
                let value = self.pop(stack, pc)?;
                let op = if mnemonic == Ifnull {
                    BinaryOp::Eq
                } else {
                    BinaryOp::Ne
                };
                return Ok(Some(BlockExit::Branch {
                    condition: Expression::Binary {
                        op,
                        lhs: Box::new(value),
                        rhs: Box::new(Expression::null()),
                        ty: FieldType::Base(BaseType::Boolean),
                    },
                }));
            }

            Goto | GotoW => return Ok(Some(BlockExit::Jump)),
            Jsr | JsrW | Ret => {
                return Err(BytecodeError::new(
                    BytecodeCause::Unsupported {
                        pc,
                        mnemonic: mnemonic.name(),
                    },
                    "jsr/ret subroutines predate class file version 50",
                ));
            }
            Tableswitch | Lookupswitch => {
                let selector = self.pop(stack, pc)?;
                return Ok(Some(BlockExit::Switch { selector }));
            }

            Ireturn | Lreturn | Freturn | Dreturn | Areturn => {
                let value = self.pop(stack, pc)?;
                return Ok(Some(BlockExit::Return(Some(value))));
            }
            Return => return Ok(Some(BlockExit::Return(None))),
            Athrow => {
                let value = self.pop(stack, pc)?;
                return Ok(Some(BlockExit::Throw(value)));
            }

            // Field traffic.
            Getstatic | Getfield => {
                let index = instruction.pool_index().unwrap_or_default();
                let member = self.pool.field_ref(index).map_err(|e| {
                    BytecodeError::new(
                        BytecodeCause::InvalidOperand { pc },
                        &format!("unresolvable field reference: {e}"),
                    )
                })?;
                let ty = FieldType::parse(&member.descriptor).map_err(|e| {
                    BytecodeError::new(
                        BytecodeCause::InvalidOperand { pc },
                        &format!("bad field descriptor: {e}"),
                    )
                })?;
                let receiver = if mnemonic == Getfield {
                    Some(Box::new(self.pop(stack, pc)?))
                } else {
                    None
                };
                stack.push(Expression::FieldAccess {
                    receiver,
                    owner: member.owner,
                    name: member.name,
                    ty,
                });
            }
            Putstatic | Putfield => {
                let index = instruction.pool_index().unwrap_or_default();
                let member = self.pool.field_ref(index).map_err(|e| {
                    BytecodeError::new(
                        BytecodeCause::InvalidOperand { pc },
                        &format!("unresolvable field reference: {e}"),
                    )
                })?;
                let ty = FieldType::parse(&member.descriptor).map_err(|e| {
                    BytecodeError::new(
                        BytecodeCause::InvalidOperand { pc },
                        &format!("bad field descriptor: {e}"),
                    )
                })?;
                let value = self.pop(stack, pc)?;
                let receiver = if mnemonic == Putfield {
                    Some(Box::new(self.pop(stack, pc)?))
                } else {
                    None
                };
                self.flush_stack(stack, statements, pc, Expression::reads_memory);
                statements.push(Statement::Assign {
                    target: Expression::FieldAccess {
                        receiver,
                        owner: member.owner,
                        name: member.name,
                        ty,
                    },
                    value,
                    op: None,
                    pc: Some(pc),
                });
            }

            Invokevirtual | Invokespecial | Invokestatic | Invokeinterface | Invokedynamic => {
                self.invoke(instruction, stack, statements)?;
            }

            New => {
                let index = instruction.pool_index().unwrap_or_default();
                let class = self.resolve_class(index, pc)?;
                self.new_count += 1;
                stack.push(Expression::New {
                    class,
                    arguments: Vec::new(),
                    initialized: false,
                    id: self.new_count,
                });
            }
            Newarray => {
                let Some(Operand::ArrayType(atype)) = instruction.operands.first().cloned() else {
                    return Err(BytecodeError::new(
                        BytecodeCause::InvalidOperand { pc },
                        "newarray without a type code",
                    ));
                };
                let count = self.pop(stack, pc)?;
                stack.push(Expression::NewArray {
                    element: FieldType::Base(primitive_array_type(atype)),
                    dims: vec![count],
                    extra_dims: 0,
                });
            }
            Anewarray => {
                let index = instruction.pool_index().unwrap_or_default();
                let class = self.resolve_class(index, pc)?;
                let count = self.pop(stack, pc)?;
                let (element, extra_dims) = reference_element(&class);
                stack.push(Expression::NewArray {
                    element,
                    dims: vec![count],
                    extra_dims,
                });
            }
            Multianewarray => {
                let index = instruction.pool_index().unwrap_or_default();
                let class = self.resolve_class(index, pc)?;
                let Some(Operand::Dims(dims)) = instruction
                    .operands
                    .iter()
                    .find(|o| matches!(o, Operand::Dims(_)))
                    .cloned()
                else {
                    return Err(BytecodeError::new(
                        BytecodeCause::InvalidOperand { pc },
                        "multianewarray without a dimension count",
                    ));
                };
                let mut counts = Vec::with_capacity(dims as usize);
                for _ in 0..dims {
                    counts.push(self.pop(stack, pc)?);
                }
                counts.reverse();
                let parsed = FieldType::parse(&class).map_err(|e| {
                    BytecodeError::new(
                        BytecodeCause::InvalidOperand { pc },
                        &format!("multianewarray class is not an array descriptor: {e}"),
                    )
                })?;
                let (element, total_dims) = match parsed {
                    FieldType::Array { element, dims } => (*element, dims),
                    other => (other, 0),
                };
                let extra_dims = total_dims.saturating_sub(counts.len() as u8);
                stack.push(Expression::NewArray {
                    element,
                    dims: counts,
                    extra_dims,
                });
            }

            Checkcast => {
                let index = instruction.pool_index().unwrap_or_default();
                let class = self.resolve_class(index, pc)?;
                let target = if class.starts_with('[') {
                    FieldType::parse(&class).map_err(|e| {
                        BytecodeError::new(
                            BytecodeCause::InvalidOperand { pc },
                            &format!("bad array class in checkcast: {e}"),
                        )
                    })?
                } else {
                    FieldType::Object(class)
                };
                let value = self.pop(stack, pc)?;
                stack.push(Expression::Cast {
                    target,
                    value: Box::new(value),
                });
            }
            Instanceof => {
                let index = instruction.pool_index().unwrap_or_default();
                let target = self.resolve_class(index, pc)?;
                let value = self.pop(stack, pc)?;
                stack.push(Expression::InstanceOf {
                    value: Box::new(value),
                    target,
                });
            }

            Monitorenter => {
                let monitor = self.pop(stack, pc)?;
                statements.push(Statement::MonitorEnter(monitor));
            }
            Monitorexit => {
                let monitor = self.pop(stack, pc)?;
                statements.push(Statement::MonitorExit(monitor));
            }

            Wide | Unknown(_) => {
                // The decoder folded or rejected these already.
                return Err(BytecodeError::new(
                    BytecodeCause::InvalidOperand { pc },
                    "decoder artifact reached the lifter",
                ));
            }

            _ => {
                return Err(BytecodeError::new(
                    BytecodeCause::Unsupported {
                        pc,
                        mnemonic: mnemonic.name(),
                    },
                    "instruction not handled by the lifter",
                ));
            }
        }
        Ok(None)
    }

    fn push_load(&mut self, instruction: &Instruction, stack: &mut Vec<Expression>, base: BaseType) {
        let slot = instruction.slot().unwrap_or_default();
        let local = self.local_ref(slot, FieldType::Base(base), instruction.pc);
        stack.push(local);
    }

    fn load_constant(&mut self, index: u16, pc: u32) -> Result<Expression, BytecodeError> {
        use jloader::constants::Constant;
        let entry = self.pool.get(index).map_err(|e| {
            BytecodeError::new(
                BytecodeCause::InvalidOperand { pc },
                &format!("ldc index does not resolve: {e}"),
            )
        })?;
        let value = match entry {
            Constant::Integer(i) => LiteralValue::Int(i.value),
            Constant::Float(f) => LiteralValue::Float(f.value),
            Constant::Long(l) => LiteralValue::Long(l.value),
            Constant::Double(d) => LiteralValue::Double(d.value),
            Constant::String(_) => LiteralValue::Str(
                self.pool
                    .string(index)
                    .map_err(|e| {
                        BytecodeError::new(
                            BytecodeCause::InvalidOperand { pc },
                            &format!("ldc string does not resolve: {e}"),
                        )
                    })?
                    .to_string(),
            ),
            Constant::Class(_) => LiteralValue::Class(
                self.pool
                    .class_name(index)
                    .map_err(|e| {
                        BytecodeError::new(
                            BytecodeCause::InvalidOperand { pc },
                            &format!("ldc class does not resolve: {e}"),
                        )
                    })?
                    .to_string(),
            ),
            other => {
                // Method handles and method types reach ldc only in
                // generated glue; keep going with a placeholder.
                self.diagnostic(
                    Severity::Warning,
                    pc,
                    format!("ldc of unsupported constant kind {}", other.kind()),
                );
                LiteralValue::Str(format!("<{}>", other.kind()))
            }
        };
        Ok(Expression::Literal { value })
    }

    fn resolve_class(&self, index: u16, pc: u32) -> Result<String, BytecodeError> {
        self.pool
            .class_name(index)
            .map(str::to_string)
            .map_err(|e| {
                BytecodeError::new(
                    BytecodeCause::InvalidOperand { pc },
                    &format!("class reference does not resolve: {e}"),
                )
            })
    }

    fn store(
        &mut self,
        slot: u16,
        instruction: &Instruction,
        stack: &mut Vec<Expression>,
        statements: &mut Vec<Statement>,
        caught_name: &mut Option<String>,
    ) -> Result<(), BytecodeError> {
        let pc = instruction.pc;
        let value = self.pop(stack, pc)?;
        // The visible scope of a store's variable begins at the next
        // instruction, which is where the debug table points.
        let visible_pc = instruction.next_pc();
        if matches!(value, Expression::CaughtException) {
            let (name, ty) = self
                .debug_name(slot, visible_pc)
                .unwrap_or_else(|| (format!("var{slot}"), FieldType::object("java/lang/Throwable")));
            self.declared.insert(name.clone());
            self.locals.insert(slot, LocalState { name: name.clone(), ty });
            *caught_name = Some(name);
            return Ok(());
        }
        self.flush_stack(stack, statements, pc, |e| e.reads_slot(slot));
        let (name, declared_ty) = match self.debug_name(slot, visible_pc) {
            Some((name, ty)) => (name, ty),
            None => (format!("var{slot}"), value.ty()),
        };
        // Compound assignment when the value reads the same variable back.
        let compound = match &value {
            Expression::Binary { op, lhs, rhs, .. } => match lhs.as_ref() {
                Expression::Local {
                    slot: value_slot, ..
                } if *value_slot == slot && !op.is_comparison() => {
                    Some((*op, rhs.as_ref().clone()))
                }
                _ => None,
            },
            _ => None,
        };
        let rebinding = self
            .locals
            .get(&slot)
            .map(|state| state.name == name)
            .unwrap_or(false);
        if rebinding && self.declared.contains(&name) {
            let target = self.local_ref(slot, declared_ty, visible_pc);
            match compound {
                Some((op, operand)) => statements.push(Statement::Assign {
                    target,
                    value: operand,
                    op: Some(op),
                    pc: Some(pc),
                }),
                None => statements.push(Statement::Assign {
                    target,
                    value,
                    op: None,
                    pc: Some(pc),
                }),
            }
        } else {
            self.declared.insert(name.clone());
            self.locals.insert(
                slot,
                LocalState {
                    name: name.clone(),
                    ty: declared_ty.clone(),
                },
            );
            statements.push(Statement::LocalDecl {
                name,
                ty: declared_ty,
                init: Some(value),
                pc: Some(pc),
            });
        }
        Ok(())
    }

    fn array_load(
        &mut self,
        stack: &mut Vec<Expression>,
        pc: u32,
        fallback: FieldType,
    ) -> Result<(), BytecodeError> {
        let index = self.pop(stack, pc)?;
        let array = self.pop(stack, pc)?;
        let ty = element_type(&array, fallback);
        stack.push(Expression::ArrayAccess {
            array: Box::new(array),
            index: Box::new(index),
            ty,
        });
        Ok(())
    }

    fn discard(&mut self, value: Expression, statements: &mut Vec<Statement>, pc: u32) {
        // A popped call is a call whose result the source ignored.
        if matches!(
            value,
            Expression::Call { .. }
                | Expression::New {
                    initialized: true,
                    ..
                }
        ) {
            statements.push(Statement::Expr {
                expr: value,
                pc: Some(pc),
            });
        }
    }

    fn binary(
        &mut self,
        stack: &mut Vec<Expression>,
        pc: u32,
        op: BinaryOp,
        base: BaseType,
    ) -> Result<(), BytecodeError> {
        let rhs = self.pop(stack, pc)?;
        let lhs = self.pop(stack, pc)?;
        if matches!(op, BinaryOp::Div | BinaryOp::Rem)
            && matches!(base, BaseType::Int | BaseType::Long)
            && matches!(
                rhs,
                Expression::Literal {
                    value: LiteralValue::Int(0)
                } | Expression::Literal {
                    value: LiteralValue::Long(0)
                }
            )
        {
            // The bytecode expressed the division; its exception path is
            // the JVM's business, not ours.
            self.diagnostic(
                Severity::Warning,
                pc,
                "integer division by constant zero".to_string(),
            );
        }
        stack.push(Expression::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            ty: FieldType::Base(base),
        });
        Ok(())
    }

    fn shift(
        &mut self,
        stack: &mut Vec<Expression>,
        pc: u32,
        op: BinaryOp,
        base: BaseType,
    ) -> Result<(), BytecodeError> {
        let rhs = self.pop(stack, pc)?;
        let lhs = self.pop(stack, pc)?;
        stack.push(Expression::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            ty: FieldType::Base(base),
        });
        Ok(())
    }

    fn convert(
        &mut self,
        stack: &mut Vec<Expression>,
        pc: u32,
        target: BaseType,
    ) -> Result<(), BytecodeError> {
        let value = self.pop(stack, pc)?;
        stack.push(Expression::Cast {
            target: FieldType::Base(target),
            value: Box::new(value),
        });
        Ok(())
    }

    /// `if<cond>` against zero, folding a preceding `lcmp`-family result
    /// back into a two-operand comparison.
    fn if_zero(
        &mut self,
        stack: &mut Vec<Expression>,
        pc: u32,
        op: BinaryOp,
    ) -> Result<BlockExit, BytecodeError> {
        let value = self.pop(stack, pc)?;
        let condition = match value {
            Expression::Compare { lhs, rhs, .. } => Expression::Binary {
                op,
                lhs,
                rhs,
                ty: FieldType::Base(BaseType::Boolean),
            },
            value if value.ty() == FieldType::Base(BaseType::Boolean) => match op {
                BinaryOp::Ne => value,
                BinaryOp::Eq => Expression::Unary {
                    op: UnaryOp::Not,
                    value: Box::new(value),
                    ty: FieldType::Base(BaseType::Boolean),
                },
                _ => Expression::Binary {
                    op,
                    lhs: Box::new(value),
                    rhs: Box::new(Expression::int(0)),
                    ty: FieldType::Base(BaseType::Boolean),
                },
            },
            value => Expression::Binary {
                op,
                lhs: Box::new(value),
                rhs: Box::new(Expression::int(0)),
                ty: FieldType::Base(BaseType::Boolean),
            },
        };
        Ok(BlockExit::Branch { condition })
    }

    fn if_compare(
        &mut self,
        stack: &mut Vec<Expression>,
        pc: u32,
        op: BinaryOp,
    ) -> Result<BlockExit, BytecodeError> {
        let rhs = self.pop(stack, pc)?;
        let lhs = self.pop(stack, pc)?;
        Ok(BlockExit::Branch {
            condition: Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                ty: FieldType::Base(BaseType::Boolean),
            },
        })
    }

    fn invoke(
        &mut self,
        instruction: &Instruction,
        stack: &mut Vec<Expression>,
        statements: &mut Vec<Statement>,
    ) -> Result<(), BytecodeError> {
        let pc = instruction.pc;
        let index = instruction.pool_index().unwrap_or_default();
        let (kind, owner, name, descriptor_text) = match instruction.mnemonic {
            Mnemonic::Invokedynamic => {
                let dynamic = self.pool.invoke_dynamic(index).map_err(|e| {
                    BytecodeError::new(
                        BytecodeCause::InvalidOperand { pc },
                        &format!("invokedynamic does not resolve: {e}"),
                    )
                })?;
                let (name, descriptor) = self
                    .pool
                    .name_and_type(dynamic.name_and_type_index)
                    .map_err(|e| {
                        BytecodeError::new(
                            BytecodeCause::InvalidOperand { pc },
                            &format!("invokedynamic name does not resolve: {e}"),
                        )
                    })?;
                (
                    CallKind::Dynamic,
                    String::new(),
                    name.to_string(),
                    descriptor.to_string(),
                )
            }
            mnemonic => {
                let member = self.pool.method_ref(index).map_err(|e| {
                    BytecodeError::new(
                        BytecodeCause::InvalidOperand { pc },
                        &format!("method reference does not resolve: {e}"),
                    )
                })?;
                let kind = match mnemonic {
                    Mnemonic::Invokevirtual => CallKind::Virtual,
                    Mnemonic::Invokespecial => CallKind::Special,
                    Mnemonic::Invokestatic => CallKind::Static,
                    _ => CallKind::Interface,
                };
                (kind, member.owner, member.name, member.descriptor)
            }
        };
        let descriptor = MethodDescriptor::parse(&descriptor_text).map_err(|e| {
            BytecodeError::new(
                BytecodeCause::InvalidOperand { pc },
                &format!("bad method descriptor: {e}"),
            )
        })?;
        let mut arguments = Vec::with_capacity(descriptor.parameters.len());
        for _ in 0..descriptor.parameters.len() {
            arguments.push(self.pop(stack, pc)?);
        }
        arguments.reverse();
        let receiver = match kind {
            CallKind::Static | CallKind::Dynamic => None,
            _ => Some(self.pop(stack, pc)?),
        };

        // `new T` + `dup` + `invokespecial <init>` folds into `new T(args)`.
        if kind == CallKind::Special && name == "<init>" {
            if let Some(Expression::New {
                class,
                initialized: false,
                id,
                ..
            }) = receiver.clone()
            {
                let folded = Expression::New {
                    class,
                    arguments,
                    initialized: true,
                    id,
                };
                if self.options.fold_constructor_new {
                    let replaced = replace_new(stack, id, &folded);
                    if !replaced {
                        self.flush_stack(stack, statements, pc, Expression::reads_memory);
                        statements.push(Statement::Expr {
                            expr: folded,
                            pc: Some(pc),
                        });
                    }
                    return Ok(());
                }
                // Unfolded mode shows the raw allocation and <init> call.
                let (kept, receiver) = self.duplicate(folded, statements, pc);
                replace_new(stack, id, &kept);
                statements.push(Statement::Expr {
                    expr: Expression::Call {
                        kind,
                        receiver: Some(Box::new(receiver)),
                        owner,
                        name,
                        arguments: Vec::new(),
                        descriptor,
                    },
                    pc: Some(pc),
                });
                return Ok(());
            }
            // Constructor chaining from inside a constructor.
            if self.is_constructor {
                let receiver = match receiver {
                    Some(Expression::This { .. }) if owner == self.super_name => {
                        Expression::Super {
                            class: self.super_name.to_string(),
                        }
                    }
                    Some(receiver) => receiver,
                    None => Expression::This {
                        class: self.class_name.to_string(),
                    },
                };
                self.flush_stack(stack, statements, pc, Expression::reads_memory);
                statements.push(Statement::Expr {
                    expr: Expression::Call {
                        kind,
                        receiver: Some(Box::new(receiver)),
                        owner,
                        name,
                        arguments,
                        descriptor,
                    },
                    pc: Some(pc),
                });
                return Ok(());
            }
        }

        // `invokespecial` on a superclass method from a subclass body is
        // a `super.m(...)` call.
        let receiver = match receiver {
            Some(Expression::This { .. })
                if kind == CallKind::Special && owner == self.super_name && name != "<init>" =>
            {
                Some(Expression::Super {
                    class: self.super_name.to_string(),
                })
            }
            other => other,
        };
        let call = Expression::Call {
            kind,
            receiver: receiver.map(Box::new),
            owner,
            name,
            arguments,
            descriptor: descriptor.clone(),
        };
        if descriptor.ret.is_void() {
            self.flush_stack(stack, statements, pc, Expression::reads_memory);
            statements.push(Statement::Expr {
                expr: call,
                pc: Some(pc),
            });
        } else {
            stack.push(call);
        }
        Ok(())
    }
}

/// Replaces every stacked copy of the uninitialized object `id` with the
/// folded constructor call. Returns whether anything was replaced.
fn replace_new(stack: &mut [Expression], id: u32, folded: &Expression) -> bool {
    let mut replaced = false;
    for entry in stack.iter_mut() {
        if let Expression::New {
            id: entry_id,
            initialized: false,
            ..
        } = entry
        {
            if *entry_id == id {
                *entry = folded.clone();
                replaced = true;
            }
        }
    }
    replaced
}

fn append_temp_assigns(
    statements: &mut Vec<Statement>,
    temps: &[(String, u16, FieldType)],
    values: Vec<Expression>,
) {
    for ((name, slot, ty), value) in temps.iter().zip(values) {
        if matches!(&value, Expression::Local { name: value_name, .. } if value_name == name) {
            continue;
        }
        statements.push(Statement::Assign {
            target: Expression::Local {
                name: name.clone(),
                slot: *slot,
                ty: ty.clone(),
            },
            value,
            op: None,
            pc: None,
        });
    }
}

fn element_type(array: &Expression, fallback: FieldType) -> FieldType {
    match array.ty() {
        FieldType::Array { element, dims } => {
            if dims <= 1 {
                *element
            } else {
                FieldType::Array {
                    element,
                    dims: dims - 1,
                }
            }
        }
        _ => fallback,
    }
}

fn reference_element(class: &str) -> (FieldType, u8) {
    if class.starts_with('[') {
        match FieldType::parse(class) {
            Ok(FieldType::Array { element, dims }) => (*element, dims),
            Ok(other) => (other, 0),
            Err(e) => {
                warn!("anewarray class failed to parse: {e}");
                (FieldType::object(class), 0)
            }
        }
    } else {
        (FieldType::Object(class.to_string()), 0)
    }
}

/// Local slot encoded in a numbered load or store mnemonic.
fn numbered_slot(mnemonic: Mnemonic) -> u16 {
    use Mnemonic::*;
    match mnemonic {
        Iload0 | Lload0 | Fload0 | Dload0 | Aload0 | Istore0 | Lstore0 | Fstore0 | Dstore0
        | Astore0 => 0,
        Iload1 | Lload1 | Fload1 | Dload1 | Aload1 | Istore1 | Lstore1 | Fstore1 | Dstore1
        | Astore1 => 1,
        Iload2 | Lload2 | Fload2 | Dload2 | Aload2 | Istore2 | Lstore2 | Fstore2 | Dstore2
        | Astore2 => 2,
        _ => 3,
    }
}

fn primitive_array_type(atype: u8) -> BaseType {
    match atype {
        4 => BaseType::Boolean,
        5 => BaseType::Char,
        6 => BaseType::Float,
        7 => BaseType::Double,
        8 => BaseType::Byte,
        9 => BaseType::Short,
        11 => BaseType::Long,
        _ => BaseType::Int,
    }
}
