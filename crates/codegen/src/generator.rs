//! The code generator.
//!
//! Walks the analyzed tree and emits instructions through the bytecode
//! builder while mirroring every stack effect in the frame model. Forward
//! control flow is emitted with placeholder operands and patched once the
//! target offset is known; function entry addresses and call resume
//! addresses live in the constant pool as late-bound constants written
//! during the final merge.

use std::collections::HashMap;

use common::{create_logger, log, Logger};

use bytecode::{BytecodeBuilder, Chunk, Opcode};
use frontend::{
    Analysis, Analytics, BinOp, Block, CallTarget, Expr, ExprKind, FuncId, Stmt, StmtKind, Type,
    UnOp,
};

use crate::frame::StackFrame;

/// A constant-pool slot whose value is a code address patched after the
/// target is emitted.
#[derive(Debug)]
struct RelocConst {
    index: u32,
    address: u32,
}

/// Like [`RelocConst`], but the address is a function entry resolved from
/// the function table at the end of generation.
#[derive(Debug)]
struct DynConst {
    index: u32,
    func: FuncId,
}

/// How the surrounding context treats a block's tail value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockMode {
    /// Plain statement block: every statement's value is discarded.
    Plain,
    /// Value block in expression position: tail value survives via `R0`.
    Value,
    /// Body of a void function.
    FnBodyVoid,
    /// Body of a non-void function: tail value moves to `R0` for the
    /// caller to collect.
    FnBodyValue,
}

impl BlockMode {
    fn captures_tail(self) -> bool {
        matches!(self, BlockMode::Value | BlockMode::FnBodyValue)
    }
}

/// Generate a chunk for a fully analyzed, error-free tree.
pub fn generate<'a>(
    root: &'a Block<'a>,
    analysis: &Analysis<'a>,
    analytics: &Analytics<'a>,
) -> Chunk {
    let mut generator = Generator {
        analysis,
        analytics,
        builder: BytecodeBuilder::new(),
        frame: StackFrame::new(),
        constants: HashMap::new(),
        ret_addr_consts: Vec::new(),
        dyn_addr_consts: Vec::new(),
        call_relocs: Vec::new(),
        fn_addrs: HashMap::new(),
        currently_statement: false,
        log: create_logger("codegen"),
    };
    generator.generate_all(root);
    generator.into_chunk()
}

struct Generator<'a, 'ctx> {
    analysis: &'ctx Analysis<'a>,
    analytics: &'ctx Analytics<'a>,

    builder: BytecodeBuilder,
    frame: StackFrame<'a>,

    /// Literal interning: value to pool index.
    constants: HashMap<i32, u32>,
    /// Late-bound call resume addresses.
    ret_addr_consts: Vec<RelocConst>,
    /// Late-bound function entry addresses (pointer reification).
    dyn_addr_consts: Vec<DynConst>,
    /// Static call sites waiting for their callee's entry address.
    call_relocs: Vec<(u32, FuncId)>,
    /// Entry address of every generated function.
    fn_addrs: HashMap<FuncId, u32>,

    /// Set while emitting an assignment whose value is discarded, so the
    /// chain skips its trailing push.
    currently_statement: bool,

    log: Logger,
}

impl<'a, 'ctx> Generator<'a, 'ctx> {
    // ------------------------------------------------------------------
    // Emission helpers: every opcode is paired with its stack effect.
    // ------------------------------------------------------------------

    fn emit_inc(&mut self, opcode: Opcode, operands: &[i32]) -> u32 {
        self.frame.push_dummy();
        self.builder.emit(opcode, operands)
    }

    fn emit_dec(&mut self, opcode: Opcode, operands: &[i32]) -> u32 {
        self.frame.pop_dummy();
        self.builder.emit(opcode, operands)
    }

    fn emit_pop(&mut self) {
        self.emit_dec(Opcode::Pop, &[]);
    }

    fn intern_constant(&mut self, value: i32) -> u32 {
        if let Some(&index) = self.constants.get(&value) {
            return index;
        }
        let index = self.current_constant_index();
        self.constants.insert(value, index);
        index
    }

    /// Next free pool index across literals and both late-bound lists.
    fn current_constant_index(&self) -> u32 {
        (self.constants.len() + self.ret_addr_consts.len() + self.dyn_addr_consts.len()) as u32
    }

    /// Push a late-bound function entry address.
    fn emit_fn_addr_const(&mut self, func: FuncId) {
        let index = self.current_constant_index();
        self.dyn_addr_consts.push(DynConst { index, func });
        self.emit_inc(Opcode::PushConst, &[index as i32]);
    }

    fn slot_of(&self, name: &str) -> i32 {
        self.frame
            .lookup(name)
            .expect("analysis admitted an unallocated name") as i32
    }

    fn expr_type(&self, expr: &Expr<'a>) -> Option<&Type> {
        self.analysis.expr_types.get(&expr.id)
    }

    // ------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------

    fn generate_all(&mut self, root: &'a Block<'a>) {
        log!(self.log, "generating main scope");
        self.gen_block(root, BlockMode::Plain);
        self.builder.emit(Opcode::Ret, &[]);
        debug_assert_eq!(self.frame.size(), 0, "main scope is not stack-neutral");

        for id in self.analytics.table.ids() {
            self.generate_function(id);
        }

        // Static call sites now know their targets.
        for (offset, func) in std::mem::take(&mut self.call_relocs) {
            let address = self.fn_addrs[&func];
            self.builder.patch_operand(offset, 0, address as i32);
        }
    }

    fn generate_function(&mut self, id: FuncId) {
        let info = self.analytics.table.get(id);
        let def = info.def;
        let ret_void = matches!(info.ty.ret_type(), Some(Type::Void));
        log!(self.log, "generating function {}", info.name);

        self.frame.clear();
        self.frame.begin_scope();
        for param in def.params {
            self.frame.push_var(param.name);
        }
        self.fn_addrs.insert(id, self.builder.current_offset());

        let mode = if ret_void {
            BlockMode::FnBodyVoid
        } else {
            BlockMode::FnBodyValue
        };
        self.gen_block(def.body, mode);

        for _ in 0..def.params.len() {
            self.emit_pop();
        }
        self.builder.emit(Opcode::Return, &[]);

        debug_assert_eq!(self.frame.size(), 0, "function frame is not stack-neutral");
        self.frame.end_scope();
    }

    // ------------------------------------------------------------------
    // Blocks and statements
    // ------------------------------------------------------------------

    fn gen_block(&mut self, block: &'a Block<'a>, mode: BlockMode) {
        let empty = frontend::Symtab::new();
        let symtab = self.analysis.scopes.get(&block.id).unwrap_or(&empty);
        let slots = self.frame.begin_scope_with(symtab);

        if slots > 0 {
            let zero = self.intern_constant(0);
            for _ in 0..slots {
                // Depth already accounted by the scope's slot allocation.
                self.builder.emit(Opcode::PushConst, &[zero as i32]);
            }
        }

        let last_index = block.stmts.len().wrapping_sub(1);
        for (i, stmt) in block.stmts.iter().enumerate() {
            let depth_before = self.frame.size();
            let capture = i == last_index && mode.captures_tail();
            self.gen_stmt(stmt, capture);
            debug_assert_eq!(
                self.frame.size(),
                depth_before,
                "statement is not stack-neutral"
            );
        }

        for _ in 0..slots {
            self.emit_pop();
        }
        self.frame.end_scope();

        if mode == BlockMode::Value {
            // The tail value rode out in R0 while the locals were popped.
            self.emit_inc(Opcode::StoreR0, &[]);
        }
    }

    /// Emit one statement. `capture` marks the tail of a value-yielding
    /// block: instead of being dropped, the statement's value is moved to
    /// `R0`.
    fn gen_stmt(&mut self, stmt: &'a Stmt<'a>, capture: bool) {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                let is_void = matches!(self.expr_type(expr), Some(Type::Void));
                if capture && !is_void {
                    self.gen_value(expr);
                    self.emit_dec(Opcode::LoadR0, &[]);
                } else if matches!(expr.kind, ExprKind::Assign { .. }) {
                    // Discarded assignment: skip the trailing push rather
                    // than emitting push-then-pop.
                    self.currently_statement = true;
                    self.gen_expr(expr);
                } else {
                    self.gen_value(expr);
                    // A void call leaves nothing behind to drop.
                    if !is_void {
                        self.emit_pop();
                    }
                }
            }
            StmtKind::Print(expr) => {
                self.gen_value(expr);
                self.emit_dec(Opcode::Print, &[]);
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => self.gen_if(stmt, cond, then_block, *else_block),
            StmtKind::While { cond, body } => self.gen_while(stmt, cond, body),
            StmtKind::Return(value) => self.gen_return(*value),
            StmtKind::Block(block) => self.gen_block(block, BlockMode::Plain),
            // Function bodies are emitted after the main scope.
            StmtKind::FnDef(_) => {}
        }
    }

    fn gen_if(
        &mut self,
        stmt: &'a Stmt<'a>,
        cond: &'a Expr<'a>,
        then_block: &'a Block<'a>,
        else_block: Option<&'a Block<'a>>,
    ) {
        let empty = frontend::Symtab::new();
        let symtab = self.analysis.scopes.get(&stmt.id).unwrap_or(&empty);
        let slots = self.frame.begin_scope_with(symtab);
        if slots > 0 {
            let zero = self.intern_constant(0);
            for _ in 0..slots {
                self.builder.emit(Opcode::PushConst, &[zero as i32]);
            }
        }

        self.gen_value(cond);
        let to_false = self.emit_dec(Opcode::JmpFalse, &[0]);

        match else_block {
            None => {
                self.gen_block(then_block, BlockMode::Plain);
                let after = self.builder.current_offset();
                self.builder.patch_operand(to_false, 0, after as i32);
            }
            Some(else_block) => {
                self.gen_block(then_block, BlockMode::Plain);
                let to_end = self.builder.emit(Opcode::Jmp, &[0]);
                let else_at = self.builder.current_offset();
                self.builder.patch_operand(to_false, 0, else_at as i32);
                self.gen_block(else_block, BlockMode::Plain);
                let end = self.builder.current_offset();
                self.builder.patch_operand(to_end, 0, end as i32);
            }
        }

        for _ in 0..slots {
            self.emit_pop();
        }
        self.frame.end_scope();
    }

    fn gen_while(&mut self, stmt: &'a Stmt<'a>, cond: &'a Expr<'a>, body: &'a Block<'a>) {
        let empty = frontend::Symtab::new();
        let symtab = self.analysis.scopes.get(&stmt.id).unwrap_or(&empty);
        let slots = self.frame.begin_scope_with(symtab);
        if slots > 0 {
            let zero = self.intern_constant(0);
            for _ in 0..slots {
                self.builder.emit(Opcode::PushConst, &[zero as i32]);
            }
        }

        let start = self.builder.current_offset();
        self.gen_value(cond);
        let to_exit = self.emit_dec(Opcode::JmpFalse, &[0]);

        self.gen_block(body, BlockMode::Plain);
        self.builder.emit(Opcode::Jmp, &[start as i32]);
        let after = self.builder.current_offset();
        self.builder.patch_operand(to_exit, 0, after as i32);

        for _ in 0..slots {
            self.emit_pop();
        }
        self.frame.end_scope();
    }

    fn gen_return(&mut self, value: Option<&'a Expr<'a>>) {
        if let Some(value) = value {
            self.gen_value(value);
            self.emit_dec(Opcode::LoadR0, &[]);
        }

        // Everything in the frame model sits above the saved base and
        // resume address; clear it without disturbing the model, which
        // keeps describing the fall-through path.
        for _ in 0..self.frame.size() {
            self.builder.emit(Opcode::Pop, &[]);
        }
        self.builder.emit(Opcode::Return, &[]);
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Emit an expression in value position.
    fn gen_value(&mut self, expr: &'a Expr<'a>) {
        self.currently_statement = false;
        self.gen_expr(expr);
    }

    fn gen_expr(&mut self, expr: &'a Expr<'a>) {
        match &expr.kind {
            ExprKind::Const(value) => {
                let index = self.intern_constant(*value);
                self.emit_inc(Opcode::PushConst, &[index as i32]);
            }
            ExprKind::Read => {
                self.emit_inc(Opcode::PushRead, &[]);
            }
            ExprKind::Variable { name, .. } => {
                if let Some(&func) = self.analysis.fn_refs.get(&expr.id) {
                    self.emit_fn_addr_const(func);
                } else {
                    let slot = self.slot_of(name);
                    self.emit_inc(Opcode::PushLocalRel, &[slot]);
                }
            }
            ExprKind::Binary { op, left, right } => {
                self.gen_value(left);
                self.gen_value(right);
                self.emit_dec(bin_opcode(*op), &[]);
            }
            ExprKind::Unary { op, operand } => match op {
                UnOp::Plus => self.gen_value(operand),
                UnOp::Neg => {
                    let zero = self.intern_constant(0);
                    self.emit_inc(Opcode::PushConst, &[zero as i32]);
                    self.gen_value(operand);
                    self.emit_dec(Opcode::Sub, &[]);
                }
                UnOp::Not => {
                    self.gen_value(operand);
                    self.builder.emit(Opcode::Not, &[]);
                }
            },
            ExprKind::Subscript { base, index } => {
                self.gen_value(index);
                let slot = self.base_slot(base);
                // Consumes the index, pushes the element.
                self.builder.emit(Opcode::PushLocalDyn, &[slot]);
            }
            ExprKind::Assign { targets, value } => self.gen_assign(targets, value),
            ExprKind::Call { callee, args } => self.gen_call(expr, callee, args),
            ExprKind::FnToPtr { .. } => {
                let func = self.analysis.fn_refs[&expr.id];
                self.emit_fn_addr_const(func);
            }
            ExprKind::Block(block) => self.gen_block(block, BlockMode::Value),
            ExprKind::Error { .. } => {
                unreachable!("error nodes never reach code generation")
            }
        }
    }

    fn base_slot(&self, base: &'a Expr<'a>) -> i32 {
        match &base.kind {
            ExprKind::Variable { name, .. } => self.slot_of(name),
            _ => unreachable!("analysis admitted a non-variable subscript base"),
        }
    }

    fn gen_assign(&mut self, targets: &'a [&'a Expr<'a>], value: &'a Expr<'a>) {
        let emit_push = !self.currently_statement;
        self.gen_value(value);

        // Targets are stored outermost-first; the chain stores innermost
        // outward, re-pushing the value for every link but the last.
        for target in targets.iter().skip(1).rev() {
            self.gen_store(target, true);
        }
        if let Some(outermost) = targets.first() {
            self.gen_store(outermost, emit_push);
        }
    }

    /// Store the stack top into `target`. With `keep_value` the assigned
    /// value is left on the stack for the enclosing expression.
    fn gen_store(&mut self, target: &'a Expr<'a>, keep_value: bool) {
        match &target.kind {
            ExprKind::Variable { name, .. } => {
                let slot = self.slot_of(name);
                self.emit_dec(Opcode::MovLocalRel, &[slot]);
                if keep_value {
                    self.emit_inc(Opcode::PushLocalRel, &[slot]);
                }
            }
            ExprKind::Subscript { base, index } => {
                self.gen_value(index);
                let slot = self.base_slot(base);
                // Consumes the index, stores the (kept) value beneath it.
                self.emit_dec(Opcode::MovLocalDyn, &[slot]);
                if !keep_value {
                    self.emit_pop();
                }
            }
            _ => unreachable!("analysis admitted a non-lvalue assignment target"),
        }
    }

    fn gen_call(&mut self, expr: &'a Expr<'a>, callee: &'a str, args: &'a [&'a Expr<'a>]) {
        let target = self.analysis.call_targets[&expr.id];
        let returns_value = !matches!(self.expr_type(expr), Some(Type::Void));

        // Reserve a pool slot for the caller-resume address.
        let const_index = self.current_constant_index();
        self.ret_addr_consts.push(RelocConst {
            index: const_index,
            address: 0,
        });
        let reloc = self.ret_addr_consts.len() - 1;

        // Isolating scope: the resume address and saved base are not
        // addressable as locals.
        self.frame.begin_scope();
        self.emit_inc(Opcode::PushConst, &[const_index as i32]);
        self.emit_inc(Opcode::SetupCall, &[]);

        for arg in args {
            self.gen_value(arg);
        }
        self.builder.emit(Opcode::UpdateSp, &[args.len() as i32]);

        match target {
            CallTarget::Static(func) => {
                let site = self.builder.emit(Opcode::Jmp, &[0]);
                self.call_relocs.push((site, func));
            }
            CallTarget::Pointer => {
                // The pointer variable lives below the frame the call just
                // carved; address it relative to the new base.
                let depth_below_args = (self.frame.size() - args.len() as u32) as i32;
                let rel = self.slot_of(callee) - depth_below_args;
                self.emit_inc(Opcode::PushLocalRel, &[rel]);
                self.emit_dec(Opcode::JmpDynamic, &[]);
            }
        }

        self.ret_addr_consts[reloc].address = self.builder.current_offset();
        self.frame.end_scope();

        if returns_value {
            self.emit_inc(Opcode::StoreR0, &[]);
        }
    }
}

fn bin_opcode(op: BinOp) -> Opcode {
    match op {
        BinOp::Add => Opcode::Add,
        BinOp::Sub => Opcode::Sub,
        BinOp::Mul => Opcode::Mul,
        BinOp::Div => Opcode::Div,
        BinOp::Mod => Opcode::Mod,
        BinOp::Eq => Opcode::CmpEq,
        BinOp::Ne => Opcode::CmpNe,
        BinOp::Gt => Opcode::CmpGt,
        BinOp::Ls => Opcode::CmpLs,
        BinOp::Ge => Opcode::CmpGe,
        BinOp::Le => Opcode::CmpLe,
        BinOp::And => Opcode::And,
        BinOp::Or => Opcode::Or,
    }
}

impl<'a, 'ctx> Generator<'a, 'ctx> {
    fn into_chunk(self) -> Chunk {
        debug_assert!(self.call_relocs.is_empty(), "unresolved call relocations");

        let mut constants = vec![0i32; self.current_constant_index() as usize];
        for (&value, &index) in &self.constants {
            constants[index as usize] = value;
        }
        for reloc in &self.ret_addr_consts {
            constants[reloc.index as usize] = reloc.address as i32;
        }
        for dyn_const in &self.dyn_addr_consts {
            constants[dyn_const.index as usize] = self.fn_addrs[&dyn_const.func] as i32;
        }

        Chunk::new(constants, self.builder.into_code())
    }
}
