//! Semantic analysis: name resolution, type deduction and call binding.
//!
//! The analyzer never mutates the tree. Everything it learns goes into an
//! [`Analysis`] value: expression types and call targets keyed by node id,
//! plus the symbol table of every scope, which code generation re-opens to
//! lay out stack slots.
//!
//! Functions in the recursion set get two traversals: a first one with
//! reporting disabled that establishes whatever types it can, then a
//! strict one that validates fully. Everything else is analyzed once,
//! strictly. Reports are queued; analysis continues past the first error.

use std::collections::HashMap;

use common::SourceLoc;

use crate::ast::{Block, Expr, ExprKind, NodeId, Stmt, StmtKind};
use crate::error::ErrorReport;
use crate::functions::{Analytics, FuncId};
use crate::symtab::{ScopeStack, SymbolInfo, Symtab};
use crate::types::Type;

/// How a call site reaches its callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    /// Statically bound to a function table entry; the call site jumps
    /// straight at the function's entry address.
    Static(FuncId),
    /// The callee is a function-pointer variable; the call site jumps
    /// through the pointer at runtime.
    Pointer,
}

/// Everything the analyzer learned about one tree.
#[derive(Debug, Default)]
pub struct Analysis<'a> {
    /// Deduced expression types.
    pub expr_types: HashMap<NodeId, Type>,
    /// Symbol table of every block, control header and parameter list,
    /// keyed by the owning node.
    pub scopes: HashMap<NodeId, Symtab<'a>>,
    /// Resolution of every call site.
    pub call_targets: HashMap<NodeId, CallTarget>,
    /// Variable expressions and pointer conversions that resolve to a
    /// table function.
    pub fn_refs: HashMap<NodeId, FuncId>,
    /// Queued diagnostics, errors and warnings both.
    pub reports: Vec<ErrorReport>,
}

/// Lvalue/rvalue analysis state. Lvalue is entered only from assignment
/// targets and permits declaring a name on first sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Lvalue,
    Rvalue,
}

/// What the surrounding context does with a block's tail value, and
/// whether the void-block flag is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockCtx {
    /// The main scope: results are discarded but unused values still warn.
    Main,
    /// Result syntactically discarded (loop bodies, `if` arms, nested
    /// blocks): unused-value warnings are suppressed.
    Void,
    /// Value block in expression position: the tail value is the result.
    Value,
    /// Function body. `known_void` is true once the return type is known
    /// to be void, which turns the void-block flag on.
    FnBody { known_void: bool },
}

/// Analyze the tree rooted at `root` against the explorer's analytics.
///
/// Function return types are written back into the analytics table.
pub fn analyze<'a>(root: &'a Block<'a>, analytics: &mut Analytics<'a>) -> Analysis<'a> {
    let mut analyzer = Analyzer {
        analytics,
        analysis: Analysis::default(),
        scopes: ScopeStack::new(),
        assign_value_ty: None,
        strict: true,
        current_fn: None,
        returns: Vec::new(),
    };

    // Deduction starts from scratch on every run.
    for id in analyzer.analytics.ids_vec() {
        analyzer.analytics.table.get_mut(id).ty.ret = None;
    }

    // First traversal of recursive functions: reporting off, establish
    // parameter and return types where possible.
    analyzer.strict = false;
    for id in analyzer.analytics.ids_vec() {
        if analyzer.analytics.is_recursive(id) {
            analyzer.analyze_function(id);
        }
    }

    // Strict traversal of every function.
    analyzer.strict = true;
    for id in analyzer.analytics.ids_vec() {
        analyzer.analyze_function(id);
    }

    // Main scope last, with every signature available.
    analyzer.current_fn = None;
    analyzer.analyze_block(root, BlockCtx::Main);

    analyzer.analysis
}

/// Small extension used by the analyzer to iterate ids while mutating.
trait AnalyticsExt {
    fn ids_vec(&self) -> Vec<FuncId>;
}

impl<'a> AnalyticsExt for Analytics<'a> {
    fn ids_vec(&self) -> Vec<FuncId> {
        self.table.ids().collect()
    }
}

struct Analyzer<'a, 'b> {
    analytics: &'b mut Analytics<'a>,
    analysis: Analysis<'a>,
    scopes: ScopeStack<'a>,
    /// Type of the value being assigned while targets are walked in
    /// lvalue mode; drives implicit declarations.
    assign_value_ty: Option<Type>,
    /// When false (first recursive traversal) nothing is reported.
    strict: bool,
    current_fn: Option<FuncId>,
    /// Return statements collected while walking the current function
    /// body. Nested function definitions are not entered, so they never
    /// contribute here.
    returns: Vec<(SourceLoc, Option<Type>)>,
}

impl<'a, 'b> Analyzer<'a, 'b> {
    fn report(&mut self, report: ErrorReport) {
        if self.strict {
            self.analysis.reports.push(report);
        }
    }

    fn open_scope(&mut self, owner: NodeId) {
        let tab = self.analysis.scopes.remove(&owner).unwrap_or_default();
        self.scopes.push(owner, tab);
    }

    fn close_scope(&mut self) {
        let (owner, tab) = self.scopes.pop().expect("unbalanced scope stack");
        self.analysis.scopes.insert(owner, tab);
    }

    fn set_type(&mut self, id: NodeId, ty: Type) {
        self.analysis.expr_types.insert(id, ty);
    }

    /// Report when a known type is not `int`.
    fn expect_int(&mut self, ty: &Option<Type>, loc: SourceLoc) {
        if let Some(ty) = ty {
            if *ty != Type::Int {
                self.report(ErrorReport::error(
                    format!("expression is not of type 'int' (found '{}')", ty),
                    loc,
                ));
            }
        }
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn analyze_function(&mut self, id: FuncId) {
        let def = self.analytics.table.get(id).def;

        let saved_fn = self.current_fn.replace(id);
        let saved_returns = std::mem::take(&mut self.returns);

        self.open_scope(def.id);
        for param in def.params {
            self.scopes.declare(
                param.name,
                SymbolInfo {
                    loc: param.loc,
                    ty: Type::Int,
                },
            );
        }

        let ret_ty = {
            // On the strict traversal of a recursive function the return
            // type from the first traversal is already in the table.
            let known_void = matches!(
                self.analytics.table.get(id).ty.ret_type(),
                Some(Type::Void)
            );
            let tail_ty = self.analyze_block(def.body, BlockCtx::FnBody { known_void });
            self.deduce_return_type(def.loc, tail_ty)
        };

        self.close_scope();
        self.returns = saved_returns;
        self.current_fn = saved_fn;

        self.analytics.table.get_mut(id).ty.ret = ret_ty.map(Box::new);
    }

    /// Deduce a function's return type from the collected return
    /// statements and the body's tail value, if any.
    fn deduce_return_type(&mut self, fn_loc: SourceLoc, tail_ty: Option<Type>) -> Option<Type> {
        let mut candidates: Vec<(SourceLoc, Type)> = Vec::new();
        let mut unknown = false;

        for (loc, ty) in std::mem::take(&mut self.returns) {
            match ty {
                Some(ty) => candidates.push((loc, ty)),
                None => unknown = true,
            }
        }
        if let Some(ty) = tail_ty {
            if !ty.is_void() {
                candidates.push((fn_loc, ty));
            }
        }

        match candidates.split_first() {
            None => {
                if unknown {
                    // A return whose type could not be established yet.
                    None
                } else {
                    Some(Type::Void)
                }
            }
            Some(((_, first), rest)) => {
                if let Some((loc, other)) = rest.iter().find(|(_, ty)| ty != first) {
                    self.report(ErrorReport::error(
                        format!(
                            "mismatched return types: expected '{}', found '{}'",
                            first, other
                        ),
                        *loc,
                    ));
                }
                Some(first.clone())
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Walk a block and return its tail value type (for value-yielding
    /// contexts).
    fn analyze_block(&mut self, block: &'a Block<'a>, ctx: BlockCtx) -> Option<Type> {
        self.open_scope(block.id);

        let mut tail_ty = None;
        let last_index = block.stmts.len().wrapping_sub(1);
        for (i, stmt) in block.stmts.iter().enumerate() {
            tail_ty = self.analyze_stmt(stmt, i == last_index, ctx);
        }

        self.close_scope();
        tail_ty
    }

    /// Returns the statement's value type when it is an expression
    /// statement, so the block can surface its tail value.
    fn analyze_stmt(&mut self, stmt: &'a Stmt<'a>, is_last: bool, ctx: BlockCtx) -> Option<Type> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                let ty = self.analyze_expr(expr, Mode::Rvalue);
                let value_used = is_last
                    && matches!(
                        ctx,
                        BlockCtx::Value | BlockCtx::FnBody { known_void: false }
                    );
                let suppressed = matches!(
                    ctx,
                    BlockCtx::Void | BlockCtx::FnBody { known_void: true }
                );
                if self.strict && is_pure(expr) && !value_used && !suppressed {
                    self.analysis
                        .reports
                        .push(ErrorReport::warning("expression result unused", expr.loc));
                }
                ty
            }
            StmtKind::Print(expr) => {
                let ty = self.analyze_expr(expr, Mode::Rvalue);
                self.expect_int(&ty, expr.loc);
                None
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.open_scope(stmt.id);
                let cond_ty = self.analyze_expr(cond, Mode::Rvalue);
                self.expect_int(&cond_ty, cond.loc);
                self.analyze_block(then_block, BlockCtx::Void);
                if let Some(else_block) = else_block {
                    self.analyze_block(else_block, BlockCtx::Void);
                }
                self.close_scope();
                None
            }
            StmtKind::While { cond, body } => {
                self.open_scope(stmt.id);
                let cond_ty = self.analyze_expr(cond, Mode::Rvalue);
                self.expect_int(&cond_ty, cond.loc);
                self.analyze_block(body, BlockCtx::Void);
                self.close_scope();
                None
            }
            StmtKind::Return(value) => {
                if self.current_fn.is_none() {
                    self.report(ErrorReport::error("return outside of a function", stmt.loc));
                    if let Some(value) = value {
                        self.analyze_expr(value, Mode::Rvalue);
                    }
                    return None;
                }
                let entry = match value {
                    Some(value) => {
                        let ty = self.analyze_expr(value, Mode::Rvalue);
                        (stmt.loc, ty)
                    }
                    None => (stmt.loc, Some(Type::Void)),
                };
                self.returns.push(entry);
                None
            }
            StmtKind::Block(block) => {
                self.analyze_block(block, BlockCtx::Void);
                None
            }
            // Definitions are analyzed through the function table, not in
            // place; an enclosing body never descends into them.
            StmtKind::FnDef(_) => None,
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn analyze_expr(&mut self, expr: &'a Expr<'a>, mode: Mode) -> Option<Type> {
        let ty = match &expr.kind {
            ExprKind::Const(_) => Some(Type::Int),
            ExprKind::Read => Some(Type::Int),
            ExprKind::Variable { name, annot } => self.analyze_variable(expr, name, *annot, mode),
            ExprKind::Binary { left, right, .. } => {
                let lhs = self.analyze_expr(left, Mode::Rvalue);
                let rhs = self.analyze_expr(right, Mode::Rvalue);
                self.expect_int(&lhs, left.loc);
                self.expect_int(&rhs, right.loc);
                Some(Type::Int)
            }
            ExprKind::Unary { operand, .. } => {
                let operand_ty = self.analyze_expr(operand, Mode::Rvalue);
                self.expect_int(&operand_ty, operand.loc);
                Some(Type::Int)
            }
            ExprKind::Subscript { base, index } => self.analyze_subscript(expr, base, index, mode),
            ExprKind::Assign { targets, value } => {
                let value_ty = self.analyze_expr(value, Mode::Rvalue);
                let saved = std::mem::replace(&mut self.assign_value_ty, value_ty.clone());
                for target in *targets {
                    self.analyze_expr(target, Mode::Lvalue);
                }
                self.assign_value_ty = saved;
                value_ty
            }
            ExprKind::Call { callee, args } => self.analyze_call(expr, callee, args),
            ExprKind::FnToPtr { def } => {
                let id = self
                    .analytics
                    .table
                    .lookup_def(def.id)
                    .or_else(|| def.name.and_then(|n| self.analytics.table.lookup_name(n)));
                match id {
                    Some(id) => {
                        self.analysis.fn_refs.insert(expr.id, id);
                        Some(Type::Function(self.analytics.table.get(id).ty.clone()))
                    }
                    None => None,
                }
            }
            ExprKind::Block(block) => {
                let tail = self.analyze_block(block, BlockCtx::Value);
                match tail {
                    Some(ty) if !ty.is_void() => Some(ty),
                    _ => {
                        if self.strict {
                            self.analysis.reports.push(ErrorReport::error(
                                "block used as an expression has no result value",
                                expr.loc,
                            ));
                        }
                        None
                    }
                }
            }
            ExprKind::Error { msg } => {
                self.report(ErrorReport::error(msg.to_string(), expr.loc));
                None
            }
        };

        if let Some(ty) = &ty {
            self.set_type(expr.id, ty.clone());
        }
        ty
    }

    fn analyze_variable(
        &mut self,
        expr: &'a Expr<'a>,
        name: &'a str,
        annot: Option<&'a Type>,
        mode: Mode,
    ) -> Option<Type> {
        if let Some(info) = self.scopes.lookup(name) {
            let ty = info.ty.clone();
            if mode == Mode::Lvalue {
                if let Some(value_ty) = self.assign_value_ty.clone() {
                    if ty != value_ty {
                        self.report(ErrorReport::error(
                            format!("cannot assign '{}' to '{}' variable `{}`", value_ty, ty, name),
                            expr.loc,
                        ));
                    }
                }
            }
            return Some(ty);
        }

        match mode {
            Mode::Lvalue => {
                // First sight of the name in assignment position declares
                // it in the innermost scope.
                let ty = annot
                    .cloned()
                    .or_else(|| self.assign_value_ty.clone())
                    .unwrap_or(Type::Int);
                self.scopes.declare(
                    name,
                    SymbolInfo {
                        loc: expr.loc,
                        ty: ty.clone(),
                    },
                );
                Some(ty)
            }
            Mode::Rvalue => {
                if let Some(annot) = annot {
                    // Bare annotated mention declares the variable, which
                    // is how arrays enter a scope.
                    self.scopes.declare(
                        name,
                        SymbolInfo {
                            loc: expr.loc,
                            ty: annot.clone(),
                        },
                    );
                    return Some(annot.clone());
                }
                if let Some(id) = self.analytics.table.lookup_name(name) {
                    self.analysis.fn_refs.insert(expr.id, id);
                    return Some(Type::Function(self.analytics.table.get(id).ty.clone()));
                }
                self.report(ErrorReport::error(
                    format!("use of undeclared variable `{}`", name),
                    expr.loc,
                ));
                None
            }
        }
    }

    fn analyze_subscript(
        &mut self,
        expr: &'a Expr<'a>,
        base: &'a Expr<'a>,
        index: &'a Expr<'a>,
        mode: Mode,
    ) -> Option<Type> {
        let index_ty = self.analyze_expr(index, Mode::Rvalue);
        self.expect_int(&index_ty, index.loc);

        let ExprKind::Variable { name, .. } = &base.kind else {
            self.report(ErrorReport::error(
                "subscript base must be a variable",
                base.loc,
            ));
            return None;
        };

        // The base must already be declared, even in lvalue position;
        // assigning through a subscript never declares an array.
        let Some(info) = self.scopes.lookup(name) else {
            self.report(ErrorReport::error(
                format!("use of undeclared variable `{}`", name),
                base.loc,
            ));
            return None;
        };
        let base_ty = info.ty.clone();
        self.set_type(base.id, base_ty.clone());

        let Type::Array { elem, .. } = base_ty else {
            self.report(ErrorReport::error(
                format!("`{}` is not an array (found '{}')", name, base_ty),
                base.loc,
            ));
            return None;
        };
        let elem_ty = *elem;

        if mode == Mode::Lvalue {
            if let Some(value_ty) = self.assign_value_ty.clone() {
                if elem_ty != value_ty {
                    self.report(ErrorReport::error(
                        format!("cannot assign '{}' to '{}' element", value_ty, elem_ty),
                        expr.loc,
                    ));
                }
            }
        }
        Some(elem_ty)
    }

    fn analyze_call(
        &mut self,
        expr: &'a Expr<'a>,
        callee: &'a str,
        args: &'a [&'a Expr<'a>],
    ) -> Option<Type> {
        for arg in args {
            let arg_ty = self.analyze_expr(arg, Mode::Rvalue);
            self.expect_int(&arg_ty, arg.loc);
        }

        // A local function-pointer variable shadows a table function of
        // the same name.
        let (target, arity, ret) = if let Some(info) = self.scopes.lookup(callee) {
            match &info.ty {
                Type::Function(ft) => {
                    (CallTarget::Pointer, ft.arity(), ft.ret_type().cloned())
                }
                other => {
                    let other = other.clone();
                    self.report(ErrorReport::error(
                        format!("`{}` is not callable (found '{}')", callee, other),
                        expr.loc,
                    ));
                    return None;
                }
            }
        } else if let Some(id) = self.analytics.table.lookup_name(callee) {
            let info = self.analytics.table.get(id);
            (
                CallTarget::Static(id),
                info.ty.arity(),
                info.ty.ret_type().cloned(),
            )
        } else {
            self.report(ErrorReport::error(
                format!("call to undeclared function `{}`", callee),
                expr.loc,
            ));
            return None;
        };

        if args.len() != arity {
            self.report(ErrorReport::error(
                format!(
                    "wrong number of arguments in call to `{}`: expected {}, found {}",
                    callee,
                    arity,
                    args.len()
                ),
                expr.loc,
            ));
        }

        self.analysis.call_targets.insert(expr.id, target);

        match ret {
            Some(ty) => Some(ty),
            None => {
                self.report(ErrorReport::error(
                    format!("cannot deduce the return type of `{}`", callee),
                    expr.loc,
                ));
                None
            }
        }
    }
}

/// Expressions with no side effect; their discarded value is worth a
/// warning. A bare annotated variable mention is a declaration and
/// therefore not pure.
fn is_pure(expr: &Expr<'_>) -> bool {
    match &expr.kind {
        ExprKind::Const(_)
        | ExprKind::Binary { .. }
        | ExprKind::Unary { .. }
        | ExprKind::Subscript { .. }
        | ExprKind::FnToPtr { .. } => true,
        ExprKind::Variable { annot, .. } => annot.is_none(),
        _ => false,
    }
}
