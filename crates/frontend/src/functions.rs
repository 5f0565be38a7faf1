//! Function discovery: the first sub-pass of semantic analysis.
//!
//! The explorer walks the whole tree (nested definitions included), names
//! anonymous functions, builds the function table and records caller to
//! callee edges. Definitions that can call themselves back, directly or
//! through a cycle, end up in the recursion set; the analyzer gives those
//! a two-pass treatment.

use std::collections::{HashMap, HashSet};

use bumpalo::Bump;

use crate::ast::{Block, Expr, ExprKind, FnDef, NodeId, Stmt, StmtKind};
use crate::error::ErrorReport;
use crate::types::{FuncType, Type};

/// Index into the function table. Table order is definition order, which
/// is also the order function bodies are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

/// One discovered function.
#[derive(Debug)]
pub struct FuncInfo<'a> {
    /// Declared or synthesized (`$anon-N`) name.
    pub name: &'a str,
    pub def: &'a FnDef<'a>,
    /// Signature; the return type starts undetermined.
    pub ty: FuncType,
}

/// Registry of every function definition in the program.
#[derive(Debug, Default)]
pub struct FunctionTable<'a> {
    funcs: Vec<FuncInfo<'a>>,
    by_name: HashMap<&'a str, FuncId>,
    by_def: HashMap<NodeId, FuncId>,
}

impl<'a> FunctionTable<'a> {
    /// Register a definition under `name`. On a name clash the existing id
    /// is returned as the error value.
    pub fn define(&mut self, name: &'a str, def: &'a FnDef<'a>) -> Result<FuncId, FuncId> {
        if let Some(&existing) = self.by_name.get(name) {
            return Err(existing);
        }
        let id = FuncId(self.funcs.len() as u32);
        let params = vec![Type::Int; def.params.len()];
        self.funcs.push(FuncInfo {
            name,
            def,
            ty: FuncType::new(params, None),
        });
        self.by_name.insert(name, id);
        self.by_def.insert(def.id, id);
        Ok(id)
    }

    pub fn get(&self, id: FuncId) -> &FuncInfo<'a> {
        &self.funcs[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: FuncId) -> &mut FuncInfo<'a> {
        &mut self.funcs[id.0 as usize]
    }

    pub fn lookup_name(&self, name: &str) -> Option<FuncId> {
        self.by_name.get(name).copied()
    }

    pub fn lookup_def(&self, def_id: NodeId) -> Option<FuncId> {
        self.by_def.get(&def_id).copied()
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Ids in table (definition) order.
    pub fn ids(&self) -> impl Iterator<Item = FuncId> {
        (0..self.funcs.len() as u32).map(FuncId)
    }
}

/// Output of the explorer: table, use graph and recursion set.
#[derive(Debug, Default)]
pub struct Analytics<'a> {
    pub table: FunctionTable<'a>,
    /// Caller -> callee edges by name. Self-edges are omitted; direct
    /// recursion goes straight into `recursive`.
    pub edges: Vec<(&'a str, &'a str)>,
    pub recursive: HashSet<FuncId>,
}

impl<'a> Analytics<'a> {
    pub fn is_recursive(&self, id: FuncId) -> bool {
        self.recursive.contains(&id)
    }
}

struct Explorer<'a, 'b> {
    arena: &'a Bump,
    analytics: &'b mut Analytics<'a>,
    errors: &'b mut Vec<ErrorReport>,
    /// Names of the functions whose bodies are currently being walked.
    fn_stack: Vec<&'a str>,
}

/// Walk the tree rooted at `root` and produce function analytics.
pub fn explore<'a>(root: &'a Block<'a>, arena: &'a Bump) -> (Analytics<'a>, Vec<ErrorReport>) {
    let mut analytics = Analytics::default();
    let mut errors = Vec::new();
    {
        let mut explorer = Explorer {
            arena,
            analytics: &mut analytics,
            errors: &mut errors,
            fn_stack: Vec::new(),
        };
        explorer.walk_block(root);
    }
    mark_cycles(&mut analytics);
    (analytics, errors)
}

/// Extend the recursion set with every function on a call cycle.
fn mark_cycles(analytics: &mut Analytics<'_>) {
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for &(from, to) in &analytics.edges {
        successors.entry(from).or_default().push(to);
    }

    let ids: Vec<FuncId> = analytics.table.ids().collect();
    for id in ids {
        if analytics.recursive.contains(&id) {
            continue;
        }
        let name = analytics.table.get(id).name;

        // Reachable-from-itself walk over the name graph.
        let mut seen: HashSet<&str> = HashSet::new();
        let mut work: Vec<&str> = successors.get(name).cloned().unwrap_or_default();
        let mut on_cycle = false;
        while let Some(next) = work.pop() {
            if next == name {
                on_cycle = true;
                break;
            }
            if seen.insert(next) {
                if let Some(succ) = successors.get(next) {
                    work.extend(succ.iter().copied());
                }
            }
        }
        if on_cycle {
            analytics.recursive.insert(id);
        }
    }
}

impl<'a, 'b> Explorer<'a, 'b> {
    fn walk_block(&mut self, block: &'a Block<'a>) {
        for stmt in block.stmts {
            self.walk_stmt(stmt);
        }
    }

    fn walk_stmt(&mut self, stmt: &'a Stmt<'a>) {
        match &stmt.kind {
            StmtKind::Expr(e) | StmtKind::Print(e) => self.walk_expr(e),
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.walk_expr(cond);
                self.walk_block(then_block);
                if let Some(else_block) = else_block {
                    self.walk_block(else_block);
                }
            }
            StmtKind::While { cond, body } => {
                self.walk_expr(cond);
                self.walk_block(body);
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.walk_expr(value);
                }
            }
            StmtKind::Block(block) => self.walk_block(block),
            StmtKind::FnDef(def) => self.register(def),
        }
    }

    fn walk_expr(&mut self, expr: &'a Expr<'a>) {
        match &expr.kind {
            ExprKind::Const(_) | ExprKind::Read | ExprKind::Error { .. } => {}
            ExprKind::Variable { .. } => {}
            ExprKind::Binary { left, right, .. } => {
                self.walk_expr(left);
                self.walk_expr(right);
            }
            ExprKind::Unary { operand, .. } => self.walk_expr(operand),
            ExprKind::Subscript { base, index } => {
                self.walk_expr(base);
                self.walk_expr(index);
            }
            ExprKind::Assign { targets, value } => {
                for target in *targets {
                    self.walk_expr(target);
                }
                self.walk_expr(value);
            }
            ExprKind::Call { callee, args } => {
                self.record_call(callee);
                for arg in *args {
                    self.walk_expr(arg);
                }
            }
            ExprKind::FnToPtr { def } => self.register(def),
            ExprKind::Block(block) => self.walk_block(block),
        }
    }

    fn register(&mut self, def: &'a FnDef<'a>) {
        let name = match def.name {
            Some(name) => name,
            None => {
                let synth = format!("$anon-{}", self.analytics.table.len());
                &*self.arena.alloc_str(&synth)
            }
        };

        match self.analytics.table.define(name, def) {
            Ok(_) => {}
            Err(existing) => {
                let prev = self.analytics.table.get(existing);
                self.errors.push(
                    ErrorReport::error(format!("redefinition of function `{}`", name), def.loc)
                        .with_attachment("previously declared here", prev.def.loc),
                );
                return;
            }
        }

        self.fn_stack.push(name);
        self.walk_block(def.body);
        self.fn_stack.pop();
    }

    fn record_call(&mut self, callee: &'a str) {
        match self.fn_stack.last() {
            Some(&current) if current == callee => {
                // Direct recursion; keep the graph cycle-free for it.
                if let Some(id) = self.analytics.table.lookup_name(callee) {
                    self.analytics.recursive.insert(id);
                }
            }
            Some(&current) => self.analytics.edges.push((current, callee)),
            None => {}
        }
    }
}
