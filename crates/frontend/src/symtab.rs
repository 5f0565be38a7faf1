//! Symbol tables and the analysis-time scope stack.
//!
//! Each block, control header and parameter list owns one [`Symtab`],
//! keyed by the owning node's id. Tables are insertion-ordered so that
//! code generation assigns stack slots deterministically when it re-opens
//! them.

use std::collections::HashMap;

use common::SourceLoc;

use crate::ast::NodeId;
use crate::types::Type;

/// What is known about one declared name.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    pub loc: SourceLoc,
    pub ty: Type,
}

/// One scope's name-to-declaration mapping, insertion-ordered.
#[derive(Debug, Default)]
pub struct Symtab<'a> {
    entries: Vec<(&'a str, SymbolInfo)>,
    index: HashMap<&'a str, usize>,
}

impl<'a> Symtab<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` in this scope. Re-declaring an existing name updates
    /// its info in place (analysis passes may run more than once over the
    /// same tables).
    pub fn declare(&mut self, name: &'a str, info: SymbolInfo) {
        match self.index.get(name) {
            Some(&i) => self.entries[i].1 = info,
            None => {
                self.index.insert(name, self.entries.len());
                self.entries.push((name, info));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&SymbolInfo> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &SymbolInfo)> {
        self.entries.iter().map(|(n, i)| (*n, i))
    }
}

/// Stack of open scopes; lookup walks from the innermost outward.
#[derive(Debug, Default)]
pub struct ScopeStack<'a> {
    stack: Vec<(NodeId, Symtab<'a>)>,
}

impl<'a> ScopeStack<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, owner: NodeId, tab: Symtab<'a>) {
        self.stack.push((owner, tab));
    }

    pub fn pop(&mut self) -> Option<(NodeId, Symtab<'a>)> {
        self.stack.pop()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Declare into the innermost open scope.
    pub fn declare(&mut self, name: &'a str, info: SymbolInfo) {
        let top = self
            .stack
            .last_mut()
            .expect("declaring into an empty scope stack");
        top.1.declare(name, info);
    }

    /// Find `name` in the closest enclosing scope.
    pub fn lookup(&self, name: &str) -> Option<&SymbolInfo> {
        self.stack.iter().rev().find_map(|(_, tab)| tab.get(name))
    }
}
