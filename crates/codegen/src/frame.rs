//! Compile-time model of the VM data stack.
//!
//! A stack of blocks, one per open scope. Each block records the logical
//! stack depth at entry and the slot index of every name it declares.
//! Depths are cumulative across blocks, so `size()` is always the total
//! frame depth the VM will have above `SP_base` at the corresponding
//! point in the emitted code.

use std::collections::HashMap;

use frontend::Symtab;

#[derive(Debug, Default)]
struct FrameBlock<'a> {
    top: u32,
    slots: HashMap<&'a str, u32>,
}

/// The generator's stack-frame model.
#[derive(Debug, Default)]
pub struct StackFrame<'a> {
    blocks: Vec<FrameBlock<'a>>,
}

impl<'a> StackFrame<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an empty scope at the current depth.
    pub fn begin_scope(&mut self) {
        let top = self.size();
        self.blocks.push(FrameBlock {
            top,
            slots: HashMap::new(),
        });
    }

    /// Open a scope and allocate one slot run per declared symbol, in
    /// declaration order. Returns the number of slots allocated.
    pub fn begin_scope_with(&mut self, symtab: &Symtab<'a>) -> u32 {
        self.begin_scope();
        let mut slots = 0;
        for (name, info) in symtab.iter() {
            let count = info.ty.slot_count();
            self.push_var_slots(name, count);
            slots += count;
        }
        slots
    }

    pub fn end_scope(&mut self) {
        self.blocks.pop().expect("ending nonexistent scope");
    }

    /// Allocate one slot for `name` in the innermost scope.
    pub fn push_var(&mut self, name: &'a str) {
        self.push_var_slots(name, 1);
    }

    /// Allocate `count` consecutive slots for `name` (arrays occupy their
    /// whole extent inline).
    pub fn push_var_slots(&mut self, name: &'a str, count: u32) {
        let block = self.blocks.last_mut().expect("no open scope");
        let previous = block.slots.insert(name, block.top);
        debug_assert!(previous.is_none(), "slot for `{}` allocated twice", name);
        block.top += count;
    }

    /// Account for an anonymous intermediate value.
    pub fn push_dummy(&mut self) {
        let block = self.blocks.last_mut().expect("no open scope");
        block.top += 1;
    }

    pub fn pop_dummy(&mut self) {
        let block = self.blocks.last_mut().expect("no open scope");
        debug_assert!(block.top > 0, "frame model underflow");
        block.top -= 1;
    }

    /// Slot index of `name`, scanning scopes innermost outward.
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.blocks
            .iter()
            .rev()
            .find_map(|block| block.slots.get(name).copied())
    }

    /// Current total frame depth.
    pub fn size(&self) -> u32 {
        self.blocks.last().map_or(0, |block| block.top)
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }
}
