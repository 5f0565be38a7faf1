//! ParaCL frontend: typed AST, symbol tables, function analytics and the
//! semantic analyzer.
//!
//! The lexer and parser live outside this workspace. A parser hands over a
//! root statement block built through [`ast::AstBuilder`]; everything after
//! that point (name resolution, type deduction, recursion handling) happens
//! here and feeds the code generator.

pub mod analyzer;
pub mod ast;
pub mod dump;
pub mod error;
pub mod functions;
pub mod symtab;
pub mod types;

pub use analyzer::{analyze, Analysis, CallTarget};
pub use ast::{AstBuilder, BinOp, Block, Expr, ExprKind, FnDef, NodeId, Param, Stmt, StmtKind, UnOp};
pub use error::{ErrorAttachment, ErrorReport, Severity};
pub use functions::{explore, Analytics, FuncId, FuncInfo, FunctionTable};
pub use symtab::{ScopeStack, SymbolInfo, Symtab};
pub use types::{FuncType, Type};
