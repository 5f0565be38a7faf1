//! Plain-text AST dump for debugging and driver `--dump-ast` style output.

use crate::ast::{BinOp, Block, Expr, ExprKind, FnDef, Stmt, StmtKind, UnOp};

/// Render a block and its subtree, one node per line, two-space indent.
pub fn format_block(block: &Block<'_>, depth: usize) -> String {
    let mut out = String::new();
    write_block(&mut out, block, depth);
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_block(out: &mut String, block: &Block<'_>, depth: usize) {
    indent(out, depth);
    out.push_str("block\n");
    for stmt in block.stmts {
        write_stmt(out, stmt, depth + 1);
    }
}

fn write_stmt(out: &mut String, stmt: &Stmt<'_>, depth: usize) {
    match &stmt.kind {
        StmtKind::Expr(expr) => write_expr(out, expr, depth),
        StmtKind::Print(expr) => {
            indent(out, depth);
            out.push_str("print\n");
            write_expr(out, expr, depth + 1);
        }
        StmtKind::If {
            cond,
            then_block,
            else_block,
        } => {
            indent(out, depth);
            out.push_str("if\n");
            write_expr(out, cond, depth + 1);
            write_block(out, then_block, depth + 1);
            if let Some(else_block) = else_block {
                indent(out, depth);
                out.push_str("else\n");
                write_block(out, else_block, depth + 1);
            }
        }
        StmtKind::While { cond, body } => {
            indent(out, depth);
            out.push_str("while\n");
            write_expr(out, cond, depth + 1);
            write_block(out, body, depth + 1);
        }
        StmtKind::Return(value) => {
            indent(out, depth);
            out.push_str("return\n");
            if let Some(value) = value {
                write_expr(out, value, depth + 1);
            }
        }
        StmtKind::Block(block) => write_block(out, block, depth),
        StmtKind::FnDef(def) => write_fn(out, def, depth),
    }
}

fn write_fn(out: &mut String, def: &FnDef<'_>, depth: usize) {
    indent(out, depth);
    let name = def.name.unwrap_or("<anonymous>");
    let params: Vec<&str> = def.params.iter().map(|p| p.name).collect();
    out.push_str(&format!("func {}({})\n", name, params.join(", ")));
    write_block(out, def.body, depth + 1);
}

fn write_expr(out: &mut String, expr: &Expr<'_>, depth: usize) {
    indent(out, depth);
    match &expr.kind {
        ExprKind::Const(value) => out.push_str(&format!("const {}\n", value)),
        ExprKind::Variable { name, annot } => match annot {
            Some(ty) => out.push_str(&format!("var {}: {}\n", name, ty)),
            None => out.push_str(&format!("var {}\n", name)),
        },
        ExprKind::Read => out.push_str("read\n"),
        ExprKind::Binary { op, left, right } => {
            out.push_str(&format!("binary {}\n", bin_op_name(*op)));
            write_expr(out, left, depth + 1);
            write_expr(out, right, depth + 1);
        }
        ExprKind::Unary { op, operand } => {
            let name = match op {
                UnOp::Plus => "+",
                UnOp::Neg => "-",
                UnOp::Not => "!",
            };
            out.push_str(&format!("unary {}\n", name));
            write_expr(out, operand, depth + 1);
        }
        ExprKind::Subscript { base, index } => {
            out.push_str("subscript\n");
            write_expr(out, base, depth + 1);
            write_expr(out, index, depth + 1);
        }
        ExprKind::Assign { targets, value } => {
            out.push_str("assign\n");
            for target in *targets {
                write_expr(out, target, depth + 1);
            }
            write_expr(out, value, depth + 1);
        }
        ExprKind::Call { callee, args } => {
            out.push_str(&format!("call {}\n", callee));
            for arg in *args {
                write_expr(out, arg, depth + 1);
            }
        }
        ExprKind::FnToPtr { def } => {
            out.push_str("fn-to-ptr\n");
            write_fn(out, def, depth + 1);
        }
        ExprKind::Block(block) => write_block(out, block, depth),
        ExprKind::Error { msg } => out.push_str(&format!("error: {}\n", msg)),
    }
}

fn bin_op_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Gt => ">",
        BinOp::Ls => "<",
        BinOp::Ge => ">=",
        BinOp::Le => "<=",
        BinOp::And => "&&",
        BinOp::Or => "||",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;
    use bumpalo::Bump;
    use common::SourceLoc;

    #[test]
    fn test_format_print_statement() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let loc = SourceLoc::start();
        let one = b.constant(1, loc);
        let two = b.constant(2, loc);
        let sum = b.binary(BinOp::Add, one, two, loc);
        let print = b.print_stmt(sum, loc);
        let root = b.block(&[print], loc);

        let text = format_block(root, 0);
        assert_eq!(
            text,
            "block\n  print\n    binary +\n      const 1\n      const 2\n"
        );
    }
}
