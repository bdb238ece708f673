//! Line-addressed statement insertion into a function's block tree.
//!
//! Mapping a requested source line onto an insertion point follows one
//! policy, chosen so injected statements run where a reader expects when
//! looking at the original source:
//!
//! - an exact-line anchor that owns child blocks receives the statement as
//!   the new first statement of its first block (the log runs on "entering"
//!   the construct);
//! - an exact-line anchor with no blocks gets the statement right after it;
//! - an anchor strictly before the line recurses into its child blocks
//!   first and only falls back to inserting after itself when the line
//!   fits nowhere inside;
//! - a line before any statement of the block front-inserts;
//! - a line past the last statement of the whole tree is a failed
//!   insertion.
//!
//! The gap/exact asymmetry is deliberate and matched by the tests below;
//! do not "straighten" it.

use periscope_script::ast::{Block, Stmt};

/// Inserts a clone of `new` at `line` inside `body`, whose owning function
/// starts at `decl_line`. Returns false when the line lies outside the
/// function's statements.
pub fn insert_stmt(decl_line: u32, body: &mut Block, line: u32, new: &Stmt) -> bool {
    if decl_line > line {
        return false;
    }
    modify(&mut [body], line, new)
}

fn insert_into_stmt(anchor: &mut Stmt, line: u32, new: &Stmt) -> bool {
    if anchor.line > line {
        return false;
    }
    match anchor.blocks_mut() {
        Some(mut child_blocks) => modify(&mut child_blocks, line, new),
        None => false,
    }
}

fn modify(blocks: &mut [&mut Block], line: u32, new: &Stmt) -> bool {
    // Scan pass: track the last statement at or before the target line
    // across every child block; stop at the first statement past it.
    let mut prev: Option<(usize, usize)> = None;
    let mut prev_is_valid = false;
    let mut found = false;
    'scan: for (block_idx, block) in blocks.iter().enumerate() {
        for (stmt_idx, stmt) in block.stmts.iter().enumerate() {
            if stmt.line > line {
                found = true;
                break 'scan;
            }
            if stmt.line == line {
                prev_is_valid = true;
            }
            prev = Some((block_idx, stmt_idx));
        }
    }

    if !found && !prev_is_valid {
        // Every statement ends before the insertion point.
        return false;
    }

    let Some((block_idx, stmt_idx)) = prev else {
        blocks[0].stmts.insert(0, new.clone());
        return true;
    };

    let anchor_line = blocks[block_idx].stmts[stmt_idx].line;
    let anchor_owns_blocks = blocks[block_idx].stmts[stmt_idx].has_blocks();

    if anchor_line == line && anchor_owns_blocks {
        if let Some(mut child_blocks) = blocks[block_idx].stmts[stmt_idx].blocks_mut() {
            child_blocks[0].stmts.insert(0, new.clone());
            return true;
        }
    }
    if anchor_line < line
        && anchor_owns_blocks
        && insert_into_stmt(&mut blocks[block_idx].stmts[stmt_idx], line, new)
    {
        return true;
    }
    blocks[block_idx].stmts.insert(stmt_idx + 1, new.clone());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use periscope_script::ast::{Expr, StmtKind};

    fn leaf(line: u32) -> Stmt {
        Stmt { line, kind: StmtKind::Expr(Expr::Int(i64::from(line))) }
    }

    fn marker(line: u32) -> Stmt {
        Stmt { line, kind: StmtKind::Expr(Expr::Str("mark".to_string())) }
    }

    fn block(stmts: Vec<Stmt>) -> Block {
        Block { stmts }
    }

    fn looped(line: u32, body: Vec<Stmt>) -> Stmt {
        Stmt {
            line,
            kind: StmtKind::While { cond: Expr::Bool(true), body: block(body) },
        }
    }

    fn branched(line: u32, then_body: Vec<Stmt>, else_body: Vec<Stmt>) -> Stmt {
        Stmt {
            line,
            kind: StmtKind::If {
                cond: Expr::Bool(true),
                then_body: block(then_body),
                else_body: Some(block(else_body)),
            },
        }
    }

    #[test]
    fn test_insert_at_function_header_goes_first() {
        let mut body = block(vec![leaf(2)]);
        assert!(insert_stmt(1, &mut body, 1, &marker(1)));
        assert_eq!(body, block(vec![marker(1), leaf(2)]));
    }

    #[test]
    fn test_exact_line_in_flat_body_inserts_after_anchor() {
        for target in 2..50 {
            let mut body = block((2..50).map(leaf).collect());
            assert!(insert_stmt(1, &mut body, target, &marker(target)));

            let mut expected: Vec<Stmt> = (2..50).map(leaf).collect();
            expected.insert(usize::try_from(target - 1).expect("index"), marker(target));
            assert_eq!(body, block(expected));
        }
    }

    #[test]
    fn test_gap_lines_insert_after_closest_earlier_statement() {
        // Body lines 2, 4, ..., 48; odd targets land after line target-1.
        for target in (3..48).step_by(2) {
            let mut body = block((2..50).step_by(2).map(leaf).collect());
            assert!(insert_stmt(1, &mut body, target, &marker(target)));

            let mut expected: Vec<Stmt> = (2..50).step_by(2).map(leaf).collect();
            expected.insert(usize::try_from((target - 1) / 2).expect("index"), marker(target));
            assert_eq!(body, block(expected));
        }
    }

    #[test]
    fn test_lines_outside_function_fail() {
        let mut body = block((2..50).map(leaf).collect());
        assert!(!insert_stmt(1, &mut body, 0, &marker(0)));

        let mut body = block((2..50).map(leaf).collect());
        assert!(!insert_stmt(1, &mut body, 50, &marker(50)));
    }

    #[test]
    fn test_empty_body_rejects_insertion() {
        let mut body = block(Vec::new());
        assert!(!insert_stmt(1, &mut body, 1, &marker(1)));
    }

    #[test]
    fn test_line_before_first_statement_front_inserts() {
        let mut body = block(vec![leaf(5), leaf(6)]);
        assert!(insert_stmt(1, &mut body, 3, &marker(3)));
        assert_eq!(body, block(vec![marker(3), leaf(5), leaf(6)]));
    }

    #[test]
    fn test_nested_construct_receives_interior_lines() {
        // Body: 2, 3, while@4 { 5..49 }, 50.
        let nested = || looped(4, (5..50).map(leaf).collect());
        for target in 2..=50 {
            let mut body = block(vec![leaf(2), leaf(3), nested(), leaf(50)]);
            assert!(insert_stmt(1, &mut body, target, &marker(target)));

            let expected = match target {
                2 | 3 => {
                    let mut stmts = vec![leaf(2), leaf(3), nested(), leaf(50)];
                    stmts.insert(usize::try_from(target - 1).expect("index"), marker(target));
                    stmts
                }
                4 => {
                    // Exact hit on the loop header enters its body.
                    let mut interior: Vec<Stmt> = (5..50).map(leaf).collect();
                    interior.insert(0, marker(target));
                    vec![leaf(2), leaf(3), looped(4, interior), leaf(50)]
                }
                5..=49 => {
                    let mut interior: Vec<Stmt> = (5..50).map(leaf).collect();
                    interior.insert(usize::try_from(target - 4).expect("index"), marker(target));
                    vec![leaf(2), leaf(3), looped(4, interior), leaf(50)]
                }
                _ => vec![leaf(2), leaf(3), nested(), leaf(50), marker(target)],
            };
            assert_eq!(body, block(expected), "target line {target}");
        }
    }

    #[test]
    fn test_line_past_nested_block_falls_back_to_after_construct() {
        // while@2 { 3, 4 } then 10; line 7 fits nowhere inside the loop.
        let mut body = block(vec![looped(2, vec![leaf(3), leaf(4)]), leaf(10)]);
        assert!(insert_stmt(1, &mut body, 7, &marker(7)));
        assert_eq!(
            body,
            block(vec![looped(2, vec![leaf(3), leaf(4)]), marker(7), leaf(10)])
        );
    }

    #[test]
    fn test_else_branch_lines_are_reachable() {
        // if@2 { 3, 4 } else { 6, 7 } with the else keyword on line 5.
        let mut body = block(vec![branched(2, vec![leaf(3), leaf(4)], vec![leaf(6), leaf(7)])]);
        assert!(insert_stmt(1, &mut body, 6, &marker(6)));
        assert_eq!(
            body,
            block(vec![branched(
                2,
                vec![leaf(3), leaf(4)],
                vec![leaf(6), marker(6), leaf(7)]
            )])
        );
    }

    #[test]
    fn test_exact_hit_on_last_statement_appends() {
        let mut body = block(vec![leaf(2), leaf(3)]);
        assert!(insert_stmt(1, &mut body, 3, &marker(3)));
        assert_eq!(body, block(vec![leaf(2), leaf(3), marker(3)]));
    }
}
