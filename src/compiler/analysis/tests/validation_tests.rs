#![cfg(test)]

use crate::compiler::analysis::tests::test_support::{
    edge, handle_fixture, local, location, procedure, scope, single_scope_proc, stmt,
};
use crate::compiler::compiler_errors::ErrorType;
use crate::compiler::ir::proc_nodes::{ExitKind, Expr, LocalId, ScopeId, ScopeKind, StmtKind};
use crate::compiler::ir::validation::validate_procedure;

#[test]
fn well_formed_procedure_passes() {
    let mut fixture = handle_fixture();

    let x = local(0, "x", fixture.int_ty, &mut fixture.string_table);
    let init = Expr::int(1, fixture.int_ty, location(2));

    let proc = procedure(
        "start",
        vec![],
        vec![
            scope(
                0,
                None,
                ScopeKind::ProcedureBody,
                vec![
                    stmt(StmtKind::VarDecl { local: x, init }, 2),
                    stmt(StmtKind::Block(ScopeId(1)), 3),
                ],
                vec![edge(0, ExitKind::Fallthrough)],
            ),
            scope(
                1,
                Some(0),
                ScopeKind::Block,
                vec![stmt(
                    StmtKind::Assign {
                        target: LocalId(0),
                        value: Expr::int(2, fixture.int_ty, location(4)),
                    },
                    4,
                )],
                vec![edge(1, ExitKind::Fallthrough)],
            ),
        ],
        &mut fixture.string_table,
    );

    assert!(validate_procedure(&proc, &fixture.string_table).is_ok());
}

#[test]
fn duplicate_local_id_is_an_internal_error() {
    let mut fixture = handle_fixture();

    let first = local(0, "x", fixture.int_ty, &mut fixture.string_table);
    let second = local(0, "y", fixture.int_ty, &mut fixture.string_table);

    let proc = single_scope_proc(
        "start",
        vec![],
        vec![
            stmt(
                StmtKind::VarDecl {
                    local: first,
                    init: Expr::int(1, fixture.int_ty, location(2)),
                },
                2,
            ),
            stmt(
                StmtKind::VarDecl {
                    local: second,
                    init: Expr::int(2, fixture.int_ty, location(3)),
                },
                3,
            ),
        ],
        vec![edge(0, ExitKind::Fallthrough)],
        &mut fixture.string_table,
    );

    let error = validate_procedure(&proc, &fixture.string_table).unwrap_err();
    assert_eq!(error.error_type, ErrorType::Compiler);
}

#[test]
fn undeclared_local_reference_is_an_internal_error() {
    let mut fixture = handle_fixture();

    let proc = single_scope_proc(
        "start",
        vec![],
        vec![stmt(
            StmtKind::Assign {
                target: LocalId(9),
                value: Expr::int(1, fixture.int_ty, location(2)),
            },
            2,
        )],
        vec![edge(0, ExitKind::Fallthrough)],
        &mut fixture.string_table,
    );

    assert!(validate_procedure(&proc, &fixture.string_table).is_err());
}

#[test]
fn wrong_scope_parent_is_an_internal_error() {
    let mut fixture = handle_fixture();

    let proc = procedure(
        "start",
        vec![],
        vec![
            scope(
                0,
                None,
                ScopeKind::ProcedureBody,
                vec![stmt(StmtKind::Block(ScopeId(1)), 2)],
                vec![edge(0, ExitKind::Fallthrough)],
            ),
            // Records no parent even though scope 0 contains it
            scope(1, None, ScopeKind::Block, vec![], vec![edge(1, ExitKind::Fallthrough)]),
        ],
        &mut fixture.string_table,
    );

    assert!(validate_procedure(&proc, &fixture.string_table).is_err());
}

#[test]
fn unreachable_scope_is_an_internal_error() {
    let mut fixture = handle_fixture();

    let proc = procedure(
        "start",
        vec![],
        vec![
            scope(
                0,
                None,
                ScopeKind::ProcedureBody,
                vec![],
                vec![edge(0, ExitKind::Fallthrough)],
            ),
            // Nothing references this scope
            scope(1, Some(0), ScopeKind::Block, vec![], vec![edge(1, ExitKind::Fallthrough)]),
        ],
        &mut fixture.string_table,
    );

    assert!(validate_procedure(&proc, &fixture.string_table).is_err());
}

#[test]
fn duplicate_edge_id_across_scopes_is_an_internal_error() {
    let mut fixture = handle_fixture();

    let proc = procedure(
        "start",
        vec![],
        vec![
            scope(
                0,
                None,
                ScopeKind::ProcedureBody,
                vec![stmt(StmtKind::Block(ScopeId(1)), 2)],
                vec![edge(0, ExitKind::Fallthrough)],
            ),
            scope(
                1,
                Some(0),
                ScopeKind::Block,
                vec![],
                // Reuses edge id 0
                vec![edge(0, ExitKind::Fallthrough)],
            ),
        ],
        &mut fixture.string_table,
    );

    assert!(validate_procedure(&proc, &fixture.string_table).is_err());
}

#[test]
fn while_body_must_be_a_loop_body_scope() {
    let mut fixture = handle_fixture();

    let proc = procedure(
        "start",
        vec![],
        vec![
            scope(
                0,
                None,
                ScopeKind::ProcedureBody,
                vec![stmt(
                    StmtKind::While {
                        condition: Expr::bool(true, fixture.bool_ty, location(2)),
                        body: ScopeId(1),
                    },
                    2,
                )],
                vec![edge(0, ExitKind::Fallthrough)],
            ),
            // Mis-tagged as a plain block
            scope(1, Some(0), ScopeKind::Block, vec![], vec![edge(1, ExitKind::Fallthrough)]),
        ],
        &mut fixture.string_table,
    );

    let error = validate_procedure(&proc, &fixture.string_table).unwrap_err();
    assert_eq!(error.error_type, ErrorType::Compiler);
    assert!(error.is_fatal());
}

#[test]
fn missing_edge_enumeration_is_caught_by_the_inserter_not_here() {
    let mut fixture = handle_fixture();

    // Structurally fine, just missing its fallthrough edge. The structural
    // validator accepts it; the destructor inserter is the pass that
    // requires the complete edge set.
    let proc = single_scope_proc("start", vec![], vec![], vec![], &mut fixture.string_table);

    assert!(validate_procedure(&proc, &fixture.string_table).is_ok());

    let mut resolver = crate::compiler::lifecycle::lifting::LiftingResolver::new(
        &fixture.arena,
        &fixture.registry,
    );
    let mut messages = crate::compiler::compiler_errors::CompilerMessages::new();

    let error = crate::compiler::analysis::drop_insertion::insert_destructor_calls(
        &proc,
        &fixture.string_table,
        &mut resolver,
        &mut messages,
    )
    .unwrap_err();

    assert_eq!(error.error_type, ErrorType::MissingScopeExitEdge);
}

#[test]
fn edge_id_unused_by_any_statement_is_allowed() {
    let mut fixture = handle_fixture();

    // The front end may enumerate edges conservatively; extra edges are
    // harmless as long as ids stay unique.
    let proc = single_scope_proc(
        "start",
        vec![],
        vec![],
        vec![edge(0, ExitKind::Fallthrough), edge(1, ExitKind::Return)],
        &mut fixture.string_table,
    );

    assert!(validate_procedure(&proc, &fixture.string_table).is_ok());
}
