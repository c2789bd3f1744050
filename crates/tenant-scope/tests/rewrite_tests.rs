//! Integration tests for SELECT plan rewriting.
//!
//! These tests build plans with the public builders, run them through
//! `TenantScope::rewrite`, and check both the resulting tree and the
//! rendered SQL.

mod common;

use std::sync::Arc;

use helios_tenant_scope::ast::{JoinKind, Node, RelationFingerprint, SelectCore, SetOperation};
use helios_tenant_scope::engine::{
    ScopeOwner, TenantEnforcementClause, TenantJoinEnforcementClause, TenantScope,
};
use helios_tenant_scope::registry::TenantModel;
use helios_tenant_scope::render::SqlParam;

use common::*;

fn select_core(plan: &Node) -> &SelectCore {
    match plan {
        Node::Select(select) => &select.core,
        other => panic!("expected select, got {}", other.kind()),
    }
}

fn tenant_clause(relation: RelationFingerprint, tenant: &str) -> Node {
    TenantEnforcementClause::new(relation, &TenantModel::new("orders", "tenant_id"), &tenant.into())
        .into()
}

// ============================================================================
// Scenario Tests
// ============================================================================

/// Test that a bare single-table select gets exactly one tenant predicate.
#[test]
fn test_single_table_gets_exactly_one_clause() {
    let plan = SelectCore::from_source(Node::table("orders")).into_node();

    let scoped = scope().rewrite(plan, &tenant("t1")).unwrap();

    let core = select_core(&scoped);
    assert_eq!(core.wheres, vec![tenant_clause(orders(), "t1")]);
    assert_eq!(
        scoped.to_sql(),
        "SELECT * FROM orders WHERE orders.tenant_id = 't1'"
    );
}

/// Test that an outer join gets the clause for its unconstrained side in
/// its ON condition, while an explicit WHERE filter on the other side
/// prevents re-enforcing it.
#[test]
fn test_outer_join_enforces_unhandled_side_only() {
    let plan = SelectCore::from_source(Node::join(
        JoinKind::LeftOuter,
        Node::table("orders"),
        Node::table("items"),
        Some(on(&orders(), "id", &items(), "order_id")),
    ))
    .filter(items().attr("tenant_id").equals("t1"))
    .into_node();

    let scoped = scope().rewrite(plan, &tenant("t1")).unwrap();

    let core = select_core(&scoped);
    assert_eq!(core.wheres, vec![items().attr("tenant_id").equals("t1")]);
    match core.source.as_ref() {
        Some(Node::Join(join)) => assert_eq!(
            join.on,
            Some(Node::And(vec![
                on(&orders(), "id", &items(), "order_id"),
                tenant_clause(orders(), "t1"),
            ]))
        ),
        other => panic!("expected join source, got {:?}", other),
    }
    assert_eq!(
        scoped.to_sql(),
        "SELECT * FROM orders LEFT OUTER JOIN items \
         ON orders.id = items.order_id AND orders.tenant_id = 't1' \
         WHERE items.tenant_id = 't1'"
    );
}

/// Test that an outer join without a condition gets the clauses as its
/// whole condition.
#[test]
fn test_outer_join_without_condition() {
    let plan = SelectCore::from_source(Node::join(
        JoinKind::FullOuter,
        Node::table("orders"),
        Node::table("items"),
        None,
    ))
    .into_node();

    let scoped = scope().rewrite(plan, &tenant("t1")).unwrap();
    assert_eq!(
        scoped.to_sql(),
        "SELECT * FROM orders FULL OUTER JOIN items \
         ON orders.tenant_id = 't1' AND items.tenant_id = 't1'"
    );
}

/// Test that right outer joins are treated like the other outer joins.
#[test]
fn test_right_outer_join() {
    let plan = SelectCore::from_source(Node::join(
        JoinKind::RightOuter,
        Node::table("orders"),
        Node::table("items"),
        Some(on(&orders(), "id", &items(), "order_id")),
    ))
    .into_node();

    let scope = scope();
    let scopes = scope.discover(&plan);
    assert_eq!(scopes.get(1).map(|c| c.owner()), Some(ScopeOwner::OuterJoin));

    let scoped = scope.rewrite(plan, &tenant("t1")).unwrap();
    assert_eq!(
        scoped.to_sql(),
        "SELECT * FROM orders RIGHT OUTER JOIN items \
         ON orders.id = items.order_id AND orders.tenant_id = 't1' AND items.tenant_id = 't1'"
    );
}

/// Test that existing WHERE predicates keep their order behind the clause.
#[test]
fn test_clause_goes_in_front_of_existing_predicates() {
    let plan = SelectCore::from_source(Node::table("orders"))
        .filter(orders().attr("status").equals("open"))
        .filter(orders().attr("total").equals(10i64))
        .into_node();

    let scoped = scope().rewrite(plan, &tenant("t1")).unwrap();

    let core = select_core(&scoped);
    assert_eq!(core.wheres.len(), 2);
    assert_eq!(
        core.wheres[0],
        Node::And(vec![
            tenant_clause(orders(), "t1"),
            orders().attr("status").equals("open"),
        ])
    );
    assert_eq!(
        scoped.to_sql(),
        "SELECT * FROM orders WHERE orders.tenant_id = 't1' \
         AND orders.status = 'open' AND orders.total = 10"
    );
}

// ============================================================================
// No Double Enforcement Tests
// ============================================================================

/// Test that an explicit tenant filter is left alone.
#[test]
fn test_explicit_filter_is_not_duplicated() {
    let plan = SelectCore::from_source(Node::table("orders"))
        .filter(Node::and(vec![
            orders().attr("status").equals("open"),
            orders().attr("tenant_id").equals("t1"),
        ]))
        .into_node();

    let scoped = scope().rewrite(plan.clone(), &tenant("t1")).unwrap();
    assert_eq!(scoped, plan);
    assert_eq!(occurrences(&scoped.to_sql(), "orders.tenant_id"), 1);
}

/// Test that a tenant filter under OR does not count as a constraint.
#[test]
fn test_filter_under_or_is_enforced() {
    let plan = SelectCore::from_source(Node::table("orders"))
        .filter(Node::or(
            orders().attr("tenant_id").equals("t1"),
            orders().attr("public").equals(true),
        ))
        .into_node();

    let scoped = scope().rewrite(plan, &tenant("t1")).unwrap();
    assert_eq!(
        scoped.to_sql(),
        "SELECT * FROM orders WHERE orders.tenant_id = 't1' \
         AND (orders.tenant_id = 't1' OR orders.public = TRUE)"
    );
}

/// Test that an explicit filter through an alias is recognized.
#[test]
fn test_filter_through_alias_is_recognized() {
    let o = RelationFingerprint::aliased("orders", "o");
    let plan = SelectCore::from_source(Node::aliased("orders", "o"))
        .filter(o.attr("tenant_id").equals("t1"))
        .into_node();

    let scoped = scope().rewrite(plan.clone(), &tenant("t1")).unwrap();
    assert_eq!(scoped, plan);
}

// ============================================================================
// Join Chain Tests
// ============================================================================

fn join_chain() -> Node {
    SelectCore::from_source(Node::join(
        JoinKind::Inner,
        Node::join(
            JoinKind::Inner,
            Node::table("orders"),
            Node::table("items"),
            Some(on(&items(), "order_id", &orders(), "id")),
        ),
        Node::table("shipments"),
        Some(on(&shipments(), "order_id", &orders(), "id")),
    ))
    .filter(orders().attr("tenant_id").equals("t1"))
    .into_node()
}

fn link(relation: RelationFingerprint, anchor: RelationFingerprint) -> Node {
    let model = TenantModel::new(relation.table_name(), "tenant_id");
    let anchor_model = TenantModel::new(anchor.table_name(), "tenant_id");
    TenantJoinEnforcementClause::new(relation, &model, anchor, &anchor_model).into()
}

/// Test that joined relations are linked to the relation they join onto.
#[test]
fn test_join_chain_links_without_tenant() {
    let scoped = scope().rewrite(join_chain(), &no_tenant()).unwrap();

    let core = select_core(&scoped);
    assert_eq!(core.wheres, vec![orders().attr("tenant_id").equals("t1")]);

    let Some(Node::Join(outer)) = core.source.as_ref() else {
        panic!("expected join source");
    };
    assert_eq!(
        outer.on,
        Some(Node::And(vec![
            on(&shipments(), "order_id", &orders(), "id"),
            link(shipments(), orders()),
        ]))
    );
    let Node::Join(inner) = &outer.left else {
        panic!("expected nested join");
    };
    assert_eq!(
        inner.on,
        Some(Node::And(vec![
            on(&items(), "order_id", &orders(), "id"),
            link(items(), orders()),
        ]))
    );

    assert_eq!(
        scoped.to_sql(),
        "SELECT * FROM orders \
         INNER JOIN items ON items.order_id = orders.id AND items.tenant_id = orders.tenant_id \
         INNER JOIN shipments ON shipments.order_id = orders.id AND shipments.tenant_id = orders.tenant_id \
         WHERE orders.tenant_id = 't1'"
    );
}

/// Test that with a tenant set, joined relations get both a tenant clause
/// and a link.
#[test]
fn test_join_chain_with_tenant() {
    let scoped = scope().rewrite(join_chain(), &tenant("t1")).unwrap();
    let sql = scoped.to_sql();

    assert!(sql.contains("items.tenant_id = orders.tenant_id"));
    assert!(sql.contains("shipments.tenant_id = orders.tenant_id"));
    assert!(sql.ends_with(
        "WHERE items.tenant_id = 't1' AND shipments.tenant_id = 't1' AND orders.tenant_id = 't1'"
    ));
    assert_eq!(occurrences(&sql, "orders.tenant_id = 't1'"), 1);
}

/// Test that a self-join through aliases links the aliases to each other.
#[test]
fn test_self_join_with_aliases() {
    let a = RelationFingerprint::aliased("orders", "a");
    let b = RelationFingerprint::aliased("orders", "b");
    let plan = SelectCore::from_source(Node::join(
        JoinKind::Inner,
        Node::aliased("orders", "a"),
        Node::aliased("orders", "b"),
        Some(on(&a, "id", &b, "parent_id")),
    ))
    .into_node();

    let scoped = scope().rewrite(plan, &tenant("t1")).unwrap();
    assert_eq!(
        scoped.to_sql(),
        "SELECT * FROM orders AS a INNER JOIN orders AS b \
         ON a.id = b.parent_id AND b.tenant_id = a.tenant_id \
         WHERE a.tenant_id = 't1' AND b.tenant_id = 't1'"
    );
}

/// Test that unscoped tables in a join are neither filtered nor linked.
#[test]
fn test_join_with_unscoped_table() {
    let currencies = RelationFingerprint::table("currencies");
    let plan = SelectCore::from_source(Node::join(
        JoinKind::Inner,
        Node::table("orders"),
        Node::table("currencies"),
        Some(on(&orders(), "currency", &currencies, "code")),
    ))
    .into_node();

    let scoped = scope().rewrite(plan, &tenant("t1")).unwrap();
    assert_eq!(
        scoped.to_sql(),
        "SELECT * FROM orders INNER JOIN currencies ON orders.currency = currencies.code \
         WHERE orders.tenant_id = 't1'"
    );
}

/// Test that a chain starting at a shared table links joined relations to
/// the nearest tenant-scoped relation instead.
#[test]
fn test_join_chain_from_unscoped_base() {
    let currencies = RelationFingerprint::table("currencies");
    let plan = SelectCore::from_source(Node::join(
        JoinKind::Inner,
        Node::join(
            JoinKind::Inner,
            Node::table("currencies"),
            Node::table("orders"),
            Some(on(&orders(), "currency", &currencies, "code")),
        ),
        Node::table("items"),
        Some(on(&items(), "order_id", &orders(), "id")),
    ))
    .filter(orders().attr("tenant_id").equals("t1"))
    .into_node();

    let scoped = scope().rewrite(plan, &no_tenant()).unwrap();
    assert_eq!(
        scoped.to_sql(),
        "SELECT * FROM currencies \
         INNER JOIN orders ON orders.currency = currencies.code \
         INNER JOIN items ON items.order_id = orders.id AND items.tenant_id = orders.tenant_id \
         WHERE orders.tenant_id = 't1'"
    );
}

// ============================================================================
// Subquery Tests
// ============================================================================

/// Test that a correlated EXISTS subquery is scoped on its own.
#[test]
fn test_exists_subquery() {
    let sub = SelectCore::from_source(Node::table("items"))
        .filter(on(&items(), "order_id", &orders(), "id"))
        .into_node();
    let plan = SelectCore::from_source(Node::table("orders"))
        .filter(Node::exists(sub))
        .into_node();

    let scoped = scope().rewrite(plan, &tenant("t1")).unwrap();
    assert_eq!(
        scoped.to_sql(),
        "SELECT * FROM orders WHERE orders.tenant_id = 't1' AND EXISTS \
         (SELECT * FROM items WHERE items.tenant_id = 't1' AND items.order_id = orders.id)"
    );
}

/// Test that a subquery in FROM is scoped inside, not outside.
#[test]
fn test_subquery_in_from() {
    let sub = SelectCore::from_source(Node::table("orders")).into_node();
    let plan = SelectCore::from_source(Node::subquery(sub, "o")).into_node();

    let scoped = scope().rewrite(plan, &tenant("t1")).unwrap();
    assert_eq!(
        scoped.to_sql(),
        "SELECT * FROM (SELECT * FROM orders WHERE orders.tenant_id = 't1') AS o"
    );
}

/// Test that a scalar subquery in the projection list is scoped.
#[test]
fn test_subquery_in_projection() {
    let count = SelectCore::from_source(Node::table("items"))
        .project(Node::function("COUNT", vec![Node::star()]))
        .filter(on(&items(), "order_id", &orders(), "id"))
        .into_node();
    let plan = SelectCore::from_source(Node::table("orders"))
        .project(Node::attr(&orders(), "id"))
        .project(count)
        .into_node();

    let scoped = scope().rewrite(plan, &tenant("t1")).unwrap();
    assert_eq!(
        scoped.to_sql(),
        "SELECT orders.id, (SELECT COUNT(*) FROM items \
         WHERE items.tenant_id = 't1' AND items.order_id = orders.id) \
         FROM orders WHERE orders.tenant_id = 't1'"
    );
}

/// Test that both sides of a UNION are scoped.
#[test]
fn test_union() {
    let left = SelectCore::from_source(Node::table("orders"))
        .project(Node::attr(&orders(), "id"))
        .into_node();
    let right = SelectCore::from_source(Node::table("items"))
        .project(Node::attr(&items(), "order_id"))
        .into_node();
    let plan = SetOperation::union(left, right, false);

    let scoped = scope().rewrite(plan, &tenant("t1")).unwrap();
    assert_eq!(
        scoped.to_sql(),
        "SELECT orders.id FROM orders WHERE orders.tenant_id = 't1' \
         UNION SELECT items.order_id FROM items WHERE items.tenant_id = 't1'"
    );
}

// ============================================================================
// Tenant Value Tests
// ============================================================================

/// Test that integer partition keys get an unquoted literal.
#[test]
fn test_integer_partition_key() {
    let plan = SelectCore::from_source(Node::table("accounts")).into_node();
    let scoped = scope().rewrite(plan, &tenant("42")).unwrap();
    assert_eq!(
        scoped.to_sql(),
        "SELECT * FROM accounts WHERE accounts.account_id = 42"
    );
    assert_eq!(
        scoped.to_fragment().params,
        vec![SqlParam::Integer(42)]
    );
}

/// Test that the tenant id is bound as a parameter, not spliced.
#[test]
fn test_tenant_is_bound_in_fragment() {
    let plan = SelectCore::from_source(Node::table("orders")).into_node();
    let scoped = scope().rewrite(plan, &tenant("o'brien")).unwrap();

    let fragment = scoped.to_fragment();
    assert_eq!(fragment.sql, "SELECT * FROM orders WHERE orders.tenant_id = ?1");
    assert_eq!(fragment.params, vec![SqlParam::text("o'brien")]);
    assert_eq!(
        scoped.to_sql(),
        "SELECT * FROM orders WHERE orders.tenant_id = 'o''brien'"
    );
}

// ============================================================================
// Bypass Tests
// ============================================================================

/// Test that tables outside the registry are untouched.
#[test]
fn test_unscoped_table_is_untouched() {
    let plan = SelectCore::from_source(Node::table("currencies")).into_node();
    let scoped = scope().rewrite(plan.clone(), &tenant("t1")).unwrap();
    assert_eq!(scoped, plan);
}

/// Test that no tenant means no tenant clauses.
#[test]
fn test_missing_tenant_adds_nothing() {
    let plan = SelectCore::from_source(Node::join(
        JoinKind::LeftOuter,
        Node::table("orders"),
        Node::table("items"),
        None,
    ))
    .into_node();
    let scoped = scope().rewrite(plan.clone(), &no_tenant()).unwrap();
    assert_eq!(scoped, plan);
}

/// Test that write-only mode leaves every predicate list unchanged.
#[test]
fn test_write_only_bypass() {
    let options = tenant("t1").with_write_only(true);
    for plan in [
        SelectCore::from_source(Node::table("orders")).into_node(),
        join_chain(),
    ] {
        let scoped = scope().rewrite(plan.clone(), &options).unwrap();
        assert_eq!(scoped, plan);
    }
}

/// Test that a table unregistered between discovery and rewriting is
/// skipped rather than enforced.
#[test]
fn test_unregistered_after_discovery_is_skipped() {
    init_tracing();
    let registry = Arc::new(registry());
    let scope = TenantScope::new(registry.clone());
    let plan = SelectCore::from_source(Node::table("orders")).into_node();

    let scopes = scope.discover(&plan);
    assert_eq!(scopes.unhandled(0), vec![orders()]);
    registry.unregister("orders");

    let scoped = scope.rewrite_with(plan.clone(), &scopes, &tenant("t1")).unwrap();
    assert_eq!(scoped, plan);
    assert_eq!(scoped.to_sql(), "SELECT * FROM orders");
}

// ============================================================================
// Idempotence and Coverage Tests
// ============================================================================

fn sample_plans() -> Vec<Node> {
    let sub = SelectCore::from_source(Node::table("items"))
        .project(Node::attr(&items(), "order_id"))
        .into_node();
    vec![
        SelectCore::from_source(Node::table("orders")).into_node(),
        SelectCore::from_source(Node::aliased("orders", "o"))
            .filter(RelationFingerprint::aliased("orders", "o").attr("status").equals("open"))
            .into_node(),
        SelectCore::from_source(Node::join(
            JoinKind::LeftOuter,
            Node::join(
                JoinKind::Inner,
                Node::table("orders"),
                Node::table("items"),
                Some(on(&items(), "order_id", &orders(), "id")),
            ),
            Node::table("shipments"),
            Some(on(&shipments(), "order_id", &orders(), "id")),
        ))
        .into_node(),
        SelectCore::from_source(Node::table("orders"))
            .filter(Node::in_subquery(Node::attr(&orders(), "id"), sub.clone()))
            .into_node(),
        SetOperation::union(sub, join_chain(), true),
        join_chain(),
    ]
}

/// Test that rewriting a rewritten plan renders the same SQL.
#[test]
fn test_rewrite_is_idempotent() {
    let scope = scope();
    for options in [tenant("t1"), no_tenant()] {
        for plan in sample_plans() {
            let once = scope.rewrite(plan, &options).unwrap();
            let twice = scope.rewrite(once.clone(), &options).unwrap();
            assert_eq!(once.to_sql(), twice.to_sql());
            assert_eq!(once, twice);
        }
    }
}

/// Test that every scoped table in every plan ends up constrained.
#[test]
fn test_every_scoped_relation_is_covered() {
    let scope = scope();
    for plan in sample_plans() {
        let scoped = scope.rewrite(plan, &tenant("t1")).unwrap();
        let sql = scoped.to_sql();

        // Every context of the rewritten plan is fully handled.
        let scopes = scope.discover(&scoped);
        for context in &scopes {
            assert!(
                scopes.unhandled(context.id()).is_empty(),
                "unhandled relations in {}: {:?}",
                sql,
                scopes.unhandled(context.id())
            );
        }
        assert!(sql.contains("tenant_id = 't1'"), "{sql}");
    }
}
