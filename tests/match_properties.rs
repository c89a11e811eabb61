use archetype_query_core::component::ComponentRecord;
use archetype_query_core::entity::Entity;
use archetype_query_core::query::{ColumnPlan, FromKind, OpKind, Payload, Query, Signature, SignatureColumn};
use archetype_query_core::world::World;
use quickcheck::{Arbitrary, Gen, TestResult};
use quickcheck_macros::quickcheck;

/// A small fixed pool of components plus a single table built from a subset of them,
/// so generated signatures and tables stay within a universe small enough that
/// match/brute-force agreement is actually exercised (not just vacuously true).
const POOL_SIZE: usize = 5;

#[derive(Debug, Clone)]
struct SmallTerm {
    pool_index: usize,
    op: OpKind,
}

impl Arbitrary for SmallTerm {
    fn arbitrary(g: &mut Gen) -> Self {
        let pool_index = usize::arbitrary(g) % POOL_SIZE;
        let op = *g
            .choose(&[OpKind::And, OpKind::Not, OpKind::Optional])
            .unwrap();
        SmallTerm { pool_index, op }
    }
}

#[derive(Debug, Clone)]
struct SmallTable {
    members: Vec<bool>,
}

impl Arbitrary for SmallTable {
    fn arbitrary(g: &mut Gen) -> Self {
        let members = (0..POOL_SIZE).map(|_| bool::arbitrary(g)).collect();
        SmallTable { members }
    }
}

/// Builds a world with `POOL_SIZE` sized components and one entity carrying exactly
/// the subset `table.members` marks present.
fn build_world(table: &SmallTable) -> (World, Vec<Entity>, Entity) {
    let mut world = World::new();
    let pool: Vec<_> = (0..POOL_SIZE)
        .map(|_| world.register_component(ComponentRecord::sized(4)).unwrap())
        .collect();
    let e = world.spawn_empty().unwrap();
    for (present, &component) in table.members.iter().zip(pool.iter()) {
        if *present {
            world.add_component(e, component).unwrap();
        }
    }
    (world, pool, e)
}

fn signature_from_terms(terms: &[SmallTerm], pool: &[Entity]) -> Signature {
    let mut sig = Signature::new();
    for term in terms {
        sig.push(SignatureColumn::new(
            FromKind::Self_,
            term.op,
            Payload::Component(pool[term.pool_index]),
        ));
    }
    sig
}

/// Evaluates the same `Self_`-only signature term-by-term against the raw present set,
/// independent of `Query::match_table`'s summary machinery.
fn brute_force_matches(terms: &[SmallTerm], present: &[bool]) -> bool {
    terms.iter().all(|term| {
        let has = present[term.pool_index];
        match term.op {
            OpKind::And => has,
            OpKind::Not => !has,
            OpKind::Optional | OpKind::Or => true,
        }
    })
}

#[quickcheck]
fn summary_and_match_agree(terms: Vec<SmallTerm>, table: SmallTable) -> TestResult {
    if terms.is_empty() {
        return TestResult::discard();
    }
    let (world, pool, e) = build_world(&table);
    let (_, table_type) = world.table_of(e).unwrap();
    let sig = signature_from_terms(&terms, &pool);
    let query = Query::new(sig);

    let predicted = query.match_table(&world, table_type);
    let expected = brute_force_matches(&terms, &table.members);
    TestResult::from_bool(predicted == expected)
}

#[quickcheck]
fn column_plan_is_exactly_one_of_three_states(terms: Vec<SmallTerm>, table: SmallTable) -> TestResult {
    if terms.is_empty() {
        return TestResult::discard();
    }
    let (mut world, pool, e) = build_world(&table);
    let (archetype, table_type) = world.table_of(e).unwrap();
    let sig = signature_from_terms(&terms, &pool);
    let mut query = Query::new(sig);
    if !query.add_table(&mut world, archetype, table_type).unwrap() {
        return TestResult::discard();
    }

    let matched = &query.matched_tables()[0];
    let all_consistent = matched.columns.iter().all(|plan| {
        let value = plan.as_i32();
        match plan {
            ColumnPlan::Direct(_) => value > 0,
            ColumnPlan::Tag => value == 0,
            ColumnPlan::Ref(_) => value < 0,
        }
    });
    TestResult::from_bool(all_consistent)
}

#[quickcheck]
fn matching_a_table_twice_is_idempotent(terms: Vec<SmallTerm>, table: SmallTable) -> TestResult {
    if terms.is_empty() {
        return TestResult::discard();
    }
    let (mut world, pool, e) = build_world(&table);
    let (archetype, table_type) = world.table_of(e).unwrap();
    let sig = signature_from_terms(&terms, &pool);
    let mut query = Query::new(sig);
    let first_added = query.add_table(&mut world, archetype, table_type).unwrap();
    if !first_added {
        return TestResult::discard();
    }
    let before = query.matched_tables()[0].columns.clone();

    let second_added = query.add_table(&mut world, archetype, table_type).unwrap();
    let after = &query.matched_tables()[0].columns;

    TestResult::from_bool(!second_added && &before == after && query.matched_tables().len() == 1)
}

#[quickcheck]
fn reference_pointer_matches_get_ptr_until_reallocation(_table: SmallTable) -> TestResult {
    use archetype_query_core::world::WorldContext;

    let mut world = World::new();
    let transform = world.register_component(ComponentRecord::sized(16)).unwrap();
    let parent = world.spawn_empty().unwrap();
    world.add_component(parent, transform).unwrap();

    let child = world.spawn_empty().unwrap();
    world.set_child_of(child, parent).unwrap();

    let mut sig = Signature::new();
    sig.push(SignatureColumn::new(
        FromKind::Container,
        OpKind::And,
        Payload::Component(transform),
    ));
    let mut query = Query::new(sig);
    let (archetype, table_type) = world.table_of(child).unwrap();
    if !query.add_table(&mut world, archetype, table_type).unwrap() {
        return TestResult::discard();
    }

    let reference = &query.matched_tables()[0].references[0];
    let live_ptr = world.get_ptr(reference.entity, reference.component);
    TestResult::from_bool(reference.cached_ptr == live_ptr)
}

#[quickcheck]
fn tag_components_always_collapse_to_zero(_table: SmallTable) -> TestResult {
    let mut world = World::new();
    let tag = world.register_component(ComponentRecord::tag()).unwrap();
    let e = world.spawn_empty().unwrap();
    world.add_component(e, tag).unwrap();

    let mut sig = Signature::new();
    sig.push(SignatureColumn::new(
        FromKind::Self_,
        OpKind::And,
        Payload::Component(tag),
    ));
    let mut query = Query::new(sig);
    let (archetype, table_type) = world.table_of(e).unwrap();
    query.add_table(&mut world, archetype, table_type).unwrap();

    TestResult::from_bool(query.matched_tables()[0].columns[0].as_i32() == 0)
}

#[quickcheck]
fn inherited_sized_component_is_never_a_positive_column(_table: SmallTable) -> TestResult {
    let mut world = World::new();
    let mesh = world.register_component(ComponentRecord::sized(32)).unwrap();
    let prefab = world.spawn_empty().unwrap();
    world.add_component(prefab, mesh).unwrap();

    let instance = world.spawn_empty().unwrap();
    world.set_instance_of(instance, prefab).unwrap();

    let mut sig = Signature::new();
    sig.push(SignatureColumn::new(
        FromKind::Self_,
        OpKind::And,
        Payload::Component(mesh),
    ));
    let mut query = Query::new(sig);
    let (archetype, table_type) = world.table_of(instance).unwrap();
    if !query.add_table(&mut world, archetype, table_type).unwrap() {
        return TestResult::discard();
    }

    TestResult::from_bool(query.matched_tables()[0].columns[0].as_i32() < 0)
}
