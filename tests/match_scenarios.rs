use archetype_query_core::component::ComponentRecord;
use archetype_query_core::query::{FromKind, OpKind, Payload, Query, Signature, SignatureColumn};
use archetype_query_core::types::Type;
use archetype_query_core::world::World;

fn and(from: FromKind, payload: Payload) -> SignatureColumn {
    SignatureColumn::new(from, OpKind::And, payload)
}

fn not(from: FromKind, payload: Payload) -> SignatureColumn {
    SignatureColumn::new(from, OpKind::Not, payload)
}

fn single_table_query(world: &mut World, signature: Signature, entity: archetype_query_core::entity::Entity) -> (bool, Query) {
    let mut query = Query::new(signature);
    let (archetype, table_type) = world.table_of(entity).unwrap();
    let added = query.add_table(world, archetype, table_type).unwrap();
    (added, query)
}

#[test]
fn s1_self_and_and_matches_with_direct_columns_and_no_references() {
    let mut world = World::new();
    let pos = world.register_component(ComponentRecord::sized(8)).unwrap();
    let vel = world.register_component(ComponentRecord::sized(8)).unwrap();
    let e = world.spawn_empty().unwrap();
    world.add_component(e, pos).unwrap();
    world.add_component(e, vel).unwrap();

    let mut sig = Signature::new();
    sig.push(and(FromKind::Self_, Payload::Component(pos)));
    sig.push(and(FromKind::Self_, Payload::Component(vel)));
    let (added, query) = single_table_query(&mut world, sig, e);

    assert!(added);
    let matched = &query.matched_tables()[0];
    assert_eq!(matched.columns[0].as_i32(), 1);
    assert_eq!(matched.columns[1].as_i32(), 2);
    assert!(matched.references.is_empty());
}

#[test]
fn s2_not_term_rejects_the_table() {
    let mut world = World::new();
    let pos = world.register_component(ComponentRecord::sized(8)).unwrap();
    let dead = world.register_component(ComponentRecord::tag()).unwrap();
    let e = world.spawn_empty().unwrap();
    world.add_component(e, pos).unwrap();
    world.add_component(e, dead).unwrap();

    let mut sig = Signature::new();
    sig.push(and(FromKind::Self_, Payload::Component(pos)));
    sig.push(not(FromKind::Self_, Payload::Component(dead)));
    let (added, _) = single_table_query(&mut world, sig, e);

    assert!(!added);
}

#[test]
fn s3_container_term_resolves_to_a_reference_and_watches_the_parent() {
    let mut world = World::new();
    let transform = world.register_component(ComponentRecord::sized(16)).unwrap();
    let pos = world.register_component(ComponentRecord::sized(8)).unwrap();

    let parent = world.spawn_empty().unwrap();
    world.add_component(parent, transform).unwrap();

    let child = world.spawn_empty().unwrap();
    world.add_component(child, pos).unwrap();
    world.set_child_of(child, parent).unwrap();

    let mut sig = Signature::new();
    sig.push(and(FromKind::Self_, Payload::Component(pos)));
    sig.push(and(FromKind::Container, Payload::Component(transform)));
    let (added, query) = single_table_query(&mut world, sig, child);

    assert!(added);
    let matched = &query.matched_tables()[0];
    assert_eq!(matched.columns[0].as_i32(), 1);
    assert_eq!(matched.columns[1].as_i32(), -1);
    assert_eq!(matched.references.len(), 1);
    assert_eq!(matched.references[0].entity, parent);
    assert_eq!(matched.references[0].component, transform);
    assert!(world.is_watched(parent));
}

#[test]
fn s4_prefab_inherited_component_becomes_a_reference() {
    let mut world = World::new();
    let mesh = world.register_component(ComponentRecord::sized(32)).unwrap();

    let prefab = world.spawn_empty().unwrap();
    world.add_component(prefab, mesh).unwrap();

    let instance = world.spawn_empty().unwrap();
    world.set_instance_of(instance, prefab).unwrap();

    let mut sig = Signature::new();
    sig.push(and(FromKind::Self_, Payload::Component(mesh)));
    let (added, query) = single_table_query(&mut world, sig, instance);

    assert!(added);
    let matched = &query.matched_tables()[0];
    let (_, instance_type) = world.table_of(instance).unwrap();
    assert_eq!(
        archetype_query_core::types::index_of(instance_type, mesh),
        None
    );
    assert!(matched.columns[0].as_i32() < 0);
    assert_eq!(matched.references[0].entity, prefab);
}

#[test]
fn s5_missing_optional_collapses_to_tag() {
    let mut world = World::new();
    let a = world.register_component(ComponentRecord::sized(4)).unwrap();
    let b = world.register_component(ComponentRecord::sized(4)).unwrap();
    let e = world.spawn_empty().unwrap();
    world.add_component(e, a).unwrap();

    let mut sig = Signature::new();
    sig.push(and(FromKind::Self_, Payload::Component(a)));
    sig.push(SignatureColumn::new(
        FromKind::Self_,
        OpKind::Optional,
        Payload::Component(b),
    ));
    let (added, query) = single_table_query(&mut world, sig, e);

    assert!(added);
    let matched = &query.matched_tables()[0];
    assert_eq!(matched.columns[0].as_i32(), 1);
    assert_eq!(matched.columns[1].as_i32(), 0);
}

#[test]
fn s6_or_term_picks_up_whichever_member_is_present() {
    let mut world = World::new();
    let a = world.register_component(ComponentRecord::sized(4)).unwrap();
    let b = world.register_component(ComponentRecord::sized(4)).unwrap();
    let c = world.register_component(ComponentRecord::sized(4)).unwrap();
    let e = world.spawn_empty().unwrap();
    world.add_component(e, b).unwrap();
    world.add_component(e, c).unwrap();

    // The `Or` payload names a type to search for any member of; a query builder
    // would intern this the same way the world interns archetype types.
    let type_store = archetype_query_core::types::TypeStore::new();
    let or_type: Type = type_store.intern(vec![a, b]);

    let mut sig = Signature::new();
    sig.push(SignatureColumn::new(
        FromKind::Self_,
        OpKind::Or,
        Payload::Type(or_type),
    ));
    let (added, query) = single_table_query(&mut world, sig, e);

    assert!(added);
    let matched = &query.matched_tables()[0];
    let (_, table_type) = world.table_of(e).unwrap();
    let expected = archetype_query_core::types::index_of(table_type, b).unwrap() as i32 + 1;
    assert_eq!(matched.columns[0].as_i32(), expected);
    assert_eq!(matched.components[0], Some(b));
}
