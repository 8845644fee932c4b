/// Generator tests
///
/// Configured generators with each optimizer, shared tables, and schema export
/// running against the in-memory backend.
/// Run with: cargo test --test generator_tests

mod common;

use common::row_value;
use seqtable::dialect::{GenericDialect, PostgreSqlDialect};
use seqtable::schema::execute_script;
use seqtable::{
    Connection, Database, DatabaseStructure, GeneratorConfig, MemoryDatabase,
    MemoryIsolationDelegate, OptimizerKind, SeqError, Session, TableSequenceGenerator,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;

fn setup(config: &GeneratorConfig) -> (Arc<MemoryDatabase>, TableSequenceGenerator, Session) {
    let db = MemoryDatabase::new();
    let generator = TableSequenceGenerator::configure(config, &GenericDialect).unwrap();
    execute_script(
        &mut db.connect(),
        &generator.sql_create_strings(&GenericDialect),
    )
    .unwrap();
    let session = Session::new(Arc::new(MemoryIsolationDelegate::new(Arc::clone(&db))));
    (db, generator, session)
}

fn take(generator: &TableSequenceGenerator, session: &Session, n: usize) -> Vec<i64> {
    (0..n)
        .map(|_| generator.generate(session).unwrap().value())
        .collect()
}

#[test]
fn test_plain_generator_uses_row_values() {
    let (db, generator, session) = setup(&GeneratorConfig::new("id_gen"));

    assert_eq!(take(&generator, &session, 5), vec![1, 2, 3, 4, 5]);
    assert_eq!(row_value(&db, "id_gen"), 6);
    assert_eq!(generator.optimizer_kind(), OptimizerKind::None);
}

#[test]
fn test_hilo_generator_blocks() {
    let config = GeneratorConfig::new("id_gen")
        .increment_size(5)
        .optimizer(OptimizerKind::HiLo);
    let (db, generator, session) = setup(&config);

    assert_eq!(take(&generator, &session, 12), (1..=12).collect::<Vec<_>>());
    // One row read per block of five.
    assert_eq!(row_value(&db, "id_gen"), 4);
    assert_eq!(generator.structure().times_accessed(), 3);
    assert_eq!(generator.optimizer().last_source_value(None).unwrap().value(), 3);
}

#[test]
fn test_pooled_generator_blocks() {
    let config = GeneratorConfig::new("id_gen").increment_size(10);
    let (db, generator, session) = setup(&config);
    assert_eq!(generator.optimizer_kind(), OptimizerKind::Pooled);

    assert_eq!(take(&generator, &session, 25), (1..=25).collect::<Vec<_>>());
    assert_eq!(row_value(&db, "id_gen"), 41);
    assert_eq!(generator.structure().times_accessed(), 4);
}

#[test]
fn test_hilo_tenants_get_separate_blocks() {
    let config = GeneratorConfig::new("id_gen")
        .increment_size(5)
        .optimizer(OptimizerKind::HiLo);
    let (_db, generator, session) = setup(&config);
    let acme = session.clone().tenant("acme");
    let globex = session.tenant("globex");

    assert_eq!(take(&generator, &acme, 2), vec![1, 2]);
    assert_eq!(take(&generator, &globex, 2), vec![6, 7]);
    assert_eq!(take(&generator, &acme, 1), vec![3]);
}

#[test]
fn test_generators_sharing_a_table() {
    let config = GeneratorConfig::new("shared_ids").increment_size(20);
    let first = TableSequenceGenerator::configure(&config, &GenericDialect).unwrap();
    let second = TableSequenceGenerator::configure(&config, &GenericDialect).unwrap();

    let mut database = Database::new();
    first.register_exportables(&mut database);
    second.register_exportables(&mut database);

    let script = database.sql_create_strings(&GenericDialect);
    assert_eq!(
        script,
        vec![
            "create table shared_ids ( next_val bigint )".to_string(),
            "insert into shared_ids values ( 1 )".to_string(),
        ]
    );

    let db = MemoryDatabase::new();
    execute_script(&mut db.connect(), &script).unwrap();
    let session = Session::new(Arc::new(MemoryIsolationDelegate::new(Arc::clone(&db))));

    let values: Vec<i64> = thread::scope(|scope| {
        let a = scope.spawn(|| take(&first, &session, 60));
        let b = scope.spawn(|| take(&second, &session, 60));
        let mut values = a.join().unwrap();
        values.extend(b.join().unwrap());
        values
    });

    let unique: HashSet<i64> = values.iter().copied().collect();
    assert_eq!(unique.len(), 120);
    assert_eq!(db.column_values("shared_ids").unwrap().len(), 1);
}

#[test]
fn test_missing_seed_row_stops_generation() {
    let config = GeneratorConfig::new("id_gen");
    let generator = TableSequenceGenerator::configure(&config, &GenericDialect).unwrap();
    let db = MemoryDatabase::new();
    db.connect()
        .execute("create table id_gen ( next_val bigint )")
        .unwrap();
    let session = Session::new(Arc::new(MemoryIsolationDelegate::new(Arc::clone(&db))));

    for _ in 0..2 {
        let err = generator.generate(&session).unwrap_err();
        assert!(matches!(err, SeqError::TableNotInitialized { .. }));
    }
    assert!(db.column_values("id_gen").unwrap().is_empty());
}

#[test]
fn test_create_and_drop_round_trip() {
    let config = GeneratorConfig::new("app.id_gen").initial_value(100);
    let generator = TableSequenceGenerator::configure(&config, &PostgreSqlDialect).unwrap();
    let db = MemoryDatabase::new();
    let mut conn = db.connect();

    execute_script(&mut conn, &generator.sql_create_strings(&PostgreSqlDialect)).unwrap();
    assert_eq!(db.column_values("app.id_gen").unwrap(), vec![100]);

    execute_script(&mut conn, &generator.sql_drop_strings(&PostgreSqlDialect)).unwrap();
    assert!(!db.table_exists("app.id_gen").unwrap());

    // The postgres drop is conditional, so running it twice is harmless.
    execute_script(&mut conn, &generator.sql_drop_strings(&PostgreSqlDialect)).unwrap();
    assert!(!generator.structure().is_physical_sequence());
}

#[test]
fn test_generator_from_properties() {
    let props: HashMap<String, String> = [
        ("table_name", "order_ids"),
        ("increment_size", "3"),
        ("optimizer", "hilo"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let config = GeneratorConfig::from_properties(&props).unwrap();
    let (db, generator, session) = setup(&config);

    assert_eq!(take(&generator, &session, 4), vec![1, 2, 3, 4]);
    assert_eq!(row_value(&db, "order_ids"), 3);
}
