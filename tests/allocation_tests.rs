/// Counter table allocation tests
///
/// Exercises the read/compare-and-swap protocol against the in-memory backend.
/// Run with: cargo test --test allocation_tests

mod common;

use common::{NoLockDialect, ScriptedDelegate, create_counter, row_value};
use seqtable::core::{Identifier, NumberType, QualifiedName};
use seqtable::dialect::GenericDialect;
use seqtable::optimizer::{HiLoOptimizer, PooledOptimizer};
use seqtable::session::StatementStatistics;
use seqtable::{
    Connection, DatabaseStructure, MemoryDatabase, MemoryIsolationDelegate, RetryPolicy, SeqError,
    Session, TableStructure,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

fn structure(table: &str, initial: i64, increment: i64) -> TableStructure {
    TableStructure::new(
        &GenericDialect,
        QualifiedName::parse(table).unwrap(),
        &Identifier::parse("next_val").unwrap(),
        initial,
        increment,
        NumberType::Long,
    )
    .unwrap()
}

fn memory_session(db: &Arc<MemoryDatabase>) -> Session {
    Session::new(Arc::new(MemoryIsolationDelegate::new(Arc::clone(db))))
}

#[test]
fn test_scenario_increment_not_applied() {
    let db = MemoryDatabase::new();
    create_counter(&db, "id_gen", 1);
    let structure = structure("id_gen", 1, 20);
    structure.prepare(&HiLoOptimizer::new(NumberType::Long, 20));

    let session = memory_session(&db);
    let callback = structure.build_callback(&session);

    for (expected, row_after) in [(1, 2), (2, 3), (3, 4)] {
        assert_eq!(callback.next_value().unwrap().value(), expected);
        assert_eq!(row_value(&db, "id_gen"), row_after);
    }
    assert_eq!(structure.times_accessed(), 3);
}

#[test]
fn test_increment_applied_to_source() {
    let db = MemoryDatabase::new();
    create_counter(&db, "id_gen", 1);
    let structure = structure("id_gen", 1, 20);
    structure.prepare(&PooledOptimizer::new(NumberType::Long, 20, Some(1)));

    let session = memory_session(&db);
    let callback = structure.build_callback(&session);

    assert_eq!(callback.next_value().unwrap().value(), 1);
    assert_eq!(row_value(&db, "id_gen"), 21);
    assert_eq!(callback.next_value().unwrap().value(), 21);
    assert_eq!(row_value(&db, "id_gen"), 41);
}

#[test]
fn test_row_value_is_strictly_increasing() {
    let db = MemoryDatabase::new();
    create_counter(&db, "id_gen", 10);
    let structure = structure("id_gen", 10, 1);
    let session = memory_session(&db);
    let callback = structure.build_callback(&session);

    let mut previous = row_value(&db, "id_gen");
    for _ in 0..25 {
        let value = callback.next_value().unwrap().value();
        let current = row_value(&db, "id_gen");
        assert_eq!(value, previous);
        assert!(current > previous);
        previous = current;
    }
}

#[test]
fn test_concurrent_allocations_are_unique() {
    let db = MemoryDatabase::new();
    create_counter(&db, "id_gen", 1);
    let structure = structure("id_gen", 1, 1);
    let session = memory_session(&db);

    let threads = 8;
    let per_thread = 50;

    let values: Vec<i64> = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(|| {
                    let callback = structure.build_callback(&session);
                    (0..per_thread)
                        .map(|_| callback.next_value().unwrap().value())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let unique: HashSet<i64> = values.iter().copied().collect();
    assert_eq!(unique.len(), threads * per_thread);
    assert_eq!(*unique.iter().min().unwrap(), 1);
    assert_eq!(*unique.iter().max().unwrap(), (threads * per_thread) as i64);
    assert_eq!(row_value(&db, "id_gen"), (threads * per_thread) as i64 + 1);
}

#[test]
fn test_concurrent_allocations_with_increment_step() {
    let db = MemoryDatabase::new();
    create_counter(&db, "id_gen", 1);
    let structure = structure("id_gen", 1, 20);
    structure.prepare(&PooledOptimizer::new(NumberType::Long, 20, Some(1)));
    assert_eq!(structure.source_delta(), 20);
    let session = memory_session(&db);

    let threads = 6;
    let per_thread = 30;

    let values: Vec<i64> = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(|| {
                    let callback = structure.build_callback(&session);
                    (0..per_thread)
                        .map(|_| callback.next_value().unwrap().value())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let allocations = (threads * per_thread) as i64;
    let unique: HashSet<i64> = values.iter().copied().collect();
    let expected: HashSet<i64> = (0..allocations).map(|k| 1 + 20 * k).collect();
    assert_eq!(values.len(), threads * per_thread);
    assert_eq!(unique, expected);
    assert_eq!(row_value(&db, "id_gen"), 1 + 20 * allocations);
    assert_eq!(structure.times_accessed(), allocations as u64);
}

#[test]
fn test_concurrent_allocations_without_lock_hint() {
    let db = MemoryDatabase::new();
    create_counter(&db, "id_gen", 1);
    let structure = TableStructure::new(
        &NoLockDialect,
        QualifiedName::parse("id_gen").unwrap(),
        &Identifier::parse("next_val").unwrap(),
        1,
        1,
        NumberType::Long,
    )
    .unwrap();
    let session = memory_session(&db);

    let values: Vec<i64> = thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                scope.spawn(|| {
                    let callback = structure.build_callback(&session);
                    (0..40)
                        .map(|_| callback.next_value().unwrap().value())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let unique: HashSet<i64> = values.iter().copied().collect();
    assert_eq!(unique.len(), 240);
    assert_eq!(row_value(&db, "id_gen"), 241);
}

#[test]
fn test_empty_table_is_fatal_and_never_updates() {
    let db = MemoryDatabase::new();
    db.connect()
        .execute("create table id_gen ( next_val bigint )")
        .unwrap();

    let delegate = ScriptedDelegate::new(Arc::clone(&db));
    let session = Session::new(delegate.clone());
    let structure = structure("id_gen", 1, 1);
    let callback = structure.build_callback(&session);

    let err = callback.next_value().unwrap_err();
    assert!(matches!(err, SeqError::TableNotInitialized { ref table } if table == "id_gen"));
    assert!(err.is_configuration());
    assert!(err.to_string().contains("id_gen"));

    assert_eq!(delegate.count_starting_with("select"), 1);
    assert_eq!(delegate.count_starting_with("update"), 0);
    assert_eq!(structure.times_accessed(), 0);
}

#[test]
fn test_lost_race_is_retried() {
    let db = MemoryDatabase::new();
    create_counter(&db, "id_gen", 1);
    let delegate = ScriptedDelegate::new(Arc::clone(&db));
    delegate.interfere_after_next_query("update id_gen set next_val = 50 where next_val = 1");

    let session = Session::new(delegate.clone());
    let structure = TableStructure::new(
        &NoLockDialect,
        QualifiedName::parse("id_gen").unwrap(),
        &Identifier::parse("next_val").unwrap(),
        1,
        1,
        NumberType::Long,
    )
    .unwrap();
    let callback = structure.build_callback(&session);

    assert_eq!(callback.next_value().unwrap().value(), 50);
    assert_eq!(row_value(&db, "id_gen"), 51);
    assert_eq!(delegate.count_starting_with("select"), 2);
    assert_eq!(delegate.count_starting_with("update"), 2);
    assert_eq!(structure.times_accessed(), 1);
}

#[test]
fn test_bounded_retry_gives_up() {
    let db = MemoryDatabase::new();
    create_counter(&db, "id_gen", 1);
    let delegate = ScriptedDelegate::new(Arc::clone(&db));
    delegate.interfere_after_next_query("update id_gen set next_val = 100 where next_val = 1");
    delegate.interfere_after_next_query("update id_gen set next_val = 200 where next_val = 100");
    delegate.interfere_after_next_query("update id_gen set next_val = 300 where next_val = 200");

    let session = Session::new(delegate.clone());
    let structure = TableStructure::new(
        &NoLockDialect,
        QualifiedName::parse("id_gen").unwrap(),
        &Identifier::parse("next_val").unwrap(),
        1,
        1,
        NumberType::Long,
    )
    .unwrap()
    .with_retry_policy(RetryPolicy::Bounded { max_attempts: 3 });
    let callback = structure.build_callback(&session);

    let err = callback.next_value().unwrap_err();
    assert!(matches!(err, SeqError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(row_value(&db, "id_gen"), 300);
    assert_eq!(structure.times_accessed(), 0);
}

#[test]
fn test_statement_failure_names_the_statement() {
    let db = MemoryDatabase::new();
    let structure = structure("missing_gen", 1, 1);
    let session = memory_session(&db);

    let err = structure.build_callback(&session).next_value().unwrap_err();
    match &err {
        SeqError::Sql { statement, source } => {
            assert_eq!(statement, structure.select_query());
            assert!(source.to_string().contains("missing_gen"));
        }
        other => panic!("expected a statement error, got {other:?}"),
    }
    assert!(!err.is_configuration());
    assert_eq!(structure.times_accessed(), 0);
}

#[test]
fn test_allocation_survives_caller_rollback() {
    let db = MemoryDatabase::new();
    create_counter(&db, "id_gen", 1);
    let structure = structure("id_gen", 1, 1);
    let session = memory_session(&db);

    let mut business = db.connect();
    business
        .execute("create table orders ( id bigint )")
        .unwrap();

    business.begin().unwrap();
    let id = structure.build_callback(&session).next_value().unwrap();
    business
        .execute(&format!("insert into orders values ( {} )", id.value()))
        .unwrap();
    business.rollback().unwrap();

    assert!(db.column_values("orders").unwrap().is_empty());
    assert_eq!(row_value(&db, "id_gen"), 2);
}

#[test]
fn test_overflow_is_reported() {
    let db = MemoryDatabase::new();
    create_counter(&db, "id_gen", i16::MAX as i64);
    let structure = TableStructure::new(
        &GenericDialect,
        QualifiedName::parse("id_gen").unwrap(),
        &Identifier::parse("next_val").unwrap(),
        1,
        1,
        NumberType::Short,
    )
    .unwrap();
    let session = memory_session(&db);

    let err = structure.build_callback(&session).next_value().unwrap_err();
    assert!(matches!(err, SeqError::Overflow(_)));
    assert_eq!(row_value(&db, "id_gen"), i16::MAX as i64);
}

#[test]
fn test_listener_sees_each_statement() {
    let db = MemoryDatabase::new();
    create_counter(&db, "id_gen", 1);
    let stats = Arc::new(StatementStatistics::new());
    let session = memory_session(&db).listener(stats.clone());
    let structure = structure("id_gen", 1, 1);

    structure.build_callback(&session).next_value().unwrap();

    assert_eq!(stats.prepared_count(), 2);
    assert_eq!(stats.executed_count(), 2);
}

#[test]
fn test_tenant_is_exposed_to_optimizers() {
    let db = MemoryDatabase::new();
    create_counter(&db, "id_gen", 1);
    let structure = structure("id_gen", 1, 1);
    let session = memory_session(&db).tenant("acme");

    let callback = structure.build_callback(&session);
    assert_eq!(callback.tenant_identifier(), Some("acme"));
}
