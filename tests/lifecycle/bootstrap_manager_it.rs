#[path = "../support/lifecycle/bootstrap.rs"]
mod bootstrap_support;

use bootstrap_support::{
    database, memory_namespace, CountingMediator, FailingDatabase, PassScript,
    RejectingNamespace, ScriptedProvider,
};
use shardboot::clock::ManualClock;
use shardboot::lifecycle::bootstrap::{
    BootstrapConfig, BootstrapError, BootstrapManager, BootstrapState, ProcessError,
};
use shardboot::observability::{Instrument, SharedMetricsRegistry};
use shardboot::storage::{Database, MemoryShard, Namespace, NamespaceId, Shard, StorageError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

fn manager(
    db: Arc<dyn Database>,
    provider: &ScriptedProvider,
) -> (Arc<BootstrapManager>, Arc<CountingMediator>, Arc<ManualClock>) {
    let mediator = Arc::new(CountingMediator::default());
    provider.observe_mediator(mediator.clone());
    let clock = Arc::new(ManualClock::new(
        SystemTime::UNIX_EPOCH + Duration::from_secs(86_400),
    ));
    let manager = BootstrapManager::new(
        db,
        mediator.clone(),
        Arc::new(provider.clone()),
        &BootstrapConfig::default(),
    )
    .with_clock(clock.clone());
    (Arc::new(manager), mediator, clock)
}

fn counter(manager: &BootstrapManager, name: &str) -> u64 {
    manager
        .instrument()
        .metrics()
        .snapshot()
        .expect("metrics snapshot")
        .counter(name)
}

#[test]
fn requests_during_a_run_coalesce_into_one_extra_pass() {
    let ns = memory_namespace("metrics", vec![MemoryShard::new(1), MemoryShard::new(2)]);
    let db = database(&[ns.clone() as Arc<dyn Namespace>]);
    let provider = ScriptedProvider::default();
    let gate = provider.gate_first_pass();
    let (manager, mediator, _) = manager(db, &provider);

    let runner = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.bootstrap())
    };
    gate.started
        .recv_timeout(Duration::from_secs(10))
        .expect("first pass started");
    assert_eq!(manager.state(), BootstrapState::Bootstrapping);

    let callers: Vec<_> = (0..5)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.bootstrap())
        })
        .collect();
    for caller in callers {
        let outcome = caller.join().expect("caller thread");
        assert_eq!(outcome, Err(BootstrapError::Enqueued));
    }
    assert!(!manager.is_bootstrapped());

    gate.release.send(()).expect("release first pass");
    runner
        .join()
        .expect("runner thread")
        .expect("run succeeds");

    assert_eq!(provider.runs(), 2, "five requests add exactly one pass");
    assert_eq!(provider.max_active(), 1, "passes never overlap");
    assert_eq!(provider.provided(), 2);
    assert_eq!(provider.reused(), 0);
    assert!(manager.is_bootstrapped());
    assert_eq!(mediator.disabled(), 1);
    assert_eq!(mediator.enabled(), 1);
    assert_eq!(provider.paused_during_run(), vec![true, true]);
    assert_eq!(counter(&manager, "dbnode.bootstrap.enqueued"), 5);
    assert_eq!(counter(&manager, "dbnode.bootstrap.pass_success"), 2);
}

#[test]
fn idle_run_executes_a_single_pass() {
    let ns = memory_namespace("metrics", vec![MemoryShard::new(1)]);
    let db = database(&[ns.clone() as Arc<dyn Namespace>]);
    let provider = ScriptedProvider::default();
    let (manager, _, _) = manager(db, &provider);

    manager.bootstrap().expect("bootstrap");

    assert_eq!(provider.runs(), 1);
    assert!(ns.shard(1).expect("shard").is_bootstrapped());
    let points = ns
        .shard(1)
        .expect("shard")
        .read("cpu.user")
        .expect("readable once bootstrapped");
    assert_eq!(points.len(), 1);
}

#[test]
fn namespace_rejection_does_not_block_siblings() {
    let a = memory_namespace("a", vec![MemoryShard::new(1)]);
    let b = Arc::new(RejectingNamespace::new("b", vec![MemoryShard::new(1)]));
    let c = memory_namespace("c", vec![MemoryShard::new(1)]);
    let db = database(&[
        a.clone() as Arc<dyn Namespace>,
        b.clone() as Arc<dyn Namespace>,
        c.clone() as Arc<dyn Namespace>,
    ]);
    let provider = ScriptedProvider::default();
    let (manager, mediator, _) = manager(db, &provider);

    let err = manager.bootstrap().expect_err("b rejects its result");

    assert_eq!(
        err,
        BootstrapError::Namespace {
            namespace: NamespaceId::new("b"),
            source: StorageError::Other("index segment corrupt".into()),
        }
    );
    assert!(!err.is_invariant_violation());
    assert!(a.shard(1).expect("shard").is_bootstrapped());
    assert!(c.shard(1).expect("shard").is_bootstrapped());
    assert_eq!(b.attempts(), 1);
    assert!(manager.is_bootstrapped());
    assert_eq!(mediator.enabled(), 1);
}

#[test]
fn missing_result_aborts_the_rest_of_the_pass() {
    let a = memory_namespace("a", vec![MemoryShard::new(1)]);
    let b = memory_namespace("b", vec![MemoryShard::new(1)]);
    let c = memory_namespace("c", vec![MemoryShard::new(1)]);
    let db = database(&[
        a.clone() as Arc<dyn Namespace>,
        b.clone() as Arc<dyn Namespace>,
        c.clone() as Arc<dyn Namespace>,
    ]);
    let provider = ScriptedProvider::new([PassScript::Omit(vec![NamespaceId::new("b")])]);
    let (manager, mediator, _) = manager(db, &provider);

    let err = manager.bootstrap().expect_err("b missing from result");

    assert_eq!(
        err,
        BootstrapError::MissingNamespaceResult {
            namespace: NamespaceId::new("b")
        }
    );
    assert!(err.is_invariant_violation());
    assert_eq!(a.bootstrap_count(), 1);
    assert_eq!(b.bootstrap_count(), 0);
    assert_eq!(c.bootstrap_count(), 0, "c is never attempted");
    assert_eq!(counter(&manager, "dbnode.invariant_violated"), 1);
    assert!(manager.is_bootstrapped());
    assert_eq!(mediator.disabled(), 1);
    assert_eq!(mediator.enabled(), 1);
}

#[test]
fn process_failure_ends_bootstrapped_without_touching_namespaces() {
    let ns = memory_namespace("metrics", vec![MemoryShard::new(1)]);
    let db = database(&[ns.clone() as Arc<dyn Namespace>]);
    let provider = ScriptedProvider::new([PassScript::Fail(ProcessError::SourceUnavailable(
        "peers".into(),
    ))]);
    let (manager, mediator, _) = manager(db, &provider);

    let err = manager.bootstrap().expect_err("process fails");

    assert_eq!(
        err,
        BootstrapError::Process(ProcessError::SourceUnavailable("peers".into()))
    );
    assert_eq!(manager.state(), BootstrapState::Bootstrapped);
    assert_eq!(ns.bootstrap_count(), 0);
    assert!(!ns.shard(1).expect("shard").is_bootstrapped());
    assert_eq!(mediator.enabled(), 1);
    assert_eq!(counter(&manager, "dbnode.bootstrap.pass_failure"), 1);
}

#[test]
fn maintenance_is_resumed_for_every_outcome() {
    let scripts = vec![
        PassScript::CoverAll,
        PassScript::Fail(ProcessError::Failed("commitlog".into())),
        PassScript::Omit(vec![NamespaceId::new("a")]),
    ];
    for script in scripts {
        let a = memory_namespace("a", vec![MemoryShard::new(1)]);
        let b = Arc::new(RejectingNamespace::new("b", vec![MemoryShard::new(2)]));
        let db = database(&[a as Arc<dyn Namespace>, b as Arc<dyn Namespace>]);
        let provider = ScriptedProvider::new([script.clone()]);
        let (manager, mediator, _) = manager(db, &provider);

        let _ = manager.bootstrap();

        assert_eq!(mediator.disabled(), 1, "script {:?}", script);
        assert_eq!(mediator.enabled(), 1, "script {:?}", script);
        assert!(!mediator.is_paused());
    }
}

#[test]
fn maintenance_is_resumed_when_a_pass_panics() {
    let ns = memory_namespace("metrics", vec![MemoryShard::new(1)]);
    let db = database(&[ns as Arc<dyn Namespace>]);
    let provider = ScriptedProvider::new([PassScript::Panic]);
    let (manager, mediator, _) = manager(db, &provider);

    let runner = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.bootstrap())
    };
    assert!(runner.join().is_err());
    assert_eq!(mediator.disabled(), 1);
    assert_eq!(mediator.enabled(), 1);

    assert_eq!(manager.state(), BootstrapState::Bootstrapped);
    manager.bootstrap().expect("next run starts fresh");
    assert_eq!(provider.runs(), 2);
    assert_eq!(mediator.disabled(), 2);
    assert_eq!(mediator.enabled(), 2);
}

#[test]
fn invariant_panic_does_not_wedge_the_manager() {
    let a = memory_namespace("a", vec![MemoryShard::new(1)]);
    let db = database(&[a.clone() as Arc<dyn Namespace>]);
    let provider = ScriptedProvider::new([PassScript::Omit(vec![NamespaceId::new("a")])]);
    let mediator = Arc::new(CountingMediator::default());
    let instrument = Instrument::new(SharedMetricsRegistry::new("dbnode"))
        .with_panic_on_invariant_violation(true);
    let manager = Arc::new(
        BootstrapManager::new(
            db,
            mediator.clone(),
            Arc::new(provider.clone()),
            &BootstrapConfig::default(),
        )
        .with_instrument(instrument),
    );

    let runner = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.bootstrap())
    };
    assert!(runner.join().is_err(), "missing result panics when configured to");
    assert_eq!(counter(&manager, "dbnode.invariant_violated"), 1);
    assert_eq!(mediator.enabled(), 1);
    assert!(!a.shard(1).expect("shard").is_bootstrapped());

    assert_eq!(manager.state(), BootstrapState::Bootstrapped);
    manager.bootstrap().expect("follow-up run covers every namespace");
    assert!(a.shard(1).expect("shard").is_bootstrapped());
    assert_eq!(mediator.disabled(), 2);
    assert_eq!(mediator.enabled(), 2);
}

#[test]
fn rejections_within_one_pass_are_combined_in_order() {
    let a = Arc::new(RejectingNamespace::new("a", vec![MemoryShard::new(1)]));
    let b = memory_namespace("b", vec![MemoryShard::new(1)]);
    let c = Arc::new(RejectingNamespace::new("c", vec![MemoryShard::new(2)]));
    let db = database(&[
        a.clone() as Arc<dyn Namespace>,
        b.clone() as Arc<dyn Namespace>,
        c.clone() as Arc<dyn Namespace>,
    ]);
    let provider = ScriptedProvider::default();
    let (manager, _, _) = manager(db, &provider);

    let err = manager.bootstrap().expect_err("a and c reject");
    let BootstrapError::Multi(multi) = err else {
        panic!("expected combined error, got {err:?}");
    };
    let rejected: Vec<_> = multi
        .into_iter()
        .map(|err| match err {
            BootstrapError::Namespace { namespace, .. } => namespace,
            other => panic!("unexpected error {other:?}"),
        })
        .collect();
    assert_eq!(rejected, vec![NamespaceId::new("a"), NamespaceId::new("c")]);
    assert!(b.shard(1).expect("shard").is_bootstrapped());
    assert_eq!((a.attempts(), c.attempts()), (1, 1));
    assert!(manager.is_bootstrapped());
}

#[test]
fn ownership_lookup_failure_fails_the_pass() {
    let provider = ScriptedProvider::default();
    let db = Arc::new(FailingDatabase::new("topology unavailable"));
    let (manager, mediator, _) = manager(db, &provider);

    let err = manager.bootstrap().expect_err("ownership lookup fails");

    assert_eq!(
        err,
        BootstrapError::OwnedNamespaces(StorageError::Other("topology unavailable".into()))
    );
    assert_eq!(provider.runs(), 0);
    assert_eq!(manager.state(), BootstrapState::Bootstrapped);
    assert_eq!(mediator.disabled(), 1);
    assert_eq!(mediator.enabled(), 1);
    assert_eq!(counter(&manager, "dbnode.bootstrap.pass_failure"), 1);
}

#[test]
fn completion_time_tracks_every_finished_run() {
    let ns = memory_namespace("metrics", vec![MemoryShard::new(1)]);
    let db = database(&[ns as Arc<dyn Namespace>]);
    let provider = ScriptedProvider::new([PassScript::Fail(ProcessError::Failed(
        "disk".into(),
    ))]);
    let (manager, _, clock) = manager(db, &provider);

    assert_eq!(manager.last_bootstrap_completion_time(), None);

    let first = clock.advance(Duration::from_secs(5));
    manager.bootstrap().expect_err("first run fails");
    assert_eq!(manager.last_bootstrap_completion_time(), Some(first));

    let second = clock.advance(Duration::from_secs(60));
    manager.bootstrap().expect("second run succeeds");
    assert_eq!(manager.last_bootstrap_completion_time(), Some(second));
    assert!(second > first);
}

#[test]
fn fully_bootstrapped_namespace_is_still_reconciled() {
    let warm = memory_namespace(
        "warm",
        vec![MemoryShard::bootstrapped(1), MemoryShard::bootstrapped(2)],
    );
    let cold = memory_namespace("cold", vec![MemoryShard::new(3)]);
    let db = database(&[
        warm.clone() as Arc<dyn Namespace>,
        cold.clone() as Arc<dyn Namespace>,
    ]);
    let provider = ScriptedProvider::default();
    let (manager, _, _) = manager(db, &provider);

    manager.bootstrap().expect("bootstrap");

    let targets = provider.targets();
    assert_eq!(targets.len(), 1);
    assert_eq!(
        targets[0],
        vec![
            (NamespaceId::new("warm"), vec![]),
            (NamespaceId::new("cold"), vec![3]),
        ]
    );
    assert_eq!(warm.bootstrap_count(), 1);
    assert_eq!(cold.bootstrap_count(), 1);
    assert_eq!(warm.state(), BootstrapState::Bootstrapped);
}

#[test]
fn ownership_changes_are_picked_up_by_the_coalesced_pass() {
    let original = memory_namespace("original", vec![MemoryShard::new(1)]);
    let db = database(&[original.clone() as Arc<dyn Namespace>]);
    let provider = ScriptedProvider::default();
    let gate = provider.gate_first_pass();
    let (manager, _, _) = manager(db.clone(), &provider);

    let runner = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.bootstrap())
    };
    gate.started
        .recv_timeout(Duration::from_secs(10))
        .expect("first pass started");

    let added = memory_namespace("resharded", vec![MemoryShard::new(7)]);
    db.add_namespace(added.clone());
    assert_eq!(manager.bootstrap(), Err(BootstrapError::Enqueued));

    gate.release.send(()).expect("release first pass");
    runner
        .join()
        .expect("runner thread")
        .expect("run succeeds");

    let targets = provider.targets();
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0], vec![(NamespaceId::new("original"), vec![1])]);
    assert_eq!(
        targets[1],
        vec![
            (NamespaceId::new("original"), vec![]),
            (NamespaceId::new("resharded"), vec![7]),
        ]
    );
    assert!(added.shard(7).expect("shard").is_bootstrapped());
    assert_eq!(original.bootstrap_count(), 2);
}

#[test]
fn errors_from_coalesced_passes_are_combined() {
    let ns = memory_namespace("metrics", vec![MemoryShard::new(1)]);
    let db = database(&[ns as Arc<dyn Namespace>]);
    let provider = ScriptedProvider::new([
        PassScript::Fail(ProcessError::Failed("first".into())),
        PassScript::Fail(ProcessError::Failed("second".into())),
    ]);
    let gate = provider.gate_first_pass();
    let (manager, _, _) = manager(db, &provider);

    let runner = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.bootstrap())
    };
    gate.started
        .recv_timeout(Duration::from_secs(10))
        .expect("first pass started");
    assert_eq!(manager.bootstrap(), Err(BootstrapError::Enqueued));
    gate.release.send(()).expect("release first pass");

    let err = runner
        .join()
        .expect("runner thread")
        .expect_err("both passes fail");
    match err {
        BootstrapError::Multi(multi) => {
            let errors: Vec<_> = multi.into_iter().collect();
            assert_eq!(
                errors,
                vec![
                    BootstrapError::Process(ProcessError::Failed("first".into())),
                    BootstrapError::Process(ProcessError::Failed("second".into())),
                ]
            );
        }
        other => panic!("expected combined error, got {other:?}"),
    }
    assert!(manager.is_bootstrapped());
}
