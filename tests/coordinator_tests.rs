// Copyright (c) 2023 Contributors to the Eclipse Foundation
//
// See the NOTICE file(s) distributed with this work for additional
// information regarding copyright ownership.
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Exercises the literal scenarios from spec §8 against the in-memory test doubles.

use iceoryx2_bb_cache_access::assert_that;
use iceoryx2_bb_cache_access::cache_parameters::CacheParameters;
use iceoryx2_bb_cache_access::coordinator::CacheAccessCoordinatorBuilder;
use iceoryx2_bb_cache_access::file_access::FileAccessRequiresLockError;
use iceoryx2_bb_cache_access::lock_mode::LockMode;
use iceoryx2_bb_cache_access::testing::{TestFileLockManager, TestIndexedCache, TestInitializationAction};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn coordinator_with(
    mode: LockMode,
    lock_manager: Arc<TestFileLockManager>,
    init: Arc<TestInitializationAction>,
) -> iceoryx2_bb_cache_access::CacheAccessCoordinator {
    CacheAccessCoordinatorBuilder::new()
        .lock_file("/tmp/coordinator-tests.lock")
        .lock_mode(mode)
        .lock_manager(lock_manager)
        .initialization_action(init)
        .create()
        .expect("failed to create coordinator")
}

// Scenario 1: Shared open/close, already initialized.
#[test]
fn shared_open_close_acquires_and_releases_exactly_once() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = coordinator_with(LockMode::Shared, Arc::clone(&lock_manager), init);

    coordinator.open().expect("open failed");
    assert_that!(lock_manager.lock_history(), eq vec![LockMode::Shared]);
    assert_that!(lock_manager.is_locked(), eq true);

    coordinator.close();
    assert_that!(lock_manager.close_count(), eq 1);
    assert_that!(lock_manager.is_locked(), eq false);
}

// Scenario 2: Shared upgrade for init - upgrade to Exclusive, initialize, downgrade back.
#[test]
fn shared_open_upgrades_for_initialization_then_downgrades() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::needs_initialization());
    let coordinator = coordinator_with(LockMode::Shared, Arc::clone(&lock_manager), Arc::clone(&init));

    coordinator.open().expect("open failed");

    assert_that!(
        lock_manager.lock_history(),
        eq vec![LockMode::Shared, LockMode::Exclusive, LockMode::Shared]
    );
    assert_that!(lock_manager.close_count(), eq 2);
    assert_that!(init.initialize_call_count(), eq 1);
    assert_that!(init.requires_initialization_call_count(), eq 3);

    coordinator.close();
    assert_that!(lock_manager.close_count(), eq 3);
}

// A failing initialize() during the Shared->Exclusive upgrade must close every lock it opened
// and propagate the failure, leaving the coordinator able to close cleanly afterwards.
#[test]
fn failing_initialization_during_upgrade_leaves_no_lock_held() {
    use iceoryx2_bb_cache_access::initialization_action::InitializationError;

    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::failing_initialization(
        InitializationError::Corrupted,
    ));
    let coordinator = coordinator_with(LockMode::Shared, Arc::clone(&lock_manager), init);

    let result = coordinator.open();
    assert_that!(result, is_err);
    assert_that!(lock_manager.is_locked(), eq false);

    // close() must still be safe to call and not panic or double-close anything.
    coordinator.close();
}

// Scenario 3 (part 1): None mode lazy-acquires on first use_cache, and the lock stays held
// after the use_cache frame returns.
#[test]
fn none_mode_opens_without_a_lock_and_acquires_lazily_on_use_cache() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = coordinator_with(LockMode::None, Arc::clone(&lock_manager), init);

    coordinator.open().expect("open failed");
    assert_that!(lock_manager.is_locked(), eq false);

    let result = coordinator
        .use_cache("first touch", || 42)
        .expect("use_cache failed");
    assert_that!(result, eq 42);

    assert_that!(lock_manager.lock_history(), eq vec![LockMode::Exclusive]);
    assert_that!(lock_manager.is_locked(), eq true);
}

// Scenario 3 (part 2): contention fired with no owner closes the held lock exactly once.
#[test]
fn contention_with_no_owner_closes_the_lock_once() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = coordinator_with(LockMode::None, Arc::clone(&lock_manager), init);

    coordinator.open().expect("open failed");
    coordinator
        .use_cache("touch", || ())
        .expect("use_cache failed");
    assert_that!(lock_manager.is_locked(), eq true);

    let handler = coordinator.when_contended();
    handler();
    assert_that!(lock_manager.close_count(), eq 1);
    assert_that!(lock_manager.is_locked(), eq false);

    // Firing again with no lock held is a no-op, not a double close.
    handler();
    assert_that!(lock_manager.close_count(), eq 1);
}

// Scenario 4: nested use_cache on the same thread reuses ownership without acquiring twice.
#[test]
fn nested_use_cache_on_same_thread_acquires_only_once() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = coordinator_with(LockMode::None, Arc::clone(&lock_manager), init);
    coordinator.open().expect("open failed");

    let outer_thread = thread::current().id();
    coordinator
        .use_cache("outer", || {
            coordinator
                .use_cache("inner", || {
                    assert_that!(thread::current().id(), eq outer_thread);
                })
                .expect("inner use_cache failed");
        })
        .expect("outer use_cache failed");

    assert_that!(lock_manager.lock_history(), eq vec![LockMode::Exclusive]);
}

// Scenario 5: a long-running operation that triggers contention mid-action releases ownership
// (and the lock) for the action's duration, then reacquires exactly one new lock on return.
#[test]
fn long_running_operation_releases_and_reacquires_on_mid_action_contention() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = coordinator_with(LockMode::None, Arc::clone(&lock_manager), init);
    coordinator.open().expect("open failed");

    coordinator
        .use_cache("outer", || {
            let handler = coordinator.when_contended();
            coordinator.long_running_operation("slow thing", || {
                // Mid-action: ownership has already been relinquished, so this closes the lock
                // immediately rather than just flagging contention.
                assert_that!(
                    coordinator.file_access().read_file(&mut || Ok(())),
                    is_err
                );
                handler();
                assert_that!(lock_manager.is_locked(), eq false);
            });

            // Ownership (and a freshly acquired lock) must be restored before returning.
            assert_that!(
                coordinator.file_access().read_file(&mut || Ok(())),
                is_ok
            );
        })
        .expect("outer use_cache failed");

    assert_that!(
        lock_manager.lock_history(),
        eq vec![LockMode::Exclusive, LockMode::Exclusive]
    );
    assert_that!(lock_manager.close_count(), eq 1);
}

// Top-level long_running_operation (no enclosing use_cache) is a pure passthrough: no lock is
// ever taken, and fileAccess fails throughout, per the open question resolved in DESIGN.md.
#[test]
fn top_level_long_running_operation_is_a_lock_noop() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = coordinator_with(LockMode::None, Arc::clone(&lock_manager), init);
    coordinator.open().expect("open failed");

    let result = coordinator.long_running_operation("top level", || {
        assert_that!(lock_manager.is_locked(), eq false);
        assert_that!(
            coordinator.file_access().read_file(&mut || Ok(())),
            is_err
        );
        7
    });
    assert_that!(result, eq 7);
    assert_that!(lock_manager.lock_history().len(), eq 0);
}

// Reentrant long_running_operation (called again from inside another one, same thread) is also
// a no-op: ownership was already relinquished by the enclosing call.
#[test]
fn reentrant_long_running_operation_is_a_noop() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = coordinator_with(LockMode::None, Arc::clone(&lock_manager), init);
    coordinator.open().expect("open failed");

    coordinator
        .use_cache("outer", || {
            coordinator.long_running_operation("outer-slow", || {
                let inner = coordinator.long_running_operation("inner-slow", || 99);
                assert_that!(inner, eq 99);
            });
        })
        .expect("outer use_cache failed");

    assert_that!(lock_manager.lock_history(), eq vec![LockMode::Exclusive]);
}

// Scenario 6: incompatible cache reuse is rejected, and the first cache remains usable.
#[test]
fn incompatible_cache_reuse_is_rejected_first_cache_remains_valid() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = coordinator_with(LockMode::None, lock_manager, init);
    coordinator.open().expect("open failed");

    let first = coordinator
        .new_cache(
            CacheParameters::<String, u32>::new("c"),
            TestIndexedCache::new,
        )
        .expect("first new_cache failed");

    coordinator
        .use_cache("seed", || first.put("k".to_string(), 1))
        .expect("use_cache failed")
        .expect("put failed");

    let mismatched = coordinator.new_cache(
        CacheParameters::<String, String>::new("c"),
        TestIndexedCache::new,
    );
    assert_that!(mismatched, is_err);

    // The first cache is unaffected by the rejected second registration.
    let value = coordinator
        .use_cache("read back", || first.get(&"k".to_string()))
        .expect("use_cache failed")
        .expect("get failed");
    assert_that!(value, eq Some(1));
}

// new_cache is deterministic for compatible params: the same object (by cache id) comes back.
#[test]
fn compatible_cache_reuse_returns_the_same_cache() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = coordinator_with(LockMode::None, lock_manager, init);
    coordinator.open().expect("open failed");

    let first = coordinator
        .new_cache(
            CacheParameters::<String, u32>::new("c"),
            TestIndexedCache::new,
        )
        .expect("first new_cache failed");
    let second = coordinator
        .new_cache(
            CacheParameters::<String, u32>::new("c"),
            TestIndexedCache::new,
        )
        .expect("second new_cache failed");

    assert_that!(first.id(), eq second.id());
}

// Opening twice fails with AlreadyOpenError and does not disturb the already-open state.
#[test]
fn opening_twice_fails() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = coordinator_with(LockMode::None, Arc::clone(&lock_manager), init);

    coordinator.open().expect("first open failed");
    let second = coordinator.open();
    assert_that!(second, is_err);

    coordinator.close();
}

// Closing without ever opening - and closing twice - must not fail.
#[test]
fn close_is_idempotent() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = coordinator_with(LockMode::None, lock_manager, init);

    coordinator.close();
    coordinator.open().expect("open failed");
    coordinator.close();
    coordinator.close();
}

// Shared mode forbids use_cache outright, without ever touching the lock manager.
#[test]
fn shared_mode_forbids_use_cache() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = coordinator_with(LockMode::Shared, Arc::clone(&lock_manager), init);
    coordinator.open().expect("open failed");

    let result = coordinator.use_cache("write", || ());
    assert_that!(result, is_err);
    assert_that!(lock_manager.lock_history(), eq vec![LockMode::Shared]);
}

// fileAccess fails off-owner: a second thread calling in while the first owns must see
// FileAccessRequiresLockError rather than silently touching the lock file.
#[test]
fn file_access_fails_off_owner_thread() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = Arc::new(coordinator_with(LockMode::None, lock_manager, init));
    coordinator.open().expect("open failed");

    let entered = Arc::new(Barrier::new(2));
    let may_leave = Arc::new(Barrier::new(2));
    let other_failed = Arc::new(AtomicU32::new(0));

    let coordinator_for_owner = Arc::clone(&coordinator);
    let entered_for_owner = Arc::clone(&entered);
    let may_leave_for_owner = Arc::clone(&may_leave);
    let owner_thread = thread::spawn(move || {
        coordinator_for_owner
            .use_cache("owner", || {
                entered_for_owner.wait();
                may_leave_for_owner.wait();
            })
            .expect("use_cache failed");
    });

    let coordinator_for_other = Arc::clone(&coordinator);
    let other_failed_clone = Arc::clone(&other_failed);
    entered.wait();
    let other_thread = thread::spawn(move || {
        let result = coordinator_for_other
            .file_access()
            .read_file(&mut || Ok(()));
        if matches!(
            result,
            Err(iceoryx2_bb_cache_access::file_access::FileAccessError::FileAccessRequiresLockError(
                FileAccessRequiresLockError::NotOwner,
            ))
        ) {
            other_failed_clone.fetch_add(1, Ordering::SeqCst);
        }
    });
    other_thread.join().unwrap();
    assert_that!(other_failed.load(Ordering::SeqCst), eq 1);

    may_leave.wait();
    owner_thread.join().unwrap();
}

// A second thread calling use_cache while another thread owns blocks until ownership is freed,
// rather than racing it or failing.
#[test]
fn use_cache_on_a_second_thread_waits_for_ownership() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = Arc::new(coordinator_with(LockMode::None, lock_manager, init));
    coordinator.open().expect("open failed");

    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let entered = Arc::new(Barrier::new(2));

    let coordinator_a = Arc::clone(&coordinator);
    let order_a = Arc::clone(&order);
    let entered_a = Arc::clone(&entered);
    let first = thread::spawn(move || {
        coordinator_a
            .use_cache("first", || {
                entered_a.wait();
                thread::sleep(Duration::from_millis(50));
                order_a.lock().unwrap().push(1);
            })
            .expect("use_cache failed");
    });

    entered.wait();
    let coordinator_b = Arc::clone(&coordinator);
    let order_b = Arc::clone(&order);
    let second = thread::spawn(move || {
        coordinator_b
            .use_cache("second", || {
                order_b.lock().unwrap().push(2);
            })
            .expect("use_cache failed");
    });

    first.join().unwrap();
    second.join().unwrap();
    assert_that!(*order.lock().unwrap(), eq vec![1, 2]);
}

// A panicking use_cache action must still release ownership - otherwise the panicking thread's
// id would stay recorded as owner forever and every later use_cache call would block for good.
#[test]
fn use_cache_releases_ownership_when_the_action_panics() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = Arc::new(coordinator_with(LockMode::None, lock_manager, init));
    coordinator.open().expect("open failed");

    let coordinator_for_panic = Arc::clone(&coordinator);
    let panicking = thread::spawn(move || {
        let _ = coordinator_for_panic.use_cache("panics", || panic!("boom"));
    });
    assert_that!(panicking.join(), is_err);

    // If exit_use_cache never ran, this would block forever rather than return.
    let result = coordinator
        .use_cache("after panic", || 99)
        .expect("use_cache failed");
    assert_that!(result, eq 99);
}

// Same guarantee for long_running_operation: a panic inside the relinquished-ownership window
// must still restore ownership on the way out, so the enclosing use_cache frame (and any later
// caller) isn't left blocked.
#[test]
fn long_running_operation_restores_ownership_when_the_action_panics() {
    let lock_manager = Arc::new(TestFileLockManager::new());
    let init = Arc::new(TestInitializationAction::already_initialized());
    let coordinator = Arc::new(coordinator_with(LockMode::None, lock_manager, init));
    coordinator.open().expect("open failed");

    let coordinator_for_panic = Arc::clone(&coordinator);
    let panicking = thread::spawn(move || {
        let _ = coordinator_for_panic.use_cache("outer", || {
            coordinator_for_panic.long_running_operation("panics mid-flight", || panic!("boom"));
        });
    });
    assert_that!(panicking.join(), is_err);

    let result = coordinator
        .use_cache("after panic", || 7)
        .expect("use_cache failed");
    assert_that!(result, eq 7);
}
