//! Process init, runtime ownership and layer state machine tests.

mod common;

use std::sync::Arc;
use std::thread;

use svm_runtime::{MemEngine, Runtime, Svm, SvmConfig, SvmError};

use common::*;

// ── Init ──

#[test]
fn test_init_twice_keeps_first_config() {
    let engine = Arc::new(MemEngine::new());
    let svm = Svm::new(engine.clone());

    svm.init(&SvmConfig::persistent("/var/lib/svm")).unwrap();
    svm.init(&SvmConfig::in_memory()).unwrap();
    assert_eq!(engine.is_persistent(), Some(true));
}

#[test]
fn test_second_svm_over_same_engine_does_not_reinit() {
    let engine = Arc::new(MemEngine::new());
    let first = Svm::new(engine.clone());
    let second = Svm::new(engine.clone());

    first.init(&SvmConfig::persistent("/var/lib/svm")).unwrap();
    second.init(&SvmConfig::in_memory()).unwrap();
    assert_eq!(engine.is_persistent(), Some(true));
    assert!(second.is_initialized());
}

#[test]
fn test_concurrent_init_runs_once() {
    let svm = Arc::new(Svm::in_process());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let svm = Arc::clone(&svm);
            thread::spawn(move || svm.init(&SvmConfig::in_memory()))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert!(svm.is_initialized());
}

#[test]
fn test_new_runtime_before_init() {
    let svm = Svm::in_process();
    let err = svm.new_runtime().unwrap_err();
    assert_eq!(err, SvmError::NotInitialized);
    assert!(err.is_caller_error());
}

// ── Runtime counting ──

#[test]
fn test_runtimes_count() {
    let (svm, _engine) = svm();
    assert_eq!(svm.runtimes_count(), 0);

    let runtimes: Vec<Runtime> = (0..3).map(|_| svm.new_runtime().unwrap()).collect();
    assert_eq!(svm.runtimes_count(), 3);

    for runtime in runtimes {
        runtime.destroy();
    }
    assert_eq!(svm.runtimes_count(), 0);
}

#[test]
fn test_runtimes_are_isolated() {
    let (svm, _engine) = svm();
    let mut a = runtime_at(&svm, 1);
    let b = svm.new_runtime().unwrap();

    let template = deploy_template(&mut a, 1);
    let account = spawn_account(&mut a, template, 1);
    assert!(a.get_account(&account).is_ok());
    assert!(b.get_account(&account).is_err());
}

#[test]
fn test_runtime_moves_across_threads() {
    let (svm, _engine) = svm();
    let mut runtime = svm.new_runtime().unwrap();

    let runtime = thread::spawn(move || {
        runtime.open(1).unwrap();
        runtime
    })
    .join()
    .unwrap();
    assert_eq!(runtime.open_layer(), Some(1));
}

// ── Layer caller errors ──

#[test]
fn test_open_must_follow_current_layer() {
    let (svm, _engine) = svm();
    let mut runtime = svm.new_runtime().unwrap();

    assert_eq!(
        runtime.open(0).unwrap_err(),
        SvmError::InvalidLayer {
            requested: 0,
            expected: 1
        }
    );
    runtime.open(1).unwrap();
    runtime.commit().unwrap();
    assert_eq!(
        runtime.open(3).unwrap_err(),
        SvmError::InvalidLayer {
            requested: 3,
            expected: 2
        }
    );
}

#[test]
fn test_double_open() {
    let (svm, _engine) = svm();
    let mut runtime = runtime_at(&svm, 1);
    assert_eq!(runtime.open(2).unwrap_err(), SvmError::LayerAlreadyOpen(1));
}

#[test]
fn test_transactions_need_open_layer() {
    let (svm, _engine) = svm();
    let mut runtime = svm.new_runtime().unwrap();

    let err = runtime
        .deploy(&envelope(MAX_GAS), &deploy_msg("template_example"), &context(1))
        .unwrap_err();
    assert_eq!(err, SvmError::LayerNotOpen);

    let err = runtime
        .call(&envelope(MAX_GAS), &call_msg([1; 20], "load_addr", vec![]), &context(1))
        .unwrap_err();
    assert_eq!(err, SvmError::LayerNotOpen);
}

#[test]
fn test_commit_closes_layer() {
    let (svm, _engine) = svm();
    let mut runtime = runtime_at(&svm, 1);
    runtime.commit().unwrap();
    assert_eq!(runtime.open_layer(), None);
    assert_eq!(runtime.commit().unwrap_err(), SvmError::LayerNotOpen);
}

#[test]
fn test_rewind_while_open() {
    let (svm, _engine) = svm();
    let mut runtime = runtime_at(&svm, 1);
    assert_eq!(runtime.rewind(0).unwrap_err(), SvmError::LayerAlreadyOpen(1));
}

#[test]
fn test_rewind_to_genesis() {
    let (svm, _engine) = svm();
    let mut runtime = runtime_at(&svm, 1);
    deploy_template(&mut runtime, 1);
    runtime.commit().unwrap();

    assert_eq!(runtime.rewind(0).unwrap(), [0u8; 32]);
    assert_eq!(runtime.current_layer(), 0);
    runtime.open(1).unwrap();
}

// ── Buffers ──

#[test]
fn test_every_result_buffer_is_freed() {
    let (svm, engine) = svm();
    let mut runtime = runtime_at(&svm, 1);

    let template = deploy_template(&mut runtime, 1);
    let account = spawn_account(&mut runtime, template, 1);
    runtime
        .call(&envelope(MAX_GAS), &call_msg(account, "load_addr", vec![]), &context(1))
        .unwrap();
    runtime
        .deploy(&envelope(10), &deploy_msg("cheap"), &context(1))
        .unwrap();
    runtime.validate_call(&[1, 2, 3]).unwrap_err();
    runtime.get_account(&[9; 20]).unwrap_err();
    runtime.commit().unwrap();
    runtime.rewind(7).unwrap_err();

    assert_eq!(engine.outstanding_buffers(), 0);
}
