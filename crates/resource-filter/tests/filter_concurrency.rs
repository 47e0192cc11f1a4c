//! Sharing one compiled filter between threads.
//!
//! A compiled [`Filter`] holds no evaluation state, so warnings raised on one
//! thread only ever reach that thread's sink.
//!
//! Run with: cargo test --package resource-filter-rs --test filter_concurrency

use std::thread;

use resource_filter::{Deprecation, Filter, ProjectionEnv, Value};
use serde_json::json;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_filter_and_env_are_send_sync() {
    assert_send_sync::<Filter>();
    assert_send_sync::<ProjectionEnv>();
}

// ============================================================================
// Shared Evaluation
// ============================================================================

#[test]
fn test_each_thread_gets_its_own_warning() {
    let filter = Filter::compile("subject:pdq", &ProjectionEnv::builtin()).unwrap();

    let sinks: Vec<(bool, Vec<Deprecation>)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|id| {
                let filter = &filter;
                scope.spawn(move || {
                    let resource: Value = json!({"id": id, "subject": "abcpdqxyz"}).into();
                    let mut warnings = Vec::new();
                    let matched = filter.evaluate(&resource, &mut warnings).unwrap();
                    (matched, warnings)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sinks.len(), 8);
    for (matched, warnings) in &sinks {
        assert!(matched);
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert_eq!(warnings[0].expression, "subject:pdq");
    }
}

#[test]
fn test_threads_select_independently() {
    let env = ProjectionEnv::builder()
        .parent(ProjectionEnv::builtin())
        .alias("n", "metadata.name")
        .unwrap()
        .build();
    let filter = Filter::compile("n:web* size>=10", &env).unwrap();

    let counts: Vec<usize> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4usize)
            .map(|limit| {
                let filter = filter.clone();
                scope.spawn(move || {
                    let resources: Vec<Value> = (0..=limit * 10)
                        .map(|size| json!({"metadata": {"name": "web"}, "size": size}).into())
                        .collect();
                    let mut warnings: Vec<Deprecation> = Vec::new();
                    let selected = filter.filter_values(&resources, &mut warnings).unwrap();
                    selected.len()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(counts, vec![0, 1, 11, 21]);
}
