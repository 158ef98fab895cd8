//! Executor semantics: layered concurrency, retries with backoff, timeouts,
//! conditional skips, failure propagation, and output visibility.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;

use paperflow_core::errors::WorkflowError;
use paperflow_workflow::{
    step_fn, StepOptions, StepStatus, TokenBucketRateLimiter, WorkflowDag, WorkflowExecutor,
};

fn deps(ids: &[&str]) -> StepOptions {
    StepOptions {
        depends_on: ids.iter().map(|s| s.to_string()).collect(),
        ..StepOptions::default()
    }
}

#[tokio::test]
async fn diamond_dag_succeeds_with_parallel_middle_layer() {
    let starts: Arc<Mutex<HashMap<String, Instant>>> = Arc::new(Mutex::new(HashMap::new()));

    let mut dag = WorkflowDag::new();
    for (id, dep_ids) in [
        ("root", vec![]),
        ("left", vec!["root"]),
        ("right", vec!["root"]),
        ("join", vec!["left", "right"]),
    ] {
        let starts = starts.clone();
        let id_owned = id.to_string();
        dag.add_step(
            id,
            step_fn(move |_ctx| {
                let starts = starts.clone();
                let id = id_owned.clone();
                async move {
                    starts.lock().unwrap().insert(id.clone(), Instant::now());
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(json!(id))
                }
            }),
            deps(&dep_ids),
        )
        .unwrap();
    }

    let executor = WorkflowExecutor::new(4, 30.0);
    let result = executor.execute(&dag, json!({})).await.unwrap();

    assert!(result.success);
    assert_eq!(result.completed_count, 4);
    assert_eq!(result.failed_count, 0);
    for id in ["root", "left", "right", "join"] {
        assert_eq!(result.steps[id].status, StepStatus::Completed);
    }

    // left and right launch together.
    let starts = starts.lock().unwrap();
    let delta = starts["left"]
        .duration_since(starts["right"])
        .max(starts["right"].duration_since(starts["left"]));
    assert!(delta < Duration::from_millis(50), "delta was {delta:?}");

    // join starts only after both middle steps finished.
    assert!(starts["join"] >= starts["left"] + Duration::from_millis(100));
}

#[tokio::test]
async fn flaky_step_retries_then_succeeds() {
    let attempts = Arc::new(AtomicU32::new(0));

    let mut dag = WorkflowDag::new();
    let attempts_in_step = attempts.clone();
    dag.add_step(
        "flaky",
        step_fn(move |_ctx| {
            let attempts = attempts_in_step.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(WorkflowError::StepFailed(format!("attempt {n} exploded")))
                } else {
                    Ok(json!("finally"))
                }
            }
        }),
        StepOptions {
            max_retries: 3,
            retry_backoff_base: 0.01,
            ..StepOptions::default()
        },
    )
    .unwrap();

    let executor = WorkflowExecutor::new(4, 30.0);
    let t0 = Instant::now();
    let result = executor.execute(&dag, json!({})).await.unwrap();
    let elapsed = t0.elapsed();

    let step = &result.steps["flaky"];
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(step.retries_used, 2);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    // Two backoffs: >= 0.01 + 0.02 seconds.
    assert!(elapsed >= Duration::from_millis(30), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn retries_exhausted_marks_step_failed() {
    let mut dag = WorkflowDag::new();
    dag.add_step(
        "hopeless",
        step_fn(|_ctx| async { Err(WorkflowError::StepFailed("nope".into())) }),
        StepOptions {
            max_retries: 2,
            retry_backoff_base: 0.005,
            ..StepOptions::default()
        },
    )
    .unwrap();

    let executor = WorkflowExecutor::new(4, 30.0);
    let result = executor.execute(&dag, json!({})).await.unwrap();

    let step = &result.steps["hopeless"];
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.retries_used, 2);
    assert!(step.error.as_deref().unwrap().contains("nope"));
    assert!(!result.success);
}

#[tokio::test]
async fn failed_dependency_skips_child_but_not_independent_branch() {
    let mut dag = WorkflowDag::new();
    dag.add_step(
        "fail",
        step_fn(|_ctx| async { Err(WorkflowError::StepFailed("boom".into())) }),
        StepOptions {
            max_retries: 0,
            ..StepOptions::default()
        },
    )
    .unwrap();
    dag.add_step(
        "child",
        step_fn(|_ctx| async { Ok(json!("never runs")) }),
        deps(&["fail"]),
    )
    .unwrap();
    dag.add_step(
        "independent",
        step_fn(|_ctx| async { Ok(json!("fine")) }),
        StepOptions::default(),
    )
    .unwrap();

    let executor = WorkflowExecutor::new(4, 30.0);
    let result = executor.execute(&dag, json!({})).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.steps["fail"].status, StepStatus::Failed);
    assert_eq!(result.steps["child"].status, StepStatus::Skipped);
    assert_eq!(
        result.steps["child"].error.as_deref(),
        Some("Dependency failed")
    );
    assert_eq!(result.steps["independent"].status, StepStatus::Completed);
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.skipped_count, 1);
    assert_eq!(result.completed_count, 1);
}

#[tokio::test]
async fn skipped_dependency_does_not_propagate() {
    let mut dag = WorkflowDag::new();
    dag.add_step(
        "gated",
        step_fn(|_ctx| async { Ok(json!("unused")) }),
        StepOptions {
            condition: Some(Arc::new(|_ctx| Ok(false))),
            ..StepOptions::default()
        },
    )
    .unwrap();
    dag.add_step(
        "after",
        step_fn(|_ctx| async { Ok(json!("ran anyway")) }),
        deps(&["gated"]),
    )
    .unwrap();

    let executor = WorkflowExecutor::new(4, 30.0);
    let result = executor.execute(&dag, json!({})).await.unwrap();

    assert_eq!(result.steps["gated"].status, StepStatus::Skipped);
    assert_eq!(result.steps["gated"].duration_seconds, 0.0);
    assert!(result.steps["gated"].error.is_none());
    assert_eq!(result.steps["after"].status, StepStatus::Completed);
    assert!(result.success);
}

#[tokio::test]
async fn condition_error_fails_the_step() {
    let mut dag = WorkflowDag::new();
    dag.add_step(
        "guarded",
        step_fn(|_ctx| async { Ok(json!(1)) }),
        StepOptions {
            condition: Some(Arc::new(|_ctx| {
                Err(WorkflowError::StepFailed("predicate blew up".into()))
            })),
            ..StepOptions::default()
        },
    )
    .unwrap();

    let executor = WorkflowExecutor::new(4, 30.0);
    let result = executor.execute(&dag, json!({})).await.unwrap();

    let step = &result.steps["guarded"];
    assert_eq!(step.status, StepStatus::Failed);
    let err = step.error.as_deref().unwrap();
    assert!(err.starts_with("Condition evaluation failed:"), "{err}");
    assert!(err.contains("predicate blew up"));
}

#[tokio::test]
async fn timeout_counts_as_retryable_failure() {
    let mut dag = WorkflowDag::new();
    dag.add_step(
        "slow",
        step_fn(|_ctx| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(json!("too late"))
        }),
        StepOptions {
            max_retries: 1,
            retry_backoff_base: 0.005,
            timeout_seconds: Some(0.05),
            ..StepOptions::default()
        },
    )
    .unwrap();

    let executor = WorkflowExecutor::new(4, 30.0);
    let result = executor.execute(&dag, json!({})).await.unwrap();

    let step = &result.steps["slow"];
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.retries_used, 1);
    assert_eq!(step.error.as_deref(), Some("Step timed out after 0.05s"));
}

#[tokio::test]
async fn invalid_dag_fails_before_running_anything() {
    let ran = Arc::new(AtomicU32::new(0));
    let mut dag = WorkflowDag::new();
    let ran_in_step = ran.clone();
    dag.add_step(
        "a",
        step_fn(move |_ctx| {
            let ran = ran_in_step.clone();
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(json!(null))
            }
        }),
        deps(&["missing"]),
    )
    .unwrap();

    let executor = WorkflowExecutor::new(4, 30.0);
    let err = executor.execute(&dag, json!({})).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidDag { .. }));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn step_outputs_are_visible_downstream() {
    let mut dag = WorkflowDag::new();
    dag.add_step(
        "root",
        step_fn(|ctx| async move {
            // Caller-supplied context is visible too.
            let base = ctx.get("base").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(json!(base + 7))
        }),
        StepOptions::default(),
    )
    .unwrap();
    dag.add_step(
        "child",
        step_fn(|ctx| async move {
            let upstream = ctx
                .output("root")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| WorkflowError::StepFailed("missing root output".into()))?;
            Ok(json!(upstream * 2))
        }),
        deps(&["root"]),
    )
    .unwrap();

    let executor = WorkflowExecutor::new(4, 30.0);
    let result = executor.execute(&dag, json!({ "base": 3 })).await.unwrap();

    assert_eq!(result.steps["root"].output, Some(json!(10)));
    assert_eq!(result.steps["child"].output, Some(json!(20)));
}

#[tokio::test]
async fn global_concurrency_cap_is_enforced() {
    let current = Arc::new(AtomicI32::new(0));
    let peak = Arc::new(AtomicI32::new(0));

    let mut dag = WorkflowDag::new();
    for i in 0..6 {
        let current = current.clone();
        let peak = peak.clone();
        dag.add_step(
            &format!("s{i}"),
            step_fn(move |_ctx| {
                let current = current.clone();
                let peak = peak.clone();
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(40)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(json!(null))
                }
            }),
            StepOptions::default(),
        )
        .unwrap();
    }

    let executor = WorkflowExecutor::new(2, 30.0);
    let result = executor.execute(&dag, json!({})).await.unwrap();

    assert!(result.success);
    assert!(
        peak.load(Ordering::SeqCst) <= 2,
        "peak concurrency {} exceeded the cap",
        peak.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn tagged_steps_are_rate_limited() {
    let mut dag = WorkflowDag::new();
    for id in ["first", "second"] {
        dag.add_step(
            id,
            step_fn(|_ctx| async { Ok(json!(null)) }),
            StepOptions {
                resource_tag: Some("provider".into()),
                ..StepOptions::default()
            },
        )
        .unwrap();
    }

    let limiter = Arc::new(TokenBucketRateLimiter::new(10.0, 1));
    let executor = WorkflowExecutor::new(4, 30.0).with_rate_limiter("provider", limiter);

    let t0 = Instant::now();
    let result = executor.execute(&dag, json!({})).await.unwrap();
    assert!(result.success);
    // Second acquire must wait for a refill: >= ~0.1 s total.
    assert!(t0.elapsed() >= Duration::from_millis(90), "{:?}", t0.elapsed());
}

#[tokio::test]
async fn untagged_steps_ignore_registered_limiters() {
    let mut dag = WorkflowDag::new();
    for id in ["a", "b", "c"] {
        dag.add_step(id, step_fn(|_ctx| async { Ok(json!(null)) }), StepOptions::default())
            .unwrap();
    }

    let limiter = Arc::new(TokenBucketRateLimiter::new(1.0, 1));
    let executor = WorkflowExecutor::new(4, 30.0).with_rate_limiter("provider", limiter);

    let t0 = Instant::now();
    executor.execute(&dag, json!({})).await.unwrap();
    assert!(t0.elapsed() < Duration::from_millis(500));
}
