//! Bounded-concurrency runner behavior, driven by hand-settled factories and
//! by a real event loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use weft::{batch, concurrent, concurrent_settled, delay, EventLoop, Promise, Reason, Settler, TaskEntry, TaskKey, TaskList};

/// Factories that record their launch and park their settler for the test to
/// release later.
fn gated_tasks(
    count: usize,
) -> (TaskList<i32>, Arc<Mutex<Vec<Settler<i32>>>>, Arc<AtomicUsize>) {
    let settlers = Arc::new(Mutex::new(Vec::new()));
    let launched = Arc::new(AtomicUsize::new(0));
    let mut tasks = TaskList::new();
    for _ in 0..count {
        let settlers = Arc::clone(&settlers);
        let launched = Arc::clone(&launched);
        tasks.push(TaskEntry::factory(move || {
            launched.fetch_add(1, Ordering::SeqCst);
            let (promise, settler) = Promise::pending();
            settlers.lock().unwrap().push(settler);
            promise
        }));
    }
    (tasks, settlers, launched)
}

fn release_next(settlers: &Arc<Mutex<Vec<Settler<i32>>>>, value: i32) {
    let settler = settlers.lock().unwrap().remove(0);
    settler.resolve(value);
}

#[test]
fn concurrent_never_launches_beyond_the_limit() {
    let (tasks, settlers, launched) = gated_tasks(5);
    let result = concurrent(tasks, 2);

    assert_eq!(launched.load(Ordering::SeqCst), 2);
    for settled in 0..5 {
        release_next(&settlers, settled as i32 * 10);
        let in_flight = launched.load(Ordering::SeqCst) - (settled + 1);
        assert!(in_flight <= 2, "{in_flight} in flight after {settled} settled");
    }

    let keyed = result.try_outcome().unwrap().unwrap();
    let keys: Vec<_> = keyed.keys().cloned().collect();
    assert_eq!(
        keys,
        (0..5).map(TaskKey::Index).collect::<Vec<_>>()
    );
    assert_eq!(keyed.into_values(), vec![0, 10, 20, 30, 40]);
}

#[test]
fn concurrent_rejection_stops_new_launches() {
    let (tasks, settlers, launched) = gated_tasks(4);
    let result = concurrent(tasks, 2);
    assert_eq!(launched.load(Ordering::SeqCst), 2);

    let failing = settlers.lock().unwrap().remove(1);
    failing.reject(Reason::from("entry exploded"));

    assert!(result.is_rejected());
    assert_eq!(launched.load(Ordering::SeqCst), 2);

    // The surviving in-flight task settles without reviving the runner.
    release_next(&settlers, 99);
    assert_eq!(launched.load(Ordering::SeqCst), 2);
    let Err(reason) = result.try_outcome().unwrap() else {
        panic!("expected rejection");
    };
    assert_eq!(reason.to_string(), "entry exploded");
}

#[test]
fn concurrent_settled_records_every_outcome() {
    let (tasks, settlers, _) = gated_tasks(3);
    let result = concurrent_settled(tasks, 3);

    release_next(&settlers, 1);
    let failing = settlers.lock().unwrap().remove(0);
    failing.reject(Reason::from("middle failed"));
    release_next(&settlers, 3);

    let keyed = result.try_outcome().unwrap().unwrap();
    assert_eq!(keyed.get_index(0).unwrap().value(), Some(&1));
    assert_eq!(
        keyed.get_index(1).unwrap().reason().map(|r| r.to_string()),
        Some("middle failed".to_string())
    );
    assert_eq!(keyed.get_index(2).unwrap().value(), Some(&3));
}

#[test]
fn batch_waits_for_a_chunk_before_starting_the_next() {
    let (tasks, settlers, launched) = gated_tasks(5);
    let result = batch(tasks, 2, 2);

    // Only the first chunk launches.
    assert_eq!(launched.load(Ordering::SeqCst), 2);
    release_next(&settlers, 0);
    assert_eq!(launched.load(Ordering::SeqCst), 2);
    release_next(&settlers, 1);

    // Chunk one settled; chunk two launches.
    assert_eq!(launched.load(Ordering::SeqCst), 4);
    release_next(&settlers, 2);
    release_next(&settlers, 3);
    assert_eq!(launched.load(Ordering::SeqCst), 5);
    release_next(&settlers, 4);

    let keyed = result.try_outcome().unwrap().unwrap();
    assert_eq!(keyed.into_values(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn concurrent_drives_spawned_tasks_on_a_loop() {
    let event_loop = EventLoop::new();
    let handle = event_loop.handle();

    let mut tasks = TaskList::new();
    for i in 0..4u64 {
        let task_handle = handle.clone();
        tasks.insert(
            format!("job-{i}"),
            handle.spawn(async move {
                let _ = delay(&task_handle, Duration::from_millis(20 - 5 * i))
                    .promise()
                    .await;
                i
            }),
        );
    }

    let keyed = concurrent(tasks, 2).wait(&handle).unwrap();
    // The limiter assembles results in input order regardless of completion.
    let keys: Vec<_> = keyed.keys().cloned().collect();
    assert_eq!(
        keys,
        vec![
            TaskKey::from("job-0"),
            TaskKey::from("job-1"),
            TaskKey::from("job-2"),
            TaskKey::from("job-3"),
        ]
    );
    assert_eq!(keyed.into_values(), vec![0, 1, 2, 3]);
}
