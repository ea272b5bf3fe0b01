//! FIFO handover of the promise mutex under overlapping cooperative tasks.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use weft::{all, delay, EventLoop, Mutex, TaskList};

#[test]
fn overlapping_tasks_enter_the_critical_section_in_acquire_order() {
    let event_loop = EventLoop::new();
    let handle = event_loop.handle();
    let mutex = Mutex::new();
    let trace: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));

    let mut tasks = TaskList::new();
    for i in 0..3u32 {
        let task_handle = handle.clone();
        let mutex = Arc::clone(&mutex);
        let trace = Arc::clone(&trace);
        tasks.push(handle.spawn(async move {
            let Ok(lock) = mutex.acquire().await else {
                panic!("mutex acquisition never rejects");
            };
            trace.lock().unwrap().push(format!("enter {i}"));
            let _ = delay(&task_handle, Duration::from_millis(5)).promise().await;
            trace.lock().unwrap().push(format!("exit {i}"));
            lock.release();
        }));
    }

    all(tasks).wait(&handle).unwrap();
    assert!(!mutex.is_locked());
    assert!(mutex.is_queue_empty());

    // Tasks first poll in spawn order, so they queue 0, 1, 2; each critical
    // section closes before the next opens.
    let trace = trace.lock().unwrap();
    assert_eq!(
        *trace,
        vec!["enter 0", "exit 0", "enter 1", "exit 1", "enter 2", "exit 2"]
    );
}

#[test]
fn queue_drains_by_exactly_one_per_release() {
    let event_loop = EventLoop::new();
    let handle = event_loop.handle();
    let mutex = Mutex::new();

    let holder = mutex.acquire();
    let waiters: Vec<_> = (0..4).map(|_| mutex.acquire()).collect();
    assert_eq!(mutex.queue_length(), 4);

    let mut current = holder.wait(&handle).unwrap();
    for (drained, waiter) in waiters.iter().enumerate() {
        current.release();
        // Double release must not grant a second waiter.
        current.release();
        assert_eq!(mutex.queue_length(), 4 - drained - 1);
        current = waiter.wait(&handle).unwrap();
    }

    current.release();
    assert!(!mutex.is_locked());
}
