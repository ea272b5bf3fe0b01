//! End-to-end promise behavior driven through a real event loop.

use std::time::Duration;
use weft::{delay, EventLoop, Promise, Reason};

#[test]
fn spawned_task_chains_through_timers() {
    let event_loop = EventLoop::new();
    let handle = event_loop.handle();

    let task_handle = handle.clone();
    let result = handle
        .spawn(async move {
            let _ = delay(&task_handle, Duration::from_millis(5)).promise().await;
            21
        })
        .then(|v| v * 2);

    assert_eq!(result.wait(&handle), Ok(42));
}

#[test]
fn rejection_from_a_timer_callback_is_recoverable() {
    let event_loop = EventLoop::new();
    let handle = event_loop.handle();

    let promise: Promise<i32> = Promise::new(|settler| {
        handle.schedule_after(Duration::from_millis(5), move || {
            settler.reject(Reason::from("backend unavailable"));
        });
        Ok(())
    });
    let recovered = promise.catch(|reason| {
        assert_eq!(reason.to_string(), "backend unavailable");
        -1
    });

    assert_eq!(recovered.wait(&handle), Ok(-1));
}

#[test]
fn opaque_rejection_reason_survives_the_chain() {
    let event_loop = EventLoop::new();
    let handle = event_loop.handle();

    #[derive(Debug, PartialEq)]
    struct Diagnostic {
        code: u32,
    }

    let promise: Promise<i32> = Promise::rejected(Reason::opaque(Diagnostic { code: 7 }));
    let outcome = promise.then(|v| v + 1).wait(&handle);

    let Err(reason) = outcome else {
        panic!("expected rejection");
    };
    assert_eq!(reason.downcast_opaque::<Diagnostic>(), Some(&Diagnostic { code: 7 }));
    assert!(reason.to_string().contains("non-error value"));
}

#[test]
fn cancelling_a_derived_chain_tears_down_the_timer() {
    let event_loop = EventLoop::new();
    let handle = event_loop.handle();

    let source = delay(&handle, Duration::from_secs(60));
    let derived = source.then(|()| "never").then(|s| s.len());
    assert_eq!(handle.pending_timers(), 1);

    let root = derived.root_cancellable().expect("chain keeps its root");
    root.cancel();

    assert!(source.is_cancelled());
    assert_eq!(handle.pending_timers(), 0);
    assert!(matches!(derived.wait(&handle), Err(Reason::Cancelled)));
}

#[test]
fn loop_remains_usable_after_reset() {
    let event_loop = EventLoop::new();
    let handle = event_loop.handle();

    let orphan = handle.spawn(async {
        std::future::pending::<i32>().await
    });
    handle.schedule_after(Duration::from_secs(60), || {});
    handle.run_pending_work();

    handle.reset();
    assert!(orphan.is_pending());

    let fresh = handle.spawn(async { "alive" });
    assert_eq!(fresh.wait(&handle), Ok("alive"));
}

#[test]
fn finally_runs_even_when_the_chain_rejects() {
    let event_loop = EventLoop::new();
    let handle = event_loop.handle();
    let teardown_ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));

    let ran = std::sync::Arc::clone(&teardown_ran);
    let promise: Promise<i32> = Promise::new(|settler| {
        handle.schedule_after(Duration::from_millis(5), move || {
            settler.reject(Reason::from("late failure"));
        });
        Ok(())
    });
    let finished = promise.finally(move || {
        ran.store(true, std::sync::atomic::Ordering::SeqCst);
    });

    assert!(finished.wait(&handle).is_err());
    assert!(teardown_ran.load(std::sync::atomic::Ordering::SeqCst));
}
