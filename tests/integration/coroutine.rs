//! 协程集成测试

use std::sync::Arc;
use std::thread;

use rgss_host::runtime::coroutine::{
    current_id, suspend, Coroutine, CoroutineBuilder, CoroutineError, CoroutineState, Handoff,
    PanicPolicy,
};

/// Fibonacci generator driven from the resumer.
#[test]
fn test_generator() {
    let fib = Coroutine::new(|y, _| {
        let (mut a, mut b) = (0u64, 1u64);
        loop {
            let more = y.suspend(vec![a]);
            if more.is_empty() {
                return vec![];
            }
            let next = a + b;
            a = b;
            b = next;
        }
    })
    .unwrap();

    let mut seen = Vec::new();
    seen.push(fib.resume(vec![]).unwrap().single().unwrap());
    for _ in 0..9 {
        seen.push(fib.resume(vec![1]).unwrap().single().unwrap());
    }
    assert_eq!(seen, vec![0, 1, 1, 2, 3, 5, 8, 13, 21, 34]);

    assert_eq!(fib.resume(vec![]).unwrap(), Handoff::Empty);
    assert_eq!(fib.state(), CoroutineState::Dead);
}

/// Values travel both ways through free `suspend` calls deep in the body.
#[test]
fn test_free_suspend_from_helper() {
    fn accumulate(total: &mut i32) {
        let got = suspend::<i32>(vec![*total]).unwrap();
        *total += got.into_vec().iter().sum::<i32>();
    }

    let co = Coroutine::new(|_, _| {
        let mut total = 0;
        for _ in 0..3 {
            accumulate(&mut total);
        }
        vec![total]
    })
    .unwrap();

    assert_eq!(co.resume(vec![]).unwrap(), Handoff::Single(0));
    assert_eq!(co.resume(vec![5]).unwrap(), Handoff::Single(5));
    assert_eq!(co.resume(vec![1, 2]).unwrap(), Handoff::Single(8));
    assert_eq!(co.resume(vec![2]).unwrap(), Handoff::Single(10));
}

#[test]
fn test_current_id_inside_and_outside() {
    assert!(matches!(current_id(), Err(CoroutineError::NoCurrent)));

    let co = Coroutine::new(|_, _| vec![current_id().unwrap().inner()]).unwrap();
    let id = co.id().inner();
    assert_eq!(co.resume(vec![]).unwrap(), Handoff::Single(id));
}

#[test]
fn test_resumed_from_another_thread() {
    let co = Arc::new(
        CoroutineBuilder::new()
            .name("shared")
            .body(|y, _| {
                y.suspend(vec!["first".to_string()]);
                vec!["second".to_string()]
            })
            .spawn()
            .unwrap(),
    );

    assert_eq!(co.resume(vec![]).unwrap(), Handoff::Single("first".to_string()));

    let other = Arc::clone(&co);
    let handle = thread::spawn(move || other.resume(vec![]).unwrap());
    assert_eq!(handle.join().unwrap(), Handoff::Single("second".to_string()));
    assert!(!co.is_alive());
}

#[test]
fn test_propagated_panic_reaches_resumer() {
    let co = CoroutineBuilder::<i32>::new()
        .panic_policy(PanicPolicy::Propagate)
        .body(|_, _| panic!("inside"))
        .spawn()
        .unwrap();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| co.resume(vec![])));
    assert!(result.is_err());
    assert_eq!(co.state(), CoroutineState::Dead);
}

#[test]
fn test_many_coroutines() {
    let cos: Vec<_> = (0..32)
        .map(|i| {
            Coroutine::new(move |y, _| {
                y.suspend(vec![i]);
                vec![i * 10]
            })
            .unwrap()
        })
        .collect();

    for (i, co) in cos.iter().enumerate() {
        assert_eq!(co.resume(vec![]).unwrap(), Handoff::Single(i));
    }
    for (i, co) in cos.iter().enumerate() {
        assert_eq!(co.resume(vec![]).unwrap(), Handoff::Single(i * 10));
    }
}
