use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use uring::ops::timeout::{Timeout, TimeoutMultishot};
use uring::Ring;

#[test]
fn one_shot_elapses_as_success() -> anyhow::Result<()> {
    let mut ring = Ring::new(4)?;

    let op = ring.make_sync(Timeout::after(Duration::from_millis(50)))?;
    let start = Instant::now();
    op.wait(&mut ring)?;
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(100));
    Ok(())
}

#[test]
fn multishot_five_ticks() -> anyhow::Result<()> {
    let mut ring = Ring::new(8)?;

    let results = Rc::new(RefCell::new(Vec::new()));
    let results2 = Rc::clone(&results);
    ring.make(TimeoutMultishot::every(Duration::from_millis(10), 5), move |result| {
        let tick = result.expect("timer tick should not error");
        results2.borrow_mut().push(tick.more);
    })?;

    let start = Instant::now();
    while results.borrow().len() < 5 {
        ring.wait_for_result(1, None)?;
    }
    let elapsed = start.elapsed();

    let ticks = results.borrow();
    assert_eq!(ticks.len(), 5);
    assert!(ticks[..4].iter().all(|&more| more), "kernel must keep the first four ticks armed");
    assert!(!ticks[4], "the fifth tick exhausts repeat_count and must report more=false");
    assert!(elapsed < Duration::from_millis(100));
    Ok(())
}
