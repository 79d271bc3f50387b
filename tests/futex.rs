use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use uring::ops::futex::{FutexWait, FutexWake};
use uring::Ring;

#[test]
fn wait_wake_round_trip() -> anyhow::Result<()> {
    let word = Arc::new(AtomicU32::new(0));
    let word_for_waker = Arc::clone(&word);

    let waker = thread::spawn(move || -> anyhow::Result<()> {
        thread::sleep(Duration::from_millis(20));
        word_for_waker.store(1, Ordering::SeqCst);

        let mut ring = Ring::new(4)?;
        let op = ring.make_sync(unsafe {
            FutexWake::new(word_for_waker.as_ptr(), 1)
        })?;
        let woken = op.wait(&mut ring)?;
        assert_eq!(woken, 1);
        Ok(())
    });

    let mut ring = Ring::new(4)?;
    let op = ring.make_sync(unsafe { FutexWait::new(word.as_ptr(), 0) })?;
    op.wait(&mut ring)?;

    waker.join().expect("waker thread panicked")?;
    assert_eq!(word.load(Ordering::SeqCst), 1);
    Ok(())
}
