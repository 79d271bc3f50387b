use std::cell::RefCell;
use std::rc::Rc;
use std::thread::sleep;
use std::time::Duration;

use uring::error::Error;
use uring::ops::cancel::Cancel;
use uring::ops::timeout::Timeout;
use uring::Ring;

#[test]
fn cancel_of_pending_timeout() -> anyhow::Result<()> {
    let mut ring = Ring::new(8)?;

    let timeout_result: Rc<RefCell<Option<Result<(), Error>>>> = Rc::new(RefCell::new(None));
    let timeout_result2 = Rc::clone(&timeout_result);
    let handle = ring.make(Timeout::after(Duration::from_millis(100)), move |result| {
        *timeout_result2.borrow_mut() = Some(result);
    })?;
    ring.submit()?;

    sleep(Duration::from_millis(10));

    let cancel = ring.make_sync(Cancel::by_id(handle.identifier()))?;
    let cancelled = cancel.wait(&mut ring)?;
    assert_eq!(cancelled, 1);

    while timeout_result.borrow().is_none() {
        ring.wait_for_result(1, None)?;
    }

    let err = timeout_result.borrow_mut().take().unwrap().unwrap_err();
    assert!(err.is_canceled());
    Ok(())
}
