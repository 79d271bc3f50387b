use std::cell::RefCell;
use std::rc::Rc;

use uring::ops::noop::Noop;
use uring::Ring;

#[test]
fn round_trip() -> anyhow::Result<()> {
    let mut ring = Ring::new(4)?;

    let ran = Rc::new(RefCell::new(None));
    let ran2 = Rc::clone(&ran);
    ring.make(Noop::new(), move |result| {
        *ran2.borrow_mut() = Some(result);
    })?;

    ring.wait_for_result(1, None)?;

    assert!(ran.borrow_mut().take().expect("callback did not run").is_ok());
    Ok(())
}

#[test]
fn injected_error_surfaces() -> anyhow::Result<()> {
    let mut ring = Ring::new(4)?;

    let op = ring.make_sync(Noop::new().inject_error(libc::EINVAL))?;
    let result = op.wait(&mut ring);

    assert!(result.is_err());
    Ok(())
}
