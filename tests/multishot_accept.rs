use std::cell::RefCell;
use std::rc::Rc;

use slab::Slab;
use uring::addr::{AddressV4, PeerInfo};
use uring::ops::net::{AcceptMulti, Connect, Socket};
use uring::ops::sockopt::GetSockName;
use uring::types::Fd;
use uring::Ring;

/// A single multi-shot accept submission must hand back a fresh completion for each inbound
/// connection, in the order the kernel produced them, without the caller resubmitting.
#[test]
fn accepts_three_connections_in_order() -> anyhow::Result<()> {
    let mut ring = Ring::new(32)?;

    let listener = ring
        .make_sync(Socket::new(libc::AF_INET, libc::SOCK_STREAM, 0))?
        .wait(&mut ring)?;
    let listener = Fd(listener);
    bind_and_listen(&mut ring, listener)?;
    let port = local_port(&mut ring, listener)?;

    let accepted: Rc<RefCell<Slab<i32>>> = Rc::new(RefCell::new(Slab::new()));
    let accepted2 = Rc::clone(&accepted);
    ring.make(AcceptMulti::new(listener), move |result| {
        if let Ok(event) = result {
            accepted2.borrow_mut().insert(event.item.accepted);
            assert!(event.more, "kernel must keep the multi-shot accept armed");
        }
    })?;
    ring.submit()?;

    for round in 1..=3 {
        let client = ring
            .make_sync(Socket::new(libc::AF_INET, libc::SOCK_STREAM, 0))?
            .wait(&mut ring)?;
        ring.make_sync(Connect::new(
            Fd(client),
            PeerInfo::v4(AddressV4::loopback(), port),
        ))?
        .wait(&mut ring)?;

        while accepted.borrow().len() < round {
            ring.wait_for_result(1, None)?;
        }
    }

    assert_eq!(accepted.borrow().len(), 3);
    Ok(())
}

fn bind_and_listen(ring: &mut Ring, listener: Fd) -> anyhow::Result<()> {
    use uring::ops::net::{Bind, Listen};
    ring.make_sync(Bind::new(listener, PeerInfo::v4(AddressV4::loopback(), 0)))?
        .wait(ring)?;
    ring.make_sync(Listen::new(listener, 16))?.wait(ring)?;
    Ok(())
}

fn local_port(ring: &mut Ring, fd: Fd) -> anyhow::Result<u16> {
    let peer = ring.make_sync(GetSockName::new(fd))?.wait(ring)?;
    match peer {
        PeerInfo::V4(info) => Ok(info.port),
        other => anyhow::bail!("expected an IPv4 local address, got {other:?}"),
    }
}
