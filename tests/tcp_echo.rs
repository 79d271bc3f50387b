use uring::addr::{AddressV4, PeerInfo};
use uring::ops::file::Close;
use uring::ops::net::{Accept, Bind, Connect, Listen, Recv, Send, Socket};
use uring::ops::sockopt::GetSockName;
use uring::types::Fd;
use uring::Ring;

const MESSAGES: &[&str] = &[
    "Hello io_uring!",
    "Hello io_uring!",
    "Hello io_uring!",
    "Hello io_uring!",
    "Hello io_uring!",
    "Hello io_uring!",
    "Hello io_uring!",
    "Hello io_uring!",
    "Hello io_uring!",
    "Hello io_uring!",
];

#[test]
fn echo_ten_rounds() -> anyhow::Result<()> {
    let mut ring = Ring::new(32)?;

    let listener = ring
        .make_sync(Socket::new(libc::AF_INET, libc::SOCK_STREAM, 0))?
        .wait(&mut ring)?;
    let listener = Fd(listener);

    ring.make_sync(Bind::new(listener, PeerInfo::v4(AddressV4::loopback(), 0)))?
        .wait(&mut ring)?;
    ring.make_sync(Listen::new(listener, 16))?.wait(&mut ring)?;

    // The ring is single-threaded and cooperative (SPEC_FULL.md section 5): rather than a real
    // second thread, the client connects against the same ring's loopback listener, interleaving
    // its own submissions with the server's.
    let bound_port = local_port(&mut ring, listener)?;

    let client = ring
        .make_sync(Socket::new(libc::AF_INET, libc::SOCK_STREAM, 0))?
        .wait(&mut ring)?;
    let client = Fd(client);
    ring.make_sync(Connect::new(
        client,
        PeerInfo::v4(AddressV4::loopback(), bound_port),
    ))?
    .wait(&mut ring)?;

    let connection = ring.make_sync(Accept::new(listener))?.wait(&mut ring)?;
    let accepted = Fd(connection.accepted);

    for message in MESSAGES {
        let sent = message.as_bytes();
        let sent_n = ring.make_sync(unsafe {
            Send::new(client, sent.as_ptr(), sent.len() as u32, 0)
        })?
        .wait(&mut ring)?;
        assert_eq!(sent_n, sent.len());

        let mut buf = vec![0u8; sent.len()];
        let recv_n = ring.make_sync(unsafe {
            Recv::new(accepted, buf.as_mut_ptr(), buf.len() as u32, 0)
        })?
        .wait(&mut ring)?;
        assert_eq!(recv_n, sent.len());
        assert_ne!(&buf[..], b"exit");

        let echoed_n = ring.make_sync(unsafe {
            Send::new(accepted, buf.as_ptr(), buf.len() as u32, 0)
        })?
        .wait(&mut ring)?;
        assert_eq!(echoed_n, sent.len());

        let mut back = vec![0u8; sent.len()];
        let back_n = ring.make_sync(unsafe {
            Recv::new(client, back.as_mut_ptr(), back.len() as u32, 0)
        })?
        .wait(&mut ring)?;
        assert_eq!(back_n, sent.len());
        assert_eq!(&back[..], sent);
    }

    // A final "exit" message terminates the session: the server recognizes it, closes its side
    // without echoing, and the client observes end-of-stream.
    let exit = b"exit";
    let sent_n = ring.make_sync(unsafe { Send::new(client, exit.as_ptr(), exit.len() as u32, 0) })?
        .wait(&mut ring)?;
    assert_eq!(sent_n, exit.len());

    let mut buf = vec![0u8; exit.len()];
    let recv_n = ring.make_sync(unsafe { Recv::new(accepted, buf.as_mut_ptr(), buf.len() as u32, 0) })?
        .wait(&mut ring)?;
    assert_eq!(recv_n, exit.len());
    assert_eq!(&buf[..], exit);

    ring.make_sync(Close::new(accepted))?.wait(&mut ring)?;

    let mut eof = [0u8; 1];
    let eof_n = ring.make_sync(unsafe { Recv::new(client, eof.as_mut_ptr(), eof.len() as u32, 0) })?
        .wait(&mut ring)?;
    assert_eq!(eof_n, 0);

    ring.make_sync(Close::new(client))?.wait(&mut ring)?;
    ring.make_sync(Close::new(listener))?.wait(&mut ring)?;
    Ok(())
}

fn local_port(ring: &mut Ring, fd: Fd) -> anyhow::Result<u16> {
    let peer = ring.make_sync(GetSockName::new(fd))?.wait(ring)?;
    match peer {
        PeerInfo::V4(info) => Ok(info.port),
        other => anyhow::bail!("expected an IPv4 local address, got {other:?}"),
    }
}
