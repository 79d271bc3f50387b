use std::os::unix::io::RawFd;

use uring::ops::poll::PollAdd;
use uring::types::Fd;
use uring::Ring;

#[test]
fn poll_fires_on_pipe_write() -> anyhow::Result<()> {
    let (read_fd, write_fd): (RawFd, RawFd) = nix::unistd::pipe()?;

    let mut ring = Ring::new(4)?;
    let op = ring.make_sync(PollAdd::new(Fd(read_fd), libc::POLLIN as u32))?;

    nix::unistd::write(write_fd, b"x")?;

    let events = op.wait(&mut ring)?;
    assert_ne!(events & libc::POLLIN as u32, 0);

    nix::unistd::close(read_fd)?;
    nix::unistd::close(write_fd)?;
    Ok(())
}
