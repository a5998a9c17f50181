use super::*;

#[tokio::test]
async fn read_chunk_and_write_all_round_trip_over_a_pipe() {
    let (r, w) = nix::unistd::pipe().unwrap();
    set_nonblocking(&r).unwrap();
    set_nonblocking(&w).unwrap();
    let read_fd = AsyncFd::new(PtyFd(r)).unwrap();
    let write_fd = AsyncFd::new(PtyFd(w)).unwrap();

    write_all(&write_fd, b"ping").await.unwrap();
    let mut buf = [0u8; 16];
    let n = read_chunk(&read_fd, &mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"ping");
}
