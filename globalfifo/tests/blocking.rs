use globalfifo::{Command, DeviceError, GlobalFifo, IoMode, WaitSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

async fn wait_until(cond: impl Fn() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_write_wakes_blocked_reader() {
    let fifo = Arc::new(GlobalFifo::with_capacity(8).unwrap());
    let rd = fifo.open();
    let wr = fifo.open();

    let f = Arc::clone(&fifo);
    let reader = tokio::spawn(async move { f.read(rd, 8, IoMode::Blocking).await });

    wait_until(|| fifo.waiting(WaitSet::Readers) == 1).await;
    assert!(!reader.is_finished());

    fifo.write(wr, b"hi", IoMode::Blocking).await.unwrap();

    let got = timeout(Duration::from_secs(5), reader)
        .await
        .expect("reader was not woken")
        .unwrap()
        .unwrap();
    assert_eq!(got, b"hi");
    assert!(fifo.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_read_wakes_blocked_writer() {
    let fifo = Arc::new(GlobalFifo::with_capacity(4).unwrap());
    let rd = fifo.open();
    let wr = fifo.open();
    fifo.write(wr, b"abcd", IoMode::Blocking).await.unwrap();

    let f = Arc::clone(&fifo);
    let writer = tokio::spawn(async move { f.write(wr, b"xyz", IoMode::Blocking).await });

    wait_until(|| fifo.waiting(WaitSet::Writers) == 1).await;
    assert_eq!(fifo.read(rd, 2, IoMode::Blocking).await.unwrap(), b"ab");

    let n = timeout(Duration::from_secs(5), writer)
        .await
        .expect("writer was not woken")
        .unwrap()
        .unwrap();
    // Only two bytes of room were freed
    assert_eq!(n, 2);
    assert_eq!(fifo.snapshot(), b"cdxy");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interrupt_blocked_reader() {
    let fifo = Arc::new(GlobalFifo::with_capacity(8).unwrap());
    let rd = fifo.open();
    let interrupt = fifo.interrupter(rd).unwrap();

    let f = Arc::clone(&fifo);
    let reader = tokio::spawn(async move { f.read(rd, 8, IoMode::Blocking).await });

    wait_until(|| fifo.waiting(WaitSet::Readers) == 1).await;
    interrupt.raise();

    let result = timeout(Duration::from_secs(5), reader).await.unwrap().unwrap();
    assert_eq!(result, Err(DeviceError::Interrupted));
    assert!(!interrupt.is_pending());
    assert!(fifo.is_empty());

    // The handle is still usable afterwards
    fifo.write(rd, b"ok", IoMode::Blocking).await.unwrap();
    assert_eq!(fifo.read(rd, 8, IoMode::Blocking).await.unwrap(), b"ok");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interrupt_blocked_writer() {
    let fifo = Arc::new(GlobalFifo::with_capacity(2).unwrap());
    let wr = fifo.open();
    fifo.write(wr, b"ab", IoMode::Blocking).await.unwrap();

    let f = Arc::clone(&fifo);
    let writer = tokio::spawn(async move { f.write(wr, b"c", IoMode::Blocking).await });

    wait_until(|| fifo.waiting(WaitSet::Writers) == 1).await;
    fifo.interrupter(wr).unwrap().raise();

    let result = timeout(Duration::from_secs(5), writer).await.unwrap().unwrap();
    assert_eq!(result, Err(DeviceError::Interrupted));
    assert_eq!(fifo.snapshot(), b"ab");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interrupt_only_affects_its_handle() {
    let fifo = Arc::new(GlobalFifo::with_capacity(8).unwrap());
    let rd1 = fifo.open();
    let rd2 = fifo.open();
    let wr = fifo.open();

    let f1 = Arc::clone(&fifo);
    let reader1 = tokio::spawn(async move { f1.read(rd1, 8, IoMode::Blocking).await });
    let f2 = Arc::clone(&fifo);
    let reader2 = tokio::spawn(async move { f2.read(rd2, 8, IoMode::Blocking).await });

    wait_until(|| fifo.waiting(WaitSet::Readers) == 2).await;
    fifo.interrupter(rd1).unwrap().raise();

    let r1 = timeout(Duration::from_secs(5), reader1).await.unwrap().unwrap();
    assert_eq!(r1, Err(DeviceError::Interrupted));
    assert!(!reader2.is_finished());

    fifo.write(wr, b"z", IoMode::Blocking).await.unwrap();
    let r2 = timeout(Duration::from_secs(5), reader2).await.unwrap().unwrap();
    assert_eq!(r2, Ok(b"z".to_vec()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wake_and_interrupt_together_resolve_once() {
    for _ in 0..100 {
        let fifo = Arc::new(GlobalFifo::with_capacity(8).unwrap());
        let rd = fifo.open();
        let wr = fifo.open();
        let interrupt = fifo.interrupter(rd).unwrap();

        let f = Arc::clone(&fifo);
        let reader = tokio::spawn(async move { f.read(rd, 8, IoMode::Blocking).await });
        wait_until(|| fifo.waiting(WaitSet::Readers) == 1).await;

        fifo.write(wr, b"x", IoMode::Blocking).await.unwrap();
        interrupt.raise();

        let result = timeout(Duration::from_secs(5), reader).await.unwrap().unwrap();
        // Either the byte was taken or the read was interrupted, never both
        match result {
            Ok(bytes) => {
                assert_eq!(bytes, b"x");
                assert!(fifo.is_empty());
            }
            Err(DeviceError::Interrupted) => assert_eq!(fifo.snapshot(), b"x"),
            Err(e) => panic!("unexpected read error: {e}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_woken_readers_recheck() {
    let fifo = Arc::new(GlobalFifo::with_capacity(8).unwrap());
    let wr = fifo.open();

    let mut readers = Vec::new();
    for _ in 0..2 {
        let f = Arc::clone(&fifo);
        let fd = fifo.open();
        readers.push(tokio::spawn(async move { f.read(fd, 1, IoMode::Blocking).await }));
    }
    wait_until(|| fifo.waiting(WaitSet::Readers) == 2).await;

    // Both readers are woken, only one finds a byte; the other waits again
    fifo.write(wr, b"a", IoMode::Blocking).await.unwrap();
    wait_until(|| readers.iter().filter(|r| r.is_finished()).count() == 1).await;
    wait_until(|| fifo.waiting(WaitSet::Readers) == 1).await;

    fifo.write(wr, b"b", IoMode::Blocking).await.unwrap();

    let mut got = Vec::new();
    for reader in readers {
        let bytes = timeout(Duration::from_secs(5), reader)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        got.extend(bytes);
    }
    got.sort_unstable();
    assert_eq!(got, b"ab");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_clear_does_not_wake_writers() {
    let fifo = Arc::new(GlobalFifo::with_capacity(2).unwrap());
    let wr = fifo.open();
    fifo.write(wr, b"ab", IoMode::Blocking).await.unwrap();

    let f = Arc::clone(&fifo);
    let writer = tokio::spawn(async move { f.write(wr, b"c", IoMode::Blocking).await });
    wait_until(|| fifo.waiting(WaitSet::Writers) == 1).await;

    let admin = fifo.open();
    fifo.control(admin, Command::Clear).unwrap();
    assert!(fifo.poll_state(admin).unwrap().writable);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!writer.is_finished());

    // Only an interrupt gets it out now
    fifo.interrupter(wr).unwrap().raise();
    let result = timeout(Duration::from_secs(5), writer).await.unwrap().unwrap();
    assert_eq!(result, Err(DeviceError::Interrupted));
}

#[tokio::test]
async fn test_dropped_read_leaves_no_trace() {
    let fifo = GlobalFifo::with_capacity(8).unwrap();
    let fd = fifo.open();

    let cancelled = timeout(
        Duration::from_millis(20),
        fifo.read(fd, 4, IoMode::Blocking),
    )
    .await;
    assert!(cancelled.is_err());
    assert_eq!(fifo.waiting(WaitSet::Readers), 0);

    fifo.write(fd, b"data", IoMode::Blocking).await.unwrap();
    assert_eq!(fifo.read(fd, 4, IoMode::Blocking).await.unwrap(), b"data");
}

#[test]
fn test_threads_exactly_once_delivery() {
    const WRITERS: usize = 4;
    const READERS: usize = 3;
    const PER_WRITER: usize = 2000;

    let fifo = Arc::new(GlobalFifo::with_capacity(64).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    // Watches the capacity invariant while the others run
    let observer = {
        let fifo = Arc::clone(&fifo);
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                assert!(fifo.len() <= fifo.capacity());
                std::thread::yield_now();
            }
        })
    };

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let fifo = Arc::clone(&fifo);
            // Open before spawning so interrupt_all can not miss a reader
            let fd = fifo.open();
            std::thread::spawn(move || {
                let mut counts = [0usize; WRITERS];
                loop {
                    match fifo.read_blocking(fd, 16, IoMode::Blocking) {
                        Ok(bytes) => {
                            assert!(!bytes.is_empty());
                            for b in bytes {
                                counts[usize::from(b)] += 1;
                            }
                        }
                        Err(DeviceError::Interrupted) => break,
                        Err(e) => panic!("unexpected read error: {e}"),
                    }
                }
                fifo.release(fd).unwrap();
                counts
            })
        })
        .collect();

    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let fifo = Arc::clone(&fifo);
            std::thread::spawn(move || {
                let fd = fifo.open();
                #[allow(clippy::cast_possible_truncation)]
                let data = vec![w as u8; PER_WRITER];
                let mut rest = &data[..];
                while !rest.is_empty() {
                    let n = fifo.write_blocking(fd, rest, IoMode::Blocking).unwrap();
                    assert!(n > 0);
                    rest = &rest[n..];
                }
                fifo.release(fd).unwrap();
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    while !fifo.is_empty() {
        std::thread::yield_now();
    }
    fifo.interrupt_all();

    let mut totals = [0usize; WRITERS];
    for reader in readers {
        let counts = reader.join().unwrap();
        for (total, count) in totals.iter_mut().zip(counts) {
            *total += count;
        }
    }
    done.store(true, Ordering::Relaxed);
    observer.join().unwrap();

    assert_eq!(totals, [PER_WRITER; WRITERS]);
    assert!(fifo.is_empty());
}

#[test]
fn test_single_reader_preserves_order() {
    let fifo = Arc::new(GlobalFifo::with_capacity(16).unwrap());
    let expected: Vec<u8> = (0..=255u8).cycle().take(5000).collect();

    let writer = {
        let fifo = Arc::clone(&fifo);
        let data = expected.clone();
        std::thread::spawn(move || {
            let fd = fifo.open();
            let mut rest = &data[..];
            while !rest.is_empty() {
                let n = fifo.write_blocking(fd, rest, IoMode::Blocking).unwrap();
                rest = &rest[n..];
            }
        })
    };

    let fd = fifo.open();
    let mut got = Vec::new();
    while got.len() < expected.len() {
        got.extend(fifo.read_blocking(fd, 7, IoMode::Blocking).unwrap());
    }
    writer.join().unwrap();

    assert_eq!(got, expected);
}
