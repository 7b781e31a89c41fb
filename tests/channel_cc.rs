use tether::prelude::*;

use std::thread;
use std::time::Duration;

#[test]
fn channel_single_sender_fifo() {
    let (tx, rx) = channel();

    let producer = thread::Builder::new()
        .name("producer".into())
        .spawn(move || {
            for i in 0..10_000_u32 {
                tx.send(i).unwrap();
            }
        })
        .unwrap();

    let received: Vec<u32> = rx.iter().collect();
    producer.join().unwrap();
    assert_eq!(received, (0..10_000).collect::<Vec<_>>());
}

#[test]
fn channel_closes_with_last_of_four_senders() {
    let (tx, rx) = channel::<&'static str>();
    let mut senders = vec![tx.clone(), tx.clone(), tx.clone()];
    senders.push(tx);

    for _ in 0..3 {
        drop(senders.pop());
        assert!(!rx.is_closed());
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    let last = senders.pop().unwrap();
    last.send("buffered").unwrap();
    drop(last);

    assert!(rx.is_closed());
    // Items buffered before closure survive it.
    assert_eq!(rx.recv(), Ok("buffered"));
    assert_eq!(rx.recv(), Err(RecvError));
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)),
        Err(RecvTimeoutError::Closed)
    );
}

#[test]
fn channel_blocked_receiver_wakes_on_close() {
    let (tx, rx) = channel::<u8>();
    let receiver = thread::Builder::new()
        .name("receiver".into())
        .spawn(move || rx.recv())
        .unwrap();

    thread::sleep(Duration::from_millis(20));
    drop(tx);
    assert_eq!(receiver.join().unwrap(), Err(RecvError));
}

#[test]
fn channel_many_producers_preserve_per_sender_order() {
    let (tx, rx) = sync_channel(16);
    let producers = 8_usize;
    let per_producer = 500_usize;

    crossbeam_utils::thread::scope(|s| {
        for p in 0..producers {
            let tx = tx.clone();
            s.spawn(move |_| {
                for i in 0..per_producer {
                    tx.send((p, i)).unwrap();
                }
            });
        }
        drop(tx);

        let mut next = vec![0_usize; producers];
        for (p, i) in rx.iter() {
            assert_eq!(next[p], i);
            next[p] += 1;
        }
        assert!(next.iter().all(|n| *n == per_producer));
    })
    .unwrap();
}

#[test]
fn channel_send_fails_after_receiver_dropped() {
    let (tx, rx) = channel();
    drop(rx);
    assert_eq!(tx.send(7).unwrap_err().into_inner(), 7);
    assert!(tx.is_closed());
}
