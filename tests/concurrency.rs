use esox_connpool::{ChannelPool, Connection, PoolError};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

struct CountedConn {
    closed: bool,
    live: Arc<AtomicUsize>,
}

impl Connection for CountedConn {
    type Error = Infallible;

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) -> Result<(), Infallible> {
        if !self.closed {
            self.closed = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn counted_pool(initial: usize, max: usize) -> (ChannelPool<CountedConn>, Arc<AtomicUsize>) {
    let live = Arc::new(AtomicUsize::new(0));
    let factory_live = Arc::clone(&live);
    let pool = ChannelPool::new(initial, max, move || {
        factory_live.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Infallible>(CountedConn {
            closed: false,
            live: Arc::clone(&factory_live),
        })
    })
    .unwrap();
    (pool, live)
}

#[test]
fn concurrent_get_close_stays_within_capacity() {
    const THREADS: usize = 16;
    const ROUNDS: usize = 500;
    const CAPACITY: usize = 4;

    let (pool, live) = counted_pool(2, CAPACITY);
    let over_capacity = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let pool = pool.clone();
            let over_capacity = Arc::clone(&over_capacity);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for round in 0..ROUNDS {
                    let conn = pool.get().unwrap();
                    if (i + round) % 7 == 0 {
                        conn.mark_unusable();
                    }
                    conn.close().unwrap();
                    if pool.len() > CAPACITY {
                        over_capacity.store(true, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(!over_capacity.load(Ordering::SeqCst));
    assert!(pool.len() <= CAPACITY);
    // Every connection that is not idle has been closed
    assert_eq!(live.load(Ordering::SeqCst), pool.len());

    let metrics = pool.get_metrics();
    assert_eq!(metrics.total_reused + metrics.total_created - 2, THREADS * ROUNDS);

    pool.stop();
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[test]
fn stop_races_with_borrowers() {
    const THREADS: usize = 8;

    let (pool, live) = counted_pool(4, 4);
    let barrier = Arc::new(Barrier::new(THREADS + 1));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = pool.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                loop {
                    match pool.get() {
                        Ok(conn) => {
                            let _ = conn.close();
                        }
                        Err(PoolError::Closed) => break,
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
            })
        })
        .collect();

    barrier.wait();
    pool.stop();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(pool.is_closed());
    assert_eq!(pool.len(), 0);
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_borrowers_share_pool() {
    let (pool, live) = counted_pool(0, 3);

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    let conn = pool.get_async().await.unwrap();
                    tokio::task::yield_now().await;
                    conn.close().unwrap();
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    assert!(pool.len() <= 3);
    assert_eq!(live.load(Ordering::SeqCst), pool.len());
}
