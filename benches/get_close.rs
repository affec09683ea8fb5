use criterion::{criterion_group, criterion_main, Criterion};
use esox_connpool::{ChannelPool, Connection};
use std::convert::Infallible;
use std::hint::black_box;

struct NoopConn(bool);

impl Connection for NoopConn {
    type Error = Infallible;

    fn is_closed(&self) -> bool {
        self.0
    }

    fn close(&mut self) -> Result<(), Infallible> {
        self.0 = true;
        Ok(())
    }
}

fn bench_get_close(c: &mut Criterion) {
    let pool = ChannelPool::new(8, 8, || Ok::<_, Infallible>(NoopConn(false))).unwrap();

    c.bench_function("get_close_idle", |b| {
        b.iter(|| {
            let conn = pool.get().unwrap();
            black_box(conn.is_closed());
            conn.close().unwrap();
        })
    });

    c.bench_function("get_close_overflow", |b| {
        let held: Vec<_> = (0..8).map(|_| pool.get().unwrap()).collect();
        b.iter(|| {
            let conn = pool.get().unwrap();
            conn.mark_unusable();
            conn.close().unwrap();
        });
        drop(held);
    });
}

criterion_group!(benches, bench_get_close);
criterion_main!(benches);
