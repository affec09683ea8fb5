// EsoxSolutions.ConnectionPool
// Bounded, thread-safe pool of reusable network connections

// Demo binary: pools TCP connections to a local listener

use esox_connpool::{ChannelPool, Connection, PoolConfiguration};
use std::io::{self, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::thread;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct TcpConnection {
    stream: TcpStream,
    closed: bool,
}

impl Connection for TcpConnection {
    type Error = io::Error;

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        self.stream.shutdown(Shutdown::Both)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_target(true)
        .init();

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            // Hold accepted sockets open until the peer hangs up
            thread::spawn(move || io::copy(&mut &stream, &mut io::sink()));
        }
    });

    let config = PoolConfiguration::new()
        .with_name("demo")
        .with_initial_capacity(2)
        .with_max_capacity(2);
    let pool = ChannelPool::with_config(config, move || {
        TcpStream::connect(addr).map(|stream| TcpConnection { stream, closed: false })
    })?;

    let mut a = pool.get()?;
    let b = pool.get()?;
    let c = pool.get()?;
    info!(idle = pool.len(), "Borrowed three connections, one of them overflow");

    a.stream.write_all(b"ping\n")?;
    a.close()?;
    b.mark_unusable();
    b.close()?;
    c.close()?;
    info!(idle = pool.len(), "Released connections");

    pool.stop();
    info!(metrics = ?pool.export_metrics(), "Done");
    Ok(())
}
