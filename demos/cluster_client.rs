//! Cluster client example.
//!
//! Starts three local echo servers, then dials them through a pooled
//! round-robin dialer and prints the reuse counters.
//!
//! Run: cargo run --example cluster_client

use clusterdial::{ClusterConfig, ClusterDialer, Listener, PoolConfig, RoundRobin};
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

fn spawn_echo_server() -> clusterdial::Result<SocketAddr> {
    let listener = Listener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr();
    thread::spawn(move || {
        for mut conn in listener.incoming().flatten() {
            thread::spawn(move || {
                let mut buf = [0u8; 1024];
                while let Ok(n) = conn.read(&mut buf) {
                    if n == 0 || conn.write_all(&buf[..n]).is_err() {
                        break;
                    }
                }
            });
        }
    });
    Ok(addr)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let selector = RoundRobin::default();
    for _ in 0..3 {
        let addr = spawn_echo_server()?;
        let endpoint = selector.append_tcp_address("tcp", &addr.to_string())?;
        println!("Echo server listening on {endpoint}");
    }

    let config = ClusterConfig::default().with_pool(PoolConfig::default().with_capacity(2));
    let dialer = ClusterDialer::new(config, Arc::new(selector));

    // Sequential requests: after the first dial every request reuses it.
    println!("\n--- Sequential requests ---");
    for i in 1..=5 {
        let mut conn = dialer.dial("")?;
        let message = format!("Message #{i}");
        conn.write_all(message.as_bytes())?;

        let mut buf = vec![0u8; message.len()];
        conn.read_exact(&mut buf)?;
        println!(
            "{:?} -> {}",
            conn.endpoint().map(ToString::to_string),
            String::from_utf8_lossy(&buf)
        );
        dialer.close(conn)?;
    }
    println!("{}", dialer.metrics());

    // Holding several connections at once forces direct dials across the
    // cluster; closing them overflows the pool and evicts the oldest.
    println!("\n--- Concurrent connections ---");
    let held = (0..4).map(|_| dialer.dial("")).collect::<Result<Vec<_>, _>>()?;
    for conn in &held {
        println!("Holding connection to {:?}", conn.endpoint().map(ToString::to_string));
    }
    for conn in held {
        dialer.close(conn)?;
    }
    println!("{}", dialer.metrics());
    println!("Idle connections closed: {}", dialer.close_idle());

    Ok(())
}
