// teardown.rs - Measure how quickly disconnect unblocks the receive thread
use crate::sink::{LoopbackPeer, PeerMode};
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use std::thread;
use std::time::{Duration, Instant};
use wilc_osal::Connection;

pub struct TeardownResult {
    pub test_name: String,
    pub iterations: usize,
    pub min: Duration,
    pub avg: Duration,
    pub max: Duration,
    pub failures: usize,
}

fn summarize(name: &str, samples: &[Duration], failures: usize) -> TeardownResult {
    let min = samples.iter().copied().min().unwrap_or_default();
    let max = samples.iter().copied().max().unwrap_or_default();
    let avg = if samples.is_empty() {
        Duration::ZERO
    } else {
        samples.iter().sum::<Duration>() / samples.len() as u32
    };
    TeardownResult {
        test_name: name.to_string(),
        iterations: samples.len() + failures,
        min,
        avg,
        max,
        failures,
    }
}

/// Disconnect while the receive thread sits blocked in a read.
pub fn bench_idle_disconnect(iterations: usize) -> TeardownResult {
    println!("\n=== Benchmarking Idle Disconnect ({} iterations) ===", iterations);

    let peer = match LoopbackPeer::spawn(PeerMode::Discard, iterations) {
        Ok(peer) => peer,
        Err(e) => {
            eprintln!("Failed to start loopback peer: {}", e);
            return summarize("Idle Disconnect", &[], iterations);
        }
    };

    let conn = Connection::new(peer.endpoint);
    let mut samples = Vec::with_capacity(iterations);
    let mut failures = 0;

    for _ in 0..iterations {
        if conn.connect(|_: &[u8]| {}).is_err() {
            failures += 1;
            continue;
        }
        // Let the receive thread reach its blocking read
        thread::sleep(Duration::from_millis(2));

        let start = Instant::now();
        conn.disconnect();
        samples.push(start.elapsed());
    }

    drop(conn);
    if failures == 0 {
        peer.finish();
    }
    summarize("Idle Disconnect", &samples, failures)
}

/// Disconnect while the echo peer keeps the receive path busy.
pub fn bench_busy_disconnect(iterations: usize) -> TeardownResult {
    println!("\n=== Benchmarking Busy Disconnect ({} iterations) ===", iterations);

    let peer = match LoopbackPeer::spawn(PeerMode::Echo, iterations) {
        Ok(peer) => peer,
        Err(e) => {
            eprintln!("Failed to start loopback peer: {}", e);
            return summarize("Busy Disconnect", &[], iterations);
        }
    };

    let conn = Arc::new(Connection::new(peer.endpoint));
    let mut samples = Vec::with_capacity(iterations);
    let mut failures = 0;

    for _ in 0..iterations {
        if conn.connect(|_: &[u8]| {}).is_err() {
            failures += 1;
            continue;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let sender = {
            let conn = Arc::clone(&conn);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let payload = [0x5Au8; 512];
                while !stop.load(Ordering::Relaxed) {
                    if conn.send(&payload).is_err() {
                        break;
                    }
                }
            })
        };
        thread::sleep(Duration::from_millis(5));

        let start = Instant::now();
        conn.disconnect();
        samples.push(start.elapsed());

        stop.store(true, Ordering::Relaxed);
        let _ = sender.join();
    }

    conn.disconnect();
    drop(conn);
    if failures == 0 {
        peer.finish();
    }
    summarize("Busy Disconnect", &samples, failures)
}

pub fn print_teardown_results(results: &[TeardownResult]) {
    println!("\n╔═══════════════════════════════════════════════════════════════════════════╗");
    println!("║                         TEARDOWN LATENCY RESULTS                          ║");
    println!("╠═══════════════════════════════════════════════════════════════════════════╣");
    println!("║ Test Name          │ Iterations │     Min │     Avg │      Max │ Failures ║");
    println!("╠═══════════════════════════════════════════════════════════════════════════╣");

    for result in results {
        println!("║ {:<18} │ {:>10} │ {:>5.0}us │ {:>5.0}us │ {:>6.0}us │ {:>8} ║",
            result.test_name,
            result.iterations,
            result.min.as_secs_f64() * 1e6,
            result.avg.as_secs_f64() * 1e6,
            result.max.as_secs_f64() * 1e6,
            result.failures
        );
    }

    println!("╚═══════════════════════════════════════════════════════════════════════════╝");

    for result in results {
        if result.max > Duration::from_millis(100) {
            println!("WARNING: {} worst case {:?} exceeds 100ms", result.test_name, result.max);
        }
    }
}
