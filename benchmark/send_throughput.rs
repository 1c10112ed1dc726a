// send_throughput.rs - Benchmark Connection::send against a loopback peer
use crate::cpu_monitor::run_with_cpu_monitor;
use crate::sink::{LoopbackPeer, PeerMode};
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use std::thread;
use std::time::{Duration, Instant};
use wilc_osal::{Connection, ErrorKind};

pub struct ThroughputResult {
    pub test_name: String,
    pub num_threads: usize,
    pub payload_size: usize,
    pub duration: Duration,
    pub total_sends: u64,
    pub bytes_received: u64,
    pub failed_sends: u64,
    pub avg_cpu_percent: f32,
}

impl ThroughputResult {
    fn sends_per_sec(&self) -> f64 {
        self.total_sends as f64 / self.duration.as_secs_f64().max(f64::EPSILON)
    }

    fn mib_per_sec(&self) -> f64 {
        (self.total_sends as f64 * self.payload_size as f64)
            / (1024.0 * 1024.0)
            / self.duration.as_secs_f64().max(f64::EPSILON)
    }
}

fn failed(name: &str, num_threads: usize, payload_size: usize) -> ThroughputResult {
    ThroughputResult {
        test_name: name.to_string(),
        num_threads,
        payload_size,
        duration: Duration::ZERO,
        total_sends: 0,
        bytes_received: 0,
        failed_sends: 0,
        avg_cpu_percent: 0.0,
    }
}

/// One thread issuing `num_sends` sends of `payload_size` bytes each.
pub fn bench_single_sender(num_sends: usize, payload_size: usize) -> ThroughputResult {
    bench_senders("Single Sender", 1, num_sends, payload_size)
}

/// `num_threads` threads sharing one connection, each issuing `sends_per_thread` sends.
pub fn bench_concurrent_senders(num_threads: usize, sends_per_thread: usize, payload_size: usize) -> ThroughputResult {
    bench_senders(&format!("{} Senders", num_threads), num_threads, sends_per_thread, payload_size)
}

/// Same total volume, payload sizes from 16 bytes to 64 KiB.
pub fn bench_payload_sizes(total_bytes: usize) -> Vec<ThroughputResult> {
    [16usize, 256, 4096, 65536]
        .iter()
        .map(|&size| {
            let sends = (total_bytes / size).max(1);
            bench_senders(&format!("Payload {}B", size), 1, sends, size)
        })
        .collect()
}

/// Thread counts 1, 2, 4, 8 over the same total number of sends.
pub fn bench_sender_scalability(total_sends: usize, payload_size: usize) -> Vec<ThroughputResult> {
    [1usize, 2, 4, 8]
        .iter()
        .map(|&threads| {
            bench_senders(&format!("{} Senders", threads), threads, total_sends / threads, payload_size)
        })
        .collect()
}

fn bench_senders(name: &str, num_threads: usize, sends_per_thread: usize, payload_size: usize) -> ThroughputResult {
    println!("\n=== Benchmarking {} ({} x {} sends, {}B) ===", name, num_threads, sends_per_thread, payload_size);

    let peer = match LoopbackPeer::spawn(PeerMode::Discard, 1) {
        Ok(peer) => peer,
        Err(e) => {
            eprintln!("Failed to start loopback peer: {}", e);
            return failed(name, num_threads, payload_size);
        }
    };

    let conn = match Connection::open(peer.endpoint, |_: &[u8]| {}) {
        Ok(conn) => Arc::new(conn),
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", peer.endpoint, e);
            return failed(name, num_threads, payload_size);
        }
    };

    let sent = Arc::new(AtomicU64::new(0));
    let errors = Arc::new(AtomicU64::new(0));

    let (duration, cpu) = run_with_cpu_monitor(name, || {
        let start = Instant::now();
        let handles: Vec<_> = (0..num_threads)
            .map(|t| {
                let conn = Arc::clone(&conn);
                let sent = Arc::clone(&sent);
                let errors = Arc::clone(&errors);
                thread::spawn(move || {
                    let payload = vec![t as u8; payload_size];
                    for _ in 0..sends_per_thread {
                        match conn.send(&payload) {
                            Ok(_) => {
                                sent.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) if e.kind() == ErrorKind::NotConnected => {
                                errors.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                            Err(_) => {
                                errors.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            let _ = handle.join();
        }
        start.elapsed()
    });

    conn.disconnect();
    let bytes_received = peer.finish();

    ThroughputResult {
        test_name: name.to_string(),
        num_threads,
        payload_size,
        duration,
        total_sends: sent.load(Ordering::Relaxed),
        bytes_received,
        failed_sends: errors.load(Ordering::Relaxed),
        avg_cpu_percent: cpu.avg_cpu_percent,
    }
}

/// Request/response latency through an echoing peer.
pub fn bench_echo_roundtrip(iterations: usize, payload_size: usize) -> ThroughputResult {
    let name = "Echo Roundtrip";
    println!("\n=== Benchmarking {} ({} iterations, {}B) ===", name, iterations, payload_size);

    let peer = match LoopbackPeer::spawn(PeerMode::Echo, 1) {
        Ok(peer) => peer,
        Err(e) => {
            eprintln!("Failed to start loopback peer: {}", e);
            return failed(name, 1, payload_size);
        }
    };

    let received = Arc::new(AtomicU64::new(0));
    let received_cb = Arc::clone(&received);
    let conn = match Connection::open(peer.endpoint, move |data: &[u8]| {
        received_cb.fetch_add(data.len() as u64, Ordering::Release);
    }) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", peer.endpoint, e);
            return failed(name, 1, payload_size);
        }
    };

    let payload = vec![0xA5u8; payload_size];
    let mut sends = 0u64;
    let mut errors = 0u64;

    let (duration, cpu) = run_with_cpu_monitor(name, || {
        let start = Instant::now();
        for i in 0..iterations {
            if conn.send(&payload).is_err() {
                errors += 1;
                break;
            }
            sends += 1;
            let expected = ((i + 1) * payload_size) as u64;
            let deadline = Instant::now() + Duration::from_secs(2);
            while received.load(Ordering::Acquire) < expected {
                if Instant::now() > deadline || !conn.is_connected() {
                    errors += 1;
                    return start.elapsed();
                }
                thread::yield_now();
            }
        }
        start.elapsed()
    });

    conn.disconnect();
    let bytes_received = peer.finish();

    if sends > 0 {
        println!("Average roundtrip: {:.1}us", duration.as_secs_f64() * 1e6 / sends as f64);
    }

    ThroughputResult {
        test_name: name.to_string(),
        num_threads: 1,
        payload_size,
        duration,
        total_sends: sends,
        bytes_received,
        failed_sends: errors,
        avg_cpu_percent: cpu.avg_cpu_percent,
    }
}

pub fn print_throughput_results(results: &[ThroughputResult]) {
    println!("\n╔═══════════════════════════════════════════════════════════════════════════════════════════╗");
    println!("║                              SEND THROUGHPUT RESULTS                                      ║");
    println!("╠═══════════════════════════════════════════════════════════════════════════════════════════╣");
    println!("║ Test Name        │ Threads │ Payload │ Duration │   Sends │  Sends/s │   MiB/s │ Fail │ CPU ║");
    println!("╠═══════════════════════════════════════════════════════════════════════════════════════════╣");

    for result in results {
        println!("║ {:<16} │ {:>7} │ {:>6}B │ {:>6.2}s │ {:>7} │ {:>8.0} │ {:>7.1} │ {:>4} │ {:>3.0} ║",
            result.test_name,
            result.num_threads,
            result.payload_size,
            result.duration.as_secs_f64(),
            result.total_sends,
            result.sends_per_sec(),
            result.mib_per_sec(),
            result.failed_sends,
            result.avg_cpu_percent
        );
    }

    println!("╚═══════════════════════════════════════════════════════════════════════════════════════════╝");

    for result in results {
        let expected = result.total_sends * result.payload_size as u64;
        if result.bytes_received != expected && result.test_name != "Echo Roundtrip" {
            println!("WARNING: {} peer received {} bytes, expected {}", result.test_name, result.bytes_received, expected);
        }
    }

    if results.len() > 1 {
        println!("\n=== Scalability Analysis ===");
        if let Some(baseline) = results.first() {
            for result in results.iter().skip(1) {
                let speedup = result.sends_per_sec() / baseline.sends_per_sec().max(f64::EPSILON);
                println!("{}: {:.2}x vs {}", result.test_name, speedup, baseline.test_name);
            }
        }
    }
}
