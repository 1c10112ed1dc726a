// wilc-bench: connection send throughput and teardown latency over loopback
mod cpu_monitor;
mod send_throughput;
mod sink;
mod teardown;

use clap::{Parser, Subcommand};
use std::process;

#[derive(Parser)]
#[command(name = "wilc-bench")]
#[command(about = "Connection Benchmark Suite", long_about = None)]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Run all benchmark cases
    #[arg(short, long)]
    all: bool,

    /// Run specific case (shorthand for 'case' subcommand)
    #[arg(short = 'c', long = "case", value_name = "NAME")]
    case: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run specific benchmark case
    Case {
        /// Case name to run
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// List all available benchmark cases
    List,
}

fn print_banner() {
    println!("╔═══════════════════════════════════════════════════════════════════════════╗");
    println!("║                                                                           ║");
    println!("║                     CONNECTION BENCHMARK SUITE                            ║");
    println!("║                                                                           ║");
    println!("║  Testing: Send Throughput, Concurrent Senders, Teardown Latency           ║");
    println!("║                                                                           ║");
    println!("╚═══════════════════════════════════════════════════════════════════════════╝");
}

fn list_cases() {
    println!("\n=== Available Benchmark Cases ===\n");

    println!("SEND THROUGHPUT:");
    println!("  send-single         - One sender, 64-byte payloads");
    println!("  send-concurrent     - Four senders sharing one connection");
    println!("  send-scale          - Sender scalability (1,2,4,8 threads)");
    println!("  send-payload        - Payload sizes 16B to 64KiB");
    println!("  send-echo           - Request/response roundtrip via echo peer");
    println!("  send-all            - Run all send tests");
    println!();

    println!("TEARDOWN:");
    println!("  teardown-idle       - Disconnect with a blocked receive thread");
    println!("  teardown-busy       - Disconnect under concurrent traffic");
    println!("  teardown-all        - Run all teardown tests");
    println!();

    println!("COMPREHENSIVE:");
    println!("  quick               - Quick benchmark suite (~10 seconds)");
    println!("  full                - Full benchmark suite (~1 minute)");
    println!();

    println!("Usage:");
    println!("  wilc-bench -a                       # Run all benchmarks");
    println!("  wilc-bench -c send-all              # Run all send tests");
    println!("  wilc-bench case teardown-idle       # Run idle teardown test");
    println!("  wilc-bench list                     # Show this list");
}

fn run_send_single() {
    let result = send_throughput::bench_single_sender(100_000, 64);
    send_throughput::print_throughput_results(&[result]);
}

fn run_send_concurrent() {
    let result = send_throughput::bench_concurrent_senders(4, 25_000, 64);
    send_throughput::print_throughput_results(&[result]);
}

fn run_send_scale() {
    let results = send_throughput::bench_sender_scalability(80_000, 64);
    send_throughput::print_throughput_results(&results);
}

fn run_send_payload() {
    let results = send_throughput::bench_payload_sizes(64 * 1024 * 1024);
    send_throughput::print_throughput_results(&results);
}

fn run_send_echo() {
    let result = send_throughput::bench_echo_roundtrip(10_000, 64);
    send_throughput::print_throughput_results(&[result]);
}

fn run_send_all() {
    println!("\n=== COMPREHENSIVE SEND TESTS ===\n");

    let single = send_throughput::bench_single_sender(100_000, 64);
    let multi = send_throughput::bench_concurrent_senders(4, 25_000, 64);
    send_throughput::print_throughput_results(&[single, multi]);

    run_send_scale();
    run_send_payload();
    run_send_echo();
}

fn run_teardown_idle() {
    let result = teardown::bench_idle_disconnect(200);
    teardown::print_teardown_results(&[result]);
}

fn run_teardown_busy() {
    let result = teardown::bench_busy_disconnect(50);
    teardown::print_teardown_results(&[result]);
}

fn run_teardown_all() {
    println!("\n=== COMPREHENSIVE TEARDOWN TESTS ===\n");

    let results = vec![
        teardown::bench_idle_disconnect(200),
        teardown::bench_busy_disconnect(50),
    ];
    teardown::print_teardown_results(&results);
}

fn run_quick_suite() {
    println!("\n╔═══════════════════════════════════════════════════════════════════════════╗");
    println!("║                         QUICK BENCHMARK SUITE                             ║");
    println!("║                          (Estimated: 10 seconds)                          ║");
    println!("╚═══════════════════════════════════════════════════════════════════════════╝");

    let results = vec![
        send_throughput::bench_single_sender(20_000, 64),
        send_throughput::bench_concurrent_senders(4, 5_000, 64),
    ];
    send_throughput::print_throughput_results(&results);

    let results = vec![
        teardown::bench_idle_disconnect(50),
        teardown::bench_busy_disconnect(10),
    ];
    teardown::print_teardown_results(&results);

    println!("\n✓ Quick benchmark suite completed!");
}

fn run_full_suite() {
    println!("\n╔═══════════════════════════════════════════════════════════════════════════╗");
    println!("║                         FULL BENCHMARK SUITE                              ║");
    println!("║                          (Estimated: 1 minute)                            ║");
    println!("╚═══════════════════════════════════════════════════════════════════════════╝");

    run_send_all();
    println!("\n{}", "─".repeat(79));

    run_teardown_all();

    println!("\n✓ Full benchmark suite completed!");
}

fn run_case(name: &str) {
    match name {
        "send-single" => run_send_single(),
        "send-concurrent" => run_send_concurrent(),
        "send-scale" => run_send_scale(),
        "send-payload" => run_send_payload(),
        "send-echo" => run_send_echo(),
        "send-all" => run_send_all(),

        "teardown-idle" => run_teardown_idle(),
        "teardown-busy" => run_teardown_busy(),
        "teardown-all" => run_teardown_all(),

        "quick" => run_quick_suite(),
        "full" => run_full_suite(),

        _ => {
            eprintln!("Error: Unknown benchmark case '{}'", name);
            eprintln!("Run 'wilc-bench list' to see available cases");
            process::exit(1);
        }
    }
}

fn main() {
    // Library logging stays quiet unless RUST_LOG asks for it
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    print_banner();

    if cli.all {
        run_full_suite();
    } else if let Some(case_name) = cli.case {
        run_case(&case_name);
    } else {
        match cli.command {
            Some(Commands::Case { name }) => run_case(&name),
            Some(Commands::List) => list_cases(),
            None => {
                println!("\nNo benchmark specified. Use one of:");
                println!("  wilc-bench -a              # Run all benchmarks");
                println!("  wilc-bench -c <case>       # Run specific case");
                println!("  wilc-bench case <case>     # Run specific case");
                println!("  wilc-bench list            # List available cases");
                println!("\nFor a quick start, try: wilc-bench -c quick");
            }
        }
    }
}
