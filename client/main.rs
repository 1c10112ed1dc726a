// wilc-client: interactive TCP client built on the connection library.
// Every stdin line is sent to the peer; received chunks are printed with a
// local timestamp as they arrive.
use chrono::Local;
use clap::Parser;
use std::io::{self, BufRead};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use wilc_osal::{Connection, ConnectionConfig, Endpoint, ErrorKind};

#[derive(Parser)]
#[command(name = "wilc-client")]
#[command(about = "Send stdin lines to a TCP peer and print what comes back", long_about = None)]
struct Cli {
    /// Peer address (dotted-quad IPv4)
    #[arg(short, long, default_value = "127.0.0.1")]
    address: String,

    /// Peer port
    #[arg(short, long, default_value_t = 9000)]
    port: u16,

    /// Print received bytes as hex instead of text
    #[arg(long)]
    hex: bool,

    /// Do not append a newline to each sent line
    #[arg(long)]
    raw: bool,
}

fn format_chunk(data: &[u8], hex: bool) -> String {
    if hex {
        data.iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        String::from_utf8_lossy(data).trim_end_matches('\n').to_string()
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let endpoint = match Endpoint::new(&cli.address, cli.port) {
        Ok(endpoint) => endpoint,
        Err(e) => {
            eprintln!("Invalid endpoint: {}", e);
            std::process::exit(2);
        }
    };

    let hex = cli.hex;
    let conn = Connection::with_config(endpoint, ConnectionConfig::from_env());
    let connected = conn.connect(move |data: &[u8]| {
        let now = Local::now().format("%Y/%m/%d %H:%M:%S%.6f");
        println!("{} [{:>5} bytes] {}", now, data.len(), format_chunk(data, hex));
    });
    if let Err(e) = connected {
        eprintln!("Failed to connect to {}: {}", endpoint, e);
        std::process::exit(1);
    }

    for line in io::stdin().lock().lines() {
        let mut line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        };
        if !cli.raw {
            line.push('\n');
        }

        match conn.send(line.as_bytes()) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotConnected => {
                eprintln!("Connection closed by peer");
                break;
            }
            Err(e) => {
                eprintln!("Send failed: {}", e);
                break;
            }
        }
    }

    conn.disconnect();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_render_as_hex_or_text() {
        assert_eq!(format_chunk(&[1, 2, 0xab], true), "01 02 ab");
        assert_eq!(format_chunk(b"hello\n", false), "hello");
    }
}
