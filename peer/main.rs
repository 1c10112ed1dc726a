// wilc-peer: local TCP peer for exercising the client by hand.
// Accepts connections, logs what arrives, optionally echoes it back and
// optionally greets every new connection with a fixed payload.
use clap::Parser;
use std::net::Shutdown;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wilc_transport::{TcpTransport, TcpTransportListener, Transport, TransportListener};

#[derive(Parser)]
#[command(name = "wilc-peer")]
#[command(about = "Local TCP peer for the WILC socket client", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:9000")]
    listen: String,

    /// Echo received bytes back to the sender
    #[arg(short, long)]
    echo: bool,

    /// Bytes to send to every new connection (comma separated, e.g. 1,2,3)
    #[arg(short, long, value_delimiter = ',')]
    greet: Vec<u8>,

    /// Close the connection this many milliseconds after accepting it
    #[arg(long, value_name = "MS")]
    close_after: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut listener = TcpTransportListener::new(&cli.listen);
    if let Err(e) = listener.bind() {
        eprintln!("Failed to listen on {}: {}", cli.listen, e);
        std::process::exit(1);
    }
    info!(listen = %cli.listen, echo = cli.echo, "peer listening");

    loop {
        let conn = match listener.accept() {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };

        let greet = cli.greet.clone();
        let echo = cli.echo;
        let close_after = cli.close_after.map(Duration::from_millis);
        thread::spawn(move || serve(conn, &greet, echo, close_after));
    }
}

fn serve(mut conn: TcpTransport, greet: &[u8], echo: bool, close_after: Option<Duration>) {
    let peer = conn
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "?".to_string());
    info!(%peer, "accepted");

    if !greet.is_empty() && write_all(&mut conn, greet).is_err() {
        return;
    }

    if let Some(delay) = close_after {
        if let Ok(closer) = conn.try_clone() {
            let peer = peer.clone();
            thread::spawn(move || {
                thread::sleep(delay);
                info!(%peer, "closing");
                let _ = closer.shutdown(Shutdown::Both);
            });
        }
    }

    let mut buf = vec![0u8; 4096];
    loop {
        match conn.receive(&mut buf) {
            Ok(0) => break, // Connection closed
            Ok(n) => {
                info!(%peer, bytes = n, data = ?&buf[..n], "received");
                if echo && write_all(&mut conn, &buf[..n]).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(%peer, error = %e, "receive failed");
                break;
            }
        }
    }
    info!(%peer, "disconnected");
}

fn write_all(conn: &mut TcpTransport, mut data: &[u8]) -> std::io::Result<()> {
    while !data.is_empty() {
        let n = conn.send(data)?;
        if n == 0 {
            return Err(std::io::ErrorKind::WriteZero.into());
        }
        data = &data[n..];
    }
    Ok(())
}
