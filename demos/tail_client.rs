//! Follow an event stream from the terminal
//!
//! Run with: cargo run --example tail_client [ADDR] [PATH]
//!
//! Examples:
//!   cargo run --example tail_client                          # 127.0.0.1:8080 /events
//!   cargo run --example tail_client localhost:9090           # custom address
//!   cargo run --example tail_client localhost:9090 /feed     # custom path
//!
//! Connects, requests the stream, and prints every payload until the
//! server closes the connection.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn print_usage() {
    eprintln!("Usage: tail_client [ADDR] [PATH]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  ADDR    Server address (default: 127.0.0.1:8080)");
    eprintln!("  PATH    Stream path (default: /events)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let addr = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("127.0.0.1:8080")
        .replace("localhost", "127.0.0.1");
    let path = args.get(2).map(String::as_str).unwrap_or("/events");

    eprintln!("Connecting to {} ...", addr);
    let mut stream = TcpStream::connect(&addr).await?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nAccept: text/event-stream\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await?;

    eprintln!("Following {} (Ctrl+C to stop)", path);

    let mut stdout = tokio::io::stdout();
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            eprintln!("\nStream closed by server");
            return Ok(());
        }
        stdout.write_all(&buf[..n]).await?;
        stdout.flush().await?;
    }
}
