#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use xcodec_core::{DictionaryCache, Pipe, PipeInput, PipePair, Role as XcodecRole};

/// Which side of a loopback pipe this process plays. Structurally identical
/// to the `server`/`client` roles [`xcodec_core::Role`] tags internally;
/// this one only decides whether we bind or connect.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum DemoRole {
    Client,
    Server,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "XCodec dedup link demo: relays stdin/stdout across a TCP link through the dedup codec")]
struct Cli {
    /// Which side of the pipe this process plays.
    #[arg(long, value_enum)]
    role: DemoRole,

    /// Address to listen on (server role only).
    #[arg(long, value_name = "ADDR", required_if_eq("role", "server"))]
    listen: Option<SocketAddr>,

    /// Address of the peer to connect to (client role only).
    #[arg(long, value_name = "ADDR", required_if_eq("role", "client"))]
    peer: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    // A single process plays one role on one connection, so one cache is
    // enough; a multi-connection server would share this `DictionaryCache`
    // handle across every accepted connection's task (`spec.md` §5).
    let cache = DictionaryCache::new();

    let result = match cli.role {
        DemoRole::Server => {
            run_server(cli.listen.expect("clap enforces --listen for server role"), cache).await
        }
        DemoRole::Client => {
            run_client(cli.peer.expect("clap enforces --peer for client role"), cache).await
        }
    };

    if let Err(err) = result {
        error!(%err, "xcodec-demo exited with error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run_server(listen: SocketAddr, cache: DictionaryCache) -> std::io::Result<()> {
    let listener = TcpListener::bind(listen).await?;
    info!(%listen, "listening");
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "failed to accept connection");
                continue;
            }
        };
        info!(%peer_addr, "accepted connection");
        let pair = PipePair::new(XcodecRole::Server, cache.clone());
        tokio::spawn(async move {
            match relay(stream, pair).await {
                Ok(()) => info!(%peer_addr, "connection closed"),
                Err(err) => warn!(%peer_addr, %err, "connection relay ended with error"),
            }
        });
    }
}

async fn run_client(peer: SocketAddr, cache: DictionaryCache) -> std::io::Result<()> {
    let stream = TcpStream::connect(peer).await?;
    info!(%peer, "connected");
    let pair = PipePair::new(XcodecRole::Client, cache);
    relay(stream, pair).await
}

/// Drives one TCP connection: bytes read from stdin are encoded onto the
/// socket, bytes read from the socket are decoded onto stdout. Both
/// directions share one [`PipePair`] so an `ASK`/`LEARN` exchange the
/// decoder raises is routed onto the same outgoing stream the encoder
/// writes application data to, exactly as `spec.md` §4.6 describes. Only one
/// `select!` branch ever runs at a time, so a plain `&mut PipePair` is enough
/// — no lock is needed (mirrors the single-task-per-connection shape of the
/// teacher's `tcp/handler.rs` accept loop, minus the second socket, since one
/// side of this duplex is the process's own stdio).
async fn relay(stream: TcpStream, mut pair: PipePair) -> std::io::Result<()> {
    let (mut socket_read, mut socket_write) = stream.into_split();
    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();

    let mut stdin_buf = vec![0u8; 8192];
    let mut socket_buf = vec![0u8; 8192];
    let mut stdin_open = true;

    loop {
        tokio::select! {
            result = socket_read.read(&mut socket_buf) => {
                let n = result?;
                if n == 0 {
                    break;
                }
                match pair.incoming().consume(PipeInput::Data(&socket_buf[..n])) {
                    Ok(decoded) if !decoded.is_empty() => {
                        stdout.write_all(&decoded).await?;
                        stdout.flush().await?;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        error!(%err, "decode error, closing connection");
                        break;
                    }
                }
                // An ASK the decoder just raised must reach the peer even if
                // stdin is idle and never drives `outgoing().consume(...)` —
                // otherwise a blocked REF can never unblock (`spec.md` §4.6).
                let control = pair.take_pending_wire_control();
                if !control.is_empty() {
                    socket_write.write_all(&control).await?;
                }
            }
            result = stdin.read(&mut stdin_buf), if stdin_open => {
                let n = result?;
                let input = if n == 0 {
                    stdin_open = false;
                    PipeInput::Eof
                } else {
                    PipeInput::Data(&stdin_buf[..n])
                };
                match pair.outgoing().consume(input) {
                    Ok(wire) if !wire.is_empty() => socket_write.write_all(&wire).await?,
                    Ok(_) => {}
                    Err(err) => {
                        error!(%err, "encode error, closing connection");
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
