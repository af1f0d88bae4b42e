use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use frames::{ClientMessage, Frame, HttpRequest, RelayMessage, RequestBody, WsOpen};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type RelayStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Sequence id used for the single exchange or socket a command opens.
const SEQUENCE: u16 = 1;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid header `{0}`; expected name:value")]
    InvalidHeader(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("relay channel closed")]
    ChannelClosed,
    #[error("frame encode failed: {0}")]
    Codec(#[from] frames::CodecError),
    #[error("timed out waiting for relay frame")]
    Timeout,
    #[error("health check failed: HTTP {0}")]
    Unhealthy(u16),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for CliError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ws(Box::new(error))
    }
}

#[derive(Parser, Debug)]
#[command(name = "relay-cli", about = "Drive a relay server over its multiplexed channel")]
struct Cli {
    #[arg(long, env = "RELAY_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, default_value_t = 30, help = "Seconds to wait for each relay frame")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the relay's health endpoint.
    Ping,
    /// Relay one HTTP request; body goes to stdout, status and headers to stderr.
    Fetch(FetchArgs),
    /// Bridge stdin lines to a remote websocket through the relay.
    Ws(WsArgs),
}

#[derive(Args, Debug)]
struct FetchArgs {
    url: String,

    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    #[arg(short = 'H', long = "header", help = "Request header as name:value")]
    headers: Vec<String>,

    #[arg(long, help = "Request body sent as text")]
    data: Option<String>,
}

#[derive(Args, Debug)]
struct WsArgs {
    url: String,

    #[arg(long = "protocol")]
    protocols: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.timeout_secs);

    match cli.command {
        Command::Ping => run_ping(&cli.base_url).await,
        Command::Fetch(args) => run_fetch(&cli.base_url, timeout, args).await,
        Command::Ws(args) => run_ws(&cli.base_url, timeout, args).await,
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let response = reqwest::get(url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::Unhealthy(status.as_u16()));
    }
    let body: serde_json::Value = response.json().await?;
    println!("ok ({} channels)", body.get("channels").and_then(serde_json::Value::as_u64).unwrap_or(0));
    Ok(())
}

async fn run_fetch(base_url: &str, timeout: Duration, args: FetchArgs) -> Result<(), CliError> {
    let request = HttpRequest {
        method: args.method.to_ascii_uppercase(),
        remote: args.url,
        headers: parse_headers(&args.headers)?,
        body: args.data.map(RequestBody::Text),
    };

    let mut stream = connect(base_url).await?;
    send(&mut stream, &ClientMessage::HttpRequest(request)).await?;

    let mut stdout = io::stdout();
    loop {
        match recv_next(&mut stream, timeout).await? {
            RelayMessage::HttpResponseStart(start) => {
                eprintln!("{} {}", start.status, start.status_text);
                for (name, value) in &start.headers {
                    eprintln!("{name}: {value}");
                }
            }
            RelayMessage::HttpResponseChunk(chunk) => stdout.write_all(&chunk)?,
            RelayMessage::HttpResponseEnd => break,
            _ => {}
        }
    }
    stdout.flush()?;
    stream.close(None).await?;
    Ok(())
}

async fn run_ws(base_url: &str, timeout: Duration, args: WsArgs) -> Result<(), CliError> {
    let mut stream = connect(base_url).await?;
    send(&mut stream, &ClientMessage::WsOpen(WsOpen { url: args.url, protocols: args.protocols })).await?;

    match recv_next(&mut stream, timeout).await? {
        RelayMessage::WsOpen => eprintln!("connected"),
        RelayMessage::WsClose(close) => {
            eprintln!("closed: {} {}", close.code, close.reason);
            return Ok(());
        }
        _ => {}
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => send(&mut stream, &ClientMessage::WsSendText(line)).await?,
                None => {
                    stdin_open = false;
                    send(&mut stream, &ClientMessage::WsClose).await?;
                }
            },
            message = recv_any(&mut stream) => match message? {
                RelayMessage::WsDataText(text) => println!("{text}"),
                RelayMessage::WsDataBinary(data) => println!("{}", hex(&data)),
                RelayMessage::WsClose(close) => {
                    eprintln!("closed: {} {} (clean: {})", close.code, close.reason, close.was_clean);
                    break;
                }
                _ => {}
            },
        }
    }
    stream.close(None).await?;
    Ok(())
}

fn relay_url(base_url: &str) -> Result<String, CliError> {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/relay"));
    }
    if let Some(rest) = base.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/relay"));
    }

    Err(CliError::InvalidBaseUrl(base_url.to_owned()))
}

fn parse_headers(raw: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    raw.iter()
        .map(|header| {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| CliError::InvalidHeader(header.clone()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(CliError::InvalidHeader(header.clone()));
            }
            Ok((name.to_ascii_lowercase(), value.trim().to_owned()))
        })
        .collect()
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

async fn connect(base_url: &str) -> Result<RelayStream, CliError> {
    let (stream, _) = connect_async(relay_url(base_url)?).await?;
    Ok(stream)
}

async fn send(stream: &mut RelayStream, message: &ClientMessage) -> Result<(), CliError> {
    stream.send(Message::binary(message.encode(SEQUENCE)?)).await?;
    Ok(())
}

async fn recv_next(stream: &mut RelayStream, timeout: Duration) -> Result<RelayMessage, CliError> {
    tokio::time::timeout(timeout, recv_any(stream))
        .await
        .map_err(|_| CliError::Timeout)?
}

/// Next frame for our sequence id; frames that fail to decode are skipped.
async fn recv_any(stream: &mut RelayStream) -> Result<RelayMessage, CliError> {
    loop {
        let Some(message) = stream.next().await else {
            return Err(CliError::ChannelClosed);
        };
        match message? {
            Message::Binary(bytes) => {
                let Some(frame) = Frame::decode(bytes) else { continue };
                if frame.sequence != SEQUENCE {
                    continue;
                }
                let Some(op) = frame.op() else { continue };
                if let Some(message) = RelayMessage::decode(op, frame.payload) {
                    return Ok(message);
                }
            }
            Message::Close(_) => return Err(CliError::ChannelClosed),
            _ => {}
        }
    }
}
