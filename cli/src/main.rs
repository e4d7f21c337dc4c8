use std::path::PathBuf;
use std::time::Duration;

use canvas::doc::Drawing;
use clap::{Args, Parser, Subcommand};
use frames::{Frame, Status};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const REPLY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid store path: {0:?}")]
    InvalidPath(String),
    #[error("websocket failed: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("frame codec failed: {0}")]
    Codec(#[from] frames::CodecError),
    #[error("timed out waiting for websocket frame")]
    Timeout,
    #[error("server returned error for {syscall}: {message}")]
    ServerError { syscall: String, message: String },
    #[error("stored drawing is malformed: {0}")]
    Snapshot(#[from] canvas::doc::SnapshotError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

impl From<tokio_tungstenite::tungstenite::Error> for CliError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ws(Box::new(error))
    }
}

#[derive(Parser, Debug)]
#[command(name = "sketch-cli", about = "Sketchboard store CLI")]
struct Cli {
    #[arg(long, env = "SKETCH_URL", default_value = "ws://localhost:3000/api/ws")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct PathArg {
    /// Store path holding the drawing.
    #[arg(long, env = "SKETCH_PATH", default_value = canvas::consts::DRAWING_PATH)]
    path: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the stored JSON value.
    Get(PathArg),
    /// Render the stored drawing as SVG.
    ExportSvg {
        #[command(flatten)]
        path: PathArg,
        /// Write to a file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete every stroke.
    Clear(PathArg),
    /// Print a line for every snapshot until the connection closes.
    Watch(PathArg),
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Get(arg) => run_get(&cli.url, &arg.path).await,
        Command::ExportSvg { path, out } => run_export_svg(&cli.url, &path.path, out).await,
        Command::Clear(arg) => run_clear(&cli.url, &arg.path).await,
        Command::Watch(arg) => run_watch(&cli.url, &arg.path).await,
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

async fn run_get(url: &str, path: &str) -> Result<(), CliError> {
    let value = fetch_value(url, path).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn run_export_svg(url: &str, path: &str, out: Option<PathBuf>) -> Result<(), CliError> {
    let value = fetch_value(url, path).await?;
    let drawing = if value.is_null() { Drawing::new() } else { Drawing::from_snapshot(&value)? };
    let svg = canvas::render::svg_document(&drawing);

    match out {
        Some(file) => {
            tokio::fs::write(&file, svg)
                .await
                .map_err(|source| CliError::Write { path: file.clone(), source })?;
            eprintln!("wrote {} strokes to {}", drawing.len(), file.display());
        }
        None => println!("{svg}"),
    }
    Ok(())
}

async fn run_clear(url: &str, path: &str) -> Result<(), CliError> {
    let mut stream = connect(url, path).await?;
    let req = Frame::request(frames::STORE_SET).with_path(path).with_data(frames::FRAME_VALUE, Value::Null);
    request(&mut stream, &req).await?;
    eprintln!("cleared {path}");
    Ok(())
}

async fn run_watch(url: &str, path: &str) -> Result<(), CliError> {
    let mut stream = connect(url, path).await?;
    let req = Frame::request(frames::STORE_SUBSCRIBE).with_path(path);
    let reply = request(&mut stream, &req).await?;
    print_summary(reply.value());

    loop {
        let frame = recv_next(&mut stream, None).await?;
        if frame.syscall == frames::STORE_VALUE && frame.path.as_deref() == Some(path) {
            print_summary(frame.value());
        }
    }
}

fn print_summary(value: Option<&Value>) {
    let drawing = Drawing::from_remote(value);
    println!("{} strokes, {} points", drawing.len(), drawing.point_count());
}

// =============================================================================
// WEBSOCKET
// =============================================================================

async fn fetch_value(url: &str, path: &str) -> Result<Value, CliError> {
    let mut stream = connect(url, path).await?;
    let req = Frame::request(frames::STORE_GET).with_path(path);
    let reply = request(&mut stream, &req).await?;
    Ok(reply.data.get(frames::FRAME_VALUE).cloned().unwrap_or(Value::Null))
}

async fn connect(url: &str, path: &str) -> Result<WsStream, CliError> {
    if !frames::is_valid_path(path) {
        return Err(CliError::InvalidPath(path.to_owned()));
    }
    let (stream, _) = connect_async(url).await?;
    Ok(stream)
}

/// Send `req` and wait for its terminal reply.
async fn request(stream: &mut WsStream, req: &Frame) -> Result<Frame, CliError> {
    let text = frames::encode_frame(req)?;
    stream.send(Message::text(text)).await?;

    loop {
        let frame = recv_next(stream, Some(REPLY_TIMEOUT)).await?;
        if frame.parent_id.as_deref() != Some(req.id.as_str()) || !frame.status.is_terminal() {
            continue;
        }
        if frame.status == Status::Error {
            return Err(CliError::ServerError {
                syscall: frame.syscall.clone(),
                message: frame.message().unwrap_or("unknown websocket error").to_owned(),
            });
        }
        return Ok(frame);
    }
}

async fn recv_next(stream: &mut WsStream, timeout: Option<Duration>) -> Result<Frame, CliError> {
    let fut = async {
        loop {
            let Some(message) = stream.next().await else {
                return Err(CliError::WsClosed);
            };
            match message? {
                Message::Text(text) => return frames::decode_frame(text.as_str()).map_err(CliError::from),
                Message::Close(_) => return Err(CliError::WsClosed),
                _ => {}
            }
        }
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| CliError::Timeout)?,
        None => fut.await,
    }
}
