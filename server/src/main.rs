//! Process entrypoint (spec §6 "Configuration", §1 transport boundary).
//!
//! Parses CLI args, loads room configuration and the map registry, and runs
//! a minimal length-prefixed TCP gateway in front of a [`RoomManager`]. The
//! concrete socket transport is deliberately outside the core (spec §1
//! places "the front-end client" and its wire framing among the external
//! collaborators); this binary is the thinnest thing that can exercise it
//! end to end.
//!
//! Framing follows the teacher's TCP path (`handle_tcp_client` in the
//! original single-binary server): a 4-byte little-endian length prefix
//! followed by a `bincode` payload, one frame per message.

use std::error::Error;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use shared::map::{Map, MapRegistry, RawMap, ALL_POOL};
use shared::protocol::ClientEvent;
use shared::tileset::Tileset;

use server::account::InMemoryAccountStore;
use server::config::{CliArgs, RoomConfig, RoomOptions};
use server::room_manager::RoomManager;
use server::transport::{OutboundSender, OUTBOUND_CHANNEL_CAPACITY};

/// Above this, a frame is assumed corrupt rather than just large.
const MAX_FRAME_LEN: usize = 1_000_000;

/// The first frame a gateway connection sends. Not part of the core wire
/// protocol (`shared::protocol`) — it only exists at this process's socket
/// boundary, where a hub would otherwise have already resolved the room.
#[derive(Debug, Serialize, Deserialize)]
enum GatewayRequest {
    CreateGame { host_username: String, map_id: String, options: RoomOptions },
    JoinGame { room_id: String, username: String },
}

#[derive(Debug, Serialize, Deserialize)]
enum GatewayResponse {
    Accepted { room_id: String },
    Rejected { reason: String },
}

/// Loads every `<id>.map.json` / `<id>.tileset.json` pair out of `dir`.
/// This naming convention is a gateway-local loading detail, not a core
/// content rule (spec §1 places the map-authoring tool itself out of
/// scope); `shared::map`/`shared::tileset` only care about the bytes.
fn load_maps(dir: &Path) -> MapRegistry {
    let mut registry = MapRegistry::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("maps directory `{}` unreadable: {}", dir.display(), e);
            return registry;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        let Some(stem) = name.strip_suffix(".map.json") else { continue };
        let tileset_path = dir.join(format!("{stem}.tileset.json"));

        match load_one_map(&path, &tileset_path) {
            Ok(map) => {
                info!("loaded map `{}` from {}", map.id, path.display());
                registry.register(map);
            }
            Err(e) => error!("failed to load map from {}: {}", path.display(), e),
        }
    }

    registry
}

fn load_one_map(map_path: &Path, tileset_path: &Path) -> Result<Map, String> {
    let raw_bytes = std::fs::read(map_path).map_err(|e| e.to_string())?;
    let raw: RawMap = serde_json::from_slice(&raw_bytes).map_err(|e| e.to_string())?;
    let tileset_bytes = std::fs::read(tileset_path).map_err(|e| e.to_string())?;
    let tileset = Tileset::load(&tileset_bytes).map_err(|e| e.to_string())?;
    Map::build(&raw, &tileset).map_err(|e| e.to_string())
}

async fn read_frame(reader: &mut BufReader<OwnedReadHalf>) -> std::io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    if let Err(e) = reader.read_exact(&mut len_buf).await {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Ok(None);
        }
        return Err(e);
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "frame too large"));
    }

    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer).await?;
    Ok(Some(buffer))
}

async fn write_frame<T: Serialize>(writer: &mut BufWriter<OwnedWriteHalf>, value: &T) -> std::io::Result<()> {
    let bytes = serialize(value).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    writer.write_all(&(bytes.len() as u32).to_le_bytes()).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, manager: Arc<RoomManager>) -> std::io::Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);

    let request_bytes = match read_frame(&mut reader).await? {
        Some(bytes) => bytes,
        None => return Ok(()),
    };
    let request: GatewayRequest = match deserialize(&request_bytes) {
        Ok(request) => request,
        Err(e) => {
            write_frame(&mut writer, &GatewayResponse::Rejected { reason: format!("malformed request: {e}") }).await?;
            return Ok(());
        }
    };

    let (room_id, username) = match request {
        GatewayRequest::CreateGame { host_username, map_id, options } => {
            match manager.create_game(host_username.clone(), options, &map_id) {
                Some(handle) => (handle.room_id, host_username),
                None => {
                    write_frame(&mut writer, &GatewayResponse::Rejected { reason: format!("unknown map `{map_id}`") })
                        .await?;
                    return Ok(());
                }
            }
        }
        GatewayRequest::JoinGame { room_id, username } => (room_id, username),
    };

    let (handle, auth_code) = match manager.join(&room_id, &username).await {
        Ok(pair) => pair,
        Err(e) => {
            write_frame(&mut writer, &GatewayResponse::Rejected { reason: e.to_string() }).await?;
            return Ok(());
        }
    };

    let (outbound_tx, mut outbound_rx): (OutboundSender, _) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
    if !handle.connect(username.clone(), auth_code, outbound_tx).await {
        write_frame(&mut writer, &GatewayResponse::Rejected { reason: "room closed before connect".to_string() })
            .await?;
        manager.release(&username);
        return Ok(());
    }

    write_frame(&mut writer, &GatewayResponse::Accepted { room_id: handle.room_id.clone() }).await?;
    info!("{} connected to room {} as {}", peer, handle.room_id, username);

    let pump_out = async {
        while let Some(event) = outbound_rx.recv().await {
            if write_frame(&mut writer, &event).await.is_err() {
                break;
            }
        }
    };

    let username_for_reads = username.clone();
    let pump_in = async {
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(bytes)) => match deserialize::<ClientEvent>(&bytes) {
                    Ok(event) => handle.send_event(username_for_reads.clone(), event),
                    Err(e) => {
                        warn!("{}: malformed client event: {}", peer, e);
                        break;
                    }
                },
                Ok(None) | Err(_) => break,
            }
        }
    };

    tokio::select! {
        _ = pump_out => {}
        _ = pump_in => {}
    }

    handle.disconnect(username.clone());
    manager.release(&username);
    info!("{} ({}) disconnected from room {}", peer, username, handle.room_id);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Warning: RUST_LOG environment variable not set. Set it to display logs!");
        eprintln!("Recommended: RUST_LOG=info cargo run");
    }

    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => RoomConfig::load_from_file(path)?,
        None => {
            info!("no --config given, using default room configuration");
            RoomConfig::default()
        }
    };

    let maps = load_maps(&args.maps_dir);
    info!("{} map(s) loaded from {}", maps.pool(ALL_POOL).len(), args.maps_dir.display());

    let manager = Arc::new(RoomManager::new(
        Arc::new(maps),
        Arc::new(InMemoryAccountStore::new()),
        config,
    ));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("room engine gateway listening on {}", addr);

    loop {
        let (stream, peer) = listener.accept().await?;
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, manager).await {
                warn!("connection {} closed: {}", peer, e);
            }
        });
    }
}
