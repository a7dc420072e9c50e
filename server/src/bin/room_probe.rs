//! A throwaway probe client against the TCP gateway in `main.rs`, grounded
//! on the teacher's `bin/test_client.rs`: connect, create a room, send a
//! few inputs, print whatever the room sends back.
//!
//! This talks raw frames over the socket rather than linking `server`'s
//! internals, since that's exactly what a real client would do. The
//! gateway-only request/response shapes are duplicated here rather than
//! imported, because they live in the `server` binary crate, not its
//! library — a standalone client has no more access to them than this.

use std::error::Error;
use std::time::Duration;

use bincode::{deserialize, serialize};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::time::sleep;

use shared::protocol::{ClientEvent, EndPosition, InputFlags, PlayerTickInput, ServerEvent};

#[derive(Debug, Serialize, Deserialize)]
enum GatewayRequest {
    CreateGame { host_username: String, map_id: String, options: RoomOptions },
    #[allow(dead_code)]
    JoinGame { room_id: String, username: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct RoomOptions {
    max_players: u32,
    ai_players: u32,
    public: bool,
}

#[derive(Debug, Serialize, Deserialize)]
enum GatewayResponse {
    Accepted { room_id: String },
    Rejected { reason: String },
}

async fn write_frame<W: AsyncWriteExt + Unpin, T: Serialize>(writer: &mut W, value: &T) -> std::io::Result<()> {
    let bytes = serialize(value).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    writer.write_all(&(bytes.len() as u32).to_le_bytes()).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await
}

async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer).await?;
    Ok(buffer)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let server_addr = std::env::var("ROOM_PROBE_ADDR").unwrap_or_else(|_| "127.0.0.1:7777".to_string());
    let map_id = std::env::var("ROOM_PROBE_MAP").unwrap_or_else(|_| "arena".to_string());

    println!("connecting to {server_addr}");
    let stream = TcpStream::connect(&server_addr).await?;
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);

    write_frame(
        &mut writer,
        &GatewayRequest::CreateGame {
            host_username: "probe".to_string(),
            map_id,
            options: RoomOptions { max_players: 8, ai_players: 0, public: false },
        },
    )
    .await?;

    let response: GatewayResponse = deserialize(&read_frame(&mut reader).await?)?;
    let room_id = match response {
        GatewayResponse::Accepted { room_id } => {
            println!("joined room {room_id}");
            room_id
        }
        GatewayResponse::Rejected { reason } => {
            println!("rejected: {reason}");
            return Ok(());
        }
    };

    write_frame(&mut writer, &ClientEvent::Ready).await?;
    write_frame(&mut writer, &ClientEvent::ReadyStart(true)).await?;

    for tick in 0..20 {
        let input = PlayerTickInput {
            tick,
            modifiers: Vec::new(),
            inputs: InputFlags { left: tick % 2 == 0, right: tick % 2 != 0, up: false, down: false },
            position: EndPosition { endx: 0.0, endy: 0.0 },
        };
        write_frame(&mut writer, &ClientEvent::Tick(input)).await?;
        sleep(Duration::from_millis(25)).await;
    }

    drop(writer);
    loop {
        match read_frame(&mut reader).await {
            Ok(bytes) => match deserialize::<ServerEvent>(&bytes) {
                Ok(ServerEvent::Tick(snapshot)) => {
                    println!("room {room_id}: tick {} tps {:.1} players {}", snapshot.tick, snapshot.tps, snapshot.players.len());
                }
                Ok(event) => println!("room {room_id}: {event:?}"),
                Err(e) => {
                    println!("malformed server frame: {e}");
                    break;
                }
            },
            Err(_) => break,
        }
    }

    Ok(())
}
