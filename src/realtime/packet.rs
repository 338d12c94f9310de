//! Engine.IO v4 / Socket.IO v5 packet codec
//!
//! Every WebSocket text frame is one Engine.IO packet: a type digit followed
//! by its payload. Engine.IO `4` (message) packets carry Socket.IO packets:
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,"pingTimeout":20000}   open
//! 2 / 3                                                     ping / pong
//! 40                                                        connect to "/"
//! 40{"sid":".."}                                            connect ok
//! 42["receiveMessage",{..}]                                 event
//! 4212["event",{..}]                                        event with ack id 12
//! 44{"message":".."}                                        connect error
//! ```
//!
//! Binary packets (Socket.IO types 5 and 6) are not used by this backend.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,
    #[error("unknown {layer} packet type {kind:?}")]
    UnknownType { layer: &'static str, kind: char },
    #[error("binary socket.io packets are not supported")]
    Binary,
    #[error("malformed packet: {0}")]
    Malformed(&'static str),
    #[error("invalid JSON in packet")]
    Json(#[from] serde_json::Error),
}

/// Engine.IO handshake carried by the open packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// Transport-level packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, PacketError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let body = chars.as_str();
        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(body)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(body.to_string())),
            '3' => Ok(EnginePacket::Pong(body.to_string())),
            '4' => Ok(EnginePacket::Message(body.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(PacketError::UnknownType {
                layer: "engine.io",
                kind: other,
            }),
        }
    }

    /// Encode for sending. The client never sends `Open`; it encodes as an empty open.
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

/// Application-level packet on the default namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event {
        name: String,
        args: Vec<Value>,
        ack_id: Option<u64>,
    },
    Ack {
        ack_id: u64,
        args: Vec<Value>,
    },
    ConnectError(Value),
}

impl SocketPacket {
    pub fn decode(body: &str) -> Result<Self, PacketError> {
        let mut chars = body.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let mut rest = chars.as_str();

        // Optional namespace: "/chat,". Everything here lives on "/".
        if rest.starts_with('/') {
            rest = match rest.find(',') {
                Some(pos) => &rest[pos + 1..],
                None => "",
            };
        }

        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        let (id_part, json) = rest.split_at(digits);
        let ack_id = if id_part.is_empty() {
            None
        } else {
            Some(
                id_part
                    .parse::<u64>()
                    .map_err(|_| PacketError::Malformed("ack id out of range"))?,
            )
        };

        match kind {
            '0' => {
                if json.is_empty() {
                    Ok(SocketPacket::Connect(None))
                } else {
                    Ok(SocketPacket::Connect(Some(serde_json::from_str(json)?)))
                }
            }
            '1' => Ok(SocketPacket::Disconnect),
            '2' => {
                let mut args = parse_array(json)?;
                if args.is_empty() {
                    return Err(PacketError::Malformed("event without a name"));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    _ => return Err(PacketError::Malformed("event name is not a string")),
                };
                Ok(SocketPacket::Event { name, args, ack_id })
            }
            '3' => {
                let ack_id = ack_id.ok_or(PacketError::Malformed("ack without id"))?;
                Ok(SocketPacket::Ack {
                    ack_id,
                    args: parse_array(json)?,
                })
            }
            '4' => {
                let data = if json.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(json)?
                };
                Ok(SocketPacket::ConnectError(data))
            }
            '5' | '6' => Err(PacketError::Binary),
            other => Err(PacketError::UnknownType {
                layer: "socket.io",
                kind: other,
            }),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => "0".to_string(),
            SocketPacket::Connect(Some(data)) => format!("0{}", data),
            SocketPacket::Disconnect => "1".to_string(),
            SocketPacket::Event { name, args, ack_id } => {
                let mut array = Vec::with_capacity(args.len() + 1);
                array.push(Value::String(name.clone()));
                array.extend(args.iter().cloned());
                let id = ack_id.map(|id| id.to_string()).unwrap_or_default();
                format!("2{}{}", id, Value::Array(array))
            }
            SocketPacket::Ack { ack_id, args } => {
                format!("3{}{}", ack_id, Value::Array(args.clone()))
            }
            SocketPacket::ConnectError(data) => format!("4{}", data),
        }
    }

    /// Wrap in an Engine.IO message, ready to put on the wire.
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

fn parse_array(json: &str) -> Result<Vec<Value>, PacketError> {
    match serde_json::from_str(json)? {
        Value::Array(items) => Ok(items),
        _ => Err(PacketError::Malformed("expected a JSON array")),
    }
}
