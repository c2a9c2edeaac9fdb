//! Wire format. Every message is `command (12 ASCII bytes, NUL-padded) ‖
//! payload`, where the payload is the bincode serialization of the
//! command's payload struct. One message per TCP connection; the receiver
//! reads to EOF.

use crate::error::{CoinError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

pub const COMMAND_LENGTH: usize = 12;

/// Inventory item kind carried by `inv` and `getdata`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvKind {
    Block,
    Tx,
}

#[derive(Serialize, Deserialize)]
struct VersionPayload {
    version: usize,
    best_height: usize,
    addr_from: SocketAddr,
}

#[derive(Serialize, Deserialize)]
struct AddrPayload {
    addr_list: Vec<SocketAddr>,
}

#[derive(Serialize, Deserialize)]
struct GetBlocksPayload {
    addr_from: SocketAddr,
}

#[derive(Serialize, Deserialize)]
struct InvPayload {
    addr_from: SocketAddr,
    kind: InvKind,
    items: Vec<Vec<u8>>,
}

#[derive(Serialize, Deserialize)]
struct GetDataPayload {
    addr_from: SocketAddr,
    kind: InvKind,
    id: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct BlockPayload {
    addr_from: SocketAddr,
    block: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct TxPayload {
    addr_from: SocketAddr,
    transaction: Vec<u8>,
}

/// In-memory form of the seven wire messages.
#[derive(Clone, Debug)]
pub enum Message {
    Version {
        addr_from: SocketAddr,
        version: usize,
        best_height: usize,
    },
    Addr {
        addr_list: Vec<SocketAddr>,
    },
    GetBlocks {
        addr_from: SocketAddr,
    },
    Inv {
        addr_from: SocketAddr,
        kind: InvKind,
        items: Vec<Vec<u8>>,
    },
    GetData {
        addr_from: SocketAddr,
        kind: InvKind,
        id: Vec<u8>,
    },
    Block {
        addr_from: SocketAddr,
        block: Vec<u8>,
    },
    Tx {
        addr_from: SocketAddr,
        transaction: Vec<u8>,
    },
}

impl Message {
    pub fn command(&self) -> &'static str {
        match self {
            Message::Version { .. } => "version",
            Message::Addr { .. } => "addr",
            Message::GetBlocks { .. } => "getblocks",
            Message::Inv { .. } => "inv",
            Message::GetData { .. } => "getdata",
            Message::Block { .. } => "block",
            Message::Tx { .. } => "tx",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = match self {
            Message::Version {
                addr_from,
                version,
                best_height,
            } => encode_payload(&VersionPayload {
                version: *version,
                best_height: *best_height,
                addr_from: *addr_from,
            })?,
            Message::Addr { addr_list } => encode_payload(&AddrPayload {
                addr_list: addr_list.clone(),
            })?,
            Message::GetBlocks { addr_from } => encode_payload(&GetBlocksPayload {
                addr_from: *addr_from,
            })?,
            Message::Inv {
                addr_from,
                kind,
                items,
            } => encode_payload(&InvPayload {
                addr_from: *addr_from,
                kind: *kind,
                items: items.clone(),
            })?,
            Message::GetData {
                addr_from,
                kind,
                id,
            } => encode_payload(&GetDataPayload {
                addr_from: *addr_from,
                kind: *kind,
                id: id.clone(),
            })?,
            Message::Block { addr_from, block } => encode_payload(&BlockPayload {
                addr_from: *addr_from,
                block: block.clone(),
            })?,
            Message::Tx {
                addr_from,
                transaction,
            } => encode_payload(&TxPayload {
                addr_from: *addr_from,
                transaction: transaction.clone(),
            })?,
        };

        let mut frame = command_to_bytes(self.command());
        frame.extend(payload);
        Ok(frame)
    }

    pub fn decode(frame: &[u8]) -> Result<Message> {
        if frame.len() < COMMAND_LENGTH {
            return Err(CoinError::MessageDecodingError(format!(
                "frame of {} bytes is shorter than the command header",
                frame.len()
            )));
        }
        let command = bytes_to_command(&frame[..COMMAND_LENGTH]);
        let payload = &frame[COMMAND_LENGTH..];

        match command.as_str() {
            "version" => {
                let p: VersionPayload = decode_payload(payload)?;
                Ok(Message::Version {
                    addr_from: p.addr_from,
                    version: p.version,
                    best_height: p.best_height,
                })
            }
            "addr" => {
                let p: AddrPayload = decode_payload(payload)?;
                Ok(Message::Addr {
                    addr_list: p.addr_list,
                })
            }
            "getblocks" => {
                let p: GetBlocksPayload = decode_payload(payload)?;
                Ok(Message::GetBlocks {
                    addr_from: p.addr_from,
                })
            }
            "inv" => {
                let p: InvPayload = decode_payload(payload)?;
                Ok(Message::Inv {
                    addr_from: p.addr_from,
                    kind: p.kind,
                    items: p.items,
                })
            }
            "getdata" => {
                let p: GetDataPayload = decode_payload(payload)?;
                Ok(Message::GetData {
                    addr_from: p.addr_from,
                    kind: p.kind,
                    id: p.id,
                })
            }
            "block" => {
                let p: BlockPayload = decode_payload(payload)?;
                Ok(Message::Block {
                    addr_from: p.addr_from,
                    block: p.block,
                })
            }
            "tx" => {
                let p: TxPayload = decode_payload(payload)?;
                Ok(Message::Tx {
                    addr_from: p.addr_from,
                    transaction: p.transaction,
                })
            }
            other => Err(CoinError::MessageDecodingError(format!(
                "unknown command {:?}",
                other
            ))),
        }
    }
}

// 12 bytes, NUL-padded ASCII.
fn command_to_bytes(command: &str) -> Vec<u8> {
    let mut bytes = vec![0u8; COMMAND_LENGTH];
    for (i, b) in command.as_bytes().iter().take(COMMAND_LENGTH).enumerate() {
        bytes[i] = *b;
    }
    bytes
}

fn bytes_to_command(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .position(|b| *b == 0)
        .unwrap_or(COMMAND_LENGTH);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(payload, bincode::config::standard())
        .map_err(|e| CoinError::MessageEncodingError(e.to_string()))
}

fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(payload, _)| payload)
        .map_err(|e| CoinError::MessageDecodingError(e.to_string()))
}
