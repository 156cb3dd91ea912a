// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Msg {
    n: u32,
    s: String,
}

#[test]
fn encode_prefixes_length_big_endian() {
    let frame = encode(&Msg { n: 1, s: "x".into() }).unwrap();
    let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
    assert_eq!(len as usize, frame.len() - 4);
}

#[test]
fn decode_inverts_encode() {
    let msg = Msg { n: 42, s: "hello".into() };
    let frame = encode(&msg).unwrap();
    let back: Msg = decode(&frame[4..]).unwrap();
    assert_eq!(back, msg);
}

#[tokio::test]
async fn write_then_read_round_trips() {
    let (mut client, mut server) = tokio::io::duplex(1024);
    let msg = Msg { n: 7, s: "frame".into() };
    write_frame(&mut client, &msg).await.unwrap();
    let back: Msg = read_frame(&mut server, Duration::from_secs(1)).await.unwrap();
    assert_eq!(back, msg);
}

#[tokio::test]
async fn read_reports_closed_connection() {
    let (client, mut server) = tokio::io::duplex(1024);
    drop(client);
    let err = read_frame::<_, Msg>(&mut server, Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[tokio::test]
async fn read_times_out_on_silence() {
    let (_client, mut server) = tokio::io::duplex(1024);
    let err = read_frame::<_, Msg>(&mut server, Duration::from_millis(50)).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Timeout));
}

#[tokio::test]
async fn oversized_length_prefix_is_rejected() {
    use tokio::io::AsyncWriteExt;
    let (mut client, mut server) = tokio::io::duplex(1024);
    client.write_all(&(MAX_FRAME_BYTES + 1).to_be_bytes()).await.unwrap();
    let err = read_frame::<_, Msg>(&mut server, Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, ProtocolError::FrameTooLarge(_)));
}

#[tokio::test]
async fn garbage_body_is_malformed() {
    use tokio::io::AsyncWriteExt;
    let (mut client, mut server) = tokio::io::duplex(1024);
    client.write_all(&4u32.to_be_bytes()).await.unwrap();
    client.write_all(b"!!!!").await.unwrap();
    let err = read_frame::<_, Msg>(&mut server, Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Malformed(_)));
}

#[test]
fn chunk_bytes_round_trip() {
    let bytes: Vec<u8> = (0..=255).collect();
    let encoded = encode_chunk_bytes(&bytes);
    assert_eq!(decode_chunk_bytes(&encoded).unwrap(), bytes);
}

#[test]
fn bad_chunk_encoding_is_malformed() {
    assert!(matches!(decode_chunk_bytes("%%%"), Err(ProtocolError::Malformed(_))));
}
