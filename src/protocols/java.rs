use std::time::Instant;

use tokio::{io::AsyncWriteExt, net::TcpStream};
use tracing::debug;

use super::{QueryResult, Target, packets::java};
use crate::{
    codec::{DecodeOptions, Values},
    error::{Error, Result},
    net::{ConnectionDeadline, FrameReader},
    processing::parse_status_json,
};

/// Server list ping: handshake, status request, then a ping/pong to measure
/// latency.
pub async fn query_java(
    target: &Target,
    protocol_version: i32,
    deadline: &ConnectionDeadline,
) -> Result<QueryResult> {
    let stream = deadline
        .run(async {
            Ok(TcpStream::connect((target.host.as_str(), target.port)).await?)
        })
        .await?;
    debug!("java: connected to {target}");
    let (read, mut write) = stream.into_split();
    let mut frames = FrameReader::new(read, deadline.clone());

    let handshake = java::HANDSHAKE.encode(
        &Values::new()
            .with("protocol", protocol_version)
            .with("serverAddress", target.host.as_str())
            .with("serverPort", target.port)
            .with("nextState", java::NEXT_STATE_STATUS),
    )?;
    let status_request = java::STATUS_REQUEST.encode(&Values::new())?;
    deadline
        .run(async {
            write.write_all(&handshake).await?;
            write.write_all(&status_request).await?;
            Ok(())
        })
        .await?;

    let frame = frames.next_frame().await?;
    let mut status = java::STATUS_RESPONSE.decode(&frame, &DecodeOptions::new())?;
    let json = status.take_string("jsonResponse")?;
    let mut result = parse_status_json(&json)?;

    let payload: [u8; java::PING_PAYLOAD_LEN] = rand::random();
    let ping = java::PING_REQUEST.encode(&Values::new().with("payload", &payload[..]))?;

    let start = Instant::now();
    deadline
        .run(async { Ok(write.write_all(&ping).await?) })
        .await?;
    let frame = frames.next_frame().await?;
    let latency = start.elapsed();

    let mut pong = java::PING_RESPONSE.decode(
        &frame,
        &DecodeOptions::new().length("payload", java::PING_PAYLOAD_LEN),
    )?;
    if pong.take_bytes("payload")? != payload {
        return Err(Error::PayloadEchoMismatch);
    }

    debug!("java: {target} answered in {latency:?}");
    result.latency = latency;
    Ok(result)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use tokio::{io::AsyncReadExt, net::TcpListener};

    use super::*;
    use crate::{
        codec::varint::{read_varint, write_varint},
        protocols::{Protocol, ServerKind},
    };

    pub(crate) const STATUS_JSON: &str = r#"{"version":{"name":"Paper 1.20.4","protocol":765},"players":{"max":100,"online":2,"sample":[{"name":"alice","id":"00000000-0000-4000-8000-000000000001"},{"name":"bob","id":"00000000-0000-4000-8000-000000000002"}]},"description":{"text":"§aHello ","extra":[{"text":"world"}]}}"#;

    async fn read_frame(stream: &mut TcpStream, pending: &mut Vec<u8>) -> Vec<u8> {
        loop {
            if let Ok((len, len_len)) = read_varint(pending) {
                let total = len as usize + len_len;
                if pending.len() >= total {
                    return pending.drain(..total).collect();
                }
            }
            let mut buf = [0; 1024];
            let n = stream.read(&mut buf).await.unwrap();
            assert_ne!(n, 0, "client closed early");
            pending.extend_from_slice(&buf[..n]);
        }
    }

    #[derive(Clone, Copy)]
    pub(crate) enum Pong {
        Echo,
        Corrupt,
    }

    /// A tiny status server. Writes the status response one byte at a time to
    /// make sure the client reassembles it.
    pub(crate) async fn spawn_java_server(json: &'static str, pong: Pong) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut pending = Vec::new();

            let handshake = read_frame(&mut stream, &mut pending).await;
            assert_eq!(handshake[1], 0x00);
            let request = read_frame(&mut stream, &mut pending).await;
            assert_eq!(request, vec![0x01, 0x00]);

            let mut body = vec![0x00];
            write_varint(&mut body, json.len() as i32);
            body.extend_from_slice(json.as_bytes());
            let mut response = Vec::new();
            write_varint(&mut response, body.len() as i32);
            response.extend_from_slice(&body);
            for byte in response {
                stream.write_all(&[byte]).await.unwrap();
                stream.flush().await.unwrap();
            }

            let mut ping = read_frame(&mut stream, &mut pending).await;
            if let Pong::Corrupt = pong {
                let last = ping.len() - 1;
                ping[last] ^= 0xff;
            }
            stream.write_all(&ping).await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });
        port
    }

    #[tokio::test]
    async fn test_query_java() {
        let port = spawn_java_server(STATUS_JSON, Pong::Echo).await;
        let deadline = ConnectionDeadline::new(Duration::from_secs(5));

        let result = query_java(&Target::new("127.0.0.1", port), 762, &deadline)
            .await
            .unwrap();
        assert_eq!(result.kind, ServerKind::Java);
        assert_eq!(result.motd.as_deref(), Some("§aHello world"));
        assert_eq!(result.version.as_deref(), Some("Paper 1.20.4"));
        assert_eq!(result.players.online, Some(2));
        assert_eq!(result.players.max, Some(100));
        assert_eq!(
            result.players.list,
            Some(vec!["alice".to_string(), "bob".to_string()])
        );
        assert_eq!(result.debug.protocol, Protocol::Java);
        assert_eq!(result.debug.protocol_version, Some(765));
    }

    #[tokio::test]
    async fn test_corrupt_pong() {
        let port = spawn_java_server(STATUS_JSON, Pong::Corrupt).await;
        let deadline = ConnectionDeadline::new(Duration::from_secs(5));

        assert!(matches!(
            query_java(&Target::new("127.0.0.1", port), 762, &deadline).await,
            Err(Error::PayloadEchoMismatch)
        ));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let deadline = ConnectionDeadline::new(Duration::from_millis(300));
        assert!(matches!(
            query_java(&Target::new("127.0.0.1", port), 762, &deadline).await,
            Err(Error::ConnectionTimeout)
        ));
    }
}
