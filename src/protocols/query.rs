use std::{collections::HashMap, time::Instant};

use tracing::{debug, trace};

use super::{Protocol, QueryResult, ServerKind, Target, packets::query};
use crate::{
    codec::{DecodeOptions, Values},
    error::{Error, Result},
    net::{ConnectionDeadline, UdpResender, connect_udp},
};

/// Keys a full stat info section must contain.
const FULL_STAT_KEYS: &[&str] = &[
    "hostname",
    "gametype",
    "map",
    "numplayers",
    "maxplayers",
    "hostport",
    "hostip",
    "game_id",
    "version",
    "plugins",
    "whitelist",
];

/// Stat query: handshake for a challenge token, then ask for stats with it.
pub async fn query_query(
    target: &Target,
    full_stat: bool,
    deadline: &ConnectionDeadline,
) -> Result<QueryResult> {
    let socket = connect_udp(&target.host, target.port, deadline).await?;
    let resender = UdpResender::new(socket, deadline.clone());

    let session_id = (rand::random::<u32>() & query::SESSION_ID_MASK) as i32;
    debug!("query: handshaking with {target} (session {session_id:#010x})");

    let handshake = query::HANDSHAKE_REQUEST.encode(&Values::new().with("sessionID", session_id))?;
    let start = Instant::now();
    let reply = resender
        .send_until_receive_matching(&handshake, is_type(query::HANDSHAKE_TYPE))
        .await?;
    let latency = start.elapsed();

    let mut reply = query::HANDSHAKE_RESPONSE.decode(&reply, &DecodeOptions::new())?;
    check_session(&reply, session_id)?;
    let challenge = parse_challenge(&reply.take_string("challenge")?)?;
    trace!("query: {target} gave challenge {challenge}");

    let values = Values::new()
        .with("sessionID", session_id)
        .with("challenge", challenge);
    let request = if full_stat {
        query::FULL_STAT_REQUEST.encode(&values.with("padding", 0i32))?
    } else {
        query::BASIC_STAT_REQUEST.encode(&values)?
    };
    // a late answer to a resent handshake can still be queued
    let response = resender
        .send_until_receive_matching(&request, is_type(query::STAT_TYPE))
        .await?;

    let mut result = parse_stat_response(&response, session_id)?;
    result.latency = latency;
    debug!("query: {target} answered in {latency:?}");
    Ok(result)
}

fn is_type(packet_type: u8) -> impl Fn(&[u8]) -> bool {
    move |datagram| datagram.first() == Some(&packet_type)
}

fn check_session(values: &Values, session_id: i32) -> Result<()> {
    let received = values.int("sessionID")?;
    if received != session_id as i64 {
        return Err(Error::malformed(
            "sessionID",
            format!("expected {session_id:#010x}, got {received:#010x}"),
        ));
    }
    Ok(())
}

/// The challenge is sent as decimal text. Servers print it as a signed number
/// but some print the unsigned form, so it's wrapped into an i32 either way.
fn parse_challenge(challenge: &str) -> Result<i32> {
    challenge
        .trim()
        .parse::<i64>()
        .map(|c| c as i32)
        .map_err(|e| Error::malformed("challenge", format!("{challenge:?}: {e}")))
}

/// Servers answer the basic request with either layout. Only a reply that
/// doesn't decode as basic stat is tried as full stat, so a bad session id or
/// count in a basic reply is reported as is.
pub fn parse_stat_response(response: &[u8], session_id: i32) -> Result<QueryResult> {
    let options = DecodeOptions::new();
    match query::BASIC_STAT_RESPONSE.decode(response, &options) {
        Ok(stat) => basic_stat(stat, session_id),
        Err(basic_err) => {
            trace!("query: not a basic stat response ({basic_err}), trying full stat");
            let stat = query::FULL_STAT_RESPONSE.decode(response, &options)?;
            full_stat(stat, session_id)
        }
    }
}

fn basic_stat(mut stat: Values, session_id: i32) -> Result<QueryResult> {
    check_session(&stat, session_id)?;

    let mut result = QueryResult::new(Protocol::Query, ServerKind::Unknown);
    result.players.online = Some(parse_count("online", &stat.take_string("online")?)?);
    result.players.max = Some(parse_count("max", &stat.take_string("max")?)?);
    result.motd = Some(stat.take_string("motd")?);
    Ok(result)
}

fn full_stat(mut stat: Values, session_id: i32) -> Result<QueryResult> {
    check_session(&stat, session_id)?;

    let mut info = pairs_to_map(stat.take_strings("info")?)?;
    for key in FULL_STAT_KEYS {
        if !info.contains_key(*key) {
            return Err(Error::MissingField(*key));
        }
    }
    let mut take = |key: &str| info.remove(key).unwrap_or_default();

    let mut result = QueryResult::new(Protocol::Query, server_kind(&take("game_id")));
    result.players.online = Some(parse_count("numplayers", &take("numplayers"))?);
    result.players.max = Some(parse_count("maxplayers", &take("maxplayers"))?);
    result.players.list = Some(stat.take_strings("players")?);
    result.motd = Some(take("hostname"));
    result.version = Some(take("version"));
    Ok(result)
}

/// `[k1, v1, k2, v2, ...]` into a map. Later duplicates win.
fn pairs_to_map(entries: Vec<String>) -> Result<HashMap<String, String>> {
    if entries.len() % 2 != 0 {
        return Err(Error::malformed(
            "info",
            format!("odd number of entries ({})", entries.len()),
        ));
    }
    let mut map = HashMap::with_capacity(entries.len() / 2);
    let mut entries = entries.into_iter();
    while let (Some(key), Some(value)) = (entries.next(), entries.next()) {
        map.insert(key, value);
    }
    Ok(map)
}

fn parse_count(field: &'static str, s: &str) -> Result<i64> {
    match s.trim().parse::<i64>() {
        Ok(n) if n >= 0 => Ok(n),
        Ok(n) => Err(Error::malformed(field, format!("negative count {n}"))),
        Err(e) => Err(Error::malformed(field, format!("{s:?}: {e}"))),
    }
}

pub fn server_kind(game_id: &str) -> ServerKind {
    match game_id {
        "MINECRAFT" => ServerKind::Java,
        "MINECRAFTPE" => ServerKind::Bedrock,
        _ => ServerKind::Unknown,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use tokio::net::UdpSocket;

    use super::*;

    const CHALLENGE: i32 = 9513307;

    #[derive(Clone, Copy)]
    pub(crate) enum Reply {
        Basic,
        Full,
        /// Sends another handshake reply ahead of the basic stat, like a
        /// server answering a resent handshake late.
        BasicAfterHandshake,
    }

    fn handshake_response(session_id: i32) -> Vec<u8> {
        let mut out = vec![query::HANDSHAKE_TYPE];
        out.extend_from_slice(&session_id.to_be_bytes());
        out.extend_from_slice(format!("{CHALLENGE}\0").as_bytes());
        out
    }

    pub(crate) fn basic_response(session_id: i32) -> Vec<u8> {
        let mut out = vec![query::STAT_TYPE];
        out.extend_from_slice(&session_id.to_be_bytes());
        out.extend_from_slice(b"A Minecraft Server\0SMP\0world\0\x32\0\x32\x30\0");
        out.extend_from_slice(&25565u16.to_le_bytes());
        out.extend_from_slice(b"127.0.0.1\0");
        out
    }

    pub(crate) fn full_response(session_id: i32, game_id: &str) -> Vec<u8> {
        let mut out = vec![query::STAT_TYPE];
        out.extend_from_slice(&session_id.to_be_bytes());
        out.extend_from_slice(query::SPLITNUM);
        for entry in [
            "hostname",
            "A Minecraft Server",
            "gametype",
            "SMP",
            "game_id",
            game_id,
            "version",
            "1.20.4",
            "plugins",
            "",
            "map",
            "world",
            "numplayers",
            "2",
            "maxplayers",
            "20",
            "hostport",
            "25565",
            "hostip",
            "127.0.0.1",
            "whitelist",
            "off",
        ] {
            out.extend_from_slice(entry.as_bytes());
            out.push(0);
        }
        out.push(0);
        out.extend_from_slice(query::PLAYERS_);
        out.extend_from_slice(b"alice\0bob\0\0");
        out
    }

    /// Answers handshakes and stat requests like a vanilla server would.
    pub(crate) async fn spawn_query_server(reply: Reply) -> u16 {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0; 2048];
            loop {
                let (n, from) = socket.recv_from(&mut buf).await.unwrap();
                assert_eq!(&buf[..2], query::QUERY_MAGIC);
                let session_id = i32::from_be_bytes(buf[3..7].try_into().unwrap());
                let responses = match buf[2] {
                    query::HANDSHAKE_TYPE => {
                        assert_eq!(n, 7);
                        vec![handshake_response(session_id)]
                    }
                    query::STAT_TYPE => {
                        let challenge = i32::from_be_bytes(buf[7..11].try_into().unwrap());
                        assert_eq!(challenge, CHALLENGE);
                        match reply {
                            Reply::Basic => vec![basic_response(session_id)],
                            Reply::Full => vec![full_response(session_id, "MINECRAFT")],
                            Reply::BasicAfterHandshake => vec![
                                handshake_response(session_id),
                                basic_response(session_id),
                            ],
                        }
                    }
                    other => panic!("unexpected packet type {other}"),
                };
                for response in responses {
                    socket.send_to(&response, from).await.unwrap();
                }
            }
        });
        port
    }

    #[test]
    fn test_parse_basic() {
        let r = parse_stat_response(&basic_response(7), 7).unwrap();
        assert_eq!(r.motd.as_deref(), Some("A Minecraft Server"));
        assert_eq!(r.players.online, Some(2));
        assert_eq!(r.players.max, Some(20));
        assert_eq!(r.players.list, None);
        assert_eq!(r.kind, ServerKind::Unknown);
    }

    #[test]
    fn test_parse_full() {
        let r = parse_stat_response(&full_response(7, "MINECRAFT"), 7).unwrap();
        assert_eq!(r.motd.as_deref(), Some("A Minecraft Server"));
        assert_eq!(r.version.as_deref(), Some("1.20.4"));
        assert_eq!(r.players.online, Some(2));
        assert_eq!(r.players.max, Some(20));
        assert_eq!(
            r.players.list,
            Some(vec!["alice".to_string(), "bob".to_string()])
        );
        assert_eq!(r.kind, ServerKind::Java);

        let r = parse_stat_response(&full_response(7, "MINECRAFTPE"), 7).unwrap();
        assert_eq!(r.kind, ServerKind::Bedrock);
        let r = parse_stat_response(&full_response(7, "SOMETHINGELSE"), 7).unwrap();
        assert_eq!(r.kind, ServerKind::Unknown);
    }

    #[test]
    fn test_full_stat_bad_padding() {
        let mut response = full_response(7, "MINECRAFT");
        // first byte of `splitnum`
        response[5] = b'S';
        assert!(matches!(
            parse_stat_response(&response, 7),
            Err(Error::MagicMismatch("padding1"))
        ));
    }

    #[test]
    fn test_full_stat_missing_key() {
        let mut out = vec![query::STAT_TYPE, 0, 0, 0, 7];
        out.extend_from_slice(query::SPLITNUM);
        out.extend_from_slice(b"hostname\0x\0\0");
        out.extend_from_slice(query::PLAYERS_);
        out.push(0);
        assert!(matches!(
            parse_stat_response(&out, 7),
            Err(Error::MissingField("gametype"))
        ));
    }

    #[test]
    fn test_odd_info_entries() {
        assert!(pairs_to_map(vec!["a".into(), "b".into(), "c".into()]).is_err());
        let map = pairs_to_map(vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(map.get("a").map(String::as_str), Some("b"));
    }

    #[test]
    fn test_counts() {
        assert_eq!(parse_count("n", "12").unwrap(), 12);
        assert!(parse_count("n", "-1").is_err());
        assert!(parse_count("n", "lots").is_err());
    }

    #[test]
    fn test_challenge() {
        assert_eq!(parse_challenge("9513307").unwrap(), 9513307);
        assert_eq!(parse_challenge("-5").unwrap(), -5);
        // unsigned form of -1
        assert_eq!(parse_challenge("4294967295").unwrap(), -1);
        assert!(parse_challenge("abc").is_err());
    }

    #[test]
    fn test_session_mismatch() {
        assert!(matches!(
            parse_stat_response(&basic_response(8), 7),
            Err(Error::MalformedField {
                field: "sessionID",
                ..
            })
        ));
    }

    #[test]
    fn test_basic_bad_count_is_not_retried_as_full() {
        let mut out = vec![query::STAT_TYPE, 0, 0, 0, 7];
        out.extend_from_slice(b"A Minecraft Server\0SMP\0world\0lots\0\x32\x30\0");
        out.extend_from_slice(&25565u16.to_le_bytes());
        out.extend_from_slice(b"127.0.0.1\0");
        assert!(matches!(
            parse_stat_response(&out, 7),
            Err(Error::MalformedField {
                field: "online",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_query_skips_late_handshake_reply() {
        let port = spawn_query_server(Reply::BasicAfterHandshake).await;
        let deadline = ConnectionDeadline::new(Duration::from_secs(5));
        let r = query_query(&Target::new("127.0.0.1", port), false, &deadline)
            .await
            .unwrap();
        assert_eq!(r.players.online, Some(2));
        assert_eq!(r.motd.as_deref(), Some("A Minecraft Server"));
    }

    #[tokio::test]
    async fn test_query_basic() {
        let port = spawn_query_server(Reply::Basic).await;
        let deadline = ConnectionDeadline::new(Duration::from_secs(5));
        let r = query_query(&Target::new("127.0.0.1", port), false, &deadline)
            .await
            .unwrap();
        assert_eq!(r.motd.as_deref(), Some("A Minecraft Server"));
        assert_eq!(r.debug.protocol, Protocol::Query);
    }

    #[tokio::test]
    async fn test_query_full() {
        let port = spawn_query_server(Reply::Full).await;
        let deadline = ConnectionDeadline::new(Duration::from_secs(5));
        let r = query_query(&Target::new("127.0.0.1", port), true, &deadline)
            .await
            .unwrap();
        assert_eq!(r.kind, ServerKind::Java);
        assert_eq!(r.players.list.map(|l| l.len()), Some(2));
    }
}
