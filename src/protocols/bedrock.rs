use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::{Protocol, QueryResult, ServerKind, Target, packets::bedrock};
use crate::{
    codec::{DecodeOptions, Values},
    error::{Error, Result},
    net::{ConnectionDeadline, UdpResender, connect_udp},
};

/// The leading fields of the pong's server id string that we read. Anything
/// after these is ignored.
const SERVER_ID_FIELDS: usize = 8;

pub async fn query_bedrock(target: &Target, deadline: &ConnectionDeadline) -> Result<QueryResult> {
    let socket = connect_udp(&target.host, target.port, deadline).await?;
    debug!("bedrock: sending unconnected ping to {target}");
    let resender = UdpResender::new(socket, deadline.clone());

    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let client_guid: [u8; bedrock::GUID_LEN] = rand::random();
    let ping = bedrock::UNCONNECTED_PING.encode(
        &Values::new()
            .with("time", time)
            .with("clientGUID", &client_guid[..]),
    )?;

    let start = Instant::now();
    let datagram = resender.send_until_receive(&ping).await?;
    let latency = start.elapsed();

    let mut pong = bedrock::UNCONNECTED_PONG.decode(
        &datagram,
        &DecodeOptions::new().length("serverGUID", bedrock::GUID_LEN),
    )?;
    let server_id = pong.take_string("serverID")?;

    let mut result = parse_server_id(&server_id)?;
    result.latency = latency;
    debug!("bedrock: {target} answered in {latency:?}");
    Ok(result)
}

/// Parses `edition;motd line 1;protocol;version;online;max;server id;motd line 2;...`.
pub fn parse_server_id(server_id: &str) -> Result<QueryResult> {
    let fields: Vec<&str> = server_id.split(';').collect();
    if fields.len() < SERVER_ID_FIELDS {
        return Err(Error::malformed(
            "serverID",
            format!(
                "expected at least {SERVER_ID_FIELDS} fields but got {}",
                fields.len()
            ),
        ));
    }

    let number = |i: usize, name: &'static str| -> Result<i64> {
        fields[i]
            .trim()
            .parse::<i64>()
            .map_err(|e| Error::malformed(name, format!("{:?}: {e}", fields[i])))
    };

    let mut result = QueryResult::new(Protocol::Bedrock, ServerKind::Bedrock);
    result.motd = Some(format!("{}\n{}", fields[1], fields[7]));
    result.debug.protocol_version = Some(number(2, "protocol")?);
    result.version = Some(fields[3].to_string());
    result.players.online = Some(number(4, "online")?);
    result.players.max = Some(number(5, "max")?);
    result.debug.protocol_name = Some(fields[0].to_string());
    Ok(result)
}
