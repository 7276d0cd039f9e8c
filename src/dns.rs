//! Name resolution. A records go through the system resolver, SRV records are
//! looked up with a single hand-built question to the system's nameserver.

use std::{
    fs,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::{
    error::{Error, Result},
    net::{ConnectionDeadline, UdpResender, connect_udp},
};

pub const SRV_PREFIX: &str = "_minecraft._tcp.";

const RESOLV_CONF: &str = "/etc/resolv.conf";
const DNS_PORT: u16 = 53;
const DEFAULT_SRV_TIMEOUT: Duration = Duration::from_secs(3);

const TYPE_SRV: u16 = 33;
const CLASS_IN: u16 = 1;
const FLAG_RESPONSE: u16 = 0x8000;
const FLAG_RECURSION_DESIRED: u16 = 0x0100;
const HEADER_LEN: usize = 12;
/// Compression pointers can point anywhere, this stops loops.
const MAX_POINTER_JUMPS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub target: String,
    pub port: u16,
    pub priority: u16,
    pub weight: u16,
}

#[async_trait]
pub trait Resolver: Send + Sync {
    /// Every IPv4 address for `host`. Errors if there are none.
    async fn resolve_ipv4(&self, host: &str) -> Result<Vec<Ipv4Addr>>;

    /// SRV records for `name`, lowest priority first. Lookup failures give an
    /// empty list.
    async fn resolve_srv(&self, name: &str, deadline: &ConnectionDeadline) -> Vec<SrvRecord>;
}

pub struct SystemResolver {
    nameserver: Option<SocketAddr>,
    srv_timeout: Duration,
}

impl SystemResolver {
    /// Uses the first `nameserver` in `/etc/resolv.conf` for SRV lookups.
    pub fn from_resolv_conf() -> Self {
        let nameserver = fs::read_to_string(RESOLV_CONF)
            .ok()
            .and_then(|conf| first_nameserver(&conf));
        if nameserver.is_none() {
            debug!("no nameserver found in {RESOLV_CONF}, srv lookups are disabled");
        }
        Self {
            nameserver,
            srv_timeout: DEFAULT_SRV_TIMEOUT,
        }
    }

    pub fn with_nameserver(nameserver: SocketAddr) -> Self {
        Self {
            nameserver: Some(nameserver),
            srv_timeout: DEFAULT_SRV_TIMEOUT,
        }
    }

    async fn lookup_srv(
        &self,
        nameserver: SocketAddr,
        name: &str,
        deadline: &ConnectionDeadline,
    ) -> Result<Vec<SrvRecord>> {
        // a nameserver that never answers shouldn't eat the whole query timeout
        let srv_deadline = ConnectionDeadline::new(self.srv_timeout.min(deadline.timeout()));
        deadline.on_expire({
            let srv_deadline = srv_deadline.clone();
            move || srv_deadline.expire()
        });

        let socket =
            connect_udp(&nameserver.ip().to_string(), nameserver.port(), &srv_deadline).await?;
        let id: u16 = rand::random();
        let question = build_srv_query(id, name)?;
        trace!("dns: asking {nameserver} for SRV {name}");
        let reply = UdpResender::new(socket, srv_deadline)
            .send_until_receive(&question)
            .await?;
        parse_srv_response(&reply, id)
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::from_resolv_conf()
    }
}

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve_ipv4(&self, host: &str) -> Result<Vec<Ipv4Addr>> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(vec![ip]);
        }
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| Error::Dns(format!("{host}: {e}")))?;
        let ips: Vec<Ipv4Addr> = addrs
            .filter_map(|addr| match addr.ip() {
                IpAddr::V4(ip) => Some(ip),
                IpAddr::V6(_) => None,
            })
            .collect();
        if ips.is_empty() {
            return Err(Error::Dns(format!("{host} has no IPv4 addresses")));
        }
        Ok(ips)
    }

    async fn resolve_srv(&self, name: &str, deadline: &ConnectionDeadline) -> Vec<SrvRecord> {
        let Some(nameserver) = self.nameserver else {
            return Vec::new();
        };
        match self.lookup_srv(nameserver, name, deadline).await {
            Ok(records) => records,
            Err(err) => {
                debug!("dns: SRV lookup for {name} failed: {err}");
                Vec::new()
            }
        }
    }
}

fn first_nameserver(conf: &str) -> Option<SocketAddr> {
    conf.lines()
        .filter_map(|line| line.trim().strip_prefix("nameserver"))
        .filter_map(|rest| rest.trim().parse::<IpAddr>().ok())
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .next()
}

pub fn build_srv_query(id: u16, name: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(HEADER_LEN + name.len() + 6);
    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(&FLAG_RECURSION_DESIRED.to_be_bytes());
    // one question, no answer/authority/additional records
    for count in [1u16, 0, 0, 0] {
        out.extend_from_slice(&count.to_be_bytes());
    }
    write_name(&mut out, name)?;
    out.extend_from_slice(&TYPE_SRV.to_be_bytes());
    out.extend_from_slice(&CLASS_IN.to_be_bytes());
    Ok(out)
}

fn write_name(out: &mut Vec<u8>, name: &str) -> Result<()> {
    for label in name.trim_end_matches('.').split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(Error::Dns(format!("can't encode {name:?} as a dns name")));
        }
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
    Ok(())
}

struct MessageReader<'a> {
    message: &'a [u8],
    pos: usize,
}

impl<'a> MessageReader<'a> {
    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self
            .message
            .get(self.pos..self.pos + len)
            .ok_or_else(|| Error::Dns("response ended early".into()))?;
        self.pos += len;
        Ok(bytes)
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.bytes(len).map(|_| ())
    }

    /// Reads a possibly compressed name, leaving the reader after it.
    fn name(&mut self) -> Result<String> {
        let mut labels: Vec<String> = Vec::new();
        let mut pos = self.pos;
        let mut resume_at = None;
        let mut jumps = 0;
        loop {
            let len = *self
                .message
                .get(pos)
                .ok_or_else(|| Error::Dns("name ended early".into()))?
                as usize;
            match len {
                0 => {
                    pos += 1;
                    break;
                }
                l if l & 0xc0 == 0xc0 => {
                    let low = *self
                        .message
                        .get(pos + 1)
                        .ok_or_else(|| Error::Dns("pointer ended early".into()))?
                        as usize;
                    jumps += 1;
                    if jumps > MAX_POINTER_JUMPS {
                        return Err(Error::Dns("too many compression pointers".into()));
                    }
                    resume_at.get_or_insert(pos + 2);
                    pos = ((l & 0x3f) << 8) | low;
                }
                l => {
                    let label = self
                        .message
                        .get(pos + 1..pos + 1 + l)
                        .ok_or_else(|| Error::Dns("label ended early".into()))?;
                    labels.push(String::from_utf8_lossy(label).into_owned());
                    pos += 1 + l;
                }
            }
        }
        self.pos = resume_at.unwrap_or(pos);
        Ok(labels.join("."))
    }
}

pub fn parse_srv_response(message: &[u8], expected_id: u16) -> Result<Vec<SrvRecord>> {
    let mut reader = MessageReader { message, pos: 0 };
    let id = reader.u16()?;
    if id != expected_id {
        return Err(Error::Dns(format!(
            "response id {id:#06x} doesn't match {expected_id:#06x}"
        )));
    }
    let flags = reader.u16()?;
    if flags & FLAG_RESPONSE == 0 {
        return Err(Error::Dns("got a query instead of a response".into()));
    }
    let rcode = flags & 0x000f;
    if rcode != 0 {
        // NXDOMAIN and friends just mean there aren't any records
        trace!("dns: response code {rcode}");
        return Ok(Vec::new());
    }
    let questions = reader.u16()?;
    let answers = reader.u16()?;
    reader.skip(4)?;

    for _ in 0..questions {
        reader.name()?;
        reader.skip(4)?;
    }

    let mut records = Vec::new();
    for _ in 0..answers {
        reader.name()?;
        let record_type = reader.u16()?;
        let class = reader.u16()?;
        reader.skip(4)?;
        let rdlength = reader.u16()? as usize;
        let rdata_end = reader.pos + rdlength;
        if record_type == TYPE_SRV && class == CLASS_IN {
            let priority = reader.u16()?;
            let weight = reader.u16()?;
            let port = reader.u16()?;
            let target = reader.name()?;
            records.push(SrvRecord {
                target,
                port,
                priority,
                weight,
            });
        }
        reader.pos = rdata_end;
    }

    records.sort_by_key(|r| r.priority);
    Ok(records)
}
