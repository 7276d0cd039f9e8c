//! Decides which queriers to run, runs them side by side under one deadline,
//! and folds their answers into a single [`ServerStatus`].

use std::{collections::HashSet, future::Future, io, net::Ipv4Addr, time::Duration};

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    config::{QueryMode, QueryOptions, parse_host},
    dns::{Resolver, SRV_PREFIX, SystemResolver},
    error::{AggregateError, Error, Result},
    net::ConnectionDeadline,
    processing::clean_motd,
    protocols::{
        Players, Protocol, QueryResult, ServerKind, Target, bedrock::query_bedrock,
        java::query_java, packets, query::query_query, serialize_millis,
    },
};

/// One querier pointed at one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTask {
    pub protocol: Protocol,
    pub target: Target,
}

impl QueryTask {
    fn new(protocol: Protocol, host: &str, port: u16) -> Self {
        Self {
            protocol,
            target: Target::new(host, port),
        }
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.protocol, self.target)
    }
}

/// Picks the queriers to run against `host`. An explicit port that belongs
/// to one edition skips inferring the other.
pub fn plan_queries(host: &str, port: Option<u16>, options: &QueryOptions) -> Vec<QueryTask> {
    let java_port = packets::java::DEFAULT_PORT;
    let bedrock_port = packets::bedrock::DEFAULT_PORT;
    let mut tasks = Vec::new();

    let java = match options.query_java {
        QueryMode::Yes => true,
        QueryMode::Infer => port != Some(bedrock_port),
        QueryMode::No => false,
    };
    if java {
        tasks.push(QueryTask::new(
            Protocol::Java,
            host,
            port.unwrap_or(java_port),
        ));
    }

    let bedrock = match options.query_bedrock {
        QueryMode::Yes => true,
        QueryMode::Infer => port != Some(java_port),
        QueryMode::No => false,
    };
    if bedrock {
        tasks.push(QueryTask::new(
            Protocol::Bedrock,
            host,
            port.unwrap_or(bedrock_port),
        ));
    }

    if options.query_query != QueryMode::No {
        match port {
            Some(port) => tasks.push(QueryTask::new(Protocol::Query, host, port)),
            None => {
                // query usually shares the game port, and we don't know which game
                tasks.push(QueryTask::new(Protocol::Query, host, bedrock_port));
                tasks.push(QueryTask::new(Protocol::Query, host, java_port));
            }
        }
    }

    tasks
}

async fn run_task(
    task: QueryTask,
    protocol_version: i32,
    full_stat: bool,
    deadline: ConnectionDeadline,
) -> Result<QueryResult> {
    match task.protocol {
        Protocol::Java => query_java(&task.target, protocol_version, &deadline).await,
        Protocol::Bedrock => query_bedrock(&task.target, &deadline).await,
        Protocol::Query => query_query(&task.target, full_stat, &deadline).await,
    }
}

/// Spawns every future and collects what they settle to. Waiting for all of
/// them gives the results in the order the tasks were passed in, so merging
/// doesn't depend on which querier answered first. With `return_on_first`
/// this returns as soon as anything succeeds and leaves the rest running
/// until the deadline stops them.
pub async fn settle<F>(tasks: Vec<(String, F)>, return_on_first: bool) -> Result<Vec<QueryResult>>
where
    F: Future<Output = Result<QueryResult>> + Send + 'static,
{
    let mut pending: FuturesUnordered<_> = tasks
        .into_iter()
        .enumerate()
        .map(|(index, (label, fut))| {
            let handle = tokio::spawn(fut);
            async move {
                let res = match handle.await {
                    Ok(res) => res,
                    Err(e) => Err(Error::Transport(io::Error::other(e))),
                };
                (index, label, res)
            }
        })
        .collect();

    let mut results = Vec::new();
    let mut errors = Vec::new();
    while let Some((index, label, res)) = pending.next().await {
        match res {
            Ok(result) => {
                debug!("{label} succeeded");
                if return_on_first {
                    return Ok(vec![result]);
                }
                results.push((index, result));
            }
            Err(err) => {
                debug!("{label} failed: {err}");
                errors.push((index, label, err));
            }
        }
    }

    if results.is_empty() {
        errors.sort_by_key(|(index, ..)| *index);
        let errors = errors
            .into_iter()
            .map(|(_, label, err)| (label, err))
            .collect();
        return Err(AggregateError::new(errors).into());
    }
    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, result)| result).collect())
}

/// The merged answer from every querier that succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub hostname: Option<String>,
    pub ip: Ipv4Addr,
    pub kind: ServerKind,
    pub motd: Option<String>,
    pub version: String,
    pub players: Players,
    pub favicon: Option<String>,
    #[serde(serialize_with = "serialize_millis")]
    pub latency: Duration,
    pub debug: StatusDebug,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusDebug {
    /// SRV targets that were queried alongside the resolved address.
    pub srvs: Vec<String>,
    pub java: bool,
    pub bedrock: bool,
    pub query: bool,
    pub protocol_version: Option<i64>,
    pub protocol_name: Option<String>,
}

fn first<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Folds results in the order given. For every field the first value that's
/// present wins, latency is the fastest answer, and two different editions
/// answering makes it crossplay when `coalesce_crossplay` is set.
pub fn merge_results(
    hostname: Option<String>,
    ip: Ipv4Addr,
    results: Vec<QueryResult>,
    coalesce_crossplay: bool,
) -> ServerStatus {
    let mut motd = None;
    let mut version = None;
    let mut players = Players::default();
    let mut favicon = None;
    let mut latency: Option<Duration> = None;
    let mut debug = StatusDebug::default();

    let mut kind = ServerKind::Unknown;
    let mut seen_kinds = HashSet::new();

    for result in results {
        first(&mut motd, result.motd.filter(|m| !m.is_empty()));
        first(&mut version, result.version.filter(|v| !v.is_empty()));
        first(&mut players.online, result.players.online);
        first(&mut players.max, result.players.max);
        first(&mut players.list, result.players.list);
        first(&mut favicon, result.favicon);
        first(&mut debug.protocol_version, result.debug.protocol_version);
        first(&mut debug.protocol_name, result.debug.protocol_name);

        latency = Some(match latency {
            Some(latency) => latency.min(result.latency),
            None => result.latency,
        });

        match result.debug.protocol {
            Protocol::Java => debug.java = true,
            Protocol::Bedrock => debug.bedrock = true,
            Protocol::Query => debug.query = true,
        }

        if result.kind != ServerKind::Unknown {
            if seen_kinds.is_empty() {
                kind = result.kind;
            }
            seen_kinds.insert(result.kind);
            if coalesce_crossplay && seen_kinds.len() > 1 {
                kind = ServerKind::Crossplay;
            }
        }
    }

    ServerStatus {
        hostname,
        ip,
        kind,
        motd,
        version: version.unwrap_or_else(|| "Unknown".to_string()),
        players,
        favicon,
        latency: latency.unwrap_or_default(),
        debug,
    }
}

/// Queries `host` (`name[:port]`) with every selected protocol.
pub async fn query_server(host: &str, options: &QueryOptions) -> Result<ServerStatus> {
    query_server_with(host, options, &SystemResolver::from_resolv_conf()).await
}

pub async fn query_server_with(
    host: &str,
    options: &QueryOptions,
    resolver: &dyn Resolver,
) -> Result<ServerStatus> {
    options.validate()?;
    if options.check_blocked {
        return Err(Error::NotImplemented("check_blocked"));
    }
    let (name, host_port) = parse_host(host)?;
    let port = options.port.or(host_port);

    let deadline = ConnectionDeadline::new(options.timeout());

    let (hostname, ip) = match name.parse::<Ipv4Addr>() {
        Ok(ip) => (None, ip),
        Err(_) => {
            let ips = deadline.run(resolver.resolve_ipv4(&name)).await?;
            let ip = *ips
                .first()
                .ok_or_else(|| Error::Dns(format!("{name} has no IPv4 addresses")))?;
            (Some(name), ip)
        }
    };

    let mut tasks = Vec::new();
    let mut srvs = Vec::new();
    if let Some(hostname) = hostname.as_deref().filter(|_| options.use_srv) {
        for srv in resolver
            .resolve_srv(&format!("{SRV_PREFIX}{hostname}"), &deadline)
            .await
        {
            debug!("following SRV record to {}:{}", srv.target, srv.port);
            tasks.extend(plan_queries(&srv.target, Some(srv.port), options));
            srvs.push(srv.target);
        }
    }
    tasks.extend(plan_queries(&ip.to_string(), port, options));

    if tasks.is_empty() {
        return Err(Error::Configuration(
            "every protocol is disabled, nothing to query".into(),
        ));
    }
    info!("querying {host} with {} queriers", tasks.len());

    let futures = tasks
        .into_iter()
        .map(|task| {
            let label = task.label();
            let fut = run_task(
                task,
                options.protocol_version,
                options.full_stat,
                deadline.clone(),
            );
            (label, fut)
        })
        .collect();
    let results = settle(futures, options.return_on_first).await?;

    let mut status = merge_results(hostname, ip, results, options.coalesce_crossplay);
    status.debug.srvs = srvs;
    if options.clean_motd {
        status.motd = status.motd.map(|motd| clean_motd(&motd));
    }
    Ok(status)
}
