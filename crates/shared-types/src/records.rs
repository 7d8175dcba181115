//! # Persisted Result Records
//!
//! Row shapes written to the time-series store. Every task-scoped record
//! carries a [`TaskRecordBase`]; host statistics are keyed by sensor only.
//!
//! ## Record Families
//!
//! | Family | Records |
//! |--------|---------|
//! | DNS | [`DnsResultRecord`], one [`DnsAnswerRecord`] per A answer |
//! | ICMP | one [`IcmpResultRecord`] per probed address |
//! | HTTP | [`HttpResultRecord`] |
//! | Traceroute | [`TracerouteResultRecord`], one [`TracerouteHopRecord`] per hop |
//! | Host | [`HostRuntimeStat`], [`HostNetworkStat`] + [`NetworkInterfaceStat`] children |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{SensorId, TaskId};
use crate::envelope::{HostTelemetry, NetworkTelemetry};
use crate::errors::DecodeError;
use crate::probes::{
    DnsAnswerA, DnsResult, HttpResult, IcmpIpResult, TracerouteHop, TracerouteResult, HTTP_TASK,
};

const NANOS_PER_MILLI: i64 = 1_000_000;

/// Columns shared by every task-scoped record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecordBase {
    pub time: DateTime<Utc>,
    pub sensor_id: SensorId,
    pub task_id: TaskId,
}

impl TaskRecordBase {
    #[must_use]
    pub fn new(time: DateTime<Utc>, sensor_id: SensorId, task_id: TaskId) -> Self {
        Self {
            time,
            sensor_id,
            task_id,
        }
    }
}

/// Summary row of a DNS lookup. Round trips are stored in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsResultRecord {
    pub base: TaskRecordBase,
    pub query_rtt_ms: i64,
    pub socket_rtt_ms: i64,
    pub resp_size: i64,
    pub proto: i32,
}

impl DnsResultRecord {
    #[must_use]
    pub fn from_probe(base: TaskRecordBase, dns: &DnsResult) -> Self {
        Self {
            base,
            query_rtt_ms: dns.query_rtt / NANOS_PER_MILLI,
            socket_rtt_ms: dns.sock_rtt / NANOS_PER_MILLI,
            resp_size: dns.resp_size,
            proto: dns.proto,
        }
    }
}

/// One A answer of a DNS lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsAnswerRecord {
    pub base: TaskRecordBase,
    pub hdr_name: String,
    pub hdr_rrtype: u16,
    pub hdr_class: u16,
    pub hdr_ttl: u32,
    pub hdr_rdlength: u16,
    pub a: String,
}

impl DnsAnswerRecord {
    #[must_use]
    pub fn from_answer(base: TaskRecordBase, answer: &DnsAnswerA) -> Self {
        Self {
            base,
            hdr_name: answer.hdr.name.clone(),
            hdr_rrtype: answer.hdr.rrtype,
            hdr_class: answer.hdr.class,
            hdr_ttl: answer.hdr.ttl,
            hdr_rdlength: answer.hdr.rdlength,
            a: answer.a.clone(),
        }
    }
}

/// Ping statistics of one probed address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcmpResultRecord {
    pub base: TaskRecordBase,
    pub ip_addr: String,
    pub packets_sent: i64,
    pub packets_received: i64,
    pub bytes_written: i64,
    pub bytes_read: i64,
    pub total_rtt: i64,
    pub min_rtt: i64,
    pub max_rtt: i64,
    pub average_rtt: i64,
    pub loss: f64,
    /// Failure messages joined with `;`.
    pub failure_messages: String,
}

impl IcmpResultRecord {
    #[must_use]
    pub fn from_probe(base: TaskRecordBase, ip: &IcmpIpResult) -> Self {
        Self {
            base,
            ip_addr: ip.ip_addr.clone(),
            packets_sent: ip.packets_sent,
            packets_received: ip.packets_received,
            bytes_written: ip.bytes_written,
            bytes_read: ip.bytes_read,
            total_rtt: ip.total_rtt,
            min_rtt: ip.min_rtt,
            max_rtt: ip.max_rtt,
            average_rtt: ip.average_rtt,
            loss: ip.loss,
            failure_messages: ip.failure_messages.join(";"),
        }
    }
}

/// Timings and response of an HTTP probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResultRecord {
    pub base: TaskRecordBase,
    pub response_code: i32,
    pub dns_lookup: i64,
    pub tcp_connection: i64,
    pub tls_handshake: i64,
    pub server_processing: i64,
    pub name_lookup: i64,
    pub connect: i64,
    pub pretransfer: i64,
    pub start_transfer: i64,
    pub response_body: String,
    /// Response headers re-encoded as a JSON object.
    pub response_headers: Vec<u8>,
}

impl HttpResultRecord {
    pub fn from_probe(base: TaskRecordBase, http: &HttpResult) -> Result<Self, DecodeError> {
        let response_headers = serde_json::to_vec(&http.response_headers)
            .map_err(|e| DecodeError::payload(HTTP_TASK, e))?;
        Ok(Self {
            base,
            response_code: http.response_code,
            dns_lookup: http.dns_lookup,
            tcp_connection: http.tcp_connection,
            tls_handshake: http.tls_handshake,
            server_processing: http.server_processing,
            name_lookup: http.name_lookup,
            connect: http.connect,
            pretransfer: http.pretransfer,
            start_transfer: http.start_transfer,
            response_body: http.response_body.clone(),
            response_headers,
        })
    }
}

/// Summary row of a traceroute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerouteResultRecord {
    pub base: TaskRecordBase,
    pub destination_address: String,
}

impl TracerouteResultRecord {
    #[must_use]
    pub fn from_probe(base: TaskRecordBase, trace: &TracerouteResult) -> Self {
        Self {
            base,
            destination_address: trace.destination_address.clone(),
        }
    }
}

/// One hop of a traceroute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerouteHopRecord {
    pub base: TaskRecordBase,
    pub success: bool,
    pub address: String,
    pub host: String,
    pub bytes_received: i64,
    pub elapsed_time: i64,
    pub ttl: i32,
    /// Empty when the hop answered.
    pub error: String,
}

impl TracerouteHopRecord {
    #[must_use]
    pub fn from_hop(base: TaskRecordBase, hop: &TracerouteHop) -> Self {
        Self {
            base,
            success: hop.success,
            address: hop.address.clone(),
            host: hop.host.clone(),
            bytes_received: hop.bytes_received,
            elapsed_time: hop.elapsed_time,
            ttl: hop.ttl,
            error: hop.error.clone().unwrap_or_default(),
        }
    }
}

/// Runtime and resource snapshot of a sensor host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRuntimeStat {
    pub time: DateTime<Utc>,
    pub sensor_id: SensorId,
    pub goroutine_count: i64,
    pub cpu_cores: i64,
    pub cpu_usage: f64,
    pub cpu_model_name: String,
    pub mem_total: u64,
    pub mem_used: u64,
    pub mem_free: u64,
    pub mem_used_percent: f64,
}

impl HostRuntimeStat {
    #[must_use]
    pub fn from_telemetry(time: DateTime<Utc>, sensor_id: SensorId, ht: &HostTelemetry) -> Self {
        Self {
            time,
            sensor_id,
            goroutine_count: ht.goroutines,
            cpu_cores: ht.cpu.cores,
            cpu_usage: ht.cpu.usage,
            cpu_model_name: ht.cpu.model_name.clone(),
            mem_total: ht.memory.total,
            mem_used: ht.memory.used,
            mem_free: ht.memory.free,
            mem_used_percent: ht.memory.used_percent,
        }
    }
}

/// Parent row grouping the interface counters of one telemetry report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostNetworkStat {
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub sensor_id: SensorId,
}

impl HostNetworkStat {
    /// A parent row with a fresh id.
    #[must_use]
    pub fn new(time: DateTime<Utc>, sensor_id: SensorId) -> Self {
        Self {
            id: Uuid::new_v4(),
            time,
            sensor_id,
        }
    }
}

/// Counters of one network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceStat {
    /// Id of the owning [`HostNetworkStat`].
    pub network_stat_id: Uuid,
    pub interface_name: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

impl NetworkInterfaceStat {
    #[must_use]
    pub fn from_interface(parent: &HostNetworkStat, net: &NetworkTelemetry) -> Self {
        Self {
            network_stat_id: parent.id,
            interface_name: net.name.clone(),
            bytes_sent: net.bytes_sent,
            bytes_recv: net.bytes_recv,
            packets_sent: net.packets_sent,
            packets_recv: net.packets_recv,
        }
    }
}

/// Any record accepted by the result store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum ResultRecord {
    DnsResult(DnsResultRecord),
    DnsAnswer(DnsAnswerRecord),
    Icmp(IcmpResultRecord),
    Http(HttpResultRecord),
    Traceroute(TracerouteResultRecord),
    TracerouteHop(TracerouteHopRecord),
    HostRuntime(HostRuntimeStat),
    HostNetwork(HostNetworkStat),
    NetworkInterface(NetworkInterfaceStat),
}

impl ResultRecord {
    /// Table-like label of the record.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DnsResult(_) => "dns_result",
            Self::DnsAnswer(_) => "dns_answer",
            Self::Icmp(_) => "icmp_result",
            Self::Http(_) => "http_result",
            Self::Traceroute(_) => "traceroute_result",
            Self::TracerouteHop(_) => "traceroute_hop",
            Self::HostRuntime(_) => "host_runtime_stat",
            Self::HostNetwork(_) => "host_network_stat",
            Self::NetworkInterface(_) => "network_interface_stat",
        }
    }

    /// Task the record belongs to, if it is task-scoped.
    #[must_use]
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::DnsResult(r) => Some(r.base.task_id),
            Self::DnsAnswer(r) => Some(r.base.task_id),
            Self::Icmp(r) => Some(r.base.task_id),
            Self::Http(r) => Some(r.base.task_id),
            Self::Traceroute(r) => Some(r.base.task_id),
            Self::TracerouteHop(r) => Some(r.base.task_id),
            Self::HostRuntime(_) | Self::HostNetwork(_) | Self::NetworkInterface(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::DnsRecordHeader;

    fn base() -> TaskRecordBase {
        TaskRecordBase::new(Utc::now(), Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_dns_round_trips_in_milliseconds() {
        let dns = DnsResult {
            query_rtt: 25_000_000,
            sock_rtt: 1_999_999,
            resp_size: 64,
            proto: 17,
            answer_a: vec![],
        };
        let rec = DnsResultRecord::from_probe(base(), &dns);
        assert_eq!(rec.query_rtt_ms, 25);
        assert_eq!(rec.socket_rtt_ms, 1);
    }

    #[test]
    fn test_dns_answer_keeps_rdlength() {
        let answer = DnsAnswerA {
            hdr: DnsRecordHeader {
                name: "example.com.".into(),
                rrtype: 1,
                class: 1,
                ttl: 300,
                rdlength: 4,
            },
            a: "93.184.216.34".into(),
        };
        let rec = DnsAnswerRecord::from_answer(base(), &answer);
        assert_eq!(rec.hdr_rrtype, 1);
        assert_eq!(rec.hdr_rdlength, 4);
    }

    #[test]
    fn test_icmp_failures_joined() {
        let ip = IcmpIpResult {
            ip_addr: "10.0.0.1".into(),
            failure_messages: vec!["timeout".into(), "unreachable".into()],
            ..IcmpIpResult::default()
        };
        let rec = IcmpResultRecord::from_probe(base(), &ip);
        assert_eq!(rec.failure_messages, "timeout;unreachable");
    }

    #[test]
    fn test_http_headers_reencoded_as_json() {
        let mut http = HttpResult::default();
        http.response_headers
            .insert("Content-Type".into(), vec!["text/html".into()]);
        let rec = HttpResultRecord::from_probe(base(), &http).unwrap();
        let headers: serde_json::Value = serde_json::from_slice(&rec.response_headers).unwrap();
        assert_eq!(headers["Content-Type"][0], "text/html");
    }

    #[test]
    fn test_interface_references_parent() {
        let parent = HostNetworkStat::new(Utc::now(), Uuid::new_v4());
        let net = NetworkTelemetry {
            name: "eth0".into(),
            ..NetworkTelemetry::default()
        };
        let child = NetworkInterfaceStat::from_interface(&parent, &net);
        assert_eq!(child.network_stat_id, parent.id);
        assert_ne!(child.network_stat_id, parent.sensor_id);
    }

    #[test]
    fn test_record_kind_and_task_scope() {
        let b = base();
        let rec = ResultRecord::Traceroute(TracerouteResultRecord {
            base: b,
            destination_address: "1.1.1.1".into(),
        });
        assert_eq!(rec.kind(), "traceroute_result");
        assert_eq!(rec.task_id(), Some(b.task_id));

        let host = ResultRecord::HostNetwork(HostNetworkStat::new(Utc::now(), Uuid::new_v4()));
        assert_eq!(host.task_id(), None);
    }
}
