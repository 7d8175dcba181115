//! # Probe Result Payloads
//!
//! Kind-specific payloads carried in the `result` field of a task result
//! envelope. Durations are reported by sensors as integer nanoseconds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Task name of DNS probes.
pub const DNS_TASK: &str = "dns";
/// Task name of ICMP probes.
pub const ICMP_TASK: &str = "icmp";
/// Task name of HTTP probes.
pub const HTTP_TASK: &str = "http";
/// Task name of traceroute probes.
pub const TRACEROUTE_TASK: &str = "traceroute";

// =============================================================================
// DNS
// =============================================================================

/// Resource record header of a DNS answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsRecordHeader {
    pub name: String,
    pub rrtype: u16,
    pub class: u16,
    pub ttl: u32,
    pub rdlength: u16,
}

/// A single A record answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsAnswerA {
    pub hdr: DnsRecordHeader,
    /// IPv4 address in dotted notation.
    pub a: String,
}

/// Outcome of a DNS lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsResult {
    /// Query round trip, nanoseconds.
    pub query_rtt: i64,
    /// Socket round trip, nanoseconds.
    pub sock_rtt: i64,
    pub resp_size: i64,
    /// Transport protocol number; zero means no lookup happened.
    pub proto: i32,
    pub answer_a: Vec<DnsAnswerA>,
}

impl DnsResult {
    /// Whether a lookup actually took place.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.proto != 0
    }
}

// =============================================================================
// ICMP
// =============================================================================

/// Ping statistics for one resolved address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcmpIpResult {
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
    pub failure_messages: Vec<String>,
}

/// Outcome of an ICMP probe.
///
/// When the target was a host name the probe also carries the name
/// resolution it performed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcmpResult {
    pub result_per_ip: Vec<IcmpIpResult>,
    pub dns_result: DnsResult,
}

// =============================================================================
// HTTP
// =============================================================================

/// Outcome of an HTTP probe. Timings are nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpResult {
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
    pub response_headers: BTreeMap<String, Vec<String>>,
}

// =============================================================================
// TRACEROUTE
// =============================================================================

/// One hop of a traceroute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerouteHop {
    pub success: bool,
    pub address: String,
    pub host: String,
    pub bytes_received: i64,
    /// Nanoseconds.
    pub elapsed_time: i64,
    pub ttl: i32,
    pub error: Option<String>,
}

/// Outcome of a traceroute probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerouteResult {
    pub destination_address: String,
    pub hops: Vec<TracerouteHop>,
}
