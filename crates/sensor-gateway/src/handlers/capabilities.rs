//! Task capability table.
//!
//! A capability knows how to turn the raw result payload of one task type
//! into persisted records. The built-in set covers `dns`, `icmp`, `http` and
//! `traceroute`; new task types are added with [`TaskCapabilities::register`]
//! without touching the result handler.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use shared_types::probes::{
    DnsResult, HttpResult, IcmpResult, TracerouteResult, DNS_TASK, HTTP_TASK, ICMP_TASK,
    TRACEROUTE_TASK,
};
use shared_types::{
    DecodeError, DnsAnswerRecord, DnsResultRecord, HttpResultRecord, IcmpResultRecord,
    ResultRecord, TaskRecordBase, TracerouteHopRecord, TracerouteResultRecord,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::error::StoreError;
use crate::ports::ResultStore;

/// Decoding and persistence for one task type.
#[async_trait]
pub trait TaskCapability: Send + Sync {
    /// Task name as it appears in result envelopes.
    fn task_name(&self) -> &str;

    /// Decode the raw result payload into records, in insertion order.
    fn decode(&self, base: TaskRecordBase, raw: &[u8]) -> Result<Vec<ResultRecord>, DecodeError>;

    /// Insert the records in order, stopping at the first failure.
    ///
    /// Earlier inserts are not rolled back. Returns the number inserted.
    async fn persist(
        &self,
        store: &dyn ResultStore,
        records: Vec<ResultRecord>,
    ) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for record in records {
            store.insert(record).await?;
            inserted += 1;
        }
        Ok(inserted)
    }
}

fn parse<T: DeserializeOwned>(task_name: &str, raw: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(raw).map_err(|e| DecodeError::payload(task_name, e))
}

fn dns_records(base: TaskRecordBase, dns: &DnsResult) -> Vec<ResultRecord> {
    let mut records = Vec::with_capacity(1 + dns.answer_a.len());
    records.push(ResultRecord::DnsResult(DnsResultRecord::from_probe(base, dns)));
    records.extend(
        dns.answer_a
            .iter()
            .map(|answer| ResultRecord::DnsAnswer(DnsAnswerRecord::from_answer(base, answer))),
    );
    records
}

/// `dns`: one lookup record followed by its A answers.
#[derive(Debug, Default)]
pub struct DnsCapability;

impl TaskCapability for DnsCapability {
    fn task_name(&self) -> &str {
        DNS_TASK
    }

    fn decode(&self, base: TaskRecordBase, raw: &[u8]) -> Result<Vec<ResultRecord>, DecodeError> {
        let dns: DnsResult = parse(DNS_TASK, raw)?;
        Ok(dns_records(base, &dns))
    }
}

/// `icmp`: the name resolution (if one happened), then one record per address.
#[derive(Debug, Default)]
pub struct IcmpCapability;

impl TaskCapability for IcmpCapability {
    fn task_name(&self) -> &str {
        ICMP_TASK
    }

    fn decode(&self, base: TaskRecordBase, raw: &[u8]) -> Result<Vec<ResultRecord>, DecodeError> {
        let icmp: IcmpResult = parse(ICMP_TASK, raw)?;
        let mut records = if icmp.dns_result.is_present() {
            dns_records(base, &icmp.dns_result)
        } else {
            Vec::new()
        };
        records.extend(
            icmp.result_per_ip
                .iter()
                .map(|ip| ResultRecord::Icmp(IcmpResultRecord::from_probe(base, ip))),
        );
        Ok(records)
    }
}

/// `http`: a single record with timings, body and headers.
#[derive(Debug, Default)]
pub struct HttpCapability;

impl TaskCapability for HttpCapability {
    fn task_name(&self) -> &str {
        HTTP_TASK
    }

    fn decode(&self, base: TaskRecordBase, raw: &[u8]) -> Result<Vec<ResultRecord>, DecodeError> {
        let http: HttpResult = parse(HTTP_TASK, raw)?;
        Ok(vec![ResultRecord::Http(HttpResultRecord::from_probe(
            base, &http,
        )?)])
    }
}

/// `traceroute`: a summary record followed by every hop.
#[derive(Debug, Default)]
pub struct TracerouteCapability;

impl TaskCapability for TracerouteCapability {
    fn task_name(&self) -> &str {
        TRACEROUTE_TASK
    }

    fn decode(&self, base: TaskRecordBase, raw: &[u8]) -> Result<Vec<ResultRecord>, DecodeError> {
        let trace: TracerouteResult = parse(TRACEROUTE_TASK, raw)?;
        let mut records = Vec::with_capacity(1 + trace.hops.len());
        records.push(ResultRecord::Traceroute(TracerouteResultRecord::from_probe(
            base, &trace,
        )));
        records.extend(
            trace
                .hops
                .iter()
                .map(|hop| ResultRecord::TracerouteHop(TracerouteHopRecord::from_hop(base, hop))),
        );
        Ok(records)
    }
}

/// Registered capabilities keyed by task name.
#[derive(Clone)]
pub struct TaskCapabilities {
    by_name: HashMap<String, Arc<dyn TaskCapability>>,
}

impl TaskCapabilities {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
        }
    }

    /// The built-in task types.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.register(Arc::new(DnsCapability));
        table.register(Arc::new(IcmpCapability));
        table.register(Arc::new(HttpCapability));
        table.register(Arc::new(TracerouteCapability));
        table
    }

    /// Add or replace the capability for its task name.
    pub fn register(&mut self, capability: Arc<dyn TaskCapability>) {
        self.by_name
            .insert(capability.task_name().to_string(), capability);
    }

    pub fn get(&self, task_name: &str) -> Option<Arc<dyn TaskCapability>> {
        self.by_name.get(task_name).cloned()
    }

    /// Registered task names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for TaskCapabilities {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for TaskCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCapabilities")
            .field("task_names", &self.names())
            .finish()
    }
}
