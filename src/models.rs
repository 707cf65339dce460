// Domain models for the traffic and anomaly endpoints

use serde::{Deserialize, Serialize};

/// One traffic measurement. Only `timestamp` and `bytes` are required on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packets: Option<u64>,
}

impl Sample {
    pub fn new(timestamp: i64, bytes: u64) -> Self {
        Self {
            timestamp,
            bytes,
            source_ip: None,
            destination_ip: None,
            protocol: None,
            port: None,
            packets: None,
        }
    }
}

/// Anomaly severity; serializes upper case (e.g. "HIGH").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    TrafficSpike,
    UnusualPort,
    UnusualProtocol,
    PotentialPortScan,
    #[serde(rename = "POTENTIAL_DDoS")]
    PotentialDdos,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyEvent {
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub severity: Severity,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<AnomalyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_ip: Option<String>,
}

impl AnomalyEvent {
    pub fn new(timestamp: i64, severity: Severity) -> Self {
        Self {
            timestamp,
            severity,
            type_: None,
            description: None,
            affected_ip: None,
        }
    }
}

/// Which entity schema a resource's endpoint returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Traffic,
    Anomalies,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Traffic => "traffic",
            ResourceKind::Anomalies => "anomalies",
        }
    }
}
