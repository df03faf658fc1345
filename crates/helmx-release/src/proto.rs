//! Helm 2 (`hapi`) release messages
//!
//! Field tags match `hapi/release/*.proto` and `hapi/chart/*.proto`, so records written here
//! are read by Tiller and `helm` 2 unchanged. Fields helm-x never sets are left out; prost
//! skips unknown tags when decoding records written by Tiller.

use prost_types::Timestamp;

#[derive(Clone, PartialEq, prost::Message)]
pub struct Release {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub info: Option<Info>,
    #[prost(message, optional, tag = "3")]
    pub chart: Option<Chart>,
    #[prost(message, optional, tag = "4")]
    pub config: Option<Config>,
    #[prost(string, tag = "5")]
    pub manifest: String,
    #[prost(message, repeated, tag = "6")]
    pub hooks: Vec<Hook>,
    #[prost(int32, tag = "7")]
    pub version: i32,
    #[prost(string, tag = "8")]
    pub namespace: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Info {
    #[prost(message, optional, tag = "1")]
    pub status: Option<Status>,
    #[prost(message, optional, tag = "2")]
    pub first_deployed: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub last_deployed: Option<Timestamp>,
    #[prost(message, optional, tag = "4")]
    pub deleted: Option<Timestamp>,
    #[prost(string, tag = "5")]
    pub description: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Status {
    #[prost(enumeration = "StatusCode", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "4")]
    pub notes: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum StatusCode {
    Unknown = 0,
    Deployed = 1,
    Deleted = 2,
    Superseded = 3,
    Failed = 4,
    Deleting = 5,
    PendingInstall = 6,
    PendingUpgrade = 7,
    PendingRollback = 8,
}

impl StatusCode {
    /// Upper-case name, as used in the `STATUS` storage label
    pub fn label(self) -> &'static str {
        match self {
            StatusCode::Unknown => "UNKNOWN",
            StatusCode::Deployed => "DEPLOYED",
            StatusCode::Deleted => "DELETED",
            StatusCode::Superseded => "SUPERSEDED",
            StatusCode::Failed => "FAILED",
            StatusCode::Deleting => "DELETING",
            StatusCode::PendingInstall => "PENDING_INSTALL",
            StatusCode::PendingUpgrade => "PENDING_UPGRADE",
            StatusCode::PendingRollback => "PENDING_ROLLBACK",
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Chart {
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<Metadata>,
    #[prost(message, repeated, tag = "2")]
    pub templates: Vec<Template>,
    #[prost(message, optional, tag = "4")]
    pub values: Option<Config>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Metadata {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub home: String,
    #[prost(string, tag = "4")]
    pub version: String,
    #[prost(string, tag = "5")]
    pub description: String,
    #[prost(string, tag = "10")]
    pub api_version: String,
    #[prost(string, tag = "13")]
    pub app_version: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Config {
    #[prost(string, tag = "1")]
    pub raw: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Template {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Hook {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub kind: String,
    #[prost(string, tag = "3")]
    pub path: String,
    #[prost(string, tag = "4")]
    pub manifest: String,
    #[prost(enumeration = "HookEvent", repeated, tag = "5")]
    pub events: Vec<i32>,
    #[prost(message, optional, tag = "6")]
    pub last_run: Option<Timestamp>,
    #[prost(int32, tag = "7")]
    pub weight: i32,
    #[prost(enumeration = "HookDeletePolicy", repeated, tag = "8")]
    pub delete_policies: Vec<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum HookEvent {
    Unknown = 0,
    PreInstall = 1,
    PostInstall = 2,
    PreDelete = 3,
    PostDelete = 4,
    PreUpgrade = 5,
    PostUpgrade = 6,
    PreRollback = 7,
    PostRollback = 8,
    ReleaseTestSuccess = 9,
    ReleaseTestFailure = 10,
    CrdInstall = 11,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum HookDeletePolicy {
    Succeeded = 0,
    Failed = 1,
    BeforeHookCreation = 2,
}

impl Release {
    /// Status code, `Unknown` when absent or out of range
    pub fn status_code(&self) -> StatusCode {
        self.info
            .as_ref()
            .and_then(|info| info.status.as_ref())
            .and_then(|status| StatusCode::try_from(status.code).ok())
            .unwrap_or(StatusCode::Unknown)
    }

    pub fn chart_metadata(&self) -> Option<&Metadata> {
        self.chart.as_ref().and_then(|chart| chart.metadata.as_ref())
    }
}
