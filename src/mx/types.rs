/// One mail exchanger; lower `priority` is more preferred.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    pub host: String,
    pub priority: u16,
}

impl MxRecord {
    pub fn new(priority: u16, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            priority,
        }
    }
}

/// Raw answer of an MX query, before ordering and fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MxStatus {
    Records(Vec<MxRecord>),
    NoRecords,
    NxDomain,
}

impl MxStatus {
    pub fn records(&self) -> &[MxRecord] {
        match self {
            Self::Records(records) => records.as_slice(),
            Self::NoRecords | Self::NxDomain => &[],
        }
    }
}

/// Candidate hosts for a domain, in the order they should be tried.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MxResolution {
    pub hosts: Vec<MxRecord>,
    /// An explicit MX set was published, regardless of any A/AAAA fallback.
    pub has_mx_records: bool,
    /// RFC 7505 null MX: the domain declares it accepts no mail.
    pub null_mx: bool,
}

impl MxResolution {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
