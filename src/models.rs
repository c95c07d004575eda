use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Errors that must keep their identity all the way up to the HTTP layer,
/// where they map to different response shapes (503 vs 409 vs 400).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("main project registry unreachable during {context}")]
    RegistryUnavailable { context: String },

    #[error("invalid CSV file: {0}")]
    InvalidCsv(String),

    #[error("{} record(s) failed push preconditions", .0.len())]
    PushPrecondition(Vec<RecordViolation>),
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordViolation {
    pub url: String,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Contributor,
}

/// One parsed CSV line, alive only for the duration of an upload.
#[derive(Debug, Clone, Default)]
pub struct CandidateRow {
    pub row_number: usize,
    pub normalized_url: String,
    pub raw_price: Option<f64>,
    pub contact: Option<String>,
    pub category: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub da: Option<String>,
    pub dr: Option<String>,
    pub traffic: Option<String>,
    pub spam_score: Option<String>,
    pub keyword_count: Option<String>,
    pub tat: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateSource {
    MainProject,
    DataInProcess,
    DataFinal,
}

impl DuplicateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateSource::MainProject => "main_project",
            DuplicateSource::DataInProcess => "data_in_process",
            DuplicateSource::DataFinal => "data_final",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InProcessStatus {
    Pending,
    Reached,
    NotReached,
    NoAction,
    Verified,
    Rejected,
    Pushed,
}

impl InProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InProcessStatus::Pending => "PENDING",
            InProcessStatus::Reached => "REACHED",
            InProcessStatus::NotReached => "NOT_REACHED",
            InProcessStatus::NoAction => "NO_ACTION",
            InProcessStatus::Verified => "VERIFIED",
            InProcessStatus::Rejected => "REJECTED",
            InProcessStatus::Pushed => "PUSHED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(InProcessStatus::Pending),
            "REACHED" => Some(InProcessStatus::Reached),
            "NOT_REACHED" => Some(InProcessStatus::NotReached),
            "NO_ACTION" => Some(InProcessStatus::NoAction),
            "VERIFIED" => Some(InProcessStatus::Verified),
            "REJECTED" => Some(InProcessStatus::Rejected),
            "PUSHED" => Some(InProcessStatus::Pushed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalStatus {
    Active,
    Inactive,
}

impl FinalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalStatus::Active => "ACTIVE",
            FinalStatus::Inactive => "INACTIVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(FinalStatus::Active),
            "INACTIVE" => Some(FinalStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NegotiationStatus {
    InProgress,
    Done,
}

impl NegotiationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiationStatus::InProgress => "IN_PROGRESS",
            NegotiationStatus::Done => "DONE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN_PROGRESS" => Some(NegotiationStatus::InProgress),
            "DONE" => Some(NegotiationStatus::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(TaskStatus::Pending),
            "IN_PROGRESS" => Some(TaskStatus::InProgress),
            "COMPLETED" => Some(TaskStatus::Completed),
            "FAILED" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

/// Enrichment + identity shape shared by in-process and final records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteFields {
    pub category: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub da: Option<String>,
    pub dr: Option<String>,
    pub traffic: Option<String>,
    pub spam_score: Option<String>,
    pub keyword_count: Option<String>,
    pub tat: Option<String>,
    pub gb_base_price: Option<f64>,
    pub publisher_name: Option<String>,
    pub publisher_email: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
}

/// Who a site record belongs to. A record is either linked to a canonical
/// publisher in the main project, waiting on one we minted locally, holding a
/// raw contact, or carrying nothing at all. A matched publisher and loose
/// contact fields can never coexist on the same record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublisherIdentity {
    Matched {
        id: String,
        name: Option<String>,
        email: Option<String>,
    },
    Pending {
        local_id: String,
        name: Option<String>,
        email: Option<String>,
    },
    Contact {
        name: Option<String>,
        email: Option<String>,
    },
    Unknown,
}

impl PublisherIdentity {
    /// Any email usable for outreach, canonical or not.
    pub fn email(&self) -> Option<&str> {
        match self {
            PublisherIdentity::Matched { email, .. } => email.as_deref(),
            PublisherIdentity::Pending { email, .. } => email.as_deref(),
            PublisherIdentity::Contact { email, .. } => email.as_deref(),
            PublisherIdentity::Unknown => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, PublisherIdentity::Matched { .. })
    }

    /// Column layout shared by both site tables:
    /// (publisher_id, publisher_matched, publisher_name, publisher_email,
    /// contact_name, contact_email).
    pub fn to_columns(
        &self,
    ) -> (
        Option<String>,
        bool,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
    ) {
        match self {
            PublisherIdentity::Matched { id, name, email } => (
                Some(id.clone()),
                true,
                name.clone(),
                email.clone(),
                None,
                None,
            ),
            PublisherIdentity::Pending {
                local_id,
                name,
                email,
            } => (
                Some(local_id.clone()),
                false,
                name.clone(),
                email.clone(),
                None,
                None,
            ),
            PublisherIdentity::Contact { name, email } => {
                (None, false, None, None, name.clone(), email.clone())
            }
            PublisherIdentity::Unknown => (None, false, None, None, None, None),
        }
    }

    /// Rebuild the identity from stored columns. Kind is decided by the
    /// matched flag and which columns are populated, never by inspecting the
    /// id string itself.
    pub fn from_columns(
        publisher_id: Option<String>,
        publisher_matched: bool,
        publisher_name: Option<String>,
        publisher_email: Option<String>,
        contact_name: Option<String>,
        contact_email: Option<String>,
    ) -> Self {
        match (publisher_id, publisher_matched) {
            (Some(id), true) => PublisherIdentity::Matched {
                id,
                name: publisher_name,
                email: publisher_email,
            },
            (Some(local_id), false) => PublisherIdentity::Pending {
                local_id,
                name: publisher_name,
                email: publisher_email,
            },
            (None, _) => {
                if contact_name.is_none() && contact_email.is_none() {
                    PublisherIdentity::Unknown
                } else {
                    PublisherIdentity::Contact {
                        name: contact_name,
                        email: contact_email,
                    }
                }
            }
        }
    }
}
