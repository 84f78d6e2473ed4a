//! Correspondence registry records and their in-memory store
//!
//! The store is the one place data changes at runtime: a refresh from an
//! upstream [`CorrespondenceSource`] replaces the records and bumps the
//! revision that memoized views key on. A failed refresh never clears the
//! records; it raises a dismissible banner instead.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PortboardError, PortboardResult};
use crate::filter::{FieldConfig, FilterQuery, SortSpec};
use crate::memo::FilterCache;
use crate::organization::OrganizationSnapshot;
use crate::record::{normalize_category, Record};

/// Workflow status of a correspondence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CorrespondenceStatus {
    Pending,
    InProgress,
    Completed,
    Archived,
    Other(String),
}

impl From<String> for CorrespondenceStatus {
    fn from(raw: String) -> Self {
        match normalize_category(&raw).as_str() {
            "pending" => CorrespondenceStatus::Pending,
            "in-progress" => CorrespondenceStatus::InProgress,
            "completed" => CorrespondenceStatus::Completed,
            "archived" => CorrespondenceStatus::Archived,
            _ => CorrespondenceStatus::Other(raw),
        }
    }
}

/// A record without a status matches no status selection
impl Default for CorrespondenceStatus {
    fn default() -> Self {
        CorrespondenceStatus::Other(String::new())
    }
}

impl From<CorrespondenceStatus> for String {
    fn from(status: CorrespondenceStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for CorrespondenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrespondenceStatus::Pending => write!(f, "pending"),
            CorrespondenceStatus::InProgress => write!(f, "in-progress"),
            CorrespondenceStatus::Completed => write!(f, "completed"),
            CorrespondenceStatus::Archived => write!(f, "archived"),
            CorrespondenceStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
    Other(String),
}

impl From<String> for Priority {
    fn from(raw: String) -> Self {
        match normalize_category(&raw).as_str() {
            "urgent" => Priority::Urgent,
            "high" => Priority::High,
            "medium" => Priority::Medium,
            "low" => Priority::Low,
            _ => Priority::Other(raw),
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Other(String::new())
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        priority.to_string()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Urgent => write!(f, "urgent"),
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
            Priority::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A registered letter, memo or other inbound/outbound item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correspondence {
    pub id: String,
    #[serde(default)]
    pub reference_number: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub sender_organization: String,
    /// Kept as received; parsed only when sorting or checking overdue
    #[serde(default)]
    pub received_date: String,
    #[serde(default)]
    pub status: CorrespondenceStatus,
    #[serde(default)]
    pub priority: Priority,
    /// "incoming" or "outgoing"
    #[serde(default = "default_direction")]
    pub direction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_approver_id: Option<String>,
    #[serde(default)]
    pub description: String,
}

fn default_direction() -> String {
    "incoming".to_string()
}

impl Correspondence {
    pub fn new(id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reference_number: String::new(),
            subject: subject.into(),
            sender_name: String::new(),
            sender_organization: String::new(),
            received_date: String::new(),
            status: CorrespondenceStatus::Pending,
            priority: Priority::Medium,
            direction: default_direction(),
            division_id: None,
            department_id: None,
            created_by_id: None,
            current_approver_id: None,
            description: String::new(),
        }
    }
}

/// Wire names of the correspondence fields that must hold text
const TEXT_FIELDS: &[&str] = &[
    "id",
    "referenceNumber",
    "subject",
    "senderName",
    "senderOrganization",
    "receivedDate",
    "status",
    "priority",
    "direction",
    "divisionId",
    "departmentId",
    "createdById",
    "currentApproverId",
    "description",
];

/// Best guess at the field that stopped `value` from reading as a correspondence
fn offending_field(value: &Value) -> String {
    let Some(map) = value.as_object() else {
        return "record".to_string();
    };
    if !map.get("id").is_some_and(Value::is_string) {
        return "id".to_string();
    }
    TEXT_FIELDS
        .iter()
        .find(|name| map.get(**name).is_some_and(|v| !v.is_string() && !v.is_null()))
        .map_or_else(|| "record".to_string(), |name| name.to_string())
}

impl Correspondence {
    /// Reads one correspondence from an untyped feed entry
    pub fn from_value(value: &Value) -> PortboardResult<Self> {
        Correspondence::deserialize(value).map_err(|e| {
            let id = value
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            tracing::debug!(id = %id, error = %e, "unreadable correspondence entry");
            PortboardError::MalformedRecord {
                id,
                field: offending_field(value),
            }
        })
    }
}

/// Reads a list of feed entries, setting aside the ones that are not a
/// readable correspondence
pub fn parse_correspondence(values: &[Value]) -> (Vec<Correspondence>, Vec<PortboardError>) {
    let mut records = Vec::with_capacity(values.len());
    let mut rejected = Vec::new();
    for value in values {
        match Correspondence::from_value(value) {
            Ok(record) => records.push(record),
            Err(e) => rejected.push(e),
        }
    }
    (records, rejected)
}

/// Like [`parse_correspondence`], logging each entry set aside
pub(crate) fn read_correspondence(values: &[Value], origin: &str) -> Vec<Correspondence> {
    let (records, rejected) = parse_correspondence(values);
    for error in &rejected {
        tracing::warn!(origin, %error, "correspondence entry skipped");
    }
    records
}

fn opt(value: &Option<String>) -> Option<Cow<'_, str>> {
    value.as_deref().map(Cow::Borrowed)
}

impl Record for Correspondence {
    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "id" => Some(Cow::Borrowed(&self.id)),
            "referenceNumber" => Some(Cow::Borrowed(&self.reference_number)),
            "subject" => Some(Cow::Borrowed(&self.subject)),
            "senderName" => Some(Cow::Borrowed(&self.sender_name)),
            "senderOrganization" => Some(Cow::Borrowed(&self.sender_organization)),
            "receivedDate" => Some(Cow::Borrowed(&self.received_date)),
            "status" => Some(Cow::Owned(self.status.to_string())),
            "priority" => Some(Cow::Owned(self.priority.to_string())),
            "direction" => Some(Cow::Borrowed(&self.direction)),
            "divisionId" => opt(&self.division_id),
            "departmentId" => opt(&self.department_id),
            "createdById" => opt(&self.created_by_id),
            "currentApproverId" => opt(&self.current_approver_id),
            "description" => Some(Cow::Borrowed(&self.description)),
            _ => None,
        }
    }

    fn id(&self) -> String {
        self.id.clone()
    }
}

/// A step in a correspondence's handling trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Minute {
    pub id: String,
    pub correspondence_id: String,
    pub step_number: u32,
    #[serde(default)]
    pub from_user_id: String,
    #[serde(default)]
    pub to_user_id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub minute_text: String,
    #[serde(default)]
    pub timestamp: String,
}

impl Minute {
    pub fn new(id: impl Into<String>, correspondence_id: impl Into<String>, step_number: u32) -> Self {
        Self {
            id: id.into(),
            correspondence_id: correspondence_id.into(),
            step_number,
            from_user_id: String::new(),
            to_user_id: String::new(),
            action: String::new(),
            minute_text: String::new(),
            timestamp: String::new(),
        }
    }
}

/// A correspondence joined with the names the registry page searches on
#[derive(Debug, Clone)]
pub struct RegistryRow<'a> {
    pub item: &'a Correspondence,
    pub division_name: String,
    pub registered_by: String,
}

impl<'a> RegistryRow<'a> {
    pub fn new(item: &'a Correspondence, org: &OrganizationSnapshot) -> Self {
        Self {
            item,
            division_name: org.division_name_or_placeholder(item.division_id.as_deref()),
            registered_by: org.user_name_or_placeholder(item.created_by_id.as_deref()),
        }
    }
}

impl Record for RegistryRow<'_> {
    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "divisionName" => Some(Cow::Borrowed(&self.division_name)),
            "registeredBy" => Some(Cow::Borrowed(&self.registered_by)),
            other => self.item.field(other),
        }
    }

    fn id(&self) -> String {
        self.item.id.clone()
    }
}

/// Joins every correspondence with organization names
pub fn registry_rows<'a>(
    items: &'a [Correspondence],
    org: &OrganizationSnapshot,
) -> Vec<RegistryRow<'a>> {
    items.iter().map(|item| RegistryRow::new(item, org)).collect()
}

/// Field configuration of the registered-correspondence page
pub fn registry_field_config() -> FieldConfig {
    FieldConfig::new(
        [
            "referenceNumber",
            "subject",
            "senderName",
            "divisionName",
            "registeredBy",
        ],
        ["status", "priority"],
    )
}

/// Default ordering of the registry: most recently received first
pub fn registry_sort() -> SortSpec {
    SortSpec::newest_first("receivedDate")
}

/// Route of a correspondence detail page
pub fn detail_path(id: &str) -> String {
    format!("/correspondence/{}", id)
}

/// Upstream provider of correspondence records
pub trait CorrespondenceSource {
    /// Fetches the full current set of records
    fn fetch(&self) -> Result<Vec<Correspondence>>;

    /// Short description used in logs
    fn describe(&self) -> String {
        "correspondence source".to_string()
    }
}

/// Reads correspondence from a JSON or YAML file holding a list of records
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl CorrespondenceSource for FileSource {
    fn fetch(&self) -> Result<Vec<Correspondence>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read correspondence from {:?}", self.path))?;
        let is_json = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let entries: Vec<Value> = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON from {:?}", self.path))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML from {:?}", self.path))?
        };
        Ok(read_correspondence(&entries, &self.describe()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// How often and how patiently a refresh is retried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, at least one is always made
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Wait before retry `n` is `backoff_ms * n`
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    250
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            attempts: 1,
            backoff_ms: 0,
        }
    }

    fn delay_before(&self, retry: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(retry)))
    }
}

/// Non-fatal notice shown while data may be stale
#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncReport {
    Refreshed { count: usize, attempts: u32 },
    /// Records were left untouched
    Failed { attempts: u32, error: String },
}

impl SyncReport {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, SyncReport::Refreshed { .. })
    }
}

/// In-memory correspondence registry
#[derive(Debug, Clone, Default)]
pub struct CorrespondenceStore {
    records: Vec<Correspondence>,
    minutes: Vec<Minute>,
    revision: u64,
    banner: Option<Banner>,
    last_synced: Option<DateTime<Utc>>,
}

impl CorrespondenceStore {
    pub fn new(records: Vec<Correspondence>, minutes: Vec<Minute>) -> Self {
        Self {
            records,
            minutes,
            revision: 1,
            banner: None,
            last_synced: None,
        }
    }

    pub fn records(&self) -> &[Correspondence] {
        &self.records
    }

    pub fn minutes(&self) -> &[Minute] {
        &self.minutes
    }

    /// Identity of the current record set, bumped on every change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.last_synced
    }

    pub fn get(&self, id: &str) -> Option<&Correspondence> {
        self.records.iter().find(|c| c.id == id)
    }

    pub fn minutes_for(&self, correspondence_id: &str) -> Vec<&Minute> {
        self.minutes
            .iter()
            .filter(|m| m.correspondence_id == correspondence_id)
            .collect()
    }

    /// Adds a correspondence in front of the existing ones
    pub fn add(&mut self, item: Correspondence) {
        self.records.insert(0, item);
        self.revision += 1;
    }

    pub fn add_minute(&mut self, minute: Minute) {
        self.minutes.push(minute);
    }

    /// Applies `update` to the record with `id`
    pub fn update<F>(&mut self, id: &str, update: F) -> Result<(), PortboardError>
    where
        F: FnOnce(&mut Correspondence),
    {
        let item = self
            .records
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| PortboardError::LookupMiss {
                kind: "correspondence",
                id: id.to_string(),
            })?;
        update(item);
        self.revision += 1;
        Ok(())
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    /// Refreshes the records from `source`, retrying per `policy`
    ///
    /// On success the records are replaced and any banner is cleared. When
    /// every attempt fails the current records stay in place and a
    /// `DataUnavailable` banner is raised.
    pub fn sync_from(&mut self, source: &dyn CorrespondenceSource, policy: &RetryPolicy) -> SyncReport {
        let attempts = policy.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                std::thread::sleep(policy.delay_before(attempt - 1));
            }
            match source.fetch() {
                Ok(records) => {
                    let count = records.len();
                    self.records = records;
                    self.revision += 1;
                    self.banner = None;
                    self.last_synced = Some(Utc::now());
                    tracing::info!(source = %source.describe(), count, attempt, "correspondence refreshed");
                    return SyncReport::Refreshed { count, attempts: attempt };
                }
                Err(e) => {
                    last_error = format!("{:#}", e);
                    tracing::warn!(
                        source = %source.describe(),
                        attempt,
                        error = %last_error,
                        "correspondence refresh failed"
                    );
                }
            }
        }

        let error = PortboardError::DataUnavailable(last_error.clone());
        self.banner = Some(Banner {
            message: format!("{}. Showing previously loaded data.", error),
            raised_at: Utc::now(),
        });
        SyncReport::Failed {
            attempts,
            error: last_error,
        }
    }
}

/// Filtered registry rows with the records whose sort key could not be read
#[derive(Debug)]
pub struct RegistryView<'a> {
    pub rows: Vec<RegistryRow<'a>>,
    pub malformed: Vec<PortboardError>,
}

/// The registered-correspondence page: a store, the organization it joins
/// names from, and the memoized filter over the joined rows
///
/// Filtering is recomputed only when the query changes or a sync or edit
/// bumps the store's revision.
#[derive(Debug)]
pub struct RegistryPage {
    store: CorrespondenceStore,
    organization: OrganizationSnapshot,
    cache: FilterCache,
    config: FieldConfig,
}

impl RegistryPage {
    pub fn new(store: CorrespondenceStore, organization: OrganizationSnapshot) -> Self {
        Self {
            store,
            organization,
            cache: FilterCache::new(),
            config: registry_field_config(),
        }
    }

    pub fn store(&self) -> &CorrespondenceStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut CorrespondenceStore {
        &mut self.store
    }

    pub fn cache(&self) -> &FilterCache {
        &self.cache
    }

    pub fn sync_from(&mut self, source: &dyn CorrespondenceSource, policy: &RetryPolicy) -> SyncReport {
        self.store.sync_from(source, policy)
    }

    pub fn view(&mut self, query: &FilterQuery) -> RegistryView<'_> {
        let rows = registry_rows(self.store.records(), &self.organization);
        let outcome = self
            .cache
            .view(&rows, self.store.revision(), &self.config, query);
        RegistryView {
            rows: outcome.records.into_iter().cloned().collect(),
            malformed: outcome.malformed,
        }
    }
}
