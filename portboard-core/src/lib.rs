pub mod aggregate;
pub mod config;
pub mod correspondence;
pub mod data;
pub mod error;
pub mod filter;
pub mod helpers;
pub mod memo;
pub mod organization;
pub mod record;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use aggregate::{
    average, average_where, count_by, count_where, percentage, percentage_matching,
    round_percentage, rounded_percentage, sum, summarize, Summary,
};
pub use config::{determine_data_path, get_config_path, Config, ViewConfig};
pub use correspondence::{
    detail_path, parse_correspondence, registry_field_config, registry_rows, registry_sort, Banner,
    Correspondence, CorrespondenceSource, CorrespondenceStatus, CorrespondenceStore, FileSource,
    Minute, Priority, RegistryPage, RegistryRow, RegistryView, RetryPolicy, SyncReport,
};
pub use data::{required_capability, DashboardData, CORRESPONDENCE_COLLECTION};
pub use error::{PortboardError, PortboardResult};
pub use filter::{
    filter_records, matches, FieldConfig, FilterOutcome, FilterQuery, SortDirection, SortKind,
    SortSpec, ALL,
};
pub use helpers::{
    format_date, format_date_short, format_date_time, generate_id, generate_reference_number,
    is_overdue, next_step_number, parse_date, MAX_REFERENCE_SEQUENCE,
};
pub use memo::FilterCache;
pub use organization::{
    AssistantAssignment, Department, Directorate, Division, OrganizationSnapshot,
    OrganizationUpdate, User, PLACEHOLDER,
};
pub use record::{normalize_category, parse_number, DynRecord, Record};
pub use session::{
    resolve_current_user, ArchiveLevel, Capabilities, Capability, Grade, SessionContext,
};
pub use storage::Storage;
