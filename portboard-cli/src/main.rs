mod cli;
mod prompts;

use anyhow::{Context, Result};
use clap::Parser;
use colored::{ColoredString, Colorize};
use tracing_subscriber::EnvFilter;

use portboard_core::{
    average, detail_path, determine_data_path, filter_records, format_date, format_date_short,
    get_config_path, is_overdue, normalize_category, percentage, registry_sort,
    required_capability, round_percentage, summarize, Config, DashboardData,
    DynRecord, FileSource, FilterQuery, PortboardError, Record, RegistryPage, RetryPolicy,
    SessionContext, SortDirection, SortKind, SortSpec, Storage, SyncReport, ViewConfig, ALL,
};

use crate::cli::{Cli, Command};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = get_config_path()?;
    let config = Config::load_or_create(&config_path)?;
    let data_path = determine_data_path(cli.data.as_deref(), &config);
    tracing::debug!(config = ?config_path, data = ?data_path, "paths resolved");
    let data = Storage::new(&data_path).load()?;

    match &cli.command {
        Command::List {
            view,
            query,
            filters,
            sort,
            asc,
            user,
        } => {
            let list = ListArgs {
                query: query.as_deref(),
                filters,
                sort: sort.as_deref(),
                ascending: *asc,
                user: user.as_deref(),
            };
            list_view(&data, &config, view, &list)?;
        }
        Command::Registry {
            query,
            status,
            priority,
            user,
            sync_from,
            interactive,
        } => {
            let registry = RegistryArgs {
                query: query.as_deref(),
                status,
                priority,
                user: user.as_deref(),
                sync_from: sync_from.as_deref(),
                interactive: *interactive,
            };
            show_registry(&data, &config, &registry)?;
        }
        Command::Summary {
            view,
            field,
            value,
            average,
            user,
        } => {
            show_summary(
                &data,
                &config,
                view,
                field.as_deref(),
                value.as_deref(),
                average.as_deref(),
                user.as_deref(),
            )?;
        }
        Command::Sync { from, attempts } => {
            let mut policy = config.sync.clone();
            if let Some(n) = attempts {
                policy.attempts = *n;
            }
            sync_correspondence(&data, from, &policy)?;
        }
        Command::Whoami { user } => {
            show_capabilities(&data, user.as_deref())?;
        }
        Command::Show { id, user } => {
            show_correspondence(&data, id, user.as_deref())?;
        }
        Command::Views => {
            list_views(&data, &config);
        }
    }

    Ok(())
}

/// Parses `field=value` into a categorical selection
fn parse_filter(raw: &str) -> Result<(String, String)> {
    let (field, value) = raw
        .split_once('=')
        .with_context(|| format!("Invalid filter '{}', expected field=value", raw))?;
    let field = field.trim();
    if field.is_empty() {
        anyhow::bail!("Invalid filter '{}', field name is empty", raw);
    }
    Ok((field.to_string(), value.trim().to_string()))
}

/// Parses `field[:date|number|text]` into a sort spec
fn parse_sort(raw: &str, ascending: bool) -> Result<SortSpec> {
    let (key, kind) = match raw.split_once(':') {
        Some((key, kind)) => (key, kind),
        None => (raw, "text"),
    };
    let kind = match kind.to_lowercase().as_str() {
        "date" => SortKind::Date,
        "number" | "num" => SortKind::Number,
        "text" => SortKind::Text,
        other => anyhow::bail!("Invalid sort kind: {}", other),
    };
    let direction = if ascending {
        SortDirection::Ascending
    } else {
        SortDirection::Descending
    };
    Ok(SortSpec::new(key, kind, direction))
}

fn colorize_category(value: &str) -> ColoredString {
    match normalize_category(value).as_str() {
        "pending" | "at-risk" | "medium" | "scheduled" => value.yellow(),
        "in-progress" | "investigating" | "high" | "berthed" => value.blue(),
        "completed" | "resolved" | "on-track" | "low" | "active" | "departed" => value.green(),
        "archived" | "closed" | "inactive" => value.dimmed(),
        "urgent" | "critical" | "behind" | "overdue" | "delayed" => value.red(),
        _ => value.normal(),
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out: String = value.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn view_columns(view: &ViewConfig) -> Vec<String> {
    if !view.columns.is_empty() {
        return view.columns.clone();
    }
    let mut columns = vec!["id".to_string()];
    columns.extend(view.fields.searchable.iter().cloned());
    columns.extend(view.fields.categorical.iter().cloned());
    columns.dedup();
    columns
}

fn print_table<R: Record>(records: &[&R], columns: &[String], categorical: &[String]) {
    const WIDTH: usize = 24;

    let header: Vec<String> = columns.iter().map(|c| format!("{:<WIDTH$}", truncate(c, WIDTH))).collect();
    println!("{}", header.join(" | ").bold());
    println!("{}", "-".repeat((WIDTH + 3) * columns.len()));

    for record in records {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| {
                let raw = record
                    .field(column)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|| portboard_core::PLACEHOLDER.to_string());
                let text = format!("{:<WIDTH$}", truncate(&raw, WIDTH));
                if categorical.contains(column) {
                    colorize_category(&text).to_string()
                } else {
                    text
                }
            })
            .collect();
        println!("{}", cells.join(" | "));
    }
}

fn load_view<'a>(config: &'a Config, name: &str) -> Result<&'a ViewConfig> {
    config.view(name).with_context(|| {
        let known: Vec<&str> = config.views.keys().map(String::as_str).collect();
        format!("Unknown view '{}'. Configured views: {}", name, known.join(", "))
    })
}

struct ListArgs<'a> {
    query: Option<&'a str>,
    filters: &'a [String],
    sort: Option<&'a str>,
    ascending: bool,
    user: Option<&'a str>,
}

/// Resolves the session a collection needs; prompts only for restricted ones
fn session_for_collection(
    data: &DashboardData,
    collection: &str,
    user: Option<&str>,
) -> Result<SessionContext> {
    if required_capability(collection).is_some() {
        resolve_session(data, user)
    } else {
        Ok(data.session_for(user))
    }
}

/// Records of a view's collection, as the session may see them
fn view_records(data: &DashboardData, view: &ViewConfig, user: Option<&str>) -> Result<Vec<DynRecord>> {
    let session = session_for_collection(data, &view.collection, user)?;
    let records = data
        .collection_for(&view.collection, &session)?
        .with_context(|| format!("No collection named '{}' in the data file", view.collection))?;
    Ok(records)
}

fn list_view(data: &DashboardData, config: &Config, view_name: &str, args: &ListArgs) -> Result<()> {
    let view = load_view(config, view_name)?;
    let records = view_records(data, view, args.user)?;

    let mut filter_query = FilterQuery::new().text(args.query.unwrap_or_default());
    for raw in args.filters {
        let (field, value) = parse_filter(raw)?;
        if !view.fields.categorical.contains(&field) {
            tracing::warn!(field = %field, view = view_name, "filtering on a field the view does not list as categorical");
        }
        filter_query = filter_query.select(field, value);
    }
    filter_query.sort = match args.sort {
        Some(raw) => Some(parse_sort(raw, args.ascending)?),
        None => view.sort.clone().map(|mut spec| {
            if args.ascending {
                spec.direction = SortDirection::Ascending;
            }
            spec
        }),
    };

    let outcome = filter_records(&records, &view.fields, &filter_query);

    if !view.title.is_empty() {
        println!("{}\n", view.title.bold());
    }
    if outcome.is_empty() {
        println!("{}", "No records found.".yellow());
        return Ok(());
    }

    print_table(&outcome.records, &view_columns(view), &view.fields.categorical);
    println!(
        "\n{} of {} records",
        outcome.len().to_string().bold(),
        records.len()
    );
    print_malformed(&outcome.malformed);

    Ok(())
}

fn print_malformed(malformed: &[PortboardError]) {
    if malformed.is_empty() {
        return;
    }
    println!("{}", "Listed last:".yellow());
    for error in malformed {
        println!("  {}", error);
    }
}

fn resolve_session(data: &DashboardData, user: Option<&str>) -> Result<SessionContext> {
    let key = match user {
        Some(u) => Some(u.to_string()),
        None => prompts::prompt_select_user(&data.organization)?,
    };
    Ok(data.session_for(key.as_deref()))
}

fn print_banner(message: &str) {
    println!("{} {}", "!".yellow().bold(), message.yellow());
}

struct RegistryArgs<'a> {
    query: Option<&'a str>,
    status: &'a str,
    priority: &'a str,
    user: Option<&'a str>,
    sync_from: Option<&'a std::path::Path>,
    interactive: bool,
}

fn filters_active(query: &str, status: &str, priority: &str) -> bool {
    normalize_category(status) != ALL
        || normalize_category(priority) != ALL
        || !query.trim().is_empty()
}

fn print_registry(page: &mut RegistryPage, query: &FilterQuery) {
    let total = page.store().records().len();
    let view = page.view(query);

    if view.rows.is_empty() {
        println!("{}", "No correspondence matches the current filters.".yellow());
        return;
    }

    println!(
        "{:<22} | {:<30} | {:<20} | {:<18} | {:<18} | {:<11} | {:<8} | {:<10}",
        "Reference", "Subject", "Sender", "Division", "Registered by", "Status", "Priority", "Received"
    );
    println!("{}", "-".repeat(160));
    for row in &view.rows {
        let item = row.item;
        println!(
            "{:<22} | {:<30} | {:<20} | {:<18} | {:<18} | {:<11} | {:<8} | {:<10}",
            truncate(&item.reference_number, 22),
            truncate(&item.subject, 30),
            truncate(&item.sender_name, 20),
            truncate(&row.division_name, 18),
            truncate(&row.registered_by, 18),
            colorize_category(&format!("{:<11}", item.status.to_string())),
            colorize_category(&format!("{:<8}", item.priority.to_string())),
            format_date_short(&item.received_date),
        );
    }
    println!("\n{} of {} registered items", view.rows.len().to_string().bold(), total);
    print_malformed(&view.malformed);
}

fn show_registry(data: &DashboardData, config: &Config, args: &RegistryArgs) -> Result<()> {
    let session = resolve_session(data, args.user)?;

    println!("{}\n", "Registered Correspondence".bold());
    let mut page = match data.registry_page(&session) {
        Ok(page) => page,
        Err(PortboardError::PermissionDenied(_)) => {
            println!(
                "You do not have permission to view the correspondence registry. Executive access is \
                 available from Assistant General Manager grade and above."
            );
            return Ok(());
        }
        Err(other) => return Err(other.into()),
    };

    if let Some(path) = args.sync_from {
        page.sync_from(&FileSource::new(path), &config.sync);
    }
    if let Some(banner) = page.store().banner() {
        print_banner(&banner.message);
    }

    let mut text = args.query.unwrap_or_default().to_string();
    loop {
        let query = FilterQuery::new()
            .text(text.as_str())
            .select("status", args.status)
            .select("priority", args.priority)
            .sort_by(registry_sort());
        print_registry(&mut page, &query);

        if filters_active(&text, args.status, args.priority) {
            println!("{}", "Filters active; use --status all --priority all to widen.".dimmed());
        }
        if !args.interactive {
            break;
        }
        match prompts::prompt_search()? {
            Some(next) => text = next,
            None => break,
        }
        println!();
    }

    tracing::debug!(
        hits = page.cache().hits(),
        misses = page.cache().misses(),
        "registry filter cache"
    );
    Ok(())
}

fn show_summary(
    data: &DashboardData,
    config: &Config,
    view_name: &str,
    field: Option<&str>,
    value: Option<&str>,
    average_field: Option<&str>,
    user: Option<&str>,
) -> Result<()> {
    let view = load_view(config, view_name)?;
    let records = view_records(data, view, user)?;

    println!("{} ({} records)\n", view.title.bold(), records.len());

    let field = field
        .map(str::to_string)
        .or_else(|| view.fields.categorical.first().cloned());

    match (field, value) {
        (Some(field), Some(value)) => {
            let p = percentage(&records, &field, value);
            println!("{} = {}: {}%", field, colorize_category(value), round_percentage(p));
        }
        (Some(field), None) => {
            for tile in summarize(&records, &field) {
                let label = if tile.label.is_empty() {
                    portboard_core::PLACEHOLDER.to_string()
                } else {
                    tile.label.clone()
                };
                println!(
                    "{:<20} {:>5}  {:>3}%",
                    colorize_category(&label),
                    tile.count,
                    round_percentage(tile.percentage)
                );
            }
        }
        (None, Some(_)) => anyhow::bail!("--value needs --field (the view has no categorical fields)"),
        (None, None) => {}
    }

    if let Some(avg_field) = average_field {
        let avg = average(&records, avg_field);
        println!("\nAverage {}: {:.1}", avg_field, avg);
    }

    Ok(())
}

/// Refreshes an in-memory copy of the correspondence from `from`
///
/// The data file is never rewritten; the report tells whether the feed is
/// usable and how many records it yields.
fn sync_correspondence(data: &DashboardData, from: &std::path::Path, policy: &RetryPolicy) -> Result<SyncReport> {
    let mut store = data.correspondence_store();
    let report = store.sync_from(&FileSource::new(from), policy);

    match &report {
        SyncReport::Refreshed { count, attempts } => {
            println!(
                "{} {} correspondence records from {:?} (attempts: {})",
                "Fetched".green(),
                count,
                from,
                attempts
            );
            println!("{}", "The data file was not modified.".dimmed());
        }
        SyncReport::Failed { attempts, .. } => {
            if let Some(banner) = store.banner() {
                print_banner(&banner.message);
            }
            println!(
                "Sync failed after {} attempt(s); {} existing records kept.",
                attempts,
                store.records().len()
            );
        }
    }

    Ok(report)
}

fn yes_no(value: bool) -> ColoredString {
    if value {
        "yes".green()
    } else {
        "no".red()
    }
}

fn show_capabilities(data: &DashboardData, user: Option<&str>) -> Result<()> {
    let session = resolve_session(data, user)?;

    match &session.user {
        Some(u) => println!(
            "{}: {} ({}, {})",
            "User".blue(),
            u.name,
            u.grade_level,
            if u.system_role.is_empty() { "no role" } else { u.system_role.as_str() }
        ),
        None => println!("{}: anonymous", "User".blue()),
    }

    let caps = &session.capabilities;
    println!("{}: {}", "Approvals".blue(), yes_no(caps.can_access_approvals));
    println!("{}: {}", "Analytics".blue(), yes_no(caps.can_access_analytics));
    println!("{}: {}", "Executive dashboard".blue(), yes_no(caps.can_access_executive_dashboard));
    println!("{}: {}", "Administration".blue(), yes_no(caps.can_access_administration));
    println!("{}: {}", "Reports".blue(), yes_no(caps.can_access_reports));
    println!("{}: {}", "Register correspondence".blue(), yes_no(caps.can_register_correspondence));
    println!("{}: {}", "Document management".blue(), yes_no(caps.can_access_document_management));
    println!("{}: {}", "Distribute".blue(), yes_no(caps.can_distribute));
    println!("{}: {}", "Correspondence registry".blue(), yes_no(caps.can_view_correspondence_registry));
    let levels: Vec<String> = caps.allowed_archive_levels.iter().map(|l| l.to_string()).collect();
    println!("{}: {}", "Archive levels".blue(), levels.join(", "));

    Ok(())
}

fn show_correspondence(data: &DashboardData, id: &str, user: Option<&str>) -> Result<()> {
    let session = resolve_session(data, user)?;
    let page = data.registry_page(&session)?;
    let store = page.store();
    let org = &data.organization;

    let item = store
        .get(id)
        .ok_or_else(|| PortboardError::LookupMiss {
            kind: "correspondence",
            id: id.to_string(),
        })?;

    println!("{}: {}", "ID".blue(), item.id);
    println!("{}: {}", "Reference".blue(), item.reference_number);
    println!("{}: {}", "Subject".blue(), item.subject);
    println!("{}: {} ({})", "Sender".blue(), item.sender_name, item.sender_organization);
    println!("{}: {}", "Direction".blue(), item.direction);
    println!("{}: {}", "Status".blue(), colorize_category(&item.status.to_string()));
    println!("{}: {}", "Priority".blue(), colorize_category(&item.priority.to_string()));
    println!("{}: {}", "Received".blue(), format_date(&item.received_date));
    println!("{}: {}", "Division".blue(), org.division_name_or_placeholder(item.division_id.as_deref()));
    println!("{}: {}", "Department".blue(), org.department_name_or_placeholder(item.department_id.as_deref()));
    println!("{}: {}", "Registered by".blue(), org.user_name_or_placeholder(item.created_by_id.as_deref()));
    println!("{}: {}", "Current approver".blue(), org.user_name_or_placeholder(item.current_approver_id.as_deref()));
    println!("{}: {}", "Link".blue(), detail_path(&item.id));
    if is_overdue(item, chrono::Utc::now()) {
        println!("{}", "OVERDUE".red().bold());
    }
    if !item.description.is_empty() {
        println!("\n{}", item.description);
    }

    let mut minutes = store.minutes_for(&item.id);
    if !minutes.is_empty() {
        minutes.sort_by_key(|m| m.step_number);
        println!("\n{}:", "Minutes".green());
        for minute in minutes {
            println!(
                "  {}. {} -> {}: {} {}",
                minute.step_number,
                org.user_name_or_placeholder(Some(minute.from_user_id.as_str())),
                org.user_name_or_placeholder(Some(minute.to_user_id.as_str())),
                minute.action,
                minute.minute_text.dimmed()
            );
        }
    }

    Ok(())
}

fn list_views(data: &DashboardData, config: &Config) {
    let available = data.collection_names();

    println!("{:<12} | {:<30} | {:<16} | {}", "View", "Title", "Collection", "Records");
    println!("{}", "-".repeat(75));
    for (name, view) in &config.views {
        let count = data
            .collection_len(&view.collection)
            .map(|n| n.to_string())
            .unwrap_or_else(|| "missing".dimmed().to_string());
        let restricted = if required_capability(&view.collection).is_some() {
            " (restricted)".dimmed().to_string()
        } else {
            String::new()
        };
        println!(
            "{:<12} | {:<30} | {:<16} | {}{}",
            name,
            truncate(&view.title, 30),
            view.collection,
            count,
            restricted
        );
    }

    let unviewed: Vec<&str> = available
        .iter()
        .filter(|c| !config.views.values().any(|v| &v.collection == *c))
        .map(String::as_str)
        .collect();
    if !unviewed.is_empty() {
        println!("\nCollections without a view: {}", unviewed.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portboard_core::Capability;

    #[test]
    fn test_parse_filter() {
        assert_eq!(
            parse_filter("status = On Track").unwrap(),
            ("status".to_string(), "On Track".to_string())
        );
        assert!(parse_filter("status").is_err());
        assert!(parse_filter("=pending").is_err());
    }

    #[test]
    fn test_parse_sort() {
        let spec = parse_sort("receivedDate:date", false).unwrap();
        assert_eq!(spec.kind, SortKind::Date);
        assert_eq!(spec.direction, SortDirection::Descending);

        let spec = parse_sort("name", true).unwrap();
        assert_eq!(spec.kind, SortKind::Text);
        assert_eq!(spec.direction, SortDirection::Ascending);

        assert!(parse_sort("weight:float", false).is_err());
    }

    fn sample_data() -> DashboardData {
        serde_yaml::from_str(
            r#"
correspondence:
  - id: CORR-001
    subject: Dredging survey report
    status: pending
    priority: urgent
    receivedDate: "2024-02-14"
    divisionId: div-mar
organization:
  divisions:
    - { id: div-mar, name: Marine Services, code: MAR }
  users:
    - { id: u-gm, name: Adaeze Okafor, gradeLevel: MSS1 }
    - { id: u-off3, name: Ngozi Eze, gradeLevel: MSS3 }
collections:
  kpis:
    - { id: KPI-001, name: Revenue collection, status: On Track, category: Financial, weight: 25 }
"#,
        )
        .unwrap()
    }

    fn list_args(user: Option<&str>) -> ListArgs<'_> {
        ListArgs {
            query: None,
            filters: &[],
            sort: None,
            ascending: false,
            user,
        }
    }

    fn is_permission_denied(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<PortboardError>(),
            Some(PortboardError::PermissionDenied(Capability::CorrespondenceRegistry))
        )
    }

    #[test]
    fn test_list_registry_view_requires_registry_access() {
        let data = sample_data();
        let config = Config::default();

        let err = list_view(&data, &config, "registry", &list_args(Some("u-off3"))).unwrap_err();
        assert!(is_permission_denied(&err));
        let err = list_view(&data, &config, "registry", &list_args(Some("nobody"))).unwrap_err();
        assert!(is_permission_denied(&err));

        assert!(list_view(&data, &config, "registry", &list_args(Some("u-gm"))).is_ok());
    }

    #[test]
    fn test_summary_of_registry_requires_registry_access() {
        let data = sample_data();
        let config = Config::default();
        let err = show_summary(&data, &config, "registry", None, None, None, Some("u-off3")).unwrap_err();
        assert!(is_permission_denied(&err));
        assert!(show_summary(&data, &config, "registry", None, None, None, Some("u-gm")).is_ok());
    }

    #[test]
    fn test_unrestricted_view_lists_without_a_user() {
        let data = sample_data();
        let config = Config::default();
        assert!(list_view(&data, &config, "kpis", &list_args(Some("nobody"))).is_ok());
        assert!(list_view(&data, &config, "no-such-view", &list_args(None)).is_err());
    }

    #[test]
    fn test_show_requires_registry_access() {
        let data = sample_data();
        let err = show_correspondence(&data, "CORR-001", Some("u-off3")).unwrap_err();
        assert!(is_permission_denied(&err));
        assert!(show_correspondence(&data, "CORR-001", Some("u-gm")).is_ok());
        assert!(show_correspondence(&data, "CORR-404", Some("u-gm")).is_err());
    }

    #[test]
    fn test_sync_of_missing_feed_keeps_data() {
        let data = sample_data();
        let report = sync_correspondence(
            &data,
            std::path::Path::new("/nonexistent/feed.json"),
            &RetryPolicy::no_retry(),
        )
        .unwrap();
        assert!(matches!(report, SyncReport::Failed { attempts: 1, .. }));
        assert_eq!(data.correspondence.len(), 1);
    }

    #[test]
    fn test_registry_refuses_without_access_and_lists_with_it() {
        let data = sample_data();
        let config = Config::default();
        let args = |user| RegistryArgs {
            query: Some("marine"),
            status: "All",
            priority: "all",
            user: Some(user),
            sync_from: None,
            interactive: false,
        };
        assert!(show_registry(&data, &config, &args("u-off3")).is_ok());
        assert!(show_registry(&data, &config, &args("u-gm")).is_ok());
    }

    #[test]
    fn test_filters_active_ignores_all_spellings() {
        assert!(!filters_active("", "All", "ALL"));
        assert!(!filters_active("   ", " all ", "all"));
        assert!(filters_active("", "Pending", "all"));
        assert!(filters_active("dredging", "all", "all"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long subject line", 8), "a long …");
    }
}
