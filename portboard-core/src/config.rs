use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::correspondence::{registry_field_config, registry_sort, RetryPolicy};
use crate::data::CORRESPONDENCE_COLLECTION;
use crate::filter::{FieldConfig, SortDirection, SortKind, SortSpec};

pub const CONFIG_ENV: &str = "PORTBOARD_CONFIG";
pub const DATA_ENV: &str = "PORTBOARD_DATA";
pub const LOCAL_DATA_FILE: &str = "portboard.yaml";

/// A dashboard page: which collection it lists and how it filters it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub title: String,
    pub collection: String,
    #[serde(default)]
    pub fields: FieldConfig,
    /// Columns shown in list output, in order
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
}

/// User configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Data file used when no override is given
    pub data_file: String,
    #[serde(default)]
    pub sync: RetryPolicy,
    #[serde(default)]
    pub views: BTreeMap<String, ViewConfig>,
}

fn view(
    title: &str,
    collection: &str,
    fields: FieldConfig,
    columns: &[&str],
    sort: Option<SortSpec>,
) -> ViewConfig {
    ViewConfig {
        title: title.to_string(),
        collection: collection.to_string(),
        fields,
        columns: columns.iter().map(|c| c.to_string()).collect(),
        sort,
    }
}

fn default_views() -> BTreeMap<String, ViewConfig> {
    let mut views = BTreeMap::new();
    views.insert(
        "registry".to_string(),
        view(
            "Registered Correspondence",
            CORRESPONDENCE_COLLECTION,
            registry_field_config(),
            &[
                "referenceNumber",
                "subject",
                "senderName",
                "divisionName",
                "status",
                "priority",
                "receivedDate",
            ],
            Some(registry_sort()),
        ),
    );
    views.insert(
        "kpis".to_string(),
        view(
            "Financial Planning KPIs",
            "kpis",
            FieldConfig::new(["name", "description", "owner"], ["status", "category"]),
            &["id", "name", "status", "category", "weight"],
            None,
        ),
    );
    views.insert(
        "incidents".to_string(),
        view(
            "Network Incidents",
            "incidents",
            FieldConfig::new(["title", "description", "assignedTo"], ["status", "severity"]),
            &["id", "title", "severity", "status", "reportedAt"],
            Some(SortSpec::newest_first("reportedAt")),
        ),
    );
    views.insert(
        "vessels".to_string(),
        view(
            "Vessel Movements",
            "vessels",
            FieldConfig::new(["name", "imo", "agent"], ["status", "type"]),
            &["id", "name", "type", "status", "eta"],
            Some(SortSpec::new("eta", SortKind::Date, SortDirection::Ascending)),
        ),
    );
    views
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: LOCAL_DATA_FILE.to_string(),
            sync: RetryPolicy::default(),
            views: default_views(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    /// Loads the config, writing the defaults first if the file is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            let config = Config::default();
            config.save(&path)?;
            tracing::info!(path = ?path.as_ref(), "wrote default configuration");
            return Ok(config);
        }
        Self::load(path)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path.as_ref()))?;

        Ok(())
    }

    pub fn view(&self, name: &str) -> Option<&ViewConfig> {
        self.views.get(name)
    }
}

/// Gets the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

    Ok(home_dir.join(".portboard.yaml"))
}

/// Determines the data file to use
///
/// Priority: explicit override, then `PORTBOARD_DATA`, then `portboard.yaml`
/// in the current directory, then the config's `data_file`.
pub fn determine_data_path(cli_override: Option<&Path>, config: &Config) -> PathBuf {
    if let Some(path) = cli_override {
        return path.to_path_buf();
    }

    if let Ok(path) = env::var(DATA_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    let local = PathBuf::from(LOCAL_DATA_FILE);
    if local.exists() {
        return local;
    }

    PathBuf::from(&config.data_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DashboardData;
    use crate::filter::{filter_records, FilterQuery};
    use crate::record::Record;
    use tempfile::TempDir;

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config").join("portboard.yaml");

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert!(created.view("registry").is_some());

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded, created);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("portboard.yaml");
        fs::write(
            &path,
            r#"
data_file: /srv/port/data.yaml
views:
  training:
    collection: training
    fields:
      searchable: [title]
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.sync, RetryPolicy::default());
        let training = config.view("training").unwrap();
        assert_eq!(training.fields.searchable, vec!["title"]);
        assert!(training.fields.categorical.is_empty());
        assert!(training.sort.is_none());
        assert!(config.view("registry").is_none());
    }

    #[test]
    fn test_cli_override_wins() {
        let config = Config::default();
        let path = determine_data_path(Some(Path::new("/tmp/explicit.yaml")), &config);
        assert_eq!(path, PathBuf::from("/tmp/explicit.yaml"));
    }

    #[test]
    fn test_default_views_fit_demo_data() {
        let data: DashboardData =
            serde_yaml::from_str(include_str!("../../demos/portboard.yaml")).unwrap();
        let session = data.session_for(Some("u-md"));

        for (name, view) in &Config::default().views {
            let records = data
                .collection_for(&view.collection, &session)
                .unwrap()
                .unwrap_or_else(|| panic!("view {} has no collection {}", name, view.collection));
            assert!(!records.is_empty(), "view {} is empty", name);

            let fields = view
                .fields
                .searchable
                .iter()
                .chain(&view.fields.categorical)
                .chain(&view.columns);
            for field in fields {
                assert!(
                    records.iter().any(|r| r.field(field).is_some()),
                    "view {} names field {} that no record carries",
                    name,
                    field
                );
            }

            if let Some(sort) = &view.sort {
                let outcome = filter_records(
                    &records,
                    &view.fields,
                    &FilterQuery::new().sort_by(sort.clone()),
                );
                assert!(outcome.malformed.is_empty(), "view {}: {:?}", name, outcome.malformed);
            }
        }
    }

    #[test]
    fn test_registry_view_is_gated_and_searches_joined_names() {
        let data: DashboardData =
            serde_yaml::from_str(include_str!("../../demos/portboard.yaml")).unwrap();
        let config = Config::default();
        let view = config.view("registry").unwrap();

        assert!(data
            .collection_for(&view.collection, &data.session_for(Some("u-off3")))
            .is_err());
        assert!(data.collection_for(&view.collection, &data.session_for(None)).is_err());

        let records = data
            .collection_for(&view.collection, &data.session_for(Some("u-gm")))
            .unwrap()
            .unwrap();
        let marine = filter_records(&records, &view.fields, &FilterQuery::new().text("marine"));
        let ids: Vec<String> = marine.records.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["CORR-002"]);
        let registrar = filter_records(&records, &view.fields, &FilterQuery::new().text("bakare"));
        assert_eq!(registrar.len(), 2);
    }

    #[test]
    fn test_registry_view_sorts_newest_first() {
        let config = Config::default();
        let sort = config.view("registry").and_then(|v| v.sort.clone()).unwrap();
        assert_eq!(sort.key, "receivedDate");
        assert_eq!(sort.kind, SortKind::Date);
        assert_eq!(sort.direction, SortDirection::Descending);
    }
}
