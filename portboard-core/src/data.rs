use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::correspondence::{
    read_correspondence, registry_rows, Correspondence, CorrespondenceStore, Minute, RegistryPage,
};
use crate::error::PortboardResult;
use crate::organization::{AssistantAssignment, OrganizationSnapshot};
use crate::record::DynRecord;
use crate::session::{resolve_current_user, Capability, SessionContext};

/// Name under which the typed correspondence list is exposed as a collection
pub const CORRESPONDENCE_COLLECTION: &str = "correspondence";

/// Everything the dashboard displays, as persisted in the data file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    #[serde(default, deserialize_with = "lenient_correspondence")]
    pub correspondence: Vec<Correspondence>,
    #[serde(default)]
    pub minutes: Vec<Minute>,
    #[serde(default)]
    pub organization: OrganizationSnapshot,
    #[serde(default)]
    pub assignments: Vec<AssistantAssignment>,
    /// Page catalogs without a dedicated type (kpis, incidents, vessels...)
    #[serde(default)]
    pub collections: BTreeMap<String, Vec<Value>>,
}

fn lenient_correspondence<'de, D>(deserializer: D) -> Result<Vec<Correspondence>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<Value>::deserialize(deserializer)?;
    Ok(read_correspondence(&entries, "data file"))
}

/// Capability a session needs before the records of `collection` are shown
pub fn required_capability(collection: &str) -> Option<Capability> {
    (collection == CORRESPONDENCE_COLLECTION).then_some(Capability::CorrespondenceRegistry)
}

impl DashboardData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records of a named collection as `session` may see them
    ///
    /// Returns `Ok(None)` for an unknown collection and `PermissionDenied`
    /// when the collection is restricted and the session lacks access.
    pub fn collection_for(
        &self,
        name: &str,
        session: &SessionContext,
    ) -> PortboardResult<Option<Vec<DynRecord>>> {
        if let Some(capability) = required_capability(name) {
            session.require(capability)?;
        }
        Ok(self.collection(name))
    }

    /// Number of records in a named collection, without exposing them
    pub fn collection_len(&self, name: &str) -> Option<usize> {
        match self.collections.get(name) {
            Some(values) => Some(values.iter().filter(|v| v.is_object()).count()),
            None if name == CORRESPONDENCE_COLLECTION => Some(self.correspondence.len()),
            None => None,
        }
    }

    /// Records of a named collection
    ///
    /// Entries that are not JSON objects cannot carry fields and are skipped.
    /// The typed correspondence list is available under
    /// [`CORRESPONDENCE_COLLECTION`] unless a collection of that name exists,
    /// joined with the division and registrar names the registry searches on.
    fn collection(&self, name: &str) -> Option<Vec<DynRecord>> {
        if let Some(values) = self.collections.get(name) {
            let records: Vec<DynRecord> = values
                .iter()
                .cloned()
                .filter_map(DynRecord::from_value)
                .collect();
            if records.len() != values.len() {
                tracing::debug!(
                    collection = name,
                    skipped = values.len() - records.len(),
                    "non-object entries skipped"
                );
            }
            return Some(records);
        }

        if name == CORRESPONDENCE_COLLECTION {
            return Some(
                registry_rows(&self.correspondence, &self.organization)
                    .into_iter()
                    .filter_map(|row| {
                        let mut value = serde_json::to_value(row.item).ok()?;
                        let map = value.as_object_mut()?;
                        map.insert("divisionName".into(), Value::String(row.division_name));
                        map.insert("registeredBy".into(), Value::String(row.registered_by));
                        DynRecord::from_value(value)
                    })
                    .collect(),
            );
        }

        None
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        if !self.collections.contains_key(CORRESPONDENCE_COLLECTION) {
            names.push(CORRESPONDENCE_COLLECTION.to_string());
            names.sort();
        }
        names
    }

    pub fn correspondence_store(&self) -> CorrespondenceStore {
        CorrespondenceStore::new(self.correspondence.clone(), self.minutes.clone())
    }

    /// The registry page over this data, if `session` may view it
    pub fn registry_page(&self, session: &SessionContext) -> PortboardResult<RegistryPage> {
        session.require(Capability::CorrespondenceRegistry)?;
        Ok(RegistryPage::new(
            self.correspondence_store(),
            self.organization.clone(),
        ))
    }

    /// Builds the session for a user id or username
    ///
    /// An unknown or absent user gets the anonymous session.
    pub fn session_for(&self, user_key: Option<&str>) -> SessionContext {
        let user = user_key
            .and_then(|key| self.organization.user_by_id_or_username(key))
            .map(|u| resolve_current_user(u, &self.organization));
        if user.is_none() {
            if let Some(key) = user_key {
                tracing::warn!(user = key, "unknown user, continuing without a session user");
            }
        }
        SessionContext::new(user, self.organization.clone(), &self.assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortboardError;
    use crate::organization::User;
    use crate::record::Record;
    use serde_json::json;

    fn data() -> DashboardData {
        let mut gm = User::new("u1", "Gbenga Musa");
        gm.grade_level = "MSS1".into();
        let mut data = DashboardData::new();
        data.organization.users.push(gm);
        data.correspondence.push(Correspondence::new("C1", "Berthing plan"));
        data.collections.insert(
            "kpis".into(),
            vec![json!({"id": "K1", "status": "On Track"}), json!(42)],
        );
        data
    }

    #[test]
    fn test_collection_skips_non_objects() {
        let kpis = data().collection("kpis").unwrap();
        assert_eq!(kpis.len(), 1);
        assert_eq!(kpis[0].id(), "K1");
        assert!(data().collection("vessels").is_none());
    }

    #[test]
    fn test_correspondence_as_collection() {
        let records = data().collection(CORRESPONDENCE_COLLECTION).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("subject").as_deref(), Some("Berthing plan"));
        assert_eq!(records[0].field("status").as_deref(), Some("pending"));
        assert_eq!(data().collection_names(), vec!["correspondence", "kpis"]);
    }

    #[test]
    fn test_correspondence_collection_carries_joined_names() {
        let mut d = data();
        d.organization.divisions.push(crate::organization::Division {
            id: "div-mar".into(),
            name: "Marine Services".into(),
            code: "MAR".into(),
            directorate_id: None,
        });
        d.correspondence[0].division_id = Some("div-mar".into());
        d.correspondence[0].created_by_id = Some("u1".into());

        let records = d.collection(CORRESPONDENCE_COLLECTION).unwrap();
        assert_eq!(records[0].field("divisionName").as_deref(), Some("Marine Services"));
        assert_eq!(records[0].field("registeredBy").as_deref(), Some("Gbenga Musa"));

        let hits = crate::filter::filter_records(
            &records,
            &crate::correspondence::registry_field_config(),
            &crate::filter::FilterQuery::new().text("marine"),
        );
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_registry_collection_is_gated() {
        let mut d = data();
        let mut officer = User::new("u3", "Ada Eze");
        officer.grade_level = "MSS3".into();
        d.organization.users.push(officer);

        let denied = d.collection_for(CORRESPONDENCE_COLLECTION, &d.session_for(Some("u3")));
        assert_eq!(
            denied.unwrap_err(),
            PortboardError::PermissionDenied(Capability::CorrespondenceRegistry)
        );
        assert!(d.collection_for(CORRESPONDENCE_COLLECTION, &d.session_for(None)).is_err());
        assert!(d.registry_page(&d.session_for(Some("u3"))).is_err());

        let gm = d.session_for(Some("u1"));
        assert_eq!(d.collection_for(CORRESPONDENCE_COLLECTION, &gm).unwrap().unwrap().len(), 1);
        assert!(d.registry_page(&gm).is_ok());

        // Unrestricted collections need no capability
        let kpis = d.collection_for("kpis", &d.session_for(None)).unwrap().unwrap();
        assert_eq!(kpis.len(), 1);
        assert_eq!(d.collection_len(CORRESPONDENCE_COLLECTION), Some(1));
        assert_eq!(d.collection_len("kpis"), Some(1));
    }

    #[test]
    fn test_load_skips_unreadable_correspondence() {
        let yaml = r#"
correspondence:
  - id: C1
    subject: Berthing plan
    status: pending
  - id: C2
    subject: No status or priority
  - subject: Missing id
"#;
        let d: DashboardData = serde_yaml::from_str(yaml).unwrap();
        let ids: Vec<&str> = d.correspondence.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "C2"]);
    }

    #[test]
    fn test_session_for() {
        let d = data();
        let gm = d.session_for(Some("u1"));
        assert!(gm.capabilities.can_access_administration);
        assert_eq!(gm.user.as_ref().map(|u| u.name.as_str()), Some("Gbenga Musa"));

        let anon = d.session_for(Some("nobody"));
        assert!(anon.user.is_none());
        assert!(!anon.capabilities.can_access_approvals);
    }
}
