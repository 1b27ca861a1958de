//! # Legacy Browser-Storage Import
//!
//! The first version of the product kept its data in the browser: a
//! camelCase `clients` array and a flat `charteredease_submissions` array,
//! linked only by a `clientId` string. This module turns such an export into
//! validated domain records.
//!
//! Records are validated one at a time. A malformed client or submission is
//! reported in [`ImportReport::rejected`] and the rest of the export still
//! imports. A submission whose `clientId` matches no imported client is
//! reported in [`ImportReport::orphaned`].
//!
//! Legacy ids are replaced with fresh UUIDs. Submission status labels are
//! carried through verbatim; mapping them onto the status lifecycle is the
//! caller's job.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{Client, CreatedBy, GstCredentials, ItrCredentials, NewClient, Profile};
use crate::document::{Document, DocumentKind};
use crate::error::ValidationError;
use crate::identity::{ClientId, Gstin, Pan, ProfileId, SubmissionId};
use crate::principal::Role;
use crate::service::ServiceKind;
use crate::temporal::Timestamp;

/// The raw export, as written by the browser build.
///
/// Accepts either `submissions` or the original storage key
/// `charteredease_submissions`. Records are kept as raw JSON so that one bad
/// record cannot fail the whole parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyExport {
    #[serde(default)]
    pub clients: Vec<Value>,
    #[serde(default, alias = "charteredease_submissions")]
    pub submissions: Vec<Value>,
}

impl LegacyExport {
    /// Parse an export from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyClient {
    name: String,
    #[serde(alias = "mobile", alias = "phone")]
    mobile_number: String,
    email: String,
    #[serde(default = "default_entity_type")]
    entity_type: String,
    #[serde(default)]
    pan: Option<String>,
    #[serde(default)]
    created_by: Option<LegacyCreatedBy>,
    #[serde(default, alias = "agentId", alias = "partnerId")]
    assigned_agent: Option<String>,
    #[serde(default)]
    profiles: Vec<LegacyProfile>,
    #[serde(default)]
    gst_credentials: Option<LegacyGstCredentials>,
    #[serde(default)]
    itr_credentials: Option<LegacyItrCredentials>,
    #[serde(default)]
    created_at: Value,
}

fn default_entity_type() -> String {
    "individual".to_string()
}

#[derive(Debug, Deserialize)]
struct LegacyCreatedBy {
    role: String,
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyProfile {
    #[serde(default)]
    id: Value,
    service: String,
    #[serde(default)]
    extracted_data: Value,
    #[serde(default)]
    created_at: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyGstCredentials {
    gstin: String,
    #[serde(default, alias = "username")]
    portal_username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyItrCredentials {
    pan: String,
    #[serde(default, alias = "userId")]
    portal_user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySubmission {
    client_id: Value,
    #[serde(default)]
    profile_id: Value,
    service: String,
    #[serde(default)]
    extracted_data: Value,
    #[serde(default)]
    documents: Vec<LegacyDocument>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "submittedAt", alias = "date")]
    created_at: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyDocument {
    #[serde(default, alias = "type")]
    kind: String,
    #[serde(alias = "name")]
    file_name: String,
    #[serde(alias = "data", alias = "url")]
    file_data: String,
}

/// Which array a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyCollection {
    Clients,
    Submissions,
}

/// A record that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    pub collection: LegacyCollection,
    /// Position in the source array.
    pub index: usize,
    pub legacy_id: Option<String>,
    pub reason: String,
}

/// A submission whose `clientId` matched no imported client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanedSubmission {
    pub index: usize,
    pub legacy_id: Option<String>,
    pub legacy_client_id: String,
}

/// A submission ready to be stored, linked to an imported client profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedSubmission {
    pub id: SubmissionId,
    pub legacy_id: Option<String>,
    pub client_id: ClientId,
    pub profile_id: ProfileId,
    pub service: ServiceKind,
    pub extracted_data: Value,
    pub documents: Vec<Document>,
    /// Status label exactly as found in the export (empty if absent).
    pub status_label: String,
    pub created_at: Timestamp,
}

/// Result of importing a legacy export.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub clients: Vec<Client>,
    pub submissions: Vec<ImportedSubmission>,
    pub rejected: Vec<RejectedRecord>,
    pub orphaned: Vec<OrphanedSubmission>,
}

impl ImportReport {
    /// Whether every record imported cleanly.
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.orphaned.is_empty()
    }
}

/// Import a legacy export.
///
/// `max_document_bytes` bounds each inline document the same way uploads
/// through the API are bounded.
pub fn import(export: &LegacyExport, max_document_bytes: usize) -> ImportReport {
    let mut report = ImportReport::default();
    // legacy client id -> index into report.clients
    let mut client_index: HashMap<String, usize> = HashMap::new();
    // (client index, legacy profile id) -> profile id
    let mut profile_index: HashMap<(usize, String), ProfileId> = HashMap::new();

    for (index, raw) in export.clients.iter().enumerate() {
        let legacy_id = legacy_key(raw.get("id").unwrap_or(&Value::Null));
        let parsed = serde_json::from_value::<LegacyClient>(raw.clone())
            .map_err(|e| e.to_string())
            .and_then(|c| convert_client(c).map_err(|e| e.to_string()));
        match parsed {
            Ok((client, legacy_profiles)) => {
                let slot = report.clients.len();
                for (legacy_profile_id, profile_id) in legacy_profiles {
                    profile_index.insert((slot, legacy_profile_id), profile_id);
                }
                if let Some(key) = legacy_id.clone() {
                    client_index.insert(key, slot);
                }
                report.clients.push(client);
            }
            Err(reason) => report.rejected.push(RejectedRecord {
                collection: LegacyCollection::Clients,
                index,
                legacy_id,
                reason,
            }),
        }
    }

    let mut linked_profiles: HashSet<ProfileId> = HashSet::new();
    for (index, raw) in export.submissions.iter().enumerate() {
        let legacy_id = legacy_key(raw.get("id").unwrap_or(&Value::Null));
        let reject = |reason: String| RejectedRecord {
            collection: LegacyCollection::Submissions,
            index,
            legacy_id: legacy_id.clone(),
            reason,
        };
        let sub = match serde_json::from_value::<LegacySubmission>(raw.clone()) {
            Ok(sub) => sub,
            Err(e) => {
                report.rejected.push(reject(e.to_string()));
                continue;
            }
        };
        let Some(legacy_client_id) = legacy_key(&sub.client_id) else {
            report.rejected.push(reject("missing clientId".into()));
            continue;
        };
        let Some(&slot) = client_index.get(&legacy_client_id) else {
            report.orphaned.push(OrphanedSubmission {
                index,
                legacy_id,
                legacy_client_id,
            });
            continue;
        };
        let service = match ServiceKind::parse_lenient(&sub.service) {
            Ok(s) => s,
            Err(e) => {
                report.rejected.push(reject(e.to_string()));
                continue;
            }
        };
        let documents = match sub
            .documents
            .iter()
            .map(|d| {
                Document::new(
                    DocumentKind::from_legacy(&d.kind),
                    d.file_name.as_str(),
                    d.file_data.as_str(),
                    max_document_bytes,
                )
            })
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(docs) => docs,
            Err(e) => {
                report.rejected.push(reject(e.to_string()));
                continue;
            }
        };
        let created_at = legacy_timestamp(&sub.created_at).unwrap_or_else(Timestamp::now);

        let client = &mut report.clients[slot];
        let by_legacy_id = legacy_key(&sub.profile_id)
            .and_then(|key| profile_index.get(&(slot, key)).copied())
            .filter(|id| !linked_profiles.contains(id));
        let by_service = || {
            client
                .profiles
                .iter()
                .find(|p| p.service == service && !linked_profiles.contains(&p.id))
                .map(|p| p.id)
        };
        let profile_id = match by_legacy_id.or_else(by_service) {
            Some(id) => id,
            None => {
                let profile = Profile {
                    id: ProfileId::new(),
                    service,
                    extracted_data: sub.extracted_data.clone(),
                    created_at,
                };
                let id = profile.id;
                client.profiles.push(profile);
                id
            }
        };
        linked_profiles.insert(profile_id);

        report.submissions.push(ImportedSubmission {
            id: SubmissionId::new(),
            legacy_id,
            client_id: client.id,
            profile_id,
            service,
            extracted_data: sub.extracted_data,
            documents,
            status_label: sub.status.unwrap_or_default().trim().to_string(),
            created_at,
        });
    }

    report
}

type LegacyProfileIds = Vec<(String, ProfileId)>;

fn convert_client(c: LegacyClient) -> Result<(Client, LegacyProfileIds), ValidationError> {
    let new = NewClient::parse(
        &c.name,
        &c.mobile_number,
        &c.email,
        &c.entity_type,
        c.pan.as_deref(),
    )?;
    let created_by = match c.created_by {
        Some(by) => CreatedBy {
            role: by.role.parse().unwrap_or(Role::Customer),
            id: by.id,
        },
        None => CreatedBy {
            role: Role::Customer,
            id: new.mobile_number.as_str().to_string(),
        },
    };
    let created_at = legacy_timestamp(&c.created_at).unwrap_or_else(Timestamp::now);

    let mut client = Client::create(new, created_by);
    client.assigned_agent = c
        .assigned_agent
        .map(|a| a.trim().to_ascii_lowercase())
        .filter(|a| !a.is_empty())
        .or(client.assigned_agent);

    let mut legacy_ids = Vec::new();
    for p in c.profiles {
        let profile = Profile {
            id: ProfileId::new(),
            service: ServiceKind::parse_lenient(&p.service)?,
            extracted_data: p.extracted_data,
            created_at: legacy_timestamp(&p.created_at).unwrap_or(created_at),
        };
        if let Some(key) = legacy_key(&p.id) {
            legacy_ids.push((key, profile.id));
        }
        client.profiles.push(profile);
    }

    client.gst_credentials = c
        .gst_credentials
        .map(|g| {
            Ok::<_, ValidationError>(GstCredentials {
                gstin: Gstin::new(g.gstin)?,
                portal_username: g.portal_username,
            })
        })
        .transpose()?;
    client.itr_credentials = c
        .itr_credentials
        .map(|i| {
            Ok::<_, ValidationError>(ItrCredentials {
                pan: Pan::new(i.pan)?,
                portal_user_id: i.portal_user_id,
            })
        })
        .transpose()?;
    client.created_at = created_at;
    client.updated_at = created_at;
    Ok((client, legacy_ids))
}

/// Legacy ids were strings or `Date.now()` numbers.
fn legacy_key(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Legacy timestamps were ISO strings or epoch milliseconds.
fn legacy_timestamp(v: &Value) -> Option<Timestamp> {
    match v {
        Value::String(s) => Timestamp::parse_lenient(s).ok(),
        Value::Number(n) => n.as_i64().and_then(|ms| Timestamp::from_epoch_millis(ms).ok()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PDF: &str = "data:application/pdf;base64,JVBERi0xLjQ=";

    fn export() -> LegacyExport {
        serde_json::from_value(json!({
            "clients": [
                {
                    "id": "1710000000000",
                    "name": "Sharma Traders",
                    "mobileNumber": "9999999999",
                    "email": "sharma@example.in",
                    "entityType": "Partnership Firm",
                    "profiles": [
                        { "id": "p1", "service": "GST Return Filing", "extractedData": {"period": "03-2024"} }
                    ],
                    "gstCredentials": { "gstin": "27ABCDE1234F1Z5", "portalUsername": "sharma_gst" },
                    "createdAt": "2024-03-10T10:00:00.000Z"
                },
                {
                    "id": 2,
                    "name": "Bad Mobile",
                    "mobileNumber": "99999",
                    "email": "bad@example.in"
                }
            ],
            "charteredease_submissions": [
                {
                    "id": 11,
                    "clientId": "1710000000000",
                    "profileId": "p1",
                    "service": "GST Return",
                    "status": "Processing",
                    "documents": [
                        { "type": "sales", "name": "sales.pdf", "data": PDF },
                        { "type": "purchase", "name": "purchase.pdf", "data": PDF }
                    ],
                    "createdAt": 1710072000000i64
                },
                {
                    "id": 12,
                    "clientId": "1710000000000",
                    "service": "Income Tax Return",
                    "status": "Filed"
                },
                {
                    "id": 13,
                    "clientId": "nope",
                    "service": "GST Return"
                },
                {
                    "id": 14,
                    "clientId": "1710000000000",
                    "service": "Astrology"
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn imports_valid_and_reports_rest() {
        let report = import(&export(), 1024);
        assert_eq!(report.clients.len(), 1);
        assert_eq!(report.submissions.len(), 2);
        assert_eq!(report.orphaned.len(), 1);
        assert_eq!(report.orphaned[0].legacy_client_id, "nope");
        assert_eq!(report.rejected.len(), 2);
        assert!(!report.is_clean());

        let rejected_client = &report.rejected[0];
        assert_eq!(rejected_client.collection, LegacyCollection::Clients);
        assert_eq!(rejected_client.legacy_id.as_deref(), Some("2"));
    }

    #[test]
    fn submission_links_to_legacy_profile() {
        let report = import(&export(), 1024);
        let client = &report.clients[0];
        let gst = &report.submissions[0];
        assert_eq!(gst.client_id, client.id);
        assert_eq!(client.profile(gst.profile_id).unwrap().service, ServiceKind::GstReturn);
        assert_eq!(gst.documents.len(), 2);
        assert_eq!(gst.documents[0].kind, DocumentKind::SalesRegister);
        assert_eq!(gst.status_label, "Processing");
        assert_eq!(gst.created_at.to_iso8601(), "2024-03-10T12:00:00Z");
    }

    #[test]
    fn legacy_ids_read_from_raw_records() {
        let report = import(&export(), 1024);
        assert_eq!(report.submissions[0].legacy_id.as_deref(), Some("11"));
        assert_eq!(report.submissions[1].legacy_id.as_deref(), Some("12"));
        assert_eq!(report.orphaned[0].legacy_id.as_deref(), Some("13"));
    }

    #[test]
    fn unmatched_submission_gets_new_profile() {
        let report = import(&export(), 1024);
        let client = &report.clients[0];
        assert_eq!(client.profiles.len(), 2);
        let itr = &report.submissions[1];
        assert_eq!(client.profile(itr.profile_id).unwrap().service, ServiceKind::IncomeTaxReturn);
    }

    #[test]
    fn client_fields_carried_over() {
        let report = import(&export(), 1024);
        let client = &report.clients[0];
        assert_eq!(client.created_by.role, Role::Customer);
        assert_eq!(client.created_by.id, "9999999999");
        assert_eq!(client.created_at.to_iso8601(), "2024-03-10T10:00:00Z");
        assert_eq!(
            client.gst_credentials.as_ref().unwrap().gstin.as_str(),
            "27ABCDE1234F1Z5"
        );
    }

    #[test]
    fn oversized_document_rejects_submission() {
        let report = import(&export(), 2);
        assert_eq!(report.submissions.len(), 1);
        assert!(report
            .rejected
            .iter()
            .any(|r| r.collection == LegacyCollection::Submissions && r.legacy_id.as_deref() == Some("11")));
    }

    #[test]
    fn accepts_plain_submissions_key() {
        let export = LegacyExport::from_json(r#"{"clients": [], "submissions": [{"clientId": "x", "service": "TDS"}]}"#).unwrap();
        let report = import(&export, 1024);
        assert_eq!(report.orphaned.len(), 1);
    }
}
