//! # Clients and Profiles
//!
//! A [`Client`] is a legal entity (person, firm or company) on whose behalf
//! filings are made. One customer mobile number may own several clients;
//! the entity switcher picks between them.
//!
//! Each service application adds a [`Profile`] to the client, carrying the
//! data extracted from the application form. Submissions point back at the
//! profile that produced them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{require_text, ValidationError};
use crate::identity::{ClientId, Email, Gstin, MobileNumber, Pan, ProfileId};
use crate::principal::{Principal, Role};
use crate::service::ServiceKind;
use crate::temporal::Timestamp;

/// Maximum length of a client name, in characters.
pub const MAX_NAME_CHARS: usize = 200;

/// Legal form of a client entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Individual,
    SoleProprietorship,
    Partnership,
    Llp,
    PrivateLimited,
    PublicLimited,
    Trust,
    Huf,
}

impl EntityType {
    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Individual => "Individual",
            Self::SoleProprietorship => "Sole Proprietorship",
            Self::Partnership => "Partnership Firm",
            Self::Llp => "LLP",
            Self::PrivateLimited => "Private Limited Company",
            Self::PublicLimited => "Public Limited Company",
            Self::Trust => "Trust",
            Self::Huf => "HUF",
        }
    }

    /// Parse a wire name or display label, ignoring case and punctuation.
    pub fn parse_label(s: &str) -> Result<Self, ValidationError> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let kind = match key.as_str() {
            "individual" | "proprietor" => Self::Individual,
            "soleproprietorship" | "proprietorship" => Self::SoleProprietorship,
            "partnership" | "partnershipfirm" => Self::Partnership,
            "llp" | "limitedliabilitypartnership" => Self::Llp,
            "privatelimited" | "privatelimitedcompany" | "pvtltd" => Self::PrivateLimited,
            "publiclimited" | "publiclimitedcompany" | "ltd" => Self::PublicLimited,
            "trust" => Self::Trust,
            "huf" | "hinduundividedfamily" => Self::Huf,
            _ => return Err(ValidationError::UnknownEntityType(s.to_string())),
        };
        Ok(kind)
    }
}

/// Who created a client record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreatedBy {
    /// Role of the creator.
    pub role: Role,
    /// Natural key of the creator (mobile, username or PAN).
    pub id: String,
}

impl CreatedBy {
    /// Attribution for a principal.
    pub fn from_principal(principal: &Principal) -> Self {
        Self {
            role: principal.role(),
            id: principal.subject().to_string(),
        }
    }
}

/// GST portal credentials captured by the GST return wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GstCredentials {
    pub gstin: Gstin,
    pub portal_username: String,
}

/// Income-tax portal credentials captured by the ITR wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ItrCredentials {
    pub pan: Pan,
    pub portal_user_id: String,
}

/// Data captured by one service application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: ProfileId,
    pub service: ServiceKind,
    /// Free-form form data, stored as submitted.
    #[schema(value_type = Object)]
    pub extracted_data: Value,
    pub created_at: Timestamp,
}

impl Profile {
    /// A fresh profile for `service`.
    pub fn new(service: ServiceKind, extracted_data: Value) -> Self {
        Self {
            id: ProfileId::new(),
            service,
            extracted_data,
            created_at: Timestamp::now(),
        }
    }
}

/// Validated input for creating a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    pub name: String,
    pub mobile_number: MobileNumber,
    pub email: Email,
    pub entity_type: EntityType,
    pub pan: Option<Pan>,
}

impl NewClient {
    /// Validate raw form fields.
    ///
    /// An empty or whitespace-only `pan` is treated as absent.
    pub fn parse(
        name: &str,
        mobile_number: &str,
        email: &str,
        entity_type: &str,
        pan: Option<&str>,
    ) -> Result<Self, ValidationError> {
        require_text("name", name, MAX_NAME_CHARS)?;
        let pan = match pan.map(str::trim) {
            Some(p) if !p.is_empty() => Some(Pan::new(p)?),
            _ => None,
        };
        Ok(Self {
            name: name.trim().to_string(),
            mobile_number: MobileNumber::new(mobile_number)?,
            email: Email::new(email)?,
            entity_type: EntityType::parse_label(entity_type)?,
            pan,
        })
    }
}

/// A client entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub mobile_number: MobileNumber,
    pub email: Email,
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan: Option<Pan>,
    pub created_by: CreatedBy,
    /// Username of the agent working this client, if assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gst_credentials: Option<GstCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itr_credentials: Option<ItrCredentials>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Client {
    /// Create a client from validated input. An agent creating a client is
    /// assigned to it automatically.
    pub fn create(new: NewClient, created_by: CreatedBy) -> Self {
        let now = Timestamp::now();
        let assigned_agent = (created_by.role == Role::Agent).then(|| created_by.id.clone());
        Self {
            id: ClientId::new(),
            name: new.name,
            mobile_number: new.mobile_number,
            email: new.email,
            entity_type: new.entity_type,
            pan: new.pan,
            created_by,
            assigned_agent,
            profiles: Vec::new(),
            gst_credentials: None,
            itr_credentials: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a customer with this mobile number owns the client.
    pub fn is_owned_by(&self, mobile: &MobileNumber) -> bool {
        &self.mobile_number == mobile
    }

    /// Whether the client is assigned to the agent `username`.
    pub fn is_assigned_to(&self, username: &str) -> bool {
        self.assigned_agent.as_deref() == Some(username)
    }

    /// Whether the client was created by the given role and subject.
    pub fn was_created_by(&self, role: Role, id: &str) -> bool {
        self.created_by.role == role && self.created_by.id == id
    }

    /// Look up a profile by id.
    pub fn profile(&self, id: ProfileId) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Append a profile and bump `updated_at`.
    pub fn add_profile(&mut self, profile: Profile) {
        self.profiles.push(profile);
        self.touch();
    }

    /// Bump `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> NewClient {
        NewClient::parse(
            "Sharma Traders",
            "9876543210",
            "accounts@sharma.in",
            "Partnership Firm",
            Some(" "),
        )
        .unwrap()
    }

    #[test]
    fn parse_validates_fields() {
        let new = sample();
        assert_eq!(new.entity_type, EntityType::Partnership);
        assert!(new.pan.is_none());

        assert!(NewClient::parse("", "9876543210", "a@b.in", "llp", None).is_err());
        assert!(NewClient::parse("X", "98765", "a@b.in", "llp", None).is_err());
        assert!(NewClient::parse("X", "9876543210", "nope", "llp", None).is_err());
        assert!(NewClient::parse("X", "9876543210", "a@b.in", "cooperative", None).is_err());
        assert!(NewClient::parse("X", "9876543210", "a@b.in", "llp", Some("BAD")).is_err());
    }

    #[test]
    fn name_length_is_bounded() {
        let long = "a".repeat(MAX_NAME_CHARS + 1);
        let err = NewClient::parse(&long, "9876543210", "a@b.in", "llp", None).unwrap_err();
        assert!(matches!(err, ValidationError::TooLong { field: "name", .. }));
    }

    #[test]
    fn agent_created_client_is_self_assigned() {
        let client = Client::create(
            sample(),
            CreatedBy {
                role: Role::Agent,
                id: "partner1".into(),
            },
        );
        assert!(client.is_assigned_to("partner1"));
        assert!(client.was_created_by(Role::Agent, "partner1"));
    }

    #[test]
    fn customer_created_client_is_unassigned() {
        let client = Client::create(
            sample(),
            CreatedBy {
                role: Role::Customer,
                id: "9876543210".into(),
            },
        );
        assert!(client.assigned_agent.is_none());
        assert!(client.is_owned_by(&MobileNumber::new("9876543210").unwrap()));
    }

    #[test]
    fn add_profile_is_findable() {
        let mut client = Client::create(
            sample(),
            CreatedBy {
                role: Role::Admin,
                id: "admin".into(),
            },
        );
        let profile = Profile::new(ServiceKind::GstReturn, json!({"period": "2024-03"}));
        let id = profile.id;
        client.add_profile(profile);
        assert_eq!(client.profile(id).unwrap().service, ServiceKind::GstReturn);
        assert!(client.updated_at >= client.created_at);
    }
}
