//! # Roles and Principals
//!
//! A [`Principal`] is whoever is authenticated on a session. The five roles
//! have different natural keys: customers log in with a mobile number,
//! associates with their PAN, everyone else with a username.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ValidationError;
use crate::identity::{ClientId, MobileNumber, Pan, Username};

/// The five authentication roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Individual or business owner filing on their own behalf.
    Customer,
    /// Partner agent (tax professional) working on assigned clients.
    Agent,
    /// Corporate account managing its own group entities.
    Corporate,
    /// Platform administrator.
    Admin,
    /// Field associate working tasks assigned by an admin.
    Associate,
}

impl Role {
    /// All roles, in provider order.
    pub const ALL: [Role; 5] = [
        Role::Customer,
        Role::Agent,
        Role::Corporate,
        Role::Admin,
        Role::Associate,
    ];

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Agent => "agent",
            Self::Corporate => "corporate",
            Self::Admin => "admin",
            Self::Associate => "associate",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "agent" | "partner" => Ok(Self::Agent),
            "corporate" => Ok(Self::Corporate),
            "admin" => Ok(Self::Admin),
            "associate" => Ok(Self::Associate),
            _ => Err(ValidationError::UnknownRole(s.to_string())),
        }
    }
}

/// The authenticated party on a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Principal {
    /// Customer identified by mobile number. `active_client_id` is the
    /// entity currently selected in the entity switcher.
    Customer {
        mobile_number: MobileNumber,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        active_client_id: Option<ClientId>,
    },
    /// Partner agent.
    Agent { username: Username },
    /// Corporate account.
    Corporate { username: Username },
    /// Administrator.
    Admin { username: Username },
    /// Associate identified by PAN.
    Associate { pan: Pan },
}

impl Principal {
    /// The role this principal authenticated as.
    pub fn role(&self) -> Role {
        match self {
            Self::Customer { .. } => Role::Customer,
            Self::Agent { .. } => Role::Agent,
            Self::Corporate { .. } => Role::Corporate,
            Self::Admin { .. } => Role::Admin,
            Self::Associate { .. } => Role::Associate,
        }
    }

    /// The natural key of the principal (mobile, username or PAN).
    pub fn subject(&self) -> &str {
        match self {
            Self::Customer { mobile_number, .. } => mobile_number.as_str(),
            Self::Agent { username } | Self::Corporate { username } | Self::Admin { username } => {
                username.as_str()
            }
            Self::Associate { pan } => pan.as_str(),
        }
    }

    /// Subject safe for logs (mobile numbers masked).
    pub fn log_subject(&self) -> String {
        match self {
            Self::Customer { mobile_number, .. } => mobile_number.masked(),
            other => other.subject().to_string(),
        }
    }

    /// The customer's active client, if this is a customer with a selection.
    pub fn active_client_id(&self) -> Option<ClientId> {
        match self {
            Self::Customer { active_client_id, .. } => *active_client_id,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_accepts_partner_alias() {
        assert_eq!("partner".parse::<Role>().unwrap(), Role::Agent);
        assert_eq!(" Admin ".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn principal_role_and_subject() {
        let p = Principal::Associate {
            pan: Pan::new("ABCDE1234F").unwrap(),
        };
        assert_eq!(p.role(), Role::Associate);
        assert_eq!(p.subject(), "ABCDE1234F");
        assert_eq!(p.active_client_id(), None);
    }

    #[test]
    fn customer_log_subject_is_masked() {
        let p = Principal::Customer {
            mobile_number: MobileNumber::new("9876543210").unwrap(),
            active_client_id: None,
        };
        assert_eq!(p.log_subject(), "******3210");
    }

    #[test]
    fn principal_serializes_with_role_tag() {
        let p = Principal::Agent {
            username: Username::new("partner1").unwrap(),
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["role"], "agent");
        assert_eq!(json["username"], "partner1");
        let back: Principal = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }
}
