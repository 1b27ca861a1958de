//! # Page Access Policy
//!
//! Decides which view a caller gets for a requested page, given every role
//! they are currently authenticated as.
//!
//! ## Dispatch
//!
//! ```text
//! loading                        → Loading
//! Login(role), role signed in    → Redirect(role dashboard)
//! public page                    → Render(page)
//! restricted, audience matched   → Render(page)
//! restricted, not matched        → Login(first role of audience), page kept
//! Unknown                        → dashboard of first signed-in role, else Home
//! ```
//!
//! Record-level checks (which clients, submissions and tasks a principal
//! may see) go through [`can_access`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use ce_core::{AssociateTask, Client, ClientId, Principal, Role, ServiceKind, SubmissionId, TaskId};
use ce_state::Submission;

/// A page, with its parameters decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Page {
    Home,
    About,
    Services,
    Pricing,
    Contact,
    Login(Role),
    Dashboard(Role),
    /// Start an application for a service (registration, incorporation, ...).
    ServiceApplication(ServiceKind),
    GstReturn,
    IncomeTaxReturn,
    AddClient,
    ClientDetails(ClientId),
    Submission(SubmissionId),
    CorporateEntities,
    AdminAccounts,
    AdminClients,
    AssociateTask(TaskId),
    Unknown(String),
}

/// Who may see a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Public,
    Only(Role),
    /// Any of the listed roles; the first is the login offered.
    AnyOf(&'static [Role]),
}

impl Audience {
    pub fn admits(&self, role: Role) -> bool {
        match self {
            Self::Public => true,
            Self::Only(r) => *r == role,
            Self::AnyOf(roles) => roles.contains(&role),
        }
    }

    /// The login page to show a caller outside the audience.
    pub fn login_role(&self) -> Option<Role> {
        match self {
            Self::Public => None,
            Self::Only(r) => Some(*r),
            Self::AnyOf(roles) => roles.first().copied(),
        }
    }
}

/// Pages reachable by a customer or by the agent working on their behalf.
pub const SHARED: &[Role] = &[Role::Customer, Role::Agent];

impl Page {
    pub fn audience(&self) -> Audience {
        match self {
            Self::Home
            | Self::About
            | Self::Services
            | Self::Pricing
            | Self::Contact
            | Self::Login(_)
            | Self::Unknown(_) => Audience::Public,
            Self::Dashboard(role) => Audience::Only(*role),
            Self::ServiceApplication(_) => Audience::Only(Role::Customer),
            Self::GstReturn
            | Self::IncomeTaxReturn
            | Self::ClientDetails(_)
            | Self::Submission(_) => Audience::AnyOf(SHARED),
            Self::AddClient => Audience::Only(Role::Agent),
            Self::CorporateEntities => Audience::Only(Role::Corporate),
            Self::AdminAccounts | Self::AdminClients => Audience::Only(Role::Admin),
            Self::AssociateTask(_) => Audience::Only(Role::Associate),
        }
    }

    /// Decode the slash-separated string form, e.g. `associate-task/<uuid>`.
    /// Unrecognized names and malformed parameters yield [`Page::Unknown`].
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim().trim_matches('/');
        let unknown = || Self::Unknown(trimmed.to_string());
        let (name, param) = match trimmed.split_once('/') {
            Some((name, param)) => (name, Some(param)),
            None => (trimmed, None),
        };
        match (name, param) {
            ("" | "home", None) => Self::Home,
            ("about", None) => Self::About,
            ("services", None) => Self::Services,
            ("pricing", None) => Self::Pricing,
            ("contact", None) => Self::Contact,
            ("gst-return", None) => Self::GstReturn,
            ("income-tax-return", None) => Self::IncomeTaxReturn,
            ("add-client", None) => Self::AddClient,
            ("corporate-entities", None) => Self::CorporateEntities,
            ("admin-accounts", None) => Self::AdminAccounts,
            ("admin-clients", None) => Self::AdminClients,
            ("apply", Some(service)) => ServiceKind::parse_lenient(service)
                .map(Self::ServiceApplication)
                .unwrap_or_else(|_| unknown()),
            ("client-details", Some(id)) => ClientId::from_str(id)
                .map(Self::ClientDetails)
                .unwrap_or_else(|_| unknown()),
            ("submission", Some(id)) => SubmissionId::from_str(id)
                .map(Self::Submission)
                .unwrap_or_else(|_| unknown()),
            ("associate-task", Some(id)) => TaskId::from_str(id)
                .map(Self::AssociateTask)
                .unwrap_or_else(|_| unknown()),
            (other, None) => {
                if let Some(role) = other.strip_suffix("-login") {
                    return Role::from_str(role).map(Self::Login).unwrap_or_else(|_| unknown());
                }
                if let Some(role) = other.strip_suffix("-dashboard") {
                    return Role::from_str(role)
                        .map(Self::Dashboard)
                        .unwrap_or_else(|_| unknown());
                }
                unknown()
            }
            _ => unknown(),
        }
    }
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Home => f.write_str("home"),
            Self::About => f.write_str("about"),
            Self::Services => f.write_str("services"),
            Self::Pricing => f.write_str("pricing"),
            Self::Contact => f.write_str("contact"),
            Self::Login(role) => write!(f, "{role}-login"),
            Self::Dashboard(role) => write!(f, "{role}-dashboard"),
            Self::ServiceApplication(service) => write!(f, "apply/{service}"),
            Self::GstReturn => f.write_str("gst-return"),
            Self::IncomeTaxReturn => f.write_str("income-tax-return"),
            Self::AddClient => f.write_str("add-client"),
            Self::ClientDetails(id) => write!(f, "client-details/{id}"),
            Self::Submission(id) => write!(f, "submission/{id}"),
            Self::CorporateEntities => f.write_str("corporate-entities"),
            Self::AdminAccounts => f.write_str("admin-accounts"),
            Self::AdminClients => f.write_str("admin-clients"),
            Self::AssociateTask(id) => write!(f, "associate-task/{id}"),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for Page {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Page {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Authentication state across all roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub principals: Vec<Principal>,
    /// Some role context has not finished resolving yet.
    pub loading: bool,
}

impl AuthSnapshot {
    pub fn new(principals: Vec<Principal>) -> Self {
        Self {
            principals,
            loading: false,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.principals.iter().any(|p| p.role() == role)
    }

    /// The first signed-in role in provider order.
    pub fn primary_role(&self) -> Option<Role> {
        Role::ALL.into_iter().find(|r| self.has_role(*r))
    }
}

/// What to show for a page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    /// Authentication still resolving; show a placeholder.
    Loading,
    /// Show the page.
    Render {
        #[schema(value_type = String)]
        page: Page,
    },
    /// Navigate to another page.
    Redirect {
        #[schema(value_type = String)]
        page: Page,
    },
    /// Show the login for `role` in place of `requested`.
    Login {
        role: Role,
        #[schema(value_type = String)]
        requested: Page,
    },
}

/// Resolve `page` for the callers in `snapshot`.
pub fn dispatch(page: Page, snapshot: &AuthSnapshot) -> View {
    if snapshot.loading {
        return View::Loading;
    }
    match page {
        Page::Login(role) if snapshot.has_role(role) => View::Redirect {
            page: Page::Dashboard(role),
        },
        Page::Unknown(_) => View::Render {
            page: snapshot
                .primary_role()
                .map(Page::Dashboard)
                .unwrap_or(Page::Home),
        },
        page => {
            let audience = page.audience();
            match audience.login_role() {
                None => View::Render { page },
                Some(_) if snapshot.principals.iter().any(|p| audience.admits(p.role())) => {
                    View::Render { page }
                }
                Some(role) => View::Login {
                    role,
                    requested: page,
                },
            }
        }
    }
}

// -- Record-level access ------------------------------------------------------

/// Something a principal may or may not see.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Page(&'a Page),
    Client(&'a Client),
    /// A submission together with the client it belongs to.
    Submission {
        submission: &'a Submission,
        client: &'a Client,
    },
    Task(&'a AssociateTask),
}

/// The single authorization check for records.
///
/// Customers see clients registered to their mobile number; agents see
/// clients assigned to them; corporates see clients they created; admins see
/// everything; associates see only tasks assigned to their PAN.
pub fn can_access(principal: &Principal, resource: Resource<'_>) -> bool {
    match resource {
        Resource::Page(page) => page.audience().admits(principal.role()),
        Resource::Client(client) => client_visible(principal, client),
        Resource::Submission { submission, client } => {
            submission.client_id == client.id && client_visible(principal, client)
        }
        Resource::Task(task) => match principal {
            Principal::Admin { .. } => true,
            Principal::Associate { pan } => &task.associate_pan == pan,
            _ => false,
        },
    }
}

fn client_visible(principal: &Principal, client: &Client) -> bool {
    match principal {
        Principal::Customer { mobile_number, .. } => client.is_owned_by(mobile_number),
        Principal::Agent { username } => client.is_assigned_to(username.as_str()),
        Principal::Corporate { username } => {
            client.was_created_by(Role::Corporate, username.as_str())
        }
        Principal::Admin { .. } => true,
        Principal::Associate { .. } => false,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
