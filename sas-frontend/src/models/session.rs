use serde::{Deserialize, Deserializer, Serialize};

/// Operator role, ordered by privilege: `Admin > Attendant > Viewer`.
///
/// The backend historically used Portuguese names (`atendente`,
/// `visualizador`); both spellings are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(alias = "atendente")]
    Attendant,
    #[serde(alias = "visualizador")]
    Viewer,
}

impl Role {
    pub fn priority(self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::Attendant => 2,
            Role::Viewer => 1,
        }
    }

    /// Whether a holder of `self` may access something requiring `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self.priority() >= required.priority()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Attendant => "attendant",
            Role::Viewer => "viewer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub email: String,
    #[serde(default, alias = "nome", alias = "name")]
    pub display_name: String,
    #[serde(alias = "tipo")]
    pub role: Role,
}

impl User {
    /// Name shown in the header; falls back to the mailbox part of the email.
    pub fn label(&self) -> &str {
        if !self.display_name.is_empty() {
            return &self.display_name;
        }
        self.email.split('@').next().unwrap_or("usuário")
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// The persisted unit. Always written and read whole so a token can never
/// be observed next to a user from another login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub user: User,
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Epoch milliseconds at which `access_token` stops being valid.
    pub expires_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
}

/// Read-only view of the session handed to presentation code.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub user: Option<User>,
    /// False until the bootstrap check has finished.
    pub resolved: bool,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Outcome of checking a protected route against the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Bootstrap still running; show a loading indicator.
    Pending,
    RedirectToLogin,
    /// Authenticated but the role is too low.
    Forbidden,
    Allow,
}
