//! Typed connection strings.
//!
//! `Display` produces the exact canonical form; `FromStr` accepts the
//! canonical form plus common key aliases, in any order and case.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AgentError;

/// Split `k=v;k=v` into pairs. Keys are lowercased and stripped of spaces.
fn pairs(s: &str) -> Result<Vec<(String, String)>, AgentError> {
    s.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (k, v) = part
                .split_once('=')
                .ok_or_else(|| AgentError::InvalidConnectionString(format!("'{part}' is not key=value")))?;
            let key: String = k.chars().filter(|c| !c.is_whitespace()).collect();
            Ok((key.to_ascii_lowercase(), v.trim().to_string()))
        })
        .collect()
}

fn required(value: Option<String>, key: &str) -> Result<String, AgentError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AgentError::InvalidConnectionString(format!("missing {key}")))
}

// ---------------------------------------------------------------------------
// Durable Task Scheduler
// ---------------------------------------------------------------------------

pub const DTS_EMULATOR_ENDPOINT: &str = "http://localhost:8080";
pub const DTS_EMULATOR_TASK_HUB: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DtsAuthentication {
    None,
    DefaultAzure,
    ManagedIdentity,
}

impl DtsAuthentication {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::DefaultAzure => "DefaultAzure",
            Self::ManagedIdentity => "ManagedIdentity",
        }
    }
}

impl FromStr for DtsAuthentication {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "defaultazure" => Ok(Self::DefaultAzure),
            "managedidentity" => Ok(Self::ManagedIdentity),
            other => Err(AgentError::InvalidConnectionString(format!(
                "unknown authentication '{other}'"
            ))),
        }
    }
}

/// `Endpoint=<url>;Authentication=<kind>[;ClientID=<id>][;TaskHub=<name>]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtsConnectionString {
    pub endpoint: String,
    pub authentication: DtsAuthentication,
    pub client_id: Option<String>,
    pub task_hub: Option<String>,
}

impl DtsConnectionString {
    pub fn emulator() -> Self {
        Self {
            endpoint: DTS_EMULATOR_ENDPOINT.to_string(),
            authentication: DtsAuthentication::None,
            client_id: None,
            task_hub: None,
        }
    }

    pub fn azure(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            authentication: DtsAuthentication::DefaultAzure,
            client_id: None,
            task_hub: None,
        }
    }
}

impl fmt::Display for DtsConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Endpoint={};Authentication={}",
            self.endpoint,
            self.authentication.as_str()
        )?;
        if let Some(id) = &self.client_id {
            write!(f, ";ClientID={id}")?;
        }
        if let Some(hub) = &self.task_hub {
            write!(f, ";TaskHub={hub}")?;
        }
        Ok(())
    }
}

impl FromStr for DtsConnectionString {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mut endpoint, mut auth, mut client_id, mut task_hub) = (None, None, None, None);
        for (k, v) in pairs(s)? {
            match k.as_str() {
                "endpoint" => endpoint = Some(v),
                "authentication" => auth = Some(v),
                "clientid" => client_id = Some(v),
                "taskhub" => task_hub = Some(v),
                _ => {}
            }
        }
        Ok(Self {
            endpoint: required(endpoint, "Endpoint")?,
            authentication: required(auth, "Authentication")?.parse()?,
            client_id: client_id.filter(|v| !v.is_empty()),
            task_hub: task_hub.filter(|v| !v.is_empty()),
        })
    }
}

// ---------------------------------------------------------------------------
// SQL
// ---------------------------------------------------------------------------

pub const SQL_HOST_SUFFIX: &str = ".database.windows.net";
pub const SQL_PORT: u16 = 1433;

/// `Server=<server>.database.windows.net,1433;Database=<db>;User=<user>;Password=<password>`
///
/// `server` is the short server name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlConnectionString {
    pub server: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl fmt::Display for SqlConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Server={}{SQL_HOST_SUFFIX},{SQL_PORT};Database={};User={};Password={}",
            self.server, self.database, self.user, self.password
        )
    }
}

/// `tcp:name.database.windows.net,1433` -> `name`
fn short_server_name(value: &str) -> String {
    let host = value.trim().trim_start_matches("tcp:");
    let host = host.split(',').next().unwrap_or(host);
    host.strip_suffix(SQL_HOST_SUFFIX).unwrap_or(host).to_string()
}

impl FromStr for SqlConnectionString {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mut server, mut database, mut user, mut password) = (None, None, None, None);
        for (k, v) in pairs(s)? {
            match k.as_str() {
                "server" | "datasource" | "address" => server = Some(short_server_name(&v)),
                "database" | "initialcatalog" => database = Some(v),
                "user" | "userid" | "uid" => user = Some(v),
                "password" | "pwd" => password = Some(v),
                _ => {}
            }
        }
        Ok(Self {
            server: required(server, "Server")?,
            database: required(database, "Database")?,
            user: required(user, "User")?,
            password: required(password, "Password")?,
        })
    }
}

/// Accept any SQL connection string that names a server and a database.
///
/// Used for strings the user supplies directly, which may use other
/// authentication modes than user and password.
pub fn validate_sql_connection_string(s: &str) -> Result<(), AgentError> {
    let found = pairs(s)?;
    let has = |keys: &[&str]| found.iter().any(|(k, v)| keys.contains(&k.as_str()) && !v.is_empty());
    if !has(&["server", "datasource", "address"]) {
        return Err(AgentError::InvalidConnectionString("missing Server".into()));
    }
    if !has(&["database", "initialcatalog"]) {
        return Err(AgentError::InvalidConnectionString("missing Database".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

pub const STORAGE_EMULATOR_CONNECTION: &str = "UseDevelopmentStorage=true";
