use crate::config::{self, ConfigEntity};
use crate::error::{Error, Result};
use crate::output::MergeResult;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    #[serde(skip_deserializing, default)]
    pub id: String,
    pub host: String,
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl Server {
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty() && !self.user.is_empty()
    }

    pub fn generate_id(host: &str) -> String {
        format!("server-{}", host.replace('.', "-"))
    }
}

impl ConfigEntity for Server {
    fn id(&self) -> &str {
        &self.id
    }
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn config_path(id: &str) -> Result<PathBuf> {
        paths::server(id)
    }
    fn config_dir() -> Result<PathBuf> {
        paths::servers()
    }
    fn not_found_error(id: String, suggestions: Vec<String>) -> Error {
        Error::server_not_found(id, suggestions)
    }
    fn entity_type() -> &'static str {
        "server"
    }
    fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.host.trim().is_empty() {
            missing.push("host".to_string());
        }
        if self.user.trim().is_empty() {
            missing.push("user".to_string());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::ssh_server_invalid(self.id.clone(), missing))
        }
    }
}

// ============================================================================
// Core CRUD - Thin wrappers around config module
// ============================================================================

pub fn load(id: &str) -> Result<Server> {
    config::load::<Server>(id)
}

pub fn list() -> Result<Vec<Server>> {
    config::list::<Server>()
}

pub fn save(server: &Server) -> Result<()> {
    config::save(server)
}

pub fn delete(id: &str) -> Result<()> {
    config::delete::<Server>(id)
}

pub fn exists(id: &str) -> bool {
    config::exists::<Server>(id)
}

pub fn create(json_spec: &str) -> Result<Server> {
    config::create::<Server>(json_spec, None)
}

pub fn merge(id: &str, json_spec: &str) -> Result<MergeResult> {
    config::merge::<Server>(id, json_spec)
}

/// Register a server from CLI flags, deriving the ID from the host when absent.
pub fn create_from_flags(
    id: Option<String>,
    host: String,
    user: String,
    port: Option<u16>,
    identity_file: Option<String>,
) -> Result<Server> {
    let id = id.unwrap_or_else(|| Server::generate_id(&host));
    if exists(&id) {
        return Err(Error::validation_invalid_argument(
            "server.id",
            format!("server '{}' already exists", id),
            Some(id),
            None,
        ));
    }

    let server = Server {
        id,
        host,
        user,
        port: port.unwrap_or_else(default_port),
        identity_file,
    };
    save(&server)?;
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_id_replaces_dots() {
        assert_eq!(Server::generate_id("web1.example.com"), "server-web1-example-com");
    }

    #[test]
    fn deserialize_defaults_port() {
        let server: Server =
            serde_json::from_str(r#"{"host":"web1.example.com","user":"deploy"}"#).unwrap();
        assert_eq!(server.port, 22);
        assert!(server.identity_file.is_none());
        assert!(server.is_valid());
    }

    #[test]
    fn validate_reports_missing_fields() {
        let server = Server {
            id: "web1".to_string(),
            host: String::new(),
            user: " ".to_string(),
            port: 22,
            identity_file: None,
        };
        let err = server.validate().unwrap_err();
        assert_eq!(err.code.as_str(), "ssh.server_invalid");
        assert_eq!(err.details["missingFields"][0], "host");
        assert_eq!(err.details["missingFields"][1], "user");
    }
}
