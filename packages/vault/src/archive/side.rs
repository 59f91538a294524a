use common::Side;
use serde::Deserialize;

/// Rules mapping an archive entry path to its install path and side.
#[derive(Debug, Deserialize, Clone)]
pub struct SideRules {
    /// Top-level folder holding client-only mods. Default: "client-mods/".
    #[serde(default = "default_client_only_prefix")]
    pub client_only_prefix: String,
    /// Top-level folder holding server-only mods. Default: "server-mods/".
    #[serde(default = "default_server_only_prefix")]
    pub server_only_prefix: String,
    /// Folder both of the above are rewritten to. Default: "mods/".
    #[serde(default = "default_shared_folder")]
    pub shared_folder: String,
    /// Folders whose contents only the client uses (shader and resource packs).
    #[serde(default = "default_client_folders")]
    pub client_folders: Vec<String>,
    /// Case-insensitive substrings marking a client-only file anywhere in the path.
    #[serde(default = "default_client_markers")]
    pub client_markers: Vec<String>,
}

fn default_client_only_prefix() -> String {
    "client-mods/".into()
}
fn default_server_only_prefix() -> String {
    "server-mods/".into()
}
fn default_shared_folder() -> String {
    "mods/".into()
}
fn default_client_folders() -> Vec<String> {
    vec!["shaderpacks/".into(), "resourcepacks/".into()]
}
fn default_client_markers() -> Vec<String> {
    vec!["optifine".into(), "tlskincape".into()]
}

impl Default for SideRules {
    fn default() -> Self {
        Self {
            client_only_prefix: default_client_only_prefix(),
            server_only_prefix: default_server_only_prefix(),
            shared_folder: default_shared_folder(),
            client_folders: default_client_folders(),
            client_markers: default_client_markers(),
        }
    }
}

/// Install path and side chosen for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub install_path: String,
    pub side: Side,
}

impl SideRules {
    /// Classify a sanitized entry path.
    ///
    /// Folder rules are checked in order and the first match wins; a client
    /// marker anywhere in the path then forces `CLIENT` regardless.
    pub fn classify(&self, path: &str) -> Placement {
        let (install_path, mut side) = if let Some(rest) = path.strip_prefix(&self.client_only_prefix)
        {
            (format!("{}{rest}", self.shared_folder), Side::Client)
        } else if let Some(rest) = path.strip_prefix(&self.server_only_prefix) {
            (format!("{}{rest}", self.shared_folder), Side::Server)
        } else if self
            .client_folders
            .iter()
            .any(|folder| path.starts_with(folder.as_str()))
        {
            (path.to_string(), Side::Client)
        } else {
            (path.to_string(), Side::Both)
        };

        let lower = path.to_lowercase();
        if self
            .client_markers
            .iter()
            .any(|marker| lower.contains(&marker.to_lowercase()))
        {
            side = Side::Client;
        }

        Placement { install_path, side }
    }
}
