use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoResultExt, Result};

/// history length used when `summary-history-length` is unset or zero
pub const DEFAULT_SUMMARY_HISTORY_LENGTH: u32 = 16;

/// repository configuration stored in config.toml
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// object store settings
    #[serde(default)]
    pub core: CoreConfig,
    /// publishing settings consumed by summary generation
    #[serde(default)]
    pub flatpak: FlatpakConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
}

/// the `[flatpak]` group
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlatpakConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deploy_collection_id: bool,
    /// hex-encoded public key material advertised to clients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpg_keys: Option<String>,
    /// restricts the compat summary to these arches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_arches: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_history_length: Option<u32>,
}

impl Config {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    /// number of historical digests kept per partition in the summary index
    pub fn summary_history_length(&self) -> u32 {
        match self.flatpak.summary_history_length {
            None | Some(0) => DEFAULT_SUMMARY_HISTORY_LENGTH,
            Some(n) => n,
        }
    }

    /// arches the compat summary is limited to, if configured
    pub fn summary_arches(&self) -> Option<&[String]> {
        self.flatpak.summary_arches.as_deref()
    }

    /// decoded gpg key material
    pub fn gpg_keys(&self) -> Result<Option<Vec<u8>>> {
        match &self.flatpak.gpg_keys {
            None => Ok(None),
            Some(encoded) => hex::decode(encoded.trim())
                .map(Some)
                .map_err(|e| Error::InvalidConfigValue {
                    key: "flatpak.gpg-keys".to_string(),
                    message: e.to_string(),
                }),
        }
    }

    pub fn collection_id(&self) -> Option<&str> {
        self.core.collection_id.as_deref()
    }
}
