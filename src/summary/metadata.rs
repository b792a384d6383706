use crate::config::Config;
use crate::error::Result;
use crate::summary::keys;
use crate::types::{MetaDict, MetaValue};

/// repository-wide metadata published in the compat summary and the index
pub fn repo_metadata(config: &Config, last_modified: u64) -> Result<MetaDict> {
    let mut meta = MetaDict::new();
    let flatpak = &config.flatpak;

    let strings = [
        (keys::TITLE, &flatpak.title),
        (keys::COMMENT, &flatpak.comment),
        (keys::DESCRIPTION, &flatpak.description),
        (keys::HOMEPAGE, &flatpak.homepage),
        (keys::ICON, &flatpak.icon),
        (keys::DEFAULT_BRANCH, &flatpak.default_branch),
        (keys::REDIRECT_URL, &flatpak.redirect_url),
        (keys::AUTHENTICATOR_NAME, &flatpak.authenticator_name),
    ];
    for (key, value) in strings {
        if let Some(value) = value {
            meta.insert(key.to_string(), MetaValue::str(value.as_str()));
        }
    }

    if let Some(gpg_keys) = config.gpg_keys()? {
        meta.insert(keys::GPG_KEYS.to_string(), MetaValue::Bytes(gpg_keys));
    }

    if let Some(collection_id) = config.collection_id() {
        meta.insert(keys::COLLECTION_ID.to_string(), MetaValue::str(collection_id));
        if flatpak.deploy_collection_id {
            meta.insert(
                keys::DEPLOY_COLLECTION_ID.to_string(),
                MetaValue::str(collection_id),
            );
        }
    }

    meta.insert(keys::LAST_MODIFIED.to_string(), MetaValue::U64(last_modified));
    Ok(meta)
}
