//! Backend entity GUIDs.
//!
//! GUIDs follow the format the message-queue UI expects:
//! `accountId|INFRA|ENTITYTYPE|base64(identifier)`, where the identifier is
//! `cluster:account` for clusters and `cluster:account:localId` otherwise.

use crate::core::types::{CompositeKey, EntityType};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Builds the GUID of the entity identified by `key` in `account_id`.
pub fn entity_guid(key: &CompositeKey, account_id: &str) -> String {
    let identifier = match key.entity_type {
        EntityType::Cluster => format!("{}:{}", key.cluster, account_id),
        EntityType::Broker | EntityType::Topic => {
            format!("{}:{}:{}", key.cluster, account_id, key.local_id)
        }
    };

    format!(
        "{}|INFRA|{}|{}",
        account_id,
        key.entity_type.as_str(),
        STANDARD.encode(identifier.as_bytes())
    )
}
