//! Ownership fetcher: who holds the data that will have to move.
//! Three independent aggregate queries, each degrading on its own.

use tracing::debug;

use crate::error::TransportError;
use crate::model::OwnershipIndex;
use crate::transport::OrgClient;

pub async fn fetch_ownership(client: &OrgClient) -> Result<OwnershipIndex, TransportError> {
    let (users, roles, queues) = tokio::join!(
        client.count("SELECT COUNT() FROM User WHERE IsActive = true", false),
        client.count("SELECT COUNT() FROM UserRole", false),
        client.count("SELECT COUNT() FROM Group WHERE Type = 'Queue'", false),
    );

    let active_users = absorb(users, "active users")?;
    let roles = absorb(roles, "roles")?;
    let queues = absorb(queues, "queues")?;

    let note = if active_users.is_none() && roles.is_none() && queues.is_none() {
        Some("ownership counts could not be retrieved".to_string())
    } else {
        None
    };

    Ok(OwnershipIndex {
        active_users,
        roles,
        queues,
        note,
    })
}

fn absorb(
    result: Result<u32, TransportError>,
    what: &str,
) -> Result<Option<u32>, TransportError> {
    match result {
        Ok(n) => Ok(Some(n)),
        Err(e) if e.is_auth() => Err(e),
        Err(e) => {
            debug!("ownership: {} count failed: {}", what, e);
            Ok(None)
        }
    }
}
