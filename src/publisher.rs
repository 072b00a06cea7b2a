use tracing::{debug, trace};

use crate::cluster::{ClusterObjects, ServiceDescriptor};
use crate::relation::{DataBag, RelationView};
use crate::signal::RelationName;
use crate::Result;

/// Writes the entries of `data` that differ from what this unit already
/// published. Returns whether anything was written.
async fn publish_changed(
    view: &dyn RelationView,
    relation: RelationName,
    data: DataBag,
) -> Result<bool> {
    let current = view.local_data(relation).await?;
    let changed: DataBag = data
        .into_iter()
        .filter(|(key, value)| current.get(key) != Some(value))
        .collect();

    if changed.is_empty() {
        trace!(%relation, "Relation data already up to date");
        return Ok(false);
    }

    debug!(%relation, keys = ?changed.keys().collect::<Vec<_>>(), "Publishing relation data");
    view.publish(relation, &changed).await?;

    Ok(true)
}

pub async fn publish_username(view: &dyn RelationView, username: &str) -> Result<bool> {
    publish_changed(
        view,
        RelationName::KeystoneCredentials,
        DataBag::from([("username".to_owned(), username.to_owned())]),
    )
    .await
}

pub fn certificate_request(address: &str, unit_name: &str) -> Result<DataBag> {
    Ok(DataBag::from([
        ("common_name".to_owned(), address.to_owned()),
        ("sans".to_owned(), serde_json::to_string(&[address])?),
        ("unit_name".to_owned(), unit_name.to_owned()),
    ]))
}

/// Requests a server certificate for the webhook Service's cluster address.
///
/// Nothing is published if the address cannot be resolved.
pub async fn publish_certificate_request(
    view: &dyn RelationView,
    cluster: &dyn ClusterObjects,
    descriptor: &ServiceDescriptor,
    unit_name: &str,
) -> Result<bool> {
    let address = cluster.resolve_address(descriptor).await?;
    trace!(address, "Resolved webhook address");

    publish_changed(
        view,
        RelationName::TlsCertificates,
        certificate_request(&address, unit_name)?,
    )
    .await
}
