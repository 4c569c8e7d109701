use crate::{
    engine::{AD_IF_RELEVANT, AD_WIN2K_PAC, AttributeBlob, AuthorizationData},
    identity::Identity,
};

/// Locate the attribute blob in a ticket's authorization data.
///
/// The blob is the first element of an `AD-IF-RELEVANT` container. Containers
/// the engine could not decode are skipped; the first match wins.
#[must_use]
pub fn find_attribute_blob(entries: &[AuthorizationData]) -> Option<&AuthorizationData> {
    entries
        .iter()
        .filter(|entry| entry.ad_type == AD_IF_RELEVANT)
        .filter_map(|entry| entry.elements.as_deref())
        .filter_map(|elements| elements.first())
        .find(|first| first.ad_type == AD_WIN2K_PAC)
}

/// Copy blob attributes onto a validated identity.
pub fn apply(identity: &mut Identity, blob: AttributeBlob) {
    if !blob.full_name.is_empty() {
        identity.display_name = blob.full_name;
    }
    identity.groups = blob.group_sids;
}
