//! # Finalizer Handling
//!
//! Adds the controller finalizer to live Certificates and releases it on deletion.
//!
//! Deletion needs no cleanup of its own: the TLS secret carries a controller
//! owner reference and is garbage collected with the Certificate.

use crate::constants::{CERTIFICATE_FINALIZER, MAX_CONFLICT_RETRIES};
use crate::crd::Certificate;
use crate::store::{namespaced_name, ObjectStore, StoreError};
use tracing::{debug, info};

#[must_use]
pub fn has_finalizer(certificate: &Certificate) -> bool {
    certificate
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|name| name == CERTIFICATE_FINALIZER))
}

/// Add the finalizer and return the persisted Certificate
pub async fn add_finalizer(
    store: &dyn ObjectStore,
    certificate: Certificate,
) -> Result<Certificate, StoreError> {
    let updated = update_finalizers(store, certificate, |finalizers| {
        if !finalizers.iter().any(|f| f == CERTIFICATE_FINALIZER) {
            finalizers.push(CERTIFICATE_FINALIZER.to_string());
        }
    })
    .await?;
    debug!("Added finalizer {}", CERTIFICATE_FINALIZER);
    Ok(updated)
}

/// Release the finalizer of a Certificate being deleted
///
/// Issues exactly one update when the finalizer is present and none otherwise.
/// Neither the secret nor the status is touched.
pub async fn handle_deletion(
    store: &dyn ObjectStore,
    certificate: &Certificate,
) -> Result<(), StoreError> {
    if !has_finalizer(certificate) {
        debug!("Certificate is being deleted and holds no finalizer, nothing to do");
        return Ok(());
    }

    match update_finalizers(store, certificate.clone(), |finalizers| {
        finalizers.retain(|f| f != CERTIFICATE_FINALIZER);
    })
    .await
    {
        Ok(_) => {
            info!("Removed finalizer {}, Certificate can be deleted", CERTIFICATE_FINALIZER);
            Ok(())
        }
        // Already gone
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

async fn update_finalizers(
    store: &dyn ObjectStore,
    mut certificate: Certificate,
    change: impl Fn(&mut Vec<String>),
) -> Result<Certificate, StoreError> {
    let (namespace, name) = namespaced_name(&certificate)?;
    let mut retries = 0;

    loop {
        change(certificate.metadata.finalizers.get_or_insert_with(Vec::new));
        match store.update_certificate(&certificate).await {
            Ok(updated) => return Ok(updated),
            Err(e) if e.is_conflict() && retries < MAX_CONFLICT_RETRIES => {
                retries += 1;
                debug!(
                    "Conflict updating finalizers of Certificate {}/{} (retry {}/{})",
                    namespace, name, retries, MAX_CONFLICT_RETRIES
                );
                certificate = store.get_certificate(&namespace, &name).await?;
            }
            Err(e) => return Err(e),
        }
    }
}
