//! Sealed persistence of a [`PolicyStore`].
//!
//! Save: serialize -> fresh data key -> protect -> write temp -> rename.
//! Recover: read -> unprotect -> deserialize.
//!
//! The blob is written to a temporary file beside the target and renamed
//! over it, so a failed save leaves the previous file intact. A failed
//! recover returns no store at all.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::clock::Clock;
use crate::codec;
use crate::config::VaultConfig;
use crate::crypto::AES_256_CBC_HMAC_SHA256;
use crate::entropy::EntropySource;
use crate::envelope;
use crate::error::Result;
use crate::keys;
use crate::seal::Sealer;
use crate::store::PolicyStore;

/// The capabilities persistence needs, borrowed for one call.
#[derive(Clone, Copy)]
pub struct PersistContext<'a> {
    pub config: &'a VaultConfig,
    pub sealer: &'a dyn Sealer,
    pub entropy: &'a dyn EntropySource,
    pub clock: &'a dyn Clock,
}

/// Protect `store` for `platform` and write it to `path`, replacing any
/// existing contents.
pub fn save_policy_store(
    ctx: PersistContext<'_>,
    platform: &str,
    store: &PolicyStore,
    path: &Path,
) -> Result<()> {
    let serialized = Zeroizing::new(
        codec::to_bytes(store).inspect_err(|_| warn!("save: can't serialize store"))?,
    );

    let key = keys::construct_key_for_protect(
        &ctx.config.protect_key_name,
        AES_256_CBC_HMAC_SHA256,
        ctx.config.key_validity_days,
        ctx.entropy,
        ctx.clock,
    )
    .inspect_err(|_| warn!("save: can't construct protect key"))?;

    let blob = envelope::protect(
        ctx.sealer,
        ctx.entropy,
        platform,
        &ctx.config.seal_label,
        &key,
        &serialized,
    )
    .inspect_err(|_| warn!("save: can't protect store"))?;

    write_atomic(path, &blob)
        .inspect_err(|e| warn!(path = %path.display(), error = %e, "save: can't write store"))?;

    debug!(
        path = %path.display(),
        entries = store.len(),
        bytes = blob.len(),
        "policy store saved"
    );
    Ok(())
}

/// Write `bytes` to a temp file in `path`'s directory, sync it, then rename
/// it over `path`. The temp file is removed if any step fails.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read, unprotect, and decode the store at `path`.
///
/// The recovered data key is dropped (and zeroised) before returning.
/// Whether the recovered capacity matches what the caller expects is the
/// caller's concern.
pub fn recover_policy_store(
    ctx: PersistContext<'_>,
    platform: &str,
    path: &Path,
) -> Result<PolicyStore> {
    let blob = fs::read(path)
        .inspect_err(|e| warn!(path = %path.display(), error = %e, "recover: can't read store"))?;

    let (plaintext, _key) = envelope::unprotect(ctx.sealer, platform, &ctx.config.seal_label, &blob)
        .inspect_err(|_| warn!(path = %path.display(), "recover: can't unprotect store"))?;
    let plaintext = Zeroizing::new(plaintext);

    let store: PolicyStore = codec::from_bytes(&plaintext)
        .inspect_err(|_| warn!("recover: can't decode store"))?;

    debug!(path = %path.display(), entries = store.len(), "policy store recovered");
    Ok(store)
}
