//! OpenDAL plumbing shared by the binding adapter and the S3-compatible
//! provider: key normalization, head probes, single-page listing with
//! opaque continuation tokens, and the two write paths.

use futures::TryStreamExt;
use opendal::{Entry, ErrorKind, Metadata, Operator};

use super::body::{BodySource, ObjectBody, ObjectResponse, UploadBody};
use super::error::{StorageError, StorageResult};
use super::types::{ListOptions, ListResult, StorageObject, UploadOptions};

/// Normalize a key (no leading slash) and reject keys that cannot name an object.
pub(crate) fn normalize_key(key: &str) -> StorageResult<&str> {
    let key = key.trim_start_matches('/');
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".to_string()));
    }
    if key.ends_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "'{}' names a prefix, not an object",
            key
        )));
    }
    Ok(key)
}

/// Normalize a listing prefix (no leading slash, empty for the bucket root).
pub(crate) fn normalize_prefix(prefix: Option<&str>) -> &str {
    prefix.map(|p| p.trim_start_matches('/')).unwrap_or("")
}

pub(crate) fn is_not_found(err: &opendal::Error) -> bool {
    err.kind() == ErrorKind::NotFound
}

/// Encode the last key of a page as an opaque continuation token.
pub(crate) fn encode_token(last_key: &str) -> String {
    hex::encode(last_key.as_bytes())
}

pub(crate) fn decode_token(token: &str) -> StorageResult<String> {
    hex::decode(token)
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok())
        .ok_or_else(|| StorageError::Configuration("invalid continuation token".to_string()))
}

/// Convert OpenDAL metadata to a StorageObject.
pub(crate) fn metadata_to_object(key: &str, metadata: &Metadata) -> StorageObject {
    StorageObject {
        key: key.to_string(),
        size: metadata.content_length(),
        last_modified: metadata.last_modified(),
        etag: metadata.etag().map(|s| s.to_string()),
        metadata: metadata.user_metadata().cloned(),
    }
}

/// Metadata-only probe. `None` when the key does not name an object; a
/// directory on a filesystem backend is not one.
pub(crate) async fn head(op: &Operator, key: &str) -> StorageResult<Option<Metadata>> {
    match op.stat(key).await {
        Ok(metadata) if metadata.mode().is_file() => Ok(Some(metadata)),
        Ok(_) => Ok(None),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(StorageError::Probe {
            key: key.to_string(),
            source: e,
        }),
    }
}

/// Open a download. Stats first so a missing key is reported as `None` and
/// the response carries length and etag before any body byte is read.
pub(crate) async fn open(op: &Operator, key: &str) -> StorageResult<Option<ObjectResponse>> {
    let Some(metadata) = head(op, key).await? else {
        return Ok(None);
    };

    let reader = op.reader(key).await.map_err(|e| StorageError::Download {
        key: key.to_string(),
        source: e,
    })?;

    Ok(Some(ObjectResponse {
        body: ObjectBody::from_source(BodySource::Reader(reader)),
        content_type: metadata.content_type().map(|s| s.to_string()),
        content_length: Some(metadata.content_length()),
        etag: metadata.etag().map(|s| s.to_string()),
        last_modified: metadata.last_modified(),
    }))
}

/// Delete a key; a key that is already gone counts as deleted.
pub(crate) async fn delete(op: &Operator, key: &str) -> StorageResult<()> {
    if head(op, key).await?.is_none() {
        return Ok(());
    }

    match op.delete(key).await {
        Ok(()) => Ok(()),
        Err(e) if is_not_found(&e) => Ok(()),
        Err(e) => Err(StorageError::Delete {
            key: key.to_string(),
            source: e,
        }),
    }
}

/// Single PUT of an in-memory body.
pub(crate) async fn write_all(
    op: &Operator,
    key: &str,
    data: bytes::Bytes,
    options: &UploadOptions,
) -> StorageResult<()> {
    let capability = op.info().full_capability();
    let mut write = op.write_with(key, data);
    if let Some(content_type) = &options.content_type {
        if capability.write_with_content_type {
            write = write.content_type(content_type);
        } else {
            tracing::debug!("Backend does not store content type; dropping it for '{}'", key);
        }
    }
    if let Some(metadata) = &options.metadata {
        if capability.write_with_user_metadata {
            write = write.user_metadata(metadata.clone());
        } else {
            tracing::debug!("Backend does not store user metadata; dropping it for '{}'", key);
        }
    }

    write.await.map_err(|e| StorageError::Upload {
        key: key.to_string(),
        source: e,
    })?;
    Ok(())
}

/// Chunked write through an OpenDAL writer, without buffering the body.
pub(crate) async fn write_streaming(
    op: &Operator,
    key: &str,
    body: UploadBody,
    options: &UploadOptions,
) -> StorageResult<()> {
    let upload_err = |e: opendal::Error| StorageError::Upload {
        key: key.to_string(),
        source: e,
    };

    let capability = op.info().full_capability();
    if !capability.write_can_multi {
        let data = body.into_bytes().await?;
        return write_all(op, key, data, options).await;
    }

    let mut builder = op.writer_with(key);
    if let Some(content_type) = &options.content_type {
        if capability.write_with_content_type {
            builder = builder.content_type(content_type);
        } else {
            tracing::debug!("Backend does not store content type; dropping it for '{}'", key);
        }
    }
    if let Some(metadata) = &options.metadata {
        if capability.write_with_user_metadata {
            builder = builder.user_metadata(metadata.clone());
        } else {
            tracing::debug!("Backend does not store user metadata; dropping it for '{}'", key);
        }
    }

    let mut chunks = body.into_chunks().await?;
    let mut writer = builder.await.map_err(upload_err)?;

    loop {
        match chunks.try_next().await {
            Ok(Some(chunk)) => writer.write(chunk).await.map_err(upload_err)?,
            Ok(None) => break,
            Err(e) => {
                if let Err(abort) = writer.abort().await {
                    tracing::warn!("Failed to abort partial write of '{}': {}", key, abort);
                }
                return Err(StorageError::Io(e));
            }
        }
    }

    writer.close().await.map_err(upload_err)?;
    Ok(())
}

/// Fetch one page of a listing.
///
/// The continuation token is the hex-encoded last key of the previous page.
/// Backends that can resume after a key get it as their start-after cursor;
/// for the rest the full listing is sorted and skipped locally.
pub(crate) async fn list_page(op: &Operator, options: &ListOptions) -> StorageResult<ListResult> {
    let list_err = |e: opendal::Error| StorageError::List { source: e };

    let max_keys = options.effective_max_keys();
    let prefix = normalize_prefix(options.prefix.as_deref());
    let start_after = options
        .continuation_token
        .as_deref()
        .map(decode_token)
        .transpose()?;

    let resumable = op.info().full_capability().list_with_start_after;
    let mut builder = op.lister_with(prefix).recursive(true);
    if let (true, Some(after)) = (resumable, start_after.as_deref()) {
        builder = builder.start_after(after);
    }
    let mut lister = builder.await.map_err(list_err)?;

    let accept = |entry: &Entry| -> bool {
        let path = entry.path();
        entry.metadata().mode().is_file()
            && path.starts_with(prefix)
            && start_after.as_deref().map(|after| path > after).unwrap_or(true)
    };

    let mut objects = Vec::new();
    if resumable {
        // Ordered backend: stop as soon as one entry past the page is seen.
        while let Some(entry) = lister.try_next().await.map_err(list_err)? {
            if accept(&entry) {
                objects.push(metadata_to_object(entry.path(), entry.metadata()));
                if objects.len() > max_keys {
                    break;
                }
            }
        }
    } else {
        let mut entries = Vec::new();
        while let Some(entry) = lister.try_next().await.map_err(list_err)? {
            if accept(&entry) {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| a.path().cmp(b.path()));
        entries.truncate(max_keys + 1);
        for entry in entries {
            // In-process listings may omit sizes; a local stat is cheap.
            match op.stat(entry.path()).await {
                Ok(metadata) => objects.push(metadata_to_object(entry.path(), &metadata)),
                Err(e) if is_not_found(&e) => continue,
                Err(e) => return Err(list_err(e)),
            }
        }
    }

    let is_truncated = objects.len() > max_keys;
    objects.truncate(max_keys);
    let continuation_token = if is_truncated {
        objects.last().map(|o| encode_token(&o.key))
    } else {
        None
    };

    Ok(ListResult {
        objects,
        is_truncated,
        continuation_token,
    })
}
