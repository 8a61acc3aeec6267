//! End-to-end behavior through the registry and provider factory.

use bytes::Bytes;
use futures::stream;
use std::collections::HashSet;

use bucket_storage::registry::{BucketPurpose, BucketStore};
use bucket_storage::storage::{
    BoxedStorageProvider, CompatibleApiConfig, ConfigCipher, ListOptions, NativeBindingConfig,
    NewBucketRequest, OperatorBinding, ProviderFactory, StorageConfig, StorageError, UploadBody,
    UploadOptions,
};

async fn factory_with_binding() -> (ProviderFactory, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let binding = OperatorBinding::fs("BUCKET", dir.path()).unwrap().shared();
    let store = BucketStore::in_memory().await.unwrap();
    let factory = ProviderFactory::new(store.buckets(), ConfigCipher::generate()).with_binding(binding);
    (factory, dir)
}

async fn native_bucket(factory: &ProviderFactory, name: &str) -> BoxedStorageProvider {
    let bucket = factory
        .register_bucket(NewBucketRequest {
            name: name.to_string(),
            description: Some("attachments".to_string()),
            config: StorageConfig::Native(NativeBindingConfig::binding(name)),
            created_by: None,
            default_for: vec![BucketPurpose::General],
        })
        .await
        .unwrap();
    factory.provider_for(&bucket.id).await.unwrap()
}

#[tokio::test]
async fn upload_then_download_through_factory() {
    let (factory, _dir) = factory_with_binding().await;
    let provider = native_bucket(&factory, "b1").await;

    provider
        .upload("a.txt", "hello".into(), UploadOptions::default())
        .await
        .unwrap();

    let object = provider.download("a.txt").await.unwrap().unwrap();
    assert_eq!(object.content_length, Some(5));
    assert_eq!(object.into_bytes().await.unwrap(), Bytes::from_static(b"hello"));
}

#[tokio::test]
async fn every_body_shape_round_trips() {
    let (factory, dir) = factory_with_binding().await;
    let provider = native_bucket(&factory, "shapes").await;

    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let blob_path = dir.path().join("source.bin");
    std::fs::write(&blob_path, &data).unwrap();

    let chunks: Vec<std::io::Result<Bytes>> = data
        .chunks(7_000)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();

    let bodies = vec![
        ("buffer.bin", UploadBody::from(data.clone())),
        ("stream.bin", UploadBody::stream(stream::iter(chunks))),
        ("blob.bin", UploadBody::blob(&blob_path)),
    ];
    for (key, body) in bodies {
        provider.upload(key, body, UploadOptions::default()).await.unwrap();
        let downloaded = provider
            .download(key)
            .await
            .unwrap()
            .unwrap()
            .into_bytes()
            .await
            .unwrap();
        assert_eq!(downloaded.as_ref(), data.as_slice(), "{}", key);
    }
}

#[tokio::test]
async fn exists_tracks_upload_and_delete() {
    let (factory, _dir) = factory_with_binding().await;
    let provider = native_bucket(&factory, "life").await;

    assert!(!provider.exists("k").await.unwrap());
    provider.upload("k", "v".into(), UploadOptions::default()).await.unwrap();
    assert!(provider.exists("k").await.unwrap());

    provider.delete("k").await.unwrap();
    provider.delete("k").await.unwrap();
    assert!(!provider.exists("k").await.unwrap());
    assert!(provider.download("k").await.unwrap().is_none());
}

#[tokio::test]
async fn pagination_is_exhaustive_without_repeats() {
    let (factory, _dir) = factory_with_binding().await;
    let provider = native_bucket(&factory, "pages").await;

    for key in ["a", "b", "c"] {
        provider.upload(key, "x".into(), UploadOptions::default()).await.unwrap();
    }

    let first = provider
        .list(ListOptions::default().with_max_keys(1))
        .await
        .unwrap();
    assert_eq!(first.objects.len(), 1);
    assert!(first.is_truncated);
    let token = first.continuation_token.clone().unwrap();
    assert!(!token.is_empty());

    let second = provider
        .list(ListOptions::default().with_max_keys(1).with_continuation_token(token))
        .await
        .unwrap();
    assert_eq!(second.objects.len(), 1);
    assert_ne!(second.objects[0].key, first.objects[0].key);

    let mut seen = HashSet::new();
    let mut options = ListOptions::default().with_max_keys(2);
    loop {
        let page = provider.list(options.clone()).await.unwrap();
        for object in page.objects {
            assert!(seen.insert(object.key));
        }
        if !page.is_truncated {
            break;
        }
        options.continuation_token = page.continuation_token;
    }
    let expected: HashSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    assert_eq!(seen, expected);
    assert_eq!(provider.list_all(None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn prefix_scopes_listing() {
    let (factory, _dir) = factory_with_binding().await;
    let provider = native_bucket(&factory, "prefixed").await;

    for key in ["chat/1.png", "chat/2.png", "forms/1.json"] {
        provider.upload(key, "x".into(), UploadOptions::default()).await.unwrap();
    }

    let keys: Vec<String> = provider
        .list_all(Some("chat/"))
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.key)
        .collect();
    assert_eq!(keys, vec!["chat/1.png", "chat/2.png"]);
}

#[tokio::test]
async fn missing_binding_fails_with_configuration_error() {
    let store = BucketStore::in_memory().await.unwrap();
    let factory = ProviderFactory::new(store.buckets(), ConfigCipher::generate());
    let provider = native_bucket(&factory, "unbound").await;

    let err = provider.exists("a").await.unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("binding"));
    assert!(matches!(
        provider.upload("a", "x".into(), UploadOptions::default()).await,
        Err(StorageError::Configuration(_))
    ));
    assert!(!provider.test_connection().await);
}

#[tokio::test]
async fn unreachable_compatible_bucket_reports_false() {
    let store = BucketStore::in_memory().await.unwrap();
    let factory = ProviderFactory::new(store.buckets(), ConfigCipher::generate());

    let config = CompatibleApiConfig::new("b2", "us-east-1", "AKIA", "secret")
        .with_endpoint("http://127.0.0.1:9")
        .with_path_style(true);
    let bucket = factory
        .register_bucket(NewBucketRequest {
            name: "b2".to_string(),
            description: None,
            config: StorageConfig::Compatible(config),
            created_by: None,
            default_for: vec![],
        })
        .await
        .unwrap();

    assert!(!factory.test_bucket(&bucket).await.unwrap());
}

#[tokio::test]
async fn directory_prefix_is_not_an_object() {
    let (factory, _dir) = factory_with_binding().await;
    let provider = native_bucket(&factory, "nested").await;

    provider
        .upload("a/b.txt", "b".into(), UploadOptions::default())
        .await
        .unwrap();

    assert!(!provider.exists("a").await.unwrap());
    assert!(provider.download("a").await.unwrap().is_none());
    provider.delete("a").await.unwrap();
    assert!(provider.exists("a/b.txt").await.unwrap());
}
