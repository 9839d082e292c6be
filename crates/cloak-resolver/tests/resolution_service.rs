use std::path::Path;
use std::sync::Arc;

use cloak_cipher::{Cipher, CipherKey};
use cloak_generator::{RandomCodeGenerator, UniqueCodes};
use cloak_resolver::{ResolutionService, ResolveError, Resolver};
use cloak_storage::{FileSnapshotRepository, InMemoryRepository, Repository};
use tempfile::TempDir;

const KEY: &str = "0123456789abcdef0123456789abcdef";

fn cipher() -> Arc<Cipher> {
    Arc::new(Cipher::new(CipherKey::parse(KEY).unwrap()))
}

fn service_over<R: Repository>(repository: Arc<R>) -> ResolutionService<R, RandomCodeGenerator> {
    ResolutionService::with_codes(
        repository,
        UniqueCodes::new(RandomCodeGenerator::new()),
        cipher(),
    )
}

async fn open_snapshot(dir: &Path) -> Arc<FileSnapshotRepository> {
    Arc::new(
        FileSnapshotRepository::open(dir.join("urls.json"))
            .await
            .unwrap(),
    )
}

async fn concurrent_redirects<R: Repository>(service: ResolutionService<R, RandomCodeGenerator>) {
    let code = service.shorten("https://example.com").await.unwrap().code;

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let service = service.clone();
            let code = code.clone();
            tokio::spawn(async move { service.redirect(code.as_str()).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "https://example.com");
    }

    let stats = service.stats(code.as_str()).await.unwrap();
    assert_eq!(stats.access_count, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_redirects_lose_no_counts_in_memory() {
    concurrent_redirects(service_over(Arc::new(InMemoryRepository::new()))).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_redirects_lose_no_counts_with_snapshot() {
    let dir = TempDir::new().unwrap();
    concurrent_redirects(service_over(open_snapshot(dir.path()).await)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_shortens_all_get_distinct_codes() {
    let service = service_over(Arc::new(InMemoryRepository::new()));

    let handles: Vec<_> = (0..100)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.shorten(&format!("https://example.com/{i}")).await })
        })
        .collect();

    let mut codes = std::collections::HashSet::new();
    for handle in handles {
        assert!(codes.insert(handle.await.unwrap().unwrap().code));
    }

    assert_eq!(service.health().await.unwrap().record_count, 100);
}

#[tokio::test]
async fn snapshot_survives_restart() {
    let dir = TempDir::new().unwrap();
    let mut created = Vec::new();

    {
        let repository = open_snapshot(dir.path()).await;
        let service = service_over(Arc::clone(&repository));
        for i in 0..20 {
            let url = format!("https://example.com/page/{i}");
            let shortened = service.shorten(&url).await.unwrap();
            created.push((shortened.code, url, shortened.created_at));
        }
        service.redirect(created[0].0.as_str()).await.unwrap();
        repository.flush().await.unwrap();
    }

    let service = service_over(open_snapshot(dir.path()).await);
    assert_eq!(service.health().await.unwrap().record_count, 20);

    for (code, url, created_at) in &created {
        let stats = service.stats(code.as_str()).await.unwrap();
        assert_eq!(&stats.destination_url, url);
        assert_eq!(&stats.created_at, created_at);
    }
    assert_eq!(service.stats(created[0].0.as_str()).await.unwrap().access_count, 1);
}

#[tokio::test]
async fn restart_with_wrong_key_cannot_decrypt() {
    let dir = TempDir::new().unwrap();

    let code = {
        let repository = open_snapshot(dir.path()).await;
        let service = service_over(Arc::clone(&repository));
        let code = service.shorten("https://example.com").await.unwrap().code;
        repository.flush().await.unwrap();
        code
    };

    let other_key = Cipher::new(CipherKey::parse("hex:00000000000000000000000000000000").unwrap());
    let service = ResolutionService::with_codes(
        open_snapshot(dir.path()).await,
        UniqueCodes::new(RandomCodeGenerator::new()),
        Arc::new(other_key),
    );

    match service.stats(code.as_str()).await {
        Ok(stats) => assert_ne!(stats.destination_url, "https://example.com"),
        Err(err) => assert!(matches!(err, ResolveError::Decryption(_))),
    }
}

#[tokio::test]
async fn end_to_end_contract() {
    let service = service_over(Arc::new(InMemoryRepository::new()));

    let err = service.shorten("ftp://x").await.unwrap_err();
    assert!(matches!(err, ResolveError::InvalidUrl(_)));

    let code = service.shorten("https://example.com").await.unwrap().code;
    assert_eq!(service.redirect(code.as_str()).await.unwrap(), "https://example.com");

    assert!(matches!(
        service.redirect("doesnotexist").await.unwrap_err(),
        ResolveError::NotFound(_)
    ));
    assert!(matches!(
        service.stats("doesnotexist").await.unwrap_err(),
        ResolveError::NotFound(_)
    ));
    assert_eq!(service.health().await.unwrap().record_count, 1);
}
