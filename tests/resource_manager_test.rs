//! Concurrency tests for the resource manager under a multi-threaded
//! runtime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use texguard::ResourceManager;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_contending_agents_are_mutually_exclusive() {
    let manager = Arc::new(ResourceManager::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = Arc::clone(&manager);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            let completed = Arc::clone(&completed);
            tokio::spawn(async move {
                let agent = format!("agent-{i}");
                manager
                    .with_lock("thesis", &agent, Duration::from_secs(10), async {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        inside.fetch_sub(1, Ordering::SeqCst);
                        completed.fetch_add(1, Ordering::SeqCst);
                    })
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    assert_eq!(completed.load(Ordering::SeqCst), 8);
    assert!(!manager.is_locked("thesis"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_independent_resources_do_not_block() {
    let manager = Arc::new(ResourceManager::new());
    let _a = manager
        .lock("chapter1.tex", "agent-a", Duration::from_millis(10))
        .await
        .unwrap();
    let b = manager
        .lock("chapter2.tex", "agent-b", Duration::from_millis(10))
        .await
        .unwrap();

    assert_eq!(b.resource(), "chapter2.tex");
    assert_eq!(manager.held_locks().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_waiter_acquires_after_holder_drops() {
    let manager = Arc::new(ResourceManager::new());
    let guard = manager
        .lock("refs.bib", "agent-a", Duration::from_millis(10))
        .await
        .unwrap();

    let waiter = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .acquire("refs.bib", "agent-b", Some(Duration::from_secs(5)))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(guard);

    assert!(waiter.await.unwrap());
    assert_eq!(manager.get_owner("refs.bib").as_deref(), Some("agent-b"));
}
