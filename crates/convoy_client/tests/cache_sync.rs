//! End-to-end cache/server synchronization over an in-process loopback.

use convoy_client::{
    CachedRepository, ClientError, HttpClient, LoopbackClient, LoopbackServer, RemoteRepository,
    WireReply,
};
use convoy_repo::{FileVersionedStore, MemoryVersionedStore, StoreEntry, StoreRegistry};
use convoy_server::{SyncDispatcher, WireMethod, WireRequest};
use std::sync::Arc;

/// Routes loopback requests straight into a sync dispatcher.
struct InProcessServer {
    dispatcher: Arc<SyncDispatcher>,
}

impl LoopbackServer for InProcessServer {
    fn handle(&self, method: &str, url: &str, body: &[u8]) -> WireReply {
        let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
        let path_and_query = without_scheme
            .find('/')
            .map_or("/", |i| &without_scheme[i..]);
        let (path, raw_query) = path_and_query
            .split_once('?')
            .unwrap_or((path_and_query, ""));

        let request = WireRequest {
            method: if method == "POST" {
                WireMethod::Post
            } else {
                WireMethod::Get
            },
            path: path.to_string(),
            query: WireRequest::parse_query(raw_query),
            body: body.to_vec(),
        };
        let response = self.dispatcher.handle(&request);
        WireReply {
            status: response.status,
            body: response.body,
        }
    }
}

fn client_for(registry: Arc<StoreRegistry>) -> Arc<dyn HttpClient> {
    let dispatcher = Arc::new(SyncDispatcher::standard(registry));
    Arc::new(LoopbackClient::new(InProcessServer { dispatcher }))
}

fn memory_registry() -> Arc<StoreRegistry> {
    let registry = Arc::new(StoreRegistry::new());
    registry.register(StoreEntry::new(
        "acme",
        "shop-config",
        true,
        Arc::new(MemoryVersionedStore::new()),
    ));
    registry
}

fn repo_over(
    client: &Arc<dyn HttpClient>,
) -> CachedRepository<RemoteRepository> {
    let remote = RemoteRepository::new(
        "http://fleet.local",
        "acme",
        "shop-config",
        Arc::clone(client),
    );
    CachedRepository::new(
        remote,
        Box::new(convoy_storage::MemoryBlob::new()),
        Box::new(convoy_storage::MemoryBlob::new()),
    )
}

#[test]
fn bootstrap_edit_commit_cycle() {
    let client = client_for(memory_registry());
    let mut repo = repo_over(&client);

    // Empty store: a failing checkout errors, a non-failing one bootstraps.
    assert!(matches!(repo.checkout(true), Err(ClientError::NoVersions)));
    assert_eq!(repo.checkout(false).unwrap(), None);

    repo.write(b"config generation 1").unwrap();
    assert!(repo.commit().unwrap());
    assert!(repo.is_current().unwrap());
    assert_eq!(repo.most_recent_version(), Some(1));

    // A fresh session sees the committed bytes.
    let mut other = repo_over(&client);
    assert_eq!(other.checkout(true).unwrap(), Some(1));
    assert_eq!(other.read().unwrap(), Some(b"config generation 1".to_vec()));
}

#[test]
fn conflicting_sessions_first_committer_wins() {
    let client = client_for(memory_registry());

    // Seed version 1.
    let mut seed = repo_over(&client);
    seed.checkout(false).unwrap();
    seed.write(b"base").unwrap();
    assert!(seed.commit().unwrap());

    // Two independent sessions check out version 1.
    let mut alice = repo_over(&client);
    let mut bob = repo_over(&client);
    assert_eq!(alice.checkout(true).unwrap(), Some(1));
    assert_eq!(bob.checkout(true).unwrap(), Some(1));

    alice.write(b"alice's change").unwrap();
    bob.write(b"bob's change").unwrap();

    // Alice commits first and wins.
    assert!(alice.commit().unwrap());
    // Bob's compare-and-swap loses; his state is untouched.
    assert!(!bob.commit().unwrap());
    assert_eq!(bob.most_recent_version(), Some(1));
    assert_eq!(bob.read().unwrap(), Some(b"bob's change".to_vec()));
    assert!(!bob.is_current().unwrap());

    // Required recovery: checkout, re-apply, retry.
    assert_eq!(bob.checkout(true).unwrap(), Some(2));
    assert_eq!(bob.read().unwrap(), Some(b"alice's change".to_vec()));
    bob.write(b"bob's change, rebased").unwrap();
    assert!(bob.commit().unwrap());
    assert_eq!(bob.most_recent_version(), Some(3));

    let mut reader = repo_over(&client);
    reader.checkout(true).unwrap();
    assert_eq!(
        reader.read().unwrap(),
        Some(b"bob's change, rebased".to_vec())
    );
}

#[test]
fn revert_after_remote_moved_on() {
    let client = client_for(memory_registry());

    let mut writer = repo_over(&client);
    writer.checkout(false).unwrap();
    writer.write(b"v1").unwrap();
    writer.commit().unwrap();

    let mut session = repo_over(&client);
    session.checkout(true).unwrap();
    session.write(b"experimental edits").unwrap();

    // Reverting restores exactly the checked-out bytes, offline.
    session.revert().unwrap();
    assert_eq!(session.read().unwrap(), Some(b"v1".to_vec()));
}

#[test]
fn file_backed_store_and_cache_survive_reopen() {
    let server_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();

    let registry = Arc::new(StoreRegistry::new());
    registry.register(StoreEntry::new(
        "acme",
        "fw",
        true,
        Arc::new(FileVersionedStore::open(server_dir.path()).unwrap()),
    ));
    let client = client_for(Arc::clone(&registry));

    {
        let remote = RemoteRepository::new("http://fleet.local", "acme", "fw", Arc::clone(&client));
        let mut repo = CachedRepository::open_dir(remote, cache_dir.path()).unwrap();
        repo.checkout(false).unwrap();
        repo.write(b"firmware image").unwrap();
        assert!(repo.commit().unwrap());
    }

    // The server store reopens with the committed version.
    let reopened = FileVersionedStore::open(server_dir.path()).unwrap();
    let registry = Arc::new(StoreRegistry::new());
    registry.register(StoreEntry::new("acme", "fw", true, Arc::new(reopened)));
    let client = client_for(registry);

    let remote = RemoteRepository::new("http://fleet.local", "acme", "fw", client);
    let mut repo = CachedRepository::open_dir(remote, cache_dir.path()).unwrap();
    assert_eq!(repo.checkout(true).unwrap(), Some(1));
    assert_eq!(repo.read().unwrap(), Some(b"firmware image".to_vec()));
}

#[test]
fn replication_variant_reaches_replicas() {
    let registry = Arc::new(StoreRegistry::new());
    registry.register(StoreEntry::new(
        "acme",
        "mirror",
        false, // a replica: repository commits would be refused with 406
        Arc::new(MemoryVersionedStore::new()),
    ));
    let client = client_for(registry);

    // The repository endpoint refuses writes to a replica.
    let repo_remote =
        RemoteRepository::new("http://fleet.local", "acme", "mirror", Arc::clone(&client));
    let mut repo = CachedRepository::new(
        repo_remote,
        Box::new(convoy_storage::MemoryBlob::new()),
        Box::new(convoy_storage::MemoryBlob::new()),
    );
    repo.checkout(false).unwrap();
    repo.write(b"data").unwrap();
    assert!(matches!(repo.commit(), Err(ClientError::NotMaster)));

    // The replication endpoint accepts the same operation.
    let repl_remote =
        RemoteRepository::replication("http://fleet.local", "acme", "mirror", Arc::clone(&client));
    let mut repl = CachedRepository::new(
        repl_remote,
        Box::new(convoy_storage::MemoryBlob::new()),
        Box::new(convoy_storage::MemoryBlob::new()),
    );
    repl.checkout(false).unwrap();
    repl.write(b"replicated payload").unwrap();
    assert!(repl.commit().unwrap());

    // Both endpoints now serve version 1.
    let mut check = CachedRepository::new(
        RemoteRepository::new("http://fleet.local", "acme", "mirror", client),
        Box::new(convoy_storage::MemoryBlob::new()),
        Box::new(convoy_storage::MemoryBlob::new()),
    );
    assert_eq!(check.checkout(true).unwrap(), Some(1));
    assert_eq!(check.read().unwrap(), Some(b"replicated payload".to_vec()));
}
