//! Session manager behaviour against a mock custody gateway: reuse without
//! network calls, forced renewal, single-flight establishment under
//! concurrent callers, and rejection handling.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;

use crate::crypto;
use crate::delegation::{DelegatedSigner, SessionKeypair};
use crate::error::Error;
use crate::session::{DelegationSettings, MemorySessionStore, SessionManager, SessionRecord, SessionStore};
use crate::test_support::MockCustody;

fn settings() -> DelegationSettings {
    DelegationSettings {
        domain: "custody.test".to_string(),
        uri: "https://custody.test".to_string(),
        chain_id: 8453,
        session_ttl: Duration::from_secs(3600),
    }
}

fn manager(custody: Arc<MockCustody>, store: Arc<MemorySessionStore>) -> SessionManager {
    let signer = Arc::new(DelegatedSigner::new(custody.clone()));
    SessionManager::new(store, custody, signer, settings())
}

fn record_expiring_in(address: &str, offset_ms: i64) -> SessionRecord {
    SessionRecord::new(
        "persisted",
        address,
        &SessionKeypair::generate(),
        Utc::now().timestamp_millis() + offset_ms,
        Utc::now().timestamp_millis() - 1_000,
    )
}

#[tokio::test]
async fn test_valid_session_is_reused_without_network() {
    let custody = Arc::new(MockCustody::new());
    let persisted = record_expiring_in(&custody.address(), 60 * 60 * 1000);
    let store = Arc::new(MemorySessionStore::with_record(persisted.clone()));
    let mgr = manager(custody.clone(), store);

    let first = mgr.get_session("w1", &custody.address()).await.unwrap();
    let second = mgr.get_session("w1", &custody.address()).await.unwrap();

    assert_eq!(first, persisted);
    assert_eq!(second, persisted);
    assert_eq!(custody.total_calls(), 0);
}

#[tokio::test]
async fn test_expired_session_triggers_one_establishment() {
    let custody = Arc::new(MockCustody::new());
    let expired = record_expiring_in(&custody.address(), -1_000);
    let store = Arc::new(MemorySessionStore::with_record(expired.clone()));
    let mgr = manager(custody.clone(), store.clone());

    let session = mgr.get_session("w1", &custody.address()).await.unwrap();

    assert_eq!(custody.nonce_calls.load(Ordering::SeqCst), 1);
    assert_eq!(custody.bootstrap_sign_calls.load(Ordering::SeqCst), 1);
    assert_eq!(custody.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(custody.session_sign_calls.load(Ordering::SeqCst), 0);

    assert_eq!(session.session_id, "sess-0");
    assert_ne!(session.session_private_key, expired.session_private_key);
    assert!(session.is_usable());

    // Persisted wholesale
    assert_eq!(store.load().await.unwrap(), Some(session));
}

#[tokio::test]
async fn test_session_inside_renewal_buffer_is_replaced() {
    let custody = Arc::new(MockCustody::new());
    let near_expiry = record_expiring_in(&custody.address(), 4 * 60 * 1000);
    let store = Arc::new(MemorySessionStore::with_record(near_expiry));
    let mgr = manager(custody.clone(), store);

    let session = mgr.get_session("w1", &custody.address()).await.unwrap();
    assert_eq!(session.session_id, "sess-0");
    assert_eq!(custody.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_session_for_other_address_is_replaced() {
    let custody = Arc::new(MockCustody::new());
    let other = record_expiring_in("0x0000000000000000000000000000000000000001", 60 * 60 * 1000);
    let store = Arc::new(MemorySessionStore::with_record(other));
    let mgr = manager(custody.clone(), store);

    let session = mgr.get_session("w1", &custody.address()).await.unwrap();
    assert!(session.belongs_to(&custody.address()));
    assert_eq!(custody.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_delegation_message_binds_session_key() {
    let custody = Arc::new(MockCustody::new());
    let store = Arc::new(MemorySessionStore::new());
    let mgr = manager(custody.clone(), store);

    let session = mgr.get_session("w1", &custody.address()).await.unwrap();

    let created = custody.created.lock().unwrap();
    let request = &created[0];
    assert_eq!(request.session_public_key, session.session_public_key);
    assert!(request.siwe_message.starts_with("custody.test wants you to sign in with your Ethereum account:\n"));
    assert!(request.siwe_message.contains(&format!(
        "Delegate signing authority to session key: {}",
        session.session_public_key
    )));
    assert!(request.siwe_message.contains("Nonce: nonce0\n"));
    assert!(request.siwe_message.contains("Chain ID: 8453\n"));

    let hash = ethers::utils::hash_message(&request.siwe_message);
    let signer = crypto::recover_address(hash.as_fixed_bytes(), &request.signature).unwrap();
    assert_eq!(format!("{:?}", signer), custody.address());
}

#[tokio::test]
async fn test_concurrent_callers_share_one_establishment() {
    let mut mock = MockCustody::new();
    mock.nonce_delay = Some(Duration::from_millis(50));
    let custody = Arc::new(mock);
    let store = Arc::new(MemorySessionStore::new());
    let mgr = Arc::new(manager(custody.clone(), store));

    let address = custody.address();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let mgr = mgr.clone();
        let address = address.clone();
        handles.push(tokio::spawn(async move { mgr.get_session("w1", &address).await }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().session_id);
    }

    assert_eq!(custody.nonce_calls.load(Ordering::SeqCst), 1);
    assert_eq!(custody.create_calls.load(Ordering::SeqCst), 1);
    assert!(ids.iter().all(|id| id == "sess-0"), "ids: {:?}", ids);
}

#[tokio::test]
async fn test_rejected_session_is_surfaced_and_not_persisted() {
    let mut mock = MockCustody::new();
    mock.reject_sessions = true;
    let custody = Arc::new(mock);
    let store = Arc::new(MemorySessionStore::new());
    let mgr = manager(custody.clone(), store.clone());

    let err = mgr.get_session("w1", &custody.address()).await.unwrap_err();
    assert!(matches!(err, Error::SessionRejected { .. }), "got: {:?}", err);
    assert!(store.load().await.unwrap().is_none());
    assert_eq!(custody.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_each_establishment_uses_a_new_keypair() {
    let custody = Arc::new(MockCustody::new());
    let store = Arc::new(MemorySessionStore::new());
    let mgr = manager(custody.clone(), store);

    let a = mgr.establish("w1", &custody.address()).await.unwrap();
    let b = mgr.establish("w1", &custody.address()).await.unwrap();
    assert_ne!(a.session_public_key, b.session_public_key);
    assert_ne!(a.session_id, b.session_id);
}
