//! Full scenario tests over the Vault API.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use proptest::prelude::*;
use rusqlite::{params, Connection};

use pitwall::access::{AuditAction, AuditOutcome};
use pitwall::core::{now_millis, KeyPair, KeyVault};
use pitwall::store::{MemoryStore, SqliteStore, Store};
use pitwall::{
    AccessBasis, Classification, ErrorKind, MemoryAuditSink, Principal, RecordId, TeamId, Vault,
    VaultConfig,
};

const PAYLOAD: &[u8] = b"{\"x\":1}";

fn teams(names: &[&str]) -> Vec<TeamId> {
    names.iter().map(TeamId::new).collect()
}

fn find(principals: &[Principal], team: &str) -> Principal {
    principals
        .iter()
        .find(|p| p.team == TeamId::new(team))
        .cloned()
        .unwrap()
}

/// Flip one byte of a stored column, bypassing the Vault.
fn corrupt_column(path: &Path, id: &RecordId, column: &str) {
    let conn = Connection::open(path).unwrap();
    let key = id.as_bytes().to_vec();
    let mut bytes: Vec<u8> = conn
        .query_row(
            &format!("SELECT {column} FROM records WHERE record_id = ?1"),
            params![key],
            |row| row.get(0),
        )
        .unwrap();
    bytes[0] ^= 0x01;
    conn.execute(
        &format!("UPDATE records SET {column} = ?1 WHERE record_id = ?2"),
        params![bytes, key],
    )
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn confidential_record_lifecycle() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pitwall.db");
    let audit = Arc::new(MemoryAuditSink::new());
    let vault = Vault::with_audit_sink(
        SqliteStore::open(&path).unwrap(),
        VaultConfig::default(),
        audit.clone(),
    );

    let principals = vault
        .seed(&teams(&["fia", "ferrari", "mclaren", "redbull"]))
        .await
        .unwrap();
    let fia = find(&principals, "fia");
    let ferrari = find(&principals, "ferrari");
    let mclaren = find(&principals, "mclaren");
    let redbull = find(&principals, "redbull");

    let record = vault
        .create_record(&ferrari, "quali-sim", Classification::Confidential, PAYLOAD)
        .await
        .unwrap();

    // Owner reads its own record.
    assert_eq!(&vault.read_record(&ferrari, &record.id).await.unwrap()[..], PAYLOAD);

    // Another team is denied before any share.
    let err = vault.read_record(&mclaren, &record.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert!(vault.list_records(&mclaren).await.unwrap().is_empty());

    // The auditor sees and reads everything.
    let listed = vault.list_records(&fia).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].access, AccessBasis::Auditor);
    assert_eq!(&vault.read_record(&fia, &record.id).await.unwrap()[..], PAYLOAD);

    // Share, then the recipient reads the exact bytes.
    let grant = vault
        .share_record(&ferrari, &record.id, &mclaren.team)
        .await
        .unwrap();
    assert_eq!(grant.grantee, mclaren.team);
    assert_eq!(&vault.read_record(&mclaren, &record.id).await.unwrap()[..], PAYLOAD);
    assert_eq!(
        vault.list_records(&mclaren).await.unwrap()[0].access,
        AccessBasis::Shared
    );

    // A second share is rejected and the first grant survives.
    let err = vault
        .share_record(&ferrari, &record.id, &mclaren.team)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyShared);
    let grants = vault.grants_for_record(&ferrari, &record.id).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].granted_by, ferrari.team);

    // Only the owner shares; only owner or auditor lists grants.
    let err = vault
        .share_record(&mclaren, &record.id, &redbull.team)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    let err = vault.grants_for_record(&mclaren, &record.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(vault.grants_for_record(&fia, &record.id).await.unwrap().len(), 1);

    // Every authorized reader verifies the owner's signature.
    for reader in [&ferrari, &mclaren, &fia] {
        assert!(vault.verify_record(reader, &record.id).await.unwrap());
    }
    let err = vault.verify_record(&redbull, &record.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    // Corrupted ciphertext fails authentication for everyone, owner included.
    corrupt_column(&path, &record.id, "body");
    for reader in [&ferrari, &mclaren, &fia] {
        let err = vault.read_record(reader, &record.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        let err = vault.verify_record(reader, &record.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    let events = audit.events();
    assert!(events.iter().any(|e| e.team == redbull.team && e.outcome.is_denied()));
    assert!(events
        .iter()
        .any(|e| e.team == fia.team && matches!(e.outcome, AuditOutcome::Failed { .. })));
}

#[tokio::test]
async fn public_record_visible_to_all() {
    let vault = Vault::with_audit_sink(
        MemoryStore::new(),
        VaultConfig::default(),
        Arc::new(MemoryAuditSink::new()),
    );
    let principals = vault.seed(&teams(&["fia", "ferrari", "redbull"])).await.unwrap();
    let ferrari = find(&principals, "ferrari");
    let redbull = find(&principals, "redbull");

    let public = vault
        .create_record(&ferrari, "press-release", Classification::Public, b"P1")
        .await
        .unwrap();
    vault
        .create_record(&ferrari, "setup", Classification::Confidential, b"wing 3")
        .await
        .unwrap();

    let listed = vault.list_records(&redbull).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, public.id);
    assert_eq!(listed[0].access, AccessBasis::Public);
    assert_eq!(&vault.read_record(&redbull, &public.id).await.unwrap()[..], b"P1");
    assert!(vault.verify_record(&redbull, &public.id).await.unwrap());

    assert_eq!(vault.list_records(&ferrari).await.unwrap().len(), 2);
}

#[tokio::test]
async fn tampered_signature_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pitwall.db");
    let audit = Arc::new(MemoryAuditSink::new());
    let vault = Vault::with_audit_sink(
        SqliteStore::open(&path).unwrap(),
        VaultConfig::default(),
        audit.clone(),
    );
    let ferrari = vault.provision_principal("ferrari", "ferrari").await.unwrap();
    let record = vault
        .create_record(&ferrari, "race-pace", Classification::Confidential, PAYLOAD)
        .await
        .unwrap();
    assert!(vault.verify_record(&ferrari, &record.id).await.unwrap());

    corrupt_column(&path, &record.id, "signature");

    // Content still decrypts; it just no longer matches what the owner signed.
    assert_eq!(&vault.read_record(&ferrari, &record.id).await.unwrap()[..], PAYLOAD);
    assert!(!vault.verify_record(&ferrari, &record.id).await.unwrap());

    let events = audit.events();
    let last = events.last().unwrap();
    assert_eq!(last.action, AuditAction::VerifyRecord);
    assert_eq!(last.record, Some(record.id));
    assert!(matches!(last.outcome, AuditOutcome::Failed { .. }));
    let verify_failures = events
        .iter()
        .filter(|e| e.action == AuditAction::VerifyRecord && matches!(e.outcome, AuditOutcome::Failed { .. }))
        .count();
    assert_eq!(verify_failures, 1);
}

#[tokio::test]
async fn corrupted_wrapped_key_spares_existing_grants() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pitwall.db");
    let vault = Vault::with_audit_sink(
        SqliteStore::open(&path).unwrap(),
        VaultConfig::default(),
        Arc::new(MemoryAuditSink::new()),
    );
    let principals = vault.seed(&teams(&["ferrari", "mclaren"])).await.unwrap();
    let ferrari = find(&principals, "ferrari");
    let mclaren = find(&principals, "mclaren");

    let record = vault
        .create_record(&ferrari, "tyre-model", Classification::Confidential, PAYLOAD)
        .await
        .unwrap();
    vault
        .share_record(&ferrari, &record.id, &mclaren.team)
        .await
        .unwrap();

    corrupt_column(&path, &record.id, "wrapped_key");

    let err = vault.read_record(&ferrari, &record.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyUnwrap);
    assert_eq!(&vault.read_record(&mclaren, &record.id).await.unwrap()[..], PAYLOAD);
}

#[tokio::test]
async fn unknown_recipient_and_record() {
    let vault = Vault::new(MemoryStore::new(), VaultConfig::default());
    let ferrari = vault.provision_principal("ferrari", "ferrari").await.unwrap();
    let record = vault
        .create_record(&ferrari, "fp3", Classification::Confidential, PAYLOAD)
        .await
        .unwrap();

    let err = vault
        .share_record(&ferrari, &record.id, &TeamId::new("williams"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = vault
        .share_record(&ferrari, &record.id, &ferrari.team)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = vault
        .verify_record(&ferrari, &RecordId::from_bytes([0; 32]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = vault.provision_principal("carlos", "ferrari").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

fn canned_keys() -> &'static [KeyPair] {
    static KEYS: OnceLock<Vec<KeyPair>> = OnceLock::new();
    KEYS.get_or_init(|| (0..2).map(|_| KeyVault::generate().unwrap()).collect())
}

fn canned_principal(team: &str, index: usize) -> Principal {
    Principal {
        username: team.to_string(),
        team: TeamId::new(team),
        key_pair: canned_keys()[index].clone(),
        created_at: now_millis(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn vault_returns_exact_bytes(
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
        public in any::<bool>(),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let vault = Vault::with_audit_sink(
                MemoryStore::new(),
                VaultConfig::default(),
                Arc::new(MemoryAuditSink::new()),
            );
            let owner = canned_principal("ferrari", 0);
            let auditor = canned_principal("fia", 1);
            vault.store().insert_principal(&owner).await.unwrap();
            vault.store().insert_principal(&auditor).await.unwrap();

            let classification = if public { Classification::Public } else { Classification::Confidential };
            let record = vault.create_record(&owner, "telemetry", classification, &plaintext).await.unwrap();

            let by_owner = vault.read_record(&owner, &record.id).await.unwrap();
            let by_auditor = vault.read_record(&auditor, &record.id).await.unwrap();
            assert_eq!(&by_owner[..], &plaintext[..]);
            assert_eq!(&by_auditor[..], &plaintext[..]);
            assert!(vault.verify_record(&auditor, &record.id).await.unwrap());
        });
    }
}
