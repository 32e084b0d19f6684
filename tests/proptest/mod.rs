// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for keydb-operator.
//!
//! Uses proptest to generate random inputs and verify invariants.

use proptest::prelude::*;

use keydb_operator::controller::credentials::{CredentialSource, choose_credential};
use keydb_operator::crd::{ReplicationMode, ReplicationSpec};
use keydb_operator::resources::normalize_address;
use keydb_operator::resources::topology::{render_config, replication_directives};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Strategy for a DNS label.
fn label() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,12}"
}

/// Strategy for host references with zero to four dots.
fn host() -> impl Strategy<Value = String> {
    prop::collection::vec(label(), 1..=5).prop_map(|parts| parts.join("."))
}

/// Strategy for IPv4 literals.
fn ipv4() -> impl Strategy<Value = String> {
    (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>())
        .prop_map(|(a, b, c, d)| format!("{a}.{b}.{c}.{d}"))
}

/// Strategy for passwords as the generator would produce them.
fn password() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{1,32}"
}

fn spec(mode: ReplicationMode, peers: Vec<String>, port: i32) -> ReplicationSpec {
    ReplicationSpec {
        enabled: true,
        mode,
        domain: peers,
        port,
    }
}

proptest! {
    /// Property: normalizing twice equals normalizing once.
    #[test]
    fn test_normalize_idempotent(h in host()) {
        let once = normalize_address(&h);
        prop_assert_eq!(normalize_address(&once), once);
    }

    /// Property: IP literals pass through unchanged.
    #[test]
    fn test_normalize_keeps_ips(ip in ipv4()) {
        prop_assert_eq!(normalize_address(&ip), ip);
    }

    /// Property: short references always gain the cluster suffix.
    #[test]
    fn test_normalize_short_names(h in prop::collection::vec(label(), 1..=2).prop_map(|p| p.join("."))) {
        prop_assert_eq!(normalize_address(&h), format!("{h}.svc.cluster.local"));
    }

    /// Property: master-master with N peers yields N replicaof/masterauth
    /// pairs, in peer order.
    #[test]
    fn test_master_master_pairs(
        peers in prop::collection::vec(host(), 0..8),
        pw in password(),
        port in 1024..65535i32,
    ) {
        let directives = replication_directives(
            &spec(ReplicationMode::MasterMaster, peers.clone(), port),
            &pw,
        ).unwrap();

        let pairs: Vec<&[String]> = directives[5..].chunks(2).collect();
        prop_assert_eq!(pairs.len(), peers.len());
        for (pair, peer) in pairs.iter().zip(&peers) {
            prop_assert_eq!(&pair[0], &format!("replicaof {} {}", normalize_address(peer), port));
            prop_assert_eq!(&pair[1], &format!("masterauth {}", pw));
        }
    }

    /// Property: master-replica yields exactly one replicaof, to the first peer.
    #[test]
    fn test_master_replica_single_upstream(
        peers in prop::collection::vec(host(), 1..6),
        pw in password(),
    ) {
        let directives = replication_directives(
            &spec(ReplicationMode::MasterReplica, peers.clone(), 6379),
            &pw,
        ).unwrap();

        let upstreams: Vec<&String> = directives.iter().filter(|d| d.starts_with("replicaof ")).collect();
        prop_assert_eq!(upstreams.len(), 1);
        prop_assert_eq!(upstreams[0], &format!("replicaof {} 6379", normalize_address(&peers[0])));
    }

    /// Property: the rendered config always ends in exactly one newline and
    /// carries the password.
    #[test]
    fn test_rendered_config_shape(
        peers in prop::collection::vec(host(), 0..4),
        pw in password(),
    ) {
        let config = render_config(&spec(ReplicationMode::MasterMaster, peers, 6379), &pw).unwrap();
        prop_assert!(config.ends_with('\n'));
        prop_assert!(!config.ends_with("\n\n"));
        let expected = format!("requirepass {pw}");
        prop_assert!(config.lines().any(|l| l == expected));
    }

    /// Property: a stored password always wins.
    #[test]
    fn test_stored_credential_is_stable(
        stored in password(),
        declared in proptest::option::of(password()),
        seed in any::<u64>(),
    ) {
        let credential = choose_credential(
            Some(stored.clone()),
            declared.as_deref(),
            &mut StdRng::seed_from_u64(seed),
        );
        prop_assert_eq!(credential.source, CredentialSource::Stored);
        prop_assert_eq!(credential.password, stored);
    }
}
