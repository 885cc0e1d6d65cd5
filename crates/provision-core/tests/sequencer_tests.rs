//! Sequencer Tests
//!
//! End to end runs against the in-memory account.

use pretty_assertions::assert_eq;
use provision_core::prelude::*;
use provision_core::{
    ClusterOutcome, IdentityOperation, ImagePushOutcome, KeyStatus, PropagationPolicy,
    RegistryOperation, RepositoryCheck, RepositoryOutcome, StatusLine,
};
use provision_test_utils::{keys, test_config, Call, FakeCloud};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_three_keys_rotated_then_pause() {
    let cloud = FakeCloud::builder()
        .identity(|i| {
            i.with_keys(keys(&[
                KeyStatus::Active,
                KeyStatus::Inactive,
                KeyStatus::Active,
            ]))
        })
        .build();

    let report = cloud.sequencer(test_config()).run().await.unwrap();

    let journal = &cloud.journal;
    assert_eq!(journal.count(|c| matches!(c, Call::DeleteKey { .. })), 1);
    assert_eq!(journal.count(|c| matches!(c, Call::DeactivateKey { .. })), 2);
    assert_eq!(journal.count(|c| matches!(c, Call::CreateKey { .. })), 1);

    assert_eq!(report.rotation.deleted, vec!["AKIAOLD0001".to_string()]);
    assert_eq!(
        report.rotation.deactivated,
        vec!["AKIAOLD0000".to_string(), "AKIAOLD0002".to_string()]
    );

    // Clients are built from the freshly issued key
    let connected = cloud.connector.connected_with();
    assert_eq!(connected.len(), 1);
    assert_eq!(connected[0].key_id, report.rotation.issued_key_id);

    let created = journal.first(|c| matches!(c, Call::CreateKey { .. })).unwrap();
    let listed = journal.first(|c| matches!(c, Call::ListRepositories)).unwrap();
    assert!(listed.at - created.at >= Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn test_steps_run_in_order() {
    let cloud = FakeCloud::new();

    cloud.sequencer(test_config()).run().await.unwrap();

    let calls = cloud.journal.calls();
    let position = |pred: fn(&Call) -> bool| calls.iter().position(pred).unwrap();

    let list_keys = position(|c| matches!(c, Call::ListKeys { .. }));
    let create_key = position(|c| matches!(c, Call::CreateKey { .. }));
    let connect = position(|c| matches!(c, Call::Connect { .. }));
    let list_repos = position(|c| matches!(c, Call::ListRepositories));
    let create_repo = position(|c| matches!(c, Call::CreateRepository { .. }));
    let push = position(|c| matches!(c, Call::PushImage { .. }));
    let cluster = position(|c| matches!(c, Call::CreateCluster { .. }));

    assert!(list_keys < create_key);
    assert!(create_key < connect);
    assert!(connect < list_repos);
    assert!(list_repos < create_repo);
    assert!(create_repo < push);
    assert!(push < cluster);

    assert_eq!(
        calls[list_keys],
        Call::ListKeys {
            principal: "infra-admin".into(),
            max_items: 10
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_empty_account_creates_repository() {
    let cloud = FakeCloud::new();

    let report = cloud.sequencer(test_config()).run().await.unwrap();

    assert_eq!(
        cloud.journal.count(|c| *c
            == Call::CreateRepository {
                name: "skodaice".into()
            }),
        1
    );
    assert_eq!(
        report.repository,
        RepositoryOutcome::Created {
            name: "skodaice".into()
        }
    );
    let rendered = cloud.status.rendered();
    assert!(rendered.iter().any(|l| l.contains("created") && l.contains("skodaice")));
}

#[tokio::test(start_paused = true)]
async fn test_single_repository_skips_create_whatever_its_name() {
    let cloud = FakeCloud::builder()
        .registry(|r| r.with_repositories(&["unrelated"]))
        .build();

    let report = cloud.sequencer(test_config()).run().await.unwrap();

    assert_eq!(
        cloud.journal.count(|c| matches!(c, Call::CreateRepository { .. })),
        0
    );
    // The count check reports the repository it found, not the configured one
    assert_eq!(
        report.repository,
        RepositoryOutcome::AlreadyExists {
            name: "unrelated".into()
        }
    );
    assert_eq!(
        cloud.status.lines()[0],
        StatusLine::RepositoryExists {
            name: "unrelated".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_two_repositories_trigger_create() {
    let cloud = FakeCloud::builder()
        .registry(|r| r.with_repositories(&["a", "b"]))
        .build();

    cloud.sequencer(test_config()).run().await.unwrap();

    assert_eq!(
        cloud.journal.count(|c| matches!(c, Call::CreateRepository { .. })),
        1
    );
    assert_eq!(cloud.registry.repositories().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_count_check_fails_when_repository_exists_among_others() {
    let cloud = FakeCloud::builder()
        .registry(|r| r.with_repositories(&["skodaice", "other"]))
        .build();

    let err = cloud.sequencer(test_config()).run().await.unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::Registry {
            operation: RegistryOperation::CreateRepository,
            ..
        }
    ));
    assert_eq!(
        cloud.journal.count(|c| matches!(c, Call::CreateCluster { .. })),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_name_match_finds_repository_among_others() {
    let cloud = FakeCloud::builder()
        .registry(|r| r.with_repositories(&["skodaice", "other"]))
        .build();
    let config = test_config().with_repository_check(RepositoryCheck::NameMatch);

    let report = cloud.sequencer(config).run().await.unwrap();

    assert_eq!(
        report.repository,
        RepositoryOutcome::AlreadyExists {
            name: "skodaice".into()
        }
    );
    assert_eq!(
        cloud.journal.count(|c| matches!(c, Call::CreateRepository { .. })),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_name_match_creates_when_single_repository_differs() {
    let cloud = FakeCloud::builder()
        .registry(|r| r.with_repositories(&["unrelated"]))
        .build();
    let config = test_config().with_repository_check(RepositoryCheck::NameMatch);

    let report = cloud.sequencer(config).run().await.unwrap();

    assert_eq!(
        report.repository,
        RepositoryOutcome::Created {
            name: "skodaice".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_cluster_created_even_when_present() {
    let cloud = FakeCloud::builder()
        .clusters(|c| c.with_clusters(&["skodaiceecs"]))
        .build();

    let report = cloud.sequencer(test_config()).run().await.unwrap();

    assert_eq!(
        cloud.journal.calls().last().cloned(),
        Some(Call::CreateCluster {
            name: "skodaiceecs".into(),
            capacity_providers: vec!["FARGATE".into()],
        })
    );
    assert_eq!(
        cloud.journal.count(|c| matches!(c, Call::CreateCluster { .. })),
        1
    );
    assert_eq!(
        report.cluster,
        ClusterOutcome::Created {
            name: "skodaiceecs".into()
        }
    );
    assert_eq!(
        cloud.status.rendered().last().map(String::as_str),
        Some("Cluster skodaiceecs created")
    );
}

#[tokio::test(start_paused = true)]
async fn test_identity_failures_stop_before_resources() {
    for operation in [
        IdentityOperation::ListKeys,
        IdentityOperation::DeleteKey,
        IdentityOperation::DeactivateKey,
        IdentityOperation::CreateKey,
    ] {
        let cloud = FakeCloud::builder()
            .identity(|i| {
                i.with_keys(keys(&[KeyStatus::Inactive, KeyStatus::Active]))
                    .failing_on(operation)
            })
            .build();

        let err = cloud.sequencer(test_config()).run().await.unwrap_err();

        assert!(err.is_fatal());
        assert!(
            matches!(err, ProvisionError::Identity { operation: op, .. } if op == operation),
            "{operation}: {err}"
        );
        assert_eq!(cloud.journal.count(Call::is_resource_call), 0, "{operation}");
        assert_eq!(
            cloud.journal.count(|c| matches!(c, Call::Connect { .. })),
            0
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_partial_rotation_is_not_rolled_back() {
    let cloud = FakeCloud::builder()
        .identity(|i| {
            i.with_keys(keys(&[KeyStatus::Active, KeyStatus::Active]))
                .failing_on(IdentityOperation::CreateKey)
        })
        .build();

    assert!(cloud.sequencer(test_config()).run().await.is_err());

    assert!(cloud
        .identity
        .keys()
        .iter()
        .all(|k| k.status == KeyStatus::Inactive));
}

#[tokio::test(start_paused = true)]
async fn test_image_push_failure_is_not_fatal() {
    let cloud = FakeCloud::builder()
        .images(|i| i.failing_with("manifest invalid"))
        .build();

    let report = cloud.sequencer(test_config()).run().await.unwrap();

    assert!(matches!(report.image, ImagePushOutcome::Failed { .. }));
    assert_eq!(
        cloud.journal.count(|c| matches!(c, Call::CreateCluster { .. })),
        1
    );
    assert!(cloud
        .status
        .rendered()
        .iter()
        .any(|l| l.starts_with("Error pushing image manifest") && l.contains("manifest invalid")));
}

#[tokio::test(start_paused = true)]
async fn test_repository_failure_skips_cluster() {
    let cloud = FakeCloud::builder()
        .registry(|r| r.failing_on(RegistryOperation::ListRepositories))
        .build();

    let err = cloud.sequencer(test_config()).run().await.unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(
        cloud.journal.count(|c| matches!(c, Call::PushImage { .. } | Call::CreateCluster { .. })),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_cluster_failure_is_fatal() {
    let cloud = FakeCloud::builder().clusters(|c| c.failing()).build();

    let err = cloud.sequencer(test_config()).run().await.unwrap_err();

    assert!(matches!(err, ProvisionError::Cluster { ref name, .. } if name == "skodaiceecs"));
}

#[tokio::test(start_paused = true)]
async fn test_issued_key_left_active_by_default() {
    let cloud = FakeCloud::new();

    let report = cloud.sequencer(test_config()).run().await.unwrap();

    assert!(!report.issued_key_revoked);
    let issued = cloud
        .identity
        .keys()
        .into_iter()
        .find(|k| k.key_id == report.rotation.issued_key_id)
        .unwrap();
    assert_eq!(issued.status, KeyStatus::Active);
}

#[tokio::test(start_paused = true)]
async fn test_revoke_on_exit_deactivates_issued_key() {
    let cloud = FakeCloud::new();

    let report = cloud
        .sequencer(test_config().with_revoke_on_exit(true))
        .run()
        .await
        .unwrap();

    assert!(report.issued_key_revoked);
    assert_eq!(
        cloud.journal.calls().last().cloned(),
        Some(Call::DeactivateKey {
            key_id: report.rotation.issued_key_id.clone()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_revoke_on_exit_runs_after_failure() {
    let cloud = FakeCloud::builder().clusters(|c| c.failing()).build();

    let err = cloud
        .sequencer(test_config().with_revoke_on_exit(true))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Cluster { .. }));
    assert!(cloud
        .identity
        .keys()
        .iter()
        .all(|k| k.status == KeyStatus::Inactive));
}

#[tokio::test(start_paused = true)]
async fn test_revoke_on_exit_after_connect_failure() {
    let cloud = FakeCloud::builder().failing_connect().build();

    let err = cloud
        .sequencer(test_config().with_revoke_on_exit(true))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Connect { .. }));
    assert_eq!(cloud.journal.count(Call::is_resource_call), 0);
    // No connected identity client exists, so the bootstrap client revokes
    let keys = cloud.identity.keys();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].status, KeyStatus::Inactive);
    assert_eq!(
        cloud.journal.calls().last().cloned(),
        Some(Call::DeactivateKey {
            key_id: keys[0].key_id.clone()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_poll_policy_waits_for_probe() {
    let cloud = FakeCloud::builder().probe_failures(3).build();
    let config = test_config().with_propagation(PropagationPolicy::Poll {
        initial_delay_ms: 1000,
        max_delay_ms: 4000,
        multiplier: 2.0,
        timeout_secs: 60,
    });

    cloud.sequencer(config).run().await.unwrap();

    assert_eq!(cloud.journal.count(|c| matches!(c, Call::Probe { .. })), 4);

    let created = cloud.journal.first(|c| matches!(c, Call::CreateKey { .. })).unwrap();
    let listed = cloud.journal.first(|c| matches!(c, Call::ListRepositories)).unwrap();
    // 1s + 2s + 4s of backoff
    assert_eq!(listed.at - created.at, Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_poll_policy_times_out() {
    let cloud = FakeCloud::builder().probe_failures(u32::MAX).build();
    let config = test_config().with_propagation(PropagationPolicy::Poll {
        initial_delay_ms: 500,
        max_delay_ms: 2000,
        multiplier: 2.0,
        timeout_secs: 10,
    });

    let err = cloud.sequencer(config).run().await.unwrap_err();

    assert!(matches!(err, ProvisionError::PropagationTimeout { waited_secs: 10 }));
    assert_eq!(cloud.journal.count(Call::is_resource_call), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_is_fatal() {
    let cloud = FakeCloud::builder().failing_connect().build();

    let err = cloud.sequencer(test_config()).run().await.unwrap_err();

    assert!(matches!(err, ProvisionError::Connect { .. }));
    assert_eq!(cloud.journal.count(Call::is_resource_call), 0);
}

#[tokio::test]
async fn test_invalid_config_makes_no_calls() {
    let cloud = FakeCloud::new();

    let err = cloud
        .sequencer(test_config().with_cluster(""))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Config { .. }));
    assert!(cloud.journal.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unusable_poll_settings_make_no_calls() {
    let settings = [
        (0, 8_000, 2.0, 1),
        (500, 8_000, f64::INFINITY, 60),
        (500, 8_000, f64::NAN, 60),
        (500, 8_000, 2.0, 9_223_372_036_854_775_807),
    ];

    for (initial_delay_ms, max_delay_ms, multiplier, timeout_secs) in settings {
        let cloud = FakeCloud::builder().probe_failures(100).build();
        let config = test_config().with_propagation(PropagationPolicy::Poll {
            initial_delay_ms,
            max_delay_ms,
            multiplier,
            timeout_secs,
        });

        let err = cloud.sequencer(config).run().await.unwrap_err();

        assert!(matches!(err, ProvisionError::Config { .. }), "{err}");
        assert!(cloud.journal.calls().is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn test_poll_backoff_survives_huge_multiplier() {
    let cloud = FakeCloud::builder().probe_failures(3).build();
    let config = test_config().with_propagation(PropagationPolicy::Poll {
        initial_delay_ms: 1_000,
        max_delay_ms: 4_000,
        multiplier: 1e300,
        timeout_secs: 60,
    });

    cloud.sequencer(config).run().await.unwrap();

    let probes: Vec<_> = cloud
        .journal
        .entries()
        .into_iter()
        .filter(|e| matches!(e.call, Call::Probe { .. }))
        .collect();
    assert_eq!(probes.len(), 4);
    assert_eq!(probes[3].at - probes[0].at, Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn test_environment_export() {
    let cloud = FakeCloud::new();
    let config = test_config()
        .with_export_environment(true)
        .with_region("eu-central-1");

    let report = cloud.sequencer(config).run().await.unwrap();

    assert_eq!(
        std::env::var("AWS_ACCESS_KEY_ID").unwrap(),
        report.rotation.issued_key_id
    );
    assert_eq!(std::env::var("AWS_SECRET_ACCESS_KEY").unwrap(), "secret-1");
    assert_eq!(std::env::var("REGION").unwrap(), "eu-central-1");
}
