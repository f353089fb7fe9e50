use std::time::Duration;

use vroot_config::TransportFailurePolicy;
use vroot_core::{AccessFlags, ActionMask, DenyReason, ErrorCode, MessageType, NodeKind, Verdict};
use vroot_sim::{fast_config, Behaviour, Harness, MemFs, MemNode, SimCaller};

const PROVIDER: i32 = 500;

fn cat() -> SimCaller {
    SimCaller::new(100, "cat")
}

fn online_repo() -> Harness {
    let fs = MemFs::new();
    fs.add_root(0, "/repo", Some(PROVIDER));
    Harness::start(&fast_config(), fs).unwrap()
}

fn offline_repo() -> Harness {
    let fs = MemFs::new();
    fs.add_root(0, "/repo", None);
    Harness::start(&fast_config(), fs).unwrap()
}

// ─── End-to-end scenarios ───────────────────────────────────────────────────

#[test]
fn read_of_empty_file_hydrates_and_allows() {
    let h = online_repo();
    h.fs.add_placeholder("/repo/a.txt", true);

    let verdict = h
        .access(&cat(), &MemNode::file("/repo/a.txt"), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(verdict, Verdict::Allow);
    assert!(!h.fs.flags("/repo/a.txt").is_empty_placeholder());

    let sent = h.provider.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, MessageType::HydrateFile);
    assert_eq!(sent[0].relative_path, "a.txt");
    assert_eq!(sent[0].pid, 100);
    assert_eq!(sent[0].process_name, "cat");
    assert!(h.arbiter().pending().is_empty());

    // Hydrated now: no second round trip.
    let verdict = h
        .access(&cat(), &MemNode::file("/repo/a.txt"), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(verdict, Verdict::Allow);
    assert_eq!(h.provider.sent_count(), 1);
}

#[test]
fn failed_hydration_denies_with_try_again() {
    let h = online_repo();
    h.fs.add_placeholder("/repo/a.txt", true);
    h.provider.set_behaviour(Behaviour::Fail);

    let verdict = h
        .access(&cat(), &MemNode::file("/repo/a.txt"), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(verdict, Verdict::Deny(DenyReason::HydrationFailed));
    assert_eq!(verdict.error_code(), Some(ErrorCode::TryAgain));
    assert!(h.fs.flags("/repo/a.txt").is_empty_placeholder());
}

#[test]
fn offline_write_on_hydrated_file_denied() {
    let h = offline_repo();
    h.fs.add_placeholder("/repo/a.txt", false);

    let verdict = h
        .access(&SimCaller::new(101, "vim"), &MemNode::file("/repo/a.txt"), ActionMask::WRITE_DATA)
        .unwrap();
    assert_eq!(verdict, Verdict::Deny(DenyReason::OfflineWrite));
    assert_eq!(h.provider.sent_count(), 0);
}

#[test]
fn offline_listing_of_empty_directory_allowed() {
    let h = offline_repo();
    h.fs.add_placeholder("/repo/src", true);

    let verdict = h
        .access(&SimCaller::new(101, "ls"), &MemNode::dir("/repo/src"), ActionMask::LIST_DIRECTORY)
        .unwrap();
    assert_eq!(verdict, Verdict::Allow);
    assert_eq!(h.provider.sent_count(), 0);
}

#[test]
fn offline_read_of_empty_file_denied() {
    let h = offline_repo();
    h.fs.add_placeholder("/repo/a.txt", true);

    let verdict = h
        .access(&cat(), &MemNode::file("/repo/a.txt"), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(verdict, Verdict::Deny(DenyReason::OfflinePlaceholder));
}

#[test]
fn directory_listing_sends_enumeration() {
    let h = online_repo();
    h.fs.add_placeholder("/repo/src", true);

    let verdict = h
        .access(&cat(), &MemNode::dir("/repo/src"), ActionMask::LIST_DIRECTORY)
        .unwrap();
    assert_eq!(verdict, Verdict::Allow);
    let sent = h.provider.sent();
    assert_eq!(sent[0].kind, MessageType::EnumerateDirectory);
    assert_eq!(sent[0].relative_path, "src");
}

#[test]
fn root_directory_has_empty_relative_path() {
    let fs = MemFs::new();
    fs.add_root(0, "/repo", Some(PROVIDER));
    fs.add_placeholder("/repo", true);
    let h = Harness::start(&fast_config(), fs).unwrap();

    let verdict = h
        .access(&cat(), &MemNode::dir("/repo"), ActionMask::SEARCH)
        .unwrap();
    assert_eq!(verdict, Verdict::Allow);
    assert_eq!(h.provider.sent()[0].relative_path, "");
}

// ─── Fast path and crawlers ─────────────────────────────────────────────────

#[test]
fn outside_any_root_never_looks_up_root() {
    let h = online_repo();
    let before = h.fs.root_lookups();

    for action in [ActionMask::READ_DATA, ActionMask::WRITE_DATA, ActionMask::DELETE] {
        let verdict = h
            .access(&cat(), &MemNode::file("/home/user/notes.txt"), action)
            .unwrap();
        assert_eq!(verdict, Verdict::Allow);
    }

    assert_eq!(h.fs.root_lookups(), before);
    assert_eq!(h.provider.sent_count(), 0);
    assert_eq!(h.arbiter().metrics().snapshot().fast_path, 3);
}

#[test]
fn crawlers_denied_on_placeholders_for_every_action() {
    let h = online_repo();
    h.fs.add_placeholder("/repo/a.txt", true);

    let all = [
        ActionMask::READ_DATA,
        ActionMask::DELETE,
        ActionMask::ACCESS,
        ActionMask::READ_EXTATTRIBUTES,
        ActionMask::empty(),
    ];
    for name in ["mds", "mdworker", "mds_stores", "fseventsd", "Spotlight"] {
        for action in all {
            let verdict = h
                .access(&SimCaller::new(77, name), &MemNode::file("/repo/a.txt"), action)
                .unwrap();
            assert_eq!(verdict, Verdict::Deny(DenyReason::Crawler), "{} {:?}", name, action);
        }
    }
    assert_eq!(h.provider.sent_count(), 0);
    assert!(h.fs.flags("/repo/a.txt").is_empty_placeholder());
}

#[test]
fn crawler_allowed_on_hydrated_file() {
    let h = online_repo();
    h.fs.add_placeholder("/repo/a.txt", false);
    let verdict = h
        .access(&SimCaller::new(77, "mdworker"), &MemNode::file("/repo/a.txt"), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(verdict, Verdict::Allow);
}

#[test]
fn crawler_list_from_config() {
    let fs = MemFs::new();
    fs.add_root(0, "/repo", Some(PROVIDER));
    fs.add_placeholder("/repo/a.txt", true);
    let h = Harness::start(&fast_config().with_crawlers(["indexer"]), fs).unwrap();

    let denied = h
        .access(&SimCaller::new(1, "indexer"), &MemNode::file("/repo/a.txt"), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(denied, Verdict::Deny(DenyReason::Crawler));

    let allowed = h
        .access(&SimCaller::new(2, "mds"), &MemNode::file("/repo/a.txt"), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(allowed, Verdict::Allow);
}

#[test]
fn padded_crawler_names_still_match() {
    let fs = MemFs::new();
    fs.add_root(0, "/repo", Some(PROVIDER));
    fs.add_placeholder("/repo/a.txt", true);
    let h = Harness::start(&fast_config().with_crawlers([" mds ", "indexer\t"]), fs).unwrap();

    for (pid, name) in [(1, "mds"), (2, "indexer")] {
        let verdict = h
            .access(&SimCaller::new(pid, name), &MemNode::file("/repo/a.txt"), ActionMask::READ_DATA)
            .unwrap();
        assert_eq!(verdict, Verdict::Deny(DenyReason::Crawler), "{}", name);
    }
    assert!(h.arbiter().classifier().is_crawler("mds"));
    assert!(!h.arbiter().classifier().is_crawler(" mds "));
    assert_eq!(h.provider.sent_count(), 0);
    assert!(h.fs.flags("/repo/a.txt").is_empty_placeholder());
}

#[test]
fn truncated_process_name_is_what_gets_classified() {
    let fs = MemFs::new();
    fs.add_root(0, "/repo", Some(PROVIDER));
    fs.add_placeholder("/repo/a.txt", true);
    fs.add_placeholder("/repo/b.txt", true);
    let h = Harness::start(&fast_config().with_crawlers(["com.example.inde"]), fs).unwrap();

    // The host cuts "com.example.indexer" to its first 16 bytes.
    let verdict = h
        .access(
            &SimCaller::new(1, "com.example.indexer"),
            &MemNode::file("/repo/a.txt"),
            ActionMask::READ_DATA,
        )
        .unwrap();
    assert_eq!(verdict, Verdict::Deny(DenyReason::Crawler));

    let verdict = h
        .access(
            &SimCaller::new(2, "a-long-build-tool"),
            &MemNode::file("/repo/b.txt"),
            ActionMask::READ_DATA,
        )
        .unwrap();
    assert_eq!(verdict, Verdict::Allow);
    assert_eq!(h.provider.sent()[0].process_name, "a-long-build-too");
}

// ─── Guards and anomalies ───────────────────────────────────────────────────

#[test]
fn provider_own_access_is_never_blocked() {
    let h = online_repo();
    h.fs.add_placeholder("/repo/a.txt", true);
    h.provider.set_behaviour(Behaviour::Ignore);

    let verdict = h
        .access(
            &SimCaller::new(PROVIDER, "vroot-provider"),
            &MemNode::file("/repo/a.txt"),
            ActionMask::READ_DATA,
        )
        .unwrap();
    assert_eq!(verdict, Verdict::Allow);
    assert_eq!(h.provider.sent_count(), 0);
}

#[test]
fn ignored_kinds_skip_everything() {
    let h = online_repo();
    for kind in [NodeKind::Fifo, NodeKind::Socket, NodeKind::Block, NodeKind::Character] {
        h.fs.add_placeholder("/repo/dev", true);
        let verdict = h
            .access(&SimCaller::new(9, "mds"), &MemNode::new("/repo/dev", kind), ActionMask::READ_DATA)
            .unwrap();
        assert_eq!(verdict, Verdict::Allow, "{:?}", kind);
    }
    assert_eq!(h.fs.flag_reads(), 0);
}

#[test]
fn unusual_kind_is_governed() {
    let h = online_repo();
    h.fs.add_placeholder("/repo/fork", true);
    let verdict = h
        .access(&cat(), &MemNode::new("/repo/fork", NodeKind::Stream), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(verdict, Verdict::Allow);
    assert_eq!(h.provider.sent()[0].kind, MessageType::HydrateFile);
}

#[test]
fn unmanaged_filesystem_allows_without_reading_flags() {
    let fs = MemFs::new();
    fs.add_unmanaged_prefix("/proc");
    fs.set_flags("/proc/1/status", AccessFlags::IN_ROOT | AccessFlags::EMPTY);
    let h = Harness::start(&fast_config(), fs).unwrap();

    let verdict = h
        .access(&cat(), &MemNode::file("/proc/1/status"), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(verdict, Verdict::Allow);
    assert_eq!(h.fs.flag_reads(), 0);
}

#[test]
fn flagged_node_without_root_fails_open() {
    let h = online_repo();
    h.fs.add_placeholder("/repo/stray.txt", true);
    h.fs.orphan("/repo/stray.txt");

    let verdict = h
        .access(&cat(), &MemNode::file("/repo/stray.txt"), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(verdict, Verdict::Allow);
    assert_eq!(h.provider.sent_count(), 0);
}

#[test]
fn unreadable_flags_are_an_integrity_violation() {
    let h = online_repo();
    h.fs.fail_attributes("/repo/broken.bin");

    let err = h
        .access(&cat(), &MemNode::file("/repo/broken.bin"), ActionMask::READ_DATA)
        .unwrap_err();
    assert_eq!(err.path, "/repo/broken.bin");
    assert_eq!(h.arbiter().metrics().snapshot().integrity_violations, 1);
}

#[test]
fn unresolvable_path_denied() {
    let h = online_repo();
    h.fs.add_placeholder("/repo/ghost", true);

    let verdict = h
        .access(&cat(), &MemNode::file("/repo/ghost").unresolvable(), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(verdict, Verdict::Deny(DenyReason::PathUnresolved));
    assert_eq!(h.provider.sent_count(), 0);
}

#[test]
fn actions_that_do_not_need_content_skip_provider() {
    let h = online_repo();
    h.fs.add_placeholder("/repo/a.txt", true);
    h.fs.add_placeholder("/repo/dir", true);

    for action in [ActionMask::DELETE, ActionMask::APPEND_DATA, ActionMask::READ_SECURITY] {
        let verdict = h
            .access(&cat(), &MemNode::file("/repo/a.txt"), action)
            .unwrap();
        assert_eq!(verdict, Verdict::Allow);
    }
    for action in [ActionMask::DELETE, ActionMask::ADD_FILE, ActionMask::WRITE_ATTRIBUTES] {
        let verdict = h.access(&cat(), &MemNode::dir("/repo/dir"), action).unwrap();
        assert_eq!(verdict, Verdict::Allow);
    }
    assert_eq!(h.provider.sent_count(), 0);
}

// ─── Transport failures ─────────────────────────────────────────────────────

#[test]
fn send_failure_allows_by_default() {
    let h = online_repo();
    h.fs.add_placeholder("/repo/a.txt", true);
    h.provider.set_behaviour(Behaviour::RejectSend);

    let verdict = h
        .access(&cat(), &MemNode::file("/repo/a.txt"), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(verdict, Verdict::Allow);
    assert!(h.arbiter().pending().is_empty());
    assert_eq!(h.arbiter().metrics().snapshot().transport_failures, 1);
}

#[test]
fn send_failure_denies_when_configured() {
    let fs = MemFs::new();
    fs.add_root(0, "/repo", Some(PROVIDER));
    fs.add_placeholder("/repo/a.txt", true);
    let config = fast_config().with_transport_failure_policy(TransportFailurePolicy::Deny);
    let h = Harness::start(&config, fs).unwrap();
    h.provider.set_behaviour_for("a.txt", Behaviour::RejectSend);

    let verdict = h
        .access(&cat(), &MemNode::file("/repo/a.txt"), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(verdict, Verdict::Deny(DenyReason::ProviderUnreachable));
    assert_eq!(verdict.error_code(), Some(ErrorCode::ProviderUnreachable));
    assert!(h.arbiter().pending().is_empty());
}

#[test]
fn per_path_behaviour_overrides_default() {
    let h = online_repo();
    h.fs.add_placeholder("/repo/good.txt", true);
    h.fs.add_placeholder("/repo/bad.txt", true);
    h.provider.set_behaviour_for("bad.txt", Behaviour::Fail);

    let good = h.access(&cat(), &MemNode::file("/repo/good.txt"), ActionMask::READ_DATA);
    let bad = h.access(&cat(), &MemNode::file("/repo/bad.txt"), ActionMask::READ_DATA);
    assert_eq!(good.unwrap(), Verdict::Allow);
    assert_eq!(bad.unwrap(), Verdict::Deny(DenyReason::HydrationFailed));
}

#[test]
fn slow_provider_still_answers() {
    let h = online_repo();
    h.fs.add_placeholder("/repo/a.txt", true);
    // Longer than the poll interval, so the waiter re-checks at least once.
    h.provider
        .set_behaviour(Behaviour::SucceedAfter(Duration::from_millis(60)));

    let verdict = h
        .access(&cat(), &MemNode::file("/repo/a.txt"), ActionMask::EXECUTE)
        .unwrap();
    assert_eq!(verdict, Verdict::Allow);
    assert!(h.arbiter().metrics().snapshot().hydration_avg_ms.unwrap() >= 50.0);
}

#[test]
fn provider_toggling_offline_and_back() {
    let h = online_repo();
    h.fs.add_placeholder("/repo/a.txt", true);

    h.fs.set_provider(0, None);
    let offline = h
        .access(&cat(), &MemNode::file("/repo/a.txt"), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(offline, Verdict::Deny(DenyReason::OfflinePlaceholder));

    h.fs.set_provider(0, Some(PROVIDER));
    let online = h
        .access(&cat(), &MemNode::file("/repo/a.txt"), ActionMask::READ_DATA)
        .unwrap();
    assert_eq!(online, Verdict::Allow);
}
