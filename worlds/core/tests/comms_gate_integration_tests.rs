// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use aegis_worlds_core::application::access_checker::{AccessChecker, CommunityMembershipService};
use aegis_worlds_core::application::comms_gate::{
    CommsGate, CommsGateError, ConnectionRequest, RealtimeBackend,
};
use aegis_worlds_core::application::directory::{WorldRecord, WorldsDirectory};
use aegis_worlds_core::application::permissions::PermissionsManager;
use aegis_worlds_core::application::rate_limiter::RateLimiter;
use aegis_worlds_core::application::secrets::SecretHasher;
use aegis_worlds_core::domain::access::AccessSetting;
use aegis_worlds_core::domain::config::AccessControlConfig;
use aegis_worlds_core::domain::repository::AccessRepository;
use aegis_worlds_core::domain::world::WorldName;
use aegis_worlds_core::infrastructure::repositories::{
    InMemoryAccessRepository, InMemoryPermissionsRepository,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct NoCommunities;

#[async_trait]
impl CommunityMembershipService for NoCommunities {
    async fn get_member_communities(&self, _identity: &str, _ids: &[String]) -> Vec<String> {
        Vec::new()
    }
}

struct FakeDirectory {
    worlds: Vec<WorldRecord>,
    scenes: HashSet<(WorldName, String)>,
}

#[async_trait]
impl WorldsDirectory for FakeDirectory {
    async fn get_world(&self, world: &WorldName) -> anyhow::Result<Option<WorldRecord>> {
        Ok(self.worlds.iter().find(|w| &w.name == world).cloned())
    }

    async fn scene_exists(&self, world: &WorldName, scene_id: &str) -> anyhow::Result<bool> {
        Ok(self.scenes.contains(&(world.clone(), scene_id.to_string())))
    }
}

struct FakeRealtime {
    count: AtomicUsize,
}

#[async_trait]
impl RealtimeBackend for FakeRealtime {
    async fn world_connection_string(
        &self,
        world: &WorldName,
        identity: &str,
    ) -> anyhow::Result<String> {
        Ok(format!("rt:{world}:{identity}"))
    }

    async fn scene_connection_string(
        &self,
        world: &WorldName,
        scene_id: &str,
        identity: &str,
    ) -> anyhow::Result<String> {
        Ok(format!("rt:{world}:{scene_id}:{identity}"))
    }

    async fn participant_count(&self, _world: &WorldName) -> anyhow::Result<usize> {
        Ok(self.count.load(Ordering::Relaxed))
    }
}

struct Harness {
    world: WorldName,
    gate: CommsGate,
    access_repo: Arc<InMemoryAccessRepository>,
    realtime: Arc<FakeRealtime>,
    limiter: Arc<RateLimiter>,
    config: AccessControlConfig,
}

fn harness() -> Harness {
    let world = WorldName::new("plaza.eth");
    let config: AccessControlConfig = serde_json::from_value(serde_json::json!({
        "world_room_capacity": 3,
        "rate_limit_max_attempts": 2,
    }))
    .unwrap();
    let access_repo = Arc::new(InMemoryAccessRepository::new());
    let permissions_repo = Arc::new(InMemoryPermissionsRepository::new());
    let checker = Arc::new(AccessChecker::new(access_repo.clone(), Arc::new(NoCommunities)));
    let permissions = Arc::new(PermissionsManager::new(permissions_repo, &config));
    let limiter = Arc::new(RateLimiter::new(&config));
    let directory = Arc::new(FakeDirectory {
        worlds: vec![
            WorldRecord { name: world.clone(), owner: "0xowner".to_string(), blocked: false },
            WorldRecord { name: WorldName::new("banned.eth"), owner: "0xowner".to_string(), blocked: true },
        ],
        scenes: [(world.clone(), "bafkreiscene".to_string())].into_iter().collect(),
    });
    let realtime = Arc::new(FakeRealtime { count: AtomicUsize::new(0) });

    let gate = CommsGate::new(
        checker,
        permissions,
        limiter.clone(),
        directory,
        realtime.clone(),
        &config,
    );
    Harness { world, gate, access_repo, realtime, limiter, config }
}

fn request(identity: &str, secret: Option<&str>) -> ConnectionRequest {
    ConnectionRequest {
        identity: identity.to_string(),
        secret: secret.map(String::from),
        trusted_client_ip: Some("10.1.2.3".to_string()),
    }
}

#[tokio::test]
async fn unrestricted_world_issues_a_connection_string() {
    let h = harness();
    let s = h
        .gate
        .get_world_room_connection_string(&h.world, &request("0xVisitor", None))
        .await
        .unwrap();
    assert_eq!(s, "rt:plaza.eth:0xVisitor");
}

#[tokio::test]
async fn unknown_and_blocked_worlds_are_invalid() {
    let h = harness();
    let err = h
        .gate
        .get_world_room_connection_string(&WorldName::new("ghost.eth"), &request("0xa", None))
        .await
        .unwrap_err();
    assert!(matches!(err, CommsGateError::InvalidWorld(_)));

    let err = h
        .gate
        .get_world_room_connection_string(&WorldName::new("banned.eth"), &request("0xa", None))
        .await
        .unwrap_err();
    assert!(matches!(err, CommsGateError::InvalidWorld(_)));
}

#[tokio::test]
async fn allow_list_denies_unlisted_identities() {
    let h = harness();
    h.access_repo
        .put_access(&h.world, &AccessSetting::allow_list(["0xlisted"], Vec::<String>::new()))
        .await
        .unwrap();

    let err = h
        .gate
        .get_world_room_connection_string(&h.world, &request("0xstranger", None))
        .await
        .unwrap_err();
    assert!(matches!(err, CommsGateError::InvalidAccess { .. }));

    assert!(h
        .gate
        .get_world_room_connection_string(&h.world, &request("0xLISTED", None))
        .await
        .is_ok());
}

#[tokio::test]
async fn missing_scene_is_not_found_but_access_errors_win() {
    let h = harness();
    let err = h
        .gate
        .get_scene_room_connection_string(&h.world, "bafkreimissing", &request("0xa", None))
        .await
        .unwrap_err();
    assert!(matches!(err, CommsGateError::SceneNotFound { .. }));

    let s = h
        .gate
        .get_scene_room_connection_string(&h.world, "bafkreiscene", &request("0xa", None))
        .await
        .unwrap();
    assert_eq!(s, "rt:plaza.eth:bafkreiscene:0xa");
}

#[tokio::test]
async fn full_world_rooms_reject_new_participants() {
    let h = harness();
    h.realtime.count.store(3, Ordering::Relaxed);
    let err = h
        .gate
        .get_world_room_connection_string(&h.world, &request("0xa", None))
        .await
        .unwrap_err();
    assert!(matches!(err, CommsGateError::WorldAtCapacity { capacity: 3, .. }));

    // Scene rooms have no capacity ceiling.
    assert!(h
        .gate
        .get_scene_room_connection_string(&h.world, "bafkreiscene", &request("0xa", None))
        .await
        .is_ok());
}

#[tokio::test]
async fn repeated_bad_secrets_rate_limit_the_subject() {
    let h = harness();
    let hasher = SecretHasher::new(&h.config);
    h.access_repo
        .put_access(
            &h.world,
            &AccessSetting::SharedSecret { secret_hash: hasher.hash("sesame").unwrap() },
        )
        .await
        .unwrap();

    for _ in 0..2 {
        let err = h
            .gate
            .get_world_room_connection_string(&h.world, &request("0xa", Some("wrong")))
            .await
            .unwrap_err();
        assert!(matches!(err, CommsGateError::InvalidAccess { .. }));
    }
    assert!(h.limiter.is_rate_limited(&h.world, "10.1.2.3"));

    // Even the right secret is rejected while limited.
    let err = h
        .gate
        .get_world_room_connection_string(&h.world, &request("0xa", Some("sesame")))
        .await
        .unwrap_err();
    assert!(matches!(err, CommsGateError::InvalidAccess { .. }));

    h.limiter.clear_attempts(&h.world, "10.1.2.3");
    assert!(h
        .gate
        .get_world_room_connection_string(&h.world, &request("0xa", Some("sesame")))
        .await
        .is_ok());
}
