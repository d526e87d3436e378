#![forbid(unsafe_code)]

mod common;

use common::*;
use fulcrum_core::auth::{AuthAction, AuthIdentity, AuthSubject, authorize};
use fulcrum_core::model::AgentStatus;
use fulcrum_storage::{
    AgentRegisterRequest, AgentStatusRequest, ErrorKind, JobsListRequest, ListScope,
    ServiceGroupRegisterRequest, ServicesListRequest, StoreError,
};

/// Two consumers on two agents of one provider: consumer-1 owns two
/// services on agent-1, consumer-2 one on agent-2.
fn populated() -> Fixture {
    let mut fx = setup();
    register_agent(&mut fx.store, "agent-2", PROVIDER);
    register_group(&mut fx.store, "group-2", "consumer-2");
    create_service(&mut fx.store);
    create_service(&mut fx.store);
    fx.store
        .service_create(create_request("agent-2", "group-2"))
        .expect("create foreign service");
    fx
}

fn list(fx: &Fixture, scope: ListScope, limit: usize, offset: usize) -> (Vec<String>, bool) {
    let result = fx
        .store
        .services_list(ServicesListRequest {
            scope,
            limit,
            offset,
        })
        .expect("list services");
    let ids = result
        .services
        .iter()
        .map(|service| service.id.to_string())
        .collect();
    (ids, result.has_more)
}

#[test]
fn list_visibility_follows_identity_scope() {
    let fx = populated();

    let admin = ListScope::for_identity(&AuthIdentity::admin("root")).expect("scope");
    assert_eq!(admin, ListScope::All);
    let (ids, _) = list(&fx, admin, 50, 0);
    assert_eq!(ids, ["SVC-001", "SVC-002", "SVC-003"]);

    let consumer = AuthIdentity::participant("user-1", participant(CONSUMER));
    let (ids, _) = list(&fx, ListScope::for_identity(&consumer).expect("scope"), 50, 0);
    assert_eq!(ids, ["SVC-001", "SVC-002"]);

    let agent = AuthIdentity::agent("agent-token-2", agent_id("agent-2"), participant(PROVIDER));
    let (ids, _) = list(&fx, ListScope::for_identity(&agent).expect("scope"), 50, 0);
    assert_eq!(ids, ["SVC-003"]);

    let jobs = fx
        .store
        .jobs_list(JobsListRequest {
            scope: ListScope::for_identity(&agent).expect("scope"),
            service_id: None,
            status: None,
            limit: 50,
            offset: 0,
        })
        .expect("list jobs");
    assert_eq!(jobs.jobs.len(), 1);
    assert_eq!(jobs.jobs[0].agent_id.as_str(), "agent-2");
}

#[test]
fn list_pages_with_has_more() {
    let fx = populated();

    let (ids, has_more) = list(&fx, ListScope::All, 2, 0);
    assert_eq!(ids, ["SVC-001", "SVC-002"]);
    assert!(has_more);

    let (ids, has_more) = list(&fx, ListScope::All, 2, 2);
    assert_eq!(ids, ["SVC-003"]);
    assert!(!has_more);

    // Zero is clamped up to one row.
    let (ids, has_more) = list(&fx, ListScope::All, 0, 0);
    assert_eq!(ids.len(), 1);
    assert!(has_more);
}

#[test]
fn row_scopes_gate_single_reads() {
    let mut fx = setup();
    let created = create_service(&mut fx.store);
    let job = live_job(&created);

    let owner = AuthIdentity::participant("user-1", participant(CONSUMER));
    let stranger = AuthIdentity::participant("user-9", participant("consumer-9"));
    let executor = AuthIdentity::agent("token-1", agent_id(AGENT), participant(PROVIDER));
    let other_agent = AuthIdentity::agent("token-2", agent_id("agent-2"), participant(PROVIDER));

    let scope = created.service.target_scope();
    assert!(authorize(&owner, AuthSubject::Service, AuthAction::Stop, &scope).is_ok());
    let err = authorize(&stranger, AuthSubject::Service, AuthAction::Read, &scope)
        .expect_err("foreign consumer");
    assert_eq!(StoreError::from(err).kind(), ErrorKind::Unauthorized);

    let scope = job.target_scope();
    assert!(authorize(&executor, AuthSubject::Job, AuthAction::Claim, &scope).is_ok());
    assert!(authorize(&other_agent, AuthSubject::Job, AuthAction::Claim, &scope).is_err());
    assert!(authorize(&owner, AuthSubject::Job, AuthAction::Claim, &scope).is_err());
    assert!(authorize(&AuthIdentity::admin("root"), AuthSubject::Job, AuthAction::Fail, &scope).is_ok());
}

#[test]
fn agents_track_connectivity() {
    let mut fx = setup();

    let agent = fx
        .store
        .agent_get(&agent_id(AGENT))
        .expect("get")
        .expect("agent");
    assert_eq!(agent.status, AgentStatus::Disconnected);
    assert_eq!(agent.provider_id.as_str(), PROVIDER);

    let connected = fx
        .store
        .agent_set_status(AgentStatusRequest {
            id: agent_id(AGENT),
            status: AgentStatus::Connected,
        })
        .expect("set status");
    assert_eq!(connected.status, AgentStatus::Connected);

    // Re-registering renames without touching connectivity.
    let renamed = fx
        .store
        .agent_register(AgentRegisterRequest {
            id: agent_id(AGENT),
            provider_id: participant(PROVIDER),
            name: "rack 7".to_string(),
        })
        .expect("re-register");
    assert_eq!(renamed.name, "rack 7");
    assert_eq!(renamed.status, AgentStatus::Connected);

    let err = fx
        .store
        .agent_register(AgentRegisterRequest {
            id: agent_id(AGENT),
            provider_id: participant("provider-2"),
            name: "hijack".to_string(),
        })
        .expect_err("provider change");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = fx
        .store
        .agent_set_status(AgentStatusRequest {
            id: agent_id("agent-404"),
            status: AgentStatus::Connected,
        })
        .expect_err("unknown agent");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn service_groups_are_registered_once() {
    let mut fx = setup();

    let group = fx
        .store
        .service_group_get(&group_id(GROUP))
        .expect("get")
        .expect("group");
    assert_eq!(group.consumer_id.as_str(), CONSUMER);

    let err = fx
        .store
        .service_group_register(ServiceGroupRegisterRequest {
            id: group_id(GROUP),
            consumer_id: participant("consumer-2"),
            name: "dup".to_string(),
        })
        .expect_err("duplicate group");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}
