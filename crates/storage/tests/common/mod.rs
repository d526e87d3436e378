#![forbid(unsafe_code)]
#![allow(dead_code)]

use fulcrum_core::ids::{AgentId, GroupId, JobId, ParticipantId, ServiceTypeId};
use fulcrum_core::model::JobStatus;
use fulcrum_core::policy::ReconcilePolicy;
use fulcrum_storage::{
    AgentRegisterRequest, JobClaimRequest, JobCompleteRequest, JobFailRequest, JobOutcomeResult,
    JobRow, ServiceCreateRequest, ServiceGroupRegisterRequest, ServiceMutationResult, SqliteStore,
};
use serde_json::json;
use tempfile::TempDir;

pub const PROVIDER: &str = "provider-1";
pub const CONSUMER: &str = "consumer-1";
pub const AGENT: &str = "agent-1";
pub const GROUP: &str = "group-1";

pub struct Fixture {
    pub store: SqliteStore,
    pub dir: TempDir,
}

pub fn participant(id: &str) -> ParticipantId {
    ParticipantId::try_new(id).expect("participant id")
}

pub fn agent_id(id: &str) -> AgentId {
    AgentId::try_new(id).expect("agent id")
}

pub fn group_id(id: &str) -> GroupId {
    GroupId::try_new(id).expect("group id")
}

pub fn setup() -> Fixture {
    setup_with_policy(ReconcilePolicy::default())
}

/// Opens a store in a fresh temp dir with one provider agent and one
/// consumer group registered.
pub fn setup_with_policy(policy: ReconcilePolicy) -> Fixture {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut store = SqliteStore::open_with_policy(dir.path(), policy).expect("open store");
    register_agent(&mut store, AGENT, PROVIDER);
    register_group(&mut store, GROUP, CONSUMER);
    Fixture { store, dir }
}

pub fn register_agent(store: &mut SqliteStore, id: &str, provider: &str) {
    store
        .agent_register(AgentRegisterRequest {
            id: agent_id(id),
            provider_id: participant(provider),
            name: format!("{id} executor"),
        })
        .expect("register agent");
}

pub fn register_group(store: &mut SqliteStore, id: &str, consumer: &str) {
    store
        .service_group_register(ServiceGroupRegisterRequest {
            id: group_id(id),
            consumer_id: participant(consumer),
            name: format!("{id} workloads"),
        })
        .expect("register group");
}

pub fn create_request(agent: &str, group: &str) -> ServiceCreateRequest {
    ServiceCreateRequest {
        agent_id: agent_id(agent),
        service_type_id: ServiceTypeId::try_new("vm.small").expect("service type id"),
        group_id: group_id(group),
        name: "web".to_string(),
        attributes: json!({ "region": ["eu-west"] }),
        properties: json!({ "cpu": 2, "memory_mb": 2048 }),
        priority: None,
    }
}

pub fn create_service(store: &mut SqliteStore) -> ServiceMutationResult {
    store
        .service_create(create_request(AGENT, GROUP))
        .expect("create service")
}

pub fn live_job(result: &ServiceMutationResult) -> JobRow {
    let job = result.job.clone().expect("enqueued job");
    assert_eq!(job.status, JobStatus::Pending);
    job
}

pub fn claim(store: &mut SqliteStore, job_id: &JobId) -> JobRow {
    store
        .job_claim(JobClaimRequest {
            id: job_id.clone(),
            agent_id: agent_id(AGENT),
        })
        .expect("claim job")
}

pub fn complete(store: &mut SqliteStore, job_id: &JobId) -> JobOutcomeResult {
    store
        .job_complete(JobCompleteRequest {
            id: job_id.clone(),
            resources: None,
            external_id: None,
        })
        .expect("complete job")
}

pub fn fail(store: &mut SqliteStore, job_id: &JobId, message: &str) -> JobOutcomeResult {
    store
        .job_fail(JobFailRequest {
            id: job_id.clone(),
            error_message: message.to_string(),
        })
        .expect("fail job")
}

/// Claims and completes the job of `result`.
pub fn drive(store: &mut SqliteStore, result: &ServiceMutationResult) -> JobOutcomeResult {
    let job = live_job(result);
    claim(store, &job.id);
    complete(store, &job.id)
}

/// Creates a service and drives it to `STARTED`.
pub fn started_service(store: &mut SqliteStore) -> ServiceMutationResult {
    let created = create_service(store);
    let outcome = drive(store, &created);
    ServiceMutationResult {
        service: outcome.service,
        job: None,
    }
}
