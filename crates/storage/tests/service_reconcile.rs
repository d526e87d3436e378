#![forbid(unsafe_code)]

mod common;

use common::*;
use fulcrum_core::model::{JobAction, ServiceState};
use fulcrum_core::policy::ReconcilePolicy;
use fulcrum_core::reconcile::{ReconcileError, ReconcileStatus};
use fulcrum_storage::{
    ErrorKind, ServiceRetryRequest, ServiceTransitionRequest, ServiceUpdateRequest, StoreError,
};
use serde_json::json;

fn transition(
    fx: &mut Fixture,
    service: &fulcrum_storage::ServiceRow,
    target: ServiceState,
) -> Result<fulcrum_storage::ServiceMutationResult, StoreError> {
    fx.store.service_transition(ServiceTransitionRequest {
        id: service.id.clone(),
        target,
        priority: None,
    })
}

fn retry(
    fx: &mut Fixture,
    service: &fulcrum_storage::ServiceRow,
) -> Result<fulcrum_storage::ServiceMutationResult, StoreError> {
    fx.store.service_retry(ServiceRetryRequest {
        id: service.id.clone(),
        priority: None,
    })
}

fn reconfigure(
    fx: &mut Fixture,
    service: &fulcrum_storage::ServiceRow,
    properties: serde_json::Value,
) -> Result<fulcrum_storage::ServiceMutationResult, StoreError> {
    fx.store.service_update(ServiceUpdateRequest {
        id: service.id.clone(),
        name: None,
        properties: Some(properties),
        priority: None,
    })
}

#[test]
fn transition_round_trip() {
    let mut fx = setup();
    let started = started_service(&mut fx.store);
    assert_eq!(started.service.current_state, ServiceState::Started);

    let stopping = transition(&mut fx, &started.service, ServiceState::Stopped).expect("stop");
    let job = live_job(&stopping);
    assert_eq!(job.action, JobAction::Stop);
    assert_eq!(job.priority, JobAction::Stop.default_priority());
    assert_eq!(stopping.service.target_state, Some(ServiceState::Stopped));
    assert_eq!(stopping.service.current_state, ServiceState::Started);

    let stopped = drive(&mut fx.store, &stopping).service;
    assert_eq!(stopped.current_state, ServiceState::Stopped);
    assert_eq!(stopped.target_state, None);
    assert_eq!(stopped.retry_count, 0);

    let starting = transition(&mut fx, &stopped, ServiceState::Started).expect("start");
    assert_eq!(live_job(&starting).action, JobAction::Start);
    let restarted = drive(&mut fx.store, &starting).service;
    assert_eq!(restarted.current_state, ServiceState::Started);
    assert_eq!(restarted.reconcile_status(), ReconcileStatus::AtRest);
}

#[test]
fn transition_is_refused_while_a_job_is_live() {
    let mut fx = setup();
    let created = create_service(&mut fx.store);
    let job = live_job(&created);

    let err = transition(&mut fx, &created.service, ServiceState::Deleted).expect_err("busy");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    match err {
        StoreError::Reconcile(ReconcileError::JobInFlight { job_id }) => assert_eq!(job_id, job.id),
        other => panic!("unexpected error: {other:?}"),
    }

    let service = fx
        .store
        .service_get(&created.service.id)
        .expect("get")
        .expect("service");
    assert_eq!(service.target_state, Some(ServiceState::Started));
    assert_eq!(service.revision, created.service.revision);
}

#[test]
fn transition_to_current_state_is_rejected() {
    let mut fx = setup();
    let started = started_service(&mut fx.store);

    let err = transition(&mut fx, &started.service, ServiceState::Started).expect_err("no-op");
    assert!(matches!(
        err,
        StoreError::Reconcile(ReconcileError::UnchangedTarget { .. })
    ));
    let err = transition(&mut fx, &started.service, ServiceState::Created).expect_err("back");
    assert!(matches!(
        err,
        StoreError::Reconcile(ReconcileError::InvalidTransition { .. })
    ));
}

#[test]
fn retry_clears_error_and_keeps_target() {
    let mut fx = setup();
    let created = create_service(&mut fx.store);
    let job = live_job(&created);
    claim(&mut fx.store, &job.id);
    fail(&mut fx.store, &job.id, "quota exceeded");

    let retried = retry(&mut fx, &created.service).expect("retry");
    let service = &retried.service;
    assert_eq!(service.retry_count, 1);
    assert_eq!(service.failed_action, None);
    assert_eq!(service.error_message, None);
    assert_eq!(service.target_state, Some(ServiceState::Started));

    let next = live_job(&retried);
    assert_ne!(next.id, job.id);
    assert_eq!(next.action, JobAction::Create);

    let done = drive(&mut fx.store, &retried).service;
    assert_eq!(done.current_state, ServiceState::Started);
    assert_eq!(done.retry_count, 0);
}

#[test]
fn retry_is_bounded() {
    let mut fx = setup_with_policy(ReconcilePolicy::default().with_max_retries(2));
    let created = create_service(&mut fx.store);
    let service = created.service.clone();

    let mut current = created;
    for attempt in 0..3 {
        let job = live_job(&current);
        claim(&mut fx.store, &job.id);
        let outcome = fail(&mut fx.store, &job.id, "agent error");
        assert_eq!(outcome.service.retry_count, attempt);
        if attempt < 2 {
            assert!(!outcome.retries_exhausted);
            assert_eq!(outcome.service.target_state, Some(ServiceState::Started));
            current = retry(&mut fx, &service).expect("retry");
        } else {
            assert!(outcome.retries_exhausted);
            assert_eq!(outcome.service.target_state, None);
            assert_eq!(outcome.service.failed_action, Some(JobAction::Create));
        }
    }

    let err = retry(&mut fx, &service).expect_err("budget exhausted");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(matches!(
        err,
        StoreError::Reconcile(ReconcileError::RetryBudgetExhausted {
            retry_count: 2,
            max_retries: 2
        })
    ));

    // A new target brings a new budget.
    let fresh = transition(&mut fx, &service, ServiceState::Deleted).expect("delete");
    assert_eq!(fresh.service.retry_count, 0);
    assert_eq!(live_job(&fresh).action, JobAction::Delete);
}

#[test]
fn retry_without_failure_is_rejected() {
    let mut fx = setup();
    let started = started_service(&mut fx.store);

    let err = retry(&mut fx, &started.service).expect_err("nothing failed");
    assert!(matches!(
        err,
        StoreError::Reconcile(ReconcileError::NothingToRetry)
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[test]
fn deleted_service_accepts_no_further_changes() {
    let mut fx = setup();
    let started = started_service(&mut fx.store);

    let deleting = fx
        .store
        .service_delete(started.service.id.clone(), None)
        .expect("delete");
    let job = live_job(&deleting);
    assert_eq!(job.action, JobAction::Delete);
    assert_eq!(job.priority, JobAction::Delete.default_priority());
    let deleted = drive(&mut fx.store, &deleting).service;
    assert_eq!(deleted.current_state, ServiceState::Deleted);

    for target in [ServiceState::Started, ServiceState::Deleted] {
        let err = transition(&mut fx, &deleted, target).expect_err("deleted");
        assert!(matches!(
            err,
            StoreError::Reconcile(ReconcileError::ServiceDeleted)
        ));
    }
    let err = retry(&mut fx, &deleted).expect_err("deleted");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let err = fx
        .store
        .service_update(ServiceUpdateRequest {
            id: deleted.id.clone(),
            name: Some("renamed".to_string()),
            properties: None,
            priority: None,
        })
        .expect_err("deleted");
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    assert!(fx.store.service_get(&deleted.id).expect("get").is_some());
}

#[test]
fn property_change_schedules_update_job() {
    let mut fx = setup();
    let started = started_service(&mut fx.store);
    let id = started.service.id.clone();

    let renamed = fx
        .store
        .service_update(ServiceUpdateRequest {
            id: id.clone(),
            name: Some(" api ".to_string()),
            properties: started.service.target_properties.clone(),
            priority: None,
        })
        .expect("rename");
    assert!(renamed.job.is_none());
    assert_eq!(renamed.service.name, "api");
    assert_eq!(renamed.service.target_state, None);

    let resized = fx
        .store
        .service_update(ServiceUpdateRequest {
            id: id.clone(),
            name: None,
            properties: Some(json!({ "cpu": 4, "memory_mb": 8192 })),
            priority: Some(0),
        })
        .expect("resize");
    let job = live_job(&resized);
    assert_eq!(job.action, JobAction::Update);
    assert_eq!(job.priority, 0);
    assert_eq!(resized.service.name, "api");
    assert_eq!(resized.service.target_state, Some(ServiceState::Started));
    assert_eq!(
        resized.service.current_properties,
        Some(json!({ "cpu": 2, "memory_mb": 2048 }))
    );

    let done = drive(&mut fx.store, &resized).service;
    assert_eq!(done.current_state, ServiceState::Started);
    assert_eq!(done.target_state, None);
    assert_eq!(
        done.current_properties,
        Some(json!({ "cpu": 4, "memory_mb": 8192 }))
    );
}

#[test]
fn failed_update_keeps_config_for_retry() {
    let mut fx = setup();
    let started = started_service(&mut fx.store);
    let resized = reconfigure(&mut fx, &started.service, json!({ "cpu": 4 })).expect("resize");
    let job = live_job(&resized);
    claim(&mut fx.store, &job.id);

    let outcome = fail(&mut fx.store, &job.id, "not enough capacity");
    assert!(!outcome.retries_exhausted);
    let service = outcome.service;
    assert_eq!(service.failed_action, Some(JobAction::Update));
    assert_eq!(service.error_message.as_deref(), Some("not enough capacity"));
    assert_eq!(service.target_state, Some(ServiceState::Started));
    assert_eq!(service.target_properties, Some(json!({ "cpu": 4 })));
    assert_eq!(
        service.current_properties,
        Some(json!({ "cpu": 2, "memory_mb": 2048 }))
    );

    let retried = retry(&mut fx, &service).expect("retry");
    assert_eq!(live_job(&retried).action, JobAction::Update);
    assert_eq!(retried.service.retry_count, 1);

    let done = drive(&mut fx.store, &retried).service;
    assert_eq!(done.reconcile_status(), ReconcileStatus::AtRest);
    assert_eq!(done.current_properties, Some(json!({ "cpu": 4 })));
}

#[test]
fn final_update_failure_discards_unapplied_config() {
    let mut fx = setup_with_policy(ReconcilePolicy::default().with_max_retries(0));
    let started = started_service(&mut fx.store);
    let original = json!({ "cpu": 2, "memory_mb": 2048 });

    let resized = reconfigure(&mut fx, &started.service, json!({ "cpu": 99 })).expect("resize");
    let job = live_job(&resized);
    claim(&mut fx.store, &job.id);
    let outcome = fail(&mut fx.store, &job.id, "agent refused");
    assert!(outcome.retries_exhausted);
    assert_eq!(outcome.service.target_state, None);
    assert_eq!(outcome.service.failed_action, Some(JobAction::Update));
    assert_eq!(outcome.service.target_properties, Some(original.clone()));
    assert_eq!(outcome.service.current_properties, Some(original.clone()));

    // Asking again for the refused config is a new reconfiguration.
    let again = reconfigure(&mut fx, &outcome.service, json!({ "cpu": 99 })).expect("re-issue");
    let job = live_job(&again);
    assert_eq!(job.action, JobAction::Update);
    claim(&mut fx.store, &job.id);
    let outcome = fail(&mut fx.store, &job.id, "agent refused");
    assert!(outcome.retries_exhausted);

    let stopping = transition(&mut fx, &outcome.service, ServiceState::Stopped).expect("stop");
    let stopped = drive(&mut fx.store, &stopping).service;
    assert_eq!(stopped.current_state, ServiceState::Stopped);
    assert_eq!(stopped.current_properties, Some(original.clone()));
    assert_eq!(stopped.target_properties, Some(original));
}

#[test]
fn abandoned_update_is_not_applied_by_the_next_transition() {
    let mut fx = setup();
    let started = started_service(&mut fx.store);
    let resized = reconfigure(&mut fx, &started.service, json!({ "cpu": 16 })).expect("resize");
    let job = live_job(&resized);
    claim(&mut fx.store, &job.id);
    let outcome = fail(&mut fx.store, &job.id, "agent error");
    assert!(!outcome.retries_exhausted);

    let stopping = transition(&mut fx, &outcome.service, ServiceState::Stopped).expect("stop");
    assert_eq!(live_job(&stopping).action, JobAction::Stop);
    let stopped = drive(&mut fx.store, &stopping).service;
    assert_eq!(
        stopped.current_properties,
        Some(json!({ "cpu": 2, "memory_mb": 2048 }))
    );
    assert_eq!(stopped.target_properties, stopped.current_properties);

    let err = retry(&mut fx, &stopped).expect_err("update was abandoned");
    assert!(matches!(
        err,
        StoreError::Reconcile(ReconcileError::NothingToRetry)
    ));
}

#[test]
fn property_change_is_refused_while_a_job_is_live() {
    let mut fx = setup();
    let created = create_service(&mut fx.store);
    let id = created.service.id.clone();

    let renamed = fx
        .store
        .service_update(ServiceUpdateRequest {
            id: id.clone(),
            name: Some("db".to_string()),
            properties: None,
            priority: None,
        })
        .expect("rename while busy");
    assert_eq!(renamed.service.name, "db");
    assert_eq!(renamed.service.live_job_id, created.service.live_job_id);

    let err = fx
        .store
        .service_update(ServiceUpdateRequest {
            id,
            name: Some("db-2".to_string()),
            properties: Some(json!({ "cpu": 8 })),
            priority: None,
        })
        .expect_err("reconfigure while busy");
    assert!(matches!(
        err,
        StoreError::Reconcile(ReconcileError::JobInFlight { .. })
    ));
    let service = fx
        .store
        .service_get(&created.service.id)
        .expect("get")
        .expect("service");
    assert_eq!(service.name, "db");
}

#[test]
fn create_validates_references_and_documents() {
    let mut fx = setup();

    let mut request = create_request(AGENT, GROUP);
    request.properties = json!(["not", "an", "object"]);
    let err = fx.store.service_create(request).expect_err("bad properties");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let mut request = create_request(AGENT, GROUP);
    request.attributes = json!({ "region": "eu-west" });
    let err = fx.store.service_create(request).expect_err("bad attributes");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let mut request = create_request(AGENT, GROUP);
    request.name = "   ".to_string();
    let err = fx.store.service_create(request).expect_err("blank name");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = fx
        .store
        .service_create(create_request("agent-404", GROUP))
        .expect_err("unknown agent");
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = fx
        .store
        .service_create(create_request(AGENT, "group-404"))
        .expect_err("unknown group");
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // Rejected creates allocate nothing.
    let created = create_service(&mut fx.store);
    assert_eq!(created.service.id.as_str(), "SVC-001");
}
