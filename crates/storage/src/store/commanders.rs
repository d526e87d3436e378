#![forbid(unsafe_code)]

//! Component seams. `SqliteStore` is the storage-backed implementation of
//! each; callers that only need one component depend on its trait.
//!
//! None of these re-check authorization: the caller runs
//! `fulcrum_core::auth::authorize` against the row's target scope first.

use super::*;
use fulcrum_core::ids::{JobId, ServiceId};

pub trait ServiceCommander {
    fn create(&mut self, request: ServiceCreateRequest) -> Result<ServiceMutationResult, StoreError>;
    fn update(&mut self, request: ServiceUpdateRequest) -> Result<ServiceMutationResult, StoreError>;
    fn transition(
        &mut self,
        request: ServiceTransitionRequest,
    ) -> Result<ServiceMutationResult, StoreError>;
    fn retry(&mut self, request: ServiceRetryRequest) -> Result<ServiceMutationResult, StoreError>;
    fn find_by_id(&self, id: &ServiceId) -> Result<Option<ServiceRow>, StoreError>;
    fn list(&self, request: ServicesListRequest) -> Result<ServicesListResult, StoreError>;
}

pub trait JobCommander {
    fn list_pending_for_agent(&self, request: JobsPendingRequest) -> Result<Vec<JobRow>, StoreError>;
    fn claim(&mut self, request: JobClaimRequest) -> Result<JobRow, StoreError>;
    fn complete(&mut self, request: JobCompleteRequest) -> Result<JobOutcomeResult, StoreError>;
    fn fail(&mut self, request: JobFailRequest) -> Result<JobOutcomeResult, StoreError>;
    fn find_by_id(&self, id: &JobId) -> Result<Option<JobRow>, StoreError>;
    fn list(&self, request: JobsListRequest) -> Result<JobsListResult, StoreError>;
}

pub trait TimeoutSweeper {
    fn fail_timeout_services_and_jobs(&mut self, timeout: Duration)
    -> Result<SweepReport, StoreError>;
}

impl ServiceCommander for SqliteStore {
    fn create(&mut self, request: ServiceCreateRequest) -> Result<ServiceMutationResult, StoreError> {
        self.service_create(request)
    }

    fn update(&mut self, request: ServiceUpdateRequest) -> Result<ServiceMutationResult, StoreError> {
        self.service_update(request)
    }

    fn transition(
        &mut self,
        request: ServiceTransitionRequest,
    ) -> Result<ServiceMutationResult, StoreError> {
        self.service_transition(request)
    }

    fn retry(&mut self, request: ServiceRetryRequest) -> Result<ServiceMutationResult, StoreError> {
        self.service_retry(request)
    }

    fn find_by_id(&self, id: &ServiceId) -> Result<Option<ServiceRow>, StoreError> {
        self.service_get(id)
    }

    fn list(&self, request: ServicesListRequest) -> Result<ServicesListResult, StoreError> {
        self.services_list(request)
    }
}

impl JobCommander for SqliteStore {
    fn list_pending_for_agent(&self, request: JobsPendingRequest) -> Result<Vec<JobRow>, StoreError> {
        self.jobs_list_pending_for_agent(request)
    }

    fn claim(&mut self, request: JobClaimRequest) -> Result<JobRow, StoreError> {
        self.job_claim(request)
    }

    fn complete(&mut self, request: JobCompleteRequest) -> Result<JobOutcomeResult, StoreError> {
        self.job_complete(request)
    }

    fn fail(&mut self, request: JobFailRequest) -> Result<JobOutcomeResult, StoreError> {
        self.job_fail(request)
    }

    fn find_by_id(&self, id: &JobId) -> Result<Option<JobRow>, StoreError> {
        self.job_get(id)
    }

    fn list(&self, request: JobsListRequest) -> Result<JobsListResult, StoreError> {
        self.jobs_list(request)
    }
}

impl TimeoutSweeper for SqliteStore {
    fn fail_timeout_services_and_jobs(
        &mut self,
        timeout: Duration,
    ) -> Result<SweepReport, StoreError> {
        SqliteStore::fail_timeout_services_and_jobs(self, timeout)
    }
}
