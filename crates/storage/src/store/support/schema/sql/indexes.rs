#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_one_live_per_service
          ON jobs(service_id) WHERE status IN ('PENDING', 'CLAIMED');
        CREATE INDEX IF NOT EXISTS idx_jobs_pending_by_agent
          ON jobs(agent_id, status, priority, seq);
        CREATE INDEX IF NOT EXISTS idx_jobs_claimed_at
          ON jobs(status, claimed_at_ms);
        CREATE INDEX IF NOT EXISTS idx_jobs_service_seq
          ON jobs(service_id, seq);
        CREATE INDEX IF NOT EXISTS idx_services_consumer
          ON services(consumer_id, id);
        CREATE INDEX IF NOT EXISTS idx_services_agent
          ON services(agent_id, id);
        CREATE INDEX IF NOT EXISTS idx_services_target_set_at
          ON services(target_set_at_ms) WHERE target_state IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_agents_provider
          ON agents(provider_id, id);
"#;
