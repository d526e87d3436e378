#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS jobs (
          id TEXT PRIMARY KEY,
          seq INTEGER NOT NULL UNIQUE,
          revision INTEGER NOT NULL,
          service_id TEXT NOT NULL REFERENCES services(id),
          agent_id TEXT NOT NULL,
          provider_id TEXT NOT NULL,
          consumer_id TEXT NOT NULL,
          action TEXT NOT NULL
            CHECK (action IN ('CREATE', 'UPDATE', 'START', 'STOP', 'DELETE')),
          status TEXT NOT NULL
            CHECK (status IN ('PENDING', 'CLAIMED', 'COMPLETED', 'FAILED')),
          priority INTEGER NOT NULL,
          claimed_at_ms INTEGER,
          completed_at_ms INTEGER,
          error_message TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );
"#;
