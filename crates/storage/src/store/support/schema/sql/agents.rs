#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS agents (
          id TEXT PRIMARY KEY,
          provider_id TEXT NOT NULL,
          name TEXT NOT NULL,
          status TEXT NOT NULL CHECK (status IN ('CONNECTED', 'DISCONNECTED')),
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS service_groups (
          id TEXT PRIMARY KEY,
          consumer_id TEXT NOT NULL,
          name TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL
        );
"#;
