#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS services (
          id TEXT PRIMARY KEY,
          revision INTEGER NOT NULL,
          name TEXT NOT NULL,
          agent_id TEXT NOT NULL REFERENCES agents(id),
          provider_id TEXT NOT NULL,
          consumer_id TEXT NOT NULL,
          group_id TEXT NOT NULL REFERENCES service_groups(id),
          service_type_id TEXT NOT NULL,
          current_state TEXT NOT NULL
            CHECK (current_state IN ('CREATED', 'STARTED', 'STOPPED', 'DELETED')),
          target_state TEXT
            CHECK (target_state IS NULL OR target_state IN ('STARTED', 'STOPPED', 'DELETED')),
          failed_action TEXT,
          error_message TEXT,
          retry_count INTEGER NOT NULL DEFAULT 0 CHECK (retry_count >= 0),
          attributes_json TEXT NOT NULL,
          current_properties_json TEXT,
          target_properties_json TEXT,
          resources_json TEXT,
          external_id TEXT,
          target_set_at_ms INTEGER,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );
"#;
