#![forbid(unsafe_code)]

use super::*;
use fulcrum_core::ids::{AgentId, GroupId, ParticipantId};
use fulcrum_core::model::AgentStatus;
use rusqlite::{OptionalExtension, params};

fn read_agent_row(row: &rusqlite::Row<'_>) -> Result<AgentRow, rusqlite::Error> {
    Ok(AgentRow {
        id: get_parsed(row, 0, AgentId::try_new)?,
        provider_id: get_parsed(row, 1, ParticipantId::try_new)?,
        name: row.get(2)?,
        status: get_parsed(row, 3, |raw| AgentStatus::parse(&raw))?,
        created_at_ms: row.get(4)?,
        updated_at_ms: row.get(5)?,
    })
}

fn read_group_row(row: &rusqlite::Row<'_>) -> Result<ServiceGroupRow, rusqlite::Error> {
    Ok(ServiceGroupRow {
        id: get_parsed(row, 0, GroupId::try_new)?,
        consumer_id: get_parsed(row, 1, ParticipantId::try_new)?,
        name: row.get(2)?,
        created_at_ms: row.get(3)?,
    })
}

pub(super) fn agent_get_tx(
    conn: &Connection,
    id: &AgentId,
) -> Result<Option<AgentRow>, StoreError> {
    Ok(conn
        .query_row(
            r#"
            SELECT id, provider_id, name, status, created_at_ms, updated_at_ms
            FROM agents
            WHERE id=?1
            "#,
            params![id.as_str()],
            read_agent_row,
        )
        .optional()?)
}

pub(super) fn service_group_get_tx(
    conn: &Connection,
    id: &GroupId,
) -> Result<Option<ServiceGroupRow>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, consumer_id, name, created_at_ms FROM service_groups WHERE id=?1",
            params![id.as_str()],
            read_group_row,
        )
        .optional()?)
}

impl SqliteStore {
    pub fn agent_get(&self, id: &AgentId) -> Result<Option<AgentRow>, StoreError> {
        agent_get_tx(&self.conn, id)
    }

    /// Registers an agent, or renames it when it already exists. The
    /// provider an agent belongs to never changes.
    pub fn agent_register(&mut self, request: AgentRegisterRequest) -> Result<AgentRow, StoreError> {
        let name = normalize_name(&request.name, "agent name must not be empty")?;
        let now_ms = now_ms();
        let tx = begin_write(&mut self.conn)?;

        match agent_get_tx(&tx, &request.id)? {
            Some(existing) if existing.provider_id != request.provider_id => {
                return Err(StoreError::InvalidInput(
                    "agent is already registered to another provider",
                ));
            }
            Some(_) => {
                tx.execute(
                    "UPDATE agents SET name=?2, updated_at_ms=?3 WHERE id=?1",
                    params![request.id.as_str(), name, now_ms],
                )?;
            }
            None => {
                tx.execute(
                    r#"
                    INSERT INTO agents(id, provider_id, name, status, created_at_ms, updated_at_ms)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                    "#,
                    params![
                        request.id.as_str(),
                        request.provider_id.as_str(),
                        name,
                        AgentStatus::Disconnected.as_str(),
                        now_ms
                    ],
                )?;
            }
        }

        let row = agent_get_tx(&tx, &request.id)?
            .ok_or_else(|| StoreError::unknown("agent", request.id.as_str()))?;
        tx.commit()?;
        Ok(row)
    }

    /// Connectivity is tracked independently of any job the agent holds.
    pub fn agent_set_status(&mut self, request: AgentStatusRequest) -> Result<AgentRow, StoreError> {
        let now_ms = now_ms();
        let tx = begin_write(&mut self.conn)?;
        let changed = tx.execute(
            "UPDATE agents SET status=?2, updated_at_ms=?3 WHERE id=?1",
            params![request.id.as_str(), request.status.as_str(), now_ms],
        )?;
        if changed != 1 {
            return Err(StoreError::unknown("agent", request.id.as_str()));
        }
        let row = agent_get_tx(&tx, &request.id)?
            .ok_or_else(|| StoreError::unknown("agent", request.id.as_str()))?;
        tx.commit()?;

        tracing::debug!(agent_id = %row.id, status = %row.status, "agent status updated");
        Ok(row)
    }

    pub fn service_group_get(&self, id: &GroupId) -> Result<Option<ServiceGroupRow>, StoreError> {
        service_group_get_tx(&self.conn, id)
    }

    pub fn service_group_register(
        &mut self,
        request: ServiceGroupRegisterRequest,
    ) -> Result<ServiceGroupRow, StoreError> {
        let name = normalize_name(&request.name, "group name must not be empty")?;
        let now_ms = now_ms();
        let tx = begin_write(&mut self.conn)?;

        let insert = tx.execute(
            r#"
            INSERT INTO service_groups(id, consumer_id, name, created_at_ms)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                request.id.as_str(),
                request.consumer_id.as_str(),
                name,
                now_ms
            ],
        );
        if let Err(err) = insert {
            if is_constraint_violation(&err) {
                return Err(StoreError::InvalidInput("service group already exists"));
            }
            return Err(err.into());
        }

        let row = service_group_get_tx(&tx, &request.id)?
            .ok_or_else(|| StoreError::unknown("service group", request.id.as_str()))?;
        tx.commit()?;
        Ok(row)
    }
}
