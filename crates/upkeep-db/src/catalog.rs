//! Data migrations compiled into every Upkeep deployment.
//!
//! Entries run in the order listed. Never reorder or rename an entry that
//! has shipped; append new ones at the end.

use std::sync::Arc;

use crate::database::Database;
use crate::migrations::{Migration, SqlMigration};

/// A compiled-in migration with its forward and rollback SQL.
pub struct BuiltinMigration {
    pub version: u32,
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

pub const CREATE_PROJECTS: BuiltinMigration = BuiltinMigration {
    version: 1,
    name: "create-projects",
    up: "
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
",
    down: "DROP TABLE IF EXISTS projects;",
};

pub const CREATE_MONITOR_STATUSES: BuiltinMigration = BuiltinMigration {
    version: 2,
    name: "create-monitor-statuses",
    up: "
CREATE TABLE IF NOT EXISTS monitor_statuses (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    color TEXT NOT NULL,
    priority INTEGER NOT NULL,
    is_operational_state INTEGER NOT NULL DEFAULT 0,
    is_offline_state INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (project_id, name)
);

CREATE INDEX IF NOT EXISTS idx_monitor_statuses_project_priority
    ON monitor_statuses(project_id, priority);
",
    down: "DROP TABLE IF EXISTS monitor_statuses;",
};

pub const SEED_DEFAULT_MONITOR_STATUSES: BuiltinMigration = BuiltinMigration {
    version: 3,
    name: "seed-default-monitor-statuses",
    up: "
INSERT OR IGNORE INTO monitor_statuses
    (id, project_id, name, color, priority, is_operational_state, is_offline_state)
SELECT lower(hex(randomblob(16))), p.id, d.name, d.color, d.priority, d.operational, d.offline
FROM projects p
CROSS JOIN (
    SELECT 'Operational' AS name, '#2ecc71' AS color, 1 AS priority, 1 AS operational, 0 AS offline
    UNION ALL SELECT 'Degraded', '#f1c40f', 2, 0, 0
    UNION ALL SELECT 'Offline', '#e74c3c', 3, 0, 1
) d;
",
    down: "
DELETE FROM monitor_statuses
WHERE name IN ('Operational', 'Degraded', 'Offline');
",
};

pub const CREATE_STATUS_PAGE_HEADER_LINKS: BuiltinMigration = BuiltinMigration {
    version: 4,
    name: "create-status-page-header-links",
    up: "
CREATE TABLE IF NOT EXISTS status_page_header_links (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    status_page_id TEXT NOT NULL,
    title TEXT NOT NULL,
    link TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_header_links_status_page
    ON status_page_header_links(status_page_id, sort_order);
",
    down: "DROP TABLE IF EXISTS status_page_header_links;",
};

pub const CREATE_INCIDENT_OWNER_TEAMS: BuiltinMigration = BuiltinMigration {
    version: 5,
    name: "create-incident-owner-teams",
    up: "
CREATE TABLE IF NOT EXISTS incident_owner_teams (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    incident_id TEXT NOT NULL,
    team_id TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (incident_id, team_id)
);
",
    down: "DROP TABLE IF EXISTS incident_owner_teams;",
};

pub const BUILTIN: &[BuiltinMigration] = &[
    CREATE_PROJECTS,
    CREATE_MONITOR_STATUSES,
    SEED_DEFAULT_MONITOR_STATUSES,
    CREATE_STATUS_PAGE_HEADER_LINKS,
    CREATE_INCIDENT_OWNER_TEAMS,
];

/// The built-in catalog bound to `db`, in run order.
pub fn builtin_migrations(db: &Arc<Database>) -> Vec<Arc<dyn Migration>> {
    BUILTIN
        .iter()
        .map(|m| -> Arc<dyn Migration> {
            Arc::new(SqlMigration::new(
                db.clone(),
                m.name,
                m.up,
                Some(m.down.to_string()),
            ))
        })
        .collect()
}
