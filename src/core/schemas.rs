//! Centralized database schema definitions for the handover store.
//!
//! Every table lives in one SQLite database (`handover.db`). Child tables
//! reference `projects(id)` with `ON DELETE CASCADE`, so deleting a project
//! removes all of its records.

pub const HANDOVER_DB_NAME: &str = "handover.db";

// --- Projects ---

pub const PROJECTS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        handover_id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        source_team TEXT NOT NULL DEFAULT '',
        target_team TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'active',
        current_phase TEXT NOT NULL DEFAULT 'Phase 1',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

// --- Phases ---

pub const PHASES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS phases (
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        phase_id TEXT NOT NULL,
        display_name TEXT NOT NULL,
        color TEXT NOT NULL,
        position INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (project_id, phase_id)
    )
";

pub const PHASE_DATES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS phase_dates (
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        phase_id TEXT NOT NULL,
        start_date TEXT,
        end_date TEXT,
        PRIMARY KEY (project_id, phase_id)
    )
";

// --- Checklist ---

pub const CHECKLIST_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS checklist_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        phase TEXT NOT NULL,
        category TEXT NOT NULL,
        requirement TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'NotStarted',
        owner TEXT NOT NULL DEFAULT '',
        notes TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";
pub const CHECKLIST_SCHEMA_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_checklist_project ON checklist_items(project_id, phase)";

// --- Assessment ---

pub const ASSESSMENT_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS assessment_scores (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        phase TEXT NOT NULL,
        category TEXT NOT NULL,
        category_weight INTEGER NOT NULL DEFAULT 0,
        criteria TEXT NOT NULL,
        score INTEGER,
        evidence TEXT NOT NULL DEFAULT '',
        updated_at TEXT NOT NULL
    )
";
pub const ASSESSMENT_SCHEMA_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_assessment_project ON assessment_scores(project_id, phase)";

// --- Knowledge sessions ---

pub const SESSIONS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS knowledge_sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        topic TEXT NOT NULL,
        presenter TEXT NOT NULL DEFAULT '',
        scheduled_date TEXT NOT NULL,
        start_time TEXT NOT NULL DEFAULT '09:00',
        duration_hours REAL NOT NULL DEFAULT 1.0,
        attendees TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'Scheduled',
        effectiveness_rating INTEGER,
        notes TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

// --- Issues ---

pub const ISSUES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS issues (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        issue_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'Open',
        priority TEXT NOT NULL DEFAULT 'Medium',
        assignee TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (project_id, issue_id)
    )
";

// --- Team contacts ---

pub const TEAM_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS team_contacts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT '',
        department TEXT NOT NULL DEFAULT '',
        email TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )
";

// --- Attachments ---

pub const ATTACHMENTS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS attachments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        original_name TEXT NOT NULL,
        stored_name TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        sha256 TEXT NOT NULL,
        uploaded_at TEXT NOT NULL
    )
";

// --- Newsletter ---

pub const NEWSLETTER_SUBSCRIPTIONS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS newsletter_subscriptions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        email TEXT NOT NULL,
        subscribed INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (project_id, email)
    )
";

pub const NEWSLETTER_SETTINGS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS newsletter_settings (
        project_id INTEGER PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
        enabled INTEGER NOT NULL DEFAULT 1,
        updated_at TEXT NOT NULL
    )
";

pub const NEWSLETTER_HISTORY_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS newsletter_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        recipient TEXT NOT NULL,
        subject TEXT NOT NULL,
        week_start TEXT NOT NULL,
        week_end TEXT NOT NULL,
        payload TEXT NOT NULL,
        message_id TEXT,
        sent_at TEXT NOT NULL
    )
";
