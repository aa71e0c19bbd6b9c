use rusqlite::Connection;
use tracing::info;

/// Run SQLite migrations
pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    info!("Running SQLite migrations");

    create_users_table(conn)?;
    create_health_data_table(conn)?;
    create_ai_sessions_table(conn)?;
    create_conversation_messages_table(conn)?;
    create_ai_interactions_table(conn)?;

    info!("SQLite migrations completed successfully");
    Ok(())
}

fn create_users_table(conn: &Connection) -> Result<(), String> {
    info!("Creating users table if not exists");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            full_name TEXT,
            email TEXT,
            avatar_url TEXT,
            age INTEGER,
            region TEXT,
            created_at TEXT NOT NULL,
            last_login_at TEXT,
            preferences TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username ON users (username);",
    )
    .map_err(|e| format!("Failed to create users table: {}", e))
}

fn create_health_data_table(conn: &Connection) -> Result<(), String> {
    info!("Creating health_data table if not exists");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS health_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            date TEXT NOT NULL,
            steps INTEGER NOT NULL DEFAULT 0,
            heart_rate INTEGER NOT NULL DEFAULT 0,
            sleep_hours REAL NOT NULL DEFAULT 0,
            calories INTEGER,
            distance REAL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_health_data_user_date ON health_data (user_id, date DESC);",
    )
    .map_err(|e| format!("Failed to create health_data table: {}", e))
}

fn create_ai_sessions_table(conn: &Connection) -> Result<(), String> {
    info!("Creating ai_sessions table if not exists");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS ai_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL UNIQUE,
            user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            language TEXT NOT NULL DEFAULT 'zh',
            voice_style TEXT NOT NULL DEFAULT 'default',
            context_summary TEXT,
            conversation_count INTEGER NOT NULL DEFAULT 0,
            total_duration REAL NOT NULL DEFAULT 0,
            metadata TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_ai_sessions_user ON ai_sessions (user_id, is_active);
        CREATE INDEX IF NOT EXISTS idx_ai_sessions_updated ON ai_sessions (updated_at DESC);",
    )
    .map_err(|e| format!("Failed to create ai_sessions table: {}", e))
}

fn create_conversation_messages_table(conn: &Connection) -> Result<(), String> {
    info!("Creating conversation_messages table if not exists");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conversation_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL REFERENCES ai_sessions (session_id) ON DELETE CASCADE,
            message_type TEXT NOT NULL,
            content TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            intent_id INTEGER,
            confidence REAL,
            emotion TEXT,
            language TEXT,
            processing_time REAL,
            metadata TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_conversation_messages_session
            ON conversation_messages (session_id, timestamp);",
    )
    .map_err(|e| format!("Failed to create conversation_messages table: {}", e))
}

/// Interaction log rows outlive their sessions, so there is no foreign key here.
fn create_ai_interactions_table(conn: &Connection) -> Result<(), String> {
    info!("Creating ai_interactions table if not exists");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS ai_interactions (
            log_id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT,
            user_id INTEGER,
            timestamp TEXT NOT NULL,
            user_input TEXT NOT NULL,
            ai_reply TEXT NOT NULL,
            emotion TEXT,
            intent_id INTEGER,
            confidence REAL,
            explanation TEXT,
            processing_time REAL,
            model_used TEXT,
            language TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_ai_interactions_timestamp ON ai_interactions (timestamp DESC);
        CREATE INDEX IF NOT EXISTS idx_ai_interactions_user ON ai_interactions (user_id);",
    )
    .map_err(|e| format!("Failed to create ai_interactions table: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('users', 'health_data', 'ai_sessions', 'conversation_messages', 'ai_interactions')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }
}
