//! SQLite schema definition
//!
//! Raw samples are append-only during an import. `day` holds the local
//! calendar date of `start_date` and is the aggregation key; timestamps keep
//! the offset they were exported with.

/// Tables that hold imported data. Dropped and recreated on clear.
pub const DATA_SCHEMA: &str = r#"
-- ============================================
-- RAW SAMPLES
-- ============================================

CREATE TABLE IF NOT EXISTS quantity_samples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type TEXT NOT NULL,                    -- HKQuantityTypeIdentifier*
    value REAL,                            -- NULL when unparseable
    unit TEXT,
    start_date TEXT NOT NULL,              -- 2024-01-14T08:00:00-05:00
    end_date TEXT NOT NULL,
    day TEXT NOT NULL,                     -- 2024-01-14
    source_name TEXT,
    device TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS workouts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    workout_type TEXT NOT NULL,
    duration_minutes REAL,
    total_distance REAL,
    total_energy_burned REAL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    day TEXT NOT NULL,
    source_name TEXT
);

CREATE TABLE IF NOT EXISTS sleep_samples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sleep_type TEXT NOT NULL,              -- HKCategoryValueSleepAnalysis*
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    day TEXT NOT NULL,
    source_name TEXT
);

-- ============================================
-- DERIVED
-- ============================================

-- Rebuilt from scratch by every aggregation run
CREATE TABLE IF NOT EXISTS daily_summary (
    date TEXT PRIMARY KEY,
    steps INTEGER,
    active_calories REAL,
    resting_heart_rate REAL,
    weight REAL,
    sleep_hours REAL,
    workout_minutes REAL,
    distance_km REAL,
    flights_climbed INTEGER
);

-- First unit seen per metric (advisory only)
CREATE TABLE IF NOT EXISTS units (
    metric TEXT PRIMARY KEY,
    unit TEXT NOT NULL
);

-- ============================================
-- INDEXES
-- ============================================

CREATE INDEX IF NOT EXISTS idx_quantity_type_day ON quantity_samples(type, day);
CREATE INDEX IF NOT EXISTS idx_quantity_day ON quantity_samples(day);
CREATE INDEX IF NOT EXISTS idx_workouts_day ON workouts(day);
CREATE INDEX IF NOT EXISTS idx_sleep_type_day ON sleep_samples(sleep_type, day);
CREATE INDEX IF NOT EXISTS idx_sleep_day ON sleep_samples(day);
"#;

/// Singleton import status. Created once and only ever updated in place.
pub const STATUS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS import_status (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    status TEXT NOT NULL DEFAULT 'idle',   -- idle, parsing, computing, complete, error
    progress REAL NOT NULL DEFAULT 0,
    records_imported INTEGER NOT NULL DEFAULT 0,
    last_import DATETIME,
    error_message TEXT
);

INSERT OR IGNORE INTO import_status (id, status, progress, records_imported)
VALUES (1, 'idle', 0, 0);
"#;

pub const DROP_DATA: &str = r#"
DROP TABLE IF EXISTS quantity_samples;
DROP TABLE IF EXISTS workouts;
DROP TABLE IF EXISTS sleep_samples;
DROP TABLE IF EXISTS daily_summary;
DROP TABLE IF EXISTS units;
"#;
