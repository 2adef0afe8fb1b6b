pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
  run_id           TEXT PRIMARY KEY,
  started_at       TEXT NOT NULL,
  completed_at     TEXT,
  total_count      INTEGER NOT NULL,
  successful_count INTEGER,
  config_json      TEXT
);

CREATE TABLE IF NOT EXISTS experiments (
  id             INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id         TEXT NOT NULL REFERENCES runs(run_id),
  recorded_at    TEXT NOT NULL,
  prompt_id      TEXT NOT NULL,
  test_case_id   TEXT NOT NULL,
  model_id       TEXT NOT NULL,
  observed_model TEXT,
  system_text    TEXT NOT NULL,
  user_text      TEXT NOT NULL,
  response_text  TEXT,
  status         TEXT NOT NULL CHECK (status IN (
                   'success', 'api_error', 'timeout', 'rate_limit',
                   'invalid_model', 'network_error', 'unknown_error')),
  error_json     TEXT,
  usage_json     TEXT,
  finish_reason  TEXT,
  duration_ms    INTEGER NOT NULL,
  UNIQUE(run_id, prompt_id, test_case_id, model_id)
);

CREATE INDEX IF NOT EXISTS idx_experiments_run_id ON experiments(run_id);
CREATE INDEX IF NOT EXISTS idx_experiments_status ON experiments(status);
CREATE INDEX IF NOT EXISTS idx_experiments_recorded_at ON experiments(recorded_at);
"#;
