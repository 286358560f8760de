use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "ReceiptLedger";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable overriding the data directory (tests, portable installs).
pub const DATA_DIR_ENV: &str = "RECEIPT_LEDGER_DATA_DIR";

/// Get the application data directory.
///
/// Resolution order: `RECEIPT_LEDGER_DATA_DIR`, the platform data directory,
/// the home directory, then the current directory as a last resort.
pub fn app_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub const DATABASE_FILE: &str = "expenses.sqlite";
pub const RECEIPTS_DIR: &str = "receipts";

/// SQLite database holding the expense ledger
pub fn database_path() -> PathBuf {
    app_data_dir().join(DATABASE_FILE)
}

/// Directory for content-addressed receipt images
pub fn receipts_dir() -> PathBuf {
    app_data_dir().join(RECEIPTS_DIR)
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "receipt_ledger=debug,info"
    } else {
        "receipt_ledger=info,warn"
    }
}
