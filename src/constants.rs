//! Constants used throughout the application
//!
//! This module centralizes provider tags, endpoints, and default values
//! to improve maintainability and consistency.

// Provider
/// `external_source` tag of tasks bound to Microsoft To Do.
pub const MSTODO_SOURCE: &str = "microsoft_todo";
/// Actor recorded on timeline events written by the sync engine.
pub const SYNC_ACTOR: &str = "sync:microsoft_todo";
pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";
pub const MICROSOFT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
pub const MSTODO_SCOPES: &[&str] = &["offline_access", "Tasks.ReadWrite"];
pub const PREFER_UTC_HEADER: &str = "outlook.timezone=\"UTC\"";

// Sync defaults
pub const DEFAULT_REFRESH_SKEW_MINUTES: i64 = 10;
/// Longest access token lifetime taken from a grant, in seconds.
pub const MAX_GRANT_LIFETIME_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_ITEM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LIST_NAME: &str = "Tasks";
pub const DEFAULT_MAX_CONCURRENT_PASSES: usize = 4;

// Timeline actions
pub const ACTION_IMPORT: &str = "import";
pub const ACTION_CREATE: &str = "create";
pub const ACTION_EXPORT: &str = "export";
/// Field name of the single event written when an import creates a task.
pub const FIELD_CREATED: &str = "created";

// Messages
pub const CONFIG_GENERATED: &str = "✅ Generated default configuration file";
pub const ERROR_NO_CLIENT_ID: &str = "❌ Error: OAuth client id environment variable not set";
