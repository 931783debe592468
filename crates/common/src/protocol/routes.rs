// HTTP route and error code constants shared by server and client.

// ── Routes ─────────────────────────────────────────────────────────
pub const CONTENT: &str = "/api/content";
pub const FILES: &str = "/api/files";
pub const RENAME: &str = "/api/rename";
pub const MOVE: &str = "/api/move";
pub const TREE: &str = "/api/tree";
pub const ASSETS: &str = "/api/assets";
pub const GC_RUN: &str = "/api/gc/run";
pub const HEALTHZ: &str = "/healthz";

/// URL prefix under which uploaded assets are served and referenced.
pub const ASSET_URL_PREFIX: &str = "/assets/";

pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ── Error codes ────────────────────────────────────────────────────
pub const ERR_VALIDATION_FAILED: &str = "VALIDATION_FAILED";
pub const ERR_INVALID_PATH: &str = "INVALID_PATH";
pub const ERR_PATH_OUTSIDE_ROOT: &str = "PATH_OUTSIDE_ROOT";
pub const ERR_NOT_FOUND: &str = "NOT_FOUND";
pub const ERR_ALREADY_EXISTS: &str = "ALREADY_EXISTS";
pub const ERR_DESTINATION_EXISTS: &str = "DESTINATION_EXISTS";
pub const ERR_VERSION_CONFLICT: &str = "VERSION_CONFLICT";
pub const ERR_PATCH_APPLY_FAILED: &str = "PATCH_APPLY_FAILED";
pub const ERR_PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
pub const ERR_GC_ALREADY_RUNNING: &str = "GC_ALREADY_RUNNING";
pub const ERR_INTERNAL: &str = "INTERNAL_ERROR";
