// Stable machine-readable error codes for API responses.
// Codes are part of the external contract and must never be renumbered.

pub mod visit {
    pub const NOT_FOUND: &str = "VISIT_1001";
    pub const VALIDATION_FAILED: &str = "VISIT_1002";
}

pub mod lifecycle {
    pub const INVALID_TRANSITION: &str = "LIFECYCLE_2001";
    pub const INCOMPLETE_REQUIRED_TASKS: &str = "LIFECYCLE_2002";
}

pub mod task {
    pub const TASK_NOT_FOUND: &str = "TASK_3001";
    pub const DUPLICATE_TASK: &str = "TASK_3002";
}

pub mod sync {
    pub const IDENTITY_CONFLICT: &str = "SYNC_4001";
}

pub mod store {
    pub const EXTENDED_DEGRADED: &str = "STORE_5001";
    pub const STORE_FAILURE: &str = "STORE_5002";
}
