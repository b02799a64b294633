//! # System Constants
//!
//! Names and defaults shared by configuration, the reference pipeline and the
//! workflow state store.

/// Downstream service names, used as breaker and registry keys
pub mod services {
    pub const TEMPLATE_RECOMMENDER: &str = "template_recommender";
    pub const RAG_SERVICE: &str = "rag_service";
    pub const CONTENT_GENERATOR: &str = "content_generator";
    pub const DESIGN_RULES: &str = "design_rules";

    /// Reference services and their default local base URLs
    pub const DEFAULT_ENDPOINTS: [(&str, &str); 4] = [
        (TEMPLATE_RECOMMENDER, "http://localhost:3007"),
        (RAG_SERVICE, "http://localhost:3008"),
        (CONTENT_GENERATOR, "http://localhost:3009"),
        (DESIGN_RULES, "http://localhost:3010"),
    ];
}

/// Reference pipeline step names
pub mod steps {
    pub const TEMPLATE_RECOMMENDATION: &str = "template_recommendation";
    pub const CONTEXT_RETRIEVAL: &str = "context_retrieval";
    pub const CONTENT_GENERATION: &str = "content_generation";
    pub const DESIGN_VALIDATION: &str = "design_validation";

    /// `current_step` of a freshly created workflow record
    pub const INITIALIZE: &str = "initialize";

    /// `current_step` once every step has run
    pub const FINALIZATION: &str = "finalization";
}

/// Workflow record keys and identifiers
pub mod workflow {
    pub const ID_PREFIX: &str = "wf_";
    pub const DEFAULT_KEY_PREFIX: &str = "workflow";
    pub const FAILURE_PREFIX: &str = "Orchestration failed";
    pub const INTERNAL_FAILURE_MESSAGE: &str = "internal error";
}

/// Numeric defaults
pub mod defaults {
    pub const REQUEST_TIMEOUT_MS: u64 = 30_000;
    pub const HEALTH_CHECK_TIMEOUT_MS: u64 = 5_000;

    pub const MAX_RETRIES: u32 = 3;
    pub const BASE_DELAY_MS: u64 = 1_000;
    pub const MAX_DELAY_MS: u64 = 60_000;

    pub const FAILURE_THRESHOLD: u32 = 5;
    pub const RESET_TIMEOUT_SECONDS: u64 = 60;

    pub const RAG_TOP_K: u32 = 5;
    pub const DEFAULT_TEMPLATE_ID: &str = "default_template";

    pub const STATE_OPERATION_TIMEOUT_MS: u64 = 2_000;

    /// Upper bound for `state_store.ttl_seconds` (365 days)
    pub const MAX_STATE_TTL_SECONDS: u64 = 31_536_000;
}
