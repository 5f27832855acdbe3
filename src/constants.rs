//! Topic names, notification data keys and delivery limits shared across the crate.

/// Upper bound on simultaneous per-token sends during multicast fallback.
pub const DEFAULT_FALLBACK_CONCURRENCY: usize = 10;

/// Pause after a transient consume error before polling again.
pub const DEFAULT_CONSUME_ERROR_BACKOFF_MS: u64 = 500;

/// Environment variable naming a service account key file when
/// `push.credentials_path` is unset.
pub const CREDENTIALS_ENV_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Topics recognized out of the box.
pub mod topics {
    /// Diagnostic topic used to verify the pipeline end to end.
    pub const DIAGNOSTIC: &str = "test.topic";
    pub const USER_REGISTERED: &str = "user.registered";
    pub const USER_DEREGISTERED: &str = "user.deregistered";
    pub const AUDIO_ANALYSIS_COMPLETED: &str = "audio.analyze.completed";

    pub const ALL: [&str; 4] = [
        DIAGNOSTIC,
        AUDIO_ANALYSIS_COMPLETED,
        USER_REGISTERED,
        USER_DEREGISTERED,
    ];
}

/// Values of the `event_type` entry attached to every notification.
pub mod event_types {
    pub const USER_REGISTERED: &str = "user_registered";
    pub const USER_DEREGISTERED: &str = "user_deregistered";
    pub const AUDIO_ANALYSIS_COMPLETED: &str = "audio_analysis_completed";
}

/// Keys of the notification data map.
pub mod data_keys {
    pub const EVENT_TYPE: &str = "event_type";
    pub const USER_ID: &str = "user_id";
    pub const FILE_NAME: &str = "file_name";
    pub const AUDIO_ID: &str = "audio_id";
    pub const STATUS: &str = "status";
}
