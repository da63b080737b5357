//! Core modules for the sentence engine

pub mod adaptive;
pub mod achievements;
pub mod history;
pub mod reducer;
pub mod store;
pub mod persistence;
pub mod remote;
pub mod sync;
pub mod content;
pub mod effects;
pub mod config;
pub mod engine;
pub mod command;
pub mod api;

pub use adaptive::update_adaptive;
pub use achievements::evaluate;
pub use history::{History, TrackedSlice};
pub use reducer::{reduce, validate_structure, ReduceContext, Transition};
pub use store::{Store, StoreEvent, StoreOptions, SubscriptionId};
pub use persistence::{
    ContentCache, Envelope, FileBackend, MemoryBackend, PersistenceAdapter, Projection,
    StorageBackend, Written, KEY_CONTENT, KEY_PENDING, KEY_PROJECTION,
};
pub use remote::{Ack, HttpRemote, RemoteSync};
pub use sync::{FlushOutcome, FlushReport, SyncCoordinator};
pub use content::{ContentLoader, ContentSource, StaticContent};
pub use effects::EffectRunner;
pub use config::EngineConfig;
pub use engine::Engine;
pub use command::{parse_command, Command, CommandError};
pub use api::{create_router, run_server};
