// Service exports
pub mod cache;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod supabase;
pub mod workflow;

pub use cache::{CacheError, CacheKey, CacheManager, CacheStats};
pub use memory::MemoryStore;
pub use postgres::PostgresClient;
pub use repository::{Datastore, MatchRepository, RepositoryError, UserRepository};
pub use supabase::{SupabaseClient, SupabaseTables};
pub use workflow::{
    block_user, respond_to_request, send_request, unblock_user, RequestResponse, WorkflowError,
};
