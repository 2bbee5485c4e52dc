pub mod memory;
pub mod models;
pub mod postgres;
pub mod repositories;
pub mod store;

use diesel::PgConnection;
use diesel::r2d2::{self, ConnectionManager as DbConnectionManager};

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{InvitationStore, Registration};

pub type DbPool = r2d2::Pool<DbConnectionManager<PgConnection>>;

pub fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, r2d2::PoolError> {
    let manager = DbConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(max_connections)
        .build(manager)
}
