/// Data access layer
///
/// One repository per aggregate, all backed by the shared PgPool.

pub mod messages;
pub mod notifications;
pub mod payments;
pub mod posts;
pub mod ratings;
pub mod requests;
pub mod skills;
pub mod stores;
pub mod tags;
pub mod tokens;
pub mod users;

#[derive(Debug, Clone)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}
