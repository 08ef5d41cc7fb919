mod error;
mod pool;
mod rows;
mod task_store;
mod vacancy_rows;
mod vacancy_store;

pub use pool::{connect, ping};
pub use task_store::{poll_cutoff, TaskStore};
pub use vacancy_store::VacancyStore;

pub use sqlx::PgPool;
