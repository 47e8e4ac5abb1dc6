pub mod mock_api;
pub mod pve_cluster;
pub mod werk_repo;

pub use mock_api::MockApi;
pub use pve_cluster::{checking_registry, now, pve_cluster, task_log, vzdump_log, BACKUP_UPID, NOW};
pub use werk_repo::WerkRepo;
