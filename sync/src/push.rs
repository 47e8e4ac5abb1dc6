use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::pusher::ProfilePusher;
use crate::site::{RemoteSite, UserProfile};

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);
pub const DEFAULT_WORKERS: usize = 10;

const DEAD_SITE: &str = "The site is marked as dead. Not trying to replicate.";

#[derive(Debug, Clone, PartialEq)]
pub enum SiteResult {
    Succeeded { duration: Duration },
    Failed { reason: String },
}

impl SiteResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SiteResult::Succeeded { .. })
    }
}

/// Outcome of one profile push, per site id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub results: BTreeMap<String, SiteResult>,
}

impl SyncReport {
    pub fn succeeded(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, result)| result.is_success())
            .map(|(site, _)| site.as_str())
            .collect()
    }

    /// `(site id, reason)` of all sites the profile did not reach
    pub fn failed(&self) -> Vec<(&str, &str)> {
        self.results
            .iter()
            .filter_map(|(site, result)| match result {
                SiteResult::Failed { reason } => Some((site.as_str(), reason.as_str())),
                SiteResult::Succeeded { .. } => None,
            })
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.values().all(SiteResult::is_success)
    }
}

/// Push a profile to all sites, at most `workers` at a time.
///
/// Returns once every site answered or `deadline` passed. Sites without an
/// answer by then are reported as failed and their pushes are aborted.
pub async fn push_profile(
    sites: &[RemoteSite],
    profile: &UserProfile,
    pusher: Arc<dyn ProfilePusher>,
    workers: usize,
    deadline: Duration,
) -> SyncReport {
    let mut report = SyncReport::default();
    let deadline_at = Instant::now() + deadline;
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let profile = Arc::new(profile.clone());
    let mut tasks = JoinSet::new();
    let mut task_sites = HashMap::new();

    for site in sites {
        if site.dead {
            report.results.insert(
                site.id.clone(),
                SiteResult::Failed {
                    reason: DEAD_SITE.to_string(),
                },
            );
            continue;
        }

        let site = site.clone();
        let semaphore = semaphore.clone();
        let pusher = pusher.clone();
        let profile = profile.clone();
        let site_id = site.id.clone();
        let handle = tasks.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => {
                    let started = Instant::now();
                    match pusher.push(&site, &profile).await {
                        Ok(()) => SiteResult::Succeeded {
                            duration: started.elapsed(),
                        },
                        Err(e) => SiteResult::Failed {
                            reason: e.to_string(),
                        },
                    }
                }
                Err(e) => SiteResult::Failed {
                    reason: e.to_string(),
                },
            };
            (site.id, result)
        });
        task_sites.insert(handle.id(), site_id);
    }

    loop {
        match timeout_at(deadline_at, tasks.join_next()).await {
            Ok(Some(Ok((site_id, result)))) => {
                debug!("Profile push to {}: {:?}", site_id, result);
                report.results.insert(site_id, result);
            }
            Ok(Some(Err(e))) => {
                warn!("Profile push task failed: {}", e);
                if let Some(site_id) = task_sites.remove(&e.id()) {
                    report.results.insert(
                        site_id,
                        SiteResult::Failed {
                            reason: format!("Push failed: {}", e),
                        },
                    );
                }
            }
            Ok(None) => break,
            Err(_) => {
                warn!(
                    "Profile push deadline of {:.1}s passed with {} sites pending",
                    deadline.as_secs_f64(),
                    tasks.len()
                );
                tasks.abort_all();
                break;
            }
        }
    }

    for site in sites {
        report
            .results
            .entry(site.id.clone())
            .or_insert_with(|| SiteResult::Failed {
                reason: format!("No answer within {:.1}s", deadline.as_secs_f64()),
            });
    }

    info!(
        "Pushed profile of {} to {} of {} sites",
        profile.user_id,
        report.succeeded().len(),
        sites.len()
    );
    report
}
