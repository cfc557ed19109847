//! Synthetic file workloads
//!
//! A workload runs in three phases so that every file exists before it is
//! touched: create all files, then read or update each one, then delete a
//! subset.

use anyhow::Result;
use blocksim_engine::Dispatcher;
use rand::Rng;
use serde::Serialize;

pub const USER: &str = "simulator";

/// One file operation of a workload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Create { name: String, blocks: u64 },
    Update { name: String, content: Vec<u8> },
    Read { name: String },
    Delete { name: String },
}

impl Step {
    /// Queue this step on `dispatcher`
    pub fn submit(&self, dispatcher: &Dispatcher, dir: &str) -> Result<()> {
        match self {
            Self::Create { name, blocks } => dispatcher.create_file(dir, name, *blocks, USER)?,
            Self::Update { name, content } => {
                dispatcher.update_file(dir, name, content.clone(), USER)?
            }
            Self::Read { name } => dispatcher.read_file(dir, name, USER)?,
            Self::Delete { name } => dispatcher.delete_file(dir, name, USER)?,
        };
        Ok(())
    }
}

/// Generated workload, one step list per phase
#[derive(Clone, Debug, Default)]
pub struct Workload {
    pub phases: Vec<Vec<Step>>,
}

impl Workload {
    /// Random workload over `files` files of up to `max_blocks` blocks each
    pub fn generate(rng: &mut impl Rng, files: usize, max_blocks: u64, block_size: usize) -> Self {
        let names: Vec<_> = (0..files).map(|i| format!("file{i:03}.dat")).collect();

        let creates = names
            .iter()
            .map(|name| Step::Create {
                name: name.clone(),
                blocks: rng.gen_range(1..=max_blocks.max(1)),
            })
            .collect();

        let accesses = names
            .iter()
            .map(|name| {
                if rng.gen_bool(0.5) {
                    let len = rng.gen_range(1..=block_size.saturating_mul(2));
                    Step::Update {
                        name: name.clone(),
                        content: (0..len).map(|_| rng.r#gen()).collect(),
                    }
                } else {
                    Step::Read { name: name.clone() }
                }
            })
            .collect();

        let deletes = names
            .iter()
            .filter(|_| rng.gen_bool(0.5))
            .map(|name| Step::Delete { name: name.clone() })
            .collect();

        Self {
            phases: vec![creates, accesses, deletes],
        }
    }

    /// Submit and serve every phase in order
    pub async fn run(&self, dispatcher: &Dispatcher, dir: &str) -> Result<Report> {
        let mut report = Report::default();
        for phase in &self.phases {
            for step in phase {
                step.submit(dispatcher, dir)?;
                report.submitted += 1;
            }
            for result in dispatcher.run_until_idle().await {
                match result {
                    Ok(_) => report.served += 1,
                    Err(err) => {
                        tracing::debug!(error = %err, "request failed");
                        report.failed += 1;
                    }
                }
            }
        }

        let stats = dispatcher.cache_stats();
        report.policy = dispatcher.policy().to_string();
        report.cache_policy = dispatcher.cache_policy().to_string();
        report.total_seek = dispatcher.total_seek();
        report.final_head = dispatcher.current_head_position();
        report.cache_hits = stats.hits;
        report.cache_misses = stats.misses;
        report.cache_evictions = stats.evictions;
        report.hit_ratio = stats.hit_ratio();
        report.free_blocks = dispatcher.free_blocks();
        Ok(report)
    }
}

/// Totals of one workload run
#[derive(Clone, Debug, Default, Serialize)]
pub struct Report {
    pub policy: String,
    pub cache_policy: String,
    pub submitted: usize,
    pub served: usize,
    pub failed: usize,
    pub total_seek: u64,
    pub final_head: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_evictions: u64,
    pub hit_ratio: f64,
    pub free_blocks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocksim_common::SimConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_generate_phases() {
        let mut rng = StdRng::seed_from_u64(9);
        let workload = Workload::generate(&mut rng, 5, 4, 16);

        assert_eq!(workload.phases.len(), 3);
        assert_eq!(workload.phases[0].len(), 5);
        assert_eq!(workload.phases[1].len(), 5);
        assert!(workload.phases[2].len() <= 5);
        for step in &workload.phases[0] {
            let Step::Create { blocks, .. } = step else {
                panic!("first phase only creates");
            };
            assert!((1..=4).contains(blocks));
        }
    }

    #[test]
    fn test_generate_is_reproducible() {
        let a = Workload::generate(&mut StdRng::seed_from_u64(1), 6, 3, 8);
        let b = Workload::generate(&mut StdRng::seed_from_u64(1), 6, 3, 8);
        assert_eq!(a.phases, b.phases);
    }

    #[tokio::test]
    async fn test_run_serves_everything() {
        let config = SimConfig {
            total_blocks: 200,
            block_size: 16,
            service_latency_ms: 0,
            seed: Some(3),
            ..SimConfig::default()
        };
        let dispatcher = Dispatcher::in_memory(config).unwrap();
        let workload = Workload::generate(&mut StdRng::seed_from_u64(3), 8, 4, 16);

        let report = workload.run(&dispatcher, "/").await.unwrap();
        assert_eq!(report.submitted, report.served);
        assert_eq!(report.failed, 0);
        assert_eq!(report.policy, "FIFO");
        assert!(report.cache_misses > 0);
    }
}
