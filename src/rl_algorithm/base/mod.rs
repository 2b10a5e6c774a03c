use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use chrono::Utc;
use lazy_static::lazy_static;
use tensorboard_rs::summary_writer::SummaryWriter;

pub mod config;
pub mod memory;
pub mod model;
pub mod optimizer;
pub mod rl_utils;

/// Per-iteration scalar aggregator.
///
/// Agents and training loops push `(main_tag, sub_tag)` scalars during an
/// iteration; [`log`](EpochLogger::log) prints them all and, when a writer
/// was initialized, forwards them to TensorBoard.
pub struct EpochLogger {
    log_info: BTreeMap<(String, String), f32>,
    writer: Option<SummaryWriter>,
}

lazy_static! {
    static ref LOGGER: Arc<Mutex<EpochLogger>> = Arc::new(Mutex::new(EpochLogger {
        log_info: BTreeMap::<(String, String), f32>::new(),
        writer: None,
    }));
}

impl EpochLogger {
    /// Attaches a TensorBoard writer rooted at `logdir`. Optional; without
    /// it [`log`](Self::log) only prints.
    pub fn init_writer(logdir: String) {
        let mut this = LOGGER.lock().unwrap();
        this.writer = Some(SummaryWriter::new(logdir));
    }

    pub fn add_scalar(main_tag_sub_tag: (&str, &str), val: f32) {
        let mut this = LOGGER.lock().unwrap();
        let key = (
            main_tag_sub_tag.0.to_string(),
            main_tag_sub_tag.1.to_string(),
        );
        this.log_info.insert(key, val);
    }

    fn write_scalar(&mut self, main_tag: &str, sub_tag: &str, scalar: f32, step: usize) {
        if let Some(writer) = self.writer.as_mut() {
            let mut map = std::collections::HashMap::<String, f32>::new();
            map.insert(sub_tag.to_string(), scalar);
            writer.add_scalars(format!("{}/{}", main_tag, sub_tag).as_str(), &map, step);
        }
    }

    /// Flushes all scalars collected since the previous call.
    pub fn log(step: usize) {
        let mut this = LOGGER.lock().unwrap();
        println!("************iter={}************", step);
        let log_info = std::mem::take(&mut this.log_info);
        for ((main_tag, sub_tag), scalar) in log_info {
            this.write_scalar(main_tag.as_str(), sub_tag.as_str(), scalar, step);
            println!("{}-{}={}", main_tag, sub_tag, scalar);
        }
        println!("************iter={}************", step);

        if let Some(writer) = this.writer.as_mut() {
            writer.flush();
        }
    }
}

/// Timestamped run name for log and checkpoint directories.
pub fn experiment_name(algo_name: &str, env_name: &str) -> String {
    format!(
        "{}_{}_{}",
        algo_name,
        env_name,
        Utc::now().format("%m-%d %H:%M")
    )
}
