use anyhow::{Context, Result};
use pstrain::{
    evaluate_dataset, load_lines, parse_arguments, run_training, shard, BatchReader,
    LocalSession,
};
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("pstrain=info".parse()?))
        .init();

    let start = Instant::now();
    let run = parse_arguments().context("invalid training configuration")?;
    let config = &run.config;
    let target = config.cluster.target(&config.task).unwrap_or_default();

    if !config.is_worker() {
        info!(
            %target,
            task_index = config.task.task_index,
            "parameter server task has no local work, exiting"
        );
        return Ok(());
    }

    info!(
        %target,
        task_index = config.task.task_index,
        is_chief = config.task.is_chief,
        num_ps = config.cluster.num_ps(),
        num_workers = config.cluster.num_workers(),
        "starting worker"
    );

    let lines = load_lines(&run.train_data).context("failed to load training data")?;
    let lines = shard(lines, config.task.task_index, config.cluster.num_workers());
    let mut reader = BatchReader::new(lines, config.batch_size, None, true, config.seed);
    if reader.batches_per_epoch() == 0 {
        warn!(
            records = reader.len(),
            batch_size = config.batch_size,
            "training shard is smaller than one batch"
        );
    }

    let mut session = LocalSession::new(config);
    let stats = run_training(&mut session, &mut reader, config).context("training failed")?;
    info!(
        global_step = stats.global_step,
        local_iterations = stats.local_iterations,
        loss = stats.last_loss,
        accuracy = stats.last_accuracy,
        duration = ?stats.duration,
        "training summary"
    );

    if let Some(test_data) = &run.test_data {
        let lines = load_lines(test_data).context("failed to load test data")?;
        let mut test_reader =
            BatchReader::new(lines, config.batch_size, Some(1), false, None).keep_partial_batches();
        match evaluate_dataset(&session, &mut test_reader, config.batch_size)
            .context("evaluation failed")?
        {
            Some(accuracy) => info!("test accuracy: {:.2}%", accuracy),
            None => warn!("test data yielded no records, nothing evaluated"),
        }
    }

    info!(runtime = ?start.elapsed(), "done");
    Ok(())
}
