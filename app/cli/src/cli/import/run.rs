use std::sync::Arc;
use std::time::Duration;

use alloy::transports::http::reqwest::Url;
use chain::limits::RpcLimitations;
use chain::rpc::NodeClient;
use engine::args::Args;
use engine::checkpointer::Checkpointer;
use engine::job::{ImportJob, ImportMode};
use engine::optimizer::types::TieBreak;
use engine::sink::logger::TracingSink;
use engine::state::chain::ChainState;
use eyre::Result;
use store::client::Client;
use store::import_state::store::Store;
use sync::memory::ProcessMemory;

use crate::cli::import::args::ImportArgs;
use crate::cli::read;

pub async fn import(args: &ImportArgs) -> Result<()> {
    let objects = read::parse_objects(&args.objects)?;
    let limitations = match &args.rpc_limitations {
        Some(path) => read::read_limitations(path)?,
        None => RpcLimitations::default(),
    };

    // map CLI args to engine Args
    let mut job_args = Args::new(&args.chain, vec![read::parse_topic(&args.event)]);
    job_args.ignore_import_state = args.ignore_import_state;
    job_args.max_queries_per_product = args.max_queries_per_product;
    job_args.tie_break =
        if args.deterministic { TieBreak::Deterministic } else { TieBreak::Random };
    job_args.batch.work_concurrency = args.work_concurrency;
    job_args.batch.max_input_wait = Duration::from_millis(args.max_input_wait);
    job_args.batch.max_input_take = args.max_input_take;
    job_args.batch.max_total_retry = Duration::from_millis(args.max_total_retry);
    job_args.throttle.max_memory_bytes = args.max_memory_mb * 1024 * 1024;

    let node_client = NodeClient::new(Url::parse(&args.rpc_url)?);
    let client = Client::init(&args.db_url).await?;
    let checkpointer = Checkpointer::new(Store::new(client), &args.chain);
    let chain_state = ChainState::new(&args.chain, limitations);

    let mode = if args.recent { ImportMode::Recent } else { ImportMode::Historical };
    tracing::info!("Starting {mode:?} import of {} objects: {job_args:?}", objects.len());

    let job = ImportJob::new(
        job_args,
        chain_state,
        Arc::new(node_client),
        checkpointer,
        Arc::new(TracingSink),
        Arc::new(ProcessMemory),
    );
    let report = job.run(&objects, mode).await?;

    if report.archive_node_required > 0 {
        tracing::warn!(
            "{} ranges need an archive node, point --rpc-url to one to import them",
            report.archive_node_required
        );
    }
    tracing::info!("Import done: {report:?}");
    Ok(())
}
