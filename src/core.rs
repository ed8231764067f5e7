//! Process wiring: store, provider, router, agent, worker, chat loop.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use crate::agent::Agent;
use crate::config::AppConfig;
use crate::extractor;
use crate::proactive::WorkflowRunner;
use crate::providers::OpenAiCompatibleProvider;
use crate::router::{ModelRouter, Tier};
use crate::sources::{GmailReader, GoogleCalendarReader};
use crate::state::SqliteRecordStore;
use crate::tools;
use crate::traits::{AgentContext, ModelProvider, RecordStore};
use crate::worker::Worker;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    // 1. Record store
    let store: Arc<dyn RecordStore> =
        Arc::new(SqliteRecordStore::new(&config.store.db_path).await?);
    info!(path = %config.store.db_path, "record store initialized");

    // 2. Provider
    let provider: Arc<dyn ModelProvider> = Arc::new(OpenAiCompatibleProvider::new(
        &config.provider.base_url,
        config.api_key(),
        config.provider.timeout_secs,
    )?);

    // 3. Router
    let router = ModelRouter::from_config(&config.provider);
    info!(
        local = router.model_for(Tier::Local),
        remote = router.model_for(Tier::Remote),
        "model router configured"
    );

    // 4. External sources
    let mailbox = Arc::new(GmailReader::new(&config.sources.gmail_token_path));
    let calendar = Arc::new(GoogleCalendarReader::new(&config.sources.calendar_token_path));

    // 5. Agent
    let agent = Agent::new(provider.clone(), router.clone(), store.clone(), &config.agent);

    // 6. Worker
    let digest_model = router.model_for(router.select("digest", false)).to_string();
    let worker_runner = WorkflowRunner::new(
        provider.clone(),
        &digest_model,
        store.clone(),
        mailbox.clone(),
        config.worker.stale_task_days,
    );
    Worker::new(worker_runner, store.clone(), config.worker.clone()).spawn()?;

    // 7. Chat loop over stdin. Each line is one exchange with its own run
    //    context and tool registry.
    let classify_model = router.model_for(router.select("classify", false)).to_string();
    // Extraction reads raw conversation text, so it stays on the local tier.
    let extract_model = router.model_for(Tier::Local).to_string();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "/quit" {
            break;
        }

        let ctx = Arc::new(AgentContext::new());
        let registry = tools::build_registry(
            store.clone(),
            ctx.clone(),
            provider.clone(),
            classify_model.clone(),
            mailbox.clone(),
            calendar.clone(),
            &config.sources,
        );

        match agent.run_exchange(message, &registry).await {
            Ok(reply) => {
                stdout.write_all(reply.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                debug!(
                    task_created = ctx.task_created(),
                    task_updated = ctx.task_updated(),
                    memory_created = ctx.memory_created(),
                    "exchange finished"
                );

                let provider = provider.clone();
                let store = store.clone();
                let model = extract_model.clone();
                let user = message.to_string();
                tokio::spawn(async move {
                    extractor::extract_and_store(provider, &model, store, &user, &reply).await;
                });
            }
            Err(e) => error!("exchange failed: {e}"),
        }
    }

    info!("shutting down");
    Ok(())
}
