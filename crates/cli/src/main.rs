mod analysis;
mod cli;
mod policy;

use anyhow::Result;
use clap::Parser;

use tether_core::config::{self, Config};

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    config::load_dotenv();

    // stdout is reserved for briefs and JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let config = Config::for_profile(&args.profile);
    config.log_summary();

    match args.command {
        Command::Watch {
            policy,
            interval_ms,
            notify,
            init,
        } => {
            let policy_config = policy::resolve(config.policy, policy, interval_ms);
            policy::watch(&policy_config, notify, init).await
        }
        Command::Check { policy, json } => {
            let policy_config = policy::resolve(config.policy, policy, None);
            policy::check(&policy_config, json)
        }
        Command::Init { policy } => {
            let policy_config = policy::resolve(config.policy, policy, None);
            policy::init_policy(&policy_config.path)
        }
        Command::Brief {
            input,
            patterns,
            cluster,
            encoder,
            ngram,
            threshold,
            voice,
            max_patterns,
        } => {
            let analysis = analysis::resolve(config.analysis, ngram, threshold, voice, max_patterns);
            let analysis = analysis::resolve_workflow(analysis, input.session_window_secs, None, None);
            analysis::brief(
                &analysis,
                analysis::BriefRequest {
                    input: &input,
                    patterns: patterns.as_deref(),
                    cluster: cluster.as_deref(),
                    encoder,
                },
            )
        }
        Command::Suggest {
            input,
            patterns,
            encoder,
            threshold,
            max_clusters,
            min_cluster_size,
            json,
        } => {
            let analysis = analysis::resolve(config.analysis, None, threshold, None, None);
            let analysis =
                analysis::resolve_workflow(analysis, input.session_window_secs, max_clusters, min_cluster_size);
            analysis::suggest(
                &analysis,
                analysis::SuggestRequest {
                    input: &input,
                    patterns: patterns.as_deref(),
                    encoder,
                    json,
                },
            )
        }
        Command::Bakeoff {
            traces,
            thresholds,
            json,
        } => analysis::bakeoff(&config.analysis, &traces, &thresholds, json),
    }
}
