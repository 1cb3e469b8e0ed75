//! gpc-attachd entry point.
//!
//! Builds the engine over the simulated FAL, replays a script of
//! dataplane events through the dispatcher, then reports the resulting
//! state through the op-mode commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use vplane_fal::SoftFal;
use vplane_gpc_attach::daemon::script;
use vplane_gpc_attach::{ArlgOrch, CounterFilter, DaemonConfig, EventDispatcher};
use vplane_npf_common::{InterfaceTable, RuleGroupStore};
use vplane_types::Direction;

/// GPC attached rule group daemon
#[derive(Parser, Debug)]
#[command(name = "gpc-attachd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// JSON script of dataplane events to replay
    #[arg(short = 's', long)]
    script: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Event queue depth (overrides the configuration file)
    #[arg(long)]
    queue_depth: Option<usize>,

    /// Count bytes as well as packets (overrides the configuration file)
    #[arg(long)]
    count_bytes: bool,

    /// Print the object graph dump after the replay
    #[arg(long)]
    dump: bool,

    /// Print the counters as JSON after the replay
    #[arg(long)]
    show_counters: bool,

    /// Clear the counters after the replay
    #[arg(long)]
    clear_counters: bool,

    /// Restrict show/clear to an interface
    #[arg(long)]
    interface: Option<String>,

    /// Restrict show/clear to a direction (needs --interface)
    #[arg(long)]
    direction: Option<Direction>,

    /// Restrict show/clear to a group (needs --direction)
    #[arg(long)]
    group: Option<String>,
}

impl Args {
    fn filter(&self) -> CounterFilter {
        CounterFilter {
            ifname: self.interface.clone(),
            direction: self.direction,
            group: self.group.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let mut config = match &args.config {
        Some(path) => DaemonConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => DaemonConfig::default(),
    };
    if let Some(depth) = args.queue_depth {
        config.dispatcher.queue_depth = depth;
    }
    if args.count_bytes {
        config.arlg.count_bytes = true;
    }

    let events = match &args.script {
        Some(path) => script::load(path)
            .with_context(|| format!("loading script {}", path.display()))?,
        None => Vec::new(),
    };

    info!("gpc-attachd: starting (simulated FAL)");
    let fal = SoftFal::new();
    let interfaces = Arc::new(InterfaceTable::new());
    let store = Arc::new(RuleGroupStore::new());
    config.seed_interfaces(&interfaces)?;
    config.seed_rule_groups(&store);

    let orch = ArlgOrch::new(
        config.arlg.clone(),
        Arc::new(fal.clone()),
        store.clone(),
        interfaces.clone(),
    );
    let dispatcher = EventDispatcher::new(config.dispatcher.clone(), orch, store, interfaces);

    let (tx, handle) = dispatcher.spawn();
    info!("gpc-attachd: replaying {} events", events.len());
    for event in events {
        tx.send(event)
            .await
            .context("dispatcher stopped while replaying")?;
    }
    drop(tx);

    let dispatcher = handle.await.context("dispatcher task failed")?;
    info!("gpc-attachd: dispatch {:?}", dispatcher.stats());
    let orch = dispatcher.into_handler();
    info!("gpc-attachd: engine {:?}", orch.stats());
    info!(
        "gpc-attachd: {} FAL commits, {} hardware failures",
        fal.commit_count(),
        orch.coordinator().hw().failures()
    );
    for context in orch.deferred_groups() {
        warn!("gpc-attachd: group {} still deferred", context);
    }

    let filter = args.filter();
    if args.clear_counters {
        orch.clear_counters(&filter)?;
    }
    if args.dump {
        print!("{}", orch.dump_string());
    }
    if args.show_counters {
        let shown = orch.show_counters(&filter);
        println!("{}", serde_json::to_string_pretty(&shown)?);
    }

    Ok(())
}
