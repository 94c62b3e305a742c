use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use crate::cli::Mode;
use crate::config::{self, AgentConfig, EffectiveConfig};
use crate::discovery::DiscoveryScanner;
use crate::identity::AgentIdentity;
use crate::poller::MetricPoller;
use crate::probe::{Probe, SnmpProbe};
use crate::scheduler::PeriodicTask;
use crate::store::Store;
use crate::sync::{RetryPolicy, SyncClient, SyncEngine};

/// Everything the agent's tasks share, wired once at startup.
pub struct AgentContext {
    pub store: Arc<Mutex<Store>>,
    pub identity: Arc<Mutex<AgentIdentity>>,
    pub probe: Arc<dyn Probe>,
    pub sync: Arc<SyncEngine>,
}

impl AgentContext {
    pub fn init(config_path: &Path) -> Result<Self, Box<dyn Error>> {
        let config = config::load_from_file(config_path)?;
        Self::from_config(config)
    }

    pub fn from_config(config: AgentConfig) -> Result<Self, Box<dyn Error>> {
        let effective = EffectiveConfig::from_bootstrap(&config)?;

        let data_dir = PathBuf::from(&config.agent.data_dir);
        std::fs::create_dir_all(&data_dir)?;
        let store = Store::open(&data_dir.join("agent.db"))?;
        let identity_path = data_dir.join("agent.json");
        let identity =
            AgentIdentity::load_or_create(&identity_path, config.agent.name.as_deref())?;
        tracing::info!(
            agent_id = %identity.agent_id,
            registered = identity.is_registered(),
            server = %config.server.url,
            "agent configured"
        );

        let client = SyncClient::new(
            &config.server.url,
            Duration::from_secs(config.server.http_timeout_seconds),
        )?;
        let (config_tx, _) = watch::channel(effective);
        let store = Arc::new(Mutex::new(store));
        let identity = Arc::new(Mutex::new(identity));
        let sync = Arc::new(SyncEngine {
            client,
            store: store.clone(),
            identity: identity.clone(),
            identity_path,
            config_tx,
            registration_retry: RetryPolicy::default(),
        });

        Ok(Self {
            store,
            identity,
            probe: Arc::new(SnmpProbe),
            sync,
        })
    }

    pub fn effective(&self) -> EffectiveConfig {
        self.sync.config_tx.borrow().clone()
    }

    pub fn scanner(&self) -> DiscoveryScanner {
        DiscoveryScanner {
            probe: self.probe.clone(),
            store: self.store.clone(),
        }
    }

    pub fn poller(&self) -> MetricPoller {
        MetricPoller {
            probe: self.probe.clone(),
            store: self.store.clone(),
        }
    }
}

pub async fn execute(ctx: AgentContext, mode: Mode) -> Result<(), Box<dyn Error>> {
    match mode {
        Mode::Run => run(ctx).await,
        Mode::Discover => {
            ctx.scanner().run_cycle(&ctx.effective()).await;
            Ok(())
        }
        Mode::Collect => {
            ctx.poller().run_cycle(&ctx.effective()).await;
            Ok(())
        }
        Mode::Sync => {
            let summary = ctx.sync.run_cycle().await;
            if summary.failed {
                return Err("sync cycle did not complete".into());
            }
            Ok(())
        }
        Mode::Register => match ctx.sync.ensure_registered().await {
            Some(_) => Ok(()),
            None => Err("registration failed".into()),
        },
        Mode::SetSerial { ip, serial } => {
            let updated = ctx.store.lock().await.set_printer_serial(&ip, &serial)?;
            if !updated {
                return Err(format!("no printer with address {ip}").into());
            }
            tracing::info!(ip = %ip, serial = %serial, "serial number overridden");
            Ok(())
        }
    }
}

async fn run(ctx: AgentContext) -> Result<(), Box<dyn Error>> {
    let ctx = Arc::new(ctx);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // First contact before the timers start. Both steps are allowed to fail;
    // the periodic tasks pick up whatever is still missing.
    ctx.sync.ensure_registered().await;
    ctx.scanner().run_cycle(&ctx.effective()).await;

    let discovery = {
        let ctx = ctx.clone();
        PeriodicTask {
            name: "discovery",
            config: ctx.sync.config_tx.subscribe(),
            period: |c| c.discovery_interval,
            shutdown: shutdown_rx.clone(),
        }
        .spawn(move |cfg| {
            let ctx = ctx.clone();
            async move {
                ctx.scanner().run_cycle(&cfg).await;
            }
        })
    };

    let poll = {
        let ctx = ctx.clone();
        PeriodicTask {
            name: "poll",
            config: ctx.sync.config_tx.subscribe(),
            period: |c| c.polling_interval,
            shutdown: shutdown_rx.clone(),
        }
        .spawn(move |cfg| {
            let ctx = ctx.clone();
            async move {
                ctx.poller().run_cycle(&cfg).await;
            }
        })
    };

    let sync = {
        let ctx = ctx.clone();
        PeriodicTask {
            name: "sync",
            config: ctx.sync.config_tx.subscribe(),
            period: |c| c.sync_interval,
            shutdown: shutdown_rx,
        }
        .spawn(move |_cfg| {
            let ctx = ctx.clone();
            async move {
                ctx.sync.run_cycle().await;
            }
        })
    };

    tracing::info!("agent running");
    wait_for_shutdown().await;

    tracing::info!("shutting down, letting in-flight cycles finish");
    let _ = shutdown_tx.send(true);
    for handle in [discovery, poll, sync] {
        let _ = handle.await;
    }
    tracing::info!("stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
