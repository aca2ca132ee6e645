use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;

use portal_gate::backend::memory::{DEMO_EMAIL, DEMO_PASSWORD};
use portal_gate::backend::{
    IdentityProvider, MemoryBackend, OrganizationDirectory, ProfileStore, RequestStore,
    SupabaseBackend,
};
use portal_gate::checkin::MoodCoach;
use portal_gate::config::PortalConfig;
use portal_gate::directory::DirectorySearch;
use portal_gate::gate::SessionGate;
use portal_gate::llm::create_provider;
use portal_gate::shell::Shell;

struct Backends {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    directory: Arc<dyn OrganizationDirectory>,
    requests: Arc<dyn RequestStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = PortalConfig::from_env().context("Invalid portal configuration")?;

    eprintln!("🏢 Portal Gate v{}", env!("CARGO_PKG_VERSION"));

    // ── Backend ─────────────────────────────────────────────────────────
    let backends = match &config.supabase {
        Some(supabase) => {
            eprintln!("   Backend: Supabase ({})", supabase.url);
            let backend = Arc::new(SupabaseBackend::new(supabase.clone()));
            Backends {
                identity: backend.clone(),
                profiles: backend.clone(),
                directory: backend.clone(),
                requests: backend,
            }
        }
        None => {
            eprintln!("   Backend: in-memory demo");
            eprintln!("   Demo login: {} / {}", DEMO_EMAIL, DEMO_PASSWORD);
            let backend = Arc::new(
                MemoryBackend::seeded()
                    .await
                    .with_latency(config.mock_latency),
            );
            Backends {
                identity: backend.clone(),
                profiles: backend.clone(),
                directory: backend.clone(),
                requests: backend,
            }
        }
    };

    // ── Advisory generator ──────────────────────────────────────────────
    let llm = match &config.llm {
        Some(llm_config) => match create_provider(llm_config) {
            Ok(provider) => {
                eprintln!("   Check-in model: {}", provider.model_name());
                Some(provider)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Advisory provider unavailable, using fallback text");
                None
            }
        },
        None => {
            eprintln!("   Check-in model: none (PORTAL_LLM_API_KEY not set)");
            None
        }
    };
    let coach = Arc::new(MoodCoach::new(llm).with_timeout(config.advice_timeout));

    // ── Gate ────────────────────────────────────────────────────────────
    let gate = SessionGate::new(backends.identity, backends.profiles);
    let subscription = gate.attach();
    let snapshot = gate.resync().await;
    tracing::info!(mode = %snapshot.mode, "Portal ready");

    let directory =
        Arc::new(DirectorySearch::new(backends.directory).with_limit(config.search_limit));
    let mut shell = Shell::new(
        gate,
        backends.requests,
        directory,
        config.search_debounce,
        coach,
    );

    eprintln!("   Type 'help' for commands, 'quit' to exit.\n");
    shell
        .run(BufReader::new(tokio::io::stdin()))
        .await
        .context("Failed to read from stdin")?;

    subscription.release();
    Ok(())
}
