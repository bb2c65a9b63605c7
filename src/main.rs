//! HotScope - inspector backend for Turbo/Stimulus pages.
//!
//! Entry point for the relay server and the demo driver.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hotscope_backend::{Aggregator, BackendConfig, DataAttributeRuntime, NoopEffects, PageHandle};
use hotscope_bridge::Bridge;
use hotscope_dom::Document;
use hotscope_protocols::SessionKey;
use hotscope_relay::{NoopInjector, Relay, RelayServerConfig, SenderContext};

/// HotScope CLI.
#[derive(Parser)]
#[command(name = "hotscope")]
#[command(about = "Inspector backend for Turbo frames/streams and Stimulus controllers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay WebSocket server in the foreground (default)
    Serve {
        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(long, default_value_t = 8090)]
        port: u16,
    },

    /// Drive a simulated page through the full pipeline and print the
    /// inspector-side reports
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve {
        host: "127.0.0.1".to_string(),
        port: 8090,
    }) {
        Commands::Serve { host, port } => serve(host, port).await,
        Commands::Demo => demo().await,
    }
}

async fn serve(host: String, port: u16) -> anyhow::Result<()> {
    let relay = Relay::new(Arc::new(NoopInjector));
    let config = RelayServerConfig { host, port };
    info!("Starting relay server");
    hotscope_relay::serve(config, relay).await?;
    Ok(())
}

/// Wire a simulated page end-to-end and show what an inspector sees.
async fn demo() -> anyhow::Result<()> {
    let (mut doc, head, body) = Document::with_skeleton("http://localhost/demo");

    let meta = doc.create_element("meta");
    doc.append_child(head, meta)?;
    doc.set_attribute(meta, "name", "turbo-prefetch")?;
    doc.set_attribute(meta, "content", "true")?;

    let frame = doc.create_element("turbo-frame");
    doc.append_child(body, frame)?;
    doc.set_attribute(frame, "id", "inbox")?;
    doc.set_attribute(frame, "src", "/inbox")?;

    let list = doc.create_element("div");
    doc.append_child(frame, list)?;
    doc.set_attribute(list, "data-controller", "list search")?;
    doc.set_attribute(list, "data-list-url-value", "/items")?;

    let cable = doc.create_element("turbo-cable-stream-source");
    doc.append_child(body, cable)?;
    doc.set_attribute(cable, "channel", "Turbo::StreamsChannel")?;

    let flash = doc.create_element("div");
    doc.append_child(body, flash)?;
    doc.set_attribute(flash, "id", "flash")?;
    doc.set_attribute(flash, "data-turbo-permanent", "")?;

    let page = PageHandle::new(doc);
    let _backend = Aggregator::new(
        page.clone(),
        BackendConfig::default(),
        Arc::new(DataAttributeRuntime),
        Arc::new(NoopEffects),
    )
    .spawn();

    let relay = Relay::new(Arc::new(NoopInjector));
    let key = SessionKey(1);
    let mut inspector = relay.connect_inspector(&key.inspector_endpoint_name())?;
    let _bridge = Bridge::spawn(&relay, SenderContext::for_session(key), page.bus_sender())?;

    println!("--- activation snapshot ---");
    for _ in 0..7 {
        print_report(&mut inspector).await?;
    }

    println!("--- after inserting a nested frame ---");
    page.mutate(|doc| {
        let nested = doc.create_element("turbo-frame");
        if doc.append_child(frame, nested).is_ok() {
            let _ = doc.set_attribute(nested, "id", "drafts");
        }
    });
    print_report(&mut inspector).await?;

    Ok(())
}

async fn print_report(
    inspector: &mut hotscope_relay::EndpointHandle,
) -> anyhow::Result<()> {
    let message = tokio::time::timeout(Duration::from_secs(5), inspector.recv())
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for a report"))?
        .ok_or_else(|| anyhow::anyhow!("session torn down"))?;
    println!("{}", serde_json::to_string_pretty(&message)?);
    Ok(())
}
