use std::sync::Arc;
use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use netswitch::config::NetworkConfig;
use netswitch::core::{self as node_core, Scheduler};
use netswitch::database;
use netswitch::database::location_db::SqlLocationTracker;
use netswitch::lang::Messages;
use netswitch::network::location::{LocationTracker, MemoryLocationTracker};
use netswitch::network::packet::{NetworkPacket, QueuedPacketChannel, QueuedProxyTransport};
use netswitch::network::registry::ServerRegistry;
use netswitch::network::{FeedEvent, Network};
use netswitch::user::{Session, User};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut conf_file: Option<String> = None;
    let mut user_name = "console".to_string();

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "--h" | "--?" | "/?" => {
                println!("Usage: network_node [--conf FILE] [--user NAME]");
                return Ok(());
            }
            "--conf" if i + 1 < args.len() => { i += 1; conf_file = Some(args[i].clone()); }
            "--user" if i + 1 < args.len() => { i += 1; user_name = args[i].clone(); }
            "--conf" | "--user" => {
                return Err(anyhow::anyhow!("{} requires an argument", args[i]));
            }
            _ => {}
        }
        i += 1;
    }

    let config = match &conf_file {
        Some(path) => NetworkConfig::from_file(path)
            .with_context(|| format!("Cannot load config: {}", path))?,
        None => NetworkConfig::default(),
    };

    let messages = Arc::new(match &config.lang_file {
        Some(path) => Messages::load(path)?,
        None => Messages::default(),
    });

    let registry = Arc::new(ServerRegistry::new());
    if let Some(name) = &config.server_name {
        registry.set_self_name(name.clone());
    }
    if !config.servers.is_empty() {
        registry.set_servers(config.servers.clone());
    }

    let tracker: Arc<dyn LocationTracker> = match &config.sql {
        Some(sql) => {
            let pool = database::connect(sql).await?;
            database::migrate(&pool).await?;
            Arc::new(SqlLocationTracker::new(pool, Arc::clone(&registry)))
        }
        None => Arc::new(MemoryLocationTracker::new(Arc::clone(&registry))),
    };

    let scheduler = Arc::new(Scheduler::new());
    let (transport, mut proxy_rx) = QueuedProxyTransport::new(config.channel_capacity);
    let (channel, mut wire_rx) = QueuedPacketChannel::new(config.channel_capacity);
    let network = Network::new(
        Arc::clone(&registry),
        Arc::clone(&scheduler),
        Arc::new(transport),
        Arc::new(channel),
        tracker,
    )
    .with_timing(config.switch_delay_ticks, config.switch_cooldown());

    // The proxy link and server wire live outside this node; log what would go out.
    tokio::spawn(async move {
        while let Some(instr) = proxy_rx.recv().await {
            tracing::info!("[node] [proxy_out] {:?}", instr);
        }
    });
    tokio::spawn(async move {
        while let Some(out) = wire_rx.recv().await {
            tracing::info!("[node] [packet_out] server={} bytes={}", out.server, out.packet.payload.len());
        }
    });

    let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
    let (save_tx, mut save_rx) = mpsc::channel(64);
    tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            println!("{}", text);
        }
    });
    tokio::spawn(async move {
        while let Some(req) = save_rx.recv().await {
            tracing::info!("[node] [save] player={:?}", req);
        }
    });
    let user = Session::new(user_name, messages, out_tx, save_tx);

    let state = node_core::create_server_state();
    let ticker = tokio::spawn(node_core::run(
        Arc::clone(&scheduler),
        Arc::clone(&state),
        node_core::tick_period(config.tick_rate),
    ));

    tracing::info!(
        "[node] [started] tick_rate={} delay_ticks={} cooldown_ms={}",
        config.tick_rate, config.switch_delay_ticks, config.switch_cooldown_ms
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => handle_console_line(&network, &user, &line),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("[node] [shutdown] Received Ctrl+C");
                break;
            }
        }
    }

    state.lock().unwrap_or_else(|p| p.into_inner()).request_shutdown();
    let _ = ticker.await;
    Ok(())
}

fn handle_console_line(network: &Network, user: &Session, line: &str) {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match word {
        "" => {}
        "servers" => network.handle_feed_event(FeedEvent::ServerList(
            rest.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect(),
        )),
        "self" if !rest.is_empty() => network.handle_feed_event(FeedEvent::ServerName(rest.to_string())),
        "join" if !rest.is_empty() => network.handle_feed_event(FeedEvent::PlayerJoined(rest.to_string())),
        "leave" if !rest.is_empty() => network.handle_feed_event(FeedEvent::PlayerLeftNetwork(rest.to_string())),
        "where" if !rest.is_empty() => {
            let player = rest.to_string();
            network.get_server(rest, Box::new(move |server: Option<String>| {
                println!("{} is on {}", player, server.as_deref().unwrap_or("no server"));
            }));
        }
        "chat" => {
            if network.chat_allowed(user) {
                println!("<{}> {}", user.name(), rest);
            }
        }
        "broadcast" => network.send_packet_global(NetworkPacket::new(rest.as_bytes().to_vec())),
        _ => {
            if !network.handle_command(user, line) {
                println!("Unknown command: {}", word);
            }
        }
    }
}
