// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use categorizer_node::cli::{self, ClientArgs, ClientCommand, Commands};
use categorizer_node::{FrontTierServer, LocalCluster, NodeConfiguration, Router};
use network::{FrontTierClient, Reply};
use tokio::net::TcpListener;

fn main() -> Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = cli::parse_cli();

    match &cli.command {
        Commands::Init(args) => {
            let config_path = args
                .config
                .clone()
                .unwrap_or_else(NodeConfiguration::default_config_path);

            if !args.force && config_path.exists() {
                return Err(anyhow!(
                    "config file already exists: {} (use --force to overwrite)",
                    config_path.display()
                ));
            }

            let cfg = NodeConfiguration::default().merge_with_env();
            cfg.validate()?;
            cfg.save_to_file(&config_path)?;
            println!("init complete: config_path={}", config_path.display());
        }
        Commands::Serve(args) => {
            let config_path = args
                .config
                .clone()
                .unwrap_or_else(NodeConfiguration::default_config_path);

            let mut cfg = if config_path.exists() {
                let loaded = NodeConfiguration::load_from_file(&config_path)?;
                println!("loaded config: {}", config_path.display());
                loaded
            } else {
                println!("config not found; using defaults: {}", config_path.display());
                NodeConfiguration::default()
            };

            cfg = cfg.merge_with_env();
            cfg = cfg.merge_with_cli(&cli);
            cfg.validate()?;

            run_node(cfg).await?;
        }
        Commands::Client(args) => {
            let reply = run_client(args).await?;
            println!("code: {}", reply.code().as_i32());
            println!("desc: {}", reply.desc());
            if reply.is_cancelled() {
                return Err(anyhow!("call cancelled: {}", reply.desc()));
            }
        }
        Commands::Version(args) => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            if args.verbose {
                let git_commit = option_env!("GIT_COMMIT").unwrap_or("unknown");
                let build_date = option_env!("BUILD_DATE").unwrap_or("unknown");
                let rustc_version = option_env!("RUSTC_VERSION").unwrap_or("unknown");
                println!("git_commit: {git_commit}");
                println!("build_date: {build_date}");
                println!("rustc: {rustc_version}");
            }
        }
    }

    Ok(())
}

async fn run_node(cfg: NodeConfiguration) -> Result<()> {
    let library = cfg.model.library.build();
    let cluster = Arc::new(
        LocalCluster::start(cfg.cluster.partitions, cfg.cluster.replicas, library)
            .context("failed to start backend tier")?,
    );
    let router = Arc::new(Router::new(
        cluster.table().clone(),
        cluster.substrate(),
        cluster.clone(),
        cfg.front.member_policy,
    ));
    let server = Arc::new(FrontTierServer::new(router, cfg.front.ingest_limits()));

    let listener = TcpListener::bind(cfg.front.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.front.listen_addr))?;

    println!(
        "node started: listen_addr={}, partitions={}, replicas={}, member_policy={}",
        cfg.front.listen_addr, cfg.cluster.partitions, cfg.cluster.replicas, cfg.front.member_policy
    );

    server
        .serve(listener, async {
            if tokio::signal::ctrl_c().await.is_err() {
                eprintln!("failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            eprintln!("ctrl-c received");
        })
        .await?;

    println!("node exiting");
    Ok(())
}

async fn run_client(args: &ClientArgs) -> Result<Reply> {
    let client = FrontTierClient::new(args.server.clone());
    let reply = match &args.command {
        ClientCommand::Install {
            tag,
            labels,
            topology,
            weights,
        } => client.install_files(*tag, labels, topology, weights).await,
        ClientCommand::Classify { tags, photo } => client.classify_file(tags, photo).await,
        ClientCommand::Remove { tag } => client.remove(*tag).await,
    };
    reply.with_context(|| format!("call to {} failed", client.server()))
}
