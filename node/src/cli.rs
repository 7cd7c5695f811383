// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tier_types::Tag;

#[derive(Parser, Debug)]
#[command(name = "categorizer-node")]
#[command(version, about = "Replicated photo categorizer node", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file
    Init(InitArgs),
    /// Start the backend tier and the front-tier listener
    Serve(ServeArgs),
    /// Talk to a running front tier
    Client(ClientArgs),
    /// Display version information
    Version(VersionArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Overwrite an existing config
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Front-tier listen address override (e.g. 127.0.0.1:50051)
    #[arg(long)]
    pub listen: Option<SocketAddr>,
    /// Number of backend partitions
    #[arg(long)]
    pub partitions: Option<usize>,
    /// Members per partition
    #[arg(long)]
    pub replicas: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct ClientArgs {
    /// Front-tier address
    #[arg(long)]
    pub server: String,
    #[command(subcommand)]
    pub command: ClientCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ClientCommand {
    /// Install a model from its label list, topology and weights files
    Install {
        tag: Tag,
        labels: PathBuf,
        topology: PathBuf,
        weights: PathBuf,
    },
    /// Classify a photo; tags are comma separated
    Classify {
        #[arg(value_delimiter = ',', num_args = 1, required = true)]
        tags: Vec<Tag>,
        photo: PathBuf,
    },
    /// Remove an installed model
    Remove { tag: Tag },
}

#[derive(Parser, Debug, Clone)]
pub struct VersionArgs {
    /// Show detailed build information
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
