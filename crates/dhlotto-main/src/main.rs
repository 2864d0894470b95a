// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of DhLotto.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

mod config;

use anyhow::{Context, Result, bail};
use config::AppConfig;
use dhlotto_client::{DhLotteryClient, Lotto645};
use dhlotto_core::{
    BuyResponse, Lotto645Coordinator, LotteryCoordinator, LotteryService,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!("DhLotto - DH Lottery integration");
    println!("Version: {VERSION}");
    println!();
    println!("Usage: dhlotto [OPTIONS] [COMMAND]");
    println!();
    println!("Commands:");
    println!("  run              Run the snapshot coordinators until interrupted (default)");
    println!("  buy <SPEC>...    Buy up to five Lotto 6/45 games and exit");
    println!("                   (spec: 자동 | 수동,n,... | 반자동,n,...)");
    println!();
    println!("Options:");
    println!("  -h, --help    Print this help message");
    println!("  -v, --version Print version");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--help" | "-h") => {
            print_help();
            return Ok(());
        }
        Some("--version" | "-v") => {
            println!("{VERSION}");
            return Ok(());
        }
        _ => {}
    }

    // Initialize tracing with env filter support; respects RUST_LOG.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let config = config::load_config_with_fallback()?;

    match args.get(1).map(String::as_str) {
        Some("buy") => run_buy(&config, &args[2..]).await,
        Some("run") | None => run_coordinators(&config).await,
        Some(other) => bail!("unknown argument: {other} (try --help)"),
    }
}

async fn connect(config: &AppConfig) -> Result<Arc<DhLotteryClient>> {
    let (username, password) = config.portal.credentials()?;

    info!("🚀 Starting DhLotto - DH Lottery integration");
    info!("📋 Configuration Summary:");
    info!("   Account: {username}");
    info!("   Lotto 6/45: {}", config.portal.lotto_645);

    let client = Arc::new(DhLotteryClient::new(username, password)?);
    client.login().await.context("동행 복권 로그인 실패")?;
    Ok(client)
}

/// Default mode: keep the snapshot coordinators polling until Ctrl-C.
async fn run_coordinators(config: &AppConfig) -> Result<()> {
    let client = connect(config).await?;

    let lottery = Arc::new(LotteryCoordinator::new(Arc::clone(&client)));
    let mut tasks = vec![Arc::clone(&lottery).spawn()];
    if config.portal.lotto_645 {
        let lotto = Arc::new(Lotto645Coordinator::new(Lotto645::new(Arc::clone(&client))));
        tasks.push(Arc::clone(&lotto).spawn());
    }

    info!("Coordinators running; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("🛑 Shutting down");
    for task in tasks {
        task.abort();
    }
    Ok(())
}

/// One-shot purchase through the outward service contract.
async fn run_buy(config: &AppConfig, specs: &[String]) -> Result<()> {
    if !config.portal.lotto_645 {
        bail!("Lotto 6/45 is disabled in the configuration");
    }
    if specs.is_empty() {
        bail!("no game specs given (try: dhlotto buy 자동)");
    }

    let client = connect(config).await?;
    let lottery = Arc::new(LotteryCoordinator::new(Arc::clone(&client)));
    let lotto = Arc::new(Lotto645Coordinator::new(Lotto645::new(client)));
    let service = LotteryService::new(lottery, lotto);

    match service.buy(specs).await {
        BuyResponse::Success { message, .. } => {
            println!("{message}");
            Ok(())
        }
        BuyResponse::Fail { message } => bail!(message),
    }
}
