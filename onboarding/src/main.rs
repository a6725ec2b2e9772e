use std::{fs::File, io::Write, path::Path};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{error, info};
use strum::IntoEnumIterator;
use tierpass_common::{
    config::VERSION,
    crypto::Address,
    kyc::{format_limit, upgrade_plan, validate_tier_table, Tier, TIERS},
};
use tierpass_onboarding::{
    backend::{BackendApi, KycBackend},
    config::{Command, Config, OnboardingConfig},
    countries::CountryDirectory,
    logger::{setup_logger, LoggerOptions},
};

#[tokio::main]
async fn main() -> Result<()> {
    let mut config: Config = Config::parse();
    if let Some(path) = config.config_file.as_ref() {
        if config.generate_config_template {
            if Path::new(path).exists() {
                eprintln!("Config file already exists at {}", path);
                return Ok(());
            }

            let mut file = File::create(path).context("Error while creating config file")?;
            let json = serde_json::to_string_pretty(&config)
                .context("Error while serializing config file")?;
            file.write_all(json.as_bytes())
                .context("Error while writing config file")?;
            println!("Config file template generated at {}", path);
            return Ok(());
        }

        let command = config.command.take();
        let file = File::open(path).context("Error while opening config file")?;
        config = serde_json::from_reader(file).context("Error while reading config file")?;
        config.command = command;
    } else if config.generate_config_template {
        eprintln!("Provided config file path is required to generate the template with --config-file");
        return Ok(());
    }

    let log_config = &config.log;
    setup_logger(LoggerOptions {
        level: log_config.log_level,
        file_level: log_config.file_log_level.unwrap_or(log_config.log_level),
        disable_file_logging: log_config.disable_file_logging,
        disable_file_log_date_based: log_config.disable_file_log_date_based,
        disable_colors: log_config.disable_log_color,
        filename_log: &log_config.filename_log,
        logs_path: &log_config.logs_path,
        datetime_format: &log_config.datetime_format,
    })
    .context("Error while setting up the logger")?;

    info!("Tierpass v{}", VERSION);
    validate_tier_table(&TIERS).context("Invalid tier table")?;

    let onboarding = config
        .onboarding()
        .context("Invalid contract address in configuration")?;

    let command = match config.command.take() {
        Some(command) => command,
        None => {
            Config::command()
                .print_help()
                .context("Error while printing help")?;
            return Ok(());
        }
    };

    if let Err(e) = run_command(command, &onboarding).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run_command(command: Command, config: &OnboardingConfig) -> Result<()> {
    match command {
        Command::Tiers => print_tiers(),
        Command::Requirements { approved, target } => {
            let approved = Tier::try_from(approved).context("Invalid approved tier")?;
            let target = Tier::try_from(target).context("Invalid target tier")?;
            print_requirements(approved, target);
        }
        Command::Countries => {
            let api = backend(config)?;
            let countries = CountryDirectory::load(&api).await;
            for country in countries.iter() {
                println!(
                    "{}  {}{}",
                    country.code,
                    country.name,
                    if country.blocked { " (blocked)" } else { "" }
                );
            }
        }
        Command::Status { address } => {
            let address: Address = address.parse().context("Invalid wallet address")?;
            let api = backend(config)?;
            let status = api
                .get_status(&address)
                .await
                .context("Error while fetching KYC status")?;
            let json = serde_json::to_string_pretty(&status)
                .context("Error while serializing KYC status")?;
            println!("{}", json);
        }
    }
    Ok(())
}

fn backend(config: &OnboardingConfig) -> Result<BackendApi> {
    BackendApi::new(config.backend_url.clone(), config.backend_timeout)
        .context("Error while creating the backend client")
}

fn print_tiers() {
    for tier in Tier::iter() {
        let labels: Vec<&str> = tier.requirements().iter().map(|c| c.label()).collect();
        println!(
            "{} {:<8} {:>10}  {}",
            tier.index(),
            tier.name(),
            format_limit(tier.limit()),
            if labels.is_empty() {
                "-".to_owned()
            } else {
                labels.join(", ")
            }
        );
    }
}

fn print_requirements(approved: Tier, target: Tier) {
    let plan = upgrade_plan(approved, target);
    if plan.is_empty() {
        println!(
            "{} is not an upgrade from {}, nothing to request",
            target, approved
        );
        return;
    }

    println!("{} -> {} ({})", approved, target, format_limit(target.limit()));
    for requirement in plan {
        println!(
            "  [{}] {}",
            if requirement.already_verified {
                "verified"
            } else {
                "required"
            },
            requirement.category.label()
        );
    }
}
