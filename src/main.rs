use clap::Parser;
use gastro_quota::config::cli::{Cli, Command, LeadsCommand};
use gastro_quota::utils::error::{ErrorSeverity, QuotaError};
use gastro_quota::utils::logger;
use gastro_quota::{
    Admission, AdmissionRequest, Period, QuotaConfig, QuotaEngine, UserProfile,
};
use serde::Serialize;
use std::process::ExitCode;

const EXIT_DENIED: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match QuotaConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                return ExitCode::from(1);
            }
        },
        None => QuotaConfig::default(),
    };

    if cli.json_logs || config.logging.is_json() {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("Config: {:?}", config);

    let engine = match QuotaEngine::from_config(&config) {
        Ok(engine) => engine,
        Err(e) => return report_failure(&e),
    };

    match run(&engine, cli.command).await {
        Ok(code) => code,
        Err(e) => report_failure(&e),
    }
}

async fn run(engine: &QuotaEngine, command: Command) -> gastro_quota::Result<ExitCode> {
    match command {
        Command::Check(target) => {
            let check = engine
                .ledger()
                .check_limit(&target.user, target.tool, target.plan, &target.period())
                .await?;
            print_json(&check)?;
        }
        Command::Admit {
            target,
            name,
            email,
            company,
        } => {
            let request = AdmissionRequest::new(&target.user, target.tool, target.plan, target.period())
                .with_profile(UserProfile {
                    name,
                    email,
                    company,
                });

            match engine.gate().admit_operation(&request).await? {
                Admission::Admit(ticket) => {
                    let usage = engine.gate().record(ticket).await?;
                    tracing::info!("✅ Admitted {} for {}", request.tool, request.user_id);
                    print_json(&serde_json::json!({ "admitted": true, "usage": usage }))?;
                }
                Admission::Deny(info) => {
                    print_json(&serde_json::json!({
                        "admitted": false,
                        "limitReached": true,
                        "limit": info.limit,
                        "used": info.used,
                    }))?;
                    return Ok(ExitCode::from(EXIT_DENIED));
                }
            }
        }
        Command::Usage { user, plan, period } => {
            let period = period.unwrap_or_else(Period::current);
            let summary = engine.ledger().summary(&user, plan, &period).await?;
            print_json(&summary)?;
        }
        Command::Leads(LeadsCommand::List { status }) => {
            let leads = engine.leads().list(status).await?;
            print_json(&leads)?;
        }
        Command::Leads(LeadsCommand::Status { id, status }) => {
            let lead = engine.leads().set_status(id, status).await?;
            print_json(&lead)?;
        }
        Command::Leads(LeadsCommand::Export { output }) => {
            let leads = engine.leads().list(None).await?;
            let file = std::fs::File::create(&output)?;
            let rows = gastro_quota::core::reporting::export_leads_csv(&leads, file)?;
            tracing::info!("📁 Exported {} leads to {}", rows, output);
        }
        Command::Leads(LeadsCommand::Capture(args)) => {
            let lead = engine.leads().capture(args.into()).await?;
            print_json(&lead)?;
        }
        Command::Stats { period } => {
            let period = period.unwrap_or_else(Period::current);
            let stats = engine.stats(&period).await?;
            print_json(&stats)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> gastro_quota::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_failure(e: &QuotaError) -> ExitCode {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let code = match e.severity() {
        ErrorSeverity::Low => 2,
        ErrorSeverity::Medium => 3,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 5,
    };
    ExitCode::from(code)
}
