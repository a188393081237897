use crate::core::LeadCapture;
use crate::domain::model::{LeadStatus, Period, Plan, Tool};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "gastro-quota")]
#[command(about = "Freemium usage limits and lead capture for GastroTools")]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines (overrides [logging] format)
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct UsageTarget {
    #[arg(long)]
    pub user: String,

    #[arg(long)]
    pub tool: Tool,

    #[arg(long, default_value = "free")]
    pub plan: Plan,

    /// Month in YYYY-MM (UTC); defaults to the current month
    #[arg(long)]
    pub period: Option<Period>,
}

impl UsageTarget {
    pub fn period(&self) -> Period {
        self.period.unwrap_or_else(Period::current)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show usage and limit for one tool
    Check(UsageTarget),

    /// Run the admission gate and record one billable unit when admitted
    Admit {
        #[command(flatten)]
        target: UsageTarget,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        company: Option<String>,
    },

    /// Show usage of every tool for a user
    Usage {
        #[arg(long)]
        user: String,

        #[arg(long, default_value = "free")]
        plan: Plan,

        #[arg(long)]
        period: Option<Period>,
    },

    /// Lead administration
    #[command(subcommand)]
    Leads(LeadsCommand),

    /// Lead and usage statistics for a month
    Stats {
        #[arg(long)]
        period: Option<Period>,
    },
}

#[derive(Debug, Subcommand)]
pub enum LeadsCommand {
    /// List leads, newest first
    List {
        #[arg(long)]
        status: Option<LeadStatus>,
    },

    /// Change the status of a lead
    Status {
        #[arg(long)]
        id: u64,

        #[arg(long)]
        status: LeadStatus,
    },

    /// Write all leads to a CSV file
    Export {
        #[arg(short, long)]
        output: String,
    },

    /// Record a lead from the contact or cross-sell form
    Capture(CaptureArgs),
}

#[derive(Debug, Args)]
pub struct CaptureArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub company: String,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub message: Option<String>,

    #[arg(long)]
    pub user: Option<String>,

    #[arg(long)]
    pub source_tool: Option<Tool>,

    #[arg(long)]
    pub target_product: Option<String>,

    #[arg(long)]
    pub demo_request: bool,
}

impl From<CaptureArgs> for LeadCapture {
    fn from(args: CaptureArgs) -> Self {
        LeadCapture {
            name: args.name,
            email: args.email,
            company: args.company,
            phone: args.phone,
            message: args.message,
            user_id: args.user,
            source_tool: args.source_tool,
            target_product: args.target_product,
            demo_request: args.demo_request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admit_command() {
        let cli = Cli::try_parse_from([
            "gastro-quota",
            "admit",
            "--user",
            "u1",
            "--tool",
            "speisekarten",
            "--period",
            "2024-03",
            "--email",
            "chef@example.de",
        ])
        .unwrap();

        match cli.command {
            Command::Admit { target, email, .. } => {
                assert_eq!(target.tool, Tool::Menus);
                assert_eq!(target.plan, Plan::Free);
                assert_eq!(target.period().to_string(), "2024-03");
                assert_eq!(email.as_deref(), Some("chef@example.de"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_malformed_period() {
        let result = Cli::try_parse_from([
            "gastro-quota",
            "check",
            "--user",
            "u1",
            "--tool",
            "menus",
            "--period",
            "2024-13",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_lead_status_command() {
        let cli = Cli::try_parse_from([
            "gastro-quota",
            "leads",
            "status",
            "--id",
            "7",
            "--status",
            "contacted",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Leads(LeadsCommand::Status {
                id: 7,
                status: LeadStatus::Contacted
            })
        ));
    }
}
