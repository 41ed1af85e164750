use base64::Engine;
use clap::{Parser, Subcommand};
use rand::RngCore;
use secu_core::constants::DEFAULT_DATA_DIR;
use secu_core::models::{Reimbursement, Role};
use secu_core::money::{self, GENERALIST_RATE, SPECIALIST_RATE};
use secu_core::repositories::RegisterInput;
use secu_core::{
    password_rounds_from_env_value, storage_kind_from_env_value, CoreConfig, Decimal, Services,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "secu")]
#[command(about = "Social-security administration CLI")]
struct Cli {
    /// Data directory (defaults to SECU_DATA_DIR, then "secu_data")
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a random secret suitable for JWT_SECRET
    GenerateSecret {
        /// Number of random bytes before encoding
        #[arg(long, default_value_t = 64)]
        bytes: usize,
    },
    /// Create an account holding the ADMIN and USER roles
    CreateAdmin {
        username: String,
        password: String,
    },
    /// List reimbursements awaiting processing
    ListPending,
    /// Process every pending reimbursement
    ProcessAllPending,
    /// Print reimbursement totals by status
    Stats,
    /// Print reimbursement rates, or the amounts owed for a given cost
    Rates {
        /// Consultation cost, e.g. 25.00
        #[arg(long)]
        cost: Option<Decimal>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::GenerateSecret { bytes }) => {
            if bytes < 32 {
                return Err("a signing secret needs at least 32 bytes".into());
            }
            let mut raw = vec![0u8; bytes];
            rand::thread_rng().fill_bytes(&mut raw);
            let secret = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&raw);
            println!("JWT_SECRET={}", secret);
        }
        Some(Commands::CreateAdmin { username, password }) => {
            let services = open_services(cli.data_dir)?;
            let account = services.accounts.register(RegisterInput {
                username,
                password,
                roles: vec![Role::Admin, Role::User],
                person_id: None,
            })?;
            println!("Created administrator '{}' ({})", account.username, account.id);
        }
        Some(Commands::ListPending) => {
            let services = open_services(cli.data_dir)?;
            let pending = services.reimbursements.pending()?;
            if pending.is_empty() {
                println!("No pending reimbursements.");
            } else {
                for r in &pending {
                    print_reimbursement(r);
                }
            }
        }
        Some(Commands::ProcessAllPending) => {
            let services = open_services(cli.data_dir)?;
            let processed = services.reimbursements.process_all_pending()?;
            for r in &processed {
                print_reimbursement(r);
            }
            println!("Processed {} reimbursement(s).", processed.len());
        }
        Some(Commands::Stats) => {
            let services = open_services(cli.data_dir)?;
            let stats = services.reimbursements.stats()?;
            println!("Total:     {}", stats.total);
            println!(
                "Pending:   {} ({})",
                stats.pending,
                money::format_amount(stats.pending_amount)
            );
            println!(
                "Processed: {} ({})",
                stats.processed,
                money::format_amount(stats.processed_amount)
            );
            println!("Refused:   {}", stats.refused);
        }
        Some(Commands::Rates { cost }) => match cost {
            None => {
                let percent = |rate: Decimal| money::format_percentage(rate * Decimal::ONE_HUNDRED);
                println!("Generalist: {}", percent(GENERALIST_RATE));
                println!("Specialist: {}", percent(SPECIALIST_RATE));
            }
            Some(cost) => {
                for (label, generalist) in [("Generalist", true), ("Specialist", false)] {
                    let amount = money::calculate(cost, generalist)?;
                    println!(
                        "{}: reimbursed {}, out of pocket {}",
                        label,
                        money::format_amount(amount),
                        money::format_amount(money::out_of_pocket(cost, amount))
                    );
                }
            }
        },
        None => {
            println!("Use 'secu --help' for commands");
        }
    }

    Ok(())
}

/// Opens the record store the same way the server does, from SECU_* variables.
fn open_services(data_dir: Option<PathBuf>) -> Result<Services, Box<dyn std::error::Error>> {
    let data_dir = data_dir
        .or_else(|| std::env::var("SECU_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let storage = storage_kind_from_env_value(std::env::var("SECU_STORAGE").ok())?;
    let rounds = password_rounds_from_env_value(std::env::var("SECU_PASSWORD_ROUNDS").ok())?;
    let cfg = CoreConfig::new(data_dir, storage, rounds)?;
    Ok(Services::open(Arc::new(cfg))?)
}

fn print_reimbursement(r: &Reimbursement) {
    println!(
        "ID: {}, Consultation: {}, Amount: {}, Method: {}, Status: {}, Created: {}",
        r.id,
        r.consultation_id,
        money::format_amount(r.amount),
        r.payment_method,
        r.status,
        r.created_at.format("%Y-%m-%d %H:%M")
    );
}
