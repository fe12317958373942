use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tuitionpay::application::session::PaymentSession;
use tuitionpay::application::state_machine::PaymentSnapshot;
use tuitionpay::domain::catalog::RailRegistry;
use tuitionpay::domain::payment::{BankId, EcId, PaymentStatus, ProofType, ProviderId};
use tuitionpay::domain::phone;
use tuitionpay::infrastructure::sandbox::SandboxGateway;

#[derive(Parser)]
#[command(author, version, about = "Tuition payment orchestration (sandbox gateway)")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the mobile money providers and their number prefixes
    Providers,
    /// List the banks accepting transfers
    Banks {
        /// Refresh the catalog from the gateway first
        #[arg(long)]
        sync: bool,
    },
    /// Normalize a phone number and detect or validate its provider
    Validate {
        phone: String,
        /// Validate against this provider instead of detecting one
        #[arg(long)]
        provider: Option<String>,
    },
    /// Run a mobile money payment end to end against the sandbox
    PayMobile {
        ec: String,
        phone: String,
        /// Provider id; detected from the number when omitted
        #[arg(long)]
        provider: Option<String>,
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
        #[arg(long, default_value_t = 10)]
        max_attempts: u32,
    },
    /// Open a bank transfer, optionally submit proof and validate it
    PayBank {
        ec: String,
        bank: String,
        /// Proof of transfer (reference number or receipt handle)
        #[arg(long)]
        proof: Option<String>,
        #[arg(long, default_value = "reference")]
        proof_type: String,
        /// Approve the submitted proof as the center admin would
        #[arg(long)]
        approve: bool,
    },
}

fn parse_proof_type(raw: &str) -> Result<ProofType> {
    match raw {
        "reference" => Ok(ProofType::Reference),
        "receipt" => Ok(ProofType::Receipt),
        other => Err(miette!("unknown proof type: {other} (use reference or receipt)")),
    }
}

fn print_snapshot(snapshot: &PaymentSnapshot) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(snapshot).into_diagnostic()?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let gateway = Arc::new(SandboxGateway::new());
    let registry = Arc::new(RailRegistry::new());
    let mut session = PaymentSession::new(gateway.clone(), Arc::clone(&registry));

    match cli.command {
        Command::Providers => {
            for provider in registry.providers() {
                println!(
                    "{:<14} {:<14} prefixes: {}",
                    provider.id,
                    provider.name,
                    provider.prefixes.join(", ")
                );
            }
        }
        Command::Banks { sync } => {
            if sync {
                session.sync_banks().await;
            }
            for bank in registry.banks() {
                let rib = bank.rib.as_deref().unwrap_or("-");
                println!("{:<6} {:<16} rib: {rib}", bank.id, bank.name);
            }
        }
        Command::Validate { phone, provider } => {
            let normalized = phone::normalize(&phone);
            match provider {
                Some(id) => {
                    let provider_id = ProviderId::from(id.as_str());
                    phone::validate(&phone, &provider_id, &registry).into_diagnostic()?;
                    println!("{normalized} is valid for {provider_id}");
                }
                None => match phone::detect_provider(&phone, &registry) {
                    Some(provider_id) => println!("{normalized} belongs to {provider_id}"),
                    None => return Err(miette!("no provider matches {normalized}")),
                },
            }
        }
        Command::PayMobile {
            ec,
            phone,
            provider,
            interval_ms,
            max_attempts,
        } => {
            let provider_id = match provider {
                Some(id) => ProviderId::from(id.as_str()),
                None => phone::detect_provider(&phone, &registry)
                    .ok_or_else(|| miette!("could not detect a provider for {phone}"))?,
            };

            let snapshot = session
                .initiate_mobile_money(EcId::from(ec.as_str()), provider_id, &phone)
                .await
                .into_diagnostic()?;
            print_snapshot(&snapshot)?;
            let Some(payment_id) = snapshot.payment_id().cloned() else {
                return Err(miette!("initiation failed, nothing to poll"));
            };

            session
                .start_polling(Duration::from_millis(interval_ms), max_attempts)
                .into_diagnostic()?;

            // The sandbox never confirms on its own; emulate the provider
            // push confirmation so the poller has something to observe.
            gateway
                .apply_external_status(&payment_id, PaymentStatus::Completed)
                .await
                .into_diagnostic()?;

            let settled = session.wait_for_poll().await.into_diagnostic()?;
            print_snapshot(&settled)?;
        }
        Command::PayBank {
            ec,
            bank,
            proof,
            proof_type,
            approve,
        } => {
            let snapshot = session
                .initiate_bank_transfer(EcId::from(ec.as_str()), BankId::from(bank.as_str()))
                .await
                .into_diagnostic()?;
            print_snapshot(&snapshot)?;

            if let Some(value) = proof {
                let proof_type = parse_proof_type(&proof_type)?;
                let submitted = session
                    .submit_proof(proof_type, &value)
                    .await
                    .into_diagnostic()?;
                print_snapshot(&submitted)?;

                if approve {
                    let payment_id = submitted
                        .payment_id()
                        .cloned()
                        .ok_or_else(|| miette!("no payment to validate"))?;
                    // The session stays at pending_validation; completion of
                    // the bank rail reaches the client over a separate
                    // notification path. Print the gateway's view instead.
                    let validated = gateway
                        .validate_bank_payment(&payment_id, true, "validated from cli")
                        .await
                        .into_diagnostic()?;
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&validated).into_diagnostic()?
                    );
                }
            }
        }
    }

    Ok(())
}
