use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use washpos::application::checkout::Checkout;
use washpos::application::handoff::SessionHandoff;
use washpos::application::lifecycle::FinishOutcome;
use washpos::application::payments::PaymentDesk;
use washpos::config::EngineConfig;
use washpos::domain::booking::{FinishDecision, PaymentMethod, PaymentStatus};
use washpos::domain::customer::CustomerInfo;
use washpos::domain::ports::BookingStoreRef;
use washpos::domain::pricing::compute_totals;
use washpos::infrastructure::file_slot::FileHandoffSlot;
use washpos::infrastructure::in_memory::InMemoryBookingStore;
#[cfg(feature = "storage-rocksdb")]
use washpos::infrastructure::rocksdb::RocksDBStore;
use washpos::interfaces::csv::cart_reader::CartReader;
use washpos::interfaces::csv::receipt_writer::ReceiptWriter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Price a cart CSV without booking anything
    Quote {
        /// Cart CSV file (`service_id,name,unit_price,quantity`)
        cart: PathBuf,

        #[arg(long)]
        vip: bool,
    },
    /// Book a cart, take tenders and finish the service
    Checkout(CheckoutArgs),
    /// Read a handed-off session back, emptying the slot
    Resume {
        /// Handoff file written by `checkout --handoff`
        path: PathBuf,
    },
}

#[derive(Args)]
struct CheckoutArgs {
    /// Cart CSV file (`service_id,name,unit_price,quantity`)
    cart: PathBuf,

    #[arg(long)]
    name: String,

    #[arg(long)]
    phone: String,

    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    plate: String,

    #[arg(long)]
    vip: bool,

    #[arg(long)]
    notes: Option<String>,

    /// Amount tendered; repeat for split payments
    #[arg(long = "tender")]
    tenders: Vec<Decimal>,

    #[arg(long, default_value = "cash")]
    method: PaymentMethod,

    /// Answer to finishing with a balance outstanding
    /// (`pay-first`, `finish-and-defer`, `cancel-finish`)
    #[arg(long)]
    decision: Option<FinishDecision>,

    /// Write the session to this file for `resume`
    #[arg(long)]
    handoff: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    #[command(flatten)]
    config: EngineConfig,
}

/// Logs go to stderr so stdout carries only CSV.
///
/// `RUST_LOG` overrides the default `info,washpos=debug` filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,washpos=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_store(db_path: Option<PathBuf>) -> Result<BookingStoreRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Arc::new(RocksDBStore::open(path)?)),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryBookingStore::new()))
        }
        None => Ok(Arc::new(InMemoryBookingStore::new())),
    }
}

async fn quote(cart: PathBuf, vip: bool) -> Result<()> {
    let file = File::open(cart).into_diagnostic()?;
    let cart = CartReader::new(file).into_cart()?;
    let totals = compute_totals(&cart, vip);

    let mut writer = ReceiptWriter::new(io::stdout().lock());
    writer.write_totals(&totals)?;
    Ok(())
}

async fn checkout(args: CheckoutArgs) -> Result<()> {
    let file = File::open(&args.cart).into_diagnostic()?;
    let cart = CartReader::new(file).into_cart()?;

    let store = open_store(args.db_path)?;
    let desk = Arc::new(PaymentDesk::new(store.clone(), &args.config));
    let mut sale = Checkout::new(store, desk, args.config);

    sale.set_customer(
        CustomerInfo {
            name: args.name,
            phone: args.phone,
            email: args.email,
            vip: args.vip,
        },
        args.plate,
    );
    if let Some(notes) = args.notes {
        sale.set_notes(notes);
    }
    for line in cart.lines() {
        sale.add_line(line.clone())?;
    }

    let booking_id = sale.start().await?.booking_id();

    for amount in args.tenders {
        match sale.tender(amount, args.method).await {
            Ok(receipt) if !receipt.change.is_zero() => {
                eprintln!("Change due: {}", receipt.change);
            }
            Ok(_) => {}
            Err(e) => eprintln!("Error recording tender: {}", e),
        }
    }

    match sale.finish(None).await? {
        FinishOutcome::Finished {
            status: PaymentStatus::Paid,
        } => sale.complete_sale().await?,
        FinishOutcome::DecisionRequired { status, remaining } => match args.decision {
            Some(decision) => {
                let outcome = sale.finish(Some(decision)).await?;
                tracing::debug!(booking_id, ?outcome, "finish decision applied");
            }
            None => eprintln!(
                "Payment {}: {} outstanding; pass --decision to finish the service",
                status, remaining
            ),
        },
        _ => {}
    }

    if let Some(ledger) = sale.ledger().await {
        let mut writer = ReceiptWriter::new(io::stdout().lock());
        writer.write_ledger(&ledger)?;
    }
    eprintln!(
        "Booking {}: {} | payment {} | paid {} of {}",
        booking_id,
        sale.state(),
        sale.payment_status().await?,
        sale.paid().await,
        sale.target()
    );

    if let Some(path) = args.handoff {
        let token = SessionHandoff::serialize_session(&sale.snapshot().await, true)?;
        SessionHandoff::new(Box::new(FileHandoffSlot::new(path)))
            .hand_off(token)
            .await?;
    }
    Ok(())
}

async fn resume(path: PathBuf) -> Result<()> {
    let handoff = SessionHandoff::new(Box::new(FileHandoffSlot::new(path)));
    let session = handoff.receive().await;

    let mut writer = ReceiptWriter::new(io::stdout().lock());
    writer.write_session(&session)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Quote { cart, vip } => quote(cart, vip).await,
        Command::Checkout(args) => checkout(args).await,
        Command::Resume { path } => resume(path).await,
    }
}
