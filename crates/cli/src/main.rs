use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{Parser, Subcommand};
use examquote_core::{
    build_quotation, format_amount, read_price_file, Cart, CatalogEntry, CatalogStore,
    CoveragePercent, ExamCode, ExceptionSet, HistoryLog, InsurerLogos, JsonStore, Role,
    UserStore, PARTICULAR,
};

#[derive(Parser)]
#[command(name = "examquote")]
#[command(about = "Medical exam quoting system CLI")]
struct Cli {
    /// Data directory for persisted state (defaults to EXAMQUOTE_DATA_DIR
    /// or ./examquote_data)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a CSV price file as a new catalog
    Ingest {
        /// Path to the CSV price file
        file: PathBuf,
        /// Name for the new catalog
        name: String,
        /// Optional logo image file, stored base64-encoded
        #[arg(long)]
        logo: Option<PathBuf>,
        /// Activate the catalog after adding it
        #[arg(long)]
        activate: bool,
    },
    /// List stored catalogs
    Catalogs,
    /// Mark the catalog at the given index as active
    Activate {
        index: usize,
    },
    /// Remove the catalog at the given index
    RemoveCatalog {
        index: usize,
    },
    /// Replace the logo of the catalog at the given index
    SetLogo {
        index: usize,
        /// Logo image file, stored base64-encoded
        logo: PathBuf,
    },
    /// Search the active catalog
    Search {
        query: String,
    },
    /// Manage coverage exceptions
    Exception {
        #[command(subcommand)]
        action: ExceptionAction,
    },
    /// Manage per-insurer logos for quotation documents
    InsurerLogo {
        #[command(subcommand)]
        action: InsurerLogoAction,
    },
    /// Build a quotation from the active catalog
    Quote {
        /// Insurer name ("Particular" for self-pay)
        #[arg(long, default_value = PARTICULAR)]
        insurer: String,
        /// Coverage percentage (clamped to 0-100)
        #[arg(long, default_value_t = 80.0)]
        coverage: f64,
        /// Client name
        #[arg(long)]
        client: String,
        /// Client identity number (cedula)
        #[arg(long)]
        cedula: String,
        /// Advisor username recorded in the history log
        #[arg(long, default_value = "advisor")]
        advisor: String,
        /// Exam items as CODE or CODE:QTY
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Print the quotation history as CSV
    History,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum ExceptionAction {
    /// List excluded exam codes
    List,
    /// Exclude an exam code from coverage
    Add { code: String },
    /// Re-enable coverage for an exam code
    Remove { code: String },
}

#[derive(Subcommand)]
enum InsurerLogoAction {
    /// List insurers with a stored logo
    List,
    /// Store or replace an insurer's logo
    Set {
        insurer: String,
        /// Logo image file, stored base64-encoded
        logo: PathBuf,
    },
    /// Remove an insurer's logo
    Remove { insurer: String },
}

#[derive(Subcommand)]
enum UserAction {
    /// List accounts
    List,
    /// Add an account
    Add {
        username: String,
        password: String,
        /// Role: admin or advisor
        #[arg(long, default_value = "advisor")]
        role: String,
    },
    /// Remove an account
    Remove { username: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.unwrap_or_else(|| {
        std::env::var("EXAMQUOTE_DATA_DIR")
            .unwrap_or_else(|_| "examquote_data".into())
            .into()
    });
    let storage = JsonStore::open(&data_dir)?;

    match cli.command {
        Some(Commands::Ingest {
            file,
            name,
            logo,
            activate,
        }) => {
            let catalog = match read_price_file(&file) {
                Ok(catalog) => catalog,
                Err(e) => {
                    eprintln!("Error ingesting price file: {}", e);
                    return Ok(());
                }
            };
            let logo = match logo {
                Some(path) => Some(BASE64.encode(std::fs::read(path)?)),
                None => None,
            };
            let mut store = CatalogStore::open(storage);
            let exams = catalog.exams.len();
            let index = store.add(CatalogEntry {
                name,
                catalog,
                logo,
            })?;
            if activate {
                store.set_active(index)?;
            }
            println!("Added catalog at index {} with {} exams", index, exams);
        }
        Some(Commands::Catalogs) => {
            let store = CatalogStore::open(storage);
            if store.is_empty() {
                println!("No catalogs stored.");
            } else {
                let active_index = store.active().map(|a| a.index);
                for (i, entry) in store.list().iter().enumerate() {
                    let marker = if Some(i) == active_index { " (active)" } else { "" };
                    println!(
                        "{}: {} — {} exams, {} insurers{}",
                        i,
                        entry.name,
                        entry.catalog.exams.len(),
                        entry.catalog.insurers.len(),
                        marker
                    );
                }
            }
        }
        Some(Commands::Activate { index }) => {
            let mut store = CatalogStore::open(storage);
            match store.set_active(index) {
                Ok(()) => println!("Activated catalog {}", index),
                Err(e) => eprintln!("Error activating catalog: {}", e),
            }
        }
        Some(Commands::RemoveCatalog { index }) => {
            let mut store = CatalogStore::open(storage);
            match store.remove(index) {
                Ok(removed) => println!("Removed catalog '{}'", removed.name),
                Err(e) => eprintln!("Error removing catalog: {}", e),
            }
        }
        Some(Commands::SetLogo { index, logo }) => {
            let mut store = CatalogStore::open(storage);
            let encoded = BASE64.encode(std::fs::read(logo)?);
            match store.replace_logo(index, Some(encoded)) {
                Ok(()) => println!("Replaced logo of catalog {}", index),
                Err(e) => eprintln!("Error replacing logo: {}", e),
            }
        }
        Some(Commands::Search { query }) => {
            let store = CatalogStore::open(storage);
            match store.active_catalog() {
                Some(catalog) => {
                    for exam in catalog.search(&query, 30) {
                        println!(
                            "{} — {} (PVP {})",
                            exam.code,
                            exam.description,
                            format_amount(exam.list_price)
                        );
                    }
                }
                None => eprintln!("No active catalog; ingest a price file first."),
            }
        }
        Some(Commands::Exception { action }) => {
            let mut exceptions = ExceptionSet::open(storage);
            match action {
                ExceptionAction::List => {
                    if exceptions.is_empty() {
                        println!("No coverage exceptions.");
                    } else {
                        for code in exceptions.list() {
                            println!("{}", code);
                        }
                    }
                }
                ExceptionAction::Add { code } => {
                    let code = ExamCode::new(&code)?;
                    exceptions.add(code.clone())?;
                    println!("Coverage disabled for {}", code);
                }
                ExceptionAction::Remove { code } => {
                    let code = ExamCode::new(&code)?;
                    exceptions.remove(&code)?;
                    println!("Coverage re-enabled for {}", code);
                }
            }
        }
        Some(Commands::InsurerLogo { action }) => {
            let mut logos = InsurerLogos::open(storage);
            match action {
                InsurerLogoAction::List => {
                    if logos.is_empty() {
                        println!("No insurer logos stored.");
                    } else {
                        for insurer in logos.insurers() {
                            println!("{}", insurer);
                        }
                    }
                }
                InsurerLogoAction::Set { insurer, logo } => {
                    let encoded = BASE64.encode(std::fs::read(logo)?);
                    logos.set(&insurer, encoded)?;
                    println!("Stored logo for {}", insurer);
                }
                InsurerLogoAction::Remove { insurer } => {
                    logos.remove(&insurer)?;
                    println!("Removed logo for {}", insurer);
                }
            }
        }
        Some(Commands::Quote {
            insurer,
            coverage,
            client,
            cedula,
            advisor,
            items,
        }) => {
            let store = CatalogStore::open(storage.clone());
            let catalog = match store.active_catalog() {
                Some(catalog) => catalog,
                None => {
                    eprintln!("No active catalog; ingest a price file first.");
                    return Ok(());
                }
            };

            let mut cart = Cart::new();
            for item in &items {
                let (code_str, quantity) = match item.split_once(':') {
                    Some((code, qty)) => (code, qty.parse::<u32>()?),
                    None => (item.as_str(), 1),
                };
                let code = ExamCode::new(code_str)?;
                let exam = match catalog.find_by_code(&code) {
                    Some(exam) => exam,
                    None => {
                        eprintln!("Exam {} not found in the active catalog", code);
                        return Ok(());
                    }
                };
                cart.add_or_increment(exam, &insurer);
                cart.set_quantity(&code, quantity);
            }

            let exceptions = ExceptionSet::open(storage.clone());
            let quotation = match build_quotation(
                &cart,
                &insurer,
                CoveragePercent::clamped(coverage),
                exceptions.codes(),
                &client,
                &cedula,
            ) {
                Ok(quotation) => quotation,
                Err(e) => {
                    eprintln!("{}", e);
                    return Ok(());
                }
            };

            println!(
                "Quotation No. {} — {} ({})",
                quotation.number, quotation.client_name, quotation.insurer
            );
            for line in &quotation.quote.lines {
                println!(
                    "  {} x{} {} — {}{}",
                    line.code,
                    line.quantity,
                    line.description,
                    format_amount(line.amount),
                    if line.used_fallback_rate { " (list price)" } else { "" }
                );
            }
            println!("Subtotal: {}", format_amount(quotation.quote.subtotal));
            println!(
                "Co-payment ({}%): {}",
                quotation.quote.copay_percent,
                format_amount(quotation.quote.copay_amount)
            );
            println!("Total: {}", format_amount(quotation.quote.total));

            let mut history = HistoryLog::open(storage);
            history.append(quotation.history_entry(&advisor))?;
        }
        Some(Commands::History) => {
            let history = HistoryLog::open(storage);
            print!("{}", history.export_csv()?);
        }
        Some(Commands::User { action }) => {
            let mut users = UserStore::open(storage);
            match action {
                UserAction::List => {
                    for (name, role) in users.list() {
                        println!("{} ({})", name, role);
                    }
                }
                UserAction::Add {
                    username,
                    password,
                    role,
                } => {
                    let role = match role.as_str() {
                        "admin" => Role::Admin,
                        _ => Role::Advisor,
                    };
                    match users.add(&username, &password, role) {
                        Ok(()) => println!("Added user {}", username),
                        Err(e) => eprintln!("Error adding user: {}", e),
                    }
                }
                UserAction::Remove { username } => match users.remove(&username) {
                    Ok(()) => println!("Removed user {}", username),
                    Err(e) => eprintln!("Error removing user: {}", e),
                },
            }
        }
        None => {
            println!("Use 'examquote --help' for commands");
        }
    }

    Ok(())
}
