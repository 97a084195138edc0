use clap::{Args, Parser, Subcommand};
use flck::batch::{BatchOutcome, BatchRunner, ProgressEvent};
use flck::container::Header;
use flck::key::{self, Credential};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flck", version, about = "Encrypt and decrypt files into FLCK containers")]
struct Cli {
    /// Log more (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct CredentialArgs {
    /// Password (minimum 8 characters when encrypting)
    #[arg(short, long, env = "FLCK_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Key file created with `flck keygen`
    #[arg(short, long)]
    keyfile: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt files or folders to `<path>.locked`
    Encrypt {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
        #[command(flatten)]
        credential: CredentialArgs,
        /// Delete each original after it was encrypted
        #[arg(long)]
        delete: bool,
        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decrypt `.locked` files next to themselves
    Decrypt {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
        #[command(flatten)]
        credential: CredentialArgs,
        /// Delete each encrypted file after it was decrypted
        #[arg(long)]
        delete: bool,
        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a new random key file
    Keygen {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show the header of an encrypted file without decrypting it
    Inspect {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {

        // ── Encrypt ──────────────────────────────────────────────────────────
        Commands::Encrypt { inputs, credential, delete, json } => {
            let credential = resolve_credential(&credential)?;
            let outcome = runner().encrypt_all(&inputs, &credential, delete);
            report("Encrypted", &outcome, json)?;
        }

        // ── Decrypt ──────────────────────────────────────────────────────────
        Commands::Decrypt { inputs, credential, delete, json } => {
            let credential = resolve_credential(&credential)?;
            let outcome = runner().decrypt_all(&inputs, &credential, delete);
            report("Decrypted", &outcome, json)?;
        }

        // ── Keygen ───────────────────────────────────────────────────────────
        Commands::Keygen { output } => {
            let encoded = key::generate_keyfile();
            let fingerprint = key::load_from_keyfile(&encoded)?.fingerprint();
            let mut opts = OpenOptions::new();
            opts.write(true).create_new(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                opts.mode(0o600);
            }
            let mut f = opts.open(&output)
                .map_err(|e| format!("cannot create {}: {e}", output.display()))?;
            f.write_all(&encoded)?;
            f.sync_all()?;
            println!("Key file:    {}", output.display());
            println!("Fingerprint: {fingerprint}");
            println!("Keep it safe: files encrypted with it cannot be recovered without it.");
        }

        // ── Inspect ──────────────────────────────────────────────────────────
        Commands::Inspect { input } => {
            let bytes  = fs::read(&input)?;
            let header = Header::peek(&bytes)?;
            let meta   = fs::metadata(&input)?;
            let modified = meta.modified()
                .map(|t| chrono::DateTime::<chrono::Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|_| "-".into());

            println!("── FLCK Container ───────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Format version {}", flck::container::VERSION);
            println!("  Mode           {}", header.mode.name());
            if let flck::Mode::Password { salt } = header.mode {
                println!("  Salt           {}", hex::encode(salt));
            }
            println!("  Folder         {}", header.compressed);
            println!("  Original name  {}", header.original_filename);
            println!("  Payload        {} B", bytes.len() - header.encoded_len());
            println!("  File size      {} B", meta.len());
            println!("  Modified       {modified}");
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "flck=warn",
        1 => "flck=info",
        _ => "flck=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn runner() -> BatchRunner {
    let runner: BatchRunner = BatchRunner::default();
    runner.with_progress(|ev: ProgressEvent| {
        eprintln!("[{}/{}] {}", ev.current, ev.total, ev.message);
    })
}

fn resolve_credential(args: &CredentialArgs) -> Result<Credential, Box<dyn std::error::Error>> {
    match (&args.password, &args.keyfile) {
        (Some(pwd), _)     => Ok(Credential::password(pwd.clone())),
        (None, Some(path)) => Ok(Credential::keyfile(read_keyfile(path)?)),
        (None, None)       => Err("either --password or --keyfile is required".into()),
    }
}

fn read_keyfile(path: &Path) -> Result<key::Key, Box<dyn std::error::Error>> {
    let bytes = fs::read(path)
        .map_err(|e| format!("cannot read key file {}: {e}", path.display()))?;
    Ok(key::load_from_keyfile(&bytes)?)
}

fn report(verb: &str, outcome: &BatchOutcome, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        for path in &outcome.succeeded {
            println!("  {verb:<10} {}", path.display());
        }
        for (path, msg) in &outcome.failed {
            println!("  FAILED     {}: {msg}", path.display());
        }
        for (path, msg) in &outcome.warnings {
            println!("  warning    {}: {msg}", path.display());
        }
        println!("{} succeeded, {} failed", outcome.succeeded.len(), outcome.failed.len());
    }
    if outcome.failed.is_empty() {
        Ok(())
    } else {
        Err(format!("{} item(s) failed", outcome.failed.len()).into())
    }
}
