use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "vigil", about = "Vigil face recognition CLI")]
struct Cli {
    /// Talk to a daemon on the session bus instead of the system bus
    #[arg(long, global = true, env = "VIGIL_SESSION_BUS")]
    session: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll (or re-enroll) an identity from face images
    Enroll {
        /// Unique identity ID (e.g., "emp_001")
        id: String,
        /// Display name
        name: String,
        /// Face images, at least as many as the daemon's minimum sample count
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Identify the face in an image
    Identify {
        image: PathBuf,
        /// Confidence that must be exceeded for this call (default: daemon setting)
        #[arg(short, long)]
        threshold: Option<f64>,
    },
    /// Remove an enrolled identity
    Remove { id: String },
    /// Check whether an identity is enrolled
    Check { id: String },
    /// List enrolled identities
    List,
    /// Show gallery statistics
    Stats,
    /// Check whether an image is suitable for enrollment
    Validate { image: PathBuf },
    /// Set the daemon's default match threshold (clamped to 0..=1)
    Threshold { value: f64 },
}

#[zbus::proxy(
    interface = "org.vigil.Recognition1",
    default_service = "org.vigil.Recognition1",
    default_path = "/org/vigil/Recognition1"
)]
trait Recognition {
    async fn enroll(&self, identity_id: &str, name: &str, images: Vec<Vec<u8>>)
        -> zbus::Result<String>;
    async fn identify(&self, image: Vec<u8>) -> zbus::Result<String>;
    async fn identify_with_threshold(&self, image: Vec<u8>, threshold: f64)
        -> zbus::Result<String>;
    async fn remove(&self, identity_id: &str) -> zbus::Result<bool>;
    async fn is_enrolled(&self, identity_id: &str) -> zbus::Result<bool>;
    async fn stats(&self) -> zbus::Result<String>;
    async fn list_identities(&self) -> zbus::Result<String>;
    async fn validate(&self, image: Vec<u8>) -> zbus::Result<String>;
    async fn set_threshold(&self, threshold: f64) -> zbus::Result<f64>;
}

/// Read an image file and make sure it decodes before shipping it to the daemon.
fn read_image(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (width, height) = image::ImageReader::new(std::io::Cursor::new(bytes.as_slice()))
        .with_guessed_format()
        .with_context(|| format!("reading {}", path.display()))?
        .into_dimensions()
        .with_context(|| format!("{} is not a supported image", path.display()))?;
    tracing::debug!(path = %path.display(), width, height, "image loaded");
    Ok(bytes)
}

fn print_json(raw: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(raw).context("daemon returned invalid JSON")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = if cli.session {
        zbus::Connection::session().await
    } else {
        zbus::Connection::system().await
    }
    .context("connecting to D-Bus")?;
    let proxy = RecognitionProxy::new(&conn)
        .await
        .context("binding to vigild")?;

    match cli.command {
        Commands::Enroll { id, name, images } => {
            let images = images
                .iter()
                .map(|p| read_image(p))
                .collect::<Result<Vec<_>>>()?;
            println!("Enrolling {name} ({id}) from {} images...", images.len());
            let summary = proxy.enroll(&id, &name, images).await?;
            print_json(&summary)?;
        }
        Commands::Identify { image, threshold } => {
            let bytes = read_image(&image)?;
            let verdict = match threshold {
                Some(t) => proxy.identify_with_threshold(bytes, t).await?,
                None => proxy.identify(bytes).await?,
            };
            print_json(&verdict)?;
        }
        Commands::Remove { id } => {
            if proxy.remove(&id).await? {
                println!("Removed {id}");
            } else {
                println!("{id} was not enrolled");
            }
        }
        Commands::Check { id } => {
            let enrolled = proxy.is_enrolled(&id).await?;
            println!("{id}: {}", if enrolled { "enrolled" } else { "not enrolled" });
        }
        Commands::List => {
            print_json(&proxy.list_identities().await?)?;
        }
        Commands::Stats => {
            print_json(&proxy.stats().await?)?;
        }
        Commands::Validate { image } => {
            let bytes = read_image(&image)?;
            print_json(&proxy.validate(bytes).await?)?;
        }
        Commands::Threshold { value } => {
            let applied = proxy.set_threshold(value).await?;
            println!("Match threshold set to {applied}");
        }
    }

    Ok(())
}
