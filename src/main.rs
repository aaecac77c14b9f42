use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use bucket_adapter::logging;
use bucket_adapter::storage::{
    Adapter, AdapterSettings, BackendRegistry, Expiry, DEFAULT_SIGNED_URL_EXPIRY_SECS,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use futures::io::AllowStdIo;

#[derive(Parser)]
#[command(name = "bucket-adapter")]
#[command(about = "Upload, download and sign objects in S3 or GCS buckets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (defaults to <config dir>/bucket-adapter/settings.json)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file
    Upload {
        /// Local file to upload
        local: PathBuf,

        /// Object key (defaults to the local path as given)
        #[arg(long, short = 'r')]
        remote: Option<String>,
    },
    /// Download an object
    Download {
        /// Object key
        remote: String,

        /// Local destination (defaults to the object key)
        #[arg(long, short = 'l', conflicts_with = "stdout")]
        local: Option<PathBuf>,

        /// Write the object to stdout
        #[arg(long)]
        stdout: bool,
    },
    /// Print a presigned download URL
    Sign {
        /// Object key
        remote: String,

        /// Seconds until the URL expires
        #[arg(long, short = 'e', conflicts_with = "until")]
        expires: Option<u64>,

        /// Absolute expiry time (RFC 3339)
        #[arg(long, short = 'u', value_parser = parse_rfc3339)]
        until: Option<DateTime<Utc>>,
    },
    /// Show normalized object metadata as JSON
    Blob {
        /// Object key
        remote: String,
    },
    /// Show raw object metadata
    Head {
        /// Object key
        remote: String,
    },
    /// List the registered backend names
    Backends,
}

fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 time {}: {}", value, e))
}

async fn load_settings(path: Option<PathBuf>) -> Result<AdapterSettings> {
    let path = match path {
        Some(path) => path,
        None => AdapterSettings::default_path()
            .context("cannot determine the default settings location, pass --config")?,
    };

    tracing::debug!("Loading settings from {}", path.display());
    Ok(AdapterSettings::from_path(&path).await?)
}

fn sign_expiry(expires: Option<u64>, until: Option<DateTime<Utc>>) -> Expiry {
    match (expires, until) {
        (_, Some(at)) => Expiry::At(at),
        (Some(secs), None) => Expiry::In(Duration::from_secs(secs)),
        (None, None) => Expiry::seconds(DEFAULT_SIGNED_URL_EXPIRY_SECS),
    }
}

async fn run(adapter: &Adapter, command: Commands) -> Result<()> {
    match command {
        Commands::Upload { local, remote } => {
            let url = adapter.upload(&local, remote.as_deref()).await?;
            println!("{}", url);
        }
        Commands::Download {
            remote,
            local,
            stdout,
        } => {
            if stdout {
                let mut sink = AllowStdIo::new(std::io::stdout());
                adapter.download_to_file_pointer(&remote, &mut sink).await?;
            } else {
                let status = adapter.download(&remote, local.as_deref()).await?;
                println!("{}", status.message());
            }
        }
        Commands::Sign {
            remote,
            expires,
            until,
        } => {
            let url = adapter
                .generate_signed_url_with_custom_expiry(&remote, Some(sign_expiry(expires, until)))
                .await?;
            println!("{}", url);
        }
        Commands::Blob { remote } => {
            let blob = adapter.get_blob(&remote).await?;
            println!("{}", serde_json::to_string_pretty(&blob)?);
        }
        Commands::Head { remote } => match adapter.get_head_object(&remote).await? {
            (true, Some(metadata)) => {
                println!("key:            {}", remote);
                println!("size:           {}", metadata.content_length());
                println!("content-type:   {}", metadata.content_type().unwrap_or("-"));
                println!("etag:           {}", metadata.etag().unwrap_or("-"));
                if let Some(modified) = metadata.last_modified() {
                    println!("last-modified:  {}", modified.to_rfc3339());
                }
            }
            _ => {
                println!("{} does not exist", remote);
            }
        },
        // Handled before the adapter is built
        Commands::Backends => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose)?;

    if let Commands::Backends = cli.command {
        for name in BackendRegistry::with_defaults().names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let settings = load_settings(cli.config).await?;
    let adapter = Adapter::new(settings)
        .await
        .context("cannot initialize the storage adapter")?;

    tracing::debug!("Using {} backend", adapter.backend_kind().display_name());
    run(&adapter, cli.command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sign_expiry() {
        assert_eq!(sign_expiry(None, None), Expiry::seconds(3600));
        assert_eq!(sign_expiry(Some(60), None), Expiry::seconds(60));

        let at = parse_rfc3339("2030-01-01T00:00:00Z").unwrap();
        assert_eq!(sign_expiry(None, Some(at)), Expiry::At(at));
    }

    #[test]
    fn test_parse_rfc3339_rejects_garbage() {
        assert!(parse_rfc3339("tomorrow").is_err());
    }

    #[test]
    fn test_sign_flags_conflict() {
        let result = Cli::try_parse_from([
            "bucket-adapter",
            "sign",
            "a.txt",
            "--expires",
            "60",
            "--until",
            "2030-01-01T00:00:00Z",
        ]);
        assert!(result.is_err());
    }
}
