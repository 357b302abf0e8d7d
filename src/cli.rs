use clap::Parser;
use std::path::PathBuf;

/// Export Google Search Console data from Keylime Toolbox and write it to an
/// S3 bucket.
#[derive(Parser, Debug)]
#[command(name = "keylime-export", version, about)]
pub struct Args {
    /// The S3 bucket to write data to
    pub bucket: String,

    /// A path prefix to include in the files within the bucket
    /// (e.g. data/keylime-toolbox/)
    #[arg(short, long)]
    pub path: Option<String>,

    /// The S3 region where the target bucket is. If the AWS_REGION
    /// environment variable is set, this overrides that.
    #[arg(short, long)]
    pub region: Option<String>,

    /// Read settings from a specific TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}
