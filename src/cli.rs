//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Landhacker - land parcel price estimates from comparable sales
///
/// Looks up comparable acreage listings for a locality, clusters their
/// prices per acre, and projects a price for your parcel with a
/// confidence score. Markdown/JSON reports.
///
/// Examples:
///   landhacker --city Austin --zip 78701 --acres 12.5
///   landhacker --city Austin --comparables comps.json --acres 12.5 --format json
///   landhacker --city Austin --zip 78701 --acres 12.5 --user alice
///   landhacker --user alice --add-credits 500
///   landhacker --user alice --history
///   landhacker --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Locality (city) the parcel is in
    ///
    /// Used for the comparables lookup and in the report narrative.
    #[arg(long, value_name = "CITY")]
    pub city: Option<String>,

    /// ZIP code of the parcel
    ///
    /// Required when comparables are fetched from the backend.
    #[arg(long, value_name = "ZIP")]
    pub zip: Option<String>,

    /// Parcel area in acres
    ///
    /// Without it, comparables can still be listed but no price is projected.
    #[arg(long, value_name = "ACRES")]
    pub acres: Option<f64>,

    /// Street address of the parcel, used as the report subject
    #[arg(long, value_name = "ADDRESS")]
    pub address: Option<String>,

    /// Read comparables from a JSON file instead of the backend
    ///
    /// Accepts either `{"prices": [...]}` or a bare array of
    /// `{"acre", "price", "address"}` objects.
    #[arg(long, value_name = "FILE")]
    pub comparables: Option<PathBuf>,

    /// Also look up the driving distance from the parcel to this place
    #[arg(long, value_name = "PLACE")]
    pub distance_to: Option<String>,

    /// User id for credit checks and saving the query
    #[arg(short, long, value_name = "USER")]
    pub user: Option<String>,

    /// List saved queries for --user and exit
    #[arg(long, requires = "user")]
    pub history: bool,

    /// Add credits to --user's profile (creating it if needed) and exit
    #[arg(long, value_name = "CREDITS", requires = "user")]
    pub add_credits: Option<u64>,

    /// Check backend health and exit
    #[arg(long)]
    pub check_health: bool,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Backend API base URL
    #[arg(long, value_name = "URL", env = "LANDHACKER_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token for the backend API
    #[arg(long, value_name = "TOKEN", env = "LANDHACKER_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory for user profiles and saved queries
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Leave the comparables table out of the Markdown report
    #[arg(long)]
    pub no_comparables: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .landhacker.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: load comparables and list them without estimating or saving
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .landhacker.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether this run produces an estimate report.
    pub fn is_estimate_run(&self) -> bool {
        !(self.init_config || self.history || self.check_health || self.add_credits.is_some())
    }

    /// Locality name, empty if not given.
    pub fn locality(&self) -> &str {
        self.city.as_deref().unwrap_or("")
    }

    /// Subject label for the report: the address, else city and ZIP.
    pub fn subject(&self) -> String {
        if let Some(ref address) = self.address {
            return address.clone();
        }
        match (&self.city, &self.zip) {
            (Some(city), Some(zip)) => format!("{} {}", city, zip),
            (Some(city), None) => city.clone(),
            (None, Some(zip)) => zip.clone(),
            (None, None) => "Unnamed parcel".to_string(),
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.add_credits == Some(0) {
            return Err("--add-credits must be at least 1".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if !self.is_estimate_run() {
            return Ok(());
        }

        let city = self.city.as_deref().unwrap_or("").trim();
        if city.is_empty() {
            return Err("--city is required".to_string());
        }

        if let Some(acres) = self.acres {
            if !acres.is_finite() || acres <= 0.0 {
                return Err("Acres must be a positive number".to_string());
            }
        }

        match self.comparables {
            Some(ref path) => {
                if !path.is_file() {
                    return Err(format!("Comparables file does not exist: {}", path.display()));
                }
            }
            None => {
                if self.zip.as_deref().unwrap_or("").trim().is_empty() {
                    return Err(
                        "--zip is required when comparables are fetched from the backend"
                            .to_string(),
                    );
                }
            }
        }

        if self.distance_to.is_some() && self.address.is_none() {
            return Err("--distance-to requires --address".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            city: Some("Austin".to_string()),
            zip: Some("78701".to_string()),
            acres: Some(12.5),
            address: None,
            comparables: None,
            distance_to: None,
            user: None,
            history: false,
            add_credits: None,
            check_health: false,
            output: None,
            format: OutputFormat::Markdown,
            api_url: None,
            api_token: None,
            timeout: None,
            data_dir: None,
            no_comparables: false,
            config: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_valid_args() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_requires_city() {
        let mut args = make_args();
        args.city = None;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_requires_zip_for_lookup() {
        let mut args = make_args();
        args.zip = None;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_positive_acres() {
        let mut args = make_args();
        args.acres = Some(0.0);
        assert!(args.validate().is_err());

        args.acres = None;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_missing_comparables_file() {
        let mut args = make_args();
        args.comparables = Some(PathBuf::from("/nonexistent/comps.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_subject() {
        let mut args = make_args();
        assert_eq!(args.subject(), "Austin 78701");

        args.address = Some("12 Oak Rd".to_string());
        assert_eq!(args.subject(), "12 Oak Rd");
    }

    #[test]
    fn test_add_credits_is_not_an_estimate_run() {
        let mut args = make_args();
        args.city = None;
        args.user = Some("alice".to_string());
        args.add_credits = Some(500);
        assert!(!args.is_estimate_run());
        assert!(args.validate().is_ok());

        args.add_credits = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_add_credits_requires_user() {
        let result = Args::try_parse_from(["landhacker", "--add-credits", "500"]);
        assert!(result.is_err());

        let args =
            Args::try_parse_from(["landhacker", "--user", "alice", "--add-credits", "500"]).unwrap();
        assert_eq!(args.add_credits, Some(500));
    }
}
