use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "safe-zones")]
#[command(about = "Manage weather alert zone subscriptions by postal code")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Data directory holding zones/ and profiles/ (overrides the config file)
    #[arg(long)]
    pub data_dir: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub action: CliAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliAction {
    /// Subscribe a user to the zone covering a postal code
    Create {
        #[arg(long)]
        user: String,
        #[arg(long)]
        zip: String,
    },
    /// Unsubscribe a user from the zone covering a postal code
    Remove {
        #[arg(long)]
        user: String,
        #[arg(long)]
        zip: String,
    },
    /// List every known zone as JSON
    Zones,
}

impl CliAction {
    pub fn command_parts(&self) -> Option<(&'static str, &str, &str)> {
        match self {
            CliAction::Create { user, zip } => Some(("create", user.as_str(), zip.as_str())),
            CliAction::Remove { user, zip } => Some(("remove", user.as_str(), zip.as_str())),
            CliAction::Zones => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create() {
        let config =
            CliConfig::try_parse_from(["safe-zones", "create", "--user", "u1", "--zip", "43215"])
                .unwrap();
        assert_eq!(
            config.action.command_parts(),
            Some(("create", "u1", "43215"))
        );
        assert!(!config.verbose);
    }

    #[test]
    fn test_parse_zones_with_overrides() {
        let config = CliConfig::try_parse_from([
            "safe-zones",
            "--config",
            "zones.toml",
            "--data-dir",
            "/tmp/zones",
            "-v",
            "zones",
        ])
        .unwrap();
        assert_eq!(config.config.as_deref(), Some("zones.toml"));
        assert_eq!(config.data_dir.as_deref(), Some("/tmp/zones"));
        assert!(config.verbose);
        assert!(config.action.command_parts().is_none());
    }
}
