use crate::scrapers::types::{ScrapeSettings, TransportMode};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Scrape recently sold houses from onthehouse.com.au, one file per suburb")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Maximum result pages per area
    #[arg(long, short = 'p', global = true, default_value_t = 5)]
    pub max_pages: u32,

    /// Skip visiting each listing's own page (faster, less data)
    #[arg(long, global = true, default_value_t = false)]
    pub no_details: bool,

    /// Show the browser window instead of running headless
    #[arg(long, global = true, default_value_t = false)]
    pub visible: bool,

    /// Directory holding one JSON file per area
    #[arg(long, short = 'o', global = true, default_value = "data/output")]
    pub output_dir: PathBuf,

    /// Destination of the `combine` command
    #[arg(long, global = true, default_value = "data/combined/brisbane_sold_properties.json")]
    pub combined_file: PathBuf,

    /// JSON object mapping area keys to postcodes (defaults to the built-in Brisbane table)
    #[arg(long, global = true)]
    pub areas_file: Option<PathBuf>,

    /// How result pages are fetched
    #[arg(long, global = true, value_enum, default_value_t = Mode::Rendered)]
    pub mode: Mode,

    /// Lower bound of the delay between page fetches, in seconds
    #[arg(long, global = true, default_value_t = 1.5)]
    pub min_delay: f64,

    /// Upper bound of the delay between page fetches, in seconds
    #[arg(long, global = true, default_value_t = 3.0)]
    pub max_delay: f64,

    /// Keep sales from the last N days
    #[arg(long, global = true, default_value_t = 90, value_parser = clap::value_parser!(i64).range(0..=36_500))]
    pub recency_days: i64,

    /// Append each page's new listings to the area file as it is scraped
    #[arg(long, global = true, default_value_t = false)]
    pub checkpoint: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape a single area, e.g. `paddington` or `st-lucia`
    Area {
        name: String,
        /// Use this postcode instead of looking the area up
        #[arg(long)]
        postcode: Option<String>,
    },
    /// Scrape every known area in turn
    All,
    /// List known areas and their postcodes
    List,
    /// Merge all area files into one deduplicated file
    Combine {
        /// Also write the combined records to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Render each search page in the browser
    Rendered,
    /// Call the search API, falling back to the browser session if blocked
    Api,
}

fn seconds(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

impl Cli {
    pub fn settings(&self) -> ScrapeSettings {
        let mut settings = ScrapeSettings {
            max_pages: self.max_pages,
            fetch_details: !self.no_details,
            headless: !self.visible,
            mode: match self.mode {
                Mode::Rendered => TransportMode::Rendered,
                Mode::Api => TransportMode::Api,
            },
            min_delay: seconds(self.min_delay),
            max_delay: seconds(self.max_delay),
            checkpoint: self.checkpoint,
            ..ScrapeSettings::default()
        };
        settings.filter.recency_days = self.recency_days;
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn area_command_with_flags() {
        let cli = Cli::parse_from([
            "sold-scout",
            "area",
            "st-lucia",
            "--postcode",
            "4067",
            "--max-pages",
            "2",
            "--no-details",
            "--mode",
            "api",
        ]);

        match &cli.command {
            Command::Area { name, postcode } => {
                assert_eq!(name, "st-lucia");
                assert_eq!(postcode.as_deref(), Some("4067"));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let settings = cli.settings();
        assert_eq!(settings.max_pages, 2);
        assert!(!settings.fetch_details);
        assert!(settings.headless);
        assert_eq!(settings.mode, TransportMode::Api);
    }

    #[test]
    fn defaults_match_settings_defaults() {
        let cli = Cli::parse_from(["sold-scout", "all"]);
        let settings = cli.settings();
        let defaults = ScrapeSettings::default();

        assert_eq!(settings.max_pages, defaults.max_pages);
        assert_eq!(settings.min_delay, defaults.min_delay);
        assert_eq!(settings.max_delay, defaults.max_delay);
        assert_eq!(settings.filter.recency_days, 90);
        assert_eq!(cli.output_dir, PathBuf::from("data/output"));
    }

    #[test]
    fn combine_takes_optional_csv_path() {
        let cli = Cli::parse_from(["sold-scout", "combine", "--csv", "out/sold.csv"]);
        match &cli.command {
            Command::Combine { csv } => assert_eq!(csv.as_deref(), Some(Path::new("out/sold.csv"))),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn recency_days_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["sold-scout", "all", "--recency-days", "100000000"]).is_err());
        assert!(Cli::try_parse_from(["sold-scout", "all", "--recency-days", "-1"]).is_err());

        let cli = Cli::try_parse_from(["sold-scout", "all", "--recency-days", "365"]).unwrap();
        assert_eq!(cli.settings().filter.recency_days, 365);
    }
}
