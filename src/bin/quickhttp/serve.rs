use std::path;
use std::time::Duration;

use anyhow::Context as _;
use quickhttp::port::{PortRange, SearchConfig, SearchType};

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Eq, clap::Args)]
pub(crate) struct ServeArgs {
    /// Directory to serve
    #[arg(value_name = "DIR", default_value = ".")]
    pub(crate) directory: path::PathBuf,

    /// How long to stay up without a new request, e.g. `10m`, `1h30m` or `10:00`
    #[arg(
        short,
        long,
        value_name = "TIME",
        default_value = quickhttp::DEFAULT_TIME_EXPR,
        value_parser = quickhttp::parse_time_expr,
    )]
    pub(crate) time: u64,

    /// Port to serve from, skipping the search for an open one
    #[arg(short, long, value_name = "NUM")]
    pub(crate) port: Option<u16>,

    /// Address to listen on
    #[arg(long, value_name = "HOSTNAME_OR_IP", default_value = timed_serve::DEFAULT_HOSTNAME)]
    pub(crate) bind: String,

    #[command(flatten, next_help_heading = "Port Search")]
    pub(crate) search: PortSearchArgs,
}

impl ServeArgs {
    pub(crate) fn run(&self) -> Result<()> {
        check_directory(&self.directory)?;
        if self.time == 0 {
            anyhow::bail!("`--time` must be at least one second");
        }

        let port = self.resolve_port()?;

        let mut builder = timed_serve::ServerBuilder::new(&self.directory);
        builder
            .hostname(&self.bind)
            .port(port)
            .idle_timeout(Duration::from_secs(self.time));
        let server = builder.build()?;

        let interrupter = server.interrupter();
        ctrlc::set_handler(move || interrupter.interrupt())
            .context("Failed to install the Ctrl-C handler")?;

        log::info!(
            "Serving {} at http://{} for {}",
            self.directory.display(),
            server.addr(),
            quickhttp::format_duration(self.time)
        );
        log::debug!("Each request restarts the clock; Ctrl-C to stop early");

        let shutdown = server.serve();
        log::info!("{shutdown}");
        log::info!("Server closed.");

        Ok(())
    }

    /// The requested port, otherwise one found by searching
    fn resolve_port(&self) -> Result<u16> {
        // `0` asks for a search, same as leaving it out
        match self.port.filter(|port| *port != 0) {
            Some(port) => {
                log::debug!("Using port {port}, skipping search");
                Ok(port)
            }
            None => self.search.find_port(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, clap::Args)]
pub(crate) struct PortSearchArgs {
    /// Lowest port to try
    #[arg(long, value_name = "NUM", default_value_t = quickhttp::DEFAULT_PORT_RANGE_MIN)]
    pub(crate) port_range_min: u16,

    /// Highest port to try
    #[arg(long, value_name = "NUM", default_value_t = quickhttp::DEFAULT_PORT_RANGE_MAX)]
    pub(crate) port_range_max: u16,

    /// Most ports to try before giving up
    #[arg(long, value_name = "NUM", default_value_t = quickhttp::DEFAULT_PORT_MAX_TRIES)]
    pub(crate) port_max_tries: usize,

    /// Order to try ports in [possible values: sequential, random]
    #[arg(long, value_name = "TYPE", default_value_t)]
    pub(crate) port_search_type: SearchType,
}

impl PortSearchArgs {
    pub(crate) fn config(&self) -> Result<SearchConfig> {
        let range = PortRange::new(self.port_range_min, self.port_range_max)?;
        let config = SearchConfig::new(range)
            .max_tries(self.port_max_tries)
            .search_type(self.port_search_type);
        Ok(config)
    }

    fn find_port(&self) -> Result<u16> {
        let config = self.config()?;
        let port = quickhttp::find_available_port(&config)?;
        log::debug!("Found available port {port}");
        Ok(port)
    }
}

fn check_directory(dir: &path::Path) -> Result<()> {
    let metadata = std::fs::metadata(dir)
        .with_context(|| anyhow::format_err!("Cannot serve `{}`", dir.display()))?;
    if !metadata.is_dir() {
        anyhow::bail!("Cannot serve `{}`: not a directory", dir.display());
    }
    std::fs::read_dir(dir)
        .with_context(|| anyhow::format_err!("Cannot serve `{}`: not readable", dir.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;

    use super::*;

    #[derive(Debug, clap::Parser)]
    struct Cli {
        #[command(flatten)]
        serve: ServeArgs,
    }

    fn parse(args: &[&str]) -> Result<ServeArgs, clap::Error> {
        let args = std::iter::once("quickhttp").chain(args.iter().copied());
        Cli::try_parse_from(args).map(|cli| cli.serve)
    }

    #[test]
    fn defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.directory, path::PathBuf::from("."));
        assert_eq!(args.time, 600);
        assert_eq!(args.port, None);
        assert_eq!(args.bind, "0.0.0.0");
        assert_eq!(args.search.config().unwrap(), SearchConfig::default());
    }

    #[test]
    fn search_options() {
        let args = parse(&[
            "public",
            "--time",
            "1h30m",
            "--port-range-min",
            "9000",
            "--port-range-max",
            "9002",
            "--port-max-tries",
            "10",
            "--port-search-type",
            "random",
        ])
        .unwrap();
        assert_eq!(args.directory, path::PathBuf::from("public"));
        assert_eq!(args.time, 5400);

        let config = args.search.config().unwrap();
        assert_eq!(config.range, PortRange::new(9000, 9002).unwrap());
        assert_eq!(config.search_type, SearchType::Random);
        assert_eq!(config.effective_tries(), 3);
    }

    #[test]
    fn rejects_unknown_search_type() {
        let err = parse(&["--port-search-type", "spiral"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(err.to_string().contains("sequential|random"), "{err}");
    }

    #[test]
    fn rejects_bad_time() {
        let err = parse(&["--time", "soon"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn inverted_range() {
        let args = parse(&["--port-range-min", "9001", "--port-range-max", "9000"]).unwrap();
        let err = args.search.config().unwrap_err();
        assert!(err.to_string().contains("[9001, 9000]"), "{err}");
    }

    #[test]
    fn explicit_port_skips_search() {
        let args = parse(&[
            "--port",
            "8123",
            "--port-range-min",
            "9001",
            "--port-range-max",
            "9000",
        ])
        .unwrap();
        assert_eq!(args.resolve_port().unwrap(), 8123);
    }

    #[test]
    fn port_zero_searches() {
        let args = parse(&[
            "--port",
            "0",
            "--port-range-min",
            "9001",
            "--port-range-max",
            "9000",
        ])
        .unwrap();
        let err = args.resolve_port().unwrap_err();
        assert!(err.to_string().contains("[9001, 9000]"), "{err}");

        let args = parse(&["--port-range-min", "9001", "--port-range-max", "9000"]).unwrap();
        assert!(args.resolve_port().is_err());
    }

    #[test]
    fn missing_directory() {
        let dir = std::env::temp_dir().join("quickhttp-does-not-exist");
        let err = check_directory(&dir).unwrap_err();
        assert!(err.to_string().starts_with("Cannot serve"), "{err}");
    }

    #[test]
    fn file_is_not_a_directory() {
        let file = path::Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
        let err = check_directory(&file).unwrap_err();
        assert!(err.to_string().ends_with("not a directory"), "{err}");
    }
}
