use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use telterm_telnet::ReconnectPolicy;
use telterm_telnet::DEFAULT_PORT;

use crate::config::ClientConfig;
use crate::config::ConfigError;

const LONG_ABOUT: &str = r#"telterm is a telnet client with a VT100/ANSI virtual screen.

It negotiates the telnet options a BBS or MUD expects (terminal type, window
size, echo, suppress-go-ahead), decodes the CP437 escape-sequence stream into
a character grid and prints the resulting screen.

MODES:
    connect   Live session. Lines typed on stdin are sent to the host.
              When the session ends the screen history is printed.
    replay    Offline. Decodes a raw capture, telnet negotiation included.

ENVIRONMENT:
    TELTERM_COLS, TELTERM_ROWS     Screen size (default 80x24)
    TELTERM_ENCODING               Codepage label (default cp437)
    TELTERM_TERMINAL_TYPE          Name sent for TERMINAL-TYPE (default ANSI)
    TELTERM_SCROLLBACK             Scrollback lines (default 500)
    TELTERM_RETRY_PAUSE            Seconds between connect attempts (default 5)
    TELTERM_MAX_ATTEMPTS           Connect attempts, 0 for unlimited (default 5)
    TELTERM_SAVE_CURSOR            Honor ESC 7 / ESC 8 and CSI s / CSI u
    TELTERM_LOG                    Write logs to this file instead of stderr

EXAMPLES:
    telterm connect bbs.example.org
    telterm connect bbs.example.org 2323 --retry --retry-dropped
    telterm replay session.cap --history
    telterm --encoding ibm866 replay session.cap --ansi"#;

#[derive(Debug, Parser)]
#[command(name = "telterm")]
#[command(author, version)]
#[command(about = "Telnet client with a VT100/ANSI virtual screen")]
#[command(long_about = LONG_ABOUT)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Screen width in columns
    #[arg(long, global = true)]
    pub cols: Option<u16>,

    /// Screen height in rows
    #[arg(long, global = true)]
    pub rows: Option<u16>,

    /// Codepage label, e.g. cp437, latin1, ibm866, windows-1252
    #[arg(short, long, global = true)]
    pub encoding: Option<String>,

    /// Name reported for the TERMINAL-TYPE option
    #[arg(long, global = true)]
    pub terminal_type: Option<String>,

    /// Number of scrolled-off lines to keep
    #[arg(long, global = true)]
    pub scrollback: Option<usize>,

    /// Honor save/restore cursor sequences
    #[arg(long, global = true)]
    pub save_cursor: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Disable colored output (also respects NO_COLOR env var)
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,
}

impl Cli {
    /// Environment configuration with command-line overrides applied.
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        self.apply(ClientConfig::from_env()?)
    }

    pub fn apply(&self, mut config: ClientConfig) -> Result<ClientConfig, ConfigError> {
        if self.cols.is_some() || self.rows.is_some() {
            let cols = self.cols.unwrap_or(config.cols);
            let rows = self.rows.unwrap_or(config.rows);
            config = config.with_size(cols, rows);
        }
        if let Some(encoding) = &self.encoding {
            config = config.with_encoding(encoding.clone());
        }
        if let Some(terminal_type) = &self.terminal_type {
            config = config.with_terminal_type(terminal_type.clone());
        }
        if let Some(scrollback) = self.scrollback {
            config = config.with_scrollback(scrollback);
        }
        if self.save_cursor {
            config = config.with_save_restore_cursor(true);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Open a live telnet session
    #[command(long_about = r#"Open a live telnet session.

Lines read from stdin are encoded with the session codepage and sent with
CR LF once the link is up. End of input stops forwarding; the session runs
until the host closes the connection or Ctrl-C is pressed. The screen
history is printed on exit.

Without --retry a failed connect is final. With --retry the client waits
--retry-pause seconds between attempts and gives up after --max-attempts.
--retry-dropped reconnects when an established connection is lost.

EXAMPLES:
    telterm connect bbs.example.org
    telterm connect 10.0.0.5 2323 --retry --max-attempts 0
    echo "guest" | telterm connect mud.example.org 4000 --ansi"#)]
    Connect(ConnectArgs),

    /// Decode a captured raw session
    #[command(long_about = r#"Decode a captured raw session.

The file is read as the bytes a server sent, telnet negotiation included.
Negotiation replies that a live client would send are logged at debug level.

EXAMPLES:
    telterm replay session.cap
    telterm replay session.cap --history
    telterm --encoding latin1 replay session.cap --ansi"#)]
    Replay(ReplayArgs),
}

#[derive(Debug, Args)]
pub struct ConnectArgs {
    /// Host name or IP address
    pub host: String,

    /// TCP port
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Keep trying when the first connect fails
    #[arg(long)]
    pub retry: bool,

    /// Reconnect when an established connection drops
    #[arg(long)]
    pub retry_dropped: bool,

    /// Connect attempts before giving up, 0 for unlimited
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long)]
    pub retry_pause: Option<u64>,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl ConnectArgs {
    pub fn policy(&self, config: &ClientConfig) -> ReconnectPolicy {
        let pause = self
            .retry_pause
            .map(Duration::from_secs)
            .unwrap_or(config.retry_pause);
        ReconnectPolicy::default()
            .with_retry_on_initial_failure(self.retry)
            .with_retry_on_dropped_connection(self.retry_dropped)
            .with_max_attempts(self.max_attempts.unwrap_or(config.max_attempts))
            .with_retry_pause(pause)
    }
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Capture file
    pub file: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Clone, Copy, Default, Args)]
pub struct OutputArgs {
    /// Print scrollback followed by the screen
    #[arg(long)]
    pub history: bool,

    /// Print colors as ANSI escape sequences
    #[arg(long)]
    pub ansi: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_connect_defaults() {
        let cli = Cli::parse_from(["telterm", "connect", "bbs.example.org"]);
        let Commands::Connect(args) = cli.command else {
            panic!("expected connect");
        };
        assert_eq!(args.host, "bbs.example.org");
        assert_eq!(args.port, 23);
        assert!(!args.retry);
        assert!(!args.retry_dropped);
        assert!(!args.output.history);

        let policy = args.policy(&ClientConfig::default());
        assert!(!policy.retry_on_initial_failure);
        assert!(!policy.retry_on_dropped_connection);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.retry_pause, Duration::from_secs(5));
    }

    #[test]
    fn test_connect_retry_flags() {
        let cli = Cli::parse_from([
            "telterm",
            "connect",
            "10.0.0.5",
            "2323",
            "--retry",
            "--retry-dropped",
            "--max-attempts",
            "0",
            "--retry-pause",
            "2",
        ]);
        let Commands::Connect(args) = cli.command else {
            panic!("expected connect");
        };
        assert_eq!(args.port, 2323);
        let policy = args.policy(&ClientConfig::default());
        assert!(policy.retry_on_initial_failure);
        assert!(policy.retry_on_dropped_connection);
        assert_eq!(policy.max_attempts, 0);
        assert_eq!(policy.retry_pause, Duration::from_secs(2));
    }

    #[test]
    fn test_policy_falls_back_to_config() {
        let cli = Cli::parse_from(["telterm", "connect", "h", "--retry"]);
        let Commands::Connect(args) = cli.command else {
            panic!("expected connect");
        };
        let config = ClientConfig::default()
            .with_max_attempts(9)
            .with_retry_pause(Duration::from_secs(30));
        let policy = args.policy(&config);
        assert_eq!(policy.max_attempts, 9);
        assert_eq!(policy.retry_pause, Duration::from_secs(30));
    }

    #[test]
    fn test_global_args_override_config() {
        let cli = Cli::parse_from([
            "telterm",
            "replay",
            "cap.bin",
            "--cols",
            "132",
            "--encoding",
            "latin1",
            "--terminal-type",
            "VT100",
            "--save-cursor",
            "--ansi",
        ]);
        let config = cli.apply(ClientConfig::default()).unwrap();
        assert_eq!((config.cols, config.rows), (132, 24));
        assert_eq!(config.encoding, "latin1");
        assert_eq!(config.terminal_type, "VT100");
        assert!(config.save_restore_cursor);
        let Commands::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        assert!(args.output.ansi);
        assert_eq!(args.file, PathBuf::from("cap.bin"));
    }

    #[test]
    fn test_out_of_range_override_rejected() {
        let cli = Cli::parse_from(["telterm", "--rows", "2", "replay", "cap.bin"]);
        assert!(matches!(
            cli.apply(ClientConfig::default()),
            Err(ConfigError::OutOfRange { name: "rows", .. })
        ));
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(Cli::try_parse_from(["telterm", "connect", "h", "70000"]).is_err());
    }
}
