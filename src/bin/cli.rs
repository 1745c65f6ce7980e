//! sppterm CLI - Command-line interface
//!
//! Interactive terminal for Bluetooth SPP devices, plus helpers for the hex
//! and caret codecs, known devices and the config file.

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use crossbeam_channel::{Receiver, TryRecvError};
use sppterm_core::cli::{init_logging, print_exit_codes, CliResult, ExitCodes};
use sppterm_core::config::{self, AppConfig, ConfigError, ConnectionSettings, LineEnding};
use sppterm_core::core::bluetooth::{parse_mac_address, BluetoothDevice, RfcommConfig};
use sppterm_core::core::codec::{
    decode_hex, hexdump, to_caret_string, to_caret_string_prefix, Codec, HexCodec,
};
use sppterm_core::core::session::Session;
use sppterm_core::core::socket::SocketConfig;
use sppterm_core::core::terminal::{LinkStatus, Span, SpanStyle, Terminal};
use sppterm_core::core::transport::{
    create_transport, list_ports, SerialConfig, SerialFlowControl, TcpConfig, Transport, TransportError,
};
use std::cell::RefCell;
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// CLI output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON lines for scripting
    Json,
}

/// Flow control for `--serial`
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Flow {
    /// No flow control
    None,
    /// RTS/CTS
    Hw,
    /// XON/XOFF
    Sw,
}

impl From<Flow> for SerialFlowControl {
    fn from(flow: Flow) -> Self {
        match flow {
            Flow::None => Self::None,
            Flow::Hw => Self::Hardware,
            Flow::Sw => Self::Software,
        }
    }
}

/// sppterm CLI
#[derive(Parser, Debug)]
#[command(
    name = "sppterm",
    version,
    about = "Serial terminal for Bluetooth SPP devices",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "SPPTERM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open an interactive terminal
    Connect(ConnectArgs),

    /// Encode text as hex
    Encode {
        /// Text to encode
        text: String,

        /// Separator between bytes
        #[arg(short, long, default_value = " ")]
        separator: String,
    },

    /// Decode hex to bytes
    Decode {
        /// Hex digits, whitespace ignored
        hex: String,

        /// Print a hex dump instead of the raw bytes
        #[arg(short, long)]
        dump: bool,
    },

    /// Show control characters of stdin in caret notation
    Caret {
        /// Only convert the first N bytes
        #[arg(short, long)]
        limit: Option<usize>,

        /// Show line feeds as ^J too
        #[arg(long)]
        no_newline: bool,
    },

    /// List known devices and serial ports
    Devices,

    /// Add or rename a known device
    Remember {
        /// Bluetooth address (AA:BB:CC:DD:EE:FF)
        address: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print the exit code table
    ExitCodes,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["address", "tcp", "serial"])))]
struct ConnectArgs {
    /// Bluetooth address or known device name (RFCOMM)
    #[arg(short, long)]
    address: Option<String>,

    /// TCP target as host:port
    #[arg(long)]
    tcp: Option<String>,

    /// Serial device, e.g. /dev/rfcomm0
    #[arg(long)]
    serial: Option<String>,

    /// RFCOMM channel
    #[arg(long)]
    channel: Option<u8>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Serial flow control
    #[arg(long, value_enum, default_value_t = Flow::None)]
    flow: Flow,

    /// Send and display hex
    #[arg(long)]
    hex: bool,

    /// Line ending (cr, lf, crlf, none)
    #[arg(long)]
    newline: Option<LineEnding>,

    /// Prefix output lines with the time
    #[arg(long)]
    timestamps: bool,

    /// Disconnect after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print the effective configuration
    Show,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => return report(&cli, CliResult::from(e)),
    };

    let _guard = match init_logging(&config.logging, cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {e}");
            None
        }
    };

    let result = run(&cli, config).unwrap_or_else(into_cli_result);
    report(&cli, result)
}

fn report(cli: &Cli, result: CliResult) -> ExitCode {
    match (&result, result.message()) {
        (CliResult::Error(..), Some(msg)) => eprintln!("Error: {msg}"),
        (CliResult::Success(_), Some(msg)) if !cli.quiet => eprintln!("{msg}"),
        _ => {}
    }
    result.to_exit_code()
}

fn into_cli_result(err: anyhow::Error) -> CliResult {
    let err = match err.downcast::<TransportError>() {
        Ok(e) => return e.into(),
        Err(err) => err,
    };
    let err = match err.downcast::<ConfigError>() {
        Ok(e) => return e.into(),
        Err(err) => err,
    };
    match err.downcast::<io::Error>() {
        Ok(e) => e.into(),
        Err(err) => CliResult::error(ExitCodes::ERROR, format!("{err:#}")),
    }
}

fn config_path(cli: &Cli) -> Result<PathBuf, ConfigError> {
    cli.config.clone().or_else(config::config_path).ok_or(ConfigError::NoConfigDir)
}

fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    AppConfig::load_from(&config_path(cli)?)
}

fn run(cli: &Cli, config: AppConfig) -> anyhow::Result<CliResult> {
    match &cli.command {
        Commands::Connect(args) => connect(cli, config, args),
        Commands::Encode { text, separator } => {
            println!("{}", HexCodec::delimited(separator).encode(text.as_bytes()));
            Ok(CliResult::success())
        }
        Commands::Decode { hex, dump } => {
            let bytes = decode_hex(hex);
            if *dump {
                print!("{}", hexdump(&bytes, 16));
            } else {
                let mut stdout = io::stdout().lock();
                stdout.write_all(&bytes)?;
                stdout.flush()?;
            }
            Ok(CliResult::success())
        }
        Commands::Caret { limit, no_newline } => caret(*limit, !*no_newline),
        Commands::Devices => devices(cli, &config),
        Commands::Remember { address, name } => {
            parse_mac_address(address)?;
            let mut config = config;
            let mut device = BluetoothDevice::new(address);
            if let Some(name) = name {
                device = device.with_name(name);
            }
            config.remember_device(device);
            config.save_to(&config_path(cli)?)?;
            Ok(CliResult::success_with_message(format!("Saved {address}")))
        }
        Commands::Config { action } => handle_config(cli, &config, action),
        Commands::ExitCodes => {
            print_exit_codes();
            Ok(CliResult::success())
        }
    }
}

fn caret(limit: Option<usize>, keep_newline: bool) -> anyhow::Result<CliResult> {
    let mut input = Vec::new();
    io::stdin().lock().read_to_end(&mut input)?;
    let text = String::from_utf8_lossy(&input);

    let encoded = match limit {
        Some(len) => match to_caret_string_prefix(&text, keep_newline, len.min(text.len())) {
            Ok(encoded) => encoded,
            Err(e) => return Ok(CliResult::error(ExitCodes::INVALID_ARGS, e.to_string())),
        },
        None => to_caret_string(&text, keep_newline),
    };
    print!("{}", encoded.as_str());
    Ok(CliResult::success())
}

fn devices(cli: &Cli, config: &AppConfig) -> anyhow::Result<CliResult> {
    let known = config.sorted_devices();
    let ports = list_ports().unwrap_or_else(|e| {
        tracing::warn!("Could not list serial ports: {}", e);
        Vec::new()
    });

    match cli.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "devices": known,
                "ports": ports.iter().map(|p| p.port_name.clone()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Known devices:");
            if known.is_empty() {
                println!("  (none)");
            }
            for device in &known {
                println!("  {:<24} {}", device.display_name(), device.address);
            }
            println!("Serial ports:");
            if ports.is_empty() {
                println!("  (none)");
            }
            for port in &ports {
                println!("  {}", port.port_name);
            }
        }
    }
    Ok(CliResult::success())
}

fn handle_config(cli: &Cli, config: &AppConfig, action: &ConfigAction) -> anyhow::Result<CliResult> {
    let path = config_path(cli)?;
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Show => print!("{}", toml::to_string_pretty(config)?),
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Ok(CliResult::error(
                    ExitCodes::CONFIG_ERROR,
                    format!("{} exists, use --force to overwrite", path.display()),
                ));
            }
            if cli.config.is_none() {
                config::init_directories()?;
            }
            AppConfig::default().save_to(&path)?;
            return Ok(CliResult::success_with_message(format!("Wrote {}", path.display())));
        }
    }
    Ok(CliResult::success())
}

/// Resolve the connect target. `--address` also accepts a known device name.
fn select_transport(
    args: &ConnectArgs,
    config: &AppConfig,
) -> Result<(Transport, Option<BluetoothDevice>), TransportError> {
    let settings: &ConnectionSettings = &config.connection;

    if let Some(target) = &args.address {
        let device = config
            .devices
            .iter()
            .find(|d| d.known_name() == Some(target.as_str()))
            .cloned()
            .unwrap_or_else(|| BluetoothDevice::new(target));
        parse_mac_address(&device.address)?;
        let channel = args.channel.unwrap_or(settings.rfcomm_channel);
        let rfcomm = RfcommConfig::new(&device.address).channel(channel);
        return Ok((Transport::Rfcomm(rfcomm), Some(device)));
    }

    if let Some(target) = &args.tcp {
        let tcp = TcpConfig::parse(target)
            .ok_or_else(|| TransportError::InvalidAddress(target.clone()))?
            .timeout(settings.connect_timeout_secs);
        return Ok((Transport::Tcp(tcp), None));
    }

    match &args.serial {
        Some(port) => {
            let baud = args.baud.unwrap_or(settings.serial_baud_rate);
            let serial = SerialConfig::new(port, baud).flow_control(args.flow.into());
            Ok((Transport::Serial(serial), None))
        }
        None => Err(TransportError::InvalidAddress(String::new())),
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let spawned = std::thread::Builder::new()
        .name("sppterm-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!("No input thread: {}", e);
    }
    rx
}

fn connect(cli: &Cli, mut config: AppConfig, args: &ConnectArgs) -> anyhow::Result<CliResult> {
    let (transport, device) = select_transport(args, &config)?;

    let mut terminal_config = config.terminal.clone();
    terminal_config.hex_mode |= args.hex;
    terminal_config.show_timestamps |= args.timestamps;
    if let Some(newline) = args.newline {
        terminal_config.newline = newline;
    }

    let socket_config = SocketConfig {
        read_chunk_size: config.connection.read_chunk_size,
    };
    let (session, mut delivery) = Session::with_config(socket_config);
    let terminal = Rc::new(RefCell::new(Terminal::new(session.clone(), &terminal_config)));
    delivery.attach(Box::new(Rc::clone(&terminal)));

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let signal = session.signal().clone();
        let cancelled = Arc::clone(&cancelled);
        ctrlc::set_handler(move || {
            cancelled.store(true, Ordering::SeqCst);
            signal.fire();
        })?;
    }

    let mut out = SpanWriter::new(cli, terminal_config.show_timestamps);
    let deadline = args.timeout.map(|secs| Instant::now() + Duration::from_secs(secs));
    let input = spawn_stdin_reader();
    let mut input_open = true;
    let mut was_connected = false;

    let started = terminal.borrow_mut().connect(create_transport(transport));
    out.write(terminal.borrow_mut().take_output())?;
    if let Err(e) = started {
        return Ok(e.into());
    }

    loop {
        delivery.run_timeout(Duration::from_millis(50));

        let status = {
            let mut term = terminal.borrow_mut();
            out.write(term.take_output())?;
            term.status()
        };
        match status {
            LinkStatus::Connected => was_connected = true,
            LinkStatus::Disconnected => break,
            LinkStatus::Pending => {}
        }

        while input_open {
            match input.try_recv() {
                Ok(line) => {
                    let mut term = terminal.borrow_mut();
                    if let Err(e) = term.send(&line) {
                        tracing::debug!("Send failed: {}", e);
                    }
                    out.write(term.take_output())?;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => input_open = false,
            }
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::info!("Timeout reached, disconnecting");
            terminal.borrow_mut().disconnect();
            delivery.run_pending();
            out.write(terminal.borrow_mut().take_output())?;
            return Ok(CliResult::success());
        }
    }

    delivery.run_pending();
    out.write(terminal.borrow_mut().take_output())?;

    if was_connected {
        if let Some(device) = device {
            config.remember_device(device);
            if let Err(e) = config_path(cli).and_then(|path| config.save_to(&path)) {
                tracing::warn!("Could not save known devices: {}", e);
            }
        }
    }

    Ok(if cancelled.load(Ordering::SeqCst) {
        CliResult::error(ExitCodes::CANCELLED, "Disconnected")
    } else if was_connected {
        CliResult::error(ExitCodes::CONNECTION_LOST, "Connection lost")
    } else {
        CliResult::error(ExitCodes::CONNECTION_FAILED, "Connection failed")
    })
}

/// Prints terminal spans to stdout, status lines to stderr
struct SpanWriter {
    format: OutputFormat,
    quiet: bool,
    timestamps: bool,
    highlight: bool,
    at_line_start: bool,
}

impl SpanWriter {
    fn new(cli: &Cli, timestamps: bool) -> Self {
        Self {
            format: cli.format,
            quiet: cli.quiet,
            timestamps,
            highlight: io::stdout().is_terminal(),
            at_line_start: true,
        }
    }

    fn write(&mut self, spans: Vec<Span>) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        for span in spans {
            match self.format {
                OutputFormat::Json => {
                    let line = serde_json::json!({
                        "time": chrono::Local::now().to_rfc3339(),
                        "style": style_name(span.style),
                        "text": span.text,
                    });
                    writeln!(stdout, "{line}")?;
                }
                OutputFormat::Text if span.style == SpanStyle::Status => {
                    if !self.quiet {
                        eprint!("-- {}", span.text);
                    }
                }
                OutputFormat::Text => self.write_text(&mut stdout, &span)?,
            }
        }
        stdout.flush()
    }

    fn write_text(&mut self, out: &mut impl Write, span: &Span) -> io::Result<()> {
        for piece in span.text.split_inclusive('\n') {
            if self.timestamps && self.at_line_start {
                write!(out, "[{}] ", chrono::Local::now().format("%H:%M:%S%.3f"))?;
            }
            match span.style {
                SpanStyle::Caret if self.highlight => write!(out, "\x1b[7m{piece}\x1b[0m")?,
                SpanStyle::Sent if self.highlight => write!(out, "\x1b[36m{piece}\x1b[0m")?,
                _ => out.write_all(piece.as_bytes())?,
            }
            self.at_line_start = piece.ends_with('\n');
        }
        Ok(())
    }
}

fn style_name(style: SpanStyle) -> &'static str {
    match style {
        SpanStyle::Status => "status",
        SpanStyle::Sent => "sent",
        SpanStyle::Received => "received",
        SpanStyle::Caret => "caret",
    }
}
