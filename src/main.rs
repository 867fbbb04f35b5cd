//! viera - command-line remote control for Panasonic Viera TVs.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use viera_client::{ClientBuilder, Credentials, Key, RemoteControl};

/// Subcommand to run.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Pair,
    Key(String),
    /// Print the volume, or set it.
    Volume(Option<u8>),
    Mute(Option<bool>),
    Apps,
    Launch(String),
    Info,
}

/// Command-line arguments
#[derive(Debug, Default)]
struct Args {
    debug: bool,
    host: Option<String>,
    port: Option<u16>,
    app_id: Option<String>,
    encryption_key: Option<String>,
    /// Name shown on the TV while pairing
    name: Option<String>,
    command: Option<Command>,
}

fn parse_args(argv: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    let mut iter = argv.into_iter();
    let mut positional = Vec::new();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--debug" | "-d" => args.debug = true,
            "--host" | "-H" => args.host = Some(value(&mut iter, &arg)?),
            "--port" | "-p" => {
                let port = value(&mut iter, &arg)?;
                args.port = Some(port.parse().with_context(|| format!("invalid port: {}", port))?);
            }
            "--app-id" => args.app_id = Some(value(&mut iter, &arg)?),
            "--encryption-key" => args.encryption_key = Some(value(&mut iter, &arg)?),
            "--name" => args.name = Some(value(&mut iter, &arg)?),
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            flag if flag.starts_with('-') && flag.len() > 1 => bail!("Unknown argument: {}", flag),
            _ => positional.push(arg),
        }
    }

    args.command = parse_command(&positional)?;
    Ok(args)
}

fn value(iter: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    iter.next().ok_or_else(|| anyhow!("{} requires a value", flag))
}

fn parse_command(words: &[String]) -> Result<Option<Command>> {
    let Some((name, rest)) = words.split_first() else {
        return Ok(None);
    };
    let arg = rest.first().map(String::as_str);
    if rest.len() > 1 {
        bail!("too many arguments for {}", name);
    }

    let command = match (name.as_str(), arg) {
        ("pair", None) => Command::Pair,
        ("key", Some(key)) => Command::Key(key.to_string()),
        ("volume", None) => Command::Volume(None),
        ("volume", Some(level)) => {
            let level: u8 = level
                .parse()
                .ok()
                .filter(|l| *l <= 100)
                .ok_or_else(|| anyhow!("volume must be 0-100, got {}", level))?;
            Command::Volume(Some(level))
        }
        ("mute", None) => Command::Mute(None),
        ("mute", Some("on")) => Command::Mute(Some(true)),
        ("mute", Some("off")) => Command::Mute(Some(false)),
        ("apps", None) => Command::Apps,
        ("launch", Some(id)) => Command::Launch(id.to_string()),
        ("info", None) => Command::Info,
        _ => bail!("invalid command: {}", words.join(" ")),
    };
    Ok(Some(command))
}

fn print_help() {
    println!("viera - remote control for Panasonic Viera TVs");
    println!();
    println!("Usage: viera [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  pair                 Pair with the TV using the PIN it displays");
    println!("  key <NAME|CODE>      Press a remote key (e.g. volume_up, NRC_POWER-ONOFF)");
    println!("  volume [0-100]       Show or set the volume");
    println!("  mute [on|off]        Show or set mute");
    println!("  apps                 List installed apps");
    println!("  launch <ID>          Launch an app by product id");
    println!("  info                 Show device information");
    println!();
    println!("Options:");
    println!("  -H, --host HOST          TV address (env: VIERA_HOST)");
    println!("  -p, --port PORT          Control port (default: 55000)");
    println!("      --app-id ID          Stored app id (env: VIERA_APP_ID)");
    println!("      --encryption-key KEY Stored encryption key (env: VIERA_ENCRYPTION_KEY)");
    println!("      --name NAME          Name shown on the TV while pairing");
    println!("  -d, --debug              Enable debug logging");
    println!("  -h, --help               Show this help message");
}

fn setup_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .with_writer(io::stderr)
        .init();
}

fn print_credentials(credentials: &Credentials) {
    println!("VIERA_APP_ID={}", credentials.app_id);
    println!("VIERA_ENCRYPTION_KEY={}", credentials.encryption_key);
}

/// Flag value, falling back to an environment variable.
fn setting(flag: Option<String>, var: &str) -> Option<String> {
    flag.or_else(|| std::env::var(var).ok().filter(|v| !v.is_empty()))
}

async fn connect(args: &mut Args) -> Result<RemoteControl> {
    let host = setting(args.host.take(), "VIERA_HOST")
        .ok_or_else(|| anyhow!("no TV address; pass --host or set VIERA_HOST"))?;

    let mut builder = ClientBuilder::new(host);
    if let Some(port) = args.port {
        builder = builder.port(port);
    }
    let app_id = setting(args.app_id.take(), "VIERA_APP_ID");
    let encryption_key = setting(args.encryption_key.take(), "VIERA_ENCRYPTION_KEY");
    if let (Some(app_id), Some(key)) = (app_id, encryption_key) {
        builder = builder.credentials(app_id, key);
    }

    Ok(builder.connect().await?)
}

async fn prompt_pin() -> Result<String> {
    tokio::task::spawn_blocking(|| -> Result<String> {
        print!("Enter the PIN shown on the TV: ");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    })
    .await?
}

async fn run(remote: &mut RemoteControl, command: Command, name: Option<&str>) -> Result<()> {
    match command {
        Command::Pair => {
            remote.request_pin_code(name).await?;
            let pin = prompt_pin().await?;
            let result = remote.authorize_pin_code(&pin).await;
            // The TV keeps the pairing once the PIN is accepted, even if the
            // session step after it failed.
            if let Some(credentials) = remote.credentials() {
                print_credentials(&credentials);
            }
            result?;
            info!("Pairing complete");
        }
        Command::Key(key) => match key.parse::<Key>() {
            Ok(key) => remote.send_key(key).await?,
            Err(_) if key.starts_with("NRC_") => remote.send_key_code(&key).await?,
            Err(e) => return Err(e.into()),
        },
        Command::Volume(None) => println!("{}", remote.get_volume().await?),
        Command::Volume(Some(level)) => remote.set_volume(level).await?,
        Command::Mute(None) => {
            println!("{}", if remote.get_mute().await? { "on" } else { "off" })
        }
        Command::Mute(Some(mute)) => remote.set_mute(mute).await?,
        Command::Apps => {
            for app in remote.get_apps().await? {
                println!("{}\t{}", app.product_id, app.name);
            }
        }
        Command::Launch(id) => remote.launch_app(&id).await?,
        Command::Info => {
            let info = remote.get_device_info().await?;
            let fields = [
                ("Name", info.friendly_name),
                ("Manufacturer", info.manufacturer),
                ("Model", info.model_name),
                ("Model number", info.model_number),
                ("UDN", info.udn),
            ];
            for (label, value) in fields {
                println!("{:<14}{}", label, value.as_deref().unwrap_or("-"));
            }
            println!("{:<14}{:?}", "Encryption", remote.encryption());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    setup_logging(args.debug);

    let Some(command) = args.command.take() else {
        print_help();
        std::process::exit(1);
    };

    let mut remote = connect(&mut args).await?;
    run(&mut remote, command, args.name.as_deref()).await
}
