use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Long-running daemon: discovery, polling and sync on their schedules.
    Run,
    /// One discovery pass, then exit.
    Discover,
    /// One metrics poll over known printers, then exit.
    Collect,
    /// One sync cycle, then exit.
    Sync,
    /// Register with the server (or confirm an existing registration), then exit.
    Register,
    /// Override the stored serial for a printer and flag it for re-sync.
    SetSerial { ip: String, serial: String },
}

pub struct Args {
    pub config_path: PathBuf,
    pub mode: Mode,
}

pub fn parse() -> Args {
    parse_from(std::env::args().skip(1).collect()).unwrap_or_else(|msg| {
        eprintln!("error: {msg}");
        std::process::exit(1);
    })
}

fn parse_from(argv: Vec<String>) -> Result<Args, String> {
    let mut config_path = None;
    let mut mode = Mode::Run;
    let mut args = argv.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("printwatch_agent {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| "--config requires a path argument".to_string())?;
                config_path = Some(PathBuf::from(path));
            }
            "run" => mode = Mode::Run,
            "discover" => mode = Mode::Discover,
            "collect" => mode = Mode::Collect,
            "sync" => mode = Mode::Sync,
            "register" => mode = Mode::Register,
            "set-serial" => {
                let ip = args
                    .next()
                    .ok_or_else(|| "set-serial requires <ip> <serial>".to_string())?;
                let serial = args
                    .next()
                    .ok_or_else(|| "set-serial requires <ip> <serial>".to_string())?;
                mode = Mode::SetSerial { ip, serial };
            }
            other => return Err(format!("unknown argument '{other}'")),
        }
    }

    Ok(Args {
        config_path: config_path.unwrap_or_else(|| PathBuf::from("agent.yml")),
        mode,
    })
}

fn print_help() {
    println!("Usage: printwatch_agent [OPTIONS] [COMMAND]\n");
    println!("Commands:");
    println!("  run                      Run the agent (default)");
    println!("  discover                 Scan configured subnets once and exit");
    println!("  collect                  Poll known printers once and exit");
    println!("  sync                     Run one sync cycle and exit");
    println!("  register                 Register with the server and exit");
    println!("  set-serial <ip> <serial> Override a printer's serial number");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>  Configuration file path [default: agent.yml]");
    println!("  -V, --version        Print version");
    println!("  -h, --help           Print help");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_to_run_with_default_config() {
        let args = parse_from(argv(&[])).unwrap();
        assert_eq!(args.config_path, PathBuf::from("agent.yml"));
        assert_eq!(args.mode, Mode::Run);
    }

    #[test]
    fn config_flag_and_command() {
        let args = parse_from(argv(&["--config", "/etc/printwatch/agent.yml", "discover"])).unwrap();
        assert_eq!(args.config_path, PathBuf::from("/etc/printwatch/agent.yml"));
        assert_eq!(args.mode, Mode::Discover);
    }

    #[test]
    fn set_serial_takes_two_positionals() {
        let args = parse_from(argv(&["set-serial", "192.168.1.10", "SN-42"])).unwrap();
        assert_eq!(
            args.mode,
            Mode::SetSerial {
                ip: "192.168.1.10".into(),
                serial: "SN-42".into()
            }
        );
    }

    #[test]
    fn missing_set_serial_operands_rejected() {
        assert!(parse_from(argv(&["set-serial", "192.168.1.10"])).is_err());
    }

    #[test]
    fn unknown_argument_rejected() {
        assert!(parse_from(argv(&["--wat"])).is_err());
    }
}
