use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::{self, ConfigError};
use crate::contract::{AppRequest, InventoryRequest, JumpRequest, ListRequest};
use crate::core_service::{InventoryService, ServiceError};
use crate::inventory::{InventoryError, StaticInventory};
use crate::transport::handle_json;

pub const USAGE: &str = "usage: appshelf-core [--config PATH] [--inventory FILE] \
<sync | list [QUERY] | sections | jump LETTER | toggle ID | ignore-all | ignore-none | find ID | serve>";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{0}")]
    Usage(String),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("inventory error: {0}")]
    Inventory(#[from] InventoryError),
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sync,
    List(String),
    Sections,
    Jump(char),
    Toggle(String),
    IgnoreAll,
    IgnoreNone,
    Find(String),
    Serve,
}

impl Command {
    /// The transport request this command maps to; `None` for `serve`.
    pub fn into_request(self) -> Option<InventoryRequest> {
        let request = match self {
            Self::Sync => InventoryRequest::Sync,
            Self::List(query) => InventoryRequest::List(ListRequest { query }),
            Self::Sections => InventoryRequest::Sections,
            Self::Jump(letter) => InventoryRequest::Jump(JumpRequest { letter }),
            Self::Toggle(id) => InventoryRequest::Toggle(AppRequest { id }),
            Self::IgnoreAll => InventoryRequest::IgnoreAll,
            Self::IgnoreNone => InventoryRequest::IgnoreNone,
            Self::Find(id) => InventoryRequest::Find(AppRequest { id }),
            Self::Serve => return None,
        };
        Some(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub config_path: Option<PathBuf>,
    pub inventory_path: Option<PathBuf>,
    pub command: Command,
}

pub fn parse_cli_args(args: &[String]) -> Result<RuntimeOptions, RuntimeError> {
    let mut config_path = None;
    let mut inventory_path = None;
    let mut positional: Vec<&str> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config_path = Some(PathBuf::from(flag_value(&mut iter, "--config")?)),
            "--inventory" => {
                inventory_path = Some(PathBuf::from(flag_value(&mut iter, "--inventory")?))
            }
            flag if flag.starts_with("--") => {
                return Err(RuntimeError::Usage(format!("unknown flag '{flag}'")))
            }
            other => positional.push(other),
        }
    }

    let command = parse_command(&positional)?;
    Ok(RuntimeOptions {
        config_path,
        inventory_path,
        command,
    })
}

fn flag_value<'a>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<&'a str, RuntimeError> {
    iter.next()
        .map(String::as_str)
        .ok_or_else(|| RuntimeError::Usage(format!("{flag} requires a value")))
}

fn parse_command(positional: &[&str]) -> Result<Command, RuntimeError> {
    let (name, rest) = match positional.split_first() {
        Some((name, rest)) => (*name, rest),
        None => ("sync", &[][..]),
    };
    let single = |what: &str| -> Result<String, RuntimeError> {
        match rest {
            [value] => Ok((*value).to_string()),
            _ => Err(RuntimeError::Usage(format!("'{name}' takes exactly one {what}"))),
        }
    };

    let command = match name {
        "sync" => Command::Sync,
        "list" => Command::List(rest.join(" ")),
        "sections" => Command::Sections,
        "jump" => {
            let raw = single("letter")?;
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(letter), None) => Command::Jump(letter),
                _ => return Err(RuntimeError::Usage("jump takes a single letter".into())),
            }
        }
        "toggle" => Command::Toggle(single("app id")?),
        "ignore-all" => Command::IgnoreAll,
        "ignore-none" => Command::IgnoreNone,
        "find" => Command::Find(single("app id")?),
        "serve" => Command::Serve,
        other => return Err(RuntimeError::Usage(format!("unknown command '{other}'"))),
    };

    let takes_args = matches!(name, "list" | "jump" | "toggle" | "find");
    if !takes_args && !rest.is_empty() {
        return Err(RuntimeError::Usage(format!("'{name}' takes no arguments")));
    }
    Ok(command)
}

pub fn run_with_options(options: RuntimeOptions) -> Result<(), RuntimeError> {
    if let Err(error) = crate::logging::init() {
        eprintln!("[appshelf-core] logging disabled: {error}");
    }

    let config = config::load(options.config_path.as_deref())?;
    if !config.config_path.exists() {
        config::save(&config)?;
        info!(path = %config.config_path.display(), "wrote default config");
    }
    info!(
        config_path = %config.config_path.display(),
        cache_db_path = %config.cache_db_path.display(),
        "startup"
    );

    let service = match &options.inventory_path {
        Some(path) => {
            InventoryService::new(config, Arc::new(StaticInventory::from_json_file(path)?))?
        }
        None => InventoryService::with_desktop_inventory(config)?,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if options.command == Command::Serve {
        service.sync()?;
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            writeln!(out, "{}", handle_json(&service, &line))?;
            out.flush()?;
        }
        return Ok(());
    }

    // `find` reads the cache lazily; `sync` is the pass itself.
    if !matches!(options.command, Command::Sync | Command::Find(_)) {
        service.sync()?;
    }
    let Some(request) = options.command.into_request() else {
        return Ok(());
    };
    let response = service.handle_command(request)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&response)?)?;
    Ok(())
}
