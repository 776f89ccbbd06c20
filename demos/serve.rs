//! Loads a server configuration from `--config` (default `./config.yml`) and
//! the command line, then logs it through a context-carried logger.
//!
//! ```text
//! cargo run --example serve -- --config demos/serve.yml --server.port 9000 -d
//! ```

use std::collections::HashMap;
use std::process::ExitCode;
use std::time::Duration;

use bindery::logger::{self, Level, Logger};
use bindery::{Context, Manager};
use serde::{Deserialize, Serialize};

bindery::configurable! {
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct Server {
        pub host [name: "host", description: "Address to bind"]: String,
        pub port [name: "port", short: "p", description: "Port to listen on"]: u16,
        #[serde(with = "bindery::duration")]
        pub read_timeout [name: "read-timeout", description: "Read timeout"]: Duration,
    }
}

bindery::configurable! {
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct Settings {
        pub name [name: "name", short: "n", description: "Service name"]: String,
        pub debug [name: "debug", short: "d", description: "Enable debug logging"]: bool,
        pub server [name: "server"]: Server,
        #[serde(default)]
        pub origins [name: "origins", description: "Allowed origins"]: Vec<String>,
        #[serde(default)]
        pub labels [name: "labels", description: "Static labels"]: HashMap<String, String>,
    }
}

fn load(settings: &mut Settings) -> Result<(), bindery::Error> {
    let mut manager = Manager::new(settings)?;
    manager.parse_args(std::env::args_os())?;
    manager.parse_configuration()?;
    Ok(())
}

fn main() -> ExitCode {
    let mut settings = Settings {
        name: "serve".to_string(),
        server: Server {
            host: "127.0.0.1".to_string(),
            port: 8080,
            read_timeout: Duration::from_secs(5),
        },
        ..Default::default()
    };

    if let Err(err) = load(&mut settings) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    let level = if settings.debug { Level::Debug } else { Level::Info };
    let ctx = logger::new_context(std::io::stdout, level);
    let log = Logger::from_context(&ctx, level)
        .with_tag("service", settings.name.clone())
        .with_tag("port", settings.server.port);

    log.info(&format!("listening on {}", settings.server.host));
    log.debug(&format!("read timeout {:?}", settings.server.read_timeout));
    for origin in &settings.origins {
        log.debug(&format!("allowing origin {origin}"));
    }

    let ctx: Context = ctx.with_timeout(Duration::from_secs(1));
    match log.shutdown(&ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("shutdown: {err}");
            ExitCode::FAILURE
        }
    }
}
