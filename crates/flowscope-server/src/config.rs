use anyhow::Result;
use std::ffi::OsString;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:7171";
pub const DEFAULT_BUS_CAPACITY: usize = 4096;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: String,
    pub bus_capacity: usize,
}

pub fn parse_args() -> Result<ServerConfig> {
    parse_args_from(std::env::args_os().skip(1))
}

fn parse_args_from<I>(args: I) -> Result<ServerConfig>
where
    I: IntoIterator<Item = OsString>,
{
    let mut listen = DEFAULT_LISTEN.to_string();
    let mut bus_capacity = DEFAULT_BUS_CAPACITY;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == "--listen" {
            let Some(value) = args.next() else {
                anyhow::bail!("--listen expects an address");
            };
            listen = value.to_string_lossy().to_string();
        } else if arg == "--bus-capacity" {
            let Some(value) = args.next() else {
                anyhow::bail!("--bus-capacity expects a number");
            };
            bus_capacity = value.to_string_lossy().parse()?;
        } else {
            anyhow::bail!("unknown argument: {:?}", arg);
        }
    }

    Ok(ServerConfig {
        listen,
        bus_capacity,
    })
}
