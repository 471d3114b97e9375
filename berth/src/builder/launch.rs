use crate::builder::SpecError;
use serde::Serialize;

const WILDCARD_HOSTS: [&str; 3] = ["0.0.0.0", "::", "[::]"];

/// The parts of a launch command that decide where the server listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchCommand {
    pub program: String,
    pub app_target: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl LaunchCommand {
    /// Understands `<program> [app-target] [--host H|--host=H] [--port P|--port=P]`.
    /// Unknown flags are ignored. An unknown `--flag` written without `=`
    /// takes the next word as its value unless that word is itself a flag, so
    /// boolean flags belong after the app target.
    pub fn parse(tokens: &[String]) -> Result<Self, SpecError> {
        let (program, rest) = match tokens.split_first() {
            Some(split) => split,
            None => return Err(SpecError::EmptyEntrypoint),
        };

        let mut launch = LaunchCommand {
            program: program.clone(),
            app_target: None,
            host: None,
            port: None,
        };

        let mut args = rest.iter();
        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if arg.starts_with("--") => (flag, Some(value.to_string())),
                _ => (arg.as_str(), None),
            };

            match flag {
                "--host" => launch.host = inline.or_else(|| args.next().cloned()),
                "--port" => {
                    let value = inline.or_else(|| args.next().cloned()).unwrap_or_default();
                    launch.port = Some(parse_port(&value)?);
                }
                f if f.starts_with("--") && inline.is_none() => {
                    if args.clone().next().is_some_and(|next| !next.starts_with('-')) {
                        args.next();
                    }
                }
                f if f.starts_with('-') => (),
                positional => {
                    if launch.app_target.is_none() {
                        launch.app_target = Some(positional.to_string());
                    }
                }
            }
        }

        Ok(launch)
    }

    pub fn binds_wildcard(&self) -> bool {
        self.host.as_deref().map(is_wildcard).unwrap_or(false)
    }
}

pub fn is_wildcard(host: &str) -> bool {
    WILDCARD_HOSTS.contains(&host)
}

fn parse_port(value: &str) -> Result<u16, SpecError> {
    match value.parse::<u16>() {
        Ok(0) | Err(_) => Err(SpecError::InvalidBindPort(value.to_string())),
        Ok(port) => Ok(port),
    }
}
