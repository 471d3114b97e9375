mod builder;
mod container;
mod dockerignore;
mod toolchain;
mod utils;

use crate::builder::{parse_dockerfile, render_dockerfile, Config};
use crate::container::{plan_layers, probe, report_layers, write_dockerfile, DockerImage};
use crate::toolchain::{Platform, ToolchainContext};
use clap::{arg, Arg, ArgMatches, Command};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use std::{env, fs};

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn load_toolchain(matches: &ArgMatches) -> Arc<ToolchainContext> {
    let host = Platform::host().unwrap_or_else(|e| fail(e));
    let target_os = matches
        .get_one::<String>("target_os")
        .cloned()
        .unwrap_or_else(|| host.os.to_string());
    let target_arch = matches
        .get_one::<String>("target_arch")
        .cloned()
        .unwrap_or_else(|| host.arch.to_string());
    let target = Platform::new(&target_os, &target_arch).unwrap_or_else(|e| fail(e));

    match ToolchainContext::new(host, target) {
        Ok(toolchain) => Arc::new(toolchain),
        Err(e) => fail(e),
    }
}

fn image_tag(matches: &ArgMatches, toolchain: &ToolchainContext, descriptor_path: &str) -> String {
    if let Some(tag) = matches.get_one::<String>("tag") {
        return tag.clone();
    }
    let product_dir = Path::new(descriptor_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    toolchain
        .git_tag(&product_dir.to_string_lossy())
        .unwrap_or_else(|e| fail(format!("Failed computing image tag: {}", e)))
}

fn host_port(matches: &ArgMatches, config: &Config) -> u16 {
    match matches.get_one::<String>("host_port") {
        Some(port) => match port.parse::<u16>() {
            Ok(port) if port != 0 => port,
            _ => fail(format!("Invalid host port: {}", port)),
        },
        None => config.spec().exposed_port,
    }
}

#[tokio::main]
async fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    dotenv::dotenv().ok();
    env_logger::init();

    let matches = Command::new("berth")
        .version("0.1.0")
        .about("Builds and launches a service image from a declarative container descriptor.")
        .arg(arg!(file : -f --file <FILE> "Path to the berth descriptor").default_value("berth.yaml"))
        .arg(arg!(target_arch : --arch <TARGET_ARCH> "Target architecture"))
        .arg(arg!(target_os : --os <TARGET_OS> "Target OS"))
        .arg(arg!(environment : --env <ENVIRONMENT> "Environment").default_value("dev"))
        .arg(arg!(docker_registry : --registry <DOCKER_REGISTRY> "Docker Registry"))
        .arg(arg!(tag : --tag <TAG> "Image tag, defaults to the last commit touching the product"))
        .subcommand(Command::new("lint").about("Reports every problem with the descriptor"))
        .subcommand(Command::new("render").about("Writes the Dockerfile into the build context"))
        .subcommand(
            Command::new("parse")
                .about("Reads an existing Dockerfile into a descriptor image section")
                .arg(Arg::new("dockerfile").required(true)),
        )
        .subcommand(Command::new("plan").about("Shows which layers the next build can reuse"))
        .subcommand(Command::new("build").about("Builds the image"))
        .subcommand(
            Command::new("run")
                .about("Runs the built image")
                .arg(arg!(host_port : --"host-port" <PORT> "Host port to publish")),
        )
        .subcommand(
            Command::new("dev")
                .about("Builds the image and runs it")
                .arg(arg!(host_port : --"host-port" <PORT> "Host port to publish")),
        )
        .subcommand(Command::new("push").about("Builds the image and pushes it to the registry"))
        .subcommand(
            Command::new("probe")
                .about("Checks that the running service answers over HTTP")
                .arg(arg!(host_port : --"host-port" <PORT> "Host port the service is published on"))
                .arg(arg!(path : --path <PATH> "Request path").default_value("/health"))
                .arg(arg!(attempts : --attempts <N> "Number of attempts").default_value("10")),
        )
        .subcommand(
            Command::new("describe")
                .about("Describes the current configuration")
                .subcommand(Command::new("spec").about("Describes the image build spec"))
                .subcommand(Command::new("dockerfile").about("Prints the rendered Dockerfile"))
                .subcommand(Command::new("toolchain").about("Describes the current toolchain"))
                .subcommand(Command::new("layers").about("Prints the layer plan")),
        )
        .get_matches();

    // Parsing a Dockerfile needs no descriptor.
    if let Some(sub) = matches.subcommand_matches("parse") {
        let path = sub.get_one::<String>("dockerfile").unwrap_or_else(|| fail("No Dockerfile given"));
        let contents = fs::read_to_string(path).unwrap_or_else(|e| fail(format!("Failed to read {}: {}", path, e)));
        let spec = parse_dockerfile(&contents).unwrap_or_else(|e| fail(format!("{}: {}", path, e)));
        match serde_yaml::to_string(&spec) {
            Ok(yaml) => print!("{}", yaml),
            Err(e) => fail(e),
        }
        for finding in spec.check() {
            eprintln!("{} {}", "warning:".yellow().bold(), finding);
        }
        return;
    }

    let descriptor_path = matches
        .get_one::<String>("file")
        .cloned()
        .unwrap_or_else(|| "berth.yaml".to_string());
    let environment = matches
        .get_one::<String>("environment")
        .cloned()
        .unwrap_or_else(|| "dev".to_string());
    let docker_registry = matches
        .get_one::<String>("docker_registry")
        .cloned()
        .or_else(|| env::var("DOCKER_REGISTRY").ok());

    let config = match Config::new(&descriptor_path, &environment, docker_registry) {
        Ok(config) => config,
        Err(e) => fail(e),
    };

    if let Some(sub) = matches.subcommand_matches("describe") {
        if sub.subcommand_matches("spec").is_some() {
            match serde_yaml::to_string(config.spec()) {
                Ok(yaml) => print!("{}", yaml),
                Err(e) => fail(e),
            }
        }
        if sub.subcommand_matches("dockerfile").is_some() {
            match render_dockerfile(config.spec(), config.product_name()) {
                Ok(dockerfile) => print!("{}", dockerfile),
                Err(e) => fail(e),
            }
        }
        if sub.subcommand_matches("toolchain").is_some() {
            match serde_json::to_string_pretty(load_toolchain(&matches).as_ref()) {
                Ok(json) => println!("{}", json),
                Err(e) => fail(e),
            }
        }
        if sub.subcommand_matches("layers").is_some() {
            let (plan, _) = plan_layers(&config).unwrap_or_else(|e| fail(e));
            match serde_json::to_string_pretty(&plan) {
                Ok(json) => println!("{}", json),
                Err(e) => fail(e),
            }
        }
        return;
    }

    if matches.subcommand_matches("lint").is_some() {
        let findings = config.spec().check();
        if findings.is_empty() {
            println!("{} {}", config.product_name().bold(), "ok".green());
            return;
        }
        for finding in &findings {
            eprintln!("{} {}", "error:".red().bold(), finding);
        }
        std::process::exit(1);
    }

    if matches.subcommand_matches("render").is_some() {
        match write_dockerfile(&config) {
            Ok(path) => println!("Wrote {}", path.display()),
            Err(e) => fail(e),
        }
        return;
    }

    if matches.subcommand_matches("plan").is_some() {
        let (plan, previous) = plan_layers(&config).unwrap_or_else(|e| fail(e));
        report_layers(&plan, previous.as_ref());
        return;
    }

    if let Some(sub) = matches.subcommand_matches("probe") {
        let port = host_port(sub, &config);
        let path = sub
            .get_one::<String>("path")
            .cloned()
            .unwrap_or_else(|| "/".to_string());
        let attempts = sub
            .get_one::<String>("attempts")
            .and_then(|a| a.parse::<u32>().ok())
            .unwrap_or(1);
        let url = format!("http://127.0.0.1:{}{}", port, path);
        match probe(&url, attempts, Duration::from_secs(1)).await {
            Ok(status) => println!("{} answered {}", url, status.to_string().green()),
            Err(e) => fail(e),
        }
        return;
    }

    let toolchain = load_toolchain(&matches);
    let tag = image_tag(&matches, &toolchain, &descriptor_path);
    let image = DockerImage::new(config.clone(), toolchain, tag);

    if matches.subcommand_matches("build").is_some() {
        match image.build().await {
            Ok(tagged) => println!("Built {}", tagged.green()),
            Err(e) => fail(e),
        }
    }

    if matches.subcommand_matches("push").is_some() {
        match image.build_and_push().await {
            Ok(reference) => println!("Pushed {}", reference.green()),
            Err(e) => fail(e),
        }
    }

    if let Some(sub) = matches.subcommand_matches("dev") {
        if let Err(e) = image.build().await {
            fail(e);
        }
        match image.run(host_port(sub, &config)).await {
            Ok(status) => std::process::exit(status.exit_code()),
            Err(e) => fail(e),
        }
    }

    if let Some(sub) = matches.subcommand_matches("run") {
        match image.run(host_port(sub, &config)).await {
            Ok(status) => std::process::exit(status.exit_code()),
            Err(e) => fail(e),
        }
    }
}
