use crate::builder::spec::{BuildSpec, CopyStep, Instruction};
use crate::builder::DockerfileError;
use lazy_static::lazy_static;
use log::debug;
use serde::Serialize;
use tera::{Context, Tera};

const TEMPLATE_NAME: &str = "Dockerfile";

// Files commonly consumed by a dependency install step, used when the
// instruction order alone does not reveal the manifest.
const KNOWN_MANIFESTS: [&str; 16] = [
    "requirements.txt",
    "pyproject.toml",
    "poetry.lock",
    "Pipfile",
    "Pipfile.lock",
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "Cargo.toml",
    "Cargo.lock",
    "go.mod",
    "go.sum",
    "Gemfile",
    "Gemfile.lock",
    "composer.json",
    "pom.xml",
];

lazy_static! {
    static ref TEMPLATES: Tera = {
        let template_path = format!("{}/src/builder/templates/**/*", env!("CARGO_MANIFEST_DIR"));
        match Tera::new(&template_path) {
            Ok(tera) => tera,
            Err(e) => {
                eprintln!("Parsing error(s): {}", e);
                ::std::process::exit(1);
            }
        }
    };
}

#[derive(Serialize, Debug)]
struct DockerfileContext<'a> {
    product_name: &'a str,
    base_image: &'a str,
    workdir: &'a str,
    dependency_steps: Vec<String>,
    source_steps: Vec<String>,
    exposed_port: u16,
    command: String,
}

/// Renders `spec` as a Dockerfile. Rendering is deterministic: the same
/// spec always yields the same text.
pub fn render_dockerfile(spec: &BuildSpec, product_name: &str) -> Result<String, DockerfileError> {
    let mut body = Vec::new();
    let mut command = String::new();
    for instruction in spec.instructions() {
        match instruction {
            Instruction::From(_) | Instruction::Workdir(_) | Instruction::Expose(_) => (),
            Instruction::Cmd(_) => command = instruction.to_string(),
            other => body.push(other),
        }
    }

    let split = body
        .iter()
        .position(|i| !spec.install.is_empty() && *i == Instruction::Run(spec.install.clone()))
        .map(|pos| pos + 1)
        .unwrap_or(0);
    let source_steps = body.split_off(split);

    let ctx = DockerfileContext {
        product_name,
        base_image: &spec.base_image,
        workdir: &spec.workdir,
        dependency_steps: body.iter().map(Instruction::to_string).collect(),
        source_steps: source_steps.iter().map(Instruction::to_string).collect(),
        exposed_port: spec.exposed_port,
        command,
    };

    let context = Context::from_serialize(&ctx)?;
    Ok(TEMPLATES.render(TEMPLATE_NAME, &context)?)
}

/// Joins `\` continuations and drops blank lines and comments. Each entry
/// carries the line number it started on.
fn logical_lines(contents: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (i, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (text, continues) = match line.strip_suffix('\\') {
            Some(head) => (head.trim_end(), true),
            None => (line, false),
        };

        let (start, mut joined) = pending.take().unwrap_or((i + 1, String::new()));
        if !joined.is_empty() {
            joined.push(' ');
        }
        joined.push_str(text);

        if continues {
            pending = Some((start, joined));
        } else {
            lines.push((start, joined));
        }
    }

    if let Some(last) = pending {
        lines.push(last);
    }
    lines
}

/// Splits a shell-form line into words. Single quotes are literal, double
/// quotes allow `\"` and `\\`, a bare backslash escapes the next character.
pub fn split_shell_words(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err("unterminated single quote".to_string()),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\')) => current.push(c),
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            }
                            None => return Err("unterminated double quote".to_string()),
                        },
                        Some(c) => current.push(c),
                        None => return Err("unterminated double quote".to_string()),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(c) = chars.next() {
                    current.push(c);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }

    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn command_tokens(line: usize, args: &str) -> Result<Vec<String>, DockerfileError> {
    let malformed = |message: String| DockerfileError::Malformed { line, message };
    if args.starts_with('[') {
        serde_json::from_str::<Vec<String>>(args)
            .map_err(|e| malformed(format!("invalid exec form: {}", e)))
    } else {
        split_shell_words(args).map_err(malformed)
    }
}

fn is_known_manifest(path: &str) -> bool {
    let file_name = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);
    KNOWN_MANIFESTS.contains(&file_name)
}

/// Reads a single-stage Dockerfile back into a `BuildSpec`. The first `RUN`
/// is taken as the dependency install; later ones become build commands.
pub fn parse_dockerfile(contents: &str) -> Result<BuildSpec, DockerfileError> {
    let mut base_image: Option<String> = None;
    let mut workdir: Option<String> = None;
    let mut copy_steps: Vec<CopyStep> = Vec::new();
    // (number of copy steps seen before the RUN, command)
    let mut runs: Vec<(usize, Vec<String>)> = Vec::new();
    let mut exposed_port: Option<u16> = None;
    let mut entrypoint: Vec<String> = Vec::new();
    let mut cmd: Option<Vec<String>> = None;

    for (line, text) in logical_lines(contents) {
        let (keyword, args) = match text.split_once(char::is_whitespace) {
            Some((keyword, args)) => (keyword.to_uppercase(), args.trim()),
            None => (text.to_uppercase(), ""),
        };

        match keyword.as_str() {
            "FROM" => {
                if base_image.is_some() {
                    return Err(DockerfileError::MultiStage(line));
                }
                let image = args
                    .split_whitespace()
                    .find(|word| !word.starts_with("--"))
                    .ok_or(DockerfileError::Malformed {
                        line,
                        message: "FROM without an image".to_string(),
                    })?;
                base_image = Some(image.to_string());
            }
            "WORKDIR" => workdir = Some(args.to_string()),
            "COPY" | "ADD" => {
                let mut paths = command_tokens(line, args)?
                    .into_iter()
                    .filter(|word| !word.starts_with("--"))
                    .collect::<Vec<_>>();
                let destination = match paths.pop() {
                    Some(destination) if !paths.is_empty() => destination,
                    _ => {
                        return Err(DockerfileError::Malformed {
                            line,
                            message: format!("{} needs a source and a destination", keyword),
                        })
                    }
                };
                for source in paths {
                    copy_steps.push(CopyStep::new(&source, &destination));
                }
            }
            "RUN" => runs.push((copy_steps.len(), command_tokens(line, args)?)),
            "EXPOSE" => {
                if exposed_port.is_none() {
                    let port = args.split_whitespace().next().unwrap_or("");
                    let port = port.split('/').next().unwrap_or(port);
                    exposed_port = match port.parse::<u16>() {
                        Ok(port) => Some(port),
                        Err(_) => {
                            return Err(DockerfileError::Malformed {
                                line,
                                message: format!("invalid port `{}`", port),
                            })
                        }
                    };
                }
            }
            "ENTRYPOINT" => entrypoint = command_tokens(line, args)?,
            "CMD" => cmd = Some(command_tokens(line, args)?),
            other => debug!("Ignoring {} instruction on line {}", other, line),
        }
    }

    let base_image = base_image.ok_or(DockerfileError::MissingInstruction("FROM"))?;
    let exposed_port = exposed_port.ok_or(DockerfileError::MissingInstruction("EXPOSE"))?;
    entrypoint.extend(cmd.unwrap_or_default());
    if entrypoint.is_empty() {
        return Err(DockerfileError::MissingInstruction("CMD"));
    }

    let mut runs = runs.into_iter();
    let (copies_before_install, install) = runs.next().unwrap_or((copy_steps.len(), Vec::new()));
    let build = runs.map(|(_, command)| command).collect::<Vec<_>>();

    let dependency_manifest = copy_steps[..copies_before_install]
        .iter()
        .rev()
        .find(|step| !step.is_full_source())
        .map(|step| step.source.clone())
        .or_else(|| {
            copy_steps
                .iter()
                .find(|step| is_known_manifest(&step.source))
                .map(|step| step.source.clone())
        })
        .or_else(|| install.iter().find(|token| is_known_manifest(token)).cloned())
        .ok_or(DockerfileError::UnknownManifest)?;

    Ok(BuildSpec {
        base_image,
        workdir: workdir.unwrap_or_else(|| "/".to_string()),
        dependency_manifest,
        copy_steps,
        install,
        build,
        exposed_port,
        entrypoint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::spec::tests::python_spec;
    use crate::builder::SpecError;

    const PYTHON_DOCKERFILE: &str = r#"FROM python:3.11-slim

WORKDIR /app

COPY requirements.txt .
RUN pip install --no-cache-dir -r requirements.txt

COPY . .

EXPOSE 8000

CMD ["uvicorn", "main:app", "--host", "0.0.0.0", "--port", "8000"]
"#;

    #[test]
    fn parses_python_service_dockerfile() {
        assert_eq!(parse_dockerfile(PYTHON_DOCKERFILE).unwrap(), python_spec());
    }

    #[test]
    fn rendered_dockerfile_orders_install_before_sources() {
        let rendered = render_dockerfile(&python_spec(), "clt-chatbot").unwrap();
        let position = |needle: &str| rendered.find(needle).unwrap();

        assert!(rendered.starts_with("# clt-chatbot image"));
        assert!(position("FROM python:3.11-slim") < position("WORKDIR /app"));
        assert!(position("COPY requirements.txt .") < position("RUN pip install"));
        assert!(position("RUN pip install") < position("COPY . ."));
        assert!(position("COPY . .") < position("EXPOSE 8000"));
        assert!(rendered.contains(r#"CMD ["uvicorn","main:app","--host","0.0.0.0","--port","8000"]"#));

        assert_eq!(parse_dockerfile(&rendered).unwrap(), python_spec());
        assert_eq!(render_dockerfile(&python_spec(), "clt-chatbot").unwrap(), rendered);
    }

    #[test]
    fn handles_continuations_comments_and_shell_forms() {
        let dockerfile = r#"
# syntax=docker/dockerfile:1
FROM --platform=linux/amd64 node:20.11-alpine AS app
ENV NODE_ENV=production
WORKDIR /srv
COPY --chown=node package.json package-lock.json ./
RUN npm ci \
    --omit=dev
COPY . .
RUN npm run build
EXPOSE 3000/tcp
ENTRYPOINT ["node"]
CMD dist/server.js --host 0.0.0.0 --port 3000
"#;
        let spec = parse_dockerfile(dockerfile).unwrap();
        assert_eq!(spec.base_image, "node:20.11-alpine");
        assert_eq!(spec.workdir, "/srv");
        assert_eq!(spec.dependency_manifest, "package-lock.json");
        assert_eq!(
            spec.copy_steps,
            vec![
                CopyStep::new("package.json", "./"),
                CopyStep::new("package-lock.json", "./"),
                CopyStep::new(".", "."),
            ]
        );
        assert_eq!(spec.install, vec!["npm", "ci", "--omit=dev"]);
        assert_eq!(spec.build, vec![vec!["npm", "run", "build"]]);
        assert_eq!(spec.exposed_port, 3000);
        assert_eq!(
            spec.entrypoint,
            vec!["node", "dist/server.js", "--host", "0.0.0.0", "--port", "3000"]
        );
        assert!(spec.check().is_empty());
    }

    #[test]
    fn install_after_full_copy_still_parses_and_fails_lint() {
        let dockerfile = r#"FROM python:3.11-slim
WORKDIR /app
COPY . .
RUN pip install -r requirements.txt
EXPOSE 8001
CMD ["uvicorn", "main:app", "--host", "0.0.0.0", "--port", "8000"]
"#;
        let spec = parse_dockerfile(dockerfile).unwrap();
        assert_eq!(spec.dependency_manifest, "requirements.txt");
        assert_eq!(
            spec.check(),
            vec![
                SpecError::MissingManifestCopy("requirements.txt".to_string()),
                SpecError::PortMismatch {
                    exposed: 8001,
                    bound: 8000
                },
            ]
        );
    }

    #[test]
    fn rejects_multi_stage_and_missing_instructions() {
        let multi = "FROM rust:1.77 AS build\nFROM debian:12-slim\n";
        assert!(matches!(
            parse_dockerfile(multi),
            Err(DockerfileError::MultiStage(2))
        ));

        let no_cmd = "FROM python:3.11\nCOPY requirements.txt .\nRUN pip install -r requirements.txt\nEXPOSE 80\n";
        assert!(matches!(
            parse_dockerfile(no_cmd),
            Err(DockerfileError::MissingInstruction("CMD"))
        ));

        let bad_port = "FROM python:3.11\nEXPOSE http\n";
        assert!(matches!(
            parse_dockerfile(bad_port),
            Err(DockerfileError::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn shell_words() {
        assert_eq!(
            split_shell_words(r#"sh -c 'cargo fetch && echo ok' "a \"b\"" c\ d"#).unwrap(),
            vec!["sh", "-c", "cargo fetch && echo ok", r#"a "b""#, "c d"]
        );
        assert_eq!(split_shell_words("''").unwrap(), vec![""]);
        assert!(split_shell_words("echo 'open").is_err());
    }
}
