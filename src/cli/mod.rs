mod serve;

use anyhow::Result;
use console::style;
use tracing::Level;

use crate::core::config::DEFAULT_CONFIG_FILE;
use crate::core::terminal::{self, print_error};

fn print_help() {
    terminal::print_banner();

    terminal::print_section("Commands");
    terminal::print_command("serve", "Run the scheduler and status server (default)");
    terminal::print_command("jobs", "List the jobs the config registers");
    terminal::print_command("run-once <job>", "Run one job immediately and print the outcome");
    terminal::print_command("help", "Show this message");

    terminal::print_section("Options");
    terminal::print_command("--config, -c <path>", "Config file (default: config.yaml)");
    terminal::print_command("--host <host>", "Status server bind host (serve only)");
    terminal::print_command("--port <port>", "Status server port (serve only)");
    terminal::print_command("--log-level <level>", "trace, debug, info, warn or error");

    terminal::print_section("Built-in jobs (enable with builtin_jobs)");
    for name in crate::queries::names() {
        terminal::print_command(name, "");
    }

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("dbnotify").green()
    );
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommonFlags {
    pub config_path: String,
    pub log_level: Level,
}

/// Flags every command accepts. Unknown arguments are skipped.
pub(crate) fn parse_common_flags(args: &[String], start: usize) -> CommonFlags {
    let mut config_path = DEFAULT_CONFIG_FILE.to_string();
    let mut log_level = Level::INFO;
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--log-level" => {
                if i + 1 < args.len() {
                    log_level = crate::logging::parse_level(&args[i + 1]);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    CommonFlags {
        config_path,
        log_level,
    }
}

/// `--host` / `--port` overrides for the status server; `None` keeps the config value.
pub(crate) fn parse_serve_flags(args: &[String], start: usize) -> (Option<String>, Option<u16>) {
    let mut host = None;
    let mut port = None;
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                if i + 1 < args.len() {
                    host = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--port" => {
                if i + 1 < args.len() {
                    port = args[i + 1].parse().ok();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    (host, port)
}

/// First positional argument after `start`, skipping flags and their values.
pub(crate) fn positional_arg(args: &[String], start: usize) -> Option<String> {
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" | "--log-level" | "--host" | "--port" => i += 2,
            arg if arg.starts_with('-') => i += 1,
            arg => return Some(arg.to_string()),
        }
    }
    None
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // A bare invocation, or one that starts with a flag, means `serve`.
    let (cmd, start) = match args.get(1) {
        Some(arg) if !arg.starts_with('-') => (arg.as_str(), 2),
        Some(arg) if arg == "--help" || arg == "-h" => ("help", 2),
        _ => ("serve", 1),
    };

    match cmd {
        "serve" => {
            let flags = parse_common_flags(&args, start);
            let (host, port) = parse_serve_flags(&args, start);
            serve::run_server(flags, host, port).await
        }
        "jobs" => {
            let flags = parse_common_flags(&args, start);
            serve::list_jobs(flags).await
        }
        "run-once" => {
            let Some(job_name) = positional_arg(&args, start) else {
                print_error("Error: run-once needs a job name.");
                print_help();
                return Ok(());
            };
            let flags = parse_common_flags(&args, start);
            serve::run_once(flags, &job_name).await
        }
        "help" => {
            print_help();
            Ok(())
        }
        _ => {
            print_error(&format!("Unknown command: {}", cmd));
            print_help();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn common_flags_default_to_config_yaml_at_info() {
        let flags = parse_common_flags(&args(&["dbnotify", "serve"]), 2);
        assert_eq!(flags.config_path, "config.yaml");
        assert_eq!(flags.log_level, Level::INFO);
    }

    #[test]
    fn common_flags_read_config_and_level() {
        let flags = parse_common_flags(
            &args(&["dbnotify", "jobs", "-c", "/etc/dbnotify.yaml", "--log-level", "debug"]),
            2,
        );
        assert_eq!(flags.config_path, "/etc/dbnotify.yaml");
        assert_eq!(flags.log_level, Level::DEBUG);
    }

    #[test]
    fn serve_flags_override_host_and_port() {
        let (host, port) = parse_serve_flags(
            &args(&["dbnotify", "serve", "--host", "127.0.0.1", "--port", "9000"]),
            2,
        );
        assert_eq!(host.as_deref(), Some("127.0.0.1"));
        assert_eq!(port, Some(9000));
    }

    #[test]
    fn unparsable_port_keeps_config_value() {
        let (host, port) = parse_serve_flags(&args(&["dbnotify", "--port", "http"]), 1);
        assert_eq!(host, None);
        assert_eq!(port, None);
    }

    #[test]
    fn positional_arg_skips_flag_values() {
        let parsed = positional_arg(
            &args(&["dbnotify", "run-once", "--config", "other.yaml", "Example"]),
            2,
        );
        assert_eq!(parsed.as_deref(), Some("Example"));
        assert_eq!(positional_arg(&args(&["dbnotify", "run-once"]), 2), None);
    }
}
