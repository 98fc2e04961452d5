//! SASN Console - SASN 节点 Web 管理控制台
//!
//! Usage:
//! - Normal mode: `sasn-console`
//! - With custom port: `sasn-console --port 19999`
//!
//! Connection settings come from environment variables (`RP_IP`, `HOST_IP`, ...).

use sasn_console::RuntimeConfig;

/// 解析命令行参数
fn parse_args() -> RuntimeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RuntimeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                config.port_override = args[i + 1].parse().ok();
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    config
}

fn print_help() {
    println!("SASN Console - SASN 节点 Web 管理控制台");
    println!();
    println!("USAGE:");
    println!("    sasn-console [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --port <PORT>    Override the listening port (PORT)");
    println!("    -h, --help       Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    RP_IP, RP_SSH_PORT, RP_USERNAME, RP_PASSWORD        RP card connection");
    println!("    HOST_IP, HOST_SSH_PORT, HOST_USERNAME, HOST_PASSWORD  Host connection");
    println!("    RP1_IP           Address rendered into the load apply script");
    println!("    LOG_FILE         Also append logs to this file");
    println!("    RUST_LOG         Log filter (default: info)");
}

fn main() -> anyhow::Result<()> {
    let config = parse_args();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(sasn_console::init_and_run_console_with_config(config))
}
