//! Munin plugin reporting latency to each host in the `hosts` environment
//! variable (space separated). Needs to run as root for raw sockets:
//!
//! ```text
//! [ping]
//! user root
//! env.hosts example.net example.org
//! ```

use std::env;
use std::process;

fn graph_name(host: &str) -> String {
    format!("ping_{}", host.replace('.', "_"))
}

fn main() {
    env_logger::init();
    let hosts = env::var("hosts").unwrap_or_default();
    if hosts.trim().is_empty() {
        process::exit(1);
    }
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("config") => {
            for host in hosts.split_whitespace() {
                println!("multigraph {}", graph_name(host));
                println!("graph_title Latency to {}", host);
                println!("graph_category latency");
                println!("graph_vlabel ping");
                println!("graph_scale no");
                println!("graph_info This graph shows the latency to reach {}", host);
                println!("ping.label ping");
            }
        }
        None => {
            for host in hosts.split_whitespace() {
                let rtt = match echoping::ping_once(host) {
                    Ok(rtt) => rtt,
                    Err(e) => {
                        log::debug!("{}: {}", host, e);
                        continue;
                    }
                };
                println!("multigraph {}", graph_name(host));
                println!("ping.value {:.5}", rtt.as_secs_f64() * 1000.0);
            }
        }
        Some(_) => process::exit(1),
    }
}
