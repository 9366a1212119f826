use echoping::{PingStats, Pinger};
use std::env;
use std::process;

fn main() {
    env_logger::init();
    let destination = match env::args().nth(1) {
        Some(d) => d,
        None => {
            eprintln!("usage: ping <destination> [count]");
            process::exit(2);
        }
    };
    let mut pinger = Pinger::new(destination.clone());
    // Unbounded unless a count is given, like ping(8).
    pinger.set_probe_count(env::args().nth(2).and_then(|c| c.parse().ok()).unwrap_or(0));

    let stream = match pinger.spawn(100) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    let mut stats = PingStats::new();
    for r in stream {
        stats.record(&r);
        match &r.error {
            None => println!(
                "{} bytes from {}: icmp_seq={} time={:?}",
                r.bytes_read, r.destination, r.sequence, r.delay
            ),
            Some(e) if e.is_timeout() => println!("Request timeout for icmp_seq {}", r.sequence),
            Some(e) if e.is_fatal() => {
                eprintln!("{}", e);
                process::exit(1);
            }
            Some(e) => println!("{}", e),
        }
    }
    println!(
        "--- {} ping statistics ---\n{} packets transmitted, {} received, {:.1}% packet loss",
        destination,
        stats.sent,
        stats.received,
        stats.loss_percent()
    );
}
