// Dump stored traffic rollups as JSON.
//
// Usage: cargo run --example dump_traffic -- [DATA_DIR] [QUERY]
//   DATA_DIR  default: ./data/traffic
//   QUERY     recent[:N] (default recent:7), day:YYYY-MM-DD, week:YYYY-Www, month:YYYY-MM

use anyhow::Context;
use chrono::NaiveDate;
use std::env;
use trafficmon::format::format_bytes;
use trafficmon::traffic_store::TrafficStore;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let dir = args.get(1).map(String::as_str).unwrap_or("./data/traffic");
    let query = args.get(2).map(String::as_str).unwrap_or("recent:7");

    let store = TrafficStore::open(dir)?;
    let (kind, arg) = query.split_once(':').unwrap_or((query, ""));

    let json = match kind {
        "recent" => {
            let n = if arg.is_empty() { 7 } else { arg.parse().context("recent:N")? };
            let days = store.get_recent(n)?;
            for d in &days {
                eprintln!(
                    "{}  in {}  out {}",
                    d.date,
                    format_bytes(d.total_bytes_in),
                    format_bytes(d.total_bytes_out)
                );
            }
            serde_json::to_string_pretty(&days)?
        }
        "day" => {
            let date = NaiveDate::parse_from_str(arg, "%Y-%m-%d").context("day:YYYY-MM-DD")?;
            serde_json::to_string_pretty(&store.get_day(date)?)?
        }
        "week" => {
            let (year, week) = arg.split_once("-W").context("week:YYYY-Www")?;
            serde_json::to_string_pretty(&store.get_week(year.parse()?, week.parse()?)?)?
        }
        "month" => {
            let (year, month) = arg.split_once('-').context("month:YYYY-MM")?;
            serde_json::to_string_pretty(&store.get_month(year.parse()?, month.parse()?)?)?
        }
        other => anyhow::bail!("unknown query '{}'", other),
    };

    println!("{json}");
    Ok(())
}
