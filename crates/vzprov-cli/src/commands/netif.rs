use super::{json_pretty, print_failure, success_json, EXIT_SUCCESS};
use vzprov_core::Engine;
use vzprov_schema::{Ctid, NetifChange};

/// Merge one interface change into the container's NETIF line. Also the way
/// to rewrite a line left inconsistent by other tools.
pub fn run(engine: &Engine, ctid: Ctid, change: NetifChange, json: bool) -> Result<u8, String> {
    match engine.apply_netif(ctid, change) {
        Ok(report) => {
            if json {
                println!("{}", json_pretty(&success_json(&report))?);
            } else {
                let line = report.netif.as_deref().unwrap_or_default();
                if report.changed {
                    println!("container {ctid}: {line}");
                } else {
                    println!("container {ctid}: unchanged");
                }
            }
            Ok(EXIT_SUCCESS)
        }
        Err(err) => print_failure(&err, json),
    }
}
