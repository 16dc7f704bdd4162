use super::{json_pretty, print_failure, EXIT_SUCCESS};
use vzprov_core::Engine;

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let ids = match engine.list() {
        Ok(ids) => ids,
        Err(err) => return print_failure(&err, json),
    };
    if json {
        let rows: Vec<_> = ids
            .iter()
            .map(|id| serde_json::json!({ "ctid": id }))
            .collect();
        println!("{}", json_pretty(&rows)?);
    } else if ids.is_empty() {
        println!("no containers found");
    } else {
        println!("CTID");
        for id in &ids {
            println!("{id}");
        }
    }
    Ok(EXIT_SUCCESS)
}
