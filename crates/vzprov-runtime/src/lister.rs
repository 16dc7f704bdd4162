use crate::RuntimeError;
use serde::Deserialize;
use vzprov_schema::Ctid;

/// One row of `vzlist --json` output. Only the identifier is used.
#[derive(Debug, Clone, Deserialize)]
pub struct ListedContainer {
    #[serde(alias = "id")]
    pub ctid: Ctid,
}

/// Parse `vzlist -a -j -o ctid` output into container IDs.
///
/// Empty output means no containers exist.
pub fn parse_listing(stdout: &str) -> Result<Vec<Ctid>, RuntimeError> {
    let body = stdout.trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<ListedContainer> =
        serde_json::from_str(body).map_err(|e| RuntimeError::MalformedListing(e.to_string()))?;
    Ok(rows.into_iter().map(|row| row.ctid).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[Ctid]) -> Vec<u32> {
        v.iter().map(|c| c.get()).collect()
    }

    #[test]
    fn parses_vzlist_json() {
        let out = r#"[
  {"ctid": 101, "status": "running", "hostname": "vm1"},
  {"ctid": 205}
]"#;
        assert_eq!(ids(&parse_listing(out).unwrap()), vec![101, 205]);
    }

    #[test]
    fn accepts_id_alias() {
        assert_eq!(ids(&parse_listing(r#"[{"id": 4}]"#).unwrap()), vec![4]);
    }

    #[test]
    fn empty_output_means_no_containers() {
        assert!(parse_listing("").unwrap().is_empty());
        assert!(parse_listing("  \n").unwrap().is_empty());
        assert!(parse_listing("[]").unwrap().is_empty());
    }

    #[test]
    fn malformed_output_is_error() {
        assert!(matches!(
            parse_listing("Container(s) not found"),
            Err(RuntimeError::MalformedListing(_))
        ));
        assert!(parse_listing(r#"[{"hostname": "vm1"}]"#).is_err());
        assert!(parse_listing(r#"[{"ctid": 0}]"#).is_err());
    }
}
