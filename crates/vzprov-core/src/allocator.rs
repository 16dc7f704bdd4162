use crate::CoreError;
use tracing::debug;
use vzprov_schema::Ctid;

/// Next free identifier: one past the highest existing ID, or 1 when no
/// containers exist.
pub fn next_free(existing: &[Ctid]) -> Result<Ctid, CoreError> {
    match existing.iter().max() {
        None => Ctid::new(1).map_err(|e| CoreError::Allocation {
            reason: e.to_string(),
            command: None,
        }),
        Some(max) => max.next().ok_or_else(|| CoreError::Allocation {
            reason: format!("container ID space exhausted after {max}"),
            command: None,
        }),
    }
}

/// Return `requested` unchanged, or allocate from the listing produced by
/// `list`. Uniqueness of a requested ID is left to the backend, and `list`
/// is only called when no ID was requested.
pub fn allocate<F>(requested: Option<Ctid>, list: F) -> Result<Ctid, CoreError>
where
    F: FnOnce() -> Result<Vec<Ctid>, CoreError>,
{
    if let Some(id) = requested {
        return Ok(id);
    }
    let existing = list()?;
    let id = next_free(&existing)?;
    debug!("allocated container ID {id} ({} existing)", existing.len());
    Ok(id)
}
