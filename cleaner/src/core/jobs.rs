//! Parsing of script job descriptions (`"<id>: <description>"`).

/// Parse the numeric job id preceding the first `:`.
///
/// Returns `None` when there is no colon or the prefix is not a number.
pub fn parse_job_id(job: &str) -> Option<u32> {
    let (id, _) = job.split_once(':')?;
    id.trim().parse().ok()
}
