use anyhow::Result;
use vergen::EmitBuilder;

// Git SHA and commit date logged by `gps_overlay --debug`
fn main() -> Result<()> {
    EmitBuilder::builder()
        .git_sha(true)
        .git_commit_date()
        .emit()?;
    Ok(())
}
