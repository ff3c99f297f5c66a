use crate::core::error::{HookError, JobConfigError};
use crate::core::job::Job;

/// Smoke-test job: one constant row every five seconds, skipped when
/// `SECONDCOL` is 1.
pub fn example_job() -> Result<Job, JobConfigError> {
    let query = "-- constant row, no table needed
SELECT
  '1' AS FIRSTCOL
  , '2' AS SECONDCOL";

    Job::builder()
        .name("Example")
        .description("Sends a constant row to verify delivery end to end")
        .header("this is Example query!")
        .cron("0/5 * * * * *")
        .labels(["FIRSTCOL IS : ", "SECONDCOL IS : "])
        .columns(["FIRSTCOL", "SECONDCOL"])
        .query(query)
        .filter(|row| {
            let second: i64 = row
                .get("SECONDCOL")
                .parse()
                .map_err(|e| HookError::new(format!("SECONDCOL is not a number: {}", e)))?;
            Ok(second != 1)
        })
        .build()
}
