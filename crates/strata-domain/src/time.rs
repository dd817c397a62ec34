/// All timestamps in this system are integer nanoseconds since the Unix
/// epoch, stored as plain `i64` — there is no timezone or calendar math done
/// on them anywhere in the core, only comparison and FIFO ordering.
pub type Timestamp = i64;

pub fn now() -> Timestamp {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}
