use snowflake::SnowflakeIdBucket;
use std::sync::{Mutex, MutexGuard, OnceLock};

static BUCKET: OnceLock<Mutex<SnowflakeIdBucket>> = OnceLock::new();

fn bucket() -> MutexGuard<'static, SnowflakeIdBucket> {
    BUCKET
        .get_or_init(|| Mutex::new(SnowflakeIdBucket::new(1, 1)))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Configure the generator with this process's machine and node ids
/// (each 0-31). Only the first call wins; later calls are ignored, as
/// is a call made after an id has already been handed out.
pub fn init(machine_id: i32, node_id: i32) {
    let _ = BUCKET.set(Mutex::new(SnowflakeIdBucket::new(machine_id, node_id)));
}

/// Next time-ordered id, rendered as a decimal string.
pub fn next_id() -> String {
    bucket().get_id().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn next_id_returns_unique_ids() {
        init(1, 1);
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            let id = next_id();
            assert!(!id.is_empty());
            assert!(ids.insert(id), "Duplicate ID generated");
        }
    }

    #[test]
    fn ids_stay_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..250).map(|_| next_id()).collect::<Vec<_>>()))
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(ids.insert(id), "Duplicate ID generated");
            }
        }
    }
}
