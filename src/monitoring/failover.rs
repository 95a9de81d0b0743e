//! Pool change detection

/// Observed pool transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverEvent {
    pub from: String,
    pub to: String,
}

/// Remembers the last seen pool and reports changes
///
/// The first pool ever seen becomes the baseline silently, so starting the
/// watcher never raises a failover.
#[derive(Debug, Clone, Default)]
pub struct FailoverDetector {
    last_pool_id: Option<String>,
}

impl FailoverDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, pool_id: Option<&str>) -> Option<FailoverEvent> {
        let pool = pool_id.map(str::trim).filter(|p| !p.is_empty())?;

        match self.last_pool_id.as_deref() {
            None => {
                self.last_pool_id = Some(pool.to_string());
                None
            }
            Some(last) if last == pool => None,
            Some(last) => {
                let event = FailoverEvent {
                    from: last.to_string(),
                    to: pool.to_string(),
                };
                self.last_pool_id = Some(pool.to_string());
                Some(event)
            }
        }
    }

    pub fn current_pool(&self) -> Option<&str> {
        self.last_pool_id.as_deref()
    }
}
